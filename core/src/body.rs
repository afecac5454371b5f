use bytes::Bytes;

/// Body is the outbound request payload.
///
/// It behaves like a seekable stream: `read_remaining` consumes it, and
/// `rewind` seeks back to the start so a retried attempt re-transmits
/// byte-identical content. Re-sending a partially consumed body is the
/// correctness bug this type exists to prevent.
#[derive(Clone, Default)]
pub struct Body {
    inner: Bytes,
    pos: usize,
}

impl Body {
    /// Create an empty body.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total payload length in bytes, independent of the read position.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The full payload, independent of the read position.
    ///
    /// This is what gets hashed during signing: the signature always covers
    /// the finalized body from its start offset.
    pub fn bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Consume and return everything from the current position to the end.
    pub fn read_remaining(&mut self) -> Bytes {
        let out = self.inner.slice(self.pos..);
        self.pos = self.inner.len();
        out
    }

    /// Seek back to the start offset.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Body")
            .field("len", &self.inner.len())
            .field("pos", &self.pos)
            .finish()
    }
}

impl From<Bytes> for Body {
    fn from(inner: Bytes) -> Self {
        Self { inner, pos: 0 }
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Bytes::from(v).into()
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Bytes::from_static(s.as_bytes()).into()
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Bytes::from(s).into()
    }
}
