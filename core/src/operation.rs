use http::Method;

/// Operation is the immutable descriptor of one API call.
///
/// One Operation value is shared across every Request issued for that call;
/// it is never mutated after creation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Logical name of the call, e.g. `GetItem`.
    pub name: String,
    /// HTTP method the call uses.
    pub method: Method,
    /// HTTP path the call is sent to, relative to the client endpoint.
    pub path: String,
}

impl Operation {
    /// Create a new operation descriptor.
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
        }
    }
}
