use std::mem;

use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use std::str::FromStr;

use crate::{Error, Result};

/// SigningContext is a canonical view of one outbound request, taken apart
/// for signing and applied back afterwards.
#[derive(Debug)]
pub struct SigningContext {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path.
    pub path: String,
    /// HTTP query parameters, percent-decoded.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningContext {
    /// Take a signing context out of http::request::Parts.
    ///
    /// Headers and URI are moved out of the parts to avoid copies; `apply`
    /// returns them.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let uri = mem::take(&mut parts.uri).into_parts();
        let paq = uri
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Ok(SigningContext {
            method: parts.method.clone(),
            scheme: uri.scheme.unwrap_or(Scheme::HTTPS),
            authority: uri
                .authority
                .ok_or_else(|| Error::validation("request without authority cannot be signed"))?,
            path: paq.path().to_string(),
            query: paq
                .query()
                .map(|v| {
                    form_urlencoded::parse(v.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                })
                .unwrap_or_default(),

            headers: mem::take(&mut parts.headers),
        })
    }

    /// Apply the signing context back to http::request::Parts.
    pub fn apply(mut self, parts: &mut http::request::Parts) -> Result<()> {
        let query_size = self
            .query
            .iter()
            .map(|(k, v)| k.len() + v.len() + 2)
            .sum::<usize>();

        mem::swap(&mut parts.headers, &mut self.headers);
        parts.method = self.method;
        parts.uri = {
            let mut uri_parts = mem::take(&mut parts.uri).into_parts();
            uri_parts.scheme = Some(self.scheme);
            uri_parts.authority = Some(self.authority);
            uri_parts.path_and_query = {
                let paq = if query_size == 0 {
                    self.path
                } else {
                    let mut s = self.path;
                    s.reserve(query_size + 1);

                    s.push('?');
                    for (i, (k, v)) in self.query.iter().enumerate() {
                        if i > 0 {
                            s.push('&');
                        }

                        s.push_str(k);
                        if !v.is_empty() {
                            s.push('=');
                            s.push_str(v);
                        }
                    }

                    s
                };

                Some(PathAndQuery::from_str(&paq)?)
            };
            Uri::from_parts(uri_parts)?
        };

        Ok(())
    }

    /// Push a new query pair into the query list.
    #[inline]
    pub fn query_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// Get header names, lower-cased and sorted.
    pub fn header_names_sorted(&self) -> Vec<&str> {
        let mut names = self
            .headers
            .keys()
            .map(|k| k.as_str())
            .collect::<Vec<&str>>();
        names.sort_unstable();

        names
    }

    /// Canonical value of one header: every value trimmed with internal runs
    /// of spaces collapsed, multiple values joined by a comma.
    pub fn header_value_canonical(&self, name: &str) -> String {
        self.headers
            .get_all(name)
            .iter()
            .map(|v| Self::header_value_collapse(v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Normalize one header value in place: trim leading/trailing spaces.
    pub fn header_value_normalize(v: &mut HeaderValue) {
        let bs = v.as_bytes();

        let starting_index = bs.iter().position(|b| *b != b' ').unwrap_or(0);
        let ending_offset = bs.iter().rev().position(|b| *b != b' ').unwrap_or(0);
        let ending_index = bs.len() - ending_offset;

        // This can't fail because we started with a valid HeaderValue and then only trimmed spaces
        *v = HeaderValue::from_bytes(&bs[starting_index..ending_index])
            .expect("invalid header value")
    }

    /// Trim a header value and collapse internal runs of spaces to one.
    fn header_value_collapse(v: &HeaderValue) -> String {
        let s = String::from_utf8_lossy(v.as_bytes());
        let mut out = String::with_capacity(s.len());
        let mut last_space = false;
        for c in s.trim().chars() {
            if c == ' ' {
                if !last_space {
                    out.push(c);
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out
    }

    /// Remove a header by name, if present.
    pub fn header_remove(&mut self, name: &HeaderName) {
        self.headers.remove(name);
    }
}
