use std::convert::TryInto;
use std::fmt;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use url::Url;

pub const BODY_PRINT_LIMIT: usize = 10_000;

/// Specifies limitations on printing request bodies in diagnostics and verification failures.
/// For some mock servers the bodies may be too large to reasonably print and it may be
/// desirable to limit them.
#[derive(Debug, Copy, Clone)]
pub enum BodyPrintLimit {
    /// Maximum length of a body to print in bytes.
    Limited(usize),
    /// There is no limit to the size of a body that may be printed.
    Unlimited,
}

impl Default for BodyPrintLimit {
    fn default() -> Self {
        BodyPrintLimit::Limited(BODY_PRINT_LIMIT)
    }
}

/// An incoming request to an instance of [`MockServer`].
///
/// Each matcher gets an immutable reference to a `Request` instance in the [`matches`] method
/// defined in the [`Match`] trait. The same snapshot is stored, untouched, in the
/// [`HistoryStore`] once the request has been dispatched.
///
/// All fields are public: a `Request` can be assembled by hand to drive a [`Dispatcher`]
/// directly, without going through the HTTP listener.
///
/// [`MockServer`]: crate::MockServer
/// [`matches`]: crate::Match::matches
/// [`Match`]: crate::Match
/// [`HistoryStore`]: crate::HistoryStore
/// [`Dispatcher`]: crate::Dispatcher
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Request {
    /// Build a request with no headers and an empty body.
    ///
    /// Relative paths (e.g. `/users/1`) are resolved against `http://localhost`.
    pub fn new<M>(method: M, url: &str) -> Self
    where
        M: AsRef<str>,
    {
        let method = Method::from_bytes(method.as_ref().to_ascii_uppercase().as_bytes())
            .expect("Failed to convert to HTTP method.");
        let url = Url::parse(url)
            .or_else(|_| Url::parse("http://localhost").and_then(|base| base.join(url)))
            .expect("Failed to parse request url.");
        Self {
            url,
            method,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Replace the body of the request.
    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Append a header to the request.
    pub fn with_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert into header name.");
        let value = value
            .try_into()
            .expect("Failed to convert into header value.");
        self.headers.append(key, value);
        self
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// A single-line description, `METHOD url`, used as a prefix in diagnostic responses.
    pub fn summary(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    pub(crate) async fn from_hyper(
        request: hyper::Request<hyper::body::Incoming>,
    ) -> Result<Request, hyper::Error> {
        let (parts, body) = request.into_parts();
        let raw_url = match parts.uri.authority() {
            Some(_) => parts.uri.to_string(),
            None => format!("http://localhost{}", parts.uri),
        };
        // The uri was already validated by hyper, so this only fails on exotic authorities.
        let url = raw_url.parse().unwrap_or_else(|e| {
            log::warn!("Could not parse request url `{}`: {}", raw_url, e);
            Url::parse("http://localhost/").expect("A static url is always valid")
        });

        let body = body.collect().await?.to_bytes();

        Ok(Self {
            url,
            method: parts.method,
            headers: parts.headers,
            body: body.to_vec(),
        })
    }

    pub(crate) fn print_with_limit(
        &self,
        mut buffer: impl fmt::Write,
        body_print_limit: BodyPrintLimit,
    ) -> fmt::Result {
        writeln!(buffer, "{} {}", self.method, self.url)?;
        for name in self.headers.keys() {
            let values = self
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>();
            let values = values.join(",");
            writeln!(buffer, "{}: {}", name, values)?;
        }

        match body_print_limit {
            BodyPrintLimit::Limited(limit) if self.body.len() > limit => {
                // Walk forward at most three bytes to land on a char boundary.
                let truncated = (limit..=(limit + 3).min(self.body.len()))
                    .find_map(|end_byte| std::str::from_utf8(&self.body[..end_byte]).ok());
                match truncated {
                    Some(truncated) => {
                        writeln!(buffer, "{}", truncated)?;
                        writeln!(
                            buffer,
                            "We truncated the body because it was too large: {} bytes (limit: {} bytes)",
                            self.body.len(),
                            limit
                        )?;
                        writeln!(
                            buffer,
                            "Increase this limit by setting `HTTPSTUB_BODY_PRINT_LIMIT`, or calling `MockServerBuilder::body_print_limit` when building your MockServer instance"
                        )
                    }
                    None => writeln!(
                        buffer,
                        "Body is likely binary (invalid utf-8) size is {} bytes",
                        self.body.len()
                    ),
                }
            }
            _ => {
                if let Ok(body) = std::str::from_utf8(&self.body) {
                    writeln!(buffer, "{}", body)
                } else {
                    writeln!(
                        buffer,
                        "Body is likely binary (invalid utf-8) size is {} bytes",
                        self.body.len()
                    )
                }
            }
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print_with_limit(f, BodyPrintLimit::default())
    }
}
