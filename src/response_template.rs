use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use serde::Serialize;
use std::convert::TryInto;
use std::time::Duration;

/// A canned response served by a [`MockServer`] when a [`Mock`] matches on an incoming request.
///
/// The same type describes the diagnostic responses produced by the [`Dispatcher`] when no
/// mock (or more than one) matched: every entry in the [`HistoryStore`] pairs a request with
/// the `ResponseTemplate` that was actually sent back.
///
/// [`Mock`]: crate::Mock
/// [`MockServer`]: crate::MockServer
/// [`Dispatcher`]: crate::Dispatcher
/// [`HistoryStore`]: crate::HistoryStore
#[derive(Clone, Debug)]
pub struct ResponseTemplate {
    mime: String,
    status_code: StatusCode,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    delay: Option<Duration>,
}

// Mocks are set up by test code - a failed conversion is a mistake in the test, not a
// runtime condition. We panic with a descriptive message rather than returning `Result`s.
impl ResponseTemplate {
    /// Start building a `ResponseTemplate` specifying the status code of the response.
    pub fn new<S>(s: S) -> Self
    where
        S: TryInto<StatusCode>,
        <S as TryInto<StatusCode>>::Error: std::fmt::Debug,
    {
        let status_code = s.try_into().expect("Failed to convert into status code.");
        Self {
            status_code,
            headers: HeaderMap::new(),
            mime: String::new(),
            body: None,
            delay: None,
        }
    }

    /// Append a header `value` to list of headers with `key` as header name.
    ///
    /// Unlike `insert_header`, this function will not override the contents of a header.
    pub fn append_header<K, V>(mut self, key: K, value: V) -> Self
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

    /// Insert a header `value` with `key` as header name, dropping any previous value.
    ///
    /// ### Example:
    /// ```rust
    /// use httpstub::{MockServer, Mock, ResponseTemplate};
    /// use httpstub::matchers::method;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let mock_server = MockServer::start().await;
    ///     let correlation_id = "1311db4f-fe65-4cb2-b514-1bb47f781aa7";
    ///     let template = ResponseTemplate::new(200).insert_header(
    ///         "X-Correlation-ID",
    ///         correlation_id
    ///     );
    ///     Mock::given(method("GET"))
    ///         .respond_with(template)
    ///         .mount(&mock_server);
    ///
    ///     // Act
    ///     let res = reqwest::get(&mock_server.uri())
    ///         .await
    ///         .unwrap();
    ///
    ///     // Assert
    ///     assert_eq!(res.headers().get("X-Correlation-ID").unwrap().to_str().unwrap(), correlation_id);
    /// }
    /// ```
    pub fn insert_header<K, V>(mut self, key: K, value: V) -> Self
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
        self.headers.insert(key, value);
        self
    }

    /// Set the response body with bytes.
    ///
    /// To set a body with bytes and a "Content-Type" use
    /// [`set_body_raw`](#method.set_body_raw).
    pub fn set_body_bytes<B>(mut self, body: B) -> Self
    where
        B: TryInto<Vec<u8>>,
        <B as TryInto<Vec<u8>>>::Error: std::fmt::Debug,
    {
        let body = body.try_into().expect("Failed to convert into body.");
        self.body = Some(body);
        self
    }

    /// Set the response body from a JSON-serializable value.
    ///
    /// It sets "Content-Type" to "application/json".
    pub fn set_body_json<B: Serialize>(mut self, body: B) -> Self {
        let body = serde_json::to_vec(&body).expect("Failed to convert into body.");

        self.body = Some(body);
        self.mime = "application/json".to_string();
        self
    }

    /// Set the response body to a string.
    ///
    /// It sets "Content-Type" to "text/plain".
    pub fn set_body_string<T>(mut self, body: T) -> Self
    where
        T: TryInto<String>,
        <T as TryInto<String>>::Error: std::fmt::Debug,
    {
        let body = body.try_into().expect("Failed to convert into body.");

        self.body = Some(body.into_bytes());
        self.mime = "text/plain".to_string();
        self
    }

    /// Set a raw response body. The mime type needs to be set because the
    /// raw body could be of any type.
    pub fn set_body_raw<B>(mut self, body: B, mime: &str) -> Self
    where
        B: TryInto<Vec<u8>>,
        <B as TryInto<Vec<u8>>>::Error: std::fmt::Debug,
    {
        let body = body.try_into().expect("Failed to convert into body.");
        self.body = Some(body);
        self.mime = mime.to_string();
        self
    }

    /// By default the [`MockServer`] tries to fulfill incoming requests as fast as possible.
    ///
    /// You can use `set_delay` to introduce an artificial delay to simulate the behaviour of
    /// a real server with a non-negligible latency.
    ///
    /// The delay is applied by the HTTP listener after the request has been dispatched and
    /// recorded: the history already contains the exchange while the client is still waiting.
    ///
    /// [`MockServer`]: crate::MockServer
    pub fn set_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);

        self
    }

    /// The status code of the response.
    pub fn status(&self) -> StatusCode {
        self.status_code
    }

    /// The headers of the response, "Content-Type" excluded.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The body of the response - empty if no body was set.
    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// The body of the response, lossily decoded as UTF-8.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(self.body()).into_owned()
    }

    /// `true` if a body (even an empty one) has been attached to the response.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Retrieve the response delay.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Generate a response from the template.
    pub(crate) fn generate_response(&self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::from(self.body.clone().unwrap_or_default()));
        *response.status_mut() = self.status_code;

        let mut headers = self.headers.clone();
        if !self.mime.is_empty() {
            match HeaderValue::from_str(&self.mime) {
                Ok(mime) => {
                    headers.insert(http::header::CONTENT_TYPE, mime);
                }
                Err(e) => log::warn!("Ignoring invalid mime type `{}`: {}", self.mime, e),
            }
        }
        *response.headers_mut() = headers;
        response
    }
}
