//! A collection of different matching strategies provided out-of-the-box by `httpstub`.
//!
//! If the set of matchers provided out-of-the-box is not enough for your specific testing needs
//! you can implement your own thanks to the [`Match`] trait.
//!
//! Furthermore, `Fn` closures that take an immutable [`Request`] reference as input and return a boolean
//! as input automatically implement [`Match`] and can be used where a matcher is expected.
//!
//! Every matcher in this module overrides [`Match::describe`]: the description shows up in the
//! body of the diagnostic responses returned when a request is not mocked (or mocked twice) and
//! in verification failures.
use crate::{Match, Request};
use assert_json_diff::{assert_json_matches_no_panic, CompareMode};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use http::{HeaderName, HeaderValue, Method};
use log::debug;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::convert::TryInto;
use std::str::{self, FromStr};

/// Implement the `Match` trait for all closures, out of the box,
/// if their signature is compatible.
impl<F> Match for F
where
    F: Fn(&Request) -> bool,
    F: Send + Sync,
{
    fn matches(&self, request: &Request) -> bool {
        // Just call the closure itself!
        self(request)
    }

    fn describe(&self) -> String {
        "custom closure matcher".to_string()
    }
}

#[derive(Debug)]
/// Match **exactly** the method of a request.
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
///
///     let response = ResponseTemplate::new(200);
///     let mock = Mock::given(method("GET")).respond_with(response);
///
///     mock_server.register(mock);
///
///     // Act
///     let status = reqwest::get(&mock_server.uri())
///         .await
///         .unwrap()
///         .status();
///
///     // Assert
///     assert_eq!(status, 200);
/// }
/// ```
pub struct MethodExactMatcher(Method);

/// Shorthand for [`MethodExactMatcher::new`].
pub fn method<T>(method: T) -> MethodExactMatcher
where
    T: AsRef<str>,
{
    MethodExactMatcher::new(method)
}

impl MethodExactMatcher {
    pub fn new<T>(method: T) -> Self
    where
        T: AsRef<str>,
    {
        let method = Method::from_str(&method.as_ref().to_ascii_uppercase())
            .expect("Failed to convert to HTTP method.");
        Self(method)
    }
}

impl From<Method> for MethodExactMatcher {
    fn from(method: Method) -> Self {
        Self(method)
    }
}

impl Match for MethodExactMatcher {
    fn matches(&self, request: &Request) -> bool {
        request.method == self.0
    }

    fn describe(&self) -> String {
        format!("method == {}", self.0)
    }
}

#[derive(Debug)]
/// Match all incoming requests, regardless of their method, path, headers or body.
///
/// You can use it to verify that a request has been fired towards the server, without making
/// any other assertion about it.
pub struct AnyMatcher;

/// Shorthand for [`AnyMatcher`].
pub fn any() -> AnyMatcher {
    AnyMatcher
}

impl Match for AnyMatcher {
    fn matches(&self, _request: &Request) -> bool {
        true
    }

    fn describe(&self) -> String {
        "any request".to_string()
    }
}

#[derive(Debug)]
/// Match **exactly** the path of a request.
///
/// The path matcher ignores query parameters: use [`query_param`] for those.
///
/// ### Example:
/// ```rust
/// use httpstub::{MockServer, Mock, ResponseTemplate};
/// use httpstub::matchers::path;
///
/// #[async_std::main]
/// async fn main() {
///     // Arrange
///     let mock_server = MockServer::start().await;
///
///     let response = ResponseTemplate::new(200).set_body_string("world");
///     Mock::given(path("/hello")).respond_with(response).mount(&mock_server);
///
///     // Act
///     let status = reqwest::get(format!("{}/hello?a_parameter=some_value", &mock_server.uri()))
///         .await
///         .unwrap()
///         .status();
///
///     // Assert
///     assert_eq!(status, 200);
/// }
/// ```
pub struct PathExactMatcher(String);

/// Shorthand for [`PathExactMatcher::new`].
pub fn path<T>(path: T) -> PathExactMatcher
where
    T: Into<String>,
{
    PathExactMatcher::new(path)
}

impl PathExactMatcher {
    pub fn new<T: Into<String>>(path: T) -> Self {
        let path = path.into();

        if path.contains('?') {
            panic!(
                "httpstub can't match the path `{}` because it contains a `?`. You must use `httpstub::matchers::query_param` to match on query parameters (the part of the path after the `?`).",
                path
            );
        }

        // Prepend "/" to the path if missing.
        if path.starts_with('/') {
            Self(path)
        } else {
            Self(format!("/{}", path))
        }
    }
}

impl Match for PathExactMatcher {
    fn matches(&self, request: &Request) -> bool {
        request.url.path() == self.0
    }

    fn describe(&self) -> String {
        format!("path == {}", self.0)
    }
}

#[derive(Debug)]
/// Match the end of the path of a request, e.g. `path_ends_with("sample")` matches both
/// `/sample` and `/api/v1/sample` - but also `/resample`.
pub struct PathSuffixMatcher(String);

/// Shorthand for [`PathSuffixMatcher`].
pub fn path_ends_with<T: Into<String>>(suffix: T) -> PathSuffixMatcher {
    PathSuffixMatcher(suffix.into())
}

impl Match for PathSuffixMatcher {
    fn matches(&self, request: &Request) -> bool {
        request.url.path().ends_with(&self.0)
    }

    fn describe(&self) -> String {
        format!("path ends with `{}`", self.0)
    }
}

#[derive(Debug)]
/// Match the beginning of the path of a request.
pub struct PathPrefixMatcher(String);

/// Shorthand for [`PathPrefixMatcher`]. A leading `/` is added if missing.
pub fn path_starts_with<T: Into<String>>(prefix: T) -> PathPrefixMatcher {
    let prefix = prefix.into();
    if prefix.starts_with('/') {
        PathPrefixMatcher(prefix)
    } else {
        PathPrefixMatcher(format!("/{}", prefix))
    }
}

impl Match for PathPrefixMatcher {
    fn matches(&self, request: &Request) -> bool {
        request.url.path().starts_with(&self.0)
    }

    fn describe(&self) -> String {
        format!("path starts with `{}`", self.0)
    }
}

#[derive(Debug)]
pub struct PathContainsMatcher(String);

/// Match requests whose path contains the given fragment.
pub fn path_contains<T: Into<String>>(fragment: T) -> PathContainsMatcher {
    PathContainsMatcher(fragment.into())
}

impl Match for PathContainsMatcher {
    fn matches(&self, request: &Request) -> bool {
        request.url.path().contains(&self.0)
    }

    fn describe(&self) -> String {
        format!("path contains `{}`", self.0)
    }
}

#[derive(Debug)]
/// Match the path of a request against a regular expression.
///
/// ### Example:
/// ```rust
/// use httpstub::{MockServer, Mock, ResponseTemplate};
/// use httpstub::matchers::path_regex;
///
/// #[async_std::main]
/// async fn main() {
///     // Arrange
///     let mock_server = MockServer::start().await;
///
///     let response = ResponseTemplate::new(200).set_body_string("world");
///     let mock = Mock::given(path_regex(r"^/hello/\d{3}$")).respond_with(response);
///
///     mock_server.register(mock);
///
///     // Act
///     let status = reqwest::get(format!("{}/hello/123", &mock_server.uri()))
///         .await
///         .unwrap()
///         .status();
///
///     // Assert
///     assert_eq!(status, 200);
/// }
/// ```
pub struct PathRegexMatcher(Regex);

/// Shorthand for [`PathRegexMatcher::new`].
pub fn path_regex<T>(path: T) -> PathRegexMatcher
where
    T: Into<String>,
{
    PathRegexMatcher::new(path)
}

impl PathRegexMatcher {
    pub fn new<T: Into<String>>(path: T) -> Self {
        let path = path.into();

        Self(Regex::new(&path).expect("Failed to create regex for path matcher"))
    }
}

impl Match for PathRegexMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.0.is_match(request.url.path())
    }

    fn describe(&self) -> String {
        format!("path matches /{}/", self.0)
    }
}

#[derive(Debug)]
/// Match **exactly** the header of a request.
///
/// Comma-separated header values are split and compared, in order, against the expected
/// values.
///
/// ### Example:
/// ```rust
/// use httpstub::{MockServer, Mock, ResponseTemplate};
/// use httpstub::matchers::{header, headers};
///
/// #[async_std::main]
/// async fn main() {
///     // Arrange
///     let mock_server = MockServer::start().await;
///
///     Mock::given(header("custom", "header"))
///         .and(headers("cache-control", vec!["no-cache", "no-store"]))
///         .respond_with(ResponseTemplate::new(200))
///         .mount(&mock_server);
///
///     // Act
///     let client = reqwest::Client::new();
///     let status = client
///         .get(&mock_server.uri())
///         .header("custom", "header")
///         .header("cache-control", "no-cache, no-store")
///         .send()
///         .await
///         .unwrap()
///         .status();
///
///     // Assert
///     assert_eq!(status, 200);
/// }
/// ```
pub struct HeaderExactMatcher(HeaderName, Vec<HeaderValue>);

/// Shorthand for [`HeaderExactMatcher::new`].
pub fn header<K, V>(key: K, value: V) -> HeaderExactMatcher
where
    K: TryInto<HeaderName>,
    <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
    V: TryInto<HeaderValue>,
    <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
{
    HeaderExactMatcher::new(key, vec![value])
}

/// Shorthand for [`HeaderExactMatcher::new`] supporting multi valued headers.
pub fn headers<K, V>(key: K, values: Vec<V>) -> HeaderExactMatcher
where
    K: TryInto<HeaderName>,
    <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
    V: TryInto<HeaderValue>,
    <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
{
    HeaderExactMatcher::new(key, values)
}

impl HeaderExactMatcher {
    pub fn new<K, V>(key: K, values: Vec<V>) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert to header name.");
        let values = values
            .into_iter()
            .map(|value| {
                value
                    .try_into()
                    .expect("Failed to convert to header value.")
            })
            .collect();
        Self(key, values)
    }
}

impl Match for HeaderExactMatcher {
    fn matches(&self, request: &Request) -> bool {
        let values = request
            .headers
            .get_all(&self.0)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter_map(|v| HeaderValue::from_str(v).ok())
            })
            .collect::<Vec<_>>();
        values == self.1 // order matters
    }

    fn describe(&self) -> String {
        let values = self
            .1
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>();
        format!("header `{}` == {:?}", self.0, values)
    }
}

#[derive(Debug)]
/// Match **exactly** the header name of a request. It checks that the
/// header is present but does not validate the value.
pub struct HeaderExistsMatcher(HeaderName);

/// Shorthand for [`HeaderExistsMatcher::new`].
pub fn header_exists<K>(key: K) -> HeaderExistsMatcher
where
    K: TryInto<HeaderName>,
    <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
{
    HeaderExistsMatcher::new(key)
}

impl HeaderExistsMatcher {
    pub fn new<K>(key: K) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert to header name.");
        Self(key)
    }
}

impl Match for HeaderExistsMatcher {
    fn matches(&self, request: &Request) -> bool {
        request.headers.get(&self.0).is_some()
    }

    fn describe(&self) -> String {
        format!("header `{}` is present", self.0)
    }
}

#[derive(Debug)]
/// Match the value of a header using a regular expression.
/// If the header is multi-valued, all values must satisfy the regular expression.
/// If the header is missing, the mock will not match.
pub struct HeaderRegexMatcher(HeaderName, Regex);

/// Shorthand for [`HeaderRegexMatcher::new`].
pub fn header_regex<K>(key: K, value: &str) -> HeaderRegexMatcher
where
    K: TryInto<HeaderName>,
    <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
{
    HeaderRegexMatcher::new(key, value)
}

impl HeaderRegexMatcher {
    pub fn new<K>(key: K, value: &str) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert to header name.");
        let value_matcher = Regex::new(value).expect("Failed to create regex for value matcher");
        Self(key, value_matcher)
    }
}

impl Match for HeaderRegexMatcher {
    fn matches(&self, request: &Request) -> bool {
        let mut it = request
            .headers
            .get_all(&self.0)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .peekable();
        if it.peek().is_some() {
            it.all(|v| self.1.is_match(v))
        } else {
            false
        }
    }

    fn describe(&self) -> String {
        format!("header `{}` matches /{}/", self.0, self.1)
    }
}

#[derive(Debug)]
/// Match **exactly** the body of a request.
///
/// JSON bodies are compared structurally: key order and whitespace do not matter.
pub struct BodyExactMatcher(Body);

#[derive(Debug)]
enum Body {
    Bytes(Vec<u8>),
    Json(Value),
}

impl BodyExactMatcher {
    /// Specify the expected body as a string.
    pub fn string<T: Into<String>>(body: T) -> Self {
        let body = body.into();
        Self(Body::Bytes(body.into_bytes()))
    }

    /// Specify the expected body as a vector of bytes.
    pub fn bytes<T: Into<Vec<u8>>>(body: T) -> Self {
        let body = body.into();
        Self(Body::Bytes(body))
    }

    /// Specify something JSON-serializable as the expected body.
    pub fn json<T: Serialize>(body: T) -> Self {
        let body = serde_json::to_value(body).expect("Failed to serialize JSON body");
        Self(Body::Json(body))
    }
}

/// Shorthand for [`BodyExactMatcher::string`].
pub fn body_string<T>(body: T) -> BodyExactMatcher
where
    T: Into<String>,
{
    BodyExactMatcher::string(body)
}

/// Shorthand for [`BodyExactMatcher::bytes`].
pub fn body_bytes<T>(body: T) -> BodyExactMatcher
where
    T: Into<Vec<u8>>,
{
    BodyExactMatcher::bytes(body)
}

/// Shorthand for [`BodyExactMatcher::json`].
pub fn body_json<T>(body: T) -> BodyExactMatcher
where
    T: Serialize,
{
    BodyExactMatcher::json(body)
}

impl Match for BodyExactMatcher {
    fn matches(&self, request: &Request) -> bool {
        match &self.0 {
            Body::Bytes(bytes) => request.body == *bytes,
            Body::Json(json) => {
                if let Ok(body) = serde_json::from_slice::<Value>(&request.body) {
                    body == *json
                } else {
                    false
                }
            }
        }
    }

    fn describe(&self) -> String {
        match &self.0 {
            Body::Bytes(bytes) => format!("body == {:?}", String::from_utf8_lossy(bytes)),
            Body::Json(json) => format!("body == json {}", json),
        }
    }
}

#[derive(Debug)]
/// Match part of the body of a request.
pub struct BodyContainsMatcher(String);

impl BodyContainsMatcher {
    /// Specify the part of the body that should be matched as a string.
    pub fn string<T: Into<String>>(body: T) -> Self {
        Self(body.into())
    }
}

/// Shorthand for [`BodyContainsMatcher::string`].
pub fn body_string_contains<T>(body: T) -> BodyContainsMatcher
where
    T: Into<String>,
{
    BodyContainsMatcher::string(body)
}

impl Match for BodyContainsMatcher {
    fn matches(&self, request: &Request) -> bool {
        match str::from_utf8(&request.body) {
            Ok(body) => body.contains(&self.0),
            Err(err) => {
                debug!("can't convert body from byte slice to string: {}", err);
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("body contains {:?}", self.0)
    }
}

#[derive(Debug)]
/// Match part JSON body of a request.
///
/// Every field in the expected value must be present, with the same value, in the request
/// body; extra fields in the request body are ignored.
pub struct BodyPartialJsonMatcher(Value);

impl BodyPartialJsonMatcher {
    /// Specify the part of the body that should be matched as a JSON value.
    pub fn json<T: Serialize>(body: T) -> Self {
        Self(serde_json::to_value(body).expect("Can't serialize to JSON"))
    }

    /// Specify the part of the body that should be matched as a string.
    pub fn json_string(body: impl AsRef<str>) -> Self {
        Self(serde_json::from_str(body.as_ref()).expect("Can't deserialize JSON"))
    }
}

/// Shorthand for [`BodyPartialJsonMatcher::json`].
pub fn body_partial_json<T: Serialize>(body: T) -> BodyPartialJsonMatcher {
    BodyPartialJsonMatcher::json(body)
}

/// Shorthand for [`BodyPartialJsonMatcher::json_string`].
pub fn body_partial_json_string(body: impl AsRef<str>) -> BodyPartialJsonMatcher {
    BodyPartialJsonMatcher::json_string(body)
}

impl Match for BodyPartialJsonMatcher {
    fn matches(&self, request: &Request) -> bool {
        if let Ok(body) = serde_json::from_slice::<Value>(&request.body) {
            let config = assert_json_diff::Config::new(CompareMode::Inclusive);
            assert_json_matches_no_panic(&body, &self.0, config).is_ok()
        } else {
            false
        }
    }

    fn describe(&self) -> String {
        format!("body includes json {}", self.0)
    }
}

#[derive(Debug)]
/// Match **exactly** the query parameter of a request.
pub struct QueryParamExactMatcher(String, String);

impl QueryParamExactMatcher {
    /// Specify the expected value for a query parameter.
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self(key.into(), value.into())
    }
}

/// Shorthand for [`QueryParamExactMatcher::new`].
pub fn query_param<K, V>(key: K, value: V) -> QueryParamExactMatcher
where
    K: Into<String>,
    V: Into<String>,
{
    QueryParamExactMatcher::new(key, value)
}

impl Match for QueryParamExactMatcher {
    fn matches(&self, request: &Request) -> bool {
        request
            .url
            .query_pairs()
            .any(|q| q.0 == self.0.as_str() && q.1 == self.1.as_str())
    }

    fn describe(&self) -> String {
        format!("query parameter `{}` == `{}`", self.0, self.1)
    }
}

#[derive(Debug)]
/// Match when a query parameter contains the specified value as a substring.
pub struct QueryParamContainsMatcher(String, String);

impl QueryParamContainsMatcher {
    /// Specify the substring that the query parameter should contain.
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self(key.into(), value.into())
    }
}

/// Shorthand for [`QueryParamContainsMatcher::new`].
pub fn query_param_contains<K, V>(key: K, value: V) -> QueryParamContainsMatcher
where
    K: Into<String>,
    V: Into<String>,
{
    QueryParamContainsMatcher::new(key, value)
}

impl Match for QueryParamContainsMatcher {
    fn matches(&self, request: &Request) -> bool {
        request
            .url
            .query_pairs()
            .any(|q| q.0 == self.0.as_str() && q.1.contains(self.1.as_str()))
    }

    fn describe(&self) -> String {
        format!("query parameter `{}` contains `{}`", self.0, self.1)
    }
}

#[derive(Debug)]
/// Only match requests that do **not** contain a specified query parameter.
pub struct QueryParamIsMissingMatcher(String);

impl QueryParamIsMissingMatcher {
    /// Specify the query parameter that is expected to not exist.
    pub fn new<K: Into<String>>(key: K) -> Self {
        Self(key.into())
    }
}

/// Shorthand for [`QueryParamIsMissingMatcher::new`].
pub fn query_param_is_missing<K>(key: K) -> QueryParamIsMissingMatcher
where
    K: Into<String>,
{
    QueryParamIsMissingMatcher::new(key)
}

impl Match for QueryParamIsMissingMatcher {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(k, _)| k == self.0)
    }

    fn describe(&self) -> String {
        format!("query parameter `{}` is missing", self.0)
    }
}

#[derive(Debug)]
/// Match an incoming request if it contains the basic authentication header with the username and password
/// as per [RFC 7617](https://datatracker.ietf.org/doc/html/rfc7617).
pub struct BasicAuthMatcher(HeaderExactMatcher);

impl BasicAuthMatcher {
    /// Match basic authentication header using the given username and password.
    pub fn from_credentials(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        Self::from_token(BASE64_STANDARD.encode(format!(
            "{}:{}",
            username.as_ref(),
            password.as_ref()
        )))
    }

    /// Match basic authentication header with the exact token given.
    pub fn from_token(token: impl AsRef<str>) -> Self {
        Self(header(
            "Authorization",
            &*format!("Basic {}", token.as_ref()),
        ))
    }
}

/// Shorthand for [`BasicAuthMatcher::from_credentials`].
pub fn basic_auth<U, P>(username: U, password: P) -> BasicAuthMatcher
where
    U: AsRef<str>,
    P: AsRef<str>,
{
    BasicAuthMatcher::from_credentials(username, password)
}

impl Match for BasicAuthMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.0.matches(request)
    }

    fn describe(&self) -> String {
        "basic authentication".to_string()
    }
}

#[derive(Debug)]
/// Match an incoming request if it contains the bearer token header
/// as per [RFC 6750](https://datatracker.ietf.org/doc/html/rfc6750).
pub struct BearerTokenMatcher(HeaderExactMatcher);

impl BearerTokenMatcher {
    pub fn from_token(token: impl AsRef<str>) -> Self {
        Self(header(
            "Authorization",
            &*format!("Bearer {}", token.as_ref()),
        ))
    }
}

impl Match for BearerTokenMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.0.matches(request)
    }

    fn describe(&self) -> String {
        "bearer token authentication".to_string()
    }
}

/// Shorthand for [`BearerTokenMatcher::from_token`].
pub fn bearer_token<T>(token: T) -> BearerTokenMatcher
where
    T: AsRef<str>,
{
    BearerTokenMatcher::from_token(token)
}
