use crate::sequencer::ResponseSequencer;
use crate::{MockServer, Request, ResponseTemplate};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Anything that implements `Match` can be used to constrain when a [`Mock`] is activated.
///
/// `Match` can be used to extend the set of matchers provided out-of-the-box to cater to your
/// specific testing needs:
/// ```rust
/// use httpstub::{Match, MockServer, Mock, Request, ResponseTemplate};
///
/// // Check that a header with the specified name exists and its value has an odd length.
/// pub struct OddHeaderMatcher(http::HeaderName);
///
/// impl Match for OddHeaderMatcher {
///     fn matches(&self, request: &Request) -> bool {
///         match request.headers.get(&self.0) {
///             // We are ignoring multi-valued headers for simplicity
///             Some(value) => value.as_bytes().len() % 2 == 1,
///             None => false
///         }
///     }
///
///     fn describe(&self) -> String {
///         format!("header `{}` has an odd length", self.0)
///     }
/// }
///
/// #[async_std::main]
/// async fn main() {
///     // Arrange
///     let mock_server = MockServer::start().await;
///
///     Mock::given(OddHeaderMatcher(http::HeaderName::from_static("custom")))
///         .respond_with(ResponseTemplate::new(200))
///         .mount(&mock_server);
///
///     let client = reqwest::Client::new();
///
///     // Even length - not mocked
///     let status = client.get(&mock_server.uri())
///         .header("custom", "even")
///         .send()
///         .await
///         .unwrap()
///         .status();
///     assert_eq!(status.as_u16(), 500);
///
///     // Odd length
///     let status = client.get(&mock_server.uri())
///         .header("custom", "odd")
///         .send()
///         .await
///         .unwrap()
///         .status();
///     assert_eq!(status.as_u16(), 200);
/// }
/// ```
///
/// Anonymous functions that take a reference to a [`Request`] as input and return a boolean
/// as output automatically implement the `Match` trait.
///
/// Matchers are evaluated concurrently, once per registered mock per incoming request: they
/// must be free of side effects.
pub trait Match: Send + Sync {
    /// Given a reference to a `Request`, determine if it should match or not given
    /// a specific criterion.
    fn matches(&self, request: &Request) -> bool;

    /// A human-readable description of the criterion, used in diagnostic responses and
    /// verification failures.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Wrapper around a `Match` trait object.
///
/// We need the wrapper to provide an implementation of `Debug`: Rust's closures do not
/// implement it.
pub(crate) struct Matcher(Box<dyn Match>);

impl Match for Matcher {
    fn matches(&self, request: &Request) -> bool {
        self.0.matches(request)
    }

    fn describe(&self) -> String {
        self.0.describe()
    }
}

impl Debug for Matcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Matcher({})", self.0.describe())
    }
}

/// The identity of a [`Mock`].
///
/// It is assigned when the mock is built and shared by all its clones: registering a clone of a
/// mock that is already registered is a no-op, and any clone can be used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MockId(u64);

impl MockId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for MockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Given a set of matchers, a `Mock` instructs an instance of [`MockServer`] to return a
/// pre-determined sequence of responses if the matching conditions are satisfied.
///
/// `Mock`s have to be mounted (or registered) with a [`MockServer`] to become effective.
///
/// ### Example (using [`register`]):
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
///
///     let mock = Mock::given(method("GET")).respond_with(response.clone());
///     // Registering the mock with the mock server - it's now effective!
///     mock_server.register(mock);
///
///     // We won't register this mock instead.
///     let unregistered_mock = Mock::given(method("POST")).respond_with(response);
///
///     // Act
///     let status = reqwest::get(&mock_server.uri())
///         .await
///         .unwrap()
///         .status();
///     assert_eq!(status.as_u16(), 200);
///
///     // This would have matched `unregistered_mock`, but we haven't registered it!
///     // Hence it returns a 500, the response used when no mock matched on the mock server.
///     let status = reqwest::Client::new()
///         .post(&mock_server.uri())
///         .send()
///         .await
///         .unwrap()
///         .status();
///     assert_eq!(status.as_u16(), 500);
/// }
/// ```
///
/// ### Example (a sequence of responses):
///
/// Each matching request receives the next response in line; once the sequence has been
/// exhausted the last response is replayed indefinitely.
/// ```rust
/// use httpstub::{MockServer, Mock, ResponseTemplate};
/// use httpstub::matchers::path_ends_with;
///
/// #[async_std::main]
/// async fn main() {
///     let mock_server = MockServer::start().await;
///
///     Mock::given(path_ends_with("token"))
///         .respond_with(ResponseTemplate::new(401))
///         .then_respond_with(ResponseTemplate::new(200))
///         .mount(&mock_server);
///
///     let url = format!("{}/token", mock_server.uri());
///     assert_eq!(reqwest::get(&url).await.unwrap().status().as_u16(), 401);
///     assert_eq!(reqwest::get(&url).await.unwrap().status().as_u16(), 200);
///     assert_eq!(reqwest::get(&url).await.unwrap().status().as_u16(), 200);
/// }
/// ```
///
/// `Mock` is cheap to clone: clones share the same identity and the same response sequence.
///
/// [`register`]: MockServer::register
#[derive(Debug, Clone)]
pub struct Mock {
    inner: Arc<MockInner>,
}

#[derive(Debug)]
struct MockInner {
    id: MockId,
    name: Option<String>,
    matchers: Vec<Matcher>,
    sequencer: ResponseSequencer,
}

/// A fluent builder to construct a [`Mock`] instance given matchers and one or more
/// [`ResponseTemplate`]s.
#[derive(Debug)]
pub struct MockBuilder {
    pub(crate) matchers: Vec<Matcher>,
    name: Option<String>,
}

impl Mock {
    /// Start building a `Mock` specifying the first matcher.
    ///
    /// It returns an instance of [`MockBuilder`].
    pub fn given<M: 'static + Match>(matcher: M) -> MockBuilder {
        MockBuilder {
            matchers: vec![Matcher(Box::new(matcher))],
            name: None,
        }
    }

    pub fn id(&self) -> MockId {
        self.inner.id
    }

    /// Append a response to the sequence served by this mock.
    ///
    /// It returns the same mock (sharing identity and sequence), so it can be chained after
    /// [`MockBuilder::respond_with`].
    pub fn then_respond_with(self, template: ResponseTemplate) -> Mock {
        self.add_responses(std::iter::once(template));
        self
    }

    /// Append responses to the sequence served by this mock.
    ///
    /// It can be called while the mock is registered: the new responses are queued after the
    /// existing ones.
    pub fn add_responses<I>(&self, templates: I)
    where
        I: IntoIterator<Item = ResponseTemplate>,
    {
        self.inner.sequencer.add_responses(templates);
    }

    /// Number of responses configured for this mock.
    pub fn n_responses(&self) -> usize {
        self.inner.sequencer.len()
    }

    /// Mount a `Mock` on an instance of [`MockServer`].
    ///
    /// Be careful! `Mock`s are not effective until they are [`mount`]ed or [`register`]ed on
    /// a [`MockServer`].
    ///
    /// It returns `false` if the mock was not added - it has no responses or it is already
    /// registered.
    ///
    /// [`mount`]: Mock::mount
    /// [`register`]: MockServer::register
    pub fn mount(self, server: &MockServer) -> bool {
        server.register(self)
    }

    /// The description used in diagnostics: the mock name, if one was given, or the
    /// descriptions of all its matchers joined by `AND`.
    pub fn description(&self) -> String {
        let matchers = self
            .inner
            .matchers
            .iter()
            .map(|m| m.describe())
            .collect::<Vec<_>>()
            .join(" AND ");
        match &self.inner.name {
            Some(name) => format!("Mock {} `{}`: {}", self.inner.id, name, matchers),
            None => format!("Mock {}: {}", self.inner.id, matchers),
        }
    }

    pub(crate) fn matches(&self, request: &Request) -> bool {
        self.inner.matchers.iter().all(|m| m.matches(request))
    }

    pub(crate) fn sequencer(&self) -> &ResponseSequencer {
        &self.inner.sequencer
    }
}

impl MockBuilder {
    /// Add another request matcher to the mock you are building.
    ///
    /// **All** specified [`matchers`] must match for the overall [`Mock`] to match an incoming request.
    ///
    /// [`matchers`]: crate::matchers
    pub fn and<M: Match + 'static>(mut self, matcher: M) -> Self {
        self.matchers.push(Matcher(Box::new(matcher)));
        self
    }

    /// Assign a name to your mock.
    ///
    /// The mock name will be used in diagnostic responses and verification failures to help
    /// identify which mock is involved.
    pub fn named<T: Into<String>>(mut self, mock_name: T) -> Self {
        self.name = Some(mock_name.into());
        self
    }

    /// Establish what [`ResponseTemplate`] should be used to generate a response when an incoming
    /// request matches.
    ///
    /// `respond_with` finalises the `MockBuilder` and returns you a [`Mock`] instance, ready to
    /// be [`register`]ed or [`mount`]ed on a [`MockServer`]!
    ///
    /// [`register`]: MockServer::register
    /// [`mount`]: Mock::mount
    pub fn respond_with(self, template: ResponseTemplate) -> Mock {
        self.respond_with_sequence(std::iter::once(template))
    }

    /// Finalise the `MockBuilder` with a whole sequence of responses, served in order.
    ///
    /// A mock built with an empty sequence is never registered.
    pub fn respond_with_sequence<I>(self, templates: I) -> Mock
    where
        I: IntoIterator<Item = ResponseTemplate>,
    {
        Mock {
            inner: Arc::new(MockInner {
                id: MockId::next(),
                name: self.name,
                matchers: self.matchers,
                sequencer: ResponseSequencer::new(templates),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{method, path_ends_with};

    #[test]
    fn all_matchers_must_match() {
        let mock = Mock::given(method("GET"))
            .and(path_ends_with("sample"))
            .respond_with(ResponseTemplate::new(200));

        assert!(mock.matches(&Request::new("GET", "/sample")));
        assert!(!mock.matches(&Request::new("POST", "/sample")));
        assert!(!mock.matches(&Request::new("GET", "/other")));
    }

    #[test]
    fn clones_share_identity_and_sequence() {
        let mock = Mock::given(method("GET")).respond_with(ResponseTemplate::new(200));
        let clone = mock.clone().then_respond_with(ResponseTemplate::new(204));

        assert_eq!(mock.id(), clone.id());
        assert_eq!(mock.n_responses(), 2);
    }

    #[test]
    fn every_mock_gets_a_fresh_identity() {
        let first = Mock::given(method("GET")).respond_with(ResponseTemplate::new(200));
        let second = Mock::given(method("GET")).respond_with(ResponseTemplate::new(200));

        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn description_lists_name_and_matchers() {
        let mock = Mock::given(method("GET"))
            .and(path_ends_with("sample"))
            .named("sample endpoint")
            .respond_with(ResponseTemplate::new(200));

        let description = mock.description();

        assert!(description.contains("`sample endpoint`"));
        assert!(description.ends_with("method == GET AND path ends with `sample`"));
    }
}
