use crate::mock_server::bare_server::BareMockServer;
use crate::mock_server::pool::{get_pooled_mock_server, PooledMockServer};
use crate::mock_server::MockServerBuilder;
use crate::verification::RequestVerifier;
use crate::{HistoryStore, Match, Mock, Request};
use deadpool::managed::Object;
use http::Method;
use std::net::SocketAddr;
use std::ops::Deref;

/// An HTTP web-server running in the background to behave as one of your dependencies using
/// [`Mock`]s for testing purposes.
///
/// Each instance of `MockServer` is fully isolated: [`MockServer::start`] takes care of finding
/// a random port available on your local machine which is assigned to the new `MockServer`.
///
/// You can use [`MockServer::builder`] if you need to specify custom configuration - e.g.
/// run on a specific port or change how much of a request body is printed in diagnostics.
///
/// ## Best practices
///
/// You should use one instance of `MockServer` for each REST API that your application
/// interacts with and needs mocking for testing purposes.
///
/// The request history grows for as long as the server lives: long-running suites sharing a
/// server should call [`reset_history`] between scenarios.
///
/// [`reset_history`]: MockServer::reset_history
pub struct MockServer(InnerServer);

/// `MockServer` is either a wrapper around a `BareMockServer` retrieved from an
/// object pool or a wrapper around an exclusive `BareMockServer`.
/// We use the pool when the user does not care about the port the mock server listens to,
/// while we provision a dedicated one if they go through the [`MockServerBuilder`].
///
/// `InnerServer` implements `Deref<Target=BareMockServer>`, so we never actually have to match
/// on `InnerServer` in `MockServer` - the compiler does all the boring heavy-lifting for us.
pub(super) enum InnerServer {
    Bare(BareMockServer),
    Pooled(PooledMockServer),
}

impl Deref for InnerServer {
    type Target = BareMockServer;

    fn deref(&self) -> &Self::Target {
        match self {
            InnerServer::Bare(b) => b,
            InnerServer::Pooled(p) => p.deref(),
        }
    }
}

impl MockServer {
    pub(super) fn new(server: InnerServer) -> Self {
        Self(server)
    }

    /// You can use `MockServer::builder` if you need to specify custom configuration - e.g.
    /// run on a specific port.
    ///
    /// If this is not your case, use [`MockServer::start`].
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    /// Start a new instance of a `MockServer` listening on a random port.
    ///
    /// ### Example:
    /// ```rust
    /// use httpstub::{MockServer, Mock, ResponseTemplate};
    /// use httpstub::matchers::method;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let mock_server_one = MockServer::start().await;
    ///     let mock_server_two = MockServer::start().await;
    ///
    ///     assert!(mock_server_one.address() != mock_server_two.address());
    ///
    ///     let mock = Mock::given(method("GET")).respond_with(ResponseTemplate::new(200));
    ///     // Registering the mock with the first mock server - it's now effective!
    ///     // But it *won't* be used by the second mock server!
    ///     mock_server_one.register(mock);
    ///
    ///     // Act
    ///     let status = reqwest::get(&mock_server_one.uri())
    ///         .await
    ///         .unwrap()
    ///         .status();
    ///     assert_eq!(status, 200);
    ///
    ///     // Nothing is registered on `mock_server_two`: it answers with a diagnostic 500.
    ///     let status = reqwest::get(&mock_server_two.uri())
    ///         .await
    ///         .unwrap()
    ///         .status();
    ///     assert_eq!(status, 500);
    /// }
    /// ```
    pub async fn start() -> Self {
        Self(InnerServer::Pooled(get_pooled_mock_server().await))
    }

    /// Register a `Mock` on an instance of `MockServer`.
    ///
    /// Be careful! `Mock`s are not effective until they are `mount`ed or `register`ed on a
    /// `MockServer`.
    ///
    /// It returns `false` if the mock was ignored: it has no responses or it is already
    /// registered.
    pub fn register(&self, mock: Mock) -> bool {
        self.0.dispatcher().register(mock)
    }

    /// Stop serving a previously registered `Mock`. Returns `false` if it was not registered.
    ///
    /// ### Example
    ///
    /// ```rust
    /// use httpstub::{MockServer, Mock, ResponseTemplate};
    /// use httpstub::matchers::method;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     let mock_server = MockServer::start().await;
    ///     let mock = Mock::given(method("GET")).respond_with(ResponseTemplate::new(200));
    ///     mock_server.register(mock.clone());
    ///
    ///     assert!(mock_server.remove(&mock));
    ///
    ///     let status = reqwest::get(&mock_server.uri()).await.unwrap().status();
    ///     assert_eq!(status, 500);
    /// }
    /// ```
    pub fn remove(&self, mock: &Mock) -> bool {
        self.0.dispatcher().remove(mock)
    }

    /// Drop all registered [`Mock`]s. Recorded requests are kept.
    pub fn clear_rules(&self) {
        self.0.dispatcher().clear_rules();
    }

    /// Same as [`clear_rules`](MockServer::clear_rules).
    pub fn reset_rules(&self) {
        self.clear_rules();
    }

    /// Forget all recorded requests. Registered [`Mock`]s stay active.
    ///
    /// ### Example
    ///
    /// ```rust
    /// use httpstub::{MockServer, Mock, ResponseTemplate};
    /// use httpstub::matchers::method;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     let mock_server = MockServer::start().await;
    ///     Mock::given(method("GET"))
    ///         .respond_with(ResponseTemplate::new(200))
    ///         .mount(&mock_server);
    ///
    ///     reqwest::get(&mock_server.uri()).await.unwrap();
    ///     mock_server.reset_history();
    ///     assert!(mock_server.received_requests().is_empty());
    ///
    ///     // The mock is still there.
    ///     let status = reqwest::get(&mock_server.uri()).await.unwrap().status();
    ///     assert_eq!(status, 200);
    /// }
    /// ```
    pub fn reset_history(&self) {
        self.0.dispatcher().clear_history();
    }

    /// Drop all registered [`Mock`]s and forget all recorded requests.
    ///
    /// ### Example
    ///
    /// ```rust
    /// use httpstub::{MockServer, Mock, ResponseTemplate};
    /// use httpstub::matchers::method;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let mock_server = MockServer::start().await;
    ///     Mock::given(method("GET"))
    ///         .respond_with(ResponseTemplate::new(200))
    ///         .mount(&mock_server);
    ///
    ///     let status = reqwest::get(&mock_server.uri()).await.unwrap().status();
    ///     assert_eq!(status, 200);
    ///
    ///     // Act
    ///     mock_server.reset();
    ///
    ///     // Assert
    ///     assert!(mock_server.received_requests().is_empty());
    ///     let status = reqwest::get(&mock_server.uri()).await.unwrap().status();
    ///     assert_eq!(status, 500);
    /// }
    /// ```
    pub fn reset(&self) {
        self.0.reset();
    }

    /// The full record of the exchanges served by this `MockServer`.
    pub fn history(&self) -> &HistoryStore {
        self.0.dispatcher().history()
    }

    /// All the requests received by the `MockServer`, in the order they arrived.
    /// If no request has been served, it returns an empty vector.
    ///
    /// ### Example:
    ///
    /// ```rust
    /// use httpstub::MockServer;
    /// use http::Method;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Arrange
    ///     let mock_server = MockServer::start().await;
    ///
    ///     // Act
    ///     reqwest::get(&mock_server.uri()).await.unwrap();
    ///
    ///     // Assert
    ///     let received_requests = mock_server.received_requests();
    ///     assert_eq!(received_requests.len(), 1);
    ///
    ///     let received_request = &received_requests[0];
    ///     assert_eq!(received_request.method, Method::GET);
    ///     assert_eq!(received_request.url.path(), "/");
    ///     assert!(received_request.body.is_empty());
    /// }
    /// ```
    pub fn received_requests(&self) -> Vec<Request> {
        self.history().requests()
    }

    /// Start a verification over the recorded requests satisfying `matcher`.
    /// See [`RequestVerifier`] for the available expectations.
    pub fn verify_request<M: Match + 'static>(&self, matcher: M) -> RequestVerifier<'_> {
        self.0.dispatcher().verify_request(matcher)
    }

    /// Start a verification over the recorded requests with the given method satisfying
    /// `matcher`.
    pub fn verify_method<M: Match + 'static>(
        &self,
        method: Method,
        matcher: M,
    ) -> RequestVerifier<'_> {
        self.0.dispatcher().verify_method(method, matcher)
    }

    pub fn verify_get<M: Match + 'static>(&self, matcher: M) -> RequestVerifier<'_> {
        self.verify_method(Method::GET, matcher)
    }

    pub fn verify_post<M: Match + 'static>(&self, matcher: M) -> RequestVerifier<'_> {
        self.verify_method(Method::POST, matcher)
    }

    pub fn verify_put<M: Match + 'static>(&self, matcher: M) -> RequestVerifier<'_> {
        self.verify_method(Method::PUT, matcher)
    }

    pub fn verify_delete<M: Match + 'static>(&self, matcher: M) -> RequestVerifier<'_> {
        self.verify_method(Method::DELETE, matcher)
    }

    pub fn verify_patch<M: Match + 'static>(&self, matcher: M) -> RequestVerifier<'_> {
        self.verify_method(Method::PATCH, matcher)
    }

    pub fn verify_head<M: Match + 'static>(&self, matcher: M) -> RequestVerifier<'_> {
        self.verify_method(Method::HEAD, matcher)
    }

    /// Return the base uri of this running instance of `MockServer`, e.g. `http://127.0.0.1:4372`.
    ///
    /// Use this method to compose uris when interacting with this instance of `MockServer` via
    /// an HTTP client.
    pub fn uri(&self) -> String {
        self.0.uri()
    }

    /// Return the socket address of this running instance of `MockServer`, e.g. `127.0.0.1:4372`.
    ///
    /// Use this method to interact with the `MockServer` using `TcpStream`s.
    ///
    /// ### Example:
    /// ```rust
    /// use httpstub::MockServer;
    /// use std::net::TcpStream;
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     // Act - the server is started
    ///     let mock_server = MockServer::start().await;
    ///
    ///     // Assert - we can connect to it
    ///     assert!(TcpStream::connect(mock_server.address()).is_ok());
    /// }
    /// ```
    pub fn address(&self) -> &SocketAddr {
        self.0.address()
    }

    /// Stop the server and wait until its port has been released.
    ///
    /// Dropping a `MockServer` is enough to stop a dedicated server (or to hand a pooled one
    /// back to the pool): `shutdown` is for the cases where the port must be free once the
    /// call returns.
    pub async fn shutdown(self) {
        let server = match self.0 {
            InnerServer::Bare(server) => server,
            // Taken out of the pool for good: it will not be recycled.
            InnerServer::Pooled(pooled) => Object::take(pooled),
        };
        server.shutdown().await;
    }
}
