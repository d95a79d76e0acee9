use crate::mock_server::bare_server::BareMockServer;
use crate::MockServer;
use async_trait::async_trait;
use deadpool::managed::{Metrics, Object, Pool};
use once_cell::sync::Lazy;
use std::convert::Infallible;

/// A pool of `BareMockServer`s.
///
/// ## Design constraints
///
/// Pooling is an invisible optimisation: users of the crate should never have to reason
/// about it. A pooled server is indistinguishable from a fresh one: no mocks, empty history.
///
/// ## Motivation
///
/// Pooling reduces the number of `TcpListener`s being opened and closed, mitigating the risk
/// of hitting OS limits on the maximum number of open sockets (e.g. ulimit on Linux) in large
/// test suites.
static MOCK_SERVER_POOL: Lazy<Pool<MockServerPoolManager>> = Lazy::new(|| {
    // An arbitrarily high max_size: a test should never "wait" for a `BareMockServer`
    // instance to become available.
    Pool::builder(MockServerPoolManager)
        .max_size(1000)
        .build()
        .expect("Building a server pool is not expected to fail. Please report an issue")
});

pub(crate) type PooledMockServer = Object<MockServerPoolManager>;

/// Retrieve a `BareMockServer` from the pool.
/// The operation should never fail.
pub(crate) async fn get_pooled_mock_server() -> PooledMockServer {
    MOCK_SERVER_POOL
        .get()
        .await
        .expect("Failed to get a MockServer from the pool")
}

/// The `BareMockServer` pool manager.
///
/// It:
/// - creates a new `BareMockServer` if there is none to borrow from the pool;
/// - "cleans up" used `BareMockServer`s before making them available again for other tests to use.
#[derive(Debug)]
pub(crate) struct MockServerPoolManager;

#[async_trait]
impl deadpool::managed::Manager for MockServerPoolManager {
    type Type = BareMockServer;
    type Error = Infallible;

    async fn create(&self) -> Result<BareMockServer, Infallible> {
        // All servers in the pool use the default configuration
        Ok(MockServer::builder().build_bare().await)
    }

    async fn recycle(
        &self,
        mock_server: &mut BareMockServer,
        _metrics: &Metrics,
    ) -> deadpool::managed::RecycleResult<Infallible> {
        // Remove mocks and history - we want to start clean when the mock server
        // is picked up again from the pool.
        mock_server.reset();
        Ok(())
    }
}
