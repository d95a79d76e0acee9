use crate::dispatcher::Dispatcher;
use crate::mock_server::hyper::run_server;
use crate::request::BodyPrintLimit;
use log::{debug, info};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::sync::oneshot;

/// An HTTP web-server running in the background to behave as one of your dependencies using
/// `Mock`s for testing purposes.
///
/// `BareMockServer` is the actual mock server behind the publicly-exposed `MockServer`, which
/// is instead a thin facade over a `BareMockServer` retrieved from a pool - see
/// `get_pooled_mock_server` for more details.
///
/// The server runs on a dedicated thread with its own single-threaded tokio runtime, so it
/// works the same whatever async runtime (if any) the test is using.
pub(crate) struct BareMockServer {
    dispatcher: Arc<Dispatcher>,
    server_address: SocketAddr,
    // When `shutdown_trigger` gets dropped the listening server terminates gracefully.
    shutdown_trigger: Option<oneshot::Sender<()>>,
    stopped: Option<oneshot::Receiver<()>>,
}

impl BareMockServer {
    /// Start a new instance of a `BareMockServer` listening on the given `TcpListener`.
    pub(super) async fn start(listener: TcpListener, body_print_limit: BodyPrintLimit) -> Self {
        let (shutdown_trigger, shutdown_receiver) = oneshot::channel();
        let (started_sender, started_receiver) = oneshot::channel();
        let (stopped_sender, stopped_receiver) = oneshot::channel();
        let server_address = listener
            .local_addr()
            .expect("Failed to get server address.");
        let dispatcher = Arc::new(Dispatcher::with_body_print_limit(body_print_limit));

        let server_dispatcher = dispatcher.clone();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Cannot build local tokio runtime");
            let _ = started_sender.send(());
            runtime.block_on(run_server(listener, server_dispatcher, shutdown_receiver));
            // Dropping the runtime closes the connections that are still open.
            drop(runtime);
            let _ = stopped_sender.send(());
        });
        // The listener is already bound: once the runtime is up, connections are accepted.
        let _ = started_receiver.await;
        info!("Mock server listening on {}", server_address);

        Self {
            dispatcher,
            server_address,
            shutdown_trigger: Some(shutdown_trigger),
            stopped: Some(stopped_receiver),
        }
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Drop all registered `Mock`s and all recorded requests.
    ///
    /// It *must* be called if you plan to reuse a `BareMockServer` instance (i.e. in our
    /// `MockServerPoolManager`).
    pub(crate) fn reset(&self) {
        self.dispatcher.reset();
    }

    /// Stop listening and wait until the background server has released its port.
    pub(crate) async fn shutdown(mut self) {
        debug!("Shutting down mock server on {}", self.server_address);
        if let Some(trigger) = self.shutdown_trigger.take() {
            let _ = trigger.send(());
        }
        if let Some(stopped) = self.stopped.take() {
            let _ = stopped.await;
        }
        info!("Mock server on {} stopped", self.server_address);
    }

    /// Return the base uri of this running instance of `BareMockServer`, e.g. `http://127.0.0.1:4372`.
    pub(crate) fn uri(&self) -> String {
        format!("http://{}", self.server_address)
    }

    /// Return the socket address of this running instance of `BareMockServer`, e.g. `127.0.0.1:4372`.
    pub(crate) fn address(&self) -> &SocketAddr {
        &self.server_address
    }
}
