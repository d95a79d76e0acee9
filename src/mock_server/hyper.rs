use crate::dispatcher::{Dispatcher, NOT_MOCKED_STATUS};
use crate::Request;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use log::{debug, error};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;

/// The actual HTTP server responding to incoming requests according to the registered mocks.
///
/// Both HTTP/1.1 and HTTP/2 (prior knowledge) connections are accepted.
pub(super) async fn run_server(
    listener: std::net::TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown_signal: tokio::sync::oneshot::Receiver<()>,
) {
    listener
        .set_nonblocking(true)
        .expect("Cannot set non-blocking mode on the listener");
    let listener =
        TcpListener::from_std(listener).expect("Cannot convert the listener into a tokio one");

    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!("Failed to accept a connection: {}", e);
                    continue;
                }
            },
            // Resolves when either:
            // - the sender half of the channel gets dropped (i.e. the server is dropped)
            // - the sender is used, sending a poison pill willingly as a shutdown signal
            _ = &mut shutdown_signal => break,
        };

        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let service = service_fn(move |request: hyper::Request<Incoming>| {
                let dispatcher = dispatcher.clone();
                async move { Ok::<_, Infallible>(handle_request(request, &dispatcher).await) }
            });
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Connection error: {}", e);
            }
        });
    }
    debug!("Mock server listener shut down");
}

async fn handle_request(
    request: hyper::Request<Incoming>,
    dispatcher: &Dispatcher,
) -> hyper::Response<Full<Bytes>> {
    let request = match Request::from_hyper(request).await {
        Ok(request) => request,
        Err(e) => {
            error!("Failed to read the incoming request: {}", e);
            let mut response = hyper::Response::new(Full::from(format!(
                "Failed to read the incoming request: {}",
                e
            )));
            *response.status_mut() = NOT_MOCKED_STATUS;
            return response;
        }
    };

    let template = dispatcher.dispatch(request);

    // The dispatcher holds no lock at this point: other requests keep flowing while we wait.
    if let Some(delay) = template.delay() {
        tokio::time::sleep(delay).await;
    }

    template.generate_response()
}
