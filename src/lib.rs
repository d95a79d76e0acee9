#![allow(clippy::needless_doctest_main)]
//! `httpstub` is a programmable HTTP mock server to perform black-box testing of Rust
//! applications that interact with third-party APIs.
//!
//! Tests register [`Mock`]s (a set of request matchers plus an ordered sequence of canned
//! responses), drive their code against the server and then inspect or verify the requests
//! that were received.
//!
//! # Table of Contents
//! 1. [Getting started](#getting-started)
//! 2. [Matchers](#matchers)
//! 3. [Response sequences](#response-sequences)
//! 4. [Diagnostics](#diagnostics)
//! 5. [History and verification](#history-and-verification)
//! 6. [Test isolation](#test-isolation)
//! 7. [Runtime compatibility](#runtime-compatibility)
//!
//! ## Getting started
//! ```rust
//! use httpstub::{MockServer, Mock, ResponseTemplate};
//! use httpstub::matchers::{method, path};
//!
//! #[async_std::main]
//! async fn main() {
//!     // Start a background HTTP server on a random local port
//!     let mock_server = MockServer::start().await;
//!
//!     // Arrange the behaviour of the MockServer adding a Mock:
//!     // when it receives a GET request on '/hello' it will respond with a 200.
//!     Mock::given(method("GET"))
//!         .and(path("/hello"))
//!         .respond_with(ResponseTemplate::new(200))
//!         // Mounting the mock on the mock server - it's now effective!
//!         .mount(&mock_server);
//!
//!     // If we probe the MockServer using any HTTP client it behaves as expected.
//!     let status = reqwest::get(format!("{}/hello", &mock_server.uri()))
//!         .await
//!         .unwrap()
//!         .status();
//!     assert_eq!(status.as_u16(), 200);
//!
//!     // If the request doesn't match any `Mock` registered on our `MockServer`
//!     // a diagnostic 500 is returned.
//!     let status = reqwest::get(format!("{}/missing", &mock_server.uri()))
//!         .await
//!         .unwrap()
//!         .status();
//!     assert_eq!(status.as_u16(), 500);
//! }
//! ```
//!
//! ## Matchers
//!
//! `httpstub` provides a set of matching strategies out of the box - check the [`matchers`]
//! module for a complete list.
//!
//! You can define your own matchers using the [`Match`] trait, as well as using `Fn` closures.
//! Check [`Match`]'s documentation for more details and examples.
//!
//! A [`Mock`] matches a request when all of its matchers do.
//!
//! ## Response sequences
//!
//! Each [`Mock`] serves its responses in order, one per matching request. Once the sequence is
//! exhausted the last response is served again and again:
//!
//! ```rust
//! use httpstub::{MockServer, Mock, ResponseTemplate};
//! use httpstub::matchers::path;
//!
//! #[async_std::main]
//! async fn main() {
//!     let mock_server = MockServer::start().await;
//!     Mock::given(path("/job"))
//!         .respond_with(ResponseTemplate::new(202))
//!         .then_respond_with(ResponseTemplate::new(200).set_body_string("done"))
//!         .mount(&mock_server);
//!
//!     let url = format!("{}/job", &mock_server.uri());
//!     assert_eq!(reqwest::get(&url).await.unwrap().status(), 202);
//!     assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);
//!     assert_eq!(reqwest::get(&url).await.unwrap().text().await.unwrap(), "done");
//! }
//! ```
//!
//! ## Diagnostics
//!
//! A request matching no mock, or matching more than one, gets a `500` response
//! ([`NOT_MOCKED_STATUS`]) whose body explains what happened: the request and the
//! descriptions of the relevant mocks. Ambiguity is always an error: there is no priority
//! between mocks.
//!
//! ## History and verification
//!
//! Every exchange is recorded in a [`HistoryStore`], reachable through
//! [`MockServer::history`]. Use [`MockServer::verify_request`] (and its method-scoped
//! variants) to assert on how many times a request was received:
//!
//! ```rust
//! use httpstub::{MockServer, Mock, ResponseTemplate};
//! use httpstub::matchers::path;
//!
//! #[async_std::main]
//! async fn main() {
//!     let mock_server = MockServer::start().await;
//!     Mock::given(path("/ping"))
//!         .respond_with(ResponseTemplate::new(200))
//!         .mount(&mock_server);
//!
//!     let client = reqwest::Client::new();
//!     client.get(format!("{}/ping", &mock_server.uri())).send().await.unwrap();
//!     client.post(format!("{}/ping", &mock_server.uri())).send().await.unwrap();
//!
//!     mock_server.verify_request(path("/ping")).exactly(2).unwrap();
//!     mock_server.verify_get(path("/ping")).exactly(1).unwrap();
//!     mock_server.verify_delete(path("/ping")).never().unwrap();
//! }
//! ```
//!
//! The matching and recording engine, [`Dispatcher`], can also be used on its own, without
//! an HTTP listener.
//!
//! ## Test isolation
//!
//! Each instance of [`MockServer`] is fully isolated: [`start`] takes care of finding a random
//! port available on your local machine which is assigned to the new [`MockServer`].
//!
//! You should use one instance of [`MockServer`] for each test, to ensure full isolation and
//! no cross-test interference.
//!
//! When a [`MockServer`] instance goes out of scope (e.g. the test finishes), it is reset and
//! handed back to a pool of idle servers, or shut down if it was built with a
//! [`MockServerBuilder`].
//!
//! ## Runtime compatibility
//!
//! `httpstub` can be used (and it is tested to work) with `async_std`, `tokio` and `actix`
//! as futures runtimes: every server runs on its own thread.
//!
//! [`start`]: MockServer::start
mod dispatcher;
mod error;
mod history;
pub mod matchers;
mod mock;
mod mock_server;
mod mock_set;
mod request;
mod response_template;
mod sequencer;
mod verification;

pub use dispatcher::{Dispatcher, NOT_MOCKED_STATUS};
pub use error::{InvalidArgument, VerificationError};
pub use history::{HistoryStore, RecordedExchange};
pub use mock::{Match, Mock, MockBuilder, MockId};
pub use mock_server::{MockServer, MockServerBuilder, BODY_PRINT_LIMIT_ENV};
pub use request::{BodyPrintLimit, Request, BODY_PRINT_LIMIT};
pub use response_template::ResponseTemplate;
pub use sequencer::ResponseSequencer;
pub use verification::RequestVerifier;
