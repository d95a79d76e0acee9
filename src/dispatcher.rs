use crate::history::HistoryStore;
use crate::mock_set::MockSet;
use crate::request::BodyPrintLimit;
use crate::verification::RequestVerifier;
use crate::{Match, Mock, Request, ResponseTemplate};
use http::{Method, StatusCode};
use log::{debug, error};
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt::Write;
use std::panic::{self, AssertUnwindSafe};

/// Status code of every diagnostic response: request not mocked, mocked more than once or
/// internal failure.
pub const NOT_MOCKED_STATUS: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;

/// The request-dispatch and verification engine behind a [`MockServer`].
///
/// For every incoming request the `Dispatcher`:
/// - evaluates all registered [`Mock`]s, in registration order;
/// - if exactly one matched, serves the next response in that mock's sequence;
/// - if none matched, serves a diagnostic `500` listing the registered mocks;
/// - if more than one matched, serves a diagnostic `500` naming the conflicting mocks.
///
/// Whatever the outcome, the request and the response are appended to the [`HistoryStore`]
/// before the response is handed back.
///
/// [`dispatch`] never panics and never fails: any fault raised while matching or while
/// building a diagnostic (e.g. a custom matcher that panics) is turned into a `500` response
/// carrying the panic message and a backtrace.
///
/// A `Dispatcher` can be driven directly, without any HTTP listener:
/// ```rust
/// use httpstub::{Dispatcher, Mock, Request, ResponseTemplate};
/// use httpstub::matchers::path_ends_with;
///
/// let dispatcher = Dispatcher::new();
/// dispatcher.register(
///     Mock::given(path_ends_with("sample"))
///         .respond_with(ResponseTemplate::new(200).set_body_string("p1"))
///         .then_respond_with(ResponseTemplate::new(200).set_body_string("p2")),
/// );
///
/// let first = dispatcher.dispatch(Request::new("GET", "/sample"));
/// let second = dispatcher.dispatch(Request::new("GET", "/sample"));
/// let third = dispatcher.dispatch(Request::new("GET", "/sample"));
/// assert_eq!(first.body_string(), "p1");
/// assert_eq!(second.body_string(), "p2");
/// assert_eq!(third.body_string(), "p2");
///
/// let not_mocked = dispatcher.dispatch(Request::new("GET", "/else"));
/// assert_eq!(not_mocked.status(), 500);
///
/// dispatcher.verify_request(path_ends_with("sample")).exactly(3).unwrap();
/// ```
///
/// [`MockServer`]: crate::MockServer
/// [`dispatch`]: Dispatcher::dispatch
#[derive(Debug)]
pub struct Dispatcher {
    mock_set: MockSet,
    history: HistoryStore,
    body_print_limit: BodyPrintLimit,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_body_print_limit(BodyPrintLimit::default())
    }

    pub fn with_body_print_limit(body_print_limit: BodyPrintLimit) -> Self {
        Self {
            mock_set: MockSet::new(),
            history: HistoryStore::new(),
            body_print_limit,
        }
    }

    /// Match `request` against the registered mocks, record the exchange and return the
    /// response to send back.
    pub fn dispatch(&self, request: Request) -> ResponseTemplate {
        debug!("-> New request:\t{}", request.summary());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.resolve(&request)));
        let response = match outcome {
            Ok(response) => response,
            Err(payload) => internal_fault_response(payload.as_ref(), &request),
        };
        self.history.append(request, response.clone());
        response
    }

    fn resolve(&self, request: &Request) -> ResponseTemplate {
        let matched = self.mock_set.matching(request);
        match matched.as_slice() {
            [mock] => match mock.sequencer().next() {
                Some(response) => {
                    debug!("<- Response:\t{} from {}", response.status(), mock.description());
                    response
                }
                // Only reachable if the sequence was emptied behind our back.
                None => self.not_mocked(request),
            },
            [] => self.not_mocked(request),
            _ => self.ambiguous(request, &matched),
        }
    }

    fn not_mocked(&self, request: &Request) -> ResponseTemplate {
        let mut message = format!("Request not mocked: {}\nRegistered mocks:\n", request.summary());
        for mock in self.mock_set.snapshot().iter() {
            let _ = writeln!(message, "{}", mock.description());
        }
        error!("<- Response ERROR:\t{}", message);
        diagnostic_response(&request.method, message)
    }

    fn ambiguous(&self, request: &Request, matched: &[Mock]) -> ResponseTemplate {
        let mut message = format!(
            "More than one mock matched the request {}:\n",
            request.summary()
        );
        for mock in matched {
            let _ = writeln!(message, "{}", mock.description());
        }
        error!("<- Response ERROR:\t{}", message);
        diagnostic_response(&request.method, message)
    }

    /// Register a mock. Returns `false` if it was ignored: it has no responses or it is
    /// already registered.
    pub fn register(&self, mock: Mock) -> bool {
        self.mock_set.register(mock)
    }

    /// Remove a mock. Returns `false` if it was not registered.
    pub fn remove(&self, mock: &Mock) -> bool {
        self.mock_set.remove(mock.id())
    }

    /// Number of registered mocks.
    pub fn n_mocks(&self) -> usize {
        self.mock_set.len()
    }

    /// Remove every registered mock. The history is left untouched.
    pub fn clear_rules(&self) {
        self.mock_set.clear();
    }

    /// Forget all recorded exchanges. Registered mocks stay active.
    pub fn clear_history(&self) {
        self.history.clear();
    }

    /// Remove every mock and forget all recorded exchanges.
    pub fn reset(&self) {
        self.clear_rules();
        self.clear_history();
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Start a verification over all recorded requests satisfying `matcher`.
    pub fn verify_request<M: Match + 'static>(&self, matcher: M) -> RequestVerifier<'_> {
        RequestVerifier::new(&self.history, Box::new(matcher), None, self.body_print_limit)
    }

    /// Start a verification over the recorded requests with the given method satisfying
    /// `matcher`.
    pub fn verify_method<M: Match + 'static>(
        &self,
        method: Method,
        matcher: M,
    ) -> RequestVerifier<'_> {
        RequestVerifier::new(
            &self.history,
            Box::new(matcher),
            Some(method),
            self.body_print_limit,
        )
    }
}

/// A `NOT_MOCKED_STATUS` response carrying `message`, or no body at all for `HEAD` requests.
fn diagnostic_response(method: &Method, message: String) -> ResponseTemplate {
    let response = ResponseTemplate::new(NOT_MOCKED_STATUS);
    // Responses to HEAD requests must not carry a body.
    if *method == Method::HEAD {
        response
    } else {
        response.set_body_string(message)
    }
}

fn internal_fault_response(payload: &(dyn Any + Send), request: &Request) -> ResponseTemplate {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };
    let message = format!(
        "Internal error while dispatching the request: {}\n{}",
        message,
        Backtrace::force_capture()
    );
    error!("<- Internal error while handling {}:\n{}", request.summary(), message);
    diagnostic_response(&request.method, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{any, method, path_ends_with};
    use std::sync::Arc;

    fn mock_with(bodies: &[&str]) -> Mock {
        Mock::given(path_ends_with("sample")).respond_with_sequence(
            bodies
                .iter()
                .map(|b| ResponseTemplate::new(200).set_body_string(*b))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn responses_are_served_in_sequence_and_the_last_one_sticks() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(mock_with(&["p1", "p2", "p3"]));

        let served: Vec<String> = (0..6)
            .map(|_| {
                dispatcher
                    .dispatch(Request::new("GET", "/sample"))
                    .body_string()
            })
            .collect();

        assert_eq!(served, vec!["p1", "p2", "p3", "p3", "p3", "p3"]);
    }

    #[test]
    fn unmatched_requests_get_a_diagnostic_listing_all_mocks() {
        let dispatcher = Dispatcher::new();
        let first = mock_with(&["p1"]);
        let second = Mock::given(method("POST")).respond_with(ResponseTemplate::new(201));
        dispatcher.register(first.clone());
        dispatcher.register(second.clone());

        let response = dispatcher.dispatch(Request::new("GET", "/else"));

        assert_eq!(response.status(), NOT_MOCKED_STATUS);
        let body = response.body_string();
        assert!(body.starts_with("Request not mocked: GET http://localhost/else"));
        assert!(body.contains(&format!("{}\n", first.description())));
        assert!(body.contains(&format!("{}\n", second.description())));
    }

    #[test]
    fn unmatched_head_requests_get_no_body() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(mock_with(&["p1"]));

        let response = dispatcher.dispatch(Request::new("HEAD", "/else"));

        assert_eq!(response.status(), NOT_MOCKED_STATUS);
        assert!(!response.has_body());
    }

    #[test]
    fn ambiguous_matches_are_reported_naming_every_matching_mock() {
        let dispatcher = Dispatcher::new();
        let first = mock_with(&["p1"]);
        let second = Mock::given(any()).respond_with(ResponseTemplate::new(200));
        let unrelated = Mock::given(method("POST")).respond_with(ResponseTemplate::new(200));
        dispatcher.register(first.clone());
        dispatcher.register(second.clone());
        dispatcher.register(unrelated.clone());

        let response = dispatcher.dispatch(Request::new("GET", "/sample"));

        assert_eq!(response.status(), NOT_MOCKED_STATUS);
        let body = response.body_string();
        let expected = format!(
            "More than one mock matched the request GET http://localhost/sample:\n{}\n{}\n",
            first.description(),
            second.description()
        );
        assert_eq!(body, expected);
        // Neither sequence moved.
        assert_eq!(first.sequencer().cursor(), 0);
    }

    #[test]
    fn ambiguous_head_requests_get_no_body() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(mock_with(&["p1"]));
        dispatcher.register(Mock::given(any()).respond_with(ResponseTemplate::new(200)));

        let response = dispatcher.dispatch(Request::new("HEAD", "/sample"));

        assert_eq!(response.status(), NOT_MOCKED_STATUS);
        assert!(!response.has_body());
        assert!(!dispatcher.history().last().unwrap().response().has_body());
    }

    #[test]
    fn panicking_matchers_on_head_requests_get_no_body() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(
            Mock::given(|_: &Request| -> bool { panic!("matcher exploded") })
                .respond_with(ResponseTemplate::new(200)),
        );

        let response = dispatcher.dispatch(Request::new("HEAD", "/"));

        assert_eq!(response.status(), NOT_MOCKED_STATUS);
        assert!(!response.has_body());
    }

    #[test]
    fn panicking_matchers_are_turned_into_an_error_response() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(
            Mock::given(|_: &Request| -> bool { panic!("matcher exploded") })
                .respond_with(ResponseTemplate::new(200)),
        );

        let response = dispatcher.dispatch(Request::new("GET", "/"));

        assert_eq!(response.status(), NOT_MOCKED_STATUS);
        assert!(response
            .body_string()
            .starts_with("Internal error while dispatching the request: matcher exploded"));
        assert_eq!(dispatcher.history().len(), 1);
    }

    #[test]
    fn history_pairs_each_request_with_the_response_it_received() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(mock_with(&["p1", "p2", "p3"]));

        for verb in ["GET", "POST", "GET", "DELETE", "GET", "HEAD"] {
            dispatcher.dispatch(Request::new(verb, "/sample"));
        }

        let gets = dispatcher.history().take_all_matching(&method("GET"));
        let bodies: Vec<String> = gets.iter().map(|e| e.response().body_string()).collect();
        let indices: Vec<usize> = gets.iter().map(|e| e.sequence_index()).collect();
        assert_eq!(bodies, vec!["p1", "p3", "p3"]);
        assert_eq!(indices, vec![0, 2, 4]);
    }

    #[test]
    fn sharing_a_mock_between_dispatchers_does_not_rewind_its_sequence() {
        let first = Dispatcher::new();
        let second = Dispatcher::new();
        let mock = mock_with(&["p1", "p2", "p3"]);
        first.register(mock.clone());

        let mut served = Vec::new();
        for _ in 0..2 {
            served.push(first.dispatch(Request::new("GET", "/sample")).body_string());
        }
        assert!(second.register(mock.clone()));
        served.push(first.dispatch(Request::new("GET", "/sample")).body_string());

        assert_eq!(served, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn every_outcome_is_recorded() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(mock_with(&["p1"]));

        dispatcher.dispatch(Request::new("GET", "/sample"));
        dispatcher.dispatch(Request::new("GET", "/else"));

        let history = dispatcher.history().all();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].response().status(), StatusCode::OK);
        assert_eq!(history[1].response().status(), NOT_MOCKED_STATUS);
    }

    #[test]
    fn mocks_without_responses_are_ignored() {
        let dispatcher = Dispatcher::new();

        assert!(!dispatcher.register(mock_with(&[])));
        assert_eq!(dispatcher.n_mocks(), 0);

        let response = dispatcher.dispatch(Request::new("GET", "/sample"));
        assert_eq!(response.status(), NOT_MOCKED_STATUS);
    }

    #[test]
    fn removed_mocks_stop_matching() {
        let dispatcher = Dispatcher::new();
        let mock = mock_with(&["p1"]);
        dispatcher.register(mock.clone());

        assert!(dispatcher.remove(&mock));
        assert!(!dispatcher.remove(&mock));

        let response = dispatcher.dispatch(Request::new("GET", "/sample"));
        assert_eq!(response.status(), NOT_MOCKED_STATUS);
    }

    #[test]
    fn resets_are_distinguishable() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(mock_with(&["p1"]));
        dispatcher.dispatch(Request::new("GET", "/sample"));

        dispatcher.clear_history();
        assert_eq!(dispatcher.n_mocks(), 1);
        assert!(dispatcher.history().is_empty());

        dispatcher.dispatch(Request::new("GET", "/sample"));
        dispatcher.clear_rules();
        assert_eq!(dispatcher.n_mocks(), 0);
        assert_eq!(dispatcher.history().len(), 1);

        dispatcher.register(mock_with(&["p1"]));
        dispatcher.reset();
        assert_eq!(dispatcher.n_mocks(), 0);
        assert!(dispatcher.history().is_empty());
    }

    #[test]
    fn concurrent_dispatches_share_one_sequence() {
        let dispatcher = Arc::new(Dispatcher::new());
        let bodies: Vec<String> = (0..16).map(|i| format!("r{}", i)).collect();
        let body_refs: Vec<&str> = bodies.iter().map(String::as_str).collect();
        dispatcher.register(mock_with(&body_refs));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                std::thread::spawn(move || {
                    for _ in 0..4 {
                        dispatcher.dispatch(Request::new("GET", "/sample"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut served: Vec<String> = dispatcher
            .history()
            .all()
            .iter()
            .map(|e| e.response().body_string())
            .collect();
        served.sort();
        let mut expected = bodies.clone();
        expected.sort();
        assert_eq!(served, expected);
    }
}
