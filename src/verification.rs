use crate::error::VerificationError;
use crate::history::HistoryStore;
use crate::request::BodyPrintLimit;
use crate::{Match, Request};
use http::Method;
use log::debug;

/// An assertion over the number of recorded requests satisfying a matcher.
///
/// Get one from [`MockServer::verify_request`] (or one of its method-scoped siblings, e.g.
/// [`MockServer::verify_get`]) and pick the expectation:
///
/// ```rust
/// use httpstub::{MockServer, Mock, ResponseTemplate, VerificationError};
/// use httpstub::matchers::path_ends_with;
///
/// #[async_std::main]
/// async fn main() {
///     let mock_server = MockServer::start().await;
///     Mock::given(path_ends_with("sample"))
///         .respond_with(ResponseTemplate::new(200))
///         .mount(&mock_server);
///
///     mock_server.verify_request(path_ends_with("sample")).never().unwrap();
///
///     reqwest::get(format!("{}/sample", mock_server.uri())).await.unwrap();
///
///     mock_server.verify_request(path_ends_with("sample")).invoked().unwrap();
///     mock_server.verify_get(path_ends_with("sample")).exactly(1).unwrap();
///     assert!(matches!(
///         mock_server.verify_post(path_ends_with("sample")).invoked(),
///         Err(VerificationError::NotInvoked { .. })
///     ));
/// }
/// ```
///
/// Verifications run against the history at the moment they are called: they do not wait
/// for in-flight requests.
///
/// [`MockServer::verify_request`]: crate::MockServer::verify_request
/// [`MockServer::verify_get`]: crate::MockServer::verify_get
pub struct RequestVerifier<'a> {
    history: &'a HistoryStore,
    matcher: Box<dyn Match>,
    method: Option<Method>,
    body_print_limit: BodyPrintLimit,
}

impl<'a> RequestVerifier<'a> {
    pub(crate) fn new(
        history: &'a HistoryStore,
        matcher: Box<dyn Match>,
        method: Option<Method>,
        body_print_limit: BodyPrintLimit,
    ) -> Self {
        Self {
            history,
            matcher,
            method,
            body_print_limit,
        }
    }

    /// Succeeds if no recorded request matched.
    pub fn never(&self) -> Result<(), VerificationError> {
        self.exactly(0)
    }

    /// Succeeds if at least one recorded request matched.
    pub fn invoked(&self) -> Result<(), VerificationError> {
        match self.count() {
            0 => Err(self.not_invoked()),
            _ => Ok(()),
        }
    }

    /// Succeeds if exactly `times` recorded requests matched.
    ///
    /// If nothing matched at all (and `times > 0`) the failure is
    /// [`VerificationError::NotInvoked`] rather than a count mismatch.
    pub fn exactly(&self, times: u64) -> Result<(), VerificationError> {
        let actual = self.count();
        if actual == times {
            Ok(())
        } else if actual == 0 {
            Err(self.not_invoked())
        } else {
            Err(VerificationError::CountMismatch {
                matcher: self.matcher.describe(),
                method: self.method.clone(),
                expected: times,
                actual,
                received: self.received(),
            })
        }
    }

    /// Succeeds if at least `times` recorded requests matched.
    ///
    /// If nothing matched at all (and `times > 0`) the failure is
    /// [`VerificationError::NotInvoked`] rather than an insufficient count.
    pub fn at_least(&self, times: u64) -> Result<(), VerificationError> {
        let actual = self.count();
        if actual >= times {
            Ok(())
        } else if actual == 0 {
            Err(self.not_invoked())
        } else {
            Err(VerificationError::InsufficientCount {
                matcher: self.matcher.describe(),
                method: self.method.clone(),
                expected: times,
                actual,
                received: self.received(),
            })
        }
    }

    /// Number of recorded requests satisfying the matcher (and the method, if any).
    pub fn count(&self) -> u64 {
        let count = match &self.method {
            Some(method) => self.history.count_matching(&|request: &Request| {
                request.method == *method && self.matcher.matches(request)
            }),
            None => self.history.count_matching(&*self.matcher),
        };
        debug!(
            "{} recorded request(s) matching {}",
            count,
            self.matcher.describe()
        );
        count
    }

    fn not_invoked(&self) -> VerificationError {
        VerificationError::NotInvoked {
            matcher: self.matcher.describe(),
            method: self.method.clone(),
            received: self.received(),
        }
    }

    fn received(&self) -> String {
        self.history.describe(self.body_print_limit)
    }
}

#[cfg(test)]
mod tests {
    use crate::matchers::{method, path_ends_with};
    use crate::{Dispatcher, Mock, Request, ResponseTemplate, VerificationError};
    use http::Method;

    fn dispatcher() -> Dispatcher {
        let dispatcher = Dispatcher::new();
        dispatcher.register(
            Mock::given(path_ends_with("sample")).respond_with(ResponseTemplate::new(200)),
        );
        dispatcher
    }

    fn call(dispatcher: &Dispatcher, method: &str, path: &str) {
        dispatcher.dispatch(Request::new(method, path));
    }

    #[test]
    fn counts_are_verified_as_requests_come_in() {
        let dispatcher = dispatcher();
        let verify = || dispatcher.verify_request(path_ends_with("sample"));

        verify().never().unwrap();
        verify().exactly(0).unwrap();
        for expected in 1..=3 {
            call(&dispatcher, "GET", "/sample");
            verify().invoked().unwrap();
            verify().exactly(expected).unwrap();
            verify().at_least(expected).unwrap();
        }
        verify().at_least(1).unwrap();
    }

    #[test]
    fn invoked_fails_when_nothing_matched() {
        let dispatcher = dispatcher();
        call(&dispatcher, "GET", "/sample");

        let error = dispatcher
            .verify_request(path_ends_with("else"))
            .invoked()
            .unwrap_err();

        assert!(matches!(error, VerificationError::NotInvoked { .. }));
        assert!(error.to_string().contains("path ends with `else`"));
        assert!(error.to_string().contains("- Request #1"));
    }

    #[test]
    fn exactly_reports_expected_and_actual_counts() {
        let dispatcher = dispatcher();
        call(&dispatcher, "GET", "/sample");

        let error = dispatcher
            .verify_request(path_ends_with("sample"))
            .exactly(3)
            .unwrap_err();

        assert_eq!(
            error,
            VerificationError::CountMismatch {
                matcher: "path ends with `sample`".into(),
                method: None,
                expected: 3,
                actual: 1,
                received: dispatcher.history().describe(Default::default()),
            }
        );
    }

    #[test]
    fn exactly_with_no_matching_request_is_not_invoked() {
        let dispatcher = dispatcher();

        let error = dispatcher
            .verify_request(path_ends_with("else"))
            .exactly(3)
            .unwrap_err();

        assert!(matches!(error, VerificationError::NotInvoked { .. }));
    }

    #[test]
    fn at_least_reports_insufficient_counts() {
        let dispatcher = dispatcher();
        call(&dispatcher, "GET", "/sample");
        call(&dispatcher, "GET", "/samplesomething");
        call(&dispatcher, "GET", "/sample");

        let error = dispatcher
            .verify_request(path_ends_with("sample"))
            .at_least(3)
            .unwrap_err();

        assert!(matches!(
            error,
            VerificationError::InsufficientCount {
                expected: 3,
                actual: 2,
                ..
            }
        ));
        assert_eq!(error.actual(), 2);
    }

    #[test]
    fn method_scoped_verifications_filter_by_method() {
        let dispatcher = dispatcher();
        let calls = [
            ("GET", 1),
            ("POST", 2),
            ("PUT", 3),
            ("DELETE", 4),
        ];
        for (verb, times) in calls {
            for _ in 0..times {
                call(&dispatcher, verb, "/sample");
            }
        }

        dispatcher
            .verify_request(path_ends_with("sample"))
            .exactly(10)
            .unwrap();
        for (verb, times) in calls {
            let method = Method::from_bytes(verb.as_bytes()).unwrap();
            dispatcher
                .verify_method(method, path_ends_with("sample"))
                .exactly(times)
                .unwrap();
        }
        let error = dispatcher
            .verify_method(Method::PATCH, path_ends_with("sample"))
            .invoked()
            .unwrap_err();
        assert!(error.to_string().contains("(method PATCH)"));
    }

    #[test]
    fn diagnostic_responses_are_counted_too() {
        let dispatcher = dispatcher();
        call(&dispatcher, "GET", "/not-mocked");

        dispatcher
            .verify_request(method("GET"))
            .exactly(1)
            .unwrap();
    }

    #[test]
    fn clearing_the_history_restarts_the_count_but_keeps_the_mocks() {
        let dispatcher = dispatcher();
        for _ in 0..4 {
            call(&dispatcher, "GET", "/sample");
        }
        dispatcher
            .verify_request(path_ends_with("sample"))
            .exactly(4)
            .unwrap();

        dispatcher.clear_history();
        dispatcher
            .verify_request(path_ends_with("sample"))
            .never()
            .unwrap();

        call(&dispatcher, "GET", "/sample");
        dispatcher
            .verify_request(path_ends_with("sample"))
            .exactly(1)
            .unwrap();
        assert_eq!(
            dispatcher.history().last().unwrap().response().status(),
            200
        );
    }
}
