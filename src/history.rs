use crate::error::InvalidArgument;
use crate::request::BodyPrintLimit;
use crate::{Match, Request, ResponseTemplate};
use std::convert::TryInto;
use std::fmt::Write;
use std::sync::RwLock;

/// One request received by the [`Dispatcher`], paired with the response that was sent back.
///
/// Exchanges are immutable: they are created when the request is dispatched and they are
/// dropped only when the history is cleared.
///
/// [`Dispatcher`]: crate::Dispatcher
#[derive(Debug, Clone)]
pub struct RecordedExchange {
    request: Request,
    response: ResponseTemplate,
    sequence_index: usize,
}

impl RecordedExchange {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &ResponseTemplate {
        &self.response
    }

    /// Position of the exchange in the history, starting from 0 after each clear.
    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn into_parts(self) -> (Request, ResponseTemplate) {
        (self.request, self.response)
    }
}

/// The chronological record of every exchange handled by a [`Dispatcher`].
///
/// The store is append-only (short of [`clear`]) and every query returns an owned snapshot,
/// unaffected by requests that arrive afterwards.
///
/// Counts and bounds are accepted as any integer type: values that cannot be represented as a
/// `usize` (i.e. negative ones) are rejected with [`InvalidArgument`].
///
/// ```rust
/// use httpstub::{Dispatcher, Mock, Request, ResponseTemplate};
/// use httpstub::matchers::any;
///
/// let dispatcher = Dispatcher::new();
/// dispatcher.register(Mock::given(any()).respond_with(ResponseTemplate::new(200)));
/// for method in ["GET", "POST", "DELETE"] {
///     dispatcher.dispatch(Request::new(method, "/sample"));
/// }
///
/// let last_two = dispatcher.history().take_last(2).unwrap();
/// assert_eq!(last_two[0].request().method, "POST");
/// assert_eq!(last_two[1].request().method, "DELETE");
///
/// assert!(dispatcher.history().take_first(-1).is_err());
/// assert!(dispatcher.history().take_range(2, 1).is_err());
/// ```
///
/// [`Dispatcher`]: crate::Dispatcher
/// [`clear`]: HistoryStore::clear
#[derive(Debug, Default)]
pub struct HistoryStore {
    exchanges: RwLock<Vec<RecordedExchange>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new exchange and return its sequence index.
    pub(crate) fn append(&self, request: Request, response: ResponseTemplate) -> usize {
        let mut exchanges = self.exchanges.write().expect("Poisoned lock!");
        let sequence_index = exchanges.len();
        exchanges.push(RecordedExchange {
            request,
            response,
            sequence_index,
        });
        sequence_index
    }

    /// A copy of the whole history, in chronological order.
    pub fn all(&self) -> Vec<RecordedExchange> {
        self.exchanges.read().expect("Poisoned lock!").clone()
    }

    /// All recorded requests, in chronological order.
    pub fn requests(&self) -> Vec<Request> {
        self.exchanges
            .read()
            .expect("Poisoned lock!")
            .iter()
            .map(|e| e.request.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.exchanges.read().expect("Poisoned lock!").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The oldest exchange, `None` if nothing has been recorded.
    pub fn first(&self) -> Option<RecordedExchange> {
        self.exchanges.read().expect("Poisoned lock!").first().cloned()
    }

    /// The most recent exchange, `None` if nothing has been recorded.
    pub fn last(&self) -> Option<RecordedExchange> {
        self.exchanges.read().expect("Poisoned lock!").last().cloned()
    }

    /// The first `min(n, len)` exchanges.
    pub fn take_first<N>(&self, n: N) -> Result<Vec<RecordedExchange>, InvalidArgument>
    where
        N: TryInto<usize> + Copy + std::fmt::Display,
    {
        let n = to_count(n, "Number of requests to take")?;
        let exchanges = self.exchanges.read().expect("Poisoned lock!");
        Ok(exchanges.iter().take(n).cloned().collect())
    }

    /// The last `min(n, len)` exchanges, in chronological order.
    pub fn take_last<N>(&self, n: N) -> Result<Vec<RecordedExchange>, InvalidArgument>
    where
        N: TryInto<usize> + Copy + std::fmt::Display,
    {
        let n = to_count(n, "Number of requests to take")?;
        let exchanges = self.exchanges.read().expect("Poisoned lock!");
        let start = exchanges.len().saturating_sub(n);
        Ok(exchanges[start..].to_vec())
    }

    /// The exchanges with sequence index in `[start, end)`.
    ///
    /// Fails if `start > end`, if either bound is negative or if `end` is past the end of the
    /// history.
    pub fn take_range<N>(&self, start: N, end: N) -> Result<Vec<RecordedExchange>, InvalidArgument>
    where
        N: TryInto<usize> + Copy + std::fmt::Display,
    {
        let start = to_count(start, "Range start")?;
        let end = to_count(end, "Range end")?;
        if start > end {
            return Err(InvalidArgument(format!(
                "Range start ({}) is greater than range end ({})",
                start, end
            )));
        }
        let exchanges = self.exchanges.read().expect("Poisoned lock!");
        if end > exchanges.len() {
            return Err(InvalidArgument(format!(
                "Range end ({}) is out of bounds: {} requests recorded",
                end,
                exchanges.len()
            )));
        }
        Ok(exchanges[start..end].to_vec())
    }

    /// Every exchange whose request satisfies `matcher`, in chronological order.
    pub fn take_all_matching<M>(&self, matcher: &M) -> Vec<RecordedExchange>
    where
        M: Match + ?Sized,
    {
        self.exchanges
            .read()
            .expect("Poisoned lock!")
            .iter()
            .filter(|e| matcher.matches(&e.request))
            .cloned()
            .collect()
    }

    /// Like [`take_all_matching`], without the responses.
    ///
    /// [`take_all_matching`]: HistoryStore::take_all_matching
    pub fn take_all_matching_requests<M>(&self, matcher: &M) -> Vec<Request>
    where
        M: Match + ?Sized,
    {
        self.take_all_matching(matcher)
            .into_iter()
            .map(|e| e.request)
            .collect()
    }

    pub(crate) fn count_matching<M>(&self, matcher: &M) -> u64
    where
        M: Match + ?Sized,
    {
        self.exchanges
            .read()
            .expect("Poisoned lock!")
            .iter()
            .filter(|e| matcher.matches(&e.request))
            .count() as u64
    }

    /// Forget every recorded exchange. Registered mocks are not affected.
    pub fn clear(&self) {
        log::info!("Clearing request history");
        self.exchanges.write().expect("Poisoned lock!").clear();
    }

    /// A printable summary of the history, used in verification failures.
    pub(crate) fn describe(&self, body_print_limit: BodyPrintLimit) -> String {
        let exchanges = self.exchanges.read().expect("Poisoned lock!");
        if exchanges.is_empty() {
            return "The server did not receive any request.".into();
        }
        let mut message = String::from("Received requests:\n");
        for exchange in exchanges.iter() {
            let mut printed = String::new();
            if exchange
                .request
                .print_with_limit(&mut printed, body_print_limit)
                .is_err()
            {
                printed = exchange.request.summary();
            }
            let _ = writeln!(message, "- Request #{}", exchange.sequence_index + 1);
            for line in printed.lines() {
                let _ = writeln!(message, "\t{}", line);
            }
        }
        message
    }
}

fn to_count<N>(value: N, what: &str) -> Result<usize, InvalidArgument>
where
    N: TryInto<usize> + Copy + std::fmt::Display,
{
    value.try_into().map_err(|_| {
        InvalidArgument(format!(
            "{} must be a non-negative integer, got {}",
            what, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::method;
    use std::sync::Arc;

    fn history_of(methods: &[&str]) -> HistoryStore {
        let history = HistoryStore::new();
        for (i, m) in methods.iter().enumerate() {
            history.append(
                Request::new(*m, "/sample"),
                ResponseTemplate::new(200).set_body_string(format!("r{}", i)),
            );
        }
        history
    }

    fn methods(exchanges: &[RecordedExchange]) -> Vec<String> {
        exchanges
            .iter()
            .map(|e| e.request().method.to_string())
            .collect()
    }

    #[test]
    fn take_last_keeps_chronological_order() {
        let history = history_of(&["GET", "POST", "DELETE", "HEAD"]);

        let taken = history.take_last(3).unwrap();

        assert_eq!(methods(&taken), vec!["POST", "DELETE", "HEAD"]);
    }

    #[test]
    fn take_first_and_last_are_capped_at_history_size() {
        let history = history_of(&["GET", "POST", "DELETE", "HEAD"]);

        assert_eq!(history.take_first(10).unwrap().len(), 4);
        assert_eq!(history.take_last(10usize).unwrap().len(), 4);
        assert_eq!(
            methods(&history.take_first(3).unwrap()),
            vec!["GET", "POST", "DELETE"]
        );
    }

    #[test]
    fn negative_counts_are_rejected() {
        let history = history_of(&["GET"]);

        assert!(history.take_first(-10).is_err());
        assert!(history.take_last(-10i64).is_err());
    }

    #[test]
    fn take_range_is_half_open() {
        let history = history_of(&["GET", "POST", "DELETE", "HEAD"]);

        let taken = history.take_range(1, 4).unwrap();

        assert_eq!(methods(&taken), vec!["POST", "DELETE", "HEAD"]);
        assert!(history.take_range(2, 2).unwrap().is_empty());
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let history = history_of(&["GET", "POST", "DELETE", "HEAD"]);

        assert!(history.take_range(5, 3).is_err());
        assert!(history.take_range(2, 5).is_err());
        assert!(history.take_range(-1, 2).is_err());
    }

    #[test]
    fn first_and_last_are_none_on_an_empty_history() {
        let history = HistoryStore::new();

        assert!(history.first().is_none());
        assert!(history.last().is_none());
        assert_eq!(history.describe(BodyPrintLimit::default()), "The server did not receive any request.");
    }

    #[test]
    fn take_all_matching_pairs_requests_with_their_responses() {
        let history = history_of(&["GET", "POST", "GET"]);

        let gets = history.take_all_matching(&method("GET"));

        assert_eq!(gets.len(), 2);
        assert_eq!(gets[0].response().body_string(), "r0");
        assert_eq!(gets[1].response().body_string(), "r2");
        assert_eq!(gets[1].sequence_index(), 2);
    }

    #[test]
    fn clear_restarts_the_sequence_indices() {
        let history = history_of(&["GET", "POST"]);

        history.clear();
        let index = history.append(Request::new("PUT", "/"), ResponseTemplate::new(200));

        assert_eq!(index, 0);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn snapshots_do_not_see_later_appends() {
        let history = history_of(&["GET"]);

        let snapshot = history.all();
        history.append(Request::new("POST", "/"), ResponseTemplate::new(200));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn concurrent_appends_are_all_recorded() {
        let history = Arc::new(HistoryStore::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let history = Arc::clone(&history);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        history.append(Request::new("GET", "/"), ResponseTemplate::new(200));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let indices: Vec<usize> = history.all().iter().map(|e| e.sequence_index()).collect();
        assert_eq!(indices, (0..400).collect::<Vec<_>>());
    }
}
