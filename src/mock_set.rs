use crate::{Mock, MockId, Request};
use log::{info, warn};
use std::sync::{Arc, RwLock};

/// The ordered set of [`Mock`]s registered on a [`Dispatcher`].
///
/// Registration order is preserved and it is the order in which matches are reported.
///
/// The set is copy-on-write: every mutation builds a new `Vec` and swaps it in, while
/// [`snapshot`] hands out a cheap `Arc` to the current one. A dispatch iterating over a
/// snapshot never observes a half-applied registration or removal, and it does not hold the
/// lock while evaluating matchers.
///
/// [`Dispatcher`]: crate::Dispatcher
/// [`snapshot`]: MockSet::snapshot
#[derive(Debug, Default)]
pub(crate) struct MockSet {
    mocks: RwLock<Arc<Vec<Mock>>>,
}

impl MockSet {
    pub(crate) fn new() -> MockSet {
        MockSet::default()
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<Mock>> {
        Arc::clone(&self.mocks.read().expect("Poisoned lock!"))
    }

    /// All registered mocks matching `request`, in registration order.
    pub(crate) fn matching(&self, request: &Request) -> Vec<Mock> {
        self.snapshot()
            .iter()
            .filter(|mock| mock.matches(request))
            .cloned()
            .collect()
    }

    /// Returns `true` if the mock was added.
    pub(crate) fn register(&self, mock: Mock) -> bool {
        if mock.n_responses() == 0 {
            warn!(
                "No responses were specified, the mock will not be registered: {}",
                mock.description()
            );
            return false;
        }
        let mut guard = self.mocks.write().expect("Poisoned lock!");
        if guard.iter().any(|m| m.id() == mock.id()) {
            info!("Mock already registered, ignoring: {}", mock.description());
            return false;
        }
        info!("Registering {}", mock.description());
        let mut mocks = Vec::with_capacity(guard.len() + 1);
        mocks.extend(guard.iter().cloned());
        mocks.push(mock);
        *guard = Arc::new(mocks);
        true
    }

    /// Returns `true` if a mock with the given identity was registered.
    pub(crate) fn remove(&self, id: MockId) -> bool {
        let mut guard = self.mocks.write().expect("Poisoned lock!");
        let Some(position) = guard.iter().position(|m| m.id() == id) else {
            info!("Mock {} is not registered, nothing to remove", id);
            return false;
        };
        info!("Removing {}", guard[position].description());
        let mut mocks = guard.as_ref().clone();
        mocks.remove(position);
        *guard = Arc::new(mocks);
        true
    }

    pub(crate) fn clear(&self) {
        info!("Removing all mocks");
        *self.mocks.write().expect("Poisoned lock!") = Arc::new(Vec::new());
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{any, method};
    use crate::ResponseTemplate;

    fn ok_mock() -> Mock {
        Mock::given(any()).respond_with(ResponseTemplate::new(200))
    }

    #[test]
    fn mocks_without_responses_are_not_registered() {
        let set = MockSet::new();

        let added = set.register(Mock::given(any()).respond_with_sequence(Vec::new()));

        assert!(!added);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn registering_the_same_mock_twice_is_ignored() {
        let set = MockSet::new();
        let mock = ok_mock();

        assert!(set.register(mock.clone()));
        assert!(!set.register(mock));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_reports_whether_the_mock_was_present() {
        let set = MockSet::new();
        let mock = ok_mock();
        set.register(mock.clone());

        assert!(set.remove(mock.id()));
        assert!(!set.remove(mock.id()));
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn registering_a_removed_mock_again_keeps_its_position_in_the_sequence() {
        let set = MockSet::new();
        let mock = Mock::given(any()).respond_with_sequence(vec![
            ResponseTemplate::new(200).set_body_string("p1"),
            ResponseTemplate::new(200).set_body_string("p2"),
        ]);
        set.register(mock.clone());
        mock.sequencer().next();

        set.remove(mock.id());
        set.register(mock.clone());

        assert_eq!(mock.sequencer().cursor(), 1);
    }

    #[test]
    fn snapshots_are_not_affected_by_later_mutations() {
        let set = MockSet::new();
        set.register(ok_mock());
        let snapshot = set.snapshot();

        set.register(ok_mock());
        set.clear();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn matches_are_returned_in_registration_order() {
        let set = MockSet::new();
        let first = ok_mock();
        let second = Mock::given(method("GET")).respond_with(ResponseTemplate::new(200));
        let third = Mock::given(method("POST")).respond_with(ResponseTemplate::new(200));
        set.register(first.clone());
        set.register(second.clone());
        set.register(third);

        let matched: Vec<MockId> = set
            .matching(&Request::new("GET", "/"))
            .iter()
            .map(Mock::id)
            .collect();

        assert_eq!(matched, vec![first.id(), second.id()]);
    }
}
