use crate::ResponseTemplate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// An ordered list of canned responses for a single [`Mock`], served one after the other.
///
/// Each call to [`next`] returns the response under the cursor and moves the cursor forward by
/// one. Once the last response has been reached the cursor stops moving: the last response is
/// replayed for every subsequent matching request.
///
/// The cursor is advanced with a compare-and-swap loop - two concurrent callers can never be
/// handed the same not-yet-served response.
///
/// [`Mock`]: crate::Mock
/// [`next`]: ResponseSequencer::next
#[derive(Debug, Default)]
pub struct ResponseSequencer {
    responses: RwLock<Vec<ResponseTemplate>>,
    cursor: AtomicUsize,
}

impl ResponseSequencer {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = ResponseTemplate>,
    {
        Self {
            responses: RwLock::new(responses.into_iter().collect()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Append `responses` at the end of the sequence.
    ///
    /// If the sequence had already been exhausted, the next call to [`next`] still returns the
    /// previous last response (the cursor sits on it) and then moves on to the new ones.
    ///
    /// [`next`]: ResponseSequencer::next
    pub fn add_responses<I>(&self, responses: I)
    where
        I: IntoIterator<Item = ResponseTemplate>,
    {
        self.responses
            .write()
            .expect("Poisoned lock!")
            .extend(responses);
    }

    /// Return the response under the cursor and advance it, saturating at the last index.
    ///
    /// Returns `None` if the sequence is empty.
    pub fn next(&self) -> Option<ResponseTemplate> {
        let responses = self.responses.read().expect("Poisoned lock!");
        let last = responses.len().checked_sub(1)?;
        let index = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                if cursor < last {
                    Some(cursor + 1)
                } else {
                    None
                }
            }) {
            Ok(previous) => previous,
            // Already on the last response: stay there.
            Err(current) => current.min(last),
        };
        responses.get(index).cloned()
    }

    /// The position of the response that will be served by the next call to [`next`].
    ///
    /// [`next`]: ResponseSequencer::next
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Rewind the sequence: the next call to [`next`] returns the first response again.
    ///
    /// [`next`]: ResponseSequencer::next
    pub fn reset_cursor(&self) {
        self.cursor.store(0, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.responses.read().expect("Poisoned lock!").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
