use http::Method;

/// A history query was called with arguments outside of the valid range.
///
/// Queries never clamp their arguments: a negative count or an inverted range is a mistake in
/// the test and it is reported as such.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid argument: {0}")]
pub struct InvalidArgument(pub(crate) String);

impl InvalidArgument {
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// The reason why a verification over the request history failed.
///
/// Each condition is its own variant, so tests can assert on the exact failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// No recorded request satisfied the matcher.
    #[error("Request not invoked: {matcher}{}\n{received}", method_suffix(.method))]
    NotInvoked {
        matcher: String,
        method: Option<Method>,
        received: String,
    },
    /// The number of matching requests is different from the expected one.
    #[error(
        "Request invocation count mismatch: {matcher}{}. Expected: {expected}, actual: {actual}\n{received}",
        method_suffix(.method)
    )]
    CountMismatch {
        matcher: String,
        method: Option<Method>,
        expected: u64,
        actual: u64,
        received: String,
    },
    /// Fewer requests than expected matched.
    #[error(
        "Request not invoked enough times: {matcher}{}. Expected at least: {expected}, actual: {actual}\n{received}",
        method_suffix(.method)
    )]
    InsufficientCount {
        matcher: String,
        method: Option<Method>,
        expected: u64,
        actual: u64,
        received: String,
    },
}

impl VerificationError {
    /// Number of matching requests found in the history.
    pub fn actual(&self) -> u64 {
        match self {
            VerificationError::NotInvoked { .. } => 0,
            VerificationError::CountMismatch { actual, .. }
            | VerificationError::InsufficientCount { actual, .. } => *actual,
        }
    }
}

fn method_suffix(method: &Option<Method>) -> String {
    match method {
        Some(method) => format!(" (method {})", method),
        None => String::new(),
    }
}
