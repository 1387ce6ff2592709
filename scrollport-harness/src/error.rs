use thiserror::Error;

/// Failures surfaced by the locator framework.
///
/// Never retried: a failed lookup is reported to the caller with a
/// description of every query that was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// A required locator found nothing. The payload enumerates every
    /// attempted query.
    #[error("failed to find element matching one of the following queries: {0}")]
    NoMatch(String),

    /// A locator was built with no queries at all.
    #[error("a harness query must contain at least one query")]
    EmptyQuery,
}
