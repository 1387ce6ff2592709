use thiserror::Error;

/// Programmer-contract violations surfaced by the core.
///
/// All variants are fatal: they fail fast at call time and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrollError {
    /// Invalid buffer bounds or a missing required collaborator.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A data repeater is already attached to this viewport.
    #[error("a data repeater is already attached to this viewport")]
    AlreadyAttached,

    /// A measurement was requested for items that are not currently rendered.
    #[error(
        "range {start}..{end} is not rendered (rendered range is {rendered_start}..{rendered_end})"
    )]
    OutOfRange {
        start: usize,
        end: usize,
        rendered_start: usize,
        rendered_end: usize,
    },
}
