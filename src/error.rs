use thiserror::Error;

/// Errors raised by the promise machinery itself.
///
/// Rejection reasons are whatever `E` a promise was declared with; the
/// variants here only reach a promise through `E: From<Error>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("a promise cannot be resolved with itself")]
    SelfResolution,

    #[error("iterator record has already been consumed")]
    IteratorConsumed,

    #[error("no job backend is supported on this host")]
    SchedulerUnavailable,

    #[error("job queue went idle before the promise settled")]
    Stalled,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
