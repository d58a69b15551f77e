use thiserror::Error;

/// Errors that can occur while building lattices or running the EM loop.
///
/// Words that cannot be aligned, letters missing from the table and letters
/// that lost all probability mass are not errors; they are reported through
/// [`crate::trainer::IterationReport`].
#[derive(Debug, Error, PartialEq)]
pub enum AlignError {
    /// A pronunciation contains a phone that cannot be represented as a
    /// lattice symbol (empty, or containing the cluster separator).
    #[error("malformed phone symbol {phone:?} in pronunciation")]
    MalformedPhone {
        /// The offending phone.
        phone: String,
    },

    /// The trainer configuration cannot be run.
    #[error("invalid trainer configuration: {0}")]
    InvalidConfig(String),

    /// Building a transducer from a table failed.
    #[error("fst construction failed: {0}")]
    Fst(String),

    /// The trainer already reached `Converged` or `Exhausted`.
    #[error("training already finished")]
    AlreadyFinished,
}

/// Result type alias for alignment operations.
pub type Result<T> = std::result::Result<T, AlignError>;
