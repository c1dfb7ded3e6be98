use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for history generation.
///
/// Any error aborts the whole batch; callers never receive histories for a
/// subset of the population.
#[derive(Debug, Error)]
pub enum Error {
    /// Inconsistent inputs: mismatched population sizes, an MFP table that is
    /// malformed or lacks a transition reached during the walk.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid numeric parameter (negative length, empty population, ...).
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// A particle exceeded the configured per-segment step cap.
    #[error("simulation diverged: particle {particle} exceeded {steps} steps")]
    SimulationDiverged { particle: usize, steps: u64 },
}

impl Error {
    /// Shorthand for `Error::Configuration`.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}
