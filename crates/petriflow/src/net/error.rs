//! Error types for the net kernel

use thiserror::Error;

/// Failure raised by a user-supplied action, boxed at the kernel boundary.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while mutating places or driving a net
#[derive(Debug, Error)]
pub enum NetError {
    /// Direct deposit would push a bounded place past its capacity
    #[error("place {place} at capacity ({capacity})")]
    CapacityExceeded { place: String, capacity: usize },

    /// A removal asked for more tokens than the place holds
    #[error("not enough tokens in {place} (have {have}, need {need})")]
    Underflow {
        place: String,
        have: usize,
        need: usize,
    },

    /// The transition cannot currently fire
    ///
    /// Transient: the drivers absorb this outcome; it is surfaced only to
    /// direct callers of `fire` so tests can distinguish it.
    #[error("transition not ready")]
    NotReady,

    /// A user action failed; the driver aborts the net with this error
    #[error("action failed for {transition}: {source}")]
    ActionFailed {
        transition: String,
        #[source]
        source: ActionError,
    },

    /// The bounded driver hit its iteration bound without quiescence
    #[error("reached iteration limit ({0}) without quiescence")]
    IterationLimit(usize),

    /// Cancellation propagated from the driver's context
    #[error("cancelled")]
    Cancelled,

    /// A place id could not be resolved in the net
    #[error("unknown place: {0}")]
    UnknownPlace(String),
}

impl NetError {
    /// True for the transient not-ready outcome that schedulers absorb.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, NetError::NotReady)
    }
}
