use thiserror::Error;

/// Error taxonomy for the Analysis Orchestration Core.
///
/// These are error *kinds*, not exception types: most are handled locally
/// (the Facade retries/fails over, a node falls back) and never reach a
/// caller. Only `Config` and `InvalidRequest` are meant to propagate as
/// hard failures.
#[derive(Error, Debug, Clone)]
pub enum AocError {
    /// Network timeout, rate limit, or empty body from one upstream source.
    #[error("transient upstream error from {source_id}: {message}")]
    TransientUpstream { source_id: String, message: String },

    /// Every source in the Facade's failover list was exhausted.
    #[error("data unavailable for {operation}: all sources exhausted")]
    DataUnavailable { operation: String },

    /// A node hit its per-invocation tool-call budget.
    #[error("tool-call budget exceeded for node {node}: {used}/{budget}")]
    ToolBudgetExceeded {
        node: String,
        used: u32,
        budget: u32,
    },

    /// The model emitted non-JSON or malformed JSON where an artifact was expected.
    #[error("artifact parse failed for node {node}: {reason}")]
    ArtifactParseFailed { node: String, reason: String },

    /// A top-level deadline expired while work was in flight.
    #[error("cancelled by deadline during {stage}")]
    CancelledByDeadline { stage: String },

    /// A structural contract was violated (e.g. a position field leaked into
    /// the Policy artifact, or a breakdown doesn't sum to 1.0). The caller
    /// already normalised the artifact; this variant exists for logging.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Missing/malformed configuration or a required tool not registered.
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller's request itself was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AocError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AocError::Config(_) | AocError::InvalidRequest(_))
    }
}

pub type AocResult<T> = Result<T, AocError>;
