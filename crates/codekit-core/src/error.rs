//! Error Types

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A required credential or setting is missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller input is malformed or incomplete
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller's plan does not include the requested tool
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Free-tier daily allowance for a tool is used up
    #[error("Daily limit of {limit} reached for {tool}")]
    QuotaExceeded { tool: String, limit: u32 },

    /// Upstream provider throttled the request
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Upstream call did not finish in time
    #[error("Upstream timed out after {0}s")]
    Timeout(u64),

    /// Any other upstream failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// Stable machine-readable code for API responses
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "NOT_CONFIGURED",
            Self::Validation(_) => "INVALID_REQUEST",
            Self::Forbidden(_) => "PRO_REQUIRED",
            Self::QuotaExceeded { .. } => "DAILY_LIMIT",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Timeout(_) => "UPSTREAM_TIMEOUT",
            Self::Provider(_) => "UPSTREAM_ERROR",
            Self::Json(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to a user-facing message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(msg) => format!("AI service configuration error: {msg}"),
            Self::Validation(msg) => msg.clone(),
            Self::Forbidden(_) => "This tool requires a Pro subscription.".into(),
            Self::QuotaExceeded { tool, limit } => format!(
                "You've used all {limit} free {tool} requests for today. Upgrade to Pro for unlimited access."
            ),
            Self::RateLimited(_) => "Rate limit exceeded. Please try again in a moment.".into(),
            Self::Timeout(_) => "The AI service took too long to respond. Please try again.".into(),
            Self::Provider(msg) => msg.clone(),
            Self::Json(_) | Self::Other(_) => "Failed to generate response".into(),
        }
    }
}
