//! Billing Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Billing-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Caller sent an unusable request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Caller has no billing relationship yet
    #[error("No billing customer for user {0}")]
    NoCustomer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Stable machine-readable code for API responses
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Stripe(_) => "BILLING_ERROR",
            Self::WebhookSignature(_) => "INVALID_SIGNATURE",
            Self::WebhookParse(_) => "INVALID_EVENT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::NoCustomer(_) => "NO_SUBSCRIPTION",
            Self::Config(_) => "NOT_CONFIGURED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Get user-friendly message
    ///
    /// Raw Stripe text is never shown to users; it is logged instead.
    pub fn user_message(&self) -> String {
        match self {
            Self::Stripe(_) => "Payment processing failed. Please try again.".into(),
            Self::WebhookSignature(_) => "Invalid signature".into(),
            Self::InvalidRequest(msg) | Self::Config(msg) => msg.clone(),
            Self::NoCustomer(_) => "No active subscription found".into(),
            Self::WebhookParse(_) | Self::Storage(_) => {
                "An error occurred processing your request.".into()
            }
        }
    }
}
