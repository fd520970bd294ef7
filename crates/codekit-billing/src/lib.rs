//! # codekit-billing
//!
//! Subscription billing and entitlements for codekit.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │   Pricing   │────▶│  Stripe Hosted  │────▶│   Success   │
//! │    page     │     │  Checkout Page  │     │    page     │
//! └─────────────┘     └────────┬────────┘     └─────────────┘
//!                              │ webhook (signed, at-least-once)
//!                              ▼
//!                     ┌─────────────────┐     ┌─────────────┐
//!                     │ WebhookHandler  │────▶│ Entitlement │◀── gateway tier lookup
//!                     │ verify + parse  │     │    Store    │
//!                     └─────────────────┘     └─────────────┘
//! ```
//!
//! Entitlements change only through verified events. Each event is applied
//! at most once (keyed by Stripe event id) and older events never overwrite
//! newer state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use codekit_billing::{BillingClient, CheckoutCustomer, PlanInterval};
//!
//! let client = BillingClient::from_env()?;
//! let session = client
//!     .create_checkout_session(PlanInterval::Monthly, &CheckoutCustomer::default())
//!     .await?;
//!
//! // Redirect user to: session.url
//! ```

mod checkout;
pub mod entitlement;
mod error;
mod portal;
pub mod webhook;

pub use checkout::{
    app_url_from_env, BillingClient, BillingConfig, CheckoutCustomer, CheckoutSession,
    PlanInterval,
};
pub use entitlement::{
    ApplyOutcome, Entitlement, EntitlementStore, EntitlementTiers, MemoryEntitlementStore,
    SubscriptionEvent, SubscriptionEventKind, SubscriptionStatus,
};
pub use error::{PaymentError, Result};
pub use webhook::{WebhookHandler, WebhookOutcome};
