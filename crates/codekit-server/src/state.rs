//! Application State

use std::sync::Arc;

use codekit_billing::{BillingClient, MemoryEntitlementStore, WebhookHandler};
use codekit_core::Gateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// AI tool gateway (holds the provider, tier lookup and usage meter)
    pub gateway: Arc<Gateway>,

    /// Entitlements, written by webhooks and read per request
    pub entitlements: Arc<MemoryEntitlementStore>,

    /// Stripe client (optional - None if not configured)
    pub billing: Option<Arc<BillingClient>>,

    /// Webhook receiver (present whenever billing is)
    pub webhooks: Option<Arc<WebhookHandler<MemoryEntitlementStore>>>,
}

impl AppState {
    pub fn new(
        gateway: Arc<Gateway>,
        entitlements: Arc<MemoryEntitlementStore>,
        billing: Option<Arc<BillingClient>>,
    ) -> Self {
        let webhooks = billing.as_ref().map(|client| {
            Arc::new(
                WebhookHandler::new(entitlements.clone(), client.webhook_secret())
                    .with_tolerance(client.config().webhook_tolerance_secs),
            )
        });

        Self {
            gateway,
            entitlements,
            billing,
            webhooks,
        }
    }
}
