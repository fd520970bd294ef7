//! Stripe Billing Portal
//!
//! Self-service subscription management for customers that already exist in
//! Stripe.

use stripe::{BillingPortalSession, CreateBillingPortalSession, CustomerId};

use crate::checkout::BillingClient;
use crate::error::{PaymentError, Result};

impl BillingClient {
    /// Where the portal sends the user back to
    pub fn portal_return_url(&self) -> String {
        format!("{}/dashboard", self.config().app_url)
    }

    /// Pricing page used when there is nothing to manage
    pub fn pricing_url(&self) -> String {
        format!("{}/pricing", self.config().app_url)
    }

    /// Create a billing-portal session for a known Stripe customer
    pub async fn create_portal_session(&self, customer_id: &str) -> Result<String> {
        let customer: CustomerId = customer_id
            .parse()
            .map_err(|_| PaymentError::NoCustomer(customer_id.to_string()))?;

        let return_url = self.portal_return_url();
        let mut params = CreateBillingPortalSession::new(customer);
        params.return_url = Some(&return_url);

        let session = BillingPortalSession::create(self.inner(), params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        tracing::info!(customer_id = %customer_id, session_id = %session.id, "Portal session created");

        Ok(session.url)
    }
}
