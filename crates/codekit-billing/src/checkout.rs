//! Stripe Checkout Integration
//!
//! Hosted subscription checkout: the client is redirected to Stripe and
//! comes back to the app's success or pricing page.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, CreateCheckoutSessionSubscriptionData,
    CustomerId,
};

use crate::error::{PaymentError, Result};
use crate::webhook::DEFAULT_TOLERANCE_SECS;

const DEFAULT_APP_URL: &str = "http://localhost:3000";

/// Base URL of the web app, used to build redirect targets
///
/// Reads `APP_URL`, then `NEXTAUTH_URL`, then falls back to localhost.
pub fn app_url_from_env() -> String {
    std::env::var("APP_URL")
        .or_else(|_| std::env::var("NEXTAUTH_URL"))
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| DEFAULT_APP_URL.into())
}

/// Billing interval of the Pro plan
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanInterval {
    #[default]
    Monthly,
    Yearly,
}

impl PlanInterval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    const fn env_var(self) -> &'static str {
        match self {
            Self::Monthly => "STRIPE_PRICE_MONTHLY",
            Self::Yearly => "STRIPE_PRICE_YEARLY",
        }
    }
}

impl FromStr for PlanInterval {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(PaymentError::InvalidRequest(format!(
                "Unknown priceType '{other}', expected monthly or yearly"
            ))),
        }
    }
}

/// Stripe credentials, price ids and redirect base
#[derive(Clone)]
pub struct BillingConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub price_monthly: Option<String>,
    pub price_yearly: Option<String>,
    pub app_url: String,

    /// Alternative API root, e.g. a local stripe-mock (`STRIPE_API_BASE`)
    pub api_base: Option<String>,

    /// Accepted webhook timestamp age (`STRIPE_WEBHOOK_TOLERANCE_SECS`)
    pub webhook_tolerance_secs: i64,
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("price_monthly", &self.price_monthly)
            .field("price_yearly", &self.price_yearly)
            .field("app_url", &self.app_url)
            .field("api_base", &self.api_base)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .finish_non_exhaustive()
    }
}

/// Stripe API override must be an absolute http(s) URL
fn validate_api_base(url: &str) -> Result<()> {
    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or_default();
    if host.is_empty() || host.starts_with('/') {
        return Err(PaymentError::Config(format!(
            "STRIPE_API_BASE must be an http(s) URL, got {url:?}"
        )));
    }
    Ok(())
}

impl BillingConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        let price = |interval: PlanInterval| {
            std::env::var(interval.env_var())
                .ok()
                .filter(|p| !p.trim().is_empty())
        };

        let api_base = std::env::var("STRIPE_API_BASE")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        if let Some(url) = &api_base {
            validate_api_base(url)?;
        }

        Ok(Self {
            secret_key,
            webhook_secret,
            price_monthly: price(PlanInterval::Monthly),
            price_yearly: price(PlanInterval::Yearly),
            app_url: app_url_from_env(),
            api_base,
            webhook_tolerance_secs: std::env::var("STRIPE_WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TOLERANCE_SECS),
        })
    }

    /// Stripe price id for an interval
    pub fn price_for(&self, interval: PlanInterval) -> Result<&str> {
        let price = match interval {
            PlanInterval::Monthly => self.price_monthly.as_deref(),
            PlanInterval::Yearly => self.price_yearly.as_deref(),
        };

        price.ok_or_else(|| {
            PaymentError::Config(format!(
                "Price ID for {} is not configured. Please add {} to the environment",
                interval.as_str(),
                interval.env_var()
            ))
        })
    }

    pub fn success_url(&self) -> String {
        format!(
            "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.app_url
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/pricing?canceled=true", self.app_url)
    }
}

/// Who is checking out, as far as the app knows
#[derive(Clone, Debug, Default)]
pub struct CheckoutCustomer {
    pub user_id: Option<String>,
    pub email: Option<String>,

    /// Stripe customer already linked to the user; reused so that one user
    /// never ends up split across several customers
    pub customer_id: Option<String>,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session ID
    pub id: String,

    /// URL to redirect user to
    pub url: String,

    pub interval: PlanInterval,
}

/// Stripe client wrapper
pub struct BillingClient {
    client: Client,
    config: BillingConfig,
}

impl BillingClient {
    pub fn new(config: BillingConfig) -> Self {
        Self {
            client: match config.api_base.as_deref() {
                Some(url) => Client::from_url(url, config.secret_key.clone()),
                None => Client::new(config.secret_key.clone()),
            },
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(BillingConfig::from_env()?))
    }

    pub const fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    pub(crate) const fn inner(&self) -> &Client {
        &self.client
    }

    /// Create a hosted subscription checkout session
    ///
    /// Fails with [`PaymentError::Config`] before contacting Stripe when no
    /// price is configured for `interval`.
    pub async fn create_checkout_session(
        &self,
        interval: PlanInterval,
        customer: &CheckoutCustomer,
    ) -> Result<CheckoutSession> {
        let price_id = self.config.price_for(interval)?.to_string();
        let existing: Option<CustomerId> = customer
            .customer_id
            .as_deref()
            .map(|id| {
                id.parse()
                    .map_err(|_| PaymentError::NoCustomer(id.to_string()))
            })
            .transpose()?;
        let success_url = self.config.success_url();
        let cancel_url = self.config.cancel_url();

        let mut metadata = HashMap::new();
        metadata.insert("priceType".to_string(), interval.as_str().to_string());
        if let Some(user_id) = &customer.user_id {
            metadata.insert("user_id".to_string(), user_id.clone());
        }

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Subscription);
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);
        params.client_reference_id = customer.user_id.as_deref();
        // Stripe accepts either an existing customer or an email to prefill
        match existing {
            Some(id) => params.customer = Some(id),
            None => params.customer_email = customer.email.as_deref(),
        }
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }]);
        // Copied onto the subscription so later subscription events carry the user
        params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
            metadata: Some(metadata.clone()),
            ..Default::default()
        });
        params.metadata = Some(metadata);

        tracing::info!(
            price_id = %price_id,
            interval = interval.as_str(),
            existing_customer = customer.customer_id.is_some(),
            "Creating checkout session"
        );

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        tracing::info!(session_id = %session.id, "Checkout session created");

        Ok(CheckoutSession {
            id: session.id.to_string(),
            url,
            interval,
        })
    }
}
