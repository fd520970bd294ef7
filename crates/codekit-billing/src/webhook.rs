//! Stripe Webhook Handling
//!
//! Verifies `Stripe-Signature`, parses the event envelope and folds
//! subscription lifecycle events into the entitlement store.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;

use crate::entitlement::{
    ApplyOutcome, EntitlementStore, SubscriptionEvent, SubscriptionEventKind, SubscriptionStatus,
};
use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload, matching Stripe's libraries
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header (`t=<ts>,v1=<hex>[,v1=...]`)
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::WebhookSignature("no v1 signature".into()));
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(PaymentError::WebhookSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("webhook secret: {e}")))?;
    mac.update(format!("{timestamp}.{payload}").as_bytes());

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::WebhookSignature("signature mismatch".into()))
    }
}

/// Build a `Stripe-Signature` header the way Stripe does
///
/// Used by tests and local tooling that replays events.
pub fn sign_payload(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: RawData,
}

#[derive(Deserialize)]
struct RawData {
    object: Value,
}

/// Id of a field that Stripe sends either as a string or an expanded object
fn expandable_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) => Some(id.clone()),
        Value::Object(obj) => obj.get("id")?.as_str().map(String::from),
        _ => None,
    }
}

fn str_field(object: &Value, pointer: &str) -> Option<String> {
    object
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn required(value: Option<String>, what: &str, event_type: &str) -> Result<String> {
    value.ok_or_else(|| PaymentError::WebhookParse(format!("{event_type}: missing {what}")))
}

/// Parse the verified JSON body into a [`SubscriptionEvent`]
pub fn parse_event(payload: &str) -> Result<SubscriptionEvent> {
    let raw: RawEvent =
        serde_json::from_str(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;
    let object = &raw.data.object;
    let event_type = raw.event_type.as_str();

    let kind = match event_type {
        "checkout.session.completed" => {
            let Some(subscription_id) = expandable_id(object.get("subscription")) else {
                // One-off payments have no subscription to track.
                return Ok(SubscriptionEvent {
                    id: raw.id,
                    created: raw.created,
                    kind: SubscriptionEventKind::Other {
                        event_type: raw.event_type,
                    },
                });
            };

            SubscriptionEventKind::CheckoutCompleted {
                customer_id: required(expandable_id(object.get("customer")), "customer", event_type)?,
                subscription_id,
                user_id: str_field(object, "/client_reference_id")
                    .or_else(|| str_field(object, "/metadata/user_id")),
                email: str_field(object, "/customer_details/email")
                    .or_else(|| str_field(object, "/customer_email")),
            }
        }

        "customer.subscription.created" | "customer.subscription.updated" => {
            // Newer API versions report the period end per subscription item.
            let current_period_end = object
                .get("current_period_end")
                .and_then(Value::as_i64)
                .or_else(|| {
                    object
                        .pointer("/items/data/0/current_period_end")
                        .and_then(Value::as_i64)
                });

            SubscriptionEventKind::SubscriptionUpdated {
                customer_id: required(expandable_id(object.get("customer")), "customer", event_type)?,
                subscription_id: required(str_field(object, "/id"), "id", event_type)?,
                status: SubscriptionStatus::parse(
                    object.get("status").and_then(Value::as_str).unwrap_or_default(),
                ),
                current_period_end,
                user_id: str_field(object, "/metadata/user_id"),
            }
        }

        "customer.subscription.deleted" => SubscriptionEventKind::SubscriptionDeleted {
            customer_id: required(expandable_id(object.get("customer")), "customer", event_type)?,
            subscription_id: required(str_field(object, "/id"), "id", event_type)?,
        },

        "invoice.payment_failed" => SubscriptionEventKind::PaymentFailed {
            customer_id: required(expandable_id(object.get("customer")), "customer", event_type)?,
            subscription_id: expandable_id(object.get("subscription")).or_else(|| {
                expandable_id(object.pointer("/parent/subscription_details/subscription"))
            }),
            invoice_id: required(str_field(object, "/id"), "id", event_type)?,
            final_attempt: object
                .get("next_payment_attempt")
                .is_none_or(Value::is_null),
        },

        _ => SubscriptionEventKind::Other {
            event_type: raw.event_type.clone(),
        },
    };

    Ok(SubscriptionEvent {
        id: raw.id,
        created: raw.created,
        kind,
    })
}

/// Result of handling one verified delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed {
        event_id: String,
        outcome: ApplyOutcome,
    },
    /// Signed correctly but not understood; acknowledged anyway
    Unprocessable { reason: String },
}

/// Webhook handler
pub struct WebhookHandler<S: EntitlementStore> {
    store: Arc<S>,
    secret: String,
    tolerance_secs: i64,
}

impl<S: EntitlementStore> WebhookHandler<S> {
    pub fn new(store: Arc<S>, secret: impl Into<String>) -> Self {
        Self {
            store,
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify, parse and apply one webhook delivery
    ///
    /// Signature failures are errors and touch nothing. Storage failures are
    /// errors so the provider redelivers. Everything else is acknowledged.
    pub fn handle(&self, payload: &str, signature: &str) -> Result<WebhookOutcome> {
        verify_signature(
            payload,
            signature,
            &self.secret,
            chrono::Utc::now().timestamp(),
            self.tolerance_secs,
        )?;

        let event = match parse_event(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Verified webhook could not be parsed");
                return Ok(WebhookOutcome::Unprocessable {
                    reason: e.to_string(),
                });
            }
        };

        log_event(&event);

        let outcome = self.store.apply(&event)?;
        match &outcome {
            ApplyOutcome::Applied(entitlement) => tracing::info!(
                event_id = %event.id,
                customer_id = %entitlement.customer_id,
                tier = %entitlement.tier,
                status = ?entitlement.status,
                "Entitlement updated"
            ),
            ApplyOutcome::Duplicate => {
                tracing::info!(event_id = %event.id, "Webhook already processed (duplicate)");
            }
            ApplyOutcome::Skipped(reason) => {
                tracing::debug!(event_id = %event.id, reason, "Webhook skipped");
            }
        }

        Ok(WebhookOutcome::Processed {
            event_id: event.id,
            outcome,
        })
    }
}

fn log_event(event: &SubscriptionEvent) {
    match &event.kind {
        SubscriptionEventKind::CheckoutCompleted {
            customer_id,
            subscription_id,
            ..
        } => tracing::info!(%customer_id, %subscription_id, "Checkout completed"),
        SubscriptionEventKind::SubscriptionUpdated {
            subscription_id,
            status,
            ..
        } => tracing::info!(%subscription_id, ?status, "Subscription updated"),
        SubscriptionEventKind::SubscriptionDeleted {
            subscription_id, ..
        } => tracing::info!(%subscription_id, "Subscription canceled"),
        SubscriptionEventKind::PaymentFailed {
            customer_id,
            invoice_id,
            final_attempt,
            ..
        } => tracing::warn!(
            %customer_id,
            %invoice_id,
            final_attempt,
            "Payment failed - customer needs to update billing details"
        ),
        SubscriptionEventKind::Other { event_type } => {
            tracing::debug!(%event_type, "Unhandled webhook event");
        }
    }
}
