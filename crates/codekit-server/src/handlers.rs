//! HTTP Handlers

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use codekit_billing::{
    CheckoutCustomer, EntitlementStore, PaymentError, PlanInterval, SubscriptionStatus,
    WebhookOutcome,
};
use codekit_core::{
    prompt::{catalog, ToolInfo},
    GatewayError, Tier, ToolId, ToolRequest, ToolResponse,
};

use crate::identity::Identity;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ai_configured: bool,
    pub billing_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default, rename = "priceType")]
    pub price_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Serialize)]
pub struct ToolUsage {
    pub tool: ToolId,
    pub used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renews_at: Option<DateTime<Utc>>,
    pub payment_failed: bool,
    pub usage: Vec<ToolUsage>,
}

// ============================================================================
// Error Mapping
// ============================================================================

fn error_response(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn gateway_error(e: &GatewayError) -> ApiError {
    let status = match e {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
        GatewayError::QuotaExceeded { .. } | GatewayError::RateLimited(_) => {
            StatusCode::TOO_MANY_REQUESTS
        }
        GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::Config(_)
        | GatewayError::Provider(_)
        | GatewayError::Json(_)
        | GatewayError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.user_message(), e.code())
}

fn payment_error(e: &PaymentError) -> ApiError {
    let status = match e {
        PaymentError::InvalidRequest(_) | PaymentError::WebhookSignature(_) => {
            StatusCode::BAD_REQUEST
        }
        PaymentError::NoCustomer(_) => StatusCode::NOT_FOUND,
        PaymentError::Stripe(_) => StatusCode::BAD_GATEWAY,
        PaymentError::Config(_) | PaymentError::WebhookParse(_) | PaymentError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, e.user_message(), e.code())
}

fn billing_disabled() -> ApiError {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "Payments not configured",
        "PAYMENTS_DISABLED",
    )
}

fn unauthenticated() -> ApiError {
    error_response(StatusCode::UNAUTHORIZED, "Unauthorized", "UNAUTHENTICATED")
}

/// Decode a JSON body; an empty body yields the default value
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {e}"),
            "INVALID_REQUEST",
        )
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        ai_configured: state.gateway.is_configured(),
        billing_configured: state.billing.is_some(),
    })
}

/// Tool catalog
pub async fn list_tools() -> Json<Vec<ToolInfo>> {
    Json(catalog())
}

/// Run one AI tool
pub async fn ai_handler(
    State(state): State<AppState>,
    Identity(caller): Identity,
    body: Bytes,
) -> Result<Json<ToolResponse>, ApiError> {
    let payload: ToolRequest = parse_body(&body)?;
    let response = state
        .gateway
        .generate(&payload, &caller)
        .await
        .map_err(|e| {
            tracing::warn!(tool = %payload.tool, code = e.code(), error = %e, "AI request rejected");
            gateway_error(&e)
        })?;

    Ok(Json(response))
}

/// Create a subscription checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    Identity(caller): Identity,
    body: Bytes,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let billing = state.billing.as_ref().ok_or_else(billing_disabled)?;

    // An empty body means the default plan
    let payload: CheckoutRequest = parse_body(&body)?;
    let interval = match payload.price_type.as_deref() {
        Some(s) => s.parse::<PlanInterval>().map_err(|e| payment_error(&e))?,
        None => PlanInterval::default(),
    };

    // Returning subscribers keep their Stripe customer
    let customer_id = match caller.user_id.as_deref() {
        Some(user_id) => state
            .entitlements
            .get_by_user(user_id)
            .map_err(|e| payment_error(&e))?
            .map(|e| e.customer_id),
        None => None,
    };

    let customer = CheckoutCustomer {
        user_id: caller.user_id,
        email: caller.email,
        customer_id,
    };

    let session = billing
        .create_checkout_session(interval, &customer)
        .await
        .map_err(|e| {
            tracing::error!(interval = interval.as_str(), error = %e, "Checkout error");
            payment_error(&e)
        })?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// Open the billing portal, or point at pricing when there is nothing to manage
pub async fn create_portal(
    State(state): State<AppState>,
    Identity(caller): Identity,
) -> Result<Json<PortalResponse>, ApiError> {
    let user_id = caller.user_id.ok_or_else(unauthenticated)?;
    let billing = state.billing.as_ref().ok_or_else(billing_disabled)?;

    let entitlement = state
        .entitlements
        .get_by_user(&user_id)
        .map_err(|e| payment_error(&e))?;

    let fallback = |message: &str| {
        Json(PortalResponse {
            url: billing.pricing_url(),
            message: Some(message.into()),
        })
    };

    let Some(entitlement) = entitlement else {
        return Ok(fallback("No active subscription found"));
    };

    match billing.create_portal_session(&entitlement.customer_id).await {
        Ok(url) => Ok(Json(PortalResponse { url, message: None })),
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Portal error");
            Ok(fallback("Unable to open the billing portal right now"))
        }
    }
}

/// Stripe webhook endpoint
///
/// Acknowledged only once the event is persisted; storage failures return
/// 500 so Stripe redelivers.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, ApiError> {
    let handler = state.webhooks.as_ref().ok_or_else(billing_disabled)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            error_response(StatusCode::BAD_REQUEST, "Invalid signature", "INVALID_SIGNATURE")
        })?;

    match handler.handle(&body, signature) {
        Ok(WebhookOutcome::Processed { event_id, outcome }) => {
            tracing::debug!(event_id = %event_id, ?outcome, "Webhook handled");
        }
        Ok(WebhookOutcome::Unprocessable { reason }) => {
            tracing::warn!(reason = %reason, "Webhook acknowledged without processing");
        }
        Err(e) => {
            tracing::error!(error = %e, code = e.code(), "Webhook error");
            return Err(payment_error(&e));
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

/// Current plan and today's usage for the caller
pub async fn get_entitlement(
    State(state): State<AppState>,
    Identity(caller): Identity,
) -> Result<Json<EntitlementResponse>, ApiError> {
    let Some(user_id) = caller.user_id.as_deref() else {
        return Err(unauthenticated());
    };

    let entitlement = state
        .entitlements
        .get_by_user(user_id)
        .map_err(|e| payment_error(&e))?;

    let today = match caller.usage_key() {
        Some(key) => state
            .gateway
            .usage()
            .today(&key)
            .map_err(|e| gateway_error(&e))?,
        None => HashMap::new(),
    };

    let (tier, status, renews_at, payment_failed) = entitlement.map_or(
        (Tier::Free, SubscriptionStatus::None, None, false),
        |e| (e.tier, e.status, e.renews_at, e.payment_failed),
    );

    let usage = ToolId::ALL
        .into_iter()
        .filter(|tool| tier.allows(*tool))
        .map(|tool| ToolUsage {
            tool,
            used: today.get(&tool).copied().unwrap_or(0),
            limit: match tier {
                Tier::Free => tool.free_daily_limit(),
                Tier::Pro => None,
            },
        })
        .collect();

    Ok(Json(EntitlementResponse {
        tier,
        status,
        renews_at,
        payment_failed,
        usage,
    }))
}
