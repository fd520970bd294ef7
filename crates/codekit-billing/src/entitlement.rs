//! Entitlement Management
//!
//! The durable record of which plan a billing customer is on. Records change
//! only through verified subscription events, folded in by [`reduce`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codekit_core::{Caller, GatewayError, Tier, TierResolver};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{PaymentError, Result};

/// Stripe subscription status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No subscription has been seen for this customer
    #[default]
    None,
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            _ => Self::None,
        }
    }

    /// Whether a subscription in this state keeps Pro access
    ///
    /// `past_due` still grants access while Stripe retries the payment.
    pub const fn grants_pro(self) -> bool {
        matches!(self, Self::Active | Self::Trialing | Self::PastDue)
    }
}

/// A verified subscription event from the billing provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionEvent {
    /// Provider event id, the idempotency key
    pub id: String,

    /// Provider creation time (unix seconds)
    pub created: i64,

    pub kind: SubscriptionEventKind,
}

/// What happened, reduced to the fields the entitlement needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionEventKind {
    /// Hosted checkout finished and a subscription exists
    CheckoutCompleted {
        customer_id: String,
        subscription_id: String,
        user_id: Option<String>,
        email: Option<String>,
    },

    /// Subscription created or changed
    SubscriptionUpdated {
        customer_id: String,
        subscription_id: String,
        status: SubscriptionStatus,
        current_period_end: Option<i64>,
        user_id: Option<String>,
    },

    /// Subscription ended
    SubscriptionDeleted {
        customer_id: String,
        subscription_id: String,
    },

    /// An invoice charge failed; `final_attempt` when Stripe will not retry
    PaymentFailed {
        customer_id: String,
        subscription_id: Option<String>,
        invoice_id: String,
        final_attempt: bool,
    },

    /// Any event type without an entitlement effect
    Other { event_type: String },
}

impl SubscriptionEventKind {
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            Self::CheckoutCompleted { customer_id, .. }
            | Self::SubscriptionUpdated { customer_id, .. }
            | Self::SubscriptionDeleted { customer_id, .. }
            | Self::PaymentFailed { customer_id, .. } => Some(customer_id),
            Self::Other { .. } => None,
        }
    }

    const fn user_id(&self) -> Option<&String> {
        match self {
            Self::CheckoutCompleted { user_id, .. } | Self::SubscriptionUpdated { user_id, .. } => {
                user_id.as_ref()
            }
            _ => None,
        }
    }
}

/// Plan state of one billing customer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub customer_id: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub subscription_id: Option<String>,
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub renews_at: Option<DateTime<Utc>>,

    /// Last charge failed and has not been followed by a recovery
    pub payment_failed: bool,

    /// Creation time of the newest applied event (unix seconds)
    pub last_event_at: i64,

    pub updated_at: DateTime<Utc>,
}

impl Entitlement {
    /// Free-tier record for a customer with no events applied yet
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            user_id: None,
            email: None,
            subscription_id: None,
            tier: Tier::Free,
            status: SubscriptionStatus::None,
            renews_at: None,
            payment_failed: false,
            last_event_at: 0,
            updated_at: Utc::now(),
        }
    }

    fn is_other_subscription(&self, subscription_id: &str) -> bool {
        self.subscription_id
            .as_deref()
            .is_some_and(|current| current != subscription_id)
    }
}

/// Event ids are remembered this long past the newest event seen. Stripe
/// retries a delivery for up to three days; anything older falls to the
/// stale-event check in [`reduce`].
pub const DEDUPE_WINDOW_SECS: i64 = 4 * 24 * 60 * 60;

/// Result of folding one event into an entitlement
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reduction {
    /// Persist this new state
    Apply(Entitlement),
    /// Event is valid but must not change state
    Skip(&'static str),
}

/// Fold a subscription event into the current entitlement
///
/// Pure: no I/O, no clock reads beyond `now` for `updated_at`. Events older
/// than the newest applied one only contribute identity links.
pub fn reduce(
    current: Option<&Entitlement>,
    event: &SubscriptionEvent,
    now: DateTime<Utc>,
) -> Reduction {
    let Some(customer_id) = event.kind.customer_id() else {
        return Reduction::Skip("no entitlement effect");
    };

    let before = current
        .cloned()
        .unwrap_or_else(|| Entitlement::new(customer_id));
    let mut next = before.clone();

    // Identity links are monotonic and safe to take from any event.
    if let Some(user_id) = event.kind.user_id() {
        next.user_id.get_or_insert_with(|| user_id.clone());
    }
    if let SubscriptionEventKind::CheckoutCompleted {
        email: Some(email), ..
    } = &event.kind
    {
        next.email.get_or_insert_with(|| email.clone());
    }

    // Equal timestamps are applied in arrival order.
    if current.is_some() && event.created < before.last_event_at {
        return identity_only(&before, next, now, "stale event");
    }

    match &event.kind {
        SubscriptionEventKind::CheckoutCompleted {
            subscription_id, ..
        } => {
            next.subscription_id = Some(subscription_id.clone());
            next.tier = Tier::Pro;
            next.status = SubscriptionStatus::Active;
            next.payment_failed = false;
        }

        SubscriptionEventKind::SubscriptionUpdated {
            subscription_id,
            status,
            current_period_end,
            ..
        } => {
            // `incomplete` precedes the first payment, so it cannot follow a grant.
            if before.tier == Tier::Pro && *status == SubscriptionStatus::Incomplete {
                return identity_only(&before, next, now, "pre-payment status");
            }
            if before.tier == Tier::Pro
                && before.is_other_subscription(subscription_id)
                && !status.grants_pro()
            {
                return identity_only(&before, next, now, "superseded subscription");
            }
            next.subscription_id = Some(subscription_id.clone());
            next.status = *status;
            next.tier = if status.grants_pro() { Tier::Pro } else { Tier::Free };
            next.renews_at = current_period_end.and_then(|ts| DateTime::from_timestamp(ts, 0));
            next.payment_failed = *status == SubscriptionStatus::PastDue;
        }

        SubscriptionEventKind::SubscriptionDeleted { subscription_id, .. } => {
            if before.is_other_subscription(subscription_id) {
                return identity_only(&before, next, now, "superseded subscription");
            }
            next.tier = Tier::Free;
            next.status = SubscriptionStatus::Canceled;
            next.renews_at = None;
        }

        SubscriptionEventKind::PaymentFailed {
            subscription_id,
            final_attempt,
            ..
        } => {
            if subscription_id
                .as_deref()
                .is_some_and(|s| before.is_other_subscription(s))
            {
                return identity_only(&before, next, now, "superseded subscription");
            }
            next.payment_failed = true;
            if *final_attempt {
                next.tier = Tier::Free;
                next.status = SubscriptionStatus::Unpaid;
            }
        }

        SubscriptionEventKind::Other { .. } => return Reduction::Skip("no entitlement effect"),
    }

    next.last_event_at = event.created;
    next.updated_at = now;
    Reduction::Apply(next)
}

/// Keep only the identity links an otherwise ignored event carried
fn identity_only(
    before: &Entitlement,
    mut next: Entitlement,
    now: DateTime<Utc>,
    reason: &'static str,
) -> Reduction {
    if next == *before {
        Reduction::Skip(reason)
    } else {
        next.updated_at = now;
        Reduction::Apply(next)
    }
}

/// Which of a user's customers stands for them: Pro first, then the newest
fn link_rank(e: &Entitlement) -> (bool, i64, &str) {
    (e.tier == Tier::Pro, e.last_event_at, &e.customer_id)
}

/// What `apply` did with an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(Entitlement),
    /// Event id was already processed
    Duplicate,
    Skipped(&'static str),
}

/// Entitlement storage trait
pub trait EntitlementStore: Send + Sync {
    /// Get the entitlement linked to an app user
    ///
    /// A user with several billing customers resolves to the Pro one, or to
    /// the most recently active one when none is Pro.
    fn get_by_user(&self, user_id: &str) -> Result<Option<Entitlement>>;

    /// Get the entitlement of a billing customer
    fn get_by_customer(&self, customer_id: &str) -> Result<Option<Entitlement>>;

    /// Deduplicate on event id, reduce and persist, atomically
    fn apply(&self, event: &SubscriptionEvent) -> Result<ApplyOutcome>;
}

#[derive(Default)]
struct StoreState {
    by_customer: HashMap<String, Entitlement>,
    by_user: HashMap<String, String>,

    /// Processed event id -> event creation time
    processed: HashMap<String, i64>,
    newest_event_at: i64,
}

impl StoreState {
    fn remember(&mut self, event: &SubscriptionEvent) {
        if event.created > self.newest_event_at {
            self.newest_event_at = event.created;
            let horizon = event.created - DEDUPE_WINDOW_SECS;
            self.processed.retain(|_, created| *created >= horizon);
        }
        self.processed.insert(event.id.clone(), event.created);
    }

    fn relink(&mut self, user_id: &str) {
        let best = self
            .by_customer
            .values()
            .filter(|e| e.user_id.as_deref() == Some(user_id))
            .max_by(|a, b| link_rank(a).cmp(&link_rank(b)))
            .map(|e| e.customer_id.clone());

        if let Some(customer_id) = best {
            self.by_user.insert(user_id.to_string(), customer_id);
        }
    }
}

/// In-memory entitlement store (for development and tests)
///
/// One lock covers dedupe, read and write, which serializes concurrent
/// deliveries for the same customer.
#[derive(Default)]
pub struct MemoryEntitlementStore {
    state: Mutex<StoreState>,
}

impl MemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| PaymentError::Storage("entitlement store lock poisoned".into()))
    }
}

impl EntitlementStore for MemoryEntitlementStore {
    fn get_by_user(&self, user_id: &str) -> Result<Option<Entitlement>> {
        let state = self.lock()?;
        Ok(state
            .by_user
            .get(user_id)
            .and_then(|customer| state.by_customer.get(customer))
            .cloned())
    }

    fn get_by_customer(&self, customer_id: &str) -> Result<Option<Entitlement>> {
        Ok(self.lock()?.by_customer.get(customer_id).cloned())
    }

    fn apply(&self, event: &SubscriptionEvent) -> Result<ApplyOutcome> {
        let mut state = self.lock()?;

        if state.processed.contains_key(&event.id) {
            return Ok(ApplyOutcome::Duplicate);
        }
        state.remember(event);

        let current = event
            .kind
            .customer_id()
            .and_then(|customer| state.by_customer.get(customer));

        match reduce(current, event, Utc::now()) {
            Reduction::Apply(entitlement) => {
                state
                    .by_customer
                    .insert(entitlement.customer_id.clone(), entitlement.clone());
                if let Some(user_id) = &entitlement.user_id {
                    state.relink(user_id);
                }
                Ok(ApplyOutcome::Applied(entitlement))
            }
            Reduction::Skip(reason) => Ok(ApplyOutcome::Skipped(reason)),
        }
    }
}

/// Adapts an [`EntitlementStore`] to the gateway's [`TierResolver`]
pub struct EntitlementTiers<S: EntitlementStore> {
    store: Arc<S>,
}

impl<S: EntitlementStore> EntitlementTiers<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: EntitlementStore> TierResolver for EntitlementTiers<S> {
    async fn tier_for(&self, caller: &Caller) -> codekit_core::Result<Tier> {
        let Some(user_id) = caller.user_id.as_deref() else {
            return Ok(Tier::Free);
        };

        self.store
            .get_by_user(user_id)
            .map(|e| e.map_or(Tier::Free, |e| e.tier))
            .map_err(|e| GatewayError::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, created: i64, kind: SubscriptionEventKind) -> SubscriptionEvent {
        SubscriptionEvent {
            id: id.into(),
            created,
            kind,
        }
    }

    fn completed(id: &str, created: i64) -> SubscriptionEvent {
        event(
            id,
            created,
            SubscriptionEventKind::CheckoutCompleted {
                customer_id: "cus_1".into(),
                subscription_id: "sub_1".into(),
                user_id: Some("user_1".into()),
                email: Some("dev@example.com".into()),
            },
        )
    }

    fn updated(id: &str, created: i64, sub: &str, status: &str) -> SubscriptionEvent {
        event(
            id,
            created,
            SubscriptionEventKind::SubscriptionUpdated {
                customer_id: "cus_1".into(),
                subscription_id: sub.into(),
                status: SubscriptionStatus::parse(status),
                current_period_end: Some(1_800_000_000),
                user_id: None,
            },
        )
    }

    fn deleted(id: &str, created: i64, sub: &str) -> SubscriptionEvent {
        event(
            id,
            created,
            SubscriptionEventKind::SubscriptionDeleted {
                customer_id: "cus_1".into(),
                subscription_id: sub.into(),
            },
        )
    }

    fn failed(id: &str, created: i64, final_attempt: bool) -> SubscriptionEvent {
        event(
            id,
            created,
            SubscriptionEventKind::PaymentFailed {
                customer_id: "cus_1".into(),
                subscription_id: Some("sub_1".into()),
                invoice_id: "in_1".into(),
                final_attempt,
            },
        )
    }

    fn applied(reduction: Reduction) -> Entitlement {
        match reduction {
            Reduction::Apply(e) => e,
            Reduction::Skip(reason) => panic!("expected Apply, got Skip({reason})"),
        }
    }

    #[test]
    fn test_checkout_completed_grants_pro() {
        let e = applied(reduce(None, &completed("evt_1", 100), Utc::now()));
        assert_eq!(e.tier, Tier::Pro);
        assert_eq!(e.user_id.as_deref(), Some("user_1"));
        assert_eq!(e.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(e.last_event_at, 100);
    }

    #[test]
    fn test_lifecycle() {
        let e = applied(reduce(None, &completed("evt_1", 100), Utc::now()));
        let e = applied(reduce(Some(&e), &updated("evt_2", 110, "sub_1", "active"), Utc::now()));
        assert_eq!(e.tier, Tier::Pro);
        assert_eq!(e.renews_at.unwrap().timestamp(), 1_800_000_000);

        let e = applied(reduce(Some(&e), &updated("evt_3", 120, "sub_1", "past_due"), Utc::now()));
        assert_eq!(e.tier, Tier::Pro);
        assert!(e.payment_failed);

        let e = applied(reduce(Some(&e), &deleted("evt_4", 130, "sub_1"), Utc::now()));
        assert_eq!(e.tier, Tier::Free);
        assert_eq!(e.status, SubscriptionStatus::Canceled);
        assert!(e.renews_at.is_none());
        assert_eq!(e.user_id.as_deref(), Some("user_1"));
    }

    #[test]
    fn test_stale_event_does_not_resurrect() {
        let e = applied(reduce(None, &completed("evt_1", 100), Utc::now()));
        let e = applied(reduce(Some(&e), &deleted("evt_3", 200, "sub_1"), Utc::now()));

        let late = updated("evt_2", 150, "sub_1", "active");
        assert_eq!(reduce(Some(&e), &late, Utc::now()), Reduction::Skip("stale event"));
    }

    #[test]
    fn test_late_checkout_still_links_user() {
        let e = applied(reduce(None, &updated("evt_2", 150, "sub_1", "active"), Utc::now()));
        assert!(e.user_id.is_none());

        let e = applied(reduce(Some(&e), &completed("evt_1", 100), Utc::now()));
        assert_eq!(e.user_id.as_deref(), Some("user_1"));
        assert_eq!(e.tier, Tier::Pro);
        assert_eq!(e.last_event_at, 150);
    }

    #[test]
    fn test_payment_failure_terminal_only_downgrades() {
        let e = applied(reduce(None, &completed("evt_1", 100), Utc::now()));

        let retrying = applied(reduce(Some(&e), &failed("evt_2", 110, false), Utc::now()));
        assert_eq!(retrying.tier, Tier::Pro);
        assert!(retrying.payment_failed);

        let terminal = applied(reduce(Some(&retrying), &failed("evt_3", 120, true), Utc::now()));
        assert_eq!(terminal.tier, Tier::Free);
        assert_eq!(terminal.status, SubscriptionStatus::Unpaid);
    }

    #[test]
    fn test_old_subscription_deletion_is_superseded() {
        let e = applied(reduce(None, &completed("evt_1", 100), Utc::now()));
        let e = applied(reduce(Some(&e), &updated("evt_2", 110, "sub_2", "active"), Utc::now()));
        assert_eq!(e.subscription_id.as_deref(), Some("sub_2"));

        let old = deleted("evt_3", 120, "sub_1");
        assert_eq!(
            reduce(Some(&e), &old, Utc::now()),
            Reduction::Skip("superseded subscription")
        );
    }

    #[test]
    fn test_other_event_is_noop() {
        let other = event(
            "evt_9",
            100,
            SubscriptionEventKind::Other {
                event_type: "charge.succeeded".into(),
            },
        );
        assert!(matches!(reduce(None, &other, Utc::now()), Reduction::Skip(_)));
    }

    #[test]
    fn test_store_deduplicates_event_ids() {
        let store = MemoryEntitlementStore::new();
        assert!(matches!(
            store.apply(&completed("evt_1", 100)).unwrap(),
            ApplyOutcome::Applied(_)
        ));
        let before = store.get_by_customer("cus_1").unwrap().unwrap();

        assert_eq!(store.apply(&completed("evt_1", 100)).unwrap(), ApplyOutcome::Duplicate);
        assert_eq!(store.get_by_customer("cus_1").unwrap().unwrap(), before);
    }

    #[test]
    fn test_store_indexes_by_user() {
        let store = MemoryEntitlementStore::new();
        store.apply(&completed("evt_1", 100)).unwrap();

        let e = store.get_by_user("user_1").unwrap().unwrap();
        assert_eq!(e.customer_id, "cus_1");
        assert!(store.get_by_user("user_2").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_redelivery_applies_once() {
        let store = Arc::new(MemoryEntitlementStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.apply(&completed("evt_1", 100)).unwrap())
            })
            .collect();

        let applied = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| matches!(o, ApplyOutcome::Applied(_)))
            .count();
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn test_tier_resolver() {
        let store = Arc::new(MemoryEntitlementStore::new());
        let tiers = EntitlementTiers::new(store.clone());

        assert_eq!(tiers.tier_for(&Caller::user("user_1")).await.unwrap(), Tier::Free);
        store.apply(&completed("evt_1", 100)).unwrap();
        assert_eq!(tiers.tier_for(&Caller::user("user_1")).await.unwrap(), Tier::Pro);
        assert_eq!(tiers.tier_for(&Caller::anonymous()).await.unwrap(), Tier::Free);

        store.apply(&deleted("evt_2", 200, "sub_1")).unwrap();
        assert_eq!(tiers.tier_for(&Caller::user("user_1")).await.unwrap(), Tier::Free);
    }

    fn checkout_for(id: &str, created: i64, customer: &str, sub: &str) -> SubscriptionEvent {
        event(
            id,
            created,
            SubscriptionEventKind::CheckoutCompleted {
                customer_id: customer.into(),
                subscription_id: sub.into(),
                user_id: Some("user_1".into()),
                email: None,
            },
        )
    }

    fn deleted_for(id: &str, created: i64, customer: &str, sub: &str) -> SubscriptionEvent {
        event(
            id,
            created,
            SubscriptionEventKind::SubscriptionDeleted {
                customer_id: customer.into(),
                subscription_id: sub.into(),
            },
        )
    }

    #[test]
    fn test_ended_old_customer_keeps_user_on_active_one() {
        let store = MemoryEntitlementStore::new();
        store.apply(&checkout_for("evt_1", 100, "cus_1", "sub_1")).unwrap();
        store.apply(&checkout_for("evt_2", 200, "cus_2", "sub_2")).unwrap();
        store.apply(&deleted_for("evt_3", 300, "cus_1", "sub_1")).unwrap();

        let e = store.get_by_user("user_1").unwrap().unwrap();
        assert_eq!(e.customer_id, "cus_2");
        assert_eq!(e.tier, Tier::Pro);
        assert_eq!(store.get_by_customer("cus_1").unwrap().unwrap().tier, Tier::Free);
    }

    #[test]
    fn test_ended_new_customer_falls_back_to_active_old_one() {
        let store = MemoryEntitlementStore::new();
        store.apply(&checkout_for("evt_1", 100, "cus_1", "sub_1")).unwrap();
        store.apply(&checkout_for("evt_2", 200, "cus_2", "sub_2")).unwrap();
        assert_eq!(store.get_by_user("user_1").unwrap().unwrap().customer_id, "cus_2");

        store.apply(&deleted_for("evt_3", 300, "cus_2", "sub_2")).unwrap();
        let e = store.get_by_user("user_1").unwrap().unwrap();
        assert_eq!(e.customer_id, "cus_1");
        assert_eq!(e.tier, Tier::Pro);
    }

    #[test]
    fn test_all_ended_resolves_to_latest_customer() {
        let store = MemoryEntitlementStore::new();
        store.apply(&checkout_for("evt_1", 100, "cus_1", "sub_1")).unwrap();
        store.apply(&checkout_for("evt_2", 200, "cus_2", "sub_2")).unwrap();
        store.apply(&deleted_for("evt_3", 300, "cus_2", "sub_2")).unwrap();
        store.apply(&deleted_for("evt_4", 400, "cus_1", "sub_1")).unwrap();

        let e = store.get_by_user("user_1").unwrap().unwrap();
        assert_eq!(e.customer_id, "cus_1");
        assert_eq!(e.tier, Tier::Free);
    }

    #[test]
    fn test_incomplete_after_checkout_in_same_second() {
        // Stripe may deliver subscription.created (incomplete) after checkout
        // completion even though both carry the same timestamp.
        let e = applied(reduce(None, &completed("evt_2", 100), Utc::now()));
        let late = updated("evt_1", 100, "sub_1", "incomplete");
        assert_eq!(
            reduce(Some(&e), &late, Utc::now()),
            Reduction::Skip("pre-payment status")
        );

        // In delivery order the grant still wins.
        let e = applied(reduce(None, &updated("evt_1", 100, "sub_1", "incomplete"), Utc::now()));
        assert_eq!(e.tier, Tier::Free);
        assert_eq!(e.status, SubscriptionStatus::Incomplete);
        let e = applied(reduce(Some(&e), &completed("evt_2", 100), Utc::now()));
        assert_eq!(e.tier, Tier::Pro);
    }

    #[test]
    fn test_ignored_event_still_links_user() {
        let e = applied(reduce(None, &completed("evt_1", 100), Utc::now()));
        let mut e = applied(reduce(Some(&e), &updated("evt_2", 110, "sub_2", "active"), Utc::now()));
        e.user_id = None;

        let old = event(
            "evt_3",
            120,
            SubscriptionEventKind::SubscriptionUpdated {
                customer_id: "cus_1".into(),
                subscription_id: "sub_1".into(),
                status: SubscriptionStatus::Canceled,
                current_period_end: None,
                user_id: Some("user_1".into()),
            },
        );
        let linked = applied(reduce(Some(&e), &old, Utc::now()));
        assert_eq!(linked.user_id.as_deref(), Some("user_1"));
        assert_eq!(linked.subscription_id.as_deref(), Some("sub_2"));
        assert_eq!(linked.tier, Tier::Pro);
    }

    #[test]
    fn test_processed_ids_are_pruned_past_window() {
        let store = MemoryEntitlementStore::new();
        store.apply(&completed("evt_1", 100)).unwrap();
        store
            .apply(&updated("evt_2", 100 + DEDUPE_WINDOW_SECS + 1, "sub_1", "active"))
            .unwrap();

        {
            let state = store.lock().unwrap();
            assert_eq!(state.processed.len(), 1);
            assert!(state.processed.contains_key("evt_2"));
        }

        // A redelivery of the forgotten event is rejected as stale instead.
        let before = store.get_by_customer("cus_1").unwrap();
        assert_eq!(
            store.apply(&completed("evt_1", 100)).unwrap(),
            ApplyOutcome::Skipped("stale event")
        );
        assert_eq!(store.get_by_customer("cus_1").unwrap(), before);
    }
}
