//! Status condition bookkeeping
//!
//! A condition list holds at most one entry per type. `lastTransitionTime`
//! moves only when a condition's status moves, so watchers can tell how long
//! an AppOnboarding has been in its current state.

use chrono::{DateTime, Utc};

use crate::crd::{Condition, ConditionStatus};

/// Aggregate readiness
pub const READY: &str = "Ready";
/// HTTPRoute readiness
pub const ROUTING_READY: &str = "RoutingReady";
/// SecurityPolicy readiness
pub const AUTH_READY: &str = "AuthReady";

/// Condition reasons, also used as Event reasons
pub mod reasons {
    /// Work is in progress
    pub const RECONCILING: &str = "Reconciling";
    /// Everything is in place
    pub const RECONCILED: &str = "Reconciled";

    /// Namespace lacks the opt-in label
    pub const NAMESPACE_NOT_OPTED_IN: &str = "NamespaceNotOptedIn";
    /// Backend Service missing or port mismatch
    pub const SERVICE_NOT_FOUND: &str = "ServiceNotFound";
    /// Namespace and Service checks passed
    pub const VALIDATED: &str = "Validated";

    /// No routing block in spec
    pub const ROUTING_NOT_CONFIGURED: &str = "RoutingNotConfigured";
    /// Selected Gateway is absent
    pub const GATEWAY_NOT_FOUND: &str = "GatewayNotFound";
    /// HTTPRoute could not be created
    pub const CREATION_FAILED: &str = "CreationFailed";
    /// HTTPRoute could not be updated
    pub const UPDATE_FAILED: &str = "UpdateFailed";
    /// HTTPRoute is in place
    pub const HTTP_ROUTE_READY: &str = "HTTPRouteReady";

    /// Auth is disabled
    pub const AUTH_DISABLED: &str = "AuthDisabled";
    /// Provider identifier unknown or not enabled
    pub const INVALID_PROVIDER: &str = "InvalidProvider";
    /// Client provisioning failed
    pub const PROVISIONING_FAILED: &str = "ProvisioningFailed";
    /// Auth prerequisites missing
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
    /// SecurityPolicy could not be built or written
    pub const SECURITY_POLICY_FAILED: &str = "SecurityPolicyFailed";
    /// SecurityPolicy is in place
    pub const AUTH_CONFIGURED: &str = "AuthConfigured";
}

/// Set a condition, stamping the current time on status transitions.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: impl Into<String>,
    generation: Option<i64>,
) {
    set_condition_at(
        conditions,
        type_,
        status,
        reason,
        message,
        generation,
        Utc::now(),
    );
}

/// Set a condition using `now` as the transition time.
///
/// If a condition of `type_` exists with the same status only its reason,
/// message and observed generation are refreshed.
pub fn set_condition_at(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: impl Into<String>,
    generation: Option<i64>,
    now: DateTime<Utc>,
) {
    let message = message.into();
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
        if existing.status != status {
            existing.last_transition_time = now;
        }
        existing.status = status;
        existing.reason = reason.to_string();
        existing.message = message;
        existing.observed_generation = generation;
        return;
    }

    conditions.push(Condition {
        type_: type_.to_string(),
        status,
        reason: reason.to_string(),
        message,
        last_transition_time: now,
        observed_generation: generation,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn first_set_stamps_transition_time() {
        let mut conditions = Vec::new();
        set_condition_at(
            &mut conditions,
            READY,
            ConditionStatus::Unknown,
            reasons::RECONCILING,
            "starting",
            Some(1),
            t0(),
        );
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].last_transition_time, t0());
        assert_eq!(conditions[0].observed_generation, Some(1));
    }

    /// Story: A healthy app is re-verified every few minutes
    ///
    /// Each pass sets Ready=True again. The transition time must keep
    /// pointing at the moment the app first became ready.
    #[test]
    fn story_same_status_keeps_transition_time() {
        let mut conditions = Vec::new();
        set_condition_at(
            &mut conditions,
            READY,
            ConditionStatus::True,
            reasons::RECONCILED,
            "ok",
            Some(1),
            t0(),
        );
        set_condition_at(
            &mut conditions,
            READY,
            ConditionStatus::True,
            reasons::VALIDATED,
            "still ok",
            Some(2),
            t0() + Duration::minutes(5),
        );

        assert_eq!(conditions.len(), 1);
        let ready = &conditions[0];
        assert_eq!(ready.last_transition_time, t0());
        assert_eq!(ready.reason, reasons::VALIDATED);
        assert_eq!(ready.message, "still ok");
        assert_eq!(ready.observed_generation, Some(2));
    }

    /// Story: An app breaks and the transition is recorded
    #[test]
    fn story_status_change_moves_transition_time() {
        let later = t0() + Duration::minutes(10);
        let mut conditions = Vec::new();
        set_condition_at(
            &mut conditions,
            READY,
            ConditionStatus::True,
            reasons::RECONCILED,
            "ok",
            None,
            t0(),
        );
        set_condition_at(
            &mut conditions,
            READY,
            ConditionStatus::False,
            reasons::SERVICE_NOT_FOUND,
            "service shop/web not found",
            None,
            later,
        );

        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[0].last_transition_time, later);
    }

    #[test]
    fn one_entry_per_type() {
        let mut conditions = Vec::new();
        for type_ in [READY, ROUTING_READY, AUTH_READY, ROUTING_READY] {
            set_condition(
                &mut conditions,
                type_,
                ConditionStatus::Unknown,
                reasons::RECONCILING,
                "",
                None,
            );
        }
        assert_eq!(conditions.len(), 3);
        assert!(conditions
            .iter()
            .all(|c| c.status == ConditionStatus::Unknown));
    }
}
