//! Subscription status state machine and plan interval types.
//!
//! Kept in the shared crate so the api layer can validate requests with the
//! same transition rules the billing services enforce.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a user subscription.
///
/// Transitions are restricted to the edges below; `Expired` and `Cancelled`
/// are terminal.
///
/// | From     | To                  |
/// |----------|---------------------|
/// | Pending  | Active, Cancelled   |
/// | Active   | Expired, Cancelled  |
/// | Expired  | (none)              |
/// | Cancelled| (none)              |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

/// Error returned when parsing an unknown status string from the database.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown subscription status '{0}'")]
pub struct InvalidStatus(pub String);

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    /// A terminal status has no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Expired | SubscriptionStatus::Cancelled
        )
    }

    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// A same-status transition is allowed (idempotent no-op); every edge
    /// out of a terminal status is rejected.
    pub fn can_transition(&self, to: SubscriptionStatus) -> bool {
        if *self == to {
            return true;
        }

        match self {
            SubscriptionStatus::Pending => matches!(
                to,
                SubscriptionStatus::Active | SubscriptionStatus::Cancelled
            ),
            SubscriptionStatus::Active => matches!(
                to,
                SubscriptionStatus::Expired | SubscriptionStatus::Cancelled
            ),
            SubscriptionStatus::Expired | SubscriptionStatus::Cancelled => false,
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing interval for a plan price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Yearly => "yearly",
        }
    }
}

/// Error returned when parsing an unknown interval string from the database.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown billing interval '{0}'")]
pub struct InvalidInterval(pub String);

impl std::str::FromStr for BillingInterval {
    type Err = InvalidInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" | "month" => Ok(BillingInterval::Monthly),
            "yearly" | "year" => Ok(BillingInterval::Yearly),
            other => Err(InvalidInterval(other.to_string())),
        }
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_edges() {
        let p = SubscriptionStatus::Pending;
        assert!(p.can_transition(SubscriptionStatus::Active));
        assert!(p.can_transition(SubscriptionStatus::Cancelled));
        assert!(!p.can_transition(SubscriptionStatus::Expired));
    }

    #[test]
    fn active_edges() {
        let a = SubscriptionStatus::Active;
        assert!(a.can_transition(SubscriptionStatus::Expired));
        assert!(a.can_transition(SubscriptionStatus::Cancelled));
        assert!(!a.can_transition(SubscriptionStatus::Pending));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [SubscriptionStatus::Expired, SubscriptionStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for target in [
                SubscriptionStatus::Pending,
                SubscriptionStatus::Active,
                SubscriptionStatus::Expired,
                SubscriptionStatus::Cancelled,
            ] {
                if target == terminal {
                    // same-status is an idempotent no-op
                    assert!(terminal.can_transition(target));
                } else {
                    assert!(!terminal.can_transition(target));
                }
            }
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Active,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().ok(), Some(status));
        }
        assert!("paused".parse::<SubscriptionStatus>().is_err());
    }
}
