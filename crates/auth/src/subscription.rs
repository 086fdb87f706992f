//! Subscription plans and the trial/suspension access policy.
//!
//! Everything here works on already-loaded company state and an explicit
//! clock, so the gate can be tested to the second without a database.

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of the trial window granted at registration.
pub const TRIAL_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    #[default]
    Trial,
    Basic,
    Professional,
    Enterprise,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Trial => "trial",
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Professional => "professional",
            SubscriptionPlan::Enterprise => "enterprise",
        }
    }
}

impl core::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(SubscriptionPlan::Trial),
            "basic" => Ok(SubscriptionPlan::Basic),
            "professional" => Ok(SubscriptionPlan::Professional),
            "enterprise" => Ok(SubscriptionPlan::Enterprise),
            other => Err(format!("unknown subscription plan '{other}'")),
        }
    }
}

/// Why a company may not use gated routes right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDenial {
    Suspended,
    TrialExpired { plan: SubscriptionPlan },
}

/// The slice of a company row the access policy needs.
///
/// `trial_ends_at = None` means there is no trial boundary (paid or unlimited
/// subscription): it never expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialState {
    pub is_active: bool,
    pub plan: SubscriptionPlan,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

/// Client-facing summary of a company's trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialStatus {
    pub is_active: bool,
    pub days_remaining: Option<i64>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub subscription_plan: SubscriptionPlan,
    pub requires_payment: bool,
}

impl TrialState {
    /// Trial end for a company registered at `now`.
    pub fn trial_end_from(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(TRIAL_PERIOD_DAYS)
    }

    /// Strictly after the boundary; the boundary second itself is still inside.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.trial_ends_at, Some(end) if now > end)
    }

    /// Gate decision for requests on trial-gated routes.
    pub fn check_access(&self, now: DateTime<Utc>) -> Result<(), AccessDenial> {
        if !self.is_active {
            return Err(AccessDenial::Suspended);
        }
        if self.is_expired(now) {
            return Err(AccessDenial::TrialExpired { plan: self.plan });
        }
        Ok(())
    }

    pub fn status(&self, now: DateTime<Utc>) -> TrialStatus {
        let is_expired = self.is_expired(now);
        TrialStatus {
            is_active: self.is_active && !is_expired,
            days_remaining: self
                .trial_ends_at
                .map(|end| (end - now).num_days().max(0)),
            trial_ends_at: self.trial_ends_at,
            is_expired,
            subscription_plan: self.plan,
            requires_payment: is_expired || self.plan == SubscriptionPlan::Trial,
        }
    }
}

/// A purchasable plan as advertised to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOffer {
    pub id: SubscriptionPlan,
    pub name: &'static str,
    pub price: f64,
    pub currency: &'static str,
    pub billing_cycle: &'static str,
    pub features: &'static [&'static str],
}

/// The fixed plan catalogue.
pub fn plan_catalogue() -> Vec<PlanOffer> {
    vec![
        PlanOffer {
            id: SubscriptionPlan::Basic,
            name: "Basic Plan",
            price: 29.99,
            currency: "USD",
            billing_cycle: "monthly",
            features: &[
                "Up to 100 assets",
                "Basic reporting",
                "Email support",
                "Barcode generation",
            ],
        },
        PlanOffer {
            id: SubscriptionPlan::Professional,
            name: "Professional Plan",
            price: 79.99,
            currency: "USD",
            billing_cycle: "monthly",
            features: &[
                "Up to 1000 assets",
                "Advanced reporting",
                "Priority support",
                "Custom branding",
                "API access",
                "Bulk operations",
            ],
        },
        PlanOffer {
            id: SubscriptionPlan::Enterprise,
            name: "Enterprise Plan",
            price: 199.99,
            currency: "USD",
            billing_cycle: "monthly",
            features: &[
                "Unlimited assets",
                "Custom integrations",
                "Dedicated support",
                "Advanced analytics",
                "Multi-location support",
                "Custom workflows",
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn trial_ending(end: Option<DateTime<Utc>>) -> TrialState {
        TrialState {
            is_active: true,
            plan: SubscriptionPlan::Trial,
            trial_ends_at: end,
        }
    }

    #[test]
    fn one_second_past_the_end_is_expired() {
        let now = Utc::now();
        let state = trial_ending(Some(now - Duration::seconds(1)));
        assert_eq!(
            state.check_access(now),
            Err(AccessDenial::TrialExpired { plan: SubscriptionPlan::Trial })
        );
    }

    #[test]
    fn one_second_before_the_end_is_allowed() {
        let now = Utc::now();
        let state = trial_ending(Some(now + Duration::seconds(1)));
        assert_eq!(state.check_access(now), Ok(()));
    }

    #[test]
    fn no_trial_end_never_expires() {
        let state = trial_ending(None);
        let far_future = Utc::now() + Duration::days(365 * 50);
        assert_eq!(state.check_access(far_future), Ok(()));
    }

    #[test]
    fn suspension_wins_over_a_valid_trial() {
        let now = Utc::now();
        let mut state = trial_ending(Some(now + Duration::days(3)));
        state.is_active = false;
        assert_eq!(state.check_access(now), Err(AccessDenial::Suspended));
    }

    #[test]
    fn status_for_a_fresh_trial() {
        let now = Utc::now();
        let state = trial_ending(Some(TrialState::trial_end_from(now)));
        let status = state.status(now);
        assert!(status.is_active);
        assert!(!status.is_expired);
        assert_eq!(status.days_remaining, Some(TRIAL_PERIOD_DAYS));
        assert!(status.requires_payment);
    }

    #[test]
    fn status_for_a_paid_plan_without_trial_end() {
        let state = TrialState {
            is_active: true,
            plan: SubscriptionPlan::Professional,
            trial_ends_at: None,
        };
        let status = state.status(Utc::now());
        assert!(status.is_active);
        assert!(!status.is_expired);
        assert_eq!(status.days_remaining, None);
        assert!(!status.requires_payment);
    }

    #[test]
    fn catalogue_offers_only_paid_plans() {
        let plans = plan_catalogue();
        assert_eq!(plans.len(), 3);
        assert!(plans.iter().all(|p| p.id != SubscriptionPlan::Trial));
    }

    proptest! {
        #[test]
        fn access_matches_the_boundary(offset in -100_000i64..100_000) {
            let now = Utc::now();
            let state = trial_ending(Some(now + Duration::seconds(offset)));
            prop_assert_eq!(state.check_access(now).is_ok(), offset >= 0);
        }
    }
}
