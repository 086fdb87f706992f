//! Building the write set for a new company sign-up.

use chrono::{DateTime, Utc};

use assettag_auth::{Capability, Role, SubscriptionPlan, TrialState};

use crate::store::{NewCategory, NewCompany, NewUser, RegistrationPlan};

/// Colour given to categories created without one.
pub const DEFAULT_CATEGORY_COLOR: &str = "#007bff";

const CODE_PREFIX_LEN: usize = 6;

/// The first user of a company, before role and grants are attached.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl core::fmt::Debug for AdminAccount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl RegistrationPlan {
    /// A trial company whose first user is an admin holding every capability.
    pub fn trial(company: NewCompany, admin: AdminAccount, now: DateTime<Utc>) -> Self {
        Self {
            company,
            plan: SubscriptionPlan::Trial,
            trial_ends_at: Some(TrialState::trial_end_from(now)),
            registered_at: now,
            admin: NewUser {
                username: admin.username,
                email: admin.email,
                password_hash: admin.password_hash,
                first_name: admin.first_name,
                last_name: admin.last_name,
                role: Role::admin(),
                capabilities: Capability::ALL.to_vec(),
            },
            categories: default_categories(),
        }
    }
}

/// Derive a company code from its name: up to six uppercase alphanumerics
/// followed by a four-digit suffix taken from the clock.
///
/// Not guaranteed unique; the store's uniqueness rule is the final word.
pub fn generate_company_code(company_name: &str, now: DateTime<Utc>) -> String {
    let prefix: String = company_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(CODE_PREFIX_LEN)
        .collect();
    format!("{prefix}{:04}", now.timestamp().rem_euclid(10_000))
}

/// Categories every new company starts with.
pub fn default_categories() -> Vec<NewCategory> {
    [
        ("General", "Uncategorised assets", DEFAULT_CATEGORY_COLOR),
        ("IT Equipment", "Computers, peripherals and network gear", "#28a745"),
        ("Furniture", "Desks, chairs and storage", "#ffc107"),
        ("Vehicles", "Company cars and transport", "#dc3545"),
        ("Office Equipment", "Printers, copiers and appliances", "#6f42c1"),
    ]
    .into_iter()
    .map(|(name, description, color)| NewCategory {
        name: name.to_string(),
        description: Some(description.to_string()),
        color: color.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn code_keeps_six_alphanumerics_and_a_suffix() {
        let now = Utc.timestamp_opt(1_700_001_234, 0).unwrap();
        assert_eq!(generate_company_code("Acme, Widgets-Ltd.", now), "ACMEWI1234");
    }

    #[test]
    fn short_names_are_not_padded() {
        let now = Utc.timestamp_opt(1_700_000_007, 0).unwrap();
        assert_eq!(generate_company_code("x y", now), "XY0007");
    }

    #[test]
    fn trial_plan_grants_admin_everything() {
        let now = Utc::now();
        let plan = RegistrationPlan::trial(
            NewCompany {
                company_code: "ACME0001".into(),
                name: "Acme".into(),
                email: "ops@acme.test".into(),
                phone: None,
                address: None,
                industry: None,
            },
            AdminAccount {
                username: "root".into(),
                email: "root@acme.test".into(),
                password_hash: "$2b$10$hash".into(),
                first_name: None,
                last_name: None,
            },
            now,
        );

        assert_eq!(plan.plan, SubscriptionPlan::Trial);
        assert_eq!(plan.trial_ends_at, Some(TrialState::trial_end_from(now)));
        assert!(plan.admin.role.is_admin());
        assert_eq!(plan.admin.capabilities, Capability::ALL.to_vec());
        assert!(!plan.categories.is_empty());
    }
}
