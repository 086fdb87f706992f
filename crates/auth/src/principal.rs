use serde::{Deserialize, Serialize};

use assettag_core::{CompanyId, UserId};

use crate::Role;

/// Who a token speaks for.
///
/// This is what gets signed into a token at login/registration and what the
/// request pipeline re-checks against the credential store on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub username: String,
    pub role: Role,
}
