use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse capability grant stored per `(user, company)`.
///
/// Grants are advisory: the request gates never consult them. They are
/// returned to clients so UIs can hide actions a user is not meant to take.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    UserManagement,
    AssetManagement,
    EncodeAssets,
    AddMultipleAssets,
    ViewReports,
    PrintReports,
}

impl Capability {
    /// Every capability; what a company's first admin receives.
    pub const ALL: [Capability; 6] = [
        Capability::UserManagement,
        Capability::AssetManagement,
        Capability::EncodeAssets,
        Capability::AddMultipleAssets,
        Capability::ViewReports,
        Capability::PrintReports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::UserManagement => "userManagement",
            Capability::AssetManagement => "assetManagement",
            Capability::EncodeAssets => "encodeAssets",
            Capability::AddMultipleAssets => "addMultipleAssets",
            Capability::ViewReports => "viewReports",
            Capability::PrintReports => "printReports",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability '{s}'"))
    }
}
