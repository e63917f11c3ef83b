use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of roles a membership can carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    TenantMember,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::TenantMember => "tenant_member",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "tenant_member" => Ok(Role::TenantMember),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

/// The resolved identity behind an active session: who is signed in, with
/// which role, and which firm (if any) the membership binds them to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub tenant_name: Option<String>,
    pub tenant_slug: Option<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        match self.role {
            Role::Admin => true,
            Role::TenantMember => false,
        }
    }
}

/// Firm columns joined onto a membership row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmRef {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Membership of an account, joined to its firm when the firm still exists.
#[derive(Debug, Clone)]
pub struct MembershipRecord {
    pub account_id: Uuid,
    pub role: Role,
    pub firm: Option<FirmRef>,
}
