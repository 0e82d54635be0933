use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Error;

/// Role
///
/// The closed set of roles an account may hold. The wire spelling (`"Admin"`,
/// `"User"`) is what gets persisted and embedded in access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Every registered role, in declaration order.
    pub const ALL: [Role; 2] = [Role::Admin, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing is exact and case-sensitive: `"admin"` and `" User"` are rejected.
impl FromStr for Role {
    type Err = Error;

    fn from_str(candidate: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == candidate)
            .ok_or_else(|| Error::InvalidRole(candidate.to_string()))
    }
}

/// is_valid_role
///
/// Membership predicate over the registry. Both the issuer and every
/// authorization check go through `Role::from_str`, which this wraps.
pub fn is_valid_role(candidate: &str) -> bool {
    candidate.parse::<Role>().is_ok()
}
