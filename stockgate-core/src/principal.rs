//! Principal types produced by the external identity verifier
//!
//! Credential issuance and verification live outside the gateway. The
//! verifier hands the pipeline a resolved [`Principal`]; nothing in this
//! crate ever persists one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role assigned to an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

/// Authenticated caller identity, immutable for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique account identifier (username).
    pub username: String,
    pub role: Role,
    /// Display name.
    pub name: String,
    pub department: String,
}

impl Principal {
    pub fn new(
        username: impl Into<String>,
        role: Role,
        name: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            role,
            name: name.into(),
            department: department.into(),
        }
    }

    /// Whether this principal may use the admin surface.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Viewer).unwrap(), "\"viewer\"");
    }

    #[test]
    fn test_is_admin() {
        let admin = Principal::new("admin", Role::Admin, "Administrator", "IT");
        let viewer = Principal::new("visor", Role::Viewer, "Stock Viewer", "Operations");
        assert!(admin.is_admin());
        assert!(!viewer.is_admin());
    }
}
