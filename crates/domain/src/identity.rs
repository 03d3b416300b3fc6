//! Authenticated callers.

use common::UserId;
use serde::{Deserialize, Serialize};

/// The account type a user registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Seller,
    Buyer,
    Investor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Seller => "SELLER",
            Role::Buyer => "BUYER",
            Role::Investor => "INVESTOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The identity behind a request, as resolved by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_format_is_uppercase() {
        assert_eq!(serde_json::to_value(Role::Buyer).unwrap(), "BUYER");
        let role: Role = serde_json::from_value(serde_json::json!("INVESTOR")).unwrap();
        assert_eq!(role, Role::Investor);
    }

    #[test]
    fn only_admin_is_admin() {
        assert!(Caller::new(UserId::new(), Role::Admin).is_admin());
        assert!(!Caller::new(UserId::new(), Role::Seller).is_admin());
    }
}
