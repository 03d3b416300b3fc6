use chrono::{DateTime, Utc};
use common::UserId;
use document_store::Patch;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::identity::{Caller, Role};
use crate::record::{Record, fields};

/// Public profile of a user. Keyed by the user id from the bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub user_type: Role,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub completed_onboarding: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Profile {
    type Id = UserId;
    const COLLECTION: &'static str = "profiles";
    const KIND: &'static str = "User";

    fn id(&self) -> UserId {
        self.id
    }
}

impl Profile {
    /// The profile a user starts with on first access.
    pub fn provision(caller: &Caller, email: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: caller.user_id,
            user_type: caller.role,
            display_name: None,
            email,
            avatar_url: None,
            completed_onboarding: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<Role>,
}

impl ProfileUpdate {
    pub fn into_patch(self, now: DateTime<Utc>) -> Result<Patch, DomainError> {
        if self.display_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("display_name cannot be blank"));
        }
        let mut patch = fields(serde_json::to_value(&self)?);
        patch.insert("updated_at".to_string(), serde_json::to_value(now)?);
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioned_profile_takes_role_from_caller() {
        let caller = Caller::new(UserId::new(), Role::Investor);
        let profile = Profile::provision(&caller, Some("ivy@example.com".into()), Utc::now());
        assert_eq!(profile.id, caller.user_id);
        assert_eq!(profile.user_type, Role::Investor);
        assert!(!profile.completed_onboarding);
    }

    #[test]
    fn update_only_carries_given_fields() {
        let patch = ProfileUpdate {
            user_type: Some(Role::Buyer),
            ..Default::default()
        }
        .into_patch(Utc::now())
        .unwrap();
        assert_eq!(patch["user_type"], "BUYER");
        assert!(!patch.contains_key("display_name"));
        assert!(patch.contains_key("updated_at"));
    }

    #[test]
    fn blank_display_name_is_rejected() {
        let result = ProfileUpdate {
            display_name: Some("  ".into()),
            ..Default::default()
        }
        .into_patch(Utc::now());
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
