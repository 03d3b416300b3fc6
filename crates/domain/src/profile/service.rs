//! Profile service.

use chrono::Utc;
use common::UserId;
use document_store::{DocumentStore, DocumentStoreError, Precondition};

use super::{Profile, ProfileUpdate};
use crate::error::DomainError;
use crate::identity::{Caller, Role};
use crate::policy::{Action, Parties, authorize};
use crate::record::fields;
use crate::repository::Repository;

const TYPE_LOCKED: &str = "Cannot change user type after onboarding completion";

/// Reads and edits user profiles.
///
/// There is no sign-up step: a profile is created from the caller's token
/// the first time the caller reads or edits their own profile.
pub struct ProfileService<S: DocumentStore> {
    profiles: Repository<S, Profile>,
}

impl<S: DocumentStore> ProfileService<S> {
    pub fn new(store: S) -> Self {
        Self {
            profiles: Repository::new(store),
        }
    }

    /// The caller's own profile.
    pub async fn me(&self, caller: &Caller, email: Option<String>) -> Result<Profile, DomainError> {
        self.provision(caller, email).await
    }

    /// Edits the caller's display name, avatar or user type.
    ///
    /// The user type is fixed once onboarding is complete, and only admins
    /// may take the admin type.
    #[tracing::instrument(skip(self, email, update), fields(user_id = %caller.user_id))]
    pub async fn update_me(
        &self,
        caller: &Caller,
        email: Option<String>,
        update: ProfileUpdate,
    ) -> Result<Profile, DomainError> {
        let profile = self.provision(caller, email).await?;

        let mut precondition = Precondition::none();
        if let Some(user_type) = update.user_type
            && user_type != profile.user_type
        {
            if user_type == Role::Admin && !caller.is_admin() {
                return Err(DomainError::Forbidden(
                    "Only admins can take the admin user type".to_string(),
                ));
            }
            if profile.completed_onboarding {
                return Err(DomainError::invalid_state(TYPE_LOCKED));
            }
            precondition = Precondition::field_in("completed_onboarding", [false]);
        }

        let patch = update.into_patch(Utc::now())?;
        self.profiles
            .patch(caller.user_id, patch, precondition)
            .await
            .map_err(|e| e.on_conflict(TYPE_LOCKED))
    }

    /// Marks the caller's onboarding as done. Repeating it changes nothing.
    #[tracing::instrument(skip(self, email), fields(user_id = %caller.user_id))]
    pub async fn complete_onboarding(
        &self,
        caller: &Caller,
        email: Option<String>,
    ) -> Result<Profile, DomainError> {
        let profile = self.provision(caller, email).await?;
        if profile.completed_onboarding {
            return Ok(profile);
        }

        let now = serde_json::to_value(Utc::now())?;
        let profile = self
            .profiles
            .patch(
                caller.user_id,
                fields(serde_json::json!({ "completed_onboarding": true, "updated_at": now })),
                Precondition::none(),
            )
            .await?;
        tracing::info!(user_type = %profile.user_type, "Onboarding completed");
        metrics::counter!("profiles_onboarded_total").increment(1);
        Ok(profile)
    }

    /// Any user's profile. Visible to every authenticated caller.
    pub async fn get(&self, user_id: UserId) -> Result<Profile, DomainError> {
        self.profiles.require(user_id).await
    }

    /// All profiles of one user type. Admins only.
    pub async fn by_type(&self, caller: &Caller, user_type: Role) -> Result<Vec<Profile>, DomainError> {
        authorize(caller, Action::ListProfilesByType, &Parties::none())?;
        let query = Repository::<S, Profile>::query().eq("user_type", user_type.as_str());
        self.profiles.find(query).await
    }

    async fn provision(&self, caller: &Caller, email: Option<String>) -> Result<Profile, DomainError> {
        if let Some(profile) = self.profiles.get(caller.user_id).await? {
            return Ok(profile);
        }

        let profile = Profile::provision(caller, email, Utc::now());
        match self.profiles.insert(&profile).await {
            Ok(profile) => {
                tracing::info!(user_id = %profile.id, user_type = %profile.user_type, "Profile created");
                metrics::counter!("profiles_created_total").increment(1);
                Ok(profile)
            }
            // Two first requests of the same user raced; the other one won.
            Err(DomainError::Store(DocumentStoreError::AlreadyExists { .. })) => {
                self.profiles.require(caller.user_id).await
            }
            Err(e) => Err(e),
        }
    }
}
