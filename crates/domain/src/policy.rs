//! Authorization rules for every marketplace operation.
//!
//! Each [`Action`] maps to exactly one declarative [`Rule`]. Services
//! resolve the [`Parties`] of the resource they act on and call
//! [`authorize`]; no handler carries its own permission logic.

use common::UserId;

use crate::identity::{Caller, Role};

/// A party relationship between the caller and the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Seller of the listing (directly, or through an offer or deal).
    Seller,
    /// Buyer on the offer or deal.
    Buyer,
    /// Investor who made the pledge.
    Investor,
    /// Owner of a private pipeline record.
    Owner,
}

/// Every operation subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateListing,
    UpdateListing,
    PublishListing,
    DeleteListing,
    ViewListingInvestments,
    CreateInvestment,
    ViewInvestment,
    SubmitOffer,
    ViewOffer,
    AcceptOffer,
    RejectOffer,
    ViewDeal,
    AppendTimelineEvent,
    AddDealDocument,
    ViewDealDocuments,
    CompleteDeal,
    ManagePipelineDeal,
    ListProfilesByType,
    RunReconciliation,
}

/// Who may perform an action.
///
/// A caller passes when their role is listed (or the list is empty) and
/// they hold at least one of the relations (or the list is empty). Admins
/// pass unconditionally when `admin_bypass` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub roles: &'static [Role],
    pub relations: &'static [Relation],
    pub admin_bypass: bool,
    pub denial: &'static str,
}

const fn rule(
    roles: &'static [Role],
    relations: &'static [Relation],
    denial: &'static str,
) -> Rule {
    Rule {
        roles,
        relations,
        admin_bypass: true,
        denial,
    }
}

impl Action {
    pub fn rule(&self) -> Rule {
        use Relation::*;

        match self {
            Action::CreateListing => rule(
                &[Role::Seller],
                &[],
                "Only sellers can create business listings",
            ),
            Action::UpdateListing => {
                rule(&[], &[Seller], "Only the seller can update this listing")
            }
            Action::PublishListing => {
                rule(&[], &[Seller], "Only the seller can publish this listing")
            }
            Action::DeleteListing => {
                rule(&[], &[Seller], "Only the seller can delete this listing")
            }
            Action::ViewListingInvestments => rule(
                &[],
                &[Seller],
                "Only the seller can view investments for this business",
            ),
            Action::CreateInvestment => rule(
                &[Role::Investor],
                &[],
                "Only investors can make investments",
            ),
            Action::ViewInvestment => rule(
                &[],
                &[Investor, Seller],
                "You do not have permission to view this investment",
            ),
            Action::SubmitOffer => rule(&[Role::Buyer], &[], "Only buyers can make offers"),
            Action::ViewOffer => rule(
                &[],
                &[Buyer, Seller],
                "You do not have permission to view this offer",
            ),
            Action::AcceptOffer => rule(&[], &[Seller], "Only the seller can accept offers"),
            Action::RejectOffer => rule(&[], &[Seller], "Only the seller can reject offers"),
            Action::ViewDeal => rule(
                &[],
                &[Buyer, Seller],
                "You do not have permission to view this deal",
            ),
            Action::AppendTimelineEvent => rule(
                &[],
                &[Buyer, Seller],
                "You do not have permission to add a timeline event to this deal",
            ),
            Action::AddDealDocument => rule(
                &[],
                &[Buyer, Seller],
                "You do not have permission to add documents to this deal",
            ),
            Action::ViewDealDocuments => rule(
                &[],
                &[Buyer, Seller],
                "You do not have permission to view documents for this deal",
            ),
            Action::CompleteDeal => rule(
                &[],
                &[Seller],
                "Only the seller can mark a deal as completed",
            ),
            Action::ManagePipelineDeal => Rule {
                roles: &[],
                relations: &[Owner],
                admin_bypass: false,
                denial: "Not authorized to manage this deal",
            },
            Action::ListProfilesByType => rule(
                &[Role::Admin],
                &[],
                "Only admins can access this endpoint",
            ),
            Action::RunReconciliation => rule(
                &[Role::Admin],
                &[],
                "Only administrators can run reconciliation",
            ),
        }
    }
}

/// The users standing in each relation to a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parties {
    pub seller: Option<UserId>,
    pub buyer: Option<UserId>,
    pub investor: Option<UserId>,
    pub owner: Option<UserId>,
}

impl Parties {
    /// No resource relationships; only role rules can pass.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn seller(mut self, user: UserId) -> Self {
        self.seller = Some(user);
        self
    }

    pub fn buyer(mut self, user: UserId) -> Self {
        self.buyer = Some(user);
        self
    }

    pub fn investor(mut self, user: UserId) -> Self {
        self.investor = Some(user);
        self
    }

    pub fn owner(mut self, user: UserId) -> Self {
        self.owner = Some(user);
        self
    }

    fn holds(&self, user: UserId, relation: Relation) -> bool {
        let party = match relation {
            Relation::Seller => self.seller,
            Relation::Buyer => self.buyer,
            Relation::Investor => self.investor,
            Relation::Owner => self.owner,
        };
        party == Some(user)
    }
}

/// Returned when a caller fails an authorization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDenied {
    pub action: Action,
    pub message: &'static str,
}

impl std::fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AccessDenied {}

/// Evaluates the rule of `action` for `caller` against `parties`.
pub fn authorize(caller: &Caller, action: Action, parties: &Parties) -> Result<(), AccessDenied> {
    let rule = action.rule();

    if rule.admin_bypass && caller.is_admin() {
        return Ok(());
    }

    let role_ok = rule.roles.is_empty() || rule.roles.contains(&caller.role);
    let relation_ok = rule.relations.is_empty()
        || rule
            .relations
            .iter()
            .any(|r| parties.holds(caller.user_id, *r));

    if role_ok && relation_ok {
        Ok(())
    } else {
        tracing::debug!(?action, user_id = %caller.user_id, role = %caller.role, "Access denied");
        Err(AccessDenied {
            action,
            message: rule.denial,
        })
    }
}
