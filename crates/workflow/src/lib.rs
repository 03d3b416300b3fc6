//! Offer and deal workflow for the marketplace.
//!
//! This crate owns the multi-record transitions:
//! 1. Accepting an offer moves the listing under a letter of intent, opens a
//!    deal and starts its timeline
//! 2. Completing a deal closes the listing
//!
//! Each transition is one atomic write batch guarded by preconditions, so
//! concurrent requests race on the store rather than on in-process locks.
//! The [`Reconciler`] repairs records written before that guarantee held.

pub mod config;
pub mod deals;
pub mod error;
pub mod offers;
pub mod reconcile;
pub mod views;

pub use config::{SiblingOfferPolicy, WorkflowConfig};
pub use deals::DealWorkflow;
pub use error::WorkflowError;
pub use offers::OfferWorkflow;
pub use reconcile::{ReconcileReport, Reconciler};
pub use views::{DealView, OfferView};
