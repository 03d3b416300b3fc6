//! HTTP route handlers.

pub mod admin;
pub mod deals;
pub mod health;
pub mod investments;
pub mod listings;
pub mod metrics;
pub mod offers;
pub mod pipeline;
pub mod profiles;

use std::str::FromStr;

use common::IdParseError;

use crate::error::ApiError;

/// Parses a path segment into a typed id, answering 400 when it is not one.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = IdParseError>,
{
    Ok(raw.parse::<T>()?)
}
