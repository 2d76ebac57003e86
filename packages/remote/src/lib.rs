#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Remote collaborators for group discovery.
//!
//! The pipeline only talks to the outside world through two traits:
//!
//! - [`RemoteGroupService`]: keyword search around a coordinate, group
//!   detail, event counts, and event timestamps.
//! - [`Geocoder`]: city/country to coordinate resolution.
//!
//! [`graphql::GraphQlGroupService`] and [`geonames::GeoNamesGeocoder`] are
//! the production implementations. Every call that consumes API quota is
//! followed by [`RateLimiter::wait`].

pub mod geonames;
pub mod graphql;
pub mod rate_limit;
pub mod retry;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use group_scout_group_models::{Coordinates, Group, GroupId, Location};

pub use rate_limit::RateLimiter;

/// Errors from remote API and geocoding calls.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status {
        /// Response status.
        status: reqwest::StatusCode,
    },

    /// The GraphQL response carried an `errors` array.
    #[error("GraphQL error: {message}")]
    GraphQl {
        /// Messages reported by the server, joined.
        message: String,
    },

    /// The requested group does not exist.
    #[error("Group {id} not found")]
    NotFound {
        /// Id that was looked up.
        id: GroupId,
    },

    /// The response was well-formed JSON but not the expected shape.
    #[error("Unexpected response: {message}")]
    Parse {
        /// What was missing or malformed.
        message: String,
    },

    /// A transient failure persisted through every configured retry.
    #[error("Request failed after {attempts} attempt(s): {message}")]
    RetriesExhausted {
        /// Total attempts made.
        attempts: u32,
        /// The last failure seen.
        message: String,
    },

    /// No API credential was available.
    #[error("API credential not found: set the {var} environment variable")]
    MissingCredential {
        /// Environment variable that was checked.
        var: String,
    },
}

impl RemoteError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

/// Opaque bearer credential attached to every API call.
///
/// How the token is obtained is up to the caller; this type only carries it.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads the credential from an environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::MissingCredential`] if the variable is unset
    /// or empty.
    pub fn from_env(var: &str) -> Result<Self, RemoteError> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self(token.trim().to_string())),
            _ => Err(RemoteError::MissingCredential {
                var: var.to_string(),
            }),
        }
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The group discovery API as seen by the pipeline.
#[async_trait]
pub trait RemoteGroupService: Send + Sync {
    /// Returns ids of groups matching `query` within `radius` miles of
    /// `coordinates`. May contain duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    async fn search(
        &self,
        coordinates: Coordinates,
        radius: u32,
        query: &str,
    ) -> Result<Vec<GroupId>, RemoteError>;

    /// Fetches the full record of one group.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if the group does not exist, or
    /// another [`RemoteError`] if the request fails.
    async fn get_group(&self, id: &GroupId) -> Result<Group, RemoteError>;

    /// Returns the total number of events the group has held.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    async fn get_event_count(&self, id: &GroupId) -> Result<u64, RemoteError>;

    /// Returns the start time of each of the group's events, in no
    /// guaranteed order.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    async fn get_event_datetimes(&self, id: &GroupId) -> Result<Vec<DateTime<Utc>>, RemoteError>;
}

/// City/country to coordinate lookup.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves a location. `Ok(None)` means the geocoder knows no such
    /// place.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the geocoding service cannot be reached
    /// or answers with an error.
    async fn resolve(&self, location: &Location) -> Result<Option<Coordinates>, RemoteError>;
}

/// Joins search keywords into the remote OR query, e.g. `hiking OR walking`.
#[must_use]
pub fn keyword_query(search_keys: &[String]) -> String {
    search_keys.join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_ored() {
        let keys = vec!["hiking".to_string(), "walking".to_string()];
        assert_eq!(keyword_query(&keys), "hiking OR walking");
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert_eq!(credential.bearer(), "Bearer secret-token");
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let err = Credential::from_env("GROUP_SCOUT_TEST_UNSET_TOKEN_VAR").unwrap_err();
        assert!(err.to_string().contains("GROUP_SCOUT_TEST_UNSET_TOKEN_VAR"));
    }
}
