//! GraphQL client for the group discovery API.
//!
//! Every operation is a POST of `{ "query", "variables" }` with a bearer
//! credential. Connections (`keywordSearch`, `unifiedEvents`) are paged with
//! `first`/`after` cursors; each page after the first is paced by the rate
//! limiter because it costs quota like any other call.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use group_scout_config::RemoteSettings;
use group_scout_group_models::{Coordinates, Group, GroupId};
use serde_json::{Value, json};

use crate::retry::{self, RetryPolicy};
use crate::{Credential, RateLimiter, RemoteError, RemoteGroupService};

const SEARCH_QUERY: &str = r"
query ($query: String!, $lat: Float!, $lon: Float!, $radius: Int!, $first: Int!, $after: String) {
  keywordSearch(
    filter: { query: $query, lat: $lat, lon: $lon, radius: $radius, source: GROUPS }
    input: { first: $first, after: $after }
  ) {
    count
    pageInfo { hasNextPage endCursor }
    edges { node { id } }
  }
}";

const GROUP_QUERY: &str = r"
query ($id: ID!) {
  group(id: $id) {
    name
    link
    city
    country
    memberships { count }
  }
}";

const EVENT_COUNT_QUERY: &str = r"
query ($id: ID!) {
  group(id: $id) {
    unifiedEvents { count }
  }
}";

const EVENT_DATETIMES_QUERY: &str = r"
query ($id: ID!, $first: Int!, $after: String) {
  group(id: $id) {
    unifiedEvents(input: { first: $first, after: $after }) {
      pageInfo { hasNextPage endCursor }
      edges { node { dateTime } }
    }
  }
}";

/// [`RemoteGroupService`] backed by the GraphQL endpoint.
pub struct GraphQlGroupService {
    client: reqwest::Client,
    endpoint: String,
    credential: Credential,
    page_size: u32,
    retry: RetryPolicy,
    limiter: RateLimiter,
}

impl GraphQlGroupService {
    /// Creates a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Http`] if the HTTP client cannot be built.
    pub fn new(
        settings: &RemoteSettings,
        credential: Credential,
        limiter: RateLimiter,
        max_retries: u32,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("group-scout/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.base_api_url.clone(),
            credential,
            page_size: settings.page_size,
            retry: RetryPolicy::new(max_retries, limiter.delay()),
            limiter,
        })
    }

    /// Runs one GraphQL operation and returns its `data` object.
    async fn query(&self, query: &str, variables: Value) -> Result<Value, RemoteError> {
        let payload = json!({ "query": query, "variables": variables });
        let auth = self.credential.bearer();

        let body = retry::send_json(
            || {
                self.client
                    .post(&self.endpoint)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .header(reqwest::header::AUTHORIZATION, &auth)
                    .json(&payload)
            },
            self.retry,
        )
        .await?;

        take_data(body)
    }
}

#[async_trait]
impl RemoteGroupService for GraphQlGroupService {
    async fn search(
        &self,
        coordinates: Coordinates,
        radius: u32,
        query: &str,
    ) -> Result<Vec<GroupId>, RemoteError> {
        let mut ids = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let data = self
                .query(
                    SEARCH_QUERY,
                    json!({
                        "query": query,
                        "lat": coordinates.latitude,
                        "lon": coordinates.longitude,
                        "radius": radius,
                        "first": self.page_size,
                        "after": after,
                    }),
                )
                .await?;

            let (page_ids, next) = parse_search_page(&data)?;
            log::debug!("keywordSearch page returned {} id(s)", page_ids.len());
            ids.extend(page_ids);

            let Some(cursor) = advance_cursor(after.as_deref(), next)? else {
                break;
            };
            after = Some(cursor);
            self.limiter.wait().await;
        }

        Ok(ids)
    }

    async fn get_group(&self, id: &GroupId) -> Result<Group, RemoteError> {
        let data = self
            .query(GROUP_QUERY, json!({ "id": id.as_str() }))
            .await?;
        parse_group(&data, id)
    }

    async fn get_event_count(&self, id: &GroupId) -> Result<u64, RemoteError> {
        let data = self
            .query(EVENT_COUNT_QUERY, json!({ "id": id.as_str() }))
            .await?;
        let group = group_object(&data, id)?;
        group["unifiedEvents"]["count"]
            .as_u64()
            .ok_or_else(|| RemoteError::parse("missing unifiedEvents.count"))
    }

    async fn get_event_datetimes(&self, id: &GroupId) -> Result<Vec<DateTime<Utc>>, RemoteError> {
        let mut datetimes = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let data = self
                .query(
                    EVENT_DATETIMES_QUERY,
                    json!({ "id": id.as_str(), "first": self.page_size, "after": after }),
                )
                .await?;

            let (page, next) = parse_event_page(&data, id)?;
            datetimes.extend(page);

            let Some(cursor) = advance_cursor(after.as_deref(), next)? else {
                break;
            };
            after = Some(cursor);
            self.limiter.wait().await;
        }

        Ok(datetimes)
    }
}

/// Extracts `data` from a GraphQL response, turning a non-empty `errors`
/// array into [`RemoteError::GraphQl`].
fn take_data(mut body: Value) -> Result<Value, RemoteError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array)
        && !errors.is_empty()
    {
        let message = errors
            .iter()
            .map(|e| e["message"].as_str().unwrap_or("unknown error"))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(RemoteError::GraphQl { message });
    }

    match body.get_mut("data").map(Value::take) {
        Some(data) if data.is_object() => Ok(data),
        _ => Err(RemoteError::parse("response has no data object")),
    }
}

/// Returns `hasNextPage ? endCursor : None` from a connection.
fn next_cursor(connection: &Value) -> Option<String> {
    let info = &connection["pageInfo"];
    if info["hasNextPage"].as_bool() == Some(true) {
        info["endCursor"].as_str().map(String::from)
    } else {
        None
    }
}

/// Returns the cursor for the next page, failing if the server handed back
/// the cursor it was just given.
fn advance_cursor(
    previous: Option<&str>,
    next: Option<String>,
) -> Result<Option<String>, RemoteError> {
    match next {
        Some(cursor) if previous == Some(cursor.as_str()) => Err(RemoteError::parse(format!(
            "pagination did not advance past cursor {cursor}"
        ))),
        next => Ok(next),
    }
}

fn edges(connection: &Value) -> Result<&Vec<Value>, RemoteError> {
    connection["edges"]
        .as_array()
        .ok_or_else(|| RemoteError::parse("connection has no edges array"))
}

fn parse_search_page(data: &Value) -> Result<(Vec<GroupId>, Option<String>), RemoteError> {
    let connection = &data["keywordSearch"];
    let ids = edges(connection)?
        .iter()
        .map(|edge| match &edge["node"]["id"] {
            Value::String(s) => Ok(GroupId::new(s.clone())),
            Value::Number(n) => Ok(GroupId::new(n.to_string())),
            _ => Err(RemoteError::parse("search result without node.id")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((ids, next_cursor(connection)))
}

fn group_object<'a>(data: &'a Value, id: &GroupId) -> Result<&'a Value, RemoteError> {
    match &data["group"] {
        Value::Null => Err(RemoteError::NotFound { id: id.clone() }),
        group => Ok(group),
    }
}

fn parse_group(data: &Value, id: &GroupId) -> Result<Group, RemoteError> {
    let group = group_object(data, id)?;
    let text = |key: &str| group[key].as_str().unwrap_or_default().to_string();

    let name = group["name"]
        .as_str()
        .ok_or_else(|| RemoteError::parse(format!("group {id} has no name")))?;
    let members = group["memberships"]["count"]
        .as_u64()
        .ok_or_else(|| RemoteError::parse(format!("group {id} has no memberships.count")))?;

    Ok(Group::new(
        id.clone(),
        name,
        text("city"),
        text("country"),
        text("link"),
        members,
    ))
}

fn parse_event_page(
    data: &Value,
    id: &GroupId,
) -> Result<(Vec<DateTime<Utc>>, Option<String>), RemoteError> {
    let connection = &group_object(data, id)?["unifiedEvents"];
    let datetimes = edges(connection)?
        .iter()
        .map(|edge| {
            let raw = edge["node"]["dateTime"]
                .as_str()
                .ok_or_else(|| RemoteError::parse("event without dateTime"))?;
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| RemoteError::parse(format!("bad event dateTime {raw:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((datetimes, next_cursor(connection)))
}
