//! In-memory remote collaborators for stage tests.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use group_scout_group_models::{Coordinates, Group, GroupId, Location};
use group_scout_remote::{Geocoder, RemoteError, RemoteGroupService};

/// Remote service answering from fixed tables and recording every call.
#[derive(Default)]
pub struct FakeService {
    pub search_results: BTreeMap<String, Vec<GroupId>>,
    pub groups: BTreeMap<GroupId, Group>,
    pub event_counts: BTreeMap<GroupId, u64>,
    pub event_datetimes: BTreeMap<GroupId, Vec<DateTime<Utc>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeService {
    /// Search results are keyed by the latitude the geocoder produced.
    pub fn with_search(mut self, latitude: f64, ids: &[&str]) -> Self {
        self.search_results
            .insert(latitude.to_string(), ids.iter().map(|&id| id.into()).collect());
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.insert(group.id.clone(), group);
        self
    }

    pub fn with_event_count(mut self, id: &str, count: u64) -> Self {
        self.event_counts.insert(id.into(), count);
        self
    }

    pub fn with_event_datetimes(mut self, id: &str, datetimes: Vec<DateTime<Utc>>) -> Self {
        self.event_datetimes.insert(id.into(), datetimes);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteGroupService for FakeService {
    async fn search(
        &self,
        coordinates: Coordinates,
        radius: u32,
        query: &str,
    ) -> Result<Vec<GroupId>, RemoteError> {
        self.record(format!("search({}, {radius}, {query})", coordinates.latitude));
        Ok(self
            .search_results
            .get(&coordinates.latitude.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_group(&self, id: &GroupId) -> Result<Group, RemoteError> {
        self.record(format!("get_group({id})"));
        self.groups
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound { id: id.clone() })
    }

    async fn get_event_count(&self, id: &GroupId) -> Result<u64, RemoteError> {
        self.record(format!("get_event_count({id})"));
        Ok(self.event_counts.get(id).copied().unwrap_or_default())
    }

    async fn get_event_datetimes(&self, id: &GroupId) -> Result<Vec<DateTime<Utc>>, RemoteError> {
        self.record(format!("get_event_datetimes({id})"));
        Ok(self.event_datetimes.get(id).cloned().unwrap_or_default())
    }
}

/// Geocoder that knows a fixed set of cities.
#[derive(Default)]
pub struct FakeGeocoder {
    pub known: HashMap<Location, Coordinates>,
    /// Locations whose lookup fails as if the service were unreachable.
    pub failing: Vec<Location>,
    pub calls: Mutex<Vec<Location>>,
}

impl FakeGeocoder {
    pub fn with(mut self, city: &str, country: &str, latitude: f64) -> Self {
        self.known.insert(
            Location::new(city, country),
            Coordinates {
                latitude,
                longitude: 0.0,
            },
        );
        self
    }

    pub fn failing(mut self, city: &str, country: &str) -> Self {
        self.failing.push(Location::new(city, country));
        self
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn resolve(&self, location: &Location) -> Result<Option<Coordinates>, RemoteError> {
        self.calls.lock().unwrap().push(location.clone());
        if self.failing.contains(location) {
            return Err(RemoteError::RetriesExhausted {
                attempts: 1,
                message: "connection refused".to_string(),
            });
        }
        Ok(self.known.get(location).copied())
    }
}

pub fn group(id: &str, name: &str, members: u64) -> Group {
    Group::new(
        id,
        name,
        "London",
        "UK",
        format!("https://example.com/{id}"),
        members,
    )
}

pub fn temp_store_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("group_scout_pipeline_{}", uuid::Uuid::new_v4()))
        .join("config.toml.store.json")
}

pub fn keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|&k| k.to_string()).collect()
}
