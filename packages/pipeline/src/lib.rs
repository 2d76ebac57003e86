#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Group discovery pipeline.
//!
//! A run goes through four stages, strictly one remote call at a time:
//!
//! 1. [`search::LocationSearchStage`] geocodes each configured location and
//!    collects candidate group ids.
//! 2. [`resolve::GroupResolutionStage`] turns ids into groups, reading the
//!    [`GroupStore`] first and only fetching what it has never seen.
//! 3. [`filters::FilterPipeline`] applies the member, event, period, and
//!    frequency filters in that order.
//! 4. [`dedupe`] removes duplicates from what is left.
//!
//! [`Pipeline::run`] wires the stages together and returns the surviving
//! groups with the columns to display them.

pub mod dedupe;
pub mod filters;
pub mod progress;
pub mod resolve;
pub mod search;
pub mod stats;

#[cfg(test)]
mod testing;

use group_scout_config::{DedupePolicy, FilterConfig, Settings};
use group_scout_group_models::{ColumnManifest, Group, Location};
use group_scout_remote::{Geocoder, RateLimiter, RemoteError, RemoteGroupService};
use group_scout_store::{GroupStore, StoreError};

use crate::filters::FilterPipeline;
use crate::progress::ProgressReporter;
use crate::resolve::GroupResolutionStage;
use crate::search::LocationSearchStage;

/// Errors that end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A remote call failed. `call` names it, e.g. `get_group(1234)`.
    #[error("Remote call {call} failed: {source}")]
    Remote {
        call: String,
        source: RemoteError,
    },

    /// The group store could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub(crate) fn remote(call: impl Into<String>, source: RemoteError) -> Self {
        Self::Remote {
            call: call.into(),
            source,
        }
    }
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub locations_searched: usize,
    pub locations_skipped: usize,
    /// Ids returned by all searches, duplicates included.
    pub candidates: usize,
    pub cache_hits: usize,
    pub fetched: usize,
    pub name_rejected: usize,
    /// Groups handed to the filters.
    pub resolved: usize,
    pub after_member: Option<usize>,
    pub after_event: Option<usize>,
    pub after_period: Option<usize>,
    pub after_freq: Option<usize>,
    /// Groups in the final output.
    pub output: usize,
}

impl RunStats {
    /// Logs a one-line summary at `info`.
    pub fn log_summary(&self) {
        log::info!(
            "Run complete: {} location(s) searched, {} skipped, {} candidate(s), \
             {} from datastore, {} fetched, {} rejected by name, {} resolved, {} in output",
            self.locations_searched,
            self.locations_skipped,
            self.candidates,
            self.cache_hits,
            self.fetched,
            self.name_rejected,
            self.resolved,
            self.output,
        );
    }
}

/// Everything a run needs from the configuration, owned by the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub locations: Vec<Location>,
    pub search_keys: Vec<String>,
    pub radius: u32,
    pub limiter: RateLimiter,
    pub filters: FilterConfig,
    pub dedupe: DedupePolicy,
}

impl PipelineConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            locations: settings.locations(),
            search_keys: settings.search_keys.clone(),
            radius: settings.radius,
            limiter: RateLimiter::from_secs_f64(settings.api_rate_limit),
            filters: *settings.filters(),
            dedupe: settings.dedupe,
        }
    }
}

/// Result of a run: the final groups, the columns to show, and counters.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub groups: Vec<Group>,
    pub columns: ColumnManifest,
    pub stats: RunStats,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    #[must_use]
    pub const fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs search, resolution, filters, and dedup.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on the first failed remote call or store
    /// write. Groups stored before the failure remain in `store`.
    pub async fn run(
        &self,
        service: &dyn RemoteGroupService,
        geocoder: &dyn Geocoder,
        store: &mut GroupStore,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutput, PipelineError> {
        let config = &self.config;
        let mut stats = RunStats::default();
        let mut columns = ColumnManifest::base();

        let search = LocationSearchStage::new(service, geocoder, config.limiter);
        let bar = progress.stage("Searching locations");
        let candidates = search
            .search_all(
                &config.locations,
                &config.search_keys,
                config.radius,
                bar.as_ref(),
                &mut stats,
            )
            .await?;

        let resolution = GroupResolutionStage::new(service, config.limiter, config.filters.name);
        let bar = progress.stage("Resolving groups");
        let groups = resolution
            .resolve(
                &candidates,
                store,
                &config.search_keys,
                bar.as_ref(),
                &mut stats,
            )
            .await?;
        log::info!("{} group(s) before filters", groups.len());

        let filters = FilterPipeline::new(service, config.limiter, config.filters);
        let groups = filters
            .apply(groups, &mut columns, progress, &mut stats)
            .await?;

        log::info!("Deduplicating results");
        let groups = dedupe::de_dupe_with(config.dedupe, groups);
        stats.output = groups.len();

        stats.log_summary();

        Ok(PipelineOutput {
            groups,
            columns,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use crate::testing::{FakeGeocoder, FakeService, group, keys, temp_store_path};

    fn config(filters: FilterConfig) -> PipelineConfig {
        PipelineConfig {
            locations: vec![Location::new("London", "UK")],
            search_keys: keys(&["hiking"]),
            radius: 25,
            limiter: RateLimiter::disabled(),
            filters,
            dedupe: DedupePolicy::Structural,
        }
    }

    #[tokio::test]
    async fn london_hiking_keeps_only_the_large_club() {
        let club = group("1", "London Hiking Club", 120);
        let social = group("2", "London Hiking Social", 10);
        let service = FakeService::default()
            .with_search(51.5, &["1", "2"])
            .with_group(club.clone())
            .with_group(social);
        let geocoder = FakeGeocoder::default().with("London", "UK", 51.5);
        let mut store = GroupStore::open(temp_store_path()).unwrap();
        let pipeline = Pipeline::new(config(FilterConfig {
            name: true,
            min_members: Some(50),
            ..FilterConfig::disabled()
        }));

        let output = pipeline
            .run(&service, &geocoder, &mut store, &NullProgress)
            .await
            .unwrap();

        assert_eq!(output.groups, vec![club]);
        assert_eq!(output.stats.resolved, 2);
        assert_eq!(output.stats.after_member, Some(1));
        assert_eq!(output.stats.output, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_across_two_cities_is_fetched_once_and_output_once() {
        let club = group("1", "London Hiking Club", 120);
        let service = FakeService::default()
            .with_search(1.0, &["1"])
            .with_search(2.0, &["1"])
            .with_group(club.clone());
        let geocoder = FakeGeocoder::default()
            .with("London", "UK", 1.0)
            .with("Croydon", "UK", 2.0);
        let mut store = GroupStore::open(temp_store_path()).unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            locations: vec![Location::new("London", "UK"), Location::new("Croydon", "UK")],
            ..config(FilterConfig {
                name: true,
                ..FilterConfig::disabled()
            })
        });

        let output = pipeline
            .run(&service, &geocoder, &mut store, &NullProgress)
            .await
            .unwrap();

        assert_eq!(service.count_calls("get_group"), 1);
        assert_eq!(output.stats.candidates, 2);
        assert_eq!(output.stats.cache_hits, 1);
        assert_eq!(output.groups, vec![club]);
    }

    #[tokio::test]
    async fn second_run_is_served_from_the_store() {
        let path = temp_store_path();
        let service = FakeService::default()
            .with_search(51.5, &["1", "2"])
            .with_group(group("1", "London Hiking Club", 120))
            .with_group(group("2", "London Hiking Social", 10));
        let geocoder = FakeGeocoder::default().with("London", "UK", 51.5);
        let pipeline = Pipeline::new(config(FilterConfig::disabled()));

        let mut store = GroupStore::open(&path).unwrap();
        let first = pipeline
            .run(&service, &geocoder, &mut store, &NullProgress)
            .await
            .unwrap();
        assert_eq!(service.count_calls("get_group"), 2);

        let mut reopened = GroupStore::open(&path).unwrap();
        let second = pipeline
            .run(&service, &geocoder, &mut reopened, &NullProgress)
            .await
            .unwrap();

        assert_eq!(service.count_calls("get_group"), 2);
        assert_eq!(second.stats.cache_hits, 2);
        assert_eq!(second.groups, first.groups);
    }

    #[tokio::test]
    async fn unknown_location_does_not_fail_the_run() {
        let service = FakeService::default();
        let geocoder = FakeGeocoder::default();
        let mut store = GroupStore::open(temp_store_path()).unwrap();
        let pipeline = Pipeline::new(config(FilterConfig::disabled()));

        let output = pipeline
            .run(&service, &geocoder, &mut store, &NullProgress)
            .await
            .unwrap();

        assert!(output.groups.is_empty());
        assert_eq!(output.stats.locations_skipped, 1);
        assert_eq!(output.columns, ColumnManifest::base());
    }

    #[test]
    fn config_is_built_from_settings() {
        let settings = Settings::from_toml_str(
            r#"
            search_keys = ["hiking", "walking"]
            radius = 15
            api_rate_limit = 0.5
            dedupe = "id"

            [geocoder]
            username = "demo"

            [[locations]]
            country = "UK"
            cities = ["London", "Leeds"]

            [filters.member]
            enabled = true
            min_members = 50
            "#,
        )
        .unwrap();

        let config = PipelineConfig::from_settings(&settings);

        assert_eq!(config.locations.len(), 2);
        assert_eq!(config.radius, 15);
        assert_eq!(config.limiter.delay(), std::time::Duration::from_millis(500));
        assert_eq!(config.filters.min_members, Some(50));
        assert_eq!(config.dedupe, DedupePolicy::Id);
    }
}
