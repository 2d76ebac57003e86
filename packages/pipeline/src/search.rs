//! Location search: turns configured locations into candidate group ids.

use group_scout_group_models::{GroupId, Location};
use group_scout_remote::{Geocoder, RateLimiter, RemoteGroupService, keyword_query};

use crate::progress::ProgressCallback;
use crate::{PipelineError, RunStats};

/// Searches every configured location in order and collects the ids found.
pub struct LocationSearchStage<'a> {
    service: &'a dyn RemoteGroupService,
    geocoder: &'a dyn Geocoder,
    limiter: RateLimiter,
}

impl<'a> LocationSearchStage<'a> {
    #[must_use]
    pub fn new(
        service: &'a dyn RemoteGroupService,
        geocoder: &'a dyn Geocoder,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            service,
            geocoder,
            limiter,
        }
    }

    /// Returns the ids found around each location, in location order.
    ///
    /// The result is not deduplicated. Locations the geocoder does not know
    /// are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Remote`] if geocoding or a search call fails.
    pub async fn search_all(
        &self,
        locations: &[Location],
        search_keys: &[String],
        radius: u32,
        progress: &dyn ProgressCallback,
        stats: &mut RunStats,
    ) -> Result<Vec<GroupId>, PipelineError> {
        let query = keyword_query(search_keys);
        let mut candidates = Vec::new();

        progress.set_total(locations.len() as u64);

        for location in locations {
            log::info!(
                "Searching for groups in City: {} Country: {}",
                location.city,
                location.country
            );
            progress.set_message(location.to_string());

            let coordinates = self
                .geocoder
                .resolve(location)
                .await
                .map_err(|source| PipelineError::remote(format!("geocode({location})"), source))?;

            let Some(coordinates) = coordinates else {
                log::warn!("Could not geocode {location}, skipping");
                stats.locations_skipped += 1;
                progress.inc(1);
                continue;
            };

            let found = self
                .service
                .search(coordinates, radius, &query)
                .await
                .map_err(|source| PipelineError::remote(format!("search({location})"), source))?;
            self.limiter.wait().await;

            if found.is_empty() {
                log::info!("No results for City: {} Country: {}", location.city, location.country);
            } else {
                log::debug!("{} candidate(s) around {location}", found.len());
            }

            stats.locations_searched += 1;
            candidates.extend(found);
            progress.inc(1);
        }

        stats.candidates = candidates.len();
        progress.finish(format!("{} candidate(s)", candidates.len()));

        Ok(candidates)
    }
}
