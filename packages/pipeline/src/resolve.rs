//! Group resolution: candidate ids to full group records, through the store.

use std::collections::HashSet;

use group_scout_group_models::{Group, GroupId};
use group_scout_remote::{RateLimiter, RemoteGroupService};
use group_scout_store::GroupStore;

use crate::progress::ProgressCallback;
use crate::{PipelineError, RunStats};

/// Returns `true` if the group name contains any search key, ignoring case.
#[must_use]
pub fn matches_name(group: &Group, search_keys: &[String]) -> bool {
    let name = group.name.to_lowercase();
    search_keys
        .iter()
        .any(|key| name.contains(&key.to_lowercase()))
}

/// Resolves candidate ids against the store, fetching and caching the ones
/// it has not seen before.
pub struct GroupResolutionStage<'a> {
    service: &'a dyn RemoteGroupService,
    limiter: RateLimiter,
    name_filter: bool,
}

impl<'a> GroupResolutionStage<'a> {
    #[must_use]
    pub fn new(service: &'a dyn RemoteGroupService, limiter: RateLimiter, name_filter: bool) -> Self {
        Self {
            service,
            limiter,
            name_filter,
        }
    }

    /// Resolves `candidate_ids` and returns the stored groups among them.
    ///
    /// Stored ids cost no remote call. Unknown ids are fetched one at a time;
    /// with the name filter enabled, groups whose name matches no search key
    /// are dropped and never stored. An id rejected once is not fetched
    /// again in the same run.
    ///
    /// The result follows store order and holds only groups whose id is in
    /// `candidate_ids`, so groups cached by earlier runs that this search did
    /// not return are left out.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Remote`] if a detail fetch fails, or
    /// [`PipelineError::Store`] if the store cannot be written. Groups
    /// stored before the failure stay stored.
    pub async fn resolve(
        &self,
        candidate_ids: &[GroupId],
        store: &mut GroupStore,
        search_keys: &[String],
        progress: &dyn ProgressCallback,
        stats: &mut RunStats,
    ) -> Result<Vec<Group>, PipelineError> {
        let mut rejected: HashSet<&GroupId> = HashSet::new();

        progress.set_total(candidate_ids.len() as u64);

        for id in candidate_ids {
            progress.inc(1);

            if let Some(cached) = store.get_by_id(id) {
                log::info!("Found {} in datastore", cached.name);
                stats.cache_hits += 1;
                continue;
            }
            if rejected.contains(id) {
                log::debug!("Group {id} already rejected by name filter");
                continue;
            }

            log::info!("Checking group data for {id}");
            progress.set_message(id.to_string());

            let group = self
                .service
                .get_group(id)
                .await
                .map_err(|source| PipelineError::remote(format!("get_group({id})"), source))?;
            self.limiter.wait().await;
            stats.fetched += 1;
            log::debug!("{group:?}");

            if self.name_filter && !matches_name(&group, search_keys) {
                log::debug!("Group {} does not match name filter", group.name);
                stats.name_rejected += 1;
                rejected.insert(id);
                continue;
            }

            store.append_and_persist(&group)?;
        }

        let wanted: HashSet<&GroupId> = candidate_ids.iter().collect();
        let groups: Vec<Group> = store
            .groups()
            .iter()
            .filter(|group| wanted.contains(&group.id))
            .cloned()
            .collect();

        stats.resolved = groups.len();
        progress.finish(format!("{} group(s) resolved", groups.len()));

        Ok(groups)
    }
}
