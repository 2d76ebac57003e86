//! Threshold filters applied after resolution.
//!
//! Stages run in a fixed order: member, event, period, frequency. The member
//! filter is local. The others fetch one more thing per surviving group, so
//! running them last keeps remote calls to the groups that are still in.

use chrono::{DateTime, Utc};
use group_scout_config::{FilterConfig, PeriodWindow};
use group_scout_group_models::{ColumnManifest, Group, GroupField};
use group_scout_remote::{RateLimiter, RemoteGroupService};

use crate::progress::ProgressReporter;
use crate::stats::{event_frequency, number_in_period_at};
use crate::{PipelineError, RunStats};

/// Keeps groups with strictly more than `min_members` members.
#[must_use]
pub fn filter_on_members(groups: Vec<Group>, min_members: u64) -> Vec<Group> {
    groups
        .into_iter()
        .filter(|group| group.members > min_members)
        .collect()
}

/// The ordered set of enabled filter stages for a run.
pub struct FilterPipeline<'a> {
    service: &'a dyn RemoteGroupService,
    limiter: RateLimiter,
    config: FilterConfig,
    now: DateTime<Utc>,
}

impl<'a> FilterPipeline<'a> {
    #[must_use]
    pub fn new(service: &'a dyn RemoteGroupService, limiter: RateLimiter, config: FilterConfig) -> Self {
        Self {
            service,
            limiter,
            config,
            now: Utc::now(),
        }
    }

    /// Evaluates the period window against `now` instead of the time the
    /// pipeline was built.
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Runs every enabled stage in order, attaching derived values to the
    /// groups and adding their columns to `columns`.
    ///
    /// With every stage disabled the input comes back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Remote`] if any per-group fetch fails.
    pub async fn apply(
        &self,
        mut groups: Vec<Group>,
        columns: &mut ColumnManifest,
        progress: &dyn ProgressReporter,
        stats: &mut RunStats,
    ) -> Result<Vec<Group>, PipelineError> {
        if let Some(min_members) = self.config.min_members {
            log::info!("Applying member filter");
            let before = groups.len();
            groups = filter_on_members(groups, min_members);
            log_counts("member", before, groups.len());
            stats.after_member = Some(groups.len());
        }

        if let Some(min_events) = self.config.min_events {
            log::info!("Applying event filter");
            let before = groups.len();
            groups = self.filter_on_events(groups, min_events, progress).await?;
            columns.push("Total Events", GroupField::NumberEvents);
            log_counts("event", before, groups.len());
            stats.after_event = Some(groups.len());
        }

        if let Some(window) = self.config.period {
            log::info!("Applying period filter");
            let before = groups.len();
            groups = self.filter_on_period(groups, window, progress).await?;
            columns.push("Events in Period", GroupField::NumberInPeriod);
            columns.push("Period (months)", GroupField::Period);
            log_counts("period", before, groups.len());
            stats.after_period = Some(groups.len());
        }

        if let Some(max_freq_days) = self.config.max_freq_days {
            log::info!("Applying frequency filter");
            let before = groups.len();
            groups = self.filter_on_freq(groups, max_freq_days, progress).await?;
            columns.push("Frequency (days)", GroupField::EventFreq);
            log_counts("frequency", before, groups.len());
            stats.after_freq = Some(groups.len());
        }

        Ok(groups)
    }

    /// Attaches `number_events` and keeps groups with more than
    /// `min_events`.
    async fn filter_on_events(
        &self,
        mut groups: Vec<Group>,
        min_events: u64,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<Group>, PipelineError> {
        let bar = progress.stage("Counting events");
        bar.set_total(groups.len() as u64);

        for group in &mut groups {
            bar.set_message(group.name.clone());
            let count = self
                .service
                .get_event_count(&group.id)
                .await
                .map_err(|source| {
                    PipelineError::remote(format!("get_event_count({})", group.id), source)
                })?;
            self.limiter.wait().await;
            group.number_events = Some(count);
            bar.inc(1);
        }
        bar.finish_and_clear();

        groups.retain(|group| group.number_events.is_some_and(|n| n > min_events));
        Ok(groups)
    }

    /// Attaches `number_in_period` and `period`, keeping groups with more
    /// than `window.min_events` events in the window.
    async fn filter_on_period(
        &self,
        mut groups: Vec<Group>,
        window: PeriodWindow,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<Group>, PipelineError> {
        let bar = progress.stage("Checking recent events");
        bar.set_total(groups.len() as u64);

        for group in &mut groups {
            bar.set_message(group.name.clone());
            let datetimes = self.event_datetimes(group).await?;
            group.number_in_period = Some(number_in_period_at(&datetimes, window.months, self.now));
            group.period = Some(window.months);
            bar.inc(1);
        }
        bar.finish_and_clear();

        groups.retain(|group| {
            group
                .number_in_period
                .is_some_and(|n| n > window.min_events)
        });
        Ok(groups)
    }

    /// Attaches `event_freq` and keeps groups whose average gap is below
    /// `max_freq_days`. Groups with fewer than two events have no frequency
    /// and are dropped.
    async fn filter_on_freq(
        &self,
        mut groups: Vec<Group>,
        max_freq_days: f64,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<Group>, PipelineError> {
        let bar = progress.stage("Checking event frequency");
        bar.set_total(groups.len() as u64);

        for group in &mut groups {
            bar.set_message(group.name.clone());
            let datetimes = self.event_datetimes(group).await?;
            group.event_freq = event_frequency(&datetimes);
            if group.event_freq.is_none() {
                log::debug!("{} has fewer than two events", group.name);
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        groups.retain(|group| group.event_freq.is_some_and(|days| days < max_freq_days));
        Ok(groups)
    }

    async fn event_datetimes(&self, group: &Group) -> Result<Vec<DateTime<Utc>>, PipelineError> {
        let datetimes = self
            .service
            .get_event_datetimes(&group.id)
            .await
            .map_err(|source| {
                PipelineError::remote(format!("get_event_datetimes({})", group.id), source)
            })?;
        self.limiter.wait().await;
        Ok(datetimes)
    }
}

fn log_counts(filter: &str, before: usize, after: usize) {
    log::info!("{filter} filter kept {after} of {before} group(s)");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::progress::NullProgress;
    use crate::testing::{FakeService, group};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn days_ago(days: &[i64]) -> Vec<DateTime<Utc>> {
        days.iter().map(|&d| now() - TimeDelta::days(d)).collect()
    }

    fn sample() -> Vec<Group> {
        vec![
            group("1", "Hiking A", 120),
            group("2", "Hiking B", 10),
            group("3", "Hiking C", 50),
        ]
    }

    #[test]
    fn member_filter_is_strict() {
        let kept = filter_on_members(sample(), 50);
        let ids: Vec<&str> = kept.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[tokio::test]
    async fn all_disabled_is_identity() {
        let service = FakeService::default();
        let pipeline = FilterPipeline::new(&service, RateLimiter::disabled(), FilterConfig::disabled());
        let mut columns = ColumnManifest::base();

        let output = pipeline
            .apply(sample(), &mut columns, &NullProgress, &mut RunStats::default())
            .await
            .unwrap();

        assert_eq!(output, sample());
        assert_eq!(columns, ColumnManifest::base());
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn event_filter_annotates_and_filters() {
        let service = FakeService::default()
            .with_event_count("1", 12)
            .with_event_count("2", 5)
            .with_event_count("3", 6);
        let config = FilterConfig {
            min_events: Some(5),
            ..FilterConfig::disabled()
        };
        let pipeline = FilterPipeline::new(&service, RateLimiter::disabled(), config);
        let mut columns = ColumnManifest::base();

        let output = pipeline
            .apply(sample(), &mut columns, &NullProgress, &mut RunStats::default())
            .await
            .unwrap();

        let kept: Vec<(&str, Option<u64>)> = output
            .iter()
            .map(|g| (g.id.as_str(), g.number_events))
            .collect();
        assert_eq!(kept, vec![("1", Some(12)), ("3", Some(6))]);
        assert_eq!(columns.labels().last(), Some(&"Total Events"));
    }

    #[tokio::test]
    async fn remote_stages_only_fetch_for_survivors() {
        let service = FakeService::default()
            .with_event_count("1", 12)
            .with_event_datetimes("1", days_ago(&[1, 8, 15]));
        let config = FilterConfig {
            min_members: Some(50),
            min_events: Some(5),
            max_freq_days: Some(10.0),
            ..FilterConfig::disabled()
        };
        let pipeline = FilterPipeline::new(&service, RateLimiter::disabled(), config).with_now(now());
        let mut stats = RunStats::default();

        let output = pipeline
            .apply(sample(), &mut ColumnManifest::base(), &NullProgress, &mut stats)
            .await
            .unwrap();

        assert_eq!(
            service.calls(),
            vec!["get_event_count(1)", "get_event_datetimes(1)"]
        );
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].event_freq, Some(7.0));
        assert_eq!(stats.after_member, Some(1));
        assert_eq!(stats.after_event, Some(1));
        assert_eq!(stats.after_period, None);
        assert_eq!(stats.after_freq, Some(1));
    }

    #[tokio::test]
    async fn period_filter_counts_recent_events() {
        let service = FakeService::default()
            .with_event_datetimes("1", days_ago(&[5, 20, 40, 200]))
            .with_event_datetimes("2", days_ago(&[5, 300]))
            .with_event_datetimes("3", vec![]);
        let config = FilterConfig {
            period: Some(PeriodWindow {
                months: 2,
                min_events: 1,
            }),
            ..FilterConfig::disabled()
        };
        let pipeline = FilterPipeline::new(&service, RateLimiter::disabled(), config).with_now(now());
        let mut columns = ColumnManifest::base();

        let output = pipeline
            .apply(sample(), &mut columns, &NullProgress, &mut RunStats::default())
            .await
            .unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].number_in_period, Some(3));
        assert_eq!(output[0].period, Some(2));
        assert_eq!(
            columns.labels(),
            vec![
                "Name",
                "Members",
                "City",
                "Country",
                "URL",
                "Events in Period",
                "Period (months)"
            ]
        );
    }

    #[tokio::test]
    async fn frequency_filter_drops_groups_without_enough_history() {
        let service = FakeService::default()
            .with_event_datetimes("1", days_ago(&[0, 7, 14]))
            .with_event_datetimes("2", days_ago(&[3]))
            .with_event_datetimes("3", days_ago(&[0, 30, 60]));
        let config = FilterConfig {
            max_freq_days: Some(14.0),
            ..FilterConfig::disabled()
        };
        let pipeline = FilterPipeline::new(&service, RateLimiter::disabled(), config);

        let output = pipeline
            .apply(
                sample(),
                &mut ColumnManifest::base(),
                &NullProgress,
                &mut RunStats::default(),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = output.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[tokio::test]
    async fn all_remote_columns_in_order() {
        let service = FakeService::default();
        let config = FilterConfig {
            min_events: Some(0),
            period: Some(PeriodWindow {
                months: 1,
                min_events: 0,
            }),
            max_freq_days: Some(1.0),
            ..FilterConfig::disabled()
        };
        let pipeline = FilterPipeline::new(&service, RateLimiter::disabled(), config);
        let mut columns = ColumnManifest::base();

        let output = pipeline
            .apply(vec![], &mut columns, &NullProgress, &mut RunStats::default())
            .await
            .unwrap();

        assert!(output.is_empty());
        assert_eq!(
            columns.labels()[5..],
            ["Total Events", "Events in Period", "Period (months)", "Frequency (days)"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn each_remote_fetch_is_paced() {
        let service = FakeService::default()
            .with_event_count("1", 10)
            .with_event_count("2", 10)
            .with_event_count("3", 10);
        let config = FilterConfig {
            min_events: Some(1),
            ..FilterConfig::disabled()
        };
        let pipeline =
            FilterPipeline::new(&service, RateLimiter::new(Duration::from_secs(1)), config);
        let start = tokio::time::Instant::now();

        pipeline
            .apply(
                sample(),
                &mut ColumnManifest::base(),
                &NullProgress,
                &mut RunStats::default(),
            )
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
