//! Filter toggles and thresholds.
//!
//! The TOML form keeps every filter as an `enabled` flag plus optional
//! thresholds so a disabled filter may leave its thresholds out. Validation
//! turns that into [`FilterConfig`], where an enabled filter always carries
//! its thresholds.

use serde::Deserialize;

use crate::ConfigError;

/// Longest accepted period window, in months.
pub const MAX_PERIOD_MONTHS: u32 = 1200;

/// `[filters]` as written in the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub name: NameFilterSection,
    pub member: MemberFilterSection,
    pub event: EventFilterSection,
    pub period: PeriodFilterSection,
    pub freq: FreqFilterSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameFilterSection {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilterSection {
    #[serde(default)]
    pub enabled: bool,
    pub min_members: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilterSection {
    #[serde(default)]
    pub enabled: bool,
    pub min_events: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodFilterSection {
    #[serde(default)]
    pub enabled: bool,
    /// Window length in months.
    pub period: Option<u32>,
    pub period_min: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FreqFilterSection {
    #[serde(default)]
    pub enabled: bool,
    pub max_freq_days: Option<f64>,
}

/// Keep groups with more than `min_events` events within the last
/// `months` months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub months: u32,
    pub min_events: u64,
}

/// Validated filter settings. `None` means the filter is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilterConfig {
    /// Keep groups whose name contains any search keyword.
    pub name: bool,
    /// Keep groups with `members > min_members`.
    pub min_members: Option<u64>,
    /// Keep groups with `number_events > min_events`.
    pub min_events: Option<u64>,
    pub period: Option<PeriodWindow>,
    /// Keep groups whose average gap between events is below this many days.
    pub max_freq_days: Option<f64>,
}

impl FilterConfig {
    /// All filters switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Names of the enabled filters in pipeline order.
    #[must_use]
    pub fn enabled_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.name {
            names.push("name");
        }
        if self.min_members.is_some() {
            names.push("member");
        }
        if self.min_events.is_some() {
            names.push("event");
        }
        if self.period.is_some() {
            names.push("period");
        }
        if self.max_freq_days.is_some() {
            names.push("freq");
        }
        names
    }
}

impl FilterSection {
    /// Checks that every enabled filter has sane thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an enabled filter is missing a
    /// threshold or a threshold is out of range.
    pub fn validate(&self) -> Result<FilterConfig, ConfigError> {
        let min_members = if self.member.enabled {
            Some(required(self.member.min_members, "filters.member.min_members")?)
        } else {
            None
        };

        let min_events = if self.event.enabled {
            Some(required(self.event.min_events, "filters.event.min_events")?)
        } else {
            None
        };

        let period = if self.period.enabled {
            let months = required(self.period.period, "filters.period.period")?;
            if months == 0 || months > MAX_PERIOD_MONTHS {
                return Err(ConfigError::invalid(format!(
                    "filters.period.period must be between 1 and {MAX_PERIOD_MONTHS} months, got {months}"
                )));
            }
            let min_events = required(self.period.period_min, "filters.period.period_min")?;
            Some(PeriodWindow { months, min_events })
        } else {
            None
        };

        let max_freq_days = if self.freq.enabled {
            let days = required(self.freq.max_freq_days, "filters.freq.max_freq_days")?;
            if !days.is_finite() || days <= 0.0 {
                return Err(ConfigError::invalid(format!(
                    "filters.freq.max_freq_days must be a positive number, got {days}"
                )));
            }
            Some(days)
        } else {
            None
        };

        Ok(FilterConfig {
            name: self.name.enabled,
            min_members,
            min_events,
            period,
            max_freq_days,
        })
    }
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| {
        ConfigError::invalid(format!("{key} is required when the filter is enabled"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_filters_need_no_thresholds() {
        let section = FilterSection::default();
        let config = section.validate().unwrap();
        assert_eq!(config, FilterConfig::disabled());
        assert!(config.enabled_names().is_empty());
    }

    #[test]
    fn enabled_filter_without_threshold_is_rejected() {
        let section = FilterSection {
            event: EventFilterSection {
                enabled: true,
                min_events: None,
            },
            ..FilterSection::default()
        };
        let err = section.validate().unwrap_err();
        assert!(err.to_string().contains("filters.event.min_events"));
    }

    #[test]
    fn zero_month_period_is_rejected() {
        let section = FilterSection {
            period: PeriodFilterSection {
                enabled: true,
                period: Some(0),
                period_min: Some(1),
            },
            ..FilterSection::default()
        };
        assert!(section.validate().is_err());
    }

    #[test]
    fn oversized_period_is_rejected() {
        let section = |months| FilterSection {
            period: PeriodFilterSection {
                enabled: true,
                period: Some(months),
                period_min: Some(1),
            },
            ..FilterSection::default()
        };
        assert!(section(MAX_PERIOD_MONTHS).validate().is_ok());
        let err = section(4_000_000).validate().unwrap_err();
        assert!(err.to_string().contains("filters.period.period"));
        assert!(section(u32::MAX).validate().is_err());
    }

    #[test]
    fn non_positive_frequency_is_rejected() {
        let section = FilterSection {
            freq: FreqFilterSection {
                enabled: true,
                max_freq_days: Some(0.0),
            },
            ..FilterSection::default()
        };
        assert!(section.validate().is_err());
    }

    #[test]
    fn enabled_names_follow_pipeline_order() {
        let section = FilterSection {
            name: NameFilterSection { enabled: true },
            member: MemberFilterSection {
                enabled: true,
                min_members: Some(10),
            },
            event: EventFilterSection::default(),
            period: PeriodFilterSection {
                enabled: true,
                period: Some(6),
                period_min: Some(2),
            },
            freq: FreqFilterSection {
                enabled: true,
                max_freq_days: Some(30.0),
            },
        };
        let config = section.validate().unwrap();
        assert_eq!(
            config.enabled_names(),
            vec!["name", "member", "period", "freq"]
        );
        assert_eq!(
            config.period,
            Some(PeriodWindow {
                months: 6,
                min_events: 2
            })
        );
    }
}
