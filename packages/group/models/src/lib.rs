#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Group records, search locations, and output column definitions.
//!
//! A [`Group`] is created when a previously unseen candidate id is resolved
//! against the remote API. Filter stages later attach derived values
//! (`number_events`, `number_in_period`, `period`, `event_freq`) which start
//! out absent and are set once by the stage that computes them.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Opaque identifier of a remote group. Stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Creates an id from its remote string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as sent to the remote API.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for GroupId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// WGS84 coordinates of a search location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A configured `(city, country)` pair to search around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// City name as written in the configuration.
    pub city: String,
    /// Country name or code as written in the configuration.
    pub country: String,
}

impl Location {
    #[must_use]
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

/// One discovered community group.
///
/// The base attributes come from the remote group-detail lookup and are what
/// gets persisted in the group store. The optional attributes are attached by
/// filter stages during a run and are never written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Cache key; unique within the store.
    pub id: GroupId,
    /// Display name of the group.
    pub name: String,
    /// City the group is based in.
    pub city: String,
    /// Country the group is based in.
    pub country: String,
    /// Canonical URL of the group page.
    pub link: String,
    /// Member count at fetch time.
    pub members: u64,
    /// Total number of events, set by the event filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_events: Option<u64>,
    /// Events inside the configured period, set by the period filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_in_period: Option<u64>,
    /// The period filter's window in months, echoed for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
    /// Average days between consecutive past events, set by the frequency
    /// filter. `None` when the group has fewer than two events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_freq: Option<f64>,
}

impl Group {
    /// Creates a group with no filter-derived attributes.
    #[must_use]
    pub fn new(
        id: impl Into<GroupId>,
        name: impl Into<String>,
        city: impl Into<String>,
        country: impl Into<String>,
        link: impl Into<String>,
        members: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            city: city.into(),
            country: country.into(),
            link: link.into(),
            members,
            number_events: None,
            number_in_period: None,
            period: None,
            event_freq: None,
        }
    }

    /// Returns a copy with every filter-derived attribute cleared.
    ///
    /// This is the shape stored in the group cache.
    #[must_use]
    pub fn without_annotations(&self) -> Self {
        Self {
            number_events: None,
            number_in_period: None,
            period: None,
            event_freq: None,
            ..self.clone()
        }
    }

    /// Renders one attribute for tabular output. Absent derived values
    /// return `None`.
    #[must_use]
    pub fn field_value(&self, field: GroupField) -> Option<String> {
        match field {
            GroupField::Name => Some(self.name.clone()),
            GroupField::Members => Some(self.members.to_string()),
            GroupField::City => Some(self.city.clone()),
            GroupField::Country => Some(self.country.clone()),
            GroupField::Link => Some(self.link.clone()),
            GroupField::NumberEvents => self.number_events.map(|n| n.to_string()),
            GroupField::NumberInPeriod => self.number_in_period.map(|n| n.to_string()),
            GroupField::Period => self.period.map(|n| n.to_string()),
            GroupField::EventFreq => self.event_freq.map(|d| format!("{d:.1}")),
        }
    }
}

/// An attribute of [`Group`] that can be shown in an output column.
///
/// The string form is the attribute name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupField {
    Name,
    Members,
    City,
    Country,
    Link,
    NumberEvents,
    NumberInPeriod,
    Period,
    EventFreq,
}

/// One output column: display label plus the attribute it shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Header text.
    pub label: String,
    /// Attribute rendered in this column.
    pub field: GroupField,
}

/// Ordered mapping of display label to group attribute, handed to output
/// renderers together with the final groups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnManifest {
    columns: Vec<Column>,
}

impl ColumnManifest {
    /// The columns every run produces: name, members, city, country, URL.
    #[must_use]
    pub fn base() -> Self {
        let mut manifest = Self::default();
        manifest.push("Name", GroupField::Name);
        manifest.push("Members", GroupField::Members);
        manifest.push("City", GroupField::City);
        manifest.push("Country", GroupField::Country);
        manifest.push("URL", GroupField::Link);
        manifest
    }

    /// Appends a column. A label that is already present keeps its position
    /// and is pointed at the new field.
    pub fn push(&mut self, label: impl Into<String>, field: GroupField) {
        let label = label.into();
        if let Some(existing) = self.columns.iter_mut().find(|c| c.label == label) {
            existing.field = field;
        } else {
            self.columns.push(Column { label, field });
        }
    }

    /// Iterates over the columns in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// The header labels in display order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
