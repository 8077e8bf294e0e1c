//! Domain data structures for regions, cities, collection events, and cached schedules.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a city known to curbside.
pub struct CityId(pub String);

impl fmt::Display for CityId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a city served by a schedule provider.
pub struct CityMeta {
    /// Unique slug, e.g. `san-jose`.
    pub id: CityId,
    /// Display name as a postal lookup would report it.
    pub name: String,
    /// Two-letter state code.
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Region derived from a ZIP code.
pub struct RegionInfo {
    /// Trimmed five digit ZIP code.
    pub zip_code: String,
    /// Two-letter state code.
    pub state_code: String,
    /// Place name, when the postal data carries one.
    pub city: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Waste streams recognized on municipal collection calendars.
pub enum WasteStream {
    /// Yard trimmings and green waste.
    YardWaste,
    /// Landfill garbage.
    Garbage,
    /// Mixed recycling.
    Recycling,
}

impl WasteStream {
    /// All streams in the order their labels are joined.
    pub const ALL: [WasteStream; 3] = [
        WasteStream::YardWaste,
        WasteStream::Garbage,
        WasteStream::Recycling,
    ];

    /// Lowercase keyword looked for in calendar text.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            WasteStream::YardWaste => "yard",
            WasteStream::Garbage => "garbage",
            WasteStream::Recycling => "recycling",
        }
    }

    /// Human label used in [`CollectionEvent::kind`].
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            WasteStream::YardWaste => "Yard waste",
            WasteStream::Garbage => "Garbage",
            WasteStream::Recycling => "Recycling",
        }
    }

    /// Streams whose keyword occurs in `text`, compared case-insensitively.
    #[must_use]
    pub fn classify(text: &str) -> Vec<WasteStream> {
        let lowered = text.to_lowercase();
        Self::ALL
            .into_iter()
            .filter(|stream| lowered.contains(stream.keyword()))
            .collect()
    }

    /// Join stream labels the way collection events report them.
    #[must_use]
    pub fn join_labels(streams: &[WasteStream]) -> String {
        streams
            .iter()
            .map(|stream| stream.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Scheduled pickup on a specific day.
pub struct CollectionEvent {
    /// Date of the pickup.
    pub date: NaiveDate,
    /// Label such as `Garbage` or `Garbage, Recycling`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl CollectionEvent {
    /// Build an event from a date and the streams collected that day.
    #[must_use]
    pub fn from_streams(date: NaiveDate, streams: &[WasteStream]) -> Self {
        Self {
            date,
            kind: WasteStream::join_labels(streams),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
/// Resolved schedule: either concrete events or a link to the city's own calendar.
///
/// Serialized untagged, so JSON consumers see an array or a string.
pub enum Schedule {
    /// Structured pickup dates.
    Events(Vec<CollectionEvent>),
    /// Public calendar page to consult instead.
    ReferenceLink(String),
}

impl Schedule {
    /// True when there is nothing to show the user.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Schedule::Events(events) => events.is_empty(),
            Schedule::ReferenceLink(url) => url.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Payload for a new cache row.
pub struct NewSchedule {
    /// Address exactly as the caller supplied it.
    pub address: String,
    /// City resolved from the ZIP code.
    pub city: Option<String>,
    /// State resolved from the ZIP code.
    pub state: Option<String>,
    /// ZIP code exactly as the caller supplied it.
    pub zip_code: Option<String>,
    /// Schedule to remember.
    pub schedule: Schedule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Schedule persisted in the cache.
pub struct ScheduleRecord {
    /// Store-assigned row id.
    pub id: i64,
    /// Address key.
    pub address: String,
    /// Denormalized city.
    pub city: Option<String>,
    /// Denormalized state.
    pub state: Option<String>,
    /// ZIP key.
    pub zip_code: Option<String>,
    /// Cached schedule.
    pub schedule: Schedule,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Static statewide recycling rules loaded from `<STATE>.json`.
pub struct RuleBaseline {
    /// Display name of the jurisdiction, e.g. `California`.
    #[serde(default)]
    pub state: Option<String>,
    /// Rule tree; values may be nested objects.
    #[serde(default)]
    pub rules: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Granularity at which a rule baseline applied.
pub enum MatchLevel {
    /// Statewide baseline.
    State,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Region echoed back in a [`RulesReport`].
pub struct RegionSummary {
    /// Two-letter state code.
    pub state: String,
    /// Place name, if known.
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Result of resolving recycling rules for a ZIP code.
pub struct RulesReport {
    /// ZIP code (trimmed when it resolved, verbatim otherwise).
    pub zip: String,
    /// Level that matched, if any.
    pub match_level: Option<MatchLevel>,
    /// Name of the matched jurisdiction, e.g. `CA`.
    pub match_name: Option<String>,
    /// Region the ZIP resolved to.
    pub region: Option<RegionSummary>,
    /// Human readable explanation.
    pub summary: Option<String>,
    /// Merged rules, `None` when nothing applied.
    pub rules: Option<Map<String, Value>>,
}
