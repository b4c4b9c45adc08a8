//! Versioned, user-tunable settings.
//!
//! A [`ConfigurationDocument`] maps setting keys to [`SettingEntry`] values plus a
//! `configuration_version` marker. It is persisted as a flat JSON object:
//!
//! ```json
//! {
//!     "configuration_version": "1.0",
//!     "null_ratio_alert_threshold": {
//!         "name": "Null Ratio Alert Threshold",
//!         "type": "range",
//!         "value": 0.05,
//!         "min": 0.0,
//!         "max": 1.0,
//!         "step": 0.01,
//!         "description": "..."
//!     }
//! }
//! ```
//!
//! - [`merge`]: reconcile a possibly stale saved document with the current default schema
//! - [`apply_submission`]: fold submitted form fields into a document
//! - [`ConfigStore`]: load/initialize, persist and reset the authoritative document
//! - [`SessionSettings`]: a session's private copy, merged lazily against the authoritative one

mod merge;
mod session;
mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub use merge::{apply_submission, merge};
pub use session::SessionSettings;
pub use store::{ConfigStorage, ConfigStore, FileConfigStorage, InMemoryConfigStorage};

/// Version written into freshly initialized documents.
pub const CONFIGURATION_VERSION: &str = "1.0";

/// Key of the missing-value alert threshold setting.
pub const NULL_RATIO_ALERT_THRESHOLD: &str = "null_ratio_alert_threshold";

/// Threshold used when the setting is absent or not a range.
pub const DEFAULT_NULL_RATIO_ALERT_THRESHOLD: f64 = 0.05;

/// A slider setting. Stored as a fraction; submitted as a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSetting {
    /// Display label.
    pub name: String,
    /// Current value.
    pub value: f64,
    /// Lower bound.
    #[serde(serialize_with = "whole_as_integer")]
    pub min: f64,
    /// Upper bound.
    #[serde(serialize_with = "whole_as_integer")]
    pub max: f64,
    /// Slider increment.
    pub step: f64,
    /// Help text.
    #[serde(default)]
    pub description: String,
    /// Fields this version does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Whole bounds are written as JSON integers (`0`, `1`).
fn whole_as_integer<S: serde::Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    if v.fract() == 0.0 && v.abs() <= 9_007_199_254_740_992.0 {
        s.serialize_i64(*v as i64)
    } else {
        s.serialize_f64(*v)
    }
}

/// An on/off setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckboxSetting {
    /// Display label.
    pub name: String,
    /// Current value.
    pub value: bool,
    /// Help text.
    #[serde(default)]
    pub description: String,
    /// Fields this version does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Discriminant of a [`SettingEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Range,
    Checkbox,
    Scalar,
}

/// A named configuration item.
///
/// On disk, structured entries are objects whose `"type"` field is `"range"` or `"checkbox"`;
/// anything else is kept as a bare [`SettingEntry::Scalar`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "JsonValue", into = "JsonValue")]
pub enum SettingEntry {
    /// Slider with metadata.
    Range(RangeSetting),
    /// Checkbox with metadata.
    Checkbox(CheckboxSetting),
    /// Bare value without metadata.
    Scalar(JsonValue),
}

impl SettingEntry {
    /// The entry's discriminant.
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingEntry::Range(_) => SettingKind::Range,
            SettingEntry::Checkbox(_) => SettingKind::Checkbox,
            SettingEntry::Scalar(_) => SettingKind::Scalar,
        }
    }

    /// Returns `true` for entries carrying metadata.
    pub fn is_structured(&self) -> bool {
        self.kind() != SettingKind::Scalar
    }

    /// Field map of a composite entry: structured entries and object scalars.
    pub(crate) fn fields(&self) -> Option<Map<String, JsonValue>> {
        match JsonValue::from(self.clone()) {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl From<JsonValue> for SettingEntry {
    fn from(value: JsonValue) -> Self {
        let JsonValue::Object(mut map) = value else {
            return SettingEntry::Scalar(value);
        };

        let kind = map.get("type").and_then(JsonValue::as_str).map(str::to_owned);
        let parsed = match kind.as_deref() {
            Some("range") => {
                let tag = map.remove("type");
                let entry = serde_json::from_value(JsonValue::Object(map.clone())).map(SettingEntry::Range);
                restore_tag(&mut map, tag);
                entry.ok()
            }
            Some("checkbox") => {
                let tag = map.remove("type");
                let entry = serde_json::from_value(JsonValue::Object(map.clone())).map(SettingEntry::Checkbox);
                restore_tag(&mut map, tag);
                entry.ok()
            }
            _ => None,
        };

        parsed.unwrap_or(SettingEntry::Scalar(JsonValue::Object(map)))
    }
}

fn restore_tag(map: &mut Map<String, JsonValue>, tag: Option<JsonValue>) {
    if let Some(tag) = tag {
        map.insert("type".to_string(), tag);
    }
}

impl From<SettingEntry> for JsonValue {
    fn from(entry: SettingEntry) -> Self {
        let (tag, body) = match entry {
            SettingEntry::Scalar(v) => return v,
            SettingEntry::Range(r) => ("range", serde_json::to_value(r)),
            SettingEntry::Checkbox(c) => ("checkbox", serde_json::to_value(c)),
        };

        // Struct serialization into a `Value` cannot fail for these types.
        let mut body = match body {
            Ok(JsonValue::Object(map)) => map,
            _ => Map::new(),
        };
        let mut out = Map::new();
        if let Some(name) = body.remove("name") {
            out.insert("name".to_string(), name);
        }
        out.insert("type".to_string(), JsonValue::String(tag.to_string()));
        out.extend(body);
        JsonValue::Object(out)
    }
}

/// A versioned mapping from setting key to [`SettingEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    /// Schema version marker.
    #[serde(default)]
    pub configuration_version: String,
    /// Settings keyed by name.
    #[serde(flatten)]
    pub settings: BTreeMap<String, SettingEntry>,
}

impl ConfigurationDocument {
    /// The hard-coded default document written on first run.
    pub fn defaults() -> Self {
        let mut settings = BTreeMap::new();
        settings.insert(
            NULL_RATIO_ALERT_THRESHOLD.to_string(),
            SettingEntry::Range(RangeSetting {
                name: "Null Ratio Alert Threshold".to_string(),
                value: DEFAULT_NULL_RATIO_ALERT_THRESHOLD,
                min: 0.0,
                max: 1.0,
                step: 0.01,
                description: "Show a warning if converting a column's datatype creates more than this \
                              percentage of null values."
                    .to_string(),
                extra: Map::new(),
            }),
        );

        Self {
            configuration_version: CONFIGURATION_VERSION.to_string(),
            settings,
        }
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&SettingEntry> {
        self.settings.get(key)
    }

    /// Value of a range setting, if `key` is one.
    pub fn range_value(&self, key: &str) -> Option<f64> {
        match self.settings.get(key) {
            Some(SettingEntry::Range(r)) => Some(r.value),
            _ => None,
        }
    }

    /// Value of a checkbox setting, if `key` is one.
    pub fn checkbox_value(&self, key: &str) -> Option<bool> {
        match self.settings.get(key) {
            Some(SettingEntry::Checkbox(c)) => Some(c.value),
            _ => None,
        }
    }

    /// The configured missing-value alert threshold (a fraction in `[0, 1]`).
    pub fn null_ratio_alert_threshold(&self) -> f64 {
        self.range_value(NULL_RATIO_ALERT_THRESHOLD)
            .unwrap_or(DEFAULT_NULL_RATIO_ALERT_THRESHOLD)
    }
}

impl Default for ConfigurationDocument {
    fn default() -> Self {
        Self::defaults()
    }
}
