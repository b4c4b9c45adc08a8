use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};

use super::{ConfigurationDocument, SettingEntry};

/// Reconcile a saved document with the default schema.
///
/// The result is keyed exactly by `defaults`:
///
/// - structured defaults are overlaid field by field with the saved entry (saved fields win,
///   default fields fill gaps, new default fields appear);
/// - scalar defaults take the saved value verbatim when the key was saved;
/// - keys only present in `saved` are dropped.
///
/// A saved composite that no longer fits the default's kind falls back to the default entry.
/// The result carries the defaults' `configuration_version`.
pub fn merge(defaults: &ConfigurationDocument, saved: &ConfigurationDocument) -> ConfigurationDocument {
    let settings = defaults
        .settings
        .iter()
        .map(|(key, default)| {
            let merged = merge_entry(key, default, saved.settings.get(key));
            (key.clone(), merged)
        })
        .collect();

    ConfigurationDocument {
        configuration_version: defaults.configuration_version.clone(),
        settings,
    }
}

fn merge_entry(key: &str, default: &SettingEntry, saved: Option<&SettingEntry>) -> SettingEntry {
    if !default.is_structured() {
        return saved.cloned().unwrap_or_else(|| default.clone());
    }

    let Some(mut fields) = default.fields() else {
        return default.clone();
    };
    let overlay = saved.and_then(SettingEntry::fields).unwrap_or_default();
    fields.extend(overlay);

    let merged = SettingEntry::from(JsonValue::Object(fields));
    if merged.kind() == default.kind() {
        merged
    } else {
        warn!(key, "saved setting no longer matches its schema; using default");
        default.clone()
    }
}

/// Fold submitted form fields into `settings`.
///
/// - range entries store the submitted percentage as a fraction (`"50"` → `0.5`), clamped to the
///   entry's bounds;
/// - checkbox entries become `true` when present;
/// - scalar entries and unknown keys store the raw string;
/// - afterwards every checkbox entry absent from the submission becomes `false`.
///
/// The reserved `configuration_version` key is ignored.
pub fn apply_submission(
    mut settings: ConfigurationDocument,
    form: &BTreeMap<String, String>,
) -> ConfigResult<ConfigurationDocument> {
    for (key, raw) in form {
        if key == "configuration_version" {
            continue;
        }
        match settings.settings.get_mut(key) {
            Some(SettingEntry::Range(range)) => {
                let percent = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ConfigError::InvalidRangeValue {
                        key: key.clone(),
                        raw: raw.clone(),
                    })?;
                range.value = (percent / 100.0).clamp(range.min.min(range.max), range.max.max(range.min));
            }
            Some(SettingEntry::Checkbox(checkbox)) => checkbox.value = true,
            Some(SettingEntry::Scalar(value)) => *value = JsonValue::String(raw.clone()),
            None => {
                settings
                    .settings
                    .insert(key.clone(), SettingEntry::Scalar(JsonValue::String(raw.clone())));
            }
        }
    }

    for (key, entry) in settings.settings.iter_mut() {
        if let SettingEntry::Checkbox(checkbox) = entry {
            if !form.contains_key(key) {
                checkbox.value = false;
            }
        }
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckboxSetting, RangeSetting, NULL_RATIO_ALERT_THRESHOLD};
    use serde_json::{json, Map};

    fn schema_v2() -> ConfigurationDocument {
        let mut doc = ConfigurationDocument::defaults();
        doc.configuration_version = "2.0".to_string();
        doc.settings.insert(
            "highlight_nulls".to_string(),
            SettingEntry::Checkbox(CheckboxSetting {
                name: "Highlight Nulls".to_string(),
                value: true,
                description: String::new(),
                extra: Map::new(),
            }),
        );
        doc.settings
            .insert("theme".to_string(), SettingEntry::Scalar(json!("dark")));
        doc
    }

    fn doc_from(value: JsonValue) -> ConfigurationDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn merge_is_keyed_exactly_by_defaults() {
        let defaults = schema_v2();
        let saved = doc_from(json!({
            "configuration_version": "1.0",
            "null_ratio_alert_threshold": {"value": 0.3},
            "retired_setting": 42,
            "theme": "light"
        }));

        let merged = merge(&defaults, &saved);
        let keys: Vec<&String> = merged.settings.keys().collect();
        let expected: Vec<&String> = defaults.settings.keys().collect();
        assert_eq!(keys, expected);
        assert_eq!(merged.configuration_version, "2.0");
        assert_eq!(merged.null_ratio_alert_threshold(), 0.3);
        assert_eq!(merged.checkbox_value("highlight_nulls"), Some(true));
        assert_eq!(merged.get("theme"), Some(&SettingEntry::Scalar(json!("light"))));
    }

    #[test]
    fn merge_fills_new_fields_and_keeps_overrides() {
        let defaults = ConfigurationDocument::defaults();
        let saved = doc_from(json!({
            "configuration_version": "1.0",
            "null_ratio_alert_threshold": {
                "name": "Old Label", "type": "range", "value": 0.2, "min": 0, "max": 1, "step": 0.05
            }
        }));

        let merged = merge(&defaults, &saved);
        let Some(SettingEntry::Range(RangeSetting { name, value, step, description, .. })) =
            merged.get(NULL_RATIO_ALERT_THRESHOLD)
        else {
            panic!("expected range");
        };
        assert_eq!(name, "Old Label");
        assert_eq!(*value, 0.2);
        assert_eq!(*step, 0.05);
        assert!(description.starts_with("Show a warning"));
    }

    #[test]
    fn merge_ignores_non_composite_saved_value_for_structured_default() {
        let defaults = ConfigurationDocument::defaults();
        let saved = doc_from(json!({"null_ratio_alert_threshold": 0.9}));
        assert_eq!(merge(&defaults, &saved), defaults);
    }

    #[test]
    fn merge_falls_back_when_saved_kind_changed() {
        let defaults = ConfigurationDocument::defaults();
        let saved = doc_from(json!({
            "null_ratio_alert_threshold": {"name": "X", "type": "checkbox", "value": true}
        }));
        assert_eq!(merge(&defaults, &saved), defaults);
    }

    #[test]
    fn merge_is_idempotent() {
        let defaults = schema_v2();
        let saved = doc_from(json!({
            "null_ratio_alert_threshold": {"value": 0.1, "unit": "percent"},
            "highlight_nulls": {"value": false},
            "extra": "x"
        }));
        let once = merge(&defaults, &saved);
        assert_eq!(merge(&defaults, &once), once);
        assert_eq!(once.checkbox_value("highlight_nulls"), Some(false));
    }

    #[test]
    fn range_submission_is_stored_as_fraction() {
        let form: BTreeMap<String, String> = [(NULL_RATIO_ALERT_THRESHOLD.to_string(), "50".to_string())].into();
        let out = apply_submission(ConfigurationDocument::defaults(), &form).unwrap();
        assert_eq!(out.null_ratio_alert_threshold(), 0.5);

        let form: BTreeMap<String, String> = [(NULL_RATIO_ALERT_THRESHOLD.to_string(), "7".to_string())].into();
        let out = apply_submission(ConfigurationDocument::defaults(), &form).unwrap();
        assert_eq!(out.null_ratio_alert_threshold(), 0.07);
    }

    #[test]
    fn range_submission_is_clamped_to_bounds() {
        let form: BTreeMap<String, String> = [(NULL_RATIO_ALERT_THRESHOLD.to_string(), "150".to_string())].into();
        let out = apply_submission(ConfigurationDocument::defaults(), &form).unwrap();
        assert_eq!(out.null_ratio_alert_threshold(), 1.0);

        let form: BTreeMap<String, String> = [(NULL_RATIO_ALERT_THRESHOLD.to_string(), "-5".to_string())].into();
        let out = apply_submission(ConfigurationDocument::defaults(), &form).unwrap();
        assert_eq!(out.null_ratio_alert_threshold(), 0.0);

        let form: BTreeMap<String, String> = [(NULL_RATIO_ALERT_THRESHOLD.to_string(), "100".to_string())].into();
        let out = apply_submission(ConfigurationDocument::defaults(), &form).unwrap();
        assert_eq!(out.null_ratio_alert_threshold(), 1.0);
    }

    #[test]
    fn range_submission_rejects_non_numbers() {
        let form: BTreeMap<String, String> = [(NULL_RATIO_ALERT_THRESHOLD.to_string(), "lots".to_string())].into();
        let err = apply_submission(ConfigurationDocument::defaults(), &form).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRangeValue { .. }));
    }

    #[test]
    fn omitted_checkbox_is_forced_false() {
        let settings = schema_v2();
        assert_eq!(settings.checkbox_value("highlight_nulls"), Some(true));

        let form: BTreeMap<String, String> = [(NULL_RATIO_ALERT_THRESHOLD.to_string(), "10".to_string())].into();
        let out = apply_submission(settings.clone(), &form).unwrap();
        assert_eq!(out.checkbox_value("highlight_nulls"), Some(false));

        let form: BTreeMap<String, String> = [("highlight_nulls".to_string(), "on".to_string())].into();
        let out = apply_submission(out, &form).unwrap();
        assert_eq!(out.checkbox_value("highlight_nulls"), Some(true));
    }

    #[test]
    fn unknown_and_scalar_keys_store_raw_strings() {
        let form: BTreeMap<String, String> = [
            ("theme".to_string(), "solarized".to_string()),
            ("page_size".to_string(), "25".to_string()),
            ("configuration_version".to_string(), "9.9".to_string()),
        ]
        .into();
        let out = apply_submission(schema_v2(), &form).unwrap();
        assert_eq!(out.get("theme"), Some(&SettingEntry::Scalar(json!("solarized"))));
        assert_eq!(out.get("page_size"), Some(&SettingEntry::Scalar(json!("25"))));
        assert_eq!(out.configuration_version, "2.0");
    }
}
