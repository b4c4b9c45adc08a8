use serde::{Deserialize, Serialize};

use super::{merge, ConfigurationDocument};

/// A session's private copy of the settings.
///
/// The copy is seeded lazily from the authoritative document and re-merged against it every time
/// the session is attached, so schema changes reach sessions that were created earlier. It
/// serializes to JSON so a web layer can keep it in its session bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    settings: Option<ConfigurationDocument>,
}

impl SessionSettings {
    /// A session that has not seen any settings yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed (if empty) and merge the session's copy against `authoritative`.
    pub fn attach(&mut self, authoritative: &ConfigurationDocument) -> &ConfigurationDocument {
        let held = self.settings.take().unwrap_or_else(|| authoritative.clone());
        self.settings.insert(merge(authoritative, &held))
    }

    /// Replace the session's copy.
    pub fn replace(&mut self, settings: ConfigurationDocument) {
        self.settings = Some(settings);
    }

    /// The session's copy, if it has been seeded.
    pub fn current(&self) -> Option<&ConfigurationDocument> {
        self.settings.as_ref()
    }

    /// The threshold this session converts with, falling back to `authoritative` when unseeded.
    pub fn null_ratio_alert_threshold(&self, authoritative: &ConfigurationDocument) -> f64 {
        self.settings
            .as_ref()
            .unwrap_or(authoritative)
            .null_ratio_alert_threshold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SettingEntry, NULL_RATIO_ALERT_THRESHOLD};

    fn with_threshold(value: f64) -> ConfigurationDocument {
        let mut doc = ConfigurationDocument::defaults();
        if let Some(SettingEntry::Range(r)) = doc.settings.get_mut(NULL_RATIO_ALERT_THRESHOLD) {
            r.value = value;
        }
        doc
    }

    #[test]
    fn attach_seeds_from_authoritative_document() {
        let mut session = SessionSettings::new();
        assert!(session.current().is_none());
        assert_eq!(session.null_ratio_alert_threshold(&with_threshold(0.3)), 0.3);

        let seeded = session.attach(&with_threshold(0.3)).clone();
        assert_eq!(seeded.null_ratio_alert_threshold(), 0.3);
    }

    #[test]
    fn attach_keeps_session_overrides() {
        let mut session = SessionSettings::new();
        session.replace(with_threshold(0.5));
        let merged = session.attach(&with_threshold(0.1));
        assert_eq!(merged.null_ratio_alert_threshold(), 0.5);
    }

    #[test]
    fn attach_picks_up_new_schema_keys() {
        let mut session = SessionSettings::new();
        session.attach(&ConfigurationDocument::defaults());

        let mut v2 = ConfigurationDocument::defaults();
        v2.settings
            .insert("page_size".to_string(), SettingEntry::Scalar(25.into()));
        let merged = session.attach(&v2);
        assert_eq!(merged.get("page_size"), Some(&SettingEntry::Scalar(25.into())));
    }
}
