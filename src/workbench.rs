//! Request-level operations over one live dataset.
//!
//! A [`Workbench`] owns everything a front end needs between requests: the loaded [`Dataset`]
//! (current table plus load-time snapshot), the [`ConfigStore`], the object storage used for
//! remote loads and exports, and the [`LoadOptions`] observers. Per-user settings live in a
//! [`SessionSettings`] value the caller keeps alongside its session and passes in.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use crate::config::{
    apply_submission, ConfigStorage, ConfigStore, ConfigurationDocument, FileConfigStorage, SessionSettings,
};
use crate::conversion::{self, BulkReport, TargetType};
use crate::error::{WorkbenchError, WorkbenchResult};
use crate::export;
use crate::ingestion::{load_bytes, load_from_remote, LoadOptions, LoadOutcome, TableFormat};
use crate::remote::{ObjectStorage, RemoteLocator};
use crate::types::Dataset;

/// Message returned by [`Workbench::revert`].
pub const REVERT_MESSAGE: &str = "Data types reverted to original.";

/// Second line of a load failure.
pub const ACCEPTABLE_FORMATS_MESSAGE: &str = "Acceptable formats: parquet, csv";

/// The live dataset, settings store and storage handles behind a front end.
pub struct Workbench<S: ConfigStorage = FileConfigStorage> {
    config: ConfigStore<S>,
    object_storage: Arc<dyn ObjectStorage>,
    load_options: LoadOptions,
    dataset: Option<Dataset>,
}

impl<S: ConfigStorage> std::fmt::Debug for Workbench<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbench")
            .field("config_location", &self.config.storage().location())
            .field("load_options", &self.load_options)
            .field("dataset", &self.dataset.as_ref().map(|d| d.name.as_str()))
            .finish()
    }
}

impl<S: ConfigStorage> Workbench<S> {
    /// Open the settings store (writing defaults on first run) with no dataset loaded.
    pub fn open(storage: S, object_storage: Arc<dyn ObjectStorage>) -> WorkbenchResult<Self> {
        Ok(Self {
            config: ConfigStore::open(storage)?,
            object_storage,
            load_options: LoadOptions::default(),
            dataset: None,
        })
    }

    /// Replace the options passed to every load.
    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    /// Load an uploaded file, replacing any current dataset.
    ///
    /// `file_name` selects the parser by extension; without one, formats are probed.
    pub fn load_upload(&mut self, bytes: impl Into<Bytes>, file_name: &str) -> WorkbenchResult<&Dataset> {
        let outcome = load_bytes(bytes, Some(file_name), &self.load_options)?;
        self.install(file_name, outcome)
    }

    /// Fetch `locator` (`scheme://bucket/key`) from object storage and load it, replacing any
    /// current dataset.
    pub fn load_remote(&mut self, locator: &str) -> WorkbenchResult<&Dataset> {
        let parsed = RemoteLocator::parse(locator)?;
        let outcome = load_from_remote(self.object_storage.as_ref(), &parsed, &self.load_options)?;
        self.install(locator, outcome)
    }

    fn install(&mut self, name: &str, outcome: LoadOutcome) -> WorkbenchResult<&Dataset> {
        let Some(table) = outcome.into_table() else {
            return Err(WorkbenchError::LoadFailure(vec![
                format!(
                    "Failed to import file {name} (invalid file type) . Please try again later or choose a different file."
                ),
                ACCEPTABLE_FORMATS_MESSAGE.to_string(),
            ]));
        };
        info!(name, rows = table.row_count(), columns = table.column_count(), "dataset replaced");
        Ok(&*self.dataset.insert(Dataset::new(name, table)))
    }

    /// The loaded dataset, if any.
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// `(column, dtype label)` pairs of the current table.
    pub fn dtypes(&self) -> WorkbenchResult<Vec<(String, &'static str)>> {
        Ok(self.loaded()?.current.dtypes())
    }

    /// Preview converting `column` to `token` under the session's threshold.
    pub fn check_conversion(
        &self,
        session: &mut SessionSettings,
        column: &str,
        token: &str,
    ) -> WorkbenchResult<Option<String>> {
        let threshold = self.threshold(session);
        let dataset = self.loaded()?;
        Ok(conversion::check_conversion(&dataset.current, column, token, threshold)?)
    }

    /// Convert one column of the current table.
    pub fn convert_column(
        &mut self,
        session: &mut SessionSettings,
        column: &str,
        target: TargetType,
    ) -> WorkbenchResult<Option<String>> {
        let threshold = self.threshold(session);
        let dataset = self.loaded_mut()?;
        Ok(conversion::apply_conversion(&mut dataset.current, column, target, threshold)?)
    }

    /// Apply a column → target-token map to the current table.
    pub fn change_dtypes(
        &mut self,
        session: &mut SessionSettings,
        requests: &BTreeMap<String, String>,
    ) -> WorkbenchResult<BulkReport> {
        let threshold = self.threshold(session);
        let dataset = self.loaded_mut()?;
        Ok(conversion::apply_bulk(&mut dataset.current, requests, threshold))
    }

    /// Restore the table captured at load time.
    pub fn revert(&mut self) -> WorkbenchResult<&'static str> {
        let dataset = self.loaded_mut()?;
        dataset.revert();
        info!(name = %dataset.name, "reverted to original");
        Ok(REVERT_MESSAGE)
    }

    /// Write the current table to `sink` in `format`.
    pub fn export<W: Write + Send>(&self, format: TableFormat, sink: W) -> WorkbenchResult<()> {
        export::write_table(&self.loaded()?.current, format, sink)?;
        Ok(())
    }

    /// Encode the current table for download.
    ///
    /// `format` is a `csv|parquet` token and `file_name` the requested name; returns the download
    /// file name and the encoded body.
    pub fn export_download(&self, format: &str, file_name: Option<&str>) -> WorkbenchResult<(String, Bytes)> {
        let format = export::parse_format(format)?;
        let body = export::to_bytes(&self.loaded()?.current, format)?;
        Ok((export::export_file_name(file_name, format), body))
    }

    /// Upload the current table to `locator`, appending the format extension when missing.
    pub fn export_remote(&self, format: &str, locator: &str) -> WorkbenchResult<RemoteLocator> {
        let format = export::parse_format(format)?;
        let locator = RemoteLocator::parse(locator)?;
        let table = &self.loaded()?.current;
        Ok(export::export_remote(table, format, self.object_storage.as_ref(), &locator)?)
    }

    /// The session's settings, seeded and merged against the authoritative document.
    pub fn settings(&self, session: &mut SessionSettings) -> ConfigurationDocument {
        session.attach(&self.config.session_defaults()).clone()
    }

    /// Fold a settings form into the session's copy and persist it as the authoritative document.
    pub fn save_settings(
        &mut self,
        session: &mut SessionSettings,
        form: &BTreeMap<String, String>,
    ) -> WorkbenchResult<ConfigurationDocument> {
        let current = self.settings(session);
        let updated = apply_submission(current, form)?;
        session.replace(updated.clone());
        self.config.persist(updated.clone())?;
        Ok(updated)
    }

    /// Persist the default document and reseed `session` from it.
    pub fn reset_settings(&mut self, session: &mut SessionSettings) -> WorkbenchResult<ConfigurationDocument> {
        self.config.reset()?;
        let fresh = self.config.session_defaults();
        session.replace(fresh.clone());
        Ok(fresh)
    }

    /// The settings store.
    pub fn config(&self) -> &ConfigStore<S> {
        &self.config
    }

    fn threshold(&self, session: &mut SessionSettings) -> f64 {
        session
            .attach(&self.config.session_defaults())
            .null_ratio_alert_threshold()
    }

    fn loaded(&self) -> WorkbenchResult<&Dataset> {
        self.dataset.as_ref().ok_or(WorkbenchError::NoDataset)
    }

    fn loaded_mut(&mut self) -> WorkbenchResult<&mut Dataset> {
        self.dataset.as_mut().ok_or(WorkbenchError::NoDataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InMemoryConfigStorage, NULL_RATIO_ALERT_THRESHOLD};
    use crate::remote::InMemoryObjectStorage;

    fn workbench() -> Workbench<InMemoryConfigStorage> {
        Workbench::open(InMemoryConfigStorage::new(), Arc::new(InMemoryObjectStorage::new())).unwrap()
    }

    #[test]
    fn operations_need_a_dataset() {
        let mut wb = workbench();
        let mut session = SessionSettings::new();
        assert!(matches!(wb.dtypes(), Err(WorkbenchError::NoDataset)));
        assert!(matches!(wb.revert(), Err(WorkbenchError::NoDataset)));
        assert!(matches!(
            wb.check_conversion(&mut session, "a", "int"),
            Err(WorkbenchError::NoDataset)
        ));
        assert!(matches!(
            wb.export(TableFormat::Csv, Vec::new()),
            Err(WorkbenchError::NoDataset)
        ));
    }

    #[test]
    fn unreadable_upload_reports_both_messages() {
        let mut wb = workbench();
        let err = wb.load_upload(Vec::new(), "empty.csv").unwrap_err();
        let WorkbenchError::LoadFailure(messages) = err else {
            panic!("expected load failure, got {err:?}");
        };
        assert_eq!(
            messages,
            vec![
                "Failed to import file empty.csv (invalid file type) . Please try again later or choose a different file."
                    .to_string(),
                "Acceptable formats: parquet, csv".to_string(),
            ]
        );
        assert!(wb.dataset().is_none());
    }

    #[test]
    fn failed_load_keeps_previous_dataset() {
        let mut wb = workbench();
        wb.load_upload(b"a\n1\n".to_vec(), "first.csv").unwrap();
        assert!(wb.load_upload(b"\x00\x01".to_vec(), "second.csv").is_err());
        assert_eq!(wb.dataset().unwrap().name, "first.csv");
    }

    #[test]
    fn session_threshold_drives_warnings() {
        let mut wb = workbench();
        wb.load_upload(b"v\n1\nx\n2\n3\n".to_vec(), "v.csv").unwrap();

        let mut strict = SessionSettings::new();
        let warning = wb.check_conversion(&mut strict, "v", "int").unwrap();
        assert_eq!(
            warning.as_deref(),
            Some("Column 'v' conversion to int will result in 25.00% nulls.")
        );

        let mut lenient = SessionSettings::new();
        let form: BTreeMap<String, String> = [(NULL_RATIO_ALERT_THRESHOLD.to_string(), "50".to_string())].into();
        wb.save_settings(&mut lenient, &form).unwrap();
        assert_eq!(wb.check_conversion(&mut lenient, "v", "int").unwrap(), None);
    }

    #[test]
    fn reset_settings_reseeds_session() {
        let mut wb = workbench();
        let mut session = SessionSettings::new();
        let form: BTreeMap<String, String> = [(NULL_RATIO_ALERT_THRESHOLD.to_string(), "80".to_string())].into();
        wb.save_settings(&mut session, &form).unwrap();
        assert_eq!(wb.config().configuration().null_ratio_alert_threshold(), 0.8);

        let fresh = wb.reset_settings(&mut session).unwrap();
        assert_eq!(fresh, ConfigurationDocument::defaults());
        assert_eq!(wb.settings(&mut session).null_ratio_alert_threshold(), 0.05);
    }
}
