use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::info;

use crate::error::StorageError;

use super::{merge, ConfigurationDocument};

/// Where the persisted document lives.
///
/// The store only needs whole-document reads and writes, so a per-session or remote backend can
/// replace the file without touching the rest of the crate.
pub trait ConfigStorage: Send + Sync {
    /// Read the persisted document, or `None` if nothing has been written yet.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Overwrite the persisted document.
    fn write(&self, contents: &str) -> Result<(), StorageError>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

/// Stores the document as a JSON file.
#[derive(Debug, Clone)]
pub struct FileConfigStorage {
    path: PathBuf,
}

impl FileConfigStorage {
    /// Store the document at `path`. Parent directories are created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `static/configuration.json` under the current working directory.
    pub fn default_location() -> std::io::Result<PathBuf> {
        Ok(std::env::current_dir()?.join("static").join("configuration.json"))
    }

    /// A storage at [`Self::default_location`].
    pub fn in_working_dir() -> std::io::Result<Self> {
        Ok(Self::new(Self::default_location()?))
    }

    /// Path of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStorage for FileConfigStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the document in memory; useful for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct InMemoryConfigStorage {
    contents: Mutex<Option<String>>,
}

impl InMemoryConfigStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage that already holds `contents`.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }
}

impl ConfigStorage for InMemoryConfigStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        let guard = self
            .contents
            .lock()
            .map_err(|_| std::io::Error::other("configuration lock poisoned"))?;
        Ok(guard.clone())
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| std::io::Error::other("configuration lock poisoned"))?;
        *guard = Some(contents.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

/// Owns the default schema and the authoritative persisted document.
#[derive(Debug)]
pub struct ConfigStore<S: ConfigStorage = FileConfigStorage> {
    storage: S,
    defaults: ConfigurationDocument,
    configuration: ConfigurationDocument,
}

impl<S: ConfigStorage> ConfigStore<S> {
    /// Open the store with the built-in defaults, loading or initializing the document.
    pub fn open(storage: S) -> Result<Self, StorageError> {
        Self::with_defaults(storage, ConfigurationDocument::defaults())
    }

    /// Open the store with a custom default schema.
    pub fn with_defaults(storage: S, defaults: ConfigurationDocument) -> Result<Self, StorageError> {
        let mut store = Self {
            storage,
            configuration: defaults.clone(),
            defaults,
        };
        store.load_or_initialize()?;
        Ok(store)
    }

    /// Load the persisted document verbatim, or write the defaults if none exists.
    pub fn load_or_initialize(&mut self) -> Result<&ConfigurationDocument, StorageError> {
        match self.storage.read()? {
            Some(text) => {
                self.configuration = serde_json::from_str(&text)?;
                info!(location = %self.storage.location(), "loaded configuration");
            }
            None => {
                self.configuration = self.defaults.clone();
                self.write_document(&self.configuration)?;
                info!(location = %self.storage.location(), "initialized configuration with defaults");
            }
        }
        Ok(&self.configuration)
    }

    /// Make `doc` the authoritative document and overwrite the persisted copy.
    pub fn persist(&mut self, doc: ConfigurationDocument) -> Result<(), StorageError> {
        self.write_document(&doc)?;
        self.configuration = doc;
        info!(location = %self.storage.location(), "saved configuration");
        Ok(())
    }

    /// Discard every override: persist the defaults and reload them.
    pub fn reset(&mut self) -> Result<&ConfigurationDocument, StorageError> {
        self.write_document(&self.defaults)?;
        info!(location = %self.storage.location(), "reset configuration to defaults");
        self.load_or_initialize()
    }

    /// The authoritative document as loaded or last persisted.
    pub fn configuration(&self) -> &ConfigurationDocument {
        &self.configuration
    }

    /// The built-in default schema.
    pub fn defaults(&self) -> &ConfigurationDocument {
        &self.defaults
    }

    /// The authoritative document migrated onto the current default schema.
    ///
    /// This is what sessions are seeded from.
    pub fn session_defaults(&self) -> ConfigurationDocument {
        merge(&self.defaults, &self.configuration)
    }

    /// The underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn write_document(&self, doc: &ConfigurationDocument) -> Result<(), StorageError> {
        self.storage.write(&to_pretty_json(doc)?)
    }
}

/// Serialize a document the way it is persisted: UTF-8 JSON with 4-space indentation.
pub fn to_pretty_json(doc: &ConfigurationDocument) -> Result<String, StorageError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    doc.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
}
