//! Object-storage addressing and the blocking transport interface.
//!
//! The transport itself lives outside this crate; callers plug one in through [`ObjectStorage`].
//! [`InMemoryObjectStorage`] backs tests and single-process use.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use bytes::Bytes;

use crate::error::RemoteError;

/// A `scheme://bucket/key` locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteLocator {
    /// URL scheme without `://` (e.g. `s3`).
    pub scheme: String,
    /// Bucket (host segment).
    pub bucket: String,
    /// Object key; everything after the first `/` following the bucket.
    pub key: String,
}

impl RemoteLocator {
    /// Parse a locator, splitting on the first `/` after the bucket.
    ///
    /// A locator without a scheme is read as `s3://`.
    pub fn parse(raw: &str) -> Result<Self, RemoteError> {
        let trimmed = raw.trim();
        let (scheme, rest) = trimmed.split_once("://").unwrap_or(("s3", trimmed));
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| RemoteError::InvalidLocator(raw.to_string()))?;
        if scheme.is_empty() || bucket.is_empty() || key.is_empty() {
            return Err(RemoteError::InvalidLocator(raw.to_string()));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Copy of this locator whose key ends with `.<ext>`.
    pub fn with_extension(&self, ext: &str) -> Self {
        let suffix = format!(".{ext}");
        let mut out = self.clone();
        if !out.key.ends_with(&suffix) {
            out.key.push_str(&suffix);
        }
        out
    }
}

impl FromStr for RemoteLocator {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RemoteLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

/// Blocking object-storage transport.
///
/// Calls run to completion; there is no timeout or retry at this layer.
pub trait ObjectStorage: Send + Sync {
    /// Download the object at `locator`.
    fn get(&self, locator: &RemoteLocator) -> Result<Bytes, RemoteError>;

    /// Upload `body` to `locator`, replacing any existing object.
    fn put(&self, locator: &RemoteLocator, body: Bytes) -> Result<(), RemoteError>;
}

/// Process-local [`ObjectStorage`] keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct InMemoryObjectStorage {
    objects: RwLock<HashMap<(String, String), Bytes>>,
}

impl InMemoryObjectStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStorage for InMemoryObjectStorage {
    fn get(&self, locator: &RemoteLocator) -> Result<Bytes, RemoteError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| RemoteError::Io(std::io::Error::other("object map lock poisoned")))?;
        objects
            .get(&(locator.bucket.clone(), locator.key.clone()))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                bucket: locator.bucket.clone(),
                key: locator.key.clone(),
            })
    }

    fn put(&self, locator: &RemoteLocator, body: Bytes) -> Result<(), RemoteError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| RemoteError::Io(std::io::Error::other("object map lock poisoned")))?;
        objects.insert((locator.bucket.clone(), locator.key.clone()), body);
        Ok(())
    }
}
