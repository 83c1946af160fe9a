//! ORM registry: datastores, collection definitions, and initialization.
//!
//! A `Tidewater` instance collects datastore adapters and collection
//! definitions, then `initialize()` freezes them into an [`Orm`]. After
//! initialization the registry is immutable and shared behind an `Arc`, so
//! [`crate::collection::Collection`] handles are cheap to clone and safe to
//! send across threads.

use crate::adapter::Adapter;
use crate::collection::Collection;
use crate::config::OrmConfig;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reserved identity of the built-in archive collection.
pub const ARCHIVE_IDENTITY: &str = "_archive";

/// Error raised while assembling or inspecting the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrmError {
    /// Two collections were registered under the same identity.
    DuplicateCollection(String),
    /// A collection references a datastore that was never registered.
    UnknownDatastore { collection: String, datastore: String },
    /// A lookup targeted an identity that was never registered.
    UnknownCollection(String),
    /// Archiving is enabled but no datastore could be chosen for the archive
    /// collection.
    ArchiveDatastoreUnresolved,
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::DuplicateCollection(identity) => {
                write!(f, "A collection with identity `{identity}` is already registered")
            }
            OrmError::UnknownDatastore {
                collection,
                datastore,
            } => write!(
                f,
                "Collection `{collection}` references unknown datastore `{datastore}`"
            ),
            OrmError::UnknownCollection(identity) => {
                write!(f, "No collection registered under identity `{identity}`")
            }
            OrmError::ArchiveDatastoreUnresolved => write!(
                f,
                "Archiving is enabled, but no archive datastore is configured and more \
                 than one datastore is registered; set `archive.datastore` to choose one"
            ),
        }
    }
}

impl std::error::Error for OrmError {}

/// Definition of one collection: its identity, the datastore it lives in,
/// and its primary key attribute.
#[derive(Debug, Clone)]
pub struct CollectionDef {
    pub identity: String,
    pub datastore: String,
    pub primary_key: String,
}

impl CollectionDef {
    /// A collection definition with the conventional `id` primary key.
    pub fn new(identity: impl Into<String>, datastore: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            datastore: datastore.into(),
            primary_key: "id".to_string(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }
}

pub(crate) struct CollectionInner {
    pub(crate) identity: String,
    pub(crate) primary_key: String,
    pub(crate) adapter: Arc<dyn Adapter>,
}

impl CollectionInner {
    pub(crate) fn identity(&self) -> &str {
        &self.identity
    }
}

pub(crate) struct OrmInner {
    collections: HashMap<String, Arc<CollectionInner>>,
    archive: Option<Arc<CollectionInner>>,
}

impl OrmInner {
    pub(crate) fn primary_key_of(&self, identity: &str) -> Option<&str> {
        self.collections
            .get(identity)
            .map(|collection| collection.primary_key.as_str())
    }

    /// The archive collection, or `None` when archiving is disabled.
    pub(crate) fn archive_collection(&self) -> Option<Arc<CollectionInner>> {
        self.archive.clone()
    }
}

/// Registration phase of the ORM: accumulate datastores and collection
/// definitions, then [`Tidewater::initialize`] to get a usable [`Orm`].
#[derive(Default)]
pub struct Tidewater {
    config: OrmConfig,
    datastores: HashMap<String, Arc<dyn Adapter>>,
    definitions: Vec<CollectionDef>,
}

impl Tidewater {
    pub fn new(config: OrmConfig) -> Self {
        Self {
            config,
            datastores: HashMap::new(),
            definitions: Vec::new(),
        }
    }

    /// Register a named datastore backed by the given adapter.
    pub fn register_datastore(
        &mut self,
        name: impl Into<String>,
        adapter: Arc<dyn Adapter>,
    ) -> &mut Self {
        self.datastores.insert(name.into(), adapter);
        self
    }

    /// Register a collection definition.
    pub fn register_collection(&mut self, def: CollectionDef) -> &mut Self {
        self.definitions.push(def);
        self
    }

    /// Freeze the registry.
    ///
    /// When archiving is enabled and no collection claims the reserved
    /// `_archive` identity, the built-in archive collection is injected,
    /// pinned to `archive.datastore` when configured, or to the sole
    /// registered datastore otherwise.
    ///
    /// # Errors
    ///
    /// Returns `OrmError` for duplicate identities, unknown datastores, or
    /// an unresolvable archive datastore.
    pub fn initialize(self) -> Result<Orm, OrmError> {
        let mut collections: HashMap<String, Arc<CollectionInner>> = HashMap::new();
        for def in self.definitions {
            if collections.contains_key(&def.identity) {
                return Err(OrmError::DuplicateCollection(def.identity));
            }
            let adapter = self
                .datastores
                .get(&def.datastore)
                .cloned()
                .ok_or_else(|| OrmError::UnknownDatastore {
                    collection: def.identity.clone(),
                    datastore: def.datastore.clone(),
                })?;
            collections.insert(
                def.identity.clone(),
                Arc::new(CollectionInner {
                    identity: def.identity,
                    primary_key: def.primary_key,
                    adapter,
                }),
            );
        }

        let archive = if self.config.archive.enabled {
            let identity = self
                .config
                .archive
                .identity
                .clone()
                .unwrap_or_else(|| ARCHIVE_IDENTITY.to_string());
            match collections.get(&identity) {
                Some(existing) => Some(existing.clone()),
                None => {
                    let adapter = match &self.config.archive.datastore {
                        Some(name) => self.datastores.get(name).cloned().ok_or_else(|| {
                            OrmError::UnknownDatastore {
                                collection: identity.clone(),
                                datastore: name.clone(),
                            }
                        })?,
                        None if self.datastores.len() == 1 => self
                            .datastores
                            .values()
                            .next()
                            .cloned()
                            .ok_or(OrmError::ArchiveDatastoreUnresolved)?,
                        None => return Err(OrmError::ArchiveDatastoreUnresolved),
                    };
                    let inner = Arc::new(CollectionInner {
                        identity: identity.clone(),
                        primary_key: "id".to_string(),
                        adapter,
                    });
                    collections.insert(identity.clone(), inner.clone());
                    log::debug!("injected built-in `{identity}` archive collection");
                    Some(inner)
                }
            }
        } else {
            None
        };

        log::info!(
            "initialized ORM with {} collection(s); archiving {}",
            collections.len(),
            if archive.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Orm {
            inner: Arc::new(OrmInner {
                collections,
                archive,
            }),
        })
    }
}

/// An initialized, immutable ORM registry.
#[derive(Clone)]
pub struct Orm {
    inner: Arc<OrmInner>,
}

impl Orm {
    /// Look up a collection handle by identity.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownCollection` when no collection is
    /// registered under `identity`.
    pub fn collection(&self, identity: &str) -> Result<Collection, OrmError> {
        self.inner
            .collections
            .get(identity)
            .cloned()
            .map(|collection| Collection::from_parts(collection, self.inner.clone()))
            .ok_or_else(|| OrmError::UnknownCollection(identity.to_string()))
    }

    /// Whether the archive collection is available.
    pub fn archive_enabled(&self) -> bool {
        self.inner.archive.is_some()
    }
}
