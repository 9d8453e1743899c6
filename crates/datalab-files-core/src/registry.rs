//! Registry holding one file manager per backend type.
//!
//! Built explicitly at startup and handed to whoever needs file managers.
//! Each registered constructor runs at most once, on first request; the
//! resulting instance is shared by every caller for the registry's lifetime.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::FileManagerError;
use crate::file_id::{DatalabFileId, FileManagerType};
use crate::manager::FileManager;

type Constructor = Box<dyn Fn() -> Arc<dyn FileManager> + Send + Sync>;

struct Entry {
    construct: Constructor,
    instance: OnceLock<Arc<dyn FileManager>>,
}

pub struct FileManagerRegistry {
    entries: HashMap<FileManagerType, Entry>,
}

impl FileManagerRegistry {
    pub fn builder() -> FileManagerRegistryBuilder {
        FileManagerRegistryBuilder {
            entries: HashMap::new(),
        }
    }

    /// Get the manager for a backend type, constructing it on first use.
    pub fn get(&self, manager_type: FileManagerType) -> Result<Arc<dyn FileManager>, FileManagerError> {
        let entry = self
            .entries
            .get(&manager_type)
            .ok_or(FileManagerError::NotRegistered(manager_type))?;

        let instance = entry.instance.get_or_init(|| {
            debug!("Constructing {} file manager", manager_type);
            (entry.construct)()
        });
        Ok(Arc::clone(instance))
    }

    /// Get the manager for a backend name such as `drive`.
    pub fn get_by_name(&self, name: &str) -> Result<Arc<dyn FileManager>, FileManagerError> {
        self.get(FileManagerType::from_name(name)?)
    }

    /// Get the manager that resolves `file_id`.
    pub fn for_file(&self, file_id: &DatalabFileId) -> Result<Arc<dyn FileManager>, FileManagerError> {
        self.get(file_id.source)
    }

    pub fn is_registered(&self, manager_type: FileManagerType) -> bool {
        self.entries.contains_key(&manager_type)
    }

    /// Registered backend types, in a stable order.
    pub fn registered_types(&self) -> Vec<FileManagerType> {
        let mut types: Vec<_> = self.entries.keys().copied().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for FileManagerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileManagerRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

pub struct FileManagerRegistryBuilder {
    entries: HashMap<FileManagerType, Entry>,
}

impl FileManagerRegistryBuilder {
    /// Register a constructor, replacing any earlier one for the same type.
    pub fn register_with<F>(mut self, manager_type: FileManagerType, construct: F) -> Self
    where
        F: Fn() -> Arc<dyn FileManager> + Send + Sync + 'static,
    {
        self.entries.insert(
            manager_type,
            Entry {
                construct: Box::new(construct),
                instance: OnceLock::new(),
            },
        );
        self
    }

    /// Register an already constructed manager under its own type.
    pub fn register(self, manager: Arc<dyn FileManager>) -> Self {
        let manager_type = manager.manager_type();
        self.register_with(manager_type, move || Arc::clone(&manager))
    }

    pub fn build(self) -> FileManagerRegistry {
        FileManagerRegistry {
            entries: self.entries,
        }
    }
}
