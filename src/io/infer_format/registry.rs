use std::{fmt::Debug, path::Path, sync::Arc};

use indexmap::{IndexMap, IndexSet};
use log::debug;

use super::dispatch::DatasetError;
use super::inference::normalize_extension;
use crate::dataset::Dataset;
use crate::io::text::TextLoader;

#[cfg(feature = "imzml")]
use crate::io::imzml::ImzMLLoader;

/// Reads one file format into a [`Dataset`].
///
/// Implementations are registered with a [`LoaderRegistry`] under each of the
/// extensions they report.
pub trait Loader: Send + Sync {
    /// The extensions this loader handles, e.g. `".txt"`. Case does not matter.
    fn extensions(&self) -> &[&str];

    /// Extensions of files read alongside the main file, like imzML's `.ibd`.
    /// They are not data files of their own.
    fn companion_extensions(&self) -> &[&str] {
        &[]
    }

    /// Read the complete dataset stored at `path`
    fn load(&self, path: &Path) -> Result<Dataset, DatasetError>;
}

impl<T: Loader + ?Sized> Loader for Arc<T> {
    fn extensions(&self) -> &[&str] {
        (**self).extensions()
    }

    fn companion_extensions(&self) -> &[&str] {
        (**self).companion_extensions()
    }

    fn load(&self, path: &Path) -> Result<Dataset, DatasetError> {
        (**self).load(path)
    }
}

/// A mapping from normalized file extension to the [`Loader`] for it.
///
/// The first loader registered for an extension keeps it.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: IndexMap<String, Arc<dyn Loader>>,
    companions: IndexSet<String>,
}

impl Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("extensions", &self.loaders.keys().collect::<Vec<_>>())
            .field("companions", &self.companions)
            .finish()
    }
}

impl LoaderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `.txt` and `.imzml` loaders
    pub fn with_default_loaders() -> Self {
        let mut registry = Self::new();
        registry.register(TextLoader::default());
        #[cfg(feature = "imzml")]
        registry.register(ImzMLLoader::default());
        registry
    }

    /// Register `loader` under each of its extensions not already taken.
    ///
    /// Returns `true` when at least one extension was added.
    pub fn register<L: Loader + 'static>(&mut self, loader: L) -> bool {
        self.register_shared(Arc::new(loader))
    }

    /// As [`LoaderRegistry::register`], for a loader that is already shared
    pub fn register_shared(&mut self, loader: Arc<dyn Loader>) -> bool {
        let mut inserted = false;
        for extension in loader.extensions() {
            let key = normalize_extension(extension);
            if self.loaders.contains_key(&key) {
                debug!("A loader is already registered for {key}, ignoring the new one");
                continue;
            }
            debug!("Registered a loader for {key}");
            self.loaders.insert(key, loader.clone());
            inserted = true;
        }
        if inserted {
            self.companions.extend(
                loader
                    .companion_extensions()
                    .iter()
                    .map(|ext| normalize_extension(ext)),
            );
        }
        inserted
    }

    /// The loader for `extension`, with or without its leading dot
    pub fn get(&self, extension: &str) -> Option<&Arc<dyn Loader>> {
        self.loaders.get(&normalize_extension(extension))
    }

    /// The loader for the extension of `path`
    pub fn get_for_path(&self, path: &Path) -> Option<&Arc<dyn Loader>> {
        let extension = path.extension()?.to_str()?;
        self.get(extension)
    }

    /// Whether `path` is a companion file of a registered format
    pub fn is_companion(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.companions.contains(&normalize_extension(ext)))
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.get(extension).is_some()
    }

    /// The registered extensions, in registration order
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}
