use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, trace};
use thiserror::Error;

use super::inference::{infer_from_path, path_extension};
use super::registry::{Loader, LoaderRegistry};
use crate::dataset::{Dataset, ShapeMismatch};
use crate::io::text::{TextLoader, TextParserError};
use crate::store::{data_root_from_env, DatasetLocator, DatasetStore, DEFAULT_CACHE_CAPACITY};

#[cfg(feature = "imzml")]
use crate::io::imzml::{ImzMLError, ImzMLLoader};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset {0} could not be found.")]
    NotFound(String),
    #[error("Unsupported file extension: {0:?}")]
    UnsupportedExtension(String),
    #[error("Dataset {name} has {} data files, expected exactly one: {paths:?}", .paths.len())]
    Ambiguous { name: String, paths: Vec<PathBuf> },
    #[error("Failed to read a text dataset: {0}")]
    Text(#[from] TextParserError),
    #[cfg(feature = "imzml")]
    #[error("Failed to read an imzML dataset: {0}")]
    ImzML(#[from] ImzMLError),
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),
    #[error("An IO error occurred while locating a dataset: {0}")]
    IOError(#[from] io::Error),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<DatasetError> for io::Error {
    fn from(value: DatasetError) -> Self {
        match value {
            DatasetError::IOError(e) => e,
            DatasetError::NotFound(_) => Self::new(io::ErrorKind::NotFound, value),
            DatasetError::UnsupportedExtension(_) => Self::new(io::ErrorKind::Unsupported, value),
            DatasetError::Text(e) => e.into(),
            #[cfg(feature = "imzml")]
            DatasetError::ImzML(e) => e.into(),
            _ => Self::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// The outcome of [`DatasetReader::load`]
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedDatasets {
    Single(Dataset),
    Multiple(Vec<Dataset>),
}

impl LoadedDatasets {
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(datasets) => datasets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<Dataset> {
        match self {
            Self::Single(dataset) => vec![dataset],
            Self::Multiple(datasets) => datasets,
        }
    }
}

/// Resolves dataset names through a [`DatasetLocator`] and reads their files
/// with the [`Loader`] registered for each file's extension.
#[derive(Debug)]
pub struct DatasetReader<L: DatasetLocator = DatasetStore> {
    locator: L,
    registry: LoaderRegistry,
}

impl DatasetReader<DatasetStore> {
    /// Create a [`DatasetReaderBuilder`] which can be used to configure the
    /// store and loaders
    pub fn builder() -> DatasetReaderBuilder {
        DatasetReaderBuilder::default()
    }

    /// A reader over the store at `root` with the default loaders
    pub fn open<P: Into<PathBuf>>(root: P) -> Self {
        Self::new(DatasetStore::new(root), LoaderRegistry::with_default_loaders())
    }
}

impl<L: DatasetLocator> DatasetReader<L> {
    pub fn new(locator: L, registry: LoaderRegistry) -> Self {
        Self { locator, registry }
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    pub fn registry(&self) -> &LoaderRegistry {
        &self.registry
    }

    /// The data files of `name`, failing when the dataset is unknown or has none.
    /// Companion files are dropped unless nothing else is left.
    fn resolve(&self, name: &str) -> Result<Vec<PathBuf>, DatasetError> {
        if !self.locator.exists(name)? {
            return Err(DatasetError::NotFound(name.to_string()));
        }
        let mut paths = self.locator.path_for(name)?;
        if paths.is_empty() {
            return Err(DatasetError::NotFound(name.to_string()));
        }
        if paths.iter().any(|path| !self.registry.is_companion(path)) {
            paths.retain(|path| !self.registry.is_companion(path));
        }
        debug!("Dataset {name} resolved to {} file(s)", paths.len());
        Ok(paths)
    }

    /// Read the file at `path` with the loader registered for its extension
    pub fn load_path(&self, path: &Path) -> Result<Dataset, DatasetError> {
        let Some(loader) = self.registry.get_for_path(path) else {
            return Err(DatasetError::UnsupportedExtension(path_extension(path)));
        };
        trace!("Loading {} as {}", path.display(), infer_from_path(path));
        loader.load(path)
    }

    /// Load the dataset called `name`.
    ///
    /// A dataset with several data files is an error unless `allow_multiple` is
    /// set, in which case every file is loaded in order and the first failure is
    /// returned.
    pub fn load(&self, name: &str, allow_multiple: bool) -> Result<LoadedDatasets, DatasetError> {
        let paths = self.resolve(name)?;
        if let [path] = paths.as_slice() {
            return Ok(LoadedDatasets::Single(self.load_path(path)?));
        }
        if !allow_multiple {
            return Err(DatasetError::Ambiguous {
                name: name.to_string(),
                paths,
            });
        }
        let datasets = paths
            .iter()
            .map(|path| self.load_path(path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LoadedDatasets::Multiple(datasets))
    }

    /// Load the single data file of the dataset called `name`
    pub fn load_dataset(&self, name: &str) -> Result<Dataset, DatasetError> {
        let paths = self.resolve(name)?;
        if let [path] = paths.as_slice() {
            return self.load_path(path);
        }
        Err(DatasetError::Ambiguous {
            name: name.to_string(),
            paths,
        })
    }

    /// Load every data file of the dataset called `name`
    pub fn load_datasets(&self, name: &str) -> Result<Vec<Dataset>, DatasetError> {
        self.load(name, true).map(LoadedDatasets::into_vec)
    }
}

/// A builder for [`DatasetReader`] over a [`DatasetStore`].
///
/// The built-in loaders are registered first, so extra loaders cannot take
/// over `.txt` or `.imzml`. Build a [`LoaderRegistry`] by hand and use
/// [`DatasetReader::new`] for full control.
#[derive(Default)]
pub struct DatasetReaderBuilder {
    root: Option<PathBuf>,
    id_cache_capacity: Option<usize>,
    buffer_size: Option<usize>,
    #[cfg(feature = "checksum")]
    verify_checksums: bool,
    extra_loaders: Vec<Arc<dyn Loader>>,
}

impl DatasetReaderBuilder {
    /// Set the directory holding the datasets
    pub fn root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Take the store root from the `MSI_DATA_ROOT` environment variable,
    /// falling back to `./data`. This is also what happens when no root is set.
    pub fn root_from_env(mut self) -> Self {
        self.root = Some(data_root_from_env());
        self
    }

    /// Set how many name to identifier mappings the store remembers
    pub fn id_cache_capacity(mut self, capacity: usize) -> Self {
        self.id_cache_capacity = Some(capacity);
        self
    }

    /// Set the read buffer capacity of the text loader
    pub fn buffer_size(mut self, capacity: usize) -> Self {
        self.buffer_size = Some(capacity);
        self
    }

    /// Verify the IBD checksum declared by imzML files before reading them
    #[cfg(feature = "checksum")]
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Register an additional [`Loader`]
    pub fn register<T: Loader + 'static>(mut self, loader: T) -> Self {
        self.extra_loaders.push(Arc::new(loader));
        self
    }

    pub fn build(self) -> DatasetReader<DatasetStore> {
        let capacity = self.id_cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
        let root = self.root.unwrap_or_else(data_root_from_env);
        debug!("Using dataset store root {}", root.display());
        let store = DatasetStore::with_id_cache_capacity(root, capacity);

        let mut registry = LoaderRegistry::new();
        registry.register(match self.buffer_size {
            Some(capacity) => TextLoader::with_buffer_size(capacity),
            None => TextLoader::default(),
        });
        #[cfg(all(feature = "imzml", feature = "checksum"))]
        registry.register(ImzMLLoader::with_checksum_verification(self.verify_checksums));
        #[cfg(all(feature = "imzml", not(feature = "checksum")))]
        registry.register(ImzMLLoader::default());
        for loader in self.extra_loaders {
            registry.register_shared(loader);
        }
        DatasetReader::new(store, registry)
    }
}
