use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use log::{debug, trace, warn};
use thiserror::Error;

use super::ident::{IdHasher, UnknownIdError, DEFAULT_CACHE_CAPACITY};

/// The environment variable naming the dataset store root
pub const DATA_ROOT_ENV: &str = "MSI_DATA_ROOT";

/// The store root used when [`DATA_ROOT_ENV`] is not set
pub const DEFAULT_DATA_ROOT: &str = "./data";

const DATA_DIR_SUFFIX: &str = "_data";

/// The store root named by [`DATA_ROOT_ENV`], or [`DEFAULT_DATA_ROOT`] when it
/// is not set
pub fn data_root_from_env() -> PathBuf {
    env::var_os(DATA_ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT))
}

/// The two questions the loading machinery asks about a dataset name.
pub trait DatasetLocator {
    /// Whether a dataset called `name` exists
    fn exists(&self, name: &str) -> io::Result<bool>;

    /// Every data file belonging to the dataset called `name`, in a stable order
    fn path_for(&self, name: &str) -> io::Result<Vec<PathBuf>>;
}

impl<T: DatasetLocator + ?Sized> DatasetLocator for &T {
    fn exists(&self, name: &str) -> io::Result<bool> {
        (**self).exists(name)
    }

    fn path_for(&self, name: &str) -> io::Result<Vec<PathBuf>> {
        (**self).path_for(name)
    }
}

/// A dataset in the store: its readable `name` and its storage name, `value`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatasetEntry {
    pub name: String,
    pub value: String,
}

impl DatasetEntry {
    pub fn from_storage_name(storage_name: &str) -> Self {
        Self {
            name: as_readable(storage_name),
            value: storage_name.to_string(),
        }
    }

    /// Whether `name` refers to this dataset by either of its names
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.value == name
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("An IO error occurred while scanning the dataset store: {0}")]
    IOError(#[from] io::Error),
    #[error(transparent)]
    UnknownId(#[from] UnknownIdError),
}

impl From<StoreError> for io::Error {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::IOError(e) => e,
            StoreError::UnknownId(e) => Self::new(io::ErrorKind::NotFound, e),
        }
    }
}

/// Convert a storage name to the name shown to users
pub fn as_readable(storage_name: &str) -> String {
    storage_name.replace('_', " ")
}

/// A directory of datasets, one sub-directory per dataset.
#[derive(Debug)]
pub struct DatasetStore {
    root: PathBuf,
    hasher: IdHasher,
}

impl DatasetStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::with_id_cache_capacity(root, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_id_cache_capacity<P: Into<PathBuf>>(root: P, capacity: usize) -> Self {
        Self {
            root: root.into(),
            hasher: IdHasher::new(capacity),
        }
    }

    /// Open the store named by the [`DATA_ROOT_ENV`] environment variable, or
    /// [`DEFAULT_DATA_ROOT`] when it is not set.
    pub fn from_env() -> Self {
        let root = data_root_from_env();
        debug!("Using dataset store root {}", root.display());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The names of all entries directly under the store root, sorted
    pub fn list_datasets(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!("Skipping non UTF-8 store entry {name:?}"),
            }
        }
        names.sort();
        Ok(names)
    }

    /// The datasets available in the store, sorted by storage name
    pub fn get_datasets(&self) -> io::Result<Vec<DatasetEntry>> {
        let datasets = self
            .list_datasets()?
            .into_iter()
            .filter(|name| self.root.join(name).is_dir())
            .map(|name| DatasetEntry::from_storage_name(&name))
            .collect();
        Ok(datasets)
    }

    /// Find the dataset `name` refers to, by readable or storage name
    pub fn find(&self, name: &str) -> io::Result<Option<DatasetEntry>> {
        Ok(self
            .get_datasets()?
            .into_iter()
            .find(|entry| entry.matches(name)))
    }

    pub fn dataset_exists(&self, name: &str) -> io::Result<bool> {
        Ok(self.find(name)?.is_some())
    }

    /// Every file matching `<root>/<storage name>/*_data/*.*`, sorted.
    ///
    /// Hidden entries are skipped, as are directories at the file level.
    pub fn dataset_paths(&self, name: &str) -> io::Result<Vec<PathBuf>> {
        let entry = self.find(name)?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Dataset {name} could not be found."),
            )
        })?;
        let dataset_root = self.root.join(&entry.value);
        let mut paths = Vec::new();
        for data_dir in fs::read_dir(&dataset_root)? {
            let data_dir = data_dir?;
            if !is_visible_match(&data_dir.file_name(), |n| n.ends_with(DATA_DIR_SUFFIX))
                || !data_dir.file_type()?.is_dir()
            {
                continue;
            }
            for file in fs::read_dir(data_dir.path())? {
                let file = file?;
                if is_visible_match(&file.file_name(), |n| n.contains('.'))
                    && file.file_type()?.is_file()
                {
                    paths.push(file.path());
                }
            }
        }
        paths.sort();
        trace!("Dataset {name} resolved to {paths:?}");
        Ok(paths)
    }

    /// The identifier of `name`, memoized per store
    pub fn name_to_id(&self, name: &str) -> u64 {
        self.hasher.id_of(name)
    }

    /// The readable name of the dataset whose identifier is `id`
    pub fn id_to_name(&self, id: u64) -> Result<String, StoreError> {
        self.get_datasets()?
            .into_iter()
            .map(|entry| entry.name)
            .find(|name| self.name_to_id(name) == id)
            .ok_or(StoreError::UnknownId(UnknownIdError(id)))
    }
}

fn is_visible_match(name: &std::ffi::OsStr, pattern: impl Fn(&str) -> bool) -> bool {
    match name.to_str() {
        Some(name) => !name.starts_with('.') && pattern(name),
        None => false,
    }
}

impl DatasetLocator for DatasetStore {
    fn exists(&self, name: &str) -> io::Result<bool> {
        self.dataset_exists(name)
    }

    fn path_for(&self, name: &str) -> io::Result<Vec<PathBuf>> {
        self.dataset_paths(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_store() -> io::Result<(tempfile::TempDir, DatasetStore)> {
        let dir = tempfile::tempdir()?;
        for name in ["dataset_number_one", "dataset_number_two", "dataset_number_three"] {
            fs::create_dir_all(dir.path().join(name).join("raw_data"))?;
        }
        fs::write(dir.path().join("README.md"), "not a dataset")?;
        let store = DatasetStore::new(dir.path());
        Ok((dir, store))
    }

    #[test]
    fn test_as_readable() {
        assert_eq!(as_readable("dataset_number_one"), "dataset number one");
        assert_eq!(as_readable("plain"), "plain");
    }

    #[test_log::test]
    fn test_returns_correct_datasets_set() -> io::Result<()> {
        let (_dir, store) = make_store()?;
        let datasets = store.get_datasets()?;
        assert_eq!(
            datasets,
            vec![
                DatasetEntry::from_storage_name("dataset_number_one"),
                DatasetEntry::from_storage_name("dataset_number_three"),
                DatasetEntry::from_storage_name("dataset_number_two"),
            ]
        );
        assert_eq!(store.list_datasets()?.len(), 4);
        Ok(())
    }

    #[test_log::test]
    fn test_dataset_exists() -> io::Result<()> {
        let (_dir, store) = make_store()?;
        assert!(store.dataset_exists("dataset number one")?);
        assert!(store.dataset_exists("dataset_number_one")?);
        assert!(!store.dataset_exists("dataset number four")?);
        assert!(!store.dataset_exists("README.md")?);
        Ok(())
    }

    #[test_log::test]
    fn test_dataset_paths() -> io::Result<()> {
        let (dir, store) = make_store()?;
        let data_dir = dir.path().join("dataset_number_one").join("raw_data");
        fs::write(data_dir.join("b.txt"), "")?;
        fs::write(data_dir.join("a.imzML"), "")?;
        fs::write(data_dir.join("no_extension"), "")?;
        fs::write(data_dir.join(".hidden.txt"), "")?;
        fs::create_dir(data_dir.join("nested.d"))?;
        fs::create_dir_all(dir.path().join("dataset_number_one").join("notes"))?;
        fs::write(
            dir.path().join("dataset_number_one").join("notes").join("c.txt"),
            "",
        )?;

        let paths = store.dataset_paths("dataset number one")?;
        assert_eq!(paths, vec![data_dir.join("a.imzML"), data_dir.join("b.txt")]);

        assert!(store.dataset_paths("dataset number two")?.is_empty());
        let err = store.dataset_paths("dataset number four").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        Ok(())
    }

    #[test_log::test]
    fn test_finds_name_by_its_id() -> io::Result<()> {
        let (_dir, store) = make_store()?;
        let some_id = store.name_to_id("dataset number two");
        assert_eq!(store.id_to_name(some_id)?, "dataset number two");
        Ok(())
    }

    #[test_log::test]
    fn test_throws_for_nonexistent_id() -> io::Result<()> {
        let (_dir, store) = make_store()?;
        match store.id_to_name(123) {
            Err(StoreError::UnknownId(UnknownIdError(123))) => {}
            other => panic!("Expected an unknown id error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_missing_root() {
        let store = DatasetStore::new("/this/path/should/not/exist/anywhere");
        assert!(store.get_datasets().is_err());
    }
}
