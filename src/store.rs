//! Locating datasets in a store directory and naming them.
//!
//! A dataset store is a directory whose sub-directories are datasets. The
//! on-disk (storage) name of a dataset uses underscores, its readable name uses
//! spaces. Data files live in `<root>/<storage name>/*_data/`.
pub mod discover;
pub mod ident;

pub use discover::{
    as_readable, data_root_from_env, DatasetEntry, DatasetLocator, DatasetStore, StoreError, DATA_ROOT_ENV,
    DEFAULT_DATA_ROOT,
};
pub use ident::{name_to_id, IdHasher, UnknownIdError, DEFAULT_CACHE_CAPACITY, MAX_SAFE_INTEGER};
