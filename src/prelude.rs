//! The traits needed to use datasets, loaders and locators generically.
pub use crate::io::Loader;
#[cfg(feature = "imzml")]
pub use crate::io::ImzMLSource;
pub use crate::store::DatasetLocator;
