//! Reading MSI dataset file formats and dispatching between them.
//!
//! Each format has a [`Loader`] which reads a complete file into a
//! [`Dataset`](crate::dataset::Dataset). A [`LoaderRegistry`] maps file
//! extensions to loaders, and a [`DatasetReader`] resolves dataset names to
//! files and picks the loader for each.

mod infer_format;
pub mod text;
#[cfg(feature = "imzml")]
pub mod imzml;

pub use crate::io::infer_format::{
    infer_format, infer_from_path, infer_from_stream, normalize_extension, path_extension,
    DatasetError, DatasetReader, DatasetReaderBuilder, LoadedDatasets, Loader, LoaderRegistry,
    MsiFormat,
};

pub use crate::io::text::{load_txt, TextLoader, TextParserError, TextReader, TextReaderType};

#[cfg(feature = "imzml")]
pub use crate::io::imzml::{
    load_imzml, ImzMLError, ImzMLLoader, ImzMLReader, ImzMLReaderType, ImzMLSource,
};
