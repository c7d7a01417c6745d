//! `msidata` reads mass spectrometry imaging (MSI) datasets from a directory
//! store into a single in-memory representation.
//!
//! Two file formats are supported out of the box: a whitespace delimited text
//! format ([`io::text`]) and continuous mode imzML ([`io::imzml`], behind the
//! default `imzml` feature). Both produce a [`Dataset`]: a dense spectra table
//! with the m/z axis, the position of every spectrum and, for the text format,
//! a label per spectrum.
//!
//! Datasets are addressed by name. A [`DatasetStore`] maps names to the data
//! files under its root directory, and a [`DatasetReader`] picks the
//! [`Loader`](io::Loader) for each file by its extension:
//!
//! ```no_run
//! use msidata::{DatasetReader, DatasetError};
//!
//! # fn main() -> Result<(), DatasetError> {
//! let reader = DatasetReader::builder().root("./data").build();
//! let dataset = reader.load_dataset("dataset number one")?;
//! println!("{} spectra over {} m/z values", dataset.len(), dataset.channel_count());
//! # Ok(())
//! # }
//! ```
//!
//! Dataset names also have stable integer identifiers, see [`name_to_id`].
pub mod dataset;
pub mod io;
pub mod prelude;
pub mod store;

pub use crate::dataset::{Coordinates, Dataset, Dimension, ShapeMismatch};
pub use crate::io::{
    DatasetError, DatasetReader, DatasetReaderBuilder, LoadedDatasets, LoaderRegistry, MsiFormat,
};
pub use crate::store::{name_to_id, DatasetEntry, DatasetStore};
