//! Implements a reader for the imzML (Imaging Mass Spectrometry Markup Language) format
//! for representing mass spectrometry imaging data.
//!
//! **Requires the `imzml` feature**
//!
//! imzML is based on mzML but stores binary data in an external `.ibd` file instead of
//! embedding it as base64 encoded data in the XML.
//!
//! The format consists of:
//! - `.imzml` file: XML metadata based on mzML schema with imaging-specific CV terms
//! - `.ibd` file: Binary data file containing mass spectra data
//!
//! Data can be stored in two modes:
//! - **Continuous**: All spectra share the same m/z values
//! - **Processed**: Each spectrum has its own m/z and intensity arrays
//!
//! Only continuous data can be loaded into a [`Dataset`]. The check is made on
//! the array lengths the document declares, not on its data mode parameter.
//!
//! See: <https://www.ms-imaging.org/imzml/>
use std::{
    io::{Read, Seek},
    path::Path,
};

use log::debug;

use crate::dataset::{Coordinates, Dataset};
use crate::io::infer_format::{DatasetError, Loader};

mod ibd;
pub mod params;
mod reader;

pub use ibd::{
    decode_array, ArrayLocation, BinaryDataArrayType, ChecksumKind, IbdDataMode, IbdError, IbdFile,
};
pub use reader::{
    is_imzml, parse_imzml, IbdChecksum, ImzMLError, ImzMLFileMetadata, ImzMLParserState,
    ImzMLReader, ImzMLReaderType, SpectrumEntry,
};

// Re-export UUID for convenience
pub use uuid::Uuid;

/// Random access to the spectra of an imaging run
pub trait ImzMLSource {
    /// The number of m/z values of each spectrum
    fn mz_lengths(&self) -> &[usize];

    /// The `(x, y, z)` position of each spectrum
    fn coordinates(&self) -> &[(i64, i64, i64)];

    /// The m/z and intensity arrays of the spectrum at `index`
    fn get_spectrum(&mut self, index: usize) -> Result<(Vec<f64>, Vec<f64>), ImzMLError>;
}

impl<R: Read + Seek> ImzMLSource for ImzMLReaderType<R> {
    fn mz_lengths(&self) -> &[usize] {
        ImzMLReaderType::mz_lengths(self)
    }

    fn coordinates(&self) -> &[(i64, i64, i64)] {
        ImzMLReaderType::coordinates(self)
    }

    fn get_spectrum(&mut self, index: usize) -> Result<(Vec<f64>, Vec<f64>), ImzMLError> {
        ImzMLReaderType::get_spectrum(self, index)
    }
}

/// Build a [`Dataset`] from a continuous mode source.
///
/// Every spectrum must have the same number of m/z values. The m/z axis is
/// taken from the first spectrum and no labels are attached.
pub fn read_continuous<S: ImzMLSource + ?Sized>(source: &mut S) -> Result<Dataset, ImzMLError> {
    let lengths = source.mz_lengths();
    let (Some(min), Some(max)) = (lengths.iter().min().copied(), lengths.iter().max().copied())
    else {
        return Err(ImzMLError::NoSpectra);
    };
    if min != max {
        return Err(ImzMLError::ProcessedMode { min, max });
    }

    let triples = source.coordinates().to_vec();
    let (mz, first) = source.get_spectrum(0)?;
    let mut rows = Vec::with_capacity(triples.len());
    if !triples.is_empty() {
        rows.push(first);
    }
    for index in 1..triples.len() {
        let (_, intensities) = source.get_spectrum(index)?;
        rows.push(intensities);
    }
    debug!("Read {} continuous spectra of {} m/z values", rows.len(), mz.len());
    Ok(Dataset::from_rows(
        rows,
        Coordinates::from_triples(triples),
        mz,
        None,
    )?)
}

/// Load the continuous mode imzML dataset at `path` and its IBD file
pub fn load_imzml<P: AsRef<Path>>(path: P) -> Result<Dataset, ImzMLError> {
    let mut reader = ImzMLReader::open_path(path)?;
    read_continuous(&mut reader)
}

/// The [`Loader`] for `.imzML` datasets
#[derive(Debug, Clone, Copy, Default)]
pub struct ImzMLLoader {
    #[cfg(feature = "checksum")]
    verify_checksum: bool,
}

impl ImzMLLoader {
    pub const EXTENSIONS: &'static [&'static str] = &[".imzml"];
    pub const COMPANION_EXTENSIONS: &'static [&'static str] = &[".ibd"];

    /// Verify the IBD checksum declared in each document before reading it
    #[cfg(feature = "checksum")]
    pub fn with_checksum_verification(verify_checksum: bool) -> Self {
        Self { verify_checksum }
    }
}

impl Loader for ImzMLLoader {
    fn extensions(&self) -> &[&str] {
        Self::EXTENSIONS
    }

    fn companion_extensions(&self) -> &[&str] {
        Self::COMPANION_EXTENSIONS
    }

    fn load(&self, path: &Path) -> Result<Dataset, DatasetError> {
        let mut reader = ImzMLReader::open_path(path)?;
        #[cfg(feature = "checksum")]
        {
            if self.verify_checksum && !reader.verify_checksum()? {
                log::warn!("{} declares no IBD checksum to verify", path.display());
            }
        }
        Ok(read_continuous(&mut reader)?)
    }
}

#[cfg(test)]
mod tests;
