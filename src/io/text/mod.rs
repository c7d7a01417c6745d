//! Reading the whitespace delimited text format for MSI datasets.
//!
//! See [`TextReaderType`] for a description of the layout.
use std::{fs, path::Path};

use crate::dataset::Dataset;
use crate::io::infer_format::{DatasetError, Loader};

mod reader;

pub use reader::*;

/// The [`Loader`] for `.txt` datasets
#[derive(Debug, Clone, Copy)]
pub struct TextLoader {
    buffer_size: usize,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
        }
    }
}

impl TextLoader {
    pub const EXTENSIONS: &'static [&'static str] = &[".txt"];

    /// Set the read buffer capacity used for each file
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Loader for TextLoader {
    fn extensions(&self) -> &[&str] {
        Self::EXTENSIONS
    }

    fn load(&self, path: &Path) -> Result<Dataset, DatasetError> {
        let handle = fs::File::open(path)?;
        let dataset = TextReaderType::with_buffer_capacity(handle, self.buffer_size).read_dataset()?;
        Ok(dataset)
    }
}
