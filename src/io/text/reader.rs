use std::{
    fs,
    io::{self, BufRead, BufReader, Read},
    num::{ParseFloatError, ParseIntError},
    path::Path,
};

use log::{debug, trace};
use thiserror::Error;

use crate::dataset::{Coordinates, Dataset, ShapeMismatch};

#[derive(Debug, Error)]
pub enum TextParserError {
    #[error("An IO error occurred while reading a text dataset: {0}")]
    IOError(#[from] io::Error),
    #[error("Expected a global metadata line and an m/z line, but the stream ended after {0} line(s)")]
    TruncatedHeader(usize),
    #[error("The metadata on line {line} has no matching data line")]
    DanglingMetadata { line: usize },
    #[error("The metadata on line {line} has {found} column(s), expected at least 4")]
    MissingColumns { line: usize, found: usize },
    #[error("Failed to parse {token:?} on line {line} as a number: {source}")]
    InvalidNumber {
        line: usize,
        token: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("Failed to parse {token:?} on line {line} as an integer: {source}")]
    InvalidInteger {
        line: usize,
        token: String,
        #[source]
        source: ParseIntError,
    },
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),
}

impl From<TextParserError> for io::Error {
    fn from(value: TextParserError) -> Self {
        match value {
            TextParserError::IOError(e) => e,
            _ => Self::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// The leading columns of a spectrum's metadata line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpotMetadata {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub label: i64,
}

/// Parse the `x y z label` prefix of a metadata line. Any further columns are
/// discarded.
pub fn parse_metadata(line: &str, line_number: usize) -> Result<SpotMetadata, TextParserError> {
    let mut tokens = line.split_whitespace();
    let mut values = [0i64; 4];
    for (i, value) in values.iter_mut().enumerate() {
        let token = tokens.next().ok_or(TextParserError::MissingColumns {
            line: line_number,
            found: i,
        })?;
        *value = token
            .parse::<i64>()
            .map_err(|source| TextParserError::InvalidInteger {
                line: line_number,
                token: token.to_string(),
                source,
            })?;
    }
    let [x, y, z, label] = values;
    Ok(SpotMetadata { x, y, z, label })
}

/// Parse a whitespace separated line of floating point values
pub fn parse_intensities(line: &str, line_number: usize) -> Result<Vec<f64>, TextParserError> {
    line.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|source| TextParserError::InvalidNumber {
                    line: line_number,
                    token: token.to_string(),
                    source,
                })
        })
        .collect()
}

/**
A parser for the plain text MSI format.

The first line holds global metadata and is discarded. The second line is the
m/z axis shared by all spectra. The rest of the file alternates between a
metadata line, `<x> <y> <z> <label> [ignored columns]`, and a data line with
one intensity per m/z value:

```text
global metadata
1.2 3.4 5.6
12 34 56 78
12.3 45.6 78.9
```

Blank lines where a metadata line is expected are skipped.
*/
pub struct TextReaderType<R: Read> {
    handle: BufReader<R>,
    buffer: String,
    line_number: usize,
}

pub(crate) const BUFFER_SIZE: usize = 8192;

impl<R: Read> TextReaderType<R> {
    /// Create a new [`TextReaderType`] instance, wrapping the [`io::Read`] handle
    /// provided with an [`io::BufReader`].
    pub fn new(file: R) -> TextReaderType<R> {
        Self::with_buffer_capacity(file, BUFFER_SIZE)
    }

    pub fn with_buffer_capacity(file: R, capacity: usize) -> TextReaderType<R> {
        TextReaderType {
            handle: BufReader::with_capacity(capacity, file),
            buffer: String::new(),
            line_number: 0,
        }
    }

    /// Read the next line into the buffer, returning `false` at EOF
    fn read_line(&mut self) -> Result<bool, TextParserError> {
        self.buffer.clear();
        if self.handle.read_line(&mut self.buffer)? == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        Ok(true)
    }

    /// Consume the stream and build a [`Dataset`] from it.
    pub fn read_dataset(mut self) -> Result<Dataset, TextParserError> {
        if !self.read_line()? {
            return Err(TextParserError::TruncatedHeader(self.line_number));
        }
        trace!("Skipping global metadata line {:?}", self.buffer.trim_end());

        if !self.read_line()? {
            return Err(TextParserError::TruncatedHeader(self.line_number));
        }
        let mz = parse_intensities(&self.buffer, self.line_number)?;

        let mut triples = Vec::new();
        let mut labels = Vec::new();
        let mut rows = Vec::new();
        loop {
            if !self.read_line()? {
                break;
            }
            if self.buffer.trim().is_empty() {
                continue;
            }
            let spot = parse_metadata(&self.buffer, self.line_number)?;
            let metadata_line = self.line_number;
            if !self.read_line()? {
                return Err(TextParserError::DanglingMetadata {
                    line: metadata_line,
                });
            }
            rows.push(parse_intensities(&self.buffer, self.line_number)?);
            triples.push((spot.x, spot.y, spot.z));
            labels.push(spot.label);
        }

        debug!(
            "Read {} spectra over {} m/z values from {} lines",
            rows.len(),
            mz.len(),
            self.line_number
        );
        let coordinates = Coordinates::from_triples(triples);
        Ok(Dataset::from_rows(rows, coordinates, mz, Some(labels))?)
    }
}

pub type TextReader = TextReaderType<fs::File>;

impl TextReader {
    pub fn open_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(fs::File::open(path)?))
    }
}

/// Load a text format dataset from the file at `path`
pub fn load_txt<P: AsRef<Path>>(path: P) -> Result<Dataset, TextParserError> {
    TextReader::open_path(path)?.read_dataset()
}
