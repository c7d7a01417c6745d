use std::{
    fmt::Display,
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use num_traits::AsPrimitive;
use thiserror::Error;
use uuid::Uuid;

#[cfg(feature = "checksum")]
use sha1::{Digest, Sha1};

use super::reader::BUFFER_SIZE;

#[derive(Debug, Error)]
pub enum IbdError {
    #[error("An IO error occurred while reading IBD file: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid data type for IBD array: {0:?}")]
    InvalidDataType(BinaryDataArrayType),
    #[error("Invalid offset or length for IBD data: offset={offset}, length={length}")]
    InvalidRange { offset: u64, length: u64 },
    #[error("IBD {kind} checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch {
        kind: ChecksumKind,
        expected: String,
        found: String,
    },
}

impl From<IbdError> for io::Error {
    fn from(value: IbdError) -> Self {
        match value {
            IbdError::IoError(e) => e,
            _ => Self::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// UUID is 16 bytes stored in big-endian format at the start of IBD files
const UUID_SIZE: usize = 16;

/// Represents the two data storage modes in imzML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IbdDataMode {
    /// All spectra share the same m/z values
    Continuous,
    /// Each spectrum has its own m/z and intensity arrays
    Processed,
    #[default]
    Unknown,
}

/// The numeric encodings an external array may use. All are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryDataArrayType {
    #[default]
    Unknown,
    Float32,
    Float64,
    Int32,
    Int64,
}

impl BinaryDataArrayType {
    pub const fn size_of(&self) -> usize {
        match self {
            Self::Unknown => 1,
            Self::Float32 | Self::Int32 => 4,
            Self::Float64 | Self::Int64 => 8,
        }
    }
}

/// The digest algorithms an imzML file may declare for its IBD file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumKind {
    MD5,
    SHA1,
}

impl Display for ChecksumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MD5 => f.write_str("MD5"),
            Self::SHA1 => f.write_str("SHA-1"),
        }
    }
}

/// Where an array lives in the IBD file and how it is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayLocation {
    /// Byte offset from the start of the file
    pub offset: u64,
    /// The number of values in the array
    pub length: u64,
    pub encoded_length: Option<u64>,
    pub dtype: BinaryDataArrayType,
}

impl ArrayLocation {
    pub fn byte_length(&self) -> Option<u64> {
        self.length.checked_mul(self.dtype.size_of() as u64)
    }
}

fn decode_le<T: AsPrimitive<f64>, const N: usize>(
    bytes: &[u8],
    convert: fn([u8; N]) -> T,
) -> Vec<f64> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            convert(raw).as_()
        })
        .collect()
}

/// Decode a little-endian byte buffer into `f64` values
pub fn decode_array(bytes: &[u8], dtype: BinaryDataArrayType) -> Result<Vec<f64>, IbdError> {
    let values = match dtype {
        BinaryDataArrayType::Float32 => decode_le(bytes, f32::from_le_bytes),
        BinaryDataArrayType::Float64 => decode_le(bytes, f64::from_le_bytes),
        BinaryDataArrayType::Int32 => decode_le(bytes, i32::from_le_bytes),
        BinaryDataArrayType::Int64 => decode_le(bytes, i64::from_le_bytes),
        BinaryDataArrayType::Unknown => return Err(IbdError::InvalidDataType(dtype)),
    };
    Ok(values)
}

/// Handle for reading binary data from an imzML .ibd file
#[derive(Debug)]
pub struct IbdFile<R: Read + Seek = File> {
    reader: BufReader<R>,
    uuid: Uuid,
    len: u64,
}

impl IbdFile<File> {
    /// Open an IBD file from a path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IbdError> {
        Self::new(File::open(path)?)
    }

    /// Derive the IBD file path from an imzML file path, trying `.ibd` and then `.IBD`
    pub fn derive_ibd_path<P: AsRef<Path>>(imzml_path: P) -> PathBuf {
        let path = imzml_path.as_ref();
        let lower = path.with_extension("ibd");
        if lower.exists() {
            return lower;
        }
        let upper = path.with_extension("IBD");
        if upper.exists() {
            upper
        } else {
            lower
        }
    }
}

impl<R: Read + Seek> IbdFile<R> {
    /// Wrap `handle` and read the UUID from its first 16 bytes
    pub fn new(handle: R) -> Result<Self, IbdError> {
        let mut reader = BufReader::with_capacity(BUFFER_SIZE, handle);
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let mut uuid = [0u8; UUID_SIZE];
        reader.read_exact(&mut uuid)?;
        Ok(Self {
            reader,
            uuid: Uuid::from_bytes(uuid),
            len,
        })
    }

    /// Get the UUID of this IBD file
    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    /// The total size of the file in bytes, header included
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len <= UUID_SIZE as u64
    }

    /// Read the raw bytes of the array at `location`
    pub fn read_bytes(&mut self, location: &ArrayLocation) -> Result<Vec<u8>, IbdError> {
        if location.dtype == BinaryDataArrayType::Unknown {
            return Err(IbdError::InvalidDataType(location.dtype));
        }
        let invalid = || IbdError::InvalidRange {
            offset: location.offset,
            length: location.length,
        };
        let n_bytes = location.byte_length().ok_or_else(invalid)?;
        let end = location.offset.checked_add(n_bytes).ok_or_else(invalid)?;
        if end > self.len {
            return Err(invalid());
        }
        self.reader.seek(SeekFrom::Start(location.offset))?;
        let mut buffer = vec![0u8; n_bytes as usize];
        self.reader.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Read and decode the array at `location`
    pub fn read_array(&mut self, location: &ArrayLocation) -> Result<Vec<f64>, IbdError> {
        let raw = self.read_bytes(location)?;
        decode_array(&raw, location.dtype)
    }

    /// Compute the lowercase hexadecimal digest of the whole file
    #[cfg(feature = "checksum")]
    pub fn checksum(&mut self, kind: ChecksumKind) -> Result<String, IbdError> {
        self.reader.seek(SeekFrom::Start(0))?;
        let mut chunk = vec![0u8; BUFFER_SIZE];
        let digest = match kind {
            ChecksumKind::MD5 => {
                let mut context = md5::Context::new();
                loop {
                    let n = self.reader.read(&mut chunk)?;
                    if n == 0 {
                        break;
                    }
                    context.consume(&chunk[..n]);
                }
                base16ct::lower::encode_string(&context.compute().0)
            }
            ChecksumKind::SHA1 => {
                let mut hasher = Sha1::new();
                loop {
                    let n = self.reader.read(&mut chunk)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&chunk[..n]);
                }
                base16ct::lower::encode_string(&hasher.finalize())
            }
        };
        Ok(digest)
    }

    /// Compare the file's digest against `expected`, ignoring case
    #[cfg(feature = "checksum")]
    pub fn verify_checksum(&mut self, kind: ChecksumKind, expected: &str) -> Result<(), IbdError> {
        let found = self.checksum(kind)?;
        if found.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(IbdError::ChecksumMismatch {
                kind,
                expected: expected.to_string(),
                found,
            })
        }
    }
}
