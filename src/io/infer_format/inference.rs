use std::{
    fmt::Display,
    fs,
    io::{self, prelude::*},
    path::{self, Path},
};

#[cfg(feature = "imzml")]
use crate::io::imzml::is_imzml;

/// Dataset file formats that [`msidata`](crate) reads
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MsiFormat {
    Text,
    ImzML,
    Unknown,
}

impl MsiFormat {
    /// The registry key of the format's files
    pub const fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Text => Some(".txt"),
            Self::ImzML => Some(".imzml"),
            Self::Unknown => None,
        }
    }
}

impl Display for MsiFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Normalize an extension to the registry's key form: lowercase with a leading `.`
pub fn normalize_extension(extension: &str) -> String {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    format!(".{extension}")
}

/// The extension of `path` without its leading dot, as written. Empty when the
/// path has none.
pub fn path_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Given a path, infer the file format from its extension
pub fn infer_from_path<P: AsRef<path::Path>>(path: P) -> MsiFormat {
    let path = path.as_ref();
    if path.is_dir() {
        return MsiFormat::Unknown;
    }
    if let Some(ext) = path.extension() {
        if let Some(ext) = ext.to_ascii_lowercase().to_str() {
            match ext {
                "txt" => MsiFormat::Text,
                "imzml" => MsiFormat::ImzML,
                _ => MsiFormat::Unknown,
            }
        } else {
            MsiFormat::Unknown
        }
    } else {
        MsiFormat::Unknown
    }
}

/// Given a stream of bytes, infer the file format from its header. This assumes
/// the stream is seekable and restores its position afterwards.
///
/// Only imzML documents carry a recognizable header.
pub fn infer_from_stream<R: Read + Seek>(stream: &mut R) -> io::Result<MsiFormat> {
    // Enough to span the XML head and the cvList
    let mut buf = vec![0u8; 2048];
    let current_pos = stream.stream_position()?;
    let bytes_read = stream.read(buf.as_mut_slice())?;
    buf.truncate(bytes_read);
    stream.seek(io::SeekFrom::Start(current_pos))?;

    match &buf {
        #[cfg(feature = "imzml")]
        _ if is_imzml(&buf) => Ok(MsiFormat::ImzML),
        _ => Ok(MsiFormat::Unknown),
    }
}

/// Given a path, infer the file format using both the file name and by trying
/// to open and read the file header
pub fn infer_format<P: AsRef<path::Path>>(path: P) -> io::Result<MsiFormat> {
    let path = path.as_ref();
    match infer_from_path(path) {
        MsiFormat::Unknown => {
            let mut handle = fs::File::open(path)?;
            infer_from_stream(&mut handle)
        }
        format => Ok(format),
    }
}
