use std::{
    collections::HashMap,
    fmt::Display,
    fs,
    io::{self, BufRead, BufReader, Read, Seek},
    mem,
    path::Path,
};

use log::{debug, trace, warn};
use quick_xml::{
    events::{BytesEnd, BytesStart, Event},
    Error as XMLError, Reader,
};
use thiserror::Error;
use uuid::Uuid;

use super::ibd::{ArrayLocation, BinaryDataArrayType, ChecksumKind, IbdDataMode, IbdError, IbdFile};
use super::params::{attribute_value, curie, CvParam};
use crate::dataset::ShapeMismatch;

pub(crate) const BUFFER_SIZE: usize = 10000;

/// The sections of an imzML document the parser distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImzMLParserState {
    #[default]
    Start,
    CVList,
    FileDescription,
    FileContent,
    ReferenceParamGroupList,
    ReferenceParamGroup,
    Run,
    SpectrumList,
    Spectrum,
    ScanList,
    Scan,
    BinaryDataArrayList,
    BinaryDataArray,
    Binary,
    ChromatogramList,
}

impl Display for ImzMLParserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Error)]
pub enum ImzMLError {
    #[error("An IO error occurred while reading imzML: {0}")]
    IOError(#[from] io::Error),
    #[error("An XML error {1} occurred while parsing imzML in {0}")]
    XMLError(ImzMLParserState, #[source] XMLError),
    #[error("An error occurred while reading the IBD file: {0}")]
    IbdError(#[from] IbdError),
    #[error("Incomplete element {0} in {1}")]
    IncompleteElementError(String, ImzMLParserState),
    #[error("Could not parse the value {value:?} of {name}")]
    InvalidParamValue { name: String, value: String },
    #[error("Unsupported binary data compression {0}")]
    UnsupportedCompression(String),
    #[error("Only continuous datasets are supported. Found m/z array lengths between {min} and {max}")]
    ProcessedMode { min: usize, max: usize },
    #[error("The imzML file does not contain any spectra")]
    NoSpectra,
    #[error("Spectrum index {0} not found")]
    SpectrumIndexNotFound(usize),
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),
}

impl From<ImzMLError> for io::Error {
    fn from(value: ImzMLError) -> Self {
        match value {
            ImzMLError::IOError(e) => e,
            ImzMLError::SpectrumIndexNotFound(_) => Self::new(io::ErrorKind::NotFound, value),
            _ => Self::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// A checksum of the IBD file declared in the imzML header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbdChecksum {
    pub kind: ChecksumKind,
    pub value: String,
}

/// The imaging specific properties of the `<fileContent>` section
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImzMLFileMetadata {
    pub uuid: Option<Uuid>,
    pub data_mode: IbdDataMode,
    pub ibd_checksum: Option<IbdChecksum>,
}

/// The position and array locations of a single spectrum
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumEntry {
    pub id: String,
    pub coordinate: (i64, i64, i64),
    pub mz: ArrayLocation,
    pub intensity: ArrayLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayType {
    MZArray,
    IntensityArray,
}

#[derive(Debug, Default)]
struct ArrayBuilder {
    array_type: Option<ArrayType>,
    dtype: BinaryDataArrayType,
    offset: Option<u64>,
    length: Option<u64>,
    encoded_length: Option<u64>,
    compression: Option<String>,
}

#[derive(Debug, Default)]
struct SpectrumBuilder {
    id: String,
    x: Option<i64>,
    y: Option<i64>,
    z: Option<i64>,
    mz: Option<ArrayLocation>,
    intensity: Option<ArrayLocation>,
}

fn coerce<T: std::str::FromStr>(param: &CvParam) -> Result<T, ImzMLError> {
    param.coerce().map_err(|_| ImzMLError::InvalidParamValue {
        name: param.curie.to_string(),
        value: param.value.clone(),
    })
}

/**A SAX-style accumulator for the parts of an imzML document needed to locate
each spectrum's position and arrays.*/
#[derive(Debug, Default)]
struct ImzMLDocumentBuilder {
    metadata: ImzMLFileMetadata,
    reference_param_groups: HashMap<String, Vec<CvParam>>,
    current_group: Option<(String, Vec<CvParam>)>,
    spectrum: SpectrumBuilder,
    array: ArrayBuilder,
    spectra: Vec<SpectrumEntry>,
}

impl ImzMLDocumentBuilder {
    fn start_element(
        &mut self,
        event: &BytesStart,
        state: ImzMLParserState,
    ) -> Result<ImzMLParserState, ImzMLError> {
        use ImzMLParserState::*;
        let xml_err = |err| ImzMLError::XMLError(state, err);
        let next = match (event.name().as_ref(), state) {
            (b"cvParam" | b"referenceableParamGroupRef", _) => {
                return self.empty_element(event, state);
            }
            (b"cvList", Start) => CVList,
            (b"fileDescription", Start) => FileDescription,
            (b"fileContent", FileDescription) => FileContent,
            (b"referenceableParamGroupList", Start) => ReferenceParamGroupList,
            (b"referenceableParamGroup", ReferenceParamGroupList) => {
                let id = attribute_value(event, b"id").map_err(xml_err)?.unwrap_or_default();
                self.current_group = Some((id, Vec::new()));
                ReferenceParamGroup
            }
            (b"run", Start) => Run,
            (b"spectrumList", Run) => SpectrumList,
            (b"chromatogramList", Run) => ChromatogramList,
            (b"spectrum", SpectrumList) => {
                let id = attribute_value(event, b"id").map_err(xml_err)?.unwrap_or_default();
                self.spectrum = SpectrumBuilder {
                    id,
                    ..Default::default()
                };
                Spectrum
            }
            (b"scanList", Spectrum) => ScanList,
            (b"scan", ScanList) => Scan,
            (b"binaryDataArrayList", Spectrum) => BinaryDataArrayList,
            (b"binaryDataArray", BinaryDataArrayList) => {
                self.array = ArrayBuilder::default();
                BinaryDataArray
            }
            (b"binary", BinaryDataArray) => Binary,
            _ => state,
        };
        Ok(next)
    }

    fn empty_element(
        &mut self,
        event: &BytesStart,
        state: ImzMLParserState,
    ) -> Result<ImzMLParserState, ImzMLError> {
        let xml_err = |err| ImzMLError::XMLError(state, err);
        match event.name().as_ref() {
            b"cvParam" => {
                if let Some(param) = CvParam::from_event(event).map_err(xml_err)? {
                    self.fill_param(param, state)?;
                }
            }
            b"referenceableParamGroupRef" => {
                let Some(group_id) = attribute_value(event, b"ref").map_err(xml_err)? else {
                    return Ok(state);
                };
                match self.reference_param_groups.get(&group_id) {
                    Some(params) => {
                        for param in params.clone() {
                            self.fill_param(param, state)?;
                        }
                    }
                    None => warn!("Unknown referenceable param group {group_id} in {state}"),
                }
            }
            _ => {}
        }
        Ok(state)
    }

    fn end_element(
        &mut self,
        event: &BytesEnd,
        state: ImzMLParserState,
    ) -> Result<ImzMLParserState, ImzMLError> {
        use ImzMLParserState::*;
        let next = match (event.name().as_ref(), state) {
            (b"cvList", CVList) => Start,
            (b"fileContent", FileContent) => FileDescription,
            (b"fileDescription", FileDescription) => Start,
            (b"referenceableParamGroup", ReferenceParamGroup) => {
                if let Some((id, params)) = self.current_group.take() {
                    trace!("Registered param group {id} with {} params", params.len());
                    self.reference_param_groups.insert(id, params);
                }
                ReferenceParamGroupList
            }
            (b"referenceableParamGroupList", ReferenceParamGroupList) => Start,
            (b"binary", Binary) => BinaryDataArray,
            (b"binaryDataArray", BinaryDataArray) => {
                self.close_array(state)?;
                BinaryDataArrayList
            }
            (b"binaryDataArrayList", BinaryDataArrayList) => Spectrum,
            (b"scan", Scan) => ScanList,
            (b"scanList", ScanList) => Spectrum,
            (b"spectrum", Spectrum) => {
                self.close_spectrum(state)?;
                SpectrumList
            }
            (b"spectrumList", SpectrumList) => Run,
            (b"chromatogramList", ChromatogramList) => Run,
            (b"run", Run) => Start,
            _ => state,
        };
        Ok(next)
    }

    fn fill_param(&mut self, param: CvParam, state: ImzMLParserState) -> Result<(), ImzMLError> {
        match state {
            ImzMLParserState::FileContent => self.fill_file_content(param),
            ImzMLParserState::ReferenceParamGroup => {
                if let Some((_, params)) = self.current_group.as_mut() {
                    params.push(param);
                }
            }
            ImzMLParserState::Scan => self.fill_scan(param)?,
            ImzMLParserState::BinaryDataArray => self.fill_array(param)?,
            _ => {}
        }
        Ok(())
    }

    fn fill_file_content(&mut self, param: CvParam) {
        let metadata = &mut self.metadata;
        if param.is(curie!(IMS:1000030)) {
            metadata.data_mode = IbdDataMode::Continuous;
        } else if param.is(curie!(IMS:1000031)) {
            metadata.data_mode = IbdDataMode::Processed;
        } else if param.is(curie!(IMS:1000080)) {
            let uuid_string = param.value.trim_matches(|c| c == '{' || c == '}');
            match Uuid::parse_str(uuid_string) {
                Ok(uuid) => metadata.uuid = Some(uuid),
                Err(e) => warn!("Failed to parse UUID '{}': {}", uuid_string, e),
            }
        } else if param.is(curie!(IMS:1000090)) {
            metadata.ibd_checksum = Some(IbdChecksum {
                kind: ChecksumKind::MD5,
                value: param.value,
            });
        } else if param.is(curie!(IMS:1000091)) {
            metadata.ibd_checksum = Some(IbdChecksum {
                kind: ChecksumKind::SHA1,
                value: param.value,
            });
        }
    }

    fn fill_scan(&mut self, param: CvParam) -> Result<(), ImzMLError> {
        if param.is(curie!(IMS:1000050)) {
            self.spectrum.x = Some(coerce(&param)?);
        } else if param.is(curie!(IMS:1000051)) {
            self.spectrum.y = Some(coerce(&param)?);
        } else if param.is(curie!(IMS:1000052)) {
            self.spectrum.z = Some(coerce(&param)?);
        }
        Ok(())
    }

    fn fill_array(&mut self, param: CvParam) -> Result<(), ImzMLError> {
        let array = &mut self.array;
        match param.curie {
            c if c == curie!(MS:1000514) => array.array_type = Some(ArrayType::MZArray),
            c if c == curie!(MS:1000515) => array.array_type = Some(ArrayType::IntensityArray),
            c if c == curie!(MS:1000521) => array.dtype = BinaryDataArrayType::Float32,
            c if c == curie!(MS:1000523) => array.dtype = BinaryDataArrayType::Float64,
            c if c == curie!(MS:1000519) || c == curie!(IMS:1000141) => {
                array.dtype = BinaryDataArrayType::Int32
            }
            c if c == curie!(MS:1000522) || c == curie!(IMS:1000142) => {
                array.dtype = BinaryDataArrayType::Int64
            }
            c if c == curie!(MS:1000576) => array.compression = None,
            c if c == curie!(MS:1000574)
                || c == curie!(MS:1002312)
                || c == curie!(MS:1002313)
                || c == curie!(MS:1002314) =>
            {
                array.compression = Some(param.name)
            }
            c if c == curie!(IMS:1000102) => array.offset = Some(coerce(&param)?),
            c if c == curie!(IMS:1000103) => array.length = Some(coerce(&param)?),
            c if c == curie!(IMS:1000104) => array.encoded_length = Some(coerce(&param)?),
            _ => {}
        }
        Ok(())
    }

    fn close_array(&mut self, state: ImzMLParserState) -> Result<(), ImzMLError> {
        let array = mem::take(&mut self.array);
        let Some(array_type) = array.array_type else {
            warn!(
                "Skipping binary data array of unknown type in spectrum {}",
                self.spectrum.id
            );
            return Ok(());
        };
        if let Some(compression) = array.compression {
            return Err(ImzMLError::UnsupportedCompression(compression));
        }
        let (Some(offset), Some(length)) = (array.offset, array.length) else {
            return Err(ImzMLError::IncompleteElementError(
                format!(
                    "The external data offset and length were missing in spectrum {}",
                    self.spectrum.id
                ),
                state,
            ));
        };
        if array.dtype == BinaryDataArrayType::Unknown {
            return Err(ImzMLError::IncompleteElementError(
                format!("The data type was missing in spectrum {}", self.spectrum.id),
                state,
            ));
        }
        let location = ArrayLocation {
            offset,
            length,
            encoded_length: array.encoded_length,
            dtype: array.dtype,
        };
        match array_type {
            ArrayType::MZArray => self.spectrum.mz = Some(location),
            ArrayType::IntensityArray => self.spectrum.intensity = Some(location),
        }
        Ok(())
    }

    fn close_spectrum(&mut self, state: ImzMLParserState) -> Result<(), ImzMLError> {
        let spectrum = mem::take(&mut self.spectrum);
        let incomplete =
            |what: &str| ImzMLError::IncompleteElementError(format!("{what} in spectrum {}", spectrum.id), state);
        let x = spectrum.x.ok_or_else(|| incomplete("No position x"))?;
        let y = spectrum.y.ok_or_else(|| incomplete("No position y"))?;
        let mz = spectrum.mz.ok_or_else(|| incomplete("No m/z array"))?;
        let intensity = spectrum
            .intensity
            .ok_or_else(|| incomplete("No intensity array"))?;
        self.spectra.push(SpectrumEntry {
            coordinate: (x, y, spectrum.z.unwrap_or(1)),
            mz,
            intensity,
            id: spectrum.id,
        });
        Ok(())
    }
}

/// Parse an imzML document, collecting its file metadata and every spectrum entry
pub fn parse_imzml<B: BufRead>(source: B) -> Result<(ImzMLFileMetadata, Vec<SpectrumEntry>), ImzMLError> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);
    let mut buffer = Vec::new();
    let mut builder = ImzMLDocumentBuilder::default();
    let mut state = ImzMLParserState::Start;
    loop {
        state = match reader.read_event_into(&mut buffer) {
            Ok(Event::Start(ref e)) => builder.start_element(e, state)?,
            Ok(Event::Empty(ref e)) => builder.empty_element(e, state)?,
            Ok(Event::End(ref e)) => builder.end_element(e, state)?,
            Ok(Event::Eof) => break,
            Ok(_) => state,
            Err(err) => return Err(ImzMLError::XMLError(state, err)),
        };
        buffer.clear();
    }
    if state != ImzMLParserState::Start {
        return Err(ImzMLError::IncompleteElementError(
            "The document ended early".to_string(),
            state,
        ));
    }
    debug!(
        "Parsed {} imzML spectra in {:?} mode",
        builder.spectra.len(),
        builder.metadata.data_mode
    );
    Ok((builder.metadata, builder.spectra))
}

/// Check if the buffer contains an imzML file by looking for the IMS controlled vocabulary
/// There isn't AFAIK a formal mechanism to identify imzML files other than the presence of
/// the IMS controlled vocabulary (CV) in the cvList section of the mzML file.
pub fn is_imzml(buffer: &[u8]) -> bool {
    let mut reader = Reader::from_reader(buffer);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => match e.name().as_ref() {
                b"cv" => {
                    if let Ok(Some(id)) = attribute_value(e, b"id") {
                        if id == "IMS" {
                            return true;
                        }
                    }
                }
                b"cvParam" => {
                    if let Ok(Some(cv)) = attribute_value(e, b"cvRef") {
                        if cv == "IMS" {
                            return true;
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"cvList" => return false,
            Ok(Event::Eof) => return false,
            Ok(_) => {}
            Err(e) => {
                debug!("XML parsing error while checking for imzML format: {}", e);
                return false;
            }
        }
        buf.clear();
    }
}

/**A reader for imzML files and their accompanying IBD binary files.

The XML document is parsed eagerly when the reader is created. Array data are
read from the IBD file on demand by [`ImzMLReaderType::get_spectrum`].*/
#[derive(Debug)]
pub struct ImzMLReaderType<R: Read + Seek = fs::File> {
    metadata: ImzMLFileMetadata,
    spectra: Vec<SpectrumEntry>,
    mz_lengths: Vec<usize>,
    coordinates: Vec<(i64, i64, i64)>,
    ibd: IbdFile<R>,
}

impl<R: Read + Seek> ImzMLReaderType<R> {
    /// Create a new [`ImzMLReaderType`], parsing the XML document in `file` and
    /// opening `ibd_file` for array data.
    pub fn new<X: BufRead>(file: X, ibd_file: R) -> Result<Self, ImzMLError> {
        let (metadata, spectra) = parse_imzml(file)?;
        let ibd = IbdFile::new(ibd_file)?;
        if let Some(expected) = metadata.uuid.as_ref() {
            if expected != ibd.uuid() {
                warn!(
                    "UUID mismatch between imzML ({}) and IBD ({})",
                    expected,
                    ibd.uuid()
                );
            }
        }
        let mz_lengths = spectra.iter().map(|s| s.mz.length as usize).collect();
        let coordinates = spectra.iter().map(|s| s.coordinate).collect();
        Ok(Self {
            metadata,
            spectra,
            mz_lengths,
            coordinates,
            ibd,
        })
    }

    pub fn metadata(&self) -> &ImzMLFileMetadata {
        &self.metadata
    }

    pub fn spectra(&self) -> &[SpectrumEntry] {
        &self.spectra
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// The number of m/z values of each spectrum, in document order
    pub fn mz_lengths(&self) -> &[usize] {
        &self.mz_lengths
    }

    /// The `(x, y, z)` position of each spectrum, in document order
    pub fn coordinates(&self) -> &[(i64, i64, i64)] {
        &self.coordinates
    }

    /// Read the m/z and intensity arrays of the spectrum at `index`
    pub fn get_spectrum(&mut self, index: usize) -> Result<(Vec<f64>, Vec<f64>), ImzMLError> {
        let entry = self
            .spectra
            .get(index)
            .ok_or(ImzMLError::SpectrumIndexNotFound(index))?;
        let (mz_at, intensity_at) = (entry.mz, entry.intensity);
        let mz = self.ibd.read_array(&mz_at)?;
        let intensity = self.ibd.read_array(&intensity_at)?;
        Ok((mz, intensity))
    }

    /// Verify the IBD file against the checksum declared in the document.
    ///
    /// Returns `false` when the document declares no checksum.
    #[cfg(feature = "checksum")]
    pub fn verify_checksum(&mut self) -> Result<bool, ImzMLError> {
        let Some(checksum) = self.metadata.ibd_checksum.as_ref() else {
            return Ok(false);
        };
        self.ibd.verify_checksum(checksum.kind, &checksum.value)?;
        Ok(true)
    }
}

pub type ImzMLReader = ImzMLReaderType<fs::File>;

impl ImzMLReader {
    /// Open the imzML file at `path` together with the IBD file next to it
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, ImzMLError> {
        let path = path.as_ref();
        let xml_file = BufReader::with_capacity(BUFFER_SIZE, fs::File::open(path)?);
        let ibd_path = IbdFile::derive_ibd_path(path);
        trace!("Opening IBD file {}", ibd_path.display());
        let ibd_file = fs::File::open(&ibd_path)?;
        Self::new(xml_file, ibd_file)
    }
}
