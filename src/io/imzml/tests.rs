use std::fmt::Write as _;
use std::fs;
use std::io::{self, Cursor};

use ndarray::arr2;

use super::*;
use crate::io::infer_format::Loader;

const UUID_BYTES: [u8; 16] = [0x11; 16];
const UUID_TEXT: &str = "{11111111-1111-1111-1111-111111111111}";

struct MockSource {
    mzs: Vec<Vec<f64>>,
    intensities: Vec<Vec<f64>>,
    coordinates: Vec<(i64, i64, i64)>,
    mz_lengths: Vec<usize>,
    reads: usize,
}

impl MockSource {
    fn continuous() -> Self {
        Self {
            mzs: vec![vec![1.0, 2.0, 3.0]; 3],
            intensities: vec![
                vec![1.0, 2.0, 3.0],
                vec![4.0, 5.0, 6.0],
                vec![7.0, 8.0, 9.0],
            ],
            coordinates: vec![(1, 1, 1), (2, 2, 2), (3, 3, 3)],
            mz_lengths: vec![3, 3, 3],
            reads: 0,
        }
    }
}

impl ImzMLSource for MockSource {
    fn mz_lengths(&self) -> &[usize] {
        &self.mz_lengths
    }

    fn coordinates(&self) -> &[(i64, i64, i64)] {
        &self.coordinates
    }

    fn get_spectrum(&mut self, index: usize) -> Result<(Vec<f64>, Vec<f64>), ImzMLError> {
        self.reads += 1;
        let mz = self.mzs.get(index).ok_or(ImzMLError::SpectrumIndexNotFound(index))?;
        Ok((mz.clone(), self.intensities[index].clone()))
    }
}

/// One spectrum of a synthesized document
struct Spot {
    position: (i64, i64, Option<i64>),
    mz: Vec<f64>,
    intensity: Vec<f32>,
}

fn spot(x: i64, y: i64, z: Option<i64>, mz: &[f64], intensity: &[f32]) -> Spot {
    Spot {
        position: (x, y, z),
        mz: mz.to_vec(),
        intensity: intensity.to_vec(),
    }
}

fn param(cv: &str, accession: &str, name: &str, value: &str) -> String {
    format!(r#"<cvParam cvRef="{cv}" accession="{cv}:{accession}" name="{name}" value="{value}"/>"#)
}

fn external(offset: usize, length: usize, encoded: usize) -> String {
    [
        param("IMS", "1000103", "external array length", &length.to_string()),
        param("IMS", "1000102", "external offset", &offset.to_string()),
        param("IMS", "1000104", "external encoded length", &encoded.to_string()),
    ]
    .concat()
}

/// Write an imzML document and its IBD bytes. m/z arrays are 64-bit floats
/// declared through a param group, intensities 32-bit floats declared inline.
fn synthesize(spots: &[Spot], file_content: &str) -> (String, Vec<u8>) {
    let mut ibd = UUID_BYTES.to_vec();
    let mut xml = String::new();
    xml.push_str(
        r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<mzML xmlns="http://psi.hupo.org/ms/mzml" version="1.1">
<cvList count="2">
<cv id="MS" fullName="Proteomics Standards Initiative Mass Spectrometry Ontology" URI="http://psidev.cvs.sourceforge.net/*checkout*/psidev/psi/psi-ms/mzML/controlledVocabulary/psi-ms.obo"/>
<cv id="IMS" fullName="Imaging MS Ontology" URI="http://www.maldi-msi.org/download/imzml/imagingMS.obo"/>
</cvList>
<fileDescription>
<fileContent>
"#,
    );
    xml.push_str(file_content);
    xml.push_str(
        r#"
</fileContent>
<sourceFileList count="1"><sourceFile id="sf1" name="raw" location="/"><cvParam cvRef="IMS" accession="IMS:1000050" name="position x" value="99"/></sourceFile></sourceFileList>
</fileDescription>
<referenceableParamGroupList count="1">
<referenceableParamGroup id="mzArray">
<cvParam cvRef="MS" accession="MS:1000514" name="m/z array" unitCvRef="MS" unitAccession="MS:1000040" unitName="m/z"/>
<cvParam cvRef="MS" accession="MS:1000576" name="no compression"/>
<cvParam cvRef="MS" accession="MS:1000523" name="64-bit float"/>
</referenceableParamGroup>
</referenceableParamGroupList>
<run id="run0">
"#,
    );
    writeln!(xml, r#"<spectrumList count="{}">"#, spots.len()).unwrap();
    for (i, spot) in spots.iter().enumerate() {
        let (x, y, z) = spot.position;
        writeln!(xml, r#"<spectrum id="Scan={}" index="{i}" defaultArrayLength="0">"#, i + 1).unwrap();
        xml.push_str(r#"<scanList count="1"><scan instrumentConfigurationRef="IC1">"#);
        xml.push_str(&param("IMS", "1000050", "position x", &x.to_string()));
        xml.push_str(&param("IMS", "1000051", "position y", &y.to_string()));
        if let Some(z) = z {
            xml.push_str(&param("IMS", "1000052", "position z", &z.to_string()));
        }
        xml.push_str(r#"<scanWindowList count="1"><scanWindow>"#);
        xml.push_str(&param("MS", "1000501", "scan window lower limit", "100"));
        xml.push_str("</scanWindow></scanWindowList></scan></scanList>\n");

        xml.push_str(r#"<binaryDataArrayList count="2">"#);
        let offset = ibd.len();
        for v in spot.mz.iter() {
            ibd.extend(v.to_le_bytes());
        }
        xml.push_str(r#"<binaryDataArray encodedLength="0"><referenceableParamGroupRef ref="mzArray"/>"#);
        xml.push_str(&external(offset, spot.mz.len(), spot.mz.len() * 8));
        xml.push_str("<binary/></binaryDataArray>");

        let offset = ibd.len();
        for v in spot.intensity.iter() {
            ibd.extend(v.to_le_bytes());
        }
        xml.push_str(r#"<binaryDataArray encodedLength="0">"#);
        xml.push_str(&param("MS", "1000515", "intensity array", ""));
        xml.push_str(&param("MS", "1000576", "no compression", ""));
        xml.push_str(&param("MS", "1000521", "32-bit float", ""));
        xml.push_str(&external(offset, spot.intensity.len(), spot.intensity.len() * 4));
        xml.push_str("<binary></binary></binaryDataArray>");
        xml.push_str("</binaryDataArrayList>\n</spectrum>\n");
    }
    xml.push_str("</spectrumList>\n");
    xml.push_str(r#"<chromatogramList count="1"><chromatogram id="TIC" index="0"><binaryDataArrayList count="1"><binaryDataArray encodedLength="0">"#);
    xml.push_str(&param("MS", "1000514", "m/z array", ""));
    xml.push_str("<binary/></binaryDataArray></binaryDataArrayList></chromatogram></chromatogramList>\n");
    xml.push_str("</run>\n</mzML>\n");
    (xml, ibd)
}

fn continuous_header() -> String {
    [
        param("IMS", "1000030", "continuous", ""),
        param("IMS", "1000080", "universally unique identifier", UUID_TEXT),
    ]
    .concat()
}

fn continuous_spots() -> Vec<Spot> {
    vec![
        spot(1, 1, None, &[100.0, 200.0, 300.0], &[1.0, 2.0, 3.0]),
        spot(2, 1, Some(4), &[100.0, 200.0, 300.0], &[4.0, 5.0, 6.0]),
    ]
}

fn open(xml: &str, ibd: Vec<u8>) -> Result<ImzMLReaderType<Cursor<Vec<u8>>>, ImzMLError> {
    ImzMLReaderType::new(xml.as_bytes(), Cursor::new(ibd))
}

#[test_log::test]
fn test_read_continuous_from_source() -> Result<(), ImzMLError> {
    let mut source = MockSource::continuous();
    let data = read_continuous(&mut source)?;
    assert_eq!(data.mz().to_vec(), vec![1.0, 2.0, 3.0]);
    assert_eq!(
        data.spectra(),
        &arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]])
    );
    assert_eq!(data.coordinates().x().to_vec(), vec![1, 2, 3]);
    assert_eq!(data.coordinates().get(2), Some((3, 3, 3)));
    assert!(data.labels().is_none());
    assert_eq!(source.reads, 3);
    Ok(())
}

#[test_log::test]
fn test_processed_mode_source_is_rejected_before_reading() {
    let mut source = MockSource::continuous();
    source.mz_lengths = vec![3, 3, 2];
    match read_continuous(&mut source) {
        Err(ImzMLError::ProcessedMode { min: 2, max: 3 }) => {}
        other => panic!("Expected processed mode error, got {other:?}"),
    }
    assert_eq!(source.reads, 0);
}

#[test]
fn test_empty_source() {
    let mut source = MockSource::continuous();
    source.mz_lengths.clear();
    assert!(matches!(read_continuous(&mut source), Err(ImzMLError::NoSpectra)));
}

#[test_log::test]
fn test_parse_document() -> Result<(), ImzMLError> {
    let (xml, ibd) = synthesize(&continuous_spots(), &continuous_header());
    let mut reader = open(&xml, ibd)?;
    assert_eq!(reader.len(), 2);
    assert_eq!(reader.metadata().data_mode, IbdDataMode::Continuous);
    assert_eq!(reader.metadata().uuid, Some(Uuid::from_bytes(UUID_BYTES)));
    assert_eq!(reader.metadata().ibd_checksum, None);
    assert_eq!(reader.coordinates(), &[(1, 1, 1), (2, 1, 4)]);
    assert_eq!(reader.mz_lengths(), &[3, 3]);
    assert_eq!(reader.spectra()[1].id, "Scan=2");
    assert_eq!(reader.spectra()[0].mz.dtype, BinaryDataArrayType::Float64);
    assert_eq!(reader.spectra()[0].intensity.dtype, BinaryDataArrayType::Float32);
    assert_eq!(reader.spectra()[0].intensity.encoded_length, Some(12));

    let (mz, intensity) = reader.get_spectrum(1)?;
    assert_eq!(mz, vec![100.0, 200.0, 300.0]);
    assert_eq!(intensity, vec![4.0, 5.0, 6.0]);
    assert!(matches!(
        reader.get_spectrum(2),
        Err(ImzMLError::SpectrumIndexNotFound(2))
    ));
    Ok(())
}

#[test_log::test]
fn test_read_continuous_document() -> Result<(), ImzMLError> {
    let (xml, ibd) = synthesize(&continuous_spots(), &continuous_header());
    let mut reader = open(&xml, ibd)?;
    let data = read_continuous(&mut reader)?;
    assert_eq!(data.mz().to_vec(), vec![100.0, 200.0, 300.0]);
    assert_eq!(data.spectra(), &arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]));
    assert_eq!(data.coordinates().z().to_vec(), vec![1, 4]);
    assert!(data.labels().is_none());
    Ok(())
}

#[test_log::test]
fn test_processed_document_is_rejected() -> Result<(), ImzMLError> {
    let spots = vec![
        spot(1, 1, None, &[100.0, 200.0, 300.0], &[1.0, 2.0, 3.0]),
        spot(2, 1, None, &[100.0, 200.0], &[4.0, 5.0]),
    ];
    let header = param("IMS", "1000031", "processed", "");
    let (xml, ibd) = synthesize(&spots, &header);
    let mut reader = open(&xml, ibd)?;
    assert_eq!(reader.metadata().data_mode, IbdDataMode::Processed);
    assert!(matches!(
        read_continuous(&mut reader),
        Err(ImzMLError::ProcessedMode { min: 2, max: 3 })
    ));
    Ok(())
}

#[test]
fn test_document_without_spectra() -> Result<(), ImzMLError> {
    let (xml, ibd) = synthesize(&[], &continuous_header());
    let mut reader = open(&xml, ibd)?;
    assert!(reader.is_empty());
    assert!(matches!(read_continuous(&mut reader), Err(ImzMLError::NoSpectra)));
    Ok(())
}

#[test]
fn test_unsupported_compression() {
    let (xml, ibd) = synthesize(&continuous_spots(), &continuous_header());
    let xml = xml.replace(
        r#"accession="MS:1000576" name="no compression""#,
        r#"accession="MS:1000574" name="zlib compression""#,
    );
    match open(&xml, ibd) {
        Err(ImzMLError::UnsupportedCompression(name)) => assert_eq!(name, "zlib compression"),
        other => panic!("Expected unsupported compression, got {other:?}"),
    }
}

#[test]
fn test_missing_external_offset() {
    let (xml, ibd) = synthesize(&continuous_spots(), &continuous_header());
    let xml = xml.replace(r#"accession="IMS:1000102""#, r#"accession="IMS:1009999""#);
    assert!(matches!(
        open(&xml, ibd),
        Err(ImzMLError::IncompleteElementError(_, ImzMLParserState::BinaryDataArray))
    ));
}

#[test]
fn test_missing_position() {
    let (xml, ibd) = synthesize(&continuous_spots(), &continuous_header());
    let xml = xml.replace(r#"accession="IMS:1000051""#, r#"accession="IMS:1009999""#);
    assert!(matches!(
        open(&xml, ibd),
        Err(ImzMLError::IncompleteElementError(_, ImzMLParserState::Spectrum))
    ));
}

#[test]
fn test_invalid_param_value() {
    let (xml, ibd) = synthesize(&continuous_spots(), &continuous_header());
    let xml = xml.replace(r#"name="position x" value="2""#, r#"name="position x" value="two""#);
    assert!(matches!(
        open(&xml, ibd),
        Err(ImzMLError::InvalidParamValue { ref value, .. }) if value == "two"
    ));
}

#[test]
fn test_truncated_document() {
    let (xml, ibd) = synthesize(&continuous_spots(), &continuous_header());
    let cut = xml.find("</spectrumList>").unwrap();
    assert!(open(&xml[..cut], ibd).is_err());
}

#[test]
fn test_array_past_end_of_ibd() -> Result<(), ImzMLError> {
    let (xml, mut ibd) = synthesize(&continuous_spots(), &continuous_header());
    ibd.truncate(ibd.len() - 4);
    let mut reader = open(&xml, ibd)?;
    assert!(reader.get_spectrum(0).is_ok());
    assert!(matches!(
        reader.get_spectrum(1),
        Err(ImzMLError::IbdError(IbdError::InvalidRange { .. }))
    ));
    Ok(())
}

#[test]
fn test_uuid_mismatch_is_not_fatal() -> Result<(), ImzMLError> {
    let (xml, mut ibd) = synthesize(&continuous_spots(), &continuous_header());
    ibd[0] = 0;
    let reader = open(&xml, ibd)?;
    assert_ne!(reader.metadata().uuid.as_ref(), Some(&Uuid::from_bytes([0; 16])));
    Ok(())
}

#[test]
fn test_is_imzml_detection() {
    let (xml, _) = synthesize(&continuous_spots(), &continuous_header());
    assert!(is_imzml(xml.as_bytes()));

    let ims_content = br#"<cvParam cvRef="IMS" accession="IMS:1000080"/>"#;
    assert!(is_imzml(ims_content));

    let mzml_content = br#"<mzML xmlns="http://psi.hupo.org/ms/mzml"><cvList><cv id="MS"/></cvList></mzML>"#;
    assert!(!is_imzml(mzml_content));
}

#[test_log::test]
fn test_load_from_path() -> io::Result<()> {
    let dir = tempfile::tempdir()?;
    let (xml, ibd) = synthesize(&continuous_spots(), &continuous_header());
    let path = dir.path().join("sample.imzML");
    fs::write(&path, &xml)?;
    fs::write(dir.path().join("sample.ibd"), &ibd)?;
    let data = load_imzml(&path)?;
    assert_eq!(data.len(), 2);

    let upper = dir.path().join("other.imzML");
    fs::write(&upper, &xml)?;
    fs::write(dir.path().join("other.IBD"), &ibd)?;
    let loaded = ImzMLLoader::default().load(&upper)?;
    assert_eq!(loaded, data);

    let orphan = dir.path().join("orphan.imzML");
    fs::write(&orphan, &xml)?;
    assert!(matches!(load_imzml(&orphan), Err(ImzMLError::IOError(_))));
    Ok(())
}

#[cfg(feature = "checksum")]
#[test]
fn test_verify_declared_checksum() -> Result<(), ImzMLError> {
    let (_, ibd) = synthesize(&continuous_spots(), "");
    let digest = base16ct::lower::encode_string(&md5::compute(&ibd).0);
    let header = [
        continuous_header(),
        param("IMS", "1000090", "ibd MD5", &digest.to_uppercase()),
    ]
    .concat();
    let (xml, ibd) = synthesize(&continuous_spots(), &header);
    let mut reader = open(&xml, ibd.clone())?;
    assert!(reader.verify_checksum()?);

    let mut corrupted = ibd;
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xff;
    let mut reader = open(&xml, corrupted)?;
    assert!(matches!(
        reader.verify_checksum(),
        Err(ImzMLError::IbdError(IbdError::ChecksumMismatch { kind: ChecksumKind::MD5, .. }))
    ));

    let (xml, ibd) = synthesize(&continuous_spots(), &continuous_header());
    assert!(!open(&xml, ibd)?.verify_checksum()?);
    Ok(())
}
