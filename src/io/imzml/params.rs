use std::{fmt::Display, str::FromStr};

use quick_xml::events::BytesStart;
use quick_xml::Error as XMLError;

/// The controlled vocabularies whose terms are interpreted while reading imzML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlledVocabulary {
    MS,
    IMS,
    UO,
    #[default]
    Unknown,
}

impl ControlledVocabulary {
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::MS => "MS",
            Self::IMS => "IMS",
            Self::UO => "UO",
            Self::Unknown => "?",
        }
    }
}

impl FromStr for ControlledVocabulary {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cv = match s {
            "MS" | "PSI-MS" => Self::MS,
            "IMS" => Self::IMS,
            "UO" => Self::UO,
            _ => Self::Unknown,
        };
        Ok(cv)
    }
}

/// A parsed `accession` attribute such as `IMS:1000102`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Curie {
    pub controlled_vocabulary: ControlledVocabulary,
    pub accession: u32,
}

impl Curie {
    pub const fn new(controlled_vocabulary: ControlledVocabulary, accession: u32) -> Self {
        Self {
            controlled_vocabulary,
            accession,
        }
    }

    pub fn parse(curie: &str) -> Option<Self> {
        let (prefix, number) = curie.split_once(':')?;
        let accession = number.parse().ok()?;
        let controlled_vocabulary = prefix.parse().unwrap_or_default();
        Some(Self::new(controlled_vocabulary, accession))
    }
}

impl Display for Curie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:07}", self.controlled_vocabulary.prefix(), self.accession)
    }
}

macro_rules! curie {
    (MS:$acc:literal) => {
        $crate::io::imzml::params::Curie::new(
            $crate::io::imzml::params::ControlledVocabulary::MS,
            $acc,
        )
    };
    (IMS:$acc:literal) => {
        $crate::io::imzml::params::Curie::new(
            $crate::io::imzml::params::ControlledVocabulary::IMS,
            $acc,
        )
    };
}

pub(crate) use curie;

/// A `<cvParam>` element. `<userParam>` elements carry no accession and are not
/// represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvParam {
    pub name: String,
    pub value: String,
    pub curie: Curie,
}

impl CvParam {
    /// Read the attributes of a `<cvParam>` element. Returns `Ok(None)` when the
    /// element has no usable accession.
    pub fn from_event(event: &BytesStart) -> Result<Option<Self>, XMLError> {
        let mut name = String::new();
        let mut value = String::new();
        let mut curie = None;
        for attr in event.attributes() {
            let attr = attr.map_err(XMLError::from)?;
            match attr.key.as_ref() {
                b"name" => name = attr.unescape_value()?.to_string(),
                b"value" => value = attr.unescape_value()?.to_string(),
                b"accession" => curie = Curie::parse(&attr.unescape_value()?),
                _ => {}
            }
        }
        Ok(curie.map(|curie| Self { name, value, curie }))
    }

    #[inline]
    pub fn is(&self, curie: Curie) -> bool {
        self.curie == curie
    }

    pub fn coerce<T: FromStr>(&self) -> Result<T, T::Err> {
        self.value.trim().parse::<T>()
    }
}

/// Read the value of attribute `key` from an element, if present
pub(crate) fn attribute_value(event: &BytesStart, key: &[u8]) -> Result<Option<String>, XMLError> {
    for attr in event.attributes() {
        let attr = attr.map_err(XMLError::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}
