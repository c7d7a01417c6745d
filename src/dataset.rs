//! The in-memory representation of a mass spectrometry imaging acquisition.
//!
//! A [`Dataset`] is a dense table of spectra (one row per acquired position,
//! one column per mass channel) together with the [`Coordinates`] of each
//! spectrum, the shared m/z axis and optional per-spectrum labels. Both types
//! validate their shapes on construction and are read-only afterwards.
use std::fmt::Display;

use thiserror::Error;

mod coordinates;
mod msi;

pub use crate::dataset::coordinates::{Coordinates, CoordinatesIter};
pub use crate::dataset::msi::Dataset;

/// The named axes whose lengths have to agree inside a [`Dataset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    X,
    Y,
    Z,
    Coordinates,
    Spectra,
    /// The columns of a spectra table, or the length of a single spectrum
    Channels,
    MZ,
    Labels,
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dimension::X => "X coordinates",
            Dimension::Y => "Y coordinates",
            Dimension::Z => "Z coordinates",
            Dimension::Coordinates => "coordinates",
            Dimension::Spectra => "spectra",
            Dimension::Channels => "spectrum features",
            Dimension::MZ => "m/z values",
            Dimension::Labels => "labels",
        };
        f.write_str(name)
    }
}

/// Raised when two dimensions of a [`Dataset`] or [`Coordinates`] disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Number of {left} and {right} should be equal. Was: {left_size} and {right_size}")]
pub struct ShapeMismatch {
    pub left: Dimension,
    pub left_size: usize,
    pub right: Dimension,
    pub right_size: usize,
}

impl ShapeMismatch {
    pub const fn new(left: Dimension, left_size: usize, right: Dimension, right_size: usize) -> Self {
        Self {
            left,
            left_size,
            right,
            right_size,
        }
    }

    /// Returns `Ok(())` when the two sizes agree, otherwise the mismatch between them.
    #[inline]
    pub(crate) fn check(
        left: Dimension,
        left_size: usize,
        right: Dimension,
        right_size: usize,
    ) -> Result<(), ShapeMismatch> {
        if left_size == right_size {
            Ok(())
        } else {
            Err(Self::new(left, left_size, right, right_size))
        }
    }

    /// Whether this mismatch involves `dim` on either side
    pub fn involves(&self, dim: Dimension) -> bool {
        self.left == dim || self.right == dim
    }
}
