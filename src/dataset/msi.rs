use ndarray::{Array1, Array2, ArrayView1, Axis};

use super::{Coordinates, Dimension, ShapeMismatch};

/// A complete mass spectrometry imaging dataset sharing a single m/z axis.
///
/// The spectra table has one row per entry in [`Dataset::coordinates`] and one
/// column per entry in [`Dataset::mz`]. When labels are present there is one
/// label per spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    spectra: Array2<f64>,
    coordinates: Coordinates,
    mz: Array1<f64>,
    labels: Option<Array1<i64>>,
}

impl Dataset {
    /// Assemble a dataset, checking that every part agrees on its shape.
    ///
    /// # Errors
    /// A [`ShapeMismatch`] for the first violated relation, checked in the order
    /// labels against coordinates, spectra rows against coordinates, then spectra
    /// columns against m/z values.
    pub fn new(
        spectra: Array2<f64>,
        coordinates: Coordinates,
        mz: Array1<f64>,
        labels: Option<Array1<i64>>,
    ) -> Result<Self, ShapeMismatch> {
        if let Some(labels) = labels.as_ref() {
            ShapeMismatch::check(
                Dimension::Labels,
                labels.len(),
                Dimension::Coordinates,
                coordinates.len(),
            )?;
        }
        ShapeMismatch::check(
            Dimension::Spectra,
            spectra.nrows(),
            Dimension::Coordinates,
            coordinates.len(),
        )?;
        ShapeMismatch::check(Dimension::Channels, spectra.ncols(), Dimension::MZ, mz.len())?;
        Ok(Self {
            spectra,
            coordinates,
            mz,
            labels,
        })
    }

    /// Assemble a dataset from row-major spectra as produced by a parser.
    ///
    /// Every row must have exactly as many values as `mz`; a ragged row is reported
    /// as a [`ShapeMismatch`] between that row's length and the m/z axis.
    pub fn from_rows(
        rows: Vec<Vec<f64>>,
        coordinates: Coordinates,
        mz: Vec<f64>,
        labels: Option<Vec<i64>>,
    ) -> Result<Self, ShapeMismatch> {
        if let Some(labels) = labels.as_ref() {
            ShapeMismatch::check(
                Dimension::Labels,
                labels.len(),
                Dimension::Coordinates,
                coordinates.len(),
            )?;
        }
        ShapeMismatch::check(
            Dimension::Spectra,
            rows.len(),
            Dimension::Coordinates,
            coordinates.len(),
        )?;
        let n_channels = mz.len();
        if let Some(row) = rows.iter().find(|row| row.len() != n_channels) {
            return Err(ShapeMismatch::new(
                Dimension::Channels,
                row.len(),
                Dimension::MZ,
                n_channels,
            ));
        }

        let mut spectra = Array2::<f64>::zeros((rows.len(), n_channels));
        for (mut target, row) in spectra.axis_iter_mut(Axis(0)).zip(rows.iter()) {
            target.assign(&ArrayView1::from(row.as_slice()));
        }

        Self::new(
            spectra,
            coordinates,
            Array1::from(mz),
            labels.map(Array1::from),
        )
    }

    /// The intensity table, spectra in rows and mass channels in columns
    pub fn spectra(&self) -> &Array2<f64> {
        &self.spectra
    }

    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    /// The m/z value of each mass channel
    pub fn mz(&self) -> &Array1<f64> {
        &self.mz
    }

    pub fn labels(&self) -> Option<&Array1<i64>> {
        self.labels.as_ref()
    }

    /// The number of spectra in the dataset
    #[inline]
    pub fn len(&self) -> usize {
        self.spectra.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of mass channels shared by every spectrum
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.mz.len()
    }

    /// The intensities of the spectrum at `index`
    pub fn spectrum(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        if index < self.len() {
            Some(self.spectra.row(index))
        } else {
            None
        }
    }

    /// Give up ownership of the spectra, coordinates, m/z axis and labels
    pub fn into_parts(self) -> (Array2<f64>, Coordinates, Array1<f64>, Option<Array1<i64>>) {
        (self.spectra, self.coordinates, self.mz, self.labels)
    }
}
