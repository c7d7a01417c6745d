use std::iter::FusedIterator;

use ndarray::Array1;

use super::{Dimension, ShapeMismatch};

/// The spatial position of each spectrum in an acquisition, stored as three
/// parallel axes.
///
/// All three axes always have the same length, checked by [`Coordinates::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Coordinates {
    x: Array1<i64>,
    y: Array1<i64>,
    z: Array1<i64>,
}

impl Coordinates {
    /// Build a coordinate set from its three axes.
    ///
    /// # Errors
    /// A [`ShapeMismatch`] naming the first pair of axes that disagree, X against Y
    /// and then X against Z.
    pub fn new(x: Vec<i64>, y: Vec<i64>, z: Vec<i64>) -> Result<Self, ShapeMismatch> {
        ShapeMismatch::check(Dimension::X, x.len(), Dimension::Y, y.len())?;
        ShapeMismatch::check(Dimension::X, x.len(), Dimension::Z, z.len())?;
        Ok(Self {
            x: Array1::from(x),
            y: Array1::from(y),
            z: Array1::from(z),
        })
    }

    /// Decompose a sequence of `(x, y, z)` triples into parallel axes, preserving order.
    pub fn from_triples<I: IntoIterator<Item = (i64, i64, i64)>>(triples: I) -> Self {
        let triples = triples.into_iter();
        let (lower, _) = triples.size_hint();
        let mut x = Vec::with_capacity(lower);
        let mut y = Vec::with_capacity(lower);
        let mut z = Vec::with_capacity(lower);
        for (xi, yi, zi) in triples {
            x.push(xi);
            y.push(yi);
            z.push(zi);
        }
        Self {
            x: Array1::from(x),
            y: Array1::from(y),
            z: Array1::from(z),
        }
    }

    /// The number of positions described
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x(&self) -> &Array1<i64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<i64> {
        &self.y
    }

    pub fn z(&self) -> &Array1<i64> {
        &self.z
    }

    /// The `(x, y, z)` triple at `index`
    pub fn get(&self, index: usize) -> Option<(i64, i64, i64)> {
        if index < self.len() {
            Some((self.x[index], self.y[index], self.z[index]))
        } else {
            None
        }
    }

    pub fn iter(&self) -> CoordinatesIter<'_> {
        CoordinatesIter {
            coordinates: self,
            index: 0,
        }
    }
}

/// An iterator over the `(x, y, z)` triples of a [`Coordinates`] instance
#[derive(Debug, Clone)]
pub struct CoordinatesIter<'a> {
    coordinates: &'a Coordinates,
    index: usize,
}

impl Iterator for CoordinatesIter<'_> {
    type Item = (i64, i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.coordinates.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.coordinates.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CoordinatesIter<'_> {}

impl FusedIterator for CoordinatesIter<'_> {}

impl<'a> IntoIterator for &'a Coordinates {
    type Item = (i64, i64, i64);
    type IntoIter = CoordinatesIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_throws_on_different_size_coordinates() {
        let err = Coordinates::new(vec![1, 2], vec![3], vec![4, 5]).unwrap_err();
        assert_eq!(err, ShapeMismatch::new(Dimension::X, 2, Dimension::Y, 1));

        let err = Coordinates::new(vec![1, 2], vec![3, 4], vec![5]).unwrap_err();
        assert_eq!(err, ShapeMismatch::new(Dimension::X, 2, Dimension::Z, 1));

        let err = Coordinates::new(vec![1], vec![2, 3], vec![4, 5]).unwrap_err();
        assert_eq!(err, ShapeMismatch::new(Dimension::X, 1, Dimension::Y, 2));
    }

    #[test]
    fn test_length_of_equal_axes() {
        let coords = Coordinates::new(vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]).unwrap();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords.get(1), Some((2, 5, 8)));
        assert_eq!(coords.get(3), None);

        let empty = Coordinates::new(vec![], vec![], vec![]).unwrap();
        assert_eq!(empty.len(), 0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_from_triples_preserves_order() {
        let coords = Coordinates::from_triples(vec![(1, 1, 1), (2, 3, 4), (9, 8, 7)]);
        assert_eq!(coords.x().to_vec(), vec![1, 2, 9]);
        assert_eq!(coords.y().to_vec(), vec![1, 3, 8]);
        assert_eq!(coords.z().to_vec(), vec![1, 4, 7]);
        let triples: Vec<_> = coords.iter().collect();
        assert_eq!(triples, vec![(1, 1, 1), (2, 3, 4), (9, 8, 7)]);
        assert_eq!(coords.iter().len(), 3);
    }
}
