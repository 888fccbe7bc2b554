//! Row-major multi-dimensional array, rank 1 to 3.
//!
//! Used for small auxiliary tensors passed in and out of the scripting
//! engine — bounding boxes, per-tile parameter vectors, small lookup
//! tables — anywhere spec.md needs more structure than a flat `Vec` but
//! doesn't warrant pulling in a full tensor crate.

use crate::error::{Error, Result};

/// Dense row-major array of rank 1, 2, or 3.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiArray<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Clone + Default> MultiArray<T> {
    /// Creates a zero-filled array with the given shape (1 to 3 dimensions).
    pub fn zeros(shape: &[usize]) -> Result<Self> {
        Self::validate_shape(shape)?;
        let len = shape.iter().product();
        Ok(Self {
            shape: shape.to_vec(),
            data: vec![T::default(); len],
        })
    }
}

impl<T> MultiArray<T> {
    /// Builds an array from a flat row-major `data` buffer and a `shape`.
    ///
    /// `data.len()` must equal the product of `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<T>) -> Result<Self> {
        Self::validate_shape(shape)?;
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::shape_mismatch(format!(
                "multi-array data length {} does not match shape {:?} (expected {})",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    fn validate_shape(shape: &[usize]) -> Result<()> {
        if shape.is_empty() || shape.len() > 3 {
            return Err(Error::invalid_parameter(
                "multi_array shape",
                format!("rank must be 1-3, got {}", shape.len()),
            ));
        }
        Ok(())
    }

    /// The array's shape, e.g. `[rows, cols]` for rank 2.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions (1, 2, or 3).
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Flat row-major data.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    fn flat_index(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.shape.len() {
            return Err(Error::invalid_parameter(
                "multi_array index",
                format!(
                    "index rank {} does not match array rank {}",
                    index.len(),
                    self.shape.len()
                ),
            ));
        }
        let mut flat = 0usize;
        for (&idx, &size) in index.iter().zip(self.shape.iter()) {
            if idx >= size {
                return Err(Error::IndexOutOfRange { index: idx, size });
            }
            flat = flat * size + idx;
        }
        Ok(flat)
    }

    /// Reads the element at `index` (one coordinate per dimension).
    pub fn get(&self, index: &[usize]) -> Result<&T> {
        let flat = self.flat_index(index)?;
        Ok(&self.data[flat])
    }

    /// Writes the element at `index`.
    pub fn set(&mut self, index: &[usize], value: T) -> Result<()> {
        let flat = self.flat_index(index)?;
        self.data[flat] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_has_correct_length() {
        let a: MultiArray<f32> = MultiArray::zeros(&[2, 3]).unwrap();
        assert_eq!(a.data().len(), 6);
        assert_eq!(a.shape(), &[2, 3]);
    }

    #[test]
    fn rank_zero_or_above_three_rejected() {
        assert!(MultiArray::<f32>::zeros(&[]).is_err());
        assert!(MultiArray::<f32>::zeros(&[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn get_set_row_major_roundtrip() {
        let mut a: MultiArray<i32> = MultiArray::zeros(&[2, 2]).unwrap();
        a.set(&[0, 1], 5).unwrap();
        a.set(&[1, 0], 9).unwrap();
        assert_eq!(*a.get(&[0, 1]).unwrap(), 5);
        assert_eq!(*a.get(&[1, 0]).unwrap(), 9);
        assert_eq!(a.data(), &[0, 5, 9, 0]);
    }

    #[test]
    fn out_of_range_index_errors() {
        let a: MultiArray<i32> = MultiArray::zeros(&[2, 2]).unwrap();
        assert!(a.get(&[5, 0]).is_err());
    }

    #[test]
    fn mismatched_index_rank_errors() {
        let a: MultiArray<i32> = MultiArray::zeros(&[2, 2]).unwrap();
        assert!(a.get(&[0]).is_err());
    }

    #[test]
    fn from_vec_validates_length() {
        assert!(MultiArray::from_vec(&[2, 2], vec![1, 2, 3]).is_err());
        assert!(MultiArray::from_vec(&[2, 2], vec![1, 2, 3, 4]).is_ok());
    }
}
