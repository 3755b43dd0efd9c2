//! Field value storage for coupling data.
//!
//! A [`DataField`] holds the values of one named data set on one mesh, flat
//! in vertex-major order with a fixed number of components per vertex
//! (1 = scalar field, `dimensions` = vector field).  Indices in the access
//! methods are vertex ids, which is why an out-of-range index is reported as
//! an unknown handle by the layer above.

use thiserror::Error;

/// Errors that can occur when reading or writing field values.
#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    /// A field must store at least one component per vertex.
    #[error("field must have at least one component per vertex")]
    InvalidComponents,

    /// The vertex index is outside the field's current extent.
    #[error("vertex index {index} out of range, field covers {count} vertices")]
    IndexOutOfRange { index: i32, count: usize },

    /// Block index and value arrays disagree in length.
    #[error("{values} values do not cover {indices} indices")]
    LengthMismatch { indices: usize, values: usize },

    /// The access shape does not match the field's component count
    /// (e.g. a scalar accessor on a vector field).
    #[error("field stores {field}-component values but the call supplied {supplied}")]
    ComponentMismatch { field: usize, supplied: usize },
}

/// Values of one data set, addressed by vertex id.
#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    components: usize,
    values: Vec<f64>,
}

impl DataField {
    /// Creates an empty field storing `components` doubles per vertex.
    pub fn new(components: usize) -> Result<Self, FieldError> {
        if components == 0 {
            return Err(FieldError::InvalidComponents);
        }
        Ok(Self {
            components,
            values: Vec::new(),
        })
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// Number of vertices the field currently covers.
    pub fn vertex_count(&self) -> usize {
        self.values.len() / self.components
    }

    /// All stored values as one flat array.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Resizes the field to cover exactly `vertex_count` vertices.
    /// New entries are zeroed; shrinking truncates.
    pub fn resize_for(&mut self, vertex_count: usize) {
        self.values.resize(vertex_count * self.components, 0.0);
    }

    /// Writes a scalar value at one vertex.  Requires a 1-component field.
    pub fn write_scalar(&mut self, index: i32, value: f64) -> Result<(), FieldError> {
        self.check_scalar()?;
        let at = self.entry_index(index)?;
        self.values[at] = value;
        Ok(())
    }

    /// Reads the scalar value at one vertex.  Requires a 1-component field.
    pub fn read_scalar(&self, index: i32) -> Result<f64, FieldError> {
        self.check_scalar()?;
        let at = self.entry_index(index)?;
        Ok(self.values[at])
    }

    /// Writes all components of one vertex entry.
    pub fn write_vector(&mut self, index: i32, value: &[f64]) -> Result<(), FieldError> {
        if value.len() != self.components {
            return Err(FieldError::ComponentMismatch {
                field: self.components,
                supplied: value.len(),
            });
        }
        let at = self.entry_index(index)?;
        self.values[at..at + self.components].copy_from_slice(value);
        Ok(())
    }

    /// Reads all components of one vertex entry.
    pub fn read_vector(&self, index: i32) -> Result<&[f64], FieldError> {
        let at = self.entry_index(index)?;
        Ok(&self.values[at..at + self.components])
    }

    /// Writes one scalar per index.  Requires a 1-component field and equal
    /// array lengths; `n = 0` is a valid no-op.
    pub fn write_block_scalar(&mut self, indices: &[i32], values: &[f64]) -> Result<(), FieldError> {
        self.check_scalar()?;
        if indices.len() != values.len() {
            return Err(FieldError::LengthMismatch {
                indices: indices.len(),
                values: values.len(),
            });
        }
        for (index, value) in indices.iter().zip(values) {
            let at = self.entry_index(*index)?;
            self.values[at] = *value;
        }
        Ok(())
    }

    /// Reads one scalar per index, in index order.
    pub fn read_block_scalar(&self, indices: &[i32]) -> Result<Vec<f64>, FieldError> {
        self.check_scalar()?;
        let mut out = Vec::with_capacity(indices.len());
        for index in indices {
            let at = self.entry_index(*index)?;
            out.push(self.values[at]);
        }
        Ok(out)
    }

    /// Writes full vertex entries for each index from a flat
    /// `indices.len() × components` value array.
    pub fn write_block_vector(&mut self, indices: &[i32], values: &[f64]) -> Result<(), FieldError> {
        if values.len() != indices.len() * self.components {
            return Err(FieldError::LengthMismatch {
                indices: indices.len(),
                values: values.len(),
            });
        }
        for (slot, index) in indices.iter().enumerate() {
            let at = self.entry_index(*index)?;
            let from = slot * self.components;
            self.values[at..at + self.components]
                .copy_from_slice(&values[from..from + self.components]);
        }
        Ok(())
    }

    /// Reads full vertex entries for each index into one flat array.
    pub fn read_block_vector(&self, indices: &[i32]) -> Result<Vec<f64>, FieldError> {
        let mut out = Vec::with_capacity(indices.len() * self.components);
        for index in indices {
            let at = self.entry_index(*index)?;
            out.extend_from_slice(&self.values[at..at + self.components]);
        }
        Ok(out)
    }

    fn check_scalar(&self) -> Result<(), FieldError> {
        if self.components != 1 {
            return Err(FieldError::ComponentMismatch {
                field: self.components,
                supplied: 1,
            });
        }
        Ok(())
    }

    fn entry_index(&self, index: i32) -> Result<usize, FieldError> {
        if index < 0 || index as usize >= self.vertex_count() {
            return Err(FieldError::IndexOutOfRange {
                index,
                count: self.vertex_count(),
            });
        }
        Ok(index as usize * self.components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_field(vertices: usize) -> DataField {
        let mut field = DataField::new(1).unwrap();
        field.resize_for(vertices);
        field
    }

    fn vector_field_3(vertices: usize) -> DataField {
        let mut field = DataField::new(3).unwrap();
        field.resize_for(vertices);
        field
    }

    #[test]
    fn test_new_rejects_zero_components() {
        assert_eq!(DataField::new(0), Err(FieldError::InvalidComponents));
    }

    #[test]
    fn test_resize_zeroes_new_entries() {
        let field = vector_field_3(2);
        assert_eq!(field.vertex_count(), 2);
        assert_eq!(field.values(), &[0.0; 6]);
    }

    #[test]
    fn test_scalar_write_read() {
        let mut field = scalar_field(4);
        field.write_scalar(2, 9.81).unwrap();
        assert_eq!(field.read_scalar(2).unwrap(), 9.81);
        assert_eq!(field.read_scalar(0).unwrap(), 0.0);
    }

    #[test]
    fn test_scalar_access_on_vector_field_fails() {
        let mut field = vector_field_3(2);
        assert_eq!(
            field.write_scalar(0, 1.0),
            Err(FieldError::ComponentMismatch {
                field: 3,
                supplied: 1
            })
        );
        assert_eq!(
            field.read_scalar(0),
            Err(FieldError::ComponentMismatch {
                field: 3,
                supplied: 1
            })
        );
    }

    #[test]
    fn test_vector_write_read() {
        let mut field = vector_field_3(2);
        field.write_vector(1, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(field.read_vector(1).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(field.read_vector(0).unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_vector_write_rejects_wrong_width() {
        let mut field = vector_field_3(2);
        assert_eq!(
            field.write_vector(0, &[1.0, 2.0]),
            Err(FieldError::ComponentMismatch {
                field: 3,
                supplied: 2
            })
        );
    }

    #[test]
    fn test_index_out_of_range_includes_negative() {
        let mut field = scalar_field(3);
        assert_eq!(
            field.write_scalar(3, 0.0),
            Err(FieldError::IndexOutOfRange { index: 3, count: 3 })
        );
        assert_eq!(
            field.write_scalar(-1, 0.0),
            Err(FieldError::IndexOutOfRange {
                index: -1,
                count: 3
            })
        );
    }

    #[test]
    fn test_block_scalar_write_read() {
        let mut field = scalar_field(5);
        field
            .write_block_scalar(&[4, 0, 2], &[40.0, 0.5, 20.0])
            .unwrap();
        assert_eq!(
            field.read_block_scalar(&[0, 2, 4]).unwrap(),
            vec![0.5, 20.0, 40.0]
        );
    }

    #[test]
    fn test_block_scalar_length_mismatch() {
        let mut field = scalar_field(5);
        assert_eq!(
            field.write_block_scalar(&[0, 1], &[1.0]),
            Err(FieldError::LengthMismatch {
                indices: 2,
                values: 1
            })
        );
    }

    #[test]
    fn test_block_vector_write_read() {
        let mut field = vector_field_3(3);
        field
            .write_block_vector(&[2, 0], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        assert_eq!(
            field.read_block_vector(&[0, 2]).unwrap(),
            vec![4.0, 5.0, 6.0, 1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_block_vector_length_contract() {
        let mut field = vector_field_3(3);
        assert_eq!(
            field.write_block_vector(&[0, 1], &[1.0, 2.0, 3.0]),
            Err(FieldError::LengthMismatch {
                indices: 2,
                values: 3
            })
        );
    }

    #[test]
    fn test_empty_block_operations_are_noops() {
        let mut field = vector_field_3(2);
        field.write_block_vector(&[], &[]).unwrap();
        assert_eq!(field.read_block_vector(&[]).unwrap(), Vec::<f64>::new());
        let mut scalar = scalar_field(2);
        scalar.write_block_scalar(&[], &[]).unwrap();
        assert_eq!(scalar.read_block_scalar(&[]).unwrap(), Vec::<f64>::new());
    }

    #[test]
    fn test_resize_shrink_truncates() {
        let mut field = scalar_field(4);
        field.write_scalar(3, 7.0).unwrap();
        field.resize_for(2);
        assert_eq!(field.vertex_count(), 2);
        assert_eq!(
            field.read_scalar(3),
            Err(FieldError::IndexOutOfRange { index: 3, count: 2 })
        );
    }
}
