//! Numeric payload types carried by the protocol.
//!
//! These are representation types only. No rigid-transform math is done here;
//! the station owns kinematics.

use serde::{Deserialize, Serialize};

/// A 4x4 homogeneous transform, indexed `[row][col]`.
///
/// Rotation lives in the upper-left 3x3 block and translation in the last
/// column. Orthonormality is not checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    rows: [[f64; 4]; 4],
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// The identity transform.
    pub fn identity() -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self { rows }
    }

    /// Build from row-major values.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self { rows }
    }

    /// A pure translation.
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        let mut pose = Self::identity();
        pose.rows[0][3] = x;
        pose.rows[1][3] = y;
        pose.rows[2][3] = z;
        pose
    }

    /// Build from 16 values in column-major order, as they travel on the wire.
    pub fn from_column_major(values: &[f64; 16]) -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (i, value) in values.iter().enumerate() {
            rows[i % 4][i / 4] = *value;
        }
        Self { rows }
    }

    /// The 16 values in column-major order.
    pub fn to_column_major(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.rows[i % 4][i / 4];
        }
        out
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.rows[row][col] = value;
    }

    pub fn rows(&self) -> &[[f64; 4]; 4] {
        &self.rows
    }

    /// Translation component (last column).
    pub fn translation(&self) -> [f64; 3] {
        [self.rows[0][3], self.rows[1][3], self.rows[2][3]]
    }
}

/// A `rows x cols` matrix of doubles stored column-major.
///
/// Used for point lists, joint lists and instruction tables. A matrix with
/// zero rows or zero columns is valid and empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Matrix2D {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix2D {
    /// An empty 0x0 matrix.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build from column-major data. Returns `None` if the length does not
    /// match the shape.
    pub fn from_column_major(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        if rows.checked_mul(cols)? != data.len() {
            return None;
        }
        Some(Self { rows, cols, data })
    }

    /// Build from a list of columns of equal length, e.g. one joint vector
    /// per column.
    pub fn from_columns(columns: &[Vec<f64>]) -> Option<Self> {
        let rows = columns.first().map(Vec::len).unwrap_or(0);
        if columns.iter().any(|c| c.len() != rows) {
            return None;
        }
        let data = columns.iter().flatten().copied().collect();
        Some(Self {
            rows,
            cols: columns.len(),
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[col * self.rows + row]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[col * self.rows + row] = value;
    }

    /// One column as a slice.
    pub fn column(&self, col: usize) -> &[f64] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// Iterate over columns.
    pub fn columns(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.cols).map(move |c| self.column(c))
    }

    /// Raw column-major storage.
    pub fn as_column_major(&self) -> &[f64] {
        &self.data
    }
}
