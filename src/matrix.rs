//! Matrix kernel - column-major dense complex matrices with zero-copy slicing.
//!
//! Backs every numerical layer above it (gate expansion, statevector and
//! density-matrix evolution). Leans on `nalgebra` for the actual dense
//! linear algebra (multiply, Hermitian eigenvalues); this module owns only
//! the column-major storage, slicing, and the transposition-mode bookkeeping
//! the rest of the crate needs.

use crate::error::{CircuitError, Result};
use nalgebra::DMatrix;
use num_complex::Complex64;
use rayon::prelude::*;
use std::sync::Arc;

/// Complex scalar used throughout the crate.
pub type Complex = Complex64;

/// The absolute tolerance used by every approximate comparison in this crate.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// How an operand should be read during multiplication, without physically
/// transposing or conjugating it first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulMode {
    /// Use the operand as stored.
    None,
    /// Use the conjugate transpose of the operand.
    Adjoint,
    /// Use the transpose of the operand (no conjugation).
    Transpose,
}

/// A dense, column-major complex matrix, physically a view into a
/// reference-counted buffer. Slicing by column range shares the buffer
/// rather than copying it; values are never mutated in place.
#[derive(Debug, Clone)]
pub struct Matrix {
    buffer: Arc<[Complex]>,
    start: usize,
    row_count: usize,
    column_count: usize,
}

impl Matrix {
    /// Build a matrix from a row-major list of rows (the natural way to
    /// write a literal matrix), validating shape invariants.
    pub fn from_rows(rows: Vec<Vec<Complex>>) -> Result<Matrix> {
        if rows.is_empty() {
            return Err(CircuitError::EmptyRowList);
        }
        let row_count = rows.len();
        let column_count = rows[0].len();
        if column_count == 0 {
            return Err(CircuitError::EmptyRow);
        }
        if rows.iter().any(|r| r.len() != column_count) {
            return Err(CircuitError::RaggedRows);
        }

        let mut buffer = vec![Complex::new(0.0, 0.0); row_count * column_count];
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                buffer[c * row_count + r] = *value;
            }
        }

        Ok(Matrix {
            buffer: Arc::from(buffer),
            start: 0,
            row_count,
            column_count,
        })
    }

    /// Construct a matrix directly from an already column-major buffer.
    /// Used internally once a buffer has already been validated/produced.
    fn from_column_major(row_count: usize, column_count: usize, buffer: Vec<Complex>) -> Matrix {
        Matrix {
            buffer: Arc::from(buffer),
            start: 0,
            row_count,
            column_count,
        }
    }

    /// Fill a `row_count x column_count` matrix column-major by evaluating
    /// `f(r, c)` for every cell, fanning the work across up to `concurrency`
    /// threads. Each cell is computed and written exactly once.
    pub fn build<F>(row_count: usize, column_count: usize, concurrency: usize, f: F) -> Result<Matrix>
    where
        F: Fn(usize, usize) -> Complex + Sync,
    {
        if row_count == 0 || column_count == 0 {
            return Err(CircuitError::InvalidDimensions { row_count, column_count });
        }
        if concurrency == 0 {
            return Err(CircuitError::InvalidConcurrency(concurrency));
        }

        let cell_count = row_count * column_count;
        let workers = concurrency.min(cell_count).max(1);

        let cell_at = |idx: usize| -> Complex {
            let r = idx % row_count;
            let c = idx / row_count;
            f(r, c)
        };

        let buffer: Vec<Complex> = if workers <= 1 {
            (0..cell_count).map(cell_at).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| CircuitError::InvalidConcurrencyConfiguration(e.to_string()))?;
            pool.install(|| (0..cell_count).into_par_iter().map(cell_at).collect())
        };

        Ok(Matrix::from_column_major(row_count, column_count, buffer))
    }

    /// Fill a matrix where expensive per-row work (`row_factory`) is shared
    /// across that row's columns (`cell_factory`).
    pub fn build_with_row_factory<R, C, Row>(
        row_count: usize,
        column_count: usize,
        concurrency: usize,
        row_factory: R,
        cell_factory: C,
    ) -> Result<Matrix>
    where
        R: Fn(usize) -> Row + Sync,
        C: Fn(usize, usize, &Row) -> Complex + Sync,
        Row: Send,
    {
        if row_count == 0 || column_count == 0 {
            return Err(CircuitError::InvalidDimensions { row_count, column_count });
        }
        if concurrency == 0 {
            return Err(CircuitError::InvalidConcurrency(concurrency));
        }

        let workers = concurrency.min(row_count).max(1);

        let row_values = |r: usize| -> Vec<Complex> {
            let row = row_factory(r);
            (0..column_count).map(|c| cell_factory(r, c, &row)).collect()
        };

        let rows: Vec<Vec<Complex>> = if workers <= 1 {
            (0..row_count).map(row_values).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| CircuitError::InvalidConcurrencyConfiguration(e.to_string()))?;
            pool.install(|| (0..row_count).into_par_iter().map(row_values).collect())
        };

        let mut buffer = vec![Complex::new(0.0, 0.0); row_count * column_count];
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                buffer[c * row_count + r] = value;
            }
        }

        Ok(Matrix::from_column_major(row_count, column_count, buffer))
    }

    /// Identity matrix of the given size.
    pub fn identity(size: usize) -> Result<Matrix> {
        Matrix::build(size, size, 1, |r, c| {
            if r == c {
                Complex::new(1.0, 0.0)
            } else {
                Complex::new(0.0, 0.0)
            }
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn get(&self, r: usize, c: usize) -> Complex {
        debug_assert!(r < self.row_count && c < self.column_count);
        self.buffer[self.start + c * self.row_count + r]
    }

    /// A column-range view sharing this matrix's backing buffer.
    pub fn make_slice(&self, start_col: usize, count: usize) -> Result<Matrix> {
        if start_col > self.column_count {
            return Err(CircuitError::SliceStartOutOfRange {
                start_col,
                column_count: self.column_count,
            });
        }
        if start_col + count > self.column_count {
            return Err(CircuitError::SliceCountOutOfRange {
                start_col,
                count,
                column_count: self.column_count,
            });
        }
        Ok(Matrix {
            buffer: Arc::clone(&self.buffer),
            start: self.start + start_col * self.row_count,
            row_count: self.row_count,
            column_count: count,
        })
    }

    pub fn is_approximately_equal(&self, other: &Matrix, tolerance: f64) -> bool {
        if self.row_count != other.row_count || self.column_count != other.column_count {
            return false;
        }
        (0..self.column_count).all(|c| {
            (0..self.row_count).all(|r| (self.get(r, c) - other.get(r, c)).norm() <= tolerance)
        })
    }

    pub fn is_approximately_hermitian(&self, tolerance: f64) -> bool {
        if self.row_count != self.column_count {
            return false;
        }
        (0..self.row_count).all(|r| {
            (0..self.column_count).all(|c| (self.get(r, c) - self.get(c, r).conj()).norm() <= tolerance)
        })
    }

    pub fn is_approximately_unitary(&self, tolerance: f64) -> bool {
        if self.row_count != self.column_count {
            return false;
        }
        let identity = match Matrix::identity(self.row_count) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let left = match self.multiply(MulMode::None, self, MulMode::Adjoint) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let right = match self.multiply(MulMode::Adjoint, self, MulMode::None) {
            Ok(m) => m,
            Err(_) => return false,
        };
        left.is_approximately_equal(&identity, tolerance) && right.is_approximately_equal(&identity, tolerance)
    }

    pub fn scale(&self, factor: Complex) -> Matrix {
        let buffer: Vec<Complex> = (0..self.column_count)
            .flat_map(|c| (0..self.row_count).map(move |r| (r, c)))
            .map(|(r, c)| self.get(r, c) * factor)
            .collect();
        Matrix::from_column_major(self.row_count, self.column_count, buffer)
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        if self.row_count != other.row_count || self.column_count != other.column_count {
            return Err(CircuitError::AdditionShapeMismatch {
                lhs_rows: self.row_count,
                lhs_cols: self.column_count,
                rhs_rows: other.row_count,
                rhs_cols: other.column_count,
            });
        }
        let buffer: Vec<Complex> = (0..self.column_count)
            .flat_map(|c| (0..self.row_count).map(move |r| (r, c)))
            .map(|(r, c)| self.get(r, c) + other.get(r, c))
            .collect();
        Ok(Matrix::from_column_major(self.row_count, self.column_count, buffer))
    }

    /// Matrix multiplication in any of the four transposition modes per
    /// operand, without physically transposing/conjugating the operand
    /// first: `self` is read under `mode_self`, `other` under `mode_other`.
    pub fn multiply(&self, mode_self: MulMode, other: &Matrix, mode_other: MulMode) -> Result<Matrix> {
        let lhs = self.to_dmatrix();
        let rhs = other.to_dmatrix();

        let lhs = match mode_self {
            MulMode::None => lhs,
            MulMode::Adjoint => lhs.adjoint(),
            MulMode::Transpose => lhs.transpose(),
        };
        let rhs = match mode_other {
            MulMode::None => rhs,
            MulMode::Adjoint => rhs.adjoint(),
            MulMode::Transpose => rhs.transpose(),
        };

        if lhs.ncols() != rhs.nrows() {
            return Err(CircuitError::MultiplicationShapeMismatch {
                lhs_rows: lhs.nrows(),
                lhs_cols: lhs.ncols(),
                rhs_rows: rhs.nrows(),
                rhs_cols: rhs.ncols(),
            });
        }

        let product = lhs * rhs;
        Ok(Matrix::from_dmatrix(&product))
    }

    /// Eigenvalues of this matrix, defined only when it is (approximately)
    /// Hermitian. Returned in non-decreasing order.
    pub fn hermitian_eigenvalues(&self, tolerance: f64) -> Result<Vec<f64>> {
        if self.row_count != self.column_count || !self.is_approximately_hermitian(tolerance) {
            return Err(CircuitError::NotHermitian);
        }
        let dm = self.to_dmatrix();
        let eigen = nalgebra::linalg::SymmetricEigen::new(dm);
        let mut values: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
        if values.iter().any(|v| v.is_nan()) {
            return Err(CircuitError::EigenvalueDidNotConverge);
        }
        values.sort_by(|a, b| a.partial_cmp(b).expect("eigenvalues are finite"));
        Ok(values)
    }

    pub fn to_dmatrix(&self) -> DMatrix<Complex> {
        DMatrix::from_fn(self.row_count, self.column_count, |r, c| self.get(r, c))
    }

    fn from_dmatrix(m: &DMatrix<Complex>) -> Matrix {
        Matrix::build(m.nrows(), m.ncols(), 1, |r, c| m[(r, c)]).expect("dmatrix dimensions are always valid")
    }

    /// Build a known-valid small matrix from literal rows without going
    /// through the fallible row-list constructor. Used for gate matrices
    /// whose shape is fixed at compile time.
    pub(crate) fn literal_2x2(rows: [[Complex; 2]; 2]) -> Matrix {
        Matrix::from_rows(rows.iter().map(|r| r.to_vec()).collect()).expect("2x2 literal is always valid")
    }

    pub(crate) fn literal_square(rows: Vec<Vec<Complex>>) -> Matrix {
        Matrix::from_rows(rows).expect("literal matrix is always valid")
    }
}

/// A `Matrix` with a single column; all vector algebra delegates to `Matrix`.
#[derive(Debug, Clone)]
pub struct Vector(Matrix);

impl Vector {
    pub fn from_values(values: Vec<Complex>) -> Result<Vector> {
        let rows: Vec<Vec<Complex>> = values.into_iter().map(|v| vec![v]).collect();
        Ok(Vector(Matrix::from_rows(rows)?))
    }

    pub fn from_matrix(matrix: Matrix) -> Result<Vector> {
        if matrix.column_count() != 1 {
            return Err(CircuitError::InvalidDimensions {
                row_count: matrix.row_count(),
                column_count: matrix.column_count(),
            });
        }
        Ok(Vector(matrix))
    }

    pub fn len(&self) -> usize {
        self.0.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Complex {
        self.0.get(i, 0)
    }

    pub fn as_matrix(&self) -> &Matrix {
        &self.0
    }

    pub fn into_matrix(self) -> Matrix {
        self.0
    }

    pub fn values(&self) -> Vec<Complex> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Inner product with another vector of the same length: sum of
    /// `conj(self[i]) * other[i]`.
    pub fn inner_product(&self, other: &Vector) -> Result<Complex> {
        if self.len() != other.len() {
            return Err(CircuitError::VectorDimensionMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok((0..self.len()).map(|i| self.get(i).conj() * other.get(i)).sum())
    }

    /// Plain (non-conjugated) dot product with another vector of the same
    /// length: sum of `self[i] * other[i]`. This is what full-matrix and
    /// row-by-row statevector evolution need (`E[r,:] . v`), as opposed to
    /// `inner_product`'s physics convention of conjugating the left operand.
    pub fn dot(&self, other: &Vector) -> Result<Complex> {
        if self.len() != other.len() {
            return Err(CircuitError::VectorDimensionMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok((0..self.len()).map(|i| self.get(i) * other.get(i)).sum())
    }

    /// Squared ℓ²-norm: the real part of the inner product with itself.
    pub fn squared_norm(&self) -> f64 {
        self.values().iter().map(|v| v.norm_sqr()).sum()
    }

    pub fn is_approximately_equal(&self, other: &Vector, tolerance: f64) -> bool {
        self.0.is_approximately_equal(&other.0, tolerance)
    }
}
