//! Bit-permutation adapter between a gate's own small matrix and the full
//! `2^N x 2^N` matrix it induces over a circuit's qubits.
//!
//! Generalizes the bitmask decomposition teacher code used for one- and
//! two-qubit gates (`mask = !(1 << qubit)`, `(i & mask) == (j & mask)`) to an
//! arbitrary, possibly non-contiguous set of input qubits, and extends it
//! with row- and element-level access so evolution strategies can avoid
//! materializing the full matrix when they don't need to.
//!
//! Bit convention: for an `m`-input gate, input `inputs[0]` is the most
//! significant bit of the gate's own row/column index and `inputs[m-1]` is
//! the least significant; the same holds for the remaining (untouched)
//! qubits against the "remainder" index, ordered from highest qubit index to
//! lowest.

use crate::error::{CircuitError, Result};
use crate::matrix::{Complex, Matrix, Vector};
use rayon::prelude::*;

/// Adapts an `m`-qubit gate matrix into the full `2^qubit_count` space
/// defined by which circuit qubits the gate reads (`inputs`, in
/// most-significant-first order).
pub struct CircuitMatrixAdapter {
    qubit_count: usize,
    gate_matrix: Matrix,
    inputs: Vec<usize>,
    remaining: Vec<usize>,
}

impl CircuitMatrixAdapter {
    pub fn new(qubit_count: usize, gate_matrix: Matrix, inputs: Vec<usize>) -> Result<CircuitMatrixAdapter> {
        let row_count = gate_matrix.row_count();
        if row_count == 0 || (row_count & (row_count - 1)) != 0 {
            return Err(CircuitError::MatrixRowCountNotPowerOfTwo(row_count));
        }
        if row_count.trailing_zeros() as usize != inputs.len() {
            return Err(CircuitError::InputCountMismatch {
                input_count: inputs.len(),
                matrix_row_count: row_count,
            });
        }
        for &q in &inputs {
            if q >= qubit_count {
                return Err(CircuitError::InputOutOfBounds { index: q, qubit_count });
            }
        }

        let remaining = Self::remaining_qubits(qubit_count, &inputs);

        Ok(CircuitMatrixAdapter {
            qubit_count,
            gate_matrix,
            inputs,
            remaining,
        })
    }

    /// Qubits not read by the gate, from the highest index to the lowest.
    fn remaining_qubits(qubit_count: usize, inputs: &[usize]) -> Vec<usize> {
        (0..qubit_count).rev().filter(|q| !inputs.contains(q)).collect()
    }

    pub fn remaining(&self) -> &[usize] {
        &self.remaining
    }

    /// Split a full circuit-wide index into the gate's own index (over its
    /// `inputs`) and the "remainder" index (over the untouched qubits).
    pub fn decompose(&self, index: usize) -> (usize, usize) {
        let m = self.inputs.len();
        let base_index = self
            .inputs
            .iter()
            .enumerate()
            .fold(0usize, |acc, (k, &q)| acc | (((index >> q) & 1) << (m - 1 - k)));

        let r = self.remaining.len();
        let rem_index = self
            .remaining
            .iter()
            .enumerate()
            .fold(0usize, |acc, (k, &q)| acc | (((index >> q) & 1) << (r - 1 - k)));

        (base_index, rem_index)
    }

    /// Inverse of `decompose`: recombine a gate-local index and a remainder
    /// index into a full circuit-wide index.
    pub fn recompose(&self, base_index: usize, rem_index: usize) -> usize {
        let m = self.inputs.len();
        let mut index = self
            .inputs
            .iter()
            .enumerate()
            .fold(0usize, |acc, (k, &q)| acc | (((base_index >> (m - 1 - k)) & 1) << q));

        let r = self.remaining.len();
        index = self.remaining.iter().enumerate().fold(index, |acc, (k, &q)| {
            acc | (((rem_index >> (r - 1 - k)) & 1) << q)
        });

        index
    }

    /// A single entry of the full `2^qubit_count x 2^qubit_count` matrix:
    /// zero unless the untouched qubits agree between row and column, in
    /// which case it is the corresponding entry of the gate's own matrix.
    pub fn element(&self, row: usize, column: usize) -> Complex {
        let (base_row, rem_row) = self.decompose(row);
        let (base_col, rem_col) = self.decompose(column);
        if rem_row != rem_col {
            Complex::new(0.0, 0.0)
        } else {
            self.gate_matrix.get(base_row, base_col)
        }
    }

    /// The full expanded row `row`, computed without materializing the
    /// whole matrix: only the gate's own dimension worth of entries can be
    /// nonzero, so every other entry is visited implicitly as zero.
    pub fn row_concurrent(&self, row: usize, concurrency: usize) -> Result<Vector> {
        if concurrency == 0 {
            return Err(CircuitError::InvalidConcurrency(concurrency));
        }
        let dim = 1usize << self.qubit_count;
        let (base_row, rem_row) = self.decompose(row);
        let gate_dim = self.gate_matrix.column_count();
        let workers = concurrency.min(gate_dim).max(1);

        let compute = |base_col: usize| -> (usize, Complex) {
            let column = self.recompose(base_col, rem_row);
            (column, self.gate_matrix.get(base_row, base_col))
        };

        let entries: Vec<(usize, Complex)> = if workers <= 1 {
            (0..gate_dim).map(compute).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| CircuitError::InvalidConcurrencyConfiguration(e.to_string()))?;
            pool.install(|| (0..gate_dim).into_par_iter().map(compute).collect())
        };

        let mut values = vec![Complex::new(0.0, 0.0); dim];
        for (column, value) in entries {
            values[column] = value;
        }
        Vector::from_values(values)
    }

    pub fn row(&self, row: usize) -> Result<Vector> {
        self.row_concurrent(row, 1)
    }

    /// The full `2^qubit_count x 2^qubit_count` matrix, filled with up to
    /// `expansion_concurrency` worker threads.
    pub fn expand(&self, expansion_concurrency: usize) -> Result<Matrix> {
        let dim = 1usize << self.qubit_count;
        Matrix::build(dim, dim, expansion_concurrency, |r, c| self.element(r, c))
    }
}
