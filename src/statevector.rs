//! Statevector evolution: four strategies for applying one gate to one
//! statevector, trading memory for compute differently, but agreeing
//! bitwise (within tolerance) on the result.

use crate::adapter::CircuitMatrixAdapter;
use crate::error::{CircuitError, Result};
use crate::gate::Gate;
use crate::matrix::{Complex, MulMode, Vector, DEFAULT_TOLERANCE};
use rayon::prelude::*;

/// A validated quantum state: a `Vector` whose length is a power of two and
/// whose squared-modulus sum is 1 within tolerance.
#[derive(Debug, Clone)]
pub struct Statevector(Vector);

impl Statevector {
    pub fn from_vector(vector: Vector, tolerance: f64) -> Result<Statevector> {
        validate(&vector, tolerance)?;
        Ok(Statevector(vector))
    }

    /// The one-hot basis state `|index⟩` of a `qubit_count`-qubit register.
    pub fn basis(qubit_count: usize, index: usize) -> Result<Statevector> {
        let dim = 1usize << qubit_count;
        if index >= dim {
            return Err(CircuitError::VectorDimensionMismatch { expected: dim, actual: index });
        }
        let values = (0..dim)
            .map(|i| {
                if i == index {
                    Complex::new(1.0, 0.0)
                } else {
                    Complex::new(0.0, 0.0)
                }
            })
            .collect();
        Statevector::from_vector(Vector::from_values(values)?, DEFAULT_TOLERANCE)
    }

    /// Parse a bit-string such as `"010"` (qubit 0 is the rightmost
    /// character, matching the crate-wide bit-index convention) into the
    /// corresponding one-hot basis statevector.
    pub fn from_bits(bits: &str) -> Result<Statevector> {
        if bits.is_empty() || !bits.chars().all(|c| c == '0' || c == '1') {
            return Err(CircuitError::MalformedBitString(bits.to_string()));
        }
        let qubit_count = bits.len();
        let index = usize::from_str_radix(bits, 2).expect("validated binary digits");
        Statevector::basis(qubit_count, index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Complex {
        self.0.get(index)
    }

    pub fn vector(&self) -> &Vector {
        &self.0
    }

    pub fn into_vector(self) -> Vector {
        self.0
    }

    pub fn probabilities(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.get(i).norm_sqr()).collect()
    }

    pub fn is_approximately_equal(&self, other: &Statevector, tolerance: f64) -> bool {
        self.0.is_approximately_equal(&other.0, tolerance)
    }
}

fn validate(vector: &Vector, tolerance: f64) -> Result<()> {
    let len = vector.len();
    if len == 0 || (len & (len - 1)) != 0 {
        return Err(CircuitError::VectorLengthNotPowerOfTwo(len));
    }
    let squared_modulus_sum = vector.squared_norm();
    let deviation = (squared_modulus_sum - 1.0).abs();
    if deviation > tolerance {
        return Err(CircuitError::StatevectorNotNormalized(squared_modulus_sum));
    }
    if deviation > tolerance / 10.0 {
        log::warn!(
            "statevector normalization narrowly within tolerance: |sum(|a|^2) - 1| = {deviation:e}"
        );
    }
    Ok(())
}

/// Which of the four strategies to use, and the concurrency knobs it
/// accepts. `Value` and `Direct` never materialise rows of the expanded
/// gate matrix, so they carry no expansion-concurrency knob (fixed at 1).
#[derive(Debug, Clone, Copy)]
pub enum StatevectorConfiguration {
    Matrix { expansion_concurrency: usize },
    Row { calculation_concurrency: usize, expansion_concurrency: usize },
    Value { calculation_concurrency: usize },
    Direct { calculation_concurrency: usize },
}

impl StatevectorConfiguration {
    pub fn validate(&self) -> Result<()> {
        match self {
            StatevectorConfiguration::Matrix { expansion_concurrency } => check_concurrency(*expansion_concurrency),
            StatevectorConfiguration::Row {
                calculation_concurrency,
                expansion_concurrency,
            } => {
                check_concurrency(*calculation_concurrency)?;
                check_concurrency(*expansion_concurrency)
            }
            StatevectorConfiguration::Value { calculation_concurrency } => check_concurrency(*calculation_concurrency),
            StatevectorConfiguration::Direct { calculation_concurrency } => {
                check_concurrency(*calculation_concurrency)
            }
        }
    }
}

fn check_concurrency(value: usize) -> Result<()> {
    if value == 0 {
        Err(CircuitError::InvalidConcurrency(value))
    } else {
        Ok(())
    }
}

/// Fan `f` out across `[0, count)`, using up to `concurrency` worker
/// threads. Every index is computed and written exactly once.
fn run_concurrently<F>(count: usize, concurrency: usize, f: F) -> Result<Vec<Complex>>
where
    F: Fn(usize) -> Result<Complex> + Sync,
{
    check_concurrency(concurrency)?;
    let workers = concurrency.min(count).max(1);
    if workers <= 1 {
        (0..count).map(f).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| CircuitError::InvalidConcurrencyConfiguration(e.to_string()))?;
        pool.install(|| (0..count).into_par_iter().map(f).collect())
    }
}

/// Apply `gate` to `vector` under `config`, returning the next statevector.
pub fn apply(
    gate: &Gate,
    vector: &Statevector,
    qubit_count: usize,
    config: &StatevectorConfiguration,
    tolerance: f64,
) -> Result<Statevector> {
    config.validate()?;

    let dim = 1usize << qubit_count;
    if vector.len() != dim {
        return Err(CircuitError::VectorDimensionMismatch {
            expected: dim,
            actual: vector.len(),
        });
    }

    let extracted = gate.extract(qubit_count)?;
    log::debug!(
        "statevector step: qubit_count={qubit_count} inputs={:?} control_count={} strategy={config:?}",
        extracted.inputs,
        extracted.control_count
    );
    let adapter = CircuitMatrixAdapter::new(qubit_count, extracted.matrix.clone(), extracted.inputs.clone())?;

    let output = match config {
        StatevectorConfiguration::Matrix { expansion_concurrency } => {
            log::trace!("strategy=full-matrix expansion_concurrency={expansion_concurrency}");
            let expanded = adapter.expand(*expansion_concurrency)?;
            let product = expanded.multiply(MulMode::None, vector.vector().as_matrix(), MulMode::None)?;
            Vector::from_matrix(product)?
        }
        StatevectorConfiguration::Row {
            calculation_concurrency,
            expansion_concurrency,
        } => {
            log::trace!(
                "strategy=row-by-row calculation_concurrency={calculation_concurrency} expansion_concurrency={expansion_concurrency}"
            );
            let compute = |r: usize| -> Result<Complex> {
                let row = adapter.row_concurrent(r, *expansion_concurrency)?;
                row.dot(vector.vector())
            };
            Vector::from_values(run_concurrently(dim, *calculation_concurrency, compute)?)?
        }
        StatevectorConfiguration::Value { calculation_concurrency } => {
            log::trace!("strategy=element-by-element calculation_concurrency={calculation_concurrency}");
            let compute = |r: usize| -> Result<Complex> {
                Ok((0..dim).map(|c| adapter.element(r, c) * vector.get(c)).sum())
            };
            Vector::from_values(run_concurrently(dim, *calculation_concurrency, compute)?)?
        }
        StatevectorConfiguration::Direct { calculation_concurrency } => {
            log::trace!("strategy=direct calculation_concurrency={calculation_concurrency}");
            let compute = |r: usize| -> Result<Complex> {
                let (base_row, rem_row) = adapter.decompose(r);
                if extracted.truth_table_is_exact && !extracted.control_combination_fires(base_row) {
                    return Ok(vector.get(r));
                }
                let inner_dim = extracted.inner_dim();
                let ctrl_component = base_row - base_row % inner_dim;
                let mut sum = Complex::new(0.0, 0.0);
                for inner_col in 0..inner_dim {
                    let base_col = ctrl_component + inner_col;
                    let c = adapter.recompose(base_col, rem_row);
                    sum += extracted.matrix.get(base_row, base_col) * vector.get(c);
                }
                Ok(sum)
            };
            Vector::from_values(run_concurrently(dim, *calculation_concurrency, compute)?)?
        }
    };

    Statevector::from_vector(output, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    const ALL_STRATEGIES: [StatevectorConfiguration; 5] = [
        StatevectorConfiguration::Matrix { expansion_concurrency: 1 },
        StatevectorConfiguration::Matrix { expansion_concurrency: 4 },
        StatevectorConfiguration::Row {
            calculation_concurrency: 4,
            expansion_concurrency: 2,
        },
        StatevectorConfiguration::Value { calculation_concurrency: 4 },
        StatevectorConfiguration::Direct { calculation_concurrency: 4 },
    ];

    #[test]
    fn s1_hadamard_on_one_qubit() {
        let initial = Statevector::from_bits("0").unwrap();
        for config in &ALL_STRATEGIES {
            let out = apply(&Gate::hadamard(0), &initial, 1, config, DEFAULT_TOLERANCE).unwrap();
            assert_relative_eq!(out.get(0).re, FRAC_1_SQRT_2, epsilon = 1e-9);
            assert_relative_eq!(out.get(1).re, FRAC_1_SQRT_2, epsilon = 1e-9);
        }
    }

    #[test]
    fn s2_bell_pair() {
        for config_h in &ALL_STRATEGIES {
            for config_cnot in &ALL_STRATEGIES {
                let initial = Statevector::from_bits("00").unwrap();
                let after_h = apply(&Gate::hadamard(0), &initial, 2, config_h, DEFAULT_TOLERANCE).unwrap();
                let after_cnot = apply(&Gate::cnot(0, 1), &after_h, 2, config_cnot, DEFAULT_TOLERANCE).unwrap();
                assert_relative_eq!(after_cnot.get(0).re, FRAC_1_SQRT_2, epsilon = 1e-9);
                assert_relative_eq!(after_cnot.get(1).re, 0.0, epsilon = 1e-9);
                assert_relative_eq!(after_cnot.get(2).re, 0.0, epsilon = 1e-9);
                assert_relative_eq!(after_cnot.get(3).re, FRAC_1_SQRT_2, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn s4_fully_controlled_hadamard_on_three_qubits() {
        let initial = Statevector::from_bits("111").unwrap();
        let gate = Gate::controlled(Gate::hadamard(0), vec![1, 2]);
        for config in &ALL_STRATEGIES {
            let out = apply(&gate, &initial, 3, config, DEFAULT_TOLERANCE).unwrap();
            for i in 0..6 {
                assert_relative_eq!(out.get(i).norm(), 0.0, epsilon = 1e-9);
            }
            assert_relative_eq!(out.get(6).re, FRAC_1_SQRT_2, epsilon = 1e-9);
            assert_relative_eq!(out.get(7).re, -FRAC_1_SQRT_2, epsilon = 1e-9);
        }
    }

    #[test]
    fn s6_non_unitary_gate_is_rejected() {
        let zero = Complex::new(0.0, 0.0);
        let one = Complex::new(1.0, 0.0);
        let matrix = crate::matrix::Matrix::from_rows(vec![vec![zero, one], vec![one, one]]).unwrap();
        let gate = Gate::matrix(matrix, vec![0]);
        let initial = Statevector::from_bits("0").unwrap();
        let config = StatevectorConfiguration::Matrix { expansion_concurrency: 1 };
        assert!(matches!(
            apply(&gate, &initial, 1, &config, DEFAULT_TOLERANCE),
            Err(CircuitError::NonUnitaryGate)
        ));
    }

    #[test]
    fn property9_oracle_truth_table_passes_through_non_matching_rows() {
        let gate = Gate::oracle(vec!["11".to_string()], vec![0, 1], Gate::not(2));
        let initial = Statevector::from_bits("101").unwrap();
        let config = StatevectorConfiguration::Direct { calculation_concurrency: 1 };
        let out = apply(&gate, &initial, 3, &config, DEFAULT_TOLERANCE).unwrap();
        assert!(out.is_approximately_equal(&initial, DEFAULT_TOLERANCE));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let initial = Statevector::from_bits("0").unwrap();
        let config = StatevectorConfiguration::Matrix { expansion_concurrency: 0 };
        assert!(matches!(
            apply(&Gate::hadamard(0), &initial, 1, &config, DEFAULT_TOLERANCE),
            Err(CircuitError::InvalidConcurrency(0))
        ));
    }
}
