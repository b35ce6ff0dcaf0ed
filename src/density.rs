//! Density-matrix evolution through Kraus operators.
//!
//! Grounded on the channel taxonomy and parameter conventions of the
//! teacher crate's `noise.rs` (bit-flip, phase-flip, amplitude/phase
//! damping, depolarising, all parameterised by a probability), but that
//! module applies noise by randomly sampling a Pauli/rotation directly on a
//! pure-state register. This module instead tracks the density matrix
//! itself and evolves it as `rho' = sum_i K_i rho K_i^*`, which is what the
//! Hermitian/PSD/trace-one invariants below actually require.

use crate::adapter::CircuitMatrixAdapter;
use crate::error::{CircuitError, Result};
use crate::gate::Gate;
use crate::matrix::{Complex, Matrix, MulMode};
use crate::statevector::Statevector;
use rayon::prelude::*;

/// A validated density matrix: square, power-of-two dimension, Hermitian,
/// with eigenvalues non-negative and summing to one (within tolerance).
#[derive(Debug, Clone)]
pub struct DensityMatrix(Matrix);

impl DensityMatrix {
    pub fn from_matrix(matrix: Matrix, tolerance: f64) -> Result<DensityMatrix> {
        validate(&matrix, tolerance)?;
        Ok(DensityMatrix(matrix))
    }

    /// The pure-state density matrix `|v><v|` for a statevector `v`.
    pub fn from_pure_state(state: &Statevector, tolerance: f64) -> Result<DensityMatrix> {
        let v = state.vector().as_matrix();
        let rho = v.multiply(MulMode::None, v, MulMode::Adjoint)?;
        DensityMatrix::from_matrix(rho, tolerance)
    }

    pub fn matrix(&self) -> &Matrix {
        &self.0
    }

    pub fn into_matrix(self) -> Matrix {
        self.0
    }

    pub fn is_approximately_equal(&self, other: &DensityMatrix, tolerance: f64) -> bool {
        self.0.is_approximately_equal(&other.0, tolerance)
    }
}

fn validate(matrix: &Matrix, tolerance: f64) -> Result<()> {
    let dim = matrix.row_count();
    if dim == 0 || (dim & (dim - 1)) != 0 || dim != matrix.column_count() {
        return Err(CircuitError::VectorLengthNotPowerOfTwo(dim));
    }
    if !matrix.is_approximately_hermitian(tolerance) {
        return Err(CircuitError::DensityMatrixNotHermitian);
    }
    let eigenvalues = matrix.hermitian_eigenvalues(tolerance)?;
    if let Some(&min) = eigenvalues.iter().min_by(|a, b| a.partial_cmp(b).unwrap()) {
        if min < -tolerance {
            return Err(CircuitError::DensityMatrixNegativeEigenvalue(min));
        }
    }
    let trace: f64 = eigenvalues.iter().sum();
    let deviation = (trace - 1.0).abs();
    if deviation > tolerance {
        return Err(CircuitError::DensityMatrixTraceNotOne(trace));
    }
    if deviation > tolerance / 10.0 {
        log::warn!("density matrix trace narrowly within tolerance: |trace-1| = {deviation:e}");
    }
    Ok(())
}

/// A noise channel on a single qubit, fixed by its Kraus operators.
///
/// The fields are private: every `NoiseChannel` is built through `new` or one
/// of the named channel constructors below, which guarantee at least one
/// Kraus operator is present. A channel with zero operators has no sensible
/// evolution (there is nothing to sum in `rho' = sum_i K_i rho K_i^*`), so
/// this crate never lets one be constructed at all rather than detecting the
/// emptiness downstream.
#[derive(Debug, Clone)]
pub struct NoiseChannel {
    target: usize,
    kraus_operators: Vec<Matrix>,
}

impl NoiseChannel {
    pub fn new(target: usize, kraus_operators: Vec<Matrix>) -> Result<NoiseChannel> {
        if kraus_operators.is_empty() {
            return Err(CircuitError::EmptyKrausOperators);
        }
        Ok(NoiseChannel { target, kraus_operators })
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn kraus_operators(&self) -> &[Matrix] {
        &self.kraus_operators
    }

    fn validate_probability(p: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&p) {
            return Err(CircuitError::InvalidProbability(p));
        }
        Ok(())
    }

    pub fn bit_flip(target: usize, p: f64) -> Result<NoiseChannel> {
        Self::validate_probability(p)?;
        let zero = Complex::new(0.0, 0.0);
        let sqrt_1mp = Complex::new((1.0 - p).sqrt(), 0.0);
        let sqrt_p = Complex::new(p.sqrt(), 0.0);
        let k0 = Matrix::literal_2x2([[sqrt_1mp, zero], [zero, sqrt_1mp]]);
        let k1 = Matrix::literal_2x2([[zero, sqrt_p], [sqrt_p, zero]]);
        Self::new(target, vec![k0, k1])
    }

    pub fn phase_flip(target: usize, p: f64) -> Result<NoiseChannel> {
        Self::validate_probability(p)?;
        let zero = Complex::new(0.0, 0.0);
        let sqrt_1mp = Complex::new((1.0 - p).sqrt(), 0.0);
        let sqrt_p = Complex::new(p.sqrt(), 0.0);
        let neg_sqrt_p = Complex::new(-p.sqrt(), 0.0);
        let k0 = Matrix::literal_2x2([[sqrt_1mp, zero], [zero, sqrt_1mp]]);
        let k1 = Matrix::literal_2x2([[sqrt_p, zero], [zero, neg_sqrt_p]]);
        Self::new(target, vec![k0, k1])
    }

    pub fn amplitude_damping(target: usize, p: f64) -> Result<NoiseChannel> {
        Self::validate_probability(p)?;
        let zero = Complex::new(0.0, 0.0);
        let one = Complex::new(1.0, 0.0);
        let sqrt_1mp = Complex::new((1.0 - p).sqrt(), 0.0);
        let sqrt_p = Complex::new(p.sqrt(), 0.0);
        let k0 = Matrix::literal_2x2([[one, zero], [zero, sqrt_1mp]]);
        let k1 = Matrix::literal_2x2([[zero, sqrt_p], [zero, zero]]);
        Self::new(target, vec![k0, k1])
    }

    pub fn phase_damping(target: usize, p: f64) -> Result<NoiseChannel> {
        Self::validate_probability(p)?;
        let zero = Complex::new(0.0, 0.0);
        let one = Complex::new(1.0, 0.0);
        let sqrt_1mp = Complex::new((1.0 - p).sqrt(), 0.0);
        let sqrt_p = Complex::new(p.sqrt(), 0.0);
        let k0 = Matrix::literal_2x2([[one, zero], [zero, sqrt_1mp]]);
        let k1 = Matrix::literal_2x2([[zero, zero], [zero, sqrt_p]]);
        Self::new(target, vec![k0, k1])
    }

    pub fn depolarizing(target: usize, p: f64) -> Result<NoiseChannel> {
        Self::validate_probability(p)?;
        let zero = Complex::new(0.0, 0.0);
        let i = Complex::new(0.0, 1.0);
        let sqrt_1m3p4 = Complex::new((1.0 - 0.75 * p).sqrt(), 0.0);
        let sqrt_p4 = Complex::new((p / 4.0).sqrt(), 0.0);

        let k0 = Matrix::literal_2x2([[sqrt_1m3p4, zero], [zero, sqrt_1m3p4]]);
        let k1 = Matrix::literal_2x2([[zero, sqrt_p4], [sqrt_p4, zero]]);
        let k2 = Matrix::literal_2x2([[zero, -i * sqrt_p4], [i * sqrt_p4, zero]]);
        let k3 = Matrix::literal_2x2([[sqrt_p4, zero], [zero, -sqrt_p4]]);
        Self::new(target, vec![k0, k1, k2, k3])
    }
}

/// One step of density-matrix evolution: either a unitary gate (`rho' =
/// U rho U^*`) or a noise channel (`rho' = sum_i K_i rho K_i^*`).
#[derive(Debug, Clone)]
pub enum NoiseOperator {
    Unitary(Gate),
    Channel(NoiseChannel),
}

#[derive(Debug, Clone, Copy)]
pub enum DensityMatrixConfiguration {
    Matrix { expansion_concurrency: usize },
    Row { calculation_concurrency: usize, expansion_concurrency: usize },
}

impl DensityMatrixConfiguration {
    pub fn validate(&self) -> Result<()> {
        match self {
            DensityMatrixConfiguration::Matrix { expansion_concurrency } => check_concurrency(*expansion_concurrency),
            DensityMatrixConfiguration::Row {
                calculation_concurrency,
                expansion_concurrency,
            } => {
                check_concurrency(*calculation_concurrency)?;
                check_concurrency(*expansion_concurrency)
            }
        }
    }

    fn expansion_concurrency(&self) -> usize {
        match self {
            DensityMatrixConfiguration::Matrix { expansion_concurrency } => *expansion_concurrency,
            DensityMatrixConfiguration::Row { expansion_concurrency, .. } => *expansion_concurrency,
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

fn expand_gate(gate: &Gate, qubit_count: usize, expansion_concurrency: usize) -> Result<Vec<Matrix>> {
    let extracted = gate.extract(qubit_count).map_err(|e| e.thrown_by(gate.clone()))?;
    let adapter = CircuitMatrixAdapter::new(qubit_count, extracted.matrix, extracted.inputs)
        .map_err(|e| e.thrown_by(gate.clone()))?;
    Ok(vec![adapter.expand(expansion_concurrency).map_err(|e| e.thrown_by(gate.clone()))?])
}

fn expand_channel(channel: &NoiseChannel, qubit_count: usize, expansion_concurrency: usize) -> Result<Vec<Matrix>> {
    channel
        .kraus_operators()
        .iter()
        .map(|k| {
            let adapter = CircuitMatrixAdapter::new(qubit_count, k.clone(), vec![channel.target()])?;
            adapter.expand(expansion_concurrency)
        })
        .collect()
}

fn run_concurrently_rows<F>(count: usize, concurrency: usize, f: F) -> Result<Vec<Vec<Complex>>>
where
    F: Fn(usize) -> Result<Vec<Complex>> + Sync,
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

/// Given the already-expanded operators `{E_i}` for one step, compute
/// `rho' = sum_i E_i rho E_i^*`.
fn evolve_with_operators(operators: &[Matrix], rho: &Matrix, config: &DensityMatrixConfiguration) -> Result<Matrix> {
    match config {
        DensityMatrixConfiguration::Matrix { .. } => {
            let mut accumulator: Option<Matrix> = None;
            for e in operators {
                let left = e.multiply(MulMode::None, rho, MulMode::None)?;
                let term = left.multiply(MulMode::None, e, MulMode::Adjoint)?;
                accumulator = Some(match accumulator {
                    Some(acc) => acc.add(&term)?,
                    None => term,
                });
            }
            accumulator.ok_or(CircuitError::EmptyKrausOperators)
        }
        DensityMatrixConfiguration::Row { calculation_concurrency, .. } => {
            let dim = rho.row_count();
            let left_terms: Vec<Matrix> = operators
                .iter()
                .map(|e| e.multiply(MulMode::None, rho, MulMode::None))
                .collect::<Result<_>>()?;

            let compute_row = |r: usize| -> Result<Vec<Complex>> {
                Ok((0..dim)
                    .map(|c| {
                        left_terms
                            .iter()
                            .zip(operators.iter())
                            .map(|(left, e)| (0..dim).map(|b| left.get(r, b) * e.get(c, b).conj()).sum::<Complex>())
                            .sum::<Complex>()
                    })
                    .collect())
            };

            let rows = run_concurrently_rows(dim, *calculation_concurrency, compute_row)?;
            Matrix::from_rows(rows)
        }
    }
}

fn apply_operator(
    operator: &NoiseOperator,
    rho: &Matrix,
    qubit_count: usize,
    config: &DensityMatrixConfiguration,
) -> Result<Matrix> {
    let expansion_concurrency = config.expansion_concurrency();
    let operators = match operator {
        NoiseOperator::Unitary(gate) => {
            log::debug!("density step: unitary gate");
            expand_gate(gate, qubit_count, expansion_concurrency)?
        }
        NoiseOperator::Channel(channel) => {
            log::debug!(
                "density step: channel on qubit {} with {} Kraus operators",
                channel.target(),
                channel.kraus_operators().len()
            );
            expand_channel(channel, qubit_count, expansion_concurrency)?
        }
    };
    evolve_with_operators(&operators, rho, config)
}

/// Evolve `initial` through `operators` in order, validating the result.
pub fn evolve(
    initial: DensityMatrix,
    operators: &[NoiseOperator],
    qubit_count: usize,
    config: &DensityMatrixConfiguration,
    tolerance: f64,
) -> Result<DensityMatrix> {
    config.validate()?;
    let mut rho = initial.into_matrix();
    for operator in operators {
        rho = apply_operator(operator, &rho, qubit_count, config)?;
        if !rho.is_approximately_hermitian(tolerance) {
            return Err(CircuitError::DensityMatrixNotHermitian);
        }
    }
    DensityMatrix::from_matrix(rho, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::DEFAULT_TOLERANCE;
    use approx::assert_relative_eq;

    #[test]
    fn s5_bit_flip_noise_full_probability() {
        let initial = DensityMatrix::from_pure_state(&Statevector::from_bits("0").unwrap(), DEFAULT_TOLERANCE).unwrap();
        let channel = NoiseChannel::bit_flip(0, 1.0).unwrap();
        let config = DensityMatrixConfiguration::Matrix { expansion_concurrency: 1 };
        let result = evolve(initial, &[NoiseOperator::Channel(channel)], 1, &config, DEFAULT_TOLERANCE).unwrap();

        let expected = DensityMatrix::from_pure_state(&Statevector::from_bits("1").unwrap(), DEFAULT_TOLERANCE).unwrap();
        assert!(result.is_approximately_equal(&expected, 1e-9));
    }

    #[test]
    fn property7_density_consistency_with_unitary_only_circuit() {
        let initial_state = Statevector::from_bits("00").unwrap();
        let initial_rho = DensityMatrix::from_pure_state(&initial_state, DEFAULT_TOLERANCE).unwrap();

        let gates = [Gate::hadamard(0), Gate::cnot(0, 1)];
        let config_matrix = DensityMatrixConfiguration::Matrix { expansion_concurrency: 1 };
        let mut rho = initial_rho;
        for gate in &gates {
            rho = evolve(
                rho,
                &[NoiseOperator::Unitary(gate.clone())],
                2,
                &config_matrix,
                DEFAULT_TOLERANCE,
            )
            .unwrap();
        }

        let final_vector_strategy = crate::statevector::StatevectorConfiguration::Matrix { expansion_concurrency: 1 };
        let mut state = initial_state;
        for gate in &gates {
            state = crate::statevector::apply(gate, &state, 2, &final_vector_strategy, DEFAULT_TOLERANCE).unwrap();
        }
        let expected_rho = DensityMatrix::from_pure_state(&state, DEFAULT_TOLERANCE).unwrap();

        assert!(rho.is_approximately_equal(&expected_rho, 1e-8));
    }

    #[test]
    fn property8_noise_channels_preserve_density_invariants() {
        let initial = DensityMatrix::from_pure_state(&Statevector::from_bits("0").unwrap(), DEFAULT_TOLERANCE).unwrap();
        let channels = vec![
            NoiseOperator::Channel(NoiseChannel::bit_flip(0, 0.2).unwrap()),
            NoiseOperator::Channel(NoiseChannel::phase_flip(0, 0.3).unwrap()),
            NoiseOperator::Channel(NoiseChannel::amplitude_damping(0, 0.1).unwrap()),
            NoiseOperator::Channel(NoiseChannel::depolarizing(0, 0.1).unwrap()),
        ];
        let config = DensityMatrixConfiguration::Matrix { expansion_concurrency: 1 };
        let result = evolve(initial, &channels, 1, &config, DEFAULT_TOLERANCE).unwrap();

        let eigenvalues = result.matrix().hermitian_eigenvalues(DEFAULT_TOLERANCE).unwrap();
        let trace: f64 = eigenvalues.iter().sum();
        assert_relative_eq!(trace, 1.0, epsilon = 1e-8);
        assert!(eigenvalues.iter().all(|&e| e >= -1e-8));
    }

    #[test]
    fn row_strategy_matches_matrix_strategy() {
        let initial = DensityMatrix::from_pure_state(&Statevector::from_bits("00").unwrap(), DEFAULT_TOLERANCE).unwrap();
        let channel = NoiseChannel::bit_flip(1, 0.4).unwrap();

        let config_matrix = DensityMatrixConfiguration::Matrix { expansion_concurrency: 2 };
        let via_matrix = evolve(
            initial.clone(),
            &[NoiseOperator::Channel(channel.clone())],
            2,
            &config_matrix,
            DEFAULT_TOLERANCE,
        )
        .unwrap();

        let config_row = DensityMatrixConfiguration::Row {
            calculation_concurrency: 3,
            expansion_concurrency: 2,
        };
        let via_row = evolve(initial, &[NoiseOperator::Channel(channel)], 2, &config_row, DEFAULT_TOLERANCE).unwrap();

        assert!(via_matrix.is_approximately_equal(&via_row, 1e-8));
    }

    #[test]
    fn invalid_probability_is_rejected() {
        assert!(NoiseChannel::bit_flip(0, 1.5).is_err());
    }

    #[test]
    fn empty_kraus_operators_is_rejected_at_construction() {
        assert!(matches!(
            NoiseChannel::new(0, Vec::new()),
            Err(CircuitError::EmptyKrausOperators)
        ));
    }
}
