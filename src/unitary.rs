//! Unitary transformation: fold a gate list into the single 2^N x 2^N
//! operator it composes, full-matrix only (there is no row/element/direct
//! variant for this entry point, since every gate must be fully expanded
//! to accumulate into the running product).

use crate::adapter::CircuitMatrixAdapter;
use crate::error::{CircuitError, Result};
use crate::gate::Gate;
use crate::matrix::{Matrix, MulMode};

#[derive(Debug, Clone, Copy)]
pub struct UnitaryConfiguration {
    pub expansion_concurrency: usize,
}

impl UnitaryConfiguration {
    pub fn validate(&self) -> Result<()> {
        if self.expansion_concurrency == 0 {
            Err(CircuitError::InvalidConcurrency(self.expansion_concurrency))
        } else {
            Ok(())
        }
    }
}

/// Fold `gates` into the 2^qubit_count x 2^qubit_count unitary they compose,
/// left-to-right: `U = E_last * ... * E_0`.
pub fn accumulate(
    gates: &[Gate],
    qubit_count: usize,
    config: &UnitaryConfiguration,
    tolerance: f64,
) -> Result<Matrix> {
    config.validate()?;
    if gates.is_empty() {
        return Err(CircuitError::EmptyGateList);
    }

    let dim = 1usize << qubit_count;
    let mut accumulator = Matrix::identity(dim)?;

    for gate in gates {
        let extracted = gate.extract(qubit_count).map_err(|e| e.thrown_by(gate.clone()))?;
        log::debug!(
            "unitary step: inputs={:?} control_count={}",
            extracted.inputs,
            extracted.control_count
        );
        let adapter = CircuitMatrixAdapter::new(qubit_count, extracted.matrix.clone(), extracted.inputs.clone())
            .map_err(|e| e.thrown_by(gate.clone()))?;
        let expanded = adapter
            .expand(config.expansion_concurrency)
            .map_err(|e| e.thrown_by(gate.clone()))?;
        accumulator = expanded
            .multiply(MulMode::None, &accumulator, MulMode::None)
            .map_err(|e| e.thrown_by(gate.clone()))?;
    }

    if !accumulator.is_approximately_unitary(tolerance) {
        log::warn!("accumulated unitary failed the final unitarity check within tolerance {tolerance:e}");
        return Err(CircuitError::AccumulatedUnitaryDrift);
    }

    Ok(accumulator)
}
