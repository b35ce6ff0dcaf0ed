//! Circuit façade: owns an ordered gate list (or noise-operator list) and a
//! qubit count, and exposes the three evolution entry points.

use crate::config::Config;
use crate::density::{self, DensityMatrix, DensityMatrixConfiguration, NoiseOperator};
use crate::error::{CircuitError, Result};
use crate::gate::Gate;
use crate::matrix::Matrix;
use crate::statevector::{self, Statevector, StatevectorConfiguration};
use crate::unitary::{self, UnitaryConfiguration};

/// Builds `Circuit`s that share one unitary/statevector strategy and
/// ambient configuration.
#[derive(Debug, Clone, Copy)]
pub struct CircuitFactory {
    unitary_config: UnitaryConfiguration,
    statevector_config: StatevectorConfiguration,
    config: Config,
}

impl CircuitFactory {
    pub fn new(unitary_config: UnitaryConfiguration, statevector_config: StatevectorConfiguration, config: Config) -> Self {
        CircuitFactory {
            unitary_config,
            statevector_config,
            config,
        }
    }

    /// Validate `gates` against `qubit_count` and wrap them into a `Circuit`.
    pub fn make_circuit(&self, gates: Vec<Gate>, qubit_count: usize) -> Result<Circuit> {
        if qubit_count == 0 {
            return Err(CircuitError::EmptyQubitCount);
        }
        self.config.check_memory_budget(qubit_count)?;
        for gate in &gates {
            gate.extract(qubit_count).map_err(|e| e.thrown_by(gate.clone()))?;
        }
        Ok(Circuit {
            gates,
            qubit_count,
            unitary_config: self.unitary_config,
            statevector_config: self.statevector_config,
            tolerance: self.config.tolerance,
        })
    }
}

/// An ordered, already-validated gate list over a fixed qubit count.
#[derive(Debug, Clone)]
pub struct Circuit {
    gates: Vec<Gate>,
    qubit_count: usize,
    unitary_config: UnitaryConfiguration,
    statevector_config: StatevectorConfiguration,
    tolerance: f64,
}

impl Circuit {
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Evolve `initial` (defaulting to `|0...0>`) through the gate list
    /// under the configured statevector strategy. The first gate to fail
    /// aborts evolution; its error is tagged with that gate.
    pub fn statevector(&self, initial: Option<Statevector>) -> Result<Statevector> {
        let dim = 1usize << self.qubit_count;
        let mut state = match initial {
            Some(state) if state.len() == dim => state,
            Some(state) => {
                return Err(CircuitError::VectorDimensionMismatch {
                    expected: dim,
                    actual: state.len(),
                })
            }
            None => Statevector::basis(self.qubit_count, 0)?,
        };

        for gate in &self.gates {
            state = statevector::apply(gate, &state, self.qubit_count, &self.statevector_config, self.tolerance)
                .map_err(|e| e.thrown_by(gate.clone()))?;
        }
        Ok(state)
    }

    /// Fold the gate list into the unitary it composes.
    pub fn unitary(&self) -> Result<Matrix> {
        unitary::accumulate(&self.gates, self.qubit_count, &self.unitary_config, self.tolerance)
    }
}

/// Builds `NoiseCircuit`s sharing one density-matrix strategy and ambient
/// configuration.
#[derive(Debug, Clone, Copy)]
pub struct NoiseCircuitFactory {
    density_matrix_config: DensityMatrixConfiguration,
    config: Config,
}

impl NoiseCircuitFactory {
    pub fn new(density_matrix_config: DensityMatrixConfiguration, config: Config) -> Self {
        NoiseCircuitFactory {
            density_matrix_config,
            config,
        }
    }

    pub fn make_noise_circuit(&self, operators: Vec<NoiseOperator>, qubit_count: usize) -> Result<NoiseCircuit> {
        if qubit_count == 0 {
            return Err(CircuitError::EmptyQubitCount);
        }
        self.config.check_memory_budget(qubit_count)?;
        Ok(NoiseCircuit {
            operators,
            qubit_count,
            density_matrix_config: self.density_matrix_config,
            tolerance: self.config.tolerance,
        })
    }
}

/// An ordered list of unitary/noise steps over a fixed qubit count.
#[derive(Debug, Clone)]
pub struct NoiseCircuit {
    operators: Vec<NoiseOperator>,
    qubit_count: usize,
    density_matrix_config: DensityMatrixConfiguration,
    tolerance: f64,
}

impl NoiseCircuit {
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Evolve `initial` (defaulting to `|0...0><0...0|`) through the
    /// operator list under the configured density-matrix strategy.
    pub fn density_matrix(&self, initial: Option<DensityMatrix>) -> Result<DensityMatrix> {
        let dim = 1usize << self.qubit_count;
        let rho0 = match initial {
            Some(rho) if rho.matrix().row_count() == dim => rho,
            Some(rho) => {
                return Err(CircuitError::VectorDimensionMismatch {
                    expected: dim,
                    actual: rho.matrix().row_count(),
                })
            }
            None => {
                let zero_state = Statevector::basis(self.qubit_count, 0)?;
                DensityMatrix::from_pure_state(&zero_state, self.tolerance)?
            }
        };
        density::evolve(rho0, &self.operators, self.qubit_count, &self.density_matrix_config, self.tolerance)
    }
}
