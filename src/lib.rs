//! # Quantum Circuit Simulator
//!
//! A statevector/unitary/density-matrix quantum circuit simulation engine.
//!
//! ## Modules
//!
//! - **matrix**: dense column-major complex matrix and vector kernel
//! - **gate**: the gate algebra (Pauli/Hadamard/phase/rotation/custom/controlled/oracle)
//! - **adapter**: bitmask expansion of a gate's local matrix into the full circuit matrix
//! - **statevector**: pure-state evolution, four interchangeable strategies
//! - **unitary**: folding a gate list into the operator it composes
//! - **density**: mixed-state evolution through unitary gates and Kraus noise channels
//! - **circuit**: the `Circuit`/`NoiseCircuit` façade tying the above together
//! - **config**: ambient tolerance and memory-budget configuration
//! - **error**: the crate's error taxonomy
//!
//! ## Example
//!
//! ```rust
//! use qops_circuits::{CircuitFactory, Gate, StatevectorConfiguration, UnitaryConfiguration, Config};
//!
//! let factory = CircuitFactory::new(
//!     UnitaryConfiguration { expansion_concurrency: 1 },
//!     StatevectorConfiguration::Matrix { expansion_concurrency: 1 },
//!     Config::default(),
//! );
//!
//! let circuit = factory
//!     .make_circuit(vec![Gate::hadamard(0), Gate::cnot(0, 1)], 2)
//!     .unwrap();
//!
//! let result = circuit.statevector(None).unwrap();
//! ```

pub mod adapter;
pub mod circuit;
pub mod config;
pub mod density;
pub mod error;
pub mod gate;
pub mod matrix;
pub mod statevector;
pub mod unitary;

pub use adapter::CircuitMatrixAdapter;
pub use circuit::{Circuit, CircuitFactory, NoiseCircuit, NoiseCircuitFactory};
pub use config::Config;
pub use density::{DensityMatrix, DensityMatrixConfiguration, NoiseChannel, NoiseOperator};
pub use error::{CircuitError, Result};
pub use gate::{Axis, ExtractedGate, Gate};
pub use matrix::{Complex, Matrix, MulMode, Vector, DEFAULT_TOLERANCE};
pub use statevector::{Statevector, StatevectorConfiguration};
pub use unitary::UnitaryConfiguration;

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The additive identity, `0 + 0i`.
pub const ZERO: Complex = Complex::new(0.0, 0.0);
/// The multiplicative identity, `1 + 0i`.
pub const ONE: Complex = Complex::new(1.0, 0.0);
/// The imaginary unit, `0 + 1i`.
pub const I: Complex = Complex::new(0.0, 1.0);
/// `1/sqrt(2)`, the Hadamard gate's entry magnitude.
pub const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;
