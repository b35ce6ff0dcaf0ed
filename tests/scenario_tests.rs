//! End-to-end scenario and cross-cutting property tests.
//!
//! Tests cover:
//! - The literal S1-S6 scenarios run through the `Circuit`/`NoiseCircuit`
//!   façade rather than individual modules
//! - Property 5: every statevector strategy agrees with every other
//! - Property 6: every density-matrix strategy agrees with every other
//! - Property 10: `unitary()` and `statevector(None)` agree on the same
//!   gate list

use approx::assert_relative_eq;
use qops_circuits::{
    Circuit, CircuitFactory, Config, DensityMatrixConfiguration, Gate, NoiseCircuitFactory, NoiseChannel, NoiseOperator,
    Statevector, StatevectorConfiguration, UnitaryConfiguration, DEFAULT_TOLERANCE,
};
use std::f64::consts::FRAC_1_SQRT_2;

const ALL_STATEVECTOR_STRATEGIES: [StatevectorConfiguration; 5] = [
    StatevectorConfiguration::Matrix { expansion_concurrency: 1 },
    StatevectorConfiguration::Matrix { expansion_concurrency: 3 },
    StatevectorConfiguration::Row {
        calculation_concurrency: 3,
        expansion_concurrency: 2,
    },
    StatevectorConfiguration::Value { calculation_concurrency: 3 },
    StatevectorConfiguration::Direct { calculation_concurrency: 3 },
];

const ALL_DENSITY_STRATEGIES: [DensityMatrixConfiguration; 2] = [
    DensityMatrixConfiguration::Matrix { expansion_concurrency: 1 },
    DensityMatrixConfiguration::Row {
        calculation_concurrency: 3,
        expansion_concurrency: 2,
    },
];

fn circuit_with(gates: Vec<Gate>, qubit_count: usize, statevector_config: StatevectorConfiguration) -> Circuit {
    let factory = CircuitFactory::new(
        UnitaryConfiguration { expansion_concurrency: 1 },
        statevector_config,
        Config::default(),
    );
    factory.make_circuit(gates, qubit_count).unwrap()
}

mod literal_scenarios {
    use super::*;

    #[test]
    fn s1_hadamard_on_a_single_qubit() {
        for &config in &ALL_STATEVECTOR_STRATEGIES {
            let circuit = circuit_with(vec![Gate::hadamard(0)], 1, config);
            let out = circuit.statevector(None).unwrap();
            assert_relative_eq!(out.get(0).re, FRAC_1_SQRT_2, epsilon = 1e-9);
            assert_relative_eq!(out.get(1).re, FRAC_1_SQRT_2, epsilon = 1e-9);
        }
    }

    #[test]
    fn s2_bell_pair_from_hadamard_then_cnot() {
        for &config in &ALL_STATEVECTOR_STRATEGIES {
            let circuit = circuit_with(vec![Gate::hadamard(0), Gate::cnot(0, 1)], 2, config);
            let out = circuit.statevector(None).unwrap();
            assert_relative_eq!(out.get(0).re, FRAC_1_SQRT_2, epsilon = 1e-9);
            assert_relative_eq!(out.get(1).re, 0.0, epsilon = 1e-9);
            assert_relative_eq!(out.get(2).re, 0.0, epsilon = 1e-9);
            assert_relative_eq!(out.get(3).re, FRAC_1_SQRT_2, epsilon = 1e-9);
        }
    }

    #[test]
    fn s3_unitary_of_a_cnot_circuit() {
        let circuit = circuit_with(
            vec![Gate::cnot(0, 1)],
            2,
            StatevectorConfiguration::Matrix { expansion_concurrency: 1 },
        );
        let unitary = circuit.unitary().unwrap();
        let expected_ones = [(0, 0), (1, 1), (3, 2), (2, 3)];
        for r in 0..4 {
            for c in 0..4 {
                let expected = if expected_ones.contains(&(r, c)) { 1.0 } else { 0.0 };
                assert_relative_eq!(unitary.get(r, c).re, expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn s4_doubly_controlled_hadamard_on_three_qubits() {
        let gate = Gate::controlled(Gate::hadamard(0), vec![1, 2]);
        for &config in &ALL_STATEVECTOR_STRATEGIES {
            let circuit = circuit_with(vec![gate.clone()], 3, config);
            let initial = Statevector::from_bits("111").unwrap();
            let out = circuit.statevector(Some(initial)).unwrap();
            for i in 0..6 {
                assert_relative_eq!(out.get(i).norm(), 0.0, epsilon = 1e-9);
            }
            assert_relative_eq!(out.get(6).re, FRAC_1_SQRT_2, epsilon = 1e-9);
            assert_relative_eq!(out.get(7).re, -FRAC_1_SQRT_2, epsilon = 1e-9);
        }
    }

    #[test]
    fn s5_full_probability_bit_flip_noise() {
        for &config in &ALL_DENSITY_STRATEGIES {
            let factory = NoiseCircuitFactory::new(config, Config::default());
            let circuit = factory
                .make_noise_circuit(vec![NoiseOperator::Channel(NoiseChannel::bit_flip(0, 1.0).unwrap())], 1)
                .unwrap();
            let result = circuit.density_matrix(None).unwrap();
            assert_relative_eq!(result.matrix().get(0, 0).re, 0.0, epsilon = 1e-9);
            assert_relative_eq!(result.matrix().get(1, 1).re, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn s6_non_unitary_custom_matrix_gate_is_rejected_with_the_offending_gate_named() {
        use qops_circuits::{CircuitError, Matrix};

        let zero = qops_circuits::Complex::new(0.0, 0.0);
        let one = qops_circuits::Complex::new(1.0, 0.0);
        let bad = Matrix::from_rows(vec![vec![zero, one], vec![one, one]]).unwrap();
        let gate = Gate::matrix(bad, vec![0]);

        let factory = CircuitFactory::new(
            UnitaryConfiguration { expansion_concurrency: 1 },
            StatevectorConfiguration::Matrix { expansion_concurrency: 1 },
            Config::default(),
        );
        match factory.make_circuit(vec![gate], 1) {
            Err(CircuitError::GateThrewError { source, .. }) => {
                assert!(matches!(*source, CircuitError::NonUnitaryGate));
            }
            other => panic!("expected a tagged GateThrewError, got {other:?}"),
        }
    }
}

mod cross_strategy_properties {
    use super::*;

    #[test]
    fn property5_every_statevector_strategy_agrees() {
        let gates = vec![Gate::hadamard(0), Gate::cnot(0, 1), Gate::phase_shift(0.7, 1)];
        let mut results = Vec::new();
        for &config in &ALL_STATEVECTOR_STRATEGIES {
            let circuit = circuit_with(gates.clone(), 2, config);
            results.push(circuit.statevector(None).unwrap());
        }
        for pair in results.windows(2) {
            assert!(pair[0].is_approximately_equal(&pair[1], 1e-8));
        }
    }

    #[test]
    fn property6_every_density_matrix_strategy_agrees() {
        let operators = vec![
            NoiseOperator::Unitary(Gate::hadamard(0)),
            NoiseOperator::Channel(NoiseChannel::phase_damping(1, 0.3).unwrap()),
            NoiseOperator::Unitary(Gate::cnot(0, 1)),
        ];
        let mut results = Vec::new();
        for &config in &ALL_DENSITY_STRATEGIES {
            let factory = NoiseCircuitFactory::new(config, Config::default());
            let circuit = factory.make_noise_circuit(operators.clone(), 2).unwrap();
            results.push(circuit.density_matrix(None).unwrap());
        }
        for pair in results.windows(2) {
            assert!(pair[0].is_approximately_equal(&pair[1], 1e-8));
        }
    }

    #[test]
    fn property10_unitary_and_statevector_agree_on_the_same_gate_list() {
        let gates = vec![Gate::hadamard(0), Gate::hadamard(1), Gate::cnot(1, 2), Gate::not(0)];
        let circuit = circuit_with(
            gates,
            3,
            StatevectorConfiguration::Matrix { expansion_concurrency: 2 },
        );

        let via_statevector = circuit.statevector(None).unwrap();

        let unitary = circuit.unitary().unwrap();
        let initial = Statevector::basis(3, 0).unwrap();
        let via_unitary_product = unitary.multiply(
            qops_circuits::MulMode::None,
            initial.vector().as_matrix(),
            qops_circuits::MulMode::None,
        );
        let via_unitary = Statevector::from_vector(
            qops_circuits::Vector::from_matrix(via_unitary_product.unwrap()).unwrap(),
            DEFAULT_TOLERANCE,
        )
        .unwrap();

        assert!(via_statevector.is_approximately_equal(&via_unitary, 1e-8));
    }
}
