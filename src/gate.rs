//! Gate algebra - a tagged value describing a gate, and its extraction into
//! an effective matrix plus qubit bookkeeping.
//!
//! Reimplemented as a single sum type over the gate cases, plus a pure
//! function (`extract`) from a case to `(matrix, inputs, controls,
//! truthTable)`. Oracle and controlled forms recurse into their inner gate
//! at extraction time; there is no runtime dispatch beyond a match on the
//! variant.

use crate::error::{CircuitError, Result};
use crate::matrix::{Complex, Matrix, DEFAULT_TOLERANCE};
use crate::{FRAC_1_SQRT_2, ONE, ZERO};
use std::collections::HashSet;

/// Axis of rotation for `Gate::Rotation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A quantum gate, described declaratively rather than as a raw matrix.
/// `Controlled` and `Oracle` wrap an inner gate and are fully recursive:
/// a `Controlled` gate may itself control another `Controlled` gate.
#[derive(Debug, Clone)]
pub enum Gate {
    Not { target: usize },
    Hadamard { target: usize },
    PhaseShift { radians: f64, target: usize },
    Rotation { axis: Axis, radians: f64, target: usize },
    Matrix { matrix: Matrix, inputs: Vec<usize> },
    Controlled { inner: Box<Gate>, controls: Vec<usize> },
    Oracle {
        truth_table: Vec<String>,
        controls: Vec<usize>,
        inner: Box<Gate>,
    },
}

/// The result of resolving a `Gate` against a circuit's qubit count: the
/// effective matrix (already embedding any control/oracle structure), the
/// ordered qubit positions it reads (controls first, then the innermost
/// gate's own inputs), and enough bookkeeping for the `direct` statevector
/// strategy to skip untouched rows.
#[derive(Debug, Clone)]
pub struct ExtractedGate {
    pub matrix: Matrix,
    pub inputs: Vec<usize>,
    pub control_count: usize,
    /// A truth table over the leading `control_count` bits of `inputs`.
    /// Only meaningful for the fast-path filter when `truth_table_is_exact`
    /// is true; otherwise every row must be computed directly from `matrix`.
    pub truth_table: Vec<String>,
    pub truth_table_is_exact: bool,
}

impl ExtractedGate {
    /// Whether `bits` (a string of '0'/'1' over the leading `control_count`
    /// qubits, most-significant control first) satisfies this gate's
    /// control condition. Only valid when `truth_table_is_exact`.
    pub fn fires_on(&self, bits: &str) -> bool {
        self.truth_table.iter().any(|entry| entry == bits)
    }

    /// The dimension of the innermost (non-control) block of `matrix`:
    /// `matrix.row_count() / 2^control_count`.
    pub fn inner_dim(&self) -> usize {
        self.matrix.row_count() >> self.control_count
    }

    /// Whether the control combination encoded in the leading
    /// `control_count` bits of `base_index` (an index into this gate's own
    /// `matrix`, not the full circuit) satisfies the truth table. Only
    /// meaningful when `truth_table_is_exact`; callers gate on that
    /// separately.
    pub fn control_combination_fires(&self, base_index: usize) -> bool {
        if self.control_count == 0 {
            return true;
        }
        let ctrl_value = base_index / self.inner_dim();
        self.fires_on(&control_bitstring(ctrl_value, self.control_count))
    }
}

impl Gate {
    pub fn not(target: usize) -> Self {
        Gate::Not { target }
    }

    pub fn hadamard(target: usize) -> Self {
        Gate::Hadamard { target }
    }

    pub fn phase_shift(radians: f64, target: usize) -> Self {
        Gate::PhaseShift { radians, target }
    }

    pub fn rotation(axis: Axis, radians: f64, target: usize) -> Self {
        Gate::Rotation { axis, radians, target }
    }

    pub fn matrix(matrix: Matrix, inputs: Vec<usize>) -> Self {
        Gate::Matrix { matrix, inputs }
    }

    pub fn controlled(inner: Gate, controls: Vec<usize>) -> Self {
        Gate::Controlled {
            inner: Box::new(inner),
            controls,
        }
    }

    pub fn oracle(truth_table: Vec<String>, controls: Vec<usize>, inner: Gate) -> Self {
        Gate::Oracle {
            truth_table,
            controls,
            inner: Box::new(inner),
        }
    }

    // ---- Convenience constructors: pure sugar over the cases above ----

    pub fn cnot(control: usize, target: usize) -> Self {
        Gate::controlled(Gate::not(target), vec![control])
    }

    pub fn toffoli(control_a: usize, control_b: usize, target: usize) -> Self {
        Gate::controlled(Gate::not(target), vec![control_a, control_b])
    }

    pub fn controlled_hadamard(control: usize, target: usize) -> Self {
        Gate::controlled(Gate::hadamard(target), vec![control])
    }

    pub fn hadamard_range(targets: impl IntoIterator<Item = usize>) -> Vec<Gate> {
        targets.into_iter().map(Gate::hadamard).collect()
    }

    pub fn not_range(targets: impl IntoIterator<Item = usize>) -> Vec<Gate> {
        targets.into_iter().map(Gate::not).collect()
    }

    /// Validate and resolve this gate against a circuit with `qubit_count`
    /// qubits, producing its effective matrix and qubit bookkeeping.
    pub fn extract(&self, qubit_count: usize) -> Result<ExtractedGate> {
        match self {
            Gate::Not { target } => base_single(qubit_count, *target, not_matrix()),
            Gate::Hadamard { target } => base_single(qubit_count, *target, hadamard_matrix()),
            Gate::PhaseShift { radians, target } => {
                base_single(qubit_count, *target, phase_shift_matrix(*radians))
            }
            Gate::Rotation { axis, radians, target } => {
                base_single(qubit_count, *target, rotation_matrix(*axis, *radians))
            }
            Gate::Matrix { matrix, inputs } => base_multi(qubit_count, matrix.clone(), inputs.clone()),
            Gate::Controlled { inner, controls } => {
                if controls.is_empty() {
                    return Err(CircuitError::EmptyControls);
                }
                let controls = descending_controls(controls);
                let full_table = vec![all_ones(controls.len())];
                extract_controlled_like(inner, &controls, &full_table, qubit_count)
            }
            Gate::Oracle {
                truth_table,
                controls,
                inner,
            } => {
                if controls.is_empty() {
                    return Err(CircuitError::EmptyControls);
                }
                validate_truth_table(truth_table, controls.len())?;
                let controls = descending_controls(controls);
                extract_controlled_like(inner, &controls, truth_table, qubit_count)
            }
        }
    }
}

fn all_ones(width: usize) -> String {
    "1".repeat(width)
}

/// Canonicalize a caller-supplied control list into descending qubit-index
/// order, so that truth-table significance follows the crate-wide
/// convention: the leftmost character names the highest-index control,
/// independent of the order controls were listed in.
fn descending_controls(controls: &[usize]) -> Vec<usize> {
    let mut sorted = controls.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted
}

fn base_single(qubit_count: usize, target: usize, matrix: Matrix) -> Result<ExtractedGate> {
    base_multi(qubit_count, matrix, vec![target])
}

fn base_multi(qubit_count: usize, matrix: Matrix, inputs: Vec<usize>) -> Result<ExtractedGate> {
    validate_unique_inputs(&inputs, qubit_count)?;

    let row_count = matrix.row_count();
    if row_count == 0 || (row_count & (row_count - 1)) != 0 {
        return Err(CircuitError::MatrixRowCountNotPowerOfTwo(row_count));
    }
    let expected_inputs = row_count.trailing_zeros() as usize;
    if expected_inputs != inputs.len() {
        return Err(CircuitError::InputCountMismatch {
            input_count: inputs.len(),
            matrix_row_count: row_count,
        });
    }
    if expected_inputs > qubit_count {
        return Err(CircuitError::MatrixTooWide {
            needed: expected_inputs,
            qubit_count,
        });
    }
    if !matrix.is_approximately_unitary(DEFAULT_TOLERANCE) {
        return Err(CircuitError::NonUnitaryGate);
    }

    Ok(ExtractedGate {
        matrix,
        inputs,
        control_count: 0,
        truth_table: Vec::new(),
        truth_table_is_exact: true,
    })
}

fn validate_unique_inputs(inputs: &[usize], qubit_count: usize) -> Result<()> {
    for &i in inputs {
        if i >= qubit_count {
            return Err(CircuitError::InputOutOfBounds { index: i, qubit_count });
        }
    }
    let unique: HashSet<usize> = inputs.iter().copied().collect();
    if unique.len() != inputs.len() {
        return Err(CircuitError::DuplicateInputs(inputs.to_vec()));
    }
    Ok(())
}

fn validate_truth_table(entries: &[String], control_count: usize) -> Result<()> {
    let mut width = None;
    for entry in entries {
        if entry.is_empty() || !entry.chars().all(|c| c == '0' || c == '1') {
            return Err(CircuitError::MalformedTruthTableEntry(entry.clone()));
        }
        if entry.len() > control_count {
            return Err(CircuitError::TruthTableTooWide {
                entry: entry.clone(),
                entry_len: entry.len(),
                control_count,
            });
        }
        match width {
            None => width = Some(entry.len()),
            Some(w) if w != entry.len() => {
                return Err(CircuitError::InconsistentTruthTableWidth(w, entry.len()))
            }
            _ => {}
        }
    }
    Ok(())
}

/// `value` (a `width`-bit control combination) rendered with the
/// highest-order control leftmost, matching the crate's truth-table
/// convention.
fn control_bitstring(value: usize, width: usize) -> String {
    (0..width)
        .map(|i| if (value >> (width - 1 - i)) & 1 == 1 { '1' } else { '0' })
        .collect()
}

/// Resolve a `Controlled`/`Oracle` gate by recursively extracting the inner
/// gate, then embedding its effective matrix into a block-diagonal matrix
/// over the control combinations: each control combination's block is the
/// inner matrix when it satisfies `this_truth_table` (interpreted as a
/// prefix match over the leading bits), otherwise identity. `controls` must
/// already be in descending qubit-index order (see `descending_controls`),
/// so the leftmost bit of `this_truth_table` names the highest-index
/// control, matching the crate-wide truth-table convention.
fn extract_controlled_like(
    inner: &Gate,
    controls: &[usize],
    this_truth_table: &[String],
    qubit_count: usize,
) -> Result<ExtractedGate> {
    let inner_extracted = inner.extract(qubit_count)?;

    let mut inputs = controls.to_vec();
    inputs.extend(inner_extracted.inputs.iter().copied());
    validate_unique_inputs(&inputs, qubit_count)?;

    let inner_dim = inner_extracted.matrix.row_count();
    let control_width = controls.len();
    let total_dim = inner_dim << control_width;

    let matrix = Matrix::build(total_dim, total_dim, 1, |r, c| {
        let r_ctrl = r / inner_dim;
        let r_inner = r % inner_dim;
        let c_ctrl = c / inner_dim;
        let c_inner = c % inner_dim;
        if r_ctrl != c_ctrl {
            return ZERO;
        }
        let bits = control_bitstring(r_ctrl, control_width);
        if fires_by_prefix(this_truth_table, &bits) {
            inner_extracted.matrix.get(r_inner, c_inner)
        } else if r_inner == c_inner {
            ONE
        } else {
            ZERO
        }
    })?;

    let this_is_exact = this_truth_table.iter().all(|e| e.len() == control_width);
    let truth_table_is_exact = this_is_exact && inner_extracted.truth_table_is_exact;

    let truth_table = if !truth_table_is_exact {
        Vec::new()
    } else if inner_extracted.control_count == 0 {
        this_truth_table.to_vec()
    } else {
        let mut combined = Vec::with_capacity(this_truth_table.len() * inner_extracted.truth_table.len());
        for outer in this_truth_table {
            for inner_entry in &inner_extracted.truth_table {
                combined.push(format!("{outer}{inner_entry}"));
            }
        }
        combined
    };

    Ok(ExtractedGate {
        matrix,
        inputs,
        control_count: control_width + inner_extracted.control_count,
        truth_table,
        truth_table_is_exact,
    })
}

fn fires_by_prefix(entries: &[String], bits: &str) -> bool {
    entries.iter().any(|entry| bits.starts_with(entry.as_str()))
}

fn not_matrix() -> Matrix {
    Matrix::literal_2x2([[ZERO, ONE], [ONE, ZERO]])
}

fn hadamard_matrix() -> Matrix {
    let h = Complex::new(FRAC_1_SQRT_2, 0.0);
    Matrix::literal_2x2([[h, h], [h, -h]])
}

fn phase_shift_matrix(radians: f64) -> Matrix {
    let phase = Complex::from_polar(1.0, radians);
    Matrix::literal_2x2([[ONE, ZERO], [ZERO, phase]])
}

fn rotation_matrix(axis: Axis, radians: f64) -> Matrix {
    let zero = ZERO;
    let half = radians / 2.0;
    match axis {
        Axis::X => {
            let cos = Complex::new(half.cos(), 0.0);
            let sin = Complex::new(0.0, -half.sin());
            Matrix::literal_2x2([[cos, sin], [sin, cos]])
        }
        Axis::Y => {
            let cos = Complex::new(half.cos(), 0.0);
            let sin = Complex::new(half.sin(), 0.0);
            Matrix::literal_2x2([[cos, -sin], [sin, cos]])
        }
        Axis::Z => {
            let neg = Complex::from_polar(1.0, -half);
            let pos = Complex::from_polar(1.0, half);
            Matrix::literal_2x2([[neg, zero], [zero, pos]])
        }
    }
}
