use crate::field::FieldEvaluator;
use crate::grid::ScalarGrid;
use crate::model::MagneticModel;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Eigenvalue real parts within this band of zero count as degenerate; above
/// it, as unstable.
pub const EIGENVALUE_EPSILON: f64 = 1e-12;

/// The agent's 2x2 steering operator: maps a field mismatch (ΔF, ΔI) to a
/// velocity. A plain value type so the per-node eigen-computation stays
/// allocation-free.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SteeringMatrix(pub [[f64; 2]; 2]);

impl SteeringMatrix {
    pub const IDENTITY: SteeringMatrix = SteeringMatrix([[1.0, 0.0], [0.0, 1.0]]);

    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        SteeringMatrix([[a, b], [c, d]])
    }

    pub fn apply(&self, v: [f64; 2]) -> [f64; 2] {
        [
            self.0[0][0] * v[0] + self.0[0][1] * v[1],
            self.0[1][0] * v[0] + self.0[1][1] * v[1],
        ]
    }

    pub fn scaled(self, factor: f64) -> Self {
        SteeringMatrix([
            [self.0[0][0] * factor, self.0[0][1] * factor],
            [self.0[1][0] * factor, self.0[1][1] * factor],
        ])
    }
}

/// Eigenvalue of a real 2x2 matrix; a conjugate pair when `im != 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Eigenvalue {
    pub re: f64,
    pub im: f64,
}

/// Closed-form eigenvalues from trace and determinant. A negative
/// discriminant yields the complex-conjugate pair.
pub fn eigenvalues_2x2(m: [[f64; 2]; 2]) -> [Eigenvalue; 2] {
    let trace = m[0][0] + m[1][1];
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    let half_trace = trace / 2.0;
    let discriminant = half_trace * half_trace - det;
    if discriminant >= 0.0 {
        let root = discriminant.sqrt();
        [
            Eigenvalue { re: half_trace + root, im: 0.0 },
            Eigenvalue { re: half_trace - root, im: 0.0 },
        ]
    } else {
        let root = (-discriminant).sqrt();
        [
            Eigenvalue { re: half_trace, im: root },
            Eigenvalue { re: half_trace, im: -root },
        ]
    }
}

/// Qualitative local dynamics of an agent steering with a given matrix: does
/// it converge to, diverge from, or orbit the goal's field signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    StableNode,
    SpiralSink,
    NeutrallyStable,
    SpiralSource,
    UnstableNode,
}

impl Regime {
    /// Numeric code used in stability grids and sweep exports.
    pub fn code(self) -> f64 {
        match self {
            Regime::StableNode => 0.0,
            Regime::SpiralSink => 0.25,
            Regime::NeutrallyStable => 0.5,
            Regime::SpiralSource => 0.75,
            Regime::UnstableNode => 1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Regime::StableNode => "stable node",
            Regime::SpiralSink => "spiral sink",
            Regime::NeutrallyStable => "neutrally stable",
            Regime::SpiralSource => "spiral source",
            Regime::UnstableNode => "unstable node",
        }
    }
}

/// Classify the local dynamics from the steering matrix and the gradients of
/// inclination and intensity at a point.
///
/// The local Jacobian is `J = -A * G` with `G = [grad F; grad I]` stacked as
/// rows. Returns `None` when the gradients are not finite (undefined grid
/// nodes), since no regime can be read off a NaN Jacobian.
pub fn classify(a: SteeringMatrix, grad_i: [f64; 2], grad_f: [f64; 2]) -> Option<Regime> {
    let g = [grad_f, grad_i];
    let mut j = [[0.0f64; 2]; 2];
    for (row, j_row) in j.iter_mut().enumerate() {
        for (col, j_val) in j_row.iter_mut().enumerate() {
            *j_val = -(a.0[row][0] * g[0][col] + a.0[row][1] * g[1][col]);
        }
    }
    if j.iter().flatten().any(|v| !v.is_finite()) {
        return None;
    }

    let [l1, l2] = eigenvalues_2x2(j);
    let unstable = l1.re > EIGENVALUE_EPSILON || l2.re > EIGENVALUE_EPSILON;
    let degenerate = l1.re.abs() < EIGENVALUE_EPSILON || l2.re.abs() < EIGENVALUE_EPSILON;
    let rotating = l1.im != 0.0 || l2.im != 0.0;

    Some(if unstable {
        if rotating {
            Regime::SpiralSource
        } else {
            Regime::UnstableNode
        }
    } else if degenerate {
        Regime::NeutrallyStable
    } else if rotating {
        Regime::SpiralSink
    } else {
        Regime::StableNode
    })
}

/// Stability code at every grid node for one steering matrix. There is no
/// incremental update: a new matrix means a full recomputation.
pub fn stability_grid<E: FieldEvaluator>(
    model: &MagneticModel<E>,
    a: SteeringMatrix,
) -> ScalarGrid {
    let grid = model.grid();
    let codes: Vec<f64> = (0..grid.n_nodes())
        .into_par_iter()
        .map(|k| {
            let (i, j) = grid.unflatten(k);
            let grad_i = model.inclination_gradient().get(i, j);
            let grad_f = model.intensity_gradient().get(i, j);
            classify(a, grad_i, grad_f)
                .map(Regime::code)
                .unwrap_or(f64::NAN)
        })
        .collect();
    ScalarGrid::from_data(grid.n_lat(), grid.n_lon(), codes)
}
