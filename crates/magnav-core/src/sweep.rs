use crate::field::{EvaluationError, FieldEvaluator};
use crate::model::{estimate_gradients, GRADIENT_STEP_DEG};
use crate::stability::{classify, SteeringMatrix};
use serde::Serialize;
use std::ops::Range;

/// One row of the steering-matrix stability sweep: the integer matrix
/// entries, the local gradient components at the target, and the resulting
/// stability code (NaN when no regime is defined).
#[derive(Clone, Copy, Debug, Serialize)]
pub struct SweepRecord {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
    pub df_dlon: f64,
    pub df_dlat: f64,
    pub di_dlon: f64,
    pub di_dlat: f64,
    pub stability: f64,
}

/// Classify every integer steering matrix with entries in `entries` at one
/// fixed target coordinate. The gradients are estimated once; the sweep
/// itself is pure arithmetic.
pub fn steering_sweep<E: FieldEvaluator + ?Sized>(
    evaluator: &E,
    decimal_year: f64,
    lat: f64,
    lon: f64,
    entries: Range<i32>,
) -> Result<Vec<SweepRecord>, EvaluationError> {
    let g = estimate_gradients(evaluator, lat, lon, decimal_year, GRADIENT_STEP_DEG)?;
    let grad_f = g.intensity();
    let grad_i = g.inclination();

    let span = entries.len();
    let mut records = Vec::with_capacity(span * span * span * span);
    for a in entries.clone() {
        for b in entries.clone() {
            for c in entries.clone() {
                for d in entries.clone() {
                    let matrix =
                        SteeringMatrix::new(f64::from(a), f64::from(b), f64::from(c), f64::from(d));
                    let stability = classify(matrix, grad_i, grad_f)
                        .map(|r| r.code())
                        .unwrap_or(f64::NAN);
                    records.push(SweepRecord {
                        a,
                        b,
                        c,
                        d,
                        df_dlon: g.df_dlon,
                        df_dlat: g.df_dlat,
                        di_dlon: g.di_dlon,
                        di_dlat: g.di_dlat,
                        stability,
                    });
                }
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dipole::TiltedDipole;

    #[test]
    fn sweep_covers_every_matrix_once() {
        let dipole = TiltedDipole::default();
        let records = steering_sweep(&dipole, 2020.0, 17.7, 56.3, -2..2).unwrap();
        assert_eq!(records.len(), 4 * 4 * 4 * 4);
        // Codes come from the five-regime table (or NaN for no label).
        for r in &records {
            assert!(
                r.stability.is_nan()
                    || [0.0, 0.25, 0.5, 0.75, 1.0].contains(&r.stability),
                "unexpected code {}",
                r.stability
            );
        }
        // The gradient columns are constant across the sweep.
        assert!(records.windows(2).all(|w| w[0].df_dlon == w[1].df_dlon));
    }

    #[test]
    fn zero_matrix_is_neutrally_stable() {
        let dipole = TiltedDipole::default();
        let records = steering_sweep(&dipole, 2020.0, 17.7, 56.3, -1..1).unwrap();
        let zero = records
            .iter()
            .find(|r| r.a == 0 && r.b == 0 && r.c == 0 && r.d == 0)
            .unwrap();
        assert_eq!(zero.stability, 0.5);
    }
}
