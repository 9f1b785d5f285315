//! End-to-end checks: build a coarse model, classify stability over the
//! grid, run an agent toward a goal, and invert the field back to
//! coordinates.

use magnav_core::dipole::TiltedDipole;
use magnav_core::{
    find_coordinates, stability_grid, EvaluationError, FieldEvaluator, FieldSample, GeoPoint,
    HaltReason, MagneticModel, ModelConfig, Navigator, NavigatorConfig, SolverOptions,
    SteeringMatrix,
};

/// Synthetic field with constant, independent gradients: intensity varies
/// with longitude, inclination with latitude. Makes the local Jacobian the
/// same at every node, so whole-grid classifications are known exactly.
struct SlantField;

impl FieldEvaluator for SlantField {
    fn evaluate(
        &self,
        lat: f64,
        lon: f64,
        _altitude_m: f64,
        _decimal_year: f64,
    ) -> Result<FieldSample, EvaluationError> {
        if lat.abs() > 90.0 {
            return Err(EvaluationError::OutOfDomain { lat, lon });
        }
        let f = 40.0 + lon / 10.0;
        Ok(FieldSample {
            declination: 2.0,
            inclination: lat,
            total_intensity: f,
            horizontal_intensity: f,
            north: f,
            east: 0.0,
            vertical: 0.0,
        })
    }
}

fn coarse_model<E: FieldEvaluator>(evaluator: E, resolution: f64) -> MagneticModel<E> {
    let config = ModelConfig {
        resolution,
        ..ModelConfig::default()
    };
    MagneticModel::build(evaluator, &config).unwrap()
}

#[test]
fn identity_steering_contracts_everywhere_on_the_slant_field() {
    let model = coarse_model(SlantField, 15.0);
    let stability = stability_grid(&model, SteeringMatrix::IDENTITY);
    let grid = model.grid();
    for i in 0..grid.n_lat() {
        for j in 0..grid.n_lon() {
            let code = stability.get(i, j);
            if i == grid.n_lat() - 1 {
                // The forward difference at 90°N probes past the pole, so
                // the top row has no gradients and no label.
                assert!(code.is_nan());
            } else {
                // J = -[[0.1, 0], [0, 1]]: both eigenvalues negative.
                assert_eq!(code, 0.0, "node ({i}, {j})");
            }
        }
    }
}

#[test]
fn negated_steering_flips_the_classification() {
    let model = coarse_model(SlantField, 15.0);
    let negated = stability_grid(&model, SteeringMatrix::IDENTITY.scaled(-1.0));
    // J = [[0.1, 0], [0, 1]]: pure divergence, unstable node everywhere.
    assert_eq!(negated.get(0, 0), 1.0);
    assert_eq!(negated.get(3, 7), 1.0);
}

#[test]
fn dipole_stability_codes_stay_in_the_regime_table() {
    let model = coarse_model(TiltedDipole::default(), 15.0);
    let stability = stability_grid(&model, SteeringMatrix::IDENTITY);
    let finite = stability
        .as_slice()
        .iter()
        .filter(|c| !c.is_nan())
        .count();
    assert!(finite > 0);
    for &code in stability.as_slice() {
        assert!(code.is_nan() || [0.0, 0.25, 0.5, 0.75, 1.0].contains(&code));
    }
}

#[test]
fn agent_run_decreases_goal_mismatch() {
    let model = coarse_model(TiltedDipole::default(), 15.0);
    // Réunion toward Oman, the reference migration scenario.
    let start = GeoPoint::new(-21.115141, 55.536384);
    let goal = GeoPoint::new(17.7, 56.3);
    let mut nav = Navigator::new(
        model.evaluator(),
        model.decimal_year(),
        start,
        goal,
        NavigatorConfig::default(),
    )
    .unwrap();

    let report = nav.run(50_000).unwrap();
    assert!(nav.trajectory().len() > 1);
    assert_ne!(report.outcome, HaltReason::PolarSingularity);

    let goal_field = nav.goal_field();
    let end_field = nav.current_field();
    let end_mismatch = (end_field.total_intensity - goal_field.total_intensity)
        .hypot(end_field.inclination - goal_field.inclination);
    let start_field = nav.start_field();
    let start_mismatch = (start_field.total_intensity - goal_field.total_intensity)
        .hypot(start_field.inclination - goal_field.inclination);
    assert!(end_mismatch < start_mismatch);
}

#[test]
fn solver_inverts_the_agent_goal() {
    let model = coarse_model(TiltedDipole::default(), 15.0);
    let goal = model.evaluate(17.7, 56.3).unwrap();
    let result = find_coordinates(
        model.evaluator(),
        model.decimal_year(),
        goal.total_intensity,
        goal.inclination,
        15.0,
        50.0,
        &SolverOptions::default(),
    );
    assert!(result.cost < 1e-8);
    let found = model.evaluate(result.lat, result.lon).unwrap();
    assert!((found.total_intensity - goal.total_intensity).abs() < 1e-4);
    assert!((found.inclination - goal.inclination).abs() < 1e-4);
}
