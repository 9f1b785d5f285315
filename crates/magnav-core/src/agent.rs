use crate::field::{EvaluationError, FieldEvaluator, FieldTriple};
use crate::grid::VectorGrid;
use crate::model::{MagneticModel, SAMPLE_ALTITUDE_M};
use crate::stability::SteeringMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

/// Tunables of the navigation dynamics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavigatorConfig {
    /// Linear map from field mismatch (ΔF, ΔI) to velocity. Default: identity.
    pub steering: SteeringMatrix,
    /// When true, the steering output is expressed relative to magnetic
    /// north: the velocity is rotated by minus the local declination.
    /// Default: false (true-north frame).
    pub magnetic_north_frame: bool,
    /// Hard ceiling on speed, degrees per time step. Default: 0.1.
    pub max_speed: f64,
    /// Integration step. Default: 1.0.
    pub time_step: f64,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        NavigatorConfig {
            steering: SteeringMatrix::IDENTITY,
            magnetic_north_frame: false,
            max_speed: 0.1,
            time_step: 1.0,
        }
    }
}

/// Explicit inputs to the velocity law, in place of "use agent state"
/// defaults; [`Navigator::velocity_from_state`] fills them from the cached
/// goal and current triples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityInputs {
    pub goal_inclination: f64,
    pub goal_intensity: f64,
    pub current_inclination: f64,
    pub current_intensity: f64,
    pub current_declination: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// All requested steps were taken.
    Completed,
    /// The next step would have crossed a pole; the loop stopped without
    /// appending the invalid coordinate. The trajectory so far stays valid.
    PolarSingularity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// Velocity dropped below max_speed / 100: the goal field signature is
    /// effectively reached.
    Converged,
    PolarSingularity,
    StepBudget,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: HaltReason,
    pub steps_taken: usize,
}

/// A navigator that steers by comparing its current field readings against
/// the remembered readings at its goal.
///
/// Owns its trajectory and "current field" state exclusively; several
/// navigators can run over the same read-only sampled model.
pub struct Navigator<'a, E: FieldEvaluator> {
    evaluator: &'a E,
    decimal_year: f64,
    pub config: NavigatorConfig,
    start: GeoPoint,
    goal: GeoPoint,
    start_field: FieldTriple,
    goal_field: FieldTriple,
    current_field: FieldTriple,
    trajectory: Vec<GeoPoint>,
}

impl<'a, E: FieldEvaluator> Navigator<'a, E> {
    /// Evaluate the field at start and goal and seed the trajectory with the
    /// start position.
    pub fn new(
        evaluator: &'a E,
        decimal_year: f64,
        start: GeoPoint,
        goal: GeoPoint,
        config: NavigatorConfig,
    ) -> Result<Self, EvaluationError> {
        let start_field = FieldTriple::from(evaluator.evaluate(
            start.lat,
            start.lon,
            SAMPLE_ALTITUDE_M,
            decimal_year,
        )?);
        let goal_field = FieldTriple::from(evaluator.evaluate(
            goal.lat,
            goal.lon,
            SAMPLE_ALTITUDE_M,
            decimal_year,
        )?);
        Ok(Navigator {
            evaluator,
            decimal_year,
            config,
            start,
            goal,
            start_field,
            goal_field,
            current_field: start_field,
            trajectory: vec![start],
        })
    }

    pub fn set_start(&mut self, point: GeoPoint) -> Result<(), EvaluationError> {
        self.start_field = FieldTriple::from(self.evaluator.evaluate(
            point.lat,
            point.lon,
            SAMPLE_ALTITUDE_M,
            self.decimal_year,
        )?);
        self.start = point;
        Ok(())
    }

    pub fn set_goal(&mut self, point: GeoPoint) -> Result<(), EvaluationError> {
        self.goal_field = FieldTriple::from(self.evaluator.evaluate(
            point.lat,
            point.lon,
            SAMPLE_ALTITUDE_M,
            self.decimal_year,
        )?);
        self.goal = point;
        Ok(())
    }

    /// Truncate the trajectory back to the start position and restore the
    /// start's field triple as "current".
    pub fn reset(&mut self) {
        self.trajectory.clear();
        self.trajectory.push(self.start);
        self.current_field = self.start_field;
    }

    /// The clipped linear velocity law. Pure in its inputs and the
    /// navigator's configuration; never exceeds `max_speed`.
    pub fn compute_velocity(&self, inputs: VelocityInputs) -> [f64; 2] {
        let mismatch = [
            inputs.goal_intensity - inputs.current_intensity,
            inputs.goal_inclination - inputs.current_inclination,
        ];
        let mut velocity = self.config.steering.apply(mismatch);
        if self.config.magnetic_north_frame {
            let theta = (-inputs.current_declination).to_radians();
            let (sin, cos) = theta.sin_cos();
            velocity = [
                cos * velocity[0] - sin * velocity[1],
                sin * velocity[0] + cos * velocity[1],
            ];
        }
        let speed = velocity[0].hypot(velocity[1]);
        if speed > self.config.max_speed {
            let scale = self.config.max_speed / speed;
            velocity = [velocity[0] * scale, velocity[1] * scale];
        }
        velocity
    }

    /// Velocity the agent has at its current position and field readings.
    pub fn velocity_from_state(&self) -> [f64; 2] {
        self.compute_velocity(VelocityInputs {
            goal_inclination: self.goal_field.inclination,
            goal_intensity: self.goal_field.total_intensity,
            current_inclination: self.current_field.inclination,
            current_intensity: self.current_field.total_intensity,
            current_declination: self.current_field.declination,
        })
    }

    /// Advance up to `n` steps. Stops early (without error) if a step would
    /// cross a pole. A field evaluation failure at a stepped-to coordinate
    /// is fatal: the agent cannot continue without a reading at its own
    /// position.
    pub fn step(&mut self, n: usize) -> Result<StepOutcome, EvaluationError> {
        for _ in 0..n {
            let velocity = self.velocity_from_state();
            if self.advance(velocity)?.is_none() {
                return Ok(StepOutcome::PolarSingularity);
            }
        }
        Ok(StepOutcome::Completed)
    }

    /// Restart from the start position and integrate until the velocity
    /// falls below max_speed / 100, a pole is crossed, or the step budget
    /// runs out.
    pub fn run(&mut self, max_steps: usize) -> Result<RunReport, EvaluationError> {
        self.reset();
        let threshold = self.config.max_speed / 100.0;
        let mut steps_taken = 0;
        while steps_taken < max_steps {
            let velocity = self.velocity_from_state();
            if velocity[0].hypot(velocity[1]) < threshold {
                return Ok(RunReport {
                    outcome: HaltReason::Converged,
                    steps_taken,
                });
            }
            if self.advance(velocity)?.is_none() {
                return Ok(RunReport {
                    outcome: HaltReason::PolarSingularity,
                    steps_taken,
                });
            }
            steps_taken += 1;
        }
        Ok(RunReport {
            outcome: HaltReason::StepBudget,
            steps_taken,
        })
    }

    /// One position update. Returns `None` on the polar singularity, in
    /// which case nothing is appended.
    fn advance(&mut self, velocity: [f64; 2]) -> Result<Option<()>, EvaluationError> {
        let position = *self
            .trajectory
            .last()
            .expect("trajectory is seeded with the start position");
        let new_lon = position.lon + velocity[0] * self.config.time_step;
        let new_lat = position.lat + velocity[1] * self.config.time_step;
        if new_lat.abs() > 90.0 {
            info!(new_lat, "aborting: crossed polar singularity");
            return Ok(None);
        }
        let sample =
            self.evaluator
                .evaluate(new_lat, new_lon, SAMPLE_ALTITUDE_M, self.decimal_year)?;
        self.trajectory.push(GeoPoint::new(new_lat, new_lon));
        self.current_field = FieldTriple::from(sample);
        Ok(Some(()))
    }

    /// Velocity an agent would have at every node of the sampled grid, using
    /// that node's cached field triple as "current" and this navigator's
    /// goal as target. An analysis aid, independent of the trajectory.
    pub fn velocity_grid<M: FieldEvaluator>(&self, model: &MagneticModel<M>) -> VectorGrid {
        let grid = model.grid();
        let data: Vec<[f64; 2]> = (0..grid.n_nodes())
            .into_par_iter()
            .map(|k| {
                let (i, j) = grid.unflatten(k);
                self.compute_velocity(VelocityInputs {
                    goal_inclination: self.goal_field.inclination,
                    goal_intensity: self.goal_field.total_intensity,
                    current_inclination: model.inclination().get(i, j),
                    current_intensity: model.intensity().get(i, j),
                    current_declination: model.declination().get(i, j),
                })
            })
            .collect();
        VectorGrid::from_data(grid.n_lat(), grid.n_lon(), data)
    }

    pub fn trajectory(&self) -> &[GeoPoint] {
        &self.trajectory
    }

    pub fn start(&self) -> GeoPoint {
        self.start
    }

    pub fn goal(&self) -> GeoPoint {
        self.goal
    }

    pub fn start_field(&self) -> FieldTriple {
        self.start_field
    }

    pub fn goal_field(&self) -> FieldTriple {
        self.goal_field
    }

    pub fn current_field(&self) -> FieldTriple {
        self.current_field
    }
}

/// Compass bearing of a velocity vector, degrees clockwise from north.
pub fn bearing(velocity: [f64; 2]) -> f64 {
    (90.0 - velocity[1].atan2(velocity[0]).to_degrees()).rem_euclid(360.0)
}
