//! Geomagnetic navigation simulation: sample a field model over the globe,
//! derive inclination/intensity gradients and their local stability under a
//! steering matrix, and integrate agents that home in on a remembered goal
//! field signature.
//!
//! The actual geomagnetic model is an external collaborator behind the
//! [`field::FieldEvaluator`] trait; [`dipole::TiltedDipole`] is a built-in
//! analytic stand-in for tests and demos.

pub mod agent;
pub mod cache;
pub mod config;
pub mod dipole;
pub mod field;
pub mod grid;
pub mod model;
pub mod solver;
pub mod stability;
pub mod sweep;

pub use agent::{
    bearing, GeoPoint, HaltReason, Navigator, NavigatorConfig, RunReport, StepOutcome,
    VelocityInputs,
};
pub use config::{to_decimal_year, ConfigError, ModelConfig};
pub use field::{EvaluationError, FieldEvaluator, FieldSample, FieldTriple};
pub use grid::{Grid, ScalarGrid, VectorGrid};
pub use model::{GradientSample, MagneticModel, ModelError};
pub use solver::{find_coordinates, SolveResult, SolverOptions};
pub use stability::{classify, stability_grid, Regime, SteeringMatrix};
pub use sweep::{steering_sweep, SweepRecord};
