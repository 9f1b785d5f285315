use crate::config::{ConfigError, ModelConfig};
use crate::field::{EvaluationError, FieldEvaluator, FieldSample};
use crate::grid::{Grid, ScalarGrid, VectorGrid};
use rayon::prelude::*;
use std::{error::Error, fmt};
use tracing::{info, warn};

/// Altitude at which the model is sampled, meters above the reference surface.
pub const SAMPLE_ALTITUDE_M: f64 = 0.0;

/// Perturbation used by the forward-difference gradient estimate, degrees.
pub const GRADIENT_STEP_DEG: f64 = 1e-3;

/// Local spatial gradients of total intensity (F) and inclination (I).
/// Components are per-degree rates along longitude (x) and latitude (y).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientSample {
    pub df_dlon: f64,
    pub df_dlat: f64,
    pub di_dlon: f64,
    pub di_dlat: f64,
}

impl GradientSample {
    pub fn intensity(&self) -> [f64; 2] {
        [self.df_dlon, self.df_dlat]
    }

    pub fn inclination(&self) -> [f64; 2] {
        [self.di_dlon, self.di_dlat]
    }
}

/// Forward finite-difference gradient estimate using exactly three evaluator
/// calls: base, base + step in longitude, base + step in latitude. The
/// asymmetric scheme is deliberate; stability classifications downstream
/// depend on reproducing it exactly.
pub fn estimate_gradients<E: FieldEvaluator + ?Sized>(
    evaluator: &E,
    lat: f64,
    lon: f64,
    decimal_year: f64,
    step: f64,
) -> Result<GradientSample, EvaluationError> {
    let base = evaluator.evaluate(lat, lon, SAMPLE_ALTITUDE_M, decimal_year)?;
    let east = evaluator.evaluate(lat, lon + step, SAMPLE_ALTITUDE_M, decimal_year)?;
    let north = evaluator.evaluate(lat + step, lon, SAMPLE_ALTITUDE_M, decimal_year)?;
    Ok(GradientSample {
        df_dlon: (east.total_intensity - base.total_intensity) / step,
        df_dlat: (north.total_intensity - base.total_intensity) / step,
        di_dlon: (east.inclination - base.inclination) / step,
        di_dlat: (north.inclination - base.inclination) / step,
    })
}

/// Signed angle in degrees from vector `u` to vector `v`, wrapped into
/// (-180, 180]. Returns NaN when either vector is zero or non-finite, since
/// the angle is undefined there.
pub fn angle_from_u_to_v(u: [f64; 2], v: [f64; 2]) -> f64 {
    if (u[0] == 0.0 && u[1] == 0.0) || (v[0] == 0.0 && v[1] == 0.0) {
        return f64::NAN;
    }
    let angle_u = u[1].atan2(u[0]).to_degrees().rem_euclid(360.0);
    let angle_v = v[1].atan2(v[0]).to_degrees().rem_euclid(360.0);
    let delta = (angle_v - angle_u).to_radians();
    delta.sin().atan2(delta.cos()).to_degrees()
}

/// A geomagnetic field model sampled over the full globe.
///
/// Holds the grid, one scalar table per field quantity (declination,
/// inclination, total intensity), the spatial gradients of inclination and
/// intensity, and the signed angle between the two gradient vectors at every
/// node. All tables are populated once at build time and read-only afterward.
#[derive(Debug)]
pub struct MagneticModel<E> {
    evaluator: E,
    decimal_year: f64,
    grid: Grid,
    declination: ScalarGrid,
    inclination: ScalarGrid,
    intensity: ScalarGrid,
    inclination_gradient: VectorGrid,
    intensity_gradient: VectorGrid,
    orthogonality: ScalarGrid,
}

#[derive(Debug)]
pub enum ModelError {
    Config(ConfigError),
    /// Every node failed to evaluate; the evaluator is unusable, not merely
    /// undefined at isolated coordinates.
    EvaluatorUnusable,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Config(e) => write!(f, "{e}"),
            ModelError::EvaluatorUnusable => {
                write!(f, "field evaluator failed at every grid node")
            }
        }
    }
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Config(err)
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelError::Config(e) => Some(e),
            ModelError::EvaluatorUnusable => None,
        }
    }
}

impl<E: FieldEvaluator> MagneticModel<E> {
    /// Sample the evaluator over the whole grid and derive gradients and
    /// gradient orthogonality.
    ///
    /// Nodes where the evaluator fails are left NaN and sampling continues;
    /// only an evaluator that fails everywhere aborts the build.
    pub fn build(evaluator: E, config: &ModelConfig) -> Result<Self, ModelError> {
        config.validate()?;
        let decimal_year = config.decimal_year()?;
        let grid = Grid::new(config.resolution)?;

        let samples: Vec<Option<(f64, f64, f64)>> = (0..grid.n_nodes())
            .into_par_iter()
            .map(|k| {
                let (i, j) = grid.unflatten(k);
                let (lat, lon) = grid.node(i, j);
                match evaluator.evaluate(lat, lon, SAMPLE_ALTITUDE_M, decimal_year) {
                    Ok(sample) => Some((
                        sample.declination,
                        sample.inclination,
                        sample.total_intensity,
                    )),
                    Err(e) => {
                        warn!(lat, lon, error = %e, "leaving grid node undefined");
                        None
                    }
                }
            })
            .collect();

        if samples.iter().all(Option::is_none) {
            return Err(ModelError::EvaluatorUnusable);
        }

        let (n_lat, n_lon) = (grid.n_lat(), grid.n_lon());
        let pick = |f: fn(&(f64, f64, f64)) -> f64| -> ScalarGrid {
            let data = samples
                .iter()
                .map(|s| s.as_ref().map(f).unwrap_or(f64::NAN))
                .collect();
            ScalarGrid::from_data(n_lat, n_lon, data)
        };
        let declination = pick(|s| s.0);
        let inclination = pick(|s| s.1);
        let intensity = pick(|s| s.2);

        let gradients: Vec<Option<GradientSample>> = (0..grid.n_nodes())
            .into_par_iter()
            .map(|k| {
                let (i, j) = grid.unflatten(k);
                let (lat, lon) = grid.node(i, j);
                estimate_gradients(&evaluator, lat, lon, decimal_year, GRADIENT_STEP_DEG).ok()
            })
            .collect();

        let nan2 = [f64::NAN; 2];
        let inclination_gradient = VectorGrid::from_data(
            n_lat,
            n_lon,
            gradients
                .iter()
                .map(|g| g.map(|g| g.inclination()).unwrap_or(nan2))
                .collect(),
        );
        let intensity_gradient = VectorGrid::from_data(
            n_lat,
            n_lon,
            gradients
                .iter()
                .map(|g| g.map(|g| g.intensity()).unwrap_or(nan2))
                .collect(),
        );

        let orthogonality = ScalarGrid::from_data(
            n_lat,
            n_lon,
            gradients
                .par_iter()
                .map(|g| match g {
                    Some(g) => angle_from_u_to_v(g.inclination(), g.intensity()),
                    None => f64::NAN,
                })
                .collect(),
        );

        info!(
            n_lat,
            n_lon,
            undefined = samples.iter().filter(|s| s.is_none()).count(),
            "magnetic model sampled"
        );

        Ok(MagneticModel {
            evaluator,
            decimal_year,
            grid,
            declination,
            inclination,
            intensity,
            inclination_gradient,
            intensity_gradient,
            orthogonality,
        })
    }

    /// Evaluate the field at one coordinate, at the model's altitude and date.
    pub fn evaluate(&self, lat: f64, lon: f64) -> Result<FieldSample, EvaluationError> {
        self.evaluator
            .evaluate(lat, lon, SAMPLE_ALTITUDE_M, self.decimal_year)
    }

    /// Gradient estimate at an arbitrary coordinate (not restricted to grid
    /// nodes), using the model's evaluator and date.
    pub fn gradients_at(&self, lat: f64, lon: f64) -> Result<GradientSample, EvaluationError> {
        estimate_gradients(&self.evaluator, lat, lon, self.decimal_year, GRADIENT_STEP_DEG)
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn decimal_year(&self) -> f64 {
        self.decimal_year
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn declination(&self) -> &ScalarGrid {
        &self.declination
    }

    pub fn inclination(&self) -> &ScalarGrid {
        &self.inclination
    }

    pub fn intensity(&self) -> &ScalarGrid {
        &self.intensity
    }

    pub fn inclination_gradient(&self) -> &VectorGrid {
        &self.inclination_gradient
    }

    pub fn intensity_gradient(&self) -> &VectorGrid {
        &self.intensity_gradient
    }

    pub fn orthogonality(&self) -> &ScalarGrid {
        &self.orthogonality
    }

    pub(crate) fn from_parts(
        evaluator: E,
        decimal_year: f64,
        grid: Grid,
        declination: ScalarGrid,
        inclination: ScalarGrid,
        intensity: ScalarGrid,
        inclination_gradient: VectorGrid,
        intensity_gradient: VectorGrid,
        orthogonality: ScalarGrid,
    ) -> Self {
        MagneticModel {
            evaluator,
            decimal_year,
            grid,
            declination,
            inclination,
            intensity,
            inclination_gradient,
            intensity_gradient,
            orthogonality,
        }
    }
}
