use crate::field::FieldEvaluator;
use crate::grid::{Grid, ScalarGrid, VectorGrid};
use crate::model::MagneticModel;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::{error::Error, fmt};
use tracing::info;

/// Serialized form of a fully populated model. Values round-trip
/// bit-identically (bincode writes the raw f64 bits, NaN sentinels
/// included), so a restored cache classifies exactly like the model it was
/// saved from.
#[derive(Serialize, Deserialize)]
struct CacheBlob {
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
pub enum CacheError {
    Io(std::io::Error),
    Codec(bincode::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "cache io failure: {e}"),
            CacheError::Codec(e) => write!(f, "cache encoding failure: {e}"),
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err)
    }
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        CacheError::Codec(err)
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CacheError::Io(e) => Some(e),
            CacheError::Codec(e) => Some(e),
        }
    }
}

impl<E: FieldEvaluator> MagneticModel<E> {
    /// Write the sampled grids to a binary blob so a later process can skip
    /// the full-globe sampling pass.
    pub fn save_cache(&self, path: &Path) -> Result<(), CacheError> {
        let blob = CacheBlob {
            decimal_year: self.decimal_year(),
            grid: self.grid().clone(),
            declination: self.declination().clone(),
            inclination: self.inclination().clone(),
            intensity: self.intensity().clone(),
            inclination_gradient: self.inclination_gradient().clone(),
            intensity_gradient: self.intensity_gradient().clone(),
            orthogonality: self.orthogonality().clone(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &blob)?;
        info!(path = %path.display(), "model cache written");
        Ok(())
    }

    /// Restore a model from a cache blob. The evaluator is still required:
    /// single-point operations (agent stepping, coordinate solving) evaluate
    /// the live field, only the grids come from the cache.
    pub fn load_cache(evaluator: E, path: &Path) -> Result<Self, CacheError> {
        let reader = BufReader::new(File::open(path)?);
        let blob: CacheBlob = bincode::deserialize_from(reader)?;
        info!(path = %path.display(), "model cache restored");
        Ok(MagneticModel::from_parts(
            evaluator,
            blob.decimal_year,
            blob.grid,
            blob.declination,
            blob.inclination,
            blob.intensity,
            blob.inclination_gradient,
            blob.intensity_gradient,
            blob.orthogonality,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::dipole::TiltedDipole;
    use crate::field::{EvaluationError, FieldSample};
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("magnav-cache-{name}-{}", std::process::id()));
        path
    }

    /// Dipole that refuses the high northern latitudes, leaving a band of
    /// NaN sentinel nodes in the built model.
    struct PatchyDipole(TiltedDipole);

    impl FieldEvaluator for PatchyDipole {
        fn evaluate(
            &self,
            lat: f64,
            lon: f64,
            altitude_m: f64,
            decimal_year: f64,
        ) -> Result<FieldSample, EvaluationError> {
            if lat > 45.0 {
                return Err(EvaluationError::Model("no coverage".to_string()));
            }
            self.0.evaluate(lat, lon, altitude_m, decimal_year)
        }
    }

    #[test]
    fn cache_round_trip_is_bit_identical() {
        let config = ModelConfig {
            resolution: 30.0,
            ..ModelConfig::default()
        };
        let patchy = PatchyDipole(TiltedDipole::default());
        let model = MagneticModel::build(patchy, &config).unwrap();
        // The round trip must preserve undefined nodes, not just values.
        let nan_nodes = model
            .intensity()
            .as_slice()
            .iter()
            .filter(|v| v.is_nan())
            .count();
        assert!(nan_nodes > 0);
        let path = scratch_path("roundtrip");
        model.save_cache(&path).unwrap();
        let restored =
            MagneticModel::load_cache(PatchyDipole(TiltedDipole::default()), &path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(restored.decimal_year(), model.decimal_year());
        assert_eq!(restored.grid(), model.grid());
        for (a, b) in [
            (model.declination(), restored.declination()),
            (model.inclination(), restored.inclination()),
            (model.intensity(), restored.intensity()),
            (model.orthogonality(), restored.orthogonality()),
        ] {
            let identical = a
                .as_slice()
                .iter()
                .zip(b.as_slice())
                .all(|(x, y)| x.to_bits() == y.to_bits());
            assert!(identical);
        }
        let gradients_identical = model
            .inclination_gradient()
            .as_slice()
            .iter()
            .chain(model.intensity_gradient().as_slice())
            .zip(
                restored
                    .inclination_gradient()
                    .as_slice()
                    .iter()
                    .chain(restored.intensity_gradient().as_slice()),
            )
            .all(|(x, y)| x[0].to_bits() == y[0].to_bits() && x[1].to_bits() == y[1].to_bits());
        assert!(gradients_identical);
    }

    #[test]
    fn missing_cache_file_is_an_io_error() {
        let err =
            MagneticModel::load_cache(TiltedDipole::default(), Path::new("/nonexistent/blob"))
                .unwrap_err();
        assert!(matches!(err, CacheError::Io(_)));
    }
}
