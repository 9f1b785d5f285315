use std::{error::Error, fmt};

/// One evaluation of the geomagnetic field at a point.
///
/// Angles are in degrees, intensities in microtesla. Evaluators that work
/// natively in nanotesla must divide by 1000 before returning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldSample {
    /// Angle between magnetic north and true north, degrees.
    pub declination: f64,
    /// Angle of the field vector below the horizontal plane, degrees.
    pub inclination: f64,
    /// Magnitude of the full 3D field vector, microtesla.
    pub total_intensity: f64,
    pub horizontal_intensity: f64,
    pub north: f64,
    pub east: f64,
    pub vertical: f64,
}

/// The (D, I, F) subset the navigator caches per position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldTriple {
    pub declination: f64,
    pub inclination: f64,
    pub total_intensity: f64,
}

impl From<FieldSample> for FieldTriple {
    fn from(sample: FieldSample) -> Self {
        FieldTriple {
            declination: sample.declination,
            inclination: sample.inclination,
            total_intensity: sample.total_intensity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// The evaluator cannot produce a field value at this coordinate.
    OutOfDomain { lat: f64, lon: f64 },
    /// The underlying field model failed for reasons other than the coordinate.
    Model(String),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationError::OutOfDomain { lat, lon } => {
                write!(f, "field undefined at latitude {lat}, longitude {lon}")
            }
            EvaluationError::Model(msg) => write!(f, "field model failure: {msg}"),
        }
    }
}

impl Error for EvaluationError {}

/// Contract for the external geomagnetic field model.
///
/// Implementations must be safe to call from multiple threads at once; bulk
/// sampling fans evaluations out across a thread pool. An implementation
/// wrapping a non-reentrant model should hold a pool of instances internally.
pub trait FieldEvaluator: Sync {
    fn evaluate(
        &self,
        lat: f64,
        lon: f64,
        altitude_m: f64,
        decimal_year: f64,
    ) -> Result<FieldSample, EvaluationError>;
}

impl<T: FieldEvaluator + ?Sized> FieldEvaluator for &T {
    fn evaluate(
        &self,
        lat: f64,
        lon: f64,
        altitude_m: f64,
        decimal_year: f64,
    ) -> Result<FieldSample, EvaluationError> {
        (**self).evaluate(lat, lon, altitude_m, decimal_year)
    }
}
