use crate::field::{EvaluationError, FieldEvaluator, FieldSample};

/// Mean Earth radius used by the dipole model, meters.
pub const EARTH_RADIUS_M: f64 = 6_371_200.0;

/// Built-in analytic field: a dipole tilted toward the geomagnetic north
/// pole. Stands in for the external field-model service in the CLI and in
/// tests; it reproduces the gross structure of the real field (inclination
/// from -90° to 90°, intensity roughly doubling from equator to poles) but
/// none of its regional anomalies.
///
/// The field is computed in nanotesla and converted to microtesla at the
/// [`FieldEvaluator`] boundary.
#[derive(Clone, Copy, Debug)]
pub struct TiltedDipole {
    pole_lat: f64,
    pole_lon: f64,
    /// Equatorial surface strength, nanotesla.
    surface_strength_nt: f64,
}

impl Default for TiltedDipole {
    /// Dipole aligned with the 2020 geomagnetic north pole.
    fn default() -> Self {
        TiltedDipole {
            pole_lat: 80.65,
            pole_lon: -72.68,
            surface_strength_nt: 29_870.0,
        }
    }
}

impl TiltedDipole {
    pub fn new(pole_lat: f64, pole_lon: f64, surface_strength_nt: f64) -> Self {
        TiltedDipole {
            pole_lat,
            pole_lon,
            surface_strength_nt,
        }
    }

    /// Untilted dipole on the rotation axis. Declination is zero everywhere,
    /// which makes analytic expectations exact in tests.
    pub fn axial() -> Self {
        TiltedDipole {
            pole_lat: 90.0,
            pole_lon: 0.0,
            surface_strength_nt: 29_870.0,
        }
    }
}

fn unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [
        lat.cos() * lon.cos(),
        lat.cos() * lon.sin(),
        lat.sin(),
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

impl FieldEvaluator for TiltedDipole {
    fn evaluate(
        &self,
        lat: f64,
        lon: f64,
        altitude_m: f64,
        _decimal_year: f64,
    ) -> Result<FieldSample, EvaluationError> {
        // The dipole is static in time, so the decimal year is accepted and
        // ignored.
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 {
            return Err(EvaluationError::OutOfDomain { lat, lon });
        }
        if !altitude_m.is_finite() || altitude_m <= -EARTH_RADIUS_M {
            return Err(EvaluationError::OutOfDomain { lat, lon });
        }

        let r_hat = unit_vector(lat, lon);
        // Moment points toward the geomagnetic south pole so field lines
        // enter the northern hemisphere (positive inclination in the north).
        let pole = unit_vector(self.pole_lat, self.pole_lon);
        let m_hat = [-pole[0], -pole[1], -pole[2]];

        let scale = self.surface_strength_nt
            * (EARTH_RADIUS_M / (EARTH_RADIUS_M + altitude_m)).powi(3);
        let mr = dot(m_hat, r_hat);
        let b = [
            scale * (3.0 * mr * r_hat[0] - m_hat[0]),
            scale * (3.0 * mr * r_hat[1] - m_hat[1]),
            scale * (3.0 * mr * r_hat[2] - m_hat[2]),
        ];

        // Local NED frame at the evaluation point.
        let (lat_r, lon_r) = (lat.to_radians(), lon.to_radians());
        let north_hat = [
            -lat_r.sin() * lon_r.cos(),
            -lat_r.sin() * lon_r.sin(),
            lat_r.cos(),
        ];
        let east_hat = [-lon_r.sin(), lon_r.cos(), 0.0];
        let down_hat = [-r_hat[0], -r_hat[1], -r_hat[2]];

        let x = dot(b, north_hat);
        let y = dot(b, east_hat);
        let z = dot(b, down_hat);
        let h = x.hypot(y);
        let f = h.hypot(z);

        Ok(FieldSample {
            declination: y.atan2(x).to_degrees(),
            inclination: z.atan2(h).to_degrees(),
            total_intensity: f / 1000.0,
            horizontal_intensity: h / 1000.0,
            north: x / 1000.0,
            east: y / 1000.0,
            vertical: z / 1000.0,
        })
    }
}
