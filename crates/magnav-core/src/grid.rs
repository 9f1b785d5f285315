use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Regular latitude/longitude sample grid with inclusive endpoints.
///
/// Latitudes span [-90, 90] and longitudes [-180, 180] at a uniform step
/// equal to the configured resolution. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    resolution: f64,
}

impl Grid {
    pub fn new(resolution: f64) -> Result<Self, ConfigError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(ConfigError::NonPositiveResolution(resolution));
        }
        let n_lat = (180.0 / resolution).floor() as usize + 1;
        let n_lon = (360.0 / resolution).floor() as usize + 1;
        let latitudes = (0..n_lat).map(|i| -90.0 + i as f64 * resolution).collect();
        let longitudes = (0..n_lon)
            .map(|j| -180.0 + j as f64 * resolution)
            .collect();
        Ok(Grid {
            latitudes,
            longitudes,
            resolution,
        })
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn n_lat(&self) -> usize {
        self.latitudes.len()
    }

    pub fn n_lon(&self) -> usize {
        self.longitudes.len()
    }

    pub fn n_nodes(&self) -> usize {
        self.n_lat() * self.n_lon()
    }

    /// Coordinates of the node at (latitude index, longitude index).
    pub fn node(&self, i: usize, j: usize) -> (f64, f64) {
        (self.latitudes[i], self.longitudes[j])
    }

    /// Split a flattened row-major node index into (lat index, lon index).
    pub fn unflatten(&self, k: usize) -> (usize, usize) {
        (k / self.n_lon(), k % self.n_lon())
    }
}

/// Dense row-major table of one scalar per grid node. NaN marks nodes the
/// evaluator could not populate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarGrid {
    n_lat: usize,
    n_lon: usize,
    data: Vec<f64>,
}

impl ScalarGrid {
    pub(crate) fn from_data(n_lat: usize, n_lon: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), n_lat * n_lon, "scalar grid shape mismatch");
        ScalarGrid { n_lat, n_lon, data }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n_lon + j]
    }

    pub fn n_lat(&self) -> usize {
        self.n_lat
    }

    pub fn n_lon(&self) -> usize {
        self.n_lon
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Dense row-major table of one (x, y) vector per grid node, where x is the
/// longitude component and y the latitude component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorGrid {
    n_lat: usize,
    n_lon: usize,
    data: Vec<[f64; 2]>,
}

impl VectorGrid {
    pub(crate) fn from_data(n_lat: usize, n_lon: usize, data: Vec<[f64; 2]>) -> Self {
        assert_eq!(data.len(), n_lat * n_lon, "vector grid shape mismatch");
        VectorGrid { n_lat, n_lon, data }
    }

    pub fn get(&self, i: usize, j: usize) -> [f64; 2] {
        self.data[i * self.n_lon + j]
    }

    pub fn n_lat(&self) -> usize {
        self.n_lat
    }

    pub fn n_lon(&self) -> usize {
        self.n_lon
    }

    pub fn as_slice(&self) -> &[[f64; 2]] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_grid_has_standard_shape() {
        let grid = Grid::new(1.0).unwrap();
        assert_eq!(grid.n_lat(), 181);
        assert_eq!(grid.n_lon(), 361);
        assert_eq!(grid.latitudes()[0], -90.0);
        assert_eq!(*grid.latitudes().last().unwrap(), 90.0);
        assert_eq!(grid.longitudes()[0], -180.0);
        assert_eq!(*grid.longitudes().last().unwrap(), 180.0);
    }

    #[test]
    fn coarse_grid_stays_inside_bounds() {
        let grid = Grid::new(45.0).unwrap();
        assert_eq!(grid.n_lat(), 5);
        assert_eq!(grid.n_lon(), 9);
        assert!(grid.latitudes().iter().all(|&lat| lat.abs() <= 90.0));
        assert!(grid.longitudes().iter().all(|&lon| lon.abs() <= 180.0));
    }

    #[test]
    fn samples_strictly_increase_with_uniform_step() {
        let grid = Grid::new(2.5).unwrap();
        for w in grid.latitudes().windows(2) {
            assert!((w[1] - w[0] - 2.5).abs() < 1e-12);
        }
        for w in grid.longitudes().windows(2) {
            assert!((w[1] - w[0] - 2.5).abs() < 1e-12);
        }
    }

    #[test]
    fn invalid_resolution_is_rejected() {
        assert!(Grid::new(0.0).is_err());
        assert!(Grid::new(-1.0).is_err());
        assert!(Grid::new(f64::NAN).is_err());
    }

    #[test]
    fn unflatten_round_trips() {
        let grid = Grid::new(30.0).unwrap();
        for k in 0..grid.n_nodes() {
            let (i, j) = grid.unflatten(k);
            assert_eq!(k, i * grid.n_lon() + j);
        }
    }
}
