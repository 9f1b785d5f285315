use crate::field::FieldEvaluator;
use crate::model::SAMPLE_ALTITUDE_M;
use serde::{Deserialize, Serialize};

/// Termination settings for the coordinate search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Absolute tolerance on the simplex spread in parameter space.
    pub xatol: f64,
    /// Absolute tolerance on the cost spread across the simplex.
    pub fatol: f64,
    pub max_iters: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            xatol: 1e-16,
            fatol: 1e-16,
            max_iters: 10_000,
        }
    }
}

/// Best coordinate found for a target (intensity, inclination) pair.
///
/// `converged` is false when the iteration budget ran out first; the
/// estimate is still the best one seen and callers decide whether that is
/// good enough. Coordinates are not clamped to physical ranges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub lat: f64,
    pub lon: f64,
    /// Final squared field-value error.
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Invert the field: find a (lat, lon) whose total intensity and inclination
/// match the targets, by Nelder-Mead minimization of the squared error
/// seeded at (lat0, lon0).
///
/// The search is unconstrained; a poor initial guess can converge to an
/// out-of-range or non-physical coordinate. Probe points the evaluator
/// rejects cost infinity, which steers the simplex back without aborting
/// the solve.
pub fn find_coordinates<E: FieldEvaluator + ?Sized>(
    evaluator: &E,
    decimal_year: f64,
    target_intensity: f64,
    target_inclination: f64,
    lat0: f64,
    lon0: f64,
    options: &SolverOptions,
) -> SolveResult {
    let cost = |p: [f64; 2]| -> f64 {
        match evaluator.evaluate(p[0], p[1], SAMPLE_ALTITUDE_M, decimal_year) {
            Ok(s) => {
                (s.total_intensity - target_intensity).powi(2)
                    + (s.inclination - target_inclination).powi(2)
            }
            Err(_) => f64::INFINITY,
        }
    };
    nelder_mead(cost, [lat0, lon0], options)
}

// Standard reflection/expansion/contraction/shrink coefficients.
const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

// Initial simplex displacement: 5% of each nonzero coordinate, a small
// absolute offset for zero coordinates.
const NONZERO_DELTA: f64 = 0.05;
const ZERO_DELTA: f64 = 0.00025;

fn nelder_mead<F: Fn([f64; 2]) -> f64>(
    cost: F,
    seed: [f64; 2],
    options: &SolverOptions,
) -> SolveResult {
    let mut simplex = [seed, seed, seed];
    for dim in 0..2 {
        if seed[dim] != 0.0 {
            simplex[dim + 1][dim] *= 1.0 + NONZERO_DELTA;
        } else {
            simplex[dim + 1][dim] = ZERO_DELTA;
        }
    }
    let mut costs = simplex.map(&cost);

    let mut iterations = 0;
    let mut converged = false;
    while iterations < options.max_iters {
        sort_simplex(&mut simplex, &mut costs);
        if spread(&simplex) <= options.xatol && cost_spread(&costs) <= options.fatol {
            converged = true;
            break;
        }
        iterations += 1;

        // Centroid of all vertices but the worst.
        let centroid = [
            (simplex[0][0] + simplex[1][0]) / 2.0,
            (simplex[0][1] + simplex[1][1]) / 2.0,
        ];
        let worst = simplex[2];
        let reflected = blend(centroid, worst, -REFLECT);
        let reflected_cost = cost(reflected);

        if reflected_cost < costs[0] {
            let expanded = blend(centroid, worst, -REFLECT * EXPAND);
            let expanded_cost = cost(expanded);
            if expanded_cost < reflected_cost {
                simplex[2] = expanded;
                costs[2] = expanded_cost;
            } else {
                simplex[2] = reflected;
                costs[2] = reflected_cost;
            }
        } else if reflected_cost < costs[1] {
            simplex[2] = reflected;
            costs[2] = reflected_cost;
        } else {
            // Contract toward the better of the worst vertex and its reflection.
            let outside = reflected_cost < costs[2];
            let contracted = if outside {
                blend(centroid, worst, -REFLECT * CONTRACT)
            } else {
                blend(centroid, worst, CONTRACT)
            };
            let contracted_cost = cost(contracted);
            let accept = if outside {
                contracted_cost <= reflected_cost
            } else {
                contracted_cost < costs[2]
            };
            if accept {
                simplex[2] = contracted;
                costs[2] = contracted_cost;
            } else {
                // Shrink everything toward the best vertex.
                for v in 1..3 {
                    for dim in 0..2 {
                        simplex[v][dim] =
                            simplex[0][dim] + SHRINK * (simplex[v][dim] - simplex[0][dim]);
                    }
                    costs[v] = cost(simplex[v]);
                }
            }
        }
    }

    sort_simplex(&mut simplex, &mut costs);
    SolveResult {
        lat: simplex[0][0],
        lon: simplex[0][1],
        cost: costs[0],
        iterations,
        converged,
    }
}

fn sort_simplex(simplex: &mut [[f64; 2]; 3], costs: &mut [f64; 3]) {
    // Total order so NaN costs sort after +inf instead of poisoning the sort.
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]));
    *simplex = [simplex[order[0]], simplex[order[1]], simplex[order[2]]];
    *costs = [costs[order[0]], costs[order[1]], costs[order[2]]];
}

/// Point at `centroid + t * (vertex - centroid)`.
fn blend(centroid: [f64; 2], vertex: [f64; 2], t: f64) -> [f64; 2] {
    [
        centroid[0] + t * (vertex[0] - centroid[0]),
        centroid[1] + t * (vertex[1] - centroid[1]),
    ]
}

fn spread(simplex: &[[f64; 2]; 3]) -> f64 {
    let mut max = 0.0f64;
    for v in &simplex[1..] {
        for dim in 0..2 {
            max = max.max((v[dim] - simplex[0][dim]).abs());
        }
    }
    max
}

fn cost_spread(costs: &[f64; 3]) -> f64 {
    (costs[1] - costs[0]).abs().max((costs[2] - costs[0]).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dipole::TiltedDipole;
    use crate::field::FieldEvaluator;

    #[test]
    fn recovers_quadratic_minimum() {
        let result = nelder_mead(
            |p| (p[0] - 3.0).powi(2) + (p[1] + 1.5).powi(2),
            [0.0, 0.0],
            &SolverOptions::default(),
        );
        assert!(result.converged);
        assert!((result.lat - 3.0).abs() < 1e-6);
        assert!((result.lon + 1.5).abs() < 1e-6);
    }

    #[test]
    fn inverts_field_near_a_known_point() {
        let dipole = TiltedDipole::default();
        let truth = dipole.evaluate(-7.9, -14.4, 0.0, 2020.0).unwrap();
        let result = find_coordinates(
            &dipole,
            2020.0,
            truth.total_intensity,
            truth.inclination,
            -10.0,
            -17.0,
            &SolverOptions::default(),
        );
        assert!(result.cost < 1e-10);
        // The inverse is a contour intersection, so the recovered point must
        // reproduce the target field values even if it sits elsewhere on the
        // same contour pair.
        let found = dipole.evaluate(result.lat, result.lon, 0.0, 2020.0).unwrap();
        assert!((found.total_intensity - truth.total_intensity).abs() < 1e-4);
        assert!((found.inclination - truth.inclination).abs() < 1e-4);
    }

    #[test]
    fn iteration_budget_yields_best_effort() {
        let options = SolverOptions {
            max_iters: 3,
            ..SolverOptions::default()
        };
        let result = nelder_mead(
            |p| (p[0] - 3.0).powi(2) + (p[1] + 1.5).powi(2),
            [50.0, 50.0],
            &options,
        );
        assert!(!result.converged);
        assert_eq!(result.iterations, 3);
        assert!(result.cost.is_finite());
    }

    #[test]
    fn nan_costs_rank_below_every_number() {
        // A cost surface with a NaN pocket next to the minimum: the simplex
        // must keep ordering consistently and settle on the finite valley.
        let result = nelder_mead(
            |p| {
                if p[0] > 3.5 {
                    f64::NAN
                } else {
                    (p[0] - 3.0).powi(2) + (p[1] + 1.5).powi(2)
                }
            },
            [2.0, 0.0],
            &SolverOptions::default(),
        );
        assert!(result.cost.is_finite());
        assert!((result.lat - 3.0).abs() < 1e-6);
        assert!((result.lon + 1.5).abs() < 1e-6);
    }

    #[test]
    fn rejected_probes_do_not_abort_the_solve() {
        // Seed close to the domain edge; the simplex will probe |lat| > 90.
        let dipole = TiltedDipole::default();
        let truth = dipole.evaluate(85.0, 0.0, 0.0, 2020.0).unwrap();
        let result = find_coordinates(
            &dipole,
            2020.0,
            truth.total_intensity,
            truth.inclination,
            89.9,
            1.0,
            &SolverOptions::default(),
        );
        assert!(result.cost.is_finite());
    }
}
