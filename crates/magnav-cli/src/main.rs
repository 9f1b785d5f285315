use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use magnav_core::dipole::TiltedDipole;
use magnav_core::{
    bearing, find_coordinates, steering_sweep, to_decimal_year, GeoPoint, MagneticModel,
    ModelConfig, Navigator, NavigatorConfig, SolverOptions, SteeringMatrix,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Geomagnetic navigation simulator over the built-in tilted-dipole field.
/// Plug a real field model in through the library's FieldEvaluator trait.
#[derive(Parser)]
#[command(name = "magnav", version)]
struct Cli {
    /// Evaluation date, "YYYY-MM-DD".
    #[arg(long, global = true)]
    date: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sample the field over the whole globe and write a binary grid cache.
    Sample {
        /// Grid resolution in degrees.
        #[arg(long, default_value_t = 1.0)]
        resolution: f64,
        /// Cache file to write.
        #[arg(long)]
        output: PathBuf,
    },
    /// Integrate an agent trajectory and print it as JSON.
    Run {
        /// Start latitude (default: Réunion).
        #[arg(long, default_value_t = -21.115141, allow_hyphen_values = true)]
        start_lat: f64,
        #[arg(long, default_value_t = 55.536384, allow_hyphen_values = true)]
        start_lon: f64,
        /// Goal latitude (default: Oman).
        #[arg(long, default_value_t = 17.7, allow_hyphen_values = true)]
        goal_lat: f64,
        #[arg(long, default_value_t = 56.3, allow_hyphen_values = true)]
        goal_lon: f64,
        /// Steering matrix entries, row-major: a b c d.
        #[arg(long, num_args = 4, allow_hyphen_values = true, default_values_t = [1.0, 0.0, 0.0, 1.0])]
        steering: Vec<f64>,
        /// Steer relative to magnetic north instead of true north.
        #[arg(long)]
        magnetic_north: bool,
        #[arg(long, default_value_t = 0.1)]
        max_speed: f64,
        #[arg(long, default_value_t = 1.0)]
        time_step: f64,
        #[arg(long, default_value_t = 10_000)]
        max_steps: usize,
    },
    /// Classify every integer steering matrix at one coordinate and export
    /// the results as CSV.
    Sweep {
        #[arg(long, default_value_t = 17.7, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, default_value_t = 56.3, allow_hyphen_values = true)]
        lon: f64,
        /// Lowest matrix entry, inclusive.
        #[arg(long, default_value_t = -10, allow_hyphen_values = true)]
        min: i32,
        /// Highest matrix entry, exclusive.
        #[arg(long, default_value_t = 10, allow_hyphen_values = true)]
        max: i32,
        #[arg(long)]
        output: PathBuf,
    },
    /// Find coordinates whose field matches a target intensity/inclination.
    Solve {
        #[arg(long, allow_hyphen_values = true)]
        intensity: f64,
        #[arg(long, allow_hyphen_values = true)]
        inclination: f64,
        /// Initial guess; the search is local and unconstrained.
        #[arg(long, allow_hyphen_values = true)]
        lat0: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon0: f64,
    },
}

#[derive(Serialize)]
struct TrajectoryReport {
    outcome: String,
    steps_taken: usize,
    initial_bearing_deg: f64,
    trajectory: Vec<GeoPoint>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let decimal_year = to_decimal_year(cli.date.as_deref().unwrap_or("2020-01-01"))?;
    let dipole = TiltedDipole::default();

    match cli.command {
        Command::Sample { resolution, output } => {
            let config = ModelConfig {
                resolution,
                date: cli.date.clone(),
                ..ModelConfig::default()
            };
            info!(resolution, "sampling the field over the full grid");
            let model = MagneticModel::build(dipole, &config)?;
            model
                .save_cache(&output)
                .with_context(|| format!("writing cache to {}", output.display()))?;
            let undefined = model
                .intensity()
                .as_slice()
                .iter()
                .filter(|v| v.is_nan())
                .count();
            println!(
                "sampled {} x {} nodes at {}° ({} undefined), cache: {}",
                model.grid().n_lat(),
                model.grid().n_lon(),
                resolution,
                undefined,
                output.display()
            );
        }
        Command::Run {
            start_lat,
            start_lon,
            goal_lat,
            goal_lon,
            steering,
            magnetic_north,
            max_speed,
            time_step,
            max_steps,
        } => {
            let &[a, b, c, d] = steering.as_slice() else {
                bail!("--steering takes exactly four values");
            };
            let config = NavigatorConfig {
                steering: SteeringMatrix::new(a, b, c, d),
                magnetic_north_frame: magnetic_north,
                max_speed,
                time_step,
            };
            let mut nav = Navigator::new(
                &dipole,
                decimal_year,
                GeoPoint::new(start_lat, start_lon),
                GeoPoint::new(goal_lat, goal_lon),
                config,
            )?;
            let initial_bearing_deg = bearing(nav.velocity_from_state());
            info!(start_lat, start_lon, goal_lat, goal_lon, "integrating trajectory");
            let report = nav.run(max_steps)?;
            let out = TrajectoryReport {
                outcome: format!("{:?}", report.outcome),
                steps_taken: report.steps_taken,
                initial_bearing_deg,
                trajectory: nav.trajectory().to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Sweep {
            lat,
            lon,
            min,
            max,
            output,
        } => {
            if min >= max {
                bail!("sweep range is empty: {min}..{max}");
            }
            info!(lat, lon, min, max, "classifying integer steering matrices");
            let records = steering_sweep(&dipole, decimal_year, lat, lon, min..max)?;
            let mut writer = BufWriter::new(
                File::create(&output)
                    .with_context(|| format!("creating {}", output.display()))?,
            );
            writeln!(writer, "a,b,c,d,df_dlon,df_dlat,di_dlon,di_dlat,stability")?;
            for r in &records {
                writeln!(
                    writer,
                    "{},{},{},{},{},{},{},{},{}",
                    r.a, r.b, r.c, r.d, r.df_dlon, r.df_dlat, r.di_dlon, r.di_dlat, r.stability
                )?;
            }
            println!("{} sweep rows written to {}", records.len(), output.display());
        }
        Command::Solve {
            intensity,
            inclination,
            lat0,
            lon0,
        } => {
            let result = find_coordinates(
                &dipole,
                decimal_year,
                intensity,
                inclination,
                lat0,
                lon0,
                &SolverOptions::default(),
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}
