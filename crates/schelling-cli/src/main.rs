use anyhow::Context;
use clap::Parser;
use schelling_core::{GridPopulation, RunState, SimConfig, SimulationDriver};
use schelling_render::{render_snapshot, RenderOptions};
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "schelling")]
#[command(about = "Schelling segregation model on a rectangular grid")]
#[command(version)]
struct Cli {
    /// Grid width in cells
    #[arg(long, default_value_t = 20)]
    width: u32,

    /// Grid height in cells
    #[arg(long, default_value_t = 20)]
    height: u32,

    /// Fraction of cells left vacant, in [0, 1)
    #[arg(long, default_value_t = 0.3)]
    empty_ratio: f64,

    /// Smallest tolerated fraction of same-category neighbors, in [0, 1]
    #[arg(long, default_value_t = 0.3)]
    similarity_threshold: f64,

    /// Number of agent categories (1 through 7 render distinctly)
    #[arg(long, default_value_t = 2)]
    categories: u32,

    /// Iteration budget
    #[arg(long, default_value_t = 100)]
    iterations: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Directory for the rendered before/after images
    #[arg(long, default_value = "tmp")]
    out_dir: PathBuf,

    /// Pixels drawn per grid cell
    #[arg(long, default_value_t = 8)]
    cell_scale: u32,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> SimConfig {
        SimConfig {
            width: self.width,
            height: self.height,
            empty_ratio: self.empty_ratio,
            similarity_threshold: self.similarity_threshold,
            nr_categories: self.categories,
            max_iterations: self.iterations,
            seed: self.seed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = cli.config();
    config.validate().context("invalid configuration")?;
    log::info!(
        "{}x{} grid, empty ratio {}, threshold {}, {} categories, seed {}",
        config.width,
        config.height,
        config.empty_ratio,
        config.similarity_threshold,
        config.nr_categories,
        config.seed
    );

    let options = RenderOptions {
        cell_scale: cli.cell_scale,
        output_dir: cli.out_dir.clone(),
        ..RenderOptions::default()
    };
    let threshold_pct = (config.similarity_threshold * 100.0).round() as u32;
    let stem = format!("schelling_{}x{}_t{threshold_pct}", config.width, config.height);

    let mut rng = config.rng();
    let mut population =
        GridPopulation::try_new(&config, &mut rng).context("failed to populate the grid")?;

    let initial = render_snapshot(
        &population.snapshot(),
        &format!(
            "Schelling model ({} categories): initial state",
            config.nr_categories
        ),
        &format!("{stem}_initial"),
        &options,
    )
    .context("failed to render the initial state")?;
    log::info!("initial state written to {}", initial.path.display());

    let driver = SimulationDriver::new(config.max_iterations);
    let summary = driver
        .try_run_with_observer(&mut population, &mut rng, |report| {
            println!(
                "iteration {}/{}: {} changes",
                report.index, config.max_iterations, report.changes
            );
        })
        .context("simulation failed")?;

    let outcome = match summary.state {
        RunState::Converged => "converged",
        RunState::Exhausted => "iteration budget exhausted",
        RunState::Running => unreachable!("driver summaries are never Running"),
    };
    println!(
        "{outcome} after {} iterations: {} relocations, {}/{} agents satisfied, similarity {:.3}",
        summary.iterations_run(),
        summary.total_relocations,
        summary.final_satisfied,
        population.occupied_count(),
        summary.final_similarity
    );

    let final_render = render_snapshot(
        &population.snapshot(),
        &format!(
            "Schelling model ({} categories): final state, threshold {threshold_pct}%",
            config.nr_categories
        ),
        &format!("{stem}_final"),
        &options,
    )
    .context("failed to render the final state")?;
    log::info!("final state written to {}", final_render.path.display());

    if let Some(path) = &cli.summary {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &summary).context("failed to write the run summary")?;
        log::info!("run summary written to {}", path.display());
    }

    Ok(())
}
