use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rom_app::{AppError, AppResult, evaluate_store, load_config, load_model, write_report};
use rom_core::BasisKey;
use rom_results::BasisStore;
use tracing::info;

#[derive(Parser)]
#[command(name = "rom-cli")]
#[command(about = "Projection-based model-order reduction toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a sweep config and the model it points to
    Validate {
        /// Path to the sweep YAML file
        config_path: PathBuf,
    },
    /// Compute and store a basis for every configured strategy and rank
    Sweep {
        /// Path to the sweep YAML file
        config_path: PathBuf,
        /// Write the sweep report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Evaluate the stored bases of a sweep
    Evaluate {
        /// Path to the sweep YAML file
        config_path: PathBuf,
        /// Only evaluate this strategy
        #[arg(short, long)]
        strategy: Option<String>,
        /// Write the evaluation report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored bases
    List {
        /// Basis store directory
        store_dir: PathBuf,
        /// Only list this strategy
        #[arg(short, long)]
        strategy: Option<String>,
    },
    /// Delete one stored basis, e.g. `pod_rank_4`
    Delete {
        /// Basis store directory
        store_dir: PathBuf,
        /// Record key `<strategy>_rank_<r>`
        key: String,
    },
    /// Print the singular values of a model's snapshot matrix
    Spectrum {
        /// Path to the model JSON file
        model_path: PathBuf,
        /// Print only the leading values
        #[arg(long)]
        top: Option<usize>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Sweep {
            config_path,
            report,
        } => cmd_sweep(&config_path, report.as_deref()),
        Commands::Evaluate {
            config_path,
            strategy,
            output,
        } => cmd_evaluate(&config_path, strategy.as_deref(), output.as_deref()),
        Commands::List {
            store_dir,
            strategy,
        } => cmd_list(store_dir, strategy.as_deref()),
        Commands::Delete { store_dir, key } => cmd_delete(store_dir, &key),
        Commands::Spectrum { model_path, top } => cmd_spectrum(&model_path, top),
    }
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating sweep config: {}", config_path.display());
    let config = load_config(config_path)?;
    let model = load_model(&config.model)?;
    println!("✓ Config is valid");
    println!(
        "  Model: nx = {}, nu = {}, ny = {}, {} snapshots",
        model.system.nx(),
        model.system.nu(),
        model.system.ny(),
        model.snapshots.ns()
    );
    println!(
        "  {} strategies x {} ranks",
        config.strategies.len(),
        config.ranks.len()
    );
    Ok(())
}

fn cmd_sweep(config_path: &Path, report_path: Option<&Path>) -> AppResult<()> {
    let config = load_config(config_path)?;
    let model = load_model(&config.model)?;
    let store = BasisStore::new(config.output_dir.clone())?;
    let total = config.strategies.len() * config.ranks.len();
    println!(
        "Sweeping {} jobs into {}",
        total,
        config.output_dir.display()
    );

    let started = Instant::now();
    let done = AtomicUsize::new(0);
    let report = rom_app::run_sweep_with_progress(&config, &model, &store, &|entry| {
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        match &entry.error {
            None => println!(
                "  [{}/{}] {} ({:.3} s)",
                n,
                total,
                entry.key,
                entry.compute_time_s.unwrap_or(f64::NAN)
            ),
            Some(e) => println!("  [{}/{}] {} failed: {}", n, total, entry.key, e),
        }
    })?;
    info!(elapsed_s = started.elapsed().as_secs_f64(), "sweep complete");

    let failed = report.failures().count();
    if failed == 0 {
        println!("✓ Stored {} bases", report.entries.len());
    } else {
        println!(
            "Stored {} bases, {} failed",
            report.entries.len() - failed,
            failed
        );
    }

    if let Some(path) = report_path {
        write_report(path, &report)?;
        println!("  Report: {}", path.display());
    }
    Ok(())
}

fn fmt_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.6e}", v))
}

fn cmd_evaluate(
    config_path: &Path,
    strategy: Option<&str>,
    output: Option<&Path>,
) -> AppResult<()> {
    let config = load_config(config_path)?;
    let model = load_model(&config.model)?;
    let store = BasisStore::new(config.output_dir.clone())?;
    let report = evaluate_store(&store, &model, strategy)?;

    if report.rows.is_empty() {
        println!("No stored bases found in {}", config.output_dir.display());
        return Ok(());
    }

    println!(
        "{:<28} {:>14} {:>14} {:>14} {:>10}",
        "record", "weighted", "unweighted", "reduction", "time [s]"
    );
    for row in &report.rows {
        match &row.error {
            None => println!(
                "{:<28} {:>14} {:>14} {:>14} {:>10}",
                row.key.to_string(),
                fmt_metric(row.weighted_error),
                fmt_metric(row.unweighted_error),
                fmt_metric(row.reduction_error),
                row.compute_time_s
                    .map_or_else(|| "-".to_string(), |t| format!("{:.3}", t)),
            ),
            Some(e) => println!("{:<28} error: {}", row.key.to_string(), e),
        }
    }

    if let Some(path) = output {
        write_report(path, &report)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn cmd_list(store_dir: PathBuf, strategy: Option<&str>) -> AppResult<()> {
    let store = BasisStore::new(store_dir)?;
    let summaries = store.list_summaries(strategy)?;

    if summaries.is_empty() {
        println!("No stored bases found");
    } else {
        println!("Stored bases:");
        for s in summaries {
            println!(
                "  {} - nx = {}, created {}{}",
                s.key,
                s.nx,
                s.created_at,
                s.compute_time_s
                    .map(|t| format!(", {:.3} s", t))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn cmd_delete(store_dir: PathBuf, key: &str) -> AppResult<()> {
    let key = BasisKey::parse(key)?;
    let store = BasisStore::new(store_dir)?;
    if !store.has_record(&key) {
        return Err(AppError::RecordNotFound(key.to_string()));
    }
    store.delete(&key)?;
    println!("✓ Deleted {}", key);
    Ok(())
}

fn cmd_spectrum(model_path: &Path, top: Option<usize>) -> AppResult<()> {
    let model = load_model(model_path)?;
    let spectrum = model.spectrum()?;
    let total: f64 = spectrum.iter().map(|s| s * s).sum();

    println!("{:>5} {:>16} {:>12}", "k", "sigma_k", "energy");
    let mut captured = 0.0;
    for (k, s) in spectrum.iter().take(top.unwrap_or(spectrum.len())).enumerate() {
        captured += s * s;
        let energy = if total > 0.0 { captured / total } else { 1.0 };
        println!("{:>5} {:>16.8e} {:>12.6}", k + 1, s, energy);
    }
    Ok(())
}
