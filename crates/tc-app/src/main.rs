use anyhow::Result;
use clap::Parser;
use tc_classify::evaluate::RenderOptions;
use tc_core::config::Method;

pub mod cache;
pub mod cli;
pub mod pipeline;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config, puis appliquer les overrides CLI
    let mut config = pipeline::resolve_config(&cli.config)?;
    if let Some(index) = cli.method {
        config.ensemble.method = Method::from_index(index)?;
    }

    let options = pipeline::RunOptions {
        profile: cli.profile,
        retrain: cli.classification,
        share_boundary: cli.share_boundary,
    };

    // 4. Profilage → modèles → classification → scores
    let report = pipeline::run(&config, &options)?;

    let matrix = cli.matrix.then(|| RenderOptions {
        hide_zeroes: cli.hide_zeroes,
        hide_diagonal: cli.hide_diagonal,
        hide_threshold: cli.hide_threshold,
    });
    pipeline::print_report(&report, matrix.as_ref());

    if let Some(path) = cli.report.as_deref() {
        report.write_json(path)?;
        log::info!("Rapport JSON : {}", path.display());
    }

    Ok(())
}
