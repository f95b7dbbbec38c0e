use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sigstream::application::dto::{DetectOptions, DetectionReport};
use sigstream::application::DetectContentUseCase;
use sigstream::domain::services::{CompilerOptions, DefinitionPolicy, SignatureCatalog};
use sigstream::infrastructure::catalog::load_catalog;

mod cli;

use cli::Cli;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let policy = if cli.lenient {
        DefinitionPolicy::Lenient
    } else {
        DefinitionPolicy::Strict
    };

    let catalog = load_catalog(&cli.catalogs, !cli.no_builtin, policy)
        .context("Failed to load signature catalog")?;

    if cli.list {
        print_catalog(&catalog);
        return Ok(ExitCode::SUCCESS);
    }

    let factory = catalog
        .compile(&CompilerOptions { policy })
        .context("Failed to compile signature catalog")?;

    let mut options = DetectOptions::new().with_chunk_size(cli.chunk_size);
    if let Some(limit) = cli.limit {
        options = options.with_scan_limit(limit);
    }
    for (key, value) in &cli.metadata {
        options = options.with_metadata(key, value);
    }
    if cli.trace {
        options = options.traced();
    }

    let use_case = DetectContentUseCase::new(factory, options);
    let stdin = Path::new("-");

    let files: Vec<_> = cli.paths.iter().filter(|p| *p != stdin).cloned().collect();
    let mut file_reports = use_case.detect_paths(&files).into_iter();

    let mut failed = false;
    for path in &cli.paths {
        let result = if path == stdin {
            use_case
                .detect_reader(io::stdin().lock())
                .map(|report| report.with_source("-"))
        } else {
            match file_reports.next() {
                Some(result) => result,
                None => continue,
            }
        };

        match result {
            Ok(report) => print_report(&report, cli.json)?,
            Err(e) => {
                failed = true;
                eprintln!("{}: {:#}", path.display(), e);
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &DetectionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn print_catalog(catalog: &SignatureCatalog) {
    for signature in catalog.iter() {
        let lineage: Vec<&str> = catalog
            .ancestors(signature.id())
            .into_iter()
            .map(|s| s.id())
            .collect();
        println!(
            "{:<16} {:<28} {}{}",
            signature.id(),
            signature.mimetype(),
            signature.title(),
            if signature.is_abstract() { " (abstract)" } else { "" },
        );
        if !lineage.is_empty() {
            println!("{:<16} is-a {}", "", lineage.join(" > "));
        }
    }
}
