mod args;
mod output;

use std::collections::HashMap;
use std::fs;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use args::{Args, Command};
use gql_migrate_lib::config::{ConfidenceThresholds, NameDictionary, RunOptions, SchemaSource};
use gql_migrate_lib::{MigrationEngine, StrategyKind};

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let options = build_options(&args)?;

    if args.verbose {
        println!("Scanning path: {}", options.root.display());
        println!("Pattern: {}", args.pattern);
        println!("Strategy: {}", options.strategy);
    }

    let report = MigrationEngine::new(options).run()?;

    match &args.command {
        Command::Extract { json } => output::print_catalog(&report, *json),
        Command::Analyze { json } => output::print_analysis(&report, *json),
        Command::Migrate { json, .. } => output::print_report(&report, *json),
    }

    // Fatal applicator errors and gate rejections fail the run for CI hosts.
    let failed = report.has_fatal_incidents()
        || (matches!(args.command, Command::Migrate { .. }) && report.summary.rejected_by_gate > 0);
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn build_options(args: &Args) -> Result<RunOptions> {
    let strategy: StrategyKind = args.strategy.parse()?;

    let mut name_dictionary = NameDictionary::new();
    if let Some(path) = &args.name_dict {
        let text = fs::read_to_string(path)?;
        let entries: HashMap<String, String> = serde_json::from_str(&text)?;
        for (key, value) in entries {
            name_dictionary.register(key, value);
        }
    }

    let mut options = RunOptions {
        root: args.path.clone(),
        include: vec![args.pattern.clone()],
        ignore: vec![args.ignore.clone()],
        schema: args.schema.as_ref().map(|p| SchemaSource::Path(p.clone())),
        strategy,
        name_dictionary,
        concurrency: args.concurrency,
        preserve_source_positions: args.preserve_source_positions,
        verbose: args.verbose,
        ..RunOptions::default()
    };

    if let Command::Migrate {
        dry_run,
        min_confidence,
        automatic_threshold,
        semi_automatic_threshold,
        resolve_fragments,
        validate,
        ..
    } = &args.command
    {
        options.dry_run = *dry_run;
        options.min_confidence = *min_confidence;
        options.thresholds = ConfidenceThresholds {
            automatic: *automatic_threshold,
            semi_automatic: *semi_automatic_threshold,
        };
        options.resolve_fragments = *resolve_fragments;
        options.validate_against_schema = *validate;
    } else {
        // Extraction and analysis never touch files.
        options.dry_run = true;
    }

    Ok(options)
}
