//! The five-stage engine: Extract → Resolve → Analyze → Transform → Apply.
//!
//! One `RunOptions` value is the whole run context. Stages run left to right
//! on an explicit rayon pool; the catalog, fragment dictionary and rule set
//! are immutable once their producing stage finishes, so the later stages
//! read them lock-free from worker tasks.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::apply::{apply_file, FileOutcome};
use crate::catalog::{CatalogSnapshot, OperationCatalog};
use crate::config::{RunOptions, SchemaSource};
use crate::extraction::{extract_source, ExtractionCache, FileFinder};
use crate::resolve::{fragments, names};
use crate::schema::{parse_schema_text, DeprecationRuleSet, DeprecationSummary, SchemaIndex};
use crate::transform::{transform_operation, TransformContext};
use crate::types::{
    Category, FilePatch, Incident, IncidentKind, Operation, Severity, Transformation,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub operations: usize,
    pub fragments: usize,
    pub transformed: usize,
    pub automatic: usize,
    pub semi_automatic: usize,
    pub manual: usize,
    pub rejected_by_gate: usize,
    pub files_modified: usize,
    pub warnings: usize,
    pub errors: usize,
    pub fatal_errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub catalog: CatalogSnapshot,
    pub transformations: Vec<Transformation>,
    /// Below the minimum-confidence gate; reported, never applied.
    pub rejected: Vec<Transformation>,
    pub patches: Vec<FilePatch>,
    pub deprecations: Option<DeprecationSummary>,
    pub incidents: Vec<Incident>,
    pub summary: RunSummary,
}

impl MigrationReport {
    pub fn has_fatal_incidents(&self) -> bool {
        self.incidents.iter().any(|i| i.is_fatal())
    }
}

pub struct MigrationEngine {
    options: RunOptions,
}

impl MigrationEngine {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run the full pipeline. Configuration problems fail here, before any
    /// file is touched; everything downstream degrades to incidents.
    pub fn run(&self) -> Result<MigrationReport> {
        self.options.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.concurrency)
            .build()
            .context("failed to build worker pool")?;
        pool.install(|| self.run_pipeline())
    }

    fn run_pipeline(&self) -> Result<MigrationReport> {
        let options = &self.options;
        let mut incidents: Vec<Incident> = Vec::new();

        // Stage 1: extract. Discovery prunes ignored directories in a
        // parallel walk and hands back a sorted list; extraction itself fans
        // out over the pool.
        let finder = FileFinder::new(&options.include, &options.ignore)?;
        let files = finder.find_files_parallel(&options.root);
        if options.verbose {
            println!("Scanning {} files under {}", files.len(), options.root.display());
        }

        let catalog = OperationCatalog::new();
        let cache = ExtractionCache::new();
        let per_file_incidents: Vec<Vec<Incident>> = files
            .par_iter()
            .map(|file| match fs::read_to_string(file) {
                Ok(source) => {
                    let extraction = match cache.get(&source, options.strategy) {
                        Some(hit) => hit,
                        None => cache.put(
                            &source,
                            options.strategy,
                            Arc::new(extract_source(file, &source, options)),
                        ),
                    };
                    catalog.ingest(&extraction, &source)
                }
                Err(e) => vec![Incident::new(
                    IncidentKind::HostParse,
                    Severity::Error,
                    file,
                    "E_READ",
                    format!("failed to read file: {e}"),
                )],
            })
            .collect();
        incidents.extend(per_file_incidents.into_iter().flatten());

        // Stage 2: resolve names and stitch fragments (deterministic order).
        incidents.extend(names::resolve_names(&catalog, &options.name_dictionary));
        if options.resolve_fragments {
            incidents.extend(fragments::stitch_fragments(&catalog));
        }

        // Stage 3: analyze the target schema.
        let schema_document = match &options.schema {
            Some(SchemaSource::Text(text)) => Some(parse_schema_text(text)?),
            Some(SchemaSource::Path(path)) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read schema {}", path.display()))?;
                Some(parse_schema_text(&text)?)
            }
            None => None,
        };
        let rules = schema_document
            .as_ref()
            .map(DeprecationRuleSet::analyze)
            .unwrap_or_default();
        let schema_index = schema_document.as_ref().map(SchemaIndex::from_document);
        let deprecations = schema_document.as_ref().map(|_| rules.summary());

        // Stage 4: transform every eligible operation.
        let operations = catalog.operations_sorted();
        let ctx = TransformContext {
            rules: &rules,
            schema: schema_index.as_ref(),
            thresholds: options.thresholds,
            validate: options.validate_against_schema,
        };
        let mut transformations: Vec<Transformation> = Vec::new();
        if !rules.is_empty() {
            let eligible: Vec<&Operation> = operations
                .iter()
                .filter(|op| op.name_resolved && op.unresolved_fragments.is_empty())
                .collect();
            let results: Vec<std::result::Result<Transformation, Incident>> = eligible
                .par_iter()
                .map(|op| {
                    transform_operation(op, &ctx).map_err(|e| {
                        Incident::new(
                            IncidentKind::RuleApplication,
                            Severity::Error,
                            &op.file_path,
                            "E_TRANSFORM",
                            format!("failed to transform `{}`: {e}", op.name),
                        )
                    })
                })
                .collect();
            for result in results {
                match result {
                    Ok(t) if t.is_noop() => {}
                    Ok(t) => transformations.push(t),
                    Err(incident) => incidents.push(incident),
                }
            }
        }

        // Minimum-confidence gate.
        let (applicable, rejected): (Vec<Transformation>, Vec<Transformation>) = transformations
            .into_iter()
            .partition(|t| t.confidence >= options.min_confidence);

        // Stage 5: apply per file; each file is one worker task, so two
        // transformations in one file are always serialized.
        let mut by_file: FxHashMap<PathBuf, Vec<&Transformation>> = FxHashMap::default();
        for transformation in &applicable {
            if let Some(op) = catalog.get(&transformation.operation_id) {
                by_file
                    .entry(op.file_path.clone())
                    .or_default()
                    .push(transformation);
            }
        }
        let mut targets: Vec<(PathBuf, Vec<&Transformation>)> = by_file.into_iter().collect();
        targets.sort_by(|a, b| a.0.cmp(&b.0));

        let outcomes: Vec<Result<(FileOutcome, String)>> = targets
            .par_iter()
            .map(|(file, file_transforms)| {
                let source = fs::read_to_string(file)
                    .with_context(|| format!("failed to read {}", file.display()))?;
                let file_ops: Vec<Operation> = operations
                    .iter()
                    .filter(|op| &op.file_path == file)
                    .cloned()
                    .collect();
                let transforms: FxHashMap<String, &Transformation> = file_transforms
                    .iter()
                    .map(|t| (t.operation_id.clone(), *t))
                    .collect();
                let outcome = apply_file(file, &source, &file_ops, &transforms);
                if !options.dry_run {
                    if let Some(proposed) = &outcome.proposed {
                        fs::write(file, proposed)
                            .with_context(|| format!("failed to write {}", file.display()))?;
                    }
                }
                Ok((outcome, source))
            })
            .collect();

        let mut patches = Vec::new();
        let mut applied_ids: Vec<String> = Vec::new();
        for result in outcomes {
            let (outcome, original) = result?;
            incidents.extend(outcome.rejected.clone());
            if let Some(fatal) = outcome.fatal.clone() {
                incidents.push(fatal);
            }
            if let Some(proposed) = outcome.proposed {
                patches.push(FilePatch {
                    file_path: outcome.file_path.clone(),
                    original,
                    proposed,
                });
            }
            applied_ids.extend(outcome.applied_operations);
        }

        let summary = RunSummary {
            files_scanned: files.len(),
            operations: catalog.len(),
            fragments: catalog.fragment_count(),
            transformed: applicable.len(),
            automatic: count_category(&applicable, Category::Automatic),
            semi_automatic: count_category(&applicable, Category::SemiAutomatic),
            manual: count_category(&applicable, Category::Manual),
            rejected_by_gate: rejected.len(),
            files_modified: patches.len(),
            warnings: incidents.iter().filter(|i| i.is_warning()).count(),
            errors: incidents
                .iter()
                .filter(|i| i.severity == Severity::Error)
                .count(),
            fatal_errors: incidents.iter().filter(|i| i.is_fatal()).count(),
        };
        if options.verbose {
            println!(
                "Extracted {} operations, applied {} transformations across {} files",
                summary.operations,
                applied_ids.len(),
                summary.files_modified
            );
        }

        Ok(MigrationReport {
            catalog: catalog.snapshot(files.len(), options.preserve_source_positions),
            transformations: applicable,
            rejected,
            patches,
            deprecations,
            incidents,
            summary,
        })
    }
}

fn count_category(transformations: &[Transformation], category: Category) -> usize {
    transformations
        .iter()
        .filter(|t| t.category == category)
        .count()
}
