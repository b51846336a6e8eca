//! Extraction stage: two interchangeable strategies feeding one collector.
//!
//! The pluck strategy lexically pattern-matches the three recognized shapes;
//! the ast strategy parses the host file with SWC. The hybrid driver runs
//! pluck first and falls back to ast for files where pluck reported an error
//! or met an interpolation shape it could not classify, then merges by
//! content so operation ids are independent of strategy choice.

pub mod ast_strategy;
pub mod cache;
pub mod file_finder;
pub mod placeholder;
pub mod pluck;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::config::{RunOptions, StrategyKind};
use crate::types::{Incident, IncidentKind, InterpolationSite};

pub use cache::ExtractionCache;
pub use file_finder::FileFinder;

/// One template literal (or string literal) captured from a host file,
/// before its GraphQL content is parsed into definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateBlock {
    /// Literal body exactly as written, interpolations intact.
    pub body: String,
    /// Body with placeholders substituted for interpolations.
    pub parseable: String,
    pub sites: Vec<InterpolationSite>,
    pub unclassified_sites: usize,
    /// The outermost construct containing the literal.
    pub outer_span: (usize, usize),
    /// The bytes between the literal's delimiters.
    pub body_span: (usize, usize),
    pub tag: Option<String>,
    pub strategy: StrategyKind,
}

impl TemplateBlock {
    /// Blocks whose literal chunks hold no static content carry nothing to
    /// migrate, whether or not interpolations are present.
    pub fn is_content_free(&self) -> bool {
        let mut static_text = String::new();
        let mut cursor = 0;
        for site in &self.sites {
            static_text.push_str(&self.body[cursor..site.offset]);
            cursor = site.offset + site.expression.len() + 3;
        }
        static_text.push_str(&self.body[cursor..]);
        static_text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExtraction {
    pub file_path: PathBuf,
    pub blocks: Vec<TemplateBlock>,
    pub incidents: Vec<Incident>,
}

/// Extract from a file on disk, consulting the advisory cache when present.
pub fn extract_file(
    path: &Path,
    options: &RunOptions,
    cache: Option<&ExtractionCache>,
) -> Result<Arc<FileExtraction>> {
    let source = fs::read_to_string(path)?;
    if let Some(cache) = cache {
        if let Some(hit) = cache.get(&source, options.strategy) {
            return Ok(hit);
        }
    }
    let extraction = Arc::new(extract_source(path, &source, options));
    if let Some(cache) = cache {
        return Ok(cache.put(&source, options.strategy, extraction));
    }
    Ok(extraction)
}

/// Strategy dispatch over in-memory source.
pub fn extract_source(path: &Path, source: &str, options: &RunOptions) -> FileExtraction {
    // Cheap pre-check before any parsing, lexical or otherwise.
    if !mentions_recognized_identifier(source, options) {
        return FileExtraction {
            file_path: path.to_path_buf(),
            blocks: Vec::new(),
            incidents: Vec::new(),
        };
    }
    let mut extraction = match options.strategy {
        StrategyKind::Pluck => pluck::pluck_source(path, source, options),
        StrategyKind::Ast => ast_strategy::extract_source(path, source, options),
        StrategyKind::Hybrid => hybrid(path, source, options),
    };
    drop_nested_blocks(&mut extraction.blocks);
    extraction
}

fn mentions_recognized_identifier(source: &str, options: &RunOptions) -> bool {
    options
        .tags
        .iter()
        .chain(options.calls.iter())
        .any(|ident| source.contains(ident.as_str()))
        || source.contains("fragment")
        || source.contains("query")
        || source.contains("mutation")
}

fn hybrid(path: &Path, source: &str, options: &RunOptions) -> FileExtraction {
    let plucked = pluck::pluck_source(path, source, options);

    let needs_ast = !plucked.incidents.is_empty()
        || plucked.blocks.iter().any(|b| b.unclassified_sites > 0);
    if !needs_ast {
        return plucked;
    }

    let ast = ast_strategy::extract_source(path, source, options);
    merge_extractions(plucked, ast)
}

/// Merge pluck and ast results for one file, keyed by substituted content so
/// the winning record is the one with the richer interpolation metadata.
fn merge_extractions(plucked: FileExtraction, ast: FileExtraction) -> FileExtraction {
    let ast_parsed_host = !ast
        .incidents
        .iter()
        .any(|i| i.kind == IncidentKind::HostParse);

    let mut blocks: Vec<TemplateBlock> = Vec::new();
    for pluck_block in plucked.blocks {
        blocks.push(pluck_block);
    }
    for ast_block in ast.blocks {
        match blocks
            .iter_mut()
            .find(|b| b.parseable == ast_block.parseable)
        {
            Some(existing) => {
                let existing_classified = existing.sites.len() - existing.unclassified_sites;
                let ast_classified = ast_block.sites.len() - ast_block.unclassified_sites;
                if ast_classified >= existing_classified {
                    *existing = ast_block;
                }
            }
            None => blocks.push(ast_block),
        }
    }
    blocks.sort_by_key(|b| b.outer_span.0);

    let mut incidents = Vec::new();
    for incident in plucked.incidents {
        // The ast pass supersedes pluck's host-level complaints when it
        // managed to parse the file.
        if ast_parsed_host && incident.kind == IncidentKind::HostParse {
            continue;
        }
        incidents.push(incident);
    }
    for incident in ast.incidents {
        if !incidents.contains(&incident) {
            incidents.push(incident);
        }
    }

    FileExtraction {
        file_path: plucked.file_path,
        blocks,
        incidents,
    }
}

/// The mapping must address the outermost construct; a template nested
/// inside another captured template's body is not its own splice target.
fn drop_nested_blocks(blocks: &mut Vec<TemplateBlock>) {
    let spans: Vec<(usize, usize)> = blocks.iter().map(|b| b.body_span).collect();
    blocks.retain(|b| {
        !spans
            .iter()
            .any(|outer| outer.0 < b.outer_span.0 && b.outer_span.1 <= outer.1)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("test.ts")
    }

    #[test]
    fn pluck_and_ast_agree_on_content() {
        let src = r#"
            const byId = gql`query ${queryNames.byIdV1} { venture(ventureId: $id) { ...${ventureFields} } }`;
            const list = graphql(`query List { ventures(limit: ${pageSize}) { id } }`);
        "#;
        let options = RunOptions::default();
        let plucked = pluck::pluck_source(&path(), src, &options);
        let ast = ast_strategy::extract_source(&path(), src, &options);

        let pluck_contents: Vec<&str> =
            plucked.blocks.iter().map(|b| b.parseable.as_str()).collect();
        let ast_contents: Vec<&str> = ast.blocks.iter().map(|b| b.parseable.as_str()).collect();
        assert_eq!(pluck_contents, ast_contents);

        for (p, a) in plucked.blocks.iter().zip(ast.blocks.iter()) {
            assert_eq!(p.body_span, a.body_span);
            assert_eq!(p.sites, a.sites);
        }
    }

    #[test]
    fn hybrid_falls_back_to_ast_on_pluck_error() {
        // A regex literal containing a backtick derails the scanner but not
        // the real parser.
        let src = "const q = gql`query H { viewer { id } }`;\nconst re = /`/;\nconst r = gql`query T { shop { id } }`;";
        let options = RunOptions {
            strategy: StrategyKind::Hybrid,
            ..RunOptions::default()
        };
        let extraction = extract_source(&path(), src, &options);
        let bodies: Vec<&str> = extraction.blocks.iter().map(|b| b.body.as_str()).collect();
        assert!(bodies.contains(&"query H { viewer { id } }"));
        assert!(bodies.contains(&"query T { shop { id } }"));
    }

    #[test]
    fn empty_template_produces_no_block_content() {
        let src = "const q = gql``;";
        let options = RunOptions::default();
        let extraction = extract_source(&path(), src, &options);
        assert!(extraction.blocks.iter().all(|b| b.is_content_free()));
        assert!(extraction.incidents.is_empty());
    }

    #[test]
    fn files_without_recognized_identifiers_are_skipped() {
        let src = "const helper = (a: number) => a * 2;";
        let extraction = extract_source(&path(), src, &RunOptions::default());
        assert!(extraction.blocks.is_empty());
    }

    fn fixture_dir(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .join("fixtures")
            .join(name)
    }

    fn ingest_fixtures(dir_name: &str) -> (crate::catalog::OperationCatalog, Vec<Incident>) {
        let options = RunOptions::default();
        let finder = FileFinder::new(&options.include, &options.ignore).unwrap();
        let files = finder.find_files(&fixture_dir(dir_name)).unwrap();
        let catalog = crate::catalog::OperationCatalog::new();
        let mut incidents = Vec::new();
        for file in files {
            let source = std::fs::read_to_string(&file).unwrap();
            let extraction = extract_source(&file, &source, &options);
            incidents.extend(catalog.ingest(&extraction, &source));
        }
        (catalog, incidents)
    }

    #[test]
    fn valid_fixtures_extract_all_shapes() {
        let (catalog, incidents) = ingest_fixtures("valid");
        assert!(incidents.is_empty(), "unexpected incidents: {incidents:?}");
        // Tagged templates, a call expression, an operation-suffixed plain
        // string, and two interpolated queries.
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.fragment_count(), 2);
        assert!(catalog.fragment("ventureFields").is_some());
        assert!(catalog.fragment("profileFields").is_some());
    }

    #[test]
    fn edge_case_fixtures_degrade_to_incidents() {
        let (catalog, incidents) = ingest_fixtures("edge_cases");
        // The broken template parses as TypeScript but not as GraphQL; the
        // dynamic-only template warns; the good operation still lands.
        assert!(incidents.iter().any(|i| i.code == "E_GQL_PARSE"));
        assert!(incidents.iter().any(|i| i.code == "W_INTERPOLATION_ONLY"));
        let names: Vec<String> = catalog
            .operations_sorted()
            .iter()
            .map(|op| op.name.clone())
            .collect();
        assert_eq!(names, vec!["StillGood".to_string()]);
    }
}
