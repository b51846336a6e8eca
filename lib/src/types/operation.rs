//! Core records threaded through the pipeline: operations, fragments,
//! interpolation sites and the source mappings the applicator splices by.

use std::path::PathBuf;

use graphql_parser::query::Document;
use serde::{Deserialize, Serialize};

use crate::config::StrategyKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
    Fragment,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
            OperationKind::Fragment => write!(f, "fragment"),
        }
    }
}

/// The closed set of interpolation shapes the placeholder table covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationKind {
    QueryName,
    FragmentRef,
    FieldRef,
    Identifier,
    StringExpr,
    NumericExpr,
}

/// A single `${…}` expression captured inside a template literal.
///
/// `offset` is the byte offset of the `$` inside the literal body;
/// `expression` is the host-language expression text exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolationSite {
    pub index: usize,
    pub offset: usize,
    pub kind: InterpolationKind,
    pub expression: String,
    pub placeholder: String,
}

impl InterpolationSite {
    /// The text spliced back into the host file, `${…}` wrapping included.
    pub fn host_text(&self) -> String {
        format!("${{{}}}", self.expression)
    }
}

/// Byte-range handle that lets the applicator splice transformed GraphQL
/// back into the host file without touching surrounding bytes.
///
/// `outer_span` covers the whole syntactic construct (tagged template or
/// call expression); `body_span` covers only the literal body between the
/// delimiters. One template block may hold several GraphQL definitions;
/// `def_index`/`def_count` position this operation inside its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapping {
    pub file_path: PathBuf,
    pub outer_span: (usize, usize),
    pub body_span: (usize, usize),
    pub def_index: usize,
    pub def_count: usize,
    pub sites: Vec<InterpolationSite>,
    pub strategy: StrategyKind,
}

impl SourceMapping {
    pub fn has_interpolations(&self) -> bool {
        !self.sites.is_empty()
    }

    pub fn fragment_sites(&self) -> impl Iterator<Item = &InterpolationSite> {
        self.sites
            .iter()
            .filter(|s| s.kind == InterpolationKind::FragmentRef)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub var_type: String,
}

/// One GraphQL definition extracted from a host file.
///
/// The id is a content hash over the whitespace-collapsed, placeholder
/// substituted text, so two extractions of the same content are the same
/// operation regardless of host file or strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub kind: OperationKind,
    pub name: String,
    pub name_resolved: bool,
    pub name_candidates: Vec<String>,
    /// Literal body as written in the host file, interpolations intact.
    pub raw_text: String,
    /// Canonically printed GraphQL for this definition, placeholders in
    /// place of interpolations.
    pub parsed_text: String,
    pub file_path: PathBuf,
    pub mapping: SourceMapping,
    pub variables: Vec<VariableSpec>,
    pub fragment_refs: Vec<String>,
    /// Spread names the stitcher could not find; a non-empty list keeps the
    /// operation out of the transform stage.
    pub unresolved_fragments: Vec<String>,
    #[serde(skip)]
    pub document: Option<Document<'static, String>>,
}

impl Operation {
    pub fn is_fragment(&self) -> bool {
        self.kind == OperationKind::Fragment
    }

    /// Fragment spreads that are real names, not interpolated placeholders.
    pub fn resolvable_fragment_refs(&self) -> impl Iterator<Item = &String> {
        self.fragment_refs
            .iter()
            .filter(|name| !crate::extraction::placeholder::is_fragment_placeholder(name))
    }
}

/// A named fragment definition, shared by name across the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub name: String,
    pub text: String,
    pub file_path: PathBuf,
    /// Direct spreads only; transitive closure is computed during stitching.
    pub dependencies: Vec<String>,
    #[serde(skip)]
    pub document: Option<Document<'static, String>>,
}
