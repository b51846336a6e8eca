//! Lexical pluck strategy.
//!
//! Locates embedded GraphQL without parsing the host file: a small scanner
//! walks the source skipping comments and string literals, and captures
//! three shapes — tagged template literals (`gql`…``), recognized call
//! expressions with a template or string first argument, and plain string
//! assignments to operation-suffixed variable names. Interpolations are
//! captured with their exact expression text and handed to the shared
//! placeholder table.

use std::path::Path;

use crate::config::{RunOptions, StrategyKind};
use crate::extraction::placeholder;
use crate::extraction::{FileExtraction, TemplateBlock};
use crate::types::{Incident, IncidentKind, Severity};

pub fn pluck_source(file_path: &Path, source: &str, options: &RunOptions) -> FileExtraction {
    let mut scanner = Scanner {
        source,
        bytes: source.as_bytes(),
        pos: 0,
        file_path,
        options,
        blocks: Vec::new(),
        incidents: Vec::new(),
    };
    scanner.run();
    FileExtraction {
        file_path: file_path.to_path_buf(),
        blocks: scanner.blocks,
        incidents: scanner.incidents,
    }
}

struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    file_path: &'a Path,
    options: &'a RunOptions,
    blocks: Vec<TemplateBlock>,
    incidents: Vec<Incident>,
}

/// A template literal split into its literal chunks and `${…}` expressions.
struct CapturedTemplate {
    chunks: Vec<String>,
    exprs: Vec<String>,
    body_span: (usize, usize),
    end: usize,
}

impl<'a> Scanner<'a> {
    fn run(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                b'\'' | b'"' => {
                    let quote = self.bytes[self.pos];
                    self.pos += 1;
                    self.skip_string(quote);
                }
                b'`' => {
                    // Untagged template: traverse so its contents are not
                    // mistaken for top-level tokens.
                    match self.capture_template(self.pos) {
                        Some(tpl) => self.pos = tpl.end,
                        None => {
                            self.record_unterminated(self.pos);
                            self.pos = self.bytes.len();
                        }
                    }
                }
                c if is_ident_start(c) => self.scan_identifier(),
                _ => self.pos += 1,
            }
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_string(&mut self, quote: u8) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 2,
                b'\n' => return, // unterminated; let the host parser complain
                c if c == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn scan_identifier(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let ident = &self.source[start..self.pos];

        match ident {
            "const" | "let" | "var" => self.try_variable_assignment(),
            _ if self.options.is_tag(ident) => self.try_tagged_template(start, ident),
            _ if self.options.is_call(ident) => self.try_call_expression(start, ident),
            _ => {}
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    // Shape 1: gql`query { … }`
    fn try_tagged_template(&mut self, tag_start: usize, tag: &str) {
        let after_tag = self.pos;
        self.skip_whitespace();
        if self.peek(0) != Some(b'`') {
            self.pos = after_tag;
            return;
        }
        let tpl_start = self.pos;
        let Some(tpl) = self.capture_template(tpl_start) else {
            self.record_unterminated(tpl_start);
            self.pos = self.bytes.len();
            return;
        };
        self.pos = tpl.end;
        self.push_block(tpl, (tag_start, self.pos), Some(tag.to_string()));
    }

    // Shape 2: graphql(`query { … }`) or graphql("query { … }", …)
    fn try_call_expression(&mut self, callee_start: usize, callee: &str) {
        let after_callee = self.pos;
        self.skip_whitespace();
        if self.peek(0) != Some(b'(') {
            self.pos = after_callee;
            return;
        }
        self.pos += 1;
        self.skip_whitespace();
        match self.peek(0) {
            Some(b'`') => {
                let tpl_start = self.pos;
                let Some(tpl) = self.capture_template(tpl_start) else {
                    self.record_unterminated(tpl_start);
                    self.pos = self.bytes.len();
                    return;
                };
                self.pos = tpl.end;
                let Some(close) = self.skip_to_call_end() else {
                    return;
                };
                self.push_block(tpl, (callee_start, close), Some(callee.to_string()));
            }
            Some(q @ (b'"' | b'\'')) => {
                let lit_start = self.pos;
                self.pos += 1;
                self.skip_string(q);
                let body_span = (lit_start + 1, self.pos.saturating_sub(1));
                let Some(close) = self.skip_to_call_end() else {
                    return;
                };
                let body = self.source[body_span.0..body_span.1].to_string();
                self.push_string_block(body, body_span, (callee_start, close), Some(callee.to_string()));
            }
            _ => {}
        }
    }

    // Shape 3: const ventureFragment = `fragment … on …` (fallback for
    // fragments kept in plain strings).
    fn try_variable_assignment(&mut self) {
        let checkpoint = self.pos;
        self.skip_whitespace();
        if !self.peek(0).is_some_and(is_ident_start) {
            self.pos = checkpoint;
            return;
        }
        let name_start = self.pos;
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let name = &self.source[name_start..self.pos];
        if !self.options.is_operation_variable(name) {
            self.pos = checkpoint;
            return;
        }
        self.skip_whitespace();
        if self.peek(0) != Some(b'=') {
            self.pos = checkpoint;
            return;
        }
        self.pos += 1;
        self.skip_whitespace();
        match self.peek(0) {
            Some(b'`') => {
                let tpl_start = self.pos;
                let Some(tpl) = self.capture_template(tpl_start) else {
                    self.record_unterminated(tpl_start);
                    self.pos = self.bytes.len();
                    return;
                };
                self.pos = tpl.end;
                let outer = (tpl_start, tpl.end);
                self.push_block(tpl, outer, None);
            }
            Some(q @ (b'"' | b'\'')) => {
                let lit_start = self.pos;
                self.pos += 1;
                self.skip_string(q);
                let body_span = (lit_start + 1, self.pos.saturating_sub(1));
                let body = self.source[body_span.0..body_span.1].to_string();
                self.push_string_block(body, body_span, (lit_start, self.pos), None);
            }
            _ => {
                self.pos = checkpoint;
            }
        }
    }

    /// Balanced scan from just past an already-consumed first argument to
    /// the call's closing paren. Returns the position one past `)`.
    fn skip_to_call_end(&mut self) -> Option<usize> {
        let mut depth = 1usize;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                q @ (b'"' | b'\'') => {
                    self.pos += 1;
                    self.skip_string(q);
                }
                b'`' => {
                    let start = self.pos;
                    let tpl = self.capture_template(start)?;
                    self.pos = tpl.end;
                }
                b'(' => {
                    depth += 1;
                    self.pos += 1;
                }
                b')' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Some(self.pos);
                    }
                }
                _ => self.pos += 1,
            }
        }
        None
    }

    /// Walk a template literal starting at the opening backtick. Does not
    /// advance `self.pos`; the caller decides what to do with the result.
    fn capture_template(&self, start: usize) -> Option<CapturedTemplate> {
        debug_assert_eq!(self.bytes[start], b'`');
        let mut chunks = Vec::new();
        let mut exprs = Vec::new();
        let mut chunk_start = start + 1;
        let mut i = start + 1;

        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'`' => {
                    chunks.push(self.source[chunk_start..i].to_string());
                    return Some(CapturedTemplate {
                        chunks,
                        exprs,
                        body_span: (start + 1, i),
                        end: i + 1,
                    });
                }
                b'$' if self.bytes.get(i + 1) == Some(&b'{') => {
                    chunks.push(self.source[chunk_start..i].to_string());
                    let expr_start = i + 2;
                    let expr_end = self.scan_expression(expr_start)?;
                    exprs.push(self.source[expr_start..expr_end].to_string());
                    i = expr_end + 1; // past '}'
                    chunk_start = i;
                }
                _ => i += 1,
            }
        }
        None
    }

    /// Balanced scan of a `${…}` expression body; returns the index of the
    /// closing brace. Handles nested braces, strings and template literals.
    fn scan_expression(&self, start: usize) -> Option<usize> {
        let mut depth = 1usize;
        let mut i = start;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'{' => {
                    depth += 1;
                    i += 1;
                }
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                    i += 1;
                }
                q @ (b'"' | b'\'') => {
                    i += 1;
                    while i < self.bytes.len() {
                        match self.bytes[i] {
                            b'\\' => i += 2,
                            c if c == q => {
                                i += 1;
                                break;
                            }
                            _ => i += 1,
                        }
                    }
                }
                b'`' => {
                    let tpl = self.capture_template(i)?;
                    i = tpl.end;
                }
                _ => i += 1,
            }
        }
        None
    }

    fn push_block(&mut self, tpl: CapturedTemplate, outer_span: (usize, usize), tag: Option<String>) {
        let substitution = placeholder::substitute(&tpl.chunks, &tpl.exprs);
        for site_index in &substitution.unclassified {
            let site = &substitution.sites[*site_index];
            self.incidents.push(
                Incident::new(
                    IncidentKind::UnresolvedReference,
                    Severity::Warning,
                    self.file_path,
                    "W_UNCLASSIFIED_INTERPOLATION",
                    format!(
                        "interpolation `${{{}}}` is not a recognized shape",
                        site.expression
                    ),
                )
                .at_offset(self.source, tpl.body_span.0 + site.offset),
            );
        }
        self.blocks.push(TemplateBlock {
            body: self.source[tpl.body_span.0..tpl.body_span.1].to_string(),
            parseable: substitution.parseable,
            sites: substitution.sites,
            unclassified_sites: substitution.unclassified.len(),
            outer_span,
            body_span: tpl.body_span,
            tag,
            strategy: StrategyKind::Pluck,
        });
    }

    fn push_string_block(
        &mut self,
        body: String,
        body_span: (usize, usize),
        outer_span: (usize, usize),
        tag: Option<String>,
    ) {
        self.blocks.push(TemplateBlock {
            parseable: body.clone(),
            body,
            sites: Vec::new(),
            unclassified_sites: 0,
            outer_span,
            body_span,
            tag,
            strategy: StrategyKind::Pluck,
        });
    }

    fn record_unterminated(&mut self, offset: usize) {
        self.incidents.push(
            Incident::new(
                IncidentKind::HostParse,
                Severity::Error,
                self.file_path,
                "E_HOST_PARSE",
                "unterminated template literal",
            )
            .at_offset(self.source, offset),
        );
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}
