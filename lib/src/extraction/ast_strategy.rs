//! Full AST strategy using SWC.
//!
//! Parses the whole host file and visits template literals in tagged
//! template, recognized call, and operation-variable contexts. Slower than
//! the pluck scanner but immune to lexical false positives, and its spans
//! come straight from the parser, which is what makes the applicator's
//! splices trustworthy on files the scanner struggles with.

use std::path::Path;

use swc_core::common::{BytePos, Spanned};
use swc_core::ecma::{
    ast::*,
    parser::{lexer::Lexer, Parser, StringInput, Syntax, TsSyntax},
    visit::{Visit, VisitWith},
};

use crate::config::{RunOptions, StrategyKind};
use crate::extraction::placeholder;
use crate::extraction::{FileExtraction, TemplateBlock};
use crate::types::{Incident, IncidentKind, Severity};

pub fn extract_source(file_path: &Path, source: &str, options: &RunOptions) -> FileExtraction {
    let syntax = Syntax::Typescript(TsSyntax {
        tsx: file_path.extension().and_then(|s| s.to_str()) == Some("tsx"),
        ..Default::default()
    });

    let lexer = Lexer::new(
        syntax,
        Default::default(),
        StringInput::new(source, BytePos(0), BytePos(source.len() as u32)),
        None,
    );

    let mut parser = Parser::new_from(lexer);
    let module = match parser.parse_module() {
        Ok(module) => module,
        Err(e) => {
            return FileExtraction {
                file_path: file_path.to_path_buf(),
                blocks: Vec::new(),
                incidents: vec![Incident::new(
                    IncidentKind::HostParse,
                    Severity::Error,
                    file_path,
                    "E_HOST_PARSE",
                    format!("TypeScript parse error: {:?}", e),
                )],
            };
        }
    };

    let mut visitor = TemplateVisitor {
        source,
        file_path,
        options,
        blocks: Vec::new(),
        incidents: Vec::new(),
    };
    module.visit_with(&mut visitor);

    // A template can be reached through more than one recognized context
    // (e.g. a tagged template inside a recognized call). The mapping must
    // address the outermost construct, so keep the widest record per body.
    let mut blocks = visitor.blocks;
    blocks.sort_by_key(|b| (b.body_span, std::cmp::Reverse(b.outer_span.1 - b.outer_span.0)));
    blocks.dedup_by_key(|b| b.body_span);
    blocks.sort_by_key(|b| b.outer_span.0);

    FileExtraction {
        file_path: file_path.to_path_buf(),
        blocks,
        incidents: visitor.incidents,
    }
}

struct TemplateVisitor<'a> {
    source: &'a str,
    file_path: &'a Path,
    options: &'a RunOptions,
    blocks: Vec<TemplateBlock>,
    incidents: Vec<Incident>,
}

impl<'a> TemplateVisitor<'a> {
    fn record_template(&mut self, tpl: &Tpl, outer_span: (usize, usize), tag: Option<String>) {
        let chunks: Vec<String> = tpl
            .quasis
            .iter()
            .map(|quasi| quasi.raw.as_ref().to_string())
            .collect();
        let exprs: Vec<String> = tpl
            .exprs
            .iter()
            .map(|expr| {
                let span = expr.span();
                self.source[span.lo.0 as usize..span.hi.0 as usize].to_string()
            })
            .collect();
        if chunks.len() != exprs.len() + 1 {
            return;
        }

        let body_span = (
            tpl.span.lo.0 as usize + 1,
            tpl.span.hi.0 as usize - 1,
        );
        let substitution = placeholder::substitute(&chunks, &exprs);
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
                .at_offset(self.source, body_span.0 + site.offset),
            );
        }
        self.blocks.push(TemplateBlock {
            body: self.source[body_span.0..body_span.1].to_string(),
            parseable: substitution.parseable,
            sites: substitution.sites,
            unclassified_sites: substitution.unclassified.len(),
            outer_span,
            body_span,
            tag,
            strategy: StrategyKind::Ast,
        });
    }

    fn record_string(&mut self, lit: &Str, outer_span: (usize, usize), tag: Option<String>) {
        let body_span = (
            lit.span.lo.0 as usize + 1,
            lit.span.hi.0 as usize - 1,
        );
        let body = self.source[body_span.0..body_span.1].to_string();
        self.blocks.push(TemplateBlock {
            parseable: body.clone(),
            body,
            sites: Vec::new(),
            unclassified_sites: 0,
            outer_span,
            body_span,
            tag,
            strategy: StrategyKind::Ast,
        });
    }
}

impl<'a> Visit for TemplateVisitor<'a> {
    fn visit_tagged_tpl(&mut self, tpl: &TaggedTpl) {
        if let Expr::Ident(ident) = &*tpl.tag {
            if self.options.is_tag(ident.sym.as_ref()) {
                let outer = (tpl.span.lo.0 as usize, tpl.span.hi.0 as usize);
                self.record_template(&tpl.tpl, outer, Some(ident.sym.to_string()));
            }
        }
        tpl.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, call: &CallExpr) {
        if let Callee::Expr(callee) = &call.callee {
            if let Expr::Ident(ident) = &**callee {
                if self.options.is_call(ident.sym.as_ref()) {
                    let outer = (call.span.lo.0 as usize, call.span.hi.0 as usize);
                    match call.args.first().map(|arg| &*arg.expr) {
                        Some(Expr::Tpl(tpl)) => {
                            self.record_template(tpl, outer, Some(ident.sym.to_string()));
                        }
                        Some(Expr::Lit(Lit::Str(lit))) => {
                            self.record_string(lit, outer, Some(ident.sym.to_string()));
                        }
                        _ => {}
                    }
                }
            }
        }
        call.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, decl: &VarDeclarator) {
        if let Pat::Ident(binding) = &decl.name {
            if self.options.is_operation_variable(binding.id.sym.as_ref()) {
                match decl.init.as_deref() {
                    Some(Expr::Tpl(tpl)) => {
                        let outer = (tpl.span.lo.0 as usize, tpl.span.hi.0 as usize);
                        self.record_template(tpl, outer, None);
                    }
                    Some(Expr::Lit(Lit::Str(lit))) => {
                        let outer = (lit.span.lo.0 as usize, lit.span.hi.0 as usize);
                        self.record_string(lit, outer, None);
                    }
                    _ => {}
                }
            }
        }
        decl.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn extract(source: &str) -> FileExtraction {
        extract_source(&PathBuf::from("test.ts"), source, &RunOptions::default())
    }

    #[test]
    fn extracts_tagged_template_with_span() {
        let src = "const q = gql`query Q { venture { id } }`;";
        let result = extract(src);
        assert_eq!(result.blocks.len(), 1);
        let block = &result.blocks[0];
        assert_eq!(block.body, "query Q { venture { id } }");
        assert_eq!(&src[block.outer_span.0..block.outer_span.1], "gql`query Q { venture { id } }`");
    }

    #[test]
    fn extracts_interpolation_expressions_from_spans() {
        let src = "const q = gql`query ${queryNames.byIdV1} { venture { ...${ventureFields} } }`;";
        let result = extract(src);
        assert_eq!(result.blocks.len(), 1);
        let block = &result.blocks[0];
        assert_eq!(block.sites.len(), 2);
        assert_eq!(block.sites[0].expression, "queryNames.byIdV1");
        assert_eq!(block.sites[1].expression, "ventureFields");
        assert_eq!(&src[block.body_span.0..block.body_span.1], block.body);
    }

    #[test]
    fn tagged_template_inside_recognized_call_keeps_outermost_range() {
        let src = "register(graphql(gql`query N { node { id } }`));";
        let result = extract(src);
        assert_eq!(result.blocks.len(), 1);
        let block = &result.blocks[0];
        assert!(src[block.outer_span.0..block.outer_span.1].starts_with("graphql("));
    }

    #[test]
    fn host_parse_error_is_reported_not_thrown() {
        let src = "const q = gql`query Q { venture { id } }`;\nconst broken = {{{;";
        let result = extract(src);
        assert!(result.blocks.is_empty());
        assert_eq!(result.incidents.len(), 1);
        assert_eq!(result.incidents[0].code, "E_HOST_PARSE");
        assert_eq!(result.incidents[0].kind, IncidentKind::HostParse);
    }

    #[test]
    fn jsx_files_parse_with_tsx_syntax() {
        let src = "export const C = () => <div>{gql`query J { viewer { id } }`}</div>;";
        let result = extract_source(&PathBuf::from("c.tsx"), src, &RunOptions::default());
        assert_eq!(result.blocks.len(), 1);
    }

    #[test]
    fn operation_variable_string_assignment() {
        let src = "const ventureFragment = `fragment ventureFields on Venture { id name }`;";
        let result = extract(src);
        assert_eq!(result.blocks.len(), 1);
        assert!(result.blocks[0].tag.is_none());
    }
}
