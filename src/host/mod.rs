//! Host script front end.
//!
//! The weaver only talks to a host through [`HostParser`]: parse a text into the shared
//! arena together with its scope graph. [`EsHost`] is the built-in implementation, backed
//! by `oxc_parser`; TypeScript syntax is accepted when [`HostOptions::typescript`] is set.

pub mod analyze;
pub mod lexer;
pub mod lower;

use crate::coords::{CoordinateIndex, Range};
use crate::error::HostError;
use crate::node::{Ast, Comment, CommentKind, NodeId, SourceType, Token};
use crate::scope::ScopeManager;
use oxc_allocator::Allocator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostOptions {
    pub source_type: SourceType,
    pub ecma_version: u32,
    #[serde(default)]
    pub typescript: bool,
}

impl Default for HostOptions {
    fn default() -> Self {
        HostOptions {
            source_type: SourceType::Module,
            ecma_version: 2022,
            typescript: false,
        }
    }
}

/// Output of one host parse, in the coordinates of the parsed text.
#[derive(Debug, Clone)]
pub struct HostParse {
    pub program: NodeId,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub scopes: ScopeManager,
}

pub trait HostParser: Send + Sync {
    fn parse(&self, text: &str, ast: &mut Ast, options: &HostOptions) -> Result<HostParse, HostError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EsHost;

impl HostParser for EsHost {
    fn parse(&self, text: &str, ast: &mut Ast, options: &HostOptions) -> Result<HostParse, HostError> {
        let allocator = Allocator::default();
        let source_type = oxc_span::SourceType::default()
            .with_module(options.source_type == SourceType::Module)
            .with_typescript(options.typescript);
        let ret = oxc_parser::Parser::new(&allocator, text, source_type).parse();
        if let Some(error) = ret.errors.first() {
            let offset = error
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map(|label| label.offset())
                .unwrap_or(text.len());
            return Err(HostError::new(error.to_string(), offset));
        }

        let coords = CoordinateIndex::new(text);
        let lowered = lower::lower(text, &ret.program, options.source_type, ast, &coords)?;
        let tokens = lexer::tokenize(text, &coords, &lowered.atoms)?;
        let comments = ret
            .program
            .comments
            .iter()
            .map(|comment| {
                let value = comment.content_span();
                let range = Range::new(comment.span.start as usize, comment.span.end as usize);
                Comment {
                    kind: if comment.is_line() { CommentKind::Line } else { CommentKind::Block },
                    value: text[value.start as usize..value.end as usize].to_string(),
                    range,
                    loc: coords.location(range),
                }
            })
            .collect();
        let scopes = analyze::analyze(&ret.program, lowered.program, options.source_type, &lowered.nodes);
        Ok(HostParse {
            program: lowered.program,
            tokens,
            comments,
            scopes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Range;
    use crate::node::{LiteralValue, NodeKind, TokenKind};
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> (Ast, HostParse) {
        let mut ast = Ast::new();
        let parsed = EsHost.parse(text, &mut ast, &HostOptions::default()).unwrap();
        (ast, parsed)
    }

    fn body(ast: &Ast, program: NodeId) -> Vec<NodeId> {
        match ast.kind(program) {
            NodeKind::Program { body, .. } => body.clone(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_statement_ranges_include_semicolon() {
        let (ast, parsed) = parse("let a = 1;\n(b);");
        let stmts = body(&ast, parsed.program);
        assert_eq!(ast.range(stmts[0]), Range::new(0, 10));
        assert_eq!(ast.range(stmts[1]), Range::new(11, 15));
        let NodeKind::ExpressionStatement { expression } = ast.kind(stmts[1]) else {
            panic!("expected expression statement");
        };
        assert_eq!(ast.range(*expression), Range::new(12, 13), "parens excluded");
    }

    #[test]
    fn test_arrow_params_with_default_member_chain() {
        let text = "(({ name = a.b.c }, i) => {});";
        let (ast, parsed) = parse(text);
        let member = ast
            .descendants(parsed.program)
            .into_iter()
            .find(|&id| matches!(ast.kind(id), NodeKind::MemberExpression { .. }) && ast.range(id).len() == 5)
            .unwrap();
        let range = ast.range(member);
        assert_eq!(&text[range.start..range.end], "a.b.c");
    }

    #[test]
    fn test_destructuring_assignment_becomes_pattern() {
        let (ast, parsed) = parse("({ a, b: [c] } = obj);");
        let kinds: Vec<&str> = ast
            .descendants(parsed.program)
            .into_iter()
            .map(|id| ast.kind(id).type_name())
            .collect();
        assert!(kinds.contains(&"ObjectPattern"));
        assert!(kinds.contains(&"ArrayPattern"));
        assert!(!kinds.contains(&"ObjectExpression"));
    }

    #[test]
    fn test_syntax_error_offset() {
        let mut ast = Ast::new();
        let err = EsHost.parse("let x = ;", &mut ast, &HostOptions::default()).unwrap_err();
        assert_eq!(err.offset, 8);
    }

    #[test]
    fn test_asi_on_newline() {
        let (ast, parsed) = parse("a = 1\nb = 2");
        assert_eq!(body(&ast, parsed.program).len(), 2);
    }

    fn type_names(ast: &Ast, program: NodeId) -> Vec<&'static str> {
        ast.descendants(program).into_iter().map(|id| ast.kind(id).type_name()).collect()
    }

    #[test]
    fn test_class_members() {
        let (ast, parsed) = parse("class A extends B { #x = 1; static y; constructor() { super(); } get z() { return this.#x; } static { A.ready = true; } }");
        let names = type_names(&ast, parsed.program);
        for expected in [
            "ClassDeclaration",
            "ClassBody",
            "PropertyDefinition",
            "MethodDefinition",
            "PrivateIdentifier",
            "Super",
            "StaticBlock",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_statements_beyond_the_common_subset() {
        let text = "switch (k) { case 1: break; default: k++; }\ndo { k--; } while (k > 0);\nfunction* g() { yield* other(); }\nlet r = /ab+c/g;";
        let (ast, parsed) = parse(text);
        let names = type_names(&ast, parsed.program);
        for expected in ["SwitchStatement", "SwitchCase", "DoWhileStatement", "YieldExpression"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        let generator = ast
            .descendants(parsed.program)
            .into_iter()
            .find(|&id| matches!(ast.kind(id), NodeKind::FunctionDeclaration { generator: true, .. }));
        assert!(generator.is_some());
        let regex = ast
            .descendants(parsed.program)
            .into_iter()
            .find_map(|id| match ast.kind(id) {
                NodeKind::Literal { value: LiteralValue::RegExp { pattern, flags }, .. } => {
                    Some((pattern.clone(), flags.clone()))
                }
                _ => None,
            });
        assert_eq!(regex, Some(("ab+c".to_string(), "g".to_string())));
        let token = parsed.tokens.iter().find(|t| t.kind == TokenKind::RegularExpression).unwrap();
        assert_eq!(token.value, "/ab+c/g");
    }

    #[test]
    fn test_template_literal_tokens_and_quasis() {
        let text = "let s = `a${b}c`;";
        let (ast, parsed) = parse(text);
        let quasis: Vec<String> = ast
            .descendants(parsed.program)
            .into_iter()
            .filter_map(|id| match ast.kind(id) {
                NodeKind::TemplateElement { raw, .. } => Some(raw.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(quasis, vec!["a", "c"]);
        let values: Vec<&str> = parsed.tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["let", "s", "=", "`a${", "b", "}c`", ";"]);
    }

    #[test]
    fn test_typescript_script() {
        let options = HostOptions {
            typescript: true,
            ..HostOptions::default()
        };
        let mut ast = Ast::new();
        let parsed = EsHost
            .parse("let count: number = 0;\ninterface P { a: string }", &mut ast, &options)
            .unwrap();
        let stmts = body(&ast, parsed.program);
        assert_eq!(stmts.len(), 2);
        assert_eq!(ast.kind(stmts[1]).type_name(), "TSInterfaceDeclaration");

        let mut ast = Ast::new();
        assert!(EsHost.parse("let count: number = 0;", &mut ast, &HostOptions::default()).is_err());
    }

    #[test]
    fn test_comments_come_from_the_parser() {
        let (_, parsed) = parse("a; // one\n/* two */ b;");
        let comments: Vec<(CommentKind, &str)> =
            parsed.comments.iter().map(|c| (c.kind, c.value.as_str())).collect();
        assert_eq!(comments, vec![(CommentKind::Line, " one"), (CommentKind::Block, " two ")]);
        assert_eq!(parsed.comments[1].range, Range::new(10, 19));
    }
}
