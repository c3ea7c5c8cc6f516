//! Type-aware sibling pass.
//!
//! Rewrites the component scripts at statement granularity into a plain script a type
//! checker understands, parses it, projects everything back onto the original document,
//! and then lets a list of restore processes undo each rewrite. A process that does not
//! match a statement simply does not apply there.

use crate::coords::{CoordinateIndex, Range};
use crate::dialect::{reactive_assignment_target, resolve_stores};
use crate::error::{Result, WeaveError};
use crate::host::HostParser;
use crate::node::{Ast, Comment, NodeId, NodeKind, Token, VariableKind};
use crate::pipeline::{ParseResult, ParserOptions};
use crate::scope::{ScopeId, ScopeManager};
use crate::text_document::{VirtualDocument, VirtualFile, VirtualFragment};
use tracing::{debug, trace};

const REACTIVE_HELPER: &str = "__reactive";
const STORE_HELPER: &str = "__store_value";

#[derive(Debug, Clone)]
pub struct TypeAwareResult {
    pub file: VirtualFile,
    pub ast: Ast,
    pub program: NodeId,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub scopes: ScopeManager,
    pub fragments: Vec<VirtualFragment>,
    /// Names of the restore processes that fired, in firing order.
    pub applied: Vec<&'static str>,
}

/// Original ranges of one `$: name = expr;` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactiveSite {
    pub name: String,
    pub statement: Range,
    pub label: Range,
    pub body: Range,
    pub assignment: Range,
    pub left: Range,
    pub right: Range,
}

impl ReactiveSite {
    fn collect(result: &ParseResult) -> Vec<ReactiveSite> {
        let ast = &result.ast;
        let mut sites = Vec::new();
        for statement in ast.children(result.program) {
            let Some(left) = reactive_assignment_target(ast, statement) else {
                continue;
            };
            let Some(name) = ast.identifier_name(left) else {
                continue;
            };
            if !result.dialect.reactive.iter().any(|r| r == name) {
                continue;
            }
            let NodeKind::LabeledStatement { label, body } = ast.kind(statement) else {
                continue;
            };
            let NodeKind::ExpressionStatement { expression } = ast.kind(*body) else {
                continue;
            };
            let NodeKind::AssignmentExpression { right, .. } = ast.kind(*expression) else {
                continue;
            };
            sites.push(ReactiveSite {
                name: name.to_string(),
                statement: ast.range(statement),
                label: ast.range(*label),
                body: ast.range(*body),
                assignment: ast.range(*expression),
                left: ast.range(left),
                right: ast.range(*right),
            });
        }
        sites
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreProcess {
    /// `let x = __reactive(() => (expr));` back to `$: x = expr;`
    Reactive(ReactiveSite),
    /// `let $x = __store_value(x);` removed.
    StoreStandIn { name: String },
}

struct ReactiveShape {
    identifier: NodeId,
    callee: NodeId,
    arrow: NodeId,
    expression: NodeId,
}

struct ProcessContext<'a> {
    ast: &'a mut Ast,
    scopes: &'a mut ScopeManager,
    coords: &'a CoordinateIndex,
    program: NodeId,
    top: ScopeId,
    tokens: &'a mut Vec<Token>,
    original_tokens: &'a [Token],
}

/// `let <id> = <callee>(<args>);` with a single declarator.
fn single_let_call(ast: &Ast, statement: NodeId) -> Option<(NodeId, NodeId, &[NodeId])> {
    let NodeKind::VariableDeclaration {
        kind: VariableKind::Let,
        declarations,
    } = ast.kind(statement)
    else {
        return None;
    };
    let [declarator] = declarations.as_slice() else {
        return None;
    };
    let NodeKind::VariableDeclarator { id, init: Some(init) } = ast.kind(*declarator) else {
        return None;
    };
    let NodeKind::CallExpression { callee, arguments, .. } = ast.kind(*init) else {
        return None;
    };
    Some((*id, *callee, arguments.as_slice()))
}

impl RestoreProcess {
    pub fn name(&self) -> &'static str {
        match self {
            RestoreProcess::Reactive(_) => "reactive",
            RestoreProcess::StoreStandIn { .. } => "store-stand-in",
        }
    }

    fn reactive_shape(site: &ReactiveSite, ast: &Ast, statement: NodeId) -> Option<ReactiveShape> {
        if ast.range(statement).start != site.statement.start {
            return None;
        }
        let (identifier, callee, arguments) = single_let_call(ast, statement)?;
        if ast.identifier_name(identifier) != Some(site.name.as_str())
            || ast.identifier_name(callee) != Some(REACTIVE_HELPER)
        {
            return None;
        }
        let [arrow] = arguments else {
            return None;
        };
        match ast.kind(*arrow) {
            NodeKind::ArrowFunctionExpression {
                params,
                body,
                expression: true,
                ..
            } if params.is_empty() => Some(ReactiveShape {
                identifier,
                callee,
                arrow: *arrow,
                expression: *body,
            }),
            _ => None,
        }
    }

    fn store_shape(name: &str, ast: &Ast, statement: NodeId) -> bool {
        let Some((identifier, callee, arguments)) = single_let_call(ast, statement) else {
            return false;
        };
        let prefixed = ast
            .identifier_name(identifier)
            .and_then(|n| n.strip_prefix('$'));
        match arguments {
            [argument] => {
                prefixed == Some(name)
                    && ast.identifier_name(callee) == Some(STORE_HELPER)
                    && ast.identifier_name(*argument) == Some(name)
            }
            _ => false,
        }
    }

    pub fn matches(&self, ast: &Ast, statement: NodeId) -> bool {
        match self {
            RestoreProcess::Reactive(site) => Self::reactive_shape(site, ast, statement).is_some(),
            RestoreProcess::StoreStandIn { name } => Self::store_shape(name, ast, statement),
        }
    }

    fn apply(&self, cx: &mut ProcessContext<'_>, statement: NodeId) -> Result<()> {
        match self {
            RestoreProcess::Reactive(site) => {
                let shape = Self::reactive_shape(site, cx.ast, statement).ok_or_else(|| {
                    WeaveError::shape("reactive rewrite changed shape", site.statement.start, cx.coords)
                })?;
                let ast = &mut *cx.ast;
                let label = ast.alloc(NodeKind::Identifier { name: "$".into() }, site.label);
                ast.set_range(label, site.label, cx.coords);
                ast.set_range(shape.identifier, site.left, cx.coords);
                let assignment = ast.alloc(
                    NodeKind::AssignmentExpression {
                        operator: "=".into(),
                        left: shape.identifier,
                        right: shape.expression,
                    },
                    site.assignment,
                );
                ast.set_range(assignment, site.assignment, cx.coords);
                let body = ast.alloc(NodeKind::ExpressionStatement { expression: assignment }, site.body);
                ast.set_range(body, site.body, cx.coords);
                let labeled = ast.alloc(NodeKind::LabeledStatement { label, body }, site.statement);
                ast.set_range(labeled, site.statement, cx.coords);
                if !ast.replace_child(cx.program, statement, labeled) {
                    return Err(WeaveError::shape(
                        "reactive statement is not top-level",
                        site.statement.start,
                        cx.coords,
                    ));
                }

                if let Some(scope) = cx.scopes.acquire(shape.arrow) {
                    cx.scopes.merge_scope(scope, cx.top);
                }
                cx.scopes.remove_reference(shape.callee, cx.top);

                cx.tokens.extend(
                    cx.original_tokens
                        .iter()
                        .filter(|t| site.statement.contains(t.range) && !site.right.contains(t.range))
                        .cloned(),
                );
                cx.tokens.sort_by_key(|t| t.range.start);
            }
            RestoreProcess::StoreStandIn { .. } => {
                for id in cx.ast.descendants(statement) {
                    if cx.ast.identifier_name(id).is_some() {
                        cx.scopes.remove_reference(id, cx.top);
                    }
                }
                cx.ast.detach(statement);
            }
        }
        Ok(())
    }
}

/// Text-level pass over the scripts of an already woven document.
pub fn analyze_type_aware(
    source: &str,
    result: &ParseResult,
    host: &dyn HostParser,
    options: &ParserOptions,
) -> Result<TypeAwareResult> {
    let sites = ReactiveSite::collect(result);
    let mut scripts = result.scripts.clone();
    scripts.sort_by_key(|script| script.content.start);

    let mut document = VirtualDocument::new(source);
    for script in &scripts {
        document.skip_up_to(script.content.start);
        for site in sites.iter().filter(|s| script.content.contains(s.statement)) {
            document.copy_up_to(site.statement.start);
            document.skip_up_to(site.right.start);
            document.append_synthetic(
                "reactive",
                &format!("let {} = {REACTIVE_HELPER}(() => (", site.name),
            );
            document.copy_up_to(site.right.end);
            document.skip_up_to(site.statement.end);
            document.append_synthetic("reactive", "));");
        }
        document.copy_up_to(script.content.end);
        document.append_synthetic("separator", "\n;\n");
    }
    for name in &result.dialect.stores {
        document.append_synthetic("store", &format!("\nlet ${name} = {STORE_HELPER}({name});"));
    }
    let text = document.finish();

    let coords = CoordinateIndex::new(source);
    let typescript = scripts.iter().any(|s| s.is_typescript());
    let host_options = options.host_options(typescript);
    let mut ast = Ast::new();
    let parsed = host
        .parse(&text.text, &mut ast, &host_options)
        .map_err(|err| WeaveError::syntax(err.message, text.error_offset(err.offset), &coords))?;
    let mut scopes = parsed.scopes;
    let program = parsed.program;

    for statement in ast.children(program) {
        if matches!(ast.kind(statement), NodeKind::EmptyStatement) && text.is_synthetic(ast.range(statement)) {
            ast.detach(statement);
        }
    }
    for id in ast.descendants(program).into_iter().skip(1) {
        let generated = ast.range(id);
        let original = text.map_range(generated).unwrap_or_else(|| {
            let at = text.error_offset(generated.start);
            Range::new(at, at)
        });
        ast.set_range(id, original, &coords);
    }
    let program_range = match (scripts.first(), scripts.last()) {
        (Some(first), Some(last)) => Range::new(first.content.start, last.content.end),
        _ => Range::new(0, 0),
    };
    ast.set_range(program, program_range, &coords);
    let mut tokens = text.project(parsed.tokens, &coords);
    let comments = text.project(parsed.comments, &coords);

    let mut pending: Vec<RestoreProcess> = sites.into_iter().map(RestoreProcess::Reactive).collect();
    pending.extend(
        result
            .dialect
            .stores
            .iter()
            .map(|name| RestoreProcess::StoreStandIn { name: name.clone() }),
    );
    let registered = pending.len();

    let top = scopes.top_scope();
    let mut applied = Vec::new();
    {
        let mut cx = ProcessContext {
            ast: &mut ast,
            scopes: &mut scopes,
            coords: &coords,
            program,
            top,
            tokens: &mut tokens,
            original_tokens: &result.tokens,
        };
        for statement in cx.ast.children(program) {
            let Some(index) = pending.iter().position(|p| p.matches(&*cx.ast, statement)) else {
                continue;
            };
            let process = pending.remove(index);
            process.apply(&mut cx, statement)?;
            trace!(process = process.name(), "restore process applied");
            applied.push(process.name());
        }
    }
    if applied.contains(&"store-stand-in") {
        resolve_stores(&mut scopes);
    }

    debug!(
        registered,
        applied = applied.len(),
        length = text.text.len(),
        "type-aware document restored"
    );
    Ok(TypeAwareResult {
        file: VirtualFile::new(&options.file_path, typescript, text.text.clone()),
        ast,
        program,
        tokens,
        comments,
        scopes,
        fragments: text.fragments,
        applied,
    })
}
