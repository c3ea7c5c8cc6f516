//! Foreign-dialect scope passes.
//!
//! Run over the restored tree and scope graph, in order: rune globals, store
//! indirections, reactive declarations, externally-writable bindings and snippet usage.
//! Every mutation goes through the [`ScopeManager`] reconciler primitives.

use crate::node::{Ast, DirectiveKind, ElementKind, NodeId, NodeKind, VariableKind};
use crate::scope::{ScopeId, ScopeManager, VirtualAccess};
use crate::template::TemplateDocument;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref RUNE_CALL: Regex =
        Regex::new(r"\$(?:state|derived|effect|props|bindable|inspect|host)(?:\.[A-Za-z]+)?\s*\(").unwrap();
    static ref STORE_NAME: Regex = Regex::new(r"^\$[A-Za-z_][A-Za-z0-9_$]*$").unwrap();
}

pub const RUNES: &[&str] = &[
    "$state",
    "$derived",
    "$effect",
    "$props",
    "$bindable",
    "$inspect",
    "$host",
];

/// Implicit bindings of legacy components.
const LEGACY_GLOBALS: &[&str] = &["$$props", "$$restProps", "$$slots"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialectReport {
    pub runes: bool,
    /// Underlying names of resolved `$name` store reads.
    pub stores: Vec<String>,
    /// Names reclassified from `$:` assignments.
    pub reactive: Vec<String>,
    /// Names given a virtual write reference.
    pub externally_writable: Vec<String>,
}

/// Decides runes mode: explicit option, then config flag, then rune calls in the scripts.
pub fn detect_runes(
    source: &str,
    document: &TemplateDocument,
    option: Option<bool>,
    config: Option<bool>,
) -> bool {
    option.or(config).unwrap_or_else(|| {
        document.scripts.iter().any(|script| {
            source
                .get(script.content.start..script.content.end)
                .is_some_and(|text| RUNE_CALL.is_match(text))
        })
    })
}

/// Identifiers bound by a binding pattern, in source order.
pub fn binding_identifiers(ast: &Ast, pattern: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![pattern];
    while let Some(id) = stack.pop() {
        match ast.kind(id) {
            NodeKind::Identifier { .. } => out.push(id),
            NodeKind::ObjectPattern { properties } => stack.extend(properties.iter().rev()),
            NodeKind::Property { value, .. } => stack.push(*value),
            NodeKind::ArrayPattern { elements } => stack.extend(elements.iter().rev().flatten()),
            NodeKind::AssignmentPattern { left, .. } => stack.push(*left),
            NodeKind::RestElement { argument } => stack.push(*argument),
            _ => {}
        }
    }
    out
}

pub fn apply(ast: &Ast, scopes: &mut ScopeManager, program: NodeId, runes: bool) -> DialectReport {
    let mut report = DialectReport {
        runes,
        ..DialectReport::default()
    };
    let top = scopes.top_scope();
    let global = scopes.global_scope();

    if runes {
        declare_globals(scopes, RUNES, global);
    } else {
        declare_globals(scopes, LEGACY_GLOBALS, top);
    }
    report.stores = resolve_stores(scopes);
    if !runes {
        report.reactive = declare_reactive_statements(ast, scopes, program, top);
    }
    report.externally_writable = mark_externally_writable(ast, scopes, program, top, runes);
    let snippets = mark_component_snippets(ast, scopes, program);

    debug!(
        runes,
        stores = report.stores.len(),
        reactive = report.reactive.len(),
        writable = report.externally_writable.len(),
        snippets,
        "applied dialect scope passes"
    );
    report
}

/// Declares each of `names` in `scope` when some unresolved reference uses it.
fn declare_globals(scopes: &mut ScopeManager, names: &[&str], scope: ScopeId) {
    let global = scopes.global_scope();
    for name in names {
        if scopes.through_names(global).contains(name) {
            scopes.declare_implicit(scope, name);
        }
    }
}

/// Resolves free `$name` references whose `name` is declared at the top scope to an
/// implicit `$name` variable, and gives `name` a virtual read at each of them.
pub fn resolve_stores(scopes: &mut ScopeManager) -> Vec<String> {
    let global = scopes.global_scope();
    let top = scopes.top_scope();
    let mut candidates: Vec<String> = scopes
        .through_names(global)
        .into_iter()
        .filter(|name| STORE_NAME.is_match(name))
        .map(str::to_string)
        .collect();
    candidates.sort();
    candidates.dedup();

    let mut resolved = Vec::new();
    for prefixed in candidates {
        let name = &prefixed[1..];
        let Some(&underlying) = scopes.scope(top).set.get(name) else {
            continue;
        };
        let store = scopes.declare_implicit(top, &prefixed);
        let sites: Vec<_> = scopes
            .variable(store)
            .references
            .iter()
            .map(|&r| {
                let reference = scopes.reference(r);
                (reference.identifier, reference.from)
            })
            .collect();
        for (identifier, from) in sites {
            scopes.synthesize_reference(identifier, underlying, from, VirtualAccess::READ);
        }
        resolved.push(name.to_string());
    }
    resolved
}

/// `$: x = …` at the top level declares `x` when nothing else does.
fn declare_reactive_statements(ast: &Ast, scopes: &mut ScopeManager, program: NodeId, top: ScopeId) -> Vec<String> {
    let mut declared = Vec::new();
    for statement in ast.children(program) {
        let Some(left) = reactive_assignment_target(ast, statement) else {
            continue;
        };
        for identifier in binding_identifiers(ast, left) {
            let unresolved = scopes
                .references_to(identifier)
                .find(|(_, r)| !r.is_virtual)
                .is_some_and(|(_, r)| r.resolved.is_none());
            if !unresolved {
                continue;
            }
            if scopes.declare_reactive(ast, top, identifier).is_some() {
                declared.extend(ast.identifier_name(identifier).map(str::to_string));
            }
        }
    }
    declared
}

/// Left side of `$: <left> = …`.
pub fn reactive_assignment_target(ast: &Ast, statement: NodeId) -> Option<NodeId> {
    let NodeKind::LabeledStatement { label, body } = ast.kind(statement) else {
        return None;
    };
    if ast.identifier_name(*label) != Some("$") {
        return None;
    }
    let NodeKind::ExpressionStatement { expression } = ast.kind(*body) else {
        return None;
    };
    match ast.kind(*expression) {
        NodeKind::AssignmentExpression { operator, left, .. } if operator == "=" => Some(*left),
        _ => None,
    }
}

fn is_props_call(ast: &Ast, init: Option<NodeId>) -> bool {
    let Some(init) = init else {
        return false;
    };
    match ast.kind(init) {
        NodeKind::CallExpression { callee, .. } => ast.identifier_name(*callee) == Some("$props"),
        _ => false,
    }
}

/// Props (`export let` or `$props()` destructuring) and `bind:` targets are written by
/// the component's parent.
fn mark_externally_writable(
    ast: &Ast,
    scopes: &mut ScopeManager,
    program: NodeId,
    top: ScopeId,
    runes: bool,
) -> Vec<String> {
    let mut targets: Vec<(NodeId, ScopeId)> = Vec::new();

    for statement in ast.children(program) {
        let declaration = match ast.kind(statement) {
            NodeKind::ExportNamedDeclaration { declaration: Some(d), .. } if !runes => *d,
            NodeKind::VariableDeclaration { .. } if runes => statement,
            _ => continue,
        };
        let NodeKind::VariableDeclaration { kind, declarations } = ast.kind(declaration) else {
            continue;
        };
        if *kind == VariableKind::Const && !runes {
            continue;
        }
        for &declarator in declarations {
            let NodeKind::VariableDeclarator { id, init } = ast.kind(declarator) else {
                continue;
            };
            if runes && !is_props_call(ast, *init) {
                continue;
            }
            targets.extend(binding_identifiers(ast, *id).into_iter().map(|ident| (ident, top)));
        }
    }

    for id in ast.descendants(program) {
        let NodeKind::MarkupDirective {
            directive: DirectiveKind::Bind,
            expression: Some(expression),
            ..
        } = ast.kind(id)
        else {
            continue;
        };
        if ast.identifier_name(*expression).is_none() {
            continue;
        }
        let from = scopes
            .references_to(*expression)
            .find(|(_, r)| !r.is_virtual)
            .map(|(_, r)| r.from);
        if let Some(from) = from {
            targets.push((*expression, from));
        }
    }

    let mut marked = Vec::new();
    for (identifier, scope) in targets {
        let Some(name) = ast.identifier_name(identifier) else {
            continue;
        };
        let Some(variable) = scopes.find_variable(scope, name) else {
            continue;
        };
        scopes.synthesize_reference(identifier, variable, scope, VirtualAccess::WRITE);
        marked.push(name.to_string());
    }
    marked
}

/// Snippets passed as component children are used by name only.
fn mark_component_snippets(ast: &Ast, scopes: &mut ScopeManager, program: NodeId) -> usize {
    let mut marked = 0;
    for id in ast.descendants(program) {
        let NodeKind::MarkupElement {
            element_kind: ElementKind::Component,
            children,
            ..
        } = ast.kind(id)
        else {
            continue;
        };
        for &child in children {
            let NodeKind::MarkupSnippetBlock { id: Some(name), .. } = ast.kind(child) else {
                continue;
            };
            let Some(upper) = scopes.acquire(child).and_then(|s| scopes.scope(s).upper) else {
                continue;
            };
            let Some(variable) = ast
                .identifier_name(*name)
                .and_then(|n| scopes.find_variable(upper, n))
            else {
                continue;
            };
            scopes.synthesize_reference(*name, variable, upper, VirtualAccess::READ);
            marked += 1;
        }
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Range;
    use crate::template::ScriptBlock;

    fn document(content: Range) -> TemplateDocument {
        TemplateDocument {
            scripts: vec![ScriptBlock {
                content,
                module: false,
                lang: None,
            }],
            nodes: Vec::new(),
        }
    }

    #[test]
    fn test_detect_runes_precedence() {
        let source = "<script>let count = $state(0);</script>";
        let doc = document(Range::new(8, 30));
        assert!(detect_runes(source, &doc, None, None));
        assert!(!detect_runes(source, &doc, Some(false), Some(true)));
        assert!(!detect_runes(source, &doc, None, Some(false)));

        let legacy = "<script>let count = 0;</script>";
        assert!(!detect_runes(legacy, &document(Range::new(8, 22)), None, None));
    }

    #[test]
    fn test_rune_pattern_accepts_members() {
        assert!(RUNE_CALL.is_match("let x = $state.raw([]);"));
        assert!(RUNE_CALL.is_match("$effect (() => {})"));
        assert!(!RUNE_CALL.is_match("let $stateful = 1;"));
    }
}
