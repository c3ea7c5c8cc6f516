//! # Virtual Script Builder
//!
//! Accumulates the synthetic host script: verbatim copies of original spans interleaved
//! with scaffolding, a breakpoint table mapping copied spans back to the original
//! document, and one [`RestoreTask`] per wrapper.
//!
//! ## Key Invariants
//!
//! 1. Breakpoints are strictly increasing in generated offset; inside one breakpoint the
//!    mapping is affine.
//! 2. Synthetic text has no breakpoint and can never be mapped back.
//! 3. A task's range is exactly the range of the host node its wrapper produces.

use crate::coords::{CoordinateIndex, Range};
use crate::error::{Result, WeaveError};
use crate::node::{Ast, Comment, NodeId, NodeKind, Ranged, SlotField, Token, VariableKind};
use crate::scope::ScopeManager;
use rustc_hash::FxHashSet;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub original: usize,
    pub generated: usize,
    pub len: usize,
}

/// The markup node and field a restored host sub-tree is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub owner: NodeId,
    pub field: SlotField,
}

impl Slot {
    pub fn new(owner: NodeId, field: SlotField) -> Self {
        Slot { owner, field }
    }
}

/// One original span copied into a wrapper, destined for `slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub slot: Slot,
    pub original: Range,
    pub generated: Range,
}

impl Fragment {
    pub fn delta(&self) -> isize {
        self.generated.start as isize - self.original.start as isize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreAction {
    /// `(<expr>);`
    Expression,
    /// `if (<test>) { … } else { … }`
    IfBlock { owner: NodeId, else_owner: Option<NodeId> },
    /// `Array.from(<expr>).forEach((<ctx>, <idx>) => { … });`
    EachBlock { owner: NodeId, synthetic_context: bool },
    /// `((<p1>, <p2>) => { … });`
    Callback { owner: NodeId },
    /// `function <id>(<params>) { … }`
    Snippet { owner: NodeId },
    /// `const <declarator>;`
    ConstTag,
}

impl RestoreAction {
    fn name(&self) -> &'static str {
        match self {
            RestoreAction::Expression => "expression",
            RestoreAction::IfBlock { .. } => "if-block",
            RestoreAction::EachBlock { .. } => "each-block",
            RestoreAction::Callback { .. } => "callback",
            RestoreAction::Snippet { .. } => "snippet",
            RestoreAction::ConstTag => "const-tag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreTask {
    /// Generated range of the wrapper statement.
    pub range: Range,
    /// Original offset of the construct, for diagnostics.
    pub anchor: usize,
    pub fragments: Vec<Fragment>,
    pub action: RestoreAction,
}

/// Mutable state shared by every task applied during one restore pass.
pub struct RestoreContext<'a> {
    pub ast: &'a mut Ast,
    pub scopes: &'a mut ScopeManager,
    /// Index over the original document.
    pub coords: &'a CoordinateIndex,
    pub visited: FxHashSet<NodeId>,
}

impl<'a> RestoreContext<'a> {
    pub fn new(ast: &'a mut Ast, scopes: &'a mut ScopeManager, coords: &'a CoordinateIndex) -> Self {
        RestoreContext {
            ast,
            scopes,
            coords,
            visited: FxHashSet::default(),
        }
    }

    /// Moves every not-yet-visited node under `root` back by `delta`.
    pub fn shift_subtree(&mut self, root: NodeId, delta: isize) {
        for id in self.ast.descendants(root) {
            if self.visited.insert(id) {
                let range = self.ast.range(id).shifted(delta);
                self.ast.set_range(id, range, self.coords);
            }
        }
    }
}

struct EachParts {
    array: NodeId,
    source: NodeId,
    callback: NodeId,
}

fn member_name(ast: &Ast, member: NodeId) -> Option<(NodeId, &str)> {
    match ast.kind(member) {
        NodeKind::MemberExpression { object, property, computed: false, .. } => {
            Some((*object, ast.identifier_name(*property)?))
        }
        _ => None,
    }
}

fn each_parts(ast: &Ast, statement: NodeId) -> Option<EachParts> {
    let NodeKind::ExpressionStatement { expression } = ast.kind(statement) else {
        return None;
    };
    let NodeKind::CallExpression { callee, arguments, .. } = ast.kind(*expression) else {
        return None;
    };
    let [callback] = arguments.as_slice() else {
        return None;
    };
    let (array_call, "forEach") = member_name(ast, *callee)? else {
        return None;
    };
    let NodeKind::CallExpression { callee, arguments, .. } = ast.kind(array_call) else {
        return None;
    };
    let [source] = arguments.as_slice() else {
        return None;
    };
    let (array, "from") = member_name(ast, *callee)? else {
        return None;
    };
    if ast.identifier_name(array) != Some("Array")
        || !matches!(ast.kind(*callback), NodeKind::ArrowFunctionExpression { .. })
    {
        return None;
    }
    Some(EachParts {
        array,
        source: *source,
        callback: *callback,
    })
}

impl RestoreTask {
    pub fn start(&self) -> usize {
        self.range.start
    }

    fn mismatch(&self, cx: &RestoreContext<'_>, node: NodeId) -> WeaveError {
        WeaveError::shape(
            format!(
                "{} wrapper produced {}",
                self.action.name(),
                cx.ast.kind(node).type_name()
            ),
            self.anchor,
            cx.coords,
        )
    }

    /// Host nodes corresponding to each fragment, in fragment order.
    fn match_shape(&self, ast: &Ast, node: NodeId) -> Option<Vec<NodeId>> {
        match &self.action {
            RestoreAction::Expression => match ast.kind(node) {
                NodeKind::ExpressionStatement { expression } if self.fragments.len() == 1 => {
                    Some(vec![*expression])
                }
                _ => None,
            },
            RestoreAction::IfBlock { .. } => match ast.kind(node) {
                NodeKind::IfStatement { test, .. } if self.fragments.len() == 1 => Some(vec![*test]),
                _ => None,
            },
            RestoreAction::EachBlock { .. } => {
                let parts = each_parts(ast, node)?;
                let NodeKind::ArrowFunctionExpression { params, .. } = ast.kind(parts.callback) else {
                    return None;
                };
                self.fragments
                    .iter()
                    .map(|f| match f.slot.field {
                        SlotField::Expression => Some(parts.source),
                        SlotField::Context => params.first().copied(),
                        SlotField::Index => params.get(1).copied(),
                        _ => None,
                    })
                    .collect()
            }
            RestoreAction::Callback { .. } => {
                let NodeKind::ExpressionStatement { expression } = ast.kind(node) else {
                    return None;
                };
                match ast.kind(*expression) {
                    NodeKind::ArrowFunctionExpression { params, .. } if params.len() == self.fragments.len() => {
                        Some(params.clone())
                    }
                    _ => None,
                }
            }
            RestoreAction::Snippet { .. } => match ast.kind(node) {
                NodeKind::FunctionDeclaration { id: Some(id), params, .. }
                    if params.len() + 1 == self.fragments.len() =>
                {
                    let mut targets = vec![*id];
                    targets.extend_from_slice(params);
                    Some(targets)
                }
                _ => None,
            },
            RestoreAction::ConstTag => match ast.kind(node) {
                NodeKind::VariableDeclaration { kind: VariableKind::Const, declarations }
                    if declarations.len() == 1 && self.fragments.len() == 1 =>
                {
                    Some(declarations.clone())
                }
                _ => None,
            },
        }
    }

    /// Keeps the items lying inside a fragment, moved onto original coordinates.
    fn relocate<T: Ranged>(&self, items: Vec<T>, coords: &CoordinateIndex) -> Vec<T> {
        items
            .into_iter()
            .filter_map(|mut item| {
                let range = item.range();
                let fragment = self.fragments.iter().find(|f| f.generated.contains(range))?;
                item.relocate(range.shifted(fragment.delta()), coords);
                Some(item)
            })
            .collect()
    }

    /// Restores the wrapper matched to `node`: shifts the real sub-trees, drops scaffolding
    /// tokens, reattaches sub-trees onto their markup slots, repairs scopes, and unlinks
    /// the wrapper statement.
    pub fn apply(
        self,
        cx: &mut RestoreContext<'_>,
        node: NodeId,
        tokens: Vec<Token>,
        comments: Vec<Comment>,
    ) -> Result<(Vec<Token>, Vec<Comment>)> {
        let targets = self
            .match_shape(cx.ast, node)
            .ok_or_else(|| self.mismatch(cx, node))?;

        for (fragment, &target) in self.fragments.iter().zip(&targets) {
            if !fragment.generated.contains(cx.ast.range(target)) {
                return Err(self.mismatch(cx, target));
            }
            cx.shift_subtree(target, fragment.delta());
        }
        let tokens = self.relocate(tokens, cx.coords);
        let comments = self.relocate(comments, cx.coords);

        self.reconcile_scopes(cx, node, &targets);

        for (fragment, &target) in self.fragments.iter().zip(&targets) {
            if !cx.ast.attach(fragment.slot.owner, fragment.slot.field, target) {
                return Err(self.mismatch(cx, fragment.slot.owner));
            }
        }
        cx.ast.detach(node);
        trace!(
            action = self.action.name(),
            start = self.anchor,
            tokens = tokens.len(),
            "restored wrapper"
        );
        Ok((tokens, comments))
    }

    fn reconcile_scopes(&self, cx: &mut RestoreContext<'_>, node: NodeId, targets: &[NodeId]) {
        match &self.action {
            RestoreAction::Expression | RestoreAction::ConstTag => {}
            RestoreAction::IfBlock { owner, else_owner } => {
                let NodeKind::IfStatement { consequent, alternate, .. } = cx.ast.kind(node) else {
                    return;
                };
                let (consequent, alternate) = (*consequent, *alternate);
                if let Some(scope) = cx.scopes.acquire(consequent) {
                    cx.scopes.register_node(*owner, scope);
                }
                if let (Some(alternate), Some(else_owner)) = (alternate, else_owner) {
                    if let Some(scope) = cx.scopes.acquire(alternate) {
                        cx.scopes.register_node(*else_owner, scope);
                    }
                }
            }
            RestoreAction::EachBlock { owner, synthetic_context } => {
                let Some(parts) = each_parts(cx.ast, node) else {
                    return;
                };
                let enclosing = cx.scopes.innermost_scope(cx.ast, node);
                if let Some(scope) = cx.scopes.acquire(parts.callback) {
                    if *synthetic_context {
                        if let NodeKind::ArrowFunctionExpression { params, .. } = cx.ast.kind(parts.callback) {
                            if let Some(&placeholder) = params.first() {
                                cx.scopes.remove_variable(cx.ast, placeholder, scope);
                            }
                        }
                    }
                    cx.scopes.register_node(*owner, scope);
                }
                cx.scopes.remove_reference(parts.array, enclosing);
            }
            RestoreAction::Callback { owner } => {
                let NodeKind::ExpressionStatement { expression } = cx.ast.kind(node) else {
                    return;
                };
                let Some(scope) = cx.scopes.acquire(*expression) else {
                    return;
                };
                if targets.is_empty() {
                    let children = cx.scopes.scope(scope).child_scopes.clone();
                    cx.scopes.replace_scope(scope, &children);
                } else {
                    cx.scopes.register_node(*owner, scope);
                }
            }
            RestoreAction::Snippet { owner } => {
                if let Some(scope) = cx.scopes.acquire(node) {
                    cx.scopes.register_node(*owner, scope);
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct VirtualScriptBuilder<'s> {
    source: &'s str,
    text: String,
    breakpoints: Vec<Breakpoint>,
    tasks: Vec<RestoreTask>,
    sentinel: Option<usize>,
}

impl<'s> VirtualScriptBuilder<'s> {
    pub fn new(source: &'s str) -> Self {
        VirtualScriptBuilder {
            source,
            text: String::with_capacity(source.len() * 2),
            breakpoints: Vec::new(),
            tasks: Vec::new(),
            sentinel: None,
        }
    }

    /// Current end of the generated text.
    pub fn offset(&self) -> usize {
        self.text.len()
    }

    /// Appends the original text at `range`, returning where it landed.
    pub fn copy_original(&mut self, range: Range) -> Range {
        let slice = self.source.get(range.start..range.end).unwrap_or("");
        let generated = Range::new(self.text.len(), self.text.len() + slice.len());
        let extends_last = self.breakpoints.last().is_some_and(|last| {
            last.generated + last.len == generated.start && last.original + last.len == range.start
        });
        match self.breakpoints.last_mut() {
            Some(last) if extends_last => last.len += slice.len(),
            _ if !slice.is_empty() => self.breakpoints.push(Breakpoint {
                original: range.start,
                generated: generated.start,
                len: slice.len(),
            }),
            _ => {}
        }
        self.text.push_str(slice);
        generated
    }

    pub fn copy_fragment(&mut self, slot: Slot, original: Range) -> Fragment {
        let generated = self.copy_original(original);
        Fragment {
            slot,
            original,
            generated,
        }
    }

    pub fn append_synthetic(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Registers a task covering everything generated since `start`.
    pub fn push_task(&mut self, start: usize, anchor: usize, fragments: Vec<Fragment>, action: RestoreAction) {
        self.tasks.push(RestoreTask {
            range: Range::new(start, self.text.len()),
            anchor,
            fragments,
            action,
        });
    }

    /// Marks the end of real content; top-level statements past this point are padding.
    pub fn mark_sentinel(&mut self) {
        self.sentinel = Some(self.text.len());
    }

    pub fn finish(self) -> VirtualScript {
        let mut tasks = self.tasks;
        // Outer wrappers start where their first inner node starts; enter them first.
        tasks.sort_by(|a, b| a.range.start.cmp(&b.range.start).then(b.range.end.cmp(&a.range.end)));
        let sentinel = self.sentinel.unwrap_or(self.text.len());
        VirtualScript {
            text: self.text,
            breakpoints: self.breakpoints,
            tasks,
            sentinel,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VirtualScript {
    pub text: String,
    pub breakpoints: Vec<Breakpoint>,
    pub tasks: Vec<RestoreTask>,
    pub sentinel: usize,
}

impl VirtualScript {
    pub fn map_start(&self, offset: usize) -> Option<usize> {
        self.breakpoints
            .iter()
            .find(|b| b.generated <= offset && offset < b.generated + b.len)
            .map(|b| b.original + (offset - b.generated))
    }

    pub fn map_end(&self, offset: usize) -> Option<usize> {
        self.breakpoints
            .iter()
            .find(|b| b.generated < offset && offset <= b.generated + b.len)
            .map(|b| b.original + (offset - b.generated))
    }

    /// Maps a generated range back; an end inside trailing scaffolding (an absorbed `;`)
    /// is pulled back to the last non-whitespace copied offset.
    pub fn map_range(&self, range: Range) -> Option<Range> {
        let start = self.map_start(range.start)?;
        let end = match self.map_end(range.end) {
            Some(end) => end,
            None => self
                .breakpoints
                .iter()
                .rev()
                .find(|b| b.generated + b.len <= range.end && b.generated + b.len > range.start)
                .map(|b| {
                    let from = b.generated.max(range.start);
                    let copied = &self.text[from..b.generated + b.len];
                    b.original + (from - b.generated) + copied.trim_end().len()
                })?,
        };
        Some(Range::new(start, end.max(start)))
    }

    /// Original ranges of every copied span overlapping `range`.
    pub fn mapped_spans(&self, range: Range) -> Vec<Range> {
        self.breakpoints
            .iter()
            .filter_map(|b| {
                let start = range.start.max(b.generated);
                let end = range.end.min(b.generated + b.len);
                (start < end).then(|| {
                    Range::new(b.original + (start - b.generated), b.original + (end - b.generated))
                })
            })
            .collect()
    }

    /// Best original position for a diagnostic raised at a generated offset.
    pub fn error_offset(&self, offset: usize) -> usize {
        if let Some(mapped) = self.map_start(offset) {
            return mapped;
        }
        let preceding = self
            .breakpoints
            .iter()
            .rev()
            .find(|b| b.generated + b.len <= offset)
            .map(|b| b.original + b.len);
        preceding
            .or_else(|| self.breakpoints.first().map(|b| b.original))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_copy_merges_contiguous_spans() {
        let source = "abcdef";
        let mut builder = VirtualScriptBuilder::new(source);
        builder.copy_original(Range::new(0, 2));
        builder.copy_original(Range::new(2, 4));
        builder.append_synthetic("();");
        builder.copy_original(Range::new(5, 6));
        let script = builder.finish();
        assert_eq!(script.text, "abcd();f");
        assert_eq!(
            script.breakpoints,
            vec![
                Breakpoint { original: 0, generated: 0, len: 4 },
                Breakpoint { original: 5, generated: 7, len: 1 },
            ]
        );
    }

    #[test]
    fn test_synthetic_text_never_maps() {
        let source = "<p>{count}</p>";
        let mut builder = VirtualScriptBuilder::new(source);
        builder.append_synthetic("(");
        builder.copy_original(Range::new(4, 9));
        builder.append_synthetic(");");
        let script = builder.finish();
        assert_eq!(script.text, "(count);");
        assert_eq!(script.map_start(0), None);
        assert_eq!(script.map_start(1), Some(4));
        assert_eq!(script.map_end(6), Some(9));
        assert_eq!(script.map_end(7), None);
        assert_eq!(script.map_range(Range::new(1, 6)), Some(Range::new(4, 9)));
        assert_eq!(script.map_range(Range::new(1, 8)), Some(Range::new(4, 9)), "absorbed tail");
        assert_eq!(script.map_range(Range::new(6, 8)), None);
        assert_eq!(script.mapped_spans(Range::new(0, 8)), vec![Range::new(4, 9)]);
    }

    #[test]
    fn test_absorbed_tail_skips_trailing_whitespace() {
        let source = "<script>\nlet a = 1\n\n</script>";
        let mut builder = VirtualScriptBuilder::new(source);
        builder.copy_original(Range::new(8, 20));
        builder.append_synthetic("\n;\n");
        let script = builder.finish();
        assert_eq!(script.text, "\nlet a = 1\n\n\n;\n");
        let mapped = script.map_range(Range::new(1, 14)).unwrap();
        assert_eq!(&source[mapped.start..mapped.end], "let a = 1");
    }

    #[test]
    fn test_error_offset_falls_back_to_preceding_copy() {
        let source = "{a +}";
        let mut builder = VirtualScriptBuilder::new(source);
        builder.append_synthetic("(");
        builder.copy_original(Range::new(1, 4));
        builder.append_synthetic(");");
        let script = builder.finish();
        assert_eq!(script.error_offset(2), 2);
        assert_eq!(script.error_offset(4), 4);
        assert_eq!(script.error_offset(0), 1);
    }

    #[test]
    fn test_tasks_sorted_outer_first() {
        let source = "xy";
        let mut builder = VirtualScriptBuilder::new(source);
        let ast_owner = NodeId(0);
        let start = builder.offset();
        builder.append_synthetic("if (");
        let test = builder.copy_fragment(Slot::new(ast_owner, SlotField::Expression), Range::new(0, 1));
        builder.append_synthetic(") {");
        let inner = builder.offset();
        builder.append_synthetic("(");
        let expr = builder.copy_fragment(Slot::new(NodeId(1), SlotField::Expression), Range::new(1, 2));
        builder.append_synthetic(");");
        builder.push_task(inner, 1, vec![expr], RestoreAction::Expression);
        builder.append_synthetic("}");
        builder.push_task(start, 0, vec![test], RestoreAction::IfBlock { owner: ast_owner, else_owner: None });
        builder.mark_sentinel();
        builder.append_synthetic("\n;");
        let script = builder.finish();
        assert_eq!(script.text, "if (x) {(y);}\n;");
        assert_eq!(script.tasks[0].range, Range::new(0, 13));
        assert_eq!(script.tasks[1].range, Range::new(8, 12));
        assert_eq!(script.sentinel, 13);
        assert_eq!(test.delta(), 4);
    }
}
