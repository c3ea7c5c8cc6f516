//! # Tree Restorer
//!
//! One pass over the host parse of a virtual script. Restore tasks are matched to nodes
//! by start offset on the way down and applied on the way up; whatever scaffolding is
//! left afterwards is either remapped onto original coordinates or deleted.

use crate::coords::Range;
use crate::error::{Result, WeaveError};
use crate::node::{Comment, NodeId, NodeKind, Ranged, Token};
use crate::virtual_script::{RestoreContext, RestoreTask, VirtualScript};
use std::collections::VecDeque;
use tracing::debug;

/// Sorted items that tasks take out of by range.
struct Cursor<T> {
    starts: Vec<usize>,
    items: Vec<Option<T>>,
}

impl<T: Ranged> Cursor<T> {
    fn new(mut items: Vec<T>) -> Self {
        items.sort_by_key(|item| item.range().start);
        Cursor {
            starts: items.iter().map(|item| item.range().start).collect(),
            items: items.into_iter().map(Some).collect(),
        }
    }

    fn take_within(&mut self, range: Range) -> Vec<T> {
        let first = self.starts.partition_point(|&start| start < range.start);
        let mut taken = Vec::new();
        for index in first..self.items.len() {
            if self.starts[index] >= range.end {
                break;
            }
            let inside = self.items[index]
                .as_ref()
                .is_some_and(|item| item.range().end <= range.end);
            if inside {
                taken.extend(self.items[index].take());
            }
        }
        taken
    }

    fn remaining(self) -> impl Iterator<Item = T> {
        self.items.into_iter().flatten()
    }
}

pub struct Restored {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

struct Restorer<'c, 'a> {
    cx: &'c mut RestoreContext<'a>,
    tasks: VecDeque<RestoreTask>,
    tokens: Cursor<Token>,
    comments: Cursor<Comment>,
    restored_tokens: Vec<Token>,
    restored_comments: Vec<Comment>,
}

impl Restorer<'_, '_> {
    fn walk(&mut self, node: NodeId) -> Result<()> {
        let range = self.cx.ast.range(node);
        let task = match self.tasks.front() {
            Some(next) if range.start >= next.start() => self.tasks.pop_front(),
            _ => None,
        };
        if let Some(task) = &task {
            if task.range != range {
                return Err(WeaveError::shape(
                    format!(
                        "wrapper at {}..{} matched {} at {}..{}",
                        task.range.start,
                        task.range.end,
                        self.cx.ast.kind(node).type_name(),
                        range.start,
                        range.end
                    ),
                    task.anchor,
                    self.cx.coords,
                ));
            }
        }

        for child in self.cx.ast.children(node) {
            self.walk(child)?;
        }

        if let Some(task) = task {
            let tokens = self.tokens.take_within(task.range);
            let comments = self.comments.take_within(task.range);
            let (tokens, comments) = task.apply(self.cx, node, tokens, comments)?;
            self.restored_tokens.extend(tokens);
            self.restored_comments.extend(comments);
        }
        Ok(())
    }
}

/// Restores the host parse of `script` in place.
///
/// On return every statement left in `program` is real script content in original
/// coordinates, `markup_roots` are appended to the program body, and the program range
/// spans the real content only.
pub fn restore(
    cx: &mut RestoreContext<'_>,
    mut script: VirtualScript,
    program: NodeId,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    markup_roots: &[NodeId],
) -> Result<Restored> {
    let tasks = std::mem::take(&mut script.tasks);
    let task_count = tasks.len();

    let mut restorer = Restorer {
        cx,
        tasks: tasks.into(),
        tokens: Cursor::new(tokens),
        comments: Cursor::new(comments),
        restored_tokens: Vec::new(),
        restored_comments: Vec::new(),
    };
    for statement in restorer.cx.ast.children(program) {
        restorer.walk(statement)?;
    }
    if let Some(task) = restorer.tasks.pop_front() {
        return Err(WeaveError::shape(
            "wrapper was not produced by the host parser",
            task.anchor,
            restorer.cx.coords,
        ));
    }

    let Restorer {
        cx,
        tokens,
        comments,
        mut restored_tokens,
        mut restored_comments,
        ..
    } = restorer;

    cleanup_statements(cx, &script, program)?;

    restored_tokens.extend(remap_leftovers(tokens.remaining(), &script, cx));
    restored_comments.extend(remap_leftovers(comments.remaining(), &script, cx));
    restored_tokens.sort_by_key(|t| t.range.start);
    restored_comments.sort_by_key(|c| c.range.start);

    for &root in markup_roots {
        cx.ast.push_child(program, root);
    }
    let mut ordered = cx.ast.children(program);
    ordered.sort_by_key(|&id| cx.ast.range(id).start);
    if let NodeKind::Program { body, .. } = &mut cx.ast[program].kind {
        *body = ordered;
    }

    let program_range = content_range(cx, program, &restored_tokens, &restored_comments);
    cx.ast.set_range(program, program_range, cx.coords);

    debug!(
        tasks = task_count,
        tokens = restored_tokens.len(),
        comments = restored_comments.len(),
        "restored virtual script"
    );
    Ok(Restored {
        tokens: restored_tokens,
        comments: restored_comments,
    })
}

/// Deletes scaffolding statements and remaps the surviving script statements.
fn cleanup_statements(cx: &mut RestoreContext<'_>, script: &VirtualScript, program: NodeId) -> Result<()> {
    let has_content = |cx: &RestoreContext<'_>, range: Range| {
        script
            .mapped_spans(range)
            .iter()
            .any(|span| !cx.coords.slice(*span).trim().is_empty())
    };

    for statement in cx.ast.children(program) {
        let range = cx.ast.range(statement);
        if range.end > script.sentinel {
            if range.start < script.sentinel || has_content(cx, range) {
                let at = script.error_offset(range.start);
                return Err(WeaveError::unterminated(
                    format!("{} runs past the end of the document", cx.ast.kind(statement).type_name()),
                    at,
                    cx.coords,
                ));
            }
            cx.ast.detach(statement);
            continue;
        }
        if script.map_start(range.start).is_none() {
            if has_content(cx, range) {
                return Err(WeaveError::shape(
                    format!("{} starts inside scaffolding", cx.ast.kind(statement).type_name()),
                    script.error_offset(range.start),
                    cx.coords,
                ));
            }
            cx.ast.detach(statement);
            continue;
        }
        for id in cx.ast.descendants(statement) {
            if !cx.visited.insert(id) {
                continue;
            }
            let generated = cx.ast.range(id);
            let original = script.map_range(generated).ok_or_else(|| {
                WeaveError::shape(
                    format!("{} has no original text", cx.ast.kind(id).type_name()),
                    script.error_offset(generated.start),
                    cx.coords,
                )
            })?;
            cx.ast.set_range(id, original, cx.coords);
        }
    }
    Ok(())
}

/// Maps tokens or comments that lie entirely on copied text; drops the rest.
fn remap_leftovers<T: Ranged>(
    items: impl Iterator<Item = T>,
    script: &VirtualScript,
    cx: &RestoreContext<'_>,
) -> Vec<T> {
    items
        .filter_map(|mut item| {
            let range = item.range();
            let start = script.map_start(range.start)?;
            let end = script.map_end(range.end)?;
            if end < start || end - start != range.len() {
                return None;
            }
            item.relocate(Range::new(start, end), cx.coords);
            Some(item)
        })
        .collect()
}

fn content_range(cx: &RestoreContext<'_>, program: NodeId, tokens: &[Token], comments: &[Comment]) -> Range {
    let statements = cx.ast.children(program);
    let starts = statements
        .first()
        .map(|&id| cx.ast.range(id).start)
        .into_iter()
        .chain(tokens.first().map(|t| t.range.start))
        .chain(comments.first().map(|c| c.range.start));
    let ends = statements
        .last()
        .map(|&id| cx.ast.range(id).end)
        .into_iter()
        .chain(tokens.last().map(|t| t.range.end))
        .chain(comments.last().map(|c| c.range.end));
    match (starts.min(), ends.max()) {
        (Some(start), Some(end)) => Range::new(start, end.max(start)),
        _ => Range::new(0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{CoordinateIndex, SourceLocation};
    use crate::node::{Ast, SourceType, TokenKind};
    use crate::scope::ScopeManager;
    use crate::virtual_script::VirtualScriptBuilder;
    use pretty_assertions::assert_eq;

    fn token(value: &str, start: usize) -> Token {
        Token {
            kind: TokenKind::Punctuator,
            value: value.to_string(),
            range: Range::new(start, start + value.len()),
            loc: SourceLocation::default(),
        }
    }

    #[test]
    fn test_cursor_takes_each_item_once() {
        let mut cursor = Cursor::new(vec![token(")", 5), token("(", 0), token("a", 1), token(";", 6)]);
        let first: Vec<String> = cursor
            .take_within(Range::new(0, 6))
            .into_iter()
            .map(|t| t.value)
            .collect();
        assert_eq!(first, vec!["(", "a", ")"]);
        assert!(cursor.take_within(Range::new(0, 6)).is_empty());
        let rest: Vec<String> = cursor.remaining().map(|t| t.value).collect();
        assert_eq!(rest, vec![";"]);
    }

    #[test]
    fn test_statement_crossing_sentinel_is_unterminated() {
        let source = "foo";
        let coords = CoordinateIndex::new(source);
        let mut builder = VirtualScriptBuilder::new(source);
        builder.copy_original(Range::new(0, 3));
        builder.mark_sentinel();
        builder.append_synthetic("\n;");
        let script = builder.finish();

        let mut ast = Ast::new();
        let ident = ast.alloc(NodeKind::Identifier { name: "foo".into() }, Range::new(0, 3));
        let statement = ast.alloc(NodeKind::ExpressionStatement { expression: ident }, Range::new(0, 5));
        let program = ast.alloc(
            NodeKind::Program {
                body: vec![statement],
                source_type: SourceType::Module,
            },
            Range::new(0, 5),
        );
        let mut scopes = ScopeManager::new();
        let mut cx = RestoreContext::new(&mut ast, &mut scopes, &coords);
        let err = restore(&mut cx, script, program, Vec::new(), Vec::new(), &[])
            .err()
            .unwrap();
        assert!(matches!(err, WeaveError::UnterminatedForeignConstruct { index: 0, .. }));
    }

    #[test]
    fn test_padding_statements_are_dropped() {
        let source = "a";
        let coords = CoordinateIndex::new(source);
        let mut builder = VirtualScriptBuilder::new(source);
        builder.copy_original(Range::new(0, 1));
        builder.append_synthetic("\n;\n");
        builder.mark_sentinel();
        builder.append_synthetic("\n;");
        let script = builder.finish();
        assert_eq!(script.text, "a\n;\n\n;");

        let mut ast = Ast::new();
        let ident = ast.alloc(NodeKind::Identifier { name: "a".into() }, Range::new(0, 1));
        let statement = ast.alloc(NodeKind::ExpressionStatement { expression: ident }, Range::new(0, 3));
        let padding = ast.alloc(NodeKind::EmptyStatement, Range::new(5, 6));
        let program = ast.alloc(
            NodeKind::Program {
                body: vec![statement, padding],
                source_type: SourceType::Module,
            },
            Range::new(0, 6),
        );
        let mut scopes = ScopeManager::new();
        let mut cx = RestoreContext::new(&mut ast, &mut scopes, &coords);
        restore(&mut cx, script, program, Vec::new(), Vec::new(), &[]).unwrap();
        assert_eq!(ast.children(program), vec![statement]);
        assert_eq!(ast.range(statement), Range::new(0, 1));
        assert_eq!(ast.range(program), Range::new(0, 1));
    }
}
