//! Builds the virtual script for a template document.
//!
//! The [`Weaver`] walks the template once. Every node becomes a markup node in the shared
//! arena, and every embedded expression or pattern is copied into a host-language wrapper
//! whose own scoping mirrors the construct it came from.

use crate::coords::{CoordinateIndex, Range};
use crate::error::{HostError, WeaveError};
use crate::node::{Ast, DirectiveKind, ElementKind, NodeId, NodeKind, SlotField};
use crate::template::{
    AttributeNode, AttributeValue, AwaitBlockNode, AwaitBranchNode, ConstTagNode, EachBlockNode, ElementNode,
    IfBlockNode, KeyBlockNode, MustacheNode, RenderTagNode, SnippetBlockNode, TemplateDocument, TemplateNode,
    TemplateVisitor, TextNode,
};
use crate::virtual_script::{Fragment, RestoreAction, Slot, VirtualScript, VirtualScriptBuilder};

/// Terminates a copied script block so nothing inside it can swallow the wrappers.
const SCRIPT_TERMINATOR: &str = "\n;\n";
/// Placeholder parameter for `{#each}` blocks with an index but no context.
pub const EACH_PLACEHOLDER: &str = "__each_item";

pub struct Woven {
    pub script: VirtualScript,
    /// Top-level markup nodes, in document order.
    pub roots: Vec<NodeId>,
}

/// Builds the virtual script for `document` and allocates its markup nodes into `ast`.
pub fn weave(source: &str, document: &TemplateDocument, ast: &mut Ast, coords: &CoordinateIndex) -> Woven {
    let mut weaver = Weaver {
        ast,
        coords,
        builder: VirtualScriptBuilder::new(source),
        stack: Vec::new(),
        roots: Vec::new(),
    };

    let mut scripts: Vec<_> = document.scripts.iter().collect();
    scripts.sort_by_key(|script| script.content.start);
    for script in scripts {
        weaver.builder.copy_original(script.content);
        weaver.builder.append_synthetic(SCRIPT_TERMINATOR);
    }

    weaver.visit_children(&document.nodes);
    weaver.builder.mark_sentinel();
    weaver.builder.append_synthetic("\n;");

    Woven {
        script: weaver.builder.finish(),
        roots: weaver.roots,
    }
}

/// Translates a host parse failure on `script` into original coordinates.
pub fn translate_host_error(error: HostError, script: &VirtualScript, coords: &CoordinateIndex) -> WeaveError {
    WeaveError::syntax(error.message, script.error_offset(error.offset), coords)
}

struct Weaver<'s, 'a> {
    ast: &'a mut Ast,
    coords: &'a CoordinateIndex,
    builder: VirtualScriptBuilder<'s>,
    /// Markup nodes whose children are being visited.
    stack: Vec<NodeId>,
    roots: Vec<NodeId>,
}

impl Weaver<'_, '_> {
    fn alloc(&mut self, kind: NodeKind, range: Range) -> NodeId {
        let id = self.ast.alloc(kind, range);
        self.ast.set_range(id, range, self.coords);
        id
    }

    /// Appends `id` to the markup node currently being filled.
    fn place(&mut self, id: NodeId) {
        match self.stack.last() {
            Some(&parent) => {
                self.ast.push_child(parent, id);
            }
            None => self.roots.push(id),
        }
    }

    fn link(&mut self, owner: NodeId, child: NodeId, set: impl FnOnce(&mut NodeKind, NodeId)) {
        set(&mut self.ast[owner].kind, child);
        self.ast[child].parent = Some(owner);
    }

    fn visit_within(&mut self, owner: NodeId, children: &[TemplateNode]) {
        self.stack.push(owner);
        self.visit_children(children);
        self.stack.pop();
    }

    /// `(<expr>);`
    fn wrap_expression(&mut self, owner: NodeId, field: SlotField, range: Range) {
        let start = self.builder.offset();
        self.builder.append_synthetic("(");
        let fragment = self.builder.copy_fragment(Slot::new(owner, field), range);
        self.builder.append_synthetic(");");
        self.builder
            .push_task(start, range.start, vec![fragment], RestoreAction::Expression);
        self.builder.append_synthetic("\n");
    }

    fn copy_list(&mut self, params: &[(Slot, Range)]) -> Vec<Fragment> {
        let mut fragments = Vec::with_capacity(params.len());
        for (i, (slot, range)) in params.iter().enumerate() {
            if i > 0 {
                self.builder.append_synthetic(", ");
            }
            fragments.push(self.builder.copy_fragment(*slot, *range));
        }
        fragments
    }

    /// `((<p1>, <p2>) => { … });` around `children`, filled into `owner`.
    fn wrap_callback(
        &mut self,
        owner: NodeId,
        anchor: usize,
        mut params: Vec<(Slot, Range)>,
        children: &[TemplateNode],
    ) {
        params.sort_by_key(|(_, range)| range.start);
        let start = self.builder.offset();
        self.builder.append_synthetic("((");
        let fragments = self.copy_list(&params);
        self.builder.append_synthetic(") => {\n");
        self.visit_within(owner, children);
        self.builder.append_synthetic("});");
        self.builder
            .push_task(start, anchor, fragments, RestoreAction::Callback { owner });
        self.builder.append_synthetic("\n");
    }

    /// Allocates an attribute and collects the expression slots it needs wrapped.
    fn alloc_attribute(&mut self, attribute: &AttributeNode, pending: &mut Vec<(Slot, Range)>) -> NodeId {
        match attribute {
            AttributeNode::Attribute(attr) => {
                let mut value = Vec::with_capacity(attr.value.len());
                for part in &attr.value {
                    match part {
                        AttributeValue::Text { range, value: text } => {
                            value.push(self.alloc(NodeKind::MarkupText { value: text.clone() }, *range));
                        }
                        AttributeValue::Mustache { range, expression } => {
                            let tag = self.alloc(
                                NodeKind::MarkupMustacheTag {
                                    raw: false,
                                    expression: None,
                                },
                                *range,
                            );
                            pending.push((Slot::new(tag, SlotField::Expression), *expression));
                            value.push(tag);
                        }
                    }
                }
                self.alloc(
                    NodeKind::MarkupAttribute {
                        key: attr.name.clone(),
                        value,
                    },
                    attr.range,
                )
            }
            AttributeNode::Shorthand(attr) => {
                let id = self.alloc(
                    NodeKind::MarkupShorthandAttribute {
                        key: attr.name.clone(),
                        expression: None,
                    },
                    attr.range,
                );
                pending.push((Slot::new(id, SlotField::Expression), attr.expression));
                id
            }
            AttributeNode::Spread(attr) => {
                let id = self.alloc(NodeKind::MarkupSpreadAttribute { expression: None }, attr.range);
                pending.push((Slot::new(id, SlotField::Expression), attr.expression));
                id
            }
            AttributeNode::Directive(directive) => {
                let id = self.alloc(
                    NodeKind::MarkupDirective {
                        directive: directive.kind,
                        key: directive.name.clone(),
                        modifiers: directive.modifiers.clone(),
                        name_expression: None,
                        expression: None,
                    },
                    directive.range,
                );
                if directive.kind.name_is_reference() {
                    if let Some(name) = directive.name_range {
                        pending.push((Slot::new(id, SlotField::NameExpression), name));
                    }
                }
                if directive.kind != DirectiveKind::Let {
                    if let Some(expression) = directive.effective_expression() {
                        pending.push((Slot::new(id, SlotField::Expression), expression));
                    }
                }
                id
            }
        }
    }

    fn visit_await_branch(
        &mut self,
        branch: &AwaitBranchNode,
        kind: NodeKind,
        field: SlotField,
        set: impl FnOnce(&mut NodeKind, NodeId),
        owner: NodeId,
    ) {
        let id = self.alloc(kind, branch.range);
        self.link(owner, id, set);
        let params = branch
            .binding
            .map(|range| (Slot::new(id, field), range))
            .into_iter()
            .collect();
        self.wrap_callback(id, branch.range.start, params, &branch.children);
    }
}

impl TemplateVisitor for Weaver<'_, '_> {
    fn visit_element(&mut self, element: &ElementNode) {
        let mut pending = Vec::new();
        let mut lets = Vec::new();
        let mut attributes = Vec::with_capacity(element.attributes.len());
        for attribute in &element.attributes {
            let id = self.alloc_attribute(attribute, &mut pending);
            if let AttributeNode::Directive(directive) = attribute {
                if directive.kind == DirectiveKind::Let {
                    if let Some(binding) = directive.effective_expression() {
                        lets.push((Slot::new(id, SlotField::Expression), binding));
                    }
                }
            }
            attributes.push(id);
        }

        let id = self.alloc(
            NodeKind::MarkupElement {
                name: element.name.clone(),
                element_kind: element.kind,
                name_expression: None,
                attributes,
                children: Vec::new(),
            },
            element.range,
        );
        self.place(id);

        if element.kind == ElementKind::Component {
            if let Some(name) = element.name_range {
                self.wrap_expression(id, SlotField::NameExpression, name);
            }
        }
        for (slot, range) in pending {
            self.wrap_expression(slot.owner, slot.field, range);
        }

        if lets.is_empty() {
            self.visit_within(id, &element.children);
        } else {
            self.wrap_callback(id, element.range.start, lets, &element.children);
        }
    }

    fn visit_text(&mut self, text: &TextNode) {
        let value = if text.value.is_empty() {
            self.coords.slice(text.range).to_string()
        } else {
            text.value.clone()
        };
        let id = self.alloc(NodeKind::MarkupText { value }, text.range);
        self.place(id);
    }

    fn visit_mustache(&mut self, mustache: &MustacheNode) {
        let id = self.alloc(
            NodeKind::MarkupMustacheTag {
                raw: mustache.raw,
                expression: None,
            },
            mustache.range,
        );
        self.place(id);
        self.wrap_expression(id, SlotField::Expression, mustache.expression);
    }

    fn visit_if_block(&mut self, block: &IfBlockNode) {
        let id = self.alloc(
            NodeKind::MarkupIfBlock {
                else_if: block.else_if,
                expression: None,
                children: Vec::new(),
                else_block: None,
            },
            block.range,
        );
        self.place(id);

        let start = self.builder.offset();
        self.builder.append_synthetic("if (");
        let test = self
            .builder
            .copy_fragment(Slot::new(id, SlotField::Expression), block.test);
        self.builder.append_synthetic(") {\n");
        self.visit_within(id, &block.children);

        let mut else_owner = None;
        if let Some(branch) = &block.else_branch {
            let else_id = self.alloc(NodeKind::MarkupElseBlock { children: Vec::new() }, branch.range);
            self.link(id, else_id, |kind, child| {
                if let NodeKind::MarkupIfBlock { else_block, .. } = kind {
                    *else_block = Some(child);
                }
            });
            self.builder.append_synthetic("} else {\n");
            self.visit_within(else_id, &branch.children);
            else_owner = Some(else_id);
        }
        self.builder.append_synthetic("}");
        self.builder.push_task(
            start,
            block.range.start,
            vec![test],
            RestoreAction::IfBlock { owner: id, else_owner },
        );
        self.builder.append_synthetic("\n");
    }

    fn visit_each_block(&mut self, block: &EachBlockNode) {
        let id = self.alloc(
            NodeKind::MarkupEachBlock {
                expression: None,
                context: None,
                index: None,
                key: None,
                children: Vec::new(),
                else_block: None,
            },
            block.range,
        );
        self.place(id);

        let start = self.builder.offset();
        self.builder.append_synthetic("Array.from(");
        let mut fragments = vec![self
            .builder
            .copy_fragment(Slot::new(id, SlotField::Expression), block.expression)];
        self.builder.append_synthetic(").forEach((");
        let mut synthetic_context = false;
        match block.context {
            Some(context) => {
                fragments.push(self.builder.copy_fragment(Slot::new(id, SlotField::Context), context));
            }
            None if block.index.is_some() => {
                self.builder.append_synthetic(EACH_PLACEHOLDER);
                synthetic_context = true;
            }
            None => {}
        }
        if let Some(index) = block.index {
            self.builder.append_synthetic(", ");
            fragments.push(self.builder.copy_fragment(Slot::new(id, SlotField::Index), index));
        }
        self.builder.append_synthetic(") => {\n");
        if let Some(key) = block.key {
            self.wrap_expression(id, SlotField::Key, key);
        }
        self.visit_within(id, &block.children);
        self.builder.append_synthetic("});");
        self.builder.push_task(
            start,
            block.range.start,
            fragments,
            RestoreAction::EachBlock {
                owner: id,
                synthetic_context,
            },
        );
        self.builder.append_synthetic("\n");

        if let Some(branch) = &block.else_branch {
            let else_id = self.alloc(NodeKind::MarkupElseBlock { children: Vec::new() }, branch.range);
            self.link(id, else_id, |kind, child| {
                if let NodeKind::MarkupEachBlock { else_block, .. } = kind {
                    *else_block = Some(child);
                }
            });
            self.visit_within(else_id, &branch.children);
        }
    }

    fn visit_await_block(&mut self, block: &AwaitBlockNode) {
        let id = self.alloc(
            NodeKind::MarkupAwaitBlock {
                expression: None,
                pending: None,
                then: None,
                catch: None,
            },
            block.range,
        );
        self.place(id);
        self.wrap_expression(id, SlotField::Expression, block.expression);

        if let Some(pending) = &block.pending {
            let pending_id = self.alloc(
                NodeKind::MarkupAwaitPendingBlock { children: Vec::new() },
                pending.range,
            );
            self.link(id, pending_id, |kind, child| {
                if let NodeKind::MarkupAwaitBlock { pending, .. } = kind {
                    *pending = Some(child);
                }
            });
            self.visit_within(pending_id, &pending.children);
        }
        if let Some(then) = &block.then {
            self.visit_await_branch(
                then,
                NodeKind::MarkupAwaitThenBlock {
                    value: None,
                    children: Vec::new(),
                },
                SlotField::Value,
                |kind, child| {
                    if let NodeKind::MarkupAwaitBlock { then, .. } = kind {
                        *then = Some(child);
                    }
                },
                id,
            );
        }
        if let Some(catch) = &block.catch {
            self.visit_await_branch(
                catch,
                NodeKind::MarkupAwaitCatchBlock {
                    error: None,
                    children: Vec::new(),
                },
                SlotField::Error,
                |kind, child| {
                    if let NodeKind::MarkupAwaitBlock { catch, .. } = kind {
                        *catch = Some(child);
                    }
                },
                id,
            );
        }
    }

    fn visit_key_block(&mut self, block: &KeyBlockNode) {
        let id = self.alloc(
            NodeKind::MarkupKeyBlock {
                expression: None,
                children: Vec::new(),
            },
            block.range,
        );
        self.place(id);
        self.wrap_expression(id, SlotField::Expression, block.expression);
        self.visit_within(id, &block.children);
    }

    fn visit_snippet_block(&mut self, block: &SnippetBlockNode) {
        let id = self.alloc(
            NodeKind::MarkupSnippetBlock {
                id: None,
                params: Vec::new(),
                children: Vec::new(),
            },
            block.range,
        );
        self.place(id);

        let start = self.builder.offset();
        self.builder.append_synthetic("function ");
        let mut fragments = vec![self.builder.copy_fragment(Slot::new(id, SlotField::Id), block.name)];
        self.builder.append_synthetic("(");
        let params: Vec<(Slot, Range)> = block
            .params
            .iter()
            .map(|range| (Slot::new(id, SlotField::Param), *range))
            .collect();
        fragments.extend(self.copy_list(&params));
        self.builder.append_synthetic(") {\n");
        self.visit_within(id, &block.children);
        self.builder.append_synthetic("}");
        self.builder
            .push_task(start, block.range.start, fragments, RestoreAction::Snippet { owner: id });
        self.builder.append_synthetic("\n");
    }

    fn visit_const_tag(&mut self, tag: &ConstTagNode) {
        let id = self.alloc(NodeKind::MarkupConstTag { declaration: None }, tag.range);
        self.place(id);
        let start = self.builder.offset();
        self.builder.append_synthetic("const ");
        let fragment = self
            .builder
            .copy_fragment(Slot::new(id, SlotField::Declaration), tag.declaration);
        self.builder.append_synthetic(";");
        self.builder
            .push_task(start, tag.range.start, vec![fragment], RestoreAction::ConstTag);
        self.builder.append_synthetic("\n");
    }

    fn visit_render_tag(&mut self, tag: &RenderTagNode) {
        let id = self.alloc(NodeKind::MarkupRenderTag { expression: None }, tag.range);
        self.place(id);
        self.wrap_expression(id, SlotField::Expression, tag.expression);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{EachBlockNode, MustacheNode};
    use pretty_assertions::assert_eq;

    fn weave_nodes(source: &str, nodes: Vec<TemplateNode>) -> (Ast, Woven) {
        let document = TemplateDocument {
            scripts: Vec::new(),
            nodes,
        };
        let coords = CoordinateIndex::new(source);
        let mut ast = Ast::new();
        let woven = weave(source, &document, &mut ast, &coords);
        (ast, woven)
    }

    #[test]
    fn test_mustache_wrapper_text() {
        let source = "{count}";
        let (_, woven) = weave_nodes(
            source,
            vec![TemplateNode::Mustache(MustacheNode {
                range: Range::new(0, 7),
                expression: Range::new(1, 6),
                raw: false,
            })],
        );
        assert_eq!(woven.script.text, "(count);\n\n;");
        assert_eq!(woven.script.tasks.len(), 1);
        assert_eq!(woven.script.tasks[0].range, Range::new(0, 8));
        assert_eq!(woven.script.sentinel, 9);
    }

    #[test]
    fn test_each_wrapper_with_index_only() {
        let source = "{#each rows, i}{/each}";
        let (ast, woven) = weave_nodes(
            source,
            vec![TemplateNode::EachBlock(EachBlockNode {
                range: Range::new(0, 22),
                expression: Range::new(7, 11),
                context: None,
                index: Some(Range::new(13, 14)),
                key: None,
                children: Vec::new(),
                else_branch: None,
            })],
        );
        assert_eq!(
            woven.script.text,
            "Array.from(rows).forEach((__each_item, i) => {\n});\n\n;"
        );
        assert_eq!(woven.roots.len(), 1);
        assert!(matches!(
            ast.kind(woven.roots[0]),
            NodeKind::MarkupEachBlock { context: None, .. }
        ));
        assert!(matches!(
            woven.script.tasks[0].action,
            RestoreAction::EachBlock { synthetic_context: true, .. }
        ));
    }
}
