use crate::coords::Range;
use crate::error::{Result, WeaveError};
use crate::node::{DirectiveKind, ElementKind};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// FRONT-END OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output of the markup front end: script blocks plus the template tree, every embedded
/// expression or pattern given as its byte range in the original document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    #[serde(default)]
    pub scripts: Vec<ScriptBlock>,
    #[serde(default)]
    pub nodes: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptBlock {
    /// Range of the script text between the opening and closing tags.
    pub content: Range,
    /// `context="module"` block.
    #[serde(default)]
    pub module: bool,
    #[serde(default)]
    pub lang: Option<String>,
}

impl ScriptBlock {
    pub fn is_typescript(&self) -> bool {
        matches!(self.lang.as_deref(), Some("ts" | "typescript"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Mustache(MustacheNode),
    IfBlock(IfBlockNode),
    EachBlock(EachBlockNode),
    AwaitBlock(AwaitBlockNode),
    KeyBlock(KeyBlockNode),
    SnippetBlock(SnippetBlockNode),
    ConstTag(ConstTagNode),
    RenderTag(RenderTagNode),
}

impl TemplateNode {
    pub fn range(&self) -> Range {
        match self {
            TemplateNode::Element(n) => n.range,
            TemplateNode::Text(n) => n.range,
            TemplateNode::Mustache(n) => n.range,
            TemplateNode::IfBlock(n) => n.range,
            TemplateNode::EachBlock(n) => n.range,
            TemplateNode::AwaitBlock(n) => n.range,
            TemplateNode::KeyBlock(n) => n.range,
            TemplateNode::SnippetBlock(n) => n.range,
            TemplateNode::ConstTag(n) => n.range,
            TemplateNode::RenderTag(n) => n.range,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub name: String,
    #[serde(default)]
    pub kind: ElementKind,
    pub range: Range,
    /// Range of the tag name; used as an expression for components.
    #[serde(default)]
    pub name_range: Option<Range>,
    #[serde(default)]
    pub attributes: Vec<AttributeNode>,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub range: Range,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MustacheNode {
    pub range: Range,
    pub expression: Range,
    /// `{@html ...}`
    #[serde(default)]
    pub raw: bool,
}

/// Children of an `{:else}` / `{:pending}` style branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchNode {
    pub range: Range,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
}

/// `{:else if}` chains are an else branch holding a single `else_if` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfBlockNode {
    pub range: Range,
    pub test: Range,
    #[serde(default)]
    pub else_if: bool,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
    #[serde(default)]
    pub else_branch: Option<BranchNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EachBlockNode {
    pub range: Range,
    pub expression: Range,
    #[serde(default)]
    pub context: Option<Range>,
    #[serde(default)]
    pub index: Option<Range>,
    #[serde(default)]
    pub key: Option<Range>,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
    #[serde(default)]
    pub else_branch: Option<BranchNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitBranchNode {
    pub range: Range,
    /// Binding pattern of `{:then value}` / `{:catch error}`.
    #[serde(default)]
    pub binding: Option<Range>,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitBlockNode {
    pub range: Range,
    pub expression: Range,
    #[serde(default)]
    pub pending: Option<BranchNode>,
    #[serde(default)]
    pub then: Option<AwaitBranchNode>,
    #[serde(default)]
    pub catch: Option<AwaitBranchNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBlockNode {
    pub range: Range,
    pub expression: Range,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetBlockNode {
    pub range: Range,
    pub name: Range,
    #[serde(default)]
    pub params: Vec<Range>,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstTagNode {
    pub range: Range,
    /// The declarator text, `x = a * 2`.
    pub declaration: Range,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTagNode {
    pub range: Range,
    pub expression: Range,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AttributeNode {
    Attribute(PlainAttribute),
    Shorthand(ShorthandAttribute),
    Spread(SpreadAttribute),
    Directive(DirectiveAttribute),
}

impl AttributeNode {
    pub fn range(&self) -> Range {
        match self {
            AttributeNode::Attribute(a) => a.range,
            AttributeNode::Shorthand(a) => a.range,
            AttributeNode::Spread(a) => a.range,
            AttributeNode::Directive(a) => a.range,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainAttribute {
    pub range: Range,
    pub name: String,
    #[serde(default)]
    pub value: Vec<AttributeValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AttributeValue {
    Text { range: Range, value: String },
    Mustache { range: Range, expression: Range },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShorthandAttribute {
    pub range: Range,
    pub name: String,
    pub expression: Range,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadAttribute {
    pub range: Range,
    /// Range after the `...`.
    pub expression: Range,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveAttribute {
    pub range: Range,
    pub kind: DirectiveKind,
    pub name: String,
    /// Range of the name after the colon.
    #[serde(default)]
    pub name_range: Option<Range>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub expression: Option<Range>,
}

impl DirectiveAttribute {
    /// Expression of the directive, falling back to the name for shorthand forms
    /// (`bind:value`, `class:active`, `style:color`, `let:item`).
    pub fn effective_expression(&self) -> Option<Range> {
        match self.kind {
            DirectiveKind::Bind | DirectiveKind::Class | DirectiveKind::Style | DirectiveKind::Let => {
                self.expression.or(self.name_range)
            }
            _ => self.expression,
        }
    }
}

impl TemplateDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Checks every recorded range against `source`: in bounds, ordered, and on char
    /// boundaries.
    pub fn validate_ranges(&self, source: &str) -> Result<()> {
        let mut check = RangeCheck { source, error: None };
        for script in &self.scripts {
            check.check(script.content, "script content");
        }
        check.visit_children(&self.nodes);
        match check.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAVERSAL
// ═══════════════════════════════════════════════════════════════════════════════

/// The single traversal mechanism for template trees.
///
/// Implementers override `visit_*` to add behavior and call the matching `walk_*` function
/// to continue into children unless pruning is intended.
pub trait TemplateVisitor {
    fn visit_children(&mut self, children: &[TemplateNode]) {
        walk_children(self, children);
    }

    fn visit_node(&mut self, node: &TemplateNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &ElementNode) {
        walk_element(self, element);
    }

    fn visit_attribute(&mut self, _attribute: &AttributeNode) {}

    fn visit_text(&mut self, _text: &TextNode) {}

    fn visit_mustache(&mut self, _mustache: &MustacheNode) {}

    fn visit_if_block(&mut self, block: &IfBlockNode) {
        walk_if_block(self, block);
    }

    fn visit_each_block(&mut self, block: &EachBlockNode) {
        walk_each_block(self, block);
    }

    fn visit_await_block(&mut self, block: &AwaitBlockNode) {
        walk_await_block(self, block);
    }

    fn visit_key_block(&mut self, block: &KeyBlockNode) {
        walk_children(self, &block.children);
    }

    fn visit_snippet_block(&mut self, block: &SnippetBlockNode) {
        walk_children(self, &block.children);
    }

    fn visit_const_tag(&mut self, _tag: &ConstTagNode) {}

    fn visit_render_tag(&mut self, _tag: &RenderTagNode) {}
}

pub fn walk_children<V: TemplateVisitor + ?Sized>(visitor: &mut V, children: &[TemplateNode]) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &TemplateNode) {
    match node {
        TemplateNode::Element(n) => visitor.visit_element(n),
        TemplateNode::Text(n) => visitor.visit_text(n),
        TemplateNode::Mustache(n) => visitor.visit_mustache(n),
        TemplateNode::IfBlock(n) => visitor.visit_if_block(n),
        TemplateNode::EachBlock(n) => visitor.visit_each_block(n),
        TemplateNode::AwaitBlock(n) => visitor.visit_await_block(n),
        TemplateNode::KeyBlock(n) => visitor.visit_key_block(n),
        TemplateNode::SnippetBlock(n) => visitor.visit_snippet_block(n),
        TemplateNode::ConstTag(n) => visitor.visit_const_tag(n),
        TemplateNode::RenderTag(n) => visitor.visit_render_tag(n),
    }
}

pub fn walk_element<V: TemplateVisitor + ?Sized>(visitor: &mut V, element: &ElementNode) {
    for attribute in &element.attributes {
        visitor.visit_attribute(attribute);
    }
    visitor.visit_children(&element.children);
}

pub fn walk_if_block<V: TemplateVisitor + ?Sized>(visitor: &mut V, block: &IfBlockNode) {
    visitor.visit_children(&block.children);
    if let Some(branch) = &block.else_branch {
        visitor.visit_children(&branch.children);
    }
}

pub fn walk_each_block<V: TemplateVisitor + ?Sized>(visitor: &mut V, block: &EachBlockNode) {
    visitor.visit_children(&block.children);
    if let Some(branch) = &block.else_branch {
        visitor.visit_children(&branch.children);
    }
}

pub fn walk_await_block<V: TemplateVisitor + ?Sized>(visitor: &mut V, block: &AwaitBlockNode) {
    if let Some(pending) = &block.pending {
        visitor.visit_children(&pending.children);
    }
    if let Some(then) = &block.then {
        visitor.visit_children(&then.children);
    }
    if let Some(catch) = &block.catch {
        visitor.visit_children(&catch.children);
    }
}

struct RangeCheck<'s> {
    source: &'s str,
    error: Option<WeaveError>,
}

impl RangeCheck<'_> {
    fn check(&mut self, range: Range, what: &str) {
        if self.error.is_some() {
            return;
        }
        let valid = range.start <= range.end
            && range.end <= self.source.len()
            && self.source.is_char_boundary(range.start)
            && self.source.is_char_boundary(range.end);
        if !valid {
            self.error = Some(WeaveError::InvalidInput(format!(
                "{} range {}..{} is outside the {} byte document",
                what,
                range.start,
                range.end,
                self.source.len()
            )));
        }
    }

    fn check_opt(&mut self, range: Option<Range>, what: &str) {
        if let Some(range) = range {
            self.check(range, what);
        }
    }
}

impl TemplateVisitor for RangeCheck<'_> {
    fn visit_node(&mut self, node: &TemplateNode) {
        self.check(node.range(), "node");
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &ElementNode) {
        self.check_opt(element.name_range, "element name");
        walk_element(self, element);
    }

    fn visit_attribute(&mut self, attribute: &AttributeNode) {
        self.check(attribute.range(), "attribute");
        match attribute {
            AttributeNode::Attribute(a) => {
                for part in &a.value {
                    match part {
                        AttributeValue::Text { range, .. } => self.check(*range, "attribute text"),
                        AttributeValue::Mustache { range, expression } => {
                            self.check(*range, "attribute value");
                            self.check(*expression, "attribute expression");
                        }
                    }
                }
            }
            AttributeNode::Shorthand(a) => self.check(a.expression, "shorthand expression"),
            AttributeNode::Spread(a) => self.check(a.expression, "spread expression"),
            AttributeNode::Directive(d) => {
                self.check_opt(d.name_range, "directive name");
                self.check_opt(d.expression, "directive expression");
            }
        }
    }

    fn visit_mustache(&mut self, mustache: &MustacheNode) {
        self.check(mustache.expression, "mustache expression");
    }

    fn visit_if_block(&mut self, block: &IfBlockNode) {
        self.check(block.test, "if test");
        self.check_opt(block.else_branch.as_ref().map(|b| b.range), "else branch");
        walk_if_block(self, block);
    }

    fn visit_each_block(&mut self, block: &EachBlockNode) {
        self.check(block.expression, "each expression");
        self.check_opt(block.context, "each context");
        self.check_opt(block.index, "each index");
        self.check_opt(block.key, "each key");
        self.check_opt(block.else_branch.as_ref().map(|b| b.range), "else branch");
        walk_each_block(self, block);
    }

    fn visit_await_block(&mut self, block: &AwaitBlockNode) {
        self.check(block.expression, "await expression");
        self.check_opt(block.pending.as_ref().map(|b| b.range), "pending branch");
        for branch in [&block.then, &block.catch].into_iter().flatten() {
            self.check(branch.range, "await branch");
            self.check_opt(branch.binding, "await binding");
        }
        walk_await_block(self, block);
    }

    fn visit_key_block(&mut self, block: &KeyBlockNode) {
        self.check(block.expression, "key expression");
        walk_children(self, &block.children);
    }

    fn visit_snippet_block(&mut self, block: &SnippetBlockNode) {
        self.check(block.name, "snippet name");
        for param in &block.params {
            self.check(*param, "snippet parameter");
        }
        walk_children(self, &block.children);
    }

    fn visit_const_tag(&mut self, tag: &ConstTagNode) {
        self.check(tag.declaration, "const declaration");
    }

    fn visit_render_tag(&mut self, tag: &RenderTagNode) {
        self.check(tag.expression, "render expression");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_from_json() {
        let json = r#"{
            "scripts": [{ "content": { "start": 8, "end": 20 } }],
            "nodes": [
                { "type": "each-block", "range": { "start": 30, "end": 70 },
                  "expression": { "start": 37, "end": 42 },
                  "context": { "start": 46, "end": 50 },
                  "children": [
                    { "type": "mustache", "range": { "start": 51, "end": 57 },
                      "expression": { "start": 52, "end": 56 } }
                  ] }
            ]
        }"#;
        let doc = TemplateDocument::from_json(json).unwrap();
        assert_eq!(doc.scripts.len(), 1);
        assert!(!doc.scripts[0].module);
        let TemplateNode::EachBlock(each) = &doc.nodes[0] else {
            panic!("expected each block");
        };
        assert_eq!(each.context, Some(Range::new(46, 50)));
        assert_eq!(each.index, None);
        assert_eq!(each.children.len(), 1);
    }

    #[test]
    fn test_invalid_json_is_input_error() {
        let err = TemplateDocument::from_json("{ nodes: ").unwrap_err();
        assert!(matches!(err, WeaveError::InvalidInput(_)));
    }

    #[test]
    fn test_validate_ranges_rejects_out_of_bounds() {
        let doc = TemplateDocument {
            scripts: vec![],
            nodes: vec![TemplateNode::Mustache(MustacheNode {
                range: Range::new(0, 5),
                expression: Range::new(1, 40),
                raw: false,
            })],
        };
        assert!(doc.validate_ranges("{abc}").is_err());
        let ok = TemplateDocument {
            nodes: vec![TemplateNode::Text(TextNode { range: Range::new(0, 5), value: "hello".into() })],
            ..Default::default()
        };
        assert!(ok.validate_ranges("hello").is_ok());
    }

    #[test]
    fn test_directive_shorthand_falls_back_to_name() {
        let bind = DirectiveAttribute {
            range: Range::new(0, 10),
            kind: DirectiveKind::Bind,
            name: "value".into(),
            name_range: Some(Range::new(5, 10)),
            modifiers: vec![],
            expression: None,
        };
        assert_eq!(bind.effective_expression(), Some(Range::new(5, 10)));
        let on = DirectiveAttribute { kind: DirectiveKind::On, ..bind };
        assert_eq!(on.effective_expression(), None);
    }
}
