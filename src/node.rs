//! # Unified Tree
//!
//! One arena holds both host script nodes (ESTree names) and foreign markup nodes, so a
//! restored host sub-tree can be re-parented onto a markup node without copying.
//!
//! ## Key Invariants
//!
//! 1. `NodeId`s are never reused; detached nodes stay allocated but unreachable.
//! 2. `Ast::alloc` links every child of the new node back to it via `parent`.
//! 3. Field order in `NodeKind::fields` is source order, so a pre-order walk over
//!    `children` visits nodes by ascending start offset.

use crate::coords::{CoordinateIndex, Range, SourceLocation};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub range: Range,
    pub loc: SourceLocation,
    pub parent: Option<NodeId>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCALAR ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Module,
    Script,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Module => "module",
            SourceType::Script => "script",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Var,
    Let,
    Const,
    Using,
    AwaitUsing,
}

impl VariableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableKind::Var => "var",
            VariableKind::Let => "let",
            VariableKind::Const => "const",
            VariableKind::Using => "using",
            VariableKind::AwaitUsing => "await using",
        }
    }

    pub fn is_lexical(self) -> bool {
        self != VariableKind::Var
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

impl PropertyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyKind::Init => "init",
            PropertyKind::Get => "get",
            PropertyKind::Set => "set",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Constructor,
    Method,
    Get,
    Set,
}

impl MethodKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MethodKind::Constructor => "constructor",
            MethodKind::Method => "method",
            MethodKind::Get => "get",
            MethodKind::Set => "set",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    /// Digits without the `n` suffix.
    BigInt(String),
    RegExp { pattern: String, flags: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    #[default]
    Html,
    Component,
    Special,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Html => "html",
            ElementKind::Component => "component",
            ElementKind::Special => "special",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    On,
    Bind,
    Class,
    Style,
    Use,
    Transition,
    In,
    Out,
    Animate,
    Let,
}

impl DirectiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DirectiveKind::On => "EventHandler",
            DirectiveKind::Bind => "Binding",
            DirectiveKind::Class => "Class",
            DirectiveKind::Style => "StyleDirective",
            DirectiveKind::Use => "Action",
            DirectiveKind::Transition | DirectiveKind::In | DirectiveKind::Out => "Transition",
            DirectiveKind::Animate => "Animation",
            DirectiveKind::Let => "Let",
        }
    }

    /// Directives whose name is itself a reference to a script binding.
    pub fn name_is_reference(self) -> bool {
        matches!(
            self,
            DirectiveKind::Use
                | DirectiveKind::Transition
                | DirectiveKind::In
                | DirectiveKind::Out
                | DirectiveKind::Animate
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE KINDS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Host script
    Program { body: Vec<NodeId>, source_type: SourceType },
    ExpressionStatement { expression: NodeId },
    BlockStatement { body: Vec<NodeId> },
    EmptyStatement,
    IfStatement { test: NodeId, consequent: NodeId, alternate: Option<NodeId> },
    LabeledStatement { label: NodeId, body: NodeId },
    ReturnStatement { argument: Option<NodeId> },
    ThrowStatement { argument: NodeId },
    BreakStatement { label: Option<NodeId> },
    ContinueStatement { label: Option<NodeId> },
    DebuggerStatement,
    WhileStatement { test: NodeId, body: NodeId },
    DoWhileStatement { body: NodeId, test: NodeId },
    WithStatement { object: NodeId, body: NodeId },
    SwitchStatement { discriminant: NodeId, cases: Vec<NodeId> },
    SwitchCase { test: Option<NodeId>, consequent: Vec<NodeId> },
    ForStatement { init: Option<NodeId>, test: Option<NodeId>, update: Option<NodeId>, body: NodeId },
    ForInStatement { left: NodeId, right: NodeId, body: NodeId },
    ForOfStatement { left: NodeId, right: NodeId, body: NodeId },
    TryStatement { block: NodeId, handler: Option<NodeId>, finalizer: Option<NodeId> },
    CatchClause { param: Option<NodeId>, body: NodeId },
    VariableDeclaration { kind: VariableKind, declarations: Vec<NodeId> },
    VariableDeclarator { id: NodeId, init: Option<NodeId> },
    FunctionDeclaration { id: Option<NodeId>, params: Vec<NodeId>, body: NodeId, is_async: bool, generator: bool },
    FunctionExpression { id: Option<NodeId>, params: Vec<NodeId>, body: NodeId, is_async: bool, generator: bool },
    ArrowFunctionExpression { params: Vec<NodeId>, body: NodeId, expression: bool, is_async: bool },
    ClassDeclaration { id: Option<NodeId>, super_class: Option<NodeId>, body: NodeId },
    ClassExpression { id: Option<NodeId>, super_class: Option<NodeId>, body: NodeId },
    ClassBody { body: Vec<NodeId> },
    MethodDefinition { key: NodeId, value: NodeId, kind: MethodKind, computed: bool, is_static: bool },
    PropertyDefinition { key: NodeId, value: Option<NodeId>, computed: bool, is_static: bool },
    StaticBlock { body: Vec<NodeId> },
    ImportDeclaration { specifiers: Vec<NodeId>, source: NodeId },
    ImportSpecifier { imported: NodeId, local: NodeId },
    ImportDefaultSpecifier { local: NodeId },
    ImportNamespaceSpecifier { local: NodeId },
    ExportNamedDeclaration { declaration: Option<NodeId>, specifiers: Vec<NodeId>, source: Option<NodeId> },
    ExportSpecifier { local: NodeId, exported: NodeId },
    ExportDefaultDeclaration { declaration: NodeId },
    ExportAllDeclaration { exported: Option<NodeId>, source: NodeId },
    Identifier { name: String },
    PrivateIdentifier { name: String },
    Literal { value: LiteralValue, raw: String },
    ThisExpression,
    Super,
    ArrayExpression { elements: Vec<Option<NodeId>> },
    ObjectExpression { properties: Vec<NodeId> },
    Property { key: NodeId, value: NodeId, kind: PropertyKind, computed: bool, shorthand: bool, method: bool },
    SpreadElement { argument: NodeId },
    UnaryExpression { operator: String, argument: NodeId },
    UpdateExpression { operator: String, prefix: bool, argument: NodeId },
    BinaryExpression { operator: String, left: NodeId, right: NodeId },
    LogicalExpression { operator: String, left: NodeId, right: NodeId },
    AssignmentExpression { operator: String, left: NodeId, right: NodeId },
    ConditionalExpression { test: NodeId, consequent: NodeId, alternate: NodeId },
    CallExpression { callee: NodeId, arguments: Vec<NodeId>, optional: bool },
    NewExpression { callee: NodeId, arguments: Vec<NodeId> },
    MemberExpression { object: NodeId, property: NodeId, computed: bool, optional: bool },
    SequenceExpression { expressions: Vec<NodeId> },
    AwaitExpression { argument: NodeId },
    YieldExpression { argument: Option<NodeId>, delegate: bool },
    TemplateLiteral { quasis: Vec<NodeId>, expressions: Vec<NodeId> },
    TemplateElement { raw: String, cooked: Option<String>, tail: bool },
    TaggedTemplateExpression { tag: NodeId, quasi: NodeId },
    MetaProperty { meta: NodeId, property: NodeId },
    ImportExpression { source: NodeId, options: Option<NodeId> },
    ChainExpression { expression: NodeId },
    /// `as`, `satisfies`, `!`, `<T>x` and instantiation wrappers; `type_name` is the TS node type.
    TsExpression { type_name: &'static str, expression: NodeId },
    /// Type aliases, interfaces, enums and namespaces. Only the name is kept.
    TsDeclaration { type_name: &'static str, id: Option<NodeId> },
    ObjectPattern { properties: Vec<NodeId> },
    ArrayPattern { elements: Vec<Option<NodeId>> },
    AssignmentPattern { left: NodeId, right: NodeId },
    RestElement { argument: NodeId },

    // Foreign markup
    MarkupElement {
        name: String,
        element_kind: ElementKind,
        name_expression: Option<NodeId>,
        attributes: Vec<NodeId>,
        children: Vec<NodeId>,
    },
    MarkupText { value: String },
    MarkupMustacheTag { raw: bool, expression: Option<NodeId> },
    MarkupIfBlock { else_if: bool, expression: Option<NodeId>, children: Vec<NodeId>, else_block: Option<NodeId> },
    MarkupElseBlock { children: Vec<NodeId> },
    MarkupEachBlock {
        expression: Option<NodeId>,
        context: Option<NodeId>,
        index: Option<NodeId>,
        key: Option<NodeId>,
        children: Vec<NodeId>,
        else_block: Option<NodeId>,
    },
    MarkupAwaitBlock { expression: Option<NodeId>, pending: Option<NodeId>, then: Option<NodeId>, catch: Option<NodeId> },
    MarkupAwaitPendingBlock { children: Vec<NodeId> },
    MarkupAwaitThenBlock { value: Option<NodeId>, children: Vec<NodeId> },
    MarkupAwaitCatchBlock { error: Option<NodeId>, children: Vec<NodeId> },
    MarkupKeyBlock { expression: Option<NodeId>, children: Vec<NodeId> },
    MarkupSnippetBlock { id: Option<NodeId>, params: Vec<NodeId>, children: Vec<NodeId> },
    MarkupConstTag { declaration: Option<NodeId> },
    MarkupRenderTag { expression: Option<NodeId> },
    MarkupAttribute { key: String, value: Vec<NodeId> },
    MarkupShorthandAttribute { key: String, expression: Option<NodeId> },
    MarkupSpreadAttribute { expression: Option<NodeId> },
    MarkupDirective {
        directive: DirectiveKind,
        key: String,
        modifiers: Vec<String>,
        name_expression: Option<NodeId>,
        expression: Option<NodeId>,
    },
}

/// Read-only view of one field, used for traversal and ESTree export.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    Node(NodeId),
    OptNode(Option<NodeId>),
    Nodes(&'a [NodeId]),
    OptNodes(&'a [Option<NodeId>]),
    Str(&'a str),
    Strs(&'a [String]),
    Bool(bool),
    Num(f64),
    Null,
    /// A flat object of string members, such as a regex's `{ pattern, flags }`.
    Record([(&'static str, Option<&'a str>); 2]),
}

/// Mutable view of the node-valued fields of a kind.
pub enum ChildSlot<'a> {
    One(&'a mut NodeId),
    Opt(&'a mut Option<NodeId>),
    Many(&'a mut Vec<NodeId>),
    ManyOpt(&'a mut Vec<Option<NodeId>>),
}

/// Host slots on markup nodes that restored sub-trees are attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotField {
    Expression,
    NameExpression,
    Context,
    Index,
    Key,
    Value,
    Error,
    Id,
    Param,
    Declaration,
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        use NodeKind::*;
        match self {
            Program { .. } => "Program",
            ExpressionStatement { .. } => "ExpressionStatement",
            BlockStatement { .. } => "BlockStatement",
            EmptyStatement => "EmptyStatement",
            IfStatement { .. } => "IfStatement",
            LabeledStatement { .. } => "LabeledStatement",
            ReturnStatement { .. } => "ReturnStatement",
            ThrowStatement { .. } => "ThrowStatement",
            BreakStatement { .. } => "BreakStatement",
            ContinueStatement { .. } => "ContinueStatement",
            DebuggerStatement => "DebuggerStatement",
            WhileStatement { .. } => "WhileStatement",
            DoWhileStatement { .. } => "DoWhileStatement",
            WithStatement { .. } => "WithStatement",
            SwitchStatement { .. } => "SwitchStatement",
            SwitchCase { .. } => "SwitchCase",
            ForStatement { .. } => "ForStatement",
            ForInStatement { .. } => "ForInStatement",
            ForOfStatement { .. } => "ForOfStatement",
            TryStatement { .. } => "TryStatement",
            CatchClause { .. } => "CatchClause",
            VariableDeclaration { .. } => "VariableDeclaration",
            VariableDeclarator { .. } => "VariableDeclarator",
            FunctionDeclaration { .. } => "FunctionDeclaration",
            FunctionExpression { .. } => "FunctionExpression",
            ArrowFunctionExpression { .. } => "ArrowFunctionExpression",
            ClassDeclaration { .. } => "ClassDeclaration",
            ClassExpression { .. } => "ClassExpression",
            ClassBody { .. } => "ClassBody",
            MethodDefinition { .. } => "MethodDefinition",
            PropertyDefinition { .. } => "PropertyDefinition",
            StaticBlock { .. } => "StaticBlock",
            ImportDeclaration { .. } => "ImportDeclaration",
            ImportSpecifier { .. } => "ImportSpecifier",
            ImportDefaultSpecifier { .. } => "ImportDefaultSpecifier",
            ImportNamespaceSpecifier { .. } => "ImportNamespaceSpecifier",
            ExportNamedDeclaration { .. } => "ExportNamedDeclaration",
            ExportSpecifier { .. } => "ExportSpecifier",
            ExportDefaultDeclaration { .. } => "ExportDefaultDeclaration",
            ExportAllDeclaration { .. } => "ExportAllDeclaration",
            Identifier { .. } => "Identifier",
            PrivateIdentifier { .. } => "PrivateIdentifier",
            Literal { .. } => "Literal",
            ThisExpression => "ThisExpression",
            Super => "Super",
            ArrayExpression { .. } => "ArrayExpression",
            ObjectExpression { .. } => "ObjectExpression",
            Property { .. } => "Property",
            SpreadElement { .. } => "SpreadElement",
            UnaryExpression { .. } => "UnaryExpression",
            UpdateExpression { .. } => "UpdateExpression",
            BinaryExpression { .. } => "BinaryExpression",
            LogicalExpression { .. } => "LogicalExpression",
            AssignmentExpression { .. } => "AssignmentExpression",
            ConditionalExpression { .. } => "ConditionalExpression",
            CallExpression { .. } => "CallExpression",
            NewExpression { .. } => "NewExpression",
            MemberExpression { .. } => "MemberExpression",
            SequenceExpression { .. } => "SequenceExpression",
            AwaitExpression { .. } => "AwaitExpression",
            YieldExpression { .. } => "YieldExpression",
            TemplateLiteral { .. } => "TemplateLiteral",
            TemplateElement { .. } => "TemplateElement",
            TaggedTemplateExpression { .. } => "TaggedTemplateExpression",
            MetaProperty { .. } => "MetaProperty",
            ImportExpression { .. } => "ImportExpression",
            ChainExpression { .. } => "ChainExpression",
            TsExpression { type_name, .. } | TsDeclaration { type_name, .. } => *type_name,
            ObjectPattern { .. } => "ObjectPattern",
            ArrayPattern { .. } => "ArrayPattern",
            AssignmentPattern { .. } => "AssignmentPattern",
            RestElement { .. } => "RestElement",
            MarkupElement { .. } => "MarkupElement",
            MarkupText { .. } => "MarkupText",
            MarkupMustacheTag { .. } => "MarkupMustacheTag",
            MarkupIfBlock { .. } => "MarkupIfBlock",
            MarkupElseBlock { .. } => "MarkupElseBlock",
            MarkupEachBlock { .. } => "MarkupEachBlock",
            MarkupAwaitBlock { .. } => "MarkupAwaitBlock",
            MarkupAwaitPendingBlock { .. } => "MarkupAwaitPendingBlock",
            MarkupAwaitThenBlock { .. } => "MarkupAwaitThenBlock",
            MarkupAwaitCatchBlock { .. } => "MarkupAwaitCatchBlock",
            MarkupKeyBlock { .. } => "MarkupKeyBlock",
            MarkupSnippetBlock { .. } => "MarkupSnippetBlock",
            MarkupConstTag { .. } => "MarkupConstTag",
            MarkupRenderTag { .. } => "MarkupRenderTag",
            MarkupAttribute { .. } => "MarkupAttribute",
            MarkupShorthandAttribute { .. } => "MarkupShorthandAttribute",
            MarkupSpreadAttribute { .. } => "MarkupSpreadAttribute",
            MarkupDirective { .. } => "MarkupDirective",
        }
    }

    /// All fields in source order, ESTree-named.
    pub fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        use Field as F;
        use NodeKind::*;
        match self {
            Program { body, source_type } => {
                vec![("sourceType", F::Str(source_type.as_str())), ("body", F::Nodes(body))]
            }
            ExpressionStatement { expression } => vec![("expression", F::Node(*expression))],
            BlockStatement { body } => vec![("body", F::Nodes(body))],
            EmptyStatement | DebuggerStatement | ThisExpression | Super => vec![],
            IfStatement { test, consequent, alternate } => vec![
                ("test", F::Node(*test)),
                ("consequent", F::Node(*consequent)),
                ("alternate", F::OptNode(*alternate)),
            ],
            LabeledStatement { label, body } => {
                vec![("label", F::Node(*label)), ("body", F::Node(*body))]
            }
            ReturnStatement { argument } => vec![("argument", F::OptNode(*argument))],
            ThrowStatement { argument } => vec![("argument", F::Node(*argument))],
            BreakStatement { label } | ContinueStatement { label } => {
                vec![("label", F::OptNode(*label))]
            }
            WhileStatement { test, body } => {
                vec![("test", F::Node(*test)), ("body", F::Node(*body))]
            }
            DoWhileStatement { body, test } => {
                vec![("body", F::Node(*body)), ("test", F::Node(*test))]
            }
            WithStatement { object, body } => {
                vec![("object", F::Node(*object)), ("body", F::Node(*body))]
            }
            SwitchStatement { discriminant, cases } => vec![
                ("discriminant", F::Node(*discriminant)),
                ("cases", F::Nodes(cases)),
            ],
            SwitchCase { test, consequent } => vec![
                ("test", F::OptNode(*test)),
                ("consequent", F::Nodes(consequent)),
            ],
            ForStatement { init, test, update, body } => vec![
                ("init", F::OptNode(*init)),
                ("test", F::OptNode(*test)),
                ("update", F::OptNode(*update)),
                ("body", F::Node(*body)),
            ],
            ForInStatement { left, right, body } | ForOfStatement { left, right, body } => vec![
                ("left", F::Node(*left)),
                ("right", F::Node(*right)),
                ("body", F::Node(*body)),
            ],
            TryStatement { block, handler, finalizer } => vec![
                ("block", F::Node(*block)),
                ("handler", F::OptNode(*handler)),
                ("finalizer", F::OptNode(*finalizer)),
            ],
            CatchClause { param, body } => {
                vec![("param", F::OptNode(*param)), ("body", F::Node(*body))]
            }
            VariableDeclaration { kind, declarations } => vec![
                ("kind", F::Str(kind.as_str())),
                ("declarations", F::Nodes(declarations)),
            ],
            VariableDeclarator { id, init } => {
                vec![("id", F::Node(*id)), ("init", F::OptNode(*init))]
            }
            FunctionDeclaration { id, params, body, is_async, generator }
            | FunctionExpression { id, params, body, is_async, generator } => vec![
                ("async", F::Bool(*is_async)),
                ("generator", F::Bool(*generator)),
                ("id", F::OptNode(*id)),
                ("params", F::Nodes(params)),
                ("body", F::Node(*body)),
            ],
            ArrowFunctionExpression { params, body, expression, is_async } => vec![
                ("async", F::Bool(*is_async)),
                ("expression", F::Bool(*expression)),
                ("params", F::Nodes(params)),
                ("body", F::Node(*body)),
            ],
            ClassDeclaration { id, super_class, body } | ClassExpression { id, super_class, body } => vec![
                ("id", F::OptNode(*id)),
                ("superClass", F::OptNode(*super_class)),
                ("body", F::Node(*body)),
            ],
            ClassBody { body } | StaticBlock { body } => vec![("body", F::Nodes(body))],
            MethodDefinition { key, value, kind, computed, is_static } => vec![
                ("kind", F::Str(kind.as_str())),
                ("static", F::Bool(*is_static)),
                ("computed", F::Bool(*computed)),
                ("key", F::Node(*key)),
                ("value", F::Node(*value)),
            ],
            PropertyDefinition { key, value, computed, is_static } => vec![
                ("static", F::Bool(*is_static)),
                ("computed", F::Bool(*computed)),
                ("key", F::Node(*key)),
                ("value", F::OptNode(*value)),
            ],
            ImportDeclaration { specifiers, source } => vec![
                ("specifiers", F::Nodes(specifiers)),
                ("source", F::Node(*source)),
            ],
            ImportSpecifier { imported, local } => {
                vec![("imported", F::Node(*imported)), ("local", F::Node(*local))]
            }
            ImportDefaultSpecifier { local } | ImportNamespaceSpecifier { local } => {
                vec![("local", F::Node(*local))]
            }
            ExportNamedDeclaration { declaration, specifiers, source } => vec![
                ("declaration", F::OptNode(*declaration)),
                ("specifiers", F::Nodes(specifiers)),
                ("source", F::OptNode(*source)),
            ],
            ExportSpecifier { local, exported } => {
                vec![("local", F::Node(*local)), ("exported", F::Node(*exported))]
            }
            ExportDefaultDeclaration { declaration } => {
                vec![("declaration", F::Node(*declaration))]
            }
            ExportAllDeclaration { exported, source } => {
                vec![("exported", F::OptNode(*exported)), ("source", F::Node(*source))]
            }
            Identifier { name } | PrivateIdentifier { name } => vec![("name", F::Str(name))],
            Literal { value, raw } => match value {
                LiteralValue::String(s) => vec![("value", F::Str(s)), ("raw", F::Str(raw))],
                LiteralValue::Number(n) => vec![("value", F::Num(*n)), ("raw", F::Str(raw))],
                LiteralValue::Boolean(b) => vec![("value", F::Bool(*b)), ("raw", F::Str(raw))],
                LiteralValue::Null => vec![("value", F::Null), ("raw", F::Str(raw))],
                LiteralValue::BigInt(digits) => vec![
                    ("value", F::Null),
                    ("raw", F::Str(raw)),
                    ("bigint", F::Str(digits)),
                ],
                LiteralValue::RegExp { pattern, flags } => vec![
                    ("value", F::Null),
                    ("raw", F::Str(raw)),
                    ("regex", F::Record([("pattern", Some(pattern.as_str())), ("flags", Some(flags.as_str()))])),
                ],
            },
            ArrayExpression { elements } | ArrayPattern { elements } => {
                vec![("elements", F::OptNodes(elements))]
            }
            ObjectExpression { properties } | ObjectPattern { properties } => {
                vec![("properties", F::Nodes(properties))]
            }
            Property { key, value, kind, computed, shorthand, method } => vec![
                ("kind", F::Str(kind.as_str())),
                ("method", F::Bool(*method)),
                ("computed", F::Bool(*computed)),
                ("shorthand", F::Bool(*shorthand)),
                ("key", F::Node(*key)),
                ("value", F::Node(*value)),
            ],
            SpreadElement { argument } | RestElement { argument } | AwaitExpression { argument } => {
                vec![("argument", F::Node(*argument))]
            }
            UnaryExpression { operator, argument } => vec![
                ("operator", F::Str(operator)),
                ("prefix", F::Bool(true)),
                ("argument", F::Node(*argument)),
            ],
            UpdateExpression { operator, prefix, argument } => vec![
                ("operator", F::Str(operator)),
                ("prefix", F::Bool(*prefix)),
                ("argument", F::Node(*argument)),
            ],
            BinaryExpression { operator, left, right }
            | LogicalExpression { operator, left, right }
            | AssignmentExpression { operator, left, right } => vec![
                ("operator", F::Str(operator)),
                ("left", F::Node(*left)),
                ("right", F::Node(*right)),
            ],
            AssignmentPattern { left, right } => {
                vec![("left", F::Node(*left)), ("right", F::Node(*right))]
            }
            ConditionalExpression { test, consequent, alternate } => vec![
                ("test", F::Node(*test)),
                ("consequent", F::Node(*consequent)),
                ("alternate", F::Node(*alternate)),
            ],
            CallExpression { callee, arguments, optional } => vec![
                ("optional", F::Bool(*optional)),
                ("callee", F::Node(*callee)),
                ("arguments", F::Nodes(arguments)),
            ],
            NewExpression { callee, arguments } => vec![
                ("callee", F::Node(*callee)),
                ("arguments", F::Nodes(arguments)),
            ],
            MemberExpression { object, property, computed, optional } => vec![
                ("computed", F::Bool(*computed)),
                ("optional", F::Bool(*optional)),
                ("object", F::Node(*object)),
                ("property", F::Node(*property)),
            ],
            SequenceExpression { expressions } => vec![("expressions", F::Nodes(expressions))],
            YieldExpression { argument, delegate } => vec![
                ("delegate", F::Bool(*delegate)),
                ("argument", F::OptNode(*argument)),
            ],
            TemplateLiteral { quasis, expressions } => vec![
                ("quasis", F::Nodes(quasis)),
                ("expressions", F::Nodes(expressions)),
            ],
            TemplateElement { raw, cooked, tail } => vec![
                ("value", F::Record([("raw", Some(raw.as_str())), ("cooked", cooked.as_deref())])),
                ("tail", F::Bool(*tail)),
            ],
            TaggedTemplateExpression { tag, quasi } => {
                vec![("tag", F::Node(*tag)), ("quasi", F::Node(*quasi))]
            }
            MetaProperty { meta, property } => {
                vec![("meta", F::Node(*meta)), ("property", F::Node(*property))]
            }
            ImportExpression { source, options } => {
                vec![("source", F::Node(*source)), ("options", F::OptNode(*options))]
            }
            ChainExpression { expression } | TsExpression { expression, .. } => {
                vec![("expression", F::Node(*expression))]
            }
            TsDeclaration { id, .. } => vec![("id", F::OptNode(*id))],
            MarkupElement { name, element_kind, name_expression, attributes, children } => vec![
                ("name", F::Str(name)),
                ("kind", F::Str(element_kind.as_str())),
                ("nameExpression", F::OptNode(*name_expression)),
                ("attributes", F::Nodes(attributes)),
                ("children", F::Nodes(children)),
            ],
            MarkupText { value } => vec![("value", F::Str(value))],
            MarkupMustacheTag { raw, expression } => vec![
                ("kind", F::Str(if *raw { "raw" } else { "text" })),
                ("expression", F::OptNode(*expression)),
            ],
            MarkupIfBlock { else_if, expression, children, else_block } => vec![
                ("elseif", F::Bool(*else_if)),
                ("expression", F::OptNode(*expression)),
                ("children", F::Nodes(children)),
                ("else", F::OptNode(*else_block)),
            ],
            MarkupElseBlock { children }
            | MarkupAwaitPendingBlock { children } => vec![("children", F::Nodes(children))],
            MarkupEachBlock { expression, context, index, key, children, else_block } => vec![
                ("expression", F::OptNode(*expression)),
                ("context", F::OptNode(*context)),
                ("index", F::OptNode(*index)),
                ("key", F::OptNode(*key)),
                ("children", F::Nodes(children)),
                ("else", F::OptNode(*else_block)),
            ],
            MarkupAwaitBlock { expression, pending, then, catch } => vec![
                ("expression", F::OptNode(*expression)),
                ("pending", F::OptNode(*pending)),
                ("then", F::OptNode(*then)),
                ("catch", F::OptNode(*catch)),
            ],
            MarkupAwaitThenBlock { value, children } => {
                vec![("value", F::OptNode(*value)), ("children", F::Nodes(children))]
            }
            MarkupAwaitCatchBlock { error, children } => {
                vec![("error", F::OptNode(*error)), ("children", F::Nodes(children))]
            }
            MarkupKeyBlock { expression, children } => vec![
                ("expression", F::OptNode(*expression)),
                ("children", F::Nodes(children)),
            ],
            MarkupSnippetBlock { id, params, children } => vec![
                ("id", F::OptNode(*id)),
                ("params", F::Nodes(params)),
                ("children", F::Nodes(children)),
            ],
            MarkupConstTag { declaration } => vec![("declaration", F::OptNode(*declaration))],
            MarkupRenderTag { expression } | MarkupSpreadAttribute { expression } => {
                vec![("expression", F::OptNode(*expression))]
            }
            MarkupAttribute { key, value } => {
                vec![("key", F::Str(key)), ("value", F::Nodes(value))]
            }
            MarkupShorthandAttribute { key, expression } => vec![
                ("key", F::Str(key)),
                ("expression", F::OptNode(*expression)),
            ],
            MarkupDirective { directive, key, modifiers, name_expression, expression } => vec![
                ("kind", F::Str(directive.as_str())),
                ("key", F::Str(key)),
                ("modifiers", F::Strs(modifiers)),
                ("nameExpression", F::OptNode(*name_expression)),
                ("expression", F::OptNode(*expression)),
            ],
        }
    }

    pub fn child_slots(&mut self) -> Vec<ChildSlot<'_>> {
        use ChildSlot as S;
        use NodeKind::*;
        match self {
            Program { body, .. } | BlockStatement { body } => vec![S::Many(body)],
            ExpressionStatement { expression } => vec![S::One(expression)],
            EmptyStatement
            | DebuggerStatement
            | ThisExpression
            | Super
            | Identifier { .. }
            | PrivateIdentifier { .. }
            | Literal { .. }
            | TemplateElement { .. }
            | MarkupText { .. } => vec![],
            IfStatement { test, consequent, alternate } => {
                vec![S::One(test), S::One(consequent), S::Opt(alternate)]
            }
            LabeledStatement { label, body } => vec![S::One(label), S::One(body)],
            ReturnStatement { argument } => vec![S::Opt(argument)],
            ThrowStatement { argument }
            | SpreadElement { argument }
            | RestElement { argument }
            | AwaitExpression { argument }
            | UnaryExpression { argument, .. }
            | UpdateExpression { argument, .. } => vec![S::One(argument)],
            BreakStatement { label } | ContinueStatement { label } => vec![S::Opt(label)],
            WhileStatement { test, body } => vec![S::One(test), S::One(body)],
            DoWhileStatement { body, test } => vec![S::One(body), S::One(test)],
            WithStatement { object, body } => vec![S::One(object), S::One(body)],
            SwitchStatement { discriminant, cases } => vec![S::One(discriminant), S::Many(cases)],
            SwitchCase { test, consequent } => vec![S::Opt(test), S::Many(consequent)],
            ForStatement { init, test, update, body } => {
                vec![S::Opt(init), S::Opt(test), S::Opt(update), S::One(body)]
            }
            ForInStatement { left, right, body } | ForOfStatement { left, right, body } => {
                vec![S::One(left), S::One(right), S::One(body)]
            }
            TryStatement { block, handler, finalizer } => {
                vec![S::One(block), S::Opt(handler), S::Opt(finalizer)]
            }
            CatchClause { param, body } => vec![S::Opt(param), S::One(body)],
            VariableDeclaration { declarations, .. } => vec![S::Many(declarations)],
            VariableDeclarator { id, init } => vec![S::One(id), S::Opt(init)],
            FunctionDeclaration { id, params, body, .. }
            | FunctionExpression { id, params, body, .. } => {
                vec![S::Opt(id), S::Many(params), S::One(body)]
            }
            ArrowFunctionExpression { params, body, .. } => vec![S::Many(params), S::One(body)],
            ClassDeclaration { id, super_class, body } | ClassExpression { id, super_class, body } => {
                vec![S::Opt(id), S::Opt(super_class), S::One(body)]
            }
            ClassBody { body } | StaticBlock { body } => vec![S::Many(body)],
            MethodDefinition { key, value, .. } => vec![S::One(key), S::One(value)],
            PropertyDefinition { key, value, .. } => vec![S::One(key), S::Opt(value)],
            ImportDeclaration { specifiers, source } => vec![S::Many(specifiers), S::One(source)],
            ImportSpecifier { imported, local } => vec![S::One(imported), S::One(local)],
            ImportDefaultSpecifier { local } | ImportNamespaceSpecifier { local } => {
                vec![S::One(local)]
            }
            ExportNamedDeclaration { declaration, specifiers, source } => {
                vec![S::Opt(declaration), S::Many(specifiers), S::Opt(source)]
            }
            ExportSpecifier { local, exported } => vec![S::One(local), S::One(exported)],
            ExportDefaultDeclaration { declaration } => vec![S::One(declaration)],
            ExportAllDeclaration { exported, source } => vec![S::Opt(exported), S::One(source)],
            ArrayExpression { elements } | ArrayPattern { elements } => vec![S::ManyOpt(elements)],
            ObjectExpression { properties } | ObjectPattern { properties } => {
                vec![S::Many(properties)]
            }
            Property { key, value, .. } => vec![S::One(key), S::One(value)],
            BinaryExpression { left, right, .. }
            | LogicalExpression { left, right, .. }
            | AssignmentExpression { left, right, .. }
            | AssignmentPattern { left, right } => vec![S::One(left), S::One(right)],
            ConditionalExpression { test, consequent, alternate } => {
                vec![S::One(test), S::One(consequent), S::One(alternate)]
            }
            CallExpression { callee, arguments, .. } | NewExpression { callee, arguments } => {
                vec![S::One(callee), S::Many(arguments)]
            }
            MemberExpression { object, property, .. } => vec![S::One(object), S::One(property)],
            SequenceExpression { expressions } => vec![S::Many(expressions)],
            YieldExpression { argument, .. } => vec![S::Opt(argument)],
            TemplateLiteral { quasis, expressions } => vec![S::Many(quasis), S::Many(expressions)],
            TaggedTemplateExpression { tag, quasi } => vec![S::One(tag), S::One(quasi)],
            MetaProperty { meta, property } => vec![S::One(meta), S::One(property)],
            ImportExpression { source, options } => vec![S::One(source), S::Opt(options)],
            ChainExpression { expression } | TsExpression { expression, .. } => vec![S::One(expression)],
            TsDeclaration { id, .. } => vec![S::Opt(id)],
            MarkupElement { name_expression, attributes, children, .. } => {
                vec![S::Opt(name_expression), S::Many(attributes), S::Many(children)]
            }
            MarkupMustacheTag { expression, .. }
            | MarkupConstTag { declaration: expression }
            | MarkupRenderTag { expression }
            | MarkupSpreadAttribute { expression }
            | MarkupShorthandAttribute { expression, .. } => vec![S::Opt(expression)],
            MarkupIfBlock { expression, children, else_block, .. } => {
                vec![S::Opt(expression), S::Many(children), S::Opt(else_block)]
            }
            MarkupElseBlock { children } | MarkupAwaitPendingBlock { children } => {
                vec![S::Many(children)]
            }
            MarkupEachBlock { expression, context, index, key, children, else_block } => vec![
                S::Opt(expression),
                S::Opt(context),
                S::Opt(index),
                S::Opt(key),
                S::Many(children),
                S::Opt(else_block),
            ],
            MarkupAwaitBlock { expression, pending, then, catch } => {
                vec![S::Opt(expression), S::Opt(pending), S::Opt(then), S::Opt(catch)]
            }
            MarkupAwaitThenBlock { value: binding, children }
            | MarkupAwaitCatchBlock { error: binding, children } => {
                vec![S::Opt(binding), S::Many(children)]
            }
            MarkupKeyBlock { expression, children } => vec![S::Opt(expression), S::Many(children)],
            MarkupSnippetBlock { id, params, children } => {
                vec![S::Opt(id), S::Many(params), S::Many(children)]
            }
            MarkupAttribute { value, .. } => vec![S::Many(value)],
            MarkupDirective { name_expression, expression, .. } => {
                vec![S::Opt(name_expression), S::Opt(expression)]
            }
        }
    }

    /// Mutable access to the markup slot named by `field`, if this kind has one.
    fn slot_mut(&mut self, field: SlotField) -> Option<&mut Option<NodeId>> {
        use NodeKind::*;
        use SlotField as SF;
        match (self, field) {
            (MarkupMustacheTag { expression, .. }, SF::Expression)
            | (MarkupIfBlock { expression, .. }, SF::Expression)
            | (MarkupEachBlock { expression, .. }, SF::Expression)
            | (MarkupAwaitBlock { expression, .. }, SF::Expression)
            | (MarkupKeyBlock { expression, .. }, SF::Expression)
            | (MarkupRenderTag { expression }, SF::Expression)
            | (MarkupShorthandAttribute { expression, .. }, SF::Expression)
            | (MarkupSpreadAttribute { expression }, SF::Expression)
            | (MarkupDirective { expression, .. }, SF::Expression) => Some(expression),
            (MarkupElement { name_expression, .. }, SF::NameExpression)
            | (MarkupDirective { name_expression, .. }, SF::NameExpression) => Some(name_expression),
            (MarkupEachBlock { context, .. }, SF::Context) => Some(context),
            (MarkupEachBlock { index, .. }, SF::Index) => Some(index),
            (MarkupEachBlock { key, .. }, SF::Key) => Some(key),
            (MarkupAwaitThenBlock { value, .. }, SF::Value) => Some(value),
            (MarkupAwaitCatchBlock { error, .. }, SF::Error) => Some(error),
            (MarkupSnippetBlock { id, .. }, SF::Id) => Some(id),
            (MarkupConstTag { declaration }, SF::Declaration) => Some(declaration),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENS & COMMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    PrivateIdentifier,
    Keyword,
    Punctuator,
    Numeric,
    String,
    Boolean,
    Null,
    Template,
    RegularExpression,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Identifier => "Identifier",
            TokenKind::PrivateIdentifier => "PrivateIdentifier",
            TokenKind::Keyword => "Keyword",
            TokenKind::Punctuator => "Punctuator",
            TokenKind::Numeric => "Numeric",
            TokenKind::String => "String",
            TokenKind::Boolean => "Boolean",
            TokenKind::Null => "Null",
            TokenKind::Template => "Template",
            TokenKind::RegularExpression => "RegularExpression",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub range: Range,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub kind: CommentKind,
    pub value: String,
    pub range: Range,
    pub loc: SourceLocation,
}

/// Anything carrying a range that the restorers move between coordinate systems.
pub trait Ranged {
    fn range(&self) -> Range;
    fn relocate(&mut self, range: Range, coords: &CoordinateIndex);
}

impl Ranged for Token {
    fn range(&self) -> Range {
        self.range
    }

    fn relocate(&mut self, range: Range, coords: &CoordinateIndex) {
        self.range = range;
        self.loc = coords.location(range);
    }
}

impl Ranged for Comment {
    fn range(&self) -> Range {
        self.range
    }

    fn relocate(&mut self, range: Range, coords: &CoordinateIndex) {
        self.range = range;
        self.loc = coords.location(range);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARENA
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for Ast {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alloc(&mut self, kind: NodeKind, range: Range) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let children = Self::children_of(&kind);
        self.nodes.push(Node {
            kind,
            range,
            loc: SourceLocation::default(),
            parent: None,
        });
        for child in children {
            self.nodes[child.index()].parent = Some(id);
        }
        id
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn range(&self, id: NodeId) -> Range {
        self.nodes[id.index()].range
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn set_range(&mut self, id: NodeId, range: Range, coords: &CoordinateIndex) {
        let node = &mut self.nodes[id.index()];
        node.range = range;
        node.loc = coords.location(range);
    }

    fn children_of(kind: &NodeKind) -> Vec<NodeId> {
        let mut out = Vec::new();
        for (_, field) in kind.fields() {
            match field {
                Field::Node(id) => out.push(id),
                Field::OptNode(Some(id)) => out.push(id),
                Field::Nodes(ids) => out.extend_from_slice(ids),
                Field::OptNodes(ids) => out.extend(ids.iter().flatten().copied()),
                _ => {}
            }
        }
        out
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children = Self::children_of(self.kind(id));
        // Quasis and expressions interleave in the source.
        if matches!(self.kind(id), NodeKind::TemplateLiteral { .. }) {
            children.sort_by_key(|&child| self.range(child).start);
        }
        children
    }

    /// Pre-order listing of `id` and every descendant.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            let children = self.children(next);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    pub fn identifier_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Identifier { name } => Some(name),
            _ => None,
        }
    }

    /// Removes `child` from a list field of `parent` or clears the optional field holding it.
    /// Required single-node fields cannot be emptied and report `false`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let mut removed = false;
        for slot in self.nodes[parent.index()].kind.child_slots() {
            match slot {
                ChildSlot::Many(list) => {
                    let before = list.len();
                    list.retain(|c| *c != child);
                    removed |= list.len() != before;
                }
                ChildSlot::ManyOpt(list) => {
                    let before = list.len();
                    list.retain(|c| *c != Some(child));
                    removed |= list.len() != before;
                }
                ChildSlot::Opt(opt) if *opt == Some(child) => {
                    *opt = None;
                    removed = true;
                }
                _ => {}
            }
        }
        if removed {
            self.nodes[child.index()].parent = None;
        }
        removed
    }

    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> bool {
        let mut replaced = false;
        for slot in self.nodes[parent.index()].kind.child_slots() {
            match slot {
                ChildSlot::One(id) if *id == old => {
                    *id = new;
                    replaced = true;
                }
                ChildSlot::Opt(opt) if *opt == Some(old) => {
                    *opt = Some(new);
                    replaced = true;
                }
                ChildSlot::Many(list) => {
                    for id in list.iter_mut().filter(|id| **id == old) {
                        *id = new;
                        replaced = true;
                    }
                }
                ChildSlot::ManyOpt(list) => {
                    for id in list.iter_mut().filter(|id| **id == Some(old)) {
                        *id = Some(new);
                        replaced = true;
                    }
                }
                _ => {}
            }
        }
        if replaced {
            self.nodes[old.index()].parent = None;
            self.nodes[new.index()].parent = Some(parent);
        }
        replaced
    }

    /// Unlinks `id` from its parent's list or optional field.
    pub fn detach(&mut self, id: NodeId) -> bool {
        match self.parent(id) {
            Some(parent) => self.remove_child(parent, id),
            None => false,
        }
    }

    /// Places `child` into the markup slot `field` of `owner`.
    pub fn attach(&mut self, owner: NodeId, field: SlotField, child: NodeId) -> bool {
        let kind = &mut self.nodes[owner.index()].kind;
        let attached = match (kind, field) {
            (NodeKind::MarkupSnippetBlock { params, .. }, SlotField::Param) => {
                params.push(child);
                true
            }
            (kind, field) => match kind.slot_mut(field) {
                Some(slot) => {
                    *slot = Some(child);
                    true
                }
                None => false,
            },
        };
        if attached {
            self.nodes[child.index()].parent = Some(owner);
        }
        attached
    }

    /// Appends `child` to the first list field of `parent` (body, children, attributes...).
    pub fn push_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let pushed = match &mut self.nodes[parent.index()].kind {
            NodeKind::Program { body, .. } | NodeKind::BlockStatement { body } => {
                body.push(child);
                true
            }
            NodeKind::MarkupElement { children, .. }
            | NodeKind::MarkupIfBlock { children, .. }
            | NodeKind::MarkupElseBlock { children }
            | NodeKind::MarkupEachBlock { children, .. }
            | NodeKind::MarkupAwaitPendingBlock { children }
            | NodeKind::MarkupAwaitThenBlock { children, .. }
            | NodeKind::MarkupAwaitCatchBlock { children, .. }
            | NodeKind::MarkupKeyBlock { children, .. }
            | NodeKind::MarkupSnippetBlock { children, .. } => {
                children.push(child);
                true
            }
            _ => false,
        };
        if pushed {
            self.nodes[child.index()].parent = Some(parent);
        }
        pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(ast: &mut Ast, name: &str, start: usize) -> NodeId {
        ast.alloc(
            NodeKind::Identifier { name: name.to_string() },
            Range::new(start, start + name.len()),
        )
    }

    #[test]
    fn test_alloc_links_parents_in_source_order() {
        let mut ast = Ast::new();
        let a = ident(&mut ast, "a", 0);
        let b = ident(&mut ast, "b", 4);
        let bin = ast.alloc(
            NodeKind::BinaryExpression { operator: "+".into(), left: a, right: b },
            Range::new(0, 5),
        );
        assert_eq!(ast.parent(a), Some(bin));
        assert_eq!(ast.children(bin), vec![a, b]);
        assert_eq!(ast.descendants(bin), vec![bin, a, b]);
    }

    #[test]
    fn test_remove_and_replace_child() {
        let mut ast = Ast::new();
        let a = ident(&mut ast, "a", 0);
        let stmt = ast.alloc(NodeKind::ExpressionStatement { expression: a }, Range::new(0, 2));
        let program = ast.alloc(
            NodeKind::Program { body: vec![stmt], source_type: SourceType::Module },
            Range::new(0, 2),
        );
        assert!(!ast.remove_child(stmt, a), "required field cannot be emptied");
        assert!(ast.detach(stmt));
        assert_eq!(ast.children(program), Vec::<NodeId>::new());
        assert_eq!(ast.parent(stmt), None);

        let b = ident(&mut ast, "b", 0);
        assert!(ast.replace_child(stmt, a, b));
        assert_eq!(ast.children(stmt), vec![b]);
        assert_eq!(ast.parent(b), Some(stmt));
    }

    #[test]
    fn test_attach_markup_slots() {
        let mut ast = Ast::new();
        let each = ast.alloc(
            NodeKind::MarkupEachBlock {
                expression: None,
                context: None,
                index: None,
                key: None,
                children: vec![],
                else_block: None,
            },
            Range::new(0, 30),
        );
        let items = ident(&mut ast, "items", 7);
        let item = ident(&mut ast, "item", 16);
        assert!(ast.attach(each, SlotField::Expression, items));
        assert!(ast.attach(each, SlotField::Context, item));
        assert!(!ast.attach(each, SlotField::Declaration, item));
        assert_eq!(ast.children(each), vec![items, item]);
        assert_eq!(ast.parent(item), Some(each));
    }
}
