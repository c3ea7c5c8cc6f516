//! # Template Weaver
//!
//! Turns a component template (markup with embedded script expressions plus its script
//! blocks) into one syntax tree and one scope graph that a static-analysis consumer can
//! walk as if the whole document were an ordinary script.
//!
//! ## Pipeline
//!
//! 1. **Weave**: every embedded expression or pattern is copied into a host-language
//!    wrapper chosen so that the host's own scoping rules match the template construct
//!    (`if (…) {}` for conditionals, a per-item callback for iteration, …).
//! 2. **Host parse**: the virtual script goes through a [`HostParser`] which allocates
//!    into the same arena as the markup nodes.
//! 3. **Restore**: wrapper nodes are matched back to their restore tasks by position,
//!    real sub-trees are moved onto original coordinates and reattached to markup slots,
//!    and the scope graph is repaired.
//! 4. **Dialect passes**: runes, stores, reactive declarations and externally-writable
//!    bindings are reconciled through the scope primitives.
//!
//! ## Coordinate Invariants
//!
//! 1. Every range in a returned tree, token or comment is a byte range of the original
//!    document; line numbers are 1-based, columns are 0-based and count chars.
//! 2. Synthetic wrapper text never surfaces: no node, token, comment or scope object
//!    produced only by scaffolding survives restoration.
//! 3. A failed restore is an error, never a partial tree.

mod config;
mod coords;
mod dialect;
mod error;
mod estree;
pub mod host;
mod node;
mod pipeline;
mod restore;
mod scope;
mod template;
mod text_document;
mod type_aware;
mod virtual_script;
mod weave;

#[cfg(test)]
mod dialect_tests;
#[cfg(test)]
mod type_aware_tests;

pub use config::{evaluate_config, DialectConfig};
pub use coords::{CoordinateIndex, Position, Range, SourceLocation};
pub use dialect::DialectReport;
pub use error::{HostError, Result, WeaveError};
pub use host::{EsHost, HostOptions, HostParse, HostParser};
pub use node::{
    Ast, Comment, CommentKind, DirectiveKind, ElementKind, Node, NodeId, NodeKind, SlotField, SourceType, Token,
    TokenKind, VariableKind,
};
pub use pipeline::{parse_batch, parse_for_analysis, parse_json, ParseResult, ParserOptions};
pub use scope::{
    DefinitionKind, Reference, ReferenceFlag, ReferenceId, Scope, ScopeId, ScopeKind, ScopeManager, Variable,
    VariableId, VirtualAccess,
};
pub use template::{
    AttributeNode, AttributeValue, AwaitBlockNode, AwaitBranchNode, BranchNode, ConstTagNode, DirectiveAttribute,
    EachBlockNode, ElementNode, IfBlockNode, KeyBlockNode, MustacheNode, PlainAttribute, RenderTagNode,
    ScriptBlock, ShorthandAttribute, SnippetBlockNode, SpreadAttribute, TemplateDocument, TemplateNode, TextNode,
};
pub use text_document::{VirtualFile, VirtualFragment};
pub use type_aware::{analyze_type_aware, RestoreProcess, TypeAwareResult};
