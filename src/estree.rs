//! ESTree-shaped JSON export of the unified tree.

use crate::coords::{Range, SourceLocation};
use crate::node::{Ast, Comment, CommentKind, Field, NodeId, Token};
use serde_json::{json, Map, Value};

fn position_value(range: Range, loc: SourceLocation) -> (Value, Value) {
    (
        json!([range.start, range.end]),
        json!({
            "start": { "line": loc.start.line, "column": loc.start.column },
            "end": { "line": loc.end.line, "column": loc.end.column },
        }),
    )
}

fn field_value(ast: &Ast, field: Field<'_>) -> Value {
    match field {
        Field::Node(id) => node_value(ast, id),
        Field::OptNode(id) => id.map_or(Value::Null, |id| node_value(ast, id)),
        Field::Nodes(ids) => Value::Array(ids.iter().map(|&id| node_value(ast, id)).collect()),
        Field::OptNodes(ids) => Value::Array(
            ids.iter()
                .map(|id| id.map_or(Value::Null, |id| node_value(ast, id)))
                .collect(),
        ),
        Field::Str(s) => Value::String(s.to_string()),
        Field::Strs(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        Field::Bool(b) => Value::Bool(b),
        Field::Num(n) => json!(n),
        Field::Null => Value::Null,
        Field::Record(members) => Value::Object(
            members
                .iter()
                .map(|(key, value)| (key.to_string(), value.map_or(Value::Null, |v| Value::String(v.into()))))
                .collect(),
        ),
    }
}

pub fn node_value(ast: &Ast, id: NodeId) -> Value {
    let node = &ast[id];
    let mut map = Map::new();
    map.insert("type".into(), Value::String(node.kind.type_name().into()));
    for (name, field) in node.kind.fields() {
        map.insert(name.into(), field_value(ast, field));
    }
    let (range, loc) = position_value(node.range, node.loc);
    map.insert("range".into(), range);
    map.insert("loc".into(), loc);
    Value::Object(map)
}

fn token_value(token: &Token) -> Value {
    let (range, loc) = position_value(token.range, token.loc);
    json!({ "type": token.kind.as_str(), "value": token.value, "range": range, "loc": loc })
}

fn comment_value(comment: &Comment) -> Value {
    let kind = match comment.kind {
        CommentKind::Line => "Line",
        CommentKind::Block => "Block",
    };
    let (range, loc) = position_value(comment.range, comment.loc);
    json!({ "type": kind, "value": comment.value, "range": range, "loc": loc })
}

/// The program node with `tokens` and `comments` arrays attached.
pub fn to_estree(ast: &Ast, program: NodeId, tokens: &[Token], comments: &[Comment]) -> Value {
    let mut root = node_value(ast, program);
    if let Value::Object(map) = &mut root {
        map.insert("tokens".into(), tokens.iter().map(token_value).collect());
        map.insert("comments".into(), comments.iter().map(comment_value).collect());
    }
    root
}
