//! Static evaluation of a dialect configuration module.
//!
//! Only literal data is read: `export default { … }`, optionally wrapped in a call such as
//! `defineConfig({ … })` or routed through a `const` binding. Anything else evaluates to
//! unknown and is ignored.

use crate::error::{Result, WeaveError};
use oxc_allocator::Allocator;
use oxc_ast::ast::{ArrayExpressionElement, BindingPattern, Expression, ObjectPropertyKind, Statement};
use oxc_parser::Parser;
use oxc_span::SourceType;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialectConfig {
    /// `compilerOptions.runes`
    pub runes: Option<bool>,
    /// `extensions`, e.g. `[".svelte", ".svx"]`.
    pub extensions: Vec<String>,
}

pub fn evaluate_config(source: &str) -> Result<DialectConfig> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true).with_typescript(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(WeaveError::Config(error.to_string()));
    }

    let mut evaluator = Evaluator::default();
    let mut exported = None;
    for statement in &ret.program.body {
        match statement {
            Statement::VariableDeclaration(declaration) => {
                for declarator in &declaration.declarations {
                    let BindingPattern::BindingIdentifier(id) = &declarator.id else {
                        continue;
                    };
                    if let Some(value) = declarator.init.as_ref().and_then(|init| evaluator.eval(init)) {
                        evaluator.bindings.insert(id.name.to_string(), value);
                    }
                }
            }
            Statement::ExportDefaultDeclaration(export) => {
                exported = export
                    .declaration
                    .as_expression()
                    .and_then(|expression| evaluator.eval(expression));
            }
            _ => {}
        }
    }

    let Some(Value::Object(root)) = exported else {
        warn!("config has no statically known default export");
        return Ok(DialectConfig::default());
    };
    Ok(read_flags(&root))
}

fn read_flags(root: &Map<String, Value>) -> DialectConfig {
    let mut config = DialectConfig::default();
    match root.get("compilerOptions").and_then(|options| options.get("runes")) {
        Some(Value::Bool(runes)) => config.runes = Some(*runes),
        Some(Value::Null) | None => {}
        Some(other) => warn!(value = %other, "ignoring non-boolean compilerOptions.runes"),
    }
    match root.get("extensions") {
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(ext) => config.extensions.push(ext.clone()),
                    other => warn!(value = %other, "ignoring non-string extension"),
                }
            }
        }
        Some(other) => warn!(value = %other, "ignoring non-array extensions"),
        None => {}
    }
    config
}

#[derive(Default)]
struct Evaluator {
    bindings: FxHashMap<String, Value>,
}

impl Evaluator {
    fn eval(&self, expression: &Expression<'_>) -> Option<Value> {
        match expression {
            Expression::StringLiteral(s) => Some(Value::String(s.value.to_string())),
            Expression::NumericLiteral(n) => Number::from_f64(n.value).map(Value::Number),
            Expression::BooleanLiteral(b) => Some(Value::Bool(b.value)),
            Expression::NullLiteral(_) => Some(Value::Null),
            Expression::TemplateLiteral(t) if t.expressions.is_empty() => t
                .quasis
                .first()
                .and_then(|q| q.value.cooked.as_ref())
                .map(|cooked| Value::String(cooked.to_string())),
            Expression::Identifier(id) => self.bindings.get(id.name.as_str()).cloned(),
            Expression::ParenthesizedExpression(p) => self.eval(&p.expression),
            Expression::TSAsExpression(e) => self.eval(&e.expression),
            Expression::TSSatisfiesExpression(e) => self.eval(&e.expression),
            Expression::CallExpression(call) => call
                .arguments
                .first()
                .and_then(|arg| arg.as_expression())
                .and_then(|arg| self.eval(arg)),
            Expression::ArrayExpression(array) => {
                let mut items = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    match element {
                        ArrayExpressionElement::SpreadElement(_) | ArrayExpressionElement::Elision(_) => {
                            return None
                        }
                        other => items.push(self.eval(other.as_expression()?).unwrap_or(Value::Null)),
                    }
                }
                Some(Value::Array(items))
            }
            Expression::ObjectExpression(object) => {
                let mut map = Map::new();
                for property in &object.properties {
                    match property {
                        ObjectPropertyKind::ObjectProperty(p) if !p.computed => {
                            let Some(key) = p.key.static_name() else {
                                continue;
                            };
                            if let Some(value) = self.eval(&p.value) {
                                map.insert(key.to_string(), value);
                            }
                        }
                        ObjectPropertyKind::SpreadProperty(spread) => {
                            if let Some(Value::Object(inner)) = self.eval(&spread.argument) {
                                map.extend(inner);
                            }
                        }
                        _ => {}
                    }
                }
                Some(Value::Object(map))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reads_default_export_object() {
        let config = evaluate_config(
            r#"
            export default {
                extensions: ['.svelte', '.svx'],
                compilerOptions: { runes: true },
            };
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            DialectConfig {
                runes: Some(true),
                extensions: vec![".svelte".into(), ".svx".into()],
            }
        );
    }

    #[test]
    fn test_follows_const_binding_and_wrapper_call() {
        let config = evaluate_config(
            r#"
            import { defineConfig } from 'kit';
            const shared = { runes: false };
            const config = defineConfig({ compilerOptions: { ...shared } });
            export default config;
            "#,
        )
        .unwrap();
        assert_eq!(config.runes, Some(false));
        assert!(config.extensions.is_empty());
    }

    #[test]
    fn test_dynamic_values_are_ignored() {
        let config = evaluate_config("export default { compilerOptions: { runes: process.env.RUNES } };").unwrap();
        assert_eq!(config, DialectConfig::default());
    }

    #[test]
    fn test_syntax_error_is_config_error() {
        let err = evaluate_config("export default {").unwrap_err();
        assert_eq!(err.code(), "W-ERR-CONFIG-001");
    }
}
