//! Entry points: template document in, unified tree and scope graph out.

use crate::config::{evaluate_config, DialectConfig};
use crate::coords::CoordinateIndex;
use crate::dialect::{self, DialectReport};
use crate::error::Result;
use crate::host::{HostOptions, HostParser};
use crate::node::{Ast, Comment, NodeId, SourceType, Token};
use crate::restore::restore;
use crate::scope::ScopeManager;
use crate::template::{ScriptBlock, TemplateDocument};
use crate::virtual_script::RestoreContext;
use crate::weave::{translate_host_error, weave, Woven};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParserOptions {
    pub file_path: String,
    pub source_type: SourceType,
    pub ecma_version: u32,
    /// Forces runes mode on or off; detected when unset.
    pub runes: Option<bool>,
    /// Source of the dialect config module, statically evaluated.
    pub config_source: Option<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            file_path: "<input>".to_string(),
            source_type: SourceType::Module,
            ecma_version: 2022,
            runes: None,
            config_source: None,
        }
    }
}

impl ParserOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Host options for a document whose scripts are TypeScript when `typescript` is set.
    pub fn host_options(&self, typescript: bool) -> HostOptions {
        HostOptions {
            source_type: self.source_type,
            ecma_version: self.ecma_version,
            typescript,
        }
    }
}

/// Unified tree, tokens, comments and scope graph of one document.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub ast: Ast,
    pub program: NodeId,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub scopes: ScopeManager,
    pub scripts: Vec<ScriptBlock>,
    pub dialect: DialectReport,
    pub config: Option<DialectConfig>,
}

pub fn parse_for_analysis(
    source: &str,
    document: &TemplateDocument,
    host: &dyn HostParser,
    options: &ParserOptions,
) -> Result<ParseResult> {
    document.validate_ranges(source)?;
    let config = options
        .config_source
        .as_deref()
        .map(evaluate_config)
        .transpose()?;
    let runes = dialect::detect_runes(
        source,
        document,
        options.runes,
        config.as_ref().and_then(|c| c.runes),
    );

    let coords = CoordinateIndex::new(source);
    let mut ast = Ast::new();
    let Woven { script, roots } = weave(source, document, &mut ast, &coords);
    debug!(
        file = %options.file_path,
        length = script.text.len(),
        tasks = script.tasks.len(),
        "built virtual script"
    );

    let host_options = options.host_options(document.scripts.iter().any(|s| s.is_typescript()));
    let parsed = host
        .parse(&script.text, &mut ast, &host_options)
        .map_err(|err| translate_host_error(err, &script, &coords))?;
    let mut scopes = parsed.scopes;
    debug!(
        nodes = ast.len(),
        tokens = parsed.tokens.len(),
        "host parse finished"
    );

    let restored = {
        let mut cx = RestoreContext::new(&mut ast, &mut scopes, &coords);
        restore(
            &mut cx,
            script,
            parsed.program,
            parsed.tokens,
            parsed.comments,
            &roots,
        )?
    };
    let dialect = dialect::apply(&ast, &mut scopes, parsed.program, runes);

    Ok(ParseResult {
        ast,
        program: parsed.program,
        tokens: restored.tokens,
        comments: restored.comments,
        scopes,
        scripts: document.scripts.clone(),
        dialect,
        config,
    })
}

/// Parses a `(source, document)` pair per entry, in parallel. Documents share nothing.
pub fn parse_batch(
    inputs: &[(&str, &TemplateDocument)],
    host: &dyn HostParser,
    options: &ParserOptions,
) -> Vec<Result<ParseResult>> {
    inputs
        .par_iter()
        .map(|(source, document)| parse_for_analysis(source, document, host, options))
        .collect()
}

/// Parses a template document given as front-end JSON.
pub fn parse_json(source: &str, document_json: &str, host: &dyn HostParser, options: &ParserOptions) -> Result<ParseResult> {
    let document = TemplateDocument::from_json(document_json)?;
    parse_for_analysis(source, &document, host, options)
}

impl ParseResult {
    pub fn to_estree(&self) -> serde_json::Value {
        crate::estree::to_estree(&self.ast, self.program, &self.tokens, &self.comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WeaveError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_options_from_json() {
        let options = ParserOptions::from_json(r#"{"filePath":"App.svelte","runes":true}"#).unwrap();
        assert_eq!(options.file_path, "App.svelte");
        assert_eq!(options.runes, Some(true));
        assert_eq!(options.source_type, SourceType::Module);
        assert_eq!(options.ecma_version, 2022);
    }

    #[test]
    fn test_bad_options_are_input_errors() {
        let err = ParserOptions::from_json(r#"{"sourceType":"commonjs"}"#).unwrap_err();
        assert!(matches!(err, WeaveError::InvalidInput(_)));
    }
}
