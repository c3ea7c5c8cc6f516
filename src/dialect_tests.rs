#[cfg(test)]
mod tests {
    use crate::coords::Range;
    use crate::host::EsHost;
    use crate::node::{DirectiveKind, ElementKind};
    use crate::pipeline::{parse_for_analysis, ParseResult, ParserOptions};
    use crate::template::{
        AttributeNode, DirectiveAttribute, ElementNode, MustacheNode, ScriptBlock, TemplateDocument, TemplateNode,
    };
    use pretty_assertions::assert_eq;

    fn script_only(source: &str) -> TemplateDocument {
        let open = source.find("<script>").unwrap() + "<script>".len();
        let close = source.find("</script>").unwrap();
        TemplateDocument {
            scripts: vec![ScriptBlock {
                content: Range::new(open, close),
                module: false,
                lang: None,
            }],
            nodes: vec![],
        }
    }

    fn parse_with(source: &str, document: &TemplateDocument, options: &ParserOptions) -> ParseResult {
        parse_for_analysis(source, document, &EsHost, options).unwrap()
    }

    #[test]
    fn test_legacy_globals_are_declared_at_top() {
        let source = "<script>let all = $$props; let rest = $$restProps;</script>";
        let result = parse_with(source, &script_only(source), &ParserOptions::default());
        assert!(!result.dialect.runes);

        let top = result.scopes.top_scope();
        let mut names = result.scopes.variable_names(top);
        names.sort();
        assert_eq!(names, vec!["$$props", "$$restProps", "all", "rest"]);
        assert!(result.scopes.through_names(result.scopes.global_scope()).is_empty());
    }

    #[test]
    fn test_runes_are_declared_globally() {
        let source = "<script>let count = $state(0); $effect(() => count);</script>";
        let result = parse_with(source, &script_only(source), &ParserOptions::default());
        assert!(result.dialect.runes);

        let global = result.scopes.global_scope();
        let mut names = result.scopes.variable_names(global);
        names.sort();
        assert_eq!(names, vec!["$effect", "$state"]);
        assert!(result.scopes.through_names(global).is_empty());
        // `count` is a plain local in runes mode.
        assert!(result.dialect.externally_writable.is_empty());
    }

    #[test]
    fn test_runes_option_overrides_detection() {
        let source = "<script>let count = $state(0);</script>";
        let options = ParserOptions {
            runes: Some(false),
            ..ParserOptions::default()
        };
        let result = parse_with(source, &script_only(source), &options);
        assert!(!result.dialect.runes);
        let global = result.scopes.global_scope();
        assert_eq!(result.scopes.through_names(global), vec!["$state"]);
    }

    #[test]
    fn test_config_source_decides_runes() {
        let source = "<script>let count = 0;</script>";
        let options = ParserOptions {
            config_source: Some("export default { compilerOptions: { runes: true } };".into()),
            ..ParserOptions::default()
        };
        let result = parse_with(source, &script_only(source), &options);
        assert!(result.dialect.runes);
        assert_eq!(result.config.and_then(|c| c.runes), Some(true));
    }

    #[test]
    fn test_store_without_underlying_binding_stays_free() {
        let source = "{$missing}";
        let document = TemplateDocument {
            scripts: vec![],
            nodes: vec![TemplateNode::Mustache(MustacheNode {
                range: Range::new(0, 10),
                expression: Range::new(1, 9),
                raw: false,
            })],
        };
        let result = parse_with(source, &document, &ParserOptions::default());
        assert!(result.dialect.stores.is_empty());
        let global = result.scopes.global_scope();
        assert_eq!(result.scopes.through_names(global), vec!["$missing"]);
    }

    #[test]
    fn test_store_in_script_reads_underlying() {
        let source = "<script>import { count } from './stores';\nconsole.log($count);</script>";
        let result = parse_with(source, &script_only(source), &ParserOptions::default());
        assert_eq!(result.dialect.stores, vec!["count"]);

        let top = result.scopes.top_scope();
        let store = result.scopes.scope(top).set["$count"];
        assert!(result.scopes.variable(store).identifiers.is_empty());
        let count = result.scopes.scope(top).set["count"];
        let reference = result.scopes.reference(result.scopes.variable(count).references[0]);
        assert!(reference.is_virtual && reference.is_read_only());
        assert_eq!(result.scopes.through_names(top), vec!["console"]);
    }

    #[test]
    fn test_store_write_only_reads_underlying() {
        let source = "<script>import { count } from './stores';\n$count = 5;</script>";
        let result = parse_with(source, &script_only(source), &ParserOptions::default());
        assert_eq!(result.dialect.stores, vec!["count"]);

        let top = result.scopes.top_scope();
        let store = result.scopes.variable(result.scopes.scope(top).set["$count"]);
        assert_eq!(store.references.len(), 1);
        let write = result.scopes.reference(store.references[0]);
        assert!(!write.is_virtual && write.is_write_only());

        let count = result.scopes.variable(result.scopes.scope(top).set["count"]);
        assert_eq!(count.references.len(), 1);
        let read = result.scopes.reference(count.references[0]);
        assert!(read.is_virtual && read.is_read_only());
    }

    #[test]
    fn test_bind_directive_target_is_externally_writable() {
        let source = "<script>let value = '';</script><input bind:value>";
        let name = source.rfind("value").unwrap();
        let mut document = script_only(source);
        document.nodes.push(TemplateNode::Element(ElementNode {
            name: "input".into(),
            kind: ElementKind::Html,
            range: Range::new(source.find("<input").unwrap(), source.len()),
            name_range: None,
            attributes: vec![AttributeNode::Directive(DirectiveAttribute {
                range: Range::new(name - "bind:".len(), name + "value".len()),
                kind: DirectiveKind::Bind,
                name: "value".into(),
                name_range: Some(Range::new(name, name + "value".len())),
                modifiers: vec![],
                expression: None,
            })],
            children: vec![],
        }));
        let result = parse_with(source, &document, &ParserOptions::default());
        assert_eq!(result.dialect.externally_writable, vec!["value"]);

        let top = result.scopes.top_scope();
        let value = result.scopes.scope(top).set["value"];
        let flags: Vec<(bool, bool)> = result
            .scopes
            .variable(value)
            .references
            .iter()
            .map(|&r| {
                let reference = result.scopes.reference(r);
                (reference.is_virtual, reference.is_write_only())
            })
            .collect();
        assert_eq!(flags, vec![(false, true), (false, false), (true, true)]);
    }

    #[test]
    fn test_export_const_is_not_a_prop() {
        let source = "<script>export const version = 1; export let title;</script>";
        let result = parse_with(source, &script_only(source), &ParserOptions::default());
        assert_eq!(result.dialect.externally_writable, vec!["title"]);
    }
}
