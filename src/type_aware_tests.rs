#[cfg(test)]
mod tests {
    use crate::coords::Range;
    use crate::host::EsHost;
    use crate::node::NodeKind;
    use crate::pipeline::{parse_for_analysis, ParserOptions};
    use crate::scope::ScopeKind;
    use crate::template::{MustacheNode, ScriptBlock, TemplateDocument, TemplateNode};
    use crate::type_aware::{analyze_type_aware, TypeAwareResult};
    use pretty_assertions::assert_eq;

    fn span(source: &str, needle: &str) -> Range {
        let start = source.find(needle).unwrap();
        Range::new(start, start + needle.len())
    }

    fn document(source: &str, lang: Option<&str>) -> TemplateDocument {
        let open = source.find('>').unwrap() + 1;
        let close = source.find("</script>").unwrap();
        let mut document = TemplateDocument {
            scripts: vec![ScriptBlock {
                content: Range::new(open, close),
                module: false,
                lang: lang.map(str::to_string),
            }],
            nodes: vec![],
        };
        if let Some(at) = source.rfind("{d}") {
            document.nodes.push(TemplateNode::Mustache(MustacheNode {
                range: Range::new(at, at + 3),
                expression: Range::new(at + 1, at + 2),
                raw: false,
            }));
        }
        document
    }

    fn analyze(source: &str, document: &TemplateDocument) -> TypeAwareResult {
        let options = ParserOptions {
            file_path: "App.svelte".into(),
            ..ParserOptions::default()
        };
        let parsed = parse_for_analysis(source, document, &EsHost, &options).unwrap();
        analyze_type_aware(source, &parsed, &EsHost, &options).unwrap()
    }

    const COMPONENT: &str = "<script>\n\
        let a = 1;\n\
        const count = writable(0);\n\
        $: d = a * 2;\n\
        $: console.log($count);\n\
        </script>\n\
        {d}";

    #[test]
    fn test_virtual_file_rewrites_reactive_and_stores() {
        let result = analyze(COMPONENT, &document(COMPONENT, None));
        assert_eq!(result.file.file_name, "App.svelte.js");
        assert!(result.file.text.contains("let d = __reactive(() => (a * 2));"));
        assert!(result.file.text.ends_with("let $count = __store_value(count);"));
        assert!(!result.file.text.contains("<script>"));
        assert!(!result.file.text.contains("{d}"));

        let labels: Vec<&str> = result.fragments.iter().map(|f| f.label.as_str()).collect();
        assert!(labels.contains(&"reactive"));
        assert!(labels.iter().any(|l| l.split('+').any(|part| part == "store")));
    }

    #[test]
    fn test_restore_processes_fire_once_in_order() {
        let result = analyze(COMPONENT, &document(COMPONENT, None));
        assert_eq!(result.applied, vec!["reactive", "store-stand-in"]);

        let kinds: Vec<&str> = result
            .ast
            .children(result.program)
            .into_iter()
            .map(|id| result.ast.kind(id).type_name())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "VariableDeclaration",
                "VariableDeclaration",
                "LabeledStatement",
                "LabeledStatement"
            ]
        );
    }

    #[test]
    fn test_reactive_statement_is_restored_in_place() {
        let result = analyze(COMPONENT, &document(COMPONENT, None));
        let statement = span(COMPONENT, "$: d = a * 2;");
        let reactive = result
            .ast
            .children(result.program)
            .into_iter()
            .find(|&id| result.ast.range(id) == statement)
            .expect("reactive statement restored");
        let NodeKind::LabeledStatement { label, body } = result.ast.kind(reactive) else {
            panic!("expected a labeled statement");
        };
        assert_eq!(result.ast.identifier_name(*label), Some("$"));
        let NodeKind::ExpressionStatement { expression } = result.ast.kind(*body) else {
            panic!("expected an expression statement");
        };
        let NodeKind::AssignmentExpression { left, right, .. } = result.ast.kind(*expression) else {
            panic!("expected an assignment");
        };
        let left_at = span(COMPONENT, "d = a").start;
        assert_eq!(result.ast.range(*left), Range::new(left_at, left_at + 1));
        assert_eq!(result.ast.range(*right), span(COMPONENT, "a * 2"));

        let values: Vec<&str> = result
            .tokens
            .iter()
            .filter(|t| statement.contains(t.range))
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(values, vec!["$", ":", "d", "=", "a", "*", "2", ";"]);
        assert!(result
            .tokens
            .iter()
            .all(|t| t.value != "__reactive" && t.value != "__store_value"));
    }

    #[test]
    fn test_scopes_after_restoring() {
        let result = analyze(COMPONENT, &document(COMPONENT, None));
        let kinds: Vec<ScopeKind> = result.scopes.scopes().map(|(_, s)| s.kind).collect();
        assert_eq!(kinds, vec![ScopeKind::Global, ScopeKind::Module]);

        let top = result.scopes.top_scope();
        let mut through = result.scopes.through_names(top);
        through.sort();
        assert_eq!(through, vec!["console", "writable"]);

        let d = result.scopes.scope(top).set["d"];
        assert_eq!(result.scopes.variable(d).identifiers.len(), 1);
        let store = result.scopes.scope(top).set["$count"];
        assert!(result.scopes.variable(store).identifiers.is_empty());
        let count = result.scopes.scope(top).set["count"];
        assert!(result
            .scopes
            .variable(count)
            .references
            .iter()
            .any(|&r| result.scopes.reference(r).is_virtual));
    }

    #[test]
    fn test_multiple_reactive_declarations() {
        let source = "<script lang=\"ts\">\n$: d = a * 2;\n$: e = d + 1;\nlet a = 1;\n</script>";
        let result = analyze(source, &document(source, Some("ts")));
        assert_eq!(result.file.file_name, "App.svelte.ts");
        assert_eq!(result.applied, vec!["reactive", "reactive"]);

        let top = result.scopes.top_scope();
        let mut names = result.scopes.variable_names(top);
        names.sort();
        assert_eq!(names, vec!["a", "d", "e"]);
        assert!(result.scopes.through_names(top).is_empty());
        assert_eq!(result.ast.range(result.program), Range::new(18, source.len() - "</script>".len()));
    }

    #[test]
    fn test_plain_script_needs_no_processes() {
        let source = "<script>let a = 1; // note\n</script>";
        let result = analyze(source, &document(source, None));
        assert!(result.applied.is_empty());
        assert_eq!(result.comments.len(), 1);
        assert_eq!(result.comments[0].range, span(source, "// note"));
        assert_eq!(result.ast.children(result.program).len(), 1);
    }
}
