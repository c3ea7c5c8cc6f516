//! Lexical scope analysis over an oxc program, producing the eslint-scope shaped graph the
//! reconciler works on.
//!
//! The walker runs over the oxc tree and names arena nodes through the address map built by
//! the lowering pass. Function bodies share the function scope; other blocks get their own.
//! `var` bindings hoist to the nearest variable scope. Type positions are skipped. References
//! are resolved once the whole program has been walked, in creation order.

use super::lower::address;
use crate::node::{NodeId, SourceType};
use crate::scope::{DefinitionKind, ReferenceFlag, ReferenceId, ScopeId, ScopeKind, ScopeManager};
use oxc_ast::ast as js;
use oxc_ast_visit::{walk, Visit};
use oxc_syntax::scope::ScopeFlags;
use rustc_hash::FxHashMap;

pub fn analyze(
    program: &js::Program<'_>,
    root: NodeId,
    source_type: SourceType,
    nodes: &FxHashMap<usize, NodeId>,
) -> ScopeManager {
    let mut scopes = ScopeManager::new();
    let global = scopes.add_scope(ScopeKind::Global, root, None);
    let current = match source_type {
        SourceType::Module => scopes.add_scope(ScopeKind::Module, root, Some(global)),
        SourceType::Script => global,
    };
    let mut analyzer = Analyzer {
        nodes,
        scopes,
        current,
        pending: Vec::new(),
    };
    analyzer.visit_statements(&program.body);
    let Analyzer { mut scopes, pending, .. } = analyzer;
    for reference in pending {
        scopes.resolve(reference);
    }
    scopes
}

#[derive(Clone, Copy)]
struct Binding {
    scope: ScopeId,
    kind: DefinitionKind,
    /// The declarator writes an initial value.
    init: bool,
}

struct Analyzer<'n> {
    nodes: &'n FxHashMap<usize, NodeId>,
    scopes: ScopeManager,
    current: ScopeId,
    pending: Vec<ReferenceId>,
}

impl Analyzer<'_> {
    fn node<T>(&self, node: &T) -> Option<NodeId> {
        self.nodes.get(&address(node)).copied()
    }

    fn with_scope<T>(&mut self, kind: ScopeKind, owner: &T, f: impl FnOnce(&mut Self)) {
        let Some(block) = self.node(owner) else {
            return f(self);
        };
        let saved = self.current;
        self.current = self.scopes.add_scope(kind, block, Some(saved));
        f(self);
        self.current = saved;
    }

    fn reference(&mut self, ident: &js::IdentifierReference<'_>, flag: ReferenceFlag, init: bool) {
        if let Some(node) = self.node(ident) {
            let id = self.scopes.add_reference(self.current, node, &ident.name, flag, init);
            self.pending.push(id);
        }
    }

    fn declare(&mut self, scope: ScopeId, ident: &js::BindingIdentifier<'_>, kind: DefinitionKind) {
        if let Some(node) = self.node(ident) {
            self.scopes.declare(scope, &ident.name, node, kind);
        }
    }

    fn declaration_scope(&self, kind: js::VariableDeclarationKind) -> ScopeId {
        match kind {
            js::VariableDeclarationKind::Var => self.scopes.scope(self.current).variable_scope,
            _ => self.current,
        }
    }

    /// Declares a binding pattern: identifiers are declared (and written when `init`),
    /// default values and computed keys are read.
    fn binding_pattern(&mut self, pattern: &js::BindingPattern<'_>, binding: Binding) {
        match pattern {
            js::BindingPattern::BindingIdentifier(ident) => {
                self.declare(binding.scope, ident, binding.kind);
                if let Some(node) = self.node(&**ident).filter(|_| binding.init) {
                    let id = self.scopes.add_reference(self.current, node, &ident.name, ReferenceFlag::Write, true);
                    self.pending.push(id);
                }
            }
            js::BindingPattern::ObjectPattern(object) => {
                for property in &object.properties {
                    if property.computed {
                        self.visit_property_key(&property.key);
                    }
                    self.binding_pattern(&property.value, binding);
                }
                if let Some(rest) = &object.rest {
                    self.binding_pattern(&rest.argument, binding);
                }
            }
            js::BindingPattern::ArrayPattern(array) => {
                for element in array.elements.iter().flatten() {
                    self.binding_pattern(element, binding);
                }
                if let Some(rest) = &array.rest {
                    self.binding_pattern(&rest.argument, binding);
                }
            }
            js::BindingPattern::AssignmentPattern(assignment) => {
                self.binding_pattern(&assignment.left, binding);
                self.visit_expression(&assignment.right);
            }
        }
    }

    /// Walks the target of `=` or a for-in/of head: identifiers are written, everything
    /// else is read.
    fn assignment_target(&mut self, target: &js::AssignmentTarget<'_>) {
        match target {
            js::AssignmentTarget::AssignmentTargetIdentifier(ident) => {
                self.reference(ident, ReferenceFlag::Write, false);
            }
            js::AssignmentTarget::ArrayAssignmentTarget(array) => {
                for element in array.elements.iter().flatten() {
                    self.maybe_default(element);
                }
                if let Some(rest) = &array.rest {
                    self.assignment_target(&rest.target);
                }
            }
            js::AssignmentTarget::ObjectAssignmentTarget(object) => {
                for property in &object.properties {
                    match property {
                        js::AssignmentTargetProperty::AssignmentTargetPropertyIdentifier(prop) => {
                            self.reference(&prop.binding, ReferenceFlag::Write, false);
                            if let Some(init) = &prop.init {
                                self.visit_expression(init);
                            }
                        }
                        js::AssignmentTargetProperty::AssignmentTargetPropertyProperty(prop) => {
                            if prop.computed {
                                self.visit_property_key(&prop.name);
                            }
                            self.maybe_default(&prop.binding);
                        }
                    }
                }
                if let Some(rest) = &object.rest {
                    self.assignment_target(&rest.target);
                }
            }
            other => walk::walk_assignment_target(self, other),
        }
    }

    fn maybe_default(&mut self, target: &js::AssignmentTargetMaybeDefault<'_>) {
        match target {
            js::AssignmentTargetMaybeDefault::AssignmentTargetWithDefault(with_default) => {
                self.assignment_target(&with_default.binding);
                self.visit_expression(&with_default.init);
            }
            other => {
                if let Some(target) = other.as_assignment_target() {
                    self.assignment_target(target);
                }
            }
        }
    }

    fn params(&mut self, params: &js::FormalParameters<'_>) {
        let binding = Binding {
            scope: self.current,
            kind: DefinitionKind::Parameter,
            init: false,
        };
        for param in &params.items {
            self.binding_pattern(&param.pattern, binding);
            if let Some(init) = &param.initializer {
                self.visit_expression(init);
            }
        }
        if let Some(rest) = &params.rest {
            self.binding_pattern(&rest.rest.argument, binding);
        }
    }

    fn for_head(&mut self, left: &js::ForStatementLeft<'_>) {
        match left {
            js::ForStatementLeft::VariableDeclaration(declaration) => {
                let scope = self.declaration_scope(declaration.kind);
                let binding = Binding { scope, kind: DefinitionKind::Variable, init: true };
                for declarator in &declaration.declarations {
                    self.binding_pattern(&declarator.id, binding);
                }
            }
            other => {
                if let Some(target) = other.as_assignment_target() {
                    self.assignment_target(target);
                }
            }
        }
    }
}

fn is_lexical(declaration: &js::VariableDeclaration<'_>) -> bool {
    declaration.kind != js::VariableDeclarationKind::Var
}

impl<'a> Visit<'a> for Analyzer<'_> {
    fn visit_identifier_reference(&mut self, it: &js::IdentifierReference<'a>) {
        self.reference(it, ReferenceFlag::Read, false);
    }

    // Bindings are declared by the construct that owns them.
    fn visit_binding_identifier(&mut self, _it: &js::BindingIdentifier<'a>) {}

    fn visit_variable_declaration(&mut self, it: &js::VariableDeclaration<'a>) {
        let scope = self.declaration_scope(it.kind);
        for declarator in &it.declarations {
            let binding = Binding {
                scope,
                kind: DefinitionKind::Variable,
                init: declarator.init.is_some(),
            };
            self.binding_pattern(&declarator.id, binding);
            if let Some(init) = &declarator.init {
                self.visit_expression(init);
            }
        }
    }

    fn visit_function(&mut self, it: &js::Function<'a>, _flags: ScopeFlags) {
        let is_declaration = it.is_declaration();
        if is_declaration || it.body.is_none() {
            if let Some(id) = &it.id {
                self.declare(self.current, id, DefinitionKind::FunctionName);
            }
        }
        let Some(body) = &it.body else {
            return;
        };
        self.with_scope(ScopeKind::Function, it, |this| {
            if !is_declaration {
                if let Some(id) = &it.id {
                    this.declare(this.current, id, DefinitionKind::FunctionName);
                }
            }
            this.params(&it.params);
            walk::walk_function_body(this, body);
        });
    }

    fn visit_arrow_function_expression(&mut self, it: &js::ArrowFunctionExpression<'a>) {
        self.with_scope(ScopeKind::Function, it, |this| {
            this.params(&it.params);
            walk::walk_function_body(this, &it.body);
        });
    }

    fn visit_block_statement(&mut self, it: &js::BlockStatement<'a>) {
        self.with_scope(ScopeKind::Block, it, |this| this.visit_statements(&it.body));
    }

    fn visit_for_statement(&mut self, it: &js::ForStatement<'a>) {
        let lexical = matches!(&it.init, Some(js::ForStatementInit::VariableDeclaration(d)) if is_lexical(d));
        if lexical {
            self.with_scope(ScopeKind::For, it, |this| walk::walk_for_statement(this, it));
        } else {
            walk::walk_for_statement(self, it);
        }
    }

    fn visit_for_in_statement(&mut self, it: &js::ForInStatement<'a>) {
        let lexical = matches!(&it.left, js::ForStatementLeft::VariableDeclaration(d) if is_lexical(d));
        let parts = |this: &mut Self| {
            this.for_head(&it.left);
            this.visit_expression(&it.right);
            this.visit_statement(&it.body);
        };
        if lexical {
            self.with_scope(ScopeKind::For, it, parts);
        } else {
            parts(self);
        }
    }

    fn visit_for_of_statement(&mut self, it: &js::ForOfStatement<'a>) {
        let lexical = matches!(&it.left, js::ForStatementLeft::VariableDeclaration(d) if is_lexical(d));
        let parts = |this: &mut Self| {
            this.for_head(&it.left);
            this.visit_expression(&it.right);
            this.visit_statement(&it.body);
        };
        if lexical {
            self.with_scope(ScopeKind::For, it, parts);
        } else {
            parts(self);
        }
    }

    fn visit_switch_statement(&mut self, it: &js::SwitchStatement<'a>) {
        self.visit_expression(&it.discriminant);
        self.with_scope(ScopeKind::Switch, it, |this| {
            for case in &it.cases {
                walk::walk_switch_case(this, case);
            }
        });
    }

    fn visit_catch_clause(&mut self, it: &js::CatchClause<'a>) {
        self.with_scope(ScopeKind::Catch, it, |this| {
            if let Some(param) = &it.param {
                let binding = Binding {
                    scope: this.current,
                    kind: DefinitionKind::CatchClause,
                    init: false,
                };
                this.binding_pattern(&param.pattern, binding);
            }
            this.visit_block_statement(&it.body);
        });
    }

    fn visit_class(&mut self, it: &js::Class<'a>) {
        if it.is_declaration() {
            if let Some(id) = &it.id {
                self.declare(self.current, id, DefinitionKind::ClassName);
            }
        }
        self.with_scope(ScopeKind::Class, it, |this| {
            if let Some(id) = &it.id {
                this.declare(this.current, id, DefinitionKind::ClassName);
            }
            if let Some(super_class) = &it.super_class {
                this.visit_expression(super_class);
            }
            this.visit_class_body(&it.body);
        });
    }

    fn visit_static_block(&mut self, it: &js::StaticBlock<'a>) {
        self.with_scope(ScopeKind::ClassStaticBlock, it, |this| this.visit_statements(&it.body));
    }

    fn visit_import_declaration(&mut self, it: &js::ImportDeclaration<'a>) {
        for specifier in it.specifiers.iter().flatten() {
            let local = match specifier {
                js::ImportDeclarationSpecifier::ImportSpecifier(spec) => &spec.local,
                js::ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => &spec.local,
                js::ImportDeclarationSpecifier::ImportNamespaceSpecifier(spec) => &spec.local,
            };
            self.declare(self.current, local, DefinitionKind::ImportBinding);
        }
    }

    fn visit_export_named_declaration(&mut self, it: &js::ExportNamedDeclaration<'a>) {
        if let Some(declaration) = &it.declaration {
            self.visit_declaration(declaration);
        }
        if it.source.is_some() {
            return;
        }
        for specifier in &it.specifiers {
            let (node, name) = match &specifier.local {
                js::ModuleExportName::IdentifierReference(ident) => (self.node(ident), &ident.name),
                js::ModuleExportName::IdentifierName(ident) => (self.node(ident), &ident.name),
                js::ModuleExportName::StringLiteral(_) => continue,
            };
            if let Some(node) = node {
                let id = self.scopes.add_reference(self.current, node, name, ReferenceFlag::Read, false);
                self.pending.push(id);
            }
        }
    }

    fn visit_assignment_expression(&mut self, it: &js::AssignmentExpression<'a>) {
        if it.operator == js::AssignmentOperator::Assign {
            self.assignment_target(&it.left);
        } else if let js::AssignmentTarget::AssignmentTargetIdentifier(ident) = &it.left {
            self.reference(ident, ReferenceFlag::ReadWrite, false);
        } else {
            self.visit_assignment_target(&it.left);
        }
        self.visit_expression(&it.right);
    }

    fn visit_update_expression(&mut self, it: &js::UpdateExpression<'a>) {
        match &it.argument {
            js::SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) => {
                self.reference(ident, ReferenceFlag::ReadWrite, false);
            }
            other => self.visit_simple_assignment_target(other),
        }
    }

    fn visit_ts_enum_declaration(&mut self, it: &js::TSEnumDeclaration<'a>) {
        self.declare(self.current, &it.id, DefinitionKind::Variable);
    }

    fn visit_ts_import_equals_declaration(&mut self, it: &js::TSImportEqualsDeclaration<'a>) {
        self.declare(self.current, &it.id, DefinitionKind::Variable);
    }

    // Type positions carry no value bindings.
    fn visit_ts_type(&mut self, _it: &js::TSType<'a>) {}
    fn visit_ts_type_annotation(&mut self, _it: &js::TSTypeAnnotation<'a>) {}
    fn visit_ts_type_parameter_declaration(&mut self, _it: &js::TSTypeParameterDeclaration<'a>) {}
    fn visit_ts_type_parameter_instantiation(&mut self, _it: &js::TSTypeParameterInstantiation<'a>) {}
    fn visit_ts_class_implements(&mut self, _it: &js::TSClassImplements<'a>) {}
    fn visit_ts_type_alias_declaration(&mut self, _it: &js::TSTypeAliasDeclaration<'a>) {}
    fn visit_ts_interface_declaration(&mut self, _it: &js::TSInterfaceDeclaration<'a>) {}
    fn visit_ts_module_declaration(&mut self, _it: &js::TSModuleDeclaration<'a>) {}
}

#[cfg(test)]
mod tests {
    use crate::host::{EsHost, HostOptions, HostParser};
    use crate::node::Ast;
    use crate::scope::{ReferenceFlag, ScopeKind, ScopeManager};
    use pretty_assertions::assert_eq;

    fn analyze_with(text: &str, options: &HostOptions) -> ScopeManager {
        let mut ast = Ast::new();
        EsHost.parse(text, &mut ast, options).unwrap().scopes
    }

    fn analyze_text(text: &str) -> ScopeManager {
        analyze_with(text, &HostOptions::default())
    }

    fn kinds(scopes: &ScopeManager) -> Vec<ScopeKind> {
        scopes.scopes().map(|(_, s)| s.kind).collect()
    }

    #[test]
    fn test_module_scope_holds_top_level_bindings() {
        let scopes = analyze_text("import x from 'x';\nlet a = 1;\nfunction f(p) { return p + a + y; }");
        let module = scopes.top_scope();
        assert_eq!(scopes.variable_names(module), vec!["x", "a", "f"]);
        assert_eq!(scopes.through_names(module), vec!["y"]);
        assert_eq!(scopes.through_names(scopes.global_scope()), vec!["y"]);
    }

    #[test]
    fn test_var_hoists_past_blocks() {
        let scopes = analyze_text("{ var v = 1; let l = 2; }");
        let module = scopes.top_scope();
        assert_eq!(scopes.variable_names(module), vec!["v"]);
        let block = scopes.scope(module).child_scopes[0];
        assert_eq!(scopes.scope(block).kind, ScopeKind::Block);
        assert_eq!(scopes.variable_names(block), vec!["l"]);
    }

    #[test]
    fn test_reference_flags() {
        let scopes = analyze_text("let a = 0; a += 1; a = 2; b++; c.d = a;");
        let flags: Vec<(String, ReferenceFlag, bool)> = scopes
            .references()
            .map(|(_, r)| (r.name.clone(), r.flag, r.init))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("a".to_string(), ReferenceFlag::Write, true),
                ("a".to_string(), ReferenceFlag::ReadWrite, false),
                ("a".to_string(), ReferenceFlag::Write, false),
                ("b".to_string(), ReferenceFlag::ReadWrite, false),
                ("c".to_string(), ReferenceFlag::Read, false),
                ("a".to_string(), ReferenceFlag::Read, false),
            ]
        );
    }

    #[test]
    fn test_arrow_body_shares_function_scope() {
        let scopes = analyze_text("items.forEach((item, i) => { item; });");
        let module = scopes.top_scope();
        assert_eq!(kinds(&scopes), vec![ScopeKind::Global, ScopeKind::Module, ScopeKind::Function]);
        let arrow = scopes.scope(module).child_scopes[0];
        assert_eq!(scopes.variable_names(arrow), vec!["item", "i"]);
        assert_eq!(scopes.through_names(module), vec!["items"]);
    }

    #[test]
    fn test_catch_clause_scopes() {
        let scopes = analyze_text("try { go(); } catch (err) { err; }");
        assert_eq!(
            kinds(&scopes),
            vec![ScopeKind::Global, ScopeKind::Module, ScopeKind::Block, ScopeKind::Catch, ScopeKind::Block]
        );
    }

    #[test]
    fn test_class_name_is_bound_outside_and_inside() {
        let scopes = analyze_text("class Counter extends Base { #n = start; static { Counter.ready = true; } }");
        let module = scopes.top_scope();
        assert_eq!(scopes.variable_names(module), vec!["Counter"]);
        assert_eq!(
            kinds(&scopes),
            vec![ScopeKind::Global, ScopeKind::Module, ScopeKind::Class, ScopeKind::ClassStaticBlock]
        );
        let class = scopes.scope(module).child_scopes[0];
        assert_eq!(scopes.variable_names(class), vec!["Counter"]);
        assert_eq!(scopes.through_names(module), vec!["Base", "start"]);
    }

    #[test]
    fn test_switch_cases_share_one_scope() {
        let scopes = analyze_text("switch (k) { case 1: let a = k; break; default: a; }");
        assert_eq!(kinds(&scopes), vec![ScopeKind::Global, ScopeKind::Module, ScopeKind::Switch]);
        let switch = scopes.scope(scopes.top_scope()).child_scopes[0];
        assert_eq!(scopes.variable_names(switch), vec!["a"]);
        assert_eq!(scopes.through_names(scopes.top_scope()), vec!["k", "k"]);
    }

    #[test]
    fn test_generator_and_template_references() {
        let scopes = analyze_text("function* gen(n) { yield `${n}:${limit}`; }");
        let module = scopes.top_scope();
        assert_eq!(scopes.variable_names(module), vec!["gen"]);
        assert_eq!(scopes.through_names(module), vec!["limit"]);
    }

    #[test]
    fn test_type_positions_are_not_references() {
        let options = HostOptions {
            typescript: true,
            ..HostOptions::default()
        };
        let scopes = analyze_with(
            "type Id = string;\nlet count: number = 0;\nconst id = input as Id;\nenum Mode { A }",
            &options,
        );
        let module = scopes.top_scope();
        assert_eq!(scopes.variable_names(module), vec!["count", "id", "Mode"]);
        assert_eq!(scopes.through_names(module), vec!["input"]);
    }
}
