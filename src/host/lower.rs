//! Lowering of an oxc program into the shared arena.
//!
//! Node ranges follow ESTree conventions: parenthesized expressions keep the range of the
//! inner expression, statements include their terminating semicolon. Every identifier and
//! scope-owning oxc node is recorded by address so the scope walker, which runs over the
//! oxc tree, can name the arena node it is looking at.

use super::lexer::Atom;
use crate::coords::{CoordinateIndex, Range};
use crate::error::HostError;
use crate::node::{
    Ast, LiteralValue, MethodKind, NodeId, NodeKind, PropertyKind, SourceType, TokenKind, VariableKind,
};
use oxc_ast::ast as js;
use oxc_span::{GetSpan, Span};
use rustc_hash::FxHashMap;

type PResult<T> = Result<T, HostError>;

/// Identity of an oxc node for the lifetime of its allocator.
pub fn address<T>(node: &T) -> usize {
    node as *const T as usize
}

pub struct Lowered {
    pub program: NodeId,
    /// Arena node for every oxc identifier and scope owner, keyed by [`address`].
    pub nodes: FxHashMap<usize, NodeId>,
    /// Regex and template spans, sorted by start.
    pub atoms: Vec<Atom>,
}

pub fn lower(
    text: &str,
    program: &js::Program<'_>,
    source_type: SourceType,
    ast: &mut Ast,
    coords: &CoordinateIndex,
) -> PResult<Lowered> {
    let mut lowering = Lowering {
        text,
        ast,
        coords,
        nodes: FxHashMap::default(),
        atoms: Vec::new(),
    };
    let mut body = lowering.directives(&program.directives)?;
    for statement in &program.body {
        body.push(lowering.statement(statement)?);
    }
    let id = lowering.finish(NodeKind::Program { body, source_type }, Span::new(0, text.len() as u32));
    let Lowering { nodes, mut atoms, .. } = lowering;
    atoms.sort_by_key(|atom| atom.range.start);
    Ok(Lowered { program: id, nodes, atoms })
}

struct Lowering<'s> {
    text: &'s str,
    ast: &'s mut Ast,
    coords: &'s CoordinateIndex,
    nodes: FxHashMap<usize, NodeId>,
    atoms: Vec<Atom>,
}

fn range(span: Span) -> Range {
    Range::new(span.start as usize, span.end as usize)
}

fn unsupported(span: Span) -> HostError {
    HostError::new("Unsupported syntax", span.start as usize)
}

impl Lowering<'_> {
    fn finish(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let range = range(span);
        let id = self.ast.alloc(kind, range);
        self.ast.set_range(id, range, self.coords);
        id
    }

    fn record<T>(&mut self, node: &T, id: NodeId) -> NodeId {
        self.nodes.insert(address(node), id);
        id
    }

    fn raw(&self, span: Span) -> String {
        self.text[span.start as usize..span.end as usize].to_string()
    }

    fn name(&mut self, name: &str, span: Span) -> NodeId {
        self.finish(NodeKind::Identifier { name: name.to_string() }, span)
    }

    fn identifier_reference(&mut self, ident: &js::IdentifierReference<'_>) -> NodeId {
        let id = self.name(&ident.name, ident.span);
        self.record(ident, id)
    }

    fn binding_identifier(&mut self, ident: &js::BindingIdentifier<'_>) -> NodeId {
        let id = self.name(&ident.name, ident.span);
        self.record(ident, id)
    }

    fn literal(&mut self, value: LiteralValue, span: Span) -> NodeId {
        let raw = self.raw(span);
        self.finish(NodeKind::Literal { value, raw }, span)
    }

    fn string_literal(&mut self, literal: &js::StringLiteral<'_>) -> NodeId {
        self.literal(LiteralValue::String(literal.value.to_string()), literal.span)
    }

    fn directives(&mut self, directives: &[js::Directive<'_>]) -> PResult<Vec<NodeId>> {
        Ok(directives
            .iter()
            .map(|directive| {
                let expression = self.string_literal(&directive.expression);
                self.finish(NodeKind::ExpressionStatement { expression }, directive.span)
            })
            .collect())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn statements(&mut self, statements: &[js::Statement<'_>]) -> PResult<Vec<NodeId>> {
        statements.iter().map(|statement| self.statement(statement)).collect()
    }

    fn statement(&mut self, statement: &js::Statement<'_>) -> PResult<NodeId> {
        use js::Statement as S;
        let id = match statement {
            S::BlockStatement(block) => self.block(block)?,
            S::BreakStatement(stmt) => {
                let label = stmt.label.as_ref().map(|label| self.name(&label.name, label.span));
                self.finish(NodeKind::BreakStatement { label }, stmt.span)
            }
            S::ContinueStatement(stmt) => {
                let label = stmt.label.as_ref().map(|label| self.name(&label.name, label.span));
                self.finish(NodeKind::ContinueStatement { label }, stmt.span)
            }
            S::DebuggerStatement(stmt) => self.finish(NodeKind::DebuggerStatement, stmt.span),
            S::DoWhileStatement(stmt) => {
                let body = self.statement(&stmt.body)?;
                let test = self.expression(&stmt.test)?;
                self.finish(NodeKind::DoWhileStatement { body, test }, stmt.span)
            }
            S::EmptyStatement(stmt) => self.finish(NodeKind::EmptyStatement, stmt.span),
            S::ExpressionStatement(stmt) => {
                let expression = self.expression(&stmt.expression)?;
                self.finish(NodeKind::ExpressionStatement { expression }, stmt.span)
            }
            S::ForInStatement(stmt) => {
                let left = self.for_left(&stmt.left)?;
                let right = self.expression(&stmt.right)?;
                let body = self.statement(&stmt.body)?;
                let id = self.finish(NodeKind::ForInStatement { left, right, body }, stmt.span);
                self.record(&**stmt, id)
            }
            S::ForOfStatement(stmt) => {
                let left = self.for_left(&stmt.left)?;
                let right = self.expression(&stmt.right)?;
                let body = self.statement(&stmt.body)?;
                let id = self.finish(NodeKind::ForOfStatement { left, right, body }, stmt.span);
                self.record(&**stmt, id)
            }
            S::ForStatement(stmt) => {
                let init = match &stmt.init {
                    Some(js::ForStatementInit::VariableDeclaration(declaration)) => {
                        Some(self.variable_declaration(declaration)?)
                    }
                    Some(init) => match init.as_expression() {
                        Some(expression) => Some(self.expression(expression)?),
                        None => return Err(unsupported(init.span())),
                    },
                    None => None,
                };
                let test = self.opt_expression(stmt.test.as_ref())?;
                let update = self.opt_expression(stmt.update.as_ref())?;
                let body = self.statement(&stmt.body)?;
                let id = self.finish(NodeKind::ForStatement { init, test, update, body }, stmt.span);
                self.record(&**stmt, id)
            }
            S::IfStatement(stmt) => {
                let test = self.expression(&stmt.test)?;
                let consequent = self.statement(&stmt.consequent)?;
                let alternate = match &stmt.alternate {
                    Some(alternate) => Some(self.statement(alternate)?),
                    None => None,
                };
                self.finish(NodeKind::IfStatement { test, consequent, alternate }, stmt.span)
            }
            S::LabeledStatement(stmt) => {
                let label = self.name(&stmt.label.name, stmt.label.span);
                let body = self.statement(&stmt.body)?;
                self.finish(NodeKind::LabeledStatement { label, body }, stmt.span)
            }
            S::ReturnStatement(stmt) => {
                let argument = self.opt_expression(stmt.argument.as_ref())?;
                self.finish(NodeKind::ReturnStatement { argument }, stmt.span)
            }
            S::SwitchStatement(stmt) => {
                let discriminant = self.expression(&stmt.discriminant)?;
                let mut cases = Vec::with_capacity(stmt.cases.len());
                for case in &stmt.cases {
                    let test = self.opt_expression(case.test.as_ref())?;
                    let consequent = self.statements(&case.consequent)?;
                    cases.push(self.finish(NodeKind::SwitchCase { test, consequent }, case.span));
                }
                let id = self.finish(NodeKind::SwitchStatement { discriminant, cases }, stmt.span);
                self.record(&**stmt, id)
            }
            S::ThrowStatement(stmt) => {
                let argument = self.expression(&stmt.argument)?;
                self.finish(NodeKind::ThrowStatement { argument }, stmt.span)
            }
            S::TryStatement(stmt) => {
                let block = self.block(&stmt.block)?;
                let handler = match &stmt.handler {
                    Some(clause) => {
                        let param = match &clause.param {
                            Some(param) => Some(self.pattern(&param.pattern)?),
                            None => None,
                        };
                        let body = self.block(&clause.body)?;
                        let id = self.finish(NodeKind::CatchClause { param, body }, clause.span);
                        Some(self.record(&**clause, id))
                    }
                    None => None,
                };
                let finalizer = match &stmt.finalizer {
                    Some(finalizer) => Some(self.block(finalizer)?),
                    None => None,
                };
                self.finish(NodeKind::TryStatement { block, handler, finalizer }, stmt.span)
            }
            S::WhileStatement(stmt) => {
                let test = self.expression(&stmt.test)?;
                let body = self.statement(&stmt.body)?;
                self.finish(NodeKind::WhileStatement { test, body }, stmt.span)
            }
            S::WithStatement(stmt) => {
                let object = self.expression(&stmt.object)?;
                let body = self.statement(&stmt.body)?;
                self.finish(NodeKind::WithStatement { object, body }, stmt.span)
            }
            other => {
                if let Some(declaration) = other.as_declaration() {
                    self.declaration(declaration)?
                } else if let Some(declaration) = other.as_module_declaration() {
                    self.module_declaration(declaration)?
                } else {
                    return Err(unsupported(other.span()));
                }
            }
        };
        Ok(id)
    }

    fn block(&mut self, block: &js::BlockStatement<'_>) -> PResult<NodeId> {
        let body = self.statements(&block.body)?;
        let id = self.finish(NodeKind::BlockStatement { body }, block.span);
        Ok(self.record(block, id))
    }

    fn for_left(&mut self, left: &js::ForStatementLeft<'_>) -> PResult<NodeId> {
        match left {
            js::ForStatementLeft::VariableDeclaration(declaration) => self.variable_declaration(declaration),
            other => match other.as_assignment_target() {
                Some(target) => self.assignment_target(target),
                None => Err(unsupported(other.span())),
            },
        }
    }

    fn declaration(&mut self, declaration: &js::Declaration<'_>) -> PResult<NodeId> {
        use js::Declaration as D;
        match declaration {
            D::VariableDeclaration(declaration) => self.variable_declaration(declaration),
            D::FunctionDeclaration(function) => self.function(function, false),
            D::ClassDeclaration(class) => self.class(class, false),
            D::TSTypeAliasDeclaration(decl) => {
                let id = self.binding_identifier(&decl.id);
                Ok(self.ts_declaration("TSTypeAliasDeclaration", Some(id), decl.span))
            }
            D::TSInterfaceDeclaration(decl) => {
                let id = self.binding_identifier(&decl.id);
                Ok(self.ts_declaration("TSInterfaceDeclaration", Some(id), decl.span))
            }
            D::TSEnumDeclaration(decl) => {
                let id = self.binding_identifier(&decl.id);
                Ok(self.ts_declaration("TSEnumDeclaration", Some(id), decl.span))
            }
            D::TSModuleDeclaration(decl) => {
                let id = match &decl.id {
                    js::TSModuleDeclarationName::Identifier(ident) => self.binding_identifier(ident),
                    js::TSModuleDeclarationName::StringLiteral(literal) => self.string_literal(literal),
                };
                Ok(self.ts_declaration("TSModuleDeclaration", Some(id), decl.span))
            }
            D::TSGlobalDeclaration(decl) => Ok(self.ts_declaration("TSGlobalDeclaration", None, decl.span)),
            D::TSImportEqualsDeclaration(decl) => {
                let id = self.binding_identifier(&decl.id);
                Ok(self.ts_declaration("TSImportEqualsDeclaration", Some(id), decl.span))
            }
        }
    }

    fn ts_declaration(&mut self, type_name: &'static str, id: Option<NodeId>, span: Span) -> NodeId {
        self.finish(NodeKind::TsDeclaration { type_name, id }, span)
    }

    fn module_declaration(&mut self, declaration: &js::ModuleDeclaration<'_>) -> PResult<NodeId> {
        use js::ModuleDeclaration as M;
        match declaration {
            M::ImportDeclaration(decl) => {
                let mut specifiers = Vec::new();
                for specifier in decl.specifiers.iter().flatten() {
                    let id = match specifier {
                        js::ImportDeclarationSpecifier::ImportSpecifier(spec) => {
                            let imported = self.module_export_name(&spec.imported);
                            let local = self.binding_identifier(&spec.local);
                            self.finish(NodeKind::ImportSpecifier { imported, local }, spec.span)
                        }
                        js::ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                            let local = self.binding_identifier(&spec.local);
                            self.finish(NodeKind::ImportDefaultSpecifier { local }, spec.span)
                        }
                        js::ImportDeclarationSpecifier::ImportNamespaceSpecifier(spec) => {
                            let local = self.binding_identifier(&spec.local);
                            self.finish(NodeKind::ImportNamespaceSpecifier { local }, spec.span)
                        }
                    };
                    specifiers.push(id);
                }
                let source = self.string_literal(&decl.source);
                Ok(self.finish(NodeKind::ImportDeclaration { specifiers, source }, decl.span))
            }
            M::ExportAllDeclaration(decl) => {
                let exported = decl.exported.as_ref().map(|name| self.module_export_name(name));
                let source = self.string_literal(&decl.source);
                Ok(self.finish(NodeKind::ExportAllDeclaration { exported, source }, decl.span))
            }
            M::ExportDefaultDeclaration(decl) => {
                let declaration = match &decl.declaration {
                    js::ExportDefaultDeclarationKind::FunctionDeclaration(function) => self.function(function, false)?,
                    js::ExportDefaultDeclarationKind::ClassDeclaration(class) => self.class(class, false)?,
                    js::ExportDefaultDeclarationKind::TSInterfaceDeclaration(interface) => {
                        let id = self.binding_identifier(&interface.id);
                        self.ts_declaration("TSInterfaceDeclaration", Some(id), interface.span)
                    }
                    other => match other.as_expression() {
                        Some(expression) => self.expression(expression)?,
                        None => return Err(unsupported(other.span())),
                    },
                };
                Ok(self.finish(NodeKind::ExportDefaultDeclaration { declaration }, decl.span))
            }
            M::ExportNamedDeclaration(decl) => {
                let declaration = match &decl.declaration {
                    Some(declaration) => Some(self.declaration(declaration)?),
                    None => None,
                };
                let mut specifiers = Vec::with_capacity(decl.specifiers.len());
                for specifier in &decl.specifiers {
                    let local = self.module_export_name(&specifier.local);
                    let exported = self.module_export_name(&specifier.exported);
                    specifiers.push(self.finish(NodeKind::ExportSpecifier { local, exported }, specifier.span));
                }
                let source = decl.source.as_ref().map(|source| self.string_literal(source));
                Ok(self.finish(
                    NodeKind::ExportNamedDeclaration { declaration, specifiers, source },
                    decl.span,
                ))
            }
            M::TSExportAssignment(decl) => {
                let expression = self.expression(&decl.expression)?;
                Ok(self.finish(
                    NodeKind::TsExpression { type_name: "TSExportAssignment", expression },
                    decl.span,
                ))
            }
            M::TSNamespaceExportDeclaration(decl) => {
                let id = self.name(&decl.id.name, decl.id.span);
                Ok(self.ts_declaration("TSNamespaceExportDeclaration", Some(id), decl.span))
            }
        }
    }

    fn module_export_name(&mut self, name: &js::ModuleExportName<'_>) -> NodeId {
        match name {
            js::ModuleExportName::IdentifierName(ident) => {
                let id = self.name(&ident.name, ident.span);
                self.record(ident, id)
            }
            js::ModuleExportName::IdentifierReference(ident) => self.identifier_reference(ident),
            js::ModuleExportName::StringLiteral(literal) => self.string_literal(literal),
        }
    }

    fn variable_declaration(&mut self, declaration: &js::VariableDeclaration<'_>) -> PResult<NodeId> {
        let kind = match declaration.kind {
            js::VariableDeclarationKind::Var => VariableKind::Var,
            js::VariableDeclarationKind::Let => VariableKind::Let,
            js::VariableDeclarationKind::Const => VariableKind::Const,
            js::VariableDeclarationKind::Using => VariableKind::Using,
            js::VariableDeclarationKind::AwaitUsing => VariableKind::AwaitUsing,
        };
        let mut declarations = Vec::with_capacity(declaration.declarations.len());
        for declarator in &declaration.declarations {
            let id = self.pattern(&declarator.id)?;
            let init = self.opt_expression(declarator.init.as_ref())?;
            declarations.push(self.finish(NodeKind::VariableDeclarator { id, init }, declarator.span));
        }
        Ok(self.finish(NodeKind::VariableDeclaration { kind, declarations }, declaration.span))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FUNCTIONS & CLASSES
    // ═══════════════════════════════════════════════════════════════════════════

    fn function(&mut self, function: &js::Function<'_>, expression: bool) -> PResult<NodeId> {
        let id = function.id.as_ref().map(|ident| self.binding_identifier(ident));
        let Some(body) = &function.body else {
            // `declare function f(): void;` and overload signatures.
            return Ok(self.ts_declaration("TSDeclareFunction", id, function.span));
        };
        let params = self.params(&function.params)?;
        let body = self.function_body(body)?;
        let kind = if expression {
            NodeKind::FunctionExpression {
                id,
                params,
                body,
                is_async: function.r#async,
                generator: function.generator,
            }
        } else {
            NodeKind::FunctionDeclaration {
                id,
                params,
                body,
                is_async: function.r#async,
                generator: function.generator,
            }
        };
        let id = self.finish(kind, function.span);
        Ok(self.record(function, id))
    }

    fn function_body(&mut self, body: &js::FunctionBody<'_>) -> PResult<NodeId> {
        let mut statements = self.directives(&body.directives)?;
        statements.extend(self.statements(&body.statements)?);
        Ok(self.finish(NodeKind::BlockStatement { body: statements }, body.span))
    }

    fn arrow(&mut self, arrow: &js::ArrowFunctionExpression<'_>) -> PResult<NodeId> {
        let params = self.params(&arrow.params)?;
        let body = match arrow.body.statements.first() {
            Some(js::Statement::ExpressionStatement(statement)) if arrow.expression => {
                self.expression(&statement.expression)?
            }
            _ => self.function_body(&arrow.body)?,
        };
        let id = self.finish(
            NodeKind::ArrowFunctionExpression {
                params,
                body,
                expression: arrow.expression,
                is_async: arrow.r#async,
            },
            arrow.span,
        );
        Ok(self.record(arrow, id))
    }

    fn params(&mut self, params: &js::FormalParameters<'_>) -> PResult<Vec<NodeId>> {
        let mut out = Vec::with_capacity(params.items.len() + 1);
        for param in &params.items {
            let pattern = self.pattern(&param.pattern)?;
            let id = match &param.initializer {
                Some(init) => {
                    let right = self.expression(init)?;
                    self.finish(NodeKind::AssignmentPattern { left: pattern, right }, param.span)
                }
                None => pattern,
            };
            out.push(id);
        }
        if let Some(rest) = &params.rest {
            let argument = self.pattern(&rest.rest.argument)?;
            out.push(self.finish(NodeKind::RestElement { argument }, rest.rest.span));
        }
        Ok(out)
    }

    fn class(&mut self, class: &js::Class<'_>, expression: bool) -> PResult<NodeId> {
        let id = class.id.as_ref().map(|ident| self.binding_identifier(ident));
        let super_class = self.opt_expression(class.super_class.as_ref())?;
        let mut elements = Vec::with_capacity(class.body.body.len());
        for element in &class.body.body {
            let id = match element {
                js::ClassElement::StaticBlock(block) => {
                    let body = self.statements(&block.body)?;
                    let id = self.finish(NodeKind::StaticBlock { body }, block.span);
                    self.record(&**block, id)
                }
                js::ClassElement::MethodDefinition(method) => {
                    let key = self.property_key(&method.key)?;
                    let value = self.function(&method.value, true)?;
                    let kind = match method.kind {
                        js::MethodDefinitionKind::Constructor => MethodKind::Constructor,
                        js::MethodDefinitionKind::Method => MethodKind::Method,
                        js::MethodDefinitionKind::Get => MethodKind::Get,
                        js::MethodDefinitionKind::Set => MethodKind::Set,
                    };
                    self.finish(
                        NodeKind::MethodDefinition {
                            key,
                            value,
                            kind,
                            computed: method.computed,
                            is_static: method.r#static,
                        },
                        method.span,
                    )
                }
                js::ClassElement::PropertyDefinition(property) => {
                    let key = self.property_key(&property.key)?;
                    let value = self.opt_expression(property.value.as_ref())?;
                    self.finish(
                        NodeKind::PropertyDefinition {
                            key,
                            value,
                            computed: property.computed,
                            is_static: property.r#static,
                        },
                        property.span,
                    )
                }
                js::ClassElement::AccessorProperty(property) => {
                    let key = self.property_key(&property.key)?;
                    let value = self.opt_expression(property.value.as_ref())?;
                    self.finish(
                        NodeKind::PropertyDefinition {
                            key,
                            value,
                            computed: property.computed,
                            is_static: property.r#static,
                        },
                        property.span,
                    )
                }
                js::ClassElement::TSIndexSignature(_) => continue,
            };
            elements.push(id);
        }
        let body = self.finish(NodeKind::ClassBody { body: elements }, class.body.span);
        let kind = if expression {
            NodeKind::ClassExpression { id, super_class, body }
        } else {
            NodeKind::ClassDeclaration { id, super_class, body }
        };
        let id = self.finish(kind, class.span);
        Ok(self.record(class, id))
    }

    fn property_key(&mut self, key: &js::PropertyKey<'_>) -> PResult<NodeId> {
        match key {
            js::PropertyKey::StaticIdentifier(ident) => Ok(self.name(&ident.name, ident.span)),
            js::PropertyKey::PrivateIdentifier(ident) => Ok(self.private_identifier(ident)),
            other => match other.as_expression() {
                Some(expression) => self.expression(expression),
                None => Err(unsupported(other.span())),
            },
        }
    }

    fn private_identifier(&mut self, ident: &js::PrivateIdentifier<'_>) -> NodeId {
        self.finish(NodeKind::PrivateIdentifier { name: ident.name.to_string() }, ident.span)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PATTERNS
    // ═══════════════════════════════════════════════════════════════════════════

    fn pattern(&mut self, pattern: &js::BindingPattern<'_>) -> PResult<NodeId> {
        match pattern {
            js::BindingPattern::BindingIdentifier(ident) => Ok(self.binding_identifier(ident)),
            js::BindingPattern::ObjectPattern(object) => {
                let mut properties = Vec::with_capacity(object.properties.len() + 1);
                for property in &object.properties {
                    let key = self.property_key(&property.key)?;
                    let value = self.pattern(&property.value)?;
                    properties.push(self.finish(
                        NodeKind::Property {
                            key,
                            value,
                            kind: PropertyKind::Init,
                            computed: property.computed,
                            shorthand: property.shorthand,
                            method: false,
                        },
                        property.span,
                    ));
                }
                if let Some(rest) = &object.rest {
                    let argument = self.pattern(&rest.argument)?;
                    properties.push(self.finish(NodeKind::RestElement { argument }, rest.span));
                }
                Ok(self.finish(NodeKind::ObjectPattern { properties }, object.span))
            }
            js::BindingPattern::ArrayPattern(array) => {
                let mut elements = Vec::with_capacity(array.elements.len() + 1);
                for element in &array.elements {
                    elements.push(match element {
                        Some(element) => Some(self.pattern(element)?),
                        None => None,
                    });
                }
                if let Some(rest) = &array.rest {
                    let argument = self.pattern(&rest.argument)?;
                    elements.push(Some(self.finish(NodeKind::RestElement { argument }, rest.span)));
                }
                Ok(self.finish(NodeKind::ArrayPattern { elements }, array.span))
            }
            js::BindingPattern::AssignmentPattern(assignment) => {
                let left = self.pattern(&assignment.left)?;
                let right = self.expression(&assignment.right)?;
                Ok(self.finish(NodeKind::AssignmentPattern { left, right }, assignment.span))
            }
        }
    }

    fn assignment_target(&mut self, target: &js::AssignmentTarget<'_>) -> PResult<NodeId> {
        match target {
            js::AssignmentTarget::ArrayAssignmentTarget(array) => {
                let mut elements = Vec::with_capacity(array.elements.len() + 1);
                for element in &array.elements {
                    elements.push(match element {
                        Some(element) => Some(self.maybe_default(element)?),
                        None => None,
                    });
                }
                if let Some(rest) = &array.rest {
                    let argument = self.assignment_target(&rest.target)?;
                    elements.push(Some(self.finish(NodeKind::RestElement { argument }, rest.span)));
                }
                Ok(self.finish(NodeKind::ArrayPattern { elements }, array.span))
            }
            js::AssignmentTarget::ObjectAssignmentTarget(object) => {
                let mut properties = Vec::with_capacity(object.properties.len() + 1);
                for property in &object.properties {
                    let id = match property {
                        js::AssignmentTargetProperty::AssignmentTargetPropertyIdentifier(prop) => {
                            let key = self.name(&prop.binding.name, prop.binding.span);
                            let binding = self.identifier_reference(&prop.binding);
                            let value = match &prop.init {
                                Some(init) => {
                                    let right = self.expression(init)?;
                                    self.finish(NodeKind::AssignmentPattern { left: binding, right }, prop.span)
                                }
                                None => binding,
                            };
                            self.finish(
                                NodeKind::Property {
                                    key,
                                    value,
                                    kind: PropertyKind::Init,
                                    computed: false,
                                    shorthand: true,
                                    method: false,
                                },
                                prop.span,
                            )
                        }
                        js::AssignmentTargetProperty::AssignmentTargetPropertyProperty(prop) => {
                            let key = self.property_key(&prop.name)?;
                            let value = self.maybe_default(&prop.binding)?;
                            self.finish(
                                NodeKind::Property {
                                    key,
                                    value,
                                    kind: PropertyKind::Init,
                                    computed: prop.computed,
                                    shorthand: false,
                                    method: false,
                                },
                                prop.span,
                            )
                        }
                    };
                    properties.push(id);
                }
                if let Some(rest) = &object.rest {
                    let argument = self.assignment_target(&rest.target)?;
                    properties.push(self.finish(NodeKind::RestElement { argument }, rest.span));
                }
                Ok(self.finish(NodeKind::ObjectPattern { properties }, object.span))
            }
            other => match other.as_simple_assignment_target() {
                Some(simple) => self.simple_target(simple),
                None => Err(unsupported(other.span())),
            },
        }
    }

    fn maybe_default(&mut self, target: &js::AssignmentTargetMaybeDefault<'_>) -> PResult<NodeId> {
        match target {
            js::AssignmentTargetMaybeDefault::AssignmentTargetWithDefault(with_default) => {
                let left = self.assignment_target(&with_default.binding)?;
                let right = self.expression(&with_default.init)?;
                Ok(self.finish(NodeKind::AssignmentPattern { left, right }, with_default.span))
            }
            other => match other.as_assignment_target() {
                Some(target) => self.assignment_target(target),
                None => Err(unsupported(other.span())),
            },
        }
    }

    fn simple_target(&mut self, target: &js::SimpleAssignmentTarget<'_>) -> PResult<NodeId> {
        use js::SimpleAssignmentTarget as T;
        match target {
            T::AssignmentTargetIdentifier(ident) => Ok(self.identifier_reference(ident)),
            T::TSAsExpression(e) => self.ts_expression("TSAsExpression", &e.expression, e.span),
            T::TSSatisfiesExpression(e) => self.ts_expression("TSSatisfiesExpression", &e.expression, e.span),
            T::TSNonNullExpression(e) => self.ts_expression("TSNonNullExpression", &e.expression, e.span),
            T::TSTypeAssertion(e) => self.ts_expression("TSTypeAssertion", &e.expression, e.span),
            other => match other.as_member_expression() {
                Some(member) => self.member(member),
                None => Err(unsupported(other.span())),
            },
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn opt_expression(&mut self, expression: Option<&js::Expression<'_>>) -> PResult<Option<NodeId>> {
        expression.map(|expression| self.expression(expression)).transpose()
    }

    fn arguments(&mut self, arguments: &[js::Argument<'_>]) -> PResult<Vec<NodeId>> {
        let mut out = Vec::with_capacity(arguments.len());
        for argument in arguments {
            out.push(match argument {
                js::Argument::SpreadElement(spread) => self.spread(spread)?,
                other => match other.as_expression() {
                    Some(expression) => self.expression(expression)?,
                    None => return Err(unsupported(other.span())),
                },
            });
        }
        Ok(out)
    }

    fn spread(&mut self, spread: &js::SpreadElement<'_>) -> PResult<NodeId> {
        let argument = self.expression(&spread.argument)?;
        Ok(self.finish(NodeKind::SpreadElement { argument }, spread.span))
    }

    fn ts_expression(&mut self, type_name: &'static str, inner: &js::Expression<'_>, span: Span) -> PResult<NodeId> {
        let expression = self.expression(inner)?;
        Ok(self.finish(NodeKind::TsExpression { type_name, expression }, span))
    }

    fn expression(&mut self, expression: &js::Expression<'_>) -> PResult<NodeId> {
        use js::Expression as E;
        let id = match expression {
            E::BooleanLiteral(lit) => self.literal(LiteralValue::Boolean(lit.value), lit.span),
            E::NullLiteral(lit) => self.literal(LiteralValue::Null, lit.span),
            E::NumericLiteral(lit) => self.literal(LiteralValue::Number(lit.value), lit.span),
            E::BigIntLiteral(lit) => {
                let raw = self.raw(lit.span);
                let digits = raw.trim_end_matches('n').replace('_', "");
                self.literal(LiteralValue::BigInt(digits), lit.span)
            }
            E::RegExpLiteral(lit) => {
                let raw = self.raw(lit.span);
                let slash = raw.rfind('/').unwrap_or(0);
                let value = LiteralValue::RegExp {
                    pattern: raw.get(1..slash).unwrap_or_default().to_string(),
                    flags: raw[slash + 1..].to_string(),
                };
                self.atoms.push(Atom { range: range(lit.span), kind: TokenKind::RegularExpression });
                self.literal(value, lit.span)
            }
            E::StringLiteral(lit) => self.string_literal(lit),
            E::TemplateLiteral(template) => self.template(template)?,
            E::Identifier(ident) => self.identifier_reference(ident),
            E::MetaProperty(meta) => {
                let property = self.name(&meta.property.name, meta.property.span);
                let meta_name = self.name(&meta.meta.name, meta.meta.span);
                self.finish(NodeKind::MetaProperty { meta: meta_name, property }, meta.span)
            }
            E::Super(node) => self.finish(NodeKind::Super, node.span),
            E::ArrayExpression(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    elements.push(match element {
                        js::ArrayExpressionElement::SpreadElement(spread) => Some(self.spread(spread)?),
                        js::ArrayExpressionElement::Elision(_) => None,
                        other => match other.as_expression() {
                            Some(expression) => Some(self.expression(expression)?),
                            None => return Err(unsupported(other.span())),
                        },
                    });
                }
                self.finish(NodeKind::ArrayExpression { elements }, array.span)
            }
            E::ArrowFunctionExpression(arrow) => self.arrow(arrow)?,
            E::AssignmentExpression(assign) => {
                let left = self.assignment_target(&assign.left)?;
                let right = self.expression(&assign.right)?;
                let operator = assign.operator.as_str().to_string();
                self.finish(NodeKind::AssignmentExpression { operator, left, right }, assign.span)
            }
            E::AwaitExpression(node) => {
                let argument = self.expression(&node.argument)?;
                self.finish(NodeKind::AwaitExpression { argument }, node.span)
            }
            E::BinaryExpression(binary) => {
                let left = self.expression(&binary.left)?;
                let right = self.expression(&binary.right)?;
                let operator = binary.operator.as_str().to_string();
                self.finish(NodeKind::BinaryExpression { operator, left, right }, binary.span)
            }
            E::PrivateInExpression(node) => {
                let left = self.private_identifier(&node.left);
                let right = self.expression(&node.right)?;
                self.finish(
                    NodeKind::BinaryExpression { operator: "in".to_string(), left, right },
                    node.span,
                )
            }
            E::CallExpression(call) => self.call(call)?,
            E::ChainExpression(chain) => {
                let expression = match &chain.expression {
                    js::ChainElement::CallExpression(call) => self.call(call)?,
                    js::ChainElement::TSNonNullExpression(e) => {
                        self.ts_expression("TSNonNullExpression", &e.expression, e.span)?
                    }
                    other => match other.as_member_expression() {
                        Some(member) => self.member(member)?,
                        None => return Err(unsupported(other.span())),
                    },
                };
                self.finish(NodeKind::ChainExpression { expression }, chain.span)
            }
            E::ClassExpression(class) => self.class(class, true)?,
            E::ConditionalExpression(node) => {
                let test = self.expression(&node.test)?;
                let consequent = self.expression(&node.consequent)?;
                let alternate = self.expression(&node.alternate)?;
                self.finish(NodeKind::ConditionalExpression { test, consequent, alternate }, node.span)
            }
            E::FunctionExpression(function) => self.function(function, true)?,
            E::ImportExpression(node) => {
                let source = self.expression(&node.source)?;
                let options = self.opt_expression(node.options.as_ref())?;
                self.finish(NodeKind::ImportExpression { source, options }, node.span)
            }
            E::LogicalExpression(logical) => {
                let left = self.expression(&logical.left)?;
                let right = self.expression(&logical.right)?;
                let operator = logical.operator.as_str().to_string();
                self.finish(NodeKind::LogicalExpression { operator, left, right }, logical.span)
            }
            E::NewExpression(node) => {
                let callee = self.expression(&node.callee)?;
                let arguments = self.arguments(&node.arguments)?;
                self.finish(NodeKind::NewExpression { callee, arguments }, node.span)
            }
            E::ObjectExpression(object) => {
                let mut properties = Vec::with_capacity(object.properties.len());
                for property in &object.properties {
                    properties.push(match property {
                        js::ObjectPropertyKind::ObjectProperty(prop) => {
                            let key = self.property_key(&prop.key)?;
                            let value = self.expression(&prop.value)?;
                            let kind = match prop.kind {
                                js::PropertyKind::Init => PropertyKind::Init,
                                js::PropertyKind::Get => PropertyKind::Get,
                                js::PropertyKind::Set => PropertyKind::Set,
                            };
                            self.finish(
                                NodeKind::Property {
                                    key,
                                    value,
                                    kind,
                                    computed: prop.computed,
                                    shorthand: prop.shorthand,
                                    method: prop.method,
                                },
                                prop.span,
                            )
                        }
                        js::ObjectPropertyKind::SpreadProperty(spread) => self.spread(spread)?,
                    });
                }
                self.finish(NodeKind::ObjectExpression { properties }, object.span)
            }
            E::ParenthesizedExpression(paren) => self.expression(&paren.expression)?,
            E::SequenceExpression(sequence) => {
                let mut expressions = Vec::with_capacity(sequence.expressions.len());
                for expression in &sequence.expressions {
                    expressions.push(self.expression(expression)?);
                }
                self.finish(NodeKind::SequenceExpression { expressions }, sequence.span)
            }
            E::TaggedTemplateExpression(tagged) => {
                let tag = self.expression(&tagged.tag)?;
                let quasi = self.template(&tagged.quasi)?;
                self.finish(NodeKind::TaggedTemplateExpression { tag, quasi }, tagged.span)
            }
            E::ThisExpression(node) => self.finish(NodeKind::ThisExpression, node.span),
            E::UnaryExpression(unary) => {
                let argument = self.expression(&unary.argument)?;
                let operator = unary.operator.as_str().to_string();
                self.finish(NodeKind::UnaryExpression { operator, argument }, unary.span)
            }
            E::UpdateExpression(update) => {
                let argument = self.simple_target(&update.argument)?;
                let operator = update.operator.as_str().to_string();
                self.finish(
                    NodeKind::UpdateExpression { operator, prefix: update.prefix, argument },
                    update.span,
                )
            }
            E::YieldExpression(node) => {
                let argument = self.opt_expression(node.argument.as_ref())?;
                self.finish(NodeKind::YieldExpression { argument, delegate: node.delegate }, node.span)
            }
            E::TSAsExpression(e) => self.ts_expression("TSAsExpression", &e.expression, e.span)?,
            E::TSSatisfiesExpression(e) => self.ts_expression("TSSatisfiesExpression", &e.expression, e.span)?,
            E::TSTypeAssertion(e) => self.ts_expression("TSTypeAssertion", &e.expression, e.span)?,
            E::TSNonNullExpression(e) => self.ts_expression("TSNonNullExpression", &e.expression, e.span)?,
            E::TSInstantiationExpression(e) => {
                self.ts_expression("TSInstantiationExpression", &e.expression, e.span)?
            }
            other => match other.as_member_expression() {
                Some(member) => self.member(member)?,
                None => return Err(unsupported(other.span())),
            },
        };
        Ok(id)
    }

    fn call(&mut self, call: &js::CallExpression<'_>) -> PResult<NodeId> {
        let callee = self.expression(&call.callee)?;
        let arguments = self.arguments(&call.arguments)?;
        Ok(self.finish(
            NodeKind::CallExpression { callee, arguments, optional: call.optional },
            call.span,
        ))
    }

    fn member(&mut self, member: &js::MemberExpression<'_>) -> PResult<NodeId> {
        let (object, property, computed, optional, span) = match member {
            js::MemberExpression::ComputedMemberExpression(m) => {
                let object = self.expression(&m.object)?;
                let property = self.expression(&m.expression)?;
                (object, property, true, m.optional, m.span)
            }
            js::MemberExpression::StaticMemberExpression(m) => {
                let object = self.expression(&m.object)?;
                let property = self.name(&m.property.name, m.property.span);
                (object, property, false, m.optional, m.span)
            }
            js::MemberExpression::PrivateFieldExpression(m) => {
                let object = self.expression(&m.object)?;
                let property = self.private_identifier(&m.field);
                (object, property, false, m.optional, m.span)
            }
        };
        Ok(self.finish(
            NodeKind::MemberExpression { object, property, computed, optional },
            span,
        ))
    }

    /// Lowers quasis and expressions, and records one template token per quasi: the
    /// quasi's raw text plus its delimiters (`` ` `` or `}` before, `${` or `` ` `` after).
    fn template(&mut self, template: &js::TemplateLiteral<'_>) -> PResult<NodeId> {
        let mut quasis = Vec::with_capacity(template.quasis.len());
        for quasi in &template.quasis {
            let token = Range::new(
                quasi.span.start as usize - 1,
                quasi.span.end as usize + if quasi.tail { 1 } else { 2 },
            );
            self.atoms.push(Atom { range: token, kind: TokenKind::Template });
            quasis.push(self.finish(
                NodeKind::TemplateElement {
                    raw: quasi.value.raw.to_string(),
                    cooked: quasi.value.cooked.as_ref().map(|cooked| cooked.to_string()),
                    tail: quasi.tail,
                },
                quasi.span,
            ));
        }
        let mut expressions = Vec::with_capacity(template.expressions.len());
        for expression in &template.expressions {
            expressions.push(self.expression(expression)?);
        }
        Ok(self.finish(NodeKind::TemplateLiteral { quasis, expressions }, template.span))
    }
}
