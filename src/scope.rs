//! # Scope Graph
//!
//! Arena-backed lexical scope graph in the shape produced by eslint-scope style analyzers,
//! plus the closed set of mutation primitives used to reconcile it with the markup dialect.
//!
//! ## Key Invariants
//!
//! 1. Every live reference is either `resolved` to exactly one variable reachable from its
//!    `from` scope, or listed in the `through` of every scope from `from` up to the global
//!    scope.
//! 2. A resolved reference is listed in the `through` of the scopes strictly between its
//!    `from` scope and the scope owning its variable, and nowhere else.
//! 3. Links are only mutated through the methods of this module.

use crate::node::{Ast, NodeId, NodeKind};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Module,
    Function,
    Block,
    Catch,
    For,
    Switch,
    Class,
    ClassStaticBlock,
}

impl ScopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Global => "global",
            ScopeKind::Module => "module",
            ScopeKind::Function => "function",
            ScopeKind::Block => "block",
            ScopeKind::Catch => "catch",
            ScopeKind::For => "for",
            ScopeKind::Switch => "switch",
            ScopeKind::Class => "class",
            ScopeKind::ClassStaticBlock => "class-static-block",
        }
    }

    fn is_variable_scope(self) -> bool {
        matches!(
            self,
            ScopeKind::Global | ScopeKind::Module | ScopeKind::Function | ScopeKind::ClassStaticBlock
        )
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub block: NodeId,
    pub upper: Option<ScopeId>,
    pub child_scopes: Vec<ScopeId>,
    /// Nearest enclosing function/module/global scope (itself for those kinds).
    pub variable_scope: ScopeId,
    pub variables: Vec<VariableId>,
    pub set: FxHashMap<String, VariableId>,
    pub references: Vec<ReferenceId>,
    pub through: Vec<ReferenceId>,
    pub removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Variable,
    Parameter,
    FunctionName,
    ClassName,
    ImportBinding,
    CatchClause,
    ImplicitGlobal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub kind: DefinitionKind,
    pub name: NodeId,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub scope: ScopeId,
    /// Defining occurrences.
    pub identifiers: Vec<NodeId>,
    pub defs: Vec<Definition>,
    pub references: Vec<ReferenceId>,
    pub removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFlag {
    Read,
    Write,
    ReadWrite,
}

impl ReferenceFlag {
    pub fn from_access(read: bool, write: bool) -> Self {
        match (read, write) {
            (true, true) => ReferenceFlag::ReadWrite,
            (false, true) => ReferenceFlag::Write,
            _ => ReferenceFlag::Read,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub identifier: NodeId,
    pub name: String,
    pub from: ScopeId,
    pub resolved: Option<VariableId>,
    pub flag: ReferenceFlag,
    /// Write that initializes a declaration (`let x = 1`).
    pub init: bool,
    /// Synthesized rather than backed by a literal identifier occurrence.
    pub is_virtual: bool,
    pub removed: bool,
}

impl Reference {
    pub fn is_read(&self) -> bool {
        matches!(self.flag, ReferenceFlag::Read | ReferenceFlag::ReadWrite)
    }

    pub fn is_write(&self) -> bool {
        matches!(self.flag, ReferenceFlag::Write | ReferenceFlag::ReadWrite)
    }

    pub fn is_read_only(&self) -> bool {
        self.flag == ReferenceFlag::Read
    }

    pub fn is_write_only(&self) -> bool {
        self.flag == ReferenceFlag::Write
    }

    pub fn is_read_write(&self) -> bool {
        self.flag == ReferenceFlag::ReadWrite
    }
}

/// Fixed predicate answers for a synthesized reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAccess {
    pub read: bool,
    pub write: bool,
}

impl VirtualAccess {
    pub const READ: VirtualAccess = VirtualAccess { read: true, write: false };
    pub const WRITE: VirtualAccess = VirtualAccess { read: false, write: true };
}

#[derive(Debug, Clone, Default)]
pub struct ScopeManager {
    scopes: Vec<Scope>,
    variables: Vec<Variable>,
    references: Vec<Reference>,
    node_to_scope: FxHashMap<NodeId, Vec<ScopeId>>,
    /// References by identifier node, in creation order.
    by_identifier: FxHashMap<NodeId, Vec<ReferenceId>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTRUCTION & QUERIES
// ═══════════════════════════════════════════════════════════════════════════════

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scope(&mut self, kind: ScopeKind, block: NodeId, upper: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        let variable_scope = match upper {
            Some(upper) if !kind.is_variable_scope() => self.scopes[upper.0 as usize].variable_scope,
            _ => id,
        };
        self.scopes.push(Scope {
            kind,
            block,
            upper,
            child_scopes: Vec::new(),
            variable_scope,
            variables: Vec::new(),
            set: FxHashMap::default(),
            references: Vec::new(),
            through: Vec::new(),
            removed: false,
        });
        if let Some(upper) = upper {
            self.scope_mut(upper).child_scopes.push(id);
        }
        self.node_to_scope.entry(block).or_default().push(id);
        id
    }

    /// Adds a defining occurrence of `name`, creating the variable on first sight.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        identifier: NodeId,
        kind: DefinitionKind,
    ) -> VariableId {
        let existing = self.scope(scope).set.get(name).copied();
        let id = match existing {
            Some(id) => id,
            None => self.create_variable(scope, name),
        };
        let variable = self.variable_mut(id);
        if !variable.identifiers.contains(&identifier) {
            variable.identifiers.push(identifier);
            variable.defs.push(Definition { kind, name: identifier });
        }
        id
    }

    fn create_variable(&mut self, scope: ScopeId, name: &str) -> VariableId {
        let id = VariableId(self.variables.len() as u32);
        self.variables.push(Variable {
            name: name.to_string(),
            scope,
            identifiers: Vec::new(),
            defs: Vec::new(),
            references: Vec::new(),
            removed: false,
        });
        let scope = self.scope_mut(scope);
        scope.variables.push(id);
        scope.set.insert(name.to_string(), id);
        id
    }

    /// Registers an unresolved reference; call [`ScopeManager::resolve`] once all
    /// declarations are known.
    pub fn add_reference(
        &mut self,
        scope: ScopeId,
        identifier: NodeId,
        name: &str,
        flag: ReferenceFlag,
        init: bool,
    ) -> ReferenceId {
        let id = ReferenceId(self.references.len() as u32);
        self.references.push(Reference {
            identifier,
            name: name.to_string(),
            from: scope,
            resolved: None,
            flag,
            init,
            is_virtual: false,
            removed: false,
        });
        self.by_identifier.entry(identifier).or_default().push(id);
        self.scope_mut(scope).references.push(id);
        id
    }

    /// Resolves `reference` by walking up from its scope, recording it in `through` of
    /// every scope it passes.
    pub fn resolve(&mut self, reference: ReferenceId) -> bool {
        let name = self.reference(reference).name.clone();
        let mut current = Some(self.reference(reference).from);
        while let Some(scope) = current {
            if let Some(&variable) = self.scope(scope).set.get(&name) {
                self.link(reference, variable);
                return true;
            }
            self.add_through(scope, reference);
            current = self.scope(scope).upper;
        }
        false
    }

    fn link(&mut self, reference: ReferenceId, variable: VariableId) {
        self.reference_mut(reference).resolved = Some(variable);
        let refs = &mut self.variable_mut(variable).references;
        if !refs.contains(&reference) {
            refs.push(reference);
        }
    }

    fn add_through(&mut self, scope: ScopeId, reference: ReferenceId) {
        let through = &mut self.scope_mut(scope).through;
        if !through.contains(&reference) {
            through.push(reference);
        }
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.0 as usize]
    }

    fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.variables[id.0 as usize]
    }

    pub fn reference(&self, id: ReferenceId) -> &Reference {
        &self.references[id.0 as usize]
    }

    fn reference_mut(&mut self, id: ReferenceId) -> &mut Reference {
        &mut self.references[id.0 as usize]
    }

    /// Live scopes in creation order.
    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.removed)
            .map(|(i, s)| (ScopeId(i as u32), s))
    }

    /// Live references in creation order.
    pub fn references(&self) -> impl Iterator<Item = (ReferenceId, &Reference)> {
        self.references
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.removed)
            .map(|(i, r)| (ReferenceId(i as u32), r))
    }

    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn module_scope(&self) -> Option<ScopeId> {
        self.scopes
            .first()?
            .child_scopes
            .iter()
            .copied()
            .find(|&s| self.scope(s).kind == ScopeKind::Module)
    }

    /// The scope script top-level declarations live in.
    pub fn top_scope(&self) -> ScopeId {
        self.module_scope().unwrap_or_else(|| self.global_scope())
    }

    /// Outermost scope registered for `node`.
    pub fn acquire(&self, node: NodeId) -> Option<ScopeId> {
        self.node_to_scope.get(&node)?.first().copied()
    }

    /// Innermost scope enclosing `node`, found through its ancestors.
    pub fn innermost_scope(&self, ast: &Ast, node: NodeId) -> ScopeId {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(scopes) = self.node_to_scope.get(&id) {
                if let Some(&scope) = scopes.last() {
                    return scope;
                }
            }
            current = ast.parent(id);
        }
        self.top_scope()
    }

    /// Moves `scope` onto a new owning node.
    pub fn register_node(&mut self, node: NodeId, scope: ScopeId) {
        let old = self.scope(scope).block;
        if let Some(list) = self.node_to_scope.get_mut(&old) {
            list.retain(|&s| s != scope);
            if list.is_empty() {
                self.node_to_scope.remove(&old);
            }
        }
        self.scope_mut(scope).block = node;
        self.node_to_scope.entry(node).or_default().push(scope);
    }

    pub fn find_variable(&self, scope: ScopeId, name: &str) -> Option<VariableId> {
        self.ancestors(scope)
            .into_iter()
            .find_map(|s| self.scope(s).set.get(name).copied())
    }

    /// `scope` followed by each of its uppers.
    pub fn ancestors(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut out = vec![scope];
        let mut current = self.scope(scope).upper;
        while let Some(s) = current {
            out.push(s);
            current = self.scope(s).upper;
        }
        out
    }

    pub fn reference_for_identifier(&self, identifier: NodeId) -> Option<ReferenceId> {
        self.references_to(identifier).next().map(|(id, _)| id)
    }

    /// Live references whose identifier is `identifier`, in creation order.
    pub fn references_to(&self, identifier: NodeId) -> impl Iterator<Item = (ReferenceId, &Reference)> {
        self.by_identifier
            .get(&identifier)
            .into_iter()
            .flatten()
            .map(move |&id| (id, self.reference(id)))
            .filter(|(_, r)| !r.removed)
    }

    pub fn through_names(&self, scope: ScopeId) -> Vec<&str> {
        self.scope(scope)
            .through
            .iter()
            .map(|&r| self.reference(r).name.as_str())
            .collect()
    }

    pub fn variable_names(&self, scope: ScopeId) -> Vec<&str> {
        self.scope(scope)
            .variables
            .iter()
            .map(|&v| self.variable(v).name.as_str())
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECONCILER PRIMITIVES
// ═══════════════════════════════════════════════════════════════════════════════

impl ScopeManager {
    /// Removes one defining occurrence for every binding identifier in `pattern`.
    /// Variables losing their last occurrence are deleted and their references demoted.
    pub fn remove_variable(&mut self, ast: &Ast, pattern: NodeId, scope: ScopeId) {
        match ast.kind(pattern) {
            NodeKind::Identifier { name } => {
                if let Some(&variable) = self.scope(scope).set.get(name.as_str()) {
                    self.remove_occurrence(variable, pattern);
                }
            }
            NodeKind::ObjectPattern { properties } => {
                for &property in properties {
                    match ast.kind(property) {
                        NodeKind::Property { value, .. } => self.remove_variable(ast, *value, scope),
                        NodeKind::RestElement { argument } => {
                            self.remove_variable(ast, *argument, scope)
                        }
                        _ => {}
                    }
                }
            }
            NodeKind::ArrayPattern { elements } => {
                for element in elements.iter().flatten() {
                    self.remove_variable(ast, *element, scope);
                }
            }
            NodeKind::AssignmentPattern { left, .. } => self.remove_variable(ast, *left, scope),
            NodeKind::RestElement { argument } => self.remove_variable(ast, *argument, scope),
            _ => {}
        }
    }

    fn remove_occurrence(&mut self, variable: VariableId, identifier: NodeId) {
        let own_refs: Vec<ReferenceId> = self
            .variable(variable)
            .references
            .iter()
            .copied()
            .filter(|&r| self.reference(r).identifier == identifier)
            .collect();
        for reference in own_refs {
            self.unlink_reference(reference);
        }
        let var = self.variable_mut(variable);
        var.identifiers.retain(|&id| id != identifier);
        var.defs.retain(|d| d.name != identifier);
        if var.identifiers.is_empty() {
            self.delete_variable(variable);
        }
    }

    fn delete_variable(&mut self, variable: VariableId) {
        let (scope, name, refs) = {
            let var = self.variable_mut(variable);
            var.removed = true;
            (var.scope, var.name.clone(), std::mem::take(&mut var.references))
        };
        let owner = self.scope_mut(scope);
        owner.variables.retain(|&v| v != variable);
        if owner.set.get(&name) == Some(&variable) {
            owner.set.remove(&name);
        }
        for reference in refs {
            if self.reference(reference).removed {
                continue;
            }
            self.reference_mut(reference).resolved = None;
            for s in self.ancestors(scope) {
                self.add_through(s, reference);
            }
        }
    }

    /// Unlinks a reference from its variable and every `references`/`through` list.
    fn unlink_reference(&mut self, reference: ReferenceId) {
        let (from, resolved) = {
            let r = self.reference_mut(reference);
            r.removed = true;
            (r.from, r.resolved.take())
        };
        if let Some(variable) = resolved {
            self.variable_mut(variable).references.retain(|&r| r != reference);
        }
        self.scope_mut(from).references.retain(|&r| r != reference);
        for s in self.ancestors(from) {
            self.scope_mut(s).through.retain(|&r| r != reference);
        }
    }

    /// Removes the reference whose identifier is `identifier`, looked up in `scope` first.
    /// When `identifier` is also a defining occurrence of the resolved variable, that
    /// occurrence goes too.
    pub fn remove_reference(&mut self, identifier: NodeId, scope: ScopeId) -> bool {
        let found = self
            .scope(scope)
            .references
            .iter()
            .copied()
            .find(|&r| self.reference(r).identifier == identifier)
            .or_else(|| self.reference_for_identifier(identifier));
        let Some(reference) = found else {
            return false;
        };
        let resolved = self.reference(reference).resolved;
        self.unlink_reference(reference);
        if let Some(variable) = resolved {
            if self.variable(variable).identifiers.contains(&identifier) {
                self.remove_occurrence(variable, identifier);
            }
        }
        true
    }

    /// Removes `scope`, its descendants, and everything declared or referenced inside.
    pub fn remove_scope(&mut self, scope: ScopeId) {
        let children = self.scope(scope).child_scopes.clone();
        for child in children {
            self.remove_scope(child);
        }
        for reference in self.scope(scope).references.clone() {
            self.unlink_reference(reference);
        }
        for variable in self.scope(scope).variables.clone() {
            self.delete_variable(variable);
        }
        self.detach_scope(scope);
    }

    fn detach_scope(&mut self, scope: ScopeId) {
        if let Some(upper) = self.scope(scope).upper {
            self.scope_mut(upper).child_scopes.retain(|&s| s != scope);
        }
        let block = self.scope(scope).block;
        if let Some(list) = self.node_to_scope.get_mut(&block) {
            list.retain(|&s| s != scope);
            if list.is_empty() {
                self.node_to_scope.remove(&block);
            }
        }
        self.scope_mut(scope).removed = true;
    }

    /// Removes `scope`, putting `new_children` in its place under its upper. Variables and
    /// references owned by `scope` move to the upper.
    pub fn replace_scope(&mut self, scope: ScopeId, new_children: &[ScopeId]) {
        let Some(upper) = self.scope(scope).upper else {
            return;
        };
        let replacement = self.scope(upper).variable_scope;
        let siblings = &mut self.scope_mut(upper).child_scopes;
        let position = siblings.iter().position(|&s| s == scope).unwrap_or(siblings.len());
        siblings.retain(|&s| s != scope);
        let position = position.min(siblings.len());
        siblings.splice(position..position, new_children.iter().copied());
        for &child in new_children {
            self.scope_mut(child).upper = Some(upper);
            self.replace_variable_scope(child, scope, replacement);
        }
        self.scope_mut(scope).child_scopes.retain(|c| !new_children.contains(c));

        for reference in std::mem::take(&mut self.scope_mut(scope).references) {
            self.reference_mut(reference).from = upper;
            self.scope_mut(upper).references.push(reference);
        }
        self.scope_mut(scope).through.clear();
        for variable in std::mem::take(&mut self.scope_mut(scope).variables) {
            self.adopt_variable(variable, upper);
        }
        self.scope_mut(scope).set.clear();
        self.scope_mut(scope).upper = None;
        let block = self.scope(scope).block;
        if let Some(list) = self.node_to_scope.get_mut(&block) {
            list.retain(|&s| s != scope);
            if list.is_empty() {
                self.node_to_scope.remove(&block);
            }
        }
        self.scope_mut(scope).removed = true;
    }

    /// Re-points `variable_scope` from `removed` to `replacement`, descending only while
    /// descendants still point at `removed`.
    fn replace_variable_scope(&mut self, scope: ScopeId, removed: ScopeId, replacement: ScopeId) {
        if self.scope(scope).variable_scope != removed {
            return;
        }
        self.scope_mut(scope).variable_scope = replacement;
        for child in self.scope(scope).child_scopes.clone() {
            self.replace_variable_scope(child, removed, replacement);
        }
    }

    /// Moves `variable` into `scope`, folding it into a same-named variable if present.
    fn adopt_variable(&mut self, variable: VariableId, scope: ScopeId) {
        let name = self.variable(variable).name.clone();
        match self.scope(scope).set.get(&name).copied() {
            Some(existing) if existing != variable => {
                let moved = {
                    let var = self.variable_mut(variable);
                    var.removed = true;
                    (
                        std::mem::take(&mut var.identifiers),
                        std::mem::take(&mut var.defs),
                        std::mem::take(&mut var.references),
                    )
                };
                for &reference in &moved.2 {
                    self.reference_mut(reference).resolved = Some(existing);
                }
                let target = self.variable_mut(existing);
                target.identifiers.extend(moved.0);
                target.defs.extend(moved.1);
                target.references.extend(moved.2);
            }
            _ => {
                self.variable_mut(variable).scope = scope;
                let target = self.scope_mut(scope);
                if !target.variables.contains(&variable) {
                    target.variables.push(variable);
                }
                target.set.insert(name, variable);
            }
        }
    }

    /// Weaves `source` into `destination`: children, variables and references move over,
    /// and unresolved `through` references of `source` are resolved against
    /// `destination` and its uppers.
    pub fn merge_scope(&mut self, source: ScopeId, destination: ScopeId) {
        let replacement = self.scope(destination).variable_scope;
        for child in std::mem::take(&mut self.scope_mut(source).child_scopes) {
            self.scope_mut(child).upper = Some(destination);
            self.scope_mut(destination).child_scopes.push(child);
            self.replace_variable_scope(child, source, replacement);
        }
        for variable in std::mem::take(&mut self.scope_mut(source).variables) {
            self.adopt_variable(variable, destination);
        }
        self.scope_mut(source).set.clear();
        for reference in std::mem::take(&mut self.scope_mut(source).references) {
            self.reference_mut(reference).from = destination;
            self.scope_mut(destination).references.push(reference);
        }
        // The old uppers stop seeing anything that flowed out of `source`.
        let old_uppers: Vec<ScopeId> = self.ancestors(source).into_iter().skip(1).collect();
        let path = self.ancestors(destination);
        for reference in std::mem::take(&mut self.scope_mut(source).through) {
            for &above in &old_uppers {
                self.scope_mut(above).through.retain(|&r| r != reference);
            }
            if self.reference(reference).removed {
                continue;
            }
            if let Some(variable) = self.reference(reference).resolved {
                let owner = self.variable(variable).scope;
                if let Some(depth) = path.iter().position(|&s| s == owner) {
                    for &scope in &path[..depth] {
                        self.add_through(scope, reference);
                    }
                    continue;
                }
                // Bound in a scope `destination` cannot see.
                self.variable_mut(variable).references.retain(|&r| r != reference);
                self.reference_mut(reference).resolved = None;
            }
            let name = self.reference(reference).name.clone();
            for &scope in &path {
                if let Some(&variable) = self.scope(scope).set.get(&name) {
                    self.link(reference, variable);
                    break;
                }
                self.add_through(scope, reference);
            }
        }
        self.detach_scope(source);
    }

    /// Builds a reference not backed by a literal occurrence, resolved to `variable` with
    /// fixed read/write answers.
    pub fn synthesize_reference(
        &mut self,
        identifier: NodeId,
        variable: VariableId,
        scope: ScopeId,
        access: VirtualAccess,
    ) -> ReferenceId {
        let id = ReferenceId(self.references.len() as u32);
        let name = self.variable(variable).name.clone();
        self.references.push(Reference {
            identifier,
            name,
            from: scope,
            resolved: Some(variable),
            flag: ReferenceFlag::from_access(access.read, access.write),
            init: false,
            is_virtual: true,
            removed: false,
        });
        self.by_identifier.entry(identifier).or_default().push(id);
        self.scope_mut(scope).references.push(id);
        self.variable_mut(variable).references.push(id);
        let owner = self.variable(variable).scope;
        for s in self.ancestors(scope) {
            if s == owner {
                break;
            }
            self.add_through(s, id);
        }
        id
    }

    /// Links every unresolved `through` reference named `name` at `scope` to `variable`
    /// and strips it from `through` of `scope` and its uppers.
    fn resolve_through(&mut self, scope: ScopeId, name: &str, variable: VariableId) {
        let pending: Vec<ReferenceId> = self
            .scope(scope)
            .through
            .iter()
            .copied()
            .filter(|&r| {
                let reference = self.reference(r);
                reference.name == name && reference.resolved.is_none()
            })
            .collect();
        for reference in pending {
            self.link(reference, variable);
            for s in self.ancestors(scope) {
                self.scope_mut(s).through.retain(|&r| r != reference);
            }
        }
    }

    /// Reinterprets the free target `identifier` of a label-guarded assignment as a
    /// declaration in `scope`. Returns `None` when the name is already declared there.
    pub fn declare_reactive(
        &mut self,
        ast: &Ast,
        scope: ScopeId,
        identifier: NodeId,
    ) -> Option<VariableId> {
        let name = ast.identifier_name(identifier)?.to_string();
        if self.scope(scope).set.contains_key(&name) {
            return None;
        }
        let variable = self.declare(scope, &name, identifier, DefinitionKind::Variable);
        self.resolve_through(scope, &name, variable);
        Some(variable)
    }

    /// Declares a variable with no defining occurrence and resolves matching `through`
    /// references of `scope` to it.
    pub fn declare_implicit(&mut self, scope: ScopeId, name: &str) -> VariableId {
        let existing = self.scope(scope).set.get(name).copied();
        let variable = match existing {
            Some(v) => v,
            None => self.create_variable(scope, name),
        };
        self.resolve_through(scope, name, variable);
        variable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Range;
    use crate::node::PropertyKind;
    use pretty_assertions::assert_eq;

    struct Fixture {
        ast: Ast,
        scopes: ScopeManager,
        global: ScopeId,
        module: ScopeId,
    }

    fn ident(ast: &mut Ast, name: &str) -> NodeId {
        let start = ast.len() * 10;
        ast.alloc(
            NodeKind::Identifier { name: name.to_string() },
            Range::new(start, start + name.len()),
        )
    }

    fn fixture() -> Fixture {
        let mut ast = Ast::new();
        let program = ast.alloc(
            NodeKind::Program { body: vec![], source_type: Default::default() },
            Range::new(0, 0),
        );
        let mut scopes = ScopeManager::new();
        let global = scopes.add_scope(ScopeKind::Global, program, None);
        let module = scopes.add_scope(ScopeKind::Module, program, Some(global));
        Fixture { ast, scopes, global, module }
    }

    #[test]
    fn test_resolution_populates_through() {
        let mut f = fixture();
        let block = ident(&mut f.ast, "block");
        let inner = f.scopes.add_scope(ScopeKind::Block, block, Some(f.module));
        let decl = ident(&mut f.ast, "x");
        f.scopes.declare(f.module, "x", decl, DefinitionKind::Variable);
        let use_x = ident(&mut f.ast, "x");
        let use_y = ident(&mut f.ast, "y");
        let rx = f.scopes.add_reference(inner, use_x, "x", ReferenceFlag::Read, false);
        let ry = f.scopes.add_reference(inner, use_y, "y", ReferenceFlag::Read, false);
        assert!(f.scopes.resolve(rx));
        assert!(!f.scopes.resolve(ry));
        assert_eq!(f.scopes.through_names(inner), vec!["x", "y"]);
        assert_eq!(f.scopes.through_names(f.module), vec!["y"]);
        assert_eq!(f.scopes.through_names(f.global), vec!["y"]);
    }

    #[test]
    fn test_remove_variable_demotes_references() {
        let mut f = fixture();
        let a = ident(&mut f.ast, "a");
        let b = ident(&mut f.ast, "b");
        let prop_a = f.ast.alloc(
            NodeKind::Property {
                key: a,
                value: a,
                kind: PropertyKind::Init,
                computed: false,
                shorthand: true,
                method: false,
            },
            Range::new(0, 1),
        );
        let rest = f.ast.alloc(NodeKind::RestElement { argument: b }, Range::new(0, 1));
        let pattern = f
            .ast
            .alloc(NodeKind::ObjectPattern { properties: vec![prop_a, rest] }, Range::new(0, 9));
        f.scopes.declare(f.module, "a", a, DefinitionKind::Variable);
        f.scopes.declare(f.module, "b", b, DefinitionKind::Variable);
        let use_a = ident(&mut f.ast, "a");
        let r = f.scopes.add_reference(f.module, use_a, "a", ReferenceFlag::Read, false);
        f.scopes.resolve(r);

        f.scopes.remove_variable(&f.ast, pattern, f.module);
        assert!(f.scopes.variable_names(f.module).is_empty());
        assert_eq!(f.scopes.reference(r).resolved, None);
        assert_eq!(f.scopes.through_names(f.module), vec!["a"]);
        assert_eq!(f.scopes.through_names(f.global), vec!["a"]);
    }

    #[test]
    fn test_remove_reference_strips_through_path() {
        let mut f = fixture();
        let block = ident(&mut f.ast, "block");
        let inner = f.scopes.add_scope(ScopeKind::Block, block, Some(f.module));
        let array = ident(&mut f.ast, "Array");
        let r = f.scopes.add_reference(inner, array, "Array", ReferenceFlag::Read, false);
        f.scopes.resolve(r);
        assert!(f.scopes.remove_reference(array, inner));
        assert!(f.scopes.through_names(inner).is_empty());
        assert!(f.scopes.through_names(f.global).is_empty());
        assert!(f.scopes.scope(inner).references.is_empty());
        assert!(!f.scopes.remove_reference(array, inner), "already removed");
    }

    #[test]
    fn test_replace_scope_reparents_and_fixes_variable_scope() {
        let mut f = fixture();
        let func_node = ident(&mut f.ast, "fn");
        let func = f.scopes.add_scope(ScopeKind::Function, func_node, Some(f.module));
        let block_node = ident(&mut f.ast, "block");
        let block = f.scopes.add_scope(ScopeKind::Block, block_node, Some(func));
        let nested_node = ident(&mut f.ast, "nested");
        let nested = f.scopes.add_scope(ScopeKind::Block, nested_node, Some(block));
        assert_eq!(f.scopes.scope(nested).variable_scope, func);

        let children = f.scopes.scope(func).child_scopes.clone();
        f.scopes.replace_scope(func, &children);
        assert_eq!(f.scopes.scope(block).upper, Some(f.module));
        assert_eq!(f.scopes.scope(block).variable_scope, f.module);
        assert_eq!(f.scopes.scope(nested).variable_scope, f.module);
        assert_eq!(f.scopes.scope(f.module).child_scopes, vec![block]);
        assert_eq!(f.scopes.scopes().count(), 4);
    }

    #[test]
    fn test_remove_scope_drops_its_references() {
        let mut f = fixture();
        let decl = ident(&mut f.ast, "count");
        let count = f.scopes.declare(f.module, "count", decl, DefinitionKind::Variable);
        let block_node = ident(&mut f.ast, "block");
        let block = f.scopes.add_scope(ScopeKind::Block, block_node, Some(f.module));
        let local = ident(&mut f.ast, "local");
        f.scopes.declare(block, "local", local, DefinitionKind::Variable);
        let use_count = ident(&mut f.ast, "count");
        let use_missing = ident(&mut f.ast, "missing");
        let rc = f.scopes.add_reference(block, use_count, "count", ReferenceFlag::Read, false);
        let rm = f.scopes.add_reference(block, use_missing, "missing", ReferenceFlag::Read, false);
        f.scopes.resolve(rc);
        f.scopes.resolve(rm);
        assert_eq!(f.scopes.variable(count).references, vec![rc]);
        assert_eq!(f.scopes.through_names(f.module), vec!["missing"]);

        f.scopes.remove_scope(block);
        assert!(f.scopes.variable(count).references.is_empty());
        assert!(f.scopes.through_names(f.module).is_empty());
        assert!(f.scopes.through_names(f.global).is_empty());
        assert!(f.scopes.scope(f.module).child_scopes.is_empty());
        assert_eq!(f.scopes.scopes().count(), 2);
        assert_eq!(f.scopes.references().count(), 0);
    }

    #[test]
    fn test_merge_scope_resolves_through_against_destination() {
        let mut f = fixture();
        let decl = ident(&mut f.ast, "count");
        f.scopes.declare(f.module, "count", decl, DefinitionKind::Variable);

        // An independently analyzed scope hanging off the global scope.
        let other_node = ident(&mut f.ast, "other");
        let other = f.scopes.add_scope(ScopeKind::Function, other_node, Some(f.global));
        let use_count = ident(&mut f.ast, "count");
        let use_missing = ident(&mut f.ast, "missing");
        let rc = f.scopes.add_reference(other, use_count, "count", ReferenceFlag::Read, false);
        let rm = f.scopes.add_reference(other, use_missing, "missing", ReferenceFlag::Read, false);
        f.scopes.resolve(rc);
        f.scopes.resolve(rm);
        assert_eq!(f.scopes.through_names(f.global), vec!["count", "missing"]);

        f.scopes.merge_scope(other, f.module);
        let count = f.scopes.find_variable(f.module, "count").unwrap();
        assert_eq!(f.scopes.reference(rc).resolved, Some(count));
        assert_eq!(f.scopes.through_names(f.module), vec!["missing"]);
        assert_eq!(f.scopes.through_names(f.global), vec!["missing"]);
        assert_eq!(f.scopes.reference(rc).from, f.module);
        assert!(f.scopes.scope(other).removed);
    }

    #[test]
    fn test_merge_scope_across_sibling_branches_clears_old_path() {
        let mut f = fixture();
        let function_node = ident(&mut f.ast, "f");
        let function = f.scopes.add_scope(ScopeKind::Function, function_node, Some(f.module));
        let local = ident(&mut f.ast, "y");
        f.scopes.declare(function, "y", local, DefinitionKind::Variable);
        let source_node = ident(&mut f.ast, "source");
        let source = f.scopes.add_scope(ScopeKind::Block, source_node, Some(function));

        let destination_node = ident(&mut f.ast, "destination");
        let destination = f.scopes.add_scope(ScopeKind::Block, destination_node, Some(f.module));
        let decl = ident(&mut f.ast, "x");
        let x = f.scopes.declare(destination, "x", decl, DefinitionKind::Variable);

        let use_x = ident(&mut f.ast, "x");
        let use_y = ident(&mut f.ast, "y");
        let rx = f.scopes.add_reference(source, use_x, "x", ReferenceFlag::Read, false);
        let ry = f.scopes.add_reference(source, use_y, "y", ReferenceFlag::Read, false);
        f.scopes.resolve(rx);
        f.scopes.resolve(ry);
        assert_eq!(f.scopes.through_names(function), vec!["x"]);
        assert_eq!(f.scopes.through_names(f.module), vec!["x"]);

        f.scopes.merge_scope(source, destination);
        assert_eq!(f.scopes.reference(rx).resolved, Some(x));
        assert!(f.scopes.through_names(function).is_empty());
        // `y` lives in the other branch and is free from the destination.
        assert_eq!(f.scopes.reference(ry).resolved, None);
        let y = f.scopes.scope(function).set["y"];
        assert!(f.scopes.variable(y).references.is_empty());
        assert_eq!(f.scopes.through_names(destination), vec!["y"]);
        assert_eq!(f.scopes.through_names(f.module), vec!["y"]);
        assert_eq!(f.scopes.through_names(f.global), vec!["y"]);
    }

    #[test]
    fn test_references_by_identifier() {
        let mut f = fixture();
        let decl = ident(&mut f.ast, "value");
        let value = f.scopes.declare(f.module, "value", decl, DefinitionKind::Variable);
        let site = ident(&mut f.ast, "value");
        let real = f.scopes.add_reference(f.module, site, "value", ReferenceFlag::Read, false);
        f.scopes.resolve(real);
        let virtual_write = f.scopes.synthesize_reference(site, value, f.module, VirtualAccess::WRITE);

        let found: Vec<ReferenceId> = f.scopes.references_to(site).map(|(id, _)| id).collect();
        assert_eq!(found, vec![real, virtual_write]);
        assert_eq!(f.scopes.reference_for_identifier(site), Some(real));

        assert!(f.scopes.remove_reference(site, f.module));
        assert_eq!(f.scopes.reference_for_identifier(site), Some(virtual_write));
        assert_eq!(f.scopes.references_to(decl).count(), 0);
    }

    #[test]
    fn test_virtual_reference_has_fixed_answers() {
        let mut f = fixture();
        let decl = ident(&mut f.ast, "title");
        let title = f.scopes.declare(f.module, "title", decl, DefinitionKind::Variable);
        let r = f.scopes.synthesize_reference(decl, title, f.module, VirtualAccess::WRITE);
        let reference = f.scopes.reference(r);
        assert!(reference.is_virtual);
        assert!(reference.is_write_only());
        assert!(!reference.is_read());
        assert_eq!(f.scopes.variable(title).references, vec![r]);
    }

    #[test]
    fn test_declare_reactive_resolves_free_target() {
        let mut f = fixture();
        let target = ident(&mut f.ast, "doubled");
        let w = f.scopes.add_reference(f.module, target, "doubled", ReferenceFlag::Write, false);
        f.scopes.resolve(w);
        assert_eq!(f.scopes.through_names(f.module), vec!["doubled"]);

        let variable = f.scopes.declare_reactive(&f.ast, f.module, target).unwrap();
        assert_eq!(f.scopes.reference(w).resolved, Some(variable));
        assert!(f.scopes.through_names(f.module).is_empty());
        assert!(f.scopes.through_names(f.global).is_empty());
        assert_eq!(f.scopes.declare_reactive(&f.ast, f.module, target), None);
    }
}
