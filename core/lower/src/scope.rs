//! Block-structured scope tracking.
//!
//! A stack of scopes maps identifier names to their declaration kind and
//! node. Lookup is innermost-first; shadowing is permitted and reported to
//! the caller. Scope tables are not part of the IR; every consumer rebuilds
//! them from the tree.

use etna_ir::id::NodeId;
use rustc_hash::FxHashMap;

/// Identifiers resolvable without a declaration (host globals and `this`).
pub const FREE_IDENTIFIERS: &[&str] = &[
    "console",
    "Math",
    "JSON",
    "globalThis",
    "this",
    "NaN",
    "Infinity",
];

/// True for identifiers that need no declaration.
#[must_use]
pub fn is_free_identifier(name: &str) -> bool {
    FREE_IDENTIFIERS.contains(&name)
}

/// How a name was introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
    Parameter,
    Function,
}

impl DeclarationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeclarationKind::Let => "let",
            DeclarationKind::Const => "const",
            DeclarationKind::Var => "var",
            DeclarationKind::Parameter => "parameter",
            DeclarationKind::Function => "function",
        }
    }
}

/// A resolved symbol. The node reference is absent for hoisted functions
/// that have not been lowered yet.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub kind: DeclarationKind,
    pub node_id: Option<NodeId>,
}

/// Outcome of a successful declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declared {
    /// The name hides a binding in an enclosing scope.
    pub shadows: bool,
}

/// The name is already bound in the current scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redeclaration;

#[derive(Debug, Default)]
struct Scope {
    symbols: FxHashMap<String, SymbolInfo>,
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Binds `name` in the innermost scope.
    ///
    /// Rebinding within one scope is an error unless both the existing and
    /// the new binding are `var`.
    ///
    /// # Errors
    ///
    /// Returns [`Redeclaration`] on a conflicting rebind.
    pub fn declare(
        &mut self,
        name: &str,
        kind: DeclarationKind,
        node_id: Option<NodeId>,
    ) -> Result<Declared, Redeclaration> {
        let shadows = self.scopes[..self.scopes.len().saturating_sub(1)]
            .iter()
            .any(|scope| scope.symbols.contains_key(name));
        let Some(current) = self.scopes.last_mut() else {
            return Err(Redeclaration);
        };
        if let Some(existing) = current.symbols.get(name) {
            let both_var = existing.kind == DeclarationKind::Var && kind == DeclarationKind::Var;
            if !both_var {
                return Err(Redeclaration);
            }
        }
        current
            .symbols
            .insert(name.to_string(), SymbolInfo { kind, node_id });
        Ok(Declared { shadows })
    }

    /// Lookup restricted to the innermost scope.
    #[must_use]
    pub fn lookup_current(&self, name: &str) -> Option<&SymbolInfo> {
        self.scopes.last().and_then(|scope| scope.symbols.get(name))
    }

    /// Innermost-first lookup.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&SymbolInfo> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
    }

    /// True when the name resolves to a declaration or a free identifier.
    #[must_use]
    pub fn resolves(&self, name: &str) -> bool {
        self.lookup(name).is_some() || is_free_identifier(name)
    }
}
