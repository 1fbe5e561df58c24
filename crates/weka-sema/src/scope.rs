//! Scopes and the ordered symbol table.
//!
//! A scope maps names to declaration-ordered lists of definitions.
//! Function scopes allow several definitions under one name (overload
//! sets); local scopes treat a second declaration as a redefinition.
//! A delegating scope shares its members with a target scope while
//! presenting a different parent, which lets analysis re-point the
//! lexical chain without inserting bindings anywhere.

use indexmap::IndexMap;

use weka_types::{DefnId, ExprId, ScopeId};

/// What flavor of scope this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// Ordered, overload-allowing scope: module level, composite member
    /// scopes, parameter lists of overload sets.
    Iterable,
    /// Block-local scope; redeclaration is an error.
    Local,
    /// Same members as `target`, different parent. Holds no symbols of
    /// its own.
    Delegating { target: ScopeId },
}

/// One scope in the module's scope arena.
#[derive(Debug, Clone)]
pub struct ScopeData {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// The definition this scope belongs to (the composite for member
    /// scopes, the function for body scopes).
    pub owner: Option<DefnId>,
    /// Base expression needed to access members found here (the receiver
    /// for instance-member scopes).
    pub base_expr: Option<ExprId>,
    /// Debug name.
    pub name: Option<String>,
    symbols: IndexMap<String, Vec<DefnId>>,
}

impl ScopeData {
    pub fn iterable(parent: Option<ScopeId>) -> Self {
        Self {
            kind: ScopeKind::Iterable,
            parent,
            owner: None,
            base_expr: None,
            name: None,
            symbols: IndexMap::new(),
        }
    }

    pub fn local(parent: ScopeId) -> Self {
        Self {
            kind: ScopeKind::Local,
            parent: Some(parent),
            owner: None,
            base_expr: None,
            name: None,
            symbols: IndexMap::new(),
        }
    }

    /// A delegating scope over `target` whose parent is `parent`.
    ///
    /// The parent passed in is the parent used; the target's own parent
    /// is deliberately not consulted.
    pub fn delegating(target: ScopeId, parent: ScopeId) -> Self {
        Self {
            kind: ScopeKind::Delegating { target },
            parent: Some(parent),
            owner: None,
            base_expr: None,
            name: None,
            symbols: IndexMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn owned_by(mut self, owner: DefnId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn allow_overloads(&self) -> bool {
        matches!(self.kind, ScopeKind::Iterable)
    }

    /// Entries under `name`, in declaration order.
    pub fn entries(&self, name: &str) -> &[DefnId] {
        self.symbols.get(name).map_or(&[], Vec::as_slice)
    }

    /// Whether any entry exists under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Insert a definition under `name`.
    ///
    /// Returns `false` when the scope forbids overloading and the name
    /// is already taken; the caller reports the redefinition.
    pub fn insert(&mut self, name: &str, defn: DefnId) -> bool {
        debug_assert!(
            !matches!(self.kind, ScopeKind::Delegating { .. }),
            "symbols are inserted through the delegation target"
        );
        if let Some(existing) = self.symbols.get_mut(name) {
            if self.kind != ScopeKind::Iterable {
                return false;
            }
            existing.push(defn);
        } else {
            self.symbols.insert(name.to_string(), vec![defn]);
        }
        true
    }

    /// All members in declaration order.
    pub fn iter_members(&self) -> impl Iterator<Item = DefnId> + '_ {
        self.symbols.values().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
