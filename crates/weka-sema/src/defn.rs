//! Named definitions and their analysis state.
//!
//! A [`Defn`] is anything a name can refer to: variables, parameters,
//! functions, types, modules, namespaces. Definitions are created by the
//! loader/parser and progressively advanced through analysis phases by
//! the task driver; after a definition reaches the highest phase the
//! compilation needs, it is never mutated again.

use std::sync::atomic::{AtomicU32, Ordering};

use weka_ast::Span;
use weka_types::{
    CompositeKind, DefnId, ExprId, FunctionType, PatternVarId, PatternVarRef, ScopeId, Type,
};

/// Allocate a fresh pattern-variable id.
///
/// Ids come from a global counter so that no two templates ever share a
/// pattern variable, even across modules analyzed against shared state.
pub fn fresh_pattern_var_id() -> PatternVarId {
    static NEXT: AtomicU32 = AtomicU32::new(0);
    PatternVarId(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Where the storage for a definition lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Global,
    Static,
    Instance,
    Local,
    Closure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

// ---------------------------------------------------------------------------
// Definition traits
// ---------------------------------------------------------------------------

/// Bitset of definition traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefnTraits(u16);

impl DefnTraits {
    pub const CTOR: DefnTraits = DefnTraits(1 << 0);
    pub const FINAL: DefnTraits = DefnTraits(1 << 1);
    pub const ABSTRACT: DefnTraits = DefnTraits(1 << 2);
    pub const SYNTHETIC: DefnTraits = DefnTraits(1 << 3);
    pub const TEMPLATE: DefnTraits = DefnTraits(1 << 4);
    pub const TEMPLATE_MEMBER: DefnTraits = DefnTraits(1 << 5);

    pub fn empty() -> Self {
        DefnTraits(0)
    }

    pub fn contains(self, other: DefnTraits) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: DefnTraits) {
        self.0 |= other.0;
    }

    #[must_use]
    pub fn with(mut self, other: DefnTraits) -> Self {
        self.insert(other);
        self
    }
}

// ---------------------------------------------------------------------------
// Analysis tasks and phase mask
// ---------------------------------------------------------------------------

/// One analysis phase a definition can be advanced to.
///
/// Tasks form a chain: advancing to a later task implies all earlier
/// ones. Transitions are monotonic and idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    /// Member scopes exist and supertypes are resolved far enough for
    /// name lookup.
    MemberLookup,
    /// Types referenced from the signature are resolved; equality and
    /// subtype queries are meaningful.
    TypeComparison,
    /// Constructor members are known.
    Construction,
    /// Coercers are known; conversion ranking is meaningful.
    Conversion,
    /// Everything reachable is singular; the definition may be handed to
    /// code generation.
    CodeGeneration,
}

impl Task {
    pub const ALL: [Task; 5] = [
        Task::MemberLookup,
        Task::TypeComparison,
        Task::Construction,
        Task::Conversion,
        Task::CodeGeneration,
    ];

    fn bit(self) -> u8 {
        match self {
            Task::MemberLookup => 1 << 0,
            Task::TypeComparison => 1 << 1,
            Task::Construction => 1 << 2,
            Task::Conversion => 1 << 3,
            Task::CodeGeneration => 1 << 4,
        }
    }

    /// Bits for this task and every earlier one.
    fn bits_through(self) -> u8 {
        let mut bits = 0;
        for t in Task::ALL {
            bits |= t.bit();
            if t == self {
                break;
            }
        }
        bits
    }
}

/// Monotonic bitmask of completed analysis phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseMask(u8);

impl PhaseMask {
    pub fn new() -> Self {
        PhaseMask(0)
    }

    pub fn is_set(self, task: Task) -> bool {
        self.0 & task.bit() != 0
    }

    /// Mark `task` and every earlier phase complete.
    pub fn advance_through(&mut self, task: Task) {
        self.0 |= task.bits_through();
    }
}

// ---------------------------------------------------------------------------
// Kind-specific payloads
// ---------------------------------------------------------------------------

/// Payload for `Var`, `Let`, and `Parameter` definitions.
#[derive(Debug, Clone)]
pub struct VariableInfo {
    pub ty: Type,
    pub init: Option<ExprId>,
}

/// How calls to a function are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Direct call: globals, statics, final methods, constructors.
    Direct,
    /// Dispatch through the receiver's vtable.
    Virtual,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub ty: FunctionType,
    pub dispatch: Dispatch,
    /// Entry block of the lowered body, when one exists.
    pub entry: Option<weka_types::BlockId>,
}

/// Template parameters of a generic definition.
#[derive(Debug, Clone, Default)]
pub struct TemplateInfo {
    pub params: Vec<PatternVarRef>,
}

impl TemplateInfo {
    pub fn new(names: &[&str]) -> Self {
        Self {
            params: names
                .iter()
                .map(|name| PatternVarRef {
                    name: (*name).to_string(),
                    id: fresh_pattern_var_id(),
                })
                .collect(),
        }
    }
}

/// Shape of a composite (class/struct/interface/protocol) definition.
#[derive(Debug, Clone)]
pub struct CompositeInfo {
    pub kind: CompositeKind,
    /// Direct supertypes: at most one base class, any number of
    /// interfaces/protocols, in declaration order.
    pub supers: Vec<Type>,
    pub members: ScopeId,
    pub instance_fields: Vec<DefnId>,
    /// Static single-argument conversion methods into this type.
    pub coercers: Vec<DefnId>,
}

/// Payload for type definitions.
#[derive(Debug, Clone)]
pub struct TypeDefnInfo {
    /// The defined type as a reference (for composites, the generic form
    /// whose arguments are the template's own pattern variables).
    pub ty: Type,
    pub composite: Option<CompositeInfo>,
}

#[derive(Debug, Clone)]
pub enum DefnKind {
    Var(VariableInfo),
    Let(VariableInfo),
    Parameter(VariableInfo),
    Function(FunctionInfo),
    Type(TypeDefnInfo),
    Module(ScopeId),
    Namespace(ScopeId),
}

// ---------------------------------------------------------------------------
// Defn
// ---------------------------------------------------------------------------

/// A named definition.
#[derive(Debug, Clone)]
pub struct Defn {
    pub name: String,
    pub qualified_name: String,
    /// Scope this definition was declared in. `None` until inserted.
    pub defining_scope: Option<ScopeId>,
    pub storage: StorageClass,
    pub visibility: Visibility,
    pub traits: DefnTraits,
    pub span: Span,
    pub phases: PhaseMask,
    /// Reentry guard for the task driver; a same-phase cycle is treated
    /// as satisfied while this is set.
    pub in_progress: bool,
    /// Set on the first analysis failure; all derived work then yields
    /// error sentinels without further diagnostics.
    pub ill_formed: bool,
    pub template: Option<TemplateInfo>,
    pub kind: DefnKind,
}

impl Defn {
    pub fn new(name: impl Into<String>, storage: StorageClass, kind: DefnKind) -> Self {
        let name = name.into();
        Self {
            qualified_name: name.clone(),
            name,
            defining_scope: None,
            storage,
            visibility: Visibility::Public,
            traits: DefnTraits::empty(),
            span: Span::synthetic(),
            phases: PhaseMask::new(),
            in_progress: false,
            ill_formed: false,
            template: None,
            kind,
        }
    }

    pub fn function(name: impl Into<String>, storage: StorageClass, ty: FunctionType) -> Self {
        let dispatch = if storage == StorageClass::Instance {
            Dispatch::Virtual
        } else {
            Dispatch::Direct
        };
        Self::new(
            name,
            storage,
            DefnKind::Function(FunctionInfo {
                ty,
                dispatch,
                entry: None,
            }),
        )
    }

    pub fn local_var(name: impl Into<String>, ty: Type) -> Self {
        Self::new(
            name,
            StorageClass::Local,
            DefnKind::Var(VariableInfo { ty, init: None }),
        )
    }

    pub fn local_let(name: impl Into<String>, ty: Type, init: Option<ExprId>) -> Self {
        Self::new(name, StorageClass::Local, DefnKind::Let(VariableInfo { ty, init }))
    }

    pub fn is_ctor(&self) -> bool {
        self.traits.contains(DefnTraits::CTOR)
    }

    pub fn is_template(&self) -> bool {
        self.traits.contains(DefnTraits::TEMPLATE)
    }

    pub fn function_info(&self) -> Option<&FunctionInfo> {
        match &self.kind {
            DefnKind::Function(info) => Some(info),
            _ => None,
        }
    }

    pub fn type_info(&self) -> Option<&TypeDefnInfo> {
        match &self.kind {
            DefnKind::Type(info) => Some(info),
            _ => None,
        }
    }

    pub fn composite_info(&self) -> Option<&CompositeInfo> {
        self.type_info().and_then(|info| info.composite.as_ref())
    }

    /// The type of the value this definition denotes, when it denotes
    /// one: the declared type for variables and parameters, the function
    /// type for functions.
    pub fn value_type(&self) -> Option<Type> {
        match &self.kind {
            DefnKind::Var(v) | DefnKind::Let(v) | DefnKind::Parameter(v) => Some(v.ty.clone()),
            DefnKind::Function(f) => Some(Type::Function(f.ty.clone())),
            DefnKind::Type(t) => Some(Type::TypeLiteral(Box::new(t.ty.clone()))),
            DefnKind::Module(_) | DefnKind::Namespace(_) => None,
        }
    }

    /// The scope a module or namespace definition exposes for qualified
    /// lookup.
    pub fn member_scope(&self) -> Option<ScopeId> {
        match &self.kind {
            DefnKind::Module(scope) | DefnKind::Namespace(scope) => Some(*scope),
            DefnKind::Type(info) => info.composite.as_ref().map(|c| c.members),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_mask_is_monotonic_through_earlier_tasks() {
        let mut phases = PhaseMask::new();
        assert!(!phases.is_set(Task::MemberLookup));

        phases.advance_through(Task::Construction);
        assert!(phases.is_set(Task::MemberLookup));
        assert!(phases.is_set(Task::TypeComparison));
        assert!(phases.is_set(Task::Construction));
        assert!(!phases.is_set(Task::Conversion));
        assert!(!phases.is_set(Task::CodeGeneration));

        // Re-advancing is a no-op.
        let before = phases;
        phases.advance_through(Task::TypeComparison);
        assert_eq!(phases, before);
    }

    #[test]
    fn traits_bitset() {
        let mut traits = DefnTraits::empty().with(DefnTraits::CTOR);
        assert!(traits.contains(DefnTraits::CTOR));
        assert!(!traits.contains(DefnTraits::FINAL));
        traits.insert(DefnTraits::FINAL);
        assert!(traits.contains(DefnTraits::CTOR.with(DefnTraits::FINAL)));
    }

    #[test]
    fn fresh_pattern_vars_are_distinct() {
        let a = fresh_pattern_var_id();
        let b = fresh_pattern_var_id();
        assert_ne!(a, b);
    }
}
