//! The binding environment: substitutions and unification.
//!
//! A [`BindingEnv`] records proposals that a pattern variable is
//! equivalent to a type expression, as an append-only journal of
//! [`Substitution`]s. Updates never mutate earlier entries — refining a
//! bound appends a fresh substitution that shadows the old one — so a
//! caller wanting speculative unification snapshots the journal length
//! and truncates back on failure.

use std::sync::atomic::{AtomicU32, Ordering};

use weka_types::{
    primitive_conversion_rank, ConversionRank, EnvId, PatternVarRef, Type,
};

use crate::module::Module;
use crate::trace::{UnifyAction, UnifyStep};

/// How a value type may relate to the pattern it unifies against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    /// The value may be more specific than the pattern; repeated
    /// bindings narrow toward the meet.
    Covariant,
    /// The value may be more general than the pattern; repeated
    /// bindings widen toward the join. Parameter positions unify
    /// contravariantly.
    Contravariant,
    /// The value must equal the pattern.
    Invariant,
}

impl Variance {
    pub fn flip(self) -> Variance {
        match self {
            Variance::Covariant => Variance::Contravariant,
            Variance::Contravariant => Variance::Covariant,
            Variance::Invariant => Variance::Invariant,
        }
    }
}

/// A proposal that `left` (a pattern variable) is equivalent to a type
/// within the bounds `[lower, upper]`.
///
/// When constructed from a single right-hand side, `upper == lower ==
/// right`. `right` is the current best reading of the variable.
#[derive(Debug, Clone)]
pub struct Substitution {
    pub left: Type,
    pub right: Type,
    pub upper: Type,
    pub lower: Type,
}

fn fresh_env_id() -> EnvId {
    static NEXT: AtomicU32 = AtomicU32::new(0);
    EnvId(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Performs unification between types and accumulates type bindings.
pub struct BindingEnv {
    id: EnvId,
    journal: Vec<Substitution>,
    tracing: bool,
    trace: Vec<UnifyStep>,
}

impl Default for BindingEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for BindingEnv {
    /// A cloned environment shares the original's id: pattern values
    /// minted against the original resolve in the clone as well.
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            journal: self.journal.clone(),
            tracing: self.tracing,
            trace: self.trace.clone(),
        }
    }
}

impl std::fmt::Debug for BindingEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BindingEnv#{}{{", self.id.0)?;
        for (i, s) in self.journal.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} := {}", s.left, s.right)?;
        }
        f.write_str("}")
    }
}

impl BindingEnv {
    pub fn new() -> Self {
        Self {
            id: fresh_env_id(),
            journal: Vec::new(),
            tracing: false,
            trace: Vec::new(),
        }
    }

    pub fn id(&self) -> EnvId {
        self.id
    }

    /// True if there are no variable bindings.
    pub fn empty(&self) -> bool {
        self.journal.is_empty()
    }

    /// Drop all bindings.
    pub fn reset(&mut self) {
        self.journal.clear();
    }

    /// Current journal head, for later rollback.
    pub fn snapshot(&self) -> usize {
        self.journal.len()
    }

    /// Discard every binding installed after `snapshot`.
    pub fn rollback(&mut self, snapshot: usize) {
        self.journal.truncate(snapshot);
    }

    /// Enable step recording for observability tools.
    pub fn enable_tracing(&mut self) {
        self.tracing = true;
    }

    pub fn trace(&self) -> &[UnifyStep] {
        &self.trace
    }

    fn record(&mut self, action: UnifyAction, pattern: &Type, value: &Type, detail: &str) {
        if !self.tracing {
            return;
        }
        let step = self.trace.len();
        self.trace.push(UnifyStep {
            step,
            action,
            pattern: pattern.to_string(),
            value: value.to_string(),
            detail: detail.to_string(),
        });
    }

    /// Add a substitution whose upper and lower bounds are both `right`.
    pub fn add_substitution(&mut self, left: Type, right: Type) {
        self.journal.push(Substitution {
            left,
            upper: right.clone(),
            lower: right.clone(),
            right,
        });
    }

    /// Add a substitution with distinct bounds; the reading is the lower
    /// bound.
    pub fn add_substitution_bounded(&mut self, left: Type, upper: Type, lower: Type) {
        self.journal.push(Substitution {
            left,
            right: lower.clone(),
            upper,
            lower,
        });
    }

    fn add_substitution_full(&mut self, left: Type, right: Type, upper: Type, lower: Type) {
        self.journal.push(Substitution {
            left,
            right,
            upper,
            lower,
        });
    }

    /// The newest substitution whose left side is `left`.
    pub fn substitution_for(&self, left: &Type) -> Option<&Substitution> {
        self.journal.iter().rev().find(|s| s.left == *left)
    }

    /// The current reading of a pattern variable.
    pub fn get(&self, var: &PatternVarRef) -> Option<&Type> {
        self.journal.iter().rev().find_map(|s| match &s.left {
            Type::PatternVar(pv) if pv.id == var.id => Some(&s.right),
            _ => None,
        })
    }

    /// Resolve pattern values belonging to this environment, without
    /// performing general substitution. Foreign and unbound pattern
    /// values come back unchanged.
    pub fn dereference(&self, ty: &Type) -> Type {
        match ty {
            Type::PatternValue { env, var } if *env == self.id => match self.get(var) {
                Some(bound) => {
                    let bound = bound.clone();
                    self.dereference(&bound)
                }
                None => ty.clone(),
            },
            _ => ty.clone(),
        }
    }

    /// Rewrite `ty`, replacing every bound pattern variable and pattern
    /// value with its binding, transitively.
    pub fn subst(&self, ty: &Type) -> Type {
        match ty {
            Type::PatternVar(pv) => match self.get(pv) {
                Some(bound) if bound != ty => {
                    let bound = bound.clone();
                    self.subst(&bound)
                }
                _ => ty.clone(),
            },
            Type::PatternValue { env, var } if *env == self.id => match self.get(var) {
                Some(bound) if bound != ty => {
                    let bound = bound.clone();
                    self.subst(&bound)
                }
                _ => ty.clone(),
            },
            Type::Composite(c) => {
                let mut out = c.clone();
                out.args = c.args.iter().map(|a| self.subst(a)).collect();
                Type::Composite(out)
            }
            Type::Function(ft) => Type::Function(self.subst_fn(ft)),
            Type::BoundMethod(ft) => Type::BoundMethod(self.subst_fn(ft)),
            Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| self.subst(e)).collect()),
            Type::Union(u) => {
                let mut out = u.clone();
                out.members = u.members.iter().map(|m| self.subst(m)).collect();
                Type::Union(out)
            }
            Type::Address(t) => Type::Address(Box::new(self.subst(t))),
            Type::Pointer(t) => Type::Pointer(Box::new(self.subst(t))),
            Type::NativeArray(t, n) => Type::NativeArray(Box::new(self.subst(t)), *n),
            Type::TypeLiteral(t) => Type::TypeLiteral(Box::new(self.subst(t))),
            _ => ty.clone(),
        }
    }

    fn subst_fn(&self, ft: &weka_types::FunctionType) -> weka_types::FunctionType {
        let mut out = ft.clone();
        for p in &mut out.params {
            p.ty = self.subst(&p.ty);
        }
        out.ret = Box::new(self.subst(&out.ret));
        if let Some(st) = &out.self_type {
            out.self_type = Some(Box::new(self.subst(st)));
        }
        out
    }

    // -----------------------------------------------------------------
    // Unification
    // -----------------------------------------------------------------

    /// Unify `pattern` against `value` under `variance`.
    ///
    /// On failure the journal keeps any bindings installed before the
    /// failing step; callers snapshot and roll back when they need
    /// all-or-nothing behavior.
    pub fn unify(&mut self, m: &Module, pattern: &Type, value: &Type, variance: Variance) -> bool {
        // Error sentinels absorb: the fault was already diagnosed.
        if pattern.is_error() || value.is_error() {
            return true;
        }

        // Call constraints suspend unification; they are retried when
        // the call they stand for resolves.
        if matches!(pattern, Type::ResultOf(_) | Type::ParameterOf(_, _))
            || matches!(value, Type::ResultOf(_) | Type::ParameterOf(_, _))
        {
            self.record(UnifyAction::Suspend, pattern, value, "call constraint");
            return true;
        }

        match pattern {
            Type::PatternVar(pv) => {
                let pv = pv.clone();
                return self.unify_pattern_var(m, &pv, value, variance);
            }
            Type::PatternValue { env, var } if *env == self.id => {
                let var = var.clone();
                return match self.get(&var).cloned() {
                    Some(bound) => self.unify(m, &bound, value, variance),
                    None => self.unify_pattern_var(m, &var, value, variance),
                };
            }
            Type::PatternValue { .. } => {
                // A reading under a foreign environment stays open here.
                self.record(UnifyAction::Suspend, pattern, value, "foreign environment");
                return true;
            }
            _ => {}
        }

        match value {
            Type::PatternVar(pv) => {
                let pv = pv.clone();
                return self.unify_pattern_var(m, &pv, pattern, variance.flip());
            }
            Type::PatternValue { env, var } if *env == self.id => {
                let var = var.clone();
                return match self.get(&var).cloned() {
                    Some(bound) => self.unify(m, pattern, &bound, variance),
                    None => self.unify_pattern_var(m, &var, pattern, variance.flip()),
                };
            }
            Type::PatternValue { .. } => {
                self.record(UnifyAction::Suspend, pattern, value, "foreign environment");
                return true;
            }
            _ => {}
        }

        if pattern == value {
            self.record(UnifyAction::Identity, pattern, value, "");
            return true;
        }

        let ok = match (pattern, value) {
            (Type::Primitive(p), Type::Primitive(v)) => {
                // Equality was handled above; otherwise a lossless
                // implicit widening is admissible unless invariant.
                variance != Variance::Invariant
                    && primitive_conversion_rank(*v, *p) >= ConversionRank::PrecisionLoss
            }
            (Type::Composite(p), Type::Composite(v)) => {
                let (p, v) = (p.clone(), v.clone());
                self.unify_composite(m, &p, &v, variance)
            }
            (Type::Function(p), Type::Function(v))
            | (Type::BoundMethod(p), Type::BoundMethod(v)) => {
                let (p, v) = (p.clone(), v.clone());
                self.unify_function(m, &p, &v, variance)
            }
            (Type::Tuple(ps), Type::Tuple(vs)) => {
                let (ps, vs) = (ps.clone(), vs.clone());
                ps.len() == vs.len()
                    && ps
                        .iter()
                        .zip(&vs)
                        .all(|(p, v)| self.unify(m, p, v, variance))
            }
            (Type::Union(pu), Type::Union(vu)) => {
                let (pu, vu) = (pu.clone(), vu.clone());
                pu.members.len() == vu.members.len()
                    && pu
                        .members
                        .iter()
                        .zip(&vu.members)
                        .all(|(p, v)| self.unify(m, p, v, variance))
            }
            // Union injection: a member type unifies into the union when
            // the position admits conversion.
            (Type::Union(pu), _) if variance != Variance::Invariant => {
                let pu = pu.clone();
                let mut ok = false;
                for member in &pu.members {
                    let mark = self.snapshot();
                    if self.unify(m, member, value, variance) {
                        ok = true;
                        break;
                    }
                    self.rollback(mark);
                }
                ok
            }
            (Type::Address(p), Type::Address(v)) | (Type::Pointer(p), Type::Pointer(v)) => {
                let (p, v) = (p.clone(), v.clone());
                self.unify(m, &p, &v, Variance::Invariant)
            }
            (Type::NativeArray(p, pn), Type::NativeArray(v, vn)) => {
                let (p, v) = (p.clone(), v.clone());
                *pn == *vn && self.unify(m, &p, &v, Variance::Invariant)
            }
            (Type::TypeLiteral(p), Type::TypeLiteral(v)) => {
                let (p, v) = (p.clone(), v.clone());
                self.unify(m, &p, &v, Variance::Invariant)
            }
            _ => false,
        };

        if ok {
            self.record(UnifyAction::Decompose, pattern, value, "");
        } else {
            self.record(UnifyAction::Mismatch, pattern, value, "");
        }
        ok
    }

    fn unify_pattern_var(
        &mut self,
        m: &Module,
        pv: &PatternVarRef,
        value: &Type,
        variance: Variance,
    ) -> bool {
        let left = Type::PatternVar(pv.clone());

        if let Type::PatternVar(other) = value {
            if other.id == pv.id {
                self.record(UnifyAction::Identity, &left, value, "");
                return true;
            }
        }

        // Occurs check: binding a variable to a type containing itself
        // would make substitution diverge.
        let mut free = Vec::new();
        value.free_pattern_vars(&mut free);
        if free.contains(&pv.id) {
            self.record(UnifyAction::Mismatch, &left, value, "occurs check");
            return false;
        }

        let existing = self
            .substitution_for(&left)
            .map(|s| (s.right.clone(), s.upper.clone(), s.lower.clone()));

        let Some((right, upper, lower)) = existing else {
            self.record(UnifyAction::Install, &left, value, "");
            self.add_substitution(left, value.clone());
            return true;
        };

        if right == *value {
            self.record(UnifyAction::Identity, &left, value, "");
            return true;
        }

        match variance {
            Variance::Invariant => {
                // The established binding must match exactly; nested
                // variables inside it may still unify structurally.
                self.unify(m, &right, value, Variance::Invariant)
            }
            Variance::Covariant => {
                if m.is_subtype(value, &lower) {
                    self.record(UnifyAction::Narrow, &left, value, "");
                    self.add_substitution_full(left, value.clone(), upper, value.clone());
                    true
                } else if m.is_subtype(&lower, value) {
                    // Existing binding is already at least as specific.
                    true
                } else {
                    self.unify(m, &right, value, Variance::Covariant)
                }
            }
            Variance::Contravariant => {
                if m.is_subtype(&upper, value) {
                    self.record(UnifyAction::Widen, &left, value, "");
                    self.add_substitution_full(left, value.clone(), value.clone(), lower);
                    true
                } else if m.is_subtype(value, &upper) {
                    // Existing binding already subsumes the new value.
                    true
                } else {
                    self.unify(m, &right, value, Variance::Contravariant)
                }
            }
        }
    }

    fn unify_function(
        &mut self,
        m: &Module,
        pattern: &weka_types::FunctionType,
        value: &weka_types::FunctionType,
        variance: Variance,
    ) -> bool {
        if pattern.params.len() != value.params.len() {
            return false;
        }
        // Parameters flip to contravariant; the result stays covariant.
        for (p, v) in pattern.params.iter().zip(&value.params) {
            if !self.unify(m, &p.ty, &v.ty, variance.flip()) {
                return false;
            }
        }
        self.unify(m, &pattern.ret, &value.ret, variance)
    }

    fn unify_composite(
        &mut self,
        m: &Module,
        pattern: &weka_types::CompositeRef,
        value: &weka_types::CompositeRef,
        variance: Variance,
    ) -> bool {
        if pattern.defn == value.defn {
            return pattern.args.len() == value.args.len()
                && pattern
                    .args
                    .iter()
                    .zip(&value.args)
                    .all(|(p, v)| self.unify(m, p, v, Variance::Invariant));
        }

        match variance {
            Variance::Invariant => false,
            Variance::Covariant => match m.find_super_instance(value, pattern.defn) {
                Some(instance) => self.unify_composite(m, pattern, &instance, Variance::Invariant),
                None => false,
            },
            Variance::Contravariant => {
                // Parameter position: an argument that is a subtype of
                // the declared parameter is admissible; so is a genuine
                // supertype for contravariant uses of the pattern.
                if let Some(instance) = m.find_super_instance(value, pattern.defn) {
                    self.unify_composite(m, pattern, &instance, Variance::Invariant)
                } else if let Some(instance) = m.find_super_instance(pattern, value.defn) {
                    self.unify_composite(m, &instance, value, Variance::Invariant)
                } else {
                    false
                }
            }
        }
    }
}
