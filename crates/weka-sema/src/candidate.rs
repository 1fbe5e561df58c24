//! One possible dispatch of a call.
//!
//! Every overload admitted to a call gets its own candidate with its own
//! binding environment, so speculative unification for one overload never
//! contaminates another. Candidates advance `Fresh → ArgsAssigned →
//! Unified → (Culled | Winner)`; only a winner may be consumed by code
//! generation.

use weka_types::{ConversionRank, DefnId, ExprId, FunctionType, Type};

use crate::assign::ParameterAssignments;
use crate::env::{BindingEnv, Variance};
use crate::module::Module;

/// What a candidate dispatches to.
#[derive(Debug, Clone)]
pub enum CandidateTarget {
    /// A function definition.
    Method(DefnId),
    /// A function-typed value; the callee expression is the candidate's
    /// base.
    FnType(Box<FunctionType>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    Fresh,
    ArgsAssigned,
    Unified,
    Culled,
    Winner,
}

#[derive(Debug, Clone)]
pub struct CallCandidate {
    /// Receiver or callee-value expression.
    pub base: Option<ExprId>,
    pub target: CandidateTarget,
    pub assignments: ParameterAssignments,
    /// Provisional unification state, owned by this candidate alone.
    pub env: BindingEnv,
    pub state: CandidateState,
    /// Per-argument conversion ranks, filled during ranking.
    pub ranks: Vec<ConversionRank>,
    /// Candidate constructs its receiver; the call's result is the
    /// receiver type rather than the declared (void) return.
    pub is_ctor: bool,
}

impl CallCandidate {
    pub fn new(
        base: Option<ExprId>,
        target: CandidateTarget,
        assignments: ParameterAssignments,
    ) -> Self {
        Self {
            base,
            target,
            assignments,
            env: BindingEnv::new(),
            state: CandidateState::ArgsAssigned,
            ranks: Vec::new(),
            is_ctor: false,
        }
    }

    pub fn ctor(mut self) -> Self {
        self.is_ctor = true;
        self
    }

    pub fn is_culled(&self) -> bool {
        self.state == CandidateState::Culled
    }

    pub fn cull(&mut self) {
        self.state = CandidateState::Culled;
    }

    pub fn method(&self) -> Option<DefnId> {
        match self.target {
            CandidateTarget::Method(id) => Some(id),
            CandidateTarget::FnType(_) => None,
        }
    }

    /// The candidate's function type.
    pub fn function_type(&self, m: &Module) -> FunctionType {
        match &self.target {
            CandidateTarget::Method(id) => m
                .defn(*id)
                .function_info()
                .expect("call candidate targets a function definition")
                .ty
                .clone(),
            CandidateTarget::FnType(ft) => (**ft).clone(),
        }
    }

    /// Declared type of the parameter the i-th argument maps to, before
    /// substitution.
    pub fn declared_param_type(&self, m: &Module, arg_index: usize) -> Option<Type> {
        let param = self.assignments.param_for_arg(arg_index)?;
        self.function_type(m).param_type(param).cloned()
    }

    /// Type of the parameter the i-th argument maps to, under this
    /// candidate's substitutions.
    pub fn param_type(&self, m: &Module, arg_index: usize) -> Option<Type> {
        self.declared_param_type(m, arg_index)
            .map(|ty| self.env.subst(&ty))
    }

    /// The call's result type under this candidate: the receiver type
    /// for constructors, the declared return otherwise.
    pub fn result_type(&self, m: &Module) -> Type {
        let ft = self.function_type(m);
        if self.is_ctor {
            if let Some(self_type) = &ft.self_type {
                return self.env.subst(self_type);
            }
        }
        self.env.subst(&ft.ret)
    }

    /// Attempt per-argument unification: parameter types are the
    /// patterns, argument types the values, contravariantly.
    ///
    /// On failure the candidate is culled and its provisional bindings
    /// are rolled back.
    pub fn unify_args(&mut self, m: &Module, arg_types: &[Type]) -> bool {
        let mark = self.env.snapshot();
        for (index, arg_ty) in arg_types.iter().enumerate() {
            let Some(param_ty) = self.declared_param_type(m, index) else {
                self.env.rollback(mark);
                self.cull();
                return false;
            };
            if !self.env.unify(m, &param_ty, arg_ty, Variance::Contravariant) {
                self.env.rollback(mark);
                self.cull();
                return false;
            }
        }
        self.state = CandidateState::Unified;
        true
    }

    /// Compute per-argument conversion ranks against the reduced
    /// argument types. Candidates with any incompatible argument are
    /// culled.
    pub fn update_ranks(&mut self, m: &Module, arg_types: &[Type]) -> bool {
        self.ranks = arg_types
            .iter()
            .enumerate()
            .map(|(index, arg_ty)| match self.param_type(m, index) {
                Some(param_ty) => m.conversion_rank(arg_ty, &param_ty),
                None => ConversionRank::Incompatible,
            })
            .collect();
        if self.ranks.iter().any(|r| !r.is_compatible()) {
            self.cull();
            return false;
        }
        true
    }

    /// Whether this candidate's conversions dominate `other`'s: at least
    /// as good everywhere and strictly better somewhere.
    pub fn dominates(&self, other: &CallCandidate) -> bool {
        if self.ranks.len() != other.ranks.len() {
            return false;
        }
        let mut strictly_better = false;
        for (mine, theirs) in self.ranks.iter().zip(&other.ranks) {
            if mine < theirs {
                return false;
            }
            if mine > theirs {
                strictly_better = true;
            }
        }
        strictly_better
    }

    /// Whether this candidate's parameter types are at least as specific
    /// as `other`'s everywhere and more specific somewhere.
    pub fn is_more_specific(&self, m: &Module, other: &CallCandidate, arg_count: usize) -> bool {
        let mut strictly = false;
        for index in 0..arg_count {
            let (Some(mine), Some(theirs)) =
                (self.param_type(m, index), other.param_type(m, index))
            else {
                return false;
            };
            if !m.is_subtype(&mine, &theirs) {
                return false;
            }
            if !m.is_subtype(&theirs, &mine) {
                strictly = true;
            }
        }
        strictly
    }

    /// Render the candidate for diagnostics.
    pub fn describe(&self, m: &Module) -> String {
        match &self.target {
            CandidateTarget::Method(id) => {
                let defn = m.defn(*id);
                format!(
                    "{}: {}",
                    defn.qualified_name,
                    Type::Function(self.function_type(m))
                )
            }
            CandidateTarget::FnType(ft) => Type::Function((**ft).clone()).to_string(),
        }
    }
}
