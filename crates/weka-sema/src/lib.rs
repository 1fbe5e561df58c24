//! The Weka semantic core.
//!
//! This crate implements:
//! - the definition/scope model with ordered, overload-aware symbol tables
//! - the typed expression IR and block-structured control flow
//! - variance-aware unification over a persistent substitution journal
//! - overload resolution with per-candidate binding environments,
//!   argument-dependent lookup, constructor selection, and coercive casts
//! - the phase-driven analysis task graph
//!
//! The parser (producing `weka-ast` trees) and the code generator sit on
//! either side of this crate; both are external collaborators. Code
//! generation consumes only fully singular IR: every reachable type is
//! concrete and every call has exactly one surviving candidate.

pub mod analyzer;
pub mod assign;
pub mod block;
pub mod builtins;
pub mod call;
pub mod candidate;
pub mod defn;
pub mod env;
pub mod expr;
pub mod module;
pub mod scope;
pub mod trace;

pub use analyzer::{AnalyzerBase, ExprAnalyzer};
pub use assign::{AssignError, ParameterAssignments};
pub use block::{Block, Terminator};
pub use builtins::{well_known, Builtins};
pub use candidate::{CallCandidate, CandidateState, CandidateTarget};
pub use defn::{
    CompositeInfo, Defn, DefnKind, DefnTraits, Dispatch, FunctionInfo, StorageClass, Task,
    TemplateInfo, TypeDefnInfo, VariableInfo, Visibility,
};
pub use env::{BindingEnv, Substitution, Variance};
pub use expr::{CallExpr, CallKind, CastKind, Expr, ExprKind};
pub use module::Module;
pub use scope::{ScopeData, ScopeKind};

// Re-export for convenience.
pub use weka_diag::{Category, Diagnostic, Reporter};

#[cfg(test)]
mod prop_tests;
