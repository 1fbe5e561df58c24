//! Tracing types for analyzer observability.
//!
//! These types capture step-by-step records of unification and overload
//! resolution. All tracing is opt-in — zero overhead when disabled.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Unification trace
// ---------------------------------------------------------------------------

/// A single step in a unification trace.
#[derive(Debug, Clone, Serialize)]
pub struct UnifyStep {
    pub step: usize,
    pub action: UnifyAction,
    pub pattern: String,
    pub value: String,
    pub detail: String,
}

/// What action was taken during a unification step.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifyAction {
    /// Types are already identical — no-op.
    Identity,
    /// Fresh substitution installed for a pattern variable.
    Install,
    /// Existing bounds narrowed toward a more specific type.
    Narrow,
    /// Existing bounds widened toward a more general type.
    Widen,
    /// Structural recursion into compound children.
    Decompose,
    /// A call constraint suspended unification until resolution.
    Suspend,
    /// Unification failed — type mismatch.
    Mismatch,
}

// ---------------------------------------------------------------------------
// Overload resolution trace
// ---------------------------------------------------------------------------

/// A single step in an overload-resolution trace.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveStep {
    pub action: ResolveAction,
    pub candidate: String,
    pub detail: String,
}

/// What happened to a candidate during resolution.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    /// Candidate admitted to the set.
    Add,
    /// Culled: argument unification failed.
    CullUnify,
    /// Culled: an argument conversion is incompatible.
    CullRank,
    /// Culled: another candidate dominates on conversion ranks.
    CullDominated,
    /// Selected as the unique winner.
    Winner,
    /// Resolution ended ambiguous.
    Ambiguous,
}
