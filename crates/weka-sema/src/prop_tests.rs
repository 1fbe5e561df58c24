//! Property tests for the binding environment using proptest.
//!
//! These tests stress invariants that must hold for ANY input types,
//! not just hand-picked examples:
//!
//! 1. Substitution idempotence: subst(subst(t)) == subst(t)
//! 2. Unification reflexivity: unify(t, t) always succeeds and installs
//!    nothing new
//! 3. Singular types are substitution fixed points
//! 4. A binding installed by unification satisfies its recorded bounds
//! 5. Snapshot/rollback restores the journal exactly

use proptest::prelude::*;

use weka_types::{
    FunctionType, Param, PatternVarId, PatternVarRef, Primitive, Type, UnionType,
};

use crate::env::{BindingEnv, Variance};
use crate::module::Module;

fn var(id: u32) -> PatternVarRef {
    PatternVarRef {
        name: format!("T{id}"),
        id: PatternVarId(id),
    }
}

// ---------------------------------------------------------------------------
// Strategies for generating types
// ---------------------------------------------------------------------------

fn arb_primitive() -> impl Strategy<Value = Primitive> {
    prop::sample::select(&[
        Primitive::Bool,
        Primitive::Char,
        Primitive::I16,
        Primitive::I32,
        Primitive::I64,
        Primitive::U32,
        Primitive::F64,
        Primitive::IntLit,
    ][..])
}

/// Ground types only (no pattern variables).
fn arb_ground_type(depth: u32) -> BoxedStrategy<Type> {
    let leaf = arb_primitive().prop_map(Type::Primitive);
    if depth == 0 {
        leaf.boxed()
    } else {
        let inner = arb_ground_type(depth - 1);
        prop_oneof![
            4 => leaf,
            1 => inner.clone().prop_map(|t| Type::Address(Box::new(t))),
            1 => inner.clone().prop_map(|t| Type::Pointer(Box::new(t))),
            1 => prop::collection::vec(inner.clone(), 1..3).prop_map(Type::Tuple),
            1 => prop::collection::vec(inner.clone(), 1..3)
                .prop_map(|members| Type::Union(UnionType::new(members))),
            1 => (prop::collection::vec(inner.clone(), 0..3), inner)
                .prop_map(|(params, ret)| Type::Function(FunctionType::new(
                    params.into_iter().map(Param::anonymous).collect(),
                    ret,
                ))),
        ]
        .boxed()
    }
}

/// Types of bounded depth, possibly containing pattern variables.
fn arb_type(depth: u32) -> BoxedStrategy<Type> {
    let leaf = prop_oneof![
        3 => arb_primitive().prop_map(Type::Primitive),
        1 => (0u32..8).prop_map(|id| Type::PatternVar(var(id))),
    ];
    if depth == 0 {
        leaf.boxed()
    } else {
        let inner = arb_type(depth - 1);
        prop_oneof![
            4 => leaf,
            1 => inner.clone().prop_map(|t| Type::Address(Box::new(t))),
            1 => (inner.clone(), 1u64..8).prop_map(|(t, n)| Type::NativeArray(Box::new(t), n)),
            1 => prop::collection::vec(inner.clone(), 1..3).prop_map(Type::Tuple),
            1 => (prop::collection::vec(inner.clone(), 0..3), inner)
                .prop_map(|(params, ret)| Type::Function(FunctionType::new(
                    params.into_iter().map(Param::anonymous).collect(),
                    ret,
                ))),
        ]
        .boxed()
    }
}

/// An environment binding a few variables to ground types.
fn arb_env() -> impl Strategy<Value = BindingEnv> {
    prop::collection::vec((0u32..8, arb_ground_type(1)), 0..6).prop_map(|bindings| {
        let mut env = BindingEnv::new();
        for (id, ty) in bindings {
            env.add_substitution(Type::PatternVar(var(id)), ty);
        }
        env
    })
}

proptest! {
    #[test]
    fn subst_is_idempotent(ty in arb_type(3), env in arb_env()) {
        let once = env.subst(&ty);
        let twice = env.subst(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn unify_is_reflexive(ty in arb_type(3)) {
        let module = Module::new("prop");
        let mut env = BindingEnv::new();
        prop_assert!(env.unify(&module, &ty, &ty, Variance::Covariant));
        prop_assert!(env.empty(), "reflexive unification installs nothing");
    }

    #[test]
    fn singular_types_are_subst_fixed_points(ty in arb_ground_type(3), env in arb_env()) {
        prop_assert!(ty.is_singular());
        prop_assert_eq!(env.subst(&ty), ty);
    }

    #[test]
    fn installed_bindings_satisfy_their_bounds(value in arb_ground_type(2)) {
        let module = Module::new("prop");
        let mut env = BindingEnv::new();
        let t = var(0);
        let pattern = Type::PatternVar(t.clone());
        prop_assert!(env.unify(&module, &pattern, &value, Variance::Covariant));

        let binding = env.substitution_for(&pattern).expect("binding installed");
        prop_assert!(module.is_subtype(&binding.lower, &binding.right));
        prop_assert!(module.is_subtype(&binding.right, &binding.upper));
        prop_assert_eq!(env.subst(&pattern), value);
    }

    #[test]
    fn rollback_restores_the_journal(
        first in arb_ground_type(1),
        second in arb_ground_type(1),
    ) {
        let module = Module::new("prop");
        let mut env = BindingEnv::new();
        prop_assert!(env.unify(
            &module,
            &Type::PatternVar(var(0)),
            &first,
            Variance::Invariant
        ));
        let mark = env.snapshot();

        // Speculative step: may succeed or fail depending on the types.
        let pattern = Type::Tuple(vec![Type::PatternVar(var(1)), Type::PatternVar(var(1))]);
        let value = Type::Tuple(vec![first.clone(), second]);
        let _ = env.unify(&module, &pattern, &value, Variance::Invariant);
        env.rollback(mark);

        prop_assert_eq!(env.snapshot(), mark);
        prop_assert!(env.get(&var(1)).is_none());
        prop_assert_eq!(env.get(&var(0)), Some(&first));
    }
}
