//! Microbenchmarks for the semantic core: unification, substitution,
//! and overload resolution.

use std::hint::black_box;

use divan::{AllocProfiler, Bencher};
use weka::Session;
use weka_ast::{Argument, Ast, AstKind, FileId, Lit, Span, Spanned};
use weka_sema::{BindingEnv, Defn, Module, StorageClass, Variance};
use weka_types::{FunctionType, Param, PatternVarId, PatternVarRef, Primitive, Type};

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn span() -> Span {
    Span::new(FileId(0), 0, 1)
}

fn nested_tuple(depth: usize, leaf: Type) -> Type {
    let mut ty = leaf;
    for _ in 0..depth {
        ty = Type::Tuple(vec![ty.clone(), ty]);
    }
    ty
}

fn pattern_var(id: u32) -> Type {
    Type::PatternVar(PatternVarRef {
        name: format!("T{id}"),
        id: PatternVarId(id),
    })
}

#[divan::bench(args = [4, 8, 12])]
fn unify_nested_tuples(bencher: Bencher, depth: usize) {
    let module = Module::new("bench");
    let pattern = nested_tuple(depth, pattern_var(0));
    let value = nested_tuple(depth, Type::Primitive(Primitive::I32));
    bencher.bench(|| {
        let mut env = BindingEnv::new();
        let ok = env.unify(
            black_box(&module),
            black_box(&pattern),
            black_box(&value),
            Variance::Invariant,
        );
        assert!(ok);
        black_box(env.snapshot())
    });
}

#[divan::bench(args = [4, 8, 12])]
fn subst_nested_tuples(bencher: Bencher, depth: usize) {
    let pattern = nested_tuple(depth, pattern_var(0));
    let mut env = BindingEnv::new();
    env.add_substitution(pattern_var(0), Type::Primitive(Primitive::I32));
    bencher.bench(|| black_box(env.subst(black_box(&pattern))));
}

#[divan::bench(args = [2, 8, 32])]
fn resolve_overload_set(bencher: Bencher, overloads: usize) {
    bencher.bench(|| {
        let mut session = Session::new("bench");
        let root = session.module.root_scope;
        for i in 0..overloads {
            let width = if i == 0 { Primitive::I32 } else { Primitive::I64 };
            let ft = FunctionType::new(
                vec![
                    Param::new("a", Type::Primitive(width)),
                    Param::new("b", Type::Primitive(width)),
                ],
                Type::Primitive(width),
            );
            let id = session
                .module
                .add_defn(Defn::function("f", StorageClass::Global, ft));
            session.module.add_symbol(root, id).unwrap();
        }

        let ast: Ast = Spanned::new(
            AstKind::Call {
                func: Box::new(Spanned::new(AstKind::Ident("f".to_string()), span())),
                args: vec![
                    Argument::positional(Spanned::new(AstKind::Lit(Lit::Int(1)), span())),
                    Argument::positional(Spanned::new(AstKind::Lit(Lit::Int(2)), span())),
                ],
            },
            span(),
        );
        let id = session.analyze(black_box(&ast));
        black_box(session.module.expr(id).ty.clone())
    });
}
