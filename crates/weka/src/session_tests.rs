//! End-to-end scenarios driven through the session, from untyped call
//! ASTs to resolved, lowered IR.

use weka_ast::{Argument, Ast, AstKind, FileId, Lit, Span, Spanned};
use weka_diag::Category;
use weka_sema::{
    well_known, CallKind, CastKind, CompositeInfo, Defn, DefnKind, DefnTraits, ExprKind,
    Module, ScopeData, StorageClass, TemplateInfo, TypeDefnInfo, VariableInfo,
};
use weka_types::{
    CompositeKind, CompositeRef, DefnId, FunctionType, Param, Primitive, ScopeId, Type,
    UnionType,
};

use crate::{ModuleLoader, NoLoader, Session};

fn s() -> Span {
    Span::new(FileId(0), 0, 1)
}

fn sp(node: AstKind) -> Ast {
    Spanned::new(node, s())
}

fn ident(name: &str) -> Ast {
    sp(AstKind::Ident(name.to_string()))
}

fn member(base: Ast, name: &str) -> Ast {
    sp(AstKind::Member {
        base: Box::new(base),
        name: name.to_string(),
    })
}

fn lit_int(v: i64) -> Ast {
    sp(AstKind::Lit(Lit::Int(v)))
}

fn lit_str(v: &str) -> Ast {
    sp(AstKind::Lit(Lit::String(v.to_string())))
}

fn call(func: Ast, args: Vec<Ast>) -> Ast {
    sp(AstKind::Call {
        func: Box::new(func),
        args: args.into_iter().map(Argument::positional).collect(),
    })
}

fn i32_ty() -> Type {
    Type::Primitive(Primitive::I32)
}

fn define_fn_in(
    module: &mut Module,
    scope: ScopeId,
    name: &str,
    params: Vec<(&str, Type)>,
    ret: Type,
) -> DefnId {
    let ft = FunctionType::new(
        params
            .into_iter()
            .map(|(name, ty)| Param::new(name, ty))
            .collect(),
        ret,
    );
    let id = module.add_defn(Defn::function(name, StorageClass::Global, ft));
    module.add_symbol(scope, id).unwrap();
    id
}

fn define_class_in(
    module: &mut Module,
    scope: ScopeId,
    name: &str,
    supers: Vec<Type>,
) -> (DefnId, Type) {
    let members =
        module.add_scope(ScopeData::iterable(Some(scope)).named(format!("{name} members")));
    let id = module.add_defn(Defn::new(
        name,
        StorageClass::Global,
        DefnKind::Type(TypeDefnInfo {
            ty: Type::Bad,
            composite: Some(CompositeInfo {
                kind: CompositeKind::Class,
                supers,
                members,
                instance_fields: Vec::new(),
                coercers: Vec::new(),
            }),
        }),
    ));
    let ty = Type::Composite(CompositeRef {
        name: name.to_string(),
        kind: CompositeKind::Class,
        defn: id,
        args: Vec::new(),
    });
    if let DefnKind::Type(info) = &mut module.defn_mut(id).kind {
        info.ty = ty.clone();
    }
    module.scope_mut(members).owner = Some(id);
    module.add_symbol(scope, id).unwrap();
    (id, ty)
}

fn define_var(session: &mut Session, name: &str, ty: Type) -> DefnId {
    let id = session.module.add_defn(Defn::new(
        name,
        StorageClass::Global,
        DefnKind::Var(VariableInfo { ty, init: None }),
    ));
    let root = session.module.root_scope;
    session.module.add_symbol(root, id).unwrap();
    id
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// S1: two overloads at different widths; int literals pick the
/// preferred width.
#[test]
fn overload_on_literal_width() {
    let mut session = Session::new("main");
    let root = session.module.root_scope;
    let narrow = define_fn_in(
        &mut session.module,
        root,
        "f",
        vec![("a", i32_ty()), ("b", i32_ty())],
        i32_ty(),
    );
    define_fn_in(
        &mut session.module,
        root,
        "f",
        vec![
            ("a", Type::Primitive(Primitive::I64)),
            ("b", Type::Primitive(Primitive::I64)),
        ],
        Type::Primitive(Primitive::I64),
    );

    let id = session.analyze(&call(ident("f"), vec![lit_int(1), lit_int(2)]));
    assert_eq!(session.module.expr(id).ty, i32_ty());
    let ExprKind::Call(c) = &session.module.expr(id).kind else {
        panic!("expected a call");
    };
    assert_eq!(
        c.candidates[c.singular_candidate().unwrap()].method(),
        Some(narrow)
    );
    assert!(!session.has_errors());
}

/// S2: template inference from argument types.
#[test]
fn template_inference() {
    let mut session = Session::new("main");
    let template = TemplateInfo::new(&["T"]);
    let t = Type::PatternVar(template.params[0].clone());
    let ft = FunctionType::new(
        vec![Param::new("a", t.clone()), Param::new("b", t.clone())],
        t,
    );
    let max = session
        .module
        .add_defn(Defn::function("max", StorageClass::Global, ft));
    session.module.defn_mut(max).traits.insert(DefnTraits::TEMPLATE);
    session.module.defn_mut(max).template = Some(template);
    let root = session.module.root_scope;
    session.module.add_symbol(root, max).unwrap();

    define_var(&mut session, "a", i32_ty());
    define_var(&mut session, "b", i32_ty());

    let id = session.analyze(&call(ident("max"), vec![ident("a"), ident("b")]));
    assert_eq!(session.module.expr(id).ty, i32_ty());
    assert!(session.module.is_singular_expr(id));
    assert!(!session.has_errors());
}

/// S3: an unqualified call completed by argument-dependent lookup into
/// an imported module's scope.
#[test]
fn adl_through_an_imported_module() {
    struct OtherModule;

    impl ModuleLoader for OtherModule {
        fn load(&mut self, module: &mut Module, path: &str) -> Option<ScopeId> {
            if path != "other" {
                return None;
            }
            let scope = module.add_scope(ScopeData::iterable(None).named("other"));
            let (_, foo_ty) = define_class_in(module, scope, "Foo", vec![]);
            define_fn_in(module, scope, "print", vec![("value", foo_ty)], Type::void());
            Some(scope)
        }
    }

    let mut session = Session::new("main");
    let mut loader = OtherModule;
    assert!(session.import(&mut loader, "other"));
    assert!(!session.import(&mut loader, "missing"));

    // Fetch Foo through qualified lookup to type a variable with it.
    let foo_expr = session.analyze(&member(ident("other"), "Foo"));
    let Type::TypeLiteral(foo_ty) = session.module.expr(foo_expr).ty.clone() else {
        panic!("expected a type literal");
    };
    define_var(&mut session, "x", (*foo_ty).clone());

    let id = session.analyze(&call(ident("print"), vec![ident("x")]));
    let ExprKind::Call(c) = &session.module.expr(id).kind else {
        panic!("expected a call");
    };
    assert!(c.singular_candidate().is_some());
    assert!(!session.has_errors());
}

/// S4: constructor selection through `construct`.
#[test]
fn string_construction() {
    let mut session = Session::new("main");
    let string_ty = session.builtins.string_type.clone();

    let id = session.analyze(&call(ident("String"), vec![lit_str("hi")]));
    assert_eq!(session.module.expr(id).ty, string_ty);
    let ExprKind::Call(c) = &session.module.expr(id).kind else {
        panic!("expected a call");
    };
    assert_eq!(c.kind, CallKind::Construct);

    let lowered = session.analyzer().lower_call(id);
    assert!(matches!(
        session.module.expr(lowered).kind,
        ExprKind::CtorCall { .. }
    ));
    assert!(!session.has_errors());
}

/// S5: the more specific overload wins.
#[test]
fn specificity_ranking() {
    let mut session = Session::new("main");
    let object_ty = session.builtins.object_type.clone();
    let string_ty = session.builtins.string_type.clone();
    let root = session.module.root_scope;
    define_fn_in(&mut session.module, root, "g", vec![("x", object_ty)], Type::void());
    let specific = define_fn_in(
        &mut session.module,
        root,
        "g",
        vec![("x", string_ty)],
        Type::void(),
    );

    let id = session.analyze(&call(ident("g"), vec![lit_str("value")]));
    let ExprKind::Call(c) = &session.module.expr(id).kind else {
        panic!("expected a call");
    };
    assert_eq!(
        c.candidates[c.singular_candidate().unwrap()].method(),
        Some(specific)
    );
    assert!(!session.has_errors());
}

/// S6: a checked member extraction from a tagged union.
#[test]
fn checked_union_member_extraction() {
    let mut session = Session::new("main");
    let string_ty = session.builtins.string_type.clone();
    let union_ty = Type::Union(UnionType::new(vec![i32_ty(), string_ty.clone()]));
    let Type::Union(u) = &union_ty else {
        unreachable!()
    };
    assert!(u.num_value_types() > 0, "the union carries a tag");
    define_var(&mut session, "u", union_ty);

    let value = session.analyze(&ident("u"));
    let cast = session.analyzer().cast_union_member(value, &string_ty, true);
    assert!(matches!(
        session.module.expr(cast).kind,
        ExprKind::Cast {
            cast: CastKind::CheckedUnionMember,
            ..
        }
    ));
    assert_eq!(session.module.expr(cast).ty, string_ty);
    assert!(!session.has_errors());
}

// ---------------------------------------------------------------------------
// Session behavior
// ---------------------------------------------------------------------------

#[test]
fn finish_refuses_ir_after_errors() {
    let mut session = Session::new("main");
    let id = session.analyze(&call(ident("nonexistent"), vec![]));
    assert!(session.module.expr(id).is_error());
    assert!(session.has_errors());

    let err = session.finish().unwrap_err();
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].category, Category::UndefinedName);
    insta::assert_snapshot!(
        err.diagnostics()[0].to_string(),
        @"error[E0101]: Undefined method 'nonexistent'"
    );
}

#[test]
fn finish_yields_the_module_on_success() {
    let mut session = Session::new("main");
    let root = session.module.root_scope;
    define_fn_in(&mut session.module, root, "tick", vec![], Type::void());
    let id = session.analyze(&call(ident("tick"), vec![]));

    let module = session.finish().expect("no errors were reported");
    assert!(module.is_singular_expr(id));
}

#[test]
fn max_errors_cancels_further_analysis() {
    let mut session = Session::with_max_errors("main", 1);
    session.analyze(&call(ident("first_missing"), vec![]));
    assert!(session.reporter.should_abort());

    // Subsequent work is dropped without new diagnostics.
    let before = session.reporter.error_count();
    let root = session.module.root_scope;
    define_fn_in(&mut session.module, root, "ok", vec![], Type::void());
    let id = session.analyze(&call(ident("ok"), vec![]));
    assert_eq!(session.module.expr(id).ty, Type::Bad);
    assert_eq!(session.reporter.error_count(), before);
}

#[test]
fn no_loader_resolves_nothing() {
    let mut session = Session::new("main");
    assert!(!session.import(&mut NoLoader, "anything"));
}

#[test]
fn lowered_ir_is_fully_singular() {
    let mut session = Session::new("main");
    let root = session.module.root_scope;
    define_fn_in(
        &mut session.module,
        root,
        "add",
        vec![("a", i32_ty()), ("b", i32_ty())],
        i32_ty(),
    );
    let id = session.analyze(&call(ident("add"), vec![lit_int(1), lit_int(2)]));
    let lowered = session.analyzer().lower_call(id);
    assert!(matches!(
        session.module.expr(lowered).kind,
        ExprKind::FnCall { .. }
    ));

    let module = session.finish().expect("analysis succeeded");
    let ids: Vec<_> = module.expr_ids().collect();
    for expr in ids {
        assert!(module.is_singular_expr(expr));
    }
}

#[test]
fn well_known_names_drive_constructor_search() {
    assert_eq!(well_known::CONSTRUCT, "construct");
    assert_eq!(well_known::CREATE, "create");
}
