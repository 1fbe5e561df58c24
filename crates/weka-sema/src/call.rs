//! AST reduction and call construction.
//!
//! This is the overload-resolution driver: it reduces untyped call forms
//! to typed [`CallExpr`]s with candidate sets, performs argument-dependent
//! lookup, selects constructors, discovers coercive casts, and culls
//! candidates until a single winner remains.

use weka_ast::{Argument, Ast, AstKind, Lit, Span, TypeAnnotation};
use weka_diag::{Category, Diagnostic};
use weka_types::{
    primitive_conversion_rank, ConversionRank, DefnId, ExprId, Primitive, Type,
};

use crate::analyzer::{AnalyzerBase, ExprAnalyzer};
use crate::assign::ParameterAssignments;
use crate::builtins::well_known;
use crate::candidate::{CallCandidate, CandidateState, CandidateTarget};
use crate::defn::{
    Defn, DefnKind, DefnTraits, Dispatch, StorageClass, Task, VariableInfo, Visibility,
};
use crate::expr::{CallExpr, CallKind, CastKind, Expr, ExprKind};
use crate::trace::ResolveAction;

/// A definition found by name lookup, with the base expression needed to
/// access it.
#[derive(Debug, Clone, Copy)]
struct NameRef {
    defn: DefnId,
    base: Option<ExprId>,
}

/// Best-effort rendering of a callable AST for diagnostics.
fn callable_name(ast: &Ast) -> String {
    match &ast.node {
        AstKind::Ident(name) => name.clone(),
        AstKind::Member { base, name } => format!("{}.{name}", callable_name(base)),
        AstKind::Specialize { base, .. } => callable_name(base),
        AstKind::Super => "super".to_string(),
        _ => "<expression>".to_string(),
    }
}

impl<'a> ExprAnalyzer<'a> {
    // -----------------------------------------------------------------
    // Expression reduction
    // -----------------------------------------------------------------

    /// Reduce an untyped AST node to typed IR under an optional expected
    /// type. The expected type may contain pattern variables or call
    /// constraints; that is what enables bidirectional inference.
    pub fn reduce_expr(&mut self, ast: &Ast, expected: Option<&Type>) -> ExprId {
        let span = ast.span;
        match &ast.node {
            AstKind::Lit(lit) => self.reduce_literal(lit, span),
            AstKind::Ident(_) | AstKind::Member { .. } | AstKind::Specialize { .. } => {
                self.reduce_name_value(ast)
            }
            AstKind::Super => {
                self.report(
                    span,
                    Diagnostic::error(
                        Category::UndefinedName,
                        "'super' is only callable from instance methods",
                    ),
                );
                self.error_expr(span)
            }
            AstKind::Call { .. } => self.reduce_call(ast, expected),
            AstKind::GetElement { base, index } => self.reduce_element_ref(base, index, span),
            AstKind::ArrayLiteral(elems) => self.reduce_array_literal(elems, span, expected),
            AstKind::Tuple(elems) => {
                let ids: Vec<ExprId> = elems.iter().map(|e| self.reduce_expr(e, None)).collect();
                let tys: Vec<Type> =
                    ids.iter().map(|&e| self.module.expr(e).ty.clone()).collect();
                self.module
                    .add_expr(Expr::new(ExprKind::TupleCtor(ids), Type::Tuple(tys), span))
            }
        }
    }

    fn reduce_literal(&mut self, lit: &Lit, span: Span) -> ExprId {
        let expr = match lit {
            Lit::Int(v) => Expr::new(
                ExprKind::ConstInt(*v),
                Type::Primitive(Primitive::IntLit),
                span,
            ),
            Lit::Float(v) => Expr::new(
                ExprKind::ConstFloat(*v),
                Type::Primitive(Primitive::F64),
                span,
            ),
            Lit::Bool(v) => Expr::new(ExprKind::ConstBool(*v), Type::bool_type(), span),
            Lit::String(v) => Expr::new(
                ExprKind::ConstString(v.clone()),
                self.builtins.string_type.clone(),
                span,
            ),
            Lit::Char(v) => Expr::new(
                ExprKind::ConstChar(*v),
                Type::Primitive(Primitive::Char),
                span,
            ),
            Lit::Null => Expr::new(
                ExprKind::ConstNull,
                self.builtins.object_type.clone(),
                span,
            ),
        };
        self.module.add_expr(expr)
    }

    /// Reduce a name reference appearing in value position.
    fn reduce_name_value(&mut self, ast: &Ast) -> ExprId {
        let span = ast.span;
        let Ok(refs) = self.lookup_name(ast) else {
            // The base of the qualified name already failed; its
            // diagnostic covers this expression.
            return self.error_expr(span);
        };
        if refs.is_empty() {
            self.report(
                span,
                Diagnostic::error(
                    Category::UndefinedName,
                    format!("Undefined name '{}'", callable_name(ast)),
                ),
            );
            return self.error_expr(span);
        }
        if refs.len() > 1 {
            // Several non-overloadable definitions under one name.
            let all_functions = refs
                .iter()
                .all(|r| matches!(self.module.defn(r.defn).kind, DefnKind::Function(_)));
            if !all_functions {
                self.report(
                    span,
                    Diagnostic::error(
                        Category::AmbiguousName,
                        format!("Multiple definitions for '{}'", callable_name(ast)),
                    ),
                );
                return self.error_expr(span);
            }
        }

        let NameRef { defn, base } = refs[0];
        if !self.check_access(span, defn) {
            return self.error_expr(span);
        }
        if matches!(self.module.defn(defn).kind, DefnKind::Type(_)) {
            let type_args = self.specialize_args(ast);
            return self.type_name_expr(span, defn, type_args);
        }
        if matches!(
            self.module.defn(defn).kind,
            DefnKind::Module(_) | DefnKind::Namespace(_)
        ) {
            return self
                .module
                .add_expr(Expr::new(ExprKind::ScopeName(defn), Type::void(), span));
        }
        if !self.analyze_defn(defn, Task::TypeComparison) {
            return self.error_expr(span);
        }
        let ty = self.module.defn(defn).value_type().unwrap_or(Type::Bad);
        self.module
            .add_expr(Expr::new(ExprKind::LValue { base, value: defn }, ty, span))
    }

    /// A type reference in expression position.
    fn type_name_expr(&mut self, span: Span, defn: DefnId, type_args: Vec<Type>) -> ExprId {
        let inner = self.type_instance(defn, &type_args);
        self.module.add_expr(Expr::new(
            ExprKind::TypeName(inner.clone()),
            Type::TypeLiteral(Box::new(inner)),
            span,
        ))
    }

    /// The instance type a type definition denotes, with explicit
    /// template arguments substituted when given.
    fn type_instance(&self, defn: DefnId, type_args: &[Type]) -> Type {
        let d = self.module.defn(defn);
        let ty = d.type_info().map(|info| info.ty.clone()).unwrap_or(Type::Bad);
        match (&d.template, type_args.is_empty()) {
            (Some(template), false) if template.params.len() == type_args.len() => {
                let map = template
                    .params
                    .iter()
                    .zip(type_args)
                    .map(|(p, a)| (p.id, a.clone()))
                    .collect();
                crate::module::substitute_pattern_vars(&ty, &map)
            }
            _ => ty,
        }
    }

    fn reduce_element_ref(&mut self, base: &Ast, index: &Ast, span: Span) -> ExprId {
        let base_id = self.reduce_expr(base, None);
        let index_id = self.reduce_expr(index, None);
        let base_ty = self.module.expr(base_id).ty.clone();
        if base_ty.is_error() || self.module.expr(index_id).ty.is_error() {
            return self.error_expr(span);
        }
        let elem = match &base_ty {
            Type::Composite(c) if c.defn == self.builtins.array && c.args.len() == 1 => {
                c.args[0].clone()
            }
            Type::NativeArray(t, _) => (**t).clone(),
            Type::Tuple(elems) => match &self.module.expr(index_id).kind {
                ExprKind::ConstInt(i) if (0..elems.len() as i64).contains(i) => {
                    elems[*i as usize].clone()
                }
                _ => {
                    self.report(
                        span,
                        Diagnostic::error(
                            Category::DisallowedCast,
                            "tuple element access requires a constant in-range index",
                        ),
                    );
                    return self.error_expr(span);
                }
            },
            _ => {
                self.report(
                    span,
                    Diagnostic::error(
                        Category::DisallowedCast,
                        format!("type '{base_ty}' has no element access"),
                    ),
                );
                return self.error_expr(span);
            }
        };
        self.module.add_expr(Expr::new(
            ExprKind::ElementRef {
                base: base_id,
                index: index_id,
            },
            elem,
            span,
        ))
    }

    fn reduce_array_literal(
        &mut self,
        elems: &[Ast],
        span: Span,
        expected: Option<&Type>,
    ) -> ExprId {
        let expected_elem = match expected {
            Some(Type::Composite(c)) if c.defn == self.builtins.array && c.args.len() == 1 => {
                Some(c.args[0].clone())
            }
            _ => None,
        };
        let ids: Vec<ExprId> = elems
            .iter()
            .map(|e| self.reduce_expr(e, expected_elem.as_ref()))
            .collect();
        let elem_ty = match (&expected_elem, ids.first()) {
            (Some(ty), _) => ty.clone(),
            (None, Some(&first)) => self.module.expr(first).ty.clone(),
            (None, None) => {
                self.report(
                    span,
                    Diagnostic::error(
                        Category::InferenceFailure,
                        "cannot infer the element type of an empty array literal",
                    ),
                );
                return self.error_expr(span);
            }
        };
        let ty = self.builtins.array_of(self.module, elem_ty);
        self.module
            .add_expr(Expr::new(ExprKind::ArrayLiteral(ids), ty, span))
    }

    // -----------------------------------------------------------------
    // Name lookup
    // -----------------------------------------------------------------

    /// Resolve a name form to its definitions. `Err` means the name's
    /// base already failed and was diagnosed; the caller propagates the
    /// error sentinel silently.
    fn lookup_name(&mut self, ast: &Ast) -> Result<Vec<NameRef>, ()> {
        match &ast.node {
            AstKind::Ident(name) => Ok(self.lookup_ident(name)),
            AstKind::Member { base, name } => self.lookup_qualified(base, name),
            AstKind::Specialize { base, .. } => self.lookup_name(base),
            _ => Ok(Vec::new()),
        }
    }

    /// Walk the lexical scope chain; the innermost scope with any match
    /// shadows the rest.
    fn lookup_ident(&mut self, name: &str) -> Vec<NameRef> {
        let mut scope = Some(self.scope);
        while let Some(s) = scope {
            let mut out = Vec::new();
            self.module.lookup_member(s, name, &mut out, true);
            if !out.is_empty() {
                let base = self.module.scope(self.module.storage_scope(s)).base_expr;
                return out.into_iter().map(|defn| NameRef { defn, base }).collect();
            }
            scope = self.module.scope(s).parent;
        }
        Vec::new()
    }

    fn lookup_qualified(&mut self, base_ast: &Ast, name: &str) -> Result<Vec<NameRef>, ()> {
        let base = self.reduce_expr(base_ast, None);
        if self.module.expr(base).is_error() {
            return Err(());
        }
        let mut out = Vec::new();
        let refs = match self.module.expr(base).kind.clone() {
            // Static access through a type name.
            ExprKind::TypeName(Type::Composite(c)) => {
                if let Some(info) = self.module.defn(c.defn).composite_info() {
                    let members = info.members;
                    self.module.lookup_member(members, name, &mut out, true);
                }
                out.into_iter()
                    .map(|defn| NameRef { defn, base: None })
                    .collect()
            }
            // Qualified access through a module or namespace.
            ExprKind::ScopeName(defn) => {
                if let Some(scope) = self.module.defn(defn).member_scope() {
                    self.module.lookup_member(scope, name, &mut out, false);
                }
                out.into_iter()
                    .map(|defn| NameRef { defn, base: None })
                    .collect()
            }
            // Instance member access through a value.
            _ => {
                let base_ty = self.module.expr(base).ty.clone();
                if let Type::Composite(c) = &base_ty {
                    self.analyze_defn(c.defn, Task::MemberLookup);
                    if let Some(info) = self.module.defn(c.defn).composite_info() {
                        let members = info.members;
                        self.module.lookup_member(members, name, &mut out, true);
                    }
                }
                out.into_iter()
                    .map(|defn| NameRef {
                        defn,
                        base: Some(base),
                    })
                    .collect()
            }
        };
        Ok(refs)
    }

    /// Explicit template arguments of a `Specialize` node, resolved.
    fn specialize_args(&mut self, ast: &Ast) -> Vec<Type> {
        match &ast.node {
            AstKind::Specialize { type_args, .. } => {
                let annotations = type_args.clone();
                annotations
                    .iter()
                    .map(|ann| self.resolve_annotation(ann))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Resolve a syntactic type annotation to a semantic type.
    pub fn resolve_annotation(&mut self, ann: &TypeAnnotation) -> Type {
        match ann {
            TypeAnnotation::Named(path) => self.resolve_named_type(path, &[]),
            TypeAnnotation::Applied { base, args } => {
                let resolved: Vec<Type> =
                    args.iter().map(|a| self.resolve_annotation(a)).collect();
                self.resolve_named_type(base, &resolved)
            }
            TypeAnnotation::Union(members) => Type::Union(weka_types::UnionType::new(
                members.iter().map(|m| self.resolve_annotation(m)).collect(),
            )),
            TypeAnnotation::Tuple(elems) => {
                Type::Tuple(elems.iter().map(|e| self.resolve_annotation(e)).collect())
            }
        }
    }

    fn resolve_named_type(&mut self, path: &[String], args: &[Type]) -> Type {
        if let [single] = path {
            if let Some(p) = primitive_by_name(single) {
                return Type::Primitive(p);
            }
        }

        // Walk the path: every prefix segment must be scope-like.
        let mut refs = self.lookup_ident(&path[0]);
        for segment in &path[1..] {
            let Some(scope) = refs
                .first()
                .and_then(|r| self.module.defn(r.defn).member_scope())
            else {
                refs.clear();
                break;
            };
            let mut out = Vec::new();
            self.module.lookup_member(scope, segment, &mut out, false);
            refs = out
                .into_iter()
                .map(|defn| NameRef { defn, base: None })
                .collect();
        }

        let type_defn = refs
            .iter()
            .find(|r| matches!(self.module.defn(r.defn).kind, DefnKind::Type(_)));
        match type_defn {
            Some(r) => self.type_instance(r.defn, args),
            None => Type::Bad,
        }
    }

    // -----------------------------------------------------------------
    // Call reduction
    // -----------------------------------------------------------------

    /// Reduce an AST call form to a typed call expression.
    pub fn reduce_call(&mut self, ast: &Ast, expected: Option<&Type>) -> ExprId {
        let span = ast.span;
        let AstKind::Call { func, args } = &ast.node else {
            self.reporter.fatal("reduce_call on a non-call node");
        };
        match &func.node {
            AstKind::Ident(_) | AstKind::Member { .. } | AstKind::Specialize { .. } => {
                self.call_name(span, func, args, expected)
            }
            AstKind::Super => self.call_super(span, args, expected),
            _ => {
                let callee = self.reduce_expr(func, None);
                self.call_value(span, callee, args, expected)
            }
        }
    }

    /// Construct a call through a named callable.
    fn call_name(
        &mut self,
        span: Span,
        callable: &Ast,
        args: &[Argument],
        expected: Option<&Type>,
    ) -> ExprId {
        let is_unqualified = matches!(&callable.node, AstKind::Ident(_));
        let Ok(refs) = self.lookup_name(callable) else {
            return self.error_expr(span);
        };

        // A miss on a qualified search is final; an unqualified call can
        // still be completed by argument-dependent lookup.
        if refs.is_empty() && !is_unqualified {
            self.report(
                span,
                Diagnostic::error(
                    Category::UndefinedName,
                    format!("Undefined method '{}'", callable_name(callable)),
                ),
            );
            return self.error_expr(span);
        }

        // A name denoting a type is a constructor call.
        let type_defns: Vec<DefnId> = refs
            .iter()
            .filter(|r| matches!(self.module.defn(r.defn).kind, DefnKind::Type(_)))
            .map(|r| r.defn)
            .collect();
        if !type_defns.is_empty() {
            if type_defns.len() > 1 {
                self.report(
                    span,
                    Diagnostic::error(
                        Category::AmbiguousName,
                        format!("Multiple definitions for '{}'", callable_name(callable)),
                    ),
                );
                return self.error_expr(span);
            }
            let type_args = self.specialize_args(callable);
            return self.call_constructor(span, type_defns[0], type_args, args);
        }

        let call = self.new_call_expr(span, CallKind::Normal, expected.cloned());
        let mut success = true;
        for r in &refs {
            match &self.module.defn(r.defn).kind {
                DefnKind::Function(_) => {
                    success &= self.add_overload(call, r.base, r.defn, args);
                }
                DefnKind::Var(_) | DefnKind::Let(_) | DefnKind::Parameter(_) => {
                    if !self.analyze_defn(r.defn, Task::TypeComparison) {
                        success = false;
                        continue;
                    }
                    let value_ty = self.module.defn(r.defn).value_type();
                    match value_ty {
                        Some(Type::Function(ft)) | Some(Type::BoundMethod(ft)) => {
                            let fn_value = self.module.add_expr(Expr::new(
                                ExprKind::LValue {
                                    base: r.base,
                                    value: r.defn,
                                },
                                Type::Function(ft.clone()),
                                span,
                            ));
                            success &= self.add_overload_fn_value(call, fn_value, &ft, args);
                        }
                        _ => {
                            self.report(
                                span,
                                Diagnostic::error(
                                    Category::NoViableOverload,
                                    format!(
                                        "'{}' is not callable",
                                        self.module.defn(r.defn).name
                                    ),
                                ),
                            );
                            success = false;
                        }
                    }
                }
                _ => {
                    self.report(
                        span,
                        Diagnostic::error(
                            Category::NoViableOverload,
                            format!("'{}' is not callable", self.module.defn(r.defn).name),
                        ),
                    );
                    success = false;
                }
            }
        }

        if !self.reduce_arg_list(args, call) {
            return self.error_expr(span);
        }

        // Unqualified calls also consult the scopes of the argument
        // types. Runs once; its candidates join the same resolution.
        if is_unqualified && !args.is_empty() {
            if let AstKind::Ident(name) = &callable.node {
                let name = name.clone();
                self.lookup_by_arg_type(call, &name, args);
            }
        }

        if !success {
            return self.error_expr(span);
        }

        let candidate_count = match &self.module.expr(call).kind {
            ExprKind::Call(c) => c.candidates.len(),
            _ => 0,
        };
        if candidate_count == 0 {
            if refs.is_empty() {
                self.report(
                    span,
                    Diagnostic::error(
                        Category::UndefinedName,
                        format!("Undefined method '{}'", callable_name(callable)),
                    ),
                );
            } else {
                let mut diag = Diagnostic::error(
                    Category::NoViableOverload,
                    format!(
                        "No matching method for call to {}{}",
                        callable_name(callable),
                        self.call_signature(call, expected)
                    ),
                );
                for r in &refs {
                    diag = diag.with_label(
                        Some(AnalyzerBase::loc(self.module.defn(r.defn).span)),
                        format!("candidate: {}", self.module.defn(r.defn).qualified_name),
                    );
                }
                self.report(span, diag);
            }
            return self.error_expr(span);
        }

        self.resolve_overloads(call);
        call
    }

    /// Construct a call through an already-reduced callee value.
    fn call_value(
        &mut self,
        span: Span,
        callee: ExprId,
        args: &[Argument],
        expected: Option<&Type>,
    ) -> ExprId {
        if self.module.expr(callee).is_error() {
            return callee;
        }
        // A type literal in call position is a constructor call.
        if let ExprKind::TypeName(inner) = &self.module.expr(callee).kind {
            if let Type::Composite(c) = inner {
                let (defn, type_args) = (c.defn, c.args.clone());
                return self.call_constructor(span, defn, type_args, args);
            }
        }

        let callee_ty = self.module.expr(callee).ty.clone();
        match callee_ty {
            Type::Function(ft) | Type::BoundMethod(ft) => {
                let call = self.new_call_expr(span, CallKind::Normal, expected.cloned());
                if !self.add_overload_fn_value(call, callee, &ft, args) {
                    return self.error_expr(span);
                }
                if !self.reduce_arg_list(args, call) {
                    return self.error_expr(span);
                }
                self.resolve_overloads(call);
                call
            }
            _ => {
                self.report(
                    span,
                    Diagnostic::error(
                        Category::NoViableOverload,
                        format!("expression of type '{callee_ty}' is not callable"),
                    ),
                );
                self.error_expr(span)
            }
        }
    }

    /// `super(args)`: call the enclosing class's supertype method of the
    /// same name, with the upcast receiver as base.
    fn call_super(&mut self, span: Span, args: &[Argument], expected: Option<&Type>) -> ExprId {
        let Some(function) = self.current_function else {
            self.report(
                span,
                Diagnostic::error(
                    Category::UndefinedName,
                    "'super' is only callable from instance methods",
                ),
            );
            return self.error_expr(span);
        };
        if self.module.defn(function).storage != StorageClass::Instance {
            self.report(
                span,
                Diagnostic::error(
                    Category::UndefinedName,
                    "'super' is only callable from instance methods",
                ),
            );
            return self.error_expr(span);
        }

        let enclosing = self
            .module
            .defn(function)
            .defining_scope
            .and_then(|s| self.module.scope(s).owner);
        let Some(class_defn) = enclosing else {
            self.report(
                span,
                Diagnostic::error(
                    Category::SubclassRequired,
                    "'super' requires an enclosing class",
                ),
            );
            return self.error_expr(span);
        };

        let class_ty = match self.module.defn(class_defn).type_info() {
            Some(info) => info.ty.clone(),
            None => Type::Bad,
        };
        let Type::Composite(class_ref) = &class_ty else {
            return self.error_expr(span);
        };
        let supers = self.module.super_instances(class_ref);
        let Some(super_ref) = supers.first().cloned() else {
            self.report(
                span,
                Diagnostic::error(
                    Category::SubclassRequired,
                    format!("class '{}' has no super class", class_ref.name),
                ),
            );
            return self.error_expr(span);
        };
        let super_ty = Type::Composite(super_ref.clone());

        let name = self.module.defn(function).name.clone();
        let mut methods = Vec::new();
        if let Some(info) = self.module.defn(super_ref.defn).composite_info() {
            let members = info.members;
            self.module.lookup_member(members, &name, &mut methods, true);
        }
        if methods.is_empty() {
            self.report(
                span,
                Diagnostic::error(
                    Category::UndefinedName,
                    format!(
                        "superclass method '{name}' not found in class '{}'",
                        class_ref.name
                    ),
                ),
            );
            return self.error_expr(span);
        }

        // The receiver: the current function's self, upcast to the
        // supertype.
        let self_defn = self.module.add_defn(Defn::new(
            "self",
            StorageClass::Local,
            DefnKind::Parameter(VariableInfo {
                ty: class_ty.clone(),
                init: None,
            }),
        ));
        let self_expr = self.module.add_expr(Expr::new(
            ExprKind::LValue {
                base: None,
                value: self_defn,
            },
            class_ty.clone(),
            span,
        ));
        let receiver = self.coerce(self_expr, &super_ty);

        let call = self.new_call_expr(span, CallKind::Exact, expected.cloned());
        for method in methods {
            if matches!(self.module.defn(method).kind, DefnKind::Function(_)) {
                self.add_overload(call, Some(receiver), method, args);
            }
        }
        if !self.reduce_arg_list(args, call) {
            return self.error_expr(span);
        }
        self.resolve_overloads(call);
        call
    }

    /// Constructor selection for `T(args...)`.
    ///
    /// `construct` members win over `create` static factories; inherited
    /// `construct` is the last resort.
    pub fn call_constructor(
        &mut self,
        span: Span,
        type_defn: DefnId,
        type_args: Vec<Type>,
        args: &[Argument],
    ) -> ExprId {
        if !self.check_access(span, type_defn) {
            return self.error_expr(span);
        }
        if !self.analyze_defn(type_defn, Task::Construction) {
            return self.error_expr(span);
        }
        let Some(info) = self.module.defn(type_defn).composite_info() else {
            self.report(
                span,
                Diagnostic::error(
                    Category::NotConstructable,
                    format!(
                        "type '{}' is not constructable",
                        self.module.defn(type_defn).name
                    ),
                ),
            );
            return self.error_expr(span);
        };
        let members = info.members;

        let ty = self.type_instance(type_defn, &type_args);
        let call = self.new_call_expr(span, CallKind::Construct, Some(ty.clone()));

        let mut methods = Vec::new();
        let mut use_new = true;
        self.module
            .lookup_member(members, well_known::CONSTRUCT, &mut methods, false);
        if methods.is_empty() {
            self.module
                .lookup_member(members, well_known::CREATE, &mut methods, false);
            use_new = false;
        }
        if methods.is_empty() {
            self.module
                .lookup_member(members, well_known::CONSTRUCT, &mut methods, true);
            use_new = true;
        }
        if methods.is_empty() {
            self.report(
                span,
                Diagnostic::error(
                    Category::NoConstructor,
                    format!(
                        "No constructors found for type '{}'",
                        self.module.defn(type_defn).name
                    ),
                ),
            );
            return self.error_expr(span);
        }

        let new_expr = if use_new {
            Some(
                self.module
                    .add_expr(Expr::new(ExprKind::New, ty.clone(), span)),
            )
        } else {
            None
        };
        for method in methods.clone() {
            if use_new {
                self.module.defn_mut(method).traits.insert(DefnTraits::CTOR);
                self.add_overload(call, new_expr, method, args);
            } else if self.module.defn(method).storage == StorageClass::Static {
                self.add_overload(call, None, method, args);
            }
        }
        if !type_args.is_empty() {
            self.seed_template_args(call, type_defn, &type_args);
        }

        let has_candidates = match &self.module.expr(call).kind {
            ExprKind::Call(c) => c.has_any_candidates(),
            _ => false,
        };
        if !has_candidates {
            let mut diag = Diagnostic::error(
                Category::NoConstructor,
                format!(
                    "No constructor of '{}' matches the arguments",
                    self.module.defn(type_defn).name
                ),
            );
            for method in &methods {
                diag = diag.with_label(
                    Some(AnalyzerBase::loc(self.module.defn(*method).span)),
                    format!("candidate: {}", self.module.defn(*method).qualified_name),
                );
            }
            self.report(span, diag);
            return self.error_expr(span);
        }

        if !self.reduce_arg_list(args, call) {
            return self.error_expr(span);
        }
        self.resolve_overloads(call);
        call
    }

    /// Install explicit template arguments into every candidate's
    /// environment.
    fn seed_template_args(&mut self, call: ExprId, type_defn: DefnId, type_args: &[Type]) {
        let Some(template) = self.module.defn(type_defn).template.clone() else {
            return;
        };
        if let ExprKind::Call(c) = &mut self.module.expr_mut(call).kind {
            for candidate in &mut c.candidates {
                for (param, arg) in template.params.iter().zip(type_args) {
                    candidate
                        .env
                        .add_substitution(Type::PatternVar(param.clone()), arg.clone());
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Overload admission
    // -----------------------------------------------------------------

    fn new_call_expr(&mut self, span: Span, kind: CallKind, expected: Option<Type>) -> ExprId {
        let id = self.module.add_expr(Expr::new(
            ExprKind::Call(CallExpr::new(kind, expected)),
            Type::Bad,
            span,
        ));
        self.module.expr_mut(id).ty = Type::ResultOf(id);
        id
    }

    /// Admit a function definition as a candidate. Assignment failure
    /// rejects the overload silently; a diagnostic emerges only when
    /// every overload fails.
    fn add_overload(
        &mut self,
        call: ExprId,
        base: Option<ExprId>,
        method: DefnId,
        args: &[Argument],
    ) -> bool {
        if !self.analyze_defn(method, Task::Conversion) {
            return false;
        }
        let Some(ft) = self.module.defn(method).function_info().map(|f| f.ty.clone()) else {
            return false;
        };
        if let Ok(assignments) = ParameterAssignments::from_ast(&ft, args) {
            let mut candidate =
                CallCandidate::new(base, CandidateTarget::Method(method), assignments);
            if self.module.defn(method).is_ctor() {
                candidate = candidate.ctor();
            }
            let description = candidate.describe(self.module);
            self.push_candidate(call, candidate);
            self.record_resolve(ResolveAction::Add, description, "");
        }
        true
    }

    /// Admit a function-typed value as a candidate.
    fn add_overload_fn_value(
        &mut self,
        call: ExprId,
        fn_value: ExprId,
        ft: &weka_types::FunctionType,
        args: &[Argument],
    ) -> bool {
        if let Ok(assignments) = ParameterAssignments::from_ast(ft, args) {
            let candidate = CallCandidate::new(
                Some(fn_value),
                CandidateTarget::FnType(Box::new(ft.clone())),
                assignments,
            );
            let description = candidate.describe(self.module);
            self.push_candidate(call, candidate);
            self.record_resolve(ResolveAction::Add, description, "");
        }
        true
    }

    /// Admit a candidate for a call whose arguments are already reduced
    /// IR (coercive casts).
    fn add_overload_reduced(
        &mut self,
        call: ExprId,
        base: Option<ExprId>,
        method: DefnId,
        arg_count: usize,
    ) -> bool {
        if !self.analyze_defn(method, Task::Conversion) {
            return false;
        }
        let Some(ft) = self.module.defn(method).function_info().map(|f| f.ty.clone()) else {
            return false;
        };
        if let Ok(assignments) = ParameterAssignments::positional(&ft, arg_count) {
            let candidate = CallCandidate::new(base, CandidateTarget::Method(method), assignments);
            let description = candidate.describe(self.module);
            self.push_candidate(call, candidate);
            self.record_resolve(ResolveAction::Add, description, "");
        }
        true
    }

    fn push_candidate(&mut self, call: ExprId, candidate: CallCandidate) {
        if let ExprKind::Call(c) = &mut self.module.expr_mut(call).kind {
            c.candidates.push(candidate);
        }
    }

    // -----------------------------------------------------------------
    // Argument reduction
    // -----------------------------------------------------------------

    /// Reduce the AST argument list under per-argument expected types.
    fn reduce_arg_list(&mut self, args: &[Argument], call: ExprId) -> bool {
        for (index, arg) in args.iter().enumerate() {
            let expected = self.mapped_param_type(call, index);
            let reduced = self.reduce_expr(&arg.value, Some(&expected));
            if self.module.expr(reduced).is_error() {
                return false;
            }
            if let ExprKind::Call(c) = &mut self.module.expr_mut(call).kind {
                c.args.push(reduced);
            }
        }
        true
    }

    /// The expected type for argument `index`: the agreed parameter type
    /// across surviving candidates, or a fresh constraint standing in
    /// until the candidate set collapses.
    fn mapped_param_type(&self, call: ExprId, index: usize) -> Type {
        self.singular_param_type(call, index)
            .unwrap_or(Type::ParameterOf(call, index))
    }

    fn singular_param_type(&self, call: ExprId, index: usize) -> Option<Type> {
        let ExprKind::Call(c) = &self.module.expr(call).kind else {
            return None;
        };
        let mut single: Option<Type> = None;
        for candidate in c.candidates.iter().filter(|c| !c.is_culled()) {
            let ty = candidate.param_type(self.module, index)?;
            match &single {
                None => single = Some(ty),
                Some(prev) if *prev == ty => {}
                Some(_) => return None,
            }
        }
        single
    }

    fn singular_result_type(&self, call: ExprId) -> Option<Type> {
        let ExprKind::Call(c) = &self.module.expr(call).kind else {
            return None;
        };
        let mut single: Option<Type> = None;
        for candidate in c.candidates.iter().filter(|c| !c.is_culled()) {
            let ty = candidate.result_type(self.module);
            match &single {
                None => single = Some(ty),
                Some(prev) if *prev == ty => {}
                Some(_) => return None,
            }
        }
        single
    }

    /// The call's result type before resolution: the agreed result, or a
    /// constraint that resolves once the candidate set collapses.
    pub fn reduce_return_type(&mut self, call: ExprId) -> Type {
        self.singular_result_type(call)
            .unwrap_or(Type::ResultOf(call))
    }

    /// Render `f(argtypes...) -> expected` for diagnostics.
    fn call_signature(&self, call: ExprId, expected: Option<&Type>) -> String {
        use std::fmt::Write;

        let mut out = String::from("(");
        if let ExprKind::Call(c) = &self.module.expr(call).kind {
            for (i, &arg) in c.args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}", self.module.expr(arg).ty);
            }
        }
        out.push(')');
        if let Some(expected) = expected {
            let _ = write!(out, " -> {expected}");
        }
        out
    }

    // -----------------------------------------------------------------
    // Argument-dependent lookup
    // -----------------------------------------------------------------

    /// Add static/global functions named `name` found in the defining
    /// scopes of the argument types. Runs once per call.
    fn lookup_by_arg_type(&mut self, call: ExprId, name: &str, args: &[Argument]) {
        let arg_ids: Vec<ExprId> = match &self.module.expr(call).kind {
            ExprKind::Call(c) => c.args.clone(),
            _ => return,
        };

        let mut types_searched: Vec<DefnId> = Vec::new();
        let mut found: Vec<DefnId> = Vec::new();
        for &arg in &arg_ids {
            let ty = self.module.expr(arg).ty.clone();
            if !ty.is_singular() {
                continue;
            }
            if let Type::Composite(c) = &ty {
                if types_searched.contains(&c.defn) {
                    continue;
                }
                types_searched.push(c.defn);
                self.analyze_defn(c.defn, Task::MemberLookup);
                if let Some(scope) = self.module.defn(c.defn).defining_scope {
                    self.module.lookup_member(scope, name, &mut found, true);
                }
            }
        }

        let existing: Vec<DefnId> = match &self.module.expr(call).kind {
            ExprKind::Call(c) => c.candidates.iter().filter_map(|c| c.method()).collect(),
            _ => Vec::new(),
        };
        let additions: Vec<DefnId> = found
            .into_iter()
            .filter(|&defn| {
                let d = self.module.defn(defn);
                matches!(d.kind, DefnKind::Function(_))
                    && matches!(d.storage, StorageClass::Static | StorageClass::Global)
                    && !existing.contains(&defn)
            })
            .collect();
        for defn in additions {
            self.add_overload(call, None, defn, args);
        }
    }

    // -----------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------

    /// Cull candidates until a single winner remains and set the call's
    /// type. Emits the no-viable / ambiguity / inference diagnostics.
    pub fn resolve_overloads(&mut self, call: ExprId) {
        self.resolve_overloads_inner(call, false);
    }

    fn resolve_overloads_inner(&mut self, call: ExprId, quiet: bool) {
        let span = self.module.expr(call).span;
        let (mut candidates, arg_ids) = match &mut self.module.expr_mut(call).kind {
            ExprKind::Call(c) => (std::mem::take(&mut c.candidates), c.args.clone()),
            _ => return,
        };
        let arg_types: Vec<Type> = arg_ids
            .iter()
            .map(|&a| self.module.expr(a).ty.clone())
            .collect();

        // Cancellation: drop in-flight candidates and their
        // substitutions.
        if self.reporter.should_abort() {
            for candidate in &mut candidates {
                candidate.cull();
            }
            self.finish_call(call, candidates, Type::Bad);
            return;
        }

        // Per-argument unification: parameter patterns against argument
        // values, contravariantly.
        for candidate in &mut candidates {
            if candidate.is_culled() {
                continue;
            }
            if !candidate.unify_args(self.module, &arg_types) {
                let description = candidate.describe(self.module);
                self.record_resolve(ResolveAction::CullUnify, description, "");
            }
        }

        // Conversion ranking.
        for candidate in &mut candidates {
            if candidate.is_culled() {
                continue;
            }
            if !candidate.update_ranks(self.module, &arg_types) {
                let description = candidate.describe(self.module);
                self.record_resolve(ResolveAction::CullRank, description, "");
            }
        }

        // Pairwise domination by conversion rank.
        let n = candidates.len();
        let mut dominated = vec![false; n];
        for i in 0..n {
            for j in 0..n {
                if i == j
                    || candidates[i].is_culled()
                    || candidates[j].is_culled()
                    || dominated[i]
                    || dominated[j]
                {
                    continue;
                }
                if candidates[i].dominates(&candidates[j]) {
                    dominated[j] = true;
                }
            }
        }
        // Specificity tie-break among rank-equal survivors.
        for i in 0..n {
            for j in 0..n {
                if i == j
                    || candidates[i].is_culled()
                    || candidates[j].is_culled()
                    || dominated[i]
                    || dominated[j]
                {
                    continue;
                }
                if candidates[i].is_more_specific(self.module, &candidates[j], arg_types.len()) {
                    dominated[j] = true;
                }
            }
        }
        for (j, flag) in dominated.iter().enumerate() {
            if *flag {
                candidates[j].cull();
                let description = candidates[j].describe(self.module);
                self.record_resolve(ResolveAction::CullDominated, description, "");
            }
        }

        let live: Vec<usize> = (0..n).filter(|&i| !candidates[i].is_culled()).collect();
        let result_ty = match live.as_slice() {
            [] => {
                if !quiet && !candidates.is_empty() {
                    let mut diag = Diagnostic::error(
                        Category::NoViableOverload,
                        format!(
                            "No matching overload for call{}",
                            self.call_signature_of(&arg_types)
                        ),
                    );
                    for candidate in &candidates {
                        diag = diag.with_label(
                            None,
                            format!("candidate: {}", candidate.describe(self.module)),
                        );
                    }
                    self.report(span, diag);
                }
                Type::Bad
            }
            [index] => {
                let ty = candidates[*index].result_type(self.module);
                if ty.is_singular() {
                    candidates[*index].state = CandidateState::Winner;
                    let description = candidates[*index].describe(self.module);
                    self.record_resolve(ResolveAction::Winner, description, "");
                    ty
                } else {
                    // An unresolved pattern variable at commit point.
                    if !quiet {
                        self.report(
                            span,
                            Diagnostic::error(
                                Category::InferenceFailure,
                                format!("cannot infer template arguments; result type is '{ty}'"),
                            ),
                        );
                    }
                    candidates[*index].cull();
                    Type::Bad
                }
            }
            _ => {
                // Several undominated candidates. When they are
                // indistinguishable the first is chosen
                // deterministically; otherwise the call is ambiguous.
                let identical = live.windows(2).all(|pair| {
                    let (a, b) = (&candidates[pair[0]], &candidates[pair[1]]);
                    a.result_type(self.module) == b.result_type(self.module)
                        && (0..arg_types.len()).all(|i| {
                            a.param_type(self.module, i) == b.param_type(self.module, i)
                        })
                });
                if identical {
                    let winner = live[0];
                    for &index in &live[1..] {
                        candidates[index].cull();
                    }
                    candidates[winner].state = CandidateState::Winner;
                    let description = candidates[winner].describe(self.module);
                    self.record_resolve(ResolveAction::Winner, description, "duplicate set");
                    candidates[winner].result_type(self.module)
                } else {
                    if !quiet {
                        let mut diag = Diagnostic::error(
                            Category::AmbiguousOverload,
                            format!(
                                "Ambiguous call{}; candidates are:",
                                self.call_signature_of(&arg_types)
                            ),
                        );
                        for &index in &live {
                            diag = diag.with_label(
                                None,
                                format!(
                                    "candidate: {}",
                                    candidates[index].describe(self.module)
                                ),
                            );
                        }
                        self.report(span, diag);
                    }
                    for &index in &live {
                        let description = candidates[index].describe(self.module);
                        self.record_resolve(ResolveAction::Ambiguous, description, "");
                    }
                    Type::Bad
                }
            }
        };
        self.finish_call(call, candidates, result_ty);
    }

    fn call_signature_of(&self, arg_types: &[Type]) -> String {
        use std::fmt::Write;

        let mut out = String::from("(");
        for (i, ty) in arg_types.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{ty}");
        }
        out.push(')');
        out
    }

    fn finish_call(&mut self, call: ExprId, candidates: Vec<CallCandidate>, ty: Type) {
        let expr = self.module.expr_mut(call);
        if let ExprKind::Call(c) = &mut expr.kind {
            c.candidates = candidates;
        }
        expr.ty = ty;
    }

    // -----------------------------------------------------------------
    // Coercive casts and conversions
    // -----------------------------------------------------------------

    /// Try an implicit user conversion into `to` through its coercers.
    /// Returns `None` when the target has no coercers or none applies;
    /// no diagnostics are emitted either way.
    pub fn try_coercive_cast(&mut self, input: ExprId, to: &Type) -> Option<ExprId> {
        let Type::Composite(ct) = to else {
            return None;
        };
        let coercers = self.module.defn(ct.defn).composite_info()?.coercers.clone();
        if coercers.is_empty() {
            return None;
        }
        if !self.analyze_defn(ct.defn, Task::Conversion) {
            return None;
        }

        let span = self.module.expr(input).span;
        let call = self.new_call_expr(span, CallKind::Normal, Some(to.clone()));
        if let ExprKind::Call(c) = &mut self.module.expr_mut(call).kind {
            c.args.push(input);
        }
        for coercer in coercers {
            self.add_overload_reduced(call, None, coercer, 1);
        }
        let has_candidates = match &self.module.expr(call).kind {
            ExprKind::Call(c) => c.has_any_candidates(),
            _ => false,
        };
        if !has_candidates {
            return None;
        }
        self.resolve_overloads_inner(call, true);
        match &self.module.expr(call).kind {
            ExprKind::Call(c) if c.singular_candidate().is_some() => Some(call),
            _ => None,
        }
    }

    /// Convert `expr` to `to`, inserting the appropriate cast node.
    ///
    /// An upcast to the same type is the identity (no IR change). A
    /// conversion with no legal path reports one diagnostic and yields
    /// the error sentinel.
    pub fn coerce(&mut self, expr: ExprId, to: &Type) -> ExprId {
        let from = self.module.expr(expr).ty.clone();
        let span = self.module.expr(expr).span;
        if from == *to || from.is_error() || to.is_error() {
            return expr;
        }

        match (&from, to) {
            (Type::Primitive(f), Type::Primitive(t)) => {
                let rank = primitive_conversion_rank(*f, *t);
                if rank < ConversionRank::PrecisionLoss {
                    return self.disallowed_cast(span, &from, to);
                }
                let cast = if f.is_literal() {
                    CastKind::Implicit
                } else if f.is_integer() && t.is_integer() {
                    if f.is_signed() {
                        CastKind::SignExtend
                    } else {
                        CastKind::ZeroExtend
                    }
                } else if f.is_integer() && t.is_float() {
                    CastKind::IntToFloat
                } else {
                    CastKind::Implicit
                };
                self.module
                    .add_expr(Expr::new(ExprKind::Cast { cast, arg: expr }, to.clone(), span))
            }
            (_, Type::Union(u)) => {
                let direct = u.type_index_of(&from).is_some();
                let arg = if direct {
                    expr
                } else {
                    // Convert into the best member first.
                    let member = u
                        .members
                        .iter()
                        .max_by_key(|member| self.module.conversion_rank(&from, member))
                        .cloned();
                    match member {
                        Some(member)
                            if self
                                .module
                                .conversion_rank(&from, &member)
                                .is_compatible() =>
                        {
                            self.coerce(expr, &member)
                        }
                        _ => return self.disallowed_cast(span, &from, to),
                    }
                };
                if self.module.expr(arg).is_error() {
                    return arg;
                }
                self.module.add_expr(Expr::new(
                    ExprKind::Cast {
                        cast: CastKind::UnionCtor,
                        arg,
                    },
                    to.clone(),
                    span,
                ))
            }
            (Type::Composite(_), Type::Composite(_)) if self.module.is_subtype(&from, to) => {
                self.module.add_expr(Expr::new(
                    ExprKind::Cast {
                        cast: CastKind::UpCast,
                        arg: expr,
                    },
                    to.clone(),
                    span,
                ))
            }
            (_, Type::Composite(_)) => match self.try_coercive_cast(expr, to) {
                Some(call) => call,
                None => self.disallowed_cast(span, &from, to),
            },
            _ => self.disallowed_cast(span, &from, to),
        }
    }

    fn disallowed_cast(&mut self, span: Span, from: &Type, to: &Type) -> ExprId {
        self.report(
            span,
            Diagnostic::error(
                Category::DisallowedCast,
                format!("no conversion from '{from}' to '{to}'"),
            ),
        );
        self.error_expr(span)
    }

    /// Extract a member value from a union-typed expression.
    ///
    /// The tagged-union path applies when the union carries value-type
    /// members; `checked` adds a runtime tag test.
    pub fn cast_union_member(&mut self, input: ExprId, to: &Type, checked: bool) -> ExprId {
        let from = self.module.expr(input).ty.clone();
        let span = self.module.expr(input).span;
        let Type::Union(u) = &from else {
            return self.disallowed_cast(span, &from, to);
        };
        if u.type_index_of(to).is_none() {
            self.report(
                span,
                Diagnostic::error(
                    Category::DisallowedCast,
                    format!("'{to}' is not a member of '{from}'"),
                ),
            );
            return self.error_expr(span);
        }
        let cast = if checked {
            CastKind::CheckedUnionMember
        } else {
            CastKind::UnionMember
        };
        self.module
            .add_expr(Expr::new(ExprKind::Cast { cast, arg: input }, to.clone(), span))
    }

    /// Build a runtime subtype test. A union test against a type that is
    /// not a member folds to compile-time `false`.
    pub fn instance_of(&mut self, value: ExprId, test: &Type) -> ExprId {
        let ty = self.module.expr(value).ty.clone();
        let span = self.module.expr(value).span;
        if let Type::Union(u) = &ty {
            if u.type_index_of(test).is_none() {
                return self
                    .module
                    .add_expr(Expr::new(ExprKind::ConstBool(false), Type::bool_type(), span));
            }
        }
        self.module.add_expr(Expr::new(
            ExprKind::InstanceOf {
                value,
                test: test.clone(),
            },
            Type::bool_type(),
            span,
        ))
    }

    /// Build a comparison. The operands are brought to a common type;
    /// the result type is always bool.
    pub fn build_compare(
        &mut self,
        pred: crate::expr::ComparePred,
        lhs: ExprId,
        rhs: ExprId,
    ) -> ExprId {
        let span = self.module.expr(lhs).span;
        let Some((lhs, rhs)) = self.balance_operands(lhs, rhs) else {
            return self.error_expr(span);
        };
        self.module.add_expr(Expr::new(
            ExprKind::Compare { pred, lhs, rhs },
            Type::bool_type(),
            span,
        ))
    }

    /// Build an arithmetic node. The operands are brought to a common
    /// numeric type, which is also the result type.
    pub fn build_binary_op(
        &mut self,
        op: crate::expr::BinOp,
        lhs: ExprId,
        rhs: ExprId,
    ) -> ExprId {
        let span = self.module.expr(lhs).span;
        let Some((lhs, rhs)) = self.balance_operands(lhs, rhs) else {
            return self.error_expr(span);
        };
        let ty = self.module.expr(lhs).ty.clone();
        match &ty {
            Type::Primitive(p) if p.is_number() => {}
            _ => {
                self.report(
                    span,
                    Diagnostic::error(
                        Category::NoViableOverload,
                        format!("operator '{}' requires numeric operands", op.symbol()),
                    ),
                );
                return self.error_expr(span);
            }
        }
        self.module
            .add_expr(Expr::new(ExprKind::BinaryOp { op, lhs, rhs }, ty, span))
    }

    /// Coerce two operands to a common type, preferring the non-literal
    /// side. `None` when no direction converts; the diagnostic comes
    /// from the failing coercion.
    fn balance_operands(&mut self, lhs: ExprId, rhs: ExprId) -> Option<(ExprId, ExprId)> {
        let lhs_ty = self.module.expr(lhs).ty.clone();
        let rhs_ty = self.module.expr(rhs).ty.clone();
        if lhs_ty == rhs_ty {
            return Some((lhs, rhs));
        }
        if self.module.conversion_rank(&rhs_ty, &lhs_ty).is_compatible() {
            let rhs = self.coerce(rhs, &lhs_ty);
            if self.module.expr(rhs).is_error() {
                return None;
            }
            return Some((lhs, rhs));
        }
        let lhs = self.coerce(lhs, &rhs_ty);
        if self.module.expr(lhs).is_error() {
            return None;
        }
        Some((lhs, rhs))
    }

    /// Build an assignment, coercing the source to the target type.
    pub fn build_assign(&mut self, to: ExprId, from: ExprId) -> ExprId {
        let span = self.module.expr(to).span;
        if !matches!(
            self.module.expr(to).kind,
            ExprKind::LValue { .. } | ExprKind::ElementRef { .. } | ExprKind::PtrDeref(_)
        ) {
            self.report(
                span,
                Diagnostic::error(
                    Category::NotLValue,
                    format!("cannot assign to '{}'", self.module.expr_display(to)),
                ),
            );
            return self.error_expr(span);
        }
        let to_ty = self.module.expr(to).ty.clone();
        let from_ty = self.module.expr(from).ty.clone();
        if !self.module.conversion_rank(&from_ty, &to_ty).is_compatible() {
            self.report(
                span,
                Diagnostic::error(
                    Category::IncompatibleAssignment,
                    format!("cannot assign '{from_ty}' to '{to_ty}'"),
                ),
            );
            return self.error_expr(span);
        }
        let from = self.coerce(from, &to_ty);
        if self.module.expr(from).is_error() {
            return from;
        }
        self.module
            .add_expr(Expr::new(ExprKind::Assign { to, from }, to_ty, span))
    }

    // -----------------------------------------------------------------
    // Lowering
    // -----------------------------------------------------------------

    /// Lower a resolved call to its direct form: `FnCall`, `CtorCall`,
    /// `VTableCall`, or `IndirectCall`. Only a winning candidate may be
    /// consumed.
    pub fn lower_call(&mut self, call: ExprId) -> ExprId {
        let span = self.module.expr(call).span;
        let ty = self.module.expr(call).ty.clone();
        let (target, base, is_ctor, args, state) = match &self.module.expr(call).kind {
            ExprKind::Call(c) => match c.singular_candidate() {
                Some(index) => {
                    let candidate = &c.candidates[index];
                    (
                        candidate.target.clone(),
                        candidate.base,
                        candidate.is_ctor,
                        c.args.clone(),
                        candidate.state,
                    )
                }
                None => return self.error_expr(span),
            },
            _ => return call,
        };
        if state != CandidateState::Winner {
            return self.error_expr(span);
        }

        let kind = match target {
            CandidateTarget::Method(func) => {
                if is_ctor {
                    let new_expr = match base {
                        Some(base) => base,
                        None => self
                            .module
                            .add_expr(Expr::new(ExprKind::New, ty.clone(), span)),
                    };
                    ExprKind::CtorCall {
                        func,
                        new_expr,
                        args,
                    }
                } else {
                    let defn = self.module.defn(func);
                    let is_virtual = defn
                        .function_info()
                        .map_or(false, |f| f.dispatch == Dispatch::Virtual)
                        && !defn.traits.contains(DefnTraits::FINAL);
                    match (is_virtual, base) {
                        (true, Some(self_arg)) => ExprKind::VTableCall {
                            method: func,
                            self_arg,
                            args,
                        },
                        (_, base) => ExprKind::FnCall {
                            func,
                            self_arg: base,
                            args,
                        },
                    }
                }
            }
            CandidateTarget::FnType(_) => match base {
                Some(func) => ExprKind::IndirectCall { func, args },
                None => return self.error_expr(span),
            },
        };
        self.module.add_expr(Expr::new(kind, ty, span))
    }

    // -----------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------

    /// Private definitions are visible only from their defining scope
    /// chain.
    fn check_access(&mut self, span: Span, defn: DefnId) -> bool {
        let d = self.module.defn(defn);
        if d.visibility != Visibility::Private {
            return true;
        }
        let Some(home) = d.defining_scope else {
            return true;
        };
        let name = d.name.clone();
        let mut scope = Some(self.scope);
        while let Some(current) = scope {
            if self.module.storage_scope(current) == home {
                return true;
            }
            scope = self.module.scope(current).parent;
        }
        self.report(
            span,
            Diagnostic::error(
                Category::PrivateAccess,
                format!("'{name}' is private to its defining scope"),
            ),
        );
        false
    }

    pub(crate) fn report(&mut self, span: Span, diag: Diagnostic) {
        let diag = diag.at(AnalyzerBase::loc(span));
        self.reporter.report(diag);
    }

    pub(crate) fn error_expr(&mut self, span: Span) -> ExprId {
        self.module.add_expr(Expr::error(span))
    }
}

fn primitive_by_name(name: &str) -> Option<Primitive> {
    Some(match name {
        "void" => Primitive::Void,
        "bool" => Primitive::Bool,
        "char" => Primitive::Char,
        "i8" => Primitive::I8,
        "i16" => Primitive::I16,
        "i32" => Primitive::I32,
        "i64" => Primitive::I64,
        "u8" => Primitive::U8,
        "u16" => Primitive::U16,
        "u32" => Primitive::U32,
        "u64" => Primitive::U64,
        "f32" => Primitive::F32,
        "f64" => Primitive::F64,
        _ => return None,
    })
}
