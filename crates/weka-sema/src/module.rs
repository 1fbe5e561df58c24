//! The module: owner of all semantic arenas.
//!
//! Definitions, scopes, expressions, and blocks live in flat arenas
//! indexed by plain ids; every cross-reference in the semantic graph is
//! an id, so back-references are navigational and never owning.
//! `add_symbol` is the single mutation point on module state during
//! expression analysis.

use std::collections::BTreeMap;

use weka_diag::{Category, Diagnostic};
use weka_types::{
    primitive_conversion_rank, BlockId, CompositeRef, ConversionRank, DefnId, ExprId,
    PatternVarRef, ScopeId, Type,
};

use crate::block::Block;
use crate::defn::{Defn, DefnKind};
use crate::expr::{Expr, ExprKind};
use crate::scope::{ScopeData, ScopeKind};

#[derive(Debug)]
pub struct Module {
    pub name: String,
    defns: Vec<Defn>,
    scopes: Vec<ScopeData>,
    exprs: Vec<Expr>,
    blocks: Vec<Block>,
    pub root_scope: ScopeId,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut module = Self {
            name: name.clone(),
            defns: Vec::new(),
            scopes: Vec::new(),
            exprs: Vec::new(),
            blocks: Vec::new(),
            root_scope: ScopeId(0),
        };
        module.root_scope = module.add_scope(ScopeData::iterable(None).named(name));
        module
    }

    // -----------------------------------------------------------------
    // Arena access
    // -----------------------------------------------------------------

    pub fn add_defn(&mut self, defn: Defn) -> DefnId {
        let id = DefnId(self.defns.len() as u32);
        self.defns.push(defn);
        id
    }

    pub fn defn(&self, id: DefnId) -> &Defn {
        &self.defns[id.0 as usize]
    }

    pub fn defn_mut(&mut self, id: DefnId) -> &mut Defn {
        &mut self.defns[id.0 as usize]
    }

    pub fn add_scope(&mut self, scope: ScopeData) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id.0 as usize]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut ScopeData {
        &mut self.scopes[id.0 as usize]
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.0 as usize]
    }

    pub fn expr_ids(&self) -> impl Iterator<Item = ExprId> {
        (0..self.exprs.len() as u32).map(ExprId)
    }

    pub fn add_block(&mut self, block: Block) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(block);
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    // -----------------------------------------------------------------
    // Scopes and symbols
    // -----------------------------------------------------------------

    /// Resolve delegation: the scope that actually stores symbols.
    pub fn storage_scope(&self, id: ScopeId) -> ScopeId {
        match self.scope(id).kind {
            ScopeKind::Delegating { target } => self.storage_scope(target),
            _ => id,
        }
    }

    /// Insert a definition into a scope under its own name.
    ///
    /// This is the only mutation point on module symbol state during
    /// expression analysis. Fails with a redefinition diagnostic when
    /// the scope forbids overloading and the name is taken.
    pub fn add_symbol(&mut self, scope: ScopeId, defn: DefnId) -> Result<(), Diagnostic> {
        let target = self.storage_scope(scope);
        let name = self.defn(defn).name.clone();
        if !self.scope_mut(target).insert(&name, defn) {
            return Err(Diagnostic::error(
                Category::Redefinition,
                format!("'{name}' is already defined in this scope"),
            ));
        }
        self.defn_mut(defn).defining_scope = Some(target);
        Ok(())
    }

    /// Append definitions named `name` visible in `scope` to `out`.
    ///
    /// With `inherit`, a composite member scope also searches each
    /// supertype's members in linearization order, suppressing
    /// duplicates by identity. Returns whether anything was found.
    pub fn lookup_member(
        &self,
        scope: ScopeId,
        name: &str,
        out: &mut Vec<DefnId>,
        inherit: bool,
    ) -> bool {
        let start = out.len();
        let target = self.storage_scope(scope);
        for &d in self.scope(target).entries(name) {
            if !out.contains(&d) {
                out.push(d);
            }
        }
        if inherit {
            if let Some(owner) = self.scope(target).owner {
                for sup in self.linearized_supers(owner) {
                    if let Some(info) = self.defn(sup).composite_info() {
                        let members = self.storage_scope(info.members);
                        for &d in self.scope(members).entries(name) {
                            if !out.contains(&d) {
                                out.push(d);
                            }
                        }
                    }
                }
            }
        }
        out.len() > start
    }

    /// Look up a member expected to have exactly one definition.
    pub fn lookup_single_member(
        &self,
        scope: ScopeId,
        name: &str,
        inherit: bool,
    ) -> Option<DefnId> {
        let mut out = Vec::new();
        self.lookup_member(scope, name, &mut out, inherit);
        match out.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    // -----------------------------------------------------------------
    // Composite supertypes
    // -----------------------------------------------------------------

    /// Supertype definitions of `defn`, depth-first, duplicates
    /// suppressed by identity. Does not include `defn` itself.
    pub fn linearized_supers(&self, defn: DefnId) -> Vec<DefnId> {
        let mut out = Vec::new();
        self.collect_supers(defn, &mut out);
        out
    }

    fn collect_supers(&self, defn: DefnId, out: &mut Vec<DefnId>) {
        let Some(info) = self.defn(defn).composite_info() else {
            return;
        };
        for sup in &info.supers {
            if let Type::Composite(c) = sup {
                if !out.contains(&c.defn) {
                    out.push(c.defn);
                    self.collect_supers(c.defn, out);
                }
            }
        }
    }

    /// Replace the template's own pattern variables in `ty` with the
    /// instance arguments, by position.
    fn instantiate(&self, ty: &Type, params: &[PatternVarRef], args: &[Type]) -> Type {
        if params.is_empty() || args.is_empty() {
            return ty.clone();
        }
        let map: BTreeMap<_, _> = params
            .iter()
            .zip(args)
            .map(|(p, a)| (p.id, a.clone()))
            .collect();
        substitute_pattern_vars(ty, &map)
    }

    /// Direct supertype instances of a composite instance, with the
    /// instance's type arguments substituted through.
    pub fn super_instances(&self, c: &CompositeRef) -> Vec<CompositeRef> {
        let Some(info) = self.defn(c.defn).composite_info() else {
            return Vec::new();
        };
        let params = self
            .defn(c.defn)
            .template
            .as_ref()
            .map(|t| t.params.as_slice())
            .unwrap_or(&[]);
        info.supers
            .iter()
            .filter_map(|sup| match self.instantiate(sup, params, &c.args) {
                Type::Composite(sc) => Some(sc),
                _ => None,
            })
            .collect()
    }

    /// Find the instance of `target` among `c` and its supertypes.
    pub fn find_super_instance(
        &self,
        c: &CompositeRef,
        target: DefnId,
    ) -> Option<CompositeRef> {
        if c.defn == target {
            return Some(c.clone());
        }
        for sup in self.super_instances(c) {
            if let Some(found) = self.find_super_instance(&sup, target) {
                return Some(found);
            }
        }
        None
    }

    // -----------------------------------------------------------------
    // Type relations
    // -----------------------------------------------------------------

    /// Structural type equality. Composites compare by definition
    /// identity and arguments.
    pub fn is_equal(&self, a: &Type, b: &Type) -> bool {
        a == b
    }

    /// Reflexive, transitive subtype relation.
    pub fn is_subtype(&self, a: &Type, b: &Type) -> bool {
        if a == b {
            return true;
        }
        // Error sentinels absorb.
        if a.is_error() || b.is_error() {
            return true;
        }
        match (a, b) {
            (Type::Composite(ca), Type::Composite(cb)) => self
                .find_super_instance(ca, cb.defn)
                .is_some_and(|instance| instance == *cb),
            (Type::Union(ua), Type::Union(ub)) => ua
                .members
                .iter()
                .all(|m| ub.members.iter().any(|n| self.is_subtype(m, n))),
            (_, Type::Union(u)) => u.members.iter().any(|m| self.is_subtype(a, m)),
            _ => false,
        }
    }

    /// Whether values of type `b` are acceptable where `a` is expected
    /// without representation change: `a` includes every subtype of
    /// itself and, for unions, every member.
    pub fn includes(&self, a: &Type, b: &Type) -> bool {
        if self.is_subtype(b, a) {
            return true;
        }
        match a {
            Type::Union(u) => u.members.iter().any(|m| self.includes(m, b)),
            _ => false,
        }
    }

    /// Rank the implicit conversion from `from` to `to`.
    pub fn conversion_rank(&self, from: &Type, to: &Type) -> ConversionRank {
        if from == to {
            return ConversionRank::Identity;
        }
        if from.is_error() || to.is_error() {
            return ConversionRank::Identity;
        }
        // Open types have not been determined yet; keep the candidate
        // alive without preferring it.
        if !from.is_singular() || !to.is_singular() {
            return ConversionRank::NonPreferred;
        }
        match (from, to) {
            (Type::Primitive(f), Type::Primitive(t)) => primitive_conversion_rank(*f, *t),
            (Type::Composite(cf), Type::Composite(ct)) => {
                if self
                    .find_super_instance(cf, ct.defn)
                    .is_some_and(|instance| instance == *ct)
                {
                    ConversionRank::Exact
                } else if self.has_coercer_from(ct.defn, from) {
                    ConversionRank::UserDefined
                } else {
                    ConversionRank::Incompatible
                }
            }
            (_, Type::Union(u)) => {
                if u.type_index_of(from).is_some() {
                    return ConversionRank::Exact;
                }
                let best = u
                    .members
                    .iter()
                    .map(|m| self.conversion_rank(from, m))
                    .max()
                    .unwrap_or(ConversionRank::Incompatible);
                if best.is_compatible() {
                    best.min(ConversionRank::NonPreferred)
                } else {
                    ConversionRank::Incompatible
                }
            }
            (_, Type::Composite(ct)) => {
                if self.has_coercer_from(ct.defn, from) {
                    ConversionRank::UserDefined
                } else {
                    ConversionRank::Incompatible
                }
            }
            (Type::Tuple(xs), Type::Tuple(ys)) => {
                if xs.len() != ys.len() {
                    return ConversionRank::Incompatible;
                }
                xs.iter()
                    .zip(ys)
                    .map(|(x, y)| self.conversion_rank(x, y))
                    .min()
                    .unwrap_or(ConversionRank::Identity)
            }
            _ => ConversionRank::Incompatible,
        }
    }

    /// Whether the composite has a coercer accepting `from`.
    ///
    /// Only direct conversions into the coercer parameter count; a
    /// coercer cannot be reached through another coercer.
    fn has_coercer_from(&self, defn: DefnId, from: &Type) -> bool {
        let Some(info) = self.defn(defn).composite_info() else {
            return false;
        };
        info.coercers.iter().any(|&coercer| {
            self.defn(coercer)
                .function_info()
                .and_then(|f| f.ty.param_type(0))
                .map_or(false, |param| {
                    if self.is_subtype(from, param) {
                        return true;
                    }
                    match (from, param) {
                        (Type::Primitive(f), Type::Primitive(t)) => {
                            primitive_conversion_rank(*f, *t) > ConversionRank::UserDefined
                        }
                        _ => false,
                    }
                })
        })
    }

    // -----------------------------------------------------------------
    // Expression predicates
    // -----------------------------------------------------------------

    /// Whether an expression and everything it references is fully
    /// resolved: a singular type and singular children, and for calls a
    /// unique surviving candidate.
    pub fn is_singular_expr(&self, id: ExprId) -> bool {
        let expr = self.expr(id);
        if !expr.ty.is_singular() {
            return false;
        }
        let singular_opt =
            |opt: &Option<ExprId>| opt.map_or(true, |child| self.is_singular_expr(child));
        let singular_all = |ids: &[ExprId]| ids.iter().all(|&child| self.is_singular_expr(child));
        match &expr.kind {
            ExprKind::Error
            | ExprKind::NoOp
            | ExprKind::ConstInt(_)
            | ExprKind::ConstFloat(_)
            | ExprKind::ConstBool(_)
            | ExprKind::ConstString(_)
            | ExprKind::ConstChar(_)
            | ExprKind::ConstNull
            | ExprKind::IrOpaque
            | ExprKind::LocalCall { .. }
            | ExprKind::ScopeName(_) => true,
            ExprKind::TypeName(ty) => ty.is_singular(),
            ExprKind::New => true,
            ExprKind::LValue { base, value } => {
                singular_opt(base)
                    && self
                        .defn(*value)
                        .value_type()
                        .map_or(true, |ty| ty.is_singular())
            }
            ExprKind::BoundMethod { self_arg, .. } => singular_opt(self_arg),
            ExprKind::ElementRef { base, index } => {
                self.is_singular_expr(*base) && self.is_singular_expr(*index)
            }
            ExprKind::PtrDeref(arg) | ExprKind::Not(arg) | ExprKind::Cast { arg, .. } => {
                self.is_singular_expr(*arg)
            }
            ExprKind::Assign { to, from } | ExprKind::PostAssign { to, from } => {
                self.is_singular_expr(*to) && self.is_singular_expr(*from)
            }
            ExprKind::InitVar { init, .. } => self.is_singular_expr(*init),
            ExprKind::BinaryOp { lhs, rhs, .. }
            | ExprKind::Compare { lhs, rhs, .. }
            | ExprKind::RefEq { lhs, rhs }
            | ExprKind::And { lhs, rhs }
            | ExprKind::Or { lhs, rhs } => {
                self.is_singular_expr(*lhs) && self.is_singular_expr(*rhs)
            }
            ExprKind::InstanceOf { value, test } => {
                self.is_singular_expr(*value) && test.is_singular()
            }
            ExprKind::Prog2 { first, second } => {
                self.is_singular_expr(*first) && self.is_singular_expr(*second)
            }
            ExprKind::Call(call) => {
                call.singular_candidate().is_some() && singular_all(&call.args)
            }
            ExprKind::FnCall { self_arg, args, .. } => singular_opt(self_arg) && singular_all(args),
            ExprKind::CtorCall { new_expr, args, .. } => {
                self.is_singular_expr(*new_expr) && singular_all(args)
            }
            ExprKind::VTableCall { self_arg, args, .. } => {
                self.is_singular_expr(*self_arg) && singular_all(args)
            }
            ExprKind::IndirectCall { func, args } => {
                self.is_singular_expr(*func) && singular_all(args)
            }
            ExprKind::TupleCtor(elems)
            | ExprKind::ArrayLiteral(elems)
            | ExprKind::ClosureEnv { captures: elems } => singular_all(elems),
        }
    }

    /// Structural side-effect-freeness, used by constant folding and
    /// common-subexpression elimination.
    pub fn is_side_effect_free(&self, id: ExprId) -> bool {
        let expr = self.expr(id);
        match &expr.kind {
            ExprKind::Error
            | ExprKind::NoOp
            | ExprKind::ConstInt(_)
            | ExprKind::ConstFloat(_)
            | ExprKind::ConstBool(_)
            | ExprKind::ConstString(_)
            | ExprKind::ConstChar(_)
            | ExprKind::ConstNull
            | ExprKind::TypeName(_)
            | ExprKind::ScopeName(_) => true,
            ExprKind::LValue { base, .. } => {
                base.map_or(true, |b| self.is_side_effect_free(b))
            }
            ExprKind::BoundMethod { self_arg, .. } => {
                self_arg.map_or(true, |b| self.is_side_effect_free(b))
            }
            ExprKind::ElementRef { base, index } => {
                self.is_side_effect_free(*base) && self.is_side_effect_free(*index)
            }
            ExprKind::PtrDeref(arg) | ExprKind::Not(arg) | ExprKind::Cast { arg, .. } => {
                self.is_side_effect_free(*arg)
            }
            ExprKind::BinaryOp { lhs, rhs, .. }
            | ExprKind::Compare { lhs, rhs, .. }
            | ExprKind::RefEq { lhs, rhs }
            | ExprKind::And { lhs, rhs }
            | ExprKind::Or { lhs, rhs } => {
                self.is_side_effect_free(*lhs) && self.is_side_effect_free(*rhs)
            }
            ExprKind::Prog2 { first, second } => {
                self.is_side_effect_free(*first) && self.is_side_effect_free(*second)
            }
            ExprKind::InstanceOf { value, .. } => self.is_side_effect_free(*value),
            ExprKind::TupleCtor(elems) | ExprKind::ArrayLiteral(elems) => {
                elems.iter().all(|&e| self.is_side_effect_free(e))
            }
            _ => false,
        }
    }

    /// Structural constantness.
    pub fn is_constant(&self, id: ExprId) -> bool {
        let expr = self.expr(id);
        match &expr.kind {
            ExprKind::ConstInt(_)
            | ExprKind::ConstFloat(_)
            | ExprKind::ConstBool(_)
            | ExprKind::ConstString(_)
            | ExprKind::ConstChar(_)
            | ExprKind::ConstNull
            | ExprKind::TypeName(_) => true,
            ExprKind::Not(arg) | ExprKind::Cast { arg, .. } => self.is_constant(*arg),
            ExprKind::BinaryOp { lhs, rhs, .. } | ExprKind::Compare { lhs, rhs, .. } => {
                self.is_constant(*lhs) && self.is_constant(*rhs)
            }
            ExprKind::TupleCtor(elems) | ExprKind::ArrayLiteral(elems) => {
                elems.iter().all(|&e| self.is_constant(e))
            }
            ExprKind::LValue { base: None, value } => match &self.defn(*value).kind {
                DefnKind::Let(v) => v.init.map_or(false, |init| self.is_constant(init)),
                _ => false,
            },
            _ => false,
        }
    }

    /// Fold an lvalue naming an immutable binding with a constant
    /// initializer to that constant. Other expressions come back
    /// unchanged.
    pub fn const_value(&self, id: ExprId) -> ExprId {
        if let ExprKind::LValue { base: None, value } = &self.expr(id).kind {
            if let DefnKind::Let(v) = &self.defn(*value).kind {
                if let Some(init) = v.init {
                    if self.is_constant(init) {
                        return init;
                    }
                }
            }
        }
        id
    }

    // -----------------------------------------------------------------
    // Formatting
    // -----------------------------------------------------------------

    /// Deterministic human-readable rendering, used in diagnostics.
    pub fn expr_display(&self, id: ExprId) -> String {
        let mut out = String::new();
        self.format_expr(id, &mut out);
        out
    }

    fn format_args(&self, args: &[ExprId], out: &mut String) {
        out.push('(');
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.format_expr(arg, out);
        }
        out.push(')');
    }

    fn format_expr(&self, id: ExprId, out: &mut String) {
        use std::fmt::Write;

        let expr = self.expr(id);
        match &expr.kind {
            ExprKind::Error => out.push_str("<error>"),
            ExprKind::NoOp => out.push_str("noop"),
            ExprKind::ConstInt(v) => {
                let _ = write!(out, "{v}");
            }
            ExprKind::ConstFloat(v) => {
                let _ = write!(out, "{v}");
            }
            ExprKind::ConstBool(v) => {
                let _ = write!(out, "{v}");
            }
            ExprKind::ConstString(v) => {
                let _ = write!(out, "{v:?}");
            }
            ExprKind::ConstChar(v) => {
                let _ = write!(out, "{v:?}");
            }
            ExprKind::ConstNull => out.push_str("null"),
            ExprKind::TypeName(ty) => {
                let _ = write!(out, "{ty}");
            }
            ExprKind::ScopeName(defn) => out.push_str(&self.defn(*defn).qualified_name),
            ExprKind::LValue { base, value } => {
                if let Some(base) = base {
                    self.format_expr(*base, out);
                    out.push('.');
                    out.push_str(&self.defn(*value).name);
                } else {
                    out.push_str(&self.defn(*value).name);
                }
            }
            ExprKind::ElementRef { base, index } => {
                self.format_expr(*base, out);
                out.push('[');
                self.format_expr(*index, out);
                out.push(']');
            }
            ExprKind::PtrDeref(arg) => {
                out.push('*');
                self.format_expr(*arg, out);
            }
            ExprKind::BoundMethod { self_arg, method } => {
                if let Some(self_arg) = self_arg {
                    self.format_expr(*self_arg, out);
                    out.push('.');
                }
                out.push_str(&self.defn(*method).name);
            }
            ExprKind::Assign { to, from } => {
                self.format_expr(*to, out);
                out.push_str(" = ");
                self.format_expr(*from, out);
            }
            ExprKind::PostAssign { to, from } => {
                self.format_expr(*to, out);
                out.push_str(" (=) ");
                self.format_expr(*from, out);
            }
            ExprKind::InitVar { var, init } => {
                out.push_str(&self.defn(*var).name);
                out.push_str(" = ");
                self.format_expr(*init, out);
            }
            ExprKind::BinaryOp { op, lhs, rhs } => {
                self.format_expr(*lhs, out);
                let _ = write!(out, " {} ", op.symbol());
                self.format_expr(*rhs, out);
            }
            ExprKind::Compare { pred, lhs, rhs } => {
                self.format_expr(*lhs, out);
                let _ = write!(out, " {} ", pred.symbol());
                self.format_expr(*rhs, out);
            }
            ExprKind::InstanceOf { value, test } => {
                self.format_expr(*value, out);
                let _ = write!(out, " isa {test}");
            }
            ExprKind::RefEq { lhs, rhs } => {
                self.format_expr(*lhs, out);
                out.push_str(" is ");
                self.format_expr(*rhs, out);
            }
            ExprKind::Not(arg) => {
                out.push_str("not ");
                self.format_expr(*arg, out);
            }
            ExprKind::And { lhs, rhs } => {
                self.format_expr(*lhs, out);
                out.push_str(" and ");
                self.format_expr(*rhs, out);
            }
            ExprKind::Or { lhs, rhs } => {
                self.format_expr(*lhs, out);
                out.push_str(" or ");
                self.format_expr(*rhs, out);
            }
            ExprKind::Prog2 { first, second } => {
                out.push_str("prog2(");
                self.format_expr(*first, out);
                out.push_str(", ");
                self.format_expr(*second, out);
                out.push(')');
            }
            ExprKind::Cast { cast, arg } => {
                let _ = write!(out, "{}<{}>(", cast.name(), expr.ty);
                self.format_expr(*arg, out);
                out.push(')');
            }
            ExprKind::Call(call) => {
                match call.singular_candidate() {
                    Some(index) => {
                        let candidate = &call.candidates[index];
                        match candidate.method() {
                            Some(method) => out.push_str(&self.defn(method).name),
                            None => out.push_str("<fn>"),
                        }
                    }
                    None => {
                        let _ = write!(out, "<{} candidates>", call.candidates.len());
                    }
                }
                self.format_args(&call.args, out);
            }
            ExprKind::FnCall {
                func,
                self_arg,
                args,
            } => {
                if let Some(self_arg) = self_arg {
                    self.format_expr(*self_arg, out);
                    out.push('.');
                }
                out.push_str(&self.defn(*func).name);
                self.format_args(args, out);
            }
            ExprKind::CtorCall { func, args, .. } => {
                out.push_str(&self.defn(*func).qualified_name);
                self.format_args(args, out);
            }
            ExprKind::VTableCall {
                method,
                self_arg,
                args,
            } => {
                self.format_expr(*self_arg, out);
                out.push('.');
                out.push_str(&self.defn(*method).name);
                self.format_args(args, out);
            }
            ExprKind::IndirectCall { func, args } => {
                out.push('(');
                self.format_expr(*func, out);
                out.push(')');
                self.format_args(args, out);
            }
            ExprKind::LocalCall { target } => {
                let _ = write!(out, "local call #{}", target.0);
            }
            ExprKind::New => {
                let _ = write!(out, "new {}", expr.ty);
            }
            ExprKind::TupleCtor(elems) => self.format_args(elems, out),
            ExprKind::ArrayLiteral(elems) => {
                out.push('[');
                for (i, &e) in elems.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.format_expr(e, out);
                }
                out.push(']');
            }
            ExprKind::ClosureEnv { captures } => {
                out.push_str("closure");
                self.format_args(captures, out);
            }
            ExprKind::IrOpaque => out.push_str("<ir value>"),
        }
    }
}

/// Replace pattern variables in `ty` according to `map`, rebuilding only
/// where a replacement applies.
pub fn substitute_pattern_vars(
    ty: &Type,
    map: &BTreeMap<weka_types::PatternVarId, Type>,
) -> Type {
    match ty {
        Type::PatternVar(pv) => map.get(&pv.id).cloned().unwrap_or_else(|| ty.clone()),
        Type::Composite(c) => {
            let mut out = c.clone();
            out.args = c
                .args
                .iter()
                .map(|a| substitute_pattern_vars(a, map))
                .collect();
            Type::Composite(out)
        }
        Type::Function(ft) => {
            let mut out = ft.clone();
            for p in &mut out.params {
                p.ty = substitute_pattern_vars(&p.ty, map);
            }
            out.ret = Box::new(substitute_pattern_vars(&out.ret, map));
            Type::Function(out)
        }
        Type::Tuple(elems) => Type::Tuple(
            elems
                .iter()
                .map(|e| substitute_pattern_vars(e, map))
                .collect(),
        ),
        Type::Union(u) => {
            let mut out = u.clone();
            out.members = u
                .members
                .iter()
                .map(|m| substitute_pattern_vars(m, map))
                .collect();
            Type::Union(out)
        }
        Type::Address(t) => Type::Address(Box::new(substitute_pattern_vars(t, map))),
        Type::Pointer(t) => Type::Pointer(Box::new(substitute_pattern_vars(t, map))),
        Type::NativeArray(t, n) => {
            Type::NativeArray(Box::new(substitute_pattern_vars(t, map)), *n)
        }
        Type::TypeLiteral(t) => Type::TypeLiteral(Box::new(substitute_pattern_vars(t, map))),
        _ => ty.clone(),
    }
}
