//! The analysis task driver.
//!
//! Every definition carries a monotonic phase bitmask. `analyze_defn`
//! advances a definition to the requested phase, recursing into the
//! definitions its signature references first. Calls are idempotent: a
//! definition already at or past the requested phase returns
//! immediately, and a reentrant request during advancement (a cycle
//! within the same phase) is treated as satisfied — the outer frame
//! completes it.

use std::ops::{Deref, DerefMut};

use weka_ast::Span;
use weka_diag::{Reporter, SourceLocation};
use weka_types::{DefnId, ScopeId, Type};

use crate::builtins::{well_known, Builtins};
use crate::defn::{DefnKind, Task};
use crate::module::Module;
use crate::trace::{ResolveAction, ResolveStep};

/// Shared state for all analysis passes.
pub struct AnalyzerBase<'a> {
    pub module: &'a mut Module,
    pub reporter: &'a mut Reporter,
    pub builtins: &'a Builtins,
    tracing: bool,
    resolve_trace: Vec<ResolveStep>,
}

impl<'a> AnalyzerBase<'a> {
    pub fn new(
        module: &'a mut Module,
        reporter: &'a mut Reporter,
        builtins: &'a Builtins,
    ) -> Self {
        Self {
            module,
            reporter,
            builtins,
            tracing: false,
            resolve_trace: Vec::new(),
        }
    }

    /// Enable overload-resolution step recording.
    pub fn enable_tracing(&mut self) {
        self.tracing = true;
    }

    pub fn resolve_trace(&self) -> &[ResolveStep] {
        &self.resolve_trace
    }

    pub(crate) fn record_resolve(&mut self, action: ResolveAction, candidate: String, detail: &str) {
        if !self.tracing {
            return;
        }
        self.resolve_trace.push(ResolveStep {
            action,
            candidate,
            detail: detail.to_string(),
        });
    }

    pub(crate) fn loc(span: Span) -> SourceLocation {
        SourceLocation {
            file_id: span.file.0,
            start: span.start,
            end: span.end,
        }
    }

    /// Advance a definition to `task`.
    ///
    /// Returns `false` when the definition is ill-formed or the driver
    /// has signaled cancellation; derived work then yields error
    /// sentinels without further diagnostics.
    pub fn analyze_defn(&mut self, d: DefnId, task: Task) -> bool {
        if self.reporter.should_abort() {
            return false;
        }
        {
            let defn = self.module.defn(d);
            if defn.ill_formed {
                return false;
            }
            if defn.phases.is_set(task) {
                return true;
            }
            if defn.in_progress {
                // Same-phase cycle: the outer frame completes it.
                return true;
            }
        }

        self.module.defn_mut(d).in_progress = true;
        let ok = self.advance_defn(d, task);
        let defn = self.module.defn_mut(d);
        defn.in_progress = false;
        if ok {
            defn.phases.advance_through(task);
        } else {
            defn.ill_formed = true;
        }
        ok
    }

    /// Perform the minimum work needed for `d` to reach `task`:
    /// advance every definition its signature references.
    fn advance_defn(&mut self, d: DefnId, task: Task) -> bool {
        let mut referenced: Vec<Type> = Vec::new();
        let mut members_to_prepare: Vec<DefnId> = Vec::new();

        match &self.module.defn(d).kind {
            DefnKind::Type(info) => {
                if let Some(composite) = &info.composite {
                    referenced.extend(composite.supers.iter().cloned());
                    if task >= Task::Construction {
                        let members = composite.members;
                        self.module.lookup_member(
                            members,
                            well_known::CONSTRUCT,
                            &mut members_to_prepare,
                            false,
                        );
                        self.module.lookup_member(
                            members,
                            well_known::CREATE,
                            &mut members_to_prepare,
                            false,
                        );
                    }
                    if task >= Task::Conversion {
                        members_to_prepare.extend(composite.coercers.iter().copied());
                    }
                }
            }
            DefnKind::Function(f) => {
                if task >= Task::TypeComparison {
                    referenced.extend(f.ty.params.iter().map(|p| p.ty.clone()));
                    referenced.push((*f.ty.ret).clone());
                }
            }
            DefnKind::Var(v) | DefnKind::Let(v) | DefnKind::Parameter(v) => {
                referenced.push(v.ty.clone());
            }
            DefnKind::Module(_) | DefnKind::Namespace(_) => {}
        }

        for ty in &referenced {
            if !self.analyze_type(ty, task) {
                return false;
            }
        }
        for member in members_to_prepare {
            if !self.analyze_defn(member, Task::TypeComparison) {
                return false;
            }
        }
        true
    }

    /// Advance the definitions a type references to `task`.
    pub fn analyze_type(&mut self, ty: &Type, task: Task) -> bool {
        match ty {
            Type::Composite(c) => {
                for arg in &c.args {
                    if !self.analyze_type(arg, task) {
                        return false;
                    }
                }
                self.analyze_defn(c.defn, task)
            }
            Type::Function(ft) | Type::BoundMethod(ft) => {
                for p in &ft.params {
                    if !self.analyze_type(&p.ty, task) {
                        return false;
                    }
                }
                self.analyze_type(&ft.ret, task)
            }
            Type::Tuple(elems) => {
                for e in elems {
                    if !self.analyze_type(e, task) {
                        return false;
                    }
                }
                true
            }
            Type::Union(u) => {
                for member in &u.members {
                    if !self.analyze_type(member, task) {
                        return false;
                    }
                }
                true
            }
            Type::Address(t) | Type::Pointer(t) | Type::TypeLiteral(t)
            | Type::NativeArray(t, _) => self.analyze_type(t, task),
            _ => true,
        }
    }
}

/// Reduces untyped ASTs to typed IR.
///
/// Extends [`AnalyzerBase`] with the lexical position the reduction runs
/// in: the current scope chain and enclosing function.
pub struct ExprAnalyzer<'a> {
    base: AnalyzerBase<'a>,
    /// Innermost scope reductions resolve names against.
    pub scope: ScopeId,
    pub current_function: Option<DefnId>,
}

impl<'a> ExprAnalyzer<'a> {
    pub fn new(
        module: &'a mut Module,
        reporter: &'a mut Reporter,
        builtins: &'a Builtins,
        scope: ScopeId,
    ) -> Self {
        Self {
            base: AnalyzerBase::new(module, reporter, builtins),
            scope,
            current_function: None,
        }
    }

    pub fn in_function(mut self, function: DefnId) -> Self {
        self.current_function = Some(function);
        self
    }
}

impl<'a> Deref for ExprAnalyzer<'a> {
    type Target = AnalyzerBase<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'a> DerefMut for ExprAnalyzer<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}
