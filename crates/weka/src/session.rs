//! The compilation session.
//!
//! A session owns the module under analysis, its diagnostics, and the
//! built-in registry, and drives expression analysis through the
//! semantic core. The session refuses to hand IR to code-generation
//! consumers once any error has been reported.

use weka_ast::Ast;
use weka_diag::{DiagnosticError, Reporter};
use weka_sema::{Builtins, Defn, DefnKind, ExprAnalyzer, Module, StorageClass};
use weka_types::{ExprId, ScopeId};

/// Resolves import paths by materializing their definitions.
///
/// The loader writes the imported module's definitions into the
/// session's arenas and returns the scope holding them; `None` means the
/// path does not resolve. This is the only external suspension point of
/// the semantic core.
pub trait ModuleLoader {
    fn load(&mut self, module: &mut Module, path: &str) -> Option<ScopeId>;
}

/// A loader with no modules.
pub struct NoLoader;

impl ModuleLoader for NoLoader {
    fn load(&mut self, _module: &mut Module, _path: &str) -> Option<ScopeId> {
        None
    }
}

pub struct Session {
    pub module: Module,
    pub reporter: Reporter,
    pub builtins: Builtins,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        let mut module = Module::new(name);
        let builtins = Builtins::install(&mut module);
        Self {
            module,
            reporter: Reporter::new(),
            builtins,
        }
    }

    /// A session that stops demanding analysis after `max_errors`
    /// errors.
    pub fn with_max_errors(name: impl Into<String>, max_errors: usize) -> Self {
        let mut session = Self::new(name);
        session.reporter = Reporter::with_max_errors(max_errors);
        session
    }

    /// An analyzer positioned at the module's root scope.
    pub fn analyzer(&mut self) -> ExprAnalyzer<'_> {
        let scope = self.module.root_scope;
        ExprAnalyzer::new(&mut self.module, &mut self.reporter, &self.builtins, scope)
    }

    /// Reduce a top-level expression to typed IR.
    pub fn analyze(&mut self, ast: &Ast) -> ExprId {
        self.analyzer().reduce_expr(ast, None)
    }

    /// Import a module through the loader, binding its name in the root
    /// scope for qualified access.
    pub fn import(&mut self, loader: &mut dyn ModuleLoader, path: &str) -> bool {
        let Some(scope) = loader.load(&mut self.module, path) else {
            return false;
        };
        let name = path.rsplit('.').next().unwrap_or(path).to_string();
        let defn = self
            .module
            .add_defn(Defn::new(name, StorageClass::Global, DefnKind::Module(scope)));
        let root = self.module.root_scope;
        self.module.add_symbol(root, defn).is_ok()
    }

    pub fn has_errors(&self) -> bool {
        self.reporter.has_errors()
    }

    /// Finish the session, yielding the analyzed module for code
    /// generation — or the collected diagnostics when any error was
    /// reported. The IR is never handed over in the error case.
    pub fn finish(self) -> Result<Module, DiagnosticError> {
        match self.reporter.into_error() {
            None => Ok(self.module),
            Some(err) => Err(err),
        }
    }
}
