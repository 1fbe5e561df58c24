//! Weka compiler front-end driver.
//!
//! Ties the semantic core to its external collaborators: the parser
//! (producing `weka-ast` trees), the module loader, and the diagnostics
//! sink. Code generation consumes the module a successful
//! [`Session::finish`] returns.

mod session;

pub use session::{ModuleLoader, NoLoader, Session};

pub use weka_diag::{Category, Diagnostic, DiagnosticError, Reporter, Severity};
pub use weka_sema::{Builtins, ExprAnalyzer, Module};

#[cfg(test)]
mod session_tests;
