//! Error reporting and diagnostics for Weka.
//!
//! This crate provides structured diagnostics with source location
//! tracking. Diagnostics are created by the semantic core and rendered
//! here for display. The invariant the core maintains: exactly one
//! diagnostic per original cause — error sentinels absorb follow-on
//! faults silently.

use std::fmt;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Broad category for diagnostics. Used for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Reference to a name with no visible definition.
    UndefinedName,
    /// A name resolves to more than one non-overloadable definition.
    AmbiguousName,
    /// Redeclaration of a name in a scope that forbids overloading.
    Redefinition,
    /// Access to a member not visible from the referencing scope.
    PrivateAccess,
    /// No overload accepts the argument types, after all coercions.
    NoViableOverload,
    /// More than one undominated overload survives resolution.
    AmbiguousOverload,
    /// A type with no definition was used in constructor position.
    NotConstructable,
    /// An operation requires a subclass of a given type.
    SubclassRequired,
    /// Assignment target is not an lvalue.
    NotLValue,
    /// Assigned value cannot convert to the target type.
    IncompatibleAssignment,
    /// The requested cast is not allowed between these types.
    DisallowedCast,
    /// No template specialization matches the given arguments.
    NoSpecialization,
    /// A pattern variable was still unresolved at commit point.
    InferenceFailure,
    /// No `construct` or `create` member and no default constructor.
    NoConstructor,
    /// Compiler invariant violation. Always fatal.
    Internal,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Category::UndefinedName,
        Category::AmbiguousName,
        Category::Redefinition,
        Category::PrivateAccess,
        Category::NoViableOverload,
        Category::AmbiguousOverload,
        Category::NotConstructable,
        Category::SubclassRequired,
        Category::NotLValue,
        Category::IncompatibleAssignment,
        Category::DisallowedCast,
        Category::NoSpecialization,
        Category::InferenceFailure,
        Category::NoConstructor,
        Category::Internal,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::UndefinedName => "undefined_name",
            Category::AmbiguousName => "ambiguous_name",
            Category::Redefinition => "redefinition",
            Category::PrivateAccess => "private_access",
            Category::NoViableOverload => "no_viable_overload",
            Category::AmbiguousOverload => "ambiguous_overload",
            Category::NotConstructable => "not_constructable",
            Category::SubclassRequired => "subclass_required",
            Category::NotLValue => "not_lvalue",
            Category::IncompatibleAssignment => "incompatible_assignment",
            Category::DisallowedCast => "disallowed_cast",
            Category::NoSpecialization => "no_specialization",
            Category::InferenceFailure => "inference_failure",
            Category::NoConstructor => "no_constructor",
            Category::Internal => "internal",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::UndefinedName => "E0101",
            Category::AmbiguousName => "E0102",
            Category::Redefinition => "E0103",
            Category::PrivateAccess => "E0104",
            Category::NoViableOverload => "E0201",
            Category::AmbiguousOverload => "E0202",
            Category::NotConstructable => "E0301",
            Category::SubclassRequired => "E0302",
            Category::NotLValue => "E0303",
            Category::IncompatibleAssignment => "E0304",
            Category::DisallowedCast => "E0305",
            Category::NoSpecialization => "E0401",
            Category::InferenceFailure => "E0402",
            Category::NoConstructor => "E0501",
            Category::Internal => "E0901",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::UndefinedName => "A referenced name has no visible definition.",
            Category::AmbiguousName => "A name resolves to multiple definitions.",
            Category::Redefinition => "A name is declared twice in a non-overloading scope.",
            Category::PrivateAccess => "A member is not visible from the referencing scope.",
            Category::NoViableOverload => {
                "No overload of the called function accepts the argument types."
            }
            Category::AmbiguousOverload => {
                "More than one overload survives resolution undominated."
            }
            Category::NotConstructable => "The type cannot be used in constructor position.",
            Category::SubclassRequired => "The operation requires a subclass of the given type.",
            Category::NotLValue => "The assignment target cannot be assigned to.",
            Category::IncompatibleAssignment => {
                "The assigned value cannot convert to the target type."
            }
            Category::DisallowedCast => "The requested cast is not allowed between these types.",
            Category::NoSpecialization => "No template specialization matches the arguments.",
            Category::InferenceFailure => {
                "A template parameter could not be inferred from the call."
            }
            Category::NoConstructor => "The type has no matching construct or create member.",
            Category::Internal => "Compiler invariant violation.",
        }
    }
}

// ---------------------------------------------------------------------------
// Source locations (independent of weka-ast's Span)
// ---------------------------------------------------------------------------

/// A source location for diagnostics.
///
/// Uses byte offsets. Callers convert from `weka-ast` spans to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file_id: u32,
    pub start: u32,
    pub end: u32,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. E0201).
    pub code: Option<String>,
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub location: Option<SourceLocation>,
    /// Additional labeled spans (e.g., a considered overload candidate).
    pub labels: Vec<DiagLabel>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

/// A labeled source span within a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagLabel {
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Warning,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn info(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: None,
            severity: Severity::Info,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_label(mut self, location: Option<SourceLocation>, message: impl Into<String>) -> Self {
        self.labels.push(DiagLabel {
            location,
            message: message.into(),
        });
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        if let Some(code) = &self.code {
            write!(f, "{prefix}[{code}]: {}", self.message)?;
        } else {
            write!(f, "{prefix}: {}", self.message)?;
        }
        for label in &self.labels {
            write!(f, "\n  note: {}", label.message)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Reporter: the counting diagnostics sink
// ---------------------------------------------------------------------------

/// Collects diagnostics for a compilation and tracks whether analysis
/// should continue.
///
/// One `Reporter` exists per compilation. Recoverable faults go through
/// [`Reporter::report`]; invariant violations go through
/// [`Reporter::fatal`], which does not return.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    /// Stop requesting further analysis after this many errors.
    /// Zero means unlimited.
    max_errors: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_errors(max_errors: usize) -> Self {
        Self {
            max_errors,
            ..Self::default()
        }
    }

    pub fn report(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Info => {}
        }
        self.diagnostics.push(diag);
    }

    /// Report an internal invariant violation and abort the compilation.
    pub fn fatal(&mut self, message: impl Into<String>) -> ! {
        let message = message.into();
        self.report(Diagnostic::error(Category::Internal, message.clone()));
        panic!("internal compiler error: {message}");
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Whether the driver should stop demanding further analysis.
    pub fn should_abort(&self) -> bool {
        self.max_errors != 0 && self.error_count >= self.max_errors
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn into_error(self) -> Option<DiagnosticError> {
        if self.has_errors() {
            Some(DiagnosticError(self.diagnostics))
        } else {
            None
        }
    }
}
