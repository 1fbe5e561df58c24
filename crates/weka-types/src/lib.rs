//! Semantic type representations for Weka.
//!
//! This crate defines the types used by the semantic core. These are
//! distinct from syntactic type annotations (which live in `weka-ast`).
//!
//! Types are structural values: compound forms own their children, and
//! nominal forms reference the definition table through plain ids. The
//! relations that need the definition table (subtype walking, composite
//! member lookup) live in `weka-sema`, which owns that table.

use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Index of a definition in the module's definition arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefnId(pub u32);

/// Index of a scope in the module's scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

/// Index of an expression in the module's expression arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// Index of a basic block in the module's block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Unique identifier for a template pattern variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternVarId(pub u32);

/// Unique identifier for a binding environment.
///
/// Environments are identified rather than referenced so that a
/// [`Type::PatternValue`] can name the environment it reads from without
/// the type graph owning unification state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(pub u32);

// ---------------------------------------------------------------------------
// Primitive types
// ---------------------------------------------------------------------------

/// The fixed set of primitive types.
///
/// `IntLit` and `UintLit` are the types of unsuffixed integer literals;
/// they convert to any sized integer, with `I32`/`U32` preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Void,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    IntLit,
    UintLit,
}

impl Primitive {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Primitive::I8
                | Primitive::I16
                | Primitive::I32
                | Primitive::I64
                | Primitive::U8
                | Primitive::U16
                | Primitive::U32
                | Primitive::U64
                | Primitive::IntLit
                | Primitive::UintLit
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64 | Primitive::IntLit
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    pub fn is_number(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// True for the unsized literal types.
    pub fn is_literal(self) -> bool {
        matches!(self, Primitive::IntLit | Primitive::UintLit)
    }

    /// Bit width of the value representation. Literal types report the
    /// width of their preferred conversion target.
    pub fn bit_width(self) -> u32 {
        match self {
            Primitive::Void => 0,
            Primitive::Bool => 1,
            Primitive::Char => 32,
            Primitive::I8 | Primitive::U8 => 8,
            Primitive::I16 | Primitive::U16 => 16,
            Primitive::I32 | Primitive::U32 | Primitive::IntLit | Primitive::UintLit => 32,
            Primitive::I64 | Primitive::U64 => 64,
            Primitive::F32 => 32,
            Primitive::F64 => 64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::IntLit => "{integer}",
            Primitive::UintLit => "{unsigned integer}",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Conversion ranking
// ---------------------------------------------------------------------------

/// How good a conversion from one type to another is.
///
/// Ordered worst-to-best so that `Ord` compares ranks directly. Overload
/// resolution culls `Incompatible` candidates and prefers candidates whose
/// per-argument ranks dominate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConversionRank {
    /// No conversion exists.
    Incompatible,
    /// Conversion requires a user-defined coercer method.
    UserDefined,
    /// Conversion can lose high bits (narrowing).
    Truncation,
    /// Conversion between signed and unsigned of the same width.
    SignedUnsigned,
    /// Conversion can lose precision (integer to float, f64 to f32).
    PrecisionLoss,
    /// Legal lossless conversion that is not the preferred one
    /// (an int literal to a non-preferred width, for example).
    NonPreferred,
    /// Lossless conversion: widening, upcast, union injection.
    Exact,
    /// The types are identical.
    Identity,
}

impl ConversionRank {
    pub fn is_compatible(self) -> bool {
        self != ConversionRank::Incompatible
    }
}

/// Rank a primitive-to-primitive conversion.
pub fn primitive_conversion_rank(from: Primitive, to: Primitive) -> ConversionRank {
    use ConversionRank::*;
    use Primitive::*;

    if from == to {
        return Identity;
    }

    // Literal types convert to any number; the 32-bit width is preferred.
    match (from, to) {
        (IntLit, I32) | (UintLit, U32) => return Exact,
        (IntLit, I8 | I16 | I64) | (UintLit, U8 | U16 | U64) => return NonPreferred,
        (IntLit, U8 | U16 | U32 | U64) | (UintLit, I8 | I16 | I32 | I64) => {
            return SignedUnsigned;
        }
        (IntLit | UintLit, F32 | F64) => return PrecisionLoss,
        _ => {}
    }

    if from.is_integer() && to.is_integer() {
        if from.is_signed() != to.is_signed() {
            return SignedUnsigned;
        }
        return if to.bit_width() > from.bit_width() {
            Exact
        } else {
            Truncation
        };
    }

    if from.is_integer() && to.is_float() {
        return PrecisionLoss;
    }

    if from.is_float() && to.is_float() {
        return if to.bit_width() > from.bit_width() {
            Exact
        } else {
            PrecisionLoss
        };
    }

    Incompatible
}

// ---------------------------------------------------------------------------
// Compound type components
// ---------------------------------------------------------------------------

/// One declared parameter of a function type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Type,
    /// Parameter may be omitted at the call site.
    pub has_default: bool,
    /// Parameter absorbs any number of trailing arguments.
    pub is_variadic: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            has_default: false,
            is_variadic: false,
        }
    }

    pub fn anonymous(ty: Type) -> Self {
        Self {
            name: None,
            ty,
            has_default: false,
            is_variadic: false,
        }
    }
}

/// A function type: parameter list, optional self parameter, return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub params: Vec<Param>,
    /// Type of the receiver for instance methods; `None` for free
    /// functions and statics.
    pub self_type: Option<Box<Type>>,
    pub ret: Box<Type>,
    pub is_static: bool,
}

impl FunctionType {
    pub fn new(params: Vec<Param>, ret: Type) -> Self {
        Self {
            params,
            self_type: None,
            ret: Box::new(ret),
            is_static: false,
        }
    }

    pub fn with_self(mut self, self_type: Type) -> Self {
        self.self_type = Some(Box::new(self_type));
        self
    }

    pub fn param_type(&self, index: usize) -> Option<&Type> {
        self.params.get(index).map(|p| &p.ty)
    }
}

/// The kind of a composite definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Class,
    Struct,
    Interface,
    Protocol,
}

impl CompositeKind {
    /// Classes, interfaces and protocols are reference types; structs are
    /// value aggregates.
    pub fn is_reference(self) -> bool {
        !matches!(self, CompositeKind::Struct)
    }
}

/// A reference to a composite (class/struct/interface/protocol) type.
///
/// The name and kind are denormalized from the definition so that type
/// display and reference-ness checks need no table access; `defn` is the
/// identity used by equality and subtype walking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeRef {
    pub name: String,
    pub kind: CompositeKind,
    pub defn: DefnId,
    pub args: Vec<Type>,
}

/// A union of alternative types.
///
/// Unions with at least one value-type member carry a discriminant tag;
/// unions of reference types only are represented as a bare pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionType {
    pub members: Vec<Type>,
}

impl UnionType {
    pub fn new(members: Vec<Type>) -> Self {
        Self { members }
    }

    /// Number of members that are value types (neither reference nor void).
    pub fn num_value_types(&self) -> usize {
        self.members
            .iter()
            .filter(|m| !m.is_reference_type() && !m.is_void())
            .count()
    }

    pub fn has_void_type(&self) -> bool {
        self.members.iter().any(|m| m.is_void())
    }

    /// Whether the runtime representation carries a discriminant.
    pub fn is_tagged(&self) -> bool {
        self.num_value_types() > 0
    }

    /// Index of the member equal to `ty`, or `None` when `ty` is not a
    /// member.
    pub fn type_index_of(&self, ty: &Type) -> Option<usize> {
        self.members.iter().position(|m| m == ty)
    }
}

/// A template pattern variable reference.
///
/// The name is denormalized for display; `id` is the identity used by
/// unification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternVarRef {
    pub name: String,
    pub id: PatternVarId,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A semantic type in Weka.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Fixed numeric/bool/char/void set; compared by id.
    Primitive(Primitive),

    /// Class, struct, interface, or protocol instance.
    Composite(CompositeRef),

    /// Function type.
    Function(FunctionType),

    /// A function value bound to a receiver: (function pointer, receiver).
    BoundMethod(FunctionType),

    /// Value aggregate; always passed by address internally.
    Tuple(Vec<Type>),

    /// Tagged or untagged union of alternatives.
    Union(UnionType),

    /// Address of a value of the inner type.
    Address(Box<Type>),

    /// Raw machine pointer to the inner type.
    Pointer(Box<Type>),

    /// Fixed-length native array.
    NativeArray(Box<Type>, u64),

    /// The type of a type expression; the inner type is the referent.
    TypeLiteral(Box<Type>),

    /// Template parameter placeholder, unified against argument types.
    PatternVar(PatternVarRef),

    /// The reading of a pattern variable under a specific environment,
    /// deferred until the environment is consulted.
    PatternValue { env: EnvId, var: PatternVarRef },

    /// Stand-in for the result type of an unresolved call.
    ResultOf(ExprId),

    /// Stand-in for the type of one parameter of an unresolved call.
    ParameterOf(ExprId, usize),

    /// Error sentinel. Produced once per diagnosed fault; absorbs all
    /// further analysis silently.
    Bad,
}

impl Type {
    pub fn void() -> Type {
        Type::Primitive(Primitive::Void)
    }

    pub fn bool_type() -> Type {
        Type::Primitive(Primitive::Bool)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Void))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Bad)
    }

    /// Whether values of this type are accessed through a reference.
    pub fn is_reference_type(&self) -> bool {
        match self {
            Type::Composite(c) => c.kind.is_reference(),
            Type::Address(_) | Type::Pointer(_) => true,
            _ => false,
        }
    }

    /// True when no pattern variables, pattern values, or call
    /// constraints remain anywhere in the type.
    pub fn is_singular(&self) -> bool {
        match self {
            Type::Primitive(_) | Type::Bad => true,
            Type::Composite(c) => c.args.iter().all(Type::is_singular),
            Type::Function(ft) | Type::BoundMethod(ft) => {
                ft.params.iter().all(|p| p.ty.is_singular())
                    && ft.ret.is_singular()
                    && ft.self_type.as_deref().map_or(true, Type::is_singular)
            }
            Type::Tuple(elems) => elems.iter().all(Type::is_singular),
            Type::Union(u) => u.members.iter().all(Type::is_singular),
            Type::Address(t) | Type::Pointer(t) | Type::TypeLiteral(t) => t.is_singular(),
            Type::NativeArray(t, _) => t.is_singular(),
            Type::PatternVar(_)
            | Type::PatternValue { .. }
            | Type::ResultOf(_)
            | Type::ParameterOf(_, _) => false,
        }
    }

    /// Collect every pattern variable reachable from this type, in
    /// first-occurrence order.
    pub fn free_pattern_vars(&self, out: &mut Vec<PatternVarId>) {
        match self {
            Type::Primitive(_) | Type::Bad | Type::ResultOf(_) | Type::ParameterOf(_, _) => {}
            Type::Composite(c) => {
                for arg in &c.args {
                    arg.free_pattern_vars(out);
                }
            }
            Type::Function(ft) | Type::BoundMethod(ft) => {
                for p in &ft.params {
                    p.ty.free_pattern_vars(out);
                }
                ft.ret.free_pattern_vars(out);
                if let Some(st) = &ft.self_type {
                    st.free_pattern_vars(out);
                }
            }
            Type::Tuple(elems) => {
                for e in elems {
                    e.free_pattern_vars(out);
                }
            }
            Type::Union(u) => {
                for m in &u.members {
                    m.free_pattern_vars(out);
                }
            }
            Type::Address(t) | Type::Pointer(t) | Type::TypeLiteral(t)
            | Type::NativeArray(t, _) => {
                t.free_pattern_vars(out);
            }
            Type::PatternVar(pv) | Type::PatternValue { var: pv, .. } => {
                if !out.contains(&pv.id) {
                    out.push(pv.id);
                }
            }
        }
    }
}

fn fmt_type_list(f: &mut fmt::Formatter<'_>, types: &[Type], sep: &str) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{ty}")?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{p}"),
            Type::Composite(c) => {
                write!(f, "{}", c.name)?;
                if !c.args.is_empty() {
                    f.write_str("[")?;
                    fmt_type_list(f, &c.args, ", ")?;
                    f.write_str("]")?;
                }
                Ok(())
            }
            Type::Function(ft) => {
                f.write_str("fn (")?;
                for (i, p) in ft.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(name) = &p.name {
                        write!(f, "{name}: ")?;
                    }
                    write!(f, "{}", p.ty)?;
                }
                f.write_str(")")?;
                if !ft.ret.is_void() {
                    write!(f, " -> {}", ft.ret)?;
                }
                Ok(())
            }
            Type::BoundMethod(ft) => write!(f, "bound {}", Type::Function(ft.clone())),
            Type::Tuple(elems) => {
                f.write_str("(")?;
                fmt_type_list(f, elems, ", ")?;
                f.write_str(")")
            }
            Type::Union(u) => {
                f.write_str("(")?;
                fmt_type_list(f, &u.members, " | ")?;
                f.write_str(")")
            }
            Type::Address(t) => write!(f, "Address[{t}]"),
            Type::Pointer(t) => write!(f, "Pointer[{t}]"),
            Type::NativeArray(t, n) => write!(f, "NativeArray[{t}, {n}]"),
            Type::TypeLiteral(t) => write!(f, "TypeLiteral[{t}]"),
            Type::PatternVar(pv) => write!(f, "%{}", pv.name),
            Type::PatternValue { var, .. } => write!(f, "%{}'", var.name),
            Type::ResultOf(_) => f.write_str("{result of call}"),
            Type::ParameterOf(_, index) => write!(f, "{{parameter {index} of call}}"),
            Type::Bad => f.write_str("<error>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_var(name: &str, id: u32) -> Type {
        Type::PatternVar(PatternVarRef {
            name: name.to_string(),
            id: PatternVarId(id),
        })
    }

    #[test]
    fn primitive_ranks_prefer_i32_for_literals() {
        let to_i32 = primitive_conversion_rank(Primitive::IntLit, Primitive::I32);
        let to_i64 = primitive_conversion_rank(Primitive::IntLit, Primitive::I64);
        assert_eq!(to_i32, ConversionRank::Exact);
        assert_eq!(to_i64, ConversionRank::NonPreferred);
        assert!(to_i32 > to_i64);
    }

    #[test]
    fn widening_is_exact_and_narrowing_truncates() {
        assert_eq!(
            primitive_conversion_rank(Primitive::I16, Primitive::I64),
            ConversionRank::Exact
        );
        assert_eq!(
            primitive_conversion_rank(Primitive::I64, Primitive::I16),
            ConversionRank::Truncation
        );
        assert_eq!(
            primitive_conversion_rank(Primitive::I32, Primitive::U32),
            ConversionRank::SignedUnsigned
        );
        assert_eq!(
            primitive_conversion_rank(Primitive::Bool, Primitive::F32),
            ConversionRank::Incompatible
        );
    }

    #[test]
    fn singularity_is_structural() {
        let t = Type::Tuple(vec![
            Type::Primitive(Primitive::I32),
            Type::Address(Box::new(pattern_var("T", 0))),
        ]);
        assert!(!t.is_singular());

        let ground = Type::Union(UnionType::new(vec![
            Type::Primitive(Primitive::I32),
            Type::Primitive(Primitive::F64),
        ]));
        assert!(ground.is_singular());
    }

    #[test]
    fn free_pattern_vars_dedupes_in_order() {
        let t = Type::Function(FunctionType::new(
            vec![
                Param::anonymous(pattern_var("A", 1)),
                Param::anonymous(pattern_var("B", 2)),
                Param::anonymous(pattern_var("A", 1)),
            ],
            pattern_var("B", 2),
        ));
        let mut vars = Vec::new();
        t.free_pattern_vars(&mut vars);
        assert_eq!(vars, vec![PatternVarId(1), PatternVarId(2)]);
    }

    #[test]
    fn union_value_type_census() {
        let string_ref = Type::Composite(CompositeRef {
            name: "String".to_string(),
            kind: CompositeKind::Class,
            defn: DefnId(0),
            args: vec![],
        });
        let u = UnionType::new(vec![Type::Primitive(Primitive::I32), string_ref.clone()]);
        assert_eq!(u.num_value_types(), 1);
        assert!(u.is_tagged());
        assert_eq!(u.type_index_of(&string_ref), Some(1));
        assert_eq!(u.type_index_of(&Type::Primitive(Primitive::Bool)), None);

        let refs_only = UnionType::new(vec![string_ref.clone(), Type::Address(Box::new(string_ref))]);
        assert!(!refs_only.is_tagged());
    }

    #[test]
    fn display_forms_are_stable() {
        let u = Type::Union(UnionType::new(vec![
            Type::Primitive(Primitive::I32),
            Type::Composite(CompositeRef {
                name: "String".to_string(),
                kind: CompositeKind::Class,
                defn: DefnId(3),
                args: vec![],
            }),
        ]));
        assert_eq!(u.to_string(), "(i32 | String)");

        let f = Type::Function(FunctionType::new(
            vec![Param::new("x", Type::Primitive(Primitive::I32))],
            Type::Primitive(Primitive::Bool),
        ));
        assert_eq!(f.to_string(), "fn (x: i32) -> bool");
        assert_eq!(pattern_var("T", 0).to_string(), "%T");
    }
}
