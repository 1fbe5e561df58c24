//! The typed expression IR.
//!
//! Every node carries its result type and source span. During analysis a
//! node's type may be non-singular (pattern variables or call constraints
//! still open); code generation consumes only fully singular nodes.

use weka_ast::Span;
use weka_types::{BlockId, DefnId, ExprId, Type};

use crate::candidate::CallCandidate;

/// Arithmetic and bitwise opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

/// Comparison predicates. Signedness and float ordering are recovered
/// from the operand types at lowering time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparePred {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparePred {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparePred::Eq => "==",
            ComparePred::Ne => "!=",
            ComparePred::Lt => "<",
            ComparePred::Le => "<=",
            ComparePred::Gt => ">",
            ComparePred::Ge => ">=",
        }
    }
}

/// The flavor of a cast node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Compiler-inserted lossless conversion.
    Implicit,
    Truncate,
    SignExtend,
    ZeroExtend,
    IntToFloat,
    BitCast,
    /// Reference conversion to a supertype.
    UpCast,
    /// Wrap a member value into a union.
    UnionCtor,
    /// Extract a member value from a union; behavior is undefined if the
    /// union holds a different member.
    UnionMember,
    /// Extract a member value from a union with a runtime tag test.
    CheckedUnionMember,
}

impl CastKind {
    pub fn name(self) -> &'static str {
        match self {
            CastKind::Implicit => "implicitCast",
            CastKind::Truncate => "truncate",
            CastKind::SignExtend => "sext",
            CastKind::ZeroExtend => "zext",
            CastKind::IntToFloat => "intToFloat",
            CastKind::BitCast => "bitCast",
            CastKind::UpCast => "upCast",
            CastKind::UnionCtor => "unionCtor",
            CastKind::UnionMember => "unionMember",
            CastKind::CheckedUnionMember => "checkedUnionMember",
        }
    }
}

/// How a call expression was formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Ordinary name-based call; candidates compete.
    Normal,
    /// Call with a statically known target (`super(...)`).
    Exact,
    /// Constructor call; the result type is the constructed type.
    Construct,
}

/// An unresolved call: the accumulated candidate set plus reduced
/// arguments. Resolution culls candidates until one winner remains, then
/// the call is lowered to a direct call form.
#[derive(Debug, Clone, Default)]
pub struct CallExpr {
    pub kind: CallKind,
    pub candidates: Vec<CallCandidate>,
    pub args: Vec<ExprId>,
    pub expected_return: Option<Type>,
}

impl Default for CallKind {
    fn default() -> Self {
        CallKind::Normal
    }
}

impl CallExpr {
    pub fn new(kind: CallKind, expected_return: Option<Type>) -> Self {
        Self {
            kind,
            candidates: Vec::new(),
            args: Vec::new(),
            expected_return,
        }
    }

    /// Whether any candidate is still in play.
    pub fn has_any_candidates(&self) -> bool {
        self.candidates.iter().any(|c| !c.is_culled())
    }

    /// The sole surviving candidate, or `None` when zero or several
    /// remain.
    pub fn singular_candidate(&self) -> Option<usize> {
        let mut found = None;
        for (index, candidate) in self.candidates.iter().enumerate() {
            if candidate.is_culled() {
                continue;
            }
            if found.is_some() {
                return None;
            }
            found = Some(index);
        }
        found
    }
}

/// One typed IR node.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    /// The error sentinel. Carries `Type::Bad`; absorbs further analysis.
    pub fn error(span: Span) -> Self {
        Self::new(ExprKind::Error, Type::Bad, span)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ExprKind::Error)
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Error sentinel.
    Error,
    /// Evaluates its type's default; used for padding and erased forms.
    NoOp,

    // -- Constants --
    ConstInt(i64),
    ConstFloat(f64),
    ConstBool(bool),
    ConstString(String),
    ConstChar(char),
    ConstNull,
    /// A type used as a value; `ty` is `TypeLiteral` of the referent.
    TypeName(Type),

    // -- References --
    /// Reference to a value definition, with an optional base object.
    LValue {
        base: Option<ExprId>,
        value: DefnId,
    },
    /// Reference to a scope-like definition (module, namespace) used in
    /// qualified lookup position.
    ScopeName(DefnId),
    ElementRef {
        base: ExprId,
        index: ExprId,
    },
    PtrDeref(ExprId),
    /// A method paired with its receiver, as a first-class value.
    BoundMethod {
        self_arg: Option<ExprId>,
        method: DefnId,
    },

    // -- Assignment --
    Assign {
        to: ExprId,
        from: ExprId,
    },
    /// Assignment yielding the previous value.
    PostAssign {
        to: ExprId,
        from: ExprId,
    },
    InitVar {
        var: DefnId,
        init: ExprId,
    },

    // -- Operators --
    BinaryOp {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Compare {
        pred: ComparePred,
        lhs: ExprId,
        rhs: ExprId,
    },
    /// Runtime subtype test; type is always bool.
    InstanceOf {
        value: ExprId,
        test: Type,
    },
    /// Reference identity test.
    RefEq {
        lhs: ExprId,
        rhs: ExprId,
    },
    Not(ExprId),
    And {
        lhs: ExprId,
        rhs: ExprId,
    },
    Or {
        lhs: ExprId,
        rhs: ExprId,
    },
    /// Evaluate both, yield the second.
    Prog2 {
        first: ExprId,
        second: ExprId,
    },

    // -- Casts --
    Cast {
        cast: CastKind,
        arg: ExprId,
    },

    // -- Calls --
    /// Unresolved call with candidates.
    Call(CallExpr),
    /// Direct call to a known function.
    FnCall {
        func: DefnId,
        self_arg: Option<ExprId>,
        args: Vec<ExprId>,
    },
    /// Constructor call: allocate, then run the constructor.
    CtorCall {
        func: DefnId,
        new_expr: ExprId,
        args: Vec<ExprId>,
    },
    /// Call through the receiver's vtable.
    VTableCall {
        method: DefnId,
        self_arg: ExprId,
        args: Vec<ExprId>,
    },
    /// Call through a function-typed value.
    IndirectCall {
        func: ExprId,
        args: Vec<ExprId>,
    },
    /// Intra-function call to a local block (used by lowered finally
    /// regions).
    LocalCall {
        target: BlockId,
    },

    // -- Construction --
    /// Raw allocation of the node's type; receiver of a `construct`
    /// candidate.
    New,
    TupleCtor(Vec<ExprId>),
    ArrayLiteral(Vec<ExprId>),
    /// Closure environment construction over captured values.
    ClosureEnv {
        captures: Vec<ExprId>,
    },

    /// Backend-opaque value injected by code generation glue.
    IrOpaque,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_expr_carries_bad_type() {
        let e = Expr::error(Span::synthetic());
        assert!(e.is_error());
        assert!(e.ty.is_error());
    }

    #[test]
    fn singular_candidate_requires_exactly_one_survivor() {
        let call = CallExpr::new(CallKind::Normal, None);
        assert_eq!(call.singular_candidate(), None);
        assert!(!call.has_any_candidates());
    }
}
