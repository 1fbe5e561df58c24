//! Basic blocks for block-structured control flow.

use weka_types::{BlockId, ExprId};

/// How control leaves a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Block is still being built.
    Open,
    Goto(BlockId),
    CondGoto {
        cond: ExprId,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return(Option<ExprId>),
    Throw(ExprId),
    Unreachable,
}

/// A straight-line sequence of expressions ending in a terminator.
#[derive(Debug, Clone)]
pub struct Block {
    pub label: Option<String>,
    pub exprs: Vec<ExprId>,
    pub terminator: Terminator,
}

impl Block {
    pub fn new() -> Self {
        Self {
            label: None,
            exprs: Vec::new(),
            terminator: Terminator::Open,
        }
    }

    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new()
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator != Terminator::Open
    }

    /// Append an expression. Appending to a terminated block is an
    /// invariant violation in the builder, caught in debug builds.
    pub fn append(&mut self, expr: ExprId) {
        debug_assert!(!self.is_terminated(), "append to terminated block");
        self.exprs.push(expr);
    }

    /// Set the terminator. The first terminator wins; later attempts on
    /// an already-terminated block are ignored so that error recovery
    /// paths can close blocks unconditionally.
    pub fn terminate(&mut self, terminator: Terminator) {
        if !self.is_terminated() {
            self.terminator = terminator;
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}
