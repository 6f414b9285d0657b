use crate::span::Spanned;

#[derive(Debug, Clone, Default)]
pub struct File {
    pub statements: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `.sub name`
    Sub(String),
    /// `.end`
    EndSub,
    /// `.local type name`
    Local {
        type_name: String,
        name: String,
    },
    /// `name:`
    Label(String),
    /// `mnemonic op, op, ...`
    Instruction {
        mnemonic: String,
        operands: Vec<Spanned<Operand>>,
    },
    /// `target = value`
    Assign {
        target: Spanned<Operand>,
        value: Value,
    },
    Goto(String),
    /// `call label`
    Call(String),
    /// `if cond goto label` and `unless cond goto label`
    If {
        negate: bool,
        cond: Condition,
        label: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `if x goto L`
    Truth(Spanned<Operand>),
    /// `if a < b goto L`
    Compare {
        op: RelOp,
        lhs: Spanned<Operand>,
        rhs: Spanned<Operand>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            RelOp::Eq => "eq",
            RelOp::Ne => "ne",
            RelOp::Lt => "lt",
            RelOp::Le => "le",
            RelOp::Gt => "gt",
            RelOp::Ge => "ge",
        }
    }

    /// The relation that holds exactly when `self` does not.
    pub fn inverse(self) -> Self {
        match self {
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
            RelOp::Lt => RelOp::Ge,
            RelOp::Le => RelOp::Gt,
            RelOp::Gt => RelOp::Le,
            RelOp::Ge => RelOp::Lt,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Operand(Spanned<Operand>),
    Binary {
        op: BinaryOp,
        lhs: Spanned<Operand>,
        rhs: Spanned<Operand>,
    },
    Unary {
        op: UnaryOp,
        operand: Spanned<Operand>,
    },
    New(Spanned<Atom>),
    /// `addr label`
    Addr(String),
    /// `defined x` or `defined x[k]`
    Defined(Spanned<Operand>),
    /// `clone x`
    Clone(Spanned<Operand>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
}

impl UnaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Neg => "neg",
            UnaryOp::BitNot => "bnot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Shl,
    Shr,
    Lsr,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `~~`
    Xor,
    BitAnd,
    BitOr,
    BitXor,
    Concat,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Pow => "pow",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::Lsr => "lsr",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::BitAnd => "band",
            BinaryOp::BitOr => "bor",
            BinaryOp::BitXor => "bxor",
            BinaryOp::Concat => "concat",
        }
    }
}

/// An atom with its key chain, e.g. `table["a"][$I0]`. Keys written as `[a;b]` and
/// `[a][b]` produce the same chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub base: Atom,
    pub keys: Vec<Spanned<Atom>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Int(i64),
    Float(String),
    Str(String),
    /// `$I0`, `$N1`, `$S2`, `$P3`
    Register(String),
    Ident(String),
    /// `.PerlHash`
    TypeMacro(String),
}
