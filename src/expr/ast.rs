//! Syntax tree produced by the parser and walked by the interpreter.

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
  Int(i64),
  Float(f64),
  Str(String),
  Bool(bool),
  None,
  Name(String),
  List(Vec<Expr>),
  Tuple(Vec<Expr>),
  Dict(Vec<(Expr, Expr)>),
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Binary {
    left: Box<Expr>,
    op: BinOp,
    right: Box<Expr>,
  },
  /// `a and b`, `a or b`; short-circuiting and returning an operand.
  Logical {
    left: Box<Expr>,
    op: LogicalOp,
    right: Box<Expr>,
  },
  /// Chained comparison `a < b <= c`.
  Compare {
    first: Box<Expr>,
    rest: Vec<(CmpOp, Expr)>,
  },
  IfElse {
    cond: Box<Expr>,
    then: Box<Expr>,
    otherwise: Box<Expr>,
  },
  Index {
    object: Box<Expr>,
    index: Box<Expr>,
  },
  Slice {
    object: Box<Expr>,
    lower: Option<Box<Expr>>,
    upper: Option<Box<Expr>>,
    step: Option<Box<Expr>>,
  },
  /// Builtin call `f(args)`; only a bare name can be called.
  Call {
    func: String,
    args: Vec<Expr>,
    kwargs: Vec<(String, Expr)>,
  },
  MethodCall {
    object: Box<Expr>,
    method: String,
    args: Vec<Expr>,
  },
  ListComp {
    element: Box<Expr>,
    clauses: Vec<Clause>,
  },
  DictComp {
    key: Box<Expr>,
    value: Box<Expr>,
    clauses: Vec<Clause>,
  },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
  For { target: Target, iter: Expr },
  If(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Target {
  Name(String),
  Tuple(Vec<Target>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Pos,
  Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  FloorDiv,
  Mod,
  Pow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
  And,
  Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
  Eq,
  NotEq,
  Lt,
  Le,
  Gt,
  Ge,
  In,
  NotIn,
  Is,
  IsNot,
}

impl BinOp {
  pub fn symbol(self) -> &'static str {
    match self {
      BinOp::Add => "+",
      BinOp::Sub => "-",
      BinOp::Mul => "*",
      BinOp::Div => "/",
      BinOp::FloorDiv => "//",
      BinOp::Mod => "%",
      BinOp::Pow => "**",
    }
  }
}

impl CmpOp {
  pub fn symbol(self) -> &'static str {
    match self {
      CmpOp::Eq => "==",
      CmpOp::NotEq => "!=",
      CmpOp::Lt => "<",
      CmpOp::Le => "<=",
      CmpOp::Gt => ">",
      CmpOp::Ge => ">=",
      CmpOp::In => "in",
      CmpOp::NotIn => "not in",
      CmpOp::Is => "is",
      CmpOp::IsNot => "is not",
    }
  }
}
