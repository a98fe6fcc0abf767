//! Recursive-descent parser for single expressions.
//!
//! Precedence (low to high): bare tuple, `if/else`, `or`, `and`, `not`,
//! comparisons, `+ -`, `* / // %`, unary `- +`, `**`, then calls,
//! subscripts and method calls.

use super::ast::{BinOp, Clause, CmpOp, Expr, LogicalOp, Target, UnaryOp};
use super::error::{EvalError, EvalResult};
use super::lexer::{tokenize, Tok, Token};

pub fn parse(src: &str, max_depth: usize) -> EvalResult<Expr> {
  if src.trim().is_empty() {
    return Err(EvalError::syntax("empty expression"));
  }
  let mut p = Parser { toks: tokenize(src)?, pos: 0, depth: 0, max_depth };
  let expr = p.tuple_or_test()?;
  if p.peek() != &Tok::Eof {
    return Err(p.unexpected());
  }
  Ok(expr)
}

struct Parser {
  toks: Vec<Token>,
  pos: usize,
  depth: usize,
  max_depth: usize,
}

impl Parser {
  fn peek(&self) -> &Tok { &self.toks[self.pos].tok }

  fn peek_at(&self, offset: usize) -> &Tok {
    let i = (self.pos + offset).min(self.toks.len() - 1);
    &self.toks[i].tok
  }

  fn advance(&mut self) -> Tok {
    let t = self.toks[self.pos].tok.clone();
    if self.pos < self.toks.len() - 1 {
      self.pos += 1;
    }
    t
  }

  fn eat(&mut self, tok: &Tok) -> bool {
    if self.peek() == tok {
      self.advance();
      true
    } else {
      false
    }
  }

  fn expect(&mut self, tok: &Tok, what: &str) -> EvalResult<()> {
    if self.eat(tok) {
      Ok(())
    } else {
      Err(EvalError::syntax(format!(
        "expected {what} at position {}",
        self.toks[self.pos].pos
      )))
    }
  }

  fn unexpected(&self) -> EvalError {
    let t = &self.toks[self.pos];
    if t.tok == Tok::Eof {
      EvalError::syntax("unexpected end of expression")
    } else {
      EvalError::syntax(format!("invalid syntax at position {}", t.pos))
    }
  }

  fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
    self.depth += 1;
    if self.depth > self.max_depth {
      return Err(EvalError::limit(format!("expression nested deeper than {} levels", self.max_depth)));
    }
    let out = f(self);
    self.depth -= 1;
    out
  }

  /// `a, b, c` without brackets, as accepted at top level and inside parens.
  fn tuple_or_test(&mut self) -> EvalResult<Expr> {
    let first = self.test()?;
    if self.peek() != &Tok::Comma {
      return Ok(first);
    }
    let mut items = vec![first];
    while self.eat(&Tok::Comma) {
      if matches!(self.peek(), Tok::Eof | Tok::RParen) {
        break;
      }
      items.push(self.test()?);
    }
    Ok(Expr::Tuple(items))
  }

  fn test(&mut self) -> EvalResult<Expr> {
    self.nested(|p| {
      let body = p.or_test()?;
      if !p.eat(&Tok::If) {
        return Ok(body);
      }
      let cond = p.or_test()?;
      p.expect(&Tok::Else, "'else'")?;
      let otherwise = p.test()?;
      Ok(Expr::IfElse { cond: Box::new(cond), then: Box::new(body), otherwise: Box::new(otherwise) })
    })
  }

  fn or_test(&mut self) -> EvalResult<Expr> {
    let mut left = self.and_test()?;
    while self.eat(&Tok::Or) {
      let right = self.and_test()?;
      left = Expr::Logical { left: Box::new(left), op: LogicalOp::Or, right: Box::new(right) };
    }
    Ok(left)
  }

  fn and_test(&mut self) -> EvalResult<Expr> {
    let mut left = self.not_test()?;
    while self.eat(&Tok::And) {
      let right = self.not_test()?;
      left = Expr::Logical { left: Box::new(left), op: LogicalOp::And, right: Box::new(right) };
    }
    Ok(left)
  }

  fn not_test(&mut self) -> EvalResult<Expr> {
    if self.eat(&Tok::Not) {
      let operand = self.nested(|p| p.not_test())?;
      return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) });
    }
    self.comparison()
  }

  fn comparison(&mut self) -> EvalResult<Expr> {
    let first = self.arith()?;
    let mut rest = Vec::new();
    loop {
      let op = match self.peek().clone() {
        Tok::EqEq => CmpOp::Eq,
        Tok::NotEq => CmpOp::NotEq,
        Tok::Lt => CmpOp::Lt,
        Tok::Le => CmpOp::Le,
        Tok::Gt => CmpOp::Gt,
        Tok::Ge => CmpOp::Ge,
        Tok::In => CmpOp::In,
        Tok::Not if self.peek_at(1) == &Tok::In => {
          self.advance();
          CmpOp::NotIn
        }
        Tok::Is if self.peek_at(1) == &Tok::Not => {
          self.advance();
          CmpOp::IsNot
        }
        Tok::Is => CmpOp::Is,
        _ => break,
      };
      self.advance();
      rest.push((op, self.arith()?));
    }
    if rest.is_empty() {
      Ok(first)
    } else {
      Ok(Expr::Compare { first: Box::new(first), rest })
    }
  }

  fn arith(&mut self) -> EvalResult<Expr> {
    let mut left = self.term()?;
    loop {
      let op = match self.peek() {
        Tok::Plus => BinOp::Add,
        Tok::Minus => BinOp::Sub,
        _ => return Ok(left),
      };
      self.advance();
      let right = self.term()?;
      left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
    }
  }

  fn term(&mut self) -> EvalResult<Expr> {
    let mut left = self.factor()?;
    loop {
      let op = match self.peek() {
        Tok::Star => BinOp::Mul,
        Tok::Slash => BinOp::Div,
        Tok::DoubleSlash => BinOp::FloorDiv,
        Tok::Percent => BinOp::Mod,
        _ => return Ok(left),
      };
      self.advance();
      let right = self.factor()?;
      left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
    }
  }

  fn factor(&mut self) -> EvalResult<Expr> {
    let op = match self.peek() {
      Tok::Minus => UnaryOp::Neg,
      Tok::Plus => UnaryOp::Pos,
      _ => return self.power(),
    };
    self.advance();
    let operand = self.nested(|p| p.factor())?;
    Ok(Expr::Unary { op, operand: Box::new(operand) })
  }

  fn power(&mut self) -> EvalResult<Expr> {
    let base = self.primary()?;
    if self.eat(&Tok::DoubleStar) {
      let exp = self.nested(|p| p.factor())?;
      return Ok(Expr::Binary { left: Box::new(base), op: BinOp::Pow, right: Box::new(exp) });
    }
    Ok(base)
  }

  fn primary(&mut self) -> EvalResult<Expr> {
    let mut expr = self.atom()?;
    loop {
      match self.peek().clone() {
        Tok::Dot => {
          self.advance();
          let method = match self.advance() {
            Tok::Name(n) => n,
            _ => return Err(EvalError::syntax("expected a method name after '.'")),
          };
          if self.peek() != &Tok::LParen {
            return Err(EvalError::attribute(format!("attribute access is not allowed: '.{method}'")));
          }
          self.advance();
          let (args, kwargs) = self.call_args()?;
          if !kwargs.is_empty() {
            return Err(EvalError::type_err(format!("{method}() takes no keyword arguments")));
          }
          expr = Expr::MethodCall { object: Box::new(expr), method, args };
        }
        Tok::LParen => {
          let func = match expr {
            Expr::Name(n) => n,
            _ => return Err(EvalError::type_err("only builtin functions can be called")),
          };
          self.advance();
          let (args, kwargs) = self.call_args()?;
          expr = Expr::Call { func, args, kwargs };
        }
        Tok::LBracket => {
          self.advance();
          expr = self.subscript(expr)?;
        }
        _ => return Ok(expr),
      }
    }
  }

  fn call_args(&mut self) -> EvalResult<(Vec<Expr>, Vec<(String, Expr)>)> {
    let mut args = Vec::new();
    let mut kwargs = Vec::new();
    while self.peek() != &Tok::RParen {
      if let (Tok::Name(n), Tok::Assign) = (self.peek().clone(), self.peek_at(1).clone()) {
        self.advance();
        self.advance();
        kwargs.push((n, self.test()?));
      } else {
        if !kwargs.is_empty() {
          return Err(EvalError::syntax("positional argument follows keyword argument"));
        }
        let arg = self.test()?;
        if self.peek() == &Tok::For {
          if !args.is_empty() {
            return Err(EvalError::syntax("generator expression must be parenthesized"));
          }
          let clauses = self.comp_clauses()?;
          args.push(Expr::ListComp { element: Box::new(arg), clauses });
          if self.peek() != &Tok::RParen {
            return Err(EvalError::syntax("generator expression must be parenthesized"));
          }
          break;
        }
        args.push(arg);
      }
      if !self.eat(&Tok::Comma) {
        break;
      }
    }
    self.expect(&Tok::RParen, "')'")?;
    Ok((args, kwargs))
  }

  fn subscript(&mut self, object: Expr) -> EvalResult<Expr> {
    let lower = if self.peek() != &Tok::Colon { Some(self.test()?) } else { None };
    if !self.eat(&Tok::Colon) {
      let index = lower.ok_or_else(|| self.unexpected())?;
      self.expect(&Tok::RBracket, "']'")?;
      return Ok(Expr::Index { object: Box::new(object), index: Box::new(index) });
    }
    let upper = if !matches!(self.peek(), Tok::Colon | Tok::RBracket) { Some(self.test()?) } else { None };
    let mut step = None;
    if self.eat(&Tok::Colon) && self.peek() != &Tok::RBracket {
      step = Some(self.test()?);
    }
    self.expect(&Tok::RBracket, "']'")?;
    Ok(Expr::Slice {
      object: Box::new(object),
      lower: lower.map(Box::new),
      upper: upper.map(Box::new),
      step: step.map(Box::new),
    })
  }

  fn atom(&mut self) -> EvalResult<Expr> {
    match self.peek().clone() {
      Tok::Int(i) => {
        self.advance();
        Ok(Expr::Int(i))
      }
      Tok::Float(f) => {
        self.advance();
        Ok(Expr::Float(f))
      }
      Tok::Str(s) => {
        self.advance();
        Ok(Expr::Str(s))
      }
      Tok::True => {
        self.advance();
        Ok(Expr::Bool(true))
      }
      Tok::False => {
        self.advance();
        Ok(Expr::Bool(false))
      }
      Tok::None => {
        self.advance();
        Ok(Expr::None)
      }
      Tok::Name(n) => {
        self.advance();
        Ok(Expr::Name(n))
      }
      Tok::LParen => {
        self.advance();
        self.nested(|p| p.paren_body())
      }
      Tok::LBracket => {
        self.advance();
        self.nested(|p| p.list_body())
      }
      Tok::LBrace => {
        self.advance();
        self.nested(|p| p.dict_body())
      }
      _ => Err(self.unexpected()),
    }
  }

  fn paren_body(&mut self) -> EvalResult<Expr> {
    if self.eat(&Tok::RParen) {
      return Ok(Expr::Tuple(Vec::new()));
    }
    let first = self.test()?;
    if self.peek() == &Tok::For {
      let clauses = self.comp_clauses()?;
      self.expect(&Tok::RParen, "')'")?;
      return Ok(Expr::ListComp { element: Box::new(first), clauses });
    }
    if !self.eat(&Tok::Comma) {
      self.expect(&Tok::RParen, "')'")?;
      return Ok(first);
    }
    let mut items = vec![first];
    while self.peek() != &Tok::RParen {
      items.push(self.test()?);
      if !self.eat(&Tok::Comma) {
        break;
      }
    }
    self.expect(&Tok::RParen, "')'")?;
    Ok(Expr::Tuple(items))
  }

  fn list_body(&mut self) -> EvalResult<Expr> {
    if self.eat(&Tok::RBracket) {
      return Ok(Expr::List(Vec::new()));
    }
    let first = self.test()?;
    if self.peek() == &Tok::For {
      let clauses = self.comp_clauses()?;
      self.expect(&Tok::RBracket, "']'")?;
      return Ok(Expr::ListComp { element: Box::new(first), clauses });
    }
    let mut items = vec![first];
    while self.eat(&Tok::Comma) {
      if self.peek() == &Tok::RBracket {
        break;
      }
      items.push(self.test()?);
    }
    self.expect(&Tok::RBracket, "']'")?;
    Ok(Expr::List(items))
  }

  fn dict_body(&mut self) -> EvalResult<Expr> {
    if self.eat(&Tok::RBrace) {
      return Ok(Expr::Dict(Vec::new()));
    }
    let key = self.test()?;
    if self.peek() != &Tok::Colon {
      return Err(EvalError::syntax("set displays are not supported; use a list or a dict"));
    }
    self.advance();
    let value = self.test()?;
    if self.peek() == &Tok::For {
      let clauses = self.comp_clauses()?;
      self.expect(&Tok::RBrace, "'}'")?;
      return Ok(Expr::DictComp { key: Box::new(key), value: Box::new(value), clauses });
    }
    let mut pairs = vec![(key, value)];
    while self.eat(&Tok::Comma) {
      if self.peek() == &Tok::RBrace {
        break;
      }
      let k = self.test()?;
      self.expect(&Tok::Colon, "':'")?;
      let v = self.test()?;
      pairs.push((k, v));
    }
    self.expect(&Tok::RBrace, "'}'")?;
    Ok(Expr::Dict(pairs))
  }

  /// One or more `for ... in ...` clauses with interleaved `if` filters.
  fn comp_clauses(&mut self) -> EvalResult<Vec<Clause>> {
    let mut clauses = Vec::new();
    loop {
      if self.eat(&Tok::For) {
        let target = self.target_list()?;
        self.expect(&Tok::In, "'in'")?;
        let iter = self.or_test()?;
        clauses.push(Clause::For { target, iter });
      } else if self.eat(&Tok::If) {
        clauses.push(Clause::If(self.or_test()?));
      } else {
        return Ok(clauses);
      }
    }
  }

  fn target_list(&mut self) -> EvalResult<Target> {
    let first = self.target_atom()?;
    if self.peek() != &Tok::Comma {
      return Ok(first);
    }
    let mut items = vec![first];
    while self.eat(&Tok::Comma) {
      if self.peek() == &Tok::In {
        break;
      }
      items.push(self.target_atom()?);
    }
    Ok(Target::Tuple(items))
  }

  fn target_atom(&mut self) -> EvalResult<Target> {
    match self.advance() {
      Tok::Name(n) => Ok(Target::Name(n)),
      Tok::LParen => {
        let inner = self.nested(|p| p.target_list())?;
        self.expect(&Tok::RParen, "')'")?;
        Ok(inner)
      }
      _ => Err(EvalError::syntax("comprehension target must be a name or a tuple of names")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn p(src: &str) -> Expr {
    parse(src, 64).expect("parse")
  }

  #[test]
  fn power_binds_tighter_than_unary_minus() {
    assert_eq!(
      p("-x**2"),
      Expr::Unary {
        op: UnaryOp::Neg,
        operand: Box::new(Expr::Binary {
          left: Box::new(Expr::Name("x".into())),
          op: BinOp::Pow,
          right: Box::new(Expr::Int(2)),
        }),
      }
    );
  }

  #[test]
  fn nested_ternary_is_right_associative() {
    match p("'pos' if x > 0 else 'neg' if x < 0 else 'zero'") {
      Expr::IfElse { otherwise, .. } => assert!(matches!(*otherwise, Expr::IfElse { .. })),
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn dict_comprehension_with_unpacking_and_filter() {
    match p("{k: v * 2 for k, v in data.items() if v > 50}") {
      Expr::DictComp { clauses, .. } => {
        assert_eq!(clauses.len(), 2);
        match &clauses[0] {
          Clause::For { target: Target::Tuple(names), .. } => assert_eq!(names.len(), 2),
          other => panic!("unexpected {other:?}"),
        }
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn slices_and_not_in() {
    assert!(matches!(p("x[::-1]"), Expr::Slice { lower: None, upper: None, step: Some(_), .. }));
    assert!(matches!(p("'a' not in x"), Expr::Compare { .. }));
  }

  #[test]
  fn generator_argument_and_bare_tuple() {
    assert!(matches!(p("sum(x for x in nums)"), Expr::Call { .. }));
    assert!(matches!(p("1, 2"), Expr::Tuple(items) if items.len() == 2));
    assert!(matches!(p("(1,)"), Expr::Tuple(items) if items.len() == 1));
  }

  #[test]
  fn malformed_input_is_a_syntax_error() {
    for src in ["[for in]", "", "x +", "(1, 2", "{1, 2}", "x if y", "nums.__class__"] {
      assert!(parse(src, 64).is_err(), "{src} should fail");
    }
  }

  #[test]
  fn deep_nesting_hits_the_limit() {
    let src = format!("{}1{}", "(".repeat(100), ")".repeat(100));
    assert!(matches!(parse(&src, 32), Err(EvalError::Limit(_))));
  }
}
