//! Tokenizer for the expression language.

use super::error::{EvalError, EvalResult};

#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
  Int(i64),
  Float(f64),
  Str(String),
  Name(String),
  // keywords
  And,
  Or,
  Not,
  In,
  Is,
  If,
  Else,
  For,
  True,
  False,
  None,
  // punctuation / operators
  Plus,
  Minus,
  Star,
  DoubleStar,
  Slash,
  DoubleSlash,
  Percent,
  EqEq,
  NotEq,
  Lt,
  Le,
  Gt,
  Ge,
  Assign,
  LParen,
  RParen,
  LBracket,
  RBracket,
  LBrace,
  RBrace,
  Comma,
  Colon,
  Dot,
  Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
  pub tok: Tok,
  pub pos: usize,
}

pub fn tokenize(src: &str) -> EvalResult<Vec<Token>> {
  let chars: Vec<char> = src.chars().collect();
  let mut out = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];
    let start = i;

    if c.is_whitespace() {
      i += 1;
      continue;
    }

    if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
      let (tok, next) = lex_number(&chars, i)?;
      out.push(Token { tok, pos: start });
      i = next;
      continue;
    }

    if c == '\'' || c == '"' {
      let (s, next) = lex_string(&chars, i)?;
      // Adjacent literals concatenate: 'ab' 'cd' == 'abcd'.
      if let Some(Token { tok: Tok::Str(prev), .. }) = out.last_mut() {
        prev.push_str(&s);
      } else {
        out.push(Token { tok: Tok::Str(s), pos: start });
      }
      i = next;
      continue;
    }

    if c.is_alphabetic() || c == '_' {
      while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        i += 1;
      }
      let word: String = chars[start..i].iter().collect();
      let tok = match word.as_str() {
        "and" => Tok::And,
        "or" => Tok::Or,
        "not" => Tok::Not,
        "in" => Tok::In,
        "is" => Tok::Is,
        "if" => Tok::If,
        "else" => Tok::Else,
        "for" => Tok::For,
        "True" => Tok::True,
        "False" => Tok::False,
        "None" => Tok::None,
        "lambda" | "import" | "def" | "class" | "yield" | "await" | "async" | "del"
        | "global" | "nonlocal" | "return" | "while" | "with" | "try" | "raise" => {
          return Err(EvalError::syntax(format!("'{word}' is not allowed in an expression")));
        }
        _ => Tok::Name(word),
      };
      out.push(Token { tok, pos: start });
      continue;
    }

    let next = chars.get(i + 1).copied();
    let (tok, width) = match (c, next) {
      ('*', Some('*')) => (Tok::DoubleStar, 2),
      ('/', Some('/')) => (Tok::DoubleSlash, 2),
      ('=', Some('=')) => (Tok::EqEq, 2),
      ('!', Some('=')) => (Tok::NotEq, 2),
      ('<', Some('=')) => (Tok::Le, 2),
      ('>', Some('=')) => (Tok::Ge, 2),
      ('+', _) => (Tok::Plus, 1),
      ('-', _) => (Tok::Minus, 1),
      ('*', _) => (Tok::Star, 1),
      ('/', _) => (Tok::Slash, 1),
      ('%', _) => (Tok::Percent, 1),
      ('<', _) => (Tok::Lt, 1),
      ('>', _) => (Tok::Gt, 1),
      ('=', _) => (Tok::Assign, 1),
      ('(', _) => (Tok::LParen, 1),
      (')', _) => (Tok::RParen, 1),
      ('[', _) => (Tok::LBracket, 1),
      (']', _) => (Tok::RBracket, 1),
      ('{', _) => (Tok::LBrace, 1),
      ('}', _) => (Tok::RBrace, 1),
      (',', _) => (Tok::Comma, 1),
      (':', _) => (Tok::Colon, 1),
      ('.', _) => (Tok::Dot, 1),
      _ => return Err(EvalError::syntax(format!("invalid character '{c}' at position {start}"))),
    };
    out.push(Token { tok, pos: start });
    i += width;
  }

  out.push(Token { tok: Tok::Eof, pos: chars.len() });
  Ok(out)
}

fn lex_number(chars: &[char], mut i: usize) -> EvalResult<(Tok, usize)> {
  let start = i;
  let mut is_float = false;
  while i < chars.len() && chars[i].is_ascii_digit() {
    i += 1;
  }
  if i < chars.len() && chars[i] == '.' {
    is_float = true;
    i += 1;
    while i < chars.len() && chars[i].is_ascii_digit() {
      i += 1;
    }
  }
  if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
    let mut j = i + 1;
    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
      j += 1;
    }
    if j < chars.len() && chars[j].is_ascii_digit() {
      is_float = true;
      i = j;
      while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
      }
    }
  }
  if i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '_') {
    return Err(EvalError::syntax(format!("invalid number literal at position {start}")));
  }

  let text: String = chars[start..i].iter().collect();
  let tok = if is_float {
    Tok::Float(text.parse().map_err(|_| EvalError::syntax(format!("invalid float literal '{text}'")))?)
  } else {
    Tok::Int(text.parse().map_err(|_| EvalError::Overflow(format!("integer literal '{text}' is too large")))?)
  };
  Ok((tok, i))
}

fn lex_string(chars: &[char], start: usize) -> EvalResult<(String, usize)> {
  let quote = chars[start];
  let mut i = start + 1;
  let mut s = String::new();
  while i < chars.len() {
    let c = chars[i];
    if c == quote {
      return Ok((s, i + 1));
    }
    if c == '\n' {
      break;
    }
    if c == '\\' {
      let esc = chars.get(i + 1).copied().ok_or_else(|| EvalError::syntax("unterminated string literal"))?;
      match esc {
        'n' => s.push('\n'),
        't' => s.push('\t'),
        'r' => s.push('\r'),
        '0' => s.push('\0'),
        '\\' => s.push('\\'),
        '\'' => s.push('\''),
        '"' => s.push('"'),
        other => {
          s.push('\\');
          s.push(other);
        }
      }
      i += 2;
      continue;
    }
    s.push(c);
    i += 1;
  }
  Err(EvalError::syntax(format!("unterminated string literal at position {start}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn toks(src: &str) -> Vec<Tok> {
    tokenize(src).expect("tokenize").into_iter().map(|t| t.tok).collect()
  }

  #[test]
  fn operators_prefer_longest_match() {
    assert_eq!(
      toks("x ** 2 // 3 <= y != z"),
      vec![
        Tok::Name("x".into()),
        Tok::DoubleStar,
        Tok::Int(2),
        Tok::DoubleSlash,
        Tok::Int(3),
        Tok::Le,
        Tok::Name("y".into()),
        Tok::NotEq,
        Tok::Name("z".into()),
        Tok::Eof,
      ]
    );
  }

  #[test]
  fn numbers_and_strings() {
    assert_eq!(toks("1.5 .5 2e3 7"), vec![Tok::Float(1.5), Tok::Float(0.5), Tok::Float(2000.0), Tok::Int(7), Tok::Eof]);
    assert_eq!(toks(r#"'a' "b\n""#), vec![Tok::Str("ab\n".into()), Tok::Eof]);
  }

  #[test]
  fn rejects_statement_keywords_and_stray_characters() {
    assert!(matches!(tokenize("lambda x: x"), Err(EvalError::Syntax(_))));
    assert!(matches!(tokenize("x | y"), Err(EvalError::Syntax(_))));
    assert!(matches!(tokenize("'open"), Err(EvalError::Syntax(_))));
  }

  #[test]
  fn huge_integer_literal_is_overflow() {
    assert!(matches!(tokenize("99999999999999999999999"), Err(EvalError::Overflow(_))));
  }
}
