//! This module implements utility functions without much need for defining
//! context or not enough of it to warrant them having their own modules.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

/// Decodes a Fortran-style real such as `1.2345-03` or `0.5D+02`, where the
/// exponent marker may be missing or be a `D`. Only called on tokens made
/// exclusively of digits, dots, signs and exponent letters.
fn decode_fortran_real(s: &str) -> Option<f64> {
  // mantissa start/end, exponent start/end
  let mut ixs: [usize; 4] = [0, 0, 0, 0];
  // 0-1 = looking for mantissa start/end, 2-3 = looking for exponent start/end
  let step: Cell<usize> = 0.into();
  let mut mark = |i| { ixs[step.get()] = i; step.replace(step.get() + 1); };
  let mut seen_chars: usize = 0;
  for (i, c) in s.char_indices() {
    seen_chars = i + c.len_utf8();
    match (step.get() % 2, c.is_ascii_digit() || c == '.', c == '+' || c == '-') {
      (0, false, false) => continue,
      (0, _, _) => mark(i),
      (1, true, _) => continue,
      (1, false, false) => mark(i),
      (1, _, true) => { mark(i); mark(i); },
      _ => return None
    };
    if step.get() > 3 { break; }
  }
  if seen_chars == 0 {
    return None;
  }
  if step.get() % 2 == 1 {
    mark(seen_chars);
  }
  let mantissa = || s[ixs[0]..ixs[1]].parse::<f64>().ok();
  let exponent = || s[ixs[2]..ixs[3]].parse::<i32>().ok();
  return match step.get() {
    2 => mantissa(),
    4 => Some(mantissa()? * 10.0_f64.powi(exponent()?)),
    _ => None
  };
}

/// Parses a real number the way the riser tools write them. Plain decimal and
/// scientific notation are accepted directly; Fortran exponents are accepted
/// as a fallback. Anything with stray characters is rejected.
pub fn parse_real(token: &str) -> Option<f64> {
  let token = token.trim();
  if token.is_empty() {
    return None;
  }
  if let Ok(x) = token.parse::<f64>() {
    return Some(x);
  }
  if !token.chars().all(|c| c.is_ascii_digit() || ".+-eEdD".contains(c)) {
    return None;
  }
  let mut parts = token.split(['d', 'D', 'e', 'E']);
  let mantissa = parts.next()?;
  if !mantissa.chars().any(|c| c.is_ascii_digit()) {
    return None;
  }
  return match (parts.next(), parts.next()) {
    (None, _) => decode_fortran_real(mantissa).filter(|_| !token.ends_with(['+', '-'])),
    (Some(exp), None) => {
      let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
      if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
      }
      format!("{}e{}", mantissa, exp).parse().ok()
    },
    _ => None
  };
}

/// Parses an integer. Reals are not silently truncated.
pub fn parse_integer(token: &str) -> Option<i64> {
  let token = token.trim();
  let token = token.strip_prefix('+').unwrap_or(token);
  return token.parse::<i64>().ok();
}

/// Parses a yes/no style flag.
pub fn parse_flag(token: &str) -> Option<bool> {
  return match token.trim().to_ascii_lowercase().as_str() {
    "yes" | "y" | "true" | "t" | "on" | "1" => Some(true),
    "no" | "n" | "false" | "f" | "off" | "0" => Some(false),
    _ => None
  };
}

/// Rounds to a number of decimal places.
pub fn round_to(x: f64, places: u32) -> f64 {
  let factor = 10.0_f64.powi(places as i32);
  return (x * factor).round() / factor;
}

/// Removes one layer of surrounding single or double quotes.
pub fn unquote(s: &str) -> &str {
  let s = s.trim();
  for q in ['"', '\''] {
    if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
      return &s[1..s.len()-1];
    }
  }
  return s.trim_matches(['"', '\'']);
}

/// A field in a whitespace-separated line, classified by what it parses as.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LineField<'s> {
  /// An integer.
  Integer(i64),
  /// A real.
  Real(f64),
  /// Something else.
  Text(&'s str)
}

/// Breaks a line down into classified whitespace-separated fields.
pub fn line_breakdown(line: &str) -> impl Iterator<Item = LineField<'_>> {
  return line.split_whitespace().map(|tok| {
    if let Some(i) = parse_integer(tok) {
      return LineField::Integer(i);
    }
    if let Some(x) = parse_real(tok) {
      return LineField::Real(x);
    }
    return LineField::Text(tok);
  });
}

/// Returns the n-th real number in a line, integers included.
pub fn nth_real(line: &str, n: usize) -> Option<f64> {
  return line_breakdown(line)
    .filter_map(|f| match f {
      LineField::Integer(i) => Some(i as f64),
      LineField::Real(x) => Some(x),
      LineField::Text(_) => None
    })
    .nth(n);
}

/// Returns the n-th integer in a line.
pub fn nth_integer(line: &str, n: usize) -> Option<i64> {
  return line_breakdown(line)
    .filter_map(|f| if let LineField::Integer(i) = f { Some(i) } else { None })
    .nth(n);
}

/// Formats a real the way it is used as a record key: integral values keep a
/// trailing `.0` so that depth keys look like the file wrote them.
pub fn real_key(x: f64) -> String {
  if x.fract() == 0.0 && x.is_finite() {
    return format!("{:.1}", x);
  }
  return format!("{}", x);
}
