//! Values flowing through the evaluator. The language is text-first;
//! numbers and booleans appear in expressions and convert to text at the
//! emission boundary.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::expression::Error;

/// The first decimal number in a string, the way `val()` scans for it.
static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?").expect("static pattern"));
static HEX_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0[xX][0-9a-fA-F]+").expect("static pattern"));

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    pub fn empty() -> Self {
        Value::Str(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Bool(b) => *b,
        }
    }

    /// Numeric view of the value; strings must parse in full.
    pub fn as_number(&self) -> Result<f64, Error> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::NonNumeric(s.clone())),
        }
    }

    pub fn as_int(&self) -> Result<i64, Error> {
        self.as_number().map(|f| f as i64)
    }

    fn as_int_exact(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// First numeric token found in a string, 0 when there is none.
    pub fn scan_number(text: &str) -> f64 {
        NUMBER
            .find(text)
            .and_then(|m| m.as_str().parse().ok())
            .or_else(|| {
                HEX_NUMBER
                    .find(text)
                    .and_then(|m| i64::from_str_radix(&m.as_str()[2..], 16).ok())
                    .map(|v| v as f64)
            })
            .unwrap_or(0.0)
    }

    /// Every numeric token in a string, in order.
    pub fn scan_numbers(text: &str) -> Vec<f64> {
        NUMBER
            .find_iter(text)
            .filter_map(|m| m.as_str().parse().ok())
            .collect()
    }

    pub fn add(self, rhs: Value) -> Result<Value, Error> {
        match (&self, &rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => match (self.as_int_exact(), rhs.as_int_exact()) {
                (Some(a), Some(b)) => Ok(Value::Int(a + b)),
                _ => Ok(Value::Float(self.as_number()? + rhs.as_number()?)),
            },
        }
    }

    pub fn sub(self, rhs: Value) -> Result<Value, Error> {
        match (self.as_int_exact(), rhs.as_int_exact()) {
            (Some(a), Some(b)) => Ok(Value::Int(a - b)),
            _ => Ok(Value::Float(self.as_number()? - rhs.as_number()?)),
        }
    }

    pub fn mul(self, rhs: Value) -> Result<Value, Error> {
        match (self.as_int_exact(), rhs.as_int_exact()) {
            (Some(a), Some(b)) => Ok(Value::Int(a * b)),
            _ => Ok(Value::Float(self.as_number()? * rhs.as_number()?)),
        }
    }

    /// Division is always fractional.
    pub fn div(self, rhs: Value) -> Result<Value, Error> {
        let divisor = rhs.as_number()?;
        if divisor == 0.0 {
            return Err(Error::DivisionByZero);
        }
        Ok(Value::Float(self.as_number()? / divisor))
    }

    pub fn rem(self, rhs: Value) -> Result<Value, Error> {
        match (self.as_int_exact(), rhs.as_int_exact()) {
            (Some(a), Some(b)) if b != 0 => Ok(Value::Int(a.rem_euclid(b))),
            (Some(_), Some(_)) => Err(Error::DivisionByZero),
            _ => {
                let divisor = rhs.as_number()?;
                if divisor == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                Ok(Value::Float(self.as_number()?.rem_euclid(divisor)))
            }
        }
    }

    /// Three-way comparison: textual when both sides are strings, numeric
    /// otherwise.
    pub fn compare(&self, rhs: &Value) -> Result<std::cmp::Ordering, Error> {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => self
                .as_number()?
                .partial_cmp(&rhs.as_number()?)
                .ok_or_else(|| Error::NonNumeric("NaN".to_owned())),
        }
    }

    /// The `:` operator: does the left text contain the right one.
    pub fn contains(&self, rhs: &Value) -> bool {
        self.to_string().contains(&rhs.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        assert_eq!(
            Value::Int(2).add(Value::Int(3)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            Value::from("ab").add(Value::from("cd")).unwrap(),
            Value::from("abcd")
        );
        assert_eq!(
            Value::Int(7).div(Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
        assert!(Value::Int(1).div(Value::Int(0)).is_err());
        assert!(Value::from("x").add(Value::Int(1)).is_err());
    }

    #[test]
    fn comparisons() {
        use std::cmp::Ordering::*;
        assert_eq!(Value::Int(1).compare(&Value::Float(1.5)).unwrap(), Less);
        assert_eq!(
            Value::from("abc").compare(&Value::from("abd")).unwrap(),
            Less
        );
        assert!(Value::from("abc").contains(&Value::from("bc")));
        assert!(!Value::from("abc").contains(&Value::from("x")));
    }

    #[test]
    fn number_scanning() {
        assert_eq!(Value::scan_number("rodrigo 1.5 senra 2.0"), 1.5);
        assert_eq!(Value::scan_number("no digits"), 0.0);
        assert_eq!(Value::scan_numbers("a1.5b2.0"), vec![1.5, 2.0]);
    }

    #[test]
    fn display() {
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::from("x").to_string(), "x");
    }
}
