use std::sync::Arc;

use crate::{
    exception::{Exception, Flow},
    heap::ObjectId,
};

/// A runtime value.
///
/// Scalars are immutable and copied freely; `Object` is a shared reference
/// into the instance arena, so two `Object` values with the same id alias the
/// same state. Strings are `Arc<str>` because the language has no string
/// mutation and values travel across the worker thread used for timeouts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Nothin,
    Int(i64),
    Dubble(f64),
    Strin(Arc<str>),
    Bool(bool),
    Object(ObjectId),
}

impl Value {
    pub fn strin(text: impl AsRef<str>) -> Self {
        Self::Strin(Arc::from(text.as_ref()))
    }

    /// The surface-syntax name of this value's type, for error messages.
    /// Object instances report their class name at the interpreter level;
    /// this is the fallback spelling.
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Nothin => "NOTHIN",
            Self::Int(_) => "INTEGR",
            Self::Dubble(_) => "DUBBLE",
            Self::Strin(_) => "STRIN",
            Self::Bool(_) => "BOOL",
            Self::Object(_) => "OBJEKT",
        }
    }

    /// Truthiness used by `IZ`, `WHILE`, and the logical operators.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nothin => false,
            Self::Int(i) => *i != 0,
            Self::Dubble(d) => *d != 0.0,
            Self::Strin(s) => !s.is_empty(),
            Self::Bool(b) => *b,
            Self::Object(_) => true,
        }
    }

    /// `SAEM AS`: same tag and content for scalars, identity for objects.
    pub fn saem_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nothin, Self::Nothin) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Dubble(a), Self::Dubble(b)) => a == b,
            (Self::Strin(a), Self::Strin(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }

    /// Canonical textual form of a scalar: decimal integers, shortest
    /// round-trip doubles, `YEZ`/`NO` booleans, empty string for `NOTHIN`.
    pub fn scalar_to_strin(&self) -> Option<String> {
        match self {
            Self::Nothin => Some(String::new()),
            Self::Int(i) => Some(i.to_string()),
            Self::Dubble(d) => {
                let mut buffer = ryu::Buffer::new();
                Some(buffer.format(*d).to_owned())
            }
            Self::Strin(s) => Some(s.to_string()),
            Self::Bool(true) => Some("YEZ".to_owned()),
            Self::Bool(false) => Some("NO".to_owned()),
            Self::Object(_) => None,
        }
    }

    /// Casts to INTEGR. `NOTHIN` becomes the INTEGR default, `0`.
    pub fn cast_to_int(&self) -> Result<i64, String> {
        match self {
            Self::Nothin => Ok(0),
            Self::Int(i) => Ok(*i),
            Self::Dubble(d) => {
                if d.is_finite() && (i64::MIN as f64..=i64::MAX as f64).contains(d) {
                    Ok(*d as i64)
                } else {
                    Err(format!("cannot cast DUBBLE {d} to INTEGR"))
                }
            }
            Self::Strin(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("cannot cast STRIN \"{s}\" to INTEGR")),
            Self::Bool(b) => Ok(i64::from(*b)),
            Self::Object(_) => Err("cannot cast an object to INTEGR".to_owned()),
        }
    }

    /// Casts to DUBBLE. `NOTHIN` becomes `0.0`.
    pub fn cast_to_dubble(&self) -> Result<f64, String> {
        match self {
            Self::Nothin => Ok(0.0),
            Self::Int(i) => Ok(*i as f64),
            Self::Dubble(d) => Ok(*d),
            Self::Strin(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("cannot cast STRIN \"{s}\" to DUBBLE")),
            Self::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Self::Object(_) => Err("cannot cast an object to DUBBLE".to_owned()),
        }
    }

    /// Casts to BOOL. Strings accept the canonical `YEZ`/`NO` spellings (and
    /// the empty string as `NO`) so that `to_bool(to_string(b)) == b`.
    pub fn cast_to_bool(&self) -> Result<bool, String> {
        match self {
            Self::Nothin => Ok(false),
            Self::Int(i) => Ok(*i != 0),
            Self::Dubble(d) => Ok(*d != 0.0),
            Self::Bool(b) => Ok(*b),
            Self::Strin(s) => match s.trim().to_uppercase().as_str() {
                "YEZ" => Ok(true),
                "NO" | "" => Ok(false),
                _ => Err(format!("cannot cast STRIN \"{s}\" to BOOL")),
            },
            Self::Object(_) => Err("cannot cast an object to BOOL".to_owned()),
        }
    }
}

/// `MOAR`: numeric addition with wrapping integers and double contagion;
/// STRIN operands concatenate.
pub(crate) fn op_moar(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Strin(a), Value::Strin(b)) => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(Value::strin(out))
        }
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
        _ => numeric_pair(left, right, "MOAR").map(|(a, b)| Value::Dubble(a + b)),
    }
}

/// `LES`: subtraction.
pub(crate) fn op_les(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
        _ => numeric_pair(left, right, "LES").map(|(a, b)| Value::Dubble(a - b)),
    }
}

/// `TIEMZ`: multiplication.
pub(crate) fn op_tiemz(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
        _ => numeric_pair(left, right, "TIEMZ").map(|(a, b)| Value::Dubble(a * b)),
    }
}

/// `DIVIDEZ`: division. Integer division truncates toward zero; dividing by
/// zero raises the catchable `Division by zero` exception.
pub(crate) fn op_dividez(left: &Value, right: &Value) -> Result<Value, Flow> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(Flow::Throw(Exception::new("Division by zero")));
            }
            Ok(Value::Int(a.wrapping_div(*b)))
        }
        _ => {
            let (a, b) = numeric_pair(left, right, "DIVIDEZ").map_err(type_error)?;
            if b == 0.0 {
                return Err(Flow::Throw(Exception::new("Division by zero")));
            }
            Ok(Value::Dubble(a / b))
        }
    }
}

/// `BIGGR THAN` / `SMALLR THAN`: numeric comparison with double contagion;
/// two STRIN operands compare lexicographically.
pub(crate) fn op_compare(left: &Value, right: &Value, greater: bool) -> Result<Value, String> {
    match (left, right) {
        (Value::Strin(a), Value::Strin(b)) => Ok(Value::Bool(if greater { a > b } else { a < b })),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(if greater { a > b } else { a < b })),
        _ => {
            let (a, b) = numeric_pair(left, right, if greater { "BIGGR THAN" } else { "SMALLR THAN" })?;
            Ok(Value::Bool(if greater { a > b } else { a < b }))
        }
    }
}

fn numeric_pair(left: &Value, right: &Value, op: &str) -> Result<(f64, f64), String> {
    let a = as_number(left).ok_or_else(|| bad_operand(left, op))?;
    let b = as_number(right).ok_or_else(|| bad_operand(right, op))?;
    Ok((a, b))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Dubble(d) => Some(*d),
        _ => None,
    }
}

fn bad_operand(value: &Value, op: &str) -> String {
    format!("operator {op} does not accept {}", value.type_of())
}

fn type_error(message: String) -> Flow {
    Flow::fatal(crate::error::ErrorKind::TypeError, message)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn double_contagion() {
        let result = op_moar(&Value::Int(1), &Value::Dubble(0.5)).unwrap();
        assert_eq!(result, Value::Dubble(1.5));
    }

    #[test]
    fn integer_arithmetic_wraps() {
        let result = op_moar(&Value::Int(i64::MAX), &Value::Int(1)).unwrap();
        assert_eq!(result, Value::Int(i64::MIN));
    }

    #[test]
    fn division_by_zero_is_catchable() {
        let err = op_dividez(&Value::Int(1), &Value::Int(0)).unwrap_err();
        assert!(matches!(err, Flow::Throw(exc) if exc.message == "Division by zero"));
    }

    #[test]
    fn integer_division_truncates() {
        assert_eq!(op_dividez(&Value::Int(7), &Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(op_dividez(&Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-3));
    }

    #[test]
    fn string_concatenation() {
        let result = op_moar(&Value::strin("foo"), &Value::strin("bar")).unwrap();
        assert_eq!(result, Value::strin("foobar"));
    }

    #[test]
    fn saem_as_requires_matching_tags() {
        assert!(Value::Int(1).saem_as(&Value::Int(1)));
        assert!(!Value::Int(1).saem_as(&Value::Dubble(1.0)));
        assert!(!Value::strin("1").saem_as(&Value::Int(1)));
        assert!(Value::Nothin.saem_as(&Value::Nothin));
    }

    #[test]
    fn canonical_text() {
        assert_eq!(Value::Int(-42).scalar_to_strin().unwrap(), "-42");
        assert_eq!(Value::Bool(true).scalar_to_strin().unwrap(), "YEZ");
        assert_eq!(Value::Bool(false).scalar_to_strin().unwrap(), "NO");
        assert_eq!(Value::Nothin.scalar_to_strin().unwrap(), "");
        assert_eq!(Value::Dubble(2.5).scalar_to_strin().unwrap(), "2.5");
    }

    #[test]
    fn integer_text_round_trips() {
        for i in [0i64, 1, -1, 42, i64::MAX, i64::MIN] {
            let text = Value::Int(i).scalar_to_strin().unwrap();
            assert_eq!(Value::strin(text).cast_to_int().unwrap(), i);
        }
    }

    #[test]
    fn bool_text_round_trips() {
        for b in [true, false] {
            let text = Value::Bool(b).scalar_to_strin().unwrap();
            assert_eq!(Value::strin(text).cast_to_bool().unwrap(), b);
        }
    }

    #[test]
    fn double_truncates_toward_zero_when_cast_to_int() {
        assert_eq!(Value::Dubble(5.7).cast_to_int().unwrap(), 5);
        assert_eq!(Value::Dubble(-5.7).cast_to_int().unwrap(), -5);
    }

    #[test]
    fn nothin_casts_to_defaults() {
        assert_eq!(Value::Nothin.cast_to_int().unwrap(), 0);
        assert_eq!(Value::Nothin.cast_to_dubble().unwrap(), 0.0);
        assert!(!Value::Nothin.cast_to_bool().unwrap());
    }

    #[test]
    fn string_to_number_parse_failure() {
        assert!(Value::strin("forty two").cast_to_int().is_err());
        assert!(Value::strin("3.5.1").cast_to_dubble().is_err());
    }
}
