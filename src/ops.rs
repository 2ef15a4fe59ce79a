//! Operator semantics: scalar arithmetic, comparison and logic, plus the
//! element-wise broadcasting applied when an operand is an array.

use std::cmp::Ordering;

use crate::{
    ast::{BinaryOperator, UnaryOperator},
    common::Error,
    value::Value,
};

fn unsupported(op: BinaryOperator, left: &Value, right: &Value) -> Error {
    Error::type_error(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

fn overflow(op: BinaryOperator) -> Error {
    Error::value(format!("integer overflow in '{}'", op))
}

/// Applies `op` to two evaluated operands.
///
/// When either side is an array only `+ - * / **` are accepted, and they
/// distribute element-wise: two arrays pair up by index and must have the same
/// length, a scalar is broadcast against every element. Nested arrays recurse.
pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, Error> {
    match (left, right) {
        (Value::Array(_), _) | (_, Value::Array(_)) if !op.is_vectorized() => {
            Err(unsupported(op, left, right))
        }
        (Value::Array(lhs), Value::Array(rhs)) => {
            if lhs.len() != rhs.len() {
                return Err(Error::value(format!(
                    "arrays must have the same length for '{}' ({} vs {})",
                    op,
                    lhs.len(),
                    rhs.len()
                )));
            }
            lhs.iter()
                .zip(rhs)
                .map(|(l, r)| binary(op, l, r))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        (Value::Array(lhs), scalar) => lhs
            .iter()
            .map(|l| binary(op, l, scalar))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (scalar, Value::Array(rhs)) => rhs
            .iter()
            .map(|r| binary(op, scalar, r))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => scalar(op, left, right),
    }
}

fn scalar(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, Error> {
    use BinaryOperator::*;

    match op {
        Add | Sub | Mul => arithmetic(op, left, right),
        Div => divide(left, right),
        Mod => modulo(left, right),
        Pow => power(left, right),
        Eq => Ok(Value::Bool(left == right)),
        NotEq => Ok(Value::Bool(left != right)),
        Lt | Gt | LtEq | GtEq => {
            let ordering = compare(op, left, right)?;
            Ok(Value::Bool(match op {
                Lt => ordering == Ordering::Less,
                Gt => ordering == Ordering::Greater,
                LtEq => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        And | Or => match (left, right) {
            (Value::Bool(l), Value::Bool(r)) => {
                Ok(Value::Bool(if op == And { *l && *r } else { *l || *r }))
            }
            _ => Err(unsupported(op, left, right)),
        },
    }
}

fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, Error> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            let result = match op {
                BinaryOperator::Add => l.checked_add(*r),
                BinaryOperator::Sub => l.checked_sub(*r),
                _ => l.checked_mul(*r),
            };
            result.map(Value::Int).ok_or_else(|| overflow(op))
        }
        (Value::Str(l), Value::Str(r)) if op == BinaryOperator::Add => {
            Ok(Value::Str(format!("{}{}", l, r)))
        }
        (Value::Str(string), Value::Int(count)) | (Value::Int(count), Value::Str(string))
            if op == BinaryOperator::Mul =>
        {
            repeat(string, *count)
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => Ok(Value::Float(match op {
                BinaryOperator::Add => l + r,
                BinaryOperator::Sub => l - r,
                _ => l * r,
            })),
            _ => Err(unsupported(op, left, right)),
        },
    }
}

/// Upper bound on the byte length of a string built by `*`.
const MAX_REPEAT_LEN: usize = 1 << 28;

/// A non-positive count gives the empty string.
fn repeat(string: &str, count: i64) -> Result<Value, Error> {
    let count = usize::try_from(count).unwrap_or(0);
    match string.len().checked_mul(count) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(Value::Str(string.repeat(count))),
        _ => Err(Error::value("repeated string is too long")),
    }
}

fn divide(left: &Value, right: &Value) -> Result<Value, Error> {
    match (left.as_f64(), right.as_f64()) {
        (Some(_), Some(r)) if r == 0.0 => Err(Error::value("division by zero")),
        (Some(l), Some(r)) => Ok(Value::Float(l / r)),
        _ => Err(unsupported(BinaryOperator::Div, left, right)),
    }
}

/// Floored modulo: the result takes the sign of the divisor.
fn modulo(left: &Value, right: &Value) -> Result<Value, Error> {
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => Err(Error::value("modulo by zero")),
        (Value::Int(l), Value::Int(r)) => {
            let rem = l
                .checked_rem(*r)
                .ok_or_else(|| overflow(BinaryOperator::Mod))?;
            Ok(Value::Int(if rem != 0 && (rem < 0) != (*r < 0) {
                rem + r
            } else {
                rem
            }))
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(_), Some(r)) if r == 0.0 => Err(Error::value("modulo by zero")),
            (Some(l), Some(r)) => {
                let rem = l % r;
                Ok(Value::Float(if rem != 0.0 && (rem < 0.0) != (r < 0.0) {
                    rem + r
                } else {
                    rem
                }))
            }
            _ => Err(unsupported(BinaryOperator::Mod, left, right)),
        },
    }
}

fn power(left: &Value, right: &Value) -> Result<Value, Error> {
    match (left, right) {
        (Value::Int(base), Value::Int(exp)) if *exp >= 0 => match *base {
            // exponents past u32 are still exact for these bases
            1 => Ok(Value::Int(1)),
            0 => Ok(Value::Int(if *exp == 0 { 1 } else { 0 })),
            -1 => Ok(Value::Int(if exp % 2 == 0 { 1 } else { -1 })),
            _ => u32::try_from(*exp)
                .ok()
                .and_then(|exp| base.checked_pow(exp))
                .map(Value::Int)
                .ok_or_else(|| overflow(BinaryOperator::Pow)),
        },
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(base), Some(exp)) => Ok(Value::Float(base.powf(exp))),
            _ => Err(unsupported(BinaryOperator::Pow, left, right)),
        },
    }
}

fn compare(op: BinaryOperator, left: &Value, right: &Value) -> Result<Ordering, Error> {
    let ordering = match (left, right) {
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => return Err(unsupported(op, left, right)),
        },
    };

    // NaN compares false against everything
    Ok(ordering.unwrap_or(match op {
        BinaryOperator::Lt | BinaryOperator::LtEq => Ordering::Greater,
        _ => Ordering::Less,
    }))
}

pub fn unary(op: UnaryOperator, operand: &Value) -> Result<Value, Error> {
    match op {
        UnaryOperator::Neg => match operand {
            Value::Int(number) => number
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| Error::value("integer overflow in unary '-'")),
            Value::Float(number) => Ok(Value::Float(-number)),
            other => Err(Error::type_error(format!(
                "bad operand type for unary -: '{}'",
                other.type_name()
            ))),
        },
        UnaryOperator::Not => Ok(Value::Bool(!operand.is_truthy())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use pretty_assertions::assert_eq;
    use BinaryOperator::*;

    fn ints(values: &[i64]) -> Value {
        Value::Array(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn integer_arithmetic_stays_integral_except_division() {
        assert_eq!(binary(Add, &Value::Int(2), &Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(binary(Mul, &Value::Int(4), &Value::Int(-3)), Ok(Value::Int(-12)));
        assert_eq!(binary(Div, &Value::Int(7), &Value::Int(2)), Ok(Value::Float(3.5)));
        assert!(matches!(binary(Div, &Value::Int(6), &Value::Int(3)), Ok(Value::Float(f)) if f == 2.0));
        assert_eq!(binary(Add, &Value::Int(1), &Value::Float(0.5)), Ok(Value::Float(1.5)));
    }

    #[test]
    fn floored_modulo() {
        assert_eq!(binary(Mod, &Value::Int(7), &Value::Int(3)), Ok(Value::Int(1)));
        assert_eq!(binary(Mod, &Value::Int(-7), &Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(binary(Mod, &Value::Int(7), &Value::Int(-3)), Ok(Value::Int(-2)));
        assert_eq!(binary(Mod, &Value::Float(5.5), &Value::Int(2)), Ok(Value::Float(1.5)));
        assert_eq!(
            binary(Mod, &Value::Int(1), &Value::Int(0)).unwrap_err().kind(),
            ErrorKind::Value
        );
    }

    #[test]
    fn power_rules() {
        assert_eq!(binary(Pow, &Value::Int(2), &Value::Int(10)), Ok(Value::Int(1024)));
        assert_eq!(binary(Pow, &Value::Int(2), &Value::Int(-1)), Ok(Value::Float(0.5)));
        assert_eq!(binary(Pow, &Value::Float(2.0), &Value::Int(3)), Ok(Value::Float(8.0)));
        assert_eq!(
            binary(Pow, &Value::Int(10), &Value::Int(40)).unwrap_err().kind(),
            ErrorKind::Value
        );
    }

    #[test]
    fn huge_exponents_on_unit_bases() {
        let huge = Value::Int(5_000_000_000);
        assert_eq!(binary(Pow, &Value::Int(1), &huge), Ok(Value::Int(1)));
        assert_eq!(binary(Pow, &Value::Int(0), &huge), Ok(Value::Int(0)));
        assert_eq!(binary(Pow, &Value::Int(0), &Value::Int(0)), Ok(Value::Int(1)));
        assert_eq!(binary(Pow, &Value::Int(-1), &huge), Ok(Value::Int(1)));
        assert_eq!(binary(Pow, &Value::Int(-1), &Value::Int(5_000_000_001)), Ok(Value::Int(-1)));
        assert_eq!(binary(Pow, &Value::Int(2), &huge).unwrap_err().kind(), ErrorKind::Value);
    }

    #[test]
    fn division_by_zero_is_a_value_error() {
        let err = binary(Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(err.message, "division by zero");
    }

    #[test]
    fn strings() {
        assert_eq!(
            binary(Add, &Value::Str("ab".into()), &Value::Str("cd".into())),
            Ok(Value::Str("abcd".into()))
        );
        assert_eq!(
            binary(Mul, &Value::Int(3), &Value::Str("ha".into())),
            Ok(Value::Str("hahaha".into()))
        );
        assert_eq!(
            binary(Lt, &Value::Str("apple".into()), &Value::Str("banana".into())),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            binary(Mul, &Value::Str("ab".into()), &Value::Int(-2)),
            Ok(Value::Str(String::new()))
        );
        let err = binary(Add, &Value::Str("a".into()), &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.message, "unsupported operand types for +: 'string' and 'int'");
    }

    #[test]
    fn oversized_repetition_is_a_value_error() {
        for count in [i64::MAX, 1 << 40] {
            let err = binary(Mul, &Value::Str("abc".into()), &Value::Int(count)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Value);
            assert_eq!(err.message, "repeated string is too long");
        }
    }

    #[test]
    fn vectorized_pairs_and_broadcasts() {
        assert_eq!(binary(Add, &ints(&[1, 2, 3]), &ints(&[10, 20, 30])), Ok(ints(&[11, 22, 33])));
        assert_eq!(binary(Mul, &ints(&[1, 2, 3]), &Value::Int(2)), Ok(ints(&[2, 4, 6])));
        assert_eq!(binary(Sub, &Value::Int(10), &ints(&[1, 2])), Ok(ints(&[9, 8])));
        assert_eq!(binary(Pow, &ints(&[1, 2, 3]), &Value::Int(2)), Ok(ints(&[1, 4, 9])));
        assert_eq!(
            binary(Div, &ints(&[1, 2]), &Value::Int(2)),
            Ok(Value::Array(vec![Value::Float(0.5), Value::Float(1.0)]))
        );
        assert_eq!(
            binary(Add, &Value::Array(vec![ints(&[1, 2]), Value::Int(3)]), &Value::Int(1)),
            Ok(Value::Array(vec![ints(&[2, 3]), Value::Int(4)]))
        );
        assert_eq!(binary(Add, &ints(&[]), &Value::Int(1)), Ok(ints(&[])));
    }

    #[test]
    fn vectorized_length_mismatch() {
        let err = binary(Add, &ints(&[1, 2, 3]), &ints(&[1, 2])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(err.message, "arrays must have the same length for '+' (3 vs 2)");
    }

    #[test]
    fn non_vectorized_operators_reject_arrays() {
        for op in [Mod, Eq, NotEq, Lt, Gt, LtEq, GtEq, And, Or] {
            let err = binary(op, &ints(&[1]), &Value::Int(1)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Type, "{}", op);
        }
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(binary(Lt, &Value::Int(1), &Value::Float(1.5)), Ok(Value::Bool(true)));
        assert_eq!(binary(GtEq, &Value::Int(2), &Value::Int(2)), Ok(Value::Bool(true)));
        assert_eq!(binary(Eq, &Value::Int(2), &Value::Float(2.0)), Ok(Value::Bool(true)));
        assert_eq!(binary(NotEq, &Value::Int(2), &Value::Str("2".into())), Ok(Value::Bool(true)));
        assert_eq!(binary(Lt, &Value::Float(f64::NAN), &Value::Int(1)), Ok(Value::Bool(false)));
        assert_eq!(binary(GtEq, &Value::Float(f64::NAN), &Value::Int(1)), Ok(Value::Bool(false)));
        assert_eq!(binary(And, &Value::Bool(true), &Value::Bool(false)), Ok(Value::Bool(false)));
        assert_eq!(binary(Or, &Value::Bool(true), &Value::Bool(false)), Ok(Value::Bool(true)));
        assert_eq!(
            binary(And, &Value::Int(1), &Value::Bool(true)).unwrap_err().kind(),
            ErrorKind::Type
        );
        assert_eq!(
            binary(Lt, &Value::Bool(true), &Value::Int(1)).unwrap_err().kind(),
            ErrorKind::Type
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(unary(UnaryOperator::Neg, &Value::Int(3)), Ok(Value::Int(-3)));
        assert_eq!(unary(UnaryOperator::Neg, &Value::Float(1.5)), Ok(Value::Float(-1.5)));
        assert_eq!(unary(UnaryOperator::Not, &Value::Int(0)), Ok(Value::Bool(true)));
        assert_eq!(unary(UnaryOperator::Not, &Value::Bool(true)), Ok(Value::Bool(false)));
        assert_eq!(
            unary(UnaryOperator::Neg, &Value::Str("x".into())).unwrap_err().kind(),
            ErrorKind::Type
        );
    }
}
