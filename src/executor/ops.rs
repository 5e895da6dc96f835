// Copyright 2025 Molscript Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Operator semantics
//!
//! Binary and unary operators over [`Value`]. Integer arithmetic stays
//! integer where both sides are integral; anything touching a decimal goes
//! to floating point. Points, quaternions and matrices get their geometric
//! meaning, selection sets their set meaning. Combinations with no meaning
//! are a [`Error::TypeMismatch`].

use crate::core::{BitSet, Error, Matrix4, Point3, Point4, Result, Value};
use crate::functions::builtins::{format_decimal, justify};
use crate::parser::Tok;

/// Widths beyond this select case conversion rather than padding
const UPPERCASE: i32 = 9999;
const LOWERCASE: i32 = -9999;

#[inline]
fn mismatch(op: Tok, x1: &Value, x2: &Value) -> Error {
    Error::type_mismatch(op.text(), x1.type_name(), x2.type_name())
}

fn overflow(op: Tok, a: i32, b: i32) -> Error {
    Error::invalid_argument(format!("integer overflow: {} {} {}", a, op.text(), b))
}

/// Values that read as a plain number
#[inline]
fn is_numeric(v: &Value) -> bool {
    v.is_scalar() || matches!(v, Value::Bitset(_))
}

/// A string that integer arithmetic may read as an integer: no decimal
/// point and no sign or exponent sign after the first character
fn is_int_like(s: &str) -> bool {
    let t = s.trim();
    !t.contains('.') && !t.get(1..).unwrap_or("").contains(['+', '-'])
}

/// A string that parses completely as a number
fn numeric_string(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok()
}

fn concat(x1: &Value, x2: &Value) -> Value {
    let mut items = x1.to_list();
    match x2 {
        Value::Array(list) => items.extend(list.read().iter().cloned()),
        other => items.push(other.clone()),
    }
    Value::array(items)
}

/// Apply a binary operator
pub fn binary(op: Tok, x1: &Value, x2: &Value) -> Result<Value> {
    match op {
        Tok::Plus => plus(x1, x2),
        Tok::Minus => minus(x1, x2),
        Tok::Times => times(x1, x2),
        Tok::Divide => divide(x1, x2),
        Tok::LeftDivide => left_divide(x1, x2),
        Tok::Power => power(x1, x2),
        Tok::Percent => percent(x1, x2),
        Tok::And | Tok::AndFalse => Ok(and(x1, x2)),
        Tok::Or | Tok::OrTrue => Ok(or(x1, x2)),
        Tok::Xor => Ok(match (x1, x2) {
            (Value::Bitset(a), Value::Bitset(b)) => Value::Bitset(a.xor(b)),
            _ => Value::Boolean(x1.as_bool() != x2.as_bool()),
        }),
        Tok::Toggle => match (x1, x2) {
            (Value::Bitset(a), Value::Bitset(b)) => Ok(Value::Bitset(a.toggle(b))),
            _ => Err(mismatch(op, x1, x2)),
        },
        Tok::Eq => Ok(Value::Boolean(Value::are_equal(x1, x2))),
        Tok::Ne => Ok(Value::Boolean(!Value::are_equal(x1, x2))),
        Tok::Lt => Ok(Value::Boolean(x1.as_float() < x2.as_float())),
        Tok::Le => Ok(Value::Boolean(x1.as_float() <= x2.as_float())),
        Tok::Gt => Ok(Value::Boolean(x1.as_float() > x2.as_float())),
        Tok::Ge => Ok(Value::Boolean(x1.as_float() >= x2.as_float())),
        _ => Err(Error::UnexpectedToken(op.text().to_string())),
    }
}

/// Apply a unary operator. `universe` bounds the complement of a set.
pub fn unary(op: Tok, x: &Value, universe: u32) -> Result<Value> {
    match op {
        Tok::UnaryMinus => match x {
            Value::Integer(i) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| Error::invalid_argument(format!("integer overflow: -{}", i))),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Point3(p) => Ok(Value::Point3(p.scale(-1.0))),
            Value::Point4(q) => Ok(Value::Point4(q.negate())),
            Value::Matrix3(m) => Ok(m.transpose().into()),
            Value::Matrix4(m) => Ok(m.transpose().into()),
            Value::Bitset(bs) => Ok(Value::Bitset(bs.invert(universe))),
            Value::Boolean(_) | Value::String(_) => Ok(Value::Float(-x.as_float())),
            Value::Array(_) | Value::Map(_) => Err(Error::type_mismatch(
                "-",
                "",
                x.type_name(),
            )),
        },
        Tok::Not => Ok(match x {
            Value::Point4(q) => Value::Point4(q.inverse()),
            Value::Bitset(bs) => Value::Bitset(bs.invert(universe)),
            _ => Value::Boolean(!x.as_bool()),
        }),
        _ => Err(Error::UnexpectedToken(op.text().to_string())),
    }
}

// =========================================================================
// Arithmetic
// =========================================================================

/// Integer on the left: the result stays integer unless the right side is
/// a decimal or a string with a decimal point
fn integer_arith(
    op: Tok,
    a: i32,
    x1: &Value,
    x2: &Value,
    int_op: fn(i32, i32) -> Option<i32>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let integral = match x2 {
        Value::Float(_) => false,
        Value::String(s) => is_int_like(s),
        v if is_numeric(v) => true,
        _ => return Err(mismatch(op, x1, x2)),
    };
    if integral {
        let b = x2.as_int();
        int_op(a, b)
            .map(Value::Integer)
            .ok_or_else(|| overflow(op, a, b))
    } else {
        Ok(Value::Float(float_op(a as f64, x2.as_float())))
    }
}

fn float_arith(op: Tok, x1: &Value, x2: &Value, f: fn(f64, f64) -> f64) -> Result<Value> {
    if is_numeric(x1) && is_numeric(x2) {
        Ok(Value::Float(f(x1.as_float(), x2.as_float())))
    } else {
        Err(mismatch(op, x1, x2))
    }
}

fn plus(x1: &Value, x2: &Value) -> Result<Value> {
    const OP: Tok = Tok::Plus;
    match (x1, x2) {
        (Value::Array(_), _) => Ok(concat(x1, x2)),
        (Value::Integer(a), _) => integer_arith(OP, *a, x1, x2, i32::checked_add, |a, b| a + b),
        (Value::String(s), Value::Integer(_) | Value::Float(_)) => match numeric_string(s) {
            Some(f) if x2.is_integer() && is_int_like(s) => {
                let (a, b) = (f as i32, x2.as_int());
                a.checked_add(b)
                    .map(Value::Integer)
                    .ok_or_else(|| overflow(OP, a, b))
            }
            Some(f) => Ok(Value::Float(f + x2.as_float())),
            None => Ok(Value::string(format!("{}{}", s, x2.as_string()))),
        },
        (Value::String(s), _) => Ok(Value::string(format!("{}{}", s, x2.as_string()))),
        (Value::Point4(q1), Value::Point4(q2)) => Ok(Value::Point4(q1.quaternion_mul(q2))),
        (Value::Point4(q), v) if v.is_scalar() => Ok(Value::Point4(Point4::from_axis_angle(
            &q.axis(),
            q.theta() + v.as_float(),
        ))),
        (Value::Point3(a), Value::Point3(b)) => Ok(Value::Point3(a.add(b))),
        (Value::Point3(a), Value::Point4(b)) => Ok(Value::Point3(a.add(&b.vector()))),
        (Value::Point3(a), v) if v.is_scalar() => Ok(Value::Point3(a.offset(v.as_float()))),
        (Value::Matrix3(a), Value::Matrix3(b)) => Ok(a.add(b).into()),
        (Value::Matrix3(a), Value::Point3(t)) => Ok(Matrix4::from_parts(a, t).into()),
        (Value::Matrix4(a), Value::Matrix4(b)) => Ok(a.add(b).into()),
        (Value::Map(a), Value::Map(b)) => {
            let mut merged = a.read().clone();
            merged.extend(b.read().iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Value::map(merged))
        }
        _ => float_arith(OP, x1, x2, |a, b| a + b),
    }
}

fn minus(x1: &Value, x2: &Value) -> Result<Value> {
    const OP: Tok = Tok::Minus;
    match (x1, x2) {
        (Value::Integer(a), _) => integer_arith(OP, *a, x1, x2, i32::checked_sub, |a, b| a - b),
        (Value::String(s), Value::Integer(b)) if is_int_like(s) && numeric_string(s).is_some() => {
            let a = x1.as_int();
            a.checked_sub(*b)
                .map(Value::Integer)
                .ok_or_else(|| overflow(OP, a, *b))
        }
        (Value::Map(map), key) => {
            let mut copy = map.read().clone();
            copy.remove(&key.as_string());
            Ok(Value::map(copy))
        }
        (Value::Matrix3(a), Value::Matrix3(b)) => Ok(a.sub(b).into()),
        (Value::Matrix4(a), Value::Matrix4(b)) => Ok(a.sub(b).into()),
        (Value::Point3(a), Value::Point3(b)) => Ok(Value::Point3(a.sub(b))),
        (Value::Point3(a), Value::Point4(b)) => Ok(Value::Point3(a.sub(&b.vector()))),
        (Value::Point3(a), v) if v.is_scalar() => Ok(Value::Point3(a.offset(-v.as_float()))),
        (Value::Point4(q1), Value::Point4(q2)) => {
            Ok(Value::Point4(q2.quaternion_mul(&q1.inverse())))
        }
        (Value::Point4(q), v) if v.is_scalar() => Ok(Value::Point4(Point4::from_axis_angle(
            &q.axis(),
            q.theta() - v.as_float(),
        ))),
        _ => float_arith(OP, x1, x2, |a, b| a - b),
    }
}

fn times(x1: &Value, x2: &Value) -> Result<Value> {
    const OP: Tok = Tok::Times;
    match (x1, x2) {
        (Value::Matrix3(m), Value::Point3(p)) => Ok(Value::Point3(m.transform(p))),
        (Value::Point3(p), Value::Matrix3(m)) => Ok(Value::Point3(m.transpose().transform(p))),
        (Value::Matrix3(a), Value::Matrix3(b)) => Ok(a.mul(b).into()),
        (Value::Matrix4(m), Value::Point3(p)) => Ok(Value::Point3(m.transform(p))),
        (Value::Matrix4(m), Value::Point4(q)) => Ok(Value::Point4(m.transform4(q))),
        (Value::Matrix4(a), Value::Matrix4(b)) => Ok(a.mul(b).into()),
        (Value::Point4(q), Value::Matrix4(m)) => Ok(Value::Point4(m.transpose().transform4(q))),
        (Value::Point3(a), Value::Point3(b)) => Ok(Value::Float(a.dot(b))),
        (Value::Point4(a), Value::Point4(b)) => Ok(Value::Point4(a.quaternion_mul(b))),
        (Value::Matrix3(m), v) | (v, Value::Matrix3(m)) if v.is_scalar() => {
            Ok(m.scale(v.as_float()).into())
        }
        (Value::Matrix4(m), v) | (v, Value::Matrix4(m)) if v.is_scalar() => {
            Ok(m.scale(v.as_float()).into())
        }
        (Value::Point3(p), v) | (v, Value::Point3(p)) if v.is_scalar() => {
            Ok(Value::Point3(p.scale(v.as_float())))
        }
        (Value::Point4(q), v) | (v, Value::Point4(q)) if v.is_scalar() => {
            Ok(Value::Point4(q.scale(v.as_float())))
        }
        (Value::Integer(a), _) => integer_arith(OP, *a, x1, x2, i32::checked_mul, |a, b| a * b),
        _ => float_arith(OP, x1, x2, |a, b| a * b),
    }
}

fn divide(x1: &Value, x2: &Value) -> Result<Value> {
    const OP: Tok = Tok::Divide;
    match (x1, x2) {
        (Value::Integer(a), Value::Integer(b)) if *b != 0 => a
            .checked_div(*b)
            .map(Value::Integer)
            .ok_or_else(|| overflow(OP, *a, *b)),
        (Value::Point3(p), v) if v.is_scalar() => {
            let f = v.as_float();
            Ok(Value::Point3(if f == 0.0 {
                Point3::new(f64::NAN, f64::NAN, f64::NAN)
            } else {
                p.scale(1.0 / f)
            }))
        }
        (Value::Point4(a), Value::Point4(b)) => Ok(Value::Point4(a.quaternion_div(b))),
        (Value::Point4(q), v) if v.is_scalar() => {
            let f = v.as_float();
            Ok(Value::Point4(if f == 0.0 {
                Point4::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
            } else {
                q.scale(1.0 / f)
            }))
        }
        _ => float_arith(OP, x1, x2, |a, b| a / b),
    }
}

/// `a \ b`: integer quotient, zero when `b` is zero
fn left_divide(x1: &Value, x2: &Value) -> Result<Value> {
    if !is_numeric(x1) || !is_numeric(x2) {
        return Err(mismatch(Tok::LeftDivide, x1, x2));
    }
    let f = x2.as_float();
    if f == 0.0 {
        return Ok(Value::Integer(0));
    }
    Ok(Value::Integer((x1.as_float() / f) as i32))
}

fn power(x1: &Value, x2: &Value) -> Result<Value> {
    if !is_numeric(x1) || !is_numeric(x2) {
        return Err(mismatch(Tok::Power, x1, x2));
    }
    let f = x1.as_float().powf(x2.as_float());
    if x1.is_integer() && x2.is_integer() {
        Ok(Value::Integer(f as i32))
    } else {
        Ok(Value::Float(f))
    }
}

/// `%` is modulus on integers and formatting on everything else
fn percent(x1: &Value, x2: &Value) -> Result<Value> {
    const OP: Tok = Tok::Percent;
    if !is_numeric(x2) && !matches!((x1, x2), (Value::Point4(_), Value::Point3(_))) {
        return Err(mismatch(OP, x1, x2));
    }
    let n = x2.as_int();
    match x1 {
        Value::Float(f) => {
            if n == 0 {
                Ok(Value::Integer(f.round() as i32))
            } else {
                Ok(Value::string(format_decimal(*f, n)))
            }
        }
        Value::String(s) => Ok(Value::string(format_text(s, n))),
        Value::Array(list) => Ok(Value::array(
            list.read()
                .iter()
                .map(|v| match v {
                    Value::Float(f) if n != 0 => Value::string(format_decimal(*f, n)),
                    other => Value::string(format_text(&other.as_string(), n)),
                })
                .collect(),
        )),
        Value::Point4(q) => match x2 {
            Value::Point3(p) => Ok(Value::Point3(q.to_matrix3().transform(p))),
            _ => Ok(match n {
                0 => Value::Float(q.w),
                1 => Value::Float(q.x),
                2 => Value::Float(q.y),
                3 => Value::Float(q.z),
                4 => Value::Point3(q.axis()),
                -1 => Value::Point3(q.vector()),
                -2 => Value::Float(q.theta()),
                _ => x1.clone(),
            }),
        },
        Value::Matrix4(m) => Ok(match n {
            1 => m.rotation().into(),
            2 => Value::Point3(m.translation()),
            _ => x1.clone(),
        }),
        Value::Bitset(bs) => Ok(Value::Bitset(first_members(bs, n))),
        Value::Point3(_) | Value::Matrix3(_) | Value::Map(_) => Err(mismatch(OP, x1, x2)),
        Value::Boolean(_) | Value::Integer(_) => {
            let a = x1.as_int();
            if n == 0 {
                return Ok(Value::Integer(0));
            }
            a.checked_rem(n)
                .map(Value::Integer)
                .ok_or_else(|| overflow(OP, a, n))
        }
    }
}

fn format_text(s: &str, n: i32) -> String {
    match n {
        0 => s.trim_matches(|c| c == '\n' || c == '\t' || c == ' ').to_string(),
        UPPERCASE => s.to_uppercase(),
        LOWERCASE => s.to_lowercase(),
        _ => {
            let width = n.unsigned_abs() as usize;
            if s.chars().count() > width {
                s.chars().take(width).collect()
            } else {
                justify(s, n)
            }
        }
    }
}

fn first_members(bs: &BitSet, n: i32) -> BitSet {
    if n <= 0 {
        return BitSet::new();
    }
    bs.select_ordinals(1, n as usize)
}

// =========================================================================
// Logic and sets
// =========================================================================

fn and(x1: &Value, x2: &Value) -> Value {
    match (x1, x2) {
        (Value::Bitset(a), Value::Bitset(b)) => Value::Bitset(a.and(b)),
        (Value::Bitset(a), Value::Integer(i)) => Value::Boolean(*i >= 0 && a.contains(*i as u32)),
        _ => Value::Boolean(x1.as_bool() && x2.as_bool()),
    }
}

fn or(x1: &Value, x2: &Value) -> Value {
    match (x1, x2) {
        (Value::Bitset(a), Value::Bitset(b)) => Value::Bitset(a.or(b)),
        (Value::Bitset(a), Value::Integer(i)) => {
            let mut out = a.clone();
            if *i >= 0 {
                out.insert(*i as u32);
            }
            Value::Bitset(out)
        }
        (Value::Bitset(a), Value::Array(list)) => {
            let mut out = a.clone();
            for v in list.read().iter() {
                let i = v.as_int();
                if i >= 0 {
                    out.insert(i as u32);
                }
            }
            Value::Bitset(out)
        }
        (Value::Array(_), _) => concat(x1, x2),
        _ => Value::Boolean(x1.as_bool() || x2.as_bool()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Matrix3;

    fn bin(op: Tok, a: impl Into<Value>, b: impl Into<Value>) -> Result<Value> {
        binary(op, &a.into(), &b.into())
    }

    fn set(items: &[u32]) -> Value {
        Value::Bitset(items.iter().copied().collect())
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(bin(Tok::Plus, 1, 2).unwrap(), Value::Integer(3));
        assert_eq!(bin(Tok::Times, 3, 4).unwrap(), Value::Integer(12));
        assert_eq!(bin(Tok::Divide, 3, 2).unwrap(), Value::Integer(1));
        assert_eq!(bin(Tok::Divide, 3.0, 2).unwrap(), Value::Float(1.5));
        assert_eq!(bin(Tok::Divide, 7, -2).unwrap(), Value::Integer(-3));
        assert_eq!(bin(Tok::Percent, 7, 3).unwrap(), Value::Integer(1));
        assert_eq!(bin(Tok::Percent, 7, 0).unwrap(), Value::Integer(0));
        assert_eq!(bin(Tok::LeftDivide, 7.5, 2).unwrap(), Value::Integer(3));
        assert_eq!(bin(Tok::LeftDivide, 7, 0).unwrap(), Value::Integer(0));
        assert_eq!(bin(Tok::Power, 2, 10).unwrap(), Value::Integer(1024));
        assert_eq!(bin(Tok::Power, 2.0, 2).unwrap(), Value::Float(4.0));
        assert_eq!(bin(Tok::Plus, 1, 0.5).unwrap(), Value::Float(1.5));
        assert!(bin(Tok::Plus, i32::MAX, 1).is_err());
    }

    #[test]
    fn test_division_by_zero() {
        match bin(Tok::Divide, 1, 0).unwrap() {
            Value::Float(f) => assert!(f.is_infinite()),
            other => panic!("unexpected {:?}", other),
        }
        match bin(Tok::Divide, Point3::new(1.0, 2.0, 3.0), 0).unwrap() {
            Value::Point3(p) => assert!(p.x.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_string_arithmetic() {
        assert_eq!(bin(Tok::Plus, "3", 2).unwrap(), Value::Integer(5));
        assert_eq!(bin(Tok::Plus, "3.5", 2).unwrap(), Value::Float(5.5));
        assert_eq!(bin(Tok::Plus, "ab", 2).unwrap(), Value::string("ab2"));
        assert_eq!(bin(Tok::Plus, "ab", "cd").unwrap(), Value::string("abcd"));
        assert_eq!(bin(Tok::Plus, 2, "3").unwrap(), Value::Integer(5));
        assert_eq!(bin(Tok::Plus, 2, "1.5").unwrap(), Value::Float(3.5));
        assert_eq!(bin(Tok::Minus, "10", 4).unwrap(), Value::Integer(6));
        assert_eq!(bin(Tok::Times, 2, "4").unwrap(), Value::Integer(8));
    }

    #[test]
    fn test_string_formatting() {
        assert_eq!(bin(Tok::Percent, "  ab \n", 0).unwrap(), Value::string("ab"));
        assert_eq!(bin(Tok::Percent, "ab", 9999).unwrap(), Value::string("AB"));
        assert_eq!(bin(Tok::Percent, "AB", -9999).unwrap(), Value::string("ab"));
        assert_eq!(bin(Tok::Percent, "ab", 4).unwrap(), Value::string("  ab"));
        assert_eq!(bin(Tok::Percent, "ab", -4).unwrap(), Value::string("ab  "));
        assert_eq!(bin(Tok::Percent, "abcdef", 3).unwrap(), Value::string("abc"));
        assert_eq!(bin(Tok::Percent, 2.0 / 3.0, 2).unwrap(), Value::string("0.67"));
        assert_eq!(bin(Tok::Percent, 2.5, 0).unwrap(), Value::Integer(3));
    }

    #[test]
    fn test_array_ops() {
        let a = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
        let joined = bin(Tok::Plus, a.clone(), 3).unwrap();
        assert_eq!(joined.size(), 3);
        let joined = bin(Tok::Plus, a.clone(), a).unwrap();
        assert_eq!(joined.size(), 4);
        assert!(bin(Tok::Times, Value::array(vec![]), 2).is_err());
    }

    #[test]
    fn test_geometry() {
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(
            bin(Tok::Plus, p, Point3::new(1.0, 1.0, 1.0)).unwrap(),
            Value::Point3(Point3::new(2.0, 3.0, 4.0))
        );
        assert_eq!(bin(Tok::Times, p, p).unwrap(), Value::Float(14.0));
        assert_eq!(
            bin(Tok::Times, 2, p).unwrap(),
            Value::Point3(Point3::new(2.0, 4.0, 6.0))
        );
        assert_eq!(
            bin(Tok::Minus, p, 1).unwrap(),
            Value::Point3(Point3::new(0.0, 1.0, 2.0))
        );
        let m = Matrix3::identity();
        assert_eq!(bin(Tok::Times, m, p).unwrap(), Value::Point3(p));
        match bin(Tok::Plus, m, p).unwrap() {
            Value::Matrix4(m4) => assert_eq!(m4.translation(), p),
            other => panic!("unexpected {:?}", other),
        }
        assert!(bin(Tok::Plus, 1, p).is_err());
        assert!(bin(Tok::Divide, m, 2).is_err());
    }

    #[test]
    fn test_quaternions() {
        let q = Point4::from_axis_angle(&Point3::new(0.0, 0.0, 1.0), 90.0);
        let rotated = bin(Tok::Percent, q, Point3::new(1.0, 0.0, 0.0)).unwrap();
        match rotated {
            Value::Point3(p) => {
                assert!(p.x.abs() < 1e-9);
                assert!((p.y - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
        match bin(Tok::Percent, q, -2).unwrap() {
            Value::Float(theta) => assert!((theta - 90.0).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
        match bin(Tok::Plus, q, 90).unwrap() {
            Value::Point4(r) => assert!((r.theta() - 180.0).abs() < 1e-6),
            other => panic!("unexpected {:?}", other),
        }
        let product = bin(Tok::Times, q, q).unwrap();
        match product {
            Value::Point4(r) => assert!((r.theta() - 180.0).abs() < 1e-6),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_set_ops() {
        let a = set(&[1, 2, 3]);
        let b = set(&[3, 4]);
        assert_eq!(bin(Tok::And, a.clone(), b.clone()).unwrap(), set(&[3]));
        assert_eq!(bin(Tok::Or, a.clone(), b.clone()).unwrap(), set(&[1, 2, 3, 4]));
        assert_eq!(bin(Tok::Xor, a.clone(), b.clone()).unwrap(), set(&[1, 2, 4]));
        assert_eq!(bin(Tok::Xor, a.clone(), a.clone()).unwrap(), set(&[]));
        assert_eq!(bin(Tok::Toggle, a.clone(), set(&[1, 2])).unwrap(), set(&[3]));
        assert_eq!(bin(Tok::And, a.clone(), 2).unwrap(), Value::Boolean(true));
        assert_eq!(bin(Tok::And, a.clone(), -2).unwrap(), Value::Boolean(false));
        assert_eq!(bin(Tok::Or, a.clone(), 7).unwrap(), set(&[1, 2, 3, 7]));
        assert_eq!(bin(Tok::Percent, a.clone(), 2).unwrap(), set(&[1, 2]));
        assert!(bin(Tok::Toggle, 1, 2).is_err());
        assert_eq!(unary(Tok::Not, &b, 6).unwrap(), set(&[0, 1, 2, 5]));
    }

    #[test]
    fn test_logic_and_comparison() {
        assert_eq!(bin(Tok::And, true, 0).unwrap(), Value::Boolean(false));
        assert_eq!(bin(Tok::Or, false, 2).unwrap(), Value::Boolean(true));
        assert_eq!(bin(Tok::Eq, "ABC", "abc").unwrap(), Value::Boolean(true));
        assert_eq!(bin(Tok::Eq, 1, 1.0).unwrap(), Value::Boolean(true));
        assert_eq!(bin(Tok::Lt, "2", 3).unwrap(), Value::Boolean(true));
        assert_eq!(bin(Tok::Ge, 3, 3.5).unwrap(), Value::Boolean(false));
        assert_eq!(bin(Tok::Ne, "a", "b").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(Tok::UnaryMinus, &Value::Integer(3), 0).unwrap(), Value::Integer(-3));
        assert_eq!(unary(Tok::UnaryMinus, &Value::string("2"), 0).unwrap(), Value::Float(-2.0));
        assert_eq!(unary(Tok::Not, &Value::Integer(0), 0).unwrap(), Value::Boolean(true));
        assert!(unary(Tok::UnaryMinus, &Value::array(vec![]), 0).is_err());
        assert!(unary(Tok::UnaryMinus, &Value::Integer(i32::MIN), 0).is_err());
    }

    #[test]
    fn test_maps() {
        let mut entries = std::collections::BTreeMap::new();
        entries.insert("a".to_string(), Value::Integer(1));
        entries.insert("b".to_string(), Value::Integer(2));
        let m = Value::map(entries);
        let removed = bin(Tok::Minus, m.clone(), "a").unwrap();
        assert_eq!(removed.size(), 1);
        assert_eq!(m.size(), 2);
        let merged = bin(Tok::Plus, removed, m).unwrap();
        assert_eq!(merged.size(), 2);
        assert!(bin(Tok::Times, Value::map(Default::default()), 2).is_err());
    }
}
