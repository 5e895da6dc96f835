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

//! Runtime values
//!
//! `Value` is the closed tagged union every script operand lives in. Arrays
//! and maps are shared by reference (`Arc<RwLock<..>>`), everything else is
//! copied on assignment. A subscript applied to a value is not a new tag: it
//! is carried on the stack as [`Variable::index`] until the value is consumed.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::bitset::BitSet;
use super::geometry::{Matrix3, Matrix4, Point3, Point4};

/// Shared, mutable list storage
pub type ValueList = Arc<RwLock<Vec<Value>>>;

/// Shared, mutable map storage, iterated in key order
pub type ValueMap = Arc<RwLock<BTreeMap<String, Value>>>;

/// Index sentinel meaning "no subscript applied"
pub const SELECT_ALL: i32 = i32::MAX;

/// Tolerance used by equality on numbers and geometry
pub const EQUALITY_EPSILON: f64 = 1e-6;

/// A dynamically typed script value
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Float(f64),
    String(Arc<str>),
    Point3(Point3),
    /// Plane or quaternion
    Point4(Point4),
    Matrix3(Box<Matrix3>),
    Matrix4(Box<Matrix4>),
    Bitset(BitSet),
    Array(ValueList),
    Map(ValueMap),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn empty_string() -> Self {
        Value::String(Arc::from(""))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items)))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(RwLock::new(entries)))
    }

    pub fn float_array(data: &[f64]) -> Self {
        Value::array(data.iter().map(|f| Value::Float(*f)).collect())
    }

    // =========================================================================
    // Type inspection
    // =========================================================================

    /// Script-visible type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "decimal",
            Value::String(_) => "string",
            Value::Point3(_) => "point",
            Value::Point4(_) => "point4",
            Value::Matrix3(_) => "matrix3f",
            Value::Matrix4(_) => "matrix4f",
            Value::Bitset(_) => "bitset",
            Value::Array(_) => "array",
            Value::Map(_) => "hash",
        }
    }

    /// Size of a value; scalars report a negative type code
    pub fn size(&self) -> i32 {
        match self {
            Value::Boolean(_) => -1,
            Value::Integer(_) => -2,
            Value::Float(_) => -4,
            Value::Point3(_) => -8,
            Value::Point4(_) => -16,
            Value::Matrix3(_) => -32,
            Value::Matrix4(_) => -64,
            Value::String(s) => s.chars().count() as i32,
            Value::Array(list) => list.read().len() as i32,
            Value::Map(map) => map.read().len() as i32,
            Value::Bitset(bs) => bs.cardinality() as i32,
        }
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Scalars that coerce to numbers without loss of meaning
    #[inline]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// Points, planes and matrices
    #[inline]
    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            Value::Point3(_) | Value::Point4(_) | Value::Matrix3(_) | Value::Matrix4(_)
        )
    }

    /// Values a subscript can select from
    #[inline]
    pub fn is_selectable(&self) -> bool {
        matches!(
            self,
            Value::String(_)
                | Value::Bitset(_)
                | Value::Array(_)
                | Value::Matrix3(_)
                | Value::Matrix4(_)
        )
    }

    // =========================================================================
    // Coercions
    // =========================================================================

    /// Truthiness
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Map(_) => true,
            Value::Integer(i) => *i != 0,
            Value::Float(_) | Value::String(_) | Value::Array(_) => self.as_float() != 0.0,
            Value::Bitset(bs) => !bs.is_empty(),
            Value::Point3(_) | Value::Point4(_) | Value::Matrix3(_) | Value::Matrix4(_) => {
                self.as_float().abs() > 0.0001
            }
        }
    }

    /// Integer reading; decimals truncate toward zero, NaN reads as 0
    pub fn as_int(&self) -> i32 {
        match self {
            Value::Boolean(b) => *b as i32,
            Value::Integer(i) => *i,
            Value::Bitset(bs) => bs.cardinality() as i32,
            Value::Map(_) => 0,
            _ => self.as_float() as i32,
        }
    }

    /// Numeric reading; geometry reads as its distance from the origin
    pub fn as_float(&self) -> f64 {
        match self {
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Integer(i) => *i as f64,
            Value::Float(f) => *f,
            Value::String(s) => string_to_float(s),
            Value::Array(list) => list.read().len() as f64,
            Value::Bitset(bs) => bs.cardinality() as f64,
            Value::Point3(p) => p.length(),
            Value::Point4(p) => p.distance_to_plane(&Point3::default()),
            Value::Matrix3(m) => m.transform(&Point3::default()).length(),
            Value::Matrix4(m) => m.transform(&Point3::default()).length(),
            Value::Map(_) => 0.0,
        }
    }

    /// Display string
    pub fn as_string(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.to_string(),
            Value::Point3(p) => p.to_string(),
            Value::Point4(p) => p.to_string(),
            Value::Matrix3(m) => m.to_string(),
            Value::Matrix4(m) => m.to_string(),
            Value::Bitset(bs) => bs.to_string(),
            Value::Array(list) => list
                .read()
                .iter()
                .map(|v| v.as_string())
                .collect::<Vec<_>>()
                .join("\n"),
            Value::Map(map) => map
                .read()
                .iter()
                .map(|(k, v)| {
                    let s = v.as_string();
                    let sep = if s.contains('\n') { '\n' } else { '\t' };
                    format!("{}\t:{}{}", k, sep, s)
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Source-like rendering; strings are quoted, containers bracketed
    pub fn escape(&self) -> String {
        match self {
            Value::String(s) => escape_str(s),
            Value::Array(list) => {
                let items: Vec<String> = list.read().iter().map(|v| v.escape()).collect();
                format!("[{}]", items.join(","))
            }
            Value::Map(map) => {
                let map = map.read();
                if map.is_empty() {
                    return "{}".to_string();
                }
                let items: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}:{}", escape_str(k), v.escape()))
                    .collect();
                format!("{{ {} }}", items.join(", "))
            }
            _ => self.as_string(),
        }
    }

    /// Point reading, accepting the escaped string form
    pub fn as_point(&self) -> Option<Point3> {
        match self {
            Value::Point3(p) => Some(*p),
            Value::String(s) => match parse_point(s)? {
                Value::Point3(p) => Some(p),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_point4(&self) -> Option<Point4> {
        match self {
            Value::Point4(p) => Some(*p),
            Value::String(s) => match parse_point(s)? {
                Value::Point4(p) => Some(p),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_bitset(&self) -> Option<BitSet> {
        match self {
            Value::Bitset(bs) => Some(bs.clone()),
            Value::String(s) => BitSet::parse(s),
            _ => None,
        }
    }

    /// Snapshot of an array's items; scalars become a one-item list
    pub fn to_list(&self) -> Vec<Value> {
        match self {
            Value::Array(list) => list.read().clone(),
            other => vec![other.clone()],
        }
    }

    /// Copy with fresh storage for every nested array and map
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Array(list) => Value::array(list.read().iter().map(|v| v.deep_clone()).collect()),
            Value::Map(map) => Value::map(
                map.read()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    /// Script equality: strings ignore case, geometry and numbers use an epsilon
    pub fn are_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::String(x), Value::String(y)) => x.to_lowercase() == y.to_lowercase(),
            (Value::Point3(x), Value::Point3(y)) => x.distance(y) < EQUALITY_EPSILON,
            (Value::Point4(x), Value::Point4(y)) => x.distance(y) < EQUALITY_EPSILON,
            _ => (a.as_float() - b.as_float()).abs() < EQUALITY_EPSILON,
        }
    }

    /// Ordering used by sorting: numbers numerically, then strings, then the rest
    pub fn sort_cmp(a: &Value, b: &Value) -> Ordering {
        let rank = |v: &Value| match v {
            Value::Boolean(_) | Value::Integer(_) | Value::Float(_) => 0,
            Value::String(_) => 1,
            _ => 2,
        };
        match (rank(a), rank(b)) {
            (0, 0) => a
                .as_float()
                .partial_cmp(&b.as_float())
                .unwrap_or(Ordering::Equal),
            (1, 1) => a.as_string().cmp(&b.as_string()),
            (ra, rb) if ra != rb => ra.cmp(&rb),
            _ => a.as_string().cmp(&b.as_string()),
        }
    }

    // =========================================================================
    // Subscripts
    // =========================================================================

    /// Select items `i1..=i2` (1-based, zero and negatives count from the
    /// end). With no `i2` a single item is selected. Out-of-range selections
    /// yield an empty string.
    pub fn select_item(&self, i1: i32, i2: Option<i32>) -> Value {
        let len = match self {
            Value::Matrix3(_) => return self.select_matrix(3, i1, i2),
            Value::Matrix4(_) => return self.select_matrix(4, i1, i2),
            Value::Bitset(bs) => bs.cardinality() as i32,
            Value::Array(list) => list.read().len() as i32,
            Value::String(s) => s.chars().count() as i32,
            _ => return self.clone(),
        };

        let mut i1 = if i1 <= 0 { len.saturating_add(i1) } else { i1 };
        if i1 < 1 {
            i1 = 1;
        }
        let i2 = match i2 {
            None => i1,
            Some(0) => len,
            Some(i) => {
                let i = if i < 0 { len.saturating_add(i) } else { i };
                if i > len {
                    len
                } else if i < i1 {
                    i1
                } else {
                    i
                }
            }
        };

        match self {
            Value::Bitset(bs) => Value::Bitset(bs.select_ordinals(i1 as usize, i2.max(0) as usize)),
            Value::String(s) => {
                if i1 > len {
                    return Value::empty_string();
                }
                let sub: String = s
                    .chars()
                    .skip((i1 - 1) as usize)
                    .take((i2 - i1 + 1).max(0) as usize)
                    .collect();
                Value::string(sub)
            }
            Value::Array(list) => {
                let list = list.read();
                if i1 > len || i2 > len {
                    return Value::empty_string();
                }
                if i1 == i2 {
                    return list[(i1 - 1) as usize].clone();
                }
                Value::array(list[(i1 - 1) as usize..i2 as usize].to_vec())
            }
            _ => self.clone(),
        }
    }

    fn select_matrix(&self, n: i32, i1: i32, i2: Option<i32>) -> Value {
        let get = |row: usize, col: usize| match self {
            Value::Matrix3(m) => m.get(row, col),
            Value::Matrix4(m) => m.get(row, col),
            _ => f64::NAN,
        };
        if i1 > n {
            let col = i1 % 10;
            let row = i1 / 10;
            if col >= 1 && col <= n && row >= 1 && row <= n {
                return Value::Float(get((row - 1) as usize, (col - 1) as usize));
            }
            return Value::empty_string();
        }
        if i1 == 0 || i1.abs() > n {
            return Value::empty_string();
        }
        let data: Vec<f64> = (0..n as usize)
            .map(|k| {
                if i1 < 0 {
                    get(k, (-1 - i1) as usize)
                } else {
                    get((i1 - 1) as usize, k)
                }
            })
            .collect();
        match i2 {
            None => Value::float_array(&data),
            Some(i) if i >= 1 && i <= n => Value::Float(data[(i - 1) as usize]),
            Some(_) => Value::empty_string(),
        }
    }

    /// Assign into a subscripted position in place. Returns false when the
    /// value kind does not support the assignment.
    pub fn set_selected(&mut self, selector: i32, v: &Value) -> bool {
        if selector == SELECT_ALL {
            return false;
        }
        match self {
            Value::Matrix3(m) => set_matrix_item(&mut m.m, selector, v),
            Value::Matrix4(m) => set_matrix_item(&mut m.m, selector, v),
            Value::String(s) => {
                let mut chars: Vec<char> = s.chars().collect();
                let len = chars.len() as i32;
                let mut pos = if selector <= 0 { len + selector } else { selector } - 1;
                if pos < 0 {
                    pos = 0;
                }
                let pos = pos as usize;
                while pos >= chars.len() {
                    chars.push(' ');
                }
                let head: String = chars[..pos].iter().collect();
                let tail: String = chars[pos + 1..].iter().collect();
                *self = Value::string(format!("{}{}{}", head, v.as_string(), tail));
                true
            }
            Value::Array(list) => {
                let mut list = list.write();
                let len = list.len() as i32;
                let mut pos = if selector <= 0 { len + selector } else { selector } - 1;
                if pos < 0 {
                    pos = 0;
                }
                let pos = pos as usize;
                while list.len() <= pos {
                    list.push(Value::empty_string());
                }
                list[pos] = v.clone();
                true
            }
            _ => false,
        }
    }
}

fn set_matrix_item<const N: usize>(m: &mut [[f64; N]; N], selector: i32, v: &Value) -> bool {
    let n = N as i32;
    if selector > 10 {
        let col = selector % 10;
        let row = selector / 10;
        if col >= 1 && col <= n && row >= 1 && row <= n {
            m[(row - 1) as usize][(col - 1) as usize] = v.as_float();
            return true;
        }
    }
    if selector == 0 || selector.abs() > n {
        return false;
    }
    let Value::Array(list) = v else {
        return false;
    };
    let data: Vec<f64> = list.read().iter().map(|x| x.as_float()).collect();
    if data.len() != N {
        return false;
    }
    for (k, f) in data.into_iter().enumerate() {
        if selector > 0 {
            m[(selector - 1) as usize][k] = f;
        } else {
            m[k][(-1 - selector) as usize] = f;
        }
    }
    true
}

impl Default for Value {
    fn default() -> Self {
        Value::empty_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// Structural equality, used by tests and host code. Scripts compare with
/// [`Value::are_equal`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Point3(a), Value::Point3(b)) => a == b,
            (Value::Point4(a), Value::Point4(b)) => a == b,
            (Value::Matrix3(a), Value::Matrix3(b)) => a == b,
            (Value::Matrix4(a), Value::Matrix4(b)) => a == b,
            (Value::Bitset(a), Value::Bitset(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Arc::ptr_eq(a, b) || *a.read() == *b.read()
            }
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            _ => false,
        }
    }
}

// =========================================================================
// Conversions
// =========================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<BitSet> for Value {
    fn from(bs: BitSet) -> Self {
        Value::Bitset(bs)
    }
}

impl From<Point3> for Value {
    fn from(p: Point3) -> Self {
        Value::Point3(p)
    }
}

impl From<Point4> for Value {
    fn from(p: Point4) -> Self {
        Value::Point4(p)
    }
}

impl From<Matrix3> for Value {
    fn from(m: Matrix3) -> Self {
        Value::Matrix3(Box::new(m))
    }
}

impl From<Matrix4> for Value {
    fn from(m: Matrix4) -> Self {
        Value::Matrix4(Box::new(m))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

/// A stack entry: a value plus a pending subscript
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub value: Value,
    /// First subscript applied, or [`SELECT_ALL`]
    pub index: i32,
}

impl Variable {
    #[inline]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            index: SELECT_ALL,
        }
    }

    /// Apply `[i]`. The first subscript is recorded; a second one turns the
    /// pair into a range (or a matrix element) and resolves it.
    pub fn select(self, i: i32) -> Variable {
        let value = if self.value.is_selectable() {
            self.value
        } else {
            Value::string(self.value.as_string())
        };
        if self.index == SELECT_ALL {
            Variable { value, index: i }
        } else {
            Variable::new(value.select_item(self.index, Some(i)))
        }
    }

    /// Resolve any pending subscript into a plain value
    pub fn resolve(self) -> Value {
        if self.index == SELECT_ALL {
            self.value
        } else {
            self.value.select_item(self.index, None)
        }
    }
}

// =========================================================================
// Text helpers
// =========================================================================

/// Float formatting at single precision, so `0.1 + 0.2` prints as `0.3`
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.abs() < f32::MAX as f64 {
        format!("{:?}", f as f32)
    } else {
        format!("{:?}", f)
    }
}

/// Permissive number reading: "true" is 1, "false" and "" are 0,
/// anything else must parse completely or yields NaN
pub fn string_to_float(s: &str) -> f64 {
    let t = s.trim();
    if t.eq_ignore_ascii_case("true") {
        return 1.0;
    }
    if t.is_empty() || t.eq_ignore_ascii_case("false") {
        return 0.0;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Integer literal reading used by string/integer arithmetic
pub fn string_to_integer(s: &str) -> Option<i32> {
    s.trim().parse::<i32>().ok()
}

/// Quote a string with backslash escapes
pub fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Parse `{x y z}` or `{x y z w}` (commas allowed)
pub fn parse_point(s: &str) -> Option<Value> {
    let inner = s.trim().strip_prefix('{')?.strip_suffix('}')?;
    let nums: Option<Vec<f64>> = inner
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<f64>().ok())
        .collect();
    match nums?.as_slice() {
        [x, y, z] => Some(Value::Point3(Point3::new(*x, *y, *z))),
        [x, y, z, w] => Some(Value::Point4(Point4::new(*x, *y, *z, *w))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(Value::Integer(3).as_bool());
        assert!(!Value::string("").as_bool());
        assert!(!Value::string("false").as_bool());
        assert!(Value::string("abc").as_bool()); // NaN is not zero
        assert!(!Value::array(vec![]).as_bool());
        assert!(Value::map(BTreeMap::new()).as_bool());
        assert!(!Value::Point3(Point3::default()).as_bool());
    }

    #[test]
    fn test_numeric_readings() {
        assert_eq!(Value::string(" 2.5 ").as_float(), 2.5);
        assert_eq!(Value::string("true").as_int(), 1);
        assert!(Value::string("x").as_float().is_nan());
        assert_eq!(Value::Float(-2.7).as_int(), -2);
        assert_eq!(Value::Point3(Point3::new(3.0, 4.0, 0.0)).as_float(), 5.0);
        assert_eq!(Value::array(vec![1.into(), 2.into()]).as_int(), 2);
    }

    #[test]
    fn test_sizes_and_types() {
        assert_eq!(Value::Boolean(true).size(), -1);
        assert_eq!(Value::Float(1.0).size(), -4);
        assert_eq!(Value::string("abc").size(), 3);
        assert_eq!(Value::Matrix4(Box::new(Matrix4::identity())).size(), -64);
        assert_eq!(Value::Float(1.0).type_name(), "decimal");
        assert_eq!(Value::map(BTreeMap::new()).type_name(), "hash");
    }

    #[test]
    fn test_equality() {
        assert!(Value::are_equal(&Value::string("ABC"), &Value::string("abc")));
        assert!(Value::are_equal(&Value::Integer(1), &Value::Float(1.0000001)));
        let a = Value::Bitset(BitSet::parse("({1 2})").unwrap());
        let b = Value::Bitset(BitSet::parse("({5 6})").unwrap());
        assert!(Value::are_equal(&a, &b));
    }

    #[test]
    fn test_string_selection() {
        let s = Value::string("testing");
        assert_eq!(s.select_item(0, None), Value::string("g"));
        assert_eq!(s.select_item(-1, None), Value::string("n"));
        assert_eq!(s.select_item(3, Some(0)), Value::string("sting"));
        assert_eq!(s.select_item(-1, Some(0)), Value::string("ng"));
        assert_eq!(s.select_item(9, None), Value::string(""));
    }

    #[test]
    fn test_array_selection() {
        let a = Value::array(vec![10.into(), 20.into(), 30.into()]);
        assert_eq!(a.select_item(2, None), Value::Integer(20));
        assert_eq!(a.select_item(2, Some(3)).escape(), "[20,30]");
        assert_eq!(a.select_item(4, None), Value::string(""));
    }

    #[test]
    fn test_matrix_selection() {
        let m = Value::from(
            Matrix3::from_rows(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]).unwrap(),
        );
        assert_eq!(m.select_item(2, None).escape(), "[4.0,5.0,6.0]");
        assert_eq!(m.select_item(-1, None).escape(), "[1.0,4.0,7.0]");
        assert_eq!(m.select_item(23, None), Value::Float(6.0));
        assert_eq!(m.select_item(2, Some(3)), Value::Float(6.0));
    }

    #[test]
    fn test_set_selected() {
        let mut s = Value::string("ab");
        assert!(s.set_selected(4, &Value::string("x")));
        assert_eq!(s, Value::string("ab x"));

        let mut a = Value::array(vec![1.into()]);
        assert!(a.set_selected(3, &Value::Integer(9)));
        assert_eq!(a.escape(), "[1,\"\",9]");

        let mut m = Value::from(Matrix3::identity());
        assert!(m.set_selected(12, &Value::Float(5.0)));
        assert_eq!(m.select_item(12, None), Value::Float(5.0));
        assert!(!m.set_selected(2, &Value::Integer(1)));
    }

    #[test]
    fn test_variable_subscripts() {
        let v = Variable::new(Value::string("testing"));
        assert_eq!(v.clone().select(2).resolve(), Value::string("e"));
        assert_eq!(v.select(2).select(4).resolve(), Value::string("est"));
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Value::Float(0.1 + 0.2).as_string(), "0.3");
        assert_eq!(Value::Float(-0.0).as_string(), "-0.0");
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), Value::Integer(2));
        map.insert("a".to_string(), Value::string("x"));
        assert_eq!(Value::map(map.clone()).as_string(), "a\t:\tx\nb\t:\t2");
        assert_eq!(Value::map(map).escape(), "{ \"a\":\"x\", \"b\":2 }");
        assert_eq!(
            parse_point("{1 2 3}"),
            Some(Value::Point3(Point3::new(1.0, 2.0, 3.0)))
        );
    }
}
