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

//! Standard builtin functions
//!
//! Trigonometry works in degrees. `within`, `connected` and `search` have
//! no engine semantics and are answered by the host.

use rand::Rng;

use super::{number_arg, point_arg, BuiltinFunction, FunctionInfo, VARIADIC};
use crate::api::ScriptHost;
use crate::core::value::{format_float, parse_point};
use crate::core::{Error, Point3, Point4, Result, Value};

macro_rules! builtin {
    ($ty:ident, $name:literal, $desc:literal, $min:expr, $max:expr, |$args:ident, $host:ident| $body:block) => {
        #[derive(Default)]
        pub struct $ty;

        impl BuiltinFunction for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn info(&self) -> FunctionInfo {
                FunctionInfo::new($name, $desc, $min, $max)
            }

            #[allow(unused_variables)]
            fn evaluate(&self, $args: &[Value], $host: &dyn ScriptHost) -> Result<Value> $body
        }
    };
}

// ============================================================================
// Math
// ============================================================================

builtin!(AbsFunction, "abs", "Returns the absolute value of a number", 1, 1, |args, host| {
    if let Value::Integer(i) = args[0] {
        if let Some(abs) = i.checked_abs() {
            return Ok(Value::Integer(abs));
        }
    }
    Ok(Value::Float(number_arg("abs", args, 0)?.abs()))
});

builtin!(AcosFunction, "acos", "Returns the arc cosine in degrees", 1, 1, |args, host| {
    Ok(Value::Float(number_arg("acos", args, 0)?.acos().to_degrees()))
});

builtin!(CosFunction, "cos", "Returns the cosine of an angle in degrees", 1, 1, |args, host| {
    Ok(Value::Float(number_arg("cos", args, 0)?.to_radians().cos()))
});

builtin!(SinFunction, "sin", "Returns the sine of an angle in degrees", 1, 1, |args, host| {
    Ok(Value::Float(number_arg("sin", args, 0)?.to_radians().sin()))
});

builtin!(SqrtFunction, "sqrt", "Returns the square root of a number", 1, 1, |args, host| {
    Ok(Value::Float(number_arg("sqrt", args, 0)?.sqrt()))
});

builtin!(
    RandomFunction,
    "random",
    "Returns a random decimal in [0, 1), [0, max) or [min, max)",
    0,
    2,
    |args, host| {
        let (lo, hi) = match args.len() {
            0 => (0.0, 1.0),
            1 => (0.0, number_arg("random", args, 0)?),
            _ => (number_arg("random", args, 0)?, number_arg("random", args, 1)?),
        };
        let r = rand::rng().random::<f64>();
        Ok(Value::Float(lo + r * (hi - lo)))
    }
);

// ============================================================================
// Geometry
// ============================================================================

fn numbers(name: &str, args: &[Value]) -> Result<Vec<f64>> {
    (0..args.len()).map(|i| number_arg(name, args, i)).collect()
}

builtin!(
    PointFunction,
    "point",
    "Creates a point from three numbers, or a plane from four",
    1,
    4,
    |args, host| {
        match args {
            [Value::Point3(_) | Value::Point4(_)] => Ok(args[0].clone()),
            [Value::String(s)] => parse_point(s)
                .ok_or_else(|| Error::builtin("point", format!("cannot read {} as a point", args[0].escape()))),
            [Value::Array(list)] => {
                let items = list.read().clone();
                match items.len() {
                    3 | 4 => PointFunction.evaluate(&items, host),
                    n => Err(Error::builtin("point", format!("{} coordinates given", n))),
                }
            }
            [_, _, _] => {
                let c = numbers("point", args)?;
                Ok(Value::Point3(Point3::new(c[0], c[1], c[2])))
            }
            [_, _, _, _] => {
                let c = numbers("point", args)?;
                Ok(Value::Point4(Point4::new(c[0], c[1], c[2], c[3])))
            }
            _ => Err(Error::builtin("point", "expected 3 or 4 coordinates")),
        }
    }
);

builtin!(
    PlaneFunction,
    "plane",
    "Creates a plane from four coefficients or through three points",
    1,
    4,
    |args, host| {
        match args {
            [Value::Point4(p)] => Ok(Value::Point4(*p)),
            [Value::String(s)] => match parse_point(s) {
                Some(Value::Point4(p)) => Ok(Value::Point4(p)),
                _ => Err(Error::builtin("plane", format!("cannot read {} as a plane", args[0].escape()))),
            },
            [_, _, _] => {
                let a = point_arg("plane", args, 0)?;
                let b = point_arg("plane", args, 1)?;
                let c = point_arg("plane", args, 2)?;
                let normal = b.sub(&a).cross(&c.sub(&a));
                let len = normal.length();
                if len == 0.0 {
                    return Err(Error::builtin("plane", "points are collinear"));
                }
                let n = normal.scale(1.0 / len);
                Ok(Value::Point4(Point4::new(n.x, n.y, n.z, -n.dot(&a))))
            }
            [_, _, _, _] => {
                let c = numbers("plane", args)?;
                Ok(Value::Point4(Point4::new(c[0], c[1], c[2], c[3])))
            }
            _ => Err(Error::builtin("plane", "expected 4 coefficients or 3 points")),
        }
    }
);

builtin!(
    QuaternionFunction,
    "quaternion",
    "Creates a quaternion from (q0, q1, q2, q3) or (axis, degrees)",
    0,
    4,
    |args, host| {
        match args {
            [] => Ok(Value::Point4(Point4::IDENTITY)),
            [Value::Point4(q)] => Ok(Value::Point4(*q)),
            [_, _] => {
                let axis = point_arg("quaternion", args, 0)?;
                let degrees = number_arg("quaternion", args, 1)?;
                Ok(Value::Point4(Point4::from_axis_angle(&axis, degrees)))
            }
            [_, _, _, _] => {
                let q = numbers("quaternion", args)?;
                Ok(Value::Point4(Point4::new(q[1], q[2], q[3], q[0])))
            }
            _ => Err(Error::builtin("quaternion", "expected 0, 2 or 4 arguments")),
        }
    }
);

builtin!(CrossFunction, "cross", "Returns the cross product of two vectors", 2, 2, |args, host| {
    let a = point_arg("cross", args, 0)?;
    let b = point_arg("cross", args, 1)?;
    Ok(Value::Point3(a.cross(&b)))
});

builtin!(DotFunction, "dot", "Returns the dot product of two vectors", 2, 2, |args, host| {
    let a = point_arg("dot", args, 0)?;
    let b = point_arg("dot", args, 1)?;
    Ok(Value::Float(a.dot(&b)))
});

builtin!(
    DistanceFunction,
    "distance",
    "Returns the distance between two points, or from a point to a plane",
    2,
    2,
    |args, host| {
        match (&args[0], &args[1]) {
            (Value::Point4(plane), other) | (other, Value::Point4(plane)) => {
                let p = other.as_point().ok_or_else(|| {
                    Error::builtin("distance", format!("cannot measure from {}", other.type_name()))
                })?;
                Ok(Value::Float(plane.distance_to_plane(&p)))
            }
            _ => {
                let a = point_arg("distance", args, 0)?;
                let b = point_arg("distance", args, 1)?;
                Ok(Value::Float(a.distance(&b)))
            }
        }
    }
);

// ============================================================================
// Strings and arrays
// ============================================================================

builtin!(ArrayFunction, "array", "Creates an array of its arguments", 0, VARIADIC, |args, host| {
    Ok(Value::array(args.to_vec()))
});

builtin!(JoinFunction, "join", "Joins array items with a separator", 1, 2, |args, host| {
    let sep = args.get(1).map(Value::as_string).unwrap_or_default();
    let items: Vec<String> = args[0].to_list().iter().map(Value::as_string).collect();
    Ok(Value::string(items.join(&sep)))
});

builtin!(
    SplitFunction,
    "split",
    "Splits a string on a separator, by default on line breaks",
    1,
    2,
    |args, host| {
        let text = args[0].as_string();
        let sep = args.get(1).map_or_else(|| "\n".to_string(), Value::as_string);
        let parts: Vec<Value> = if sep.is_empty() {
            text.chars().map(|c| Value::string(c.to_string())).collect()
        } else {
            text.split(sep.as_str()).map(Value::string).collect()
        };
        Ok(Value::array(parts))
    }
);

builtin!(
    TrimFunction,
    "trim",
    "Removes whitespace, or the given characters, from both ends",
    1,
    2,
    |args, host| {
        let text = args[0].as_string();
        let trimmed = match args.get(1) {
            Some(chars) => {
                let chars: Vec<char> = chars.as_string().chars().collect();
                text.trim_matches(|c| chars.contains(&c)).to_string()
            }
            None => text.trim().to_string(),
        };
        Ok(Value::string(trimmed))
    }
);

builtin!(
    ReplaceFunction,
    "replace",
    "Replaces every occurrence of a substring",
    3,
    3,
    |args, host| {
        let text = args[0].as_string();
        let find = args[1].as_string();
        if find.is_empty() {
            return Ok(Value::string(text));
        }
        Ok(Value::string(text.replace(&find, &args[2].as_string())))
    }
);

builtin!(
    FormatFunction,
    "format",
    "Formats values with a printf-style template",
    1,
    VARIADIC,
    |args, host| { sprintf("format", args) }
);

builtin!(
    SprintfFunction,
    "sprintf",
    "Formats values with a printf-style template",
    1,
    VARIADIC,
    |args, host| { sprintf("sprintf", args) }
);

/// Format `f` with `digits` decimals; negative `digits` selects scientific
/// notation with `-digits - 1` decimals
pub fn format_decimal(f: f64, digits: i32) -> String {
    if !f.is_finite() {
        return format_float(f);
    }
    if digits >= 0 {
        format!("{:.*}", digits as usize, f)
    } else {
        let decimals = (-digits - 1) as usize;
        let s = format!("{:.*E}", decimals, f);
        match s.split_once('E') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}E+{}", mantissa, exp),
            _ => s,
        }
    }
}

/// Pad `s` to `width` characters; negative widths left-justify
pub fn justify(s: &str, width: i32) -> String {
    let n = width.unsigned_abs() as usize;
    if width < 0 {
        format!("{:<n$}", s, n = n)
    } else {
        format!("{:>n$}", s, n = n)
    }
}

/// printf-lite: `%[-][width][.precision]` followed by `d`, `i`, `f`, `e`,
/// `s` or `p`, and `%%` for a literal percent sign
fn sprintf(name: &str, args: &[Value]) -> Result<Value> {
    let template = args[0].as_string();
    let mut values = args[1..].iter();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let mut left = false;
        if chars.peek() == Some(&'-') {
            left = true;
            chars.next();
        }
        let mut width = String::new();
        while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            width.push(*d);
            chars.next();
        }
        let mut precision: Option<String> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                p.push(*d);
                chars.next();
            }
            precision = Some(p);
        }
        let Some(conv) = chars.next() else {
            return Err(Error::builtin(name, "incomplete format specifier"));
        };
        let value = values.next().cloned().unwrap_or_default();
        let precision = precision.and_then(|p| p.parse::<i32>().ok());
        let text = match conv {
            'd' | 'i' => value.as_int().to_string(),
            'f' => match precision {
                Some(p) => format_decimal(value.as_float(), p),
                None => format_float(value.as_float()),
            },
            'e' => format_decimal(value.as_float(), -1 - precision.unwrap_or(6)),
            's' => {
                let s = value.as_string();
                match precision {
                    Some(p) => s.chars().take(p.max(0) as usize).collect(),
                    None => s,
                }
            }
            'p' => match value.as_point() {
                Some(p) => {
                    let digits = precision.unwrap_or(3);
                    format!(
                        "{{{} {} {}}}",
                        format_decimal(p.x, digits),
                        format_decimal(p.y, digits),
                        format_decimal(p.z, digits)
                    )
                }
                None => value.as_string(),
            },
            other => {
                return Err(Error::builtin(name, format!("unknown conversion %{}", other)));
            }
        };
        let width: i32 = width.parse().unwrap_or(0);
        out.push_str(&justify(&text, if left { -width } else { width }));
    }
    Ok(Value::string(out))
}

// ============================================================================
// Host selection functions
// ============================================================================

builtin!(
    WithinFunction,
    "within",
    "Selects items within a distance or sharing a grouping",
    1,
    VARIADIC,
    |args, host| { host.selection_function("within", args) }
);

builtin!(
    ConnectedFunction,
    "connected",
    "Selects items bonded to a selection",
    0,
    VARIADIC,
    |args, host| { host.selection_function("connected", args) }
);

builtin!(
    SearchFunction,
    "search",
    "Selects items matching a pattern",
    1,
    VARIADIC,
    |args, host| { host.selection_function("search", args) }
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NullHost;

    fn call(f: &dyn BuiltinFunction, args: &[Value]) -> Result<Value> {
        f.evaluate(args, &NullHost)
    }

    #[test]
    fn test_math() {
        assert_eq!(call(&AbsFunction, &[Value::Integer(-3)]), Ok(Value::Integer(3)));
        assert_eq!(call(&AbsFunction, &[Value::Float(-2.5)]), Ok(Value::Float(2.5)));
        let Value::Float(c) = call(&CosFunction, &[Value::Integer(60)]).unwrap() else {
            panic!("expected decimal");
        };
        assert!((c - 0.5).abs() < 1e-9);
        let Value::Float(a) = call(&AcosFunction, &[Value::Float(0.0)]).unwrap() else {
            panic!("expected decimal");
        };
        assert!((a - 90.0).abs() < 1e-9);
        assert!(call(&SqrtFunction, &[Value::array(vec![])]).is_err());
    }

    #[test]
    fn test_random_range() {
        for _ in 0..50 {
            let Value::Float(r) = call(&RandomFunction, &[Value::Integer(5), Value::Integer(6)]).unwrap()
            else {
                panic!("expected decimal");
            };
            assert!((5.0..6.0).contains(&r));
        }
    }

    #[test]
    fn test_geometry() {
        let p = call(&PointFunction, &[Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(p, Ok(Value::Point3(Point3::new(1.0, 2.0, 3.0))));

        let x = Value::Point3(Point3::new(1.0, 0.0, 0.0));
        let y = Value::Point3(Point3::new(0.0, 1.0, 0.0));
        assert_eq!(
            call(&CrossFunction, &[x.clone(), y.clone()]),
            Ok(Value::Point3(Point3::new(0.0, 0.0, 1.0)))
        );
        assert_eq!(call(&DotFunction, &[x.clone(), y.clone()]), Ok(Value::Float(0.0)));

        let origin = Value::Point3(Point3::default());
        let plane = call(&PlaneFunction, &[origin, x.clone(), y]).unwrap();
        assert_eq!(plane, Value::Point4(Point4::new(0.0, 0.0, 1.0, 0.0)));
        let above = Value::Point3(Point3::new(5.0, 5.0, 2.0));
        assert_eq!(call(&DistanceFunction, &[above, plane]), Ok(Value::Float(2.0)));

        let q = call(&QuaternionFunction, &[]).unwrap();
        assert_eq!(q, Value::Point4(Point4::IDENTITY));
        assert!(call(&PointFunction, &[Value::Integer(1), Value::Integer(2)]).is_err());
    }

    #[test]
    fn test_strings() {
        let list = Value::array(vec![Value::Integer(1), Value::string("b")]);
        assert_eq!(call(&JoinFunction, &[list, Value::string(",")]), Ok(Value::string("1,b")));

        let parts = call(&SplitFunction, &[Value::string("a:b:c"), Value::string(":")]).unwrap();
        assert_eq!(parts.size(), 3);

        assert_eq!(call(&TrimFunction, &[Value::string("  x ")]), Ok(Value::string("x")));
        assert_eq!(
            call(&TrimFunction, &[Value::string("--x-"), Value::string("-")]),
            Ok(Value::string("x"))
        );
        assert_eq!(
            call(
                &ReplaceFunction,
                &[Value::string("a-b-c"), Value::string("-"), Value::string("+")]
            ),
            Ok(Value::string("a+b+c"))
        );
    }

    #[test]
    fn test_sprintf() {
        let args = [
            Value::string("%d|%5.2f|%-4s|%s%%"),
            Value::Float(7.9),
            Value::Float(3.14159),
            Value::string("ab"),
            Value::Integer(50),
        ];
        assert_eq!(call(&SprintfFunction, &args), Ok(Value::string("7| 3.14|ab  |50%")));
        assert!(call(&FormatFunction, &[Value::string("%q"), Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(2.0 / 3.0, 2), "0.67");
        assert_eq!(format_decimal(12345.0, -3), "1.23E+4");
        assert_eq!(justify("ab", 4), "  ab");
        assert_eq!(justify("ab", -4), "ab  ");
    }

    #[test]
    fn test_host_functions_default() {
        let result = call(&WithinFunction, &[Value::Float(5.0), Value::string("x")]).unwrap();
        assert!(matches!(result, Value::Bitset(bs) if bs.is_empty()));
    }
}
