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

//! Geometric value payloads
//!
//! Points, planes/quaternions and square matrices used by the value model.
//! A plane `{a b c d}` and a quaternion `{x y z w}` share the same
//! four-component storage; which reading applies depends on the operator.

use std::fmt;

use super::value::format_float;

/// A 3-D point or vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn add(&self, o: &Point3) -> Point3 {
        Point3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    #[inline]
    pub fn sub(&self, o: &Point3) -> Point3 {
        Point3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }

    #[inline]
    pub fn scale(&self, f: f64) -> Point3 {
        Point3::new(self.x * f, self.y * f, self.z * f)
    }

    #[inline]
    pub fn offset(&self, f: f64) -> Point3 {
        Point3::new(self.x + f, self.y + f, self.z + f)
    }

    #[inline]
    pub fn dot(&self, o: &Point3) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn cross(&self, o: &Point3) -> Point3 {
        Point3::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn distance(&self, o: &Point3) -> f64 {
        self.sub(o).length()
    }

    pub fn component(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} {} {}}}",
            format_float(self.x),
            format_float(self.y),
            format_float(self.z)
        )
    }
}

/// A plane `ax + by + cz + d = 0` or a quaternion with scalar part `w`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point4 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Point4 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Identity quaternion
    pub const IDENTITY: Point4 = Point4::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub fn vector(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }

    pub fn add(&self, o: &Point4) -> Point4 {
        Point4::new(self.x + o.x, self.y + o.y, self.z + o.z, self.w + o.w)
    }

    pub fn scale(&self, f: f64) -> Point4 {
        Point4::new(self.x * f, self.y * f, self.z * f, self.w * f)
    }

    pub fn negate(&self) -> Point4 {
        self.scale(-1.0)
    }

    /// Four-vector Euclidean distance
    pub fn distance(&self, o: &Point4) -> f64 {
        let (dx, dy, dz, dw) = (self.x - o.x, self.y - o.y, self.z - o.z, self.w - o.w);
        (dx * dx + dy * dy + dz * dz + dw * dw).sqrt()
    }

    /// Distance from the plane to a point
    pub fn distance_to_plane(&self, p: &Point3) -> f64 {
        let norm = self.vector().length();
        if norm == 0.0 {
            return 0.0;
        }
        (self.vector().dot(p) + self.w) / norm
    }

    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// Hamilton product, treating `w` as the scalar part
    pub fn quaternion_mul(&self, o: &Point4) -> Point4 {
        let (a1, b1, c1, d1) = (self.w, self.x, self.y, self.z);
        let (a2, b2, c2, d2) = (o.w, o.x, o.y, o.z);
        Point4::new(
            a1 * b2 + b1 * a2 + c1 * d2 - d1 * c2,
            a1 * c2 - b1 * d2 + c1 * a2 + d1 * b2,
            a1 * d2 + b1 * c2 - c1 * b2 + d1 * a2,
            a1 * a2 - b1 * b2 - c1 * c2 - d1 * d2,
        )
    }

    pub fn conjugate(&self) -> Point4 {
        Point4::new(-self.x, -self.y, -self.z, self.w)
    }

    pub fn inverse(&self) -> Point4 {
        let n = self.norm_squared();
        if n == 0.0 {
            return Point4::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN);
        }
        self.conjugate().scale(1.0 / n)
    }

    pub fn quaternion_div(&self, o: &Point4) -> Point4 {
        self.quaternion_mul(&o.inverse())
    }

    /// Quaternion for a rotation of `degrees` about `axis`
    pub fn from_axis_angle(axis: &Point3, degrees: f64) -> Point4 {
        let len = axis.length();
        if len == 0.0 {
            return Point4::IDENTITY;
        }
        let half = degrees.to_radians() / 2.0;
        let s = half.sin() / len;
        Point4::new(axis.x * s, axis.y * s, axis.z * s, half.cos())
    }

    /// Rotation matrix for a unit quaternion
    pub fn to_matrix3(&self) -> Matrix3 {
        let n = self.norm_squared();
        if n == 0.0 {
            return Matrix3::identity();
        }
        let s = 2.0 / n;
        let (x, y, z, w) = (self.x, self.y, self.z, self.w);
        Matrix3 {
            m: [
                [1.0 - s * (y * y + z * z), s * (x * y - z * w), s * (x * z + y * w)],
                [s * (x * y + z * w), 1.0 - s * (x * x + z * z), s * (y * z - x * w)],
                [s * (x * z - y * w), s * (y * z + x * w), 1.0 - s * (x * x + y * y)],
            ],
        }
    }

    pub fn component(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => self.w,
        }
    }

    /// Rotation angle of a quaternion, in degrees
    pub fn theta(&self) -> f64 {
        let n = self.norm_squared().sqrt();
        if n == 0.0 {
            return 0.0;
        }
        let w = (self.w / n).clamp(-1.0, 1.0);
        2.0 * w.acos().to_degrees()
    }

    /// Unit rotation axis of a quaternion; +z when there is no rotation
    pub fn axis(&self) -> Point3 {
        let v = self.vector();
        let len = v.length();
        if len == 0.0 {
            return Point3::new(0.0, 0.0, 1.0);
        }
        v.scale(1.0 / len)
    }
}

impl fmt::Display for Point4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} {} {} {}}}",
            format_float(self.x),
            format_float(self.y),
            format_float(self.z),
            format_float(self.w)
        )
    }
}

macro_rules! square_matrix {
    ($name:ident, $n:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name {
            pub m: [[f64; $n]; $n],
        }

        impl $name {
            pub const SIZE: usize = $n;

            pub fn identity() -> Self {
                let mut m = [[0.0; $n]; $n];
                for (i, row) in m.iter_mut().enumerate() {
                    row[i] = 1.0;
                }
                Self { m }
            }

            /// Build from row-major data; `None` unless exactly n*n values
            pub fn from_rows(values: &[f64]) -> Option<Self> {
                if values.len() != $n * $n {
                    return None;
                }
                let mut m = [[0.0; $n]; $n];
                for (i, v) in values.iter().enumerate() {
                    m[i / $n][i % $n] = *v;
                }
                Some(Self { m })
            }

            #[inline]
            pub fn get(&self, row: usize, col: usize) -> f64 {
                self.m[row][col]
            }

            #[inline]
            pub fn set(&mut self, row: usize, col: usize, v: f64) {
                self.m[row][col] = v;
            }

            pub fn row(&self, row: usize) -> Vec<f64> {
                self.m[row].to_vec()
            }

            pub fn column(&self, col: usize) -> Vec<f64> {
                self.m.iter().map(|r| r[col]).collect()
            }

            pub fn set_row(&mut self, row: usize, data: &[f64]) {
                for (c, v) in data.iter().take($n).enumerate() {
                    self.m[row][c] = *v;
                }
            }

            pub fn set_column(&mut self, col: usize, data: &[f64]) {
                for (r, v) in data.iter().take($n).enumerate() {
                    self.m[r][col] = *v;
                }
            }

            pub fn transpose(&self) -> Self {
                let mut m = [[0.0; $n]; $n];
                for r in 0..$n {
                    for c in 0..$n {
                        m[c][r] = self.m[r][c];
                    }
                }
                Self { m }
            }

            pub fn add(&self, o: &Self) -> Self {
                let mut out = *self;
                for r in 0..$n {
                    for c in 0..$n {
                        out.m[r][c] += o.m[r][c];
                    }
                }
                out
            }

            pub fn sub(&self, o: &Self) -> Self {
                let mut out = *self;
                for r in 0..$n {
                    for c in 0..$n {
                        out.m[r][c] -= o.m[r][c];
                    }
                }
                out
            }

            pub fn mul(&self, o: &Self) -> Self {
                let mut m = [[0.0; $n]; $n];
                for r in 0..$n {
                    for c in 0..$n {
                        m[r][c] = (0..$n).map(|k| self.m[r][k] * o.m[k][c]).sum();
                    }
                }
                Self { m }
            }

            pub fn scale(&self, f: f64) -> Self {
                let mut out = *self;
                for row in out.m.iter_mut() {
                    for v in row.iter_mut() {
                        *v *= f;
                    }
                }
                out
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "[")?;
                for (r, row) in self.m.iter().enumerate() {
                    if r > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "[")?;
                    for (c, v) in row.iter().enumerate() {
                        if c > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{}", format_float(*v))?;
                    }
                    write!(f, "]")?;
                }
                write!(f, "]")
            }
        }
    };
}

square_matrix!(Matrix3, 3);
square_matrix!(Matrix4, 4);

impl Matrix3 {
    pub fn transform(&self, p: &Point3) -> Point3 {
        let m = &self.m;
        Point3::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z,
            m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z,
            m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z,
        )
    }
}

impl Matrix4 {
    /// Transform a point with an implicit w of 1
    pub fn transform(&self, p: &Point3) -> Point3 {
        let m = &self.m;
        Point3::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3],
            m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3],
        )
    }

    /// Rotation plus translation
    pub fn from_parts(rotation: &Matrix3, translation: &Point3) -> Matrix4 {
        let mut out = Matrix4::identity();
        for r in 0..3 {
            out.m[r][..3].copy_from_slice(&rotation.m[r]);
            out.m[r][3] = translation.component(r);
        }
        out
    }

    /// Upper-left 3x3 block
    pub fn rotation(&self) -> Matrix3 {
        let mut out = Matrix3::identity();
        for r in 0..3 {
            out.m[r].copy_from_slice(&self.m[r][..3]);
        }
        out
    }

    pub fn translation(&self) -> Point3 {
        Point3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    pub fn transform4(&self, p: &Point4) -> Point4 {
        let v = [p.x, p.y, p.z, p.w];
        let m = &self.m;
        let row = |r: usize| (0..4).map(|k| m[r][k] * v[k]).sum::<f64>();
        Point4::new(row(0), row(1), row(2), row(3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_ops() {
        let a = Point3::new(1.0, 0.0, 0.0);
        let b = Point3::new(0.0, 1.0, 0.0);
        assert_eq!(a.cross(&b), Point3::new(0.0, 0.0, 1.0));
        assert_eq!(a.dot(&b), 0.0);
        assert!((a.distance(&b) - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(a.to_string(), "{1.0 0.0 0.0}");
    }

    #[test]
    fn test_plane_distance() {
        // z = 2
        let plane = Point4::new(0.0, 0.0, 1.0, -2.0);
        assert!((plane.distance_to_plane(&Point3::default()) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_quaternion_rotation() {
        let q = Point4::from_axis_angle(&Point3::new(0.0, 0.0, 1.0), 90.0);
        let p = q.to_matrix3().transform(&Point3::new(1.0, 0.0, 0.0));
        assert!(p.distance(&Point3::new(0.0, 1.0, 0.0)) < 1e-9);

        let back = q.quaternion_mul(&q).quaternion_div(&q);
        assert!(back.distance(&q) < 1e-9);
    }

    #[test]
    fn test_matrix_basics() {
        let m = Matrix3::from_rows(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]).unwrap();
        assert_eq!(m.transpose().row(0), vec![1.0, 4.0, 7.0]);
        assert_eq!(m.column(1), vec![2.0, 5.0, 8.0]);
        assert_eq!(m.mul(&Matrix3::identity()), m);
        assert_eq!(m.to_string(), "[[1.0 2.0 3.0] [4.0 5.0 6.0] [7.0 8.0 9.0]]");
        assert!(Matrix3::from_rows(&[1.0; 8]).is_none());

        let mut t = Matrix4::identity();
        t.set(0, 3, 5.0);
        assert_eq!(t.transform(&Point3::default()), Point3::new(5.0, 0.0, 0.0));
    }
}
