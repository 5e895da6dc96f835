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

//! Core types for molscript
//!
//! This module contains the fundamental types used throughout the engine:
//! - Error types
//! - The runtime value model
//! - Geometric payloads (points, planes, quaternions, matrices)
//! - Selection sets

pub mod bitset;
pub mod error;
pub mod geometry;
pub mod value;

pub use bitset::BitSet;
pub use error::{Error, Result};
pub use geometry::{Matrix3, Matrix4, Point3, Point4};
pub use value::{Value, ValueList, ValueMap, Variable, SELECT_ALL};
