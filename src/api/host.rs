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

//! Host interface
//!
//! The engine knows nothing about the objects a script manipulates. Every
//! domain question (what does `carbon` select, which items are within 5
//! units of a set) and every domain command goes through [`ScriptHost`].

use crate::core::{BitSet, Result, Value};
use crate::parser::{Comparison, ResidueSpec};

/// The embedding application, as seen by a running script
///
/// Hosts are shared with parallel workers, so they must be `Send + Sync`
/// and take `&self`. Every method has a neutral default.
pub trait ScriptHost: Send + Sync {
    /// Number of selectable items; `all` selects `0..universe_size`
    fn universe_size(&self) -> u32 {
        0
    }

    /// A predefined selection such as `carbon` or `water`
    fn named_set(&self, _name: &str) -> Option<BitSet> {
        None
    }

    /// Items matching a residue/chain/atom/model specification
    fn resolve_residue(&self, _spec: &ResidueSpec) -> Result<BitSet> {
        Ok(BitSet::new())
    }

    /// Items whose `property` compares true against `value`
    fn compare_property(&self, _property: &str, _op: Comparison, _value: &Value) -> Result<BitSet> {
        Ok(BitSet::new())
    }

    /// `within(...)`, `connected(...)`, `search(...)` and `cell=`
    fn selection_function(&self, _name: &str, _args: &[Value]) -> Result<Value> {
        Ok(Value::Bitset(BitSet::new()))
    }

    /// A command with no engine semantics, such as `select`, `color` or
    /// `zoom`, with its arguments evaluated
    fn command(&self, _name: &str, _args: &[Value]) -> Result<()> {
        Ok(())
    }
}

/// Host with an empty universe that accepts every command
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl ScriptHost for NullHost {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_host() {
        let host = NullHost;
        assert_eq!(host.universe_size(), 0);
        assert!(host.named_set("carbon").is_none());
        assert!(host.command("zoom", &[Value::Integer(50)]).is_ok());
        let spec = ResidueSpec::default();
        assert_eq!(host.resolve_residue(&spec), Ok(BitSet::new()));
    }
}
