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

//! Version information for molscript
//!
//! Components come from the package manifest; the commit hash and build
//! time are stamped in by the build script when available.

use std::sync::OnceLock;

/// Git commit hash at build time
/// Set via MOLSCRIPT_GIT_COMMIT environment variable during compilation
pub const GIT_COMMIT: &str = match option_env!("MOLSCRIPT_GIT_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

/// Build timestamp
/// Set via MOLSCRIPT_BUILD_TIME environment variable during compilation
pub const BUILD_TIME: &str = match option_env!("MOLSCRIPT_BUILD_TIME") {
    Some(time) => time,
    None => "unknown",
};

/// Returns the version string, e.g. "0.1.0"
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns version info as a formatted string
pub fn version_info() -> &'static str {
    static INFO: OnceLock<String> = OnceLock::new();
    INFO.get_or_init(|| {
        format!(
            "molscript {} (commit: {}, built: {})",
            version(),
            GIT_COMMIT,
            BUILD_TIME
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_manifest() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
        assert_eq!(version().split('.').count(), 3);
    }

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.starts_with("molscript "));
        assert!(info.contains(version()));
        assert!(!GIT_COMMIT.is_empty());
        assert!(!BUILD_TIME.is_empty());
    }
}
