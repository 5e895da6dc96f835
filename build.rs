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

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn git_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!commit.is_empty()).then_some(commit)
}

fn main() {
    if std::env::var("MOLSCRIPT_GIT_COMMIT").is_err() {
        if let Some(commit) = git_commit() {
            println!("cargo:rustc-env=MOLSCRIPT_GIT_COMMIT={}", commit);
        }
    }

    // Seconds since the epoch; reproducible builds set it explicitly
    if std::env::var("MOLSCRIPT_BUILD_TIME").is_err() {
        if let Ok(elapsed) = SystemTime::now().duration_since(UNIX_EPOCH) {
            println!("cargo:rustc-env=MOLSCRIPT_BUILD_TIME={}", elapsed.as_secs());
        }
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=MOLSCRIPT_GIT_COMMIT");
    println!("cargo:rerun-if-env-changed=MOLSCRIPT_BUILD_TIME");
}
