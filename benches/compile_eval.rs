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

//! Compile and evaluation benchmarks
//!
//! Run with: cargo bench --bench compile_eval

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use molscript::{compile, Engine, EngineConfig, ParallelConfig, Value};
use std::hint::black_box;

const LOOP_SCRIPT: &str = "total = 0
for (var i = 0; i < 1000; i++) {
  if (i % 3 == 0) {
    total += i
  } elseif (i % 5 == 0) {
    total -= 1
  }
}";

const FUNCTION_SCRIPT: &str = "function fib(n) {
  if (n < 2) {
    return n
  }
  return fib(n - 1) + fib(n - 2)
}
x = fib(15)";

const PARALLEL_SCRIPT: &str = "parallel work() {
  process {
    a = 0
    for (var i = 0; i < 2000; i++) {
      a += i
    }
  }
  process {
    b = 0
    for (var i = 0; i < 2000; i++) {
      b += i
    }
  }
  process {
    c = 0
    for (var i = 0; i < 2000; i++) {
      c += i
    }
  }
}
x = work()";

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for (name, script) in [
        ("loop", LOOP_SCRIPT),
        ("function", FUNCTION_SCRIPT),
        ("parallel", PARALLEL_SCRIPT),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), script, |b, s| {
            b.iter(|| compile(black_box(s)).unwrap())
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut engine = Engine::default();
    engine.set_global("r", Value::Float(1.5));
    c.bench_function("evaluate/arithmetic", |b| {
        b.iter(|| engine.evaluate(black_box("(r * 2 + 3) / 4 - r % 2")).unwrap())
    });
    c.bench_function("evaluate/array", |b| {
        b.iter(|| engine.evaluate(black_box("[5, 3, 9, 1].sort[2] + [1, 2, 3].size")).unwrap())
    });
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    let mut engine = Engine::default();
    let program = compile(LOOP_SCRIPT).unwrap();
    group.bench_function("loop", |b| b.iter(|| engine.run(black_box(&program)).unwrap()));

    let program = compile(FUNCTION_SCRIPT).unwrap();
    group.bench_function("recursion", |b| {
        b.iter(|| engine.run(black_box(&program)).unwrap())
    });

    let program = compile(PARALLEL_SCRIPT).unwrap();
    for (name, parallel) in [
        ("parallel", ParallelConfig::default()),
        ("serial", ParallelConfig::disabled()),
    ] {
        let mut engine = Engine::new(EngineConfig::default().with_parallel(parallel));
        group.bench_function(BenchmarkId::new("process", name), |b| {
            b.iter(|| engine.run(black_box(&program)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_evaluate, bench_run);
criterion_main!(benches);
