//! Benchmarks for the interpreter.
//!
//! Measures complete runs through the machine:
//! - Recursive fibonacci, dominated by call pushes and pops
//! - A tight loop, dominated by instruction dispatch
//! - Program generation through the emitter

extern crate dotsim;

use criterion::{criterion_group, criterion_main, Criterion};
use dotsim::prelude::*;
use std::hint::black_box;

fn binary(name: &'static str, op: fn(i32, i32) -> NativeValue) -> Generator {
    Generator::direct(DirectMethod::new(name, move |ctx| {
        let a = ctx.native_argument(0)?.as_i32().unwrap_or_default();
        let b = ctx.native_argument(1)?.as_i32().unwrap_or_default();
        let result = ctx.create_direct(op(a, b))?;
        ctx.return_value(Some(result))
    }))
}

fn emit_fib(e: &mut Emitter) -> Result<()> {
    let base = e.create_label("base");
    e.assign_argument("n", 0);
    e.assign_literal("one", 1);
    e.assign_literal("two", 2);
    e.static_call(MethodId::new("Math.LessThan"), &["n", "two"]);
    e.assign_return_value("small");
    e.conditional_jump("small", &base)?;
    e.static_call(MethodId::new("Math.Sub"), &["n", "one"]);
    e.assign_return_value("a");
    e.static_call(MethodId::new("Math.Fib"), &["a"]);
    e.assign_return_value("fa");
    e.static_call(MethodId::new("Math.Sub"), &["n", "two"]);
    e.assign_return_value("b");
    e.static_call(MethodId::new("Math.Fib"), &["b"]);
    e.assign_return_value("fb");
    e.static_call(MethodId::new("Math.Add"), &["fa", "fb"]);
    e.assign_return_value("sum");
    e.return_value("sum");
    e.set_label(&base)?;
    e.return_value("n");
    Ok(())
}

fn math_loader() -> MethodTable {
    MethodTable::new()
        .with_method(
            MethodId::new("Math.Add"),
            binary("Math.Add", |a, b| NativeValue::Int(a + b)),
        )
        .with_method(
            MethodId::new("Math.Sub"),
            binary("Math.Sub", |a, b| NativeValue::Int(a - b)),
        )
        .with_method(
            MethodId::new("Math.LessThan"),
            binary("Math.LessThan", |a, b| NativeValue::Bool(a < b)),
        )
        .with_method(MethodId::new("Math.Fib"), Generator::new(emit_fib))
}

/// Benchmark fib(15): 1973 calls of the IAL method plus their native helpers.
fn bench_fib(c: &mut Criterion) {
    let loader = math_loader();
    let machine = Machine::new(AnalyzingConfig::analysis());
    let entry = MethodId::new("Math.Fib");

    c.bench_function("run_fib_15", |b| {
        b.iter(|| {
            let result = machine
                .run(&loader, &entry, black_box(&[NativeValue::Int(15)]))
                .unwrap();
            black_box(result)
        });
    });
}

/// Benchmark a counting loop of 10k iterations in a single frame.
fn bench_loop(c: &mut Criterion) {
    let loader = math_loader().with_method(
        MethodId::new("Sample.Count"),
        Generator::new(|e| {
            let top = e.create_label("top");
            let done = e.create_label("done");
            e.assign_argument("limit", 0);
            e.assign_literal("i", 0);
            e.assign_literal("one", 1);
            e.set_label(&top)?;
            e.static_call(MethodId::new("Math.LessThan"), &["i", "limit"]);
            e.assign_return_value("more");
            e.conditional_jump("more", &done)?;
            e.return_value("i");
            e.set_label(&done)?;
            e.static_call(MethodId::new("Math.Add"), &["i", "one"]);
            e.assign_return_value("i");
            e.jump(&top)
        }),
    );
    let machine = Machine::new(AnalyzingConfig::analysis());
    let entry = MethodId::new("Sample.Count");

    c.bench_function("run_loop_10k", |b| {
        b.iter(|| {
            let result = machine
                .run(&loader, &entry, black_box(&[NativeValue::Int(10_000)]))
                .unwrap();
            black_box(result)
        });
    });
}

/// Benchmark emitting the fibonacci program without caching.
fn bench_emit(c: &mut Criterion) {
    c.bench_function("emit_fib", |b| {
        b.iter(|| {
            let mut emitter = Emitter::new();
            emit_fib(&mut emitter).unwrap();
            black_box(emitter.get_emitted_instructions().unwrap())
        });
    });
}

criterion_group!(benches, bench_fib, bench_loop, bench_emit);
criterion_main!(benches);
