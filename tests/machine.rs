//! Integration tests running complete programs through the [`Machine`].

use dotsim::{
    analyzing::{LimitExceeded, TraceCategories, TraceEvent},
    prelude::*,
};

fn binary(name: &'static str, op: fn(i32, i32) -> NativeValue) -> Generator {
    Generator::direct(DirectMethod::new(name, move |ctx| {
        let a = ctx.native_argument(0)?.as_i32().unwrap_or_default();
        let b = ctx.native_argument(1)?.as_i32().unwrap_or_default();
        let result = ctx.create_direct(op(a, b))?;
        ctx.return_value(Some(result))
    }))
}

/// fib(n) = n < 2 ? n : fib(n - 1) + fib(n - 2)
fn fib_loader() -> MethodTable {
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
        .with_method(
            MethodId::new("Math.Fib"),
            Generator::new(|e| {
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
            }),
        )
}

fn single(name: &str, generator: Generator) -> MethodTable {
    MethodTable::new().with_method(MethodId::new(name), generator)
}

#[test]
fn test_fib_5() -> Result<()> {
    let loader = fib_loader();
    let result = Machine::new(AnalyzingConfig::strict()).run(
        &loader,
        &MethodId::new("Math.Fib"),
        &[NativeValue::Int(5)],
    )?;

    assert!(result.is_success());
    assert_eq!(result.return_native(), Some(&NativeValue::Int(5)));
    assert!(result.uses.contains(&MethodId::new("Math.Add")));
    assert!(result.uses.contains(&MethodId::new("Math.LessThan")));
    Ok(())
}

#[test]
fn test_stack_balance() -> Result<()> {
    let loader = fib_loader();
    let result = Machine::<AnalyzingConfig>::default().run(
        &loader,
        &MethodId::new("Math.Fib"),
        &[NativeValue::Int(7)],
    )?;

    assert_eq!(result.return_native(), Some(&NativeValue::Int(13)));
    assert!(result.stats.is_balanced());
    assert_eq!(result.stats.calls_pushed as usize, result.trace.call_count());
    assert_eq!(result.stats.calls_skipped, 0);
    Ok(())
}

#[test]
fn test_hello_literal() -> Result<()> {
    let loader = single(
        "Sample.Hello",
        Generator::new(|e| {
            e.assign_literal("x", "hello");
            e.return_value("x");
            Ok(())
        }),
    );
    let result = Machine::<AnalyzingConfig>::default().run(&loader, &MethodId::new("Sample.Hello"), &[])?;

    let instance = result.return_instance().unwrap();
    assert_eq!(instance.ty().full_name(), "System.String");
    assert_eq!(
        instance.direct_value().and_then(NativeValue::as_str),
        Some("hello")
    );
    assert!(!instance.is_dirty());
    Ok(())
}

#[test]
fn test_void_entry_returns_null() -> Result<()> {
    let loader = single(
        "Sample.Nothing",
        Generator::new(|e| {
            e.nop();
            Ok(())
        }),
    );
    let result = Machine::<AnalyzingConfig>::default().run(&loader, &MethodId::new("Sample.Nothing"), &[])?;

    assert!(result.is_success());
    assert_eq!(result.return_native(), Some(&NativeValue::Null));
    Ok(())
}

#[test]
fn test_virtual_dispatch_by_type() -> Result<()> {
    let area_a = Generator::new(|e| {
        e.assign_literal("r", 1);
        e.return_value("r");
        Ok(())
    });
    let area_b = Generator::new(|e| {
        e.assign_literal("r", 2);
        e.return_value("r");
        Ok(())
    });
    let loader = MethodTable::new()
        .with_method(MethodId::new("A.Area"), area_a.clone())
        .with_method(MethodId::new("B.Area"), area_b.clone())
        .with_virtual("Shape.Area", TypeDescriptor::new("A"), MethodId::new("A.Area"))
        .with_virtual("Shape.Area", TypeDescriptor::new("B"), MethodId::new("B.Area"))
        .with_method(
            MethodId::new("Sample.Main"),
            Generator::new(|e| {
                let area = MethodId::dynamic("Shape.Area");
                e.assign_new_object("a", TypeDescriptor::new("A"));
                e.assign_new_object("b", TypeDescriptor::new("B"));
                e.instance_call(area.clone(), &["a"]);
                e.assign_return_value("ra");
                e.instance_call(area.clone(), &["a"]);
                e.assign_return_value("ra2");
                e.instance_call(area, &["b"]);
                e.assign_return_value("rb");
                e.return_value("rb");
                Ok(())
            }),
        );

    let result = Machine::<AnalyzingConfig>::default().run(&loader, &MethodId::new("Sample.Main"), &[])?;

    assert_eq!(result.return_native(), Some(&NativeValue::Int(2)));
    assert!(result.uses.contains(&MethodId::new("A.Area")));
    assert!(result.uses.contains(&MethodId::new("B.Area")));
    assert!(!result.uses.contains(&MethodId::dynamic("Shape.Area")));
    assert_eq!(area_a.generation_count(), 1);
    assert_eq!(area_b.generation_count(), 1);
    assert!(!area_a.ptr_eq(&area_b));
    Ok(())
}

#[test]
fn test_unknown_receiver_type_is_skipped() -> Result<()> {
    let loader = single(
        "Sample.Main",
        Generator::new(|e| {
            e.assign_new_object("c", TypeDescriptor::new("C"));
            e.instance_call(MethodId::dynamic("Shape.Area"), &["c"]);
            e.assign_return_value("r");
            e.return_value("r");
            Ok(())
        }),
    );

    let result = Machine::<AnalyzingConfig>::default().run(&loader, &MethodId::new("Sample.Main"), &[])?;

    let returned = result.return_instance().unwrap();
    assert!(returned.is_dirty());
    assert!(returned.ty().is_unknown());
    assert_eq!(result.stats.calls_skipped, 1);
    assert!(result
        .heap
        .iter()
        .any(|instance| instance.ty().full_name() == "C" && instance.is_dirty()));
    Ok(())
}

#[test]
fn test_call_site_override() -> Result<()> {
    let loader = fib_loader().with_override(
        MethodId::new("Math.Fib"),
        Generator::new(|e| {
            e.assign_literal("r", -1);
            e.return_value("r");
            Ok(())
        }),
    );

    let result = Machine::<AnalyzingConfig>::default().run(
        &loader,
        &MethodId::new("Math.Fib"),
        &[NativeValue::Int(10)],
    )?;

    assert_eq!(result.return_native(), Some(&NativeValue::Int(-1)));
    assert_eq!(result.stats.calls_pushed, 1);
    Ok(())
}

#[test]
fn test_run_with_data_argument() -> Result<()> {
    let loader = single(
        "Point.GetX",
        Generator::direct(DirectMethod::new("Point.GetX", |ctx| {
            let point = ctx.argument(0)?;
            let x = ctx.get_field(point, "x")?;
            ctx.return_value(x)
        })),
    );

    let result = Machine::<AnalyzingConfig>::default().run_with(&loader, &MethodId::new("Point.GetX"), |ctx| {
        let point = ctx.create_data(TypeDescriptor::new("Point"));
        let x = ctx.create_direct(NativeValue::Int(3))?;
        ctx.set_field(point, "x", x)?;
        Ok(vec![point])
    })?;

    assert_eq!(result.return_native(), Some(&NativeValue::Int(3)));
    Ok(())
}

#[test]
fn test_instruction_limit() -> Result<()> {
    let loader = single(
        "Sample.Spin",
        Generator::new(|e| {
            let top = e.create_label("top");
            e.set_label(&top)?;
            e.nop();
            e.jump(&top)
        }),
    );
    let config = AnalyzingConfig::default()
        .with_limits(AnalyzingLimits::new().with_max_instructions(100));

    let result = Machine::new(config).run(&loader, &MethodId::new("Sample.Spin"), &[])?;

    assert_eq!(
        result.outcome,
        RunOutcome::LimitReached(LimitExceeded::Instructions {
            executed: 100,
            limit: 100
        })
    );
    assert!(result.return_value.is_none());
    assert!(!result.is_success());
    Ok(())
}

#[test]
fn test_call_depth_limit() -> Result<()> {
    let loader = single(
        "Sample.Recurse",
        Generator::new(|e| {
            e.static_call::<&str>(MethodId::new("Sample.Recurse"), &[]);
            Ok(())
        }),
    );
    let config = AnalyzingConfig::default()
        .with_limits(AnalyzingLimits::new().with_max_call_depth(16));

    let result = Machine::new(config).run(&loader, &MethodId::new("Sample.Recurse"), &[])?;

    assert_eq!(
        result.outcome,
        RunOutcome::LimitReached(LimitExceeded::CallDepth {
            depth: 17,
            limit: 16
        })
    );
    Ok(())
}

#[test]
fn test_program_ending_at_instruction_limit_completes() -> Result<()> {
    let loader = MethodTable::new()
        .with_method(
            MethodId::new("Sample.Return"),
            Generator::new(|e| {
                e.assign_literal("x", "x");
                e.return_value("x");
                Ok(())
            }),
        )
        .with_method(
            MethodId::new("Sample.FallThrough"),
            Generator::new(|e| {
                e.nop();
                e.nop();
                Ok(())
            }),
        );
    let machine = Machine::new(
        AnalyzingConfig::strict().with_limits(AnalyzingLimits::new().with_max_instructions(2)),
    );

    let returned = machine.run(&loader, &MethodId::new("Sample.Return"), &[])?;
    assert_eq!(returned.outcome, RunOutcome::Completed);
    assert_eq!(
        returned.return_native().and_then(NativeValue::as_str),
        Some("x")
    );

    // the exhausted frame is popped without counting as an instruction
    let fell_through = machine.run(&loader, &MethodId::new("Sample.FallThrough"), &[])?;
    assert_eq!(fell_through.outcome, RunOutcome::Completed);
    assert_eq!(fell_through.stats.instructions_executed, 2);
    assert!(fell_through.stats.is_balanced());
    Ok(())
}

#[test]
fn test_instance_limit() -> Result<()> {
    let loader = single(
        "Sample.Allocate",
        Generator::new(|e| {
            let top = e.create_label("top");
            e.set_label(&top)?;
            e.assign_literal("x", 1);
            e.jump(&top)
        }),
    );
    let config = AnalyzingConfig::strict()
        .with_limits(AnalyzingLimits::unlimited().with_max_instances(50));

    let result = Machine::new(config).run(&loader, &MethodId::new("Sample.Allocate"), &[])?;

    assert_eq!(
        result.outcome,
        RunOutcome::LimitReached(LimitExceeded::Instances {
            created: 51,
            limit: 50
        })
    );
    assert_eq!(result.heap.len(), 51);
    Ok(())
}

#[test]
fn test_timeout() -> Result<()> {
    let loader = single(
        "Sample.Spin",
        Generator::new(|e| {
            let top = e.create_label("top");
            e.set_label(&top)?;
            e.nop();
            e.jump(&top)
        }),
    );
    let config =
        AnalyzingConfig::strict().with_limits(AnalyzingLimits::unlimited().with_timeout_ms(20));

    let result = Machine::new(config).run(&loader, &MethodId::new("Sample.Spin"), &[])?;

    match result.outcome {
        RunOutcome::LimitReached(LimitExceeded::Timeout { elapsed, limit }) => {
            assert_eq!(limit, std::time::Duration::from_millis(20));
            assert!(elapsed >= limit);
        }
        other => panic!("expected a timeout, got {other}"),
    }
    Ok(())
}

#[test]
fn test_caught_error_keeps_partial_trace() -> Result<()> {
    let loader = single(
        "Sample.Broken",
        Generator::new(|e| {
            e.assign_literal("a", 1);
            e.assign("b", "missing");
            e.return_value("b");
            Ok(())
        }),
    );

    let result = Machine::<AnalyzingConfig>::default().run(&loader, &MethodId::new("Sample.Broken"), &[])?;

    assert_eq!(result.outcome, RunOutcome::Failed);
    assert!(matches!(
        result.error,
        Some(Error::UndeclaredVariable(ref name)) if name.name() == "missing"
    ));
    assert_eq!(result.stats.instructions_executed, 2);
    assert_eq!(result.trace.call_count(), 1);
    Ok(())
}

#[test]
fn test_strict_config_propagates_errors() {
    let loader = single(
        "Sample.Broken",
        Generator::new(|e| {
            e.return_value("missing");
            Ok(())
        }),
    );

    let result = Machine::new(AnalyzingConfig::strict()).run(
        &loader,
        &MethodId::new("Sample.Broken"),
        &[],
    );

    assert!(matches!(result, Err(Error::UndeclaredVariable(_))));
}

#[test]
fn test_failing_generator_is_fatal() {
    let loader = single(
        "Sample.Unbuildable",
        Generator::new(|e| {
            let nowhere = e.create_label("nowhere");
            e.jump(&nowhere)
        }),
    );

    let result = Machine::new(AnalyzingConfig::strict()).run(
        &loader,
        &MethodId::new("Sample.Unbuildable"),
        &[],
    );

    assert!(matches!(result, Err(Error::Generator(_))));
}

#[test]
fn test_unresolvable_entry() -> Result<()> {
    let loader = MethodTable::new();
    let result = Machine::<AnalyzingConfig>::default().run(&loader, &MethodId::new("Sample.Missing"), &[])?;

    assert!(result.is_success());
    assert!(result.entry_context.is_none());
    assert!(result.return_value.is_none());
    assert_eq!(result.stats.calls_skipped, 1);
    Ok(())
}

#[test]
fn test_memory_tracing() -> Result<()> {
    let loader = fib_loader();
    let config = AnalyzingConfig::default()
        .with_tracing(TracingConfig::memory(TraceCategories::CALLS, 0));

    let result = Machine::new(config).run(
        &loader,
        &MethodId::new("Math.Fib"),
        &[NativeValue::Int(3)],
    )?;

    let events = result.trace_events.unwrap();
    assert!(matches!(
        &events[0],
        TraceEvent::Call { method, call_depth: 1, .. } if method == "Math.Fib"
    ));
    assert!(events
        .iter()
        .all(|event| event.category() == TraceCategories::CALLS));
    let calls = events
        .iter()
        .filter(|event| matches!(event, TraceEvent::Call { .. }))
        .count();
    assert_eq!(calls as u64, result.stats.calls_pushed);
    Ok(())
}

#[test]
fn test_shared_initializer_keeps_callers_return_value() -> Result<()> {
    let text = |value: &'static str| {
        Generator::new(move |e| {
            e.assign_literal("r", value);
            e.return_value("r");
            Ok(())
        })
    };
    let loader = MethodTable::new()
        .with_method(MethodId::new("Sample.A"), text("from A"))
        .with_method(MethodId::new("Sample.Y"), text("from Y"))
        .with_method(
            MethodId::new("Config.Init"),
            Generator::new(|e| {
                e.static_call::<&str>(MethodId::new("Sample.Y"), &[]);
                e.assign_return_value("v");
                e.return_void();
                Ok(())
            }),
        )
        .with_method(
            MethodId::new("Sample.Main"),
            Generator::new(|e| {
                e.static_call::<&str>(MethodId::new("Sample.A"), &[]);
                e.assign_shared("config", TypeDescriptor::new("Sample.Config"));
                e.assign_return_value("r");
                e.return_value("r");
                Ok(())
            }),
        );
    let config = AnalyzingConfig::strict().with_shared_initializer(
        TypeDescriptor::new("Sample.Config"),
        MethodId::new("Config.Init"),
    );

    let result = Machine::new(config).run(&loader, &MethodId::new("Sample.Main"), &[])?;

    assert!(result.uses.contains(&MethodId::new("Sample.Y")));
    assert_eq!(
        result.return_native().and_then(NativeValue::as_str),
        Some("from A")
    );
    Ok(())
}
