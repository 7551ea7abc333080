use crate::{
    analyzing::{
        AnalyzingContext, DirectMethod, Emitter, Generator, MethodId, MethodTable, NativeValue,
    },
    Result,
};

pub const FIB: &str = "Math.Fib";
pub const ADD: &str = "Math.Add";
pub const SUB: &str = "Math.Sub";
pub const LESS_THAN: &str = "Math.LessThan";

/// Reads argument `index` of the running native method as an `i32`.
pub fn int_argument(ctx: &AnalyzingContext<'_>, index: usize) -> Result<i32> {
    let value = ctx.native_argument(index)?;
    value
        .as_i32()
        .ok_or_else(|| usage_error!("Argument {} is not an integer: {}", index, value))
}

/// Native method combining two integer arguments.
pub fn binary_int(name: &str, op: fn(i32, i32) -> NativeValue) -> Generator {
    Generator::direct(DirectMethod::new(name, move |ctx| {
        let result = op(int_argument(ctx, 0)?, int_argument(ctx, 1)?);
        let instance = ctx.create_direct(result)?;
        ctx.return_value(Some(instance))
    }))
}

/// Recursive fibonacci written in IAL.
pub fn emit_fib(e: &mut Emitter) -> Result<()> {
    let base = e.create_label("base");

    e.start_new_info_block();
    e.assign_argument("n", 0);
    e.assign_literal("two", 2);
    e.static_call(MethodId::new(LESS_THAN), &["n", "two"]);
    e.assign_return_value("small");
    e.conditional_jump("small", &base)?;

    e.start_new_info_block();
    e.assign_literal("one", 1);
    e.static_call(MethodId::new(SUB), &["n", "one"]);
    e.assign_return_value("a");
    e.static_call(MethodId::new(FIB), &["a"]);
    e.assign_return_value("fa");
    e.static_call(MethodId::new(SUB), &["n", "two"]);
    e.assign_return_value("b");
    e.static_call(MethodId::new(FIB), &["b"]);
    e.assign_return_value("fb");
    e.static_call(MethodId::new(ADD), &["fa", "fb"]);
    e.assign_return_value("r");
    e.return_value("r");

    e.start_new_info_block();
    e.set_label(&base)?;
    e.return_value("n");
    Ok(())
}

/// Loader knowing the integer helpers and [`emit_fib`].
pub fn math_loader() -> MethodTable {
    MethodTable::new()
        .with_method(
            MethodId::new(ADD),
            binary_int(ADD, |a, b| NativeValue::Int(a.wrapping_add(b))),
        )
        .with_method(
            MethodId::new(SUB),
            binary_int(SUB, |a, b| NativeValue::Int(a.wrapping_sub(b))),
        )
        .with_method(
            MethodId::new(LESS_THAN),
            binary_int(LESS_THAN, |a, b| NativeValue::Bool(a < b)),
        )
        .with_method(MethodId::new(FIB), Generator::named(FIB, emit_fib))
}

pub fn fib(n: i32) -> i32 {
    if n < 2 {
        n
    } else {
        fib(n - 1) + fib(n - 2)
    }
}
