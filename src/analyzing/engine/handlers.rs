//! Semantics of the individual instructions.

use crate::{
    analyzing::{
        engine::{
            call::CallKind,
            context::{AnalyzingContext, PendingCall},
            dynamic::DynamicQueue,
        },
        program::{CallSite, Instruction},
    },
    Result,
};

/// Executes one instruction against the top call of `ctx`.
pub(crate) fn execute(ctx: &mut AnalyzingContext<'_>, instruction: Instruction) -> Result<()> {
    match instruction {
        Instruction::AssignLiteral { target, value } => {
            let instance = ctx.create_direct(value)?;
            ctx.set_value(target, instance)
        }
        Instruction::Assign { target, source } => {
            let instance = ctx.get_value(&source)?;
            ctx.set_value(target, instance)
        }
        Instruction::AssignReturnValue { target } => {
            let instance = ctx.return_slot_value()?;
            ctx.set_value(target, instance)
        }
        Instruction::AssignArgument { target, index } => {
            let instance = ctx.argument(index)?;
            ctx.set_value(target, instance)
        }
        Instruction::AssignNewObject { target, ty } => {
            let instance = ctx.create_object(ty);
            ctx.set_value(target, instance)
        }
        Instruction::AssignShared { target, ty } => {
            let (instance, created) = ctx.shared_instance(&ty);
            ctx.set_value(target, instance)?;
            if created {
                ctx.initialize_shared(&ty, instance)?;
            }
            Ok(())
        }
        Instruction::StaticCall(site) | Instruction::InstanceCall(site) => call(ctx, &site),
        Instruction::DirectInvoke(method) => method.invoke(ctx),
        Instruction::ConditionalJump { condition, target } => {
            let instance = ctx.get_value(&condition)?;
            if ctx.settings().is_true(ctx.instance(instance)?) {
                ctx.jump(&target)?;
            }
            Ok(())
        }
        Instruction::Jump(target) => ctx.jump(&target),
        Instruction::Nop => Ok(()),
        Instruction::Return { value } => {
            let value = value.map(|name| ctx.get_value(&name)).transpose()?;
            ctx.return_value(value)
        }
    }
}

fn call(ctx: &mut AnalyzingContext<'_>, site: &CallSite) -> Result<()> {
    ctx.reset_return();

    let arguments = site
        .arguments
        .iter()
        .map(|name| ctx.get_value(name))
        .collect::<Result<Vec<_>>>()?;
    let resolution = ctx.fetch_call(&site.method, &arguments)?;
    let origin = ctx.current_block();

    ctx.push(PendingCall {
        method: site.method.clone(),
        resolution,
        arguments,
        transform: site.transform.clone(),
        kind: CallKind::Regular,
        following: DynamicQueue::new(),
        origin,
    })?;
    Ok(())
}
