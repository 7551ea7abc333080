use crate::{
    analyzing::{
        AnalyzingConfig, AnalyzingContext, AnalyzingResult, InstanceRef, Loader, MachineSettings,
        MethodId, NativeValue, RunOutcome,
    },
    Result,
};

/// Entry point of the interpreter.
///
/// A machine holds the settings of its runs and nothing else; every call of
/// [`Machine::run`] starts from an empty [`AnalyzingContext`], so a machine can be
/// reused and shared between threads.
///
/// # Example
///
/// ```rust
/// use dotsim::analyzing::{AnalyzingConfig, Generator, Machine, MethodId, MethodTable, NativeValue};
///
/// let loader = MethodTable::new().with_method(
///     MethodId::new("Sample.Hello"),
///     Generator::new(|e| {
///         e.assign_literal("s", "hello");
///         e.return_value("s");
///         Ok(())
///     }),
/// );
///
/// let result = Machine::<AnalyzingConfig>::default().run(&loader, &MethodId::new("Sample.Hello"), &[])?;
/// assert_eq!(result.return_native(), Some(&NativeValue::from("hello")));
/// # Ok::<(), dotsim::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct Machine<S = AnalyzingConfig> {
    settings: S,
}

impl<S: MachineSettings> Machine<S> {
    /// Creates a machine with the given settings.
    pub fn new(settings: S) -> Self {
        Machine { settings }
    }

    /// The settings of this machine.
    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// Runs `entry` with direct instances of `arguments` until the call stack is
    /// empty or a limit is reached.
    ///
    /// An entry method the loader cannot resolve yields an empty, completed result.
    ///
    /// # Errors
    ///
    /// Returns fatal errors of the run if `catch_exceptions` is off in the
    /// configuration; otherwise they are stored in [`AnalyzingResult::error`].
    pub fn run(
        &self,
        loader: &dyn Loader,
        entry: &MethodId,
        arguments: &[NativeValue],
    ) -> Result<AnalyzingResult> {
        self.run_with(loader, entry, |ctx| {
            arguments
                .iter()
                .cloned()
                .map(|value| ctx.create_direct(value))
                .collect()
        })
    }

    /// Runs `entry` with arguments built by `arguments` inside the new run.
    ///
    /// Use this to pass data instances or instances of explicit types.
    ///
    /// # Errors
    ///
    /// Like [`Machine::run`]; errors of `arguments` are handled the same way.
    pub fn run_with<F>(
        &self,
        loader: &dyn Loader,
        entry: &MethodId,
        arguments: F,
    ) -> Result<AnalyzingResult>
    where
        F: FnOnce(&mut AnalyzingContext<'_>) -> Result<Vec<InstanceRef>>,
    {
        let mut ctx = AnalyzingContext::new(loader, &self.settings)?;
        ctx.stats_mut().start();

        match self.execute(&mut ctx, entry, arguments) {
            Ok(outcome) => {
                log::debug!(
                    "run of {} {} after {} instructions",
                    entry,
                    outcome,
                    ctx.stats().instructions_executed
                );
                Ok(ctx.finish(outcome, None))
            }
            Err(error) if self.settings.config().catch_exceptions => {
                log::warn!("run of {entry} failed: {error}");
                Ok(ctx.finish(RunOutcome::Failed, Some(error)))
            }
            Err(error) => Err(error),
        }
    }

    fn execute<F>(
        &self,
        ctx: &mut AnalyzingContext<'_>,
        entry: &MethodId,
        arguments: F,
    ) -> Result<RunOutcome>
    where
        F: FnOnce(&mut AnalyzingContext<'_>) -> Result<Vec<InstanceRef>>,
    {
        let arguments = arguments(ctx)?;
        if !ctx.call(entry.clone(), arguments)? {
            log::warn!("entry method {entry} could not be pushed");
            ctx.flush_trace()?;
            return Ok(RunOutcome::Completed);
        }

        let limits = &self.settings.config().limits;
        while ctx.has_pending_instruction()? {
            if let Some(limit) = ctx
                .stats()
                .check_limits(limits, ctx.call_depth(), ctx.heap().len())
            {
                log::warn!("run of {entry} stopped: {limit}");
                ctx.flush_trace()?;
                return Ok(RunOutcome::LimitReached(limit));
            }
            ctx.step()?;
        }
        ctx.flush_trace()?;
        Ok(RunOutcome::Completed)
    }
}
