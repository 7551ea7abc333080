//! The interpreter state of one run.
//!
//! [`AnalyzingContext`] owns everything a run touches: the call stack, the instance
//! heap, the execution trace, globals, shared instances, the per-run generator
//! cache and the return slot. There is no state outside of it, so independent runs
//! never influence each other.
//!
//! The context executes one instruction per [`AnalyzingContext::step`]. The
//! [`Machine`](crate::analyzing::Machine) drives it to completion while checking
//! limits; hosts wanting to interleave other work drive it themselves.

use std::{mem, sync::Arc};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    analyzing::{
        engine::{
            call::{CallContext, CallKind},
            dynamic::{next_chained, DynamicCall, DynamicQueue},
            handlers,
            stats::ExecutionStats,
            trace::{TraceCategories, TraceEvent, TraceWriter},
        },
        execution::{BlockId, CallId, ExecutionTrace},
        program::{CallTransformProvider, Instruction, Label},
        value::Edit,
        AnalyzingResult, Emitter, Generator, Instance, InstanceHeap, InstanceKind, InstanceRef,
        Loader, MachineSettings, MethodId, NativeValue, RunOutcome, TypeDescriptor, VariableName,
    },
    Error, Result,
};

/// Outcome of resolving a call, see [`AnalyzingContext::fetch_call`].
#[derive(Clone, Debug)]
pub enum CallResolution {
    /// The loader replaced this call site; the generator is not cached.
    Overridden(Generator),
    /// The call resolved to `method`, whose generator is cached for the run.
    Resolved {
        /// The concrete method, differs from the requested one for virtual calls
        method: MethodId,
        /// Its generator
        generator: Generator,
    },
    /// No generator is known; pushing the call skips it.
    Unresolved,
}

impl CallResolution {
    /// Generator of a resolved or overridden call.
    #[must_use]
    pub fn generator(&self) -> Option<&Generator> {
        match self {
            CallResolution::Overridden(generator)
            | CallResolution::Resolved { generator, .. } => Some(generator),
            CallResolution::Unresolved => None,
        }
    }

    /// Returns `true` if the call can be pushed.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, CallResolution::Unresolved)
    }
}

/// Value left behind by the most recent call, read by
/// [`Instruction::AssignReturnValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnSlot {
    /// No call returned a value since the last call instruction.
    Empty,
    /// The last call returned this instance.
    Value(InstanceRef),
    /// The last call was skipped; its result is unknown.
    Tainted,
}

/// A call about to be pushed.
pub(crate) struct PendingCall {
    pub method: MethodId,
    pub resolution: CallResolution,
    pub arguments: Vec<InstanceRef>,
    pub transform: Option<Arc<dyn CallTransformProvider>>,
    pub kind: CallKind,
    pub following: DynamicQueue,
    pub origin: Option<BlockId>,
}

/// Interpreter state of one run.
pub struct AnalyzingContext<'a> {
    loader: &'a dyn Loader,
    settings: &'a dyn MachineSettings,
    stack: Vec<CallId>,
    trace: ExecutionTrace,
    heap: InstanceHeap,
    globals: FxHashMap<VariableName, InstanceRef>,
    shared: FxHashMap<TypeDescriptor, InstanceRef>,
    generators: FxHashMap<MethodId, Generator>,
    invoked: FxHashSet<MethodId>,
    last_return: ReturnSlot,
    entry: Option<CallId>,
    entry_return: Option<InstanceRef>,
    null: Option<InstanceRef>,
    stats: ExecutionStats,
    tracer: Option<TraceWriter>,
    categories: TraceCategories,
}

impl<'a> AnalyzingContext<'a> {
    /// Creates the state of a new run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if a trace output file is configured and cannot
    /// be opened.
    pub fn new(loader: &'a dyn Loader, settings: &'a dyn MachineSettings) -> Result<Self> {
        let tracing = &settings.config().tracing;
        let tracer = if tracing.is_enabled() {
            Some(match &tracing.output_path {
                Some(path) => TraceWriter::new_file(path, tracing.context_prefix.clone())?,
                None => TraceWriter::new_memory(
                    tracing.max_trace_entries,
                    tracing.context_prefix.clone(),
                ),
            })
        } else {
            None
        };

        Ok(AnalyzingContext {
            loader,
            settings,
            stack: Vec::new(),
            trace: ExecutionTrace::new(),
            heap: InstanceHeap::new(),
            globals: FxHashMap::default(),
            shared: FxHashMap::default(),
            generators: FxHashMap::default(),
            invoked: FxHashSet::default(),
            last_return: ReturnSlot::Empty,
            entry: None,
            entry_return: None,
            null: None,
            stats: ExecutionStats::new(),
            tracer,
            categories: tracing.categories,
        })
    }

    /// The loader of this run.
    #[must_use]
    pub fn loader(&self) -> &'a dyn Loader {
        self.loader
    }

    /// The settings of this run.
    #[must_use]
    pub fn settings(&self) -> &'a dyn MachineSettings {
        self.settings
    }

    /// All instances created so far.
    #[must_use]
    pub fn heap(&self) -> &InstanceHeap {
        &self.heap
    }

    /// Calls and blocks executed so far.
    #[must_use]
    pub fn trace(&self) -> &ExecutionTrace {
        &self.trace
    }

    /// Counters of this run.
    #[must_use]
    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ExecutionStats {
        &mut self.stats
    }

    /// Depth of the call stack.
    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns `true` when the call stack is empty.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.stack.is_empty()
    }

    /// The first call pushed in this run.
    #[must_use]
    pub fn entry_context(&self) -> Option<CallId> {
        self.entry
    }

    /// Value returned by the entry call, once it returned.
    #[must_use]
    pub fn entry_return(&self) -> Option<InstanceRef> {
        self.entry_return
    }

    /// The current return slot.
    #[must_use]
    pub fn last_return(&self) -> ReturnSlot {
        self.last_return
    }

    /// Methods of all pushed calls, after resolution.
    #[must_use]
    pub fn uses(&self) -> &FxHashSet<MethodId> {
        &self.invoked
    }

    /// Returns `true` if the generator of `method` is in the run's cache.
    #[must_use]
    pub fn is_cached(&self, method: &MethodId) -> bool {
        self.generators.contains_key(method)
    }

    /// Returns an instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] for handles of other runs.
    pub fn instance(&self, instance: InstanceRef) -> Result<&Instance> {
        self.heap.get(instance)
    }

    /// The call on top of the stack.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveCall`] if the stack is empty.
    pub fn current_call(&self) -> Result<&CallContext> {
        let id = self.current_id()?;
        self.trace.call(id).ok_or(Error::NoActiveCall)
    }

    /// The block currently executing in the top call.
    #[must_use]
    pub fn current_block(&self) -> Option<BlockId> {
        self.current_call().ok().and_then(CallContext::current_block)
    }

    /// Arguments of the top call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveCall`] if the stack is empty.
    pub fn current_arguments(&self) -> Result<&[InstanceRef]> {
        Ok(self.current_call()?.arguments())
    }

    /// Argument `index` of the top call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveCall`] if the stack is empty and
    /// [`Error::ArgumentOutOfBounds`] for a missing argument.
    pub fn argument(&self, index: usize) -> Result<InstanceRef> {
        self.current_call()?.argument(index)
    }

    /// Native value of argument `index` of the top call.
    ///
    /// # Errors
    ///
    /// Like [`AnalyzingContext::argument`]; a data instance is a usage error.
    pub fn native_argument(&self, index: usize) -> Result<&NativeValue> {
        let instance = self.heap.get(self.argument(index)?)?;
        instance.direct_value().ok_or_else(|| {
            usage_error!(
                "Argument {} of type {} is not a direct instance",
                index,
                instance.ty()
            )
        })
    }

    /// Reads a variable of the top call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndeclaredVariable`] for unassigned variables.
    pub fn get_value(&self, name: &VariableName) -> Result<InstanceRef> {
        self.current_call()?.get_value(name)
    }

    /// Assigns a variable of the top call, recording the scope transition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] for handles of other runs.
    pub fn set_value(&mut self, name: VariableName, value: InstanceRef) -> Result<()> {
        let id = self.current_id()?;
        let ExecutionTrace { calls, blocks } = &mut self.trace;
        let call = calls.get_mut(id.0).ok_or(Error::NoActiveCall)?;
        call.set_value(name, value, &self.heap, blocks)
    }

    /// Moves the instruction pointer of the top call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundLabel`] for labels never bound.
    pub fn jump(&mut self, label: &Label) -> Result<()> {
        let id = self.current_id()?;
        self.trace
            .call_mut(id)
            .ok_or(Error::NoActiveCall)?
            .jump(label)
    }

    /// Creates a direct instance with the value's default type.
    pub fn create_direct(&mut self, value: NativeValue) -> Result<InstanceRef> {
        let ty = value.default_type();
        Ok(self.create_direct_typed(ty, value))
    }

    /// Creates a direct instance of an explicit type.
    pub fn create_direct_typed(&mut self, ty: TypeDescriptor, value: NativeValue) -> InstanceRef {
        let block = self.current_block();
        self.heap.alloc(ty, InstanceKind::Direct(value), block)
    }

    /// Creates an empty data instance.
    pub fn create_data(&mut self, ty: TypeDescriptor) -> InstanceRef {
        let block = self.current_block();
        self.heap
            .alloc(ty, InstanceKind::Data(FxHashMap::default()), block)
    }

    /// Creates a new object of `ty`: a direct instance wrapping null for direct
    /// types, an empty data instance otherwise.
    pub fn create_object(&mut self, ty: TypeDescriptor) -> InstanceRef {
        if self.settings.is_direct_type(&ty) {
            self.create_direct_typed(ty, NativeValue::Null)
        } else {
            self.create_data(ty)
        }
    }

    /// Creates a dirty instance of unknown type and value.
    pub fn create_unknown(&mut self) -> Result<InstanceRef> {
        let instance = self.create_direct_typed(TypeDescriptor::unknown(), NativeValue::Null);
        self.heap.set_dirty(instance)?;
        Ok(instance)
    }

    /// The canonical null instance of this run, created on first use.
    ///
    /// The null instance is never marked dirty.
    pub fn null_instance(&mut self) -> InstanceRef {
        if let Some(null) = self.null {
            return null;
        }
        let value = self.settings.null_value();
        let null = self.heap.alloc(value.default_type(), InstanceKind::Direct(value), None);
        self.null = Some(null);
        null
    }

    /// Reads a field of a data instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotDataInstance`] for direct instances.
    pub fn get_field(&self, instance: InstanceRef, name: &str) -> Result<Option<InstanceRef>> {
        let target = self.heap.get(instance)?;
        if target.is_direct() {
            return Err(Error::NotDataInstance(instance));
        }
        Ok(target.field(name))
    }

    /// Sets a field of a data instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotDataInstance`] for direct instances and
    /// [`Error::InvalidInstance`] for foreign handles.
    pub fn set_field(&mut self, instance: InstanceRef, name: &str, value: InstanceRef) -> Result<()> {
        self.heap.check(value)?;
        if self.heap.get_mut(instance)?.set_field(name, value) {
            Ok(())
        } else {
            Err(Error::NotDataInstance(instance))
        }
    }

    /// Replaces the payload of a direct instance, as native constructors do.
    ///
    /// # Errors
    ///
    /// Returns a usage error for data instances and for the null instance.
    pub fn set_direct_value(&mut self, instance: InstanceRef, value: NativeValue) -> Result<()> {
        if self.null == Some(instance) {
            return Err(usage_error!("The null instance cannot be changed"));
        }
        if self.heap.get_mut(instance)?.set_direct_value(value) {
            Ok(())
        } else {
            Err(usage_error!("{} is not a direct instance", instance))
        }
    }

    /// Marks an instance dirty. The canonical null instance is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] for foreign handles.
    pub fn set_dirty(&mut self, instance: InstanceRef) -> Result<()> {
        if self.null == Some(instance) {
            return self.heap.check(instance);
        }
        self.heap.set_dirty(instance)
    }

    /// Records an edit on an instance, stamped with the current block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] for foreign handles.
    pub fn add_edit(&mut self, instance: InstanceRef, name: impl Into<String>) -> Result<()> {
        let block = self.current_block();
        self.heap.get_mut(instance)?.add_edit(Edit {
            name: name.into(),
            block,
        });
        Ok(())
    }

    /// Reads a global variable.
    #[must_use]
    pub fn global(&self, name: &VariableName) -> Option<InstanceRef> {
        self.globals.get(name).copied()
    }

    /// Assigns a global variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] for foreign handles.
    pub fn set_global(&mut self, name: VariableName, value: InstanceRef) -> Result<()> {
        self.heap.check(value)?;
        self.globals.insert(name, value);
        Ok(())
    }

    /// Returns the shared instance of `ty`, creating it on first use.
    ///
    /// The second element is `true` if the instance was just created.
    pub fn shared_instance(&mut self, ty: &TypeDescriptor) -> (InstanceRef, bool) {
        if let Some(shared) = self.shared.get(ty) {
            return (*shared, false);
        }
        let shared = self.create_object(ty.clone());
        self.shared.insert(ty.clone(), shared);
        (shared, true)
    }

    /// Enqueues a dynamic call on the top call.
    ///
    /// The call runs after the top call and all calls it pushes have completed,
    /// after dynamic calls enqueued earlier by the same call.
    ///
    /// # Arguments
    ///
    /// * `method` - Method to call
    /// * `generator` - Generator to use, resolved through the loader if `None`
    /// * `arguments` - Arguments of the call
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveCall`] if the stack is empty and
    /// [`Error::InvalidInstance`] for foreign handles.
    pub fn dynamic_call(
        &mut self,
        method: MethodId,
        generator: Option<Generator>,
        arguments: Vec<InstanceRef>,
    ) -> Result<()> {
        for argument in &arguments {
            self.heap.check(*argument)?;
        }
        let origin = self.current_block();
        let id = self.current_id()?;
        let call = self.trace.call_mut(id).ok_or(Error::NoActiveCall)?;

        log::debug!("{} enqueues dynamic call {}", call.method(), method);
        let event = TraceEvent::DynamicEnqueue {
            method: method.to_string(),
            enqueued_by: call.method().to_string(),
            queue_len: call.own_dynamic_calls.len() + 1,
        };
        call.own_dynamic_calls.push_back(DynamicCall {
            method,
            generator,
            arguments,
            origin,
        });

        self.stats.dynamic_calls_enqueued += 1;
        self.emit(TraceCategories::DYNAMIC_CALLS, || event)
    }

    /// Resolves a call in three steps: a call-site override from the loader, the
    /// dynamic resolution of virtual methods against the argument types, and the
    /// lookup of the generator, cached per run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] for foreign argument handles.
    pub fn fetch_call(
        &mut self,
        method: &MethodId,
        arguments: &[InstanceRef],
    ) -> Result<CallResolution> {
        let instances = arguments
            .iter()
            .map(|argument| self.heap.get(*argument))
            .collect::<Result<Vec<_>>>()?;

        if let Some(generator) = self.loader.overriding_generator(method, &instances) {
            return Ok(CallResolution::Overridden(generator));
        }

        let resolved = if method.needs_dynamic_resolution() {
            let types = instances
                .iter()
                .map(|instance| instance.ty().clone())
                .collect::<Vec<_>>();
            match self.loader.dynamic_resolve(method, &types) {
                Some(resolved) => resolved,
                None => return Ok(CallResolution::Unresolved),
            }
        } else {
            method.clone()
        };

        if let Some(generator) = self.generators.get(&resolved) {
            return Ok(CallResolution::Resolved {
                method: resolved,
                generator: generator.clone(),
            });
        }

        match self.loader.static_resolve(&resolved) {
            Some(generator) => {
                self.generators.insert(resolved.clone(), generator.clone());
                Ok(CallResolution::Resolved {
                    method: resolved,
                    generator,
                })
            }
            None => Ok(CallResolution::Unresolved),
        }
    }

    /// Pushes a call on top of the stack.
    ///
    /// Unresolved calls and calls with a dirty argument are skipped instead: all
    /// arguments become dirty and the return slot is tainted.
    ///
    /// # Returns
    ///
    /// `true` if a frame was pushed, `false` if the call was skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] for foreign handles and
    /// [`Error::Generator`] if the callee's program cannot be generated.
    pub fn push_call(
        &mut self,
        method: MethodId,
        resolution: CallResolution,
        arguments: Vec<InstanceRef>,
    ) -> Result<bool> {
        let origin = self.current_block();
        self.push(PendingCall {
            method,
            resolution,
            arguments,
            transform: None,
            kind: CallKind::Regular,
            following: DynamicQueue::new(),
            origin,
        })
    }

    /// Resolves and pushes a call, see [`AnalyzingContext::fetch_call`] and
    /// [`AnalyzingContext::push_call`].
    ///
    /// # Errors
    ///
    /// Like [`AnalyzingContext::push_call`].
    pub fn call(&mut self, method: MethodId, arguments: Vec<InstanceRef>) -> Result<bool> {
        let resolution = self.fetch_call(&method, &arguments)?;
        self.push_call(method, resolution, arguments)
    }

    pub(crate) fn push(&mut self, pending: PendingCall) -> Result<bool> {
        for argument in &pending.arguments {
            self.heap.check(*argument)?;
        }

        let (method, generator) = match pending.resolution {
            CallResolution::Unresolved => {
                self.skip(&pending.method, &pending.arguments, pending.kind, "unresolved")?;
                return Ok(false);
            }
            CallResolution::Overridden(generator) => (pending.method, generator),
            CallResolution::Resolved { method, generator } => (method, generator),
        };

        let mut dirty = false;
        for argument in &pending.arguments {
            dirty |= self.heap.is_dirty(*argument)?;
        }
        if dirty {
            self.skip(&method, &pending.arguments, pending.kind, "tainted")?;
            return Ok(false);
        }

        let mut emitter = Emitter::new();
        generator.generate(&mut emitter)?;
        let program = emitter.get_emitted_instructions()?;

        let caller = self.stack.last().copied();
        let arg_count = pending.arguments.len();
        let id = self.trace.push_call(|id| {
            CallContext::new(
                id,
                method.clone(),
                program,
                pending.arguments,
                caller,
                pending.transform,
                pending.kind,
            )
        });
        if let Some(call) = self.trace.call_mut(id) {
            call.following_dynamic_calls = pending.following;
            if pending.kind != CallKind::Regular {
                call.saved_return = Some(self.last_return);
            }
        }
        if let Some(block) = pending.origin.and_then(|b| self.trace.block_mut(b)) {
            block.add_nested_call(id);
        }

        self.stack.push(id);
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        self.stats.calls_pushed += 1;
        log::debug!(
            "push {} ({}) at depth {}",
            method,
            pending.kind,
            self.stack.len()
        );
        let depth = self.stack.len();
        self.emit(TraceCategories::CALLS, || TraceEvent::Call {
            method: method.to_string(),
            arg_count,
            call_depth: depth,
            kind: pending.kind.into(),
        })?;
        self.invoked.insert(method);
        Ok(true)
    }

    fn skip(
        &mut self,
        method: &MethodId,
        arguments: &[InstanceRef],
        kind: CallKind,
        reason: &'static str,
    ) -> Result<()> {
        for argument in arguments {
            self.set_dirty(*argument)?;
        }
        if kind == CallKind::Regular {
            self.last_return = ReturnSlot::Tainted;
        }
        self.stats.calls_skipped += 1;

        log::warn!("skipping {reason} call {method}, tainting {} arguments", arguments.len());
        self.emit(TraceCategories::TAINT, || TraceEvent::CallSkipped {
            method: method.to_string(),
            reason,
            tainted: arguments.len(),
        })
    }

    /// Pops the top call and records its return value.
    ///
    /// Regular calls leave `value`, or the null instance for `None`, in the return
    /// slot. Dynamic calls and initializers restore the slot they found when they
    /// were pushed. Afterwards the next queued dynamic call is pushed, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveCall`] if the stack is empty and
    /// [`Error::InvalidInstance`] for a foreign handle.
    pub fn return_value(&mut self, value: Option<InstanceRef>) -> Result<()> {
        if let Some(value) = value {
            self.heap.check(value)?;
        }
        self.pop(value)
    }

    fn pop(&mut self, value: Option<InstanceRef>) -> Result<()> {
        let id = self.stack.pop().ok_or(Error::NoActiveCall)?;
        self.stats.calls_popped += 1;

        let call = self.trace.call_mut(id).ok_or(Error::NoActiveCall)?;
        let kind = call.kind();
        let method = call.method().to_string();
        let own = mem::take(&mut call.own_dynamic_calls);
        let following = mem::take(&mut call.following_dynamic_calls);
        let saved = call.saved_return.take();

        if kind == CallKind::Regular {
            let value = match value {
                Some(value) => value,
                None => self.null_instance(),
            };
            self.last_return = ReturnSlot::Value(value);
            if self.entry == Some(id) {
                self.entry_return = Some(value);
            }
        } else if let Some(slot) = saved {
            // calls made inside the frame must not leak into the interrupted caller
            self.last_return = slot;
        }

        log::debug!("pop {} at depth {}", method, self.stack.len());
        let depth = self.stack.len();
        self.emit(TraceCategories::CALLS, || TraceEvent::Return {
            method,
            has_return_value: value.is_some(),
            call_depth: depth,
        })?;

        let mut pending = next_chained(&own, &following);
        while let Some((call, rest)) = pending {
            if self.push_dynamic(call, rest.clone())? {
                break;
            }
            pending = next_chained(&DynamicQueue::new(), &rest);
        }
        Ok(())
    }

    fn push_dynamic(&mut self, call: DynamicCall, following: DynamicQueue) -> Result<bool> {
        let resolution = match call.generator {
            Some(generator) => CallResolution::Resolved {
                method: call.method.clone(),
                generator,
            },
            None => self.fetch_call(&call.method, &call.arguments)?,
        };
        self.push(PendingCall {
            method: call.method,
            resolution,
            arguments: call.arguments,
            transform: None,
            kind: CallKind::Dynamic,
            following,
            origin: call.origin,
        })
    }

    /// Pushes the initializer of a freshly created shared instance.
    pub(crate) fn initialize_shared(&mut self, ty: &TypeDescriptor, shared: InstanceRef) -> Result<()> {
        let Some(initializer) = self.settings.shared_initializer(ty) else {
            return Ok(());
        };
        let resolution = self.fetch_call(&initializer, &[shared])?;
        let origin = self.current_block();
        self.push(PendingCall {
            method: initializer,
            resolution,
            arguments: vec![shared],
            transform: None,
            kind: CallKind::SharedInitializer,
            following: DynamicQueue::new(),
            origin,
        })?;
        Ok(())
    }

    /// Clears the return slot before a call instruction.
    pub(crate) fn reset_return(&mut self) {
        self.last_return = ReturnSlot::Empty;
    }

    /// Value for an `assign-return-value` instruction.
    ///
    /// An empty slot yields the null instance, a tainted slot a new dirty instance
    /// of unknown type.
    pub(crate) fn return_slot_value(&mut self) -> Result<InstanceRef> {
        match self.last_return {
            ReturnSlot::Value(value) => Ok(value),
            ReturnSlot::Empty => Ok(self.null_instance()),
            ReturnSlot::Tainted => self.create_unknown(),
        }
    }

    /// Pulls the next instruction from the top call.
    ///
    /// Exhausted calls are popped as void returns, which may push queued dynamic
    /// calls. Returns `None` once the stack is empty.
    ///
    /// # Errors
    ///
    /// Returns errors of pushing queued dynamic calls.
    pub fn next_instruction(&mut self) -> Result<Option<Instruction>> {
        loop {
            let Some(&id) = self.stack.last() else {
                return Ok(None);
            };
            let ExecutionTrace { calls, blocks } = &mut self.trace;
            let call = calls.get_mut(id.0).ok_or(Error::NoActiveCall)?;
            if let Some(instruction) = call.next_instruction(blocks) {
                return Ok(Some(instruction));
            }
            self.pop(None)?;
        }
    }

    /// Pops exhausted calls until the top call has an instruction left.
    ///
    /// Popping may push queued dynamic calls. Returns `false` once the stack is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns errors of pushing queued dynamic calls.
    pub fn has_pending_instruction(&mut self) -> Result<bool> {
        while let Some(&id) = self.stack.last() {
            let call = self.trace.call(id).ok_or(Error::NoActiveCall)?;
            if !call.is_exhausted() {
                return Ok(true);
            }
            self.pop(None)?;
        }
        Ok(false)
    }

    /// Executes one instruction.
    ///
    /// # Returns
    ///
    /// `false` if the run is finished and nothing was executed.
    ///
    /// # Errors
    ///
    /// Returns fatal errors of the executed instruction.
    pub fn step(&mut self) -> Result<bool> {
        let Some(instruction) = self.next_instruction()? else {
            return Ok(false);
        };
        self.stats.instructions_executed += 1;

        if let Ok(call) = self.current_call() {
            let offset = call.pointer().saturating_sub(1);
            log::trace!("{}@{}: {}", call.method(), offset, instruction);
            if self.categories.contains(TraceCategories::INSTRUCTIONS) {
                let event = TraceEvent::Instruction {
                    method: call.method().to_string(),
                    offset,
                    kind: instruction.kind(),
                    call_depth: self.stack.len(),
                };
                self.emit(TraceCategories::INSTRUCTIONS, || event)?;
            }
        }

        handlers::execute(self, instruction)?;
        Ok(true)
    }

    /// Runs until the stack is empty, without any limit.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error.
    pub fn run_to_end(&mut self) -> Result<()> {
        while self.step()? {}
        Ok(())
    }

    pub(crate) fn finish(self, outcome: RunOutcome, error: Option<Error>) -> AnalyzingResult {
        let trace_events = self.tracer.as_ref().and_then(TraceWriter::take_buffer);

        AnalyzingResult {
            return_value: self.entry_return,
            entry_context: self.entry,
            trace: self.trace,
            heap: self.heap,
            uses: self.invoked,
            error,
            outcome,
            stats: self.stats,
            trace_events,
        }
    }

    fn current_id(&self) -> Result<CallId> {
        self.stack.last().copied().ok_or(Error::NoActiveCall)
    }

    /// Flushes the trace output file, if any.
    pub(crate) fn flush_trace(&self) -> Result<()> {
        if let Some(tracer) = &self.tracer {
            tracer.flush()?;
        }
        Ok(())
    }

    fn emit(&self, category: TraceCategories, event: impl FnOnce() -> TraceEvent) -> Result<()> {
        if let Some(tracer) = &self.tracer {
            if self.categories.contains(category) {
                tracer.write(event())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        analyzing::{AnalyzingConfig, DirectMethod, MethodTable},
        test::{fib, math_loader, FIB},
    };

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn record(log: &Log, name: &'static str) -> DirectMethod {
        let log = log.clone();
        DirectMethod::new(name, move |_| {
            log.lock().unwrap().push(name);
            Ok(())
        })
    }

    fn int(ctx: &mut AnalyzingContext<'_>, value: i32) -> InstanceRef {
        ctx.create_direct(NativeValue::Int(value)).unwrap()
    }

    #[test]
    fn test_run_fib() {
        let loader = math_loader();
        let config = AnalyzingConfig::strict();
        let mut ctx = AnalyzingContext::new(&loader, &config).unwrap();

        let n = int(&mut ctx, 6);
        assert!(ctx.call(MethodId::new(FIB), vec![n]).unwrap());
        ctx.run_to_end().unwrap();

        let result = ctx.entry_return().unwrap();
        assert_eq!(
            ctx.instance(result).unwrap().direct_value(),
            Some(&NativeValue::Int(fib(6)))
        );
        assert!(ctx.is_finished());
        assert!(ctx.stats().is_balanced());
    }

    #[test]
    fn test_fetch_call_caches_resolved_generator() {
        let loader = math_loader();
        let config = AnalyzingConfig::default();
        let mut ctx = AnalyzingContext::new(&loader, &config).unwrap();
        let fib = MethodId::new(FIB);

        let first = ctx.fetch_call(&fib, &[]).unwrap();
        let second = ctx.fetch_call(&fib, &[]).unwrap();

        assert!(ctx.is_cached(&fib));
        assert!(first
            .generator()
            .unwrap()
            .ptr_eq(second.generator().unwrap()));
        assert!(!ctx
            .fetch_call(&MethodId::new("Missing.Method"), &[])
            .unwrap()
            .is_resolved());
    }

    #[test]
    fn test_skipped_call_taints_arguments_and_return() {
        let loader = math_loader().with_method(
            MethodId::new("Test.Entry"),
            Generator::new(|e| {
                e.assign_return_value("nothing");
                e.assign_literal("x", 1);
                e.static_call(MethodId::new("Missing.Method"), &["x", "nothing"]);
                e.assign_return_value("r");
                e.static_call(MethodId::new("Math.Add"), &["r", "x"]);
                e.assign_return_value("sum");
                e.return_value("sum");
                Ok(())
            }),
        );
        let config = AnalyzingConfig::strict();
        let mut ctx = AnalyzingContext::new(&loader, &config).unwrap();

        ctx.call(MethodId::new("Test.Entry"), Vec::new()).unwrap();
        ctx.run_to_end().unwrap();

        let entry = ctx.entry_context().unwrap();
        let call = ctx.trace().call(entry).unwrap();
        let value = |name: &str| call.get_value(&VariableName::new(name)).unwrap();

        assert!(ctx.heap().is_dirty(value("x")).unwrap());
        assert!(ctx.heap().is_dirty(value("r")).unwrap());
        assert!(ctx.heap().is_dirty(value("sum")).unwrap());
        assert!(ctx.instance(value("r")).unwrap().ty().is_unknown());
        assert!(!ctx.heap().is_dirty(value("nothing")).unwrap());
        assert_eq!(ctx.stats().calls_skipped, 2);
        assert!(!ctx.uses().contains(&MethodId::new("Math.Add")));
    }

    #[test]
    fn test_dynamic_calls_run_after_nested_calls() {
        let log: Log = Arc::default();
        let enqueue = DirectMethod::new("Test.Enqueue", |ctx| {
            ctx.dynamic_call(MethodId::new("Test.X"), None, Vec::new())?;
            ctx.dynamic_call(MethodId::new("Test.Y"), None, Vec::new())
        });

        let loader = MethodTable::new()
            .with_method(MethodId::new("Test.A"), {
                let log = log.clone();
                Generator::new(move |e| {
                    e.direct_invoke(record(&log, "A"));
                    e.direct_invoke(enqueue.clone());
                    e.static_call::<&str>(MethodId::new("Test.Z"), &[]);
                    e.return_void();
                    Ok(())
                })
            })
            .with_method(MethodId::new("Test.Z"), {
                let log = log.clone();
                Generator::new(move |e| {
                    e.direct_invoke(record(&log, "Z"));
                    e.static_call::<&str>(MethodId::new("Test.W"), &[]);
                    Ok(())
                })
            })
            .with_method(MethodId::new("Test.W"), Generator::direct(record(&log, "W")))
            .with_method(MethodId::new("Test.X"), Generator::direct(record(&log, "X")))
            .with_method(MethodId::new("Test.Y"), Generator::direct(record(&log, "Y")));
        let config = AnalyzingConfig::strict();
        let mut ctx = AnalyzingContext::new(&loader, &config).unwrap();

        ctx.call(MethodId::new("Test.A"), Vec::new()).unwrap();
        ctx.run_to_end().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["A", "Z", "W", "X", "Y"]);
        assert_eq!(ctx.stats().dynamic_calls_enqueued, 2);
        assert!(ctx.stats().is_balanced());

        let dynamic = ctx
            .trace()
            .calls()
            .filter(|call| call.is_dynamic())
            .map(|call| call.method().name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(dynamic, vec!["Test.X", "Test.Y"]);
    }

    #[test]
    fn test_shared_instance_initialized_once() {
        let ty = TypeDescriptor::new("Test.Settings");
        let loader = MethodTable::new()
            .with_method(
                MethodId::new("Test.Entry"),
                Generator::new({
                    let ty = ty.clone();
                    move |e| {
                        e.assign_shared("first", ty.clone());
                        e.assign_shared("second", ty.clone());
                        e.return_value("second");
                        Ok(())
                    }
                }),
            )
            .with_method(
                MethodId::new("Test.Settings..cctor"),
                Generator::direct(DirectMethod::new("Test.Settings..cctor", |ctx| {
                    let shared = ctx.argument(0)?;
                    let ready = ctx.create_direct(NativeValue::Bool(true))?;
                    ctx.set_field(shared, "ready", ready)?;
                    ctx.return_value(None)
                })),
            );
        let config = AnalyzingConfig::strict()
            .with_shared_initializer(ty, MethodId::new("Test.Settings..cctor"));
        let mut ctx = AnalyzingContext::new(&loader, &config).unwrap();

        ctx.call(MethodId::new("Test.Entry"), Vec::new()).unwrap();
        ctx.run_to_end().unwrap();

        let shared = ctx.entry_return().unwrap();
        assert!(ctx.get_field(shared, "ready").unwrap().is_some());
        assert_eq!(ctx.stats().calls_pushed, 2);
    }

    #[test]
    fn test_field_access_on_direct_instance_fails() {
        let loader = MethodTable::new();
        let config = AnalyzingConfig::default();
        let mut ctx = AnalyzingContext::new(&loader, &config).unwrap();
        let number = int(&mut ctx, 3);

        assert!(matches!(
            ctx.get_field(number, "x"),
            Err(Error::NotDataInstance(r)) if r == number
        ));
        assert!(matches!(
            ctx.set_field(number, "x", number),
            Err(Error::NotDataInstance(_))
        ));
    }

    #[test]
    fn test_null_instance_is_never_dirty() {
        let loader = MethodTable::new();
        let config = AnalyzingConfig::default();
        let mut ctx = AnalyzingContext::new(&loader, &config).unwrap();

        let null = ctx.null_instance();
        ctx.set_dirty(null).unwrap();

        assert_eq!(ctx.null_instance(), null);
        assert!(!ctx.heap().is_dirty(null).unwrap());
        assert!(ctx.set_direct_value(null, NativeValue::Int(1)).is_err());
    }

    #[test]
    fn test_undeclared_variable_is_fatal() {
        let loader = MethodTable::new().with_method(
            MethodId::new("Test.Entry"),
            Generator::new(|e| {
                e.return_value("missing");
                Ok(())
            }),
        );
        let config = AnalyzingConfig::strict();
        let mut ctx = AnalyzingContext::new(&loader, &config).unwrap();

        ctx.call(MethodId::new("Test.Entry"), Vec::new()).unwrap();
        assert!(matches!(
            ctx.run_to_end(),
            Err(Error::UndeclaredVariable(name)) if name.name() == "missing"
        ));
    }

    #[test]
    fn test_operations_need_active_call() {
        let loader = MethodTable::new();
        let config = AnalyzingConfig::default();
        let mut ctx = AnalyzingContext::new(&loader, &config).unwrap();

        assert!(matches!(ctx.current_arguments(), Err(Error::NoActiveCall)));
        assert!(matches!(ctx.return_value(None), Err(Error::NoActiveCall)));
        assert!(!ctx.step().unwrap());
    }
}
