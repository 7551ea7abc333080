//! Builder for IAL programs.
//!
//! Method-body producers (decompilers, compilers, hand-written simulations) drive an
//! [`Emitter`] to append instructions. The emitter stamps every instruction with the
//! current [`InstructionInfo`], manages labels and temporaries, and tracks type
//! hints of variables for downstream type checking.
//!
//! # Example
//!
//! ```rust
//! use dotsim::analyzing::{Emitter, MethodId, NativeValue};
//!
//! let mut e = Emitter::new();
//! e.start_new_info_block();
//! e.assign_argument("n", 0);
//! e.assign_literal("one", NativeValue::Int(1));
//! e.static_call(MethodId::new("Math.Add"), &["n", "one"]);
//! let tmp = e.get_temporary_variable("sum");
//! e.assign_return_value(tmp.clone());
//! e.return_value(tmp);
//!
//! let batch = e.get_emitted_instructions().unwrap();
//! assert_eq!(batch.len(), 6);
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{
    analyzing::{
        naming::TEMPORARY_PREFIX,
        program::{
            CallSite, CallTransformProvider, DirectMethod, EmittedInstruction, Instruction,
            InstructionBatch, InstructionInfo, Label,
        },
        MethodId, NativeValue, TypeDescriptor, VariableName,
    },
    Error, Result,
};

/// Stateful, single-use builder of one [`InstructionBatch`].
pub struct Emitter {
    owner: Arc<()>,
    instructions: Vec<EmittedInstruction>,
    inserted: Option<InstructionBatch>,
    current_info: InstructionInfo,
    temporaries: usize,
    variable_types: FxHashMap<VariableName, TypeDescriptor>,
}

impl Emitter {
    /// Creates an empty emitter.
    #[must_use]
    pub fn new() -> Self {
        Emitter {
            owner: Arc::new(()),
            instructions: Vec::new(),
            inserted: None,
            current_info: InstructionInfo::new(),
            temporaries: 0,
            variable_types: FxHashMap::default(),
        }
    }

    /// Number of instructions emitted so far, including an inserted batch.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.inserted.as_ref().map_or(0, InstructionBatch::len) + self.instructions.len()
    }

    /// The info stamped on instructions emitted next.
    #[must_use]
    pub fn current_info(&self) -> &InstructionInfo {
        &self.current_info
    }

    /// Starts a new block; all following instructions belong to it.
    ///
    /// Producers call this once per source statement.
    pub fn start_new_info_block(&mut self) -> InstructionInfo {
        self.current_info = InstructionInfo::new();
        self.current_info.clone()
    }

    /// Starts a block with a caller-built info, e.g. one carrying a comment and a
    /// removal hook.
    pub fn start_info_block(&mut self, info: InstructionInfo) {
        self.current_info = info;
    }

    /// Generates a fresh temporary variable name.
    ///
    /// Temporaries are not recorded in the execution trace.
    ///
    /// # Arguments
    ///
    /// * `hint` - Readable suffix of the name
    pub fn get_temporary_variable(&mut self, hint: &str) -> VariableName {
        let name = VariableName::new(format!("{TEMPORARY_PREFIX}{}_{hint}", self.temporaries));
        self.temporaries += 1;
        name
    }

    /// Records a type hint for a variable.
    pub fn set_variable_type(&mut self, variable: impl Into<VariableName>, ty: TypeDescriptor) {
        self.variable_types.insert(variable.into(), ty);
    }

    /// Type hint of a variable, if known.
    #[must_use]
    pub fn variable_type(&self, variable: &VariableName) -> Option<&TypeDescriptor> {
        self.variable_types.get(variable)
    }

    /// All variables with a type hint.
    pub fn variables(&self) -> impl Iterator<Item = &VariableName> {
        self.variable_types.keys()
    }

    /// Creates an unbound label owned by this emitter.
    pub fn create_label(&mut self, name: &str) -> Label {
        Label::new(name, &self.owner)
    }

    /// Binds `label` to the offset of the next emitted instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignLabel`] if the label was created by another emitter
    /// and [`Error::LabelAlreadyBound`] if it was set before.
    pub fn set_label(&mut self, label: &Label) -> Result<()> {
        self.check_owner(label)?;
        label.bind(self.instruction_count())
    }

    /// `target = value`
    pub fn assign_literal(&mut self, target: impl Into<VariableName>, value: impl Into<NativeValue>) {
        let target = target.into();
        let value = value.into();
        self.variable_types
            .insert(target.clone(), value.default_type());
        self.emit(Instruction::AssignLiteral { target, value });
    }

    /// `target = source`; the type hint of `source` is propagated.
    pub fn assign(&mut self, target: impl Into<VariableName>, source: impl Into<VariableName>) {
        let target = target.into();
        let source = source.into();
        if let Some(ty) = self.variable_types.get(&source).cloned() {
            self.variable_types.insert(target.clone(), ty);
        }
        self.emit(Instruction::Assign { target, source });
    }

    /// `target = <return value of the last call>`
    pub fn assign_return_value(&mut self, target: impl Into<VariableName>) {
        self.emit(Instruction::AssignReturnValue {
            target: target.into(),
        });
    }

    /// `target = <argument at index>`
    pub fn assign_argument(&mut self, target: impl Into<VariableName>, index: usize) {
        self.emit(Instruction::AssignArgument {
            target: target.into(),
            index,
        });
    }

    /// `target = new ty`, without running a constructor.
    pub fn assign_new_object(&mut self, target: impl Into<VariableName>, ty: TypeDescriptor) {
        let target = target.into();
        self.variable_types.insert(target.clone(), ty.clone());
        self.emit(Instruction::AssignNewObject { target, ty });
    }

    /// `target = <shared instance of ty>`, the run wide singleton of a type.
    pub fn assign_shared(&mut self, target: impl Into<VariableName>, ty: TypeDescriptor) {
        let target = target.into();
        self.variable_types.insert(target.clone(), ty.clone());
        self.emit(Instruction::AssignShared { target, ty });
    }

    /// Calls a static method.
    pub fn static_call<V: Clone + Into<VariableName>>(&mut self, method: MethodId, arguments: &[V]) {
        self.static_call_with(method, arguments, None);
    }

    /// Calls a static method with editing hooks.
    pub fn static_call_with<V: Clone + Into<VariableName>>(
        &mut self,
        method: MethodId,
        arguments: &[V],
        transform: Option<Arc<dyn CallTransformProvider>>,
    ) {
        let site = Self::call_site(method, arguments, transform);
        self.emit(Instruction::StaticCall(site));
    }

    /// Calls an instance method; the first argument is the receiver.
    pub fn instance_call<V: Clone + Into<VariableName>>(
        &mut self,
        method: MethodId,
        arguments: &[V],
    ) {
        self.instance_call_with(method, arguments, None);
    }

    /// Calls an instance method with editing hooks.
    pub fn instance_call_with<V: Clone + Into<VariableName>>(
        &mut self,
        method: MethodId,
        arguments: &[V],
        transform: Option<Arc<dyn CallTransformProvider>>,
    ) {
        let site = Self::call_site(method, arguments, transform);
        self.emit(Instruction::InstanceCall(site));
    }

    /// Invokes a native method in the executing frame.
    pub fn direct_invoke(&mut self, method: DirectMethod) {
        self.emit(Instruction::DirectInvoke(method));
    }

    /// `return value`
    pub fn return_value(&mut self, value: impl Into<VariableName>) {
        self.emit(Instruction::Return {
            value: Some(value.into()),
        });
    }

    /// `return`
    pub fn return_void(&mut self) {
        self.emit(Instruction::Return { value: None });
    }

    /// `if condition goto label`
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignLabel`] if the label was created by another emitter.
    pub fn conditional_jump(
        &mut self,
        condition: impl Into<VariableName>,
        label: &Label,
    ) -> Result<()> {
        self.check_owner(label)?;
        self.emit(Instruction::ConditionalJump {
            condition: condition.into(),
            target: label.clone(),
        });
        Ok(())
    }

    /// `goto label`
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignLabel`] if the label was created by another emitter.
    pub fn jump(&mut self, label: &Label) -> Result<()> {
        self.check_owner(label)?;
        self.emit(Instruction::Jump(label.clone()));
        Ok(())
    }

    /// No operation.
    pub fn nop(&mut self) {
        self.emit(Instruction::Nop);
    }

    /// Replays a finished batch into this emitter.
    ///
    /// # Errors
    ///
    /// Returns a usage error if the emitter already holds instructions.
    pub fn insert(&mut self, batch: InstructionBatch) -> Result<()> {
        if self.instruction_count() > 0 {
            return Err(usage_error!(
                "Batch can only be inserted into an empty emitter, {} instructions present",
                self.instruction_count()
            ));
        }
        self.inserted = Some(batch);
        Ok(())
    }

    /// Finishes the program.
    ///
    /// An inserted batch is returned as is, sharing its instructions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundLabel`] if a jump targets a label that was never set,
    /// and a usage error if instructions were emitted after inserting a batch.
    pub fn get_emitted_instructions(self) -> Result<InstructionBatch> {
        match self.inserted {
            Some(batch) if self.instructions.is_empty() => Ok(batch),
            Some(_) => Err(usage_error!(
                "{} instructions were emitted after inserting a finished batch",
                self.instructions.len()
            )),
            None => {
                for emitted in &self.instructions {
                    if let Some(label) = emitted.instruction.label() {
                        if !label.is_bound() {
                            return Err(Error::UnboundLabel(label.name().to_string()));
                        }
                    }
                }
                Ok(InstructionBatch::new(self.instructions))
            }
        }
    }

    fn call_site<V: Clone + Into<VariableName>>(
        method: MethodId,
        arguments: &[V],
        transform: Option<Arc<dyn CallTransformProvider>>,
    ) -> Arc<CallSite> {
        Arc::new(CallSite {
            method,
            arguments: arguments.iter().cloned().map(Into::into).collect(),
            transform,
        })
    }

    fn check_owner(&self, label: &Label) -> Result<()> {
        if label.is_owned_by(&self.owner) {
            Ok(())
        } else {
            Err(Error::ForeignLabel(label.name().to_string()))
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(EmittedInstruction {
            instruction,
            info: self.current_info.clone(),
        });
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}
