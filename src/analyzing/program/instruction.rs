use std::{fmt, sync::Arc};

use strum::{EnumCount, IntoStaticStr};

use crate::{
    analyzing::{
        program::{CallTransformProvider, InstructionInfo, Label},
        AnalyzingContext, MethodId, NativeValue, TypeDescriptor, VariableName,
    },
    Result,
};

/// Signature of native methods invoked by [`Instruction::DirectInvoke`].
pub type NativeMethod = dyn Fn(&mut AnalyzingContext<'_>) -> Result<()> + Send + Sync;

/// A native Rust method simulating a framework method.
///
/// The method runs inside its own call frame: it reads its arguments with
/// [`AnalyzingContext::current_arguments`], creates result instances and finishes
/// with [`AnalyzingContext::return_value`].
///
/// # Example
///
/// ```rust
/// use dotsim::analyzing::{DirectMethod, NativeValue};
///
/// let answer = DirectMethod::new("Answer", |ctx| {
///     let value = ctx.create_direct(NativeValue::Int(42))?;
///     ctx.return_value(Some(value))
/// });
/// assert_eq!(answer.name(), "Answer");
/// ```
#[derive(Clone)]
pub struct DirectMethod {
    name: Arc<str>,
    method: Arc<NativeMethod>,
}

impl DirectMethod {
    /// Wraps a native method.
    pub fn new<F>(name: impl AsRef<str>, method: F) -> Self
    where
        F: Fn(&mut AnalyzingContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        DirectMethod {
            name: Arc::from(name.as_ref()),
            method: Arc::new(method),
        }
    }

    /// Name used in logs and traces.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the native method.
    ///
    /// # Errors
    ///
    /// Returns whatever the native method returns.
    pub fn invoke(&self, context: &mut AnalyzingContext<'_>) -> Result<()> {
        (self.method)(context)
    }
}

impl fmt::Debug for DirectMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirectMethod({})", self.name)
    }
}

/// Target and arguments of a call instruction.
#[derive(Clone, Debug)]
pub struct CallSite {
    /// Called method
    pub method: MethodId,
    /// Argument variables, the receiver first for instance calls
    pub arguments: Vec<VariableName>,
    /// Editing hooks of this call
    pub transform: Option<Arc<dyn CallTransformProvider>>,
}

/// A single IAL instruction.
///
/// IAL is stack free: every operand is a named variable of the executing call
/// frame. Call instructions only push the callee; its return value is picked up
/// by a following [`Instruction::AssignReturnValue`].
#[derive(Clone, Debug, IntoStaticStr, EnumCount)]
#[strum(serialize_all = "snake_case")]
pub enum Instruction {
    /// `target = <literal>`
    AssignLiteral {
        /// Assigned variable
        target: VariableName,
        /// Literal value
        value: NativeValue,
    },
    /// `target = source`
    Assign {
        /// Assigned variable
        target: VariableName,
        /// Variable read
        source: VariableName,
    },
    /// `target = <return value of the last call>`
    AssignReturnValue {
        /// Assigned variable
        target: VariableName,
    },
    /// `target = <argument at index>`
    AssignArgument {
        /// Assigned variable
        target: VariableName,
        /// Argument index
        index: usize,
    },
    /// `target = new <type>` (without constructor call)
    AssignNewObject {
        /// Assigned variable
        target: VariableName,
        /// Type of the new object
        ty: TypeDescriptor,
    },
    /// `target = <run wide shared instance of type>`
    AssignShared {
        /// Assigned variable
        target: VariableName,
        /// Type of the shared instance
        ty: TypeDescriptor,
    },
    /// Call of a static method
    StaticCall(Arc<CallSite>),
    /// Call of an instance method, receiver first
    InstanceCall(Arc<CallSite>),
    /// Invocation of a native method in the current frame
    DirectInvoke(DirectMethod),
    /// Jump to `target` if `condition` holds
    ConditionalJump {
        /// Variable holding the condition
        condition: VariableName,
        /// Jump target
        target: Label,
    },
    /// Unconditional jump
    Jump(Label),
    /// No operation
    Nop,
    /// Return from the current call
    Return {
        /// Returned variable, `None` for void returns
        value: Option<VariableName>,
    },
}

impl Instruction {
    /// Short name of the instruction kind, e.g. `static_call`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Jump target of jump instructions.
    #[must_use]
    pub fn label(&self) -> Option<&Label> {
        match self {
            Instruction::ConditionalJump { target, .. } | Instruction::Jump(target) => {
                Some(target)
            }
            _ => None,
        }
    }

    /// Call site of call instructions.
    #[must_use]
    pub fn call_site(&self) -> Option<&CallSite> {
        match self {
            Instruction::StaticCall(site) | Instruction::InstanceCall(site) => Some(site),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::AssignLiteral { target, value } => write!(f, "{target} = {value:?}"),
            Instruction::Assign { target, source } => write!(f, "{target} = {source}"),
            Instruction::AssignReturnValue { target } => write!(f, "{target} = <return>"),
            Instruction::AssignArgument { target, index } => write!(f, "{target} = arg{index}"),
            Instruction::AssignNewObject { target, ty } => write!(f, "{target} = new {ty}"),
            Instruction::AssignShared { target, ty } => write!(f, "{target} = shared {ty}"),
            Instruction::StaticCall(site) | Instruction::InstanceCall(site) => {
                write!(f, "call {}(", site.method)?;
                for (i, arg) in site.arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Instruction::DirectInvoke(method) => write!(f, "invoke {}", method.name()),
            Instruction::ConditionalJump { condition, target } => {
                write!(f, "if {condition} goto {target:?}")
            }
            Instruction::Jump(target) => write!(f, "goto {target:?}"),
            Instruction::Nop => f.write_str("nop"),
            Instruction::Return { value: Some(value) } => write!(f, "return {value}"),
            Instruction::Return { value: None } => f.write_str("return"),
        }
    }
}

/// An instruction together with the block it was emitted in.
#[derive(Clone, Debug)]
pub struct EmittedInstruction {
    /// The instruction
    pub instruction: Instruction,
    /// Its block
    pub info: InstructionInfo,
}
