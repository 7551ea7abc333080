//! Instance model of the interpreter.
//!
//! Values flowing through the interpreter are [`Instance`]s: identity-bearing
//! objects that either wrap a [`NativeValue`] (*direct* instances) or hold a bag of
//! named fields (*data* instances). Every instance carries a monotonic dirty flag,
//! the block it was created in and a list of edits.
//!
//! # Key Components
//!
//! - [`Instance`] / [`InstanceKind`] - The value itself
//! - [`NativeValue`] - Payload of direct instances
//! - [`InstanceHeap`] / [`InstanceRef`] - Arena and handles

mod heap;
mod instance;
mod native;

pub use heap::{InstanceHeap, InstanceRef};
pub use instance::{Edit, Instance, InstanceKind};
pub use native::NativeValue;
