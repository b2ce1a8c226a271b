//! Host extension points.
//!
//! The embedder interacts with a running engine two ways: a registry of
//! syscall closures keyed by 32-bit id, and an [`ExecutionHooks`]
//! implementation observing instruction and context lifecycle events.
//! Syscall closures mutate the engine's stacks through the same API the
//! opcode handlers use; they must not re-enter `execute`.

use std::collections::HashMap;

use crate::error::{VmError, VmResult};
use crate::execution_context::ExecutionContext;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;

/// A host syscall implementation. Returning an error faults the engine.
pub type SyscallHandler = Box<dyn FnMut(&mut ExecutionEngine) -> VmResult<()>>;

/// Table from 32-bit syscall ids to host closures.
#[derive(Default)]
pub struct SyscallRegistry {
    handlers: HashMap<u32, SyscallHandler>,
}

impl SyscallRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `id`, replacing any previous one.
    pub fn register<F>(&mut self, id: u32, handler: F)
    where
        F: FnMut(&mut ExecutionEngine) -> VmResult<()> + 'static,
    {
        self.handlers.insert(id, Box::new(handler));
    }

    /// Whether a handler is registered for `id`.
    pub fn contains(&self, id: u32) -> bool {
        self.handlers.contains_key(&id)
    }

    /// Invokes the handler for `id`.
    pub fn invoke(&mut self, engine: &mut ExecutionEngine, id: u32) -> VmResult<()> {
        match self.handlers.get_mut(&id) {
            Some(handler) => handler(engine),
            None => Err(VmError::UnknownSyscall { id }),
        }
    }
}

impl std::fmt::Debug for SyscallRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyscallRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Callbacks the embedder may override to observe or steer execution.
/// Every method runs synchronously on the engine's thread; an error from
/// the instruction hooks faults the engine.
pub trait ExecutionHooks {
    /// Called before an instruction is dispatched.
    fn pre_execute_instruction(
        &mut self,
        engine: &mut ExecutionEngine,
        instruction: &Instruction,
    ) -> VmResult<()> {
        let _ = (engine, instruction);
        Ok(())
    }

    /// Called after an instruction was dispatched and the reclamation
    /// sweep ran.
    fn post_execute_instruction(
        &mut self,
        engine: &mut ExecutionEngine,
        instruction: &Instruction,
    ) -> VmResult<()> {
        let _ = (engine, instruction);
        Ok(())
    }

    /// Called after a frame was pushed onto the invocation stack; the new
    /// frame is `engine.current_context()`.
    fn on_context_loaded(&mut self, engine: &mut ExecutionEngine) {
        let _ = engine;
    }

    /// Called after a frame was popped from the invocation stack.
    fn on_context_unloaded(&mut self, engine: &mut ExecutionEngine, context: &ExecutionContext) {
        let _ = (engine, context);
    }

    /// Fallback for syscall ids without a registry entry.
    fn on_syscall(&mut self, engine: &mut ExecutionEngine, id: u32) -> VmResult<()> {
        let _ = engine;
        Err(VmError::UnknownSyscall { id })
    }
}
