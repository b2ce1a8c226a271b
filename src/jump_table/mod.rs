//! Opcode dispatch for the Vela VM.
//!
//! The jump table maps each opcode byte to a handler function. The default
//! table wires every family; embedders building a custom machine can start
//! from `JumpTable::new()` and register their own handlers.

pub mod bitwise;
pub mod compound;
pub mod constants;
pub mod control;
pub mod numeric;
pub mod splice;
pub mod stack_ops;

use crate::error::VmResult;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;

/// An instruction handler.
pub type InstructionHandler = fn(&mut ExecutionEngine, &Instruction) -> VmResult<()>;

/// Dispatch table from opcode bytes to handlers.
pub struct JumpTable {
    handlers: [Option<InstructionHandler>; 256],
}

impl JumpTable {
    /// Creates an empty table with no handlers registered.
    pub fn new() -> Self {
        Self {
            handlers: [None; 256],
        }
    }

    /// Registers a handler for an opcode, replacing any previous one.
    pub fn register(&mut self, opcode: OpCode, handler: InstructionHandler) {
        self.handlers[opcode as usize] = Some(handler);
    }

    /// Returns the handler for an opcode, if registered.
    pub fn handler(&self, opcode: OpCode) -> Option<InstructionHandler> {
        self.handlers[opcode as usize]
    }
}

impl Default for JumpTable {
    fn default() -> Self {
        let mut table = Self::new();
        constants::register_handlers(&mut table);
        control::register_handlers(&mut table);
        stack_ops::register_handlers(&mut table);
        splice::register_handlers(&mut table);
        bitwise::register_handlers(&mut table);
        numeric::register_handlers(&mut table);
        compound::register_handlers(&mut table);
        table
    }
}

impl std::fmt::Debug for JumpTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered = self.handlers.iter().filter(|slot| slot.is_some()).count();
        f.debug_struct("JumpTable")
            .field("registered", &registered)
            .finish()
    }
}
