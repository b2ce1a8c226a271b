//! Per-call frame state.

use crate::error::VmResult;
use crate::evaluation_stack::EvaluationStack;
use crate::instruction::Instruction;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;

/// A frame on the invocation stack: a script, a cursor into it, and the
/// frame's evaluation and alt stacks.
pub struct ExecutionContext {
    script: Script,
    instruction_pointer: usize,
    evaluation_stack: EvaluationStack,
    alt_stack: EvaluationStack,
    /// Number of values this frame returns on RET; -1 means all of them.
    rvcount: i32,
}

impl ExecutionContext {
    /// Creates a frame at the start of `script`.
    pub fn new(script: Script, rvcount: i32, reference_counter: &ReferenceCounter) -> Self {
        Self {
            script,
            instruction_pointer: 0,
            evaluation_stack: EvaluationStack::new(reference_counter.clone()),
            alt_stack: EvaluationStack::new(reference_counter.clone()),
            rvcount,
        }
    }

    /// Creates a frame sharing this frame's script, positioned at
    /// `position`, with fresh empty stacks. Used by CALL and CALLA.
    pub fn clone_at(&self, position: usize) -> Self {
        let mut context = Self::new(
            self.script.clone(),
            -1,
            self.evaluation_stack.reference_counter(),
        );
        context.instruction_pointer = position;
        context
    }

    /// The script this frame executes.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The current instruction pointer.
    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Moves the instruction pointer.
    pub fn set_instruction_pointer(&mut self, position: usize) {
        self.instruction_pointer = position;
    }

    /// The number of return values, -1 for unconstrained.
    pub fn rvcount(&self) -> i32 {
        self.rvcount
    }

    /// Decodes the instruction at the current pointer.
    pub fn current_instruction(&self) -> VmResult<Instruction> {
        self.script.instruction_at(self.instruction_pointer)
    }

    /// The frame's evaluation stack.
    pub fn evaluation_stack(&self) -> &EvaluationStack {
        &self.evaluation_stack
    }

    /// The frame's evaluation stack (mutable).
    pub fn evaluation_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.evaluation_stack
    }

    /// The frame's alt stack.
    pub fn alt_stack(&self) -> &EvaluationStack {
        &self.alt_stack
    }

    /// The frame's alt stack (mutable).
    pub fn alt_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.alt_stack
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("instruction_pointer", &self.instruction_pointer)
            .field("rvcount", &self.rvcount)
            .field("evaluation_stack", &self.evaluation_stack.len())
            .field("alt_stack", &self.alt_stack.len())
            .finish()
    }
}
