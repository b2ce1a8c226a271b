//! The execution engine of the Vela VM.
//!
//! An engine owns an invocation stack of frames, a result stack, the
//! reference counter, and the jump table used to dispatch instructions.
//! `execute` drives steps until the state becomes terminal; every error a
//! step produces transitions the machine to FAULT.

use num_bigint::BigInt;

use crate::error::{VmError, VmResult};
use crate::evaluation_stack::EvaluationStack;
use crate::execution_context::ExecutionContext;
use crate::instruction::Instruction;
use crate::interop::{ExecutionHooks, SyscallRegistry};
use crate::jump_table::JumpTable;
use crate::limits::ExecutionEngineLimits;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::stack_item::{integer_byte_len, StackItem};
use crate::vm_state::VMState;

/// The virtual machine.
pub struct ExecutionEngine {
    state: VMState,

    /// Set by handlers that position the instruction pointer themselves
    /// (jumps, returns); suppresses the default advance after dispatch.
    is_jumping: bool,

    jump_table: JumpTable,
    limits: ExecutionEngineLimits,
    reference_counter: ReferenceCounter,
    invocation_stack: Vec<ExecutionContext>,
    result_stack: EvaluationStack,
    syscalls: SyscallRegistry,
    hooks: Option<Box<dyn ExecutionHooks>>,
}

impl ExecutionEngine {
    /// Creates an engine with the default jump table and limits.
    pub fn new() -> Self {
        Self::with_limits(ExecutionEngineLimits::default())
    }

    /// Creates an engine with the default jump table and custom limits.
    pub fn with_limits(limits: ExecutionEngineLimits) -> Self {
        let reference_counter = ReferenceCounter::new();
        Self {
            state: VMState::BREAK,
            is_jumping: false,
            jump_table: JumpTable::default(),
            limits,
            reference_counter: reference_counter.clone(),
            invocation_stack: Vec::new(),
            result_stack: EvaluationStack::new(reference_counter),
            syscalls: SyscallRegistry::new(),
            hooks: None,
        }
    }

    /// The current state of the VM.
    pub fn state(&self) -> VMState {
        self.state
    }

    /// Sets the state of the VM.
    pub fn set_state(&mut self, state: VMState) {
        self.state = state;
    }

    /// The limits this engine enforces.
    pub fn limits(&self) -> &ExecutionEngineLimits {
        &self.limits
    }

    /// The shared reference counter.
    pub fn reference_counter(&self) -> &ReferenceCounter {
        &self.reference_counter
    }

    /// The aggregate stack item count.
    pub fn stack_item_count(&self) -> usize {
        self.reference_counter.count()
    }

    /// The invocation stack, bottom to top.
    pub fn invocation_stack(&self) -> &[ExecutionContext] {
        &self.invocation_stack
    }

    /// The current frame, if any.
    pub fn current_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.last()
    }

    /// The current frame (mutable), if any.
    pub fn current_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.invocation_stack.last_mut()
    }

    /// The frame at the bottom of the invocation stack, if any.
    pub fn entry_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.first()
    }

    /// The result stack.
    pub fn result_stack(&self) -> &EvaluationStack {
        &self.result_stack
    }

    /// The result stack (mutable).
    pub fn result_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.result_stack
    }

    /// The syscall registry.
    pub fn syscalls_mut(&mut self) -> &mut SyscallRegistry {
        &mut self.syscalls
    }

    /// Installs the embedder's hooks, replacing any previous ones.
    pub fn set_hooks(&mut self, hooks: Box<dyn ExecutionHooks>) {
        self.hooks = Some(hooks);
    }

    /// Replaces the jump table.
    pub fn set_jump_table(&mut self, jump_table: JumpTable) {
        self.jump_table = jump_table;
    }

    /// Appends a new frame executing `script` from its start. `rvcount`
    /// constrains how many values the frame returns; -1 means all.
    pub fn load_script(&mut self, script: Script, rvcount: i32) -> VmResult<&ExecutionContext> {
        let context = ExecutionContext::new(script, rvcount, &self.reference_counter);
        self.load_context(context)?;
        self.current_context()
            .ok_or_else(|| VmError::invalid_operation("no context after load"))
    }

    /// Pushes a frame onto the invocation stack.
    pub fn load_context(&mut self, context: ExecutionContext) -> VmResult<()> {
        if self.invocation_stack.len() >= self.limits.max_invocation_stack_size {
            return Err(VmError::InvocationStackOverflow {
                depth: self.invocation_stack.len(),
                limit: self.limits.max_invocation_stack_size,
            });
        }
        self.invocation_stack.push(context);

        if let Some(mut hooks) = self.hooks.take() {
            hooks.on_context_loaded(self);
            self.hooks = Some(hooks);
        }
        Ok(())
    }

    /// Drives execution until the state is HALT or FAULT.
    pub fn execute(&mut self) -> VMState {
        if self.state == VMState::BREAK {
            self.set_state(VMState::NONE);
        }

        while !self.state.is_terminal() {
            if let Err(error) = self.execute_next() {
                self.on_fault(error);
            }
        }

        self.state
    }

    /// Executes a single instruction, then pauses in BREAK unless the
    /// state became terminal.
    pub fn step(&mut self) -> VMState {
        if self.state.is_terminal() {
            return self.state;
        }
        if self.state == VMState::BREAK {
            self.set_state(VMState::NONE);
        }

        match self.execute_next() {
            Ok(()) => {
                if !self.state.is_terminal() {
                    self.set_state(VMState::BREAK);
                }
            }
            Err(error) => self.on_fault(error),
        }
        self.state
    }

    /// Executes the next instruction of the current frame.
    pub fn execute_next(&mut self) -> VmResult<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        if self.invocation_stack.is_empty() {
            self.set_state(VMState::HALT);
            return Ok(());
        }

        self.is_jumping = false;
        let frame_index = self.invocation_stack.len() - 1;
        let context = &self.invocation_stack[frame_index];
        let pointer = context.instruction_pointer();

        // Running off the end of a script is a normal return.
        if pointer >= context.script().len() {
            self.execute_ret()?;
            self.post_step(None)?;
            return Ok(());
        }

        let instruction = context.current_instruction()?;

        if let Some(mut hooks) = self.hooks.take() {
            let result = hooks.pre_execute_instruction(self, &instruction);
            self.hooks = Some(hooks);
            result?;
        }

        let handler = self
            .jump_table
            .handler(instruction.opcode())
            .ok_or_else(|| {
                VmError::invalid_operation(format!(
                    "no handler for opcode {:?}",
                    instruction.opcode()
                ))
            })?;
        handler(self, &instruction)?;

        self.post_step(Some(&instruction))?;

        if !self.is_jumping {
            if let Some(context) = self.invocation_stack.get_mut(frame_index) {
                if context.instruction_pointer() == pointer {
                    context.set_instruction_pointer(pointer + instruction.size());
                }
            }
        }
        self.is_jumping = false;
        Ok(())
    }

    /// Runs the reclamation sweep, enforces the stack item cap, and fires
    /// the post-instruction hook. Runs exactly once per step.
    fn post_step(&mut self, instruction: Option<&Instruction>) -> VmResult<()> {
        let count = self.reference_counter.check_zero_referred();
        if count > self.limits.max_stack_size {
            return Err(VmError::StackOverflow {
                count,
                limit: self.limits.max_stack_size,
            });
        }

        if let Some(instruction) = instruction {
            if let Some(mut hooks) = self.hooks.take() {
                let result = hooks.post_execute_instruction(self, instruction);
                self.hooks = Some(hooks);
                result?;
            }
        }
        Ok(())
    }

    fn on_fault(&mut self, error: VmError) {
        log::debug!("engine fault: {error}");
        self.set_state(VMState::FAULT);
    }

    /// Moves the current frame's instruction pointer to an absolute
    /// target. Targets may equal the script length, which falls through to
    /// the implicit return on the next fetch.
    pub fn execute_jump(&mut self, target: i64) -> VmResult<()> {
        let script_len = self
            .current_context()
            .map(|context| context.script().len())
            .ok_or_else(|| VmError::invalid_operation("jump with no current context"))?;

        if target < 0 || target as usize > script_len {
            return Err(VmError::InvalidJump { target });
        }

        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("jump with no current context"))?;
        context.set_instruction_pointer(target as usize);
        self.is_jumping = true;
        Ok(())
    }

    /// Clones the current frame at an absolute target and pushes it onto
    /// the invocation stack. The caller's pointer advances normally, so
    /// the eventual return lands past the call instruction.
    pub fn execute_call(&mut self, target: i64) -> VmResult<()> {
        let context = self
            .current_context()
            .ok_or_else(|| VmError::invalid_operation("call with no current context"))?;

        if target < 0 || target as usize > context.script().len() {
            return Err(VmError::InvalidJump { target });
        }

        let new_context = context.clone_at(target as usize);
        self.load_context(new_context)
    }

    /// Pops the current frame and delivers its return values: to the
    /// caller's evaluation stack, or to the result stack when the popped
    /// frame was the last one. A frame declaring a fixed return count must
    /// produce exactly that many values. Unconstrained frames also hand
    /// their alt stack to the caller.
    pub fn execute_ret(&mut self) -> VmResult<()> {
        let mut frame = self
            .invocation_stack
            .pop()
            .ok_or_else(|| VmError::invalid_operation("return with empty invocation stack"))?;

        let rvcount = frame.rvcount();
        let produced = frame.evaluation_stack().len();
        if rvcount >= 0 && rvcount as usize != produced {
            return Err(VmError::invalid_operation(format!(
                "frame produced {produced} return values, declared {rvcount}"
            )));
        }

        if let Some(caller) = self.invocation_stack.last_mut() {
            frame
                .evaluation_stack_mut()
                .move_to(caller.evaluation_stack_mut());
            if rvcount < 0 {
                frame.alt_stack_mut().move_to(caller.alt_stack_mut());
            }
        } else {
            frame.evaluation_stack_mut().move_to(&mut self.result_stack);
        }

        if let Some(mut hooks) = self.hooks.take() {
            hooks.on_context_unloaded(self, &frame);
            self.hooks = Some(hooks);
        }

        if self.invocation_stack.is_empty() {
            self.set_state(VMState::HALT);
        }
        self.is_jumping = true;
        Ok(())
    }

    /// Dispatches a syscall id to the registry, falling back to the
    /// embedder hooks. Unknown ids and handler errors fault the engine.
    pub fn perform_syscall(&mut self, id: u32) -> VmResult<()> {
        let mut registry = std::mem::take(&mut self.syscalls);
        let result = if registry.contains(id) {
            registry.invoke(self, id)
        } else if let Some(mut hooks) = self.hooks.take() {
            let result = hooks.on_syscall(self, id);
            self.hooks = Some(hooks);
            result
        } else {
            Err(VmError::UnknownSyscall { id })
        };
        self.syscalls = registry;
        result
    }

    /// Pushes an item onto the current frame's evaluation stack.
    pub fn push(&mut self, item: StackItem) -> VmResult<()> {
        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("push with no current context"))?;
        context.evaluation_stack_mut().push(item);
        Ok(())
    }

    /// Pops the top item of the current frame's evaluation stack.
    pub fn pop(&mut self) -> VmResult<StackItem> {
        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("pop with no current context"))?;
        context.evaluation_stack_mut().pop()
    }

    /// Peeks into the current frame's evaluation stack.
    pub fn peek(&self, index: usize) -> VmResult<&StackItem> {
        let context = self
            .current_context()
            .ok_or_else(|| VmError::invalid_operation("peek with no current context"))?;
        context.evaluation_stack().peek(index)
    }

    /// Pops an arithmetic integer, enforcing the encoded-size bound.
    pub fn pop_int(&mut self) -> VmResult<BigInt> {
        let value = self.pop()?.as_int()?;
        self.check_big_integer(&value)?;
        Ok(value)
    }

    /// Pops a non-negative index.
    pub fn pop_index(&mut self) -> VmResult<usize> {
        self.pop()?.as_index()
    }

    /// Pops an item and interprets it as a boolean.
    pub fn pop_bool(&mut self) -> VmResult<bool> {
        Ok(self.pop()?.to_boolean())
    }

    /// Pops a primitive item's canonical byte span.
    pub fn pop_bytes(&mut self) -> VmResult<Vec<u8>> {
        self.pop()?.as_bytes()
    }

    /// Fails when an integer exceeds the arithmetic size bound.
    pub fn check_big_integer(&self, value: &BigInt) -> VmResult<()> {
        let bytes = integer_byte_len(value);
        if bytes > self.limits.max_big_integer_size {
            return Err(VmError::BigIntegerTooLarge {
                bytes,
                limit: self.limits.max_big_integer_size,
            });
        }
        Ok(())
    }

    /// Fails when a byte payload exceeds the item size cap.
    pub fn check_item_size(&self, size: usize) -> VmResult<()> {
        if size > self.limits.max_item_size {
            return Err(VmError::ItemTooLarge {
                size,
                limit: self.limits.max_item_size,
            });
        }
        Ok(())
    }

    /// Fails when a collection would exceed the entry cap.
    pub fn check_array_size(&self, size: usize) -> VmResult<()> {
        if size > self.limits.max_array_size {
            return Err(VmError::CollectionTooLarge {
                size,
                limit: self.limits.max_array_size,
            });
        }
        Ok(())
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}
