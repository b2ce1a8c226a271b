//! Control flow operations.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

/// Registers the control flow handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::NOP, nop);
    jump_table.register(OpCode::JMP, jmp);
    jump_table.register(OpCode::JMPIF, jmpif);
    jump_table.register(OpCode::JMPIFNOT, jmpifnot);
    jump_table.register(OpCode::CALL, call);
    jump_table.register(OpCode::RET, ret);
    jump_table.register(OpCode::PUSHA, pusha);
    jump_table.register(OpCode::CALLA, calla);
    jump_table.register(OpCode::SYSCALL, syscall);
    jump_table.register(OpCode::THROW, throw);
    jump_table.register(OpCode::THROWIFNOT, throw_if_not);
}

/// Implements the NOP operation.
fn nop(_engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    Ok(())
}

fn jump_target(instruction: &Instruction) -> VmResult<i64> {
    Ok(instruction.position() as i64 + instruction.operand_i16()? as i64)
}

/// Implements the JMP operation.
fn jmp(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    engine.execute_jump(jump_target(instruction)?)
}

/// Implements the JMPIF operation.
fn jmpif(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    conditional_jump(engine, instruction, true)
}

/// Implements the JMPIFNOT operation.
fn jmpifnot(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    conditional_jump(engine, instruction, false)
}

/// Pops a condition and either jumps to the encoded target or steps past
/// the instruction. Both paths position the pointer explicitly, so the
/// dispatcher's default advance must not apply.
fn conditional_jump(
    engine: &mut ExecutionEngine,
    instruction: &Instruction,
    jump_when: bool,
) -> VmResult<()> {
    let condition = engine.pop_bool()?;
    if condition == jump_when {
        engine.execute_jump(jump_target(instruction)?)
    } else {
        engine.execute_jump((instruction.position() + instruction.size()) as i64)
    }
}

/// Implements the CALL operation.
fn call(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    engine.execute_call(jump_target(instruction)?)
}

/// Implements the RET operation.
fn ret(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    engine.execute_ret()
}

/// Implements the PUSHA operation: pushes a Pointer to an offset in the
/// current script.
fn pusha(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = instruction.position() as i64 + instruction.operand_i32()? as i64;

    let context = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("PUSHA with no current context"))?;
    if target < 0 || target as usize > context.script().len() {
        return Err(VmError::InvalidJump { target });
    }

    let script = context.script().clone();
    engine.push(StackItem::from_pointer(script, target as usize))
}

/// Implements the CALLA operation: calls through a Pointer into the
/// current script.
fn calla(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let pointer = match &item {
        StackItem::Pointer(pointer) => pointer,
        other => return Err(VmError::invalid_type("Pointer", other.type_name())),
    };

    let context = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("CALLA with no current context"))?;
    if !pointer.script().ptr_eq(context.script()) {
        return Err(VmError::invalid_operation(
            "CALLA pointer targets another script",
        ));
    }

    engine.execute_call(pointer.position() as i64)
}

/// Implements the SYSCALL operation.
fn syscall(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let id = instruction.operand_u32()?;
    engine.perform_syscall(id)
}

/// Implements the THROW operation.
fn throw(_engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    Err(VmError::throw("THROW"))
}

/// Implements the THROWIFNOT operation.
fn throw_if_not(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    if !engine.pop_bool()? {
        return Err(VmError::throw("THROWIFNOT"));
    }
    Ok(())
}
