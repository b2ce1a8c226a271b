//! Stack manipulation operations.

use crate::error::{VmError, VmResult};
use crate::execution_context::ExecutionContext;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

/// Registers the stack manipulation handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::DROP, drop);
    jump_table.register(OpCode::DUP, dup);
    jump_table.register(OpCode::NIP, nip);
    jump_table.register(OpCode::OVER, over);
    jump_table.register(OpCode::SWAP, swap);
    jump_table.register(OpCode::TUCK, tuck);
    jump_table.register(OpCode::ROT, rot);
    jump_table.register(OpCode::DEPTH, depth);
    jump_table.register(OpCode::XDROP, xdrop);
    jump_table.register(OpCode::XSWAP, xswap);
    jump_table.register(OpCode::XTUCK, xtuck);
    jump_table.register(OpCode::PICK, pick);
    jump_table.register(OpCode::ROLL, roll);
    jump_table.register(OpCode::TOALTSTACK, to_alt_stack);
    jump_table.register(OpCode::FROMALTSTACK, from_alt_stack);
    jump_table.register(OpCode::DUPFROMALTSTACK, dup_from_alt_stack);
    jump_table.register(OpCode::DUPFROMALTSTACKBOTTOM, dup_from_alt_stack_bottom);
    jump_table.register(OpCode::ISNULL, is_null);
}

fn frame(engine: &mut ExecutionEngine) -> VmResult<&mut ExecutionContext> {
    engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))
}

/// Implements the DROP operation.
fn drop(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    engine.pop()?;
    Ok(())
}

/// Implements the DUP operation.
fn dup(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.peek(0)?.clone();
    engine.push(item)
}

/// Implements the NIP operation: removes the item under the top.
fn nip(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    frame(engine)?.evaluation_stack_mut().remove(1)?;
    Ok(())
}

/// Implements the OVER operation: copies the second item to the top.
fn over(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.peek(1)?.clone();
    engine.push(item)
}

/// Implements the SWAP operation.
fn swap(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    frame(engine)?.evaluation_stack_mut().swap(0, 1)
}

/// Implements the TUCK operation: copies the top item below the second.
fn tuck(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let stack = frame(engine)?.evaluation_stack_mut();
    if stack.len() < 2 {
        return Err(VmError::stack_underflow(2, stack.len()));
    }
    let item = stack.peek(0)?.clone();
    stack.insert(2, item)
}

/// Implements the ROT operation: moves the third item to the top.
fn rot(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let stack = frame(engine)?.evaluation_stack_mut();
    let item = stack.remove(2)?;
    stack.push(item);
    Ok(())
}

/// Implements the DEPTH operation.
fn depth(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let depth = frame(engine)?.evaluation_stack().len();
    engine.push(StackItem::from_int(depth as u64))
}

/// Implements the XDROP operation: removes the item at a popped depth.
fn xdrop(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let index = engine.pop_index()?;
    frame(engine)?.evaluation_stack_mut().remove(index)?;
    Ok(())
}

/// Implements the XSWAP operation: swaps the top with the item at a
/// popped depth. Depth zero is a no-op.
fn xswap(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let index = engine.pop_index()?;
    if index == 0 {
        return Ok(());
    }
    frame(engine)?.evaluation_stack_mut().swap(0, index)
}

/// Implements the XTUCK operation: inserts a copy of the top item at a
/// popped depth, which must be positive.
fn xtuck(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let index = engine.pop_index()?;
    if index == 0 {
        return Err(VmError::invalid_operand("XTUCK depth must be positive"));
    }
    let stack = frame(engine)?.evaluation_stack_mut();
    let item = stack.peek(0)?.clone();
    stack.insert(index, item)
}

/// Implements the PICK operation: copies the item at a popped depth to
/// the top.
fn pick(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let index = engine.pop_index()?;
    let item = engine.peek(index)?.clone();
    engine.push(item)
}

/// Implements the ROLL operation: moves the item at a popped depth to the
/// top.
fn roll(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let index = engine.pop_index()?;
    if index == 0 {
        return Ok(());
    }
    let stack = frame(engine)?.evaluation_stack_mut();
    let item = stack.remove(index)?;
    stack.push(item);
    Ok(())
}

/// Implements the TOALTSTACK operation.
fn to_alt_stack(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let context = frame(engine)?;
    let item = context.evaluation_stack_mut().pop()?;
    context.alt_stack_mut().push(item);
    Ok(())
}

/// Implements the FROMALTSTACK operation.
fn from_alt_stack(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let context = frame(engine)?;
    let item = context.alt_stack_mut().pop()?;
    context.evaluation_stack_mut().push(item);
    Ok(())
}

/// Implements the DUPFROMALTSTACK operation.
fn dup_from_alt_stack(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let context = frame(engine)?;
    let item = context.alt_stack().peek(0)?.clone();
    context.evaluation_stack_mut().push(item);
    Ok(())
}

/// Implements the DUPFROMALTSTACKBOTTOM operation.
fn dup_from_alt_stack_bottom(
    engine: &mut ExecutionEngine,
    _instruction: &Instruction,
) -> VmResult<()> {
    let context = frame(engine)?;
    let item = context.alt_stack().peek_from_bottom(0)?.clone();
    context.evaluation_stack_mut().push(item);
    Ok(())
}

/// Implements the ISNULL operation.
fn is_null(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    engine.push(StackItem::from_bool(item.is_null()))
}
