//! Byte string operations.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

/// Registers the byte string handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::CAT, cat);
    jump_table.register(OpCode::SUBSTR, substr);
    jump_table.register(OpCode::LEFT, left);
    jump_table.register(OpCode::RIGHT, right);
    jump_table.register(OpCode::SIZE, size);
}

/// Implements the CAT operation.
fn cat(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let second = engine.pop_bytes()?;
    let first = engine.pop_bytes()?;

    engine.check_item_size(first.len() + second.len())?;

    let mut joined = first;
    joined.extend_from_slice(&second);
    engine.push(StackItem::from_byte_string(joined))
}

/// Implements the SUBSTR operation. The count is clamped to the available
/// tail and the item size cap; the start index must lie within the value.
fn substr(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let count = engine.pop_index()?;
    let index = engine.pop_index()?;
    let bytes = engine.pop_bytes()?;

    if index > bytes.len() {
        return Err(VmError::invalid_operand(format!(
            "SUBSTR index {index} out of range for length {}",
            bytes.len()
        )));
    }

    let count = count
        .min(engine.limits().max_item_size)
        .min(bytes.len() - index);
    engine.push(StackItem::from_byte_string(
        bytes[index..index + count].to_vec(),
    ))
}

/// Implements the LEFT operation: a prefix of the value, clamped to its
/// length.
fn left(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let count = engine.pop_index()?;
    let bytes = engine.pop_bytes()?;

    let count = count.min(bytes.len());
    engine.push(StackItem::from_byte_string(bytes[..count].to_vec()))
}

/// Implements the RIGHT operation: a suffix of the value. The count must
/// not exceed the value length.
fn right(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let count = engine.pop_index()?;
    let bytes = engine.pop_bytes()?;

    if count > bytes.len() {
        return Err(VmError::invalid_operand(format!(
            "RIGHT count {count} out of range for length {}",
            bytes.len()
        )));
    }
    engine.push(StackItem::from_byte_string(
        bytes[bytes.len() - count..].to_vec(),
    ))
}

/// Implements the SIZE operation: the byte length of a primitive.
fn size(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let bytes = engine.pop_bytes()?;
    engine.push(StackItem::from_int(bytes.len() as u64))
}
