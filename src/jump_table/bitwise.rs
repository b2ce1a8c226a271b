//! Bitwise and equality operations.

use crate::error::VmResult;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

/// Registers the bitwise handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::INVERT, invert);
    jump_table.register(OpCode::AND, and);
    jump_table.register(OpCode::OR, or);
    jump_table.register(OpCode::XOR, xor);
    jump_table.register(OpCode::EQUAL, equal);
}

/// Implements the INVERT operation: bitwise complement in two's
/// complement, -(x + 1).
fn invert(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop_int()?;
    let result = -(value + 1i32);
    engine.check_big_integer(&result)?;
    engine.push(StackItem::Integer(result))
}

/// Implements the AND operation.
fn and(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let second = engine.pop_int()?;
    let first = engine.pop_int()?;
    let result = first & second;
    engine.check_big_integer(&result)?;
    engine.push(StackItem::Integer(result))
}

/// Implements the OR operation.
fn or(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let second = engine.pop_int()?;
    let first = engine.pop_int()?;
    let result = first | second;
    engine.check_big_integer(&result)?;
    engine.push(StackItem::Integer(result))
}

/// Implements the XOR operation.
fn xor(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let second = engine.pop_int()?;
    let first = engine.pop_int()?;
    let result = first ^ second;
    engine.check_big_integer(&result)?;
    engine.push(StackItem::Integer(result))
}

/// Implements the EQUAL operation over arbitrary items: primitives by
/// canonical span, compounds by identity, Null only to Null.
fn equal(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let second = engine.pop()?;
    let first = engine.pop()?;
    engine.push(StackItem::from_bool(first.equals(&second)))
}
