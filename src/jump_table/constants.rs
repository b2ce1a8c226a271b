//! Literal push operations.

use std::convert::TryFrom;

use crate::error::VmResult;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

/// Registers the literal push handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::PUSH0, push0);
    for byte in OpCode::PUSHBYTES1 as u8..=OpCode::PUSHBYTES75 as u8 {
        if let Ok(opcode) = OpCode::try_from(byte) {
            jump_table.register(opcode, push_data);
        }
    }
    jump_table.register(OpCode::PUSHDATA1, push_data);
    jump_table.register(OpCode::PUSHDATA2, push_data);
    jump_table.register(OpCode::PUSHDATA4, push_data);
    jump_table.register(OpCode::PUSHM1, push_int);
    for byte in OpCode::PUSH1 as u8..=OpCode::PUSH16 as u8 {
        if let Ok(opcode) = OpCode::try_from(byte) {
            jump_table.register(opcode, push_int);
        }
    }
    jump_table.register(OpCode::PUSHNULL, push_null);
}

/// Implements the PUSH0 operation: pushes the empty byte string.
fn push0(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    engine.push(StackItem::from_byte_string(Vec::new()))
}

/// Implements PUSHBYTES1..75 and PUSHDATA1/2/4: pushes the instruction's
/// immediate bytes.
fn push_data(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    engine.check_item_size(instruction.operand().len())?;
    engine.push(StackItem::from_byte_string(instruction.operand().to_vec()))
}

/// Implements PUSHM1 and PUSH1..16: pushes the small integer encoded in
/// the opcode.
fn push_int(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let value: i64 = if instruction.opcode() == OpCode::PUSHM1 {
        -1
    } else {
        (instruction.opcode() as u8 - OpCode::PUSH1 as u8) as i64 + 1
    };
    engine.push(StackItem::from_int(value))
}

/// Implements the PUSHNULL operation.
fn push_null(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    engine.push(StackItem::Null)
}
