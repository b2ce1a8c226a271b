//! Arithmetic and comparison operations.
//!
//! Every operand and every result is bounded by the engine's big integer
//! size limit; violating the bound is a fault.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

/// Registers the numeric handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::INC, inc);
    jump_table.register(OpCode::DEC, dec);
    jump_table.register(OpCode::SIGN, sign);
    jump_table.register(OpCode::NEGATE, negate);
    jump_table.register(OpCode::ABS, abs);
    jump_table.register(OpCode::NOT, not);
    jump_table.register(OpCode::NZ, nz);
    jump_table.register(OpCode::ADD, add);
    jump_table.register(OpCode::SUB, sub);
    jump_table.register(OpCode::MUL, mul);
    jump_table.register(OpCode::DIV, div);
    jump_table.register(OpCode::MOD, modulo);
    jump_table.register(OpCode::SHL, shl);
    jump_table.register(OpCode::SHR, shr);
    jump_table.register(OpCode::BOOLAND, bool_and);
    jump_table.register(OpCode::BOOLOR, bool_or);
    jump_table.register(OpCode::NUMEQUAL, num_equal);
    jump_table.register(OpCode::NUMNOTEQUAL, num_not_equal);
    jump_table.register(OpCode::LT, lt);
    jump_table.register(OpCode::GT, gt);
    jump_table.register(OpCode::LTE, lte);
    jump_table.register(OpCode::GTE, gte);
    jump_table.register(OpCode::MIN, min);
    jump_table.register(OpCode::MAX, max);
    jump_table.register(OpCode::WITHIN, within);
}

fn push_checked(engine: &mut ExecutionEngine, result: BigInt) -> VmResult<()> {
    engine.check_big_integer(&result)?;
    engine.push(StackItem::Integer(result))
}

fn binary_op(
    engine: &mut ExecutionEngine,
    op: impl FnOnce(BigInt, BigInt) -> BigInt,
) -> VmResult<()> {
    let second = engine.pop_int()?;
    let first = engine.pop_int()?;
    push_checked(engine, op(first, second))
}

fn compare(
    engine: &mut ExecutionEngine,
    op: impl FnOnce(&BigInt, &BigInt) -> bool,
) -> VmResult<()> {
    let second = engine.pop_int()?;
    let first = engine.pop_int()?;
    engine.push(StackItem::from_bool(op(&first, &second)))
}

/// Implements the INC operation.
fn inc(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop_int()?;
    push_checked(engine, value + 1)
}

/// Implements the DEC operation.
fn dec(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop_int()?;
    push_checked(engine, value - 1)
}

/// Implements the SIGN operation.
fn sign(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop_int()?;
    let sign = match value.sign() {
        num_bigint::Sign::Minus => -1,
        num_bigint::Sign::NoSign => 0,
        num_bigint::Sign::Plus => 1,
    };
    engine.push(StackItem::from_int(sign))
}

/// Implements the NEGATE operation.
fn negate(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop_int()?;
    push_checked(engine, -value)
}

/// Implements the ABS operation.
fn abs(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop_int()?;
    push_checked(engine, value.abs())
}

/// Implements the NOT operation: logical negation.
fn not(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop_bool()?;
    engine.push(StackItem::from_bool(!value))
}

/// Implements the NZ operation: true when the value is nonzero.
fn nz(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop_int()?;
    engine.push(StackItem::from_bool(!value.is_zero()))
}

/// Implements the ADD operation.
fn add(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    binary_op(engine, |a, b| a + b)
}

/// Implements the SUB operation.
fn sub(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    binary_op(engine, |a, b| a - b)
}

/// Implements the MUL operation.
fn mul(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    binary_op(engine, |a, b| a * b)
}

/// Implements the DIV operation: truncated division.
fn div(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let second = engine.pop_int()?;
    let first = engine.pop_int()?;
    if second.is_zero() {
        return Err(VmError::division_by_zero("DIV"));
    }
    push_checked(engine, first / second)
}

/// Implements the MOD operation: remainder with the dividend's sign.
fn modulo(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let second = engine.pop_int()?;
    let first = engine.pop_int()?;
    if second.is_zero() {
        return Err(VmError::division_by_zero("MOD"));
    }
    push_checked(engine, first % second)
}

/// Implements the SHL operation. A zero count consumes only the count; a
/// negative count shifts right.
fn shl(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    shift(engine, false)
}

/// Implements the SHR operation. A zero count consumes only the count; a
/// negative count shifts left.
fn shr(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    shift(engine, true)
}

fn shift(engine: &mut ExecutionEngine, rightward: bool) -> VmResult<()> {
    let count = engine.pop_int()?;
    let count = count
        .to_i64()
        .ok_or_else(|| VmError::invalid_operand(format!("shift count out of range: {count}")))?;

    let limits = engine.limits();
    if count < limits.min_shift || count > limits.max_shift {
        return Err(VmError::invalid_operand(format!(
            "shift count out of range: {count}"
        )));
    }
    if count == 0 {
        return Ok(());
    }

    let value = engine.pop_int()?;
    let rightward = if count < 0 { !rightward } else { rightward };
    let magnitude = count.unsigned_abs() as usize;
    // BigInt shr floors toward negative infinity, matching two's-complement
    // arithmetic shift.
    let result = if rightward {
        value >> magnitude
    } else {
        value << magnitude
    };
    push_checked(engine, result)
}

/// Implements the BOOLAND operation.
fn bool_and(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let second = engine.pop_bool()?;
    let first = engine.pop_bool()?;
    engine.push(StackItem::from_bool(first && second))
}

/// Implements the BOOLOR operation.
fn bool_or(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let second = engine.pop_bool()?;
    let first = engine.pop_bool()?;
    engine.push(StackItem::from_bool(first || second))
}

/// Implements the NUMEQUAL operation.
fn num_equal(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a == b)
}

/// Implements the NUMNOTEQUAL operation.
fn num_not_equal(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a != b)
}

/// Implements the LT operation.
fn lt(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a < b)
}

/// Implements the GT operation.
fn gt(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a > b)
}

/// Implements the LTE operation.
fn lte(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a <= b)
}

/// Implements the GTE operation.
fn gte(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    compare(engine, |a, b| a >= b)
}

/// Implements the MIN operation.
fn min(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    binary_op(engine, std::cmp::min)
}

/// Implements the MAX operation.
fn max(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    binary_op(engine, std::cmp::max)
}

/// Implements the WITHIN operation: pushes `a <= x < b`.
fn within(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let upper = engine.pop_int()?;
    let lower = engine.pop_int()?;
    let value = engine.pop_int()?;
    engine.push(StackItem::from_bool(lower <= value && value < upper))
}
