//! Compound (Array, Struct, Map) operations.
//!
//! Compound items carry only an arena id; every read and mutation goes
//! through the engine's reference counter, which keeps the stack item
//! accounting and parent edges correct. Structs are deep-cloned whenever
//! they are stored into another compound.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::reference_counter::CompoundKind;
use crate::stack_item::StackItem;

/// Registers the compound handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::ARRAYSIZE, array_size);
    jump_table.register(OpCode::PACK, pack);
    jump_table.register(OpCode::UNPACK, unpack);
    jump_table.register(OpCode::PICKITEM, pick_item);
    jump_table.register(OpCode::SETITEM, set_item);
    jump_table.register(OpCode::NEWARRAY, new_array);
    jump_table.register(OpCode::NEWSTRUCT, new_struct);
    jump_table.register(OpCode::NEWMAP, new_map);
    jump_table.register(OpCode::APPEND, append);
    jump_table.register(OpCode::REVERSE, reverse);
    jump_table.register(OpCode::REMOVE, remove);
    jump_table.register(OpCode::HASKEY, has_key);
    jump_table.register(OpCode::KEYS, keys);
    jump_table.register(OpCode::VALUES, values);
}

/// Implements the ARRAYSIZE operation: entry count for compounds, byte
/// length for primitives.
fn array_size(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let size = match item.compound_id() {
        Some(id) => engine.reference_counter().len(id)?,
        None => item.as_bytes()?.len(),
    };
    engine.push(StackItem::from_int(size as u64))
}

/// Implements the PACK operation: pops `n` items, top first, into a new
/// Array.
fn pack(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let count = engine.pop_index()?;
    engine.check_array_size(count)?;

    let available = engine
        .current_context()
        .map(|context| context.evaluation_stack().len())
        .unwrap_or(0);
    if count > available {
        return Err(VmError::stack_underflow(count, available));
    }

    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(engine.pop()?);
    }

    let id = engine
        .reference_counter()
        .clone()
        .new_list(CompoundKind::Array, items);
    engine.push(StackItem::Array(id))
}

/// Implements the UNPACK operation: pushes the elements so the first ends
/// on top, then the element count.
fn unpack(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let id = match &item {
        StackItem::Array(id) | StackItem::Struct(id) => *id,
        other => return Err(VmError::invalid_type("Array or Struct", other.type_name())),
    };

    let items = engine.reference_counter().list_items(id)?;
    let count = items.len();
    for element in items.into_iter().rev() {
        engine.push(element)?;
    }
    engine.push(StackItem::from_int(count as u64))
}

/// Implements the PICKITEM operation: element by index for Array/Struct,
/// value by key for Map, single byte as Integer for primitives.
fn pick_item(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let key = engine.pop()?;
    let item = engine.pop()?;

    let picked = match &item {
        StackItem::Array(id) | StackItem::Struct(id) => {
            let index = key.as_index()?;
            engine.reference_counter().list_get(*id, index)?
        }
        StackItem::Map(id) => engine
            .reference_counter()
            .map_get(*id, &key)?
            .ok_or_else(|| VmError::invalid_operand("PICKITEM key not found"))?,
        primitive => {
            let bytes = primitive.as_bytes()?;
            let index = key.as_index()?;
            let byte = bytes.get(index).copied().ok_or_else(|| {
                VmError::invalid_operand(format!(
                    "index {index} out of range for length {}",
                    bytes.len()
                ))
            })?;
            StackItem::from_int(byte)
        }
    };
    engine.push(picked)
}

/// Implements the SETITEM operation. Struct values are deep-cloned before
/// they are stored.
fn set_item(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop()?;
    let key = engine.pop()?;
    let item = engine.pop()?;

    let counter = engine.reference_counter().clone();
    let value = counter.deep_clone_if_struct(value)?;

    match &item {
        StackItem::Array(id) | StackItem::Struct(id) => {
            let index = key.as_index()?;
            counter.list_set(*id, index, value)
        }
        StackItem::Map(id) => {
            if !counter.map_contains(*id, &key)? {
                engine.check_array_size(counter.len(*id)? + 1)?;
            }
            counter.map_set(*id, key, value)
        }
        other => Err(VmError::invalid_type(
            "Array, Struct, or Map",
            other.type_name(),
        )),
    }
}

/// Implements the NEWARRAY operation.
fn new_array(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    new_list_like(engine, CompoundKind::Array)
}

/// Implements the NEWSTRUCT operation.
fn new_struct(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    new_list_like(engine, CompoundKind::Struct)
}

/// From an Array or Struct: converts between the two kinds, sharing
/// element references (same kind is the identity). From an integer `n`:
/// allocates `n` Null elements.
fn new_list_like(engine: &mut ExecutionEngine, kind: CompoundKind) -> VmResult<()> {
    let item = engine.pop()?;
    let counter = engine.reference_counter().clone();

    let result = match &item {
        StackItem::Array(id) => {
            if kind == CompoundKind::Array {
                item.clone()
            } else {
                StackItem::Struct(counter.new_list(kind, counter.list_items(*id)?))
            }
        }
        StackItem::Struct(id) => {
            if kind == CompoundKind::Struct {
                item.clone()
            } else {
                StackItem::Array(counter.new_list(kind, counter.list_items(*id)?))
            }
        }
        StackItem::Map(_) => {
            return Err(VmError::invalid_type("Array, Struct, or Integer", "Map"));
        }
        primitive => {
            let count = primitive.as_index()?;
            engine.check_array_size(count)?;
            let id = counter.new_list(kind, vec![StackItem::Null; count]);
            match kind {
                CompoundKind::Array => StackItem::Array(id),
                CompoundKind::Struct => StackItem::Struct(id),
                CompoundKind::Map => unreachable!("list kinds only"),
            }
        }
    };
    engine.push(result)
}

/// Implements the NEWMAP operation.
fn new_map(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let id = engine.reference_counter().new_map();
    engine.push(StackItem::Map(id))
}

/// Implements the APPEND operation. Struct values are deep-cloned on
/// entry.
fn append(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop()?;
    let target = engine.pop()?;

    let id = match &target {
        StackItem::Array(id) | StackItem::Struct(id) => *id,
        other => return Err(VmError::invalid_type("Array or Struct", other.type_name())),
    };

    let counter = engine.reference_counter().clone();
    engine.check_array_size(counter.len(id)? + 1)?;
    let value = counter.deep_clone_if_struct(value)?;
    counter.list_push(id, value)
}

/// Implements the REVERSE operation.
fn reverse(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    match &item {
        StackItem::Array(id) | StackItem::Struct(id) => {
            engine.reference_counter().list_reverse(*id)
        }
        other => Err(VmError::invalid_type("Array or Struct", other.type_name())),
    }
}

/// Implements the REMOVE operation: by index for Array/Struct, by key for
/// Map (absent keys are ignored).
fn remove(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let key = engine.pop()?;
    let item = engine.pop()?;

    match &item {
        StackItem::Array(id) | StackItem::Struct(id) => {
            let index = key.as_index()?;
            engine.reference_counter().list_remove(*id, index)
        }
        StackItem::Map(id) => engine.reference_counter().map_remove(*id, &key),
        other => Err(VmError::invalid_type(
            "Array, Struct, or Map",
            other.type_name(),
        )),
    }
}

/// Implements the HASKEY operation.
fn has_key(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let key = engine.pop()?;
    let item = engine.pop()?;

    let present = match &item {
        StackItem::Array(id) | StackItem::Struct(id) => {
            let index = key.as_index()?;
            index < engine.reference_counter().len(*id)?
        }
        StackItem::Map(id) => engine.reference_counter().map_contains(*id, &key)?,
        other => {
            return Err(VmError::invalid_type(
                "Array, Struct, or Map",
                other.type_name(),
            ));
        }
    };
    engine.push(StackItem::from_bool(present))
}

/// Implements the KEYS operation: a new Array of the map's keys in
/// iteration order.
fn keys(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let id = match &item {
        StackItem::Map(id) => *id,
        other => return Err(VmError::invalid_type("Map", other.type_name())),
    };

    let counter = engine.reference_counter().clone();
    let keys = counter.map_keys(id)?;
    let result = counter.new_list(CompoundKind::Array, keys);
    engine.push(StackItem::Array(result))
}

/// Implements the VALUES operation: a new Array of the collection's
/// values; Struct elements are deep-cloned.
fn values(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let counter = engine.reference_counter().clone();

    let elements = match &item {
        StackItem::Array(id) | StackItem::Struct(id) => counter.list_items(*id)?,
        StackItem::Map(id) => counter.map_values(*id)?,
        other => {
            return Err(VmError::invalid_type(
                "Array, Struct, or Map",
                other.type_name(),
            ));
        }
    };

    let mut cloned = Vec::with_capacity(elements.len());
    for element in elements {
        cloned.push(counter.deep_clone_if_struct(element)?);
    }
    let result = counter.new_list(CompoundKind::Array, cloned);
    engine.push(StackItem::Array(result))
}
