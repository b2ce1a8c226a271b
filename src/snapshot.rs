//! Snapshot surface for debuggers and conformance tooling.
//!
//! Values serialize as `{type, value}` pairs; frames expose the
//! instruction pointer, the next instruction's mnemonic, and both stacks.
//! Stacks are rendered top first. Compound values expand their elements;
//! a compound revisited on the same path (a cycle) renders with a null
//! value.

use std::collections::HashSet;

use serde::Serialize;

use crate::execution_context::ExecutionContext;
use crate::execution_engine::ExecutionEngine;
use crate::evaluation_stack::EvaluationStack;
use crate::reference_counter::ReferenceCounter;
use crate::stack_item::StackItem;
use crate::vm_state::VMState;

/// A serialized stack item.
#[derive(Debug, Clone, Serialize)]
pub struct ValueSnapshot {
    /// One of `integer`, `boolean`, `bytestring`, `buffer`, `pointer`,
    /// `array`, `struct`, `map`, `interop`, `null`.
    #[serde(rename = "type")]
    pub item_type: &'static str,
    pub value: SnapshotValue,
}

/// The payload of a serialized stack item.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SnapshotValue {
    /// Null, interop handles, and truncated cycles.
    None(()),
    Bool(bool),
    /// Decimal rendering of an integer.
    Text(String),
    /// A pointer's offset.
    Offset(u64),
    Items(Vec<ValueSnapshot>),
    Entries(Vec<MapEntrySnapshot>),
}

/// A serialized map entry.
#[derive(Debug, Clone, Serialize)]
pub struct MapEntrySnapshot {
    pub key: ValueSnapshot,
    pub value: ValueSnapshot,
}

/// A serialized frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    #[serde(rename = "instructionPointer")]
    pub instruction_pointer: usize,
    #[serde(rename = "nextInstruction")]
    pub next_instruction: Option<String>,
    #[serde(rename = "evaluationStack")]
    pub evaluation_stack: Vec<ValueSnapshot>,
    #[serde(rename = "altStack")]
    pub alt_stack: Vec<ValueSnapshot>,
}

/// A serialized engine: every frame, bottom first, plus the result stack.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub state: &'static str,
    pub frames: Vec<FrameSnapshot>,
    #[serde(rename = "resultStack")]
    pub result_stack: Vec<ValueSnapshot>,
}

/// Serializes a single item.
pub fn snapshot_item(counter: &ReferenceCounter, item: &StackItem) -> ValueSnapshot {
    let mut path = HashSet::new();
    snapshot_with_path(counter, item, &mut path)
}

fn snapshot_with_path(
    counter: &ReferenceCounter,
    item: &StackItem,
    path: &mut HashSet<usize>,
) -> ValueSnapshot {
    match item {
        StackItem::Null => ValueSnapshot {
            item_type: "null",
            value: SnapshotValue::None(()),
        },
        StackItem::Boolean(value) => ValueSnapshot {
            item_type: "boolean",
            value: SnapshotValue::Bool(*value),
        },
        StackItem::Integer(value) => ValueSnapshot {
            item_type: "integer",
            value: SnapshotValue::Text(value.to_string()),
        },
        StackItem::ByteString(bytes) => ValueSnapshot {
            item_type: "bytestring",
            value: SnapshotValue::Text(hex::encode(bytes)),
        },
        StackItem::Buffer(bytes) => ValueSnapshot {
            item_type: "buffer",
            value: SnapshotValue::Text(hex::encode(bytes)),
        },
        StackItem::Pointer(pointer) => ValueSnapshot {
            item_type: "pointer",
            value: SnapshotValue::Offset(pointer.position() as u64),
        },
        StackItem::InteropInterface(_) => ValueSnapshot {
            item_type: "interop",
            value: SnapshotValue::None(()),
        },
        StackItem::Array(id) | StackItem::Struct(id) => {
            let item_type = if matches!(item, StackItem::Array(_)) {
                "array"
            } else {
                "struct"
            };
            if !path.insert(id.index()) {
                return ValueSnapshot {
                    item_type,
                    value: SnapshotValue::None(()),
                };
            }
            let value = match counter.list_items(*id) {
                Ok(items) => SnapshotValue::Items(
                    items
                        .iter()
                        .map(|element| snapshot_with_path(counter, element, path))
                        .collect(),
                ),
                Err(_) => SnapshotValue::None(()),
            };
            path.remove(&id.index());
            ValueSnapshot { item_type, value }
        }
        StackItem::Map(id) => {
            if !path.insert(id.index()) {
                return ValueSnapshot {
                    item_type: "map",
                    value: SnapshotValue::None(()),
                };
            }
            let value = match (counter.map_keys(*id), counter.map_values(*id)) {
                (Ok(keys), Ok(values)) => SnapshotValue::Entries(
                    keys.iter()
                        .zip(values.iter())
                        .map(|(key, value)| MapEntrySnapshot {
                            key: snapshot_with_path(counter, key, path),
                            value: snapshot_with_path(counter, value, path),
                        })
                        .collect(),
                ),
                _ => SnapshotValue::None(()),
            };
            path.remove(&id.index());
            ValueSnapshot { item_type: "map", value }
        }
    }
}

/// Serializes a stack, top first.
pub fn snapshot_stack(stack: &EvaluationStack) -> Vec<ValueSnapshot> {
    let counter = stack.reference_counter().clone();
    stack
        .iter()
        .rev()
        .map(|item| snapshot_item(&counter, item))
        .collect()
}

/// Serializes a frame.
pub fn snapshot_frame(context: &ExecutionContext) -> FrameSnapshot {
    let next_instruction = context
        .current_instruction()
        .ok()
        .map(|instruction| instruction.opcode().mnemonic());

    FrameSnapshot {
        instruction_pointer: context.instruction_pointer(),
        next_instruction,
        evaluation_stack: snapshot_stack(context.evaluation_stack()),
        alt_stack: snapshot_stack(context.alt_stack()),
    }
}

/// Serializes an engine.
pub fn snapshot_engine(engine: &ExecutionEngine) -> EngineSnapshot {
    EngineSnapshot {
        state: state_name(engine.state()),
        frames: engine
            .invocation_stack()
            .iter()
            .map(snapshot_frame)
            .collect(),
        result_stack: snapshot_stack(engine.result_stack()),
    }
}

fn state_name(state: VMState) -> &'static str {
    if state.is_fault() {
        "FAULT"
    } else if state.is_halt() {
        "HALT"
    } else if state.is_break() {
        "BREAK"
    } else {
        "NONE"
    }
}
