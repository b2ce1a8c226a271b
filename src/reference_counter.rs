//! Reference counting and compound storage for the Vela VM.
//!
//! The counter is the arena for every compound value: Arrays, Structs, and
//! Maps carry only a [`CompoundId`], and all of their element storage lives
//! here. Because every read and mutation funnels through this type, the
//! accounting invariants cannot be bypassed:
//!
//! - `references` equals the number of item slots reachable from all
//!   stacks, with compound entries counted once per tracked compound and
//!   map entries counted double (key + value);
//! - each compound tracks its stack-reference count and the multiset of
//!   parent compounds holding it.
//!
//! Pure reference counting cannot reclaim cycles (an Array appended into
//! itself keeps its own parent edge forever), so compounds whose stack
//! reference count drops to zero are queued in `zero_referred` and a
//! cycle-safe sweep runs after every instruction: each queued compound's
//! parent cone is walked, and unless some ancestor still holds a stack
//! reference the whole cone is reclaimed.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{VmError, VmResult};
use crate::stack_item::{CompoundId, StackItem};

/// The variant of a compound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundKind {
    Array,
    Struct,
    Map,
}

/// A map key: a primitive item plus its canonical byte span. Hashing and
/// equality use only the span, so `Integer 1` and `ByteString [0x01]`
/// address the same entry.
#[derive(Debug, Clone)]
pub struct MapKey {
    item: StackItem,
    span: Vec<u8>,
}

impl MapKey {
    /// Builds a key from a primitive item; compound and Null keys fail.
    pub fn new(item: StackItem) -> VmResult<Self> {
        let span = item.as_bytes()?;
        Ok(Self { item, span })
    }

    /// The original key item.
    pub fn item(&self) -> &StackItem {
        &self.item
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        self.span == other.span
    }
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.span.hash(state);
    }
}

enum CompoundStorage {
    List(Vec<StackItem>),
    Map(IndexMap<MapKey, StackItem>),
}

struct CompoundEntry {
    kind: CompoundKind,
    storage: CompoundStorage,
    stack_references: usize,
    /// Parent compound id -> number of slots in that parent holding this
    /// compound.
    parent_edges: HashMap<usize, usize>,
}

impl CompoundEntry {
    /// Number of item slots this compound contributes to the aggregate
    /// count; map entries count double.
    fn entry_count(&self) -> usize {
        match &self.storage {
            CompoundStorage::List(items) => items.len(),
            CompoundStorage::Map(entries) => entries.len() * 2,
        }
    }

    fn len(&self) -> usize {
        match &self.storage {
            CompoundStorage::List(items) => items.len(),
            CompoundStorage::Map(entries) => entries.len(),
        }
    }

    fn children(&self) -> Vec<StackItem> {
        match &self.storage {
            CompoundStorage::List(items) => items.clone(),
            CompoundStorage::Map(entries) => entries.values().cloned().collect(),
        }
    }
}

struct Inner {
    slots: Vec<Option<CompoundEntry>>,
    free: Vec<usize>,
    /// Aggregate stack item count across all stacks and tracked compounds.
    references: usize,
    /// Compounds whose stack reference count just reached zero.
    zero_referred: HashSet<usize>,
}

/// Shared handle to the reference state. Cloning is cheap; the engine, the
/// result stack, and every frame's stacks share one counter.
#[derive(Clone)]
pub struct ReferenceCounter {
    inner: Arc<Mutex<Inner>>,
}

impl ReferenceCounter {
    /// Creates an empty counter.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                slots: Vec::new(),
                free: Vec::new(),
                references: 0,
                zero_referred: HashSet::new(),
            })),
        }
    }

    /// The aggregate stack item count.
    pub fn count(&self) -> usize {
        self.inner.lock().references
    }

    /// The number of live compounds in the arena.
    pub fn tracked_compounds(&self) -> usize {
        let inner = self.inner.lock();
        inner.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether a compound is still tracked.
    pub fn is_tracked(&self, id: CompoundId) -> bool {
        let inner = self.inner.lock();
        inner.slots.get(id.0).is_some_and(|slot| slot.is_some())
    }

    /// The stack reference count of a compound, zero if untracked.
    pub fn stack_references(&self, id: CompoundId) -> usize {
        let inner = self.inner.lock();
        inner
            .slots
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .map_or(0, |entry| entry.stack_references)
    }

    /// Records that an item was pushed onto a stack.
    pub fn add_stack_reference(&self, item: &StackItem) {
        let mut inner = self.inner.lock();
        inner.references += 1;
        if let Some(id) = item.compound_id() {
            if let Some(entry) = inner.slot_mut_opt(id.0) {
                entry.stack_references += 1;
            }
            inner.zero_referred.remove(&id.0);
        }
    }

    /// Records that an item left a stack.
    pub fn remove_stack_reference(&self, item: &StackItem) {
        let mut inner = self.inner.lock();
        inner.references = inner.references.saturating_sub(1);
        if let Some(id) = item.compound_id() {
            if let Some(entry) = inner.slot_mut_opt(id.0) {
                entry.stack_references = entry.stack_references.saturating_sub(1);
                if entry.stack_references == 0 {
                    inner.zero_referred.insert(id.0);
                }
            }
        }
    }

    /// Allocates a new Array or Struct holding `items`.
    pub fn new_list(&self, kind: CompoundKind, items: Vec<StackItem>) -> CompoundId {
        debug_assert!(matches!(kind, CompoundKind::Array | CompoundKind::Struct));
        let mut inner = self.inner.lock();
        let id = inner.alloc(kind, CompoundStorage::List(Vec::with_capacity(items.len())));
        for item in items {
            inner.attach_child(&item, id);
            match &mut inner.slot_mut(id).storage {
                CompoundStorage::List(list) => list.push(item),
                CompoundStorage::Map(_) => unreachable!("list compound"),
            }
        }
        CompoundId(id)
    }

    /// Allocates a new empty Map.
    pub fn new_map(&self) -> CompoundId {
        let mut inner = self.inner.lock();
        let id = inner.alloc(CompoundKind::Map, CompoundStorage::Map(IndexMap::new()));
        CompoundId(id)
    }

    /// The variant of a compound.
    pub fn kind(&self, id: CompoundId) -> VmResult<CompoundKind> {
        let inner = self.inner.lock();
        Ok(inner.slot_ref(id.0)?.kind)
    }

    /// The number of entries in a compound (map entries counted once).
    pub fn len(&self, id: CompoundId) -> VmResult<usize> {
        let inner = self.inner.lock();
        Ok(inner.slot_ref(id.0)?.len())
    }

    /// Returns the element at `index` of an Array or Struct.
    pub fn list_get(&self, id: CompoundId, index: usize) -> VmResult<StackItem> {
        let inner = self.inner.lock();
        let entry = inner.slot_ref(id.0)?;
        match &entry.storage {
            CompoundStorage::List(items) => items.get(index).cloned().ok_or_else(|| {
                VmError::invalid_operand(format!(
                    "index {index} out of range for length {}",
                    items.len()
                ))
            }),
            CompoundStorage::Map(_) => Err(VmError::invalid_type("Array or Struct", "Map")),
        }
    }

    /// Returns a snapshot of the elements of an Array or Struct.
    pub fn list_items(&self, id: CompoundId) -> VmResult<Vec<StackItem>> {
        let inner = self.inner.lock();
        let entry = inner.slot_ref(id.0)?;
        match &entry.storage {
            CompoundStorage::List(items) => Ok(items.clone()),
            CompoundStorage::Map(_) => Err(VmError::invalid_type("Array or Struct", "Map")),
        }
    }

    /// Replaces the element at `index` of an Array or Struct.
    pub fn list_set(&self, id: CompoundId, index: usize, item: StackItem) -> VmResult<()> {
        let mut inner = self.inner.lock();
        let len = inner.list_len(id.0)?;
        if index >= len {
            return Err(VmError::invalid_operand(format!(
                "index {index} out of range for length {len}"
            )));
        }

        let old = match &mut inner.slot_mut(id.0).storage {
            CompoundStorage::List(items) => std::mem::replace(&mut items[index], item.clone()),
            CompoundStorage::Map(_) => unreachable!("checked above"),
        };
        inner.detach_child(&old, id.0);
        inner.attach_child(&item, id.0);
        Ok(())
    }

    /// Appends an element to an Array or Struct.
    pub fn list_push(&self, id: CompoundId, item: StackItem) -> VmResult<()> {
        let mut inner = self.inner.lock();
        inner.list_len(id.0)?;
        inner.attach_child(&item, id.0);
        match &mut inner.slot_mut(id.0).storage {
            CompoundStorage::List(items) => items.push(item),
            CompoundStorage::Map(_) => unreachable!("checked above"),
        }
        Ok(())
    }

    /// Removes the element at `index` of an Array or Struct.
    pub fn list_remove(&self, id: CompoundId, index: usize) -> VmResult<()> {
        let mut inner = self.inner.lock();
        let len = inner.list_len(id.0)?;
        if index >= len {
            return Err(VmError::invalid_operand(format!(
                "index {index} out of range for length {len}"
            )));
        }
        let removed = match &mut inner.slot_mut(id.0).storage {
            CompoundStorage::List(items) => items.remove(index),
            CompoundStorage::Map(_) => unreachable!("checked above"),
        };
        inner.detach_child(&removed, id.0);
        Ok(())
    }

    /// Reverses an Array or Struct in place.
    pub fn list_reverse(&self, id: CompoundId) -> VmResult<()> {
        let mut inner = self.inner.lock();
        inner.list_len(id.0)?;
        match &mut inner.slot_mut(id.0).storage {
            CompoundStorage::List(items) => items.reverse(),
            CompoundStorage::Map(_) => unreachable!("checked above"),
        }
        Ok(())
    }

    /// Looks up a map value by key.
    pub fn map_get(&self, id: CompoundId, key: &StackItem) -> VmResult<Option<StackItem>> {
        let key = MapKey::new(key.clone())?;
        let inner = self.inner.lock();
        match &inner.slot_ref(id.0)?.storage {
            CompoundStorage::Map(entries) => Ok(entries.get(&key).cloned()),
            CompoundStorage::List(_) => Err(VmError::invalid_type("Map", "Array or Struct")),
        }
    }

    /// Whether a map contains a key.
    pub fn map_contains(&self, id: CompoundId, key: &StackItem) -> VmResult<bool> {
        let key = MapKey::new(key.clone())?;
        let inner = self.inner.lock();
        match &inner.slot_ref(id.0)?.storage {
            CompoundStorage::Map(entries) => Ok(entries.contains_key(&key)),
            CompoundStorage::List(_) => Err(VmError::invalid_type("Map", "Array or Struct")),
        }
    }

    /// Inserts or replaces a map entry.
    pub fn map_set(&self, id: CompoundId, key: StackItem, value: StackItem) -> VmResult<()> {
        let key = MapKey::new(key)?;
        let mut inner = self.inner.lock();
        inner.map_len(id.0)?;

        let replaced = match &mut inner.slot_mut(id.0).storage {
            CompoundStorage::Map(entries) => entries.insert(key.clone(), value.clone()),
            CompoundStorage::List(_) => unreachable!("checked above"),
        };
        match replaced {
            Some(old_value) => {
                inner.detach_child(&old_value, id.0);
            }
            None => {
                // A fresh entry contributes two slots: key and value.
                inner.attach_child(key.item(), id.0);
            }
        }
        inner.attach_child(&value, id.0);
        Ok(())
    }

    /// Removes a map entry; absent keys are ignored.
    pub fn map_remove(&self, id: CompoundId, key: &StackItem) -> VmResult<()> {
        let key = MapKey::new(key.clone())?;
        let mut inner = self.inner.lock();
        inner.map_len(id.0)?;

        let removed = match &mut inner.slot_mut(id.0).storage {
            CompoundStorage::Map(entries) => entries.shift_remove_entry(&key),
            CompoundStorage::List(_) => unreachable!("checked above"),
        };
        if let Some((old_key, old_value)) = removed {
            inner.detach_child(old_key.item(), id.0);
            inner.detach_child(&old_value, id.0);
        }
        Ok(())
    }

    /// The keys of a map in insertion order.
    pub fn map_keys(&self, id: CompoundId) -> VmResult<Vec<StackItem>> {
        let inner = self.inner.lock();
        match &inner.slot_ref(id.0)?.storage {
            CompoundStorage::Map(entries) => {
                Ok(entries.keys().map(|key| key.item().clone()).collect())
            }
            CompoundStorage::List(_) => Err(VmError::invalid_type("Map", "Array or Struct")),
        }
    }

    /// The values of a map in insertion order.
    pub fn map_values(&self, id: CompoundId) -> VmResult<Vec<StackItem>> {
        let inner = self.inner.lock();
        match &inner.slot_ref(id.0)?.storage {
            CompoundStorage::Map(entries) => Ok(entries.values().cloned().collect()),
            CompoundStorage::List(_) => Err(VmError::invalid_type("Map", "Array or Struct")),
        }
    }

    /// Breadth-first deep clone of a Struct: nested Structs are cloned,
    /// every other element is shared.
    pub fn deep_clone_struct(&self, id: CompoundId) -> VmResult<CompoundId> {
        let mut inner = self.inner.lock();
        let entry = inner.slot_ref(id.0)?;
        if entry.kind != CompoundKind::Struct {
            return Err(VmError::invalid_type(
                "Struct",
                match entry.kind {
                    CompoundKind::Array => "Array",
                    CompoundKind::Map => "Map",
                    CompoundKind::Struct => unreachable!(),
                },
            ));
        }

        let root = inner.alloc(CompoundKind::Struct, CompoundStorage::List(Vec::new()));
        let mut queue = std::collections::VecDeque::from([(id.0, root)]);
        while let Some((source, target)) = queue.pop_front() {
            let elements = match &inner.slot_ref(source)?.storage {
                CompoundStorage::List(items) => items.clone(),
                CompoundStorage::Map(_) => unreachable!("structs are lists"),
            };
            for element in elements {
                let cloned = match &element {
                    StackItem::Struct(child) => {
                        let child_clone =
                            inner.alloc(CompoundKind::Struct, CompoundStorage::List(Vec::new()));
                        queue.push_back((child.0, child_clone));
                        StackItem::Struct(CompoundId(child_clone))
                    }
                    other => other.clone(),
                };
                inner.attach_child(&cloned, target);
                match &mut inner.slot_mut(target).storage {
                    CompoundStorage::List(items) => items.push(cloned),
                    CompoundStorage::Map(_) => unreachable!("structs are lists"),
                }
            }
        }
        Ok(CompoundId(root))
    }

    /// Clones `item` if it is a Struct, otherwise returns it unchanged.
    /// This is the assignment-boundary rule used by SETITEM and APPEND.
    pub fn deep_clone_if_struct(&self, item: StackItem) -> VmResult<StackItem> {
        match item {
            StackItem::Struct(id) => Ok(StackItem::Struct(self.deep_clone_struct(id)?)),
            other => Ok(other),
        }
    }

    /// Runs the cycle-safe sweep over the zero-referred frontier and
    /// returns the aggregate stack item count.
    pub fn check_zero_referred(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.sweep();
        inner.references
    }
}

impl Default for ReferenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ReferenceCounter")
            .field("references", &inner.references)
            .field("zero_referred", &inner.zero_referred.len())
            .finish()
    }
}

impl Inner {
    fn alloc(&mut self, kind: CompoundKind, storage: CompoundStorage) -> usize {
        let entry = CompoundEntry {
            kind,
            storage,
            stack_references: 0,
            parent_edges: HashMap::new(),
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(entry);
                id
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        // Unreferenced until something pushes or stores it.
        self.zero_referred.insert(id);
        id
    }

    fn slot_ref(&self, id: usize) -> VmResult<&CompoundEntry> {
        self.slots
            .get(id)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| VmError::invalid_operation(format!("compound {id} is not tracked")))
    }

    fn slot_mut_opt(&mut self, id: usize) -> Option<&mut CompoundEntry> {
        self.slots.get_mut(id).and_then(|slot| slot.as_mut())
    }

    /// Like `slot_mut_opt` but for ids already validated this call.
    fn slot_mut(&mut self, id: usize) -> &mut CompoundEntry {
        self.slots[id].as_mut().expect("validated compound id")
    }

    fn list_len(&self, id: usize) -> VmResult<usize> {
        match &self.slot_ref(id)?.storage {
            CompoundStorage::List(items) => Ok(items.len()),
            CompoundStorage::Map(_) => Err(VmError::invalid_type("Array or Struct", "Map")),
        }
    }

    fn map_len(&self, id: usize) -> VmResult<usize> {
        match &self.slot_ref(id)?.storage {
            CompoundStorage::Map(entries) => Ok(entries.len()),
            CompoundStorage::List(_) => Err(VmError::invalid_type("Map", "Array or Struct")),
        }
    }

    /// Accounts for an item stored into a compound slot.
    fn attach_child(&mut self, child: &StackItem, parent: usize) {
        self.references += 1;
        if let Some(id) = child.compound_id() {
            if let Some(entry) = self.slot_mut_opt(id.0) {
                *entry.parent_edges.entry(parent).or_insert(0) += 1;
            }
        }
    }

    /// Accounts for an item removed from a compound slot.
    fn detach_child(&mut self, child: &StackItem, parent: usize) {
        self.references = self.references.saturating_sub(1);
        if let Some(id) = child.compound_id() {
            if let Some(entry) = self.slot_mut_opt(id.0) {
                if let Some(multiplicity) = entry.parent_edges.get_mut(&parent) {
                    *multiplicity -= 1;
                    if *multiplicity == 0 {
                        entry.parent_edges.remove(&parent);
                    }
                }
                if entry.stack_references == 0 {
                    self.zero_referred.insert(id.0);
                }
            }
        }
    }

    /// Reclaims every compound in the zero-referred frontier that is not
    /// retained, directly or transitively, by a stack-referenced parent.
    fn sweep(&mut self) {
        if self.zero_referred.is_empty() {
            return;
        }

        let mut pending: Vec<usize> = self.zero_referred.drain().collect();
        let mut reclaimed = 0usize;

        while let Some(root) = pending.pop() {
            let Some(entry) = self.slots.get(root).and_then(|slot| slot.as_ref()) else {
                continue;
            };
            if entry.stack_references > 0 {
                continue;
            }

            // Walk the parent cone. If any ancestor is still on a stack the
            // whole cone stays; otherwise nothing can reach it.
            let mut visited: HashSet<usize> = HashSet::from([root]);
            let mut queue = vec![root];
            let mut live = false;
            'walk: while let Some(node) = queue.pop() {
                let Some(node_entry) = self.slots.get(node).and_then(|slot| slot.as_ref()) else {
                    continue;
                };
                for (&parent, &multiplicity) in &node_entry.parent_edges {
                    if multiplicity == 0 {
                        continue;
                    }
                    let Some(parent_entry) =
                        self.slots.get(parent).and_then(|slot| slot.as_ref())
                    else {
                        continue;
                    };
                    if parent_entry.stack_references > 0 {
                        live = true;
                        break 'walk;
                    }
                    if visited.insert(parent) {
                        queue.push(parent);
                    }
                }
            }
            if live {
                continue;
            }

            for &node in &visited {
                let Some(entry) = self.slots[node].take() else {
                    continue;
                };
                self.references = self.references.saturating_sub(entry.entry_count());
                self.free.push(node);
                reclaimed += 1;

                // Surviving children lose a parent edge; any that are no
                // longer stack-referenced join the frontier.
                for child in entry.children() {
                    let Some(child_id) = child.compound_id() else {
                        continue;
                    };
                    if visited.contains(&child_id.0) {
                        continue;
                    }
                    if let Some(child_entry) = self.slot_mut_opt(child_id.0) {
                        if let Some(multiplicity) = child_entry.parent_edges.get_mut(&node) {
                            *multiplicity -= 1;
                            if *multiplicity == 0 {
                                child_entry.parent_edges.remove(&node);
                            }
                        }
                        if child_entry.stack_references == 0 {
                            pending.push(child_id.0);
                        }
                    }
                }
            }
        }

        if reclaimed > 0 {
            log::debug!("sweep reclaimed {reclaimed} compounds, {} slots live", {
                self.slots.iter().filter(|slot| slot.is_some()).count()
            });
        }
    }
}
