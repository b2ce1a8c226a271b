//! Script container for the Vela VM.
//!
//! A `Script` is an immutable, cheaply clonable byte sequence. Clones share
//! the same backing storage, and two scripts compare equal only when they
//! share it; Pointer items and CALLA rely on that identity.

use std::sync::Arc;

use crate::error::VmResult;
use crate::instruction::Instruction;

/// An immutable script executed by the VM.
#[derive(Debug, Clone)]
pub struct Script {
    bytes: Arc<[u8]>,
}

impl Script {
    /// Creates a script from raw bytes. No validation is performed; decode
    /// errors surface as faults when execution reaches the bad offset.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Returns the script length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true when the script contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns whether two scripts share the same backing storage.
    pub fn ptr_eq(&self, other: &Script) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// Decodes the instruction at the given offset.
    pub fn instruction_at(&self, position: usize) -> VmResult<Instruction> {
        Instruction::decode(&self.bytes, position)
    }

    /// Iterates over the instructions from the start of the script.
    pub fn instructions(&self) -> InstructionIterator<'_> {
        InstructionIterator {
            script: self,
            position: 0,
        }
    }
}

impl PartialEq for Script {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Script {}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Iterator yielding `(position, instruction)` pairs.
pub struct InstructionIterator<'a> {
    script: &'a Script,
    position: usize,
}

impl Iterator for InstructionIterator<'_> {
    type Item = VmResult<(usize, Instruction)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.script.len() {
            return None;
        }

        match self.script.instruction_at(self.position) {
            Ok(instruction) => {
                let position = self.position;
                self.position += instruction.size();
                Some(Ok((position, instruction)))
            }
            Err(error) => {
                self.position = self.script.len();
                Some(Err(error))
            }
        }
    }
}
