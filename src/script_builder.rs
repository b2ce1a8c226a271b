//! Helper for emitting wire-format scripts.
//!
//! Mostly used by tests and embedders to assemble scripts without writing
//! raw bytes: integers are pushed in their minimal encoding, data pushes
//! pick the shortest of `PUSHBYTESn` and `PUSHDATA1/2/4`.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::script::Script;
use crate::stack_item::encode_integer;

/// An append-only script assembler.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current length of the script in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the script is still empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Appends a bare opcode.
    pub fn emit(&mut self, opcode: OpCode) -> &mut Self {
        self.bytes.push(opcode as u8);
        self
    }

    /// Appends an integer push in minimal form.
    pub fn emit_push_int<T: Into<BigInt>>(&mut self, value: T) -> &mut Self {
        let value = value.into();
        if value.is_zero() {
            return self.emit(OpCode::PUSH0);
        }
        if value == BigInt::from(-1) {
            return self.emit(OpCode::PUSHM1);
        }
        if value.is_positive() {
            if let Some(small) = value.to_u8() {
                if (1..=16).contains(&small) {
                    self.bytes.push(OpCode::PUSH1 as u8 + small - 1);
                    return self;
                }
            }
        }
        let encoded = encode_integer(&value);
        self.emit_push_data(&encoded)
    }

    /// Appends a boolean push.
    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        if value {
            self.emit(OpCode::PUSH1)
        } else {
            self.emit(OpCode::PUSH0)
        }
    }

    /// Appends a data push, choosing the shortest encoding.
    pub fn emit_push_data(&mut self, data: &[u8]) -> &mut Self {
        match data.len() {
            0 => {
                self.emit(OpCode::PUSH0);
            }
            len @ 1..=75 => {
                self.bytes.push(len as u8);
                self.bytes.extend_from_slice(data);
            }
            len @ 76..=0xFF => {
                self.emit(OpCode::PUSHDATA1);
                self.bytes.push(len as u8);
                self.bytes.extend_from_slice(data);
            }
            len @ 0x100..=0xFFFF => {
                self.emit(OpCode::PUSHDATA2);
                self.bytes.extend_from_slice(&(len as u16).to_le_bytes());
                self.bytes.extend_from_slice(data);
            }
            len => {
                self.emit(OpCode::PUSHDATA4);
                self.bytes.extend_from_slice(&(len as u32).to_le_bytes());
                self.bytes.extend_from_slice(data);
            }
        }
        self
    }

    /// Appends a jump or call with a signed 16-bit offset. The offset is
    /// relative to the emitted instruction.
    pub fn emit_jump(&mut self, opcode: OpCode, offset: i16) -> VmResult<&mut Self> {
        if !matches!(
            opcode,
            OpCode::JMP | OpCode::JMPIF | OpCode::JMPIFNOT | OpCode::CALL
        ) {
            return Err(VmError::invalid_operand(format!(
                "{opcode:?} is not a jump opcode"
            )));
        }
        self.emit(opcode);
        self.bytes.extend_from_slice(&offset.to_le_bytes());
        Ok(self)
    }

    /// Appends a PUSHA with a signed 32-bit offset relative to the emitted
    /// instruction.
    pub fn emit_pusha(&mut self, offset: i32) -> &mut Self {
        self.emit(OpCode::PUSHA);
        self.bytes.extend_from_slice(&offset.to_le_bytes());
        self
    }

    /// Appends a SYSCALL with a 32-bit id.
    pub fn emit_syscall(&mut self, id: u32) -> &mut Self {
        self.emit(OpCode::SYSCALL);
        self.bytes.extend_from_slice(&id.to_le_bytes());
        self
    }

    /// Finishes the script.
    pub fn to_script(&self) -> Script {
        Script::new(self.bytes.clone())
    }

    /// Returns the raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}
