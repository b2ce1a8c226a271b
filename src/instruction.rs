//! Instruction decoding for the Vela VM.
//!
//! An instruction is one opcode byte plus an optional immediate. The wire
//! layout per opcode is described by `OpCode::operand_encoding`; decoding is
//! bounds-checked and any malformed immediate is a parse error, which the
//! engine turns into a FAULT.

use std::convert::TryFrom;

use crate::error::{VmError, VmResult};
use crate::op_code::{OpCode, OperandEncoding};

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode byte within the script.
    position: usize,

    /// The opcode.
    opcode: OpCode,

    /// The operand payload. For data pushes this is the pushed bytes; for
    /// jumps, calls, and SYSCALL it is the raw immediate.
    operand: Vec<u8>,

    /// Total encoded size in bytes, including the opcode and any length
    /// prefix.
    size: usize,
}

impl Instruction {
    /// Decodes the instruction starting at `position` in `script`.
    pub fn decode(script: &[u8], position: usize) -> VmResult<Self> {
        let &opcode_byte = script
            .get(position)
            .ok_or_else(|| VmError::parse(format!("position {position} out of bounds")))?;

        let opcode =
            OpCode::try_from(opcode_byte).map_err(|_| VmError::invalid_opcode(opcode_byte))?;

        let operand_start = position + 1;
        match opcode.operand_encoding() {
            OperandEncoding::None => Ok(Self {
                position,
                opcode,
                operand: Vec::new(),
                size: 1,
            }),
            OperandEncoding::Inline(len) => {
                let operand = Self::read_payload(script, operand_start, len, opcode)?;
                Ok(Self {
                    position,
                    opcode,
                    operand,
                    size: 1 + len,
                })
            }
            OperandEncoding::Fixed(len) => {
                let operand = Self::read_payload(script, operand_start, len, opcode)?;
                Ok(Self {
                    position,
                    opcode,
                    operand,
                    size: 1 + len,
                })
            }
            OperandEncoding::Prefixed(prefix_len) => {
                let prefix = Self::read_payload(script, operand_start, prefix_len, opcode)?;
                let mut length_bytes = [0u8; 8];
                length_bytes[..prefix_len].copy_from_slice(&prefix);
                let length = u64::from_le_bytes(length_bytes) as usize;

                let operand =
                    Self::read_payload(script, operand_start + prefix_len, length, opcode)?;
                Ok(Self {
                    position,
                    opcode,
                    operand,
                    size: 1 + prefix_len + length,
                })
            }
        }
    }

    fn read_payload(
        script: &[u8],
        start: usize,
        len: usize,
        opcode: OpCode,
    ) -> VmResult<Vec<u8>> {
        let end = start.checked_add(len).ok_or_else(|| {
            VmError::parse(format!("{opcode:?} operand length overflows the script"))
        })?;
        if end > script.len() {
            return Err(VmError::parse(format!(
                "{opcode:?} operand exceeds script bounds: {} + {} > {}",
                start,
                len,
                script.len()
            )));
        }
        Ok(script[start..end].to_vec())
    }

    /// Offset of this instruction within its script.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The opcode.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// The operand payload bytes.
    pub fn operand(&self) -> &[u8] {
        &self.operand
    }

    /// Encoded size in bytes, including the opcode byte and length prefix.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reads the operand as a signed 16-bit LE offset.
    pub fn operand_i16(&self) -> VmResult<i16> {
        let bytes: [u8; 2] = self
            .operand
            .as_slice()
            .try_into()
            .map_err(|_| VmError::invalid_operand(format!("{:?} expects a 16-bit operand", self.opcode)))?;
        Ok(i16::from_le_bytes(bytes))
    }

    /// Reads the operand as a signed 32-bit LE offset.
    pub fn operand_i32(&self) -> VmResult<i32> {
        let bytes: [u8; 4] = self
            .operand
            .as_slice()
            .try_into()
            .map_err(|_| VmError::invalid_operand(format!("{:?} expects a 32-bit operand", self.opcode)))?;
        Ok(i32::from_le_bytes(bytes))
    }

    /// Reads the operand as an unsigned 32-bit LE id.
    pub fn operand_u32(&self) -> VmResult<u32> {
        let bytes: [u8; 4] = self
            .operand
            .as_slice()
            .try_into()
            .map_err(|_| VmError::invalid_operand(format!("{:?} expects a 32-bit operand", self.opcode)))?;
        Ok(u32::from_le_bytes(bytes))
    }
}
