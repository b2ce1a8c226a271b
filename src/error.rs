//! Error types for the Vela VM.
//!
//! Every failure the core can produce is a `VmError`; the execution engine
//! maps any error surfacing from a step into the FAULT state.

use thiserror::Error;

/// The result type used throughout the VM.
pub type VmResult<T> = std::result::Result<T, VmError>;

/// Errors that can occur while decoding or executing a script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// A script or instruction could not be decoded.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// The opcode byte does not name a known instruction.
    #[error("Invalid opcode: {opcode:#04x}")]
    InvalidOpCode { opcode: u8 },

    /// The operation is invalid in the current machine state.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// An operand popped from the stack had an unusable value.
    #[error("Invalid operand: {message}")]
    InvalidOperand { message: String },

    /// A stack item had the wrong variant for the operation.
    #[error("Invalid type: expected {expected}, got {actual}")]
    InvalidType { expected: String, actual: String },

    /// A pop or peek reached past the stack depth.
    #[error("Stack underflow: requested {requested}, available {available}")]
    StackUnderflow { requested: usize, available: usize },

    /// The aggregate stack item count exceeded the configured cap.
    #[error("Stack overflow: {count} items, limit {limit}")]
    StackOverflow { count: usize, limit: usize },

    /// The invocation stack is full.
    #[error("Invocation stack overflow: depth {depth}, limit {limit}")]
    InvocationStackOverflow { depth: usize, limit: usize },

    /// A jump or call target fell outside the script.
    #[error("Invalid jump target: {target}")]
    InvalidJump { target: i64 },

    /// Division or modulo by zero.
    #[error("Division by zero in {operation}")]
    DivisionByZero { operation: String },

    /// An integer exceeded the byte bound for arithmetic operands.
    #[error("Big integer too large: {bytes} bytes, limit {limit}")]
    BigIntegerTooLarge { bytes: usize, limit: usize },

    /// A byte string or buffer exceeded the item size cap.
    #[error("Item too large: {size} bytes, limit {limit}")]
    ItemTooLarge { size: usize, limit: usize },

    /// An array, struct, or map grew past the entry cap.
    #[error("Collection too large: {size} entries, limit {limit}")]
    CollectionTooLarge { size: usize, limit: usize },

    /// No syscall handler is registered for the requested id.
    #[error("Unknown syscall: {id:#010x}")]
    UnknownSyscall { id: u32 },

    /// A syscall handler reported failure.
    #[error("Syscall {id:#010x} failed: {message}")]
    SyscallFailed { id: u32, message: String },

    /// An explicit THROW, or a failed THROWIFNOT.
    #[error("Uncaught exception: {message}")]
    Throw { message: String },
}

impl VmError {
    /// Creates a new parse error.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a new invalid opcode error.
    pub fn invalid_opcode(opcode: u8) -> Self {
        Self::InvalidOpCode { opcode }
    }

    /// Creates a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(message: S) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a new invalid operand error.
    pub fn invalid_operand<S: Into<String>>(message: S) -> Self {
        Self::InvalidOperand {
            message: message.into(),
        }
    }

    /// Creates a new invalid type error.
    pub fn invalid_type<S: Into<String>>(expected: S, actual: S) -> Self {
        Self::InvalidType {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new stack underflow error.
    pub fn stack_underflow(requested: usize, available: usize) -> Self {
        Self::StackUnderflow {
            requested,
            available,
        }
    }

    /// Creates a new division by zero error.
    pub fn division_by_zero<S: Into<String>>(operation: S) -> Self {
        Self::DivisionByZero {
            operation: operation.into(),
        }
    }

    /// Creates a new throw error.
    pub fn throw<S: Into<String>>(message: S) -> Self {
        Self::Throw {
            message: message.into(),
        }
    }
}
