//! Execution limits enforced by the VM.

/// Restrictions on the resources a script may consume. The embedder can
/// override any of these when constructing an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEngineLimits {
    /// Maximum number of stack items reachable from all stacks combined,
    /// with map entries counted double. Checked after every instruction.
    pub max_stack_size: usize,

    /// Maximum byte length of a single ByteString or Buffer.
    pub max_item_size: usize,

    /// Maximum number of frames on the invocation stack.
    pub max_invocation_stack_size: usize,

    /// Maximum number of entries in an Array, Struct, or Map.
    pub max_array_size: usize,

    /// Maximum encoded byte length of an integer used in arithmetic.
    pub max_big_integer_size: usize,

    /// Upper bound for SHL/SHR shift counts.
    pub max_shift: i64,

    /// Lower bound for SHL/SHR shift counts.
    pub min_shift: i64,
}

impl Default for ExecutionEngineLimits {
    fn default() -> Self {
        Self {
            max_stack_size: 2048,
            max_item_size: 1024 * 1024,
            max_invocation_stack_size: 1024,
            max_array_size: 1024,
            max_big_integer_size: 32,
            max_shift: 256,
            min_shift: -256,
        }
    }
}
