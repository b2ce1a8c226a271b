//! Type tags for stack items.

use num_enum::TryFromPrimitive;

/// Maximum encoded byte length of an integer used in arithmetic.
pub const MAX_INTEGER_SIZE: usize = 32;

/// Wire-level type tag of a stack item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum StackItemType {
    /// The type of Null.
    Any = 0x00,
    Pointer = 0x10,
    Boolean = 0x20,
    Integer = 0x21,
    ByteString = 0x28,
    Buffer = 0x30,
    Array = 0x40,
    Struct = 0x41,
    Map = 0x48,
    InteropInterface = 0x60,
}

impl StackItemType {
    /// Returns true for the types with a canonical byte view.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            StackItemType::Boolean
                | StackItemType::Integer
                | StackItemType::ByteString
                | StackItemType::Buffer
        )
    }

    /// Returns true for the aggregate types with object identity.
    pub fn is_compound(self) -> bool {
        matches!(
            self,
            StackItemType::Array | StackItemType::Struct | StackItemType::Map
        )
    }
}
