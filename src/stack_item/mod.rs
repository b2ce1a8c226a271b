//! The run-time value domain of the Vela VM.
//!
//! `StackItem` is a tagged sum over primitives (Boolean, Integer,
//! ByteString, Buffer), compounds (Array, Struct, Map), and the special
//! values Null, Pointer, and InteropInterface. Primitives are value-like and
//! carry their payload inline; compounds carry only an arena id — the
//! engine's reference counter owns their element storage, and equality on
//! compounds is identity comparison on that id.

mod stack_item_type;

pub use stack_item_type::{StackItemType, MAX_INTEGER_SIZE};

use std::any::Any;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::{VmError, VmResult};
use crate::script::Script;

/// Identity of a compound value: a stable index into the engine's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompoundId(pub(crate) usize);

impl CompoundId {
    /// Returns the raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A first-class call target: a script plus an offset into it.
#[derive(Debug, Clone)]
pub struct Pointer {
    script: Script,
    position: usize,
}

impl Pointer {
    /// Creates a pointer into `script` at `position`.
    pub fn new(script: Script, position: usize) -> Self {
        Self { script, position }
    }

    /// The script this pointer targets.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The offset within the script.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl PartialEq for Pointer {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.script.ptr_eq(&other.script)
    }
}

impl Eq for Pointer {}

/// An opaque host-owned handle. Equality is handle identity.
#[derive(Clone)]
pub struct InteropObject(Arc<dyn Any + Send + Sync>);

impl InteropObject {
    /// Wraps a host value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Attempts to view the wrapped value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Returns whether two handles wrap the same host object.
    pub fn ptr_eq(&self, other: &InteropObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for InteropObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InteropObject({:p})", Arc::as_ptr(&self.0))
    }
}

/// A value on a VM stack.
#[derive(Debug, Clone)]
pub enum StackItem {
    /// The singleton absent value.
    Null,
    /// A two-valued primitive.
    Boolean(bool),
    /// An arbitrary-precision signed integer.
    Integer(BigInt),
    /// An immutable byte sequence.
    ByteString(Vec<u8>),
    /// A mutable byte sequence.
    Buffer(Vec<u8>),
    /// An ordered sequence of items, by identity.
    Array(CompoundId),
    /// Like Array, but deep-cloned at assignment boundaries.
    Struct(CompoundId),
    /// An insertion-ordered map from primitive keys to items, by identity.
    Map(CompoundId),
    /// An opaque host-owned handle.
    InteropInterface(InteropObject),
    /// A call target within a script.
    Pointer(Pointer),
}

impl StackItem {
    /// The Null item.
    pub fn null() -> Self {
        StackItem::Null
    }

    /// Creates a Boolean item.
    pub fn from_bool(value: bool) -> Self {
        StackItem::Boolean(value)
    }

    /// Creates an Integer item.
    pub fn from_int<T: Into<BigInt>>(value: T) -> Self {
        StackItem::Integer(value.into())
    }

    /// Creates a ByteString item.
    pub fn from_byte_string<T: Into<Vec<u8>>>(bytes: T) -> Self {
        StackItem::ByteString(bytes.into())
    }

    /// Creates a Buffer item.
    pub fn from_buffer<T: Into<Vec<u8>>>(bytes: T) -> Self {
        StackItem::Buffer(bytes.into())
    }

    /// Creates a Pointer item.
    pub fn from_pointer(script: Script, position: usize) -> Self {
        StackItem::Pointer(Pointer::new(script, position))
    }

    /// Wraps a host object as an InteropInterface item.
    pub fn from_interop<T: Any + Send + Sync>(value: T) -> Self {
        StackItem::InteropInterface(InteropObject::new(value))
    }

    /// Returns the type tag of this item.
    pub fn item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::InteropInterface(_) => StackItemType::InteropInterface,
            StackItem::Pointer(_) => StackItemType::Pointer,
        }
    }

    /// A short name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            StackItem::Null => "Null",
            StackItem::Boolean(_) => "Boolean",
            StackItem::Integer(_) => "Integer",
            StackItem::ByteString(_) => "ByteString",
            StackItem::Buffer(_) => "Buffer",
            StackItem::Array(_) => "Array",
            StackItem::Struct(_) => "Struct",
            StackItem::Map(_) => "Map",
            StackItem::InteropInterface(_) => "InteropInterface",
            StackItem::Pointer(_) => "Pointer",
        }
    }

    /// Returns true for items with a canonical byte view.
    pub fn is_primitive(&self) -> bool {
        self.item_type().is_primitive()
    }

    /// Returns true for aggregate items with identity.
    pub fn is_compound(&self) -> bool {
        self.item_type().is_compound()
    }

    /// Returns true for the Null item.
    pub fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    /// Returns the arena id for compound items.
    pub fn compound_id(&self) -> Option<CompoundId> {
        match self {
            StackItem::Array(id) | StackItem::Struct(id) | StackItem::Map(id) => Some(*id),
            _ => None,
        }
    }

    /// Interprets this item as a boolean.
    pub fn to_boolean(&self) -> bool {
        match self {
            StackItem::Null => false,
            StackItem::Boolean(value) => *value,
            StackItem::Integer(value) => !value.is_zero(),
            StackItem::ByteString(bytes) | StackItem::Buffer(bytes) => {
                // Anything longer than an arithmetic integer is nonzero
                // without scanning.
                if bytes.len() > MAX_INTEGER_SIZE {
                    return true;
                }
                bytes.iter().any(|&b| b != 0)
            }
            StackItem::Array(_)
            | StackItem::Struct(_)
            | StackItem::Map(_)
            | StackItem::InteropInterface(_)
            | StackItem::Pointer(_) => true,
        }
    }

    /// Returns the canonical big integer for a primitive item.
    ///
    /// Byte views longer than [`MAX_INTEGER_SIZE`] are a conversion error.
    pub fn as_int(&self) -> VmResult<BigInt> {
        match self {
            StackItem::Integer(value) => Ok(value.clone()),
            StackItem::Boolean(value) => Ok(BigInt::from(*value as u8)),
            StackItem::ByteString(bytes) | StackItem::Buffer(bytes) => {
                if bytes.len() > MAX_INTEGER_SIZE {
                    return Err(VmError::BigIntegerTooLarge {
                        bytes: bytes.len(),
                        limit: MAX_INTEGER_SIZE,
                    });
                }
                Ok(decode_integer(bytes))
            }
            other => Err(VmError::invalid_type("Integer", other.type_name())),
        }
    }

    /// Returns the canonical byte span for a primitive item.
    pub fn as_bytes(&self) -> VmResult<Vec<u8>> {
        self.primitive_span()
            .ok_or_else(|| VmError::invalid_type("primitive", self.type_name()))
    }

    fn primitive_span(&self) -> Option<Vec<u8>> {
        match self {
            StackItem::Boolean(value) => Some(vec![*value as u8]),
            StackItem::Integer(value) => Some(encode_integer(value)),
            StackItem::ByteString(bytes) | StackItem::Buffer(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Structural equality per the VM's rules: primitives compare by
    /// canonical byte span, compounds by identity, Null only to Null,
    /// pointers by (script identity, offset), interop handles by identity.
    pub fn equals(&self, other: &StackItem) -> bool {
        match (self, other) {
            (StackItem::Null, StackItem::Null) => true,
            (StackItem::Null, _) | (_, StackItem::Null) => false,
            (StackItem::Array(a), StackItem::Array(b))
            | (StackItem::Struct(a), StackItem::Struct(b))
            | (StackItem::Map(a), StackItem::Map(b)) => a == b,
            (StackItem::Pointer(a), StackItem::Pointer(b)) => a == b,
            (StackItem::InteropInterface(a), StackItem::InteropInterface(b)) => a.ptr_eq(b),
            (a, b) => match (a.primitive_span(), b.primitive_span()) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            },
        }
    }

    /// Converts a primitive item to another primitive type. Conversions
    /// from compounds, pointers, and interop handles fail; a conversion to
    /// the item's own type is the identity.
    pub fn convert_to(&self, target: StackItemType) -> VmResult<StackItem> {
        if target == self.item_type() {
            return Ok(self.clone());
        }

        match target {
            StackItemType::Boolean if self.is_primitive() => {
                Ok(StackItem::Boolean(self.to_boolean()))
            }
            StackItemType::Integer if self.is_primitive() => {
                Ok(StackItem::Integer(self.as_int()?))
            }
            StackItemType::ByteString if self.is_primitive() => {
                Ok(StackItem::ByteString(self.as_bytes()?))
            }
            StackItemType::Buffer if self.is_primitive() => {
                Ok(StackItem::Buffer(self.as_bytes()?))
            }
            _ => Err(VmError::invalid_type(
                format!("{target:?}"),
                self.type_name().to_string(),
            )),
        }
    }

    /// Interprets a primitive item as a non-negative index.
    pub fn as_index(&self) -> VmResult<usize> {
        let value = self.as_int()?;
        if value.is_negative() {
            return Err(VmError::invalid_operand(format!(
                "negative index: {value}"
            )));
        }
        value
            .to_usize()
            .ok_or_else(|| VmError::invalid_operand(format!("index out of range: {value}")))
    }
}

/// Encodes an integer as minimal two's-complement little-endian bytes.
/// Zero encodes as the empty span.
pub fn encode_integer(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_signed_bytes_le()
    }
}

/// Decodes little-endian two's-complement bytes into an integer. The empty
/// span decodes to zero.
pub fn decode_integer(bytes: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_le(bytes)
}

/// Returns the encoded byte length of an integer.
pub fn integer_byte_len(value: &BigInt) -> usize {
    encode_integer(value).len()
}
