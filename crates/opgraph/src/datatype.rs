//! Scalar element types carried by tensor descriptors and operator attributes.

use serde::{Deserialize, Serialize};

/// Logical scalar type of a tensor or of an operator's accumulator.
///
/// Attributes and the graph [`Context`](crate::context::Context) store
/// `Option<DataType>`; `None` means the type has not been set and either
/// defaults from the context during expansion or is rejected by the
/// backend at descriptor-build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Half,
    BFloat16,
    Float,
    Double,
    Int8,
    Int32,
    Int64,
    Uint8,
    Boolean,
    Fp8E4M3,
    Fp8E5M2,
}

impl DataType {
    /// Returns `true` for floating-point representations, including the
    /// 8-bit formats.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            DataType::Half
                | DataType::BFloat16
                | DataType::Float
                | DataType::Double
                | DataType::Fp8E4M3
                | DataType::Fp8E5M2
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int32 | DataType::Int64 | DataType::Uint8
        )
    }

    /// Storage size in bytes of one scalar element.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::Int8 | DataType::Uint8 | DataType::Boolean => 1,
            DataType::Fp8E4M3 | DataType::Fp8E5M2 => 1,
            DataType::Half | DataType::BFloat16 => 2,
            DataType::Float | DataType::Int32 => 4,
            DataType::Double | DataType::Int64 => 8,
        }
    }
}
