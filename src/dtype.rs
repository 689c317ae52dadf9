//! Scalar element kinds.

use std::fmt;

/// Scalar element kind of a tensor.
///
/// The set is fixed: integer widths, floating widths, boolean, and the
/// quantized narrow-integer kind. Quantized storage carries scale/zero-point
/// metadata but is treated opaquely by the copy path — the dispatcher only
/// ever checks for it and delegates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Boolean.
    Bool,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Quantized unsigned 8-bit integer (scale/zero-point carried by storage).
    QUInt8,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 | DType::QUInt8 => 1,
            DType::I16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    /// Whether this is the quantized narrow-integer kind.
    pub fn is_quantized(self) -> bool {
        matches!(self, DType::QUInt8)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::U8 => "u8",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::QUInt8 => "quint8",
        };
        f.write_str(name)
    }
}
