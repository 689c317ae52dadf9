//! Typed element buffers.
//!
//! [`Storage`] holds the raw elements of a tensor, one enum variant per
//! dtype. The [`Element`] trait maps a Rust scalar type to its storage
//! variant and provides the widening/narrowing hooks used when a copy must
//! convert representation.

use num_traits::AsPrimitive;

use crate::{CopyError, DType, Result};

/// Raw element buffer of a tensor, tagged by dtype.
///
/// The quantized variant carries its scale/zero-point metadata alongside the
/// raw bytes; the copy path never interprets it.
#[derive(Debug, Clone)]
pub enum Storage {
    /// Boolean elements.
    Bool(Vec<bool>),
    /// Unsigned 8-bit elements.
    U8(Vec<u8>),
    /// Signed 8-bit elements.
    I8(Vec<i8>),
    /// Signed 16-bit elements.
    I16(Vec<i16>),
    /// Signed 32-bit elements.
    I32(Vec<i32>),
    /// Signed 64-bit elements.
    I64(Vec<i64>),
    /// 32-bit float elements.
    F32(Vec<f32>),
    /// 64-bit float elements.
    F64(Vec<f64>),
    /// Quantized unsigned 8-bit elements with scale/zero-point metadata.
    QU8 {
        /// Raw quantized values.
        data: Vec<u8>,
        /// Quantization scale.
        scale: f64,
        /// Quantization zero point.
        zero_point: i32,
    },
}

impl Storage {
    /// Allocate zero-filled storage of `len` elements for `dtype`.
    pub fn zeros(dtype: DType, len: usize) -> Storage {
        match dtype {
            DType::Bool => Storage::Bool(vec![false; len]),
            DType::U8 => Storage::U8(vec![0; len]),
            DType::I8 => Storage::I8(vec![0; len]),
            DType::I16 => Storage::I16(vec![0; len]),
            DType::I32 => Storage::I32(vec![0; len]),
            DType::I64 => Storage::I64(vec![0; len]),
            DType::F32 => Storage::F32(vec![0.0; len]),
            DType::F64 => Storage::F64(vec![0.0; len]),
            DType::QUInt8 => Storage::QU8 {
                data: vec![0; len],
                scale: 1.0,
                zero_point: 0,
            },
        }
    }

    /// Dtype held by this storage.
    pub fn dtype(&self) -> DType {
        match self {
            Storage::Bool(_) => DType::Bool,
            Storage::U8(_) => DType::U8,
            Storage::I8(_) => DType::I8,
            Storage::I16(_) => DType::I16,
            Storage::I32(_) => DType::I32,
            Storage::I64(_) => DType::I64,
            Storage::F32(_) => DType::F32,
            Storage::F64(_) => DType::F64,
            Storage::QU8 { .. } => DType::QUInt8,
        }
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        match self {
            Storage::Bool(v) => v.len(),
            Storage::U8(v) => v.len(),
            Storage::I8(v) => v.len(),
            Storage::I16(v) => v.len(),
            Storage::I32(v) => v.len(),
            Storage::I64(v) => v.len(),
            Storage::F32(v) => v.len(),
            Storage::F64(v) => v.len(),
            Storage::QU8 { data, .. } => data.len(),
        }
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the buffer as a typed slice.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::from_storage(self).ok_or(CopyError::DTypeMismatch {
            expected: T::DTYPE,
            got: self.dtype(),
        })
    }

    /// Borrow the buffer as a mutable typed slice.
    pub fn as_slice_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        let got = self.dtype();
        T::from_storage_mut(self).ok_or(CopyError::DTypeMismatch {
            expected: T::DTYPE,
            got,
        })
    }
}

/// Scalar types that can live in a [`Storage`] variant.
///
/// `to_f64`/`from_f64` are the conversion hooks for cross-dtype copies:
/// conversion routes through `f64` with `as`-cast semantics (floats saturate
/// into integers, booleans map to 0/1). Same-dtype copies never convert.
pub trait Element: Copy + Default + PartialEq + Send + Sync + 'static {
    /// The dtype corresponding to this Rust type.
    const DTYPE: DType;

    /// Borrow the matching storage variant, or `None` on a dtype mismatch.
    fn from_storage(storage: &Storage) -> Option<&[Self]>;

    /// Mutably borrow the matching storage variant.
    fn from_storage_mut(storage: &mut Storage) -> Option<&mut [Self]>;

    /// Widen to `f64` for cross-dtype conversion.
    fn to_f64(self) -> f64;

    /// Narrow from `f64` for cross-dtype conversion.
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            fn from_storage(storage: &Storage) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_storage_mut(storage: &mut Storage) -> Option<&mut [Self]> {
                match storage {
                    Storage::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn to_f64(self) -> f64 {
                AsPrimitive::<f64>::as_(self)
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }
        }
    };
}

impl_element!(u8, U8, DType::U8);
impl_element!(i8, I8, DType::I8);
impl_element!(i16, I16, DType::I16);
impl_element!(i32, I32, DType::I32);
impl_element!(i64, I64, DType::I64);
impl_element!(f32, F32, DType::F32);
impl_element!(f64, F64, DType::F64);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn from_storage(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn from_storage_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(value: f64) -> Self {
        value != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_dtype_roundtrip() {
        for dtype in [
            DType::Bool,
            DType::U8,
            DType::I8,
            DType::I16,
            DType::I32,
            DType::I64,
            DType::F32,
            DType::F64,
            DType::QUInt8,
        ] {
            let s = Storage::zeros(dtype, 7);
            assert_eq!(s.dtype(), dtype);
            assert_eq!(s.len(), 7);
        }
    }

    #[test]
    fn test_as_slice_matching() {
        let s = Storage::F32(vec![1.0, 2.0]);
        let v = s.as_slice::<f32>().unwrap();
        assert_eq!(v, &[1.0, 2.0]);
    }

    #[test]
    fn test_as_slice_mismatch() {
        let s = Storage::F32(vec![1.0]);
        let err = s.as_slice::<i64>().unwrap_err();
        assert!(matches!(
            err,
            CopyError::DTypeMismatch {
                expected: DType::I64,
                got: DType::F32,
            }
        ));
    }

    #[test]
    fn test_as_slice_mut() {
        let mut s = Storage::I32(vec![0; 3]);
        s.as_slice_mut::<i32>().unwrap()[1] = 9;
        assert_eq!(s.as_slice::<i32>().unwrap(), &[0, 9, 0]);
    }

    #[test]
    fn test_conversion_hooks() {
        assert_eq!(<i32 as Element>::from_f64(3.9), 3);
        assert_eq!(<u8 as Element>::from_f64(-1.0), 0); // saturating cast
        assert_eq!(<u8 as Element>::from_f64(300.0), 255);
        assert_eq!(<bool as Element>::from_f64(2.0), true);
        assert_eq!(<bool as Element>::from_f64(0.0), false);
        assert_eq!(true.to_f64(), 1.0);
        assert_eq!(7i64.to_f64(), 7.0);
    }
}
