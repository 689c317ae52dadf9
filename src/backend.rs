//! Elementwise copy backends and the device registry.
//!
//! The dispatcher consumes backends through a process-wide registry keyed by
//! [`DeviceType`]: one registration per device type, set up at process start
//! and read-only during calls. The host backend lives here and is
//! pre-registered; accelerator backends register themselves via
//! [`register_backend`]. Sparse-to-sparse and quantized copies are external
//! services reached through the same registration pattern.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::{CopyError, CopyPairing, DeviceType, Element, Result, Storage, Tensor};

/// Fully general per-element copy for one device type.
///
/// Implementations copy every logical element described by the pairing from
/// source to destination, converting representation when the dtypes differ.
/// `non_blocking` is a hint that an accelerator-side transfer may be
/// enqueued and complete after the call returns; host implementations are
/// synchronous and ignore it.
pub trait ElementwiseCopy: Send + Sync {
    /// Execute the copy described by `pairing`.
    fn copy(
        &self,
        pairing: &CopyPairing,
        dest: &Tensor,
        src: &Tensor,
        non_blocking: bool,
    ) -> Result<()>;
}

impl std::fmt::Debug for dyn ElementwiseCopy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ElementwiseCopy")
    }
}

static BACKENDS: Lazy<RwLock<HashMap<DeviceType, Arc<dyn ElementwiseCopy>>>> = Lazy::new(|| {
    let mut map: HashMap<DeviceType, Arc<dyn ElementwiseCopy>> = HashMap::new();
    map.insert(DeviceType::Cpu, Arc::new(CpuElementwiseCopy));
    RwLock::new(map)
});

/// Register the elementwise copy implementation for a device type.
///
/// Intended to run once at process start; a later registration for the same
/// device type replaces the earlier one.
pub fn register_backend(device: DeviceType, backend: Arc<dyn ElementwiseCopy>) {
    BACKENDS.write().unwrap().insert(device, backend);
}

/// Look up the elementwise copy implementation for a device type.
pub fn resolve_backend(device: DeviceType) -> Result<Arc<dyn ElementwiseCopy>> {
    BACKENDS
        .read()
        .unwrap()
        .get(&device)
        .cloned()
        .ok_or(CopyError::MissingBackend(device))
}

/// Sparse-to-sparse copy service signature.
pub type SparseCopyFn = fn(&Tensor, &Tensor, bool) -> Result<Tensor>;

/// Quantized copy service signature.
pub type QuantizedCopyFn = fn(&Tensor, &Tensor) -> Result<Tensor>;

static SPARSE_COPY: Lazy<RwLock<Option<SparseCopyFn>>> = Lazy::new(|| RwLock::new(None));
static QUANTIZED_COPY: Lazy<RwLock<Option<QuantizedCopyFn>>> = Lazy::new(|| RwLock::new(None));

/// Register the external sparse-to-sparse copy service.
pub fn register_sparse_copy(f: SparseCopyFn) {
    *SPARSE_COPY.write().unwrap() = Some(f);
}

/// Register the external quantized copy service.
pub fn register_quantized_copy(f: QuantizedCopyFn) {
    *QUANTIZED_COPY.write().unwrap() = Some(f);
}

pub(crate) fn sparse_copy(dest: &Tensor, src: &Tensor, non_blocking: bool) -> Result<Tensor> {
    let f = SPARSE_COPY
        .read()
        .unwrap()
        .ok_or(CopyError::MissingService("sparse"))?;
    f(dest, src, non_blocking)
}

pub(crate) fn quantized_copy(dest: &Tensor, src: &Tensor) -> Result<Tensor> {
    let f = QUANTIZED_COPY
        .read()
        .unwrap()
        .ok_or(CopyError::MissingService("quantized"))?;
    f(dest, src)
}

// ============================================================================
// Host backend
// ============================================================================

/// Host implementation of [`ElementwiseCopy`].
///
/// Handles arbitrary strides and dtype conversion. Host copies complete
/// before returning, so `non_blocking` has no effect here.
pub struct CpuElementwiseCopy;

impl ElementwiseCopy for CpuElementwiseCopy {
    fn copy(
        &self,
        pairing: &CopyPairing,
        dest: &Tensor,
        src: &Tensor,
        _non_blocking: bool,
    ) -> Result<()> {
        let dest_arc = dest
            .storage()
            .ok_or(CopyError::UndefinedOperand {
                operand: "destination",
            })?
            .clone();
        let src_arc = src
            .storage()
            .ok_or(CopyError::UndefinedOperand { operand: "source" })?
            .clone();

        if Arc::ptr_eq(&dest_arc, &src_arc) {
            // Distinct views over one buffer: snapshot the source so the
            // write side never observes its own partial output.
            let snapshot = src_arc.read().unwrap().clone();
            let mut dest_guard = dest_arc.write().unwrap();
            copy_storage(pairing, &mut dest_guard, &snapshot)
        } else {
            let mut dest_guard = dest_arc.write().unwrap();
            let src_guard = src_arc.read().unwrap();
            copy_storage(pairing, &mut dest_guard, &src_guard)
        }
    }
}

/// Expand `$body` with `$T` bound to the Rust type for `$dtype`.
///
/// Quantized storage never takes a kernel path; it is delegated by the
/// dispatcher before a pairing is built.
macro_rules! with_dtype {
    ($dtype:expr, $context:expr, $T:ident, $body:expr) => {
        match $dtype {
            $crate::DType::Bool => {
                type $T = bool;
                $body
            }
            $crate::DType::U8 => {
                type $T = u8;
                $body
            }
            $crate::DType::I8 => {
                type $T = i8;
                $body
            }
            $crate::DType::I16 => {
                type $T = i16;
                $body
            }
            $crate::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::DType::I64 => {
                type $T = i64;
                $body
            }
            $crate::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::DType::QUInt8 => Err($crate::CopyError::UnsupportedDType {
                dtype: $crate::DType::QUInt8,
                context: $context,
            }),
        }
    };
}

pub(crate) use with_dtype;

fn copy_storage(pairing: &CopyPairing, dest: &mut Storage, src: &Storage) -> Result<()> {
    if dest.dtype() == src.dtype() {
        with_dtype!(dest.dtype(), "elementwise copy", T, {
            copy_same::<T>(pairing, dest, src)
        })
    } else {
        with_dtype!(src.dtype(), "elementwise copy", S, {
            with_dtype!(dest.dtype(), "elementwise copy", D, {
                copy_cast::<S, D>(pairing, dest, src)
            })
        })
    }
}

/// Same-dtype copy: no conversion, straight memcpy when both legs are dense.
fn copy_same<T: Element>(pairing: &CopyPairing, dest: &mut Storage, src: &Storage) -> Result<()> {
    let dest_slice = dest.as_slice_mut::<T>()?;
    let src_slice = src.as_slice::<T>()?;
    let n = pairing.numel();
    if pairing.is_contiguous_pair() {
        let d0 = pairing.dest.offset;
        let s0 = pairing.src.offset;
        dest_slice[d0..d0 + n].copy_from_slice(&src_slice[s0..s0 + n]);
    } else {
        pairing.for_each_offset(|d_off, s_off| {
            dest_slice[d_off] = src_slice[s_off];
        });
    }
    Ok(())
}

/// Cross-dtype copy: converts each element through the `Element` hooks.
fn copy_cast<S: Element, D: Element>(
    pairing: &CopyPairing,
    dest: &mut Storage,
    src: &Storage,
) -> Result<()> {
    let dest_slice = dest.as_slice_mut::<D>()?;
    let src_slice = src.as_slice::<S>()?;
    pairing.for_each_offset(|d_off, s_off| {
        dest_slice[d_off] = D::from_f64(src_slice[s_off].to_f64());
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;

    #[test]
    fn test_resolve_cpu_backend() {
        assert!(resolve_backend(DeviceType::Cpu).is_ok());
    }

    #[test]
    fn test_resolve_missing_backend() {
        let err = resolve_backend(DeviceType::Cuda).unwrap_err();
        assert!(matches!(err, CopyError::MissingBackend(DeviceType::Cuda)));
    }

    #[test]
    fn test_cpu_copy_same_dtype_contiguous() {
        let dest = Tensor::zeros(&[2, 3], DType::F64);
        let src = Tensor::from_vec((0..6).map(|x| x as f64).collect(), &[2, 3]).unwrap();
        let pairing = CopyPairing::new(&dest, &src).unwrap();
        CpuElementwiseCopy.copy(&pairing, &dest, &src, false).unwrap();
        assert_eq!(dest.to_vec::<f64>().unwrap(), src.to_vec::<f64>().unwrap());
    }

    #[test]
    fn test_cpu_copy_strided_source() {
        let src = Tensor::from_vec((0..6).map(|x| x as i32).collect(), &[2, 3])
            .unwrap()
            .t()
            .unwrap();
        let dest = Tensor::zeros(&[3, 2], DType::I32);
        let pairing = CopyPairing::new(&dest, &src).unwrap();
        CpuElementwiseCopy.copy(&pairing, &dest, &src, false).unwrap();
        assert_eq!(dest.to_vec::<i32>().unwrap(), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_cpu_copy_int_to_float() {
        let src = Tensor::from_vec(vec![1i32, -2, 3, -4], &[2, 2]).unwrap();
        let dest = Tensor::zeros(&[2, 2], DType::F64);
        let pairing = CopyPairing::new(&dest, &src).unwrap();
        CpuElementwiseCopy.copy(&pairing, &dest, &src, false).unwrap();
        assert_eq!(dest.to_vec::<f64>().unwrap(), vec![1.0, -2.0, 3.0, -4.0]);
    }

    #[test]
    fn test_cpu_copy_float_to_bool() {
        let src = Tensor::from_vec(vec![0.0f32, 2.5, -1.0, 0.0], &[4]).unwrap();
        let dest = Tensor::zeros(&[4], DType::Bool);
        let pairing = CopyPairing::new(&dest, &src).unwrap();
        CpuElementwiseCopy.copy(&pairing, &dest, &src, false).unwrap();
        assert_eq!(
            dest.to_vec::<bool>().unwrap(),
            vec![false, true, true, false]
        );
    }

    #[test]
    fn test_cpu_copy_shared_storage_snapshot() {
        // dest and src are distinct views of one buffer; the source must be
        // read as it was before any write.
        let base = Tensor::from_vec((0..4).map(|x| x as f64).collect(), &[2, 2]).unwrap();
        let storage = base.storage().unwrap().clone();
        let dest = Tensor::from_parts(storage.clone(), &[2, 2], &[2, 1], 0).unwrap();
        let src = Tensor::from_parts(storage, &[2, 2], &[1, 2], 0).unwrap();
        let pairing = CopyPairing::new(&dest, &src).unwrap();
        CpuElementwiseCopy.copy(&pairing, &dest, &src, false).unwrap();
        // Buffer [0,1,2,3] read column-major is [[0,2],[1,3]].
        assert_eq!(dest.to_vec::<f64>().unwrap(), vec![0.0, 2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_quantized_storage_rejected() {
        let dest = Tensor::zeros(&[2], DType::F32);
        let src = Tensor::zeros(&[2], DType::QUInt8);
        let pairing = CopyPairing::new(&dest, &src).unwrap();
        let err = CpuElementwiseCopy.copy(&pairing, &dest, &src, false).unwrap_err();
        assert!(matches!(err, CopyError::UnsupportedDType { .. }));
    }
}
