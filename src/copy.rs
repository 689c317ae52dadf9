//! The copy dispatcher.
//!
//! `copy` is the public entry point of the crate: it inspects operand
//! properties and routes each call to the cheapest legal strategy, in a
//! fixed precondition order. It mutates destination storage only; neither
//! operand's metadata is ever touched.

use std::sync::Arc;

use crate::backend::{self, with_dtype};
use crate::{
    copy_transpose_blocked, resolve_backend, CopyError, CopyPairing, DeviceType, Element, Result,
    Tensor, TRANSPOSE_MIN_NUMEL,
};

/// Copy the values of `src` into `dest`, returning `dest` for chaining.
///
/// Routing, in order:
///
/// 1. Either operand undefined -> [`CopyError::UndefinedOperand`].
/// 2. Both sparse -> delegate to the registered sparse copy service.
/// 3. Exactly one sparse -> [`CopyError::SparsityMismatch`].
/// 4. Same tensor handle -> no-op, no storage access.
/// 5. Quantized destination -> delegate to the registered quantized service.
/// 6. Build the element correspondence; zero elements -> no-op.
/// 7. Resolve the execution device: an accelerator-resident source wins
///    (covers host-to-accelerator and accelerator-to-accelerator staging),
///    otherwise the destination's device.
/// 8. On the host, a contiguous destination paired with a transposed-matrix
///    source of the same dtype and at least [`TRANSPOSE_MIN_NUMEL`] elements
///    takes the blocked-transpose kernel; everything else goes to the
///    registered elementwise backend for the execution device.
///
/// `non_blocking` is passed through to accelerator backends as a hint that
/// the transfer may be enqueued and complete after the call returns; this
/// function itself never waits or synchronizes. Errors from delegated
/// services propagate unwrapped, and no destination write happens before
/// the precondition checks pass.
pub fn copy(dest: &Tensor, src: &Tensor, non_blocking: bool) -> Result<Tensor> {
    if !dest.is_defined() {
        return Err(CopyError::UndefinedOperand {
            operand: "destination",
        });
    }
    if !src.is_defined() {
        return Err(CopyError::UndefinedOperand { operand: "source" });
    }

    if dest.is_sparse() && src.is_sparse() {
        return backend::sparse_copy(dest, src, non_blocking);
    }
    if dest.is_sparse() || src.is_sparse() {
        return Err(CopyError::SparsityMismatch {
            dest: dest.kind(),
            src: src.kind(),
        });
    }

    if dest.same_identity(src) {
        return Ok(dest.clone());
    }

    if dest.dtype().is_quantized() {
        return backend::quantized_copy(dest, src);
    }

    let pairing = CopyPairing::new(dest, src)?;
    if pairing.numel() == 0 {
        return Ok(dest.clone());
    }

    let exec_device = if src.device().is_accelerator() {
        src.device()
    } else {
        dest.device()
    };

    if exec_device.device_type() == DeviceType::Cpu && copy_transpose_valid(dest, src) {
        copy_same_dtype_transpose(dest, src)?;
        return Ok(dest.clone());
    }

    let backend = resolve_backend(exec_device.device_type())?;
    backend.copy(&pairing, dest, src, non_blocking)?;
    Ok(dest.clone())
}

/// Fast-path eligibility: contiguous destination, source that is exactly the
/// transpose view of a contiguous matrix, identical non-quantized dtype, and
/// enough elements for the tiling to pay off.
fn copy_transpose_valid(dest: &Tensor, src: &Tensor) -> bool {
    dest.is_contiguous()
        && src.ndim() == 2
        && src.stride(0) == 1
        && src.stride(1) == src.size(0) as isize
        && dest.dtype() == src.dtype()
        && !dest.dtype().is_quantized()
        && dest.numel() >= TRANSPOSE_MIN_NUMEL
}

fn copy_same_dtype_transpose(dest: &Tensor, src: &Tensor) -> Result<()> {
    let nr = src.size(0);
    let nc = src.size(1);
    with_dtype!(dest.dtype(), "blocked transpose copy", T, {
        run_transpose::<T>(dest, src, nr, nc)
    })
}

fn run_transpose<T: Element>(dest: &Tensor, src: &Tensor, nr: usize, nc: usize) -> Result<()> {
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

    let d0 = dest.offset();
    let s0 = src.offset();
    let n = nr * nc;

    if Arc::ptr_eq(&dest_arc, &src_arc) {
        // Transposing a view of the destination's own buffer: snapshot the
        // source so the gather never reads scattered rows.
        let snapshot = src_arc.read().unwrap().clone();
        let src_slice = snapshot.as_slice::<T>()?;
        let mut dest_guard = dest_arc.write().unwrap();
        let dest_slice = dest_guard.as_slice_mut::<T>()?;
        copy_transpose_blocked(&mut dest_slice[d0..d0 + n], &src_slice[s0..s0 + n], nr, nc)
    } else {
        let mut dest_guard = dest_arc.write().unwrap();
        let src_guard = src_arc.read().unwrap();
        let dest_slice = dest_guard.as_slice_mut::<T>()?;
        let src_slice = src_guard.as_slice::<T>()?;
        copy_transpose_blocked(&mut dest_slice[d0..d0 + n], &src_slice[s0..s0 + n], nr, nc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;

    fn transposed_pair(rows: usize, cols: usize) -> (Tensor, Tensor) {
        // dest: contiguous rows x cols; src: transpose view of cols x rows.
        let m = Tensor::from_fn_row_major::<f32>(&[cols, rows], |idx| {
            (idx[0] * rows + idx[1]) as f32
        });
        let dest = Tensor::zeros(&[rows, cols], DType::F32);
        (dest, m.t().unwrap())
    }

    #[test]
    fn test_transpose_valid_predicate() {
        let (dest, src) = transposed_pair(64, 64);
        assert!(copy_transpose_valid(&dest, &src));

        // Below the element threshold.
        let (dest, src) = transposed_pair(10, 10);
        assert!(!copy_transpose_valid(&dest, &src));

        // Contiguous (non-transposed) source.
        let dest = Tensor::zeros(&[64, 64], DType::F32);
        let src = Tensor::zeros(&[64, 64], DType::F32);
        assert!(!copy_transpose_valid(&dest, &src));

        // Dtype mismatch.
        let (_, src) = transposed_pair(64, 64);
        let dest = Tensor::zeros(&[64, 64], DType::F64);
        assert!(!copy_transpose_valid(&dest, &src));

        // Non-contiguous destination.
        let (_, src) = transposed_pair(64, 64);
        let dest = Tensor::zeros(&[64, 64], DType::F32).t().unwrap();
        assert!(!copy_transpose_valid(&dest, &src));
    }

    #[test]
    fn test_fast_path_matches_naive() {
        let (dest, src) = transposed_pair(64, 64);
        copy(&dest, &src, false).unwrap();
        assert_eq!(
            dest.to_vec::<f32>().unwrap(),
            src.to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_self_transpose_view_snapshot() {
        // copy(square, square.t()): source aliases destination storage.
        let square = Tensor::from_fn_row_major::<f32>(&[64, 64], |idx| {
            (idx[0] * 64 + idx[1]) as f32
        });
        let expected: Vec<f32> = square.t().unwrap().to_vec::<f32>().unwrap();
        copy(&square, &square.t().unwrap(), false).unwrap();
        assert_eq!(square.to_vec::<f32>().unwrap(), expected);
    }
}
