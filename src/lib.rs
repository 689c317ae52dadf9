//! Copy primitive for strided tensors.
//!
//! This crate implements the value-copy operation between two already
//! allocated tensors: `copy(dest, src, non_blocking)` writes the logical
//! elements of `src` into `dest`, reconciling heterogeneous storage layouts,
//! element representations, and device placement.
//!
//! # Components
//!
//! - [`copy`]: the public dispatcher. It inspects operand properties
//!   (sparsity, aliasing, dtype, layout, device) and routes each call to the
//!   cheapest legal strategy.
//! - [`copy_transpose_blocked`]: a cache-tiled kernel for the common case of
//!   copying a row-major-transposed 2D source into a contiguous destination
//!   of the same dtype.
//! - [`ElementwiseCopy`]: the backend contract for the fully general
//!   per-element copy (arbitrary strides, dtype conversion). One
//!   implementation per device type is held in a process-wide registry; a
//!   CPU implementation is registered by default.
//!
//! # Example
//!
//! ```rust
//! use tensor_copy::{copy, Tensor};
//!
//! // dest is a contiguous 4x3 matrix, src the transpose view of a 3x4 one.
//! let m = Tensor::from_vec((0..12).map(|x| x as f64).collect(), &[3, 4]).unwrap();
//! let dest = Tensor::zeros(&[4, 3], tensor_copy::DType::F64);
//! copy(&dest, &m.t().unwrap(), false).unwrap();
//! assert_eq!(dest.get::<f64>(&[2, 1]).unwrap(), m.get::<f64>(&[1, 2]).unwrap());
//! ```
//!
//! # What this crate does not do
//!
//! Tensor construction, resizing, and storage allocation live outside this
//! crate; the helpers on [`Tensor`] exist so the copy path is testable.
//! Sparse-to-sparse and quantized copies are delegated to externally
//! registered services (see [`register_sparse_copy`] and
//! [`register_quantized_copy`]).

mod backend;
mod copy;
mod device;
mod dtype;
mod pairing;
mod storage;
mod tensor;
mod transpose;

pub use backend::{
    register_backend, register_quantized_copy, register_sparse_copy, resolve_backend,
    CpuElementwiseCopy, ElementwiseCopy, QuantizedCopyFn, SparseCopyFn,
};
pub use copy::copy;
pub use device::{Device, DeviceType};
pub use dtype::DType;
pub use pairing::CopyPairing;
pub use storage::{Element, Storage};
pub use tensor::Tensor;
pub use transpose::copy_transpose_blocked;

// ============================================================================
// Constants
// ============================================================================

/// Minimum destination element count for the blocked-transpose fast path.
///
/// Below this, the tiling overhead outweighs the cache savings and the
/// dispatcher falls back to the generic elementwise backend.
pub const TRANSPOSE_MIN_NUMEL: usize = 60 * 60;

/// Tile edge length for the blocked transpose with 1-byte elements.
pub const TRANSPOSE_BLOCK_BYTE: usize = 120;

/// Tile edge length for the blocked transpose with wider elements.
pub const TRANSPOSE_BLOCK_WIDE: usize = 60;

// ============================================================================
// Error types
// ============================================================================

/// Errors produced by the copy dispatcher and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// Destination or source has no allocated storage.
    #[error("{operand} tensor is undefined (no storage)")]
    UndefinedOperand {
        /// Which operand was undefined: `"destination"` or `"source"`.
        operand: &'static str,
    },

    /// Exactly one of the two operands is sparse.
    #[error("copy between dense and sparse tensors is not implemented: destination is {dest}, source is {src}")]
    SparsityMismatch {
        /// Kind description of the destination operand.
        dest: String,
        /// Kind description of the source operand.
        src: String,
    },

    /// No elementwise copy implementation registered for the resolved device type.
    #[error("no copy backend registered for device type {0}")]
    MissingBackend(DeviceType),

    /// A delegated copy service (sparse or quantized) is not registered.
    #[error("no {0} copy service registered")]
    MissingService(&'static str),

    /// A dtype reached a code path that cannot handle it.
    #[error("unsupported dtype {dtype} for {context}")]
    UnsupportedDType {
        /// The offending dtype.
        dtype: DType,
        /// The operation that rejected it.
        context: &'static str,
    },

    /// Storage variant does not match the requested element type.
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch {
        /// The dtype that was requested.
        expected: DType,
        /// The dtype actually held by the storage.
        got: DType,
    },

    /// Tensor ranks do not match.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Tensor shapes are incompatible.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Stride array length does not match the number of dimensions.
    #[error("stride and shape length mismatch")]
    StrideLengthMismatch,

    /// An index computation left the bounds of the underlying storage.
    #[error("offset overflow while computing storage bounds")]
    OffsetOverflow,
}

/// Result type for copy operations.
pub type Result<T> = std::result::Result<T, CopyError>;
