//! Tensor handles.
//!
//! A [`Tensor`] is a cheap-to-clone handle over shared storage plus layout
//! metadata (shape, strides, element offset), a device tag, and a sparsity
//! flag. Views produced by [`Tensor::transpose`] share the storage buffer
//! under a fresh handle, so handle identity and storage identity are
//! distinct notions — the copy dispatcher relies on both.
//!
//! Construction and allocation are not this crate's concern; the helpers
//! here exist so the copy path has operands to work with.

use std::sync::{Arc, RwLock};

use crate::{CopyError, DType, Device, Element, Result, Storage};

/// Validate that every reachable offset stays within `[0, len)`.
fn validate_bounds(len: usize, shape: &[usize], strides: &[isize], offset: usize) -> Result<()> {
    if shape.len() != strides.len() {
        return Err(CopyError::StrideLengthMismatch);
    }
    // Empty tensor - no access needed
    if shape.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let mut min_offset = offset as isize;
    let mut max_offset = offset as isize;
    for (&dim, &stride) in shape.iter().zip(strides.iter()) {
        if dim > 1 {
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(CopyError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(CopyError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(CopyError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset < 0 || max_offset as usize >= len {
        return Err(CopyError::OffsetOverflow);
    }
    Ok(())
}

/// Compute row-major strides (last index varies fastest).
pub(crate) fn row_major_strides(shape: &[usize]) -> Vec<isize> {
    let rank = shape.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1] as isize;
    }
    strides
}

struct TensorInner {
    storage: Option<Arc<RwLock<Storage>>>,
    dtype: DType,
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
    device: Device,
    sparse: bool,
}

/// Multi-dimensional typed buffer view: shape, strides, dtype, device.
///
/// Cloning a `Tensor` clones the handle, not the elements; two clones of the
/// same handle compare equal under [`Tensor::same_identity`].
#[derive(Clone)]
pub struct Tensor {
    inner: Arc<TensorInner>,
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.inner.shape)
            .field("strides", &self.inner.strides)
            .field("offset", &self.inner.offset)
            .field("dtype", &self.inner.dtype)
            .field("device", &self.inner.device)
            .field("sparse", &self.inner.sparse)
            .field("defined", &self.inner.storage.is_some())
            .finish()
    }
}

impl Tensor {
    /// Create a row-major tensor over existing storage on the host.
    pub fn from_storage(storage: Storage, shape: &[usize]) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        if storage.len() != numel {
            return Err(CopyError::ShapeMismatch(
                shape.to_vec(),
                vec![storage.len()],
            ));
        }
        let strides = row_major_strides(shape);
        let dtype = storage.dtype();
        Ok(Tensor {
            inner: Arc::new(TensorInner {
                storage: Some(Arc::new(RwLock::new(storage))),
                dtype,
                shape: shape.to_vec(),
                strides,
                offset: 0,
                device: Device::Cpu,
                sparse: false,
            }),
        })
    }

    /// Create a row-major tensor from a typed element vector.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> Result<Tensor> {
        let storage = store_vec(data);
        Tensor::from_storage(storage, shape)
    }

    /// Create a view over existing storage with explicit strides and offset.
    ///
    /// Bounds are validated up front so the copy kernels can index without
    /// re-checking.
    pub fn from_parts(
        storage: Arc<RwLock<Storage>>,
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Tensor> {
        let (len, dtype) = {
            let guard = storage.read().unwrap();
            (guard.len(), guard.dtype())
        };
        validate_bounds(len, shape, strides, offset)?;
        Ok(Tensor {
            inner: Arc::new(TensorInner {
                storage: Some(storage),
                dtype,
                shape: shape.to_vec(),
                strides: strides.to_vec(),
                offset,
                device: Device::Cpu,
                sparse: false,
            }),
        })
    }

    /// Create a zero-filled row-major tensor of the given dtype.
    pub fn zeros(shape: &[usize], dtype: DType) -> Tensor {
        let numel: usize = shape.iter().product();
        Tensor {
            inner: Arc::new(TensorInner {
                storage: Some(Arc::new(RwLock::new(Storage::zeros(dtype, numel)))),
                dtype,
                shape: shape.to_vec(),
                strides: row_major_strides(shape),
                offset: 0,
                device: Device::Cpu,
                sparse: false,
            }),
        }
    }

    /// Create a row-major tensor with values produced by a function of the
    /// logical index.
    pub fn from_fn_row_major<T: Element>(
        shape: &[usize],
        mut f: impl FnMut(&[usize]) -> T,
    ) -> Tensor {
        let numel: usize = shape.iter().product();
        let rank = shape.len();
        let mut data = Vec::with_capacity(numel);
        let mut idx = vec![0usize; rank];
        for _ in 0..numel {
            data.push(f(&idx));
            for d in (0..rank).rev() {
                idx[d] += 1;
                if idx[d] < shape[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        Tensor::from_vec(data, shape).expect("shape matches generated data")
    }

    /// Create an undefined tensor: a handle with no allocated storage.
    pub fn undefined(dtype: DType) -> Tensor {
        Tensor {
            inner: Arc::new(TensorInner {
                storage: None,
                dtype,
                shape: vec![],
                strides: vec![],
                offset: 0,
                device: Device::Cpu,
                sparse: false,
            }),
        }
    }

    /// Create a placeholder for a sparse tensor.
    ///
    /// The sparse representation is external and opaque; the dispatcher only
    /// ever inspects the flag and delegates.
    pub fn sparse_placeholder(shape: &[usize], dtype: DType) -> Tensor {
        Tensor {
            inner: Arc::new(TensorInner {
                storage: Some(Arc::new(RwLock::new(Storage::zeros(dtype, 0)))),
                dtype,
                shape: shape.to_vec(),
                strides: vec![0; shape.len()],
                offset: 0,
                device: Device::Cpu,
                sparse: true,
            }),
        }
    }

    /// Retag this tensor as residing on `device`, sharing storage.
    ///
    /// Physical staging between devices is the business of the registered
    /// backends, not of this handle.
    pub fn to_device(&self, device: Device) -> Tensor {
        Tensor {
            inner: Arc::new(TensorInner {
                storage: self.inner.storage.clone(),
                dtype: self.inner.dtype,
                shape: self.inner.shape.clone(),
                strides: self.inner.strides.clone(),
                offset: self.inner.offset,
                device,
                sparse: self.inner.sparse,
            }),
        }
    }

    /// Zero-copy view with two dimensions swapped.
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Tensor> {
        let rank = self.ndim();
        if dim0 >= rank || dim1 >= rank {
            return Err(CopyError::RankMismatch(dim0.max(dim1) + 1, rank));
        }
        let mut shape = self.inner.shape.clone();
        let mut strides = self.inner.strides.clone();
        shape.swap(dim0, dim1);
        strides.swap(dim0, dim1);
        Ok(Tensor {
            inner: Arc::new(TensorInner {
                storage: self.inner.storage.clone(),
                dtype: self.inner.dtype,
                shape,
                strides,
                offset: self.inner.offset,
                device: self.inner.device,
                sparse: self.inner.sparse,
            }),
        })
    }

    /// Transpose view of a 2-D tensor.
    pub fn t(&self) -> Result<Tensor> {
        if self.ndim() != 2 {
            return Err(CopyError::RankMismatch(self.ndim(), 2));
        }
        self.transpose(0, 1)
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.inner.shape
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.inner.strides
    }

    /// Extent of dimension `dim`.
    #[inline]
    pub fn size(&self, dim: usize) -> usize {
        self.inner.shape[dim]
    }

    /// Stride (in elements) of dimension `dim`.
    #[inline]
    pub fn stride(&self, dim: usize) -> isize {
        self.inner.strides[dim]
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.inner.shape.len()
    }

    #[inline]
    pub fn numel(&self) -> usize {
        self.inner.shape.iter().product()
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    #[inline]
    pub fn device(&self) -> Device {
        self.inner.device
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.inner.offset
    }

    #[inline]
    pub fn is_sparse(&self) -> bool {
        self.inner.sparse
    }

    /// Whether this handle has allocated storage.
    #[inline]
    pub fn is_defined(&self) -> bool {
        self.inner.storage.is_some()
    }

    /// Whether `self` and `other` are the same tensor handle.
    #[inline]
    pub fn same_identity(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Shared storage buffer, if defined.
    pub fn storage(&self) -> Option<&Arc<RwLock<Storage>>> {
        self.inner.storage.as_ref()
    }

    /// Whether this tensor is laid out dense row-major with no gaps.
    ///
    /// Dimensions of extent <= 1 are layout-neutral and skipped, matching
    /// the usual contiguity convention.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1isize;
        for (&d, &s) in self
            .inner
            .shape
            .iter()
            .rev()
            .zip(self.inner.strides.iter().rev())
        {
            if d <= 1 {
                continue;
            }
            if s != expected {
                return false;
            }
            expected = expected.saturating_mul(d as isize);
        }
        true
    }

    /// One-line operand description used in error payloads.
    pub fn kind(&self) -> String {
        let density = if self.inner.sparse { "sparse" } else { "dense" };
        format!("{} {} {} tensor", density, self.inner.dtype, self.inner.device)
    }

    /// Read one element by logical index.
    pub fn get<T: Element>(&self, indices: &[usize]) -> Result<T> {
        if indices.len() != self.ndim() {
            return Err(CopyError::RankMismatch(indices.len(), self.ndim()));
        }
        let storage = self
            .inner
            .storage
            .as_ref()
            .ok_or(CopyError::UndefinedOperand { operand: "operand" })?;
        let mut off = self.inner.offset as isize;
        for (d, &i) in indices.iter().enumerate() {
            if i >= self.inner.shape[d] {
                return Err(CopyError::OffsetOverflow);
            }
            off += i as isize * self.inner.strides[d];
        }
        let guard = storage.read().unwrap();
        let slice = guard.as_slice::<T>()?;
        Ok(slice[off as usize])
    }

    /// Materialize all elements in logical row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let storage = self
            .inner
            .storage
            .as_ref()
            .ok_or(CopyError::UndefinedOperand { operand: "operand" })?;
        let guard = storage.read().unwrap();
        let slice = guard.as_slice::<T>()?;
        let numel = self.numel();
        let rank = self.ndim();
        let mut out = Vec::with_capacity(numel);
        let mut idx = vec![0usize; rank];
        let mut off = self.inner.offset as isize;
        for _ in 0..numel {
            out.push(slice[off as usize]);
            for d in (0..rank).rev() {
                idx[d] += 1;
                off += self.inner.strides[d];
                if idx[d] < self.inner.shape[d] {
                    break;
                }
                off -= self.inner.shape[d] as isize * self.inner.strides[d];
                idx[d] = 0;
            }
        }
        Ok(out)
    }
}

fn store_vec<T: Element>(data: Vec<T>) -> Storage {
    let mut storage = Storage::zeros(T::DTYPE, data.len());
    match T::from_storage_mut(&mut storage) {
        Some(slice) => slice.copy_from_slice(&data),
        None => unreachable!("zeros(T::DTYPE) always yields the matching variant"),
    }
    storage
}
