//! Element-correspondence descriptor.
//!
//! [`CopyPairing`] aligns the logical positions of a destination/source pair
//! for a copy, independent of physical strides and without forcing a common
//! dtype. The destination's shape is authoritative; the source is walked in
//! its own logical row-major order, so any shape-compatible source (same
//! total element count) pairs up position by position. Broadcasting, if any,
//! is the caller's responsibility.

use crate::{CopyError, Result, Tensor};

/// One operand's layout inside a pairing: logical dims plus physical strides.
#[derive(Debug, Clone)]
pub struct PairingLeg {
    /// Logical dimension extents.
    pub shape: Vec<usize>,
    /// Physical strides in elements, one per dimension.
    pub strides: Vec<isize>,
    /// Element offset of the first logical position into the storage buffer.
    pub offset: usize,
}

impl PairingLeg {
    fn of(t: &Tensor) -> PairingLeg {
        PairingLeg {
            shape: t.shape().to_vec(),
            strides: t.strides().to_vec(),
            offset: t.offset(),
        }
    }
}

/// Logical element correspondence between a destination and a source.
///
/// Enumerates matching positions without touching storage. Built by the
/// dispatcher after its short-circuits, consumed by the elementwise backend.
#[derive(Debug, Clone)]
pub struct CopyPairing {
    /// Destination leg; its shape is the copy's authoritative shape.
    pub dest: PairingLeg,
    /// Source leg, walked in its own logical order.
    pub src: PairingLeg,
    numel: usize,
}

impl CopyPairing {
    /// Build the correspondence for `(dest, src)`.
    ///
    /// The total element counts must agree; shapes themselves are not
    /// reconciled (shape compatibility is validated upstream).
    pub fn new(dest: &Tensor, src: &Tensor) -> Result<CopyPairing> {
        let numel = dest.numel();
        if src.numel() != numel {
            return Err(CopyError::ShapeMismatch(
                dest.shape().to_vec(),
                src.shape().to_vec(),
            ));
        }
        Ok(CopyPairing {
            dest: PairingLeg::of(dest),
            src: PairingLeg::of(src),
            numel,
        })
    }

    /// Total number of corresponding element pairs.
    #[inline]
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Whether both legs are dense row-major, so the pair is a straight
    /// buffer-to-buffer copy.
    pub fn is_contiguous_pair(&self) -> bool {
        leg_contiguous(&self.dest) && leg_contiguous(&self.src)
    }

    /// Visit every corresponding pair of storage offsets, in the
    /// destination's logical row-major order.
    ///
    /// Both legs advance their own odometer, so the legs may differ in rank
    /// and shape as long as the element counts agree.
    pub fn for_each_offset(&self, mut f: impl FnMut(usize, usize)) {
        let mut dest = Odometer::new(&self.dest);
        let mut src = Odometer::new(&self.src);
        for _ in 0..self.numel {
            f(dest.offset(), src.offset());
            dest.advance();
            src.advance();
        }
    }
}

fn leg_contiguous(leg: &PairingLeg) -> bool {
    let mut expected = 1isize;
    for (&d, &s) in leg.shape.iter().rev().zip(leg.strides.iter().rev()) {
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

/// Row-major index walker over one leg, tracking the running storage offset.
struct Odometer<'a> {
    leg: &'a PairingLeg,
    idx: Vec<usize>,
    offset: isize,
}

impl<'a> Odometer<'a> {
    fn new(leg: &'a PairingLeg) -> Odometer<'a> {
        Odometer {
            leg,
            idx: vec![0; leg.shape.len()],
            offset: leg.offset as isize,
        }
    }

    #[inline]
    fn offset(&self) -> usize {
        self.offset as usize
    }

    fn advance(&mut self) {
        for d in (0..self.idx.len()).rev() {
            self.idx[d] += 1;
            self.offset += self.leg.strides[d];
            if self.idx[d] < self.leg.shape[d] {
                return;
            }
            self.offset -= self.leg.shape[d] as isize * self.leg.strides[d];
            self.idx[d] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;

    #[test]
    fn test_contiguous_pair() {
        let d = Tensor::zeros(&[3, 4], DType::F32);
        let s = Tensor::zeros(&[3, 4], DType::F32);
        let p = CopyPairing::new(&d, &s).unwrap();
        assert!(p.is_contiguous_pair());
        assert_eq!(p.numel(), 12);
    }

    #[test]
    fn test_transposed_src_not_contiguous() {
        let d = Tensor::zeros(&[4, 3], DType::F32);
        let s = Tensor::zeros(&[3, 4], DType::F32).t().unwrap();
        let p = CopyPairing::new(&d, &s).unwrap();
        assert!(!p.is_contiguous_pair());
    }

    #[test]
    fn test_numel_mismatch() {
        let d = Tensor::zeros(&[2, 2], DType::F32);
        let s = Tensor::zeros(&[2, 3], DType::F32);
        assert!(matches!(
            CopyPairing::new(&d, &s),
            Err(CopyError::ShapeMismatch(_, _))
        ));
    }

    #[test]
    fn test_offsets_transposed_source() {
        // dest 2x3 row-major, src the transpose view of a 3x2 buffer.
        let d = Tensor::zeros(&[2, 3], DType::I32);
        let s = Tensor::zeros(&[3, 2], DType::I32).t().unwrap();
        let p = CopyPairing::new(&d, &s).unwrap();
        let mut pairs = Vec::new();
        p.for_each_offset(|d_off, s_off| pairs.push((d_off, s_off)));
        // src offset for logical (i, j) is j*2 + i in the 3x2 buffer.
        assert_eq!(pairs, vec![(0, 0), (1, 2), (2, 4), (3, 1), (4, 3), (5, 5)]);
    }

    #[test]
    fn test_offsets_rank_mismatched_legs() {
        // Flattened source: same numel, different rank.
        let d = Tensor::zeros(&[2, 2], DType::F64);
        let s = Tensor::zeros(&[4], DType::F64);
        let p = CopyPairing::new(&d, &s).unwrap();
        let mut pairs = Vec::new();
        p.for_each_offset(|d_off, s_off| pairs.push((d_off, s_off)));
        assert_eq!(pairs, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_zero_numel_visits_nothing() {
        let d = Tensor::zeros(&[0, 5], DType::F32);
        let s = Tensor::zeros(&[5, 0], DType::F32);
        let p = CopyPairing::new(&d, &s).unwrap();
        let mut count = 0;
        p.for_each_offset(|_, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_scalar_pair() {
        let d = Tensor::zeros(&[], DType::F32);
        let s = Tensor::zeros(&[], DType::F32);
        let p = CopyPairing::new(&d, &s).unwrap();
        let mut pairs = Vec::new();
        p.for_each_offset(|a, b| pairs.push((a, b)));
        assert_eq!(pairs, vec![(0, 0)]);
    }
}
