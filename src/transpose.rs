//! Cache-blocked transpose copy.
//!
//! Copies `dest[i][j] = src_matrix[j][i]` for a contiguous row-major
//! destination and a source that is the transpose view of a contiguous
//! buffer. A naive strided walk touches memory near-randomly along one axis
//! for large matrices; tiling through a small scratch block reduces the
//! number of cache-unfriendly accesses from O(numel) to O(numel / BLOCK).

use crate::{CopyError, Result, TRANSPOSE_BLOCK_BYTE, TRANSPOSE_BLOCK_WIDE};

/// Tile edge length for an element type: 120 for 1-byte elements, 60
/// otherwise, so a BLOCK x BLOCK scratch tile fits comfortably in a small
/// fast cache regardless of element width.
#[inline]
pub(crate) fn block_edge<T>() -> usize {
    if std::mem::size_of::<T>() == 1 {
        TRANSPOSE_BLOCK_BYTE
    } else {
        TRANSPOSE_BLOCK_WIDE
    }
}

/// Copy a transposed 2D source into a contiguous destination.
///
/// `src` holds the source matrix column-major with respect to the
/// destination's logical `nr x nc` shape: logical element `(i, j)` lives at
/// `src[i + j * nr]`, and is written to `dest[i * nc + j]`. Both slices must
/// hold exactly `nr * nc` elements.
///
/// The copy is element-exact: no rounding, no casting. Tiles have disjoint
/// read and write footprints, so row bands are processed in parallel when
/// the `parallel` feature is enabled.
pub fn copy_transpose_blocked<T: Copy + Default + Send + Sync>(
    dest: &mut [T],
    src: &[T],
    nr: usize,
    nc: usize,
) -> Result<()> {
    let numel = nr.checked_mul(nc).ok_or(CopyError::OffsetOverflow)?;
    if dest.len() != numel || src.len() != numel {
        return Err(CopyError::ShapeMismatch(
            vec![nr, nc],
            vec![dest.len(), src.len()],
        ));
    }
    if numel == 0 {
        return Ok(());
    }

    let block = block_edge::<T>();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        // Row bands of the destination are disjoint; each band owns its tile.
        dest.par_chunks_mut(block * nc)
            .enumerate()
            .for_each(|(band, dest_band)| {
                let r0 = band * block;
                let rb = dest_band.len() / nc;
                let mut tile = vec![T::default(); block * block];
                for c0 in (0..nc).step_by(block) {
                    let cb = (nc - c0).min(block);
                    transpose_tile(dest_band, src, &mut tile, block, nr, nc, r0, c0, rb, cb);
                }
            });
    }

    #[cfg(not(feature = "parallel"))]
    {
        // One reusable scratch tile per invocation.
        let mut tile = vec![T::default(); block * block];
        for r0 in (0..nr).step_by(block) {
            let rb = (nr - r0).min(block);
            let dest_band = &mut dest[r0 * nc..r0 * nc + rb * nc];
            for c0 in (0..nc).step_by(block) {
                let cb = (nc - c0).min(block);
                transpose_tile(dest_band, src, &mut tile, block, nr, nc, r0, c0, rb, cb);
            }
        }
    }

    Ok(())
}

/// Process one `rb x cb` tile anchored at `(r0, c0)`.
///
/// `dest_band` is the destination rows `r0 .. r0 + rb` as one contiguous
/// slice. Three phases: gather source columns into the scratch tile,
/// transpose the tile in place, scatter tile rows into the destination.
#[allow(clippy::too_many_arguments)]
fn transpose_tile<T: Copy>(
    dest_band: &mut [T],
    src: &[T],
    tile: &mut [T],
    block: usize,
    nr: usize,
    nc: usize,
    r0: usize,
    c0: usize,
    rb: usize,
    cb: usize,
) {
    // 1. Gather: each source column is contiguous (fast dim has stride 1).
    for c in 0..cb {
        let col = r0 + (c0 + c) * nr;
        tile[c * block..c * block + rb].copy_from_slice(&src[col..col + rb]);
    }

    // 2. In-place tile transpose. The asymmetric bound swaps each strictly
    //    below-diagonal pair once and leaves the rectangular remainder
    //    (rb != cb) already in place.
    let rc_max = rb.max(cb);
    let rc_min = rb.min(cb);
    for r in 0..rc_max {
        let end = r.min(rc_min);
        for c in 0..end {
            tile.swap(r + block * c, r * block + c);
        }
    }

    // 3. Scatter: each destination row segment is contiguous (row-major).
    for r in 0..rb {
        let row = r * nc + c0;
        dest_band[row..row + cb].copy_from_slice(&tile[r * block..r * block + cb]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference: dest[i][j] = src[i + j*nr].
    fn naive(src: &[u64], nr: usize, nc: usize) -> Vec<u64> {
        let mut out = vec![0u64; nr * nc];
        for i in 0..nr {
            for j in 0..nc {
                out[i * nc + j] = src[i + j * nr];
            }
        }
        out
    }

    fn check(nr: usize, nc: usize) {
        let src: Vec<u64> = (0..nr * nc).map(|x| x as u64).collect();
        let mut dest = vec![0u64; nr * nc];
        copy_transpose_blocked(&mut dest, &src, nr, nc).unwrap();
        assert_eq!(dest, naive(&src, nr, nc), "nr={nr} nc={nc}");
    }

    #[test]
    fn test_exact_tile_multiple() {
        check(60, 60);
        check(120, 60);
    }

    #[test]
    fn test_partial_edge_tiles() {
        check(130, 70);
        check(61, 59);
        check(1, 200);
        check(200, 1);
    }

    #[test]
    fn test_small_matrices() {
        check(1, 1);
        check(2, 3);
        check(7, 5);
    }

    #[test]
    fn test_byte_block_edge() {
        assert_eq!(block_edge::<u8>(), 120);
        assert_eq!(block_edge::<bool>(), 120);
        assert_eq!(block_edge::<f64>(), 60);
        assert_eq!(block_edge::<i16>(), 60);
    }

    #[test]
    fn test_byte_elements_wide_tile() {
        // 1-byte path uses the 120 tile edge; cross a tile boundary.
        let (nr, nc) = (250, 121);
        let src: Vec<u8> = (0..nr * nc).map(|x| (x % 251) as u8).collect();
        let mut dest = vec![0u8; nr * nc];
        copy_transpose_blocked(&mut dest, &src, nr, nc).unwrap();
        for i in 0..nr {
            for j in 0..nc {
                assert_eq!(dest[i * nc + j], src[i + j * nr]);
            }
        }
    }

    #[test]
    fn test_zero_sized() {
        let mut dest: Vec<f32> = vec![];
        copy_transpose_blocked(&mut dest, &[], 0, 17).unwrap();
        copy_transpose_blocked(&mut dest, &[], 17, 0).unwrap();
    }

    #[test]
    fn test_length_mismatch() {
        let mut dest = vec![0.0f32; 5];
        let src = vec![0.0f32; 6];
        assert!(copy_transpose_blocked(&mut dest, &src, 2, 3).is_err());
    }
}
