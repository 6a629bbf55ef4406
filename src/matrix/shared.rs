use super::{BlockKey, PpnlError};
use hashbrown::HashMap;
use ndarray::prelude::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutable view of the blocks of a [BlockSparseMatrix](super::BlockSparseMatrix) with one lock
/// per block. Workers that contribute to the same block are serialized, all other
/// accumulations proceed in parallel. The sparsity pattern is fixed.
pub struct SharedBlocks<'a> {
    blocks: HashMap<BlockKey, (Mutex<ArrayViewMut2<'a, f64>>, (usize, usize))>,
}

/// Handle to a single block of [SharedBlocks].
pub struct SharedBlock<'s, 'a> {
    lock: &'s Mutex<ArrayViewMut2<'a, f64>>,
    dim: (usize, usize),
}

impl<'a> SharedBlocks<'a> {
    pub(super) fn new(blocks: &'a mut HashMap<BlockKey, Array2<f64>>) -> Self {
        SharedBlocks {
            blocks: blocks
                .iter_mut()
                .map(|(key, block)| {
                    let dim: (usize, usize) = block.dim();
                    (*key, (Mutex::new(block.view_mut()), dim))
                })
                .collect(),
        }
    }

    /// The stored block with exactly this (canonical) key, if it is part of the pattern.
    pub fn get(&self, row: usize, col: usize, cell: [i32; 3]) -> Option<SharedBlock<'_, 'a>> {
        self.blocks
            .get(&(row, col, cell))
            .map(|(lock, dim)| SharedBlock { lock, dim: *dim })
    }
}

fn lock_block<'s, 'a>(lock: &'s Mutex<ArrayViewMut2<'a, f64>>) -> MutexGuard<'s, ArrayViewMut2<'a, f64>> {
    // a panic in another worker is propagated by rayon, the data itself stays usable
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<'s, 'a> SharedBlock<'s, 'a> {
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Accumulate `contribution` into the block.
    pub fn add(&self, contribution: ArrayView2<f64>) -> Result<(), PpnlError> {
        if contribution.dim() != self.dim {
            return Err(PpnlError::ShapeMismatch {
                context: "matrix block",
                expected: self.dim,
                found: contribution.dim(),
            });
        }
        let mut block = lock_block(self.lock);
        *block += &contribution;
        Ok(())
    }
}
