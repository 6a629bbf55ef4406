//! Block-sparse matrices over pairs of sites.
//!
//! Blocks are keyed by `(row site, column site, lattice translation of the column site)`.
//! The matrix is symmetric under the exchange of both sites combined with the inversion of
//! the translation, only the canonical block is stored: `row < col`, or `row == col` with a
//! translation that is zero or lexicographically positive.
mod shared;

pub use shared::{SharedBlock, SharedBlocks};

use crate::errors::PpnlError;
use crate::neighbors::NeighborList;
use crate::types::Kind;
use hashbrown::HashMap;
use ndarray::prelude::*;

pub type BlockKey = (usize, usize, [i32; 3]);

pub fn neg_cell(cell: [i32; 3]) -> [i32; 3] {
    [-cell[0], -cell[1], -cell[2]]
}

/// Canonical key of the block (row, col, cell) and whether the stored block is the
/// transpose of the requested one.
pub fn canonical_key(row: usize, col: usize, cell: [i32; 3]) -> (BlockKey, bool) {
    if row < col || (row == col && cell >= [0, 0, 0]) {
        ((row, col, cell), false)
    } else {
        ((col, row, neg_cell(cell)), true)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockSparseMatrix {
    blocks: HashMap<BlockKey, Array2<f64>>,
}

impl BlockSparseMatrix {
    pub fn new() -> Self {
        BlockSparseMatrix {
            blocks: HashMap::new(),
        }
    }

    /// Create the sparsity pattern of a list of site pairs. Every pair whose kinds both carry
    /// a basis gets a zeroed block of the shape `[n_functions(row), n_functions(col)]`.
    pub fn from_neighbor_list(list: &NeighborList, kinds: &[Kind]) -> Result<Self, PpnlError> {
        let mut matrix: Self = Self::new();
        for entry in list.entries() {
            let (ki, kj) = match (kinds.get(entry.ikind), kinds.get(entry.jkind)) {
                (Some(ki), Some(kj)) => (ki, kj),
                _ => {
                    return Err(PpnlError::IndexOutOfRange {
                        context: "kind",
                        index: entry.ikind.max(entry.jkind),
                        len: kinds.len(),
                    })
                }
            };
            if ki.basis().is_none() || kj.basis().is_none() {
                continue;
            }
            let ((row, col, cell), transposed) = canonical_key(entry.iatom, entry.jatom, entry.cell);
            let shape: (usize, usize) = if transposed {
                (kj.n_functions(), ki.n_functions())
            } else {
                (ki.n_functions(), kj.n_functions())
            };
            matrix
                .blocks
                .entry((row, col, cell))
                .or_insert_with(|| Array2::zeros(shape));
        }
        Ok(matrix)
    }

    /// Insert a block. Blocks given in the non canonical orientation are transposed.
    pub fn insert_block(&mut self, row: usize, col: usize, cell: [i32; 3], block: Array2<f64>) {
        let (key, transposed) = canonical_key(row, col, cell);
        let block: Array2<f64> = if transposed {
            block.reversed_axes()
        } else {
            block
        };
        self.blocks.insert(key, block);
    }

    /// The stored block with exactly this key.
    pub fn block(&self, row: usize, col: usize, cell: [i32; 3]) -> Option<&Array2<f64>> {
        self.blocks.get(&(row, col, cell))
    }

    pub fn block_mut(&mut self, row: usize, col: usize, cell: [i32; 3]) -> Option<&mut Array2<f64>> {
        self.blocks.get_mut(&(row, col, cell))
    }

    /// The block (row, col, cell) in the requested orientation, a transposed view of the
    /// stored block if necessary.
    pub fn get(&self, row: usize, col: usize, cell: [i32; 3]) -> Option<ArrayView2<'_, f64>> {
        let (key, transposed) = canonical_key(row, col, cell);
        self.blocks.get(&key).map(|block| {
            if transposed {
                block.t()
            } else {
                block.view()
            }
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &BlockKey> {
        self.blocks.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlockKey, &Array2<f64>)> {
        self.blocks.iter()
    }

    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Set all blocks to zero, keeping the sparsity pattern.
    pub fn zero(&mut self) {
        self.blocks.values_mut().for_each(|block| block.fill(0.0));
    }

    pub fn scale(&mut self, factor: f64) {
        self.blocks.values_mut().for_each(|block| *block *= factor);
    }

    /// `self += factor * other` for all blocks of `self`. Blocks missing in `other` are
    /// treated as zero.
    pub fn add_scaled(&mut self, other: &Self, factor: f64) -> Result<(), PpnlError> {
        for (key, block) in self.blocks.iter_mut() {
            if let Some(other_block) = other.blocks.get(key) {
                if other_block.dim() != block.dim() {
                    return Err(PpnlError::ShapeMismatch {
                        context: "block addition",
                        expected: block.dim(),
                        found: other_block.dim(),
                    });
                }
                block.scaled_add(factor, other_block);
            }
        }
        Ok(())
    }

    /// Sum of the elementwise products of all blocks present in both matrices.
    pub fn dot(&self, other: &Self) -> f64 {
        self.blocks
            .iter()
            .filter_map(|(key, block)| other.blocks.get(key).map(|b| (block * b).sum()))
            .sum()
    }

    /// Frobenius norm of the stored blocks.
    pub fn frobenius_norm(&self) -> f64 {
        self.blocks
            .values()
            .map(|block| block.iter().map(|x| x * x).sum::<f64>())
            .sum::<f64>()
            .sqrt()
    }

    /// View of the matrix that allows the concurrent accumulation into its blocks.
    pub fn shared(&mut self) -> SharedBlocks<'_> {
        SharedBlocks::new(&mut self.blocks)
    }
}
