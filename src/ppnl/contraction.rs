use super::sap_int::{SapAtom, SapEntry, SapInt};
use crate::errors::PpnlError;
use crate::forces::ForceAccumulator;
use crate::matrix::{canonical_key, BlockSparseMatrix, SharedBlock, SharedBlocks};
use crate::neighbors::{NeighborEntry, NeighborList};
use crate::types::{Kind, Site};
use log::trace;
use nalgebra::{Matrix3, Vector3};
use ndarray::prelude::*;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters of the contraction. They are updated concurrently by all workers.
#[derive(Debug, Default)]
pub struct ContractionCounters {
    pub n_pairs: AtomicUsize,
    pub n_triples: AtomicUsize,
    pub n_screened: AtomicUsize,
    pub n_missing_blocks: AtomicUsize,
}

impl ContractionCounters {
    fn add(counter: &AtomicUsize, n: usize) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }
}

/// Inputs of the force part of the contraction.
pub struct ForceInput<'a> {
    /// Total density matrix with the sparsity pattern of the pair list
    pub density: &'a BlockSparseMatrix,
    pub forces: &'a ForceAccumulator,
    pub use_virial: bool,
}

/// Read only data shared by all workers.
pub struct Contraction<'a> {
    pub sites: &'a [Site],
    pub kinds: &'a [Kind],
    pub sap_int: &'a SapInt,
    /// Kinds that carry projectors
    pub bridge_kinds: Vec<usize>,
    pub eps_ppnl: f64,
    pub force_input: Option<ForceInput<'a>>,
}

/// Symmetry factor of a pair: blocks of a site with itself in the home cell are stored once,
/// all other pairs stand for both orientations.
pub fn symmetry_factor(iatom: usize, jatom: usize, cell: [i32; 3]) -> f64 {
    if iatom == jatom && cell == [0, 0, 0] {
        1.0
    } else {
        2.0
    }
}

fn sub_cell(a: [i32; 3], b: [i32; 3]) -> [i32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn slice(tensor: &Array3<f64>, d: usize) -> ArrayView2<'_, f64> {
    tensor.index_axis(Axis(2), d)
}

/// Gradient contributions of a single matched triple.
struct TripleGradient {
    f_a: Vector3<f64>,
    f_b: Vector3<f64>,
}

/// `f_a[d] = sum P * (dvalue_d(a) coupled(b)^T)`, `f_b[d] = sum P * (coupled(a) dvalue_d(b)^T)`
fn triple_gradient(
    a: &SapEntry,
    b: &SapEntry,
    density: ArrayView2<f64>,
) -> Result<TripleGradient, PpnlError> {
    if a.nder() < 4 || b.nder() < 4 {
        return Err(PpnlError::ShapeMismatch {
            context: "derivative slices",
            expected: (4, 4),
            found: (a.nder(), b.nder()),
        });
    }
    let coupled_a: ArrayView2<f64> = slice(&a.coupled, 0);
    let coupled_b: ArrayView2<f64> = slice(&b.coupled, 0);
    let mut f_a: Vector3<f64> = Vector3::zeros();
    let mut f_b: Vector3<f64> = Vector3::zeros();
    for d in 0..3 {
        f_a[d] = (&density * &slice(&a.value, d + 1).dot(&coupled_b.t())).sum();
        f_b[d] = (&density * &coupled_a.dot(&slice(&b.value, d + 1).t())).sum();
    }
    Ok(TripleGradient { f_a, f_b })
}

impl<'a> Contraction<'a> {
    fn screened(&self, a: &SapEntry, b: &SapEntry) -> bool {
        let bound: f64 = if self.force_input.is_some() {
            (a.max_coupled * b.max_value).max(a.max_value * b.max_coupled)
        } else {
            a.max_coupled * b.max_value
        };
        bound < self.eps_ppnl
    }

    fn row_screened(&self, row_i: &SapAtom, row_j: &SapAtom) -> bool {
        let bound: f64 =
            (row_i.max_coupled * row_j.max_value).max(row_i.max_value * row_j.max_coupled);
        bound < self.eps_ppnl
    }

    /// Contributions of all bridge sites shared by the pair, in the orientation (i, j).
    fn contract_pair(
        &self,
        entry: &NeighborEntry,
        counters: &ContractionCounters,
    ) -> Result<Option<Array2<f64>>, PpnlError> {
        let ni: usize = match self.kinds[entry.ikind].basis() {
            Some(basis) => basis.n_functions(),
            None => return Ok(None),
        };
        let nj: usize = match self.kinds[entry.jkind].basis() {
            Some(basis) => basis.n_functions(),
            None => return Ok(None),
        };
        let f0: f64 = symmetry_factor(entry.iatom, entry.jatom, entry.cell);

        let density: Option<ArrayView2<f64>> = match &self.force_input {
            Some(input) => input.density.get(entry.iatom, entry.jatom, entry.cell),
            None => None,
        };
        if let Some(p) = density.as_ref() {
            if p.dim() != (ni, nj) {
                return Err(PpnlError::ShapeMismatch {
                    context: "density block",
                    expected: (ni, nj),
                    found: p.dim(),
                });
            }
        }

        let mut block: Array2<f64> = Array2::zeros((ni, nj));
        let mut force_i: Vector3<f64> = Vector3::zeros();
        let mut force_j: Vector3<f64> = Vector3::zeros();
        let mut virial: Matrix3<f64> = Matrix3::zeros();
        let mut n_triples: usize = 0;
        let mut n_screened: usize = 0;

        for kkind in self.bridge_kinds.iter() {
            let (row_i, row_j) = match (
                self.sap_int.atom(entry.ikind, *kkind, entry.iatom),
                self.sap_int.atom(entry.jkind, *kkind, entry.jatom),
            ) {
                (Some(row_i), Some(row_j)) => (row_i, row_j),
                _ => continue,
            };
            if self.row_screened(row_i, row_j) {
                n_screened += row_i.entries.len();
                continue;
            }
            for a in row_i.entries.iter() {
                // the same bridge site seen from the image of j
                let b: &SapEntry = match row_j.find(a.atom, sub_cell(a.cell, entry.cell)) {
                    Some(b) => b,
                    None => continue,
                };
                if self.screened(a, b) {
                    n_screened += 1;
                    continue;
                }
                n_triples += 1;
                let coupled_a: ArrayView2<f64> = slice(&a.coupled, 0);
                let value_b: ArrayView2<f64> = slice(&b.value, 0);
                if coupled_a.ncols() != value_b.ncols()
                    || (coupled_a.nrows(), value_b.nrows()) != (ni, nj)
                {
                    return Err(PpnlError::ShapeMismatch {
                        context: "cached integrals",
                        expected: (ni, nj),
                        found: (coupled_a.nrows(), value_b.nrows()),
                    });
                }
                block += &coupled_a.dot(&value_b.t());

                if let (Some(input), Some(p)) = (self.force_input.as_ref(), density.as_ref()) {
                    let gradient: TripleGradient = triple_gradient(a, b, p.view())?;
                    let f_a: Vector3<f64> = gradient.f_a * f0;
                    let f_b: Vector3<f64> = gradient.f_b * f0;
                    force_i += f_a;
                    force_j += f_b;
                    input.forces.add_force(a.atom, &(-(f_a + f_b)))?;
                    if input.use_virial {
                        virial += f_a * a.r.transpose() + f_b * b.r.transpose();
                    }
                }
            }
        }

        ContractionCounters::add(&counters.n_triples, n_triples);
        ContractionCounters::add(&counters.n_screened, n_screened);
        if let Some(input) = self.force_input.as_ref() {
            if density.is_some() && n_triples > 0 {
                input.forces.add_force(entry.iatom, &force_i)?;
                input.forces.add_force(entry.jatom, &force_j)?;
                if input.use_virial {
                    input.forces.add_virial(&virial);
                }
            }
        }
        Ok(if n_triples > 0 { Some(block) } else { None })
    }

    fn scatter(
        &self,
        entry: &NeighborEntry,
        shared: &SharedBlocks,
        counters: &ContractionCounters,
    ) -> Result<(), PpnlError> {
        let ((row, col, cell), transposed) = canonical_key(entry.iatom, entry.jatom, entry.cell);
        let target: SharedBlock = match shared.get(row, col, cell) {
            Some(target) => target,
            None => {
                ContractionCounters::add(&counters.n_missing_blocks, 1);
                trace!(
                    "no block ({}, {}, {:?}) in the sparsity pattern",
                    row,
                    col,
                    cell
                );
                return Ok(());
            }
        };
        ContractionCounters::add(&counters.n_pairs, 1);
        if let Some(block) = self.contract_pair(entry, counters)? {
            if transposed {
                target.add(block.t())?;
            } else {
                target.add(block.view())?;
            }
        }
        Ok(())
    }

    /// Contract the cached integrals of all pairs in `orb_list` and add the result to the
    /// blocks of `shared`.
    pub fn run(
        &self,
        orb_list: &NeighborList,
        shared: &SharedBlocks,
        counters: &ContractionCounters,
    ) -> Result<(), PpnlError> {
        orb_list.par_iter().try_for_each(|entry| {
            for (kind, atom) in [(entry.ikind, entry.iatom), (entry.jkind, entry.jatom)].iter() {
                if *kind >= self.kinds.len() {
                    return Err(PpnlError::IndexOutOfRange {
                        context: "kind",
                        index: *kind,
                        len: self.kinds.len(),
                    });
                }
                if *atom >= self.sites.len() {
                    return Err(PpnlError::IndexOutOfRange {
                        context: "site",
                        index: *atom,
                        len: self.sites.len(),
                    });
                }
            }
            self.scatter(entry, shared, counters)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn record(atom: usize, cell: [i32; 3], r: Vector3<f64>, value: Array3<f64>) -> SapEntry {
        let coupled: Array3<f64> = &value * 3.0;
        SapEntry::new(atom, cell, r, value, coupled)
    }

    #[test]
    fn symmetry_factor_of_self_blocks() {
        assert_eq!(symmetry_factor(2, 2, [0, 0, 0]), 1.0);
        assert_eq!(symmetry_factor(2, 2, [0, 1, 0]), 2.0);
        assert_eq!(symmetry_factor(1, 2, [0, 0, 0]), 2.0);
    }

    #[test]
    fn image_matching_uses_cell_difference() {
        assert_eq!(sub_cell([1, 0, -1], [1, 1, 0]), [0, -1, -1]);
    }

    #[test]
    fn gradient_of_a_triple() {
        let value_a: Array3<f64> =
            Array3::from_shape_fn((2, 1, 4), |(i, _, d)| 1.0 + i as f64 + 0.5 * d as f64);
        let value_b: Array3<f64> = Array3::from_shape_fn((1, 1, 4), |(_, _, d)| 2.0 - d as f64);
        let a = record(5, [0; 3], Vector3::new(1.0, 0.0, 0.0), value_a);
        let b = record(5, [0; 3], Vector3::new(-1.0, 0.0, 0.0), value_b);
        let density: Array2<f64> = array![[1.0], [-2.0]];
        let gradient = triple_gradient(&a, &b, density.view()).unwrap();
        for d in 0..3 {
            // coupled(b) = 3 * 2, dvalue_d(a) = [1.5 + 0.5 d, 2.5 + 0.5 d]
            let f_a: f64 = 6.0 * ((1.5 + 0.5 * d as f64) - 2.0 * (2.5 + 0.5 * d as f64));
            assert_abs_diff_eq!(gradient.f_a[d], f_a, epsilon = 1e-12);
            // coupled(a) = [3, 6], dvalue_d(b) = 1 - d
            let f_b: f64 = (3.0 - 12.0) * (1.0 - d as f64);
            assert_abs_diff_eq!(gradient.f_b[d], f_b, epsilon = 1e-12);
        }
    }

    #[test]
    fn gradient_needs_derivatives() {
        let a = record(0, [0; 3], Vector3::zeros(), Array3::ones((1, 1, 1)));
        let result = triple_gradient(&a, &a, Array2::ones((1, 1)).view());
        assert!(matches!(
            result,
            Err(PpnlError::ShapeMismatch {
                context: "derivative slices",
                ..
            })
        ));
    }
}
