use super::sap_int::{SapEntry, SapInt, SapIntBuilder};
use crate::errors::PpnlError;
use crate::integrals::{n_derivatives, n_primitive_functions, PrimitiveIntegrals};
use crate::neighbors::{NeighborEntry, NeighborList};
use crate::types::{BasisSet, BridgeKind, Kind, Shell};
use log::trace;
use nalgebra::Vector3;
use ndarray::prelude::*;
use rayon::prelude::*;

/// Basis of the first and projectors of the second site of a pair, `None` if one of the
/// kinds does not take part.
fn pair_data<'k>(
    kinds: &'k [Kind],
    entry: &NeighborEntry,
) -> Result<Option<(&'k BasisSet, &'k dyn BridgeKind)>, PpnlError> {
    let outer: &Kind = kinds.get(entry.ikind).ok_or(PpnlError::IndexOutOfRange {
        context: "kind",
        index: entry.ikind,
        len: kinds.len(),
    })?;
    let bridge: &Kind = kinds.get(entry.jkind).ok_or(PpnlError::IndexOutOfRange {
        context: "kind",
        index: entry.jkind,
        len: kinds.len(),
    })?;
    Ok(outer.basis().zip(bridge.bridge()))
}

/// Integrals between the contracted spherical functions of `basis` and all projectors of
/// `bridge`, located at `r` relative to the basis. The shape is `[nsgf, nproj, nder]`.
/// Shell/block combinations that are out of reach of each other stay zero.
pub fn pair_integrals<E: PrimitiveIntegrals + ?Sized>(
    evaluator: &E,
    basis: &BasisSet,
    bridge: &dyn BridgeKind,
    r: &Vector3<f64>,
    derivatives: bool,
) -> Result<Array3<f64>, PpnlError> {
    let nder: usize = n_derivatives(derivatives);
    let nsgf: usize = basis.n_functions();
    let nproj: usize = bridge.n_projectors();
    let projector_shells: &[Shell] = bridge.projector_shells();
    let dist: f64 = r.norm();
    let mut value: Array3<f64> = Array3::zeros((nsgf, nproj, nder));

    for (shell, offset) in basis.shells.iter().zip(basis.offsets().iter()) {
        let nf_a: usize = shell.n_functions();
        for block in bridge.projector_blocks().iter() {
            if shell.radius + block.radius < dist {
                continue;
            }
            let shells_b: &[Shell] = projector_shells.get(block.shells.clone()).ok_or(
                PpnlError::IndexOutOfRange {
                    context: "projector shell",
                    index: block.shells.end,
                    len: projector_shells.len(),
                },
            )?;
            let primitive: Array3<f64> =
                evaluator.evaluate(std::slice::from_ref(shell), shells_b, r, derivatives);
            let expected: (usize, usize) = (
                shell.n_primitives() * shell.n_cart(),
                n_primitive_functions(shells_b),
            );
            let (np_a, np_b, nd) = primitive.dim();
            if (np_a, np_b) != expected || nd != nder {
                return Err(PpnlError::ShapeMismatch {
                    context: "primitive integrals",
                    expected,
                    found: (np_a, np_b),
                });
            }

            let mut col: usize = block.offset;
            let mut pcol: usize = 0;
            for shell_b in shells_b.iter() {
                let np: usize = shell_b.n_primitives() * shell_b.n_cart();
                let nf_b: usize = shell_b.n_functions();
                if col + nf_b > nproj {
                    return Err(PpnlError::ShapeMismatch {
                        context: "projector block",
                        expected: (nsgf, nproj),
                        found: (nsgf, col + nf_b),
                    });
                }
                for d in 0..nder {
                    let contracted: Array2<f64> = shell
                        .sphi()
                        .dot(&primitive.slice(s![.., pcol..pcol + np, d]))
                        .dot(&shell_b.sphi().t());
                    value
                        .slice_mut(s![*offset..*offset + nf_a, col..col + nf_b, d])
                        .assign(&contracted);
                }
                col += nf_b;
                pcol += np;
            }
        }
    }
    Ok(value)
}

/// Contract every slice of `value` with the coupling matrix along the projector axis.
pub fn couple(value: &Array3<f64>, coupling: ArrayView2<f64>) -> Result<Array3<f64>, PpnlError> {
    let (nsgf, nproj, nder) = value.dim();
    if coupling.dim() != (nproj, nproj) {
        return Err(PpnlError::ShapeMismatch {
            context: "coupling matrix",
            expected: (nproj, nproj),
            found: coupling.dim(),
        });
    }
    let mut coupled: Array3<f64> = Array3::zeros((nsgf, nproj, nder));
    for d in 0..nder {
        coupled
            .slice_mut(s![.., .., d])
            .assign(&value.slice(s![.., .., d]).dot(&coupling));
    }
    Ok(coupled)
}

/// Fill the pair cache from the list of (outer site, bridge site) pairs.
pub fn build_sap_int<E: PrimitiveIntegrals + ?Sized>(
    evaluator: &E,
    kinds: &[Kind],
    sap_list: &NeighborList,
    derivatives: bool,
) -> Result<SapInt, PpnlError> {
    let builder: SapIntBuilder = SapIntBuilder::new(
        sap_list
            .entries()
            .iter()
            .filter(|entry| matches!(pair_data(kinds, entry), Ok(Some(_))))
            .map(|entry| (entry.ikind, entry.jkind, entry.iatom)),
    );

    sap_list.par_iter().try_for_each(|entry| {
        let (basis, bridge) = match pair_data(kinds, entry)? {
            Some(data) => data,
            None => return Ok(()),
        };
        let value: Array3<f64> = pair_integrals(evaluator, basis, bridge, &entry.r, derivatives)?;
        let coupled: Array3<f64> = couple(&value, bridge.coupling_matrix())?;
        trace!(
            "pair cache: outer site {} bridge site {} cell {:?}",
            entry.iatom,
            entry.jatom,
            entry.cell
        );
        builder.store(
            (entry.ikind, entry.jkind),
            entry.iatom,
            entry.inode,
            entry.nnode,
            SapEntry::new(entry.jatom, entry.cell, entry.r, value, coupled),
        )
    })?;

    Ok(builder.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrals::GaussianOverlap;
    use crate::neighbors::build_neighbor_list;
    use crate::types::{ChannelProjectors, FlatProjectors, ProjectorBlock, ProjectorChannel, Site};
    use approx::{assert_abs_diff_eq, AbsDiffEq};

    fn shell(l: usize, alpha: f64) -> Shell {
        Shell::new(l, vec![alpha], vec![1.0]).unwrap()
    }

    /// overlap of two normalized s primitives
    fn s_overlap(alpha: f64, beta: f64, r: f64) -> f64 {
        let p: f64 = alpha + beta;
        (2.0 * (alpha * beta).sqrt() / p).powf(1.5) * (-alpha * beta / p * r * r).exp()
    }

    #[test]
    fn s_functions_give_normalized_overlap() {
        let basis = BasisSet::new(vec![shell(0, 0.8).with_radius(5.0)]);
        let bank = FlatProjectors::new(vec![shell(0, 1.3)], 5.0, array![[2.0]]).unwrap();
        let r: Vector3<f64> = Vector3::new(0.0, 0.6, 0.8);
        let value = pair_integrals(&GaussianOverlap::new(), &basis, &bank, &r, false).unwrap();
        assert_eq!(value.dim(), (1, 1, 1));
        assert_abs_diff_eq!(value[[0, 0, 0]], s_overlap(0.8, 1.3, 1.0), epsilon = 1e-14);
        let coupled = couple(&value, bank.coupling_matrix()).unwrap();
        assert_abs_diff_eq!(coupled[[0, 0, 0]], 2.0 * value[[0, 0, 0]], epsilon = 1e-14);
    }

    #[test]
    fn blocks_out_of_reach_stay_zero() {
        let basis = BasisSet::new(vec![
            shell(0, 0.8).with_radius(1.0),
            shell(1, 0.5).with_radius(3.0),
        ]);
        let bank = FlatProjectors::new(vec![shell(0, 1.3)], 1.5, array![[1.0]]).unwrap();
        let r: Vector3<f64> = Vector3::new(3.0, 0.0, 0.0);
        let value = pair_integrals(&GaussianOverlap::new(), &basis, &bank, &r, true).unwrap();
        assert_eq!(value.dim(), (4, 1, 4));
        assert!(value.slice(s![0..1, .., ..]).iter().all(|x| *x == 0.0));
        assert!(value.slice(s![1..4, .., 0]).iter().any(|x| *x != 0.0));
    }

    #[test]
    fn channel_and_flat_banks_agree() {
        let s_proj: Shell = shell(0, 1.1);
        let p_proj: Shell = shell(1, 0.7);
        let channels = ChannelProjectors::new(vec![
            ProjectorChannel::new(0, 4.0, vec![s_proj.clone()], array![[1.5]]),
            ProjectorChannel::new(1, 4.0, vec![p_proj.clone()], array![[-0.4]]),
        ])
        .unwrap();
        let coupling: Array2<f64> = Array2::from_diag(&array![1.5, -0.4, -0.4, -0.4]);
        let flat = FlatProjectors::new(vec![s_proj, p_proj], 4.0, coupling).unwrap();
        let basis = BasisSet::new(vec![
            Shell::new(0, vec![2.0, 0.5], vec![0.4, 0.7]).unwrap(),
            shell(2, 0.9),
        ]);
        let r: Vector3<f64> = Vector3::new(0.4, -0.9, 0.3);
        let evaluator = GaussianOverlap::new();

        let from_channels = pair_integrals(&evaluator, &basis, &channels, &r, true).unwrap();
        let from_flat = pair_integrals(&evaluator, &basis, &flat, &r, true).unwrap();
        assert!(from_channels.abs_diff_eq(&from_flat, 1e-14));
        let coupled_channels = couple(&from_channels, channels.coupling_matrix()).unwrap();
        let coupled_flat = couple(&from_flat, flat.coupling_matrix()).unwrap();
        assert!(coupled_channels.abs_diff_eq(&coupled_flat, 1e-14));
    }

    struct BrokenBank {
        shells: Vec<Shell>,
        blocks: Vec<ProjectorBlock>,
        coupling: Array2<f64>,
    }

    impl BridgeKind for BrokenBank {
        fn coupling_matrix(&self) -> ArrayView2<'_, f64> {
            self.coupling.view()
        }
        fn projector_shells(&self) -> &[Shell] {
            &self.shells
        }
        fn projector_blocks(&self) -> &[ProjectorBlock] {
            &self.blocks
        }
        fn cutoff_radius(&self) -> f64 {
            2.0
        }
    }

    #[test]
    fn coupling_shape_mismatch_is_fatal() {
        // one p projector (three functions) but only a 2x2 coupling matrix
        let bank = BrokenBank {
            shells: vec![shell(1, 1.0)],
            blocks: vec![ProjectorBlock {
                shells: 0..1,
                offset: 0,
                n_functions: 3,
                radius: 2.0,
            }],
            coupling: Array2::eye(2),
        };
        let basis = BasisSet::new(vec![shell(0, 1.0)]);
        let r: Vector3<f64> = Vector3::new(0.5, 0.0, 0.0);
        let result = pair_integrals(&GaussianOverlap::new(), &basis, &bank, &r, false);
        assert_eq!(
            result.err(),
            Some(PpnlError::ShapeMismatch {
                context: "projector block",
                expected: (1, 2),
                found: (1, 3),
            })
        );
        let value: Array3<f64> = Array3::zeros((1, 3, 1));
        assert!(couple(&value, bank.coupling_matrix()).is_err());
    }

    #[test]
    fn cache_holds_one_record_per_pair() {
        let kinds: Vec<Kind> = vec![
            Kind::new("A").with_basis(BasisSet::new(vec![shell(0, 0.8)])),
            Kind::new("X")
                .with_bridge(FlatProjectors::new(vec![shell(0, 1.0)], 2.0, array![[1.0]]).unwrap()),
        ];
        let sites: Vec<Site> = vec![
            Site::new(0, 0, Vector3::new(0.0, 0.0, 0.0)),
            Site::new(1, 1, Vector3::new(1.5, 0.0, 0.0)),
            Site::new(2, 0, Vector3::new(3.0, 0.0, 0.0)),
            Site::new(3, 1, Vector3::new(20.0, 0.0, 0.0)),
        ];
        let list = build_neighbor_list(
            &sites,
            None,
            |k| kinds[k].basis().map(|b| b.radius()),
            |k| kinds[k].bridge().map(|b| b.cutoff_radius()),
            false,
        );
        let cache = build_sap_int(&GaussianOverlap::new(), &kinds, &list, false).unwrap();
        assert_eq!(cache.n_records(), 2);
        let row = cache.atom(0, 1, 2).unwrap();
        assert_eq!(row.entries.len(), 1);
        assert_eq!(row.entries[0].atom, 1);
        assert_abs_diff_eq!(row.entries[0].r.x, -1.5, epsilon = 1e-14);
        assert!(cache.atom(1, 0, 1).is_none());
    }
}
