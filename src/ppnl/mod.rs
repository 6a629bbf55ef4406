//! Three-center contribution of nonlocal projectors to a block-sparse operator
//!
//! `H_ij += sum_k <i|p_k> h_k <p_k|j>`
//!
//! The integrals of every outer site with the projectors of every bridge site in reach are
//! computed once and cached ([sap_int]). Afterwards every pair of outer sites contracts the
//! cached integrals of all bridge sites they share ([contraction]). Both steps run in parallel
//! on a dedicated worker pool.
pub mod contraction;
pub mod sap_int;
pub mod spin;
mod transform;

pub use contraction::symmetry_factor;
pub use transform::{build_sap_int, couple, pair_integrals};

use crate::errors::PpnlError;
use crate::forces::ForceAccumulator;
use crate::integrals::PrimitiveIntegrals;
use crate::io::{write_header, Configuration};
use crate::matrix::BlockSparseMatrix;
use crate::neighbors::{build_neighbor_list, Cell, NeighborList};
use crate::types::{Kind, Site};
use crate::utils::Timer;
use contraction::{Contraction, ContractionCounters, ForceInput};
use log::{debug, info, log_enabled, Level};
use sap_int::SapInt;
use std::fmt;
use std::sync::atomic::Ordering;

/// Summary of a projector build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PpnlReport {
    /// Number of cached (outer site, bridge site) integral records
    pub n_records: usize,
    /// Number of outer site pairs that were contracted
    pub n_pairs: usize,
    /// Number of contracted (outer, outer, bridge) triples
    pub n_triples: usize,
    /// Number of triples skipped by the screening
    pub n_screened: usize,
    /// Number of pairs without a block in the sparsity pattern
    pub n_missing_blocks: usize,
    /// Wall time in seconds
    pub wall_time: f64,
}

impl fmt::Display for PpnlReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{: <35} {:>12}", "cached integral records:", self.n_records)?;
        writeln!(f, "{: <35} {:>12}", "contracted site pairs:", self.n_pairs)?;
        writeln!(f, "{: <35} {:>12}", "contracted triples:", self.n_triples)?;
        writeln!(f, "{: <35} {:>12}", "screened triples:", self.n_screened)?;
        write!(
            f,
            "{: <35} {:>12}",
            "pairs outside of the pattern:", self.n_missing_blocks
        )
    }
}

/// Radius of the basis of a kind, `None` for kinds without basis.
pub fn orbital_radius(kinds: &[Kind]) -> impl Fn(usize) -> Option<f64> + Sync + '_ {
    move |kind| {
        kinds
            .get(kind)
            .and_then(|k| k.basis())
            .map(|basis| basis.radius())
    }
}

/// Cutoff radius of the projectors of a kind, `None` for kinds without projectors.
pub fn projector_radius(kinds: &[Kind]) -> impl Fn(usize) -> Option<f64> + Sync + '_ {
    move |kind| {
        kinds
            .get(kind)
            .and_then(|k| k.bridge())
            .map(|bridge| bridge.cutoff_radius())
    }
}

/// Full list of (outer site, bridge site) pairs within the sum of the basis radius and the
/// projector radius.
pub fn sap_neighbor_list(sites: &[Site], kinds: &[Kind], cell: Option<&Cell>) -> NeighborList {
    build_neighbor_list(
        sites,
        cell,
        orbital_radius(kinds),
        projector_radius(kinds),
        false,
    )
}

/// Half list of all pairs of outer sites that can share a bridge site. Two outer sites
/// interact if both reach the same projector, so the basis radii are extended by the largest
/// projector radius.
pub fn orb_neighbor_list(sites: &[Site], kinds: &[Kind], cell: Option<&Cell>) -> NeighborList {
    let max_projector: f64 = kinds
        .iter()
        .filter_map(|kind| kind.bridge())
        .map(|bridge| bridge.cutoff_radius())
        .fold(0.0, f64::max);
    let radius = orbital_radius(kinds);
    let extended = |kind: usize| radius(kind).map(|r| r + max_projector);
    build_neighbor_list(sites, cell, &extended, &extended, true)
}

/// Projector energy `sum_blocks f0 <P_ij, H_ij>` of a density matrix and the projector
/// contribution. The forces of [build_core_ppnl] are the gradient of this energy.
pub fn ppnl_energy(h: &BlockSparseMatrix, p: &BlockSparseMatrix) -> f64 {
    h.iter()
        .filter_map(|((row, col, cell), block)| {
            p.block(*row, *col, *cell)
                .map(|p_block| symmetry_factor(*row, *col, *cell) * (block * p_block).sum())
        })
        .sum()
}

fn check_forces<'a>(
    density: Option<&'a [BlockSparseMatrix]>,
    forces: Option<&'a ForceAccumulator>,
    n_sites: usize,
) -> Result<(&'a BlockSparseMatrix, &'a ForceAccumulator), PpnlError> {
    let density: &[BlockSparseMatrix] = density.ok_or_else(|| {
        PpnlError::InvalidParameter(String::from("forces requested without a density matrix"))
    })?;
    let forces: &ForceAccumulator = forces.ok_or_else(|| {
        PpnlError::InvalidParameter(String::from("forces requested without an accumulator"))
    })?;
    if forces.n_sites() < n_sites {
        return Err(PpnlError::IndexOutOfRange {
            context: "force accumulator",
            index: n_sites - 1,
            len: forces.n_sites(),
        });
    }
    let total: &BlockSparseMatrix = density.first().ok_or_else(|| {
        PpnlError::InvalidParameter(String::from("density matrix without spin channels"))
    })?;
    Ok((total, forces))
}

/// Add the contribution of the nonlocal projectors to `matrix_h`.
///
/// `sap_list` holds the pairs (outer site, bridge site), `orb_list` the half list of outer
/// site pairs, its blocks have to be present in `matrix_h`. If forces or the virial are
/// requested in `config`, the gradient with respect to the site positions is accumulated into
/// `forces`, contracted with the total density. A density with two spin channels is
/// transformed into total and difference density for the duration of the call.
#[allow(clippy::too_many_arguments)]
pub fn build_core_ppnl<E: PrimitiveIntegrals + ?Sized>(
    matrix_h: &mut BlockSparseMatrix,
    density: Option<&mut [BlockSparseMatrix]>,
    forces: Option<&ForceAccumulator>,
    sites: &[Site],
    kinds: &[Kind],
    sap_list: &NeighborList,
    orb_list: &NeighborList,
    evaluator: &E,
    config: &Configuration,
) -> Result<PpnlReport, PpnlError> {
    let timer: Timer = Timer::start();
    let bridge_kinds: Vec<usize> = kinds
        .iter()
        .enumerate()
        .filter_map(|(idx, kind)| kind.bridge().map(|_| idx))
        .collect();
    if bridge_kinds.is_empty() {
        debug!("no kind carries projectors, nothing to do");
        return Ok(PpnlReport::default());
    }
    if !orb_list.is_symmetric() {
        return Err(PpnlError::InvalidParameter(String::from(
            "the list of outer site pairs has to be a half list",
        )));
    }
    if sap_list.is_symmetric() {
        return Err(PpnlError::InvalidParameter(String::from(
            "the list of outer and bridge site pairs has to be a full list",
        )));
    }

    let settings = config.ppnl;
    let derivatives: bool = settings.calculate_forces || settings.use_virial;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.n_threads)
        .build()
        .map_err(|err| PpnlError::ThreadPool(err.to_string()))?;

    if config.verbose >= 2 {
        write_header();
    }
    if config.verbose >= 1 {
        info!("{:^80}", "");
        info!("{:^80}", "Nonlocal projector contribution");
        info!("{:-^80}", "");
        info!("{: <35} {:>12}", "worker threads:", pool.current_num_threads());
        info!("{: <35} {:>12.2e}", "screening threshold:", settings.eps_ppnl);
        info!("{: <35} {:>12}", "bridge kinds:", bridge_kinds.len());
        info!("{: <35} {:>12}", "forces:", derivatives);
    }

    // only the force part reads the density
    let mut density = if derivatives { density } else { None };
    let spin_resolved: bool = density.as_deref().map_or(false, |d| d.len() == 2);
    if spin_resolved {
        if let Some(channels) = density.as_deref_mut() {
            spin::decombine(channels)?;
        }
    }

    let counters: ContractionCounters = ContractionCounters::default();
    let result: Result<usize, PpnlError> = pool.install(|| {
        let force_input: Option<ForceInput> = if derivatives {
            let (total, forces) = check_forces(density.as_deref(), forces, sites.len())?;
            Some(ForceInput {
                density: total,
                forces,
                use_virial: settings.use_virial,
            })
        } else {
            None
        };

        let sap_int: SapInt = build_sap_int(evaluator, kinds, sap_list, derivatives)?;
        debug!(
            "pair cache with {} records in {} rows",
            sap_int.n_records(),
            sap_int.n_rows()
        );

        let contraction: Contraction = Contraction {
            sites,
            kinds,
            sap_int: &sap_int,
            bridge_kinds,
            eps_ppnl: settings.eps_ppnl,
            force_input,
        };
        let shared = matrix_h.shared();
        contraction.run(orb_list, &shared, &counters)?;
        Ok(sap_int.n_records())
    });

    // the caller always gets the spin channels back, also if the build failed
    if spin_resolved {
        if let Some(channels) = density.as_deref_mut() {
            let restored: Result<(), PpnlError> = spin::recombine(channels);
            if result.is_ok() {
                restored?;
            }
        }
    }
    let n_records: usize = result?;

    let report: PpnlReport = PpnlReport {
        n_records,
        n_pairs: counters.n_pairs.load(Ordering::Relaxed),
        n_triples: counters.n_triples.load(Ordering::Relaxed),
        n_screened: counters.n_screened.load(Ordering::Relaxed),
        n_missing_blocks: counters.n_missing_blocks.load(Ordering::Relaxed),
        wall_time: timer.elapsed_secs(),
    };
    if config.verbose >= 1 || log_enabled!(Level::Debug) {
        for line in report.to_string().lines() {
            info!("{}", line);
        }
        info!("{:-^80}", "");
        info!("{}", timer);
        info!("{:^80}", "");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrals::GaussianOverlap;
    use crate::types::{BasisSet, FlatProjectors, Shell};
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;
    use ndarray::prelude::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn kinds() -> Vec<Kind> {
        let shell: Shell = Shell::new(0, vec![0.6], vec![1.0]).unwrap().with_radius(2.0);
        let projector: Shell = Shell::new(0, vec![1.0], vec![1.0]).unwrap();
        vec![
            Kind::new("A").with_basis(BasisSet::new(vec![shell])),
            Kind::new("X")
                .with_bridge(FlatProjectors::new(vec![projector], 1.6, array![[2.0]]).unwrap()),
            Kind::new("B"),
        ]
    }

    #[test]
    fn radius_helpers() {
        let kinds: Vec<Kind> = kinds();
        assert_eq!(orbital_radius(&kinds)(0), Some(2.0));
        assert_eq!(orbital_radius(&kinds)(1), None);
        assert_eq!(projector_radius(&kinds)(1), Some(1.6));
        assert_eq!(projector_radius(&kinds)(2), None);
        assert_eq!(projector_radius(&kinds)(7), None);
    }

    #[test]
    fn outer_pairs_reach_over_a_bridge() {
        let kinds: Vec<Kind> = kinds();
        // 6.5 apart, further than the two basis radii but both reach the bridge
        let sites: Vec<Site> = vec![
            Site::new(0, 0, Vector3::new(0.0, 0.0, 0.0)),
            Site::new(1, 1, Vector3::new(3.25, 0.0, 0.0)),
            Site::new(2, 0, Vector3::new(6.5, 0.0, 0.0)),
        ];
        let orb_list = orb_neighbor_list(&sites, &kinds, None);
        assert!(orb_list
            .entries()
            .iter()
            .any(|entry| entry.iatom == 0 && entry.jatom == 2));
        let sap_list = sap_neighbor_list(&sites, &kinds, None);
        assert_eq!(sap_list.len(), 2);
    }

    #[test]
    fn nothing_to_do_without_projectors() {
        init();
        let kinds: Vec<Kind> = vec![Kind::new("A").with_basis(BasisSet::new(vec![
            Shell::new(0, vec![1.0], vec![1.0]).unwrap(),
        ]))];
        let sites: Vec<Site> = vec![Site::new(0, 0, Vector3::zeros())];
        let orb_list = orb_neighbor_list(&sites, &kinds, None);
        let mut h = BlockSparseMatrix::from_neighbor_list(&orb_list, &kinds).unwrap();
        let report = build_core_ppnl(
            &mut h,
            None,
            None,
            &sites,
            &kinds,
            &sap_neighbor_list(&sites, &kinds, None),
            &orb_list,
            &GaussianOverlap::new(),
            &Configuration::default(),
        )
        .unwrap();
        assert_eq!(report, PpnlReport::default());
        assert_eq!(h.frobenius_norm(), 0.0);
    }

    #[test]
    fn forces_need_a_density() {
        init();
        let kinds: Vec<Kind> = kinds();
        let sites: Vec<Site> = vec![
            Site::new(0, 0, Vector3::new(0.0, 0.0, 0.0)),
            Site::new(1, 1, Vector3::new(1.0, 0.0, 0.0)),
        ];
        let orb_list = orb_neighbor_list(&sites, &kinds, None);
        let mut h = BlockSparseMatrix::from_neighbor_list(&orb_list, &kinds).unwrap();
        let mut config = Configuration::default();
        config.ppnl.calculate_forces = true;
        let forces = ForceAccumulator::new(2);
        let result = build_core_ppnl(
            &mut h,
            None,
            Some(&forces),
            &sites,
            &kinds,
            &sap_neighbor_list(&sites, &kinds, None),
            &orb_list,
            &GaussianOverlap::new(),
            &config,
        );
        assert!(matches!(result, Err(PpnlError::InvalidParameter(_))));
    }

    #[test]
    fn bridge_pairs_need_a_full_list() {
        init();
        let kinds: Vec<Kind> = kinds();
        // the bridge has the lowest index, a half list drops all of its pairs
        let sites: Vec<Site> = vec![
            Site::new(0, 1, Vector3::new(1.5, 0.0, 0.0)),
            Site::new(1, 0, Vector3::new(0.0, 0.0, 0.0)),
            Site::new(2, 0, Vector3::new(3.0, 0.0, 0.0)),
        ];
        let orb_list = orb_neighbor_list(&sites, &kinds, None);
        let half_sap_list = build_neighbor_list(
            &sites,
            None,
            orbital_radius(&kinds),
            projector_radius(&kinds),
            true,
        );
        let mut h = BlockSparseMatrix::from_neighbor_list(&orb_list, &kinds).unwrap();
        let result = build_core_ppnl(
            &mut h,
            None,
            None,
            &sites,
            &kinds,
            &half_sap_list,
            &orb_list,
            &GaussianOverlap::new(),
            &Configuration::default(),
        );
        assert!(matches!(result, Err(PpnlError::InvalidParameter(_))));

        let report = build_core_ppnl(
            &mut h,
            None,
            None,
            &sites,
            &kinds,
            &sap_neighbor_list(&sites, &kinds, None),
            &orb_list,
            &GaussianOverlap::new(),
            &Configuration::default(),
        )
        .unwrap();
        assert_eq!(report.n_records, 2);
        assert!(h.get(1, 1, [0, 0, 0]).unwrap()[[0, 0]] > 0.0);
    }

    #[test]
    fn energy_counts_off_diagonal_blocks_twice() {
        let mut h = BlockSparseMatrix::new();
        h.insert_block(0, 0, [0, 0, 0], array![[1.0]]);
        h.insert_block(0, 1, [0, 0, 0], array![[2.0]]);
        h.insert_block(0, 0, [1, 0, 0], array![[3.0]]);
        let mut p = BlockSparseMatrix::new();
        p.insert_block(0, 0, [0, 0, 0], array![[0.5]]);
        p.insert_block(0, 1, [0, 0, 0], array![[0.25]]);
        assert_abs_diff_eq!(ppnl_energy(&h, &p), 0.5 + 2.0 * 0.5, epsilon = 1e-14);
    }
}
