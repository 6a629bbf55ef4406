#![allow(dead_code)]
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use ppnl::integrals::GaussianOverlap;
use ppnl::matrix::BlockKey;
use ppnl::neighbors::{Cell, NeighborList};
use ppnl::ppnl::{orb_neighbor_list, sap_neighbor_list};
use ppnl::types::{
    sites_from_positions, BasisSet, ChannelProjectors, FlatProjectors, Kind, ProjectorChannel,
    Shell, Site,
};
use ppnl::{build_core_ppnl, BlockSparseMatrix, Configuration, ForceAccumulator, PpnlError, PpnlReport};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn shell(l: usize, alpha: f64, radius: f64) -> Shell {
    Shell::new(l, vec![alpha], vec![1.0]).unwrap().with_radius(radius)
}

pub fn config(forces: bool, virial: bool, n_threads: usize, eps_ppnl: f64) -> Configuration {
    let mut config: Configuration = Configuration::default();
    config.ppnl.calculate_forces = forces;
    config.ppnl.use_virial = virial;
    config.ppnl.n_threads = n_threads;
    config.ppnl.eps_ppnl = eps_ppnl;
    config
}

/// outer kind with an s and a p shell
pub fn kind_a() -> Kind {
    let s: Shell = Shell::new(0, vec![2.5, 0.9], vec![0.3, 0.8])
        .unwrap()
        .with_radius(6.0);
    Kind::new("A").with_basis(BasisSet::new(vec![s, shell(1, 0.7, 6.0)]))
}

/// outer kind with an s and a d shell
pub fn kind_b() -> Kind {
    Kind::new("B").with_basis(BasisSet::new(vec![shell(0, 1.2, 6.0), shell(2, 0.8, 6.0)]))
}

pub fn flat_bank() -> FlatProjectors {
    let coupling: Array2<f64> = array![
        [1.0, 0.2, 0.0, 0.1],
        [0.2, -0.5, 0.05, 0.0],
        [0.0, 0.05, -0.5, 0.0],
        [0.1, 0.0, 0.0, -0.5]
    ];
    FlatProjectors::new(vec![shell(0, 1.1, 4.0), shell(1, 0.6, 4.0)], 4.0, coupling).unwrap()
}

pub fn channel_bank() -> ChannelProjectors {
    ChannelProjectors::new(vec![
        ProjectorChannel::new(
            0,
            3.5,
            vec![shell(0, 1.5, 3.5), shell(0, 0.4, 3.5)],
            array![[0.8, 0.3], [0.3, -0.2]],
        ),
        ProjectorChannel::new(1, 3.0, vec![shell(1, 0.9, 3.0)], array![[-0.6]]),
    ])
    .unwrap()
}

/// Kinds: 0 = A, 1 = B, 2 = X (flat projectors), 3 = Y (channel projectors)
pub fn kinds() -> Vec<Kind> {
    vec![
        kind_a(),
        kind_b(),
        Kind::new("X").with_bridge(flat_bank()),
        Kind::new("Y").with_bridge(channel_bank()),
    ]
}

/// Compact cluster of three outer and two bridge sites, all sites interact with each other.
pub fn cluster() -> (Vec<usize>, Array1<f64>) {
    let kinds: Vec<usize> = vec![0, 1, 0, 2, 3];
    let positions: Array1<f64> = array![
        0.0, 0.0, 0.0, //
        2.1, 0.3, -0.4, //
        0.5, 2.2, 0.6, //
        1.0, 0.8, 0.1, //
        -0.7, 1.1, 1.3
    ];
    (kinds, positions)
}

pub fn sites(kinds: &[usize], positions: ArrayView1<f64>) -> Vec<Site> {
    let xyz: Array2<f64> = positions.to_owned().into_shape((kinds.len(), 3)).unwrap();
    sites_from_positions(kinds, xyz.view(), None)
}

pub struct System {
    pub sites: Vec<Site>,
    pub kinds: Vec<Kind>,
    pub cell: Option<Cell>,
    pub sap_list: NeighborList,
    pub orb_list: NeighborList,
}

impl System {
    pub fn new(sites: Vec<Site>, kinds: Vec<Kind>, cell: Option<Cell>) -> Self {
        let sap_list: NeighborList = sap_neighbor_list(&sites, &kinds, cell.as_ref());
        let orb_list: NeighborList = orb_neighbor_list(&sites, &kinds, cell.as_ref());
        System {
            sites,
            kinds,
            cell,
            sap_list,
            orb_list,
        }
    }

    /// Zeroed matrix with the sparsity pattern of the outer site pairs
    pub fn pattern(&self) -> BlockSparseMatrix {
        BlockSparseMatrix::from_neighbor_list(&self.orb_list, &self.kinds).unwrap()
    }

    pub fn build(
        &self,
        density: Option<&mut [BlockSparseMatrix]>,
        forces: Option<&ForceAccumulator>,
        config: &Configuration,
    ) -> Result<(BlockSparseMatrix, PpnlReport), PpnlError> {
        let mut h: BlockSparseMatrix = self.pattern();
        let report: PpnlReport = build_core_ppnl(
            &mut h,
            density,
            forces,
            &self.sites,
            &self.kinds,
            &self.sap_list,
            &self.orb_list,
            &GaussianOverlap::new(),
            config,
        )?;
        Ok((h, report))
    }
}

/// Density matrix with random blocks in the sparsity pattern of `system`.
pub fn random_density(system: &System, seed: u64) -> BlockSparseMatrix {
    let mut rng: StdRng = StdRng::seed_from_u64(seed);
    let mut density: BlockSparseMatrix = system.pattern();
    let mut keys: Vec<BlockKey> = density.keys().cloned().collect();
    keys.sort();
    for (row, col, cell) in keys {
        if let Some(block) = density.block_mut(row, col, cell) {
            let dim: (usize, usize) = block.dim();
            *block = Array2::random_using(dim, Uniform::new(-1.0, 1.0), &mut rng);
        }
    }
    density
}

pub fn relative_difference(a: &BlockSparseMatrix, b: &BlockSparseMatrix) -> f64 {
    let mut difference: BlockSparseMatrix = a.clone();
    difference.add_scaled(b, -1.0).unwrap();
    difference.frobenius_norm() / a.frobenius_norm()
}
