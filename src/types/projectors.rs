use super::shell::Shell;
use crate::defaults::SYMMETRY_TOLERANCE;
use crate::errors::PpnlError;
use ndarray::prelude::*;
use std::ops::Range;

/// A group of projector shells that share one radius and are evaluated together.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectorBlock {
    /// Indices into [BridgeKind::projector_shells]
    pub shells: Range<usize>,
    /// Index of the first projector function of this block
    pub offset: usize,
    /// Number of projector functions of this block
    pub n_functions: usize,
    /// Radial extent used in the radius check of the pair list
    pub radius: f64,
}

/// The projector bank of a bridge site together with its coupling matrix.
///
/// The pair cache and the contraction only use this interface, the two kinds of
/// projector banks ([ChannelProjectors] and [FlatProjectors]) are indistinguishable
/// for them.
pub trait BridgeKind: Send + Sync {
    /// Symmetric matrix that couples the projector functions, shape `[nproj, nproj]`.
    fn coupling_matrix(&self) -> ArrayView2<'_, f64>;
    /// All projector shells in the order of the projector functions.
    fn projector_shells(&self) -> &[Shell];
    /// Groups of shells that are evaluated together.
    fn projector_blocks(&self) -> &[ProjectorBlock];
    /// Largest radius of all projectors.
    fn cutoff_radius(&self) -> f64;

    fn n_projectors(&self) -> usize {
        self.coupling_matrix().nrows()
    }
}

fn check_coupling(coupling: ArrayView2<f64>, n_functions: usize) -> Result<(), PpnlError> {
    if coupling.dim() != (n_functions, n_functions) {
        return Err(PpnlError::ShapeMismatch {
            context: "coupling matrix",
            expected: (n_functions, n_functions),
            found: coupling.dim(),
        });
    }
    for i in 0..n_functions {
        for j in 0..i {
            if (coupling[[i, j]] - coupling[[j, i]]).abs() > SYMMETRY_TOLERANCE {
                return Err(PpnlError::InvalidParameter(format!(
                    "coupling matrix is not symmetric at ({}, {})",
                    i, j
                )));
            }
        }
    }
    Ok(())
}

/// Projectors of a single angular momentum channel. Every projector is a contracted shell of
/// angular momentum `l`, the matrix `h` couples the projectors of the channel and is
/// diagonal in the magnetic quantum number.
#[derive(Debug, Clone)]
pub struct ProjectorChannel {
    pub l: usize,
    pub radius: f64,
    pub projectors: Vec<Shell>,
    pub h: Array2<f64>,
}

impl ProjectorChannel {
    pub fn new(l: usize, radius: f64, projectors: Vec<Shell>, h: Array2<f64>) -> Self {
        ProjectorChannel {
            l,
            radius,
            projectors,
            h,
        }
    }
}

/// Projector bank that is partitioned into angular momentum channels, each with its own
/// radius and coupling matrix. Channels without projectors do not contribute.
#[derive(Debug, Clone)]
pub struct ChannelProjectors {
    shells: Vec<Shell>,
    blocks: Vec<ProjectorBlock>,
    coupling: Array2<f64>,
    cutoff: f64,
}

impl ChannelProjectors {
    pub fn new(channels: Vec<ProjectorChannel>) -> Result<Self, PpnlError> {
        let mut shells: Vec<Shell> = Vec::new();
        let mut blocks: Vec<ProjectorBlock> = Vec::new();
        let mut offset: usize = 0;
        for channel in channels.iter() {
            let nprj: usize = channel.projectors.len();
            if nprj == 0 {
                continue;
            }
            if channel.projectors.iter().any(|shell| shell.l != channel.l) {
                return Err(PpnlError::InvalidParameter(format!(
                    "all projectors of the l = {} channel need angular momentum {}",
                    channel.l, channel.l
                )));
            }
            check_coupling(channel.h.view(), nprj)?;
            let n_functions: usize = nprj * (2 * channel.l + 1);
            blocks.push(ProjectorBlock {
                shells: shells.len()..(shells.len() + nprj),
                offset,
                n_functions,
                radius: channel.radius,
            });
            shells.extend(channel.projectors.iter().cloned());
            offset += n_functions;
        }

        // the coupling is block diagonal in the channels and diagonal in m
        let mut coupling: Array2<f64> = Array2::zeros((offset, offset));
        for (block, channel) in blocks
            .iter()
            .zip(channels.iter().filter(|channel| !channel.projectors.is_empty()))
        {
            let nm: usize = 2 * channel.l + 1;
            for ((i, j), h_ij) in channel.h.indexed_iter() {
                for m in 0..nm {
                    coupling[[block.offset + i * nm + m, block.offset + j * nm + m]] = *h_ij;
                }
            }
        }
        let cutoff: f64 = blocks.iter().map(|block| block.radius).fold(0.0, f64::max);
        Ok(ChannelProjectors {
            shells,
            blocks,
            coupling,
            cutoff,
        })
    }
}

impl BridgeKind for ChannelProjectors {
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
        self.cutoff
    }
}

/// Projector bank in which all projectors share one radius. The full bank is evaluated at
/// once and coupled by a dense matrix.
#[derive(Debug, Clone)]
pub struct FlatProjectors {
    shells: Vec<Shell>,
    blocks: Vec<ProjectorBlock>,
    coupling: Array2<f64>,
    radius: f64,
}

impl FlatProjectors {
    pub fn new(shells: Vec<Shell>, radius: f64, coupling: Array2<f64>) -> Result<Self, PpnlError> {
        let n_functions: usize = shells.iter().map(|shell| shell.n_functions()).sum();
        check_coupling(coupling.view(), n_functions)?;
        let blocks: Vec<ProjectorBlock> = if shells.is_empty() {
            Vec::new()
        } else {
            vec![ProjectorBlock {
                shells: 0..shells.len(),
                offset: 0,
                n_functions,
                radius,
            }]
        };
        Ok(FlatProjectors {
            shells,
            blocks,
            coupling,
            radius,
        })
    }
}

impl BridgeKind for FlatProjectors {
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
        self.radius
    }
}
