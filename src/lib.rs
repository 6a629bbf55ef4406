//! Contribution of nonlocal projectors to block-sparse operators of periodic and molecular
//! systems, together with its forces and virial.
//!
//! The entry point is [ppnl::build_core_ppnl]. The primitive integrals are supplied through the
//! [integrals::PrimitiveIntegrals] trait, [integrals::GaussianOverlap] evaluates Gaussian type
//! projectors.
pub mod defaults;
pub mod errors;
pub mod forces;
pub mod integrals;
pub mod io;
pub mod matrix;
pub mod neighbors;
pub mod ppnl;
pub mod types;
pub mod utils;

pub use errors::PpnlError;
pub use forces::ForceAccumulator;
pub use io::Configuration;
pub use matrix::BlockSparseMatrix;
pub use ppnl::{build_core_ppnl, ppnl_energy, PpnlReport};
