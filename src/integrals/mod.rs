//! Primitive two-center integrals over cartesian Gaussian shells.
//!
//! The projector contraction only sees the [PrimitiveIntegrals] trait. [GaussianOverlap] is the
//! overlap evaluator that is used for Gaussian type projectors.
mod cart2sph;
mod overlap;

pub use cart2sph::{cart_components, cart_to_sph, ncart, nsph};
pub use overlap::GaussianOverlap;

use crate::types::Shell;
use nalgebra::Vector3;
use ndarray::Array3;

/// Number of derivative slices of an integral tensor: the value only or the value
/// and the three cartesian derivatives.
pub fn n_derivatives(derivatives: bool) -> usize {
    if derivatives {
        4
    } else {
        1
    }
}

/// Number of primitive cartesian functions of a set of shells.
pub fn n_primitive_functions(shells: &[Shell]) -> usize {
    shells
        .iter()
        .map(|shell| shell.n_primitives() * shell.n_cart())
        .sum()
}

/// Evaluator of integrals between the primitive cartesian functions of two sets of shells
/// located on two centers.
///
/// The returned tensor has the shape `[n_primitive_functions(a), n_primitive_functions(b), nder]`.
/// The functions are ordered shell by shell, inside a shell by primitive and the cartesian
/// index runs fastest. `r_ab` points from the center of `a` to the center of `b`.
/// Slice 0 holds the integrals, slices 1..4 the derivatives with respect to the x, y and z
/// coordinate of the center of `a` (only if `derivatives` is set).
///
/// Implementations are called concurrently from all workers and must not hold mutable state.
pub trait PrimitiveIntegrals: Sync {
    fn evaluate(
        &self,
        a: &[Shell],
        b: &[Shell],
        r_ab: &Vector3<f64>,
        derivatives: bool,
    ) -> Array3<f64>;
}
