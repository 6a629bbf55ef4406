use ndarray::prelude::*;

const SQRT3: f64 = 1.732050808568877293527446;
const SQRT3_HALF: f64 = 0.866025403784438646763723;

/// Number of cartesian functions for angular momentum l: (l+1)(l+2)/2
#[inline]
pub fn ncart(l: usize) -> usize {
    (l + 1) * (l + 2) / 2
}

/// Number of real spherical functions for angular momentum l: 2l+1
#[inline]
pub fn nsph(l: usize) -> usize {
    2 * l + 1
}

/// Exponents (lx, ly, lz) of all cartesian components of angular momentum l.
/// The highest power of x comes first: xx, xy, xz, yy, yz, zz for d functions.
pub fn cart_components(l: usize) -> Vec<[usize; 3]> {
    let mut components: Vec<[usize; 3]> = Vec::with_capacity(ncart(l));
    for lx in (0..=l).rev() {
        for ly in (0..=(l - lx)).rev() {
            components.push([lx, ly, l - lx - ly]);
        }
    }
    components
}

/// Transformation matrix from cartesian to real spherical functions with the shape
/// `[2l+1, (l+1)(l+2)/2]`. The cartesian functions are assumed to share the normalization
/// of the x^l component.
///
/// Spherical order for d functions: d(-2), d(-1), d(0), d(1), d(2).
/// Only l <= 2 is available, `None` is returned for higher angular momenta.
pub fn cart_to_sph(l: usize) -> Option<Array2<f64>> {
    match l {
        0 => Some(array![[1.0]]),
        1 => Some(Array2::eye(3)),
        2 => Some(array![
            //  xx          xy      xz      yy           yz      zz
            [0.0, SQRT3, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, SQRT3, 0.0],
            [-0.5, 0.0, 0.0, -0.5, 0.0, 1.0],
            [0.0, 0.0, SQRT3, 0.0, 0.0, 0.0],
            [SQRT3_HALF, 0.0, 0.0, -SQRT3_HALF, 0.0, 0.0],
        ]),
        _ => None,
    }
}
