use super::cart2sph::{cart_components, ncart};
use super::{n_derivatives, n_primitive_functions, PrimitiveIntegrals};
use crate::types::Shell;
use nalgebra::Vector3;
use ndarray::prelude::*;
use std::f64::consts::PI;

/// Overlap integrals between unnormalized primitive cartesian Gaussians
/// `x^lx y^ly z^lz exp(-alpha r^2)` of two shells.
///
/// The 1D overlaps are obtained with the Obara-Saika recursion. Derivatives with respect to
/// the center of the first shell are built from the shifted 1D overlaps:
/// `d/dA_x S(i,j) = 2 alpha S(i+1,j) - i S(i-1,j)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GaussianOverlap;

impl GaussianOverlap {
    pub fn new() -> Self {
        GaussianOverlap
    }
}

/// Table of 1D overlaps `S[i, j]` without the Gaussian prefactor, for `i <= la` and `j <= lb`.
/// `xpa` and `xpb` are the distances of the product center from both centers and `p` is the
/// sum of the exponents.
fn overlap_1d(la: usize, lb: usize, xpa: f64, xpb: f64, p: f64) -> Array2<f64> {
    let fac: f64 = 0.5 / p;
    let mut s: Array2<f64> = Array2::zeros((la + 1, lb + 1));
    for j in 0..=lb {
        for i in 0..=la {
            s[[i, j]] = if i == 0 && j == 0 {
                1.0
            } else if j == 0 {
                let mut value: f64 = xpa * s[[i - 1, 0]];
                if i > 1 {
                    value += fac * (i - 1) as f64 * s[[i - 2, 0]];
                }
                value
            } else {
                let mut value: f64 = xpb * s[[i, j - 1]];
                if i > 0 {
                    value += fac * i as f64 * s[[i - 1, j - 1]];
                }
                if j > 1 {
                    value += fac * (j - 1) as f64 * s[[i, j - 2]];
                }
                value
            };
        }
    }
    s
}

impl GaussianOverlap {
    /// Integrals of a single pair of shells written into `integrals`.
    fn shell_pair(
        &self,
        a: &Shell,
        b: &Shell,
        r_ab: &Vector3<f64>,
        derivatives: bool,
        mut integrals: ArrayViewMut3<f64>,
    ) {
        let la: usize = a.l;
        let lb: usize = b.l;
        let ncart_a: usize = ncart(la);
        let ncart_b: usize = ncart(lb);
        let comps_a: Vec<[usize; 3]> = cart_components(la);
        let comps_b: Vec<[usize; 3]> = cart_components(lb);
        // one more power on `a` is needed for the derivatives
        let la_max: usize = if derivatives { la + 1 } else { la };
        let r2: f64 = r_ab.norm_squared();

        for (ipgf, alpha) in a.exponents.iter().enumerate() {
            for (jpgf, beta) in b.exponents.iter().enumerate() {
                let p: f64 = alpha + beta;
                let prefactor: f64 = (PI / p).powf(1.5) * (-alpha * beta / p * r2).exp();
                // center `a` sits in the origin, `b` at r_ab
                let s1d: Vec<Array2<f64>> = (0..3)
                    .map(|d| overlap_1d(la_max, lb, beta / p * r_ab[d], -alpha / p * r_ab[d], p))
                    .collect();

                for (ic, ca) in comps_a.iter().enumerate() {
                    for (jc, cb) in comps_b.iter().enumerate() {
                        let mu: usize = ipgf * ncart_a + ic;
                        let nu: usize = jpgf * ncart_b + jc;
                        let values: [f64; 3] = [
                            s1d[0][[ca[0], cb[0]]],
                            s1d[1][[ca[1], cb[1]]],
                            s1d[2][[ca[2], cb[2]]],
                        ];
                        integrals[[mu, nu, 0]] = prefactor * values[0] * values[1] * values[2];
                        if derivatives {
                            for d in 0..3 {
                                let i: usize = ca[d];
                                let mut ds: f64 = 2.0 * alpha * s1d[d][[i + 1, cb[d]]];
                                if i > 0 {
                                    ds -= i as f64 * s1d[d][[i - 1, cb[d]]];
                                }
                                let others: f64 = values[(d + 1) % 3] * values[(d + 2) % 3];
                                integrals[[mu, nu, d + 1]] = prefactor * ds * others;
                            }
                        }
                    }
                }
            }
        }
    }
}

impl PrimitiveIntegrals for GaussianOverlap {
    fn evaluate(
        &self,
        a: &[Shell],
        b: &[Shell],
        r_ab: &Vector3<f64>,
        derivatives: bool,
    ) -> Array3<f64> {
        let mut integrals: Array3<f64> = Array3::zeros((
            n_primitive_functions(a),
            n_primitive_functions(b),
            n_derivatives(derivatives),
        ));
        let mut mu: usize = 0;
        for shell_a in a.iter() {
            let na: usize = shell_a.n_primitives() * shell_a.n_cart();
            let mut nu: usize = 0;
            for shell_b in b.iter() {
                let nb: usize = shell_b.n_primitives() * shell_b.n_cart();
                self.shell_pair(
                    shell_a,
                    shell_b,
                    r_ab,
                    derivatives,
                    integrals.slice_mut(s![mu..mu + na, nu..nu + nb, ..]),
                );
                nu += nb;
            }
            mu += na;
        }
        integrals
    }
}
