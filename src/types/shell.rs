use crate::defaults::{EPS_RADIUS, MAX_SHELL_RADIUS, RADIUS_MAX_ITER, RADIUS_TOLERANCE};
use crate::errors::PpnlError;
use crate::integrals::{cart_to_sph, ncart, nsph};
use crate::utils::zbrent;
use ndarray::prelude::*;
use std::f64::consts::PI;

/// Double factorial (2l-1)!! with the convention (-1)!! = 1
fn double_factorial_odd(l: usize) -> f64 {
    (1..=l).map(|k| (2 * k - 1) as f64).product()
}

/// Normalization constant of a primitive cartesian Gaussian `x^l exp(-alpha r^2)`.
pub fn primitive_normalization(l: usize, alpha: f64) -> f64 {
    (2.0 * alpha / PI).powf(0.75) * (4.0 * alpha).powf(0.5 * l as f64)
        / double_factorial_odd(l).sqrt()
}

/// Largest distance at which `prefactor * r^l * exp(-alpha r^2)` is still above `eps`.
fn primitive_radius(l: usize, alpha: f64, prefactor: f64, eps: f64) -> f64 {
    let func = |r: f64| prefactor.abs() * r.powi(l as i32) * (-alpha * r * r).exp() - eps;
    // the function decays monotonically beyond its maximum
    let r_max: f64 = (0.5 * l as f64 / alpha).sqrt();
    if func(r_max) <= 0.0 {
        return 0.0;
    }
    if func(MAX_SHELL_RADIUS) >= 0.0 {
        return MAX_SHELL_RADIUS;
    }
    zbrent(func, r_max, MAX_SHELL_RADIUS, RADIUS_TOLERANCE, RADIUS_MAX_ITER)
        .unwrap_or(MAX_SHELL_RADIUS)
}

/// A contracted shell of Gaussian functions with a single angular momentum.
///
/// The contraction coefficients are normalized on construction, so that every
/// spherical function of the shell has unit norm. The radial extent `radius` enters the
/// radius checks of the pair list and can be overwritten with [Shell::with_radius].
#[derive(Debug, Clone)]
pub struct Shell {
    /// Angular momentum
    pub l: usize,
    pub exponents: Vec<f64>,
    /// Normalized contraction coefficients (without the primitive normalization)
    pub coefficients: Vec<f64>,
    /// Radial extent of the shell
    pub radius: f64,
    /// Transformation from the primitive cartesian functions to the contracted spherical
    /// functions, shape `[2l+1, nprim * ncart]`
    sphi: Array2<f64>,
}

impl Shell {
    /// Create a new shell. The radius is computed with the default threshold
    /// [EPS_RADIUS](crate::defaults::EPS_RADIUS).
    pub fn new(l: usize, exponents: Vec<f64>, coefficients: Vec<f64>) -> Result<Self, PpnlError> {
        Self::with_eps_radius(l, exponents, coefficients, EPS_RADIUS)
    }

    /// Create a new shell whose radius is the distance at which its primitives
    /// drop below `eps_radius`.
    pub fn with_eps_radius(
        l: usize,
        exponents: Vec<f64>,
        coefficients: Vec<f64>,
        eps_radius: f64,
    ) -> Result<Self, PpnlError> {
        if exponents.is_empty() || exponents.len() != coefficients.len() {
            return Err(PpnlError::InvalidParameter(format!(
                "shell needs the same non zero number of exponents and coefficients, got {} and {}",
                exponents.len(),
                coefficients.len()
            )));
        }
        if exponents.iter().any(|alpha| *alpha <= 0.0) {
            return Err(PpnlError::InvalidParameter(String::from(
                "Gaussian exponents have to be positive",
            )));
        }
        let c2s: Array2<f64> = cart_to_sph(l).ok_or_else(|| {
            PpnlError::InvalidParameter(format!("angular momentum {} is not supported", l))
        })?;

        // self overlap of the contracted x^l component
        let norms: Vec<f64> = exponents
            .iter()
            .map(|alpha| primitive_normalization(l, *alpha))
            .collect();
        let mut self_overlap: f64 = 0.0;
        for (i, alpha) in exponents.iter().enumerate() {
            for (j, beta) in exponents.iter().enumerate() {
                let p: f64 = alpha + beta;
                self_overlap += coefficients[i] * coefficients[j] * norms[i] * norms[j]
                    * (PI / p).powf(1.5)
                    * double_factorial_odd(l)
                    / (2.0 * p).powi(l as i32);
            }
        }
        if self_overlap <= 0.0 {
            return Err(PpnlError::InvalidParameter(String::from(
                "contraction of the shell has zero norm",
            )));
        }
        let scale: f64 = self_overlap.sqrt().recip();
        let coefficients: Vec<f64> = coefficients.iter().map(|c| c * scale).collect();

        let n_cart: usize = ncart(l);
        let mut sphi: Array2<f64> = Array2::zeros((nsph(l), exponents.len() * n_cart));
        for (ipgf, (c, norm)) in coefficients.iter().zip(norms.iter()).enumerate() {
            sphi.slice_mut(s![.., ipgf * n_cart..(ipgf + 1) * n_cart])
                .assign(&(&c2s * (c * norm)));
        }

        let radius: f64 = exponents
            .iter()
            .zip(coefficients.iter().zip(norms.iter()))
            .map(|(alpha, (c, norm))| primitive_radius(l, *alpha, c * norm, eps_radius))
            .fold(0.0, f64::max);

        Ok(Shell {
            l,
            exponents,
            coefficients,
            radius,
            sphi,
        })
    }

    /// Replace the radial extent of the shell.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn n_primitives(&self) -> usize {
        self.exponents.len()
    }

    pub fn n_cart(&self) -> usize {
        ncart(self.l)
    }

    /// Number of contracted spherical functions
    pub fn n_functions(&self) -> usize {
        nsph(self.l)
    }

    pub fn sphi(&self) -> ArrayView2<'_, f64> {
        self.sphi.view()
    }
}

/// The basis of an outer site: a list of shells. The basis functions are ordered
/// shell by shell.
#[derive(Debug, Clone)]
pub struct BasisSet {
    pub shells: Vec<Shell>,
    offsets: Vec<usize>,
    n_functions: usize,
}

impl BasisSet {
    pub fn new(shells: Vec<Shell>) -> Self {
        let mut offsets: Vec<usize> = Vec::with_capacity(shells.len());
        let mut n_functions: usize = 0;
        for shell in shells.iter() {
            offsets.push(n_functions);
            n_functions += shell.n_functions();
        }
        BasisSet {
            shells,
            offsets,
            n_functions,
        }
    }

    /// Total number of basis functions
    pub fn n_functions(&self) -> usize {
        self.n_functions
    }

    /// Index of the first function of each shell
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Largest radial extent of all shells
    pub fn radius(&self) -> f64 {
        self.shells.iter().map(|shell| shell.radius).fold(0.0, f64::max)
    }
}
