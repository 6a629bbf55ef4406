use crate::errors::PpnlError;
use nalgebra::{Matrix3, Vector3};

/// Periodic simulation cell. The lattice vectors are the columns of `h`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub h: Matrix3<f64>,
    h_inv: Matrix3<f64>,
}

impl Cell {
    pub fn new(h: Matrix3<f64>) -> Result<Self, PpnlError> {
        let h_inv: Matrix3<f64> = h.try_inverse().ok_or_else(|| {
            PpnlError::InvalidParameter(String::from("the cell matrix is singular"))
        })?;
        Ok(Cell { h, h_inv })
    }

    /// Cubic cell with edge length `a`
    pub fn cubic(a: f64) -> Result<Self, PpnlError> {
        Self::new(Matrix3::from_diagonal_element(a))
    }

    /// Cartesian vector of the lattice translation `cell`
    pub fn translation(&self, cell: [i32; 3]) -> Vector3<f64> {
        self.h * Vector3::new(cell[0] as f64, cell[1] as f64, cell[2] as f64)
    }

    pub fn fractional(&self, position: &Vector3<f64>) -> Vector3<f64> {
        self.h_inv * position
    }

    /// Wrap a position into the home cell. Returns the wrapped position and the lattice
    /// translation that was removed (`position = wrapped + translation(cell)`).
    pub fn wrap(&self, position: &Vector3<f64>) -> (Vector3<f64>, [i32; 3]) {
        let frac: Vector3<f64> = self.fractional(position);
        let cell: [i32; 3] = [
            frac[0].floor() as i32,
            frac[1].floor() as i32,
            frac[2].floor() as i32,
        ];
        (position - self.translation(cell), cell)
    }

    /// Distance between neighboring lattice planes along each lattice vector.
    pub fn plane_distances(&self) -> Vector3<f64> {
        Vector3::new(
            self.h_inv.row(0).norm().recip(),
            self.h_inv.row(1).norm().recip(),
            self.h_inv.row(2).norm().recip(),
        )
    }

    /// Number of images along each lattice vector that has to be searched, so that all pairs
    /// within `cutoff` are found for sites whose fractional coordinates spread over `spread`.
    pub fn n_images(&self, cutoff: f64, spread: &Vector3<f64>) -> [i32; 3] {
        let heights: Vector3<f64> = self.plane_distances();
        let mut n: [i32; 3] = [0; 3];
        for k in 0..3 {
            n[k] = (cutoff / heights[k] + spread[k]).ceil() as i32;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn wrap_into_home_cell() {
        let cell = Cell::cubic(4.0).unwrap();
        let (wrapped, image) = cell.wrap(&Vector3::new(9.0, -1.0, 2.0));
        assert_eq!(image, [2, -1, 0]);
        assert_abs_diff_eq!(wrapped[0], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(wrapped[1], 3.0, epsilon = 1e-14);
        assert_abs_diff_eq!(wrapped[2], 2.0, epsilon = 1e-14);
    }

    #[test]
    fn images_of_a_skewed_cell() {
        let h: Matrix3<f64> = Matrix3::new(4.0, 2.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 10.0);
        let cell = Cell::new(h).unwrap();
        let heights = cell.plane_distances();
        assert_abs_diff_eq!(heights[2], 10.0, epsilon = 1e-12);
        assert!(heights[0] < 4.0);
        assert_eq!(cell.n_images(5.0, &Vector3::zeros()), [2, 2, 1]);
    }

    #[test]
    fn singular_cell() {
        assert!(Cell::new(Matrix3::zeros()).is_err());
    }
}
