use crate::errors::PpnlError;
use nalgebra::{Matrix3, Vector3};
use ndarray::prelude::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Accumulator for the derivatives of the energy with respect to the site positions and for
/// the virial. Each site has its own lock, the virial a single one, so that all workers
/// can add their contributions concurrently.
#[derive(Debug)]
pub struct ForceAccumulator {
    forces: Vec<Mutex<Vector3<f64>>>,
    virial: Mutex<Matrix3<f64>>,
}

impl ForceAccumulator {
    pub fn new(n_sites: usize) -> Self {
        ForceAccumulator {
            forces: (0..n_sites).map(|_| Mutex::new(Vector3::zeros())).collect(),
            virial: Mutex::new(Matrix3::zeros()),
        }
    }

    pub fn n_sites(&self) -> usize {
        self.forces.len()
    }

    pub fn add_force(&self, site: usize, force: &Vector3<f64>) -> Result<(), PpnlError> {
        let slot = self.forces.get(site).ok_or(PpnlError::IndexOutOfRange {
            context: "force site",
            index: site,
            len: self.forces.len(),
        })?;
        *lock(slot) += force;
        Ok(())
    }

    pub fn add_virial(&self, virial: &Matrix3<f64>) {
        *lock(&self.virial) += virial;
    }

    pub fn force(&self, site: usize) -> Option<Vector3<f64>> {
        self.forces.get(site).map(|slot| *lock(slot))
    }

    /// All forces as an array with one row per site.
    pub fn forces(&self) -> Array2<f64> {
        let mut forces: Array2<f64> = Array2::zeros((self.forces.len(), 3));
        for (mut row, slot) in forces.outer_iter_mut().zip(self.forces.iter()) {
            let f: Vector3<f64> = *lock(slot);
            row.assign(&array![f[0], f[1], f[2]]);
        }
        forces
    }

    pub fn virial(&self) -> Matrix3<f64> {
        *lock(&self.virial)
    }

    pub fn reset(&self) {
        self.forces.iter().for_each(|slot| *lock(slot) = Vector3::zeros());
        *lock(&self.virial) = Matrix3::zeros();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn concurrent_forces() {
        let accumulator = ForceAccumulator::new(3);
        (0..300).into_par_iter().for_each(|i| {
            accumulator
                .add_force(i % 3, &Vector3::new(1.0, -1.0, 0.5))
                .unwrap();
            accumulator.add_virial(&Matrix3::identity());
        });
        let forces: Array2<f64> = accumulator.forces();
        assert_eq!(forces.row(2), array![100.0, -100.0, 50.0]);
        assert_eq!(accumulator.virial(), Matrix3::identity() * 300.0);
        assert!(accumulator.add_force(3, &Vector3::zeros()).is_err());
        accumulator.reset();
        assert_eq!(accumulator.force(0), Some(Vector3::zeros()));
    }
}
