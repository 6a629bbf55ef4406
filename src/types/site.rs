use crate::neighbors::Cell;
use nalgebra::Vector3;

/// A point in space that carries the basis or projector data of its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    /// Index of the site in the system
    pub index: usize,
    /// Index into the list of kinds
    pub kind: usize,
    /// Cartesian position in bohr
    pub position: Vector3<f64>,
    /// Lattice translation that was removed when the site was wrapped into the home cell
    pub cell: [i32; 3],
}

impl Site {
    pub fn new(index: usize, kind: usize, position: Vector3<f64>) -> Self {
        Site {
            index,
            kind,
            position,
            cell: [0; 3],
        }
    }

    /// The same site moved into the home cell. `position + translation(cell)` stays the
    /// position the site was created with.
    pub fn wrapped(&self, cell: &Cell) -> Site {
        let unwrapped: Vector3<f64> = self.position + cell.translation(self.cell);
        let (position, image) = cell.wrap(&unwrapped);
        Site {
            index: self.index,
            kind: self.kind,
            position,
            cell: image,
        }
    }
}

/// Build the sites from a list of kind indices and an array of positions with one row per site.
/// With a periodic `cell` the sites are wrapped into the home cell.
pub fn sites_from_positions(
    kinds: &[usize],
    positions: ndarray::ArrayView2<f64>,
    cell: Option<&Cell>,
) -> Vec<Site> {
    kinds
        .iter()
        .zip(positions.outer_iter())
        .enumerate()
        .map(|(index, (kind, xyz))| {
            let site: Site = Site::new(index, *kind, Vector3::new(xyz[0], xyz[1], xyz[2]));
            match cell {
                Some(cell) => site.wrapped(cell),
                None => site,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn wrapping_keeps_the_unwrapped_position() {
        let cell: Cell = Cell::cubic(4.0).unwrap();
        let positions = array![[1.0, 2.0, 3.0], [9.0, -1.0, 2.0]];
        let sites: Vec<Site> = sites_from_positions(&[0, 1], positions.view(), Some(&cell));
        assert_eq!(sites[0].cell, [0, 0, 0]);
        assert_eq!(sites[1].cell, [2, -1, 0]);
        assert_abs_diff_eq!(sites[1].position[0], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(sites[1].position[1], 3.0, epsilon = 1e-14);
        // wrapping twice changes nothing
        let again: Site = sites[1].wrapped(&cell);
        assert_eq!(again, sites[1]);
        let unwrapped: Vector3<f64> = again.position + cell.translation(again.cell);
        assert_abs_diff_eq!(unwrapped[0], 9.0, epsilon = 1e-14);
        assert_abs_diff_eq!(unwrapped[1], -1.0, epsilon = 1e-14);
    }
}
