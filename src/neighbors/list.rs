use super::cell::Cell;
use crate::types::Site;
use hashbrown::HashMap;
use itertools::iproduct;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Ordered pair of sites within cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborEntry {
    pub iatom: usize,
    pub jatom: usize,
    pub ikind: usize,
    pub jkind: usize,
    /// `R_j + L * cell - R_i`
    pub r: Vector3<f64>,
    /// Lattice translation of the neighbor
    pub cell: [i32; 3],
    /// Position of this entry among the neighbors of `iatom` of kind `jkind`
    pub inode: usize,
    /// Number of neighbors of `iatom` of kind `jkind`
    pub nnode: usize,
}

/// List of neighbor pairs, grouped by the kinds of both sites and by the first site.
/// The entries can be consumed in parallel in any order.
#[derive(Debug, Clone, Default)]
pub struct NeighborList {
    entries: Vec<NeighborEntry>,
    symmetric: bool,
}

impl NeighborList {
    /// Build a list from entries. The entries are sorted by (ikind, jkind, iatom) and the
    /// slot indices `inode`/`nnode` are assigned per first site and neighbor kind.
    pub fn from_entries(mut entries: Vec<NeighborEntry>, symmetric: bool) -> Self {
        entries.sort_by(|a, b| {
            (a.ikind, a.jkind, a.iatom, a.jatom, a.cell).cmp(&(b.ikind, b.jkind, b.iatom, b.jatom, b.cell))
        });
        let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
        for entry in entries.iter_mut() {
            let count = counts.entry((entry.iatom, entry.jkind)).or_insert(0);
            entry.inode = *count;
            *count += 1;
        }
        for entry in entries.iter_mut() {
            entry.nnode = counts[&(entry.iatom, entry.jkind)];
        }
        NeighborList { entries, symmetric }
    }

    pub fn entries(&self) -> &[NeighborEntry] {
        &self.entries
    }

    pub fn par_iter(&self) -> rayon::slice::Iter<'_, NeighborEntry> {
        self.entries.par_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if every unordered pair is contained only once.
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }
}

/// Translation between the positions the sites were created with, for the search image `image`
/// of the wrapped positions.
fn unwrapped_image(image: [i32; 3], cell_i: [i32; 3], cell_j: [i32; 3]) -> [i32; 3] {
    [
        image[0] + cell_i[0] - cell_j[0],
        image[1] + cell_i[1] - cell_j[1],
        image[2] + cell_i[2] - cell_j[2],
    ]
}

fn is_positive(cell: &[i32; 3]) -> bool {
    *cell > [0, 0, 0]
}

/// Brute force neighbor search. Two sites i and j are neighbors if
/// `|R_j + L * cell - R_i| <= radius_a(kind_i) + radius_b(kind_j)`. Kinds for which one of
/// the radius functions returns `None` do not take part in that role.
///
/// For wrapped sites the `cell` of an entry refers to the unwrapped positions, so that
/// `r = R_j + L * cell - R_i` holds for the positions before wrapping.
///
/// With `symmetric` set, each unordered pair is listed once: pairs of different sites in the
/// orientation i < j and pairs of a site with its own images only for lexicographically
/// positive translations (and the site with itself).
pub fn build_neighbor_list<FA, FB>(
    sites: &[Site],
    cell: Option<&Cell>,
    radius_a: FA,
    radius_b: FB,
    symmetric: bool,
) -> NeighborList
where
    FA: Fn(usize) -> Option<f64> + Sync,
    FB: Fn(usize) -> Option<f64> + Sync,
{
    let max_a: f64 = sites
        .iter()
        .filter_map(|site| radius_a(site.kind))
        .fold(0.0, f64::max);
    let max_b: f64 = sites
        .iter()
        .filter_map(|site| radius_b(site.kind))
        .fold(0.0, f64::max);

    let images: Vec<[i32; 3]> = match cell {
        Some(cell) => {
            let mut min_frac: Vector3<f64> = Vector3::repeat(f64::MAX);
            let mut max_frac: Vector3<f64> = Vector3::repeat(f64::MIN);
            for site in sites.iter() {
                let frac: Vector3<f64> = cell.fractional(&site.position);
                min_frac = min_frac.inf(&frac);
                max_frac = max_frac.sup(&frac);
            }
            let spread: Vector3<f64> = if sites.is_empty() {
                Vector3::zeros()
            } else {
                max_frac - min_frac
            };
            let n: [i32; 3] = cell.n_images(max_a + max_b, &spread);
            iproduct!(-n[0]..=n[0], -n[1]..=n[1], -n[2]..=n[2])
                .map(|(x, y, z)| [x, y, z])
                .collect()
        }
        None => vec![[0, 0, 0]],
    };

    let entries: Vec<NeighborEntry> = sites
        .par_iter()
        .filter_map(|site_i| radius_a(site_i.kind).map(|ri| (site_i, ri)))
        .flat_map_iter(|(site_i, ri)| {
            let mut pairs: Vec<NeighborEntry> = Vec::new();
            for site_j in sites.iter() {
                if symmetric && site_j.index < site_i.index {
                    continue;
                }
                let rj: f64 = match radius_b(site_j.kind) {
                    Some(rj) => rj,
                    None => continue,
                };
                for image in images.iter() {
                    if symmetric && site_i.index == site_j.index && *image != [0, 0, 0] && !is_positive(image) {
                        continue;
                    }
                    let shift: Vector3<f64> = cell.map_or(Vector3::zeros(), |c| c.translation(*image));
                    let r: Vector3<f64> = site_j.position + shift - site_i.position;
                    if r.norm() <= ri + rj {
                        pairs.push(NeighborEntry {
                            iatom: site_i.index,
                            jatom: site_j.index,
                            ikind: site_i.kind,
                            jkind: site_j.kind,
                            r,
                            cell: unwrapped_image(*image, site_i.cell, site_j.cell),
                            inode: 0,
                            nnode: 0,
                        });
                    }
                }
            }
            pairs
        })
        .collect();
    NeighborList::from_entries(entries, symmetric)
}
