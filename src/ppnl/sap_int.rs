//! Cache of the integrals between the basis functions of an outer site and the projectors of
//! a bridge site.
//!
//! The cache is filled concurrently in two steps: the row of an outer site is allocated on
//! first touch with one slot per neighbor of that site, afterwards every slot is written
//! exactly once by the worker that owns the neighbor entry. [SapIntBuilder::freeze] turns the
//! slots into sorted rows that are only read.
use crate::errors::PpnlError;
use hashbrown::HashMap;
use nalgebra::Vector3;
use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use std::sync::OnceLock;

/// Integrals of one outer site with one bridge site (or one of its images).
#[derive(Debug, Clone, PartialEq)]
pub struct SapEntry {
    /// Index of the bridge site
    pub atom: usize,
    /// Lattice translation of the bridge site
    pub cell: [i32; 3],
    /// Vector from the outer site to the bridge site
    pub r: Vector3<f64>,
    /// `<outer function | projector>` and its derivatives, shape `[nsgf, nproj, nder]`
    pub value: Array3<f64>,
    /// `value` contracted with the coupling matrix along the projector axis
    pub coupled: Array3<f64>,
    /// Largest absolute element of `value` over all slices
    pub max_value: f64,
    /// Largest absolute element of `coupled` over all slices
    pub max_coupled: f64,
}

impl SapEntry {
    pub fn new(
        atom: usize,
        cell: [i32; 3],
        r: Vector3<f64>,
        value: Array3<f64>,
        coupled: Array3<f64>,
    ) -> Self {
        let max_value: f64 = max_abs(&value);
        let max_coupled: f64 = max_abs(&coupled);
        SapEntry {
            atom,
            cell,
            r,
            value,
            coupled,
            max_value,
            max_coupled,
        }
    }

    pub fn nder(&self) -> usize {
        self.value.dim().2
    }
}

fn max_abs(tensor: &Array3<f64>) -> f64 {
    if tensor.is_empty() {
        return 0.0;
    }
    // a NaN has no order, such entries are never screened
    tensor.mapv(f64::abs).max().map_or(f64::INFINITY, |x| *x)
}

/// All cached integrals of one outer site with the sites of one bridge kind, sorted by bridge
/// site and lattice translation.
#[derive(Debug, Clone, PartialEq)]
pub struct SapAtom {
    pub atom: usize,
    pub entries: Vec<SapEntry>,
    /// Bounds over all entries, used to skip whole rows
    pub max_value: f64,
    pub max_coupled: f64,
}

impl SapAtom {
    fn new(atom: usize, mut entries: Vec<SapEntry>) -> Self {
        entries.sort_by(|a, b| (a.atom, a.cell).cmp(&(b.atom, b.cell)));
        let max_value: f64 = entries.iter().map(|e| e.max_value).fold(0.0, f64::max);
        let max_coupled: f64 = entries.iter().map(|e| e.max_coupled).fold(0.0, f64::max);
        SapAtom {
            atom,
            entries,
            max_value,
            max_coupled,
        }
    }

    /// The entry of the bridge site `atom` in the lattice translation `cell`.
    pub fn find(&self, atom: usize, cell: [i32; 3]) -> Option<&SapEntry> {
        self.entries
            .binary_search_by(|entry| (entry.atom, entry.cell).cmp(&(atom, cell)))
            .ok()
            .map(|idx| &self.entries[idx])
    }
}

/// Slots of one outer site, sized to its number of bridge neighbors.
struct AtomSlots {
    atom: usize,
    slots: Vec<OnceLock<SapEntry>>,
}

impl AtomSlots {
    fn new(atom: usize, nnode: usize) -> Self {
        AtomSlots {
            atom,
            slots: (0..nnode).map(|_| OnceLock::new()).collect(),
        }
    }
}

/// Write side of the cache. Rows are keyed by (outer kind, bridge kind), each row holds one
/// lazily allocated slot list per outer site.
pub struct SapIntBuilder {
    rows: HashMap<(usize, usize), HashMap<usize, OnceLock<AtomSlots>>>,
}

impl SapIntBuilder {
    /// Reserve the row slots for all (outer kind, bridge kind, outer site) triples. The slot
    /// lists themselves are allocated on first touch.
    pub fn new<I>(outer_sites: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, usize)>,
    {
        let mut rows: HashMap<(usize, usize), HashMap<usize, OnceLock<AtomSlots>>> =
            HashMap::new();
        for (ikind, kkind, iatom) in outer_sites {
            rows.entry((ikind, kkind))
                .or_insert_with(HashMap::new)
                .entry(iatom)
                .or_insert_with(OnceLock::new);
        }
        SapIntBuilder { rows }
    }

    /// Store `entry` in slot `inode` of the outer site `iatom`. Safe to call concurrently for
    /// distinct slots.
    pub fn store(
        &self,
        key: (usize, usize),
        iatom: usize,
        inode: usize,
        nnode: usize,
        entry: SapEntry,
    ) -> Result<(), PpnlError> {
        let atom_slot: &OnceLock<AtomSlots> = self
            .rows
            .get(&key)
            .and_then(|row| row.get(&iatom))
            .ok_or(PpnlError::IndexOutOfRange {
                context: "pair cache row",
                index: iatom,
                len: self.rows.get(&key).map_or(0, |row| row.len()),
            })?;
        let slots: &AtomSlots = atom_slot.get_or_init(|| AtomSlots::new(iatom, nnode));
        let slot: &OnceLock<SapEntry> =
            slots.slots.get(inode).ok_or(PpnlError::IndexOutOfRange {
                context: "pair cache slot",
                index: inode,
                len: slots.slots.len(),
            })?;
        slot.set(entry)
            .map_err(|_| PpnlError::DuplicateRecord {
                atom: iatom,
                slot: inode,
            })
    }

    /// Finish the build. Untouched rows and empty slots are dropped, the remaining entries
    /// are sorted.
    pub fn freeze(self) -> SapInt {
        let rows: HashMap<(usize, usize), Vec<SapAtom>> = self
            .rows
            .into_iter()
            .filter_map(|(key, row)| {
                let mut atoms: Vec<SapAtom> = row
                    .into_iter()
                    .filter_map(|(_, slot)| slot.into_inner())
                    .map(|slots| {
                        let entries: Vec<SapEntry> = slots
                            .slots
                            .into_iter()
                            .filter_map(OnceLock::into_inner)
                            .collect();
                        SapAtom::new(slots.atom, entries)
                    })
                    .collect();
                if atoms.is_empty() {
                    None
                } else {
                    atoms.sort_by_key(|atom| atom.atom);
                    Some((key, atoms))
                }
            })
            .collect();
        SapInt { rows }
    }
}

/// Read side of the cache.
#[derive(Debug, Clone, Default)]
pub struct SapInt {
    rows: HashMap<(usize, usize), Vec<SapAtom>>,
}

impl SapInt {
    /// Cached integrals of the outer site `iatom` (of kind `ikind`) with all sites of the
    /// bridge kind `kkind`.
    pub fn atom(&self, ikind: usize, kkind: usize, iatom: usize) -> Option<&SapAtom> {
        let row: &Vec<SapAtom> = self.rows.get(&(ikind, kkind))?;
        row.binary_search_by_key(&iatom, |atom| atom.atom)
            .ok()
            .map(|idx| &row[idx])
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of stored entries
    pub fn n_records(&self) -> usize {
        self.rows
            .values()
            .flat_map(|row| row.iter())
            .map(|atom| atom.entries.len())
            .sum()
    }
}
