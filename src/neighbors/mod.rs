mod cell;
mod list;

pub use cell::Cell;
pub use list::{build_neighbor_list, NeighborEntry, NeighborList};
