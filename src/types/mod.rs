mod kind;
mod projectors;
mod shell;
mod site;

pub use kind::Kind;
pub use projectors::{
    BridgeKind, ChannelProjectors, FlatProjectors, ProjectorBlock, ProjectorChannel,
};
pub use shell::{primitive_normalization, BasisSet, Shell};
pub use site::{sites_from_positions, Site};
