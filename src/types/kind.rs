use super::projectors::BridgeKind;
use super::shell::BasisSet;
use std::fmt;

/// Category of sites that share their basis and projector data. A kind can carry a basis
/// (it is an outer site), a projector bank (it is a bridge site), both or neither.
/// Both roles are looked up independently.
pub struct Kind {
    pub name: String,
    basis: Option<BasisSet>,
    bridge: Option<Box<dyn BridgeKind>>,
}

impl Kind {
    pub fn new(name: &str) -> Self {
        Kind {
            name: String::from(name),
            basis: None,
            bridge: None,
        }
    }

    pub fn with_basis(mut self, basis: BasisSet) -> Self {
        self.basis = Some(basis);
        self
    }

    pub fn with_bridge<B: BridgeKind + 'static>(mut self, bridge: B) -> Self {
        self.bridge = Some(Box::new(bridge));
        self
    }

    pub fn basis(&self) -> Option<&BasisSet> {
        self.basis.as_ref()
    }

    /// The projector bank of this kind. Banks without any projector are treated as absent.
    pub fn bridge(&self) -> Option<&dyn BridgeKind> {
        self.bridge
            .as_deref()
            .filter(|bridge| bridge.n_projectors() > 0)
    }

    /// Number of basis functions of a site of this kind, zero without basis.
    pub fn n_functions(&self) -> usize {
        self.basis.as_ref().map_or(0, |basis| basis.n_functions())
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Kind")
            .field("name", &self.name)
            .field("n_functions", &self.n_functions())
            .field(
                "n_projectors",
                &self.bridge().map_or(0, |bridge| bridge.n_projectors()),
            )
            .finish()
    }
}
