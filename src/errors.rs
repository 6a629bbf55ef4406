use std::fmt;

/// Errors that abort the projector build. Missing kind data or blocks outside of the
/// sparsity pattern are not errors, these pairs are skipped silently.
#[derive(Debug, Clone, PartialEq)]
pub enum PpnlError {
    /// Two tensors that have to be contracted do not agree in their dimensions.
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// A slot of the pair cache was written twice.
    DuplicateRecord { atom: usize, slot: usize },
    /// A site or kind index that does not exist was referenced.
    IndexOutOfRange {
        context: &'static str,
        index: usize,
        len: usize,
    },
    /// Parameters of a kind are not usable (e.g. a non symmetric coupling matrix).
    InvalidParameter(String),
    /// The worker pool could not be created.
    ThreadPool(String),
}

impl fmt::Display for PpnlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Self::ShapeMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "shape mismatch in {}: expected {}x{} but found {}x{}",
                context, expected.0, expected.1, found.0, found.1
            ),
            Self::DuplicateRecord { atom, slot } => write!(
                f,
                "pair cache slot {} of atom {} was written twice",
                slot, atom
            ),
            Self::IndexOutOfRange {
                context,
                index,
                len,
            } => write!(
                f,
                "{} index {} is out of range (length {})",
                context, index, len
            ),
            Self::InvalidParameter(message) => write!(f, "invalid parameter: {}", message),
            Self::ThreadPool(message) => {
                write!(f, "could not build the worker pool: {}", message)
            }
        }
    }
}

impl std::error::Error for PpnlError {}
