use thiserror::Error;

/// Errors raised by the HHO assembly engine.
///
/// Every variant is fatal: a failed configuration or factorization leaves no
/// algebraically valid system to continue with, so callers are expected to
/// abort the run rather than retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HhoError {
    /// The requested setup cannot be expressed by this scheme
    /// (unsupported polynomial degree, non-scalar equation,
    /// unsupported boundary enforcement).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A term was requested that the scheme deliberately does not handle.
    /// Raised before any assembly work is done for the pass.
    #[error("{0} is not handled by the HHO scalar diffusion scheme")]
    UnimplementedCapability(&'static str),

    /// A boundary face needed a boundary-condition value but no definition
    /// covers it.
    #[error("boundary face {face} has no boundary condition definition")]
    UnresolvedBoundaryDefinition { face: usize },

    /// Static condensation was asked to factorize an interior block whose
    /// size is outside the supported set {1, 4, 10}.
    #[error("static condensation does not support cell blocks of size {0} (supported: 1, 4, 10)")]
    UnsupportedBlockSize(usize),
}

impl HhoError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        HhoError::Configuration(msg.into())
    }
}
