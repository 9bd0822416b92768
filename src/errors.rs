use thiserror::Error;

/// Errors reported by superset and packed-set operations.
///
/// All failures are surfaced synchronously to the caller; this is a pure
/// in-memory structure with no transient failure modes, so nothing is
/// retried or recovered internally.
#[derive(Debug, Error)]
pub enum SetError {
    /// A member was referenced that does not exist in the superset's
    /// population.
    #[error("member does not exist in the enclosing superset's population")]
    UnknownMember,

    /// A set name was referenced that is not registered in the superset.
    #[error("no set named {0:?} exists within the enclosing superset")]
    UnknownSet(String),

    /// A set was added under a name that is already registered.
    #[error("a set named {0:?} already exists within the superset")]
    DuplicateSetName(String),

    /// A preset word array was too short for the superset's population.
    #[error("preset membership provides {provided} words but the population requires {required}")]
    InsufficientCapacity { required: usize, provided: usize },

    /// A decoded membership payload's bit count fell outside the tolerance
    /// window around the population size.
    #[error(
        "decoded membership of {decoded_bits} bits is not compatible with a population of {population_size}"
    )]
    IncompatibleEncoding {
        decoded_bits: usize,
        population_size: usize,
    },

    /// A membership payload was not valid base64 text.
    #[error("membership is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The operation exists on the API surface but has no defined behavior.
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

/// Result type for superset and packed-set operations.
pub type Result<T> = std::result::Result<T, SetError>;
