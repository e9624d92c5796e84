use crate::{
    admission::AdmissionError,
    codec::CodecError,
    config::ConfigError,
    order::OrderError,
    path::PathError,
    registry::RegistryError,
    request::ParseError,
    tree::{BuildError, RewriteError, TreeError},
    validate::ValidationErrors,
};
use derive_more::Display;
use thiserror::Error as ThisError;

///
/// Error
///
/// Crate-level union of every module error.
/// Callers that only need the propagation policy should match on
/// [`Error::class`] instead of the variants.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

impl Error {
    /// Stable classification used to decide how a failure propagates.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Admission(_) => ErrorClass::Admission,
            Self::Build(_) => ErrorClass::Build,
            Self::Codec(_) => ErrorClass::Codec,
            Self::Config(_) => ErrorClass::Config,
            Self::Order(_) | Self::Path(_) | Self::Validation(_) => ErrorClass::Validation,
            Self::Parse(_) | Self::Registry(_) | Self::Rewrite(_) | Self::Tree(_) => {
                ErrorClass::Construction
            }
        }
    }
}

///
/// ErrorClass
///
/// Construction and build failures abort on the first error.
/// Validation failures are accumulated across the whole tree.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ErrorClass {
    Admission,
    Build,
    Codec,
    Config,
    Construction,
    Validation,
}

impl ErrorClass {
    /// Whether errors of this class are collected rather than raised
    /// on first occurrence.
    #[must_use]
    pub const fn is_accumulated(self) -> bool {
        matches!(self, Self::Validation)
    }
}

///
/// TESTS
///
