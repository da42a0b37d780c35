//! Defines [`GeoFrameError`], representing all errors returned by this crate.

use arrow_schema::ArrowError;
use std::borrow::Cow;
use std::fmt::Debug;
use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GeoFrameError {
    /// Incorrect type was passed to an operation.
    #[error("Incorrect type passed to operation: {0}")]
    IncorrectType(Cow<'static, str>),

    /// General error.
    #[error("General error: {0}")]
    General(String),

    /// The input table has no `geometry` column.
    #[error("Geometry not found in input")]
    MissingGeometry,

    /// A row index fell outside of the active range.
    #[error("Index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    /// An active range that does not fit the underlying data.
    #[error("Invalid active range {start}..{end} for length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// Two inputs that must be row-aligned have different lengths.
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A named attribute column does not exist.
    #[error("Column {0:?} does not exist")]
    ColumnNotFound(String),

    /// A column name would appear twice in the output.
    #[error("Column {0:?} already exists")]
    DuplicateColumn(String),

    /// A join matched one kept row against several rows while duplication is disabled.
    #[error("Join would duplicate row {0}, but duplication is disabled")]
    Duplication(usize),

    /// The two sides of an operation use different coordinate reference systems.
    #[error("CRS mismatch: {left:?} != {right:?}")]
    CrsMismatch {
        left: Option<String>,
        right: Option<String>,
    },

    /// [ArrowError]
    #[error(transparent)]
    Arrow(#[from] ArrowError),

    /// [gdal::errors::GdalError]
    #[cfg(feature = "gdal")]
    #[error(transparent)]
    GdalError(#[from] gdal::errors::GdalError),

    /// [geozero::error::GeozeroError]
    #[error(transparent)]
    GeozeroError(#[from] geozero::error::GeozeroError),

    /// [geos::Error]
    #[cfg(feature = "geos")]
    #[error(transparent)]
    GeosError(#[from] geos::Error),

    /// [proj::ProjError]
    #[cfg(feature = "proj")]
    #[error(transparent)]
    ProjError(#[from] proj::ProjError),

    /// [proj::ProjCreateError]
    #[cfg(feature = "proj")]
    #[error(transparent)]
    ProjCreateError(#[from] proj::ProjCreateError),

    /// [std::io::Error]
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, GeoFrameError>;

impl From<GeoFrameError> for ArrowError {
    fn from(err: GeoFrameError) -> Self {
        match err {
            GeoFrameError::Arrow(err) => err,
            _ => ArrowError::ExternalError(Box::new(err)),
        }
    }
}
