//! Vectorized algorithms over the geometry column of a [`GeoSeries`](crate::GeoSeries) or
//! [`GeoDataFrame`](crate::GeoDataFrame).
//!
//! Work is split along the chunks of the geometry column and, with the `rayon` feature,
//! chunks are processed in parallel.

pub mod aggregate;
pub mod constructive;
#[cfg(feature = "geos")]
pub(crate) mod geos;
pub mod measurement;
pub mod predicates;
#[cfg(feature = "proj")]
pub mod proj;
pub mod sjoin;

pub use constructive::{BufferOptions, CapStyle, Constructive, JoinStyle};
pub use measurement::Measurement;
pub use predicates::{PredicateFilter, Predicates};
pub use sjoin::{sjoin, JoinHow, SpatialJoinOptions, SpatialPredicate};

/// Number of rows evaluated per task by [`Predicates`].
pub const DEFAULT_PREDICATE_CHUNK_SIZE: usize = 1000;
