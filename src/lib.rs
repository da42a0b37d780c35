//! Geospatial dataframes on Apache Arrow.
//!
//! A [`GeoDataFrame`] pairs attribute record batches with a [`GeoSeries`], a chunked column of
//! WKB geometries. Both share an active range of rows, so narrowing a frame is free until it
//! is [trimmed](GeoDataFrame::trim). On top of that the crate provides DE-9IM predicates,
//! measurements, constructive operations, whole-column aggregates, an R-tree backed
//! [spatial join](sjoin) and Arrow IPC, CSV and GDAL I/O.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub use algorithm::sjoin::sjoin;
pub use frame::GeoDataFrame;
pub use series::GeoSeries;

pub mod algorithm;
pub mod chunked_array;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod io;
pub mod lazy;
pub mod series;
#[cfg(test)]
pub(crate) mod test;
