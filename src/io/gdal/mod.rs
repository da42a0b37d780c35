//! Read vector formats through GDAL/OGR.

pub use reader::{gdal_to_ipc, read_gdal, GdalReadOptions, PointColumns};

mod reader;
