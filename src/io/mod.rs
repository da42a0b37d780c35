//! Readers and writers for frames: Arrow IPC always, CSV and GDAL/OGR behind features, and
//! plain-text display.

#[cfg(feature = "csv")]
pub mod csv;
pub(crate) mod display;
#[cfg(feature = "gdal")]
pub mod gdal;
pub mod ipc;
