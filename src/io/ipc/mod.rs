//! Read and write frames as Arrow IPC files and streams.
//!
//! The geometry column is the `geometry` field, stored as WKB in a `Binary` or `LargeBinary`
//! column. Its CRS travels in the field metadata under the `crs` key.

pub use reader::{from_record_batches, open, read_ipc, read_ipc_stream};
#[cfg(feature = "ipc_compression")]
pub use writer::{write_ipc_compressed, IpcCompression};
pub use writer::{write_ipc, write_ipc_stream};

mod reader;
mod writer;
