use std::io::Write;

use arrow_ipc::writer::{FileWriter, StreamWriter};
#[cfg(feature = "ipc_compression")]
use arrow_ipc::writer::IpcWriteOptions;
use tracing::info;

use crate::error::Result;
use crate::frame::GeoDataFrame;

/// Write the active range of a frame to an Arrow IPC (Feather v2) file.
pub fn write_ipc<W: Write>(frame: &GeoDataFrame, writer: W) -> Result<()> {
    let schema = frame.arrow_schema();
    let mut writer = FileWriter::try_new(writer, &schema)?;
    for batch in frame.to_record_batches()? {
        writer.write(&batch)?;
    }
    writer.finish()?;
    info!("Wrote {} rows as IPC file", frame.len());
    Ok(())
}

/// Write the active range of a frame to an Arrow IPC stream.
pub fn write_ipc_stream<W: Write>(frame: &GeoDataFrame, writer: W) -> Result<()> {
    let schema = frame.arrow_schema();
    let mut writer = StreamWriter::try_new(writer, &schema)?;
    for batch in frame.to_record_batches()? {
        writer.write(&batch)?;
    }
    writer.finish()?;
    info!("Wrote {} rows as IPC stream", frame.len());
    Ok(())
}

/// Buffer compression codecs for IPC files.
#[cfg(feature = "ipc_compression")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcCompression {
    Lz4,
    Zstd,
}

#[cfg(feature = "ipc_compression")]
impl From<IpcCompression> for arrow_ipc::CompressionType {
    fn from(value: IpcCompression) -> Self {
        match value {
            IpcCompression::Lz4 => arrow_ipc::CompressionType::LZ4_FRAME,
            IpcCompression::Zstd => arrow_ipc::CompressionType::ZSTD,
        }
    }
}

/// Write an IPC file with compressed buffers.
#[cfg(feature = "ipc_compression")]
pub fn write_ipc_compressed<W: Write>(
    frame: &GeoDataFrame,
    writer: W,
    compression: IpcCompression,
) -> Result<()> {
    let schema = frame.arrow_schema();
    let options = IpcWriteOptions::default().try_with_compression(Some(compression.into()))?;
    let mut writer = FileWriter::try_new_with_options(writer, &schema, options)?;
    for batch in frame.to_record_batches()? {
        writer.write(&batch)?;
    }
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::ipc::{read_ipc, read_ipc_stream};
    use crate::test::frame::point_frame;
    use std::io::Cursor;

    #[test]
    fn writes_active_range_only() {
        let mut frame = point_frame();
        frame.set_active_range(1, 4).unwrap();

        let mut buffer = Vec::new();
        write_ipc_stream(&frame, &mut buffer).unwrap();
        let read = read_ipc_stream(Cursor::new(buffer)).unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read.geometry().to_wkt().unwrap()[0].as_deref(), Some("POINT(1 1)"));

        let mut buffer = Vec::new();
        write_ipc(&frame, &mut buffer).unwrap();
        let read = read_ipc(Cursor::new(buffer)).unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read.crs(), Some("EPSG:4326"));
    }

    #[cfg(feature = "ipc_compression")]
    #[test]
    fn compressed_file() {
        let frame = point_frame();
        let mut buffer = Vec::new();
        write_ipc_compressed(&frame, &mut buffer, IpcCompression::Zstd).unwrap();
        let read = read_ipc(Cursor::new(buffer)).unwrap();
        assert_eq!(read.len(), 5);
    }
}
