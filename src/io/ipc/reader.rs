use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use arrow_array::cast::AsArray;
use arrow_array::{BinaryArray, RecordBatch, RecordBatchReader};
use arrow_ipc::reader::{FileReader, StreamReader};
use arrow_schema::{ArrowError, DataType, SchemaRef};
use tracing::info;

use crate::chunked_array::ChunkedArray;
use crate::error::{GeoFrameError, Result};
use crate::frame::{GeoDataFrame, CRS_METADATA_KEY, GEOMETRY_COLUMN};
use crate::series::GeoSeries;

/// Leading magic bytes of the IPC file format.
const ARROW_MAGIC: &[u8; 6] = b"ARROW1";

/// Read an Arrow IPC file or stream from disk, detecting the format from its first bytes.
pub fn open(path: impl AsRef<Path>) -> Result<GeoDataFrame> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let mut magic = [0u8; 6];
    let is_file = match file.read_exact(&mut magic) {
        Ok(()) => &magic == ARROW_MAGIC,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(err) => return Err(err.into()),
    };
    file.seek(SeekFrom::Start(0))?;

    let frame = if is_file {
        read_ipc(BufReader::new(file))?
    } else {
        read_ipc_stream(BufReader::new(file))?
    };
    info!(
        "Opened {} {}, {} rows",
        if is_file { "IPC file" } else { "IPC stream" },
        path.display(),
        frame.len()
    );
    Ok(frame)
}

/// Read a frame from an Arrow IPC (Feather v2) file.
pub fn read_ipc<R: Read + Seek>(reader: R) -> Result<GeoDataFrame> {
    read_batches(FileReader::try_new(reader, None)?)
}

/// Read a frame from an Arrow IPC record batch stream.
pub fn read_ipc_stream<R: Read>(reader: R) -> Result<GeoDataFrame> {
    read_batches(StreamReader::try_new(reader, None)?)
}

fn read_batches(reader: impl RecordBatchReader) -> Result<GeoDataFrame> {
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<RecordBatch>, ArrowError>>()?;
    from_record_batches(schema, batches)
}

/// Split record batches into attributes and the `geometry` column.
///
/// `LargeBinary` geometry is cast to `Binary`.
pub fn from_record_batches(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<GeoDataFrame> {
    let (geometry_index, geometry_field) = schema
        .column_with_name(GEOMETRY_COLUMN)
        .ok_or(GeoFrameError::MissingGeometry)?;
    if !matches!(
        geometry_field.data_type(),
        DataType::Binary | DataType::LargeBinary
    ) {
        return Err(GeoFrameError::IncorrectType(
            format!(
                "Geometry column must be Binary or LargeBinary WKB, got {}",
                geometry_field.data_type()
            )
            .into(),
        ));
    }
    let crs = geometry_field.metadata().get(CRS_METADATA_KEY).cloned();

    let attribute_indices: Vec<usize> = (0..schema.fields().len())
        .filter(|i| *i != geometry_index)
        .collect();
    let attribute_schema = std::sync::Arc::new(schema.project(&attribute_indices)?);

    let mut attributes = Vec::with_capacity(batches.len());
    let mut chunks: Vec<BinaryArray> = Vec::with_capacity(batches.len());
    for batch in batches.iter() {
        let column = batch.column(geometry_index);
        let wkb = match column.data_type() {
            DataType::Binary => column.as_binary::<i32>().clone(),
            _ => arrow_cast::cast(column, &DataType::Binary)?
                .as_binary::<i32>()
                .clone(),
        };
        chunks.push(wkb);
        let projected = batch.project(&attribute_indices)?;
        attributes.push(RecordBatch::try_new_with_options(
            attribute_schema.clone(),
            projected.columns().to_vec(),
            &arrow_array::RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
        )?);
    }

    let geometry = GeoSeries::new(ChunkedArray::try_new(chunks)?, crs);
    GeoDataFrame::try_new(attribute_schema, attributes, geometry)
}
