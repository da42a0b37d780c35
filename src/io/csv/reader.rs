use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::Float64Type;
use arrow_array::{Array, BinaryArray, RecordBatch, RecordBatchOptions};
use arrow_csv::reader::Format;
use arrow_csv::ReaderBuilder;
use arrow_schema::{DataType, SchemaRef};
use geo::{Geometry, Point};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chunked_array::ChunkedArray;
use crate::error::{GeoFrameError, Result};
use crate::frame::GeoDataFrame;
use crate::geometry::{from_wkt, to_wkb};
use crate::io::ipc::write_ipc_stream;
use crate::series::GeoSeries;

/// Where the geometry of each CSV row comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvGeometry {
    /// A column of WKT text. The column is not kept as an attribute.
    Wkt(String),
    /// Point coordinates from two numeric columns, which stay attributes.
    Points { x: String, y: String },
}

impl Default for CsvGeometry {
    fn default() -> Self {
        CsvGeometry::Wkt("wkt".to_string())
    }
}

/// Options for the CSV reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub geometry: CsvGeometry,

    /// CRS assigned to the geometry column.
    pub crs: Option<String>,

    pub delimiter: u8,

    pub has_header: bool,

    /// The number of rows in each batch.
    pub batch_size: usize,

    /// Rows read to infer the schema. `None` reads the whole input.
    pub max_infer_records: Option<usize>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            geometry: CsvGeometry::default(),
            crs: None,
            delimiter: b',',
            has_header: true,
            batch_size: 65_536,
            max_infer_records: Some(1000),
        }
    }
}

/// Read a CSV file to a [`GeoDataFrame`], inferring column types from the data.
pub fn read_csv<R: Read + Seek>(mut reader: R, options: &CsvOptions) -> Result<GeoDataFrame> {
    let format = Format::default()
        .with_header(options.has_header)
        .with_delimiter(options.delimiter);
    let (schema, _) = format.infer_schema(&mut reader, options.max_infer_records)?;
    reader.seek(SeekFrom::Start(0))?;
    let schema: SchemaRef = Arc::new(schema);

    let csv = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .with_batch_size(options.batch_size)
        .build(reader)?;

    let (attribute_indices, attribute_schema) = match &options.geometry {
        CsvGeometry::Wkt(column) => {
            let (index, _) = schema
                .column_with_name(column)
                .ok_or_else(|| GeoFrameError::ColumnNotFound(column.clone()))?;
            let keep: Vec<usize> = (0..schema.fields().len()).filter(|i| *i != index).collect();
            let projected = Arc::new(schema.project(&keep)?);
            (keep, projected)
        }
        CsvGeometry::Points { x, y } => {
            for column in [x, y] {
                if schema.column_with_name(column).is_none() {
                    return Err(GeoFrameError::ColumnNotFound(column.clone()));
                }
            }
            ((0..schema.fields().len()).collect(), schema.clone())
        }
    };

    let mut attributes = Vec::new();
    let mut chunks = Vec::new();
    for batch in csv {
        let batch = batch?;
        chunks.push(geometry_chunk(&batch, &options.geometry)?);
        let columns = attribute_indices
            .iter()
            .map(|i| batch.column(*i).clone())
            .collect();
        attributes.push(RecordBatch::try_new_with_options(
            attribute_schema.clone(),
            columns,
            &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
        )?);
    }

    let geometry = GeoSeries::new(ChunkedArray::try_new(chunks)?, options.crs.clone());
    info!("Read {} rows from CSV", geometry.len());
    GeoDataFrame::try_new(attribute_schema, attributes, geometry)
}

fn geometry_chunk(batch: &RecordBatch, geometry: &CsvGeometry) -> Result<BinaryArray> {
    let column = |name: &str| {
        batch
            .column_by_name(name)
            .cloned()
            .ok_or_else(|| GeoFrameError::ColumnNotFound(name.to_string()))
    };
    let wkb: Vec<Option<Vec<u8>>> = match geometry {
        CsvGeometry::Wkt(name) => {
            let text = arrow_cast::cast(column(name)?.as_ref(), &DataType::Utf8)?;
            text.as_string::<i32>()
                .iter()
                .map(|maybe_wkt| match maybe_wkt {
                    Some(wkt) if !wkt.trim().is_empty() => Ok(Some(to_wkb(&from_wkt(wkt)?)?)),
                    _ => Ok(None),
                })
                .collect::<Result<_>>()?
        }
        CsvGeometry::Points { x, y } => {
            let xs = arrow_cast::cast(column(x)?.as_ref(), &DataType::Float64)?;
            let ys = arrow_cast::cast(column(y)?.as_ref(), &DataType::Float64)?;
            let xs = xs.as_primitive::<Float64Type>();
            let ys = ys.as_primitive::<Float64Type>();
            (0..batch.num_rows())
                .map(|i| {
                    if xs.is_null(i) || ys.is_null(i) {
                        return Ok(None);
                    }
                    let point = Geometry::Point(Point::new(xs.value(i), ys.value(i)));
                    Ok(Some(to_wkb(&point)?))
                })
                .collect::<Result<_>>()?
        }
    };
    Ok(wkb.into_iter().collect())
}

/// Read a CSV file and write it out as an Arrow IPC stream.
pub fn csv_to_ipc<R: Read + Seek, W: Write>(
    reader: R,
    writer: W,
    options: &CsvOptions,
) -> Result<()> {
    let frame = read_csv(reader, options)?;
    write_ipc_stream(&frame, writer)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::ipc::read_ipc_stream;
    use std::io::Cursor;

    const WKT_CSV: &str = "id,name,wkt\n1,a,POINT(1 2)\n2,b,\"LINESTRING(0 0,1 1)\"\n3,c,\n";

    #[test]
    fn read_wkt_column() {
        let frame = read_csv(Cursor::new(WKT_CSV), &CsvOptions::default()).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.column_names(), vec!["id", "name"]);
        assert_eq!(frame.schema().field(0).data_type(), &DataType::Int64);
        let wkt = frame.geometry().to_wkt().unwrap();
        assert_eq!(wkt[0].as_deref(), Some("POINT(1 2)"));
        assert_eq!(wkt[1].as_deref(), Some("LINESTRING(0 0,1 1)"));
        assert_eq!(wkt[2], None);
    }

    #[test]
    fn read_point_columns() {
        let data = "lon;lat;label\n1.5;2.5;x\n3;4;y\n";
        let options = CsvOptions {
            geometry: CsvGeometry::Points {
                x: "lon".to_string(),
                y: "lat".to_string(),
            },
            crs: Some("EPSG:4326".to_string()),
            delimiter: b';',
            batch_size: 1,
            ..Default::default()
        };
        let frame = read_csv(Cursor::new(data), &options).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.geometry().raw_geometry().num_chunks(), 2);
        assert_eq!(frame.column_names(), vec!["lon", "lat", "label"]);
        assert_eq!(
            frame.geometry().to_wkt().unwrap()[1].as_deref(),
            Some("POINT(3 4)")
        );
        assert_eq!(frame.crs(), Some("EPSG:4326"));
    }

    #[test]
    fn missing_geometry_column() {
        let options = CsvOptions {
            geometry: CsvGeometry::Wkt("geom".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            read_csv(Cursor::new(WKT_CSV), &options),
            Err(GeoFrameError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn convert_to_ipc() {
        let mut buffer = Vec::new();
        csv_to_ipc(Cursor::new(WKT_CSV), &mut buffer, &CsvOptions::default()).unwrap();
        let frame = read_ipc_stream(Cursor::new(buffer)).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.column_names(), vec!["id", "name"]);
    }
}
