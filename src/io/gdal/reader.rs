use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::ffi_stream::{ArrowArrayStreamReader, FFI_ArrowArrayStream};
use arrow::record_batch::RecordBatchReader;
use arrow_array::RecordBatch;
use arrow_ipc::writer::StreamWriter;
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use gdal::cpl::CslStringList;
use gdal::vector::{Layer, LayerAccess};
use gdal::Dataset;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;
#[cfg(not(feature = "proj"))]
use tracing::warn;

use crate::error::{GeoFrameError, Result};
use crate::frame::{GeoDataFrame, CRS_METADATA_KEY, GEOMETRY_COLUMN};
use crate::io::ipc::from_record_batches;

/// Names of the x and y columns of a delimited text file holding points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointColumns {
    pub x: String,
    pub y: String,
}

/// Options for [`read_gdal`] and [`gdal_to_ipc`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GdalReadOptions {
    /// Build point geometry from two columns instead of the layer geometry.
    pub point_columns: Option<PointColumns>,

    /// CRS of the output. Assigned when the source has none, otherwise the data is
    /// reprojected (with the `proj` feature).
    pub target_crs: Option<String>,

    /// The number of features in each batch.
    pub batch_size: usize,
}

impl Default for GdalReadOptions {
    fn default() -> Self {
        Self {
            point_columns: None,
            target_crs: None,
            batch_size: 2_000_000,
        }
    }
}

/// Read the first layer of any OGR-readable file.
///
/// Note that this expects GDAL 3.8 or later to propagate the CRS information correctly.
pub fn read_gdal(path: impl AsRef<Path>, options: &GdalReadOptions) -> Result<GeoDataFrame> {
    let mut batches = Vec::new();
    let schema = for_each_batch(path.as_ref(), options, |frame| {
        batches.extend(frame.to_record_batches()?);
        Ok(())
    })?;
    from_record_batches(schema, batches)
}

/// Convert the first layer of an OGR-readable file into an Arrow IPC stream, one batch of
/// `batch_size` features at a time.
pub fn gdal_to_ipc<W: Write>(
    input: impl AsRef<Path>,
    output: W,
    options: &GdalReadOptions,
) -> Result<()> {
    let mut writer: Option<StreamWriter<W>> = None;
    let mut output = Some(output);
    let schema = for_each_batch(input.as_ref(), options, |frame| {
        if writer.is_none() {
            let sink = output
                .take()
                .ok_or(GeoFrameError::General("Closed stream".to_string()))?;
            writer = Some(StreamWriter::try_new(sink, &frame.arrow_schema())?);
        }
        if let Some(writer) = writer.as_mut() {
            for batch in frame.to_record_batches()? {
                writer.write(&batch)?;
            }
        }
        Ok(())
    })?;
    let mut writer = match (writer, output) {
        (Some(writer), _) => writer,
        // No features: still write a schema
        (None, Some(sink)) => StreamWriter::try_new(sink, &schema)?,
        (None, None) => return Err(GeoFrameError::General("Closed stream".to_string())),
    };
    writer.finish()?;
    Ok(())
}

/// Open `path`, stream its first layer and hand every batch to `op` as a frame. Returns the
/// output schema.
fn for_each_batch<F>(path: &Path, options: &GdalReadOptions, mut op: F) -> Result<SchemaRef>
where
    F: FnMut(GeoDataFrame) -> Result<()>,
{
    // The VRT must outlive the dataset
    let (_vrt, dataset) = match &options.point_columns {
        Some(columns) => {
            let file = write_point_vrt(path, columns, options.target_crs.as_deref())?;
            let dataset = Dataset::open(file.path())?;
            (Some(file), dataset)
        }
        None => (None, Dataset::open(path)?),
    };
    info!(
        "Opened file {}, using driver {}",
        path.display(),
        dataset.driver().short_name()
    );

    let mut layer = dataset.layer(0)?;
    info!("Found {} features", layer.feature_count());

    let source_crs = layer_crs(&layer);
    let crs = source_crs.clone().or_else(|| options.target_crs.clone());
    let reproject_to = match (&source_crs, &options.target_crs) {
        (Some(source), Some(target)) if source != target => Some(target.clone()),
        _ => None,
    };
    #[cfg(not(feature = "proj"))]
    if let Some(target) = &reproject_to {
        warn!(
            "Target CRS {} ignored: reprojection needs the proj feature, keeping {:?}",
            target, crs
        );
    }

    let reader = read_layer_stream(&mut layer, options.batch_size)?;
    let schema = normalize_schema(&reader.schema(), crs.as_deref())?;
    let mut output_schema = binary_geometry_schema(&schema)?;
    for batch in reader {
        let batch = RecordBatch::try_new(schema.clone(), batch?.columns().to_vec())?;
        #[allow(unused_mut)]
        let mut frame = from_record_batches(schema.clone(), vec![batch])?;
        #[cfg(feature = "proj")]
        if let Some(target) = &reproject_to {
            frame = frame.to_crs(target)?;
        }
        output_schema = frame.arrow_schema();
        op(frame)?;
    }
    Ok(output_schema)
}

/// Open an Arrow stream over the layer's features.
fn read_layer_stream(layer: &mut Layer, batch_size: usize) -> Result<ArrowArrayStreamReader> {
    // Instantiate an `ArrowArrayStream` for OGR to write into
    let mut output_stream = FFI_ArrowArrayStream::empty();

    // Take a pointer to it
    let output_stream_ptr = &mut output_stream as *mut FFI_ArrowArrayStream;

    // GDAL includes its own copy of the ArrowArrayStream struct definition. These are guaranteed
    // to be the same across implementations, but we need to manually cast between the two for Rust
    // to allow it.
    let gdal_pointer: *mut gdal::ArrowArrayStream = output_stream_ptr.cast();

    let mut options = CslStringList::new();
    options.set_name_value("MAX_FEATURES_IN_BATCH", batch_size.to_string().as_str())?;
    options.set_name_value("GEOMETRY_METADATA_ENCODING", "GEOARROW")?;

    // Read the layer's data into our provisioned pointer
    unsafe { layer.read_arrow_stream(gdal_pointer, &options)? }

    Ok(ArrowArrayStreamReader::try_new(output_stream)?)
}

/// `AUTHORITY:CODE` of the layer's spatial reference.
fn layer_crs(layer: &Layer) -> Option<String> {
    let spatial_ref = layer.spatial_ref()?;
    let name = spatial_ref.auth_name().ok()?;
    let code = spatial_ref.auth_code().ok()?;
    Some(format!("{name}:{code}"))
}

/// Rename the WKB column GDAL produces to `geometry` and attach the CRS.
fn normalize_schema(schema: &SchemaRef, crs: Option<&str>) -> Result<SchemaRef> {
    let geometry_index = schema
        .fields()
        .iter()
        .position(|field| {
            field
                .metadata()
                .get("ARROW:extension:name")
                .is_some_and(|name| name == "ogc.wkb" || name == "geoarrow.wkb")
        })
        .or_else(|| {
            schema
                .fields()
                .iter()
                .position(|field| field.name() == "wkb_geometry" || field.name() == GEOMETRY_COLUMN)
        })
        .ok_or(GeoFrameError::MissingGeometry)?;

    let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len());
    for (i, field) in schema.fields().iter().enumerate() {
        if i == geometry_index {
            let mut metadata = HashMap::new();
            if let Some(crs) = crs {
                metadata.insert(CRS_METADATA_KEY.to_string(), crs.to_string());
            }
            fields.push(
                Field::new(GEOMETRY_COLUMN, field.data_type().clone(), true).with_metadata(metadata),
            );
        } else if field.name() == GEOMETRY_COLUMN {
            return Err(GeoFrameError::DuplicateColumn(GEOMETRY_COLUMN.to_string()));
        } else {
            fields.push(field.as_ref().clone());
        }
    }
    Ok(Arc::new(Schema::new_with_metadata(
        fields,
        schema.metadata().clone(),
    )))
}

/// Schema written by [`gdal_to_ipc`] when the layer holds no batches.
fn binary_geometry_schema(schema: &SchemaRef) -> Result<SchemaRef> {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| {
            if field.name() == GEOMETRY_COLUMN {
                field.as_ref().clone().with_data_type(DataType::Binary)
            } else {
                field.as_ref().clone()
            }
        })
        .collect();
    Ok(Arc::new(Schema::new_with_metadata(
        fields,
        schema.metadata().clone(),
    )))
}

/// A VRT wrapping a delimited text file whose points come from two columns.
fn write_point_vrt(
    path: &Path,
    columns: &PointColumns,
    crs: Option<&str>,
) -> Result<NamedTempFile> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| GeoFrameError::General(format!("Invalid file name {}", path.display())))?;
    let name = escape_xml(name);
    let srs = crs
        .map(|crs| format!("<LayerSRS>{}</LayerSRS>", escape_xml(crs)))
        .unwrap_or_default();
    let xml = format!(
        "<OGRVRTDataSource><OGRVRTLayer name=\"{name}\"><SrcDataSource>{source}</SrcDataSource>\
         <SrcLayer>{name}</SrcLayer><GeometryType>wkbPoint</GeometryType>{srs}\
         <GeometryField encoding=\"PointFromColumns\" x=\"{x}\" y=\"{y}\"/></OGRVRTLayer>\
         </OGRVRTDataSource>",
        source = escape_xml(&path.display().to_string()),
        x = escape_xml(&columns.x),
        y = escape_xml(&columns.y),
    );
    let mut file = tempfile::Builder::new().suffix(".vrt").tempfile()?;
    file.write_all(xml.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
