//! Contains [`GeoDataFrame`], attribute record batches paired with a geometry column.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow_array::{Array, ArrayRef, BooleanArray, RecordBatch, RecordBatchOptions, UInt32Array};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use geo::Geometry;

use crate::algorithm::{Constructive, Measurement, PredicateFilter, Predicates};
use crate::error::{GeoFrameError, Result};
use crate::series::GeoSeries;

/// Name of the geometry column in Arrow data.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Field metadata key holding the CRS of the geometry column.
pub const CRS_METADATA_KEY: &str = "crs";

/// A table of attribute columns with one geometry column.
///
/// Attributes are kept as Arrow record batches covering every row of the underlying data. The
/// active range of the [`GeoSeries`] is the active range of the whole frame: every operation
/// sees only those rows until [`GeoDataFrame::trim`] materializes them.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDataFrame {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    geometry: GeoSeries,
}

impl GeoDataFrame {
    /// Create a frame from attribute batches and a geometry column.
    ///
    /// `schema` describes the attributes only and must not contain a `geometry` field. The
    /// batches must hold exactly [`GeoSeries::length_original`] rows in total.
    pub fn try_new(
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
        geometry: GeoSeries,
    ) -> Result<Self> {
        if schema.column_with_name(GEOMETRY_COLUMN).is_some() {
            return Err(GeoFrameError::DuplicateColumn(GEOMETRY_COLUMN.to_string()));
        }
        if let Some(batch) = batches.iter().find(|batch| batch.schema() != schema) {
            return Err(GeoFrameError::IncorrectType(
                format!(
                    "Batch schema {:?} does not match frame schema {:?}",
                    batch.schema(),
                    schema
                )
                .into(),
            ));
        }
        let num_rows: usize = batches.iter().map(|batch| batch.num_rows()).sum();
        if num_rows != geometry.length_original() {
            return Err(GeoFrameError::LengthMismatch {
                expected: geometry.length_original(),
                actual: num_rows,
            });
        }
        Ok(Self {
            schema,
            batches,
            geometry,
        })
    }

    /// A frame with no attribute columns.
    pub fn from_geometry(geometry: GeoSeries) -> Self {
        let schema = Arc::new(Schema::empty());
        let options = RecordBatchOptions::new().with_row_count(Some(geometry.length_original()));
        let batches = RecordBatch::try_new_with_options(schema.clone(), vec![], &options)
            .map(|batch| vec![batch])
            .unwrap_or_default();
        Self {
            schema,
            batches,
            geometry,
        }
    }

    /// Number of rows in the active range.
    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of rows of the underlying data.
    pub fn length_original(&self) -> usize {
        self.geometry.length_original()
    }

    /// Schema of the attribute columns.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Names of the attribute columns, in order.
    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect()
    }

    pub fn geometry(&self) -> &GeoSeries {
        &self.geometry
    }

    pub fn crs(&self) -> Option<&str> {
        self.geometry.crs()
    }

    pub fn get_active_range(&self) -> (usize, usize) {
        self.geometry.get_active_range()
    }

    pub fn set_active_range(&mut self, i1: usize, i2: usize) -> Result<()> {
        self.geometry.set_active_range(i1, i2)
    }

    /// Attribute columns of the active range as one record batch.
    pub fn attributes(&self) -> Result<RecordBatch> {
        let (start, _) = self.get_active_range();
        let batch = match self.batches.len() {
            1 => self.batches[0].clone(),
            _ => concat_batches(&self.schema, &self.batches)?,
        };
        Ok(batch.slice(start, self.len()))
    }

    /// An attribute column over the active range.
    pub fn column(&self, name: &str) -> Result<ArrayRef> {
        self.attributes()?
            .column_by_name(name)
            .cloned()
            .ok_or_else(|| GeoFrameError::ColumnNotFound(name.to_string()))
    }

    /// Attributes of active row `i` as a single-row batch, with its geometry.
    pub fn row(&self, i: usize) -> Result<(RecordBatch, Option<Geometry>)> {
        let geometry = self.geometry.value(i)?;
        Ok((self.attributes()?.slice(i, 1), geometry))
    }

    /// A new frame whose underlying data is exactly the active range.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::{GeoDataFrame, GeoSeries};
    ///
    /// let series = GeoSeries::try_from_wkt(&["POINT(0 0)", "POINT(1 1)", "POINT(2 2)"], None).unwrap();
    /// let mut frame = GeoDataFrame::from_geometry(series);
    /// frame.set_active_range(1, 3).unwrap();
    /// let trimmed = frame.trim().unwrap();
    /// assert_eq!(trimmed.length_original(), 2);
    /// assert_eq!(trimmed.get_active_range(), (0, 2));
    /// ```
    pub fn trim(&self) -> Result<Self> {
        if self.len() == self.length_original() {
            return Ok(self.clone());
        }
        Self::try_new(
            self.schema.clone(),
            vec![self.attributes()?],
            self.geometry.trim(),
        )
    }

    /// A cheap copy sharing the underlying buffers and keeping the active range.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Gather active rows. Null indices produce null attributes and geometry.
    pub fn take(&self, indices: &UInt32Array) -> Result<Self> {
        let geometry = self.geometry.take(indices)?;
        let columns = self
            .attributes()?
            .columns()
            .iter()
            .map(|column| arrow::compute::take(column.as_ref(), indices, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let fields = self
            .schema
            .fields()
            .iter()
            .zip(&columns)
            .map(|(field, column)| {
                field
                    .as_ref()
                    .clone()
                    .with_nullable(field.is_nullable() || column.null_count() > 0)
            })
            .collect::<Vec<_>>();
        let schema = Arc::new(Schema::new_with_metadata(
            fields,
            self.schema.metadata().clone(),
        ));
        let options = RecordBatchOptions::new().with_row_count(Some(indices.len()));
        let attributes = RecordBatch::try_new_with_options(schema.clone(), columns, &options)?;
        Self::try_new(schema, vec![attributes], geometry)
    }

    /// Keep the active rows where `mask` is true.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self> {
        let geometry = self.geometry.filter(mask)?;
        let attributes = map_columns(&self.attributes()?, geometry.len(), |column| {
            arrow::compute::filter(column, mask)
        })?;
        Self::try_new(self.schema.clone(), vec![attributes], geometry)
    }

    /// Keep the active rows for which a predicate held.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::{GeoDataFrame, GeoSeries};
    ///
    /// let series = GeoSeries::try_from_wkt(&["POINT(0 0)", "POINT(5 5)"], None).unwrap();
    /// let frame = GeoDataFrame::from_geometry(series);
    /// let inside = frame
    ///     .predicates()
    ///     .within("POLYGON((-1 -1,1 -1,1 1,-1 1,-1 -1))")
    ///     .unwrap();
    /// assert_eq!(frame.filter_by(&inside).unwrap().len(), 1);
    /// ```
    pub fn filter_by(&self, predicate: &PredicateFilter) -> Result<Self> {
        self.filter(predicate.filter())
    }

    /// Rows `start..stop` of the active range, with negative bounds counting from the end.
    pub fn slice(&self, start: isize, stop: Option<isize>) -> Result<Self> {
        let geometry = self.geometry.slice(start, stop);
        let len = self.len() as isize;
        let offset = (if start < 0 { len + start } else { start }).clamp(0, len) as usize;
        let attributes = self.attributes()?.slice(offset, geometry.len());
        Self::try_new(self.schema.clone(), vec![attributes], geometry)
    }

    /// The first `n` active rows.
    pub fn head(&self, n: usize) -> Result<Self> {
        self.slice(0, Some(n.min(self.len()) as isize))
    }

    /// Append an attribute column holding one value per active row. The result is trimmed.
    pub fn add_column(&self, name: &str, array: ArrayRef) -> Result<Self> {
        if name == GEOMETRY_COLUMN || self.schema.column_with_name(name).is_some() {
            return Err(GeoFrameError::DuplicateColumn(name.to_string()));
        }
        if array.len() != self.len() {
            return Err(GeoFrameError::LengthMismatch {
                expected: self.len(),
                actual: array.len(),
            });
        }
        let attributes = self.attributes()?;
        let mut fields: Vec<Arc<Field>> = self.schema.fields().iter().cloned().collect();
        fields.push(Arc::new(Field::new(
            name,
            array.data_type().clone(),
            array.null_count() > 0,
        )));
        let schema = Arc::new(Schema::new_with_metadata(
            fields,
            self.schema.metadata().clone(),
        ));
        let mut columns = attributes.columns().to_vec();
        columns.push(array);
        let options = RecordBatchOptions::new().with_row_count(Some(self.len()));
        let batch = RecordBatch::try_new_with_options(schema.clone(), columns, &options)?;
        Self::try_new(schema, vec![batch], self.geometry.trim())
    }

    /// Remove attribute columns. Unknown names are an error.
    pub fn drop_columns(&self, names: &[&str]) -> Result<Self> {
        if let Some(missing) = names
            .iter()
            .find(|name| self.schema.column_with_name(name).is_none())
        {
            return Err(GeoFrameError::ColumnNotFound(missing.to_string()));
        }
        let keep: Vec<usize> = self
            .schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| !names.contains(&field.name().as_str()))
            .map(|(i, _)| i)
            .collect();
        let schema = Arc::new(self.schema.project(&keep)?);
        let batches = self
            .batches
            .iter()
            .map(|batch| project_batch(batch, &keep, &schema))
            .collect::<Result<Vec<_>>>()?;
        Self::try_new(schema, batches, self.geometry.clone())
    }

    /// Rename an attribute column.
    pub fn rename_column(&self, old: &str, new: &str) -> Result<Self> {
        self.rename_columns(&HashMap::from([(old.to_string(), new.to_string())]))
    }

    /// Rename several attribute columns at once. Every key must name an existing column.
    pub fn rename_columns(&self, renames: &HashMap<String, String>) -> Result<Self> {
        if let Some(missing) = renames
            .keys()
            .find(|name| self.schema.column_with_name(name).is_none())
        {
            return Err(GeoFrameError::ColumnNotFound(missing.to_string()));
        }
        let fields: Vec<Field> = self
            .schema
            .fields()
            .iter()
            .map(|field| match renames.get(field.name()) {
                Some(new) => field.as_ref().clone().with_name(new),
                None => field.as_ref().clone(),
            })
            .collect();
        let mut seen = Vec::with_capacity(fields.len());
        for field in fields.iter() {
            if field.name() == GEOMETRY_COLUMN || seen.contains(field.name()) {
                return Err(GeoFrameError::DuplicateColumn(field.name().to_string()));
            }
            seen.push(field.name().to_string());
        }
        let schema = Arc::new(Schema::new_with_metadata(
            fields,
            self.schema.metadata().clone(),
        ));
        let all: Vec<usize> = (0..schema.fields().len()).collect();
        let batches = self
            .batches
            .iter()
            .map(|batch| project_batch(batch, &all, &schema))
            .collect::<Result<Vec<_>>>()?;
        Self::try_new(schema, batches, self.geometry.clone())
    }

    /// Replace the geometry column with one row per active row. The frame is trimmed to its
    /// active range first.
    pub fn set_geometry(&mut self, geometry: GeoSeries) -> Result<()> {
        if geometry.len() != self.len() {
            return Err(GeoFrameError::LengthMismatch {
                expected: self.len(),
                actual: geometry.len(),
            });
        }
        let trimmed = self.trim()?;
        self.schema = trimmed.schema;
        self.batches = trimmed.batches;
        self.geometry = geometry.trim();
        Ok(())
    }

    /// A trimmed copy of this frame with its geometry replaced.
    pub fn with_geometry(&self, geometry: GeoSeries) -> Result<Self> {
        let mut output = self.clone();
        output.set_geometry(geometry)?;
        Ok(output)
    }

    /// The frame with each geometry replaced by its convex hull.
    pub fn convex_hull(&self) -> Result<Self> {
        self.constructive().convex_hull()
    }

    /// Reproject the geometry column to `target`.
    #[cfg(feature = "proj")]
    pub fn to_crs(&self, target: &str) -> Result<Self> {
        let geometry = self.geometry.to_crs(target)?;
        self.with_geometry(geometry)
    }

    pub fn predicates(&self) -> Predicates<'_> {
        Predicates::new(&self.geometry)
    }

    pub fn measurement(&self) -> Measurement<'_> {
        Measurement::new(&self.geometry)
    }

    pub fn constructive(&self) -> Constructive<'_> {
        Constructive::new(self)
    }

    /// Schema of the Arrow data produced by [`GeoDataFrame::to_record_batches`]: the
    /// attributes followed by a `geometry` binary field carrying the CRS as metadata.
    pub fn arrow_schema(&self) -> SchemaRef {
        let mut metadata = HashMap::new();
        if let Some(crs) = self.crs() {
            metadata.insert(CRS_METADATA_KEY.to_string(), crs.to_string());
        }
        let geometry_field =
            Field::new(GEOMETRY_COLUMN, DataType::Binary, true).with_metadata(metadata);
        let mut fields: Vec<Arc<Field>> = self.schema.fields().iter().cloned().collect();
        fields.push(Arc::new(geometry_field));
        Arc::new(Schema::new_with_metadata(
            fields,
            self.schema.metadata().clone(),
        ))
    }

    /// The active range as Arrow record batches including the geometry column, split like the
    /// underlying attribute batches.
    pub fn to_record_batches(&self) -> Result<Vec<RecordBatch>> {
        let trimmed = self.trim()?;
        let schema = trimmed.arrow_schema();
        let geometry = trimmed.geometry.raw_geometry();
        let mut offset = 0;
        let mut output = Vec::with_capacity(trimmed.batches.len());
        for batch in trimmed.batches.iter() {
            let wkb = geometry
                .slice(offset, batch.num_rows())
                .concat_or(arrow_array::BinaryArray::from(Vec::<Option<&[u8]>>::new()))?;
            let mut columns = batch.columns().to_vec();
            columns.push(Arc::new(wkb));
            output.push(RecordBatch::try_new(schema.clone(), columns)?);
            offset += batch.num_rows();
        }
        Ok(output)
    }

    /// Split into attribute schema, attribute batches and geometry.
    pub fn into_parts(self) -> (SchemaRef, Vec<RecordBatch>, GeoSeries) {
        (self.schema, self.batches, self.geometry)
    }
}

/// Apply a kernel to every column of a batch, keeping the row count when there are no columns.
fn map_columns<F>(batch: &RecordBatch, num_rows: usize, kernel: F) -> Result<RecordBatch>
where
    F: Fn(&dyn Array) -> std::result::Result<ArrayRef, arrow_schema::ArrowError>,
{
    let columns = batch
        .columns()
        .iter()
        .map(|column| kernel(column.as_ref()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(
        batch.schema(),
        columns,
        &options,
    )?)
}

fn project_batch(batch: &RecordBatch, indices: &[usize], schema: &SchemaRef) -> Result<RecordBatch> {
    let columns = indices
        .iter()
        .map(|i| batch.column(*i).clone())
        .collect::<Vec<_>>();
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(
        schema.clone(),
        columns,
        &options,
    )?)
}
