use std::sync::Arc;

use arrow_array::{Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};

use crate::frame::GeoDataFrame;
use crate::test::series::{point_series, polygon_series, zone_series};

/// [`point_series`] with `id` and `name` attributes split over two batches.
pub(crate) fn point_frame() -> GeoDataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
    ]));
    let first = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![0, 1])),
            Arc::new(StringArray::from(vec!["a", "b"])),
        ],
    )
    .unwrap();
    let second = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![2, 3, 4])),
            Arc::new(StringArray::from(vec!["c", "d", "e"])),
        ],
    )
    .unwrap();
    GeoDataFrame::try_new(schema, vec![first, second], point_series()).unwrap()
}

/// [`polygon_series`] with `id` and `label` attributes.
pub(crate) fn polygon_frame() -> GeoDataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("label", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![0, 1, 2])),
            Arc::new(StringArray::from(vec![Some("low"), Some("high"), None])),
        ],
    )
    .unwrap();
    GeoDataFrame::try_new(schema, vec![batch], polygon_series()).unwrap()
}

/// [`zone_series`] with `id` and `zone` attributes.
pub(crate) fn zone_frame() -> GeoDataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("zone", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![0, 1])),
            Arc::new(StringArray::from(vec!["west", "east"])),
        ],
    )
    .unwrap();
    GeoDataFrame::try_new(schema, vec![batch], zone_series()).unwrap()
}
