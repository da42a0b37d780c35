//! Read delimited text with a WKT column or a pair of coordinate columns.

pub use reader::{csv_to_ipc, read_csv, CsvGeometry, CsvOptions};

mod reader;
