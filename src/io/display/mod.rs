//! Plain-text rendering of series, frames and lazy expressions.

mod scalar;
mod table;

pub(crate) use scalar::{format_geometry, DEFAULT_MAX_WIDTH};
pub(crate) use table::{head_and_tail, TextTable};
