//! Flatten a scan tool's JSON output into headerless CSV rows using a small jq-style projection.

mod error;
mod eval;
mod projection;
mod report;

pub use error::{ProjectionError, TransformError};
pub use eval::project;
pub use projection::{Projection, Segment};
pub use report::{read_records, transform_file, write_rows};
