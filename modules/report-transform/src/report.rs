use crate::error::TransformError;
use crate::eval::project;
use crate::projection::Projection;
use serde_json::{Deserializer, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load the records of a raw tool output file.
///
/// The file is read as a stream of JSON values: a top-level array contributes each of its
/// elements, a top-level object is a record on its own (JSON lines output). A file without any
/// value is an error; `[]` is a valid file with zero records.
pub fn read_records(path: &Path) -> Result<Vec<Value>, TransformError> {
    let data = fs::read_to_string(path).map_err(|source| TransformError::Read { path: path.to_path_buf(), source })?;
    let mut records = Vec::new();
    let mut seen_value = false;
    for value in Deserializer::from_str(&data).into_iter::<Value>() {
        let value = value.map_err(|source| TransformError::Parse { path: path.to_path_buf(), source })?;
        seen_value = true;
        match value {
            Value::Array(items) => records.extend(items),
            obj @ Value::Object(_) => records.push(obj),
            other => {
                return Err(TransformError::Shape(format!(
                    "{}: top-level value must be an array or object, found {}",
                    path.display(),
                    other
                )))
            }
        }
    }
    if !seen_value {
        return Err(TransformError::Empty { path: path.to_path_buf() });
    }
    Ok(records)
}

/// Write rows as headerless CSV, replacing any existing file.
pub fn write_rows(path: &Path, rows: &[Vec<String>]) -> Result<(), TransformError> {
    let wrap = |source: csv::Error| TransformError::Write { path: path.to_path_buf(), source };
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path).map_err(wrap)?;
    for row in rows {
        wtr.write_record(row).map_err(wrap)?;
    }
    wtr.flush().map_err(|e| wrap(e.into()))?;
    Ok(())
}

/// Convert `raw` into the CSV report at `report`. Returns the number of rows written.
///
/// Rows are fully computed before the report is opened, so a structural error leaves no
/// partial report behind.
pub fn transform_file(raw: &Path, report: &Path, projection: &Projection) -> Result<usize, TransformError> {
    let records = read_records(raw)?;
    let rows = project(projection, &records)?;
    write_rows(report, &rows)?;
    debug!(raw = %raw.display(), report = %report.display(), records = records.len(), rows = rows.len(), "report written");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn projection(s: &str) -> Projection {
        s.parse().unwrap()
    }

    #[test]
    fn enumeration_output_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("subfinder_raw.json");
        let report = dir.path().join("subdomains.csv");
        fs::write(&raw, r#"[{"name":"a.example.com"},{"name":"b.example.com"}]"#).unwrap();
        let n = transform_file(&raw, &report, &projection(".[] | [.name]")).unwrap();
        assert_eq!(n, 2);
        assert_eq!(fs::read_to_string(&report).unwrap(), "a.example.com\nb.example.com\n");
    }

    #[test]
    fn json_lines_are_records() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.json");
        let report = dir.path().join("out.csv");
        fs::write(&raw, "{\"host\":\"a\",\"n\":1}\n{\"host\":\"b\",\"n\":2}\n").unwrap();
        transform_file(&raw, &report, &projection(".[] | [.host, .n]")).unwrap();
        assert_eq!(fs::read_to_string(&report).unwrap(), "a,1\nb,2\n");
    }

    #[test]
    fn zero_records_gives_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.json");
        let report = dir.path().join("out.csv");
        fs::write(&raw, "[]").unwrap();
        let n = transform_file(&raw, &report, &projection(".[] | [.name]")).unwrap();
        assert_eq!(n, 0);
        assert!(report.exists());
        assert_eq!(fs::read_to_string(&report).unwrap(), "");
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.json");
        let report = dir.path().join("out.csv");
        fs::write(&raw, r#"[{"title":"Hello, world","server":"nginx"}]"#).unwrap();
        transform_file(&raw, &report, &projection(".[] | [.title, .server]")).unwrap();
        assert_eq!(fs::read_to_string(&report).unwrap(), "\"Hello, world\",nginx\n");
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.json");
        fs::write(&raw, "  \n").unwrap();
        let err = transform_file(&raw, &dir.path().join("out.csv"), &projection(".[] | [.name]")).unwrap_err();
        assert!(matches!(err, TransformError::Empty { .. }));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.json");
        fs::write(&raw, r#"[{"name": "#).unwrap();
        let err = read_records(&raw).unwrap_err();
        assert!(matches!(err, TransformError::Parse { .. }));
    }

    #[test]
    fn missing_raw_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_records(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, TransformError::Read { .. }));
    }

    #[test]
    fn shape_error_leaves_no_report() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.json");
        let report = dir.path().join("out.csv");
        fs::write(&raw, r#"[{"ports": 3}]"#).unwrap();
        assert!(transform_file(&raw, &report, &projection(".[] | [.ports[].port]")).is_err());
        assert!(!report.exists());
    }
}
