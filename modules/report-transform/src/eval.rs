use crate::error::TransformError;
use crate::projection::{Projection, Segment};
use serde_json::Value;

static NULL: Value = Value::Null;

/// One `[]` prefix shared by every column that starts with it.
#[derive(Debug)]
struct Scope<'p> {
    prefix: &'p [Segment],
    parent: Option<usize>,
}

/// Apply `projection` to every record, expanding iterated fields into one row per combination.
///
/// Columns sharing an iterated prefix (`.ports[].port`, `.ports[].service.name`) are bound to the
/// same array element. A scope nested under another (`.ports[].scriptResults[]`) is iterated per
/// element of its parent, and unrelated scopes combine as a cross product in source order.
pub fn project(projection: &Projection, records: &[Value]) -> Result<Vec<Vec<String>>, TransformError> {
    let scopes = collect_scopes(projection);
    let mut rows = Vec::new();
    for record in records {
        let mut bound: Vec<Option<&Value>> = vec![None; scopes.len()];
        expand(projection, &scopes, record, 0, &mut bound, &mut rows)?;
    }
    Ok(rows)
}

fn collect_scopes(projection: &Projection) -> Vec<Scope<'_>> {
    let mut scopes: Vec<Scope<'_>> = Vec::new();
    for column in projection.columns() {
        for (i, seg) in column.iter().enumerate() {
            if *seg != Segment::Iter {
                continue;
            }
            let prefix = &column[..=i];
            if scopes.iter().any(|s| s.prefix == prefix) {
                continue;
            }
            let parent = innermost_scope(&scopes, &column[..i]);
            scopes.push(Scope { prefix, parent });
        }
    }
    scopes
}

/// Index of the longest known scope that is a prefix of `path`.
fn innermost_scope(scopes: &[Scope<'_>], path: &[Segment]) -> Option<usize> {
    scopes
        .iter()
        .enumerate()
        .filter(|(_, s)| path.starts_with(s.prefix))
        .max_by_key(|(_, s)| s.prefix.len())
        .map(|(i, _)| i)
}

fn expand<'v>(
    projection: &Projection,
    scopes: &[Scope<'_>],
    record: &'v Value,
    depth: usize,
    bound: &mut Vec<Option<&'v Value>>,
    rows: &mut Vec<Vec<String>>,
) -> Result<(), TransformError> {
    if depth == scopes.len() {
        rows.push(emit_row(projection, scopes, record, bound)?);
        return Ok(());
    }
    let scope = &scopes[depth];
    let (base, rel_start) = match scope.parent {
        Some(p) => (bound[p].unwrap_or(&NULL), scopes[p].prefix.len()),
        None => (record, 0),
    };
    let keys = &scope.prefix[rel_start..scope.prefix.len() - 1];
    let target = walk(base, keys)?;
    let items = match target {
        Value::Array(items) => items,
        other => {
            return Err(TransformError::Shape(format!(
                "cannot iterate over {} at {}",
                kind(other),
                render_path(scope.prefix)
            )))
        }
    };
    for item in items {
        bound[depth] = Some(item);
        expand(projection, scopes, record, depth + 1, bound, rows)?;
    }
    bound[depth] = None;
    Ok(())
}

fn emit_row(
    projection: &Projection,
    scopes: &[Scope<'_>],
    record: &Value,
    bound: &[Option<&Value>],
) -> Result<Vec<String>, TransformError> {
    let mut row = Vec::with_capacity(projection.width());
    for column in projection.columns() {
        let (base, rest) = match innermost_scope(scopes, column) {
            Some(i) => (bound[i].unwrap_or(&NULL), &column[scopes[i].prefix.len()..]),
            None => (record, &column[..]),
        };
        row.push(cell(walk(base, rest)?));
    }
    Ok(row)
}

/// Follow member keys. A missing key or a null parent yields null, like jq.
fn walk<'v>(mut value: &'v Value, keys: &[Segment]) -> Result<&'v Value, TransformError> {
    for seg in keys {
        let Segment::Key(k) = seg else {
            return Err(TransformError::Shape("iteration outside of a bound scope".to_string()));
        };
        value = match value {
            Value::Object(map) => map.get(k).unwrap_or(&NULL),
            Value::Null => &NULL,
            other => return Err(TransformError::Shape(format!("cannot index {} with \"{}\"", kind(other), k))),
        };
    }
    Ok(value)
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render_path(path: &[Segment]) -> String {
    let mut out = String::new();
    for seg in path {
        match seg {
            Segment::Key(k) => {
                out.push('.');
                out.push_str(k);
            }
            Segment::Iter => out.push_str("[]"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(expr: &str, records: Vec<Value>) -> Vec<Vec<String>> {
        let p: Projection = expr.parse().unwrap();
        project(&p, &records).unwrap()
    }

    const NMAP: &str = ".[] | [.host, .ports[].port, .ports[].service.name, .ports[].service.version, .ports[].service.extrainfo, .ports[].scriptResults[].output]";

    #[test]
    fn flat_fields_one_row_per_record() {
        let out = rows(
            ".[] | [.host, .templateID, .info.name, .info.severity]",
            vec![
                json!({"host": "a.example.com", "templateID": "tech-detect", "info": {"name": "Tech", "severity": "info"}}),
                json!({"host": "b.example.com", "templateID": "cve-x", "info": {"name": "CVE", "severity": "high"}}),
            ],
        );
        assert_eq!(out, vec![vec!["a.example.com", "tech-detect", "Tech", "info"], vec!["b.example.com", "cve-x", "CVE", "high"]]);
    }

    #[test]
    fn three_ports_with_two_scripts_each_yield_six_rows() {
        let port = |n: u16| {
            json!({
                "port": n,
                "service": {"name": "http", "version": "1.0", "extrainfo": ""},
                "scriptResults": [{"output": format!("title-{}", n)}, {"output": format!("alt-{}", n)}]
            })
        };
        let out = rows(NMAP, vec![json!({"host": "h", "ports": [port(80), port(443), port(8080)]})]);
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], vec!["h", "80", "http", "1.0", "", "title-80"]);
        assert_eq!(out[1], vec!["h", "80", "http", "1.0", "", "alt-80"]);
        assert_eq!(out[5], vec!["h", "8080", "http", "1.0", "", "alt-8080"]);
    }

    #[test]
    fn port_without_script_results_emits_nothing_for_that_port() {
        let out = rows(
            NMAP,
            vec![json!({"host": "h", "ports": [
                {"port": 22, "service": {"name": "ssh"}, "scriptResults": []},
                {"port": 80, "service": {"name": "http"}, "scriptResults": [{"output": "Home"}]}
            ]})],
        );
        assert_eq!(out, vec![vec!["h", "80", "http", "", "", "Home"]]);
    }

    #[test]
    fn unrelated_iterations_form_a_cross_product() {
        let out = rows(".[] | [.a[], .b[].x]", vec![json!({"a": [1, 2], "b": [{"x": "p"}, {"x": "q"}, {"x": "r"}]})]);
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], vec!["1", "p"]);
        assert_eq!(out[3], vec!["2", "p"]);
    }

    #[test]
    fn missing_keys_render_empty() {
        let out = rows(
            ".[] | [.url, .responseCode, .title, .headers.Server, .headers.XPoweredBy]",
            vec![json!({"url": "https://a.example.com", "responseCode": 200, "title": "A", "headers": {"Server": "nginx"}})],
        );
        assert_eq!(out, vec![vec!["https://a.example.com", "200", "A", "nginx", ""]]);
    }

    #[test]
    fn nested_values_are_written_as_json() {
        let out = rows(".[] | [.tags, .ok]", vec![json!({"tags": ["x", "y"], "ok": true})]);
        assert_eq!(out, vec![vec![r#"["x","y"]"#, "true"]]);
    }

    #[test]
    fn indexing_a_scalar_is_an_error() {
        let p: Projection = ".[] | [.info.name]".parse().unwrap();
        let err = project(&p, &[json!({"info": "text"})]).unwrap_err();
        assert!(matches!(err, TransformError::Shape(_)));
    }

    #[test]
    fn iterating_null_is_an_error() {
        let p: Projection = ".[] | [.ports[].port]".parse().unwrap();
        assert!(matches!(project(&p, &[json!({"host": "h"})]), Err(TransformError::Shape(_))));
    }

    #[test]
    fn no_records_no_rows() {
        assert!(rows(".[] | [.name]", vec![]).is_empty());
    }
}
