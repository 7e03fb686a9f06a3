use anyhow::{Context, Result};
use fleetrecon_core::Target;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Read the domain list: one target per line, trimmed. `#` comment lines and blank lines are
/// skipped, each with a warning, rather than run as targets.
pub fn read_domains(path: &Path) -> Result<Vec<Target>> {
    let s = fs::read_to_string(path).with_context(|| format!("reading domains file {}", path.display()))?;
    Ok(parse_domains(&s))
}

pub fn parse_domains(content: &str) -> Vec<Target> {
    let lines: Vec<&str> = content.lines().collect();
    // trailing blank lines are just the file ending, not skipped targets
    let end = lines.iter().rposition(|l| !l.trim().is_empty()).map_or(0, |i| i + 1);
    let mut targets = Vec::new();
    for (i, line) in lines[..end].iter().enumerate() {
        let t = line.trim();
        if t.starts_with('#') {
            warn!(line = i + 1, text = t, "skipping comment line in domains file");
            continue;
        }
        if t.is_empty() {
            warn!(line = i + 1, "skipping blank line in domains file");
            continue;
        }
        targets.push(Target::from(t));
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn parse_logged(content: &str) -> (Vec<Target>, String) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt().with_writer(move || writer.clone()).with_ansi(false).finish();
        let targets = tracing::subscriber::with_default(subscriber, || parse_domains(content));
        let log = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        (targets, log)
    }

    #[test]
    fn trims_and_keeps_order() {
        let t = parse_domains("  example.com \nexample.org\r\n");
        assert_eq!(t, vec![Target::from("example.com"), Target::from("example.org")]);
    }

    #[test]
    fn skips_blanks_and_comments() {
        let t = parse_domains("# scope\na.com\n\n   \nb.com\n\n\n");
        assert_eq!(t, vec![Target::from("a.com"), Target::from("b.com")]);
    }

    #[test]
    fn comment_is_only_a_leading_hash() {
        let t = parse_domains("#old.example.com\nnew.example.com # keep\n");
        assert_eq!(t, vec![Target::from("new.example.com # keep")]);
    }

    #[test]
    fn skipped_lines_are_logged() {
        let (targets, log) = parse_logged("#old.example.com\na.com\n\nb.com\n");
        assert_eq!(targets, vec![Target::from("a.com"), Target::from("b.com")]);
        assert!(log.contains("skipping comment line"), "{}", log);
        assert!(log.contains("line=1"), "{}", log);
        assert!(log.contains("skipping blank line"), "{}", log);
        assert!(log.contains("line=3"), "{}", log);
    }

    #[test]
    fn empty_file_has_no_targets() {
        assert!(parse_domains("").is_empty());
        assert!(parse_domains("\n\n").is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_domains(&dir.path().join("none.txt")).is_err());
    }
}
