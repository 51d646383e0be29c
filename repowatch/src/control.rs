//! Debian-style control file parsing
//!
//! Turns a `Packages` listing into one field map per stanza. The parser is
//! deliberately lenient: lines that are neither `Key: value` nor a
//! continuation are dropped, because real-world listings carry stray lines.

use crate::models::{FieldMap, PackageRecord};

/// Parse listing text into field maps, one per non-empty stanza, in input order.
pub fn parse_control(text: &str) -> Vec<FieldMap> {
    let mut stanzas = Vec::new();
    let mut current = FieldMap::new();
    // Continuation target, reset at every stanza boundary
    let mut last_key: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                stanzas.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }

        if line.starts_with([' ', '\t']) {
            if let Some(value) = last_key.as_ref().and_then(|key| current.get_mut(key)) {
                let content = line.trim();
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(content);
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            current.insert(key.clone(), value.trim().to_string());
            last_key = Some(key);
        }
    }

    if !current.is_empty() {
        stanzas.push(current);
    }

    stanzas
}

/// Parse listing text straight into package records, dropping stanzas
/// that carry no `Package` field.
pub fn parse_packages(text: &str) -> Vec<PackageRecord> {
    parse_control(text)
        .into_iter()
        .filter_map(PackageRecord::from_fields)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Package: foo
Version: 1.0
Architecture: amd64
Size: 1024
Description: A foo tool
 that does foo things
 .
 and more

Package: bar
Version: 2.0
Size: abc
";

    #[test]
    fn test_parse_stanzas() {
        let stanzas = parse_control(LISTING);
        assert_eq!(stanzas.len(), 2);
        assert_eq!(stanzas[0]["Package"], "foo");
        assert_eq!(stanzas[1]["Package"], "bar");
        assert_eq!(stanzas[1]["Size"], "abc");
    }

    #[test]
    fn test_field_order_preserved() {
        let stanzas = parse_control(LISTING);
        let keys: Vec<&str> = stanzas[0].keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["Package", "Version", "Architecture", "Size", "Description"]
        );
    }

    #[test]
    fn test_continuation_lines() {
        let stanzas = parse_control(LISTING);
        assert_eq!(
            stanzas[0]["Description"],
            "A foo tool that does foo things . and more"
        );
    }

    #[test]
    fn test_continuation_into_empty_value() {
        let stanzas = parse_control("Package: foo\nDepends:\n libc6,\n\tzlib1g\n");
        assert_eq!(stanzas[0]["Depends"], "libc6, zlib1g");
    }

    #[test]
    fn test_value_split_on_first_colon() {
        let stanzas = parse_control("Package: foo\nVersion: 1:2.3-4\n");
        assert_eq!(stanzas[0]["Version"], "1:2.3-4");
    }

    #[test]
    fn test_invalid_lines_ignored() {
        let text = "Package: foo\nthis line is garbage\nVersion: 1.0\n";
        let stanzas = parse_control(text);
        assert_eq!(stanzas.len(), 1);
        assert_eq!(stanzas[0].len(), 2);
        assert_eq!(stanzas[0]["Version"], "1.0");
    }

    #[test]
    fn test_multiple_blank_lines_and_trailing_stanza() {
        let text = "\n\nPackage: a\n\n\n   \nPackage: b\nVersion: 1";
        let stanzas = parse_control(text);
        assert_eq!(stanzas.len(), 2);
        assert_eq!(stanzas[1]["Version"], "1");
    }

    #[test]
    fn test_continuation_does_not_cross_stanzas() {
        let text = "Package: a\nDescription: first\n\n continued\nPackage: b\n";
        let stanzas = parse_control(text);
        assert_eq!(stanzas.len(), 2);
        assert_eq!(stanzas[0]["Description"], "first");
        assert_eq!(stanzas[1].len(), 1);
    }

    #[test]
    fn test_crlf_input() {
        let stanzas = parse_control("Package: a\r\nVersion: 1\r\n\r\nPackage: b\r\n");
        assert_eq!(stanzas.len(), 2);
        assert_eq!(stanzas[0]["Version"], "1");
    }

    #[test]
    fn test_parse_packages_skips_nameless() {
        let text = "Version: 1.0\n\nPackage: foo\nVersion: 2.0\n";
        let records = parse_packages(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "foo");
        assert_eq!(records[0].version, "2.0");
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_control("").is_empty());
        assert!(parse_control("\n\n  \n").is_empty());
    }
}
