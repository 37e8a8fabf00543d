//! Span location inside YAML manifests.
//!
//! The rewriter edits manifests as text so that comments, quoting and
//! layout survive untouched. This module finds the byte span of a scalar
//! value addressed by a [`FieldPath`], using a line-oriented reading of the
//! block-style YAML these manifests are written in:
//!
//! ```yaml
//! nova_git_install_branch: 5b0ae1d2c3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8 # HEAD of "master" as of 01.02.2025
//!
//! - name: os_nova
//!   src: https://opendev.org/openstack/openstack-ansible-os_nova
//!   version: master
//!   trackbranch: master
//! ```
//!
//! Only plain, single-quoted and double-quoted scalars are addressable; block
//! scalars, flow collections, anchors and aliases are not.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use super::FieldPath;

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>[A-Za-z0-9_][A-Za-z0-9_.\-]*)[ \t]*:(?:[ \t]+|$)")
        .expect("static key regex is valid")
});

/// A located scalar value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    /// Value text without quotes
    pub value: String,
    /// Byte span of the value inside the file (inside quotes, if quoted)
    pub span: Range<usize>,
    /// 1-based line number
    pub line: usize,
    /// Byte span of the rest of the line after the value (closing quote and comment)
    pub tail: Range<usize>,
}

/// One physical line without its line ending.
#[derive(Debug)]
struct Line<'a> {
    start: usize,
    text: &'a str,
    indent: usize,
    number: usize,
}

impl Line<'_> {
    fn is_ignorable(&self) -> bool {
        let body = self.text.trim_start();
        body.is_empty() || body.starts_with('#')
    }

    fn body(&self) -> &str {
        &self.text[self.indent..]
    }

    /// Column of the content after a `- ` sequence marker, if this is an item line.
    fn item_column(&self) -> Option<usize> {
        let body = self.body();
        let rest = body.strip_prefix('-')?;
        if !(rest.is_empty() || rest.starts_with([' ', '\t'])) {
            return None;
        }
        let padding = rest.len() - rest.trim_start().len();
        Some(self.indent + 1 + padding)
    }
}

fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut start = 0;
    text.split_inclusive('\n')
        .enumerate()
        .map(|(i, raw)| {
            let content = raw.trim_end_matches(['\n', '\r']);
            let indent = content.len() - content.trim_start_matches(' ').len();
            let line = Line {
                start,
                text: content,
                indent,
                number: i + 1,
            };
            start += raw.len();
            line
        })
        .collect()
}

/// Parse the scalar starting at byte `at` of `line`. Returns the unquoted
/// value and its line-relative span.
fn scalar_at(line: &str, at: usize) -> Option<(String, Range<usize>)> {
    let rest = &line[at..];
    let quote = rest.chars().next()?;
    match quote {
        '"' | '\'' => {
            let inner = &rest[1..];
            let mut escaped = false;
            let close = inner.char_indices().find_map(|(i, c)| {
                if quote == '"' && c == '\\' && !escaped {
                    escaped = true;
                    return None;
                }
                let hit = c == quote && !escaped;
                escaped = false;
                hit.then_some(i)
            })?;
            Some((inner[..close].to_string(), at + 1..at + 1 + close))
        }
        '|' | '>' | '{' | '[' | '&' | '*' | '!' | '#' => None,
        _ => {
            let end = rest.find(" #").or_else(|| rest.find("\t#")).unwrap_or(rest.len());
            let value = rest[..end].trim_end();
            if value.is_empty() {
                return None;
            }
            Some((value.to_string(), at..at + value.len()))
        }
    }
}

/// `key: value` starting at column `column` of `line`.
fn key_value(line: &Line<'_>, column: usize) -> Option<(String, Option<Found>)> {
    let body = line.text.get(column..)?;
    let caps = KEY_RE.captures(body)?;
    let key = caps["key"].to_string();
    let value_at = column + caps.get(0)?.end();
    let found = scalar_at(line.text, value_at).map(|(value, span)| Found {
        value,
        span: line.start + span.start..line.start + span.end,
        line: line.number,
        tail: line.start + span.end..line.start + line.text.len(),
    });
    Some((key, found))
}

/// Top-level `key: scalar` occurrences of `key`.
fn find_key(lines: &[Line<'_>], key: &str) -> Vec<Found> {
    lines
        .iter()
        .filter(|line| line.indent == 0 && !line.is_ignorable())
        .filter_map(|line| key_value(line, 0))
        .filter(|(k, _)| k == key)
        .filter_map(|(_, found)| found)
        .collect()
}

/// Lines forming the block sequence addressed by `list`.
fn sequence_region<'a, 'b>(lines: &'b [Line<'a>], list: Option<&str>) -> &'b [Line<'a>] {
    let Some(list) = list else {
        return lines;
    };

    let Some(header) = lines.iter().position(|line| {
        line.indent == 0
            && !line.is_ignorable()
            && key_value(line, 0).is_some_and(|(k, v)| k == list && v.is_none())
    }) else {
        return &[];
    };

    let body = &lines[header + 1..];
    let end = body
        .iter()
        .position(|line| line.indent == 0 && !line.is_ignorable() && line.item_column().is_none())
        .unwrap_or(body.len());
    &body[..end]
}

/// Every `(key, value)` field of every item in the sequence, grouped by item.
fn sequence_items(region: &[Line<'_>]) -> Vec<Vec<(String, Found)>> {
    let Some(dash_indent) =
        region.iter().find(|l| !l.is_ignorable() && l.item_column().is_some()).map(|l| l.indent)
    else {
        return Vec::new();
    };

    let mut items: Vec<Vec<(String, Found)>> = Vec::new();
    let mut field_column: Option<usize> = None;

    for line in region.iter().filter(|l| !l.is_ignorable()) {
        let item_start =
            if line.indent == dash_indent { line.item_column() } else { None };
        if let Some(column) = item_start {
            let mut item = Vec::new();
            if let Some((key, Some(found))) = key_value(line, column) {
                item.push((key, found));
            }
            items.push(item);
            field_column = Some(column);
            continue;
        }

        match field_column {
            Some(column) if line.indent == column => {
                if let (Some((key, Some(found))), Some(item)) =
                    (key_value(line, column), items.last_mut())
                {
                    item.push((key, found));
                }
            }
            Some(column) if line.indent > column => {}
            _ => field_column = None,
        }
    }
    items
}

/// Every occurrence of `path` in `text`.
///
/// Zero results means the target is absent; more than one means it is ambiguous.
#[must_use]
pub fn find_all(text: &str, path: &FieldPath) -> Vec<Found> {
    let lines = split_lines(text);
    match path {
        FieldPath::Key(key) => find_key(&lines, key),
        FieldPath::ListItem {
            list,
            name,
            field,
        } => sequence_items(sequence_region(&lines, list.as_deref()))
            .into_iter()
            .filter(|item| item.iter().any(|(k, v)| k == "name" && v.value == *name))
            .flat_map(|item| item.into_iter().filter(|(k, _)| k == field).map(|(_, v)| v))
            .collect(),
    }
}

/// All top-level scalar keys with their values, in file order.
#[must_use]
pub fn top_level_scalars(text: &str) -> Vec<(String, Found)> {
    split_lines(text)
        .iter()
        .filter(|line| line.indent == 0 && !line.is_ignorable())
        .filter_map(|line| key_value(line, 0))
        .filter_map(|(key, found)| found.map(|f| (key, f)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICES: &str = "---\n\
        ## Nova service\n\
        nova_git_repo: https://opendev.org/openstack/nova\n\
        nova_git_install_branch: 0123456789abcdef0123456789abcdef01234567 # HEAD of \"master\" as of 01.02.2025\n\
        nova_git_track_branch: master\n\
        nova_git_project_group: nova_all\n\
        glance_git_install_branch: \"stable/2024.1\"\n";

    const ROLES: &str = "---\n\
        - name: apt_package_pinning\n  \
          scm: git\n  \
          src: https://opendev.org/openstack/openstack-ansible-apt_package_pinning\n  \
          version: master\n  \
          trackbranch: master\n\
        - name: os_nova\n  \
          scm: git\n  \
          # pinned during the milestone\n  \
          version: 'aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa'\n  \
          trackbranch: stable/2024.1\n  \
          shallow_since: '2024-01-01'\n";

    const COLLECTIONS: &str = "collections:\n  \
        - name: https://opendev.org/openstack/ansible-config_template\n    \
          type: git\n    \
          version: 2.1.0\n  \
        - name: community.general\n    \
          source: https://galaxy.ansible.com\n    \
          version: 9.1.0\n\
        other:\n  \
        - name: community.general\n    \
          version: 1.0.0\n";

    fn key(k: &str) -> FieldPath {
        FieldPath::Key(k.to_string())
    }

    #[test]
    fn test_find_top_level_key() {
        let found = find_all(SERVICES, &key("nova_git_install_branch"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "0123456789abcdef0123456789abcdef01234567");
        assert_eq!(found[0].line, 4);
        assert_eq!(&SERVICES[found[0].span.clone()], found[0].value);
        assert!(SERVICES[found[0].tail.clone()].contains("HEAD of"));
    }

    #[test]
    fn test_quoted_value_span_excludes_quotes() {
        let found = find_all(SERVICES, &key("glance_git_install_branch"));
        assert_eq!(found[0].value, "stable/2024.1");
        assert_eq!(&SERVICES[found[0].span.start - 1..found[0].span.start], "\"");
    }

    #[test]
    fn test_prefix_key_does_not_match() {
        assert!(find_all(SERVICES, &key("nova_git")).is_empty());
        assert!(find_all(SERVICES, &key("git_install_branch")).is_empty());
    }

    #[test]
    fn test_duplicate_key_found_twice() {
        let text = "a: 1\nb: 2\na: 3\n";
        assert_eq!(find_all(text, &key("a")).len(), 2);
    }

    #[test]
    fn test_nested_key_is_not_top_level() {
        let text = "parent:\n  nova_git_install_branch: abc\n";
        assert!(find_all(text, &key("nova_git_install_branch")).is_empty());
    }

    #[test]
    fn test_role_list_item_fields() {
        let path = FieldPath::ListItem {
            list: None,
            name: "os_nova".to_string(),
            field: "version".to_string(),
        };
        let found = find_all(ROLES, &path);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "a".repeat(40));
        assert_eq!(&ROLES[found[0].span.end..found[0].span.end + 1], "'");

        let track = FieldPath::ListItem {
            list: None,
            name: "apt_package_pinning".to_string(),
            field: "trackbranch".to_string(),
        };
        assert_eq!(find_all(ROLES, &track)[0].value, "master");
    }

    #[test]
    fn test_collection_list_is_scoped() {
        let path = FieldPath::ListItem {
            list: Some("collections".to_string()),
            name: "community.general".to_string(),
            field: "version".to_string(),
        };
        let found = find_all(COLLECTIONS, &path);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "9.1.0");

        let other = FieldPath::ListItem {
            list: Some("other".to_string()),
            name: "community.general".to_string(),
            field: "version".to_string(),
        };
        assert_eq!(find_all(COLLECTIONS, &other)[0].value, "1.0.0");
    }

    #[test]
    fn test_missing_field_or_item() {
        let path = FieldPath::ListItem {
            list: None,
            name: "os_nova".to_string(),
            field: "src".to_string(),
        };
        assert!(find_all(ROLES, &path).is_empty());

        let path = FieldPath::ListItem {
            list: None,
            name: "os_glance".to_string(),
            field: "version".to_string(),
        };
        assert!(find_all(ROLES, &path).is_empty());
    }

    #[test]
    fn test_scalar_forms() {
        assert_eq!(scalar_at("k: plain value # c", 3), Some(("plain value".to_string(), 3..14)));
        assert_eq!(scalar_at("k: 'a#b'", 3), Some(("a#b".to_string(), 4..7)));
        assert_eq!(scalar_at(r#"k: "a\"b""#, 3), Some((r#"a\"b"#.to_string(), 4..8)));
        assert_eq!(scalar_at("k: |", 3), None);
        assert_eq!(scalar_at("k: ", 3), None);
    }

    #[test]
    fn test_crlf_offsets() {
        let text = "a: 1\r\nb: two\r\n";
        let found = find_all(text, &key("b"));
        assert_eq!(&text[found[0].span.clone()], "two");
    }

    #[test]
    fn test_top_level_scalars() {
        let keys: Vec<String> = top_level_scalars(SERVICES).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "nova_git_repo",
                "nova_git_install_branch",
                "nova_git_track_branch",
                "nova_git_project_group",
                "glance_git_install_branch"
            ]
        );
    }
}
