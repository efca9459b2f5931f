//! Minimal reader for the OBO flat file format as used by the HPO.
//!
//! Only the subset needed for building the term graph is supported: header
//! tags, `[Term]`-style stanzas with `tag: value` lines, `!` comments and
//! line continuation with a trailing backslash.

use std::io::BufRead;

use indexmap::IndexMap;

use crate::err::VocabularyLoadError;

/// One `[Name]` block of an OBO file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stanza {
    /// The stanza type, e.g., `Term` or `Typedef`.
    pub kind: String,
    /// Tag values in file order.
    pub tags: IndexMap<String, Vec<String>>,
    /// Line number of the stanza's last line, for error messages.
    pub line_no: usize,
}

impl Stanza {
    /// All values of `tag`, empty if absent.
    pub fn values(&self, tag: &str) -> &[String] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or_default()
    }

    /// The first value of `tag`, if any.
    pub fn first(&self, tag: &str) -> Option<&str> {
        self.values(tag).first().map(String::as_str)
    }

    /// Identifier-valued tags (`id`, `is_a`, `alt_id`) with trailing modifiers
    /// such as `{source="..."}` removed.
    pub fn ids<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.values(tag)
            .iter()
            .filter_map(|value| value.split_whitespace().next())
    }

    /// Whether the stanza carries `is_obsolete: true`.
    pub fn is_obsolete(&self) -> bool {
        self.values("is_obsolete").iter().any(|v| v == "true")
    }
}

/// A parsed OBO document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Header tags before the first stanza.
    pub headers: IndexMap<String, Vec<String>>,
    /// All stanzas in file order.
    pub stanzas: Vec<Stanza>,
}

impl Document {
    /// Stanzas of type `[Term]`.
    pub fn terms(&self) -> impl Iterator<Item = &Stanza> {
        self.stanzas.iter().filter(|s| s.kind == "Term")
    }

    /// The `data-version` header, if present.
    pub fn data_version(&self) -> Option<&str> {
        self.headers
            .get("data-version")
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Remove a trailing `!` comment that is not inside a quoted string.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escape = false;
    for (idx, c) in line.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => escape = true,
            '!' if !in_quotes => return line[..idx].trim_end(),
            _ => (),
        }
    }
    line
}

/// Split a `tag: value` line.
fn split_tag_value(line: &str) -> Option<(&str, &str)> {
    let (tag, value) = line.split_once(':')?;
    let tag = tag.trim();
    if tag.is_empty() {
        None
    } else {
        Some((tag, value.trim()))
    }
}

/// Parse an OBO document from `reader`; `source` is used in error messages.
pub fn parse<R: BufRead>(reader: R, source: &str) -> Result<Document, VocabularyLoadError> {
    let mut document = Document::default();
    let mut current: Option<Stanza> = None;
    let mut continued = String::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| VocabularyLoadError::Io {
            path: source.to_string(),
            source: e,
        })?;
        let line = line.trim();
        if line.starts_with('!') {
            continue;
        }
        if let Some(prefix) = line.strip_suffix('\\') {
            continued.push_str(prefix.trim_end());
            continued.push(' ');
            continue;
        }
        let line = if continued.is_empty() {
            line.to_string()
        } else {
            let mut joined = std::mem::take(&mut continued);
            joined.push_str(line);
            joined
        };
        let line = strip_comment(&line);
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            if let Some(stanza) = current.take() {
                document.stanzas.push(stanza);
            }
            current = Some(Stanza {
                kind: line[1..line.len() - 1].trim().to_string(),
                tags: IndexMap::new(),
                line_no,
            });
            continue;
        }

        let (tag, value) =
            split_tag_value(line).ok_or_else(|| VocabularyLoadError::MalformedObo {
                line_no,
                line: line.to_string(),
            })?;
        let tags = match current.as_mut() {
            Some(stanza) => {
                stanza.line_no = line_no;
                &mut stanza.tags
            }
            None => &mut document.headers,
        };
        tags.entry(tag.to_string())
            .or_default()
            .push(value.to_string());
    }

    if let Some(stanza) = current.take() {
        document.stanzas.push(stanza);
    }

    Ok(document)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    const SNIPPET: &str = "\
format-version: 1.2
data-version: hp/releases/2024-01-16
! a full-line comment

[Term]
id: HP:0000001
name: All

[Term]
id: HP:0000118
name: Phenotypic abnormality ! trailing comment
alt_id: HP:0000005
def: \"A phenotypic abnormality!\" [HPO:probinson]
is_a: HP:0000001 ! All

[Term]
id: HP:0000999
name: Obsolete thing
is_obsolete: true

[Typedef]
id: part_of
";

    #[test]
    fn parse_snippet() -> Result<(), anyhow::Error> {
        let doc = parse(SNIPPET.as_bytes(), "snippet")?;

        assert_eq!(doc.data_version(), Some("hp/releases/2024-01-16"));
        assert_eq!(doc.stanzas.len(), 4);
        assert_eq!(doc.terms().count(), 3);

        let abnormality = &doc.stanzas[1];
        assert_eq!(abnormality.first("id"), Some("HP:0000118"));
        assert_eq!(abnormality.first("name"), Some("Phenotypic abnormality"));
        assert_eq!(abnormality.ids("is_a").collect::<Vec<_>>(), vec!["HP:0000001"]);
        assert_eq!(abnormality.ids("alt_id").collect::<Vec<_>>(), vec!["HP:0000005"]);
        assert_eq!(
            abnormality.first("def"),
            Some("\"A phenotypic abnormality!\" [HPO:probinson]")
        );
        assert!(!abnormality.is_obsolete());
        assert!(doc.stanzas[2].is_obsolete());
        assert_eq!(doc.stanzas[3].kind, "Typedef");

        Ok(())
    }

    #[test]
    fn parse_continuation() -> Result<(), anyhow::Error> {
        let doc = parse("[Term]\nid: HP:1\nname: first \\\nsecond\n".as_bytes(), "x")?;

        assert_eq!(doc.stanzas[0].first("name"), Some("first second"));

        Ok(())
    }

    #[test]
    fn parse_is_a_with_modifier() -> Result<(), anyhow::Error> {
        let doc = parse(
            "[Term]\nid: HP:2\nis_a: HP:1 {source=\"x\"} ! parent\n".as_bytes(),
            "x",
        )?;

        assert_eq!(doc.stanzas[0].ids("is_a").collect::<Vec<_>>(), vec!["HP:1"]);

        Ok(())
    }

    #[test]
    fn parse_malformed_line() {
        let err = parse("[Term]\nid: HP:1\nthis line has no tag\n".as_bytes(), "x")
            .expect_err("must fail");
        assert!(
            matches!(err, VocabularyLoadError::MalformedObo { line_no: 3, .. }),
            "{err:?}"
        );
    }
}
