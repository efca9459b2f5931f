//! Per-term annotation counts used for deriving information content.

use std::{io::Read, path::Path, time::Instant};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{common::io::open_read_maybe_gz, err::VocabularyLoadError, matcher::schema::PatientRecord};

/// One row of the frequency TSV.
#[derive(Deserialize, Debug)]
struct FrequencyRow {
    term_id: String,
    count: u64,
}

/// Raw (not propagated) annotation counts per term id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFrequencies {
    counts: IndexMap<String, u64>,
}

impl TermFrequencies {
    /// Add `count` annotations to `term_id`.
    pub fn add(&mut self, term_id: &str, count: u64) {
        *self.counts.entry(term_id.to_string()).or_default() += count;
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Read from two-column TSV `term_id<TAB>count` without header.
    ///
    /// Empty lines and lines starting with `#` are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, VocabularyLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut result = Self::default();
        for row in reader.deserialize() {
            let row: FrequencyRow = row.map_err(|e| VocabularyLoadError::MalformedFrequency {
                line_no: e.position().map(|pos| pos.line()).unwrap_or_default(),
                source: e,
            })?;
            result.add(&row.term_id, row.count);
        }
        Ok(result)
    }

    /// Read from a (possibly gzip-compressed) TSV file.
    #[tracing::instrument]
    pub fn from_path(path: &Path) -> Result<Self, VocabularyLoadError> {
        tracing::debug!("loading term frequencies from {:?}...", path);
        let before_loading = Instant::now();
        let reader = open_read_maybe_gz(path).map_err(|e| VocabularyLoadError::Io {
            path: format!("{}", path.display()),
            source: e,
        })?;
        let result = Self::from_reader(reader)?;
        tracing::debug!(
            "... done loading {} term frequencies in {:?}",
            result.len(),
            before_loading.elapsed()
        );
        Ok(result)
    }

    /// Count observed phenotype features in a patient corpus.
    ///
    /// Each patient contributes at most one annotation per term.
    pub fn from_patients<'a, I>(patients: I) -> Self
    where
        I: IntoIterator<Item = &'a PatientRecord>,
    {
        let mut result = Self::default();
        for patient in patients {
            for term_id in patient.observed_term_ids() {
                result.add(term_id, 1);
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn from_reader() -> Result<(), anyhow::Error> {
        let tsv = "# term\tcount\nHP:0000118\t10\n\nHP:0001263\t3\nHP:0000118\t2\n";
        let freqs = TermFrequencies::from_reader(tsv.as_bytes())?;

        assert_eq!(
            freqs.iter().collect::<Vec<_>>(),
            vec![("HP:0000118", 12), ("HP:0001263", 3)]
        );

        Ok(())
    }

    #[rstest::rstest]
    #[case("HP:0000118 10\n")]
    #[case("HP:0000118\tmany\n")]
    #[case("HP:0000118\t-1\n")]
    fn from_reader_malformed(#[case] tsv: &str) {
        let err = TermFrequencies::from_reader(tsv.as_bytes()).expect_err("must fail");
        assert!(
            matches!(err, VocabularyLoadError::MalformedFrequency { line_no: 1, .. }),
            "{err:?}"
        );
    }

    #[test]
    fn from_path() -> Result<(), anyhow::Error> {
        let freqs = TermFrequencies::from_path(Path::new("tests/pheno/term_freqs.tsv"))?;

        assert_eq!(freqs.len(), 4);
        assert_eq!(freqs.iter().next(), Some(("HP:0001263", 4)));

        Ok(())
    }

    #[test]
    fn from_patients() -> Result<(), anyhow::Error> {
        let patients: Vec<PatientRecord> = serde_json::from_str(
            r#"[
                {"id": "P1", "features": [
                    {"id": "HP:0001263"},
                    {"id": "HP:0001263"},
                    {"id": "HP:0000522", "observed": "no"}
                ]},
                {"id": "P2", "features": [{"id": "HP:0001263"}, {"id": "HP:0000252"}]}
            ]"#,
        )?;

        let freqs = TermFrequencies::from_patients(&patients);

        // negated features are not counted
        assert_eq!(
            freqs.iter().collect::<Vec<_>>(),
            vec![("HP:0001263", 2), ("HP:0000252", 1)]
        );

        Ok(())
    }
}
