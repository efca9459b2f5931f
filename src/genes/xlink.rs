//! Gene identifier cross-reference table (HGNC) and symbol normalization.

use std::{io::Read, path::Path, time::Instant};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    common::{io::open_read_maybe_gz, split_multi},
    err::VocabularyLoadError,
};

/// Namespaces of gene identifiers, in lookup order.
#[derive(
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    Debug,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GeneNamespace {
    /// Approved HGNC symbol, e.g., `NGLY1`.
    Symbol,
    /// HGNC identifier, e.g., `HGNC:17646`.
    Hgnc,
    /// NCBI/Entrez gene ID, e.g., `55768` or `NCBIGene:55768`.
    Entrez,
    /// ENSEMBL gene ID, e.g., `ENSG00000151092`.
    Ensembl,
    /// Previously approved symbol.
    PreviousSymbol,
    /// Alias symbol.
    Alias,
}

/// One gene with all its identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneRecord {
    pub hgnc_id: String,
    pub symbol: String,
    pub previous_symbols: Vec<String>,
    pub alias_symbols: Vec<String>,
    pub entrez_id: Option<String>,
    pub ensembl_gene_id: Option<String>,
}

/// Row of the HGNC TSV download; accepts both the legacy custom download
/// column titles and the `hgnc_complete_set` ones.
#[derive(Deserialize, Debug, Clone)]
struct HgncRow {
    #[serde(alias = "HGNC ID")]
    hgnc_id: String,
    #[serde(alias = "Approved Symbol", alias = "Approved symbol")]
    symbol: String,
    #[serde(default, alias = "Previous Symbols", alias = "Previous symbols")]
    prev_symbol: String,
    #[serde(default, alias = "Synonyms", alias = "Alias symbols")]
    alias_symbol: String,
    #[serde(
        default,
        alias = "Entrez Gene ID(supplied by NCBI)",
        alias = "NCBI Gene ID(supplied by NCBI)"
    )]
    entrez_id: String,
    #[serde(
        default,
        alias = "Ensembl ID(supplied by Ensembl)",
        alias = "Ensembl gene ID"
    )]
    ensembl_gene_id: String,
}

impl From<HgncRow> for GeneRecord {
    fn from(row: HgncRow) -> Self {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        GeneRecord {
            hgnc_id: row.hgnc_id.trim().to_string(),
            symbol: row.symbol.trim().to_string(),
            previous_symbols: split_multi(&row.prev_symbol).map(str::to_string).collect(),
            alias_symbols: split_multi(&row.alias_symbol).map(str::to_string).collect(),
            entrez_id: non_empty(&row.entrez_id),
            ensembl_gene_id: non_empty(&row.ensembl_gene_id),
        }
    }
}

/// Prefixes accepted in front of Entrez gene IDs (upper case).
const ENTREZ_PREFIXES: &[&str] = &["NCBIGENE:", "ENTREZ:", "NCBI:"];

/// The cross-reference table.
///
/// Maps any known identifier to indices into `symbols`; keys are stored in
/// upper case for case-insensitive lookup.
#[derive(Debug, Default)]
pub struct CrossRefTable {
    /// Canonical HGNC symbols.
    symbols: Vec<String>,
    from_symbol: multimap::MultiMap<String, u32>,
    from_hgnc: multimap::MultiMap<String, u32>,
    from_entrez: multimap::MultiMap<String, u32>,
    from_ensembl: multimap::MultiMap<String, u32>,
    from_previous: multimap::MultiMap<String, u32>,
    from_alias: multimap::MultiMap<String, u32>,
}

impl CrossRefTable {
    /// Build from gene records; records without a symbol are skipped.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = GeneRecord>,
    {
        let mut result = Self::default();
        for record in records {
            if record.symbol.is_empty() {
                tracing::trace!("skipping record without symbol: {:?}", &record);
                continue;
            }
            let idx = result.symbols.len() as u32;
            result.from_symbol.insert(record.symbol.to_uppercase(), idx);
            if !record.hgnc_id.is_empty() {
                result.from_hgnc.insert(record.hgnc_id.to_uppercase(), idx);
            }
            if let Some(entrez_id) = &record.entrez_id {
                result.from_entrez.insert(strip_entrez_prefix(&entrez_id.to_uppercase()), idx);
            }
            if let Some(ensembl_gene_id) = &record.ensembl_gene_id {
                result.from_ensembl.insert(ensembl_gene_id.to_uppercase(), idx);
            }
            for previous in &record.previous_symbols {
                result.from_previous.insert(previous.to_uppercase(), idx);
            }
            for alias in &record.alias_symbols {
                result.from_alias.insert(alias.to_uppercase(), idx);
            }
            result.symbols.push(record.symbol);
        }
        result
    }

    /// Read the HGNC TSV from `reader`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, VocabularyLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(reader);
        let mut records = Vec::new();
        for row in reader.deserialize() {
            let row: HgncRow = row?;
            records.push(GeneRecord::from(row));
        }
        Ok(Self::from_records(records))
    }

    /// Read the (possibly gzip-compressed) HGNC TSV file.
    #[tracing::instrument]
    pub fn from_path(path: &Path) -> Result<Self, VocabularyLoadError> {
        tracing::debug!("loading gene cross-references from {:?}...", path);
        let before_loading = Instant::now();
        let reader = open_read_maybe_gz(path).map_err(|e| VocabularyLoadError::Io {
            path: format!("{}", path.display()),
            source: e,
        })?;
        let result = Self::from_reader(reader)?;
        tracing::debug!(
            "... done loading {} genes in {:?}",
            result.len(),
            before_loading.elapsed()
        );
        Ok(result)
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn index(&self, namespace: GeneNamespace) -> &multimap::MultiMap<String, u32> {
        match namespace {
            GeneNamespace::Symbol => &self.from_symbol,
            GeneNamespace::Hgnc => &self.from_hgnc,
            GeneNamespace::Entrez => &self.from_entrez,
            GeneNamespace::Ensembl => &self.from_ensembl,
            GeneNamespace::PreviousSymbol => &self.from_previous,
            GeneNamespace::Alias => &self.from_alias,
        }
    }

    /// Look up an upper-cased identifier in one namespace.
    ///
    /// Identifiers mapping to more than one symbol are ambiguous and yield
    /// `None`.
    fn lookup(&self, namespace: GeneNamespace, key: &str) -> Option<&str> {
        let key = match namespace {
            GeneNamespace::Entrez => strip_entrez_prefix(key),
            _ => key.to_string(),
        };
        let mut idxs = self.index(namespace).get_vec(&key)?.clone();
        idxs.sort_unstable();
        idxs.dedup();
        match idxs.as_slice() {
            [idx] => Some(self.symbols[*idx as usize].as_str()),
            _ => {
                tracing::trace!("ambiguous {} identifier {}", namespace, key);
                None
            }
        }
    }

    /// Resolve `identifier` to its canonical symbol.
    ///
    /// The hinted namespace is tried first, then all namespaces in the order
    /// of `GeneNamespace`.  Matching is exact but case-insensitive.
    pub fn normalize(&self, identifier: &str, namespace_hint: Option<GeneNamespace>) -> Option<&str> {
        let key = identifier.trim().to_uppercase();
        if key.is_empty() {
            return None;
        }
        if let Some(namespace) = namespace_hint {
            if let Some(symbol) = self.lookup(namespace, &key) {
                return Some(symbol);
            }
        }
        let result = GeneNamespace::iter()
            .filter(|namespace| Some(*namespace) != namespace_hint)
            .find_map(|namespace| self.lookup(namespace, &key));
        if result.is_none() {
            tracing::trace!("could not normalize gene identifier {:?}", identifier);
        }
        result
    }
}

/// Remove a known prefix from an upper-cased Entrez ID.
fn strip_entrez_prefix(key: &str) -> String {
    ENTREZ_PREFIXES
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))
        .unwrap_or(key)
        .to_string()
}

#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    pub fn toy_xlink() -> CrossRefTable {
        CrossRefTable::from_records(vec![
            GeneRecord {
                hgnc_id: "HGNC:17646".into(),
                symbol: "NGLY1".into(),
                previous_symbols: vec![],
                alias_symbols: vec!["FLJ11005".into(), "PNG1".into()],
                entrez_id: Some("55768".into()),
                ensembl_gene_id: Some("ENSG00000151092".into()),
            },
            GeneRecord {
                hgnc_id: "HGNC:7".into(),
                symbol: "A2M".into(),
                previous_symbols: vec![],
                alias_symbols: vec!["FWP007".into(), "CPAMD5".into()],
                entrez_id: Some("2".into()),
                ensembl_gene_id: Some("ENSG00000175899".into()),
            },
            GeneRecord {
                hgnc_id: "HGNC:3603".into(),
                symbol: "FBN1".into(),
                previous_symbols: vec!["FBN".into()],
                alias_symbols: vec!["MFS1".into(), "SHARED".into()],
                entrez_id: Some("2200".into()),
                ensembl_gene_id: Some("ENSG00000166147".into()),
            },
            GeneRecord {
                hgnc_id: "HGNC:1100".into(),
                symbol: "BRCA1".into(),
                previous_symbols: vec![],
                alias_symbols: vec!["SHARED".into()],
                entrez_id: Some("672".into()),
                ensembl_gene_id: Some("ENSG00000012048".into()),
            },
            GeneRecord {
                hgnc_id: "HGNC:2".into(),
                symbol: "FBN".into(),
                previous_symbols: vec![],
                alias_symbols: vec![],
                entrez_id: None,
                ensembl_gene_id: None,
            },
        ])
    }

    #[rstest::rstest]
    #[case("NGLY1", None, Some("NGLY1"))]
    #[case("ngly1", None, Some("NGLY1"))]
    #[case("HGNC:17646", None, Some("NGLY1"))]
    #[case("55768", None, Some("NGLY1"))]
    #[case("NCBIGene:55768", None, Some("NGLY1"))]
    #[case("ENSG00000151092", None, Some("NGLY1"))]
    #[case("ensg00000151092", Some(GeneNamespace::Ensembl), Some("NGLY1"))]
    #[case("PNG1", None, Some("NGLY1"))]
    #[case("MFS1", Some(GeneNamespace::Alias), Some("FBN1"))]
    // hint is wrong, fallback finds the Entrez ID
    #[case("2200", Some(GeneNamespace::Ensembl), Some("FBN1"))]
    // approved symbol wins over previous symbol without hint...
    #[case("FBN", None, Some("FBN"))]
    // ...but the hint is tried first
    #[case("FBN", Some(GeneNamespace::PreviousSymbol), Some("FBN1"))]
    // ambiguous alias
    #[case("SHARED", None, None)]
    #[case("NGLY", None, None)]
    #[case("", None, None)]
    fn normalize(
        #[case] identifier: &str,
        #[case] hint: Option<GeneNamespace>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(toy_xlink().normalize(identifier, hint), expected);
    }

    #[test]
    fn from_path_legacy_columns() -> Result<(), anyhow::Error> {
        let xlink = CrossRefTable::from_path(Path::new("tests/genes/hgnc_legacy.tsv"))?;

        assert_eq!(xlink.len(), 3);
        assert_eq!(xlink.normalize("NCBIGene:55768", None), Some("NGLY1"));
        assert_eq!(xlink.normalize("CPAMD5", None), Some("A2M"));
        assert_eq!(xlink.normalize("ENSG00000166147", None), Some("FBN1"));
        assert_eq!(xlink.normalize("FBN", None), Some("FBN1"));

        Ok(())
    }

    #[test]
    fn from_path_complete_set_columns() -> Result<(), anyhow::Error> {
        let xlink = CrossRefTable::from_path(Path::new("tests/genes/hgnc_complete_set.tsv"))?;

        assert_eq!(xlink.len(), 3);
        assert_eq!(xlink.normalize("hgnc:7", None), Some("A2M"));
        assert_eq!(xlink.normalize("FWP007", None), Some("A2M"));
        assert_eq!(xlink.normalize("PNG1", Some(GeneNamespace::Alias)), Some("NGLY1"));
        assert_eq!(xlink.normalize("2200", Some(GeneNamespace::Entrez)), Some("FBN1"));

        Ok(())
    }

    #[test]
    fn namespace_from_str() -> Result<(), anyhow::Error> {
        use std::str::FromStr;

        assert_eq!(GeneNamespace::from_str("entrez")?, GeneNamespace::Entrez);
        assert_eq!(GeneNamespace::from_str("Ensembl")?, GeneNamespace::Ensembl);
        assert_eq!(
            GeneNamespace::from_str("previous_symbol")?,
            GeneNamespace::PreviousSymbol
        );
        assert_eq!(GeneNamespace::Alias.to_string(), "alias");

        Ok(())
    }
}
