//! Patient records in the shape of the Matchmaker Exchange API.
//!
//! Only `id`, `features` and `genomicFeatures` are interpreted; all other
//! fields (contact, label, disorders, ...) are carried through untouched.

use std::collections::BTreeSet;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{
    err::InvalidRecordError,
    genes::xlink::{CrossRefTable, GeneNamespace},
    pheno::ontology::OntologyGraph,
};

/// Whether a phenotype was observed or explicitly excluded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Observed {
    #[default]
    Yes,
    No,
}

/// A phenotype annotation of a patient.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhenotypeFeature {
    /// Ontology term identifier, e.g., `HP:0001263`.
    pub id: String,
    /// Negated features are ignored for scoring.
    #[serde(default)]
    pub observed: Observed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_of_onset: Option<String>,
}

impl PhenotypeFeature {
    pub fn is_observed(&self) -> bool {
        self.observed == Observed::Yes
    }
}

/// Reference to a gene with an optional namespace hint.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GeneRef {
    /// Raw identifier: symbol, Entrez ID, ENSEMBL ID, ...
    pub id: String,
    /// Namespace of `id`, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<GeneNamespace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A candidate causal gene, optionally with variant details.
///
/// Variant details are kept opaque, they do not contribute to the score.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GenomicFeature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene: Option<GeneRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zygosity: Option<u8>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<serde_json::Value>,
}

/// A patient record as stored in and returned from the patient store.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PatientRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<PhenotypeFeature>,
    #[serde(
        default,
        rename = "genomicFeatures",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub genomic_features: Vec<GenomicFeature>,
    /// Contact and all other fields not used for matching.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl PatientRecord {
    /// Check the record's shape.
    pub fn validate(&self) -> Result<(), InvalidRecordError> {
        if self.id.trim().is_empty() {
            return Err(InvalidRecordError::EmptyPatientId);
        }
        if self.features.iter().any(|f| f.id.trim().is_empty()) {
            return Err(InvalidRecordError::EmptyTermId {
                patient: self.id.clone(),
            });
        }
        let gene_missing = |gf: &GenomicFeature| {
            gf.gene
                .as_ref()
                .map_or(true, |gene| gene.id.trim().is_empty())
        };
        if self.genomic_features.iter().any(gene_missing) {
            return Err(InvalidRecordError::EmptyGeneId {
                patient: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Distinct term ids of the observed phenotype features, in record order.
    pub fn observed_term_ids(&self) -> IndexSet<&str> {
        self.features
            .iter()
            .filter(|f| f.is_observed())
            .map(|f| f.id.trim())
            .collect()
    }

    /// The raw gene references of all genomic features.
    pub fn gene_refs(&self) -> impl Iterator<Item = &GeneRef> {
        self.genomic_features.iter().filter_map(|gf| gf.gene.as_ref())
    }

    /// Canonical symbols of the genomic features; unresolvable ones are
    /// dropped.
    pub fn normalized_genes<'x>(&self, xlink: &'x CrossRefTable) -> BTreeSet<&'x str> {
        self.gene_refs()
            .filter_map(|gene| {
                let symbol = xlink.normalize(&gene.id, gene.namespace);
                if symbol.is_none() {
                    tracing::debug!("patient {}: dropping unknown gene {:?}", self.id, gene.id);
                }
                symbol
            })
            .collect()
    }

    /// Whether there is nothing to match on: no observed phenotype and no
    /// gene that `xlink` can resolve.
    pub fn has_no_features(&self, xlink: &CrossRefTable) -> bool {
        self.observed_term_ids().is_empty() && self.normalized_genes(xlink).is_empty()
    }

    /// A copy with identifiers and labels normalized against the vocabularies.
    ///
    /// Known terms (also for the age of onset) get their primary id and the
    /// term name as label, resolvable genes get the canonical symbol as label
    /// and `test` becomes a boolean (`false` if missing).  Unknown identifiers
    /// are kept as given.
    pub fn normalized(&self, ontology: &OntologyGraph, xlink: &CrossRefTable) -> PatientRecord {
        let mut result = self.clone();
        for feature in result.features.iter_mut() {
            if let Some(term) = ontology.term(feature.id.trim()) {
                feature.id = term.id.clone();
                if !term.name.is_empty() {
                    feature.label = Some(term.name.clone());
                }
            }
            if let Some(onset) = feature.age_of_onset.as_mut() {
                if let Some(term) = ontology.term(onset.trim()) {
                    *onset = term.id.clone();
                }
            }
        }
        for gene in result
            .genomic_features
            .iter_mut()
            .filter_map(|gf| gf.gene.as_mut())
        {
            if let Some(symbol) = xlink.normalize(&gene.id, gene.namespace) {
                gene.label = Some(symbol.to_string());
            }
        }
        let test = result.metadata.get("test").map_or(false, is_truthy);
        result
            .metadata
            .insert("test".to_string(), serde_json::Value::Bool(test));
        result
    }
}

/// Truthiness of a JSON value as used for flags such as `test`.
fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Body of a match request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MatchRequest {
    pub patient: PatientRecord,
}
