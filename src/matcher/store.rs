//! Access to the corpus of patient records.

use std::{io::Read, path::Path, time::Instant};

use indexmap::IndexMap;

use crate::{
    common::io::open_read_maybe_gz, err::InvalidRecordError, genes::xlink::CrossRefTable,
    pheno::ontology::OntologyGraph,
};

use super::schema::PatientRecord;

/// Read access to a patient corpus.
pub trait PatientStore {
    /// All records, in insertion order.
    fn fetch_all(&self) -> Result<Vec<PatientRecord>, anyhow::Error>;

    /// The record with the given id, if any.
    fn fetch_by_id(&self, id: &str) -> Result<Option<PatientRecord>, anyhow::Error>;
}

/// In-memory store loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct JsonPatientStore {
    records: IndexMap<String, PatientRecord>,
}

impl JsonPatientStore {
    /// Validate and insert `record`, returning the record it replaces.
    pub fn insert(&mut self, record: PatientRecord) -> Result<Option<PatientRecord>, InvalidRecordError> {
        record.validate()?;
        let previous = self.records.insert(record.id.clone(), record);
        if let Some(previous) = &previous {
            tracing::debug!("replacing existing record {}", previous.id);
        }
        Ok(previous)
    }

    /// Load from either a JSON array of records or one record per line.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, anyhow::Error> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;

        let records: Vec<PatientRecord> = if buf.trim_start().starts_with('[') {
            serde_json::from_str(&buf)?
        } else {
            serde_json::Deserializer::from_str(&buf)
                .into_iter::<PatientRecord>()
                .collect::<Result<_, _>>()?
        };

        let mut result = Self::default();
        for record in records {
            result.insert(record)?;
        }
        Ok(result)
    }

    /// Load from a (possibly gzip-compressed) JSON file.
    #[tracing::instrument]
    pub fn from_path(path: &Path) -> Result<Self, anyhow::Error> {
        tracing::debug!("loading patients from {:?}...", path);
        let before_loading = Instant::now();
        let reader = open_read_maybe_gz(path)
            .map_err(|e| anyhow::anyhow!("could not open {}: {}", path.display(), e))?;
        let result = Self::from_reader(reader)?;
        tracing::debug!(
            "... done loading {} patients in {:?}",
            result.len(),
            before_loading.elapsed()
        );
        Ok(result)
    }

    /// Normalize all records against the loaded vocabularies.
    pub fn normalize(&mut self, ontology: &OntologyGraph, xlink: &CrossRefTable) {
        for record in self.records.values_mut() {
            *record = record.normalized(ontology, xlink);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &PatientRecord> {
        self.records.values()
    }
}

impl PatientStore for JsonPatientStore {
    fn fetch_all(&self) -> Result<Vec<PatientRecord>, anyhow::Error> {
        Ok(self.records.values().cloned().collect())
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<PatientRecord>, anyhow::Error> {
        Ok(self.records.get(id).cloned())
    }
}
