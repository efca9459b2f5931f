//! Error types shared by the matching engine and its loaders.

/// Problems while loading the reference vocabularies (ontology, frequencies,
/// gene cross-reference table).
///
/// These are fatal at startup, nothing is served with partially loaded data.
#[derive(thiserror::Error, Debug)]
pub enum VocabularyLoadError {
    #[error("could not read vocabulary file {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed OBO line {line_no}: {line:?}")]
    MalformedObo { line_no: usize, line: String },
    #[error("OBO term stanza ending at line {line_no} has no id")]
    MissingTermId { line_no: usize },
    #[error("duplicate term id {0}")]
    DuplicateTerm(String),
    #[error("term {term} references unknown parent {parent}")]
    UnknownParent { term: String, parent: String },
    #[error("ontology is not acyclic, cycle involves {0}")]
    Cycle(String),
    #[error("malformed frequency line {line_no}: {source}")]
    MalformedFrequency {
        line_no: u64,
        #[source]
        source: csv::Error,
    },
    #[error("problem reading gene table: {0}")]
    GeneTable(#[from] csv::Error),
}

/// A patient record does not conform to the record shape.
///
/// Surfaced to the caller as it indicates upstream corruption of the corpus.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRecordError {
    #[error("patient record has an empty id")]
    EmptyPatientId,
    #[error("patient {patient} has a phenotype feature with empty term id")]
    EmptyTermId { patient: String },
    #[error("patient {patient} has a genomic feature without gene id")]
    EmptyGeneId { patient: String },
    #[error("patient id {0} occurs more than once")]
    DuplicatePatientId(String),
}

/// Lookup of a term that is not part of the loaded ontology.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown ontology term {0}")]
pub struct UnknownTermError(pub String);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_unknown_parent() {
        let err = VocabularyLoadError::UnknownParent {
            term: "HP:0000002".into(),
            parent: "HP:9999999".into(),
        };
        insta::assert_snapshot!(err.to_string(), @"term HP:0000002 references unknown parent HP:9999999");
    }

    #[test]
    fn display_invalid_record() {
        let err = InvalidRecordError::EmptyGeneId {
            patient: "P0001".into(),
        };
        insta::assert_snapshot!(err.to_string(), @"patient P0001 has a genomic feature without gene id");
    }
}
