//! Scoring and ranking of candidate patients against a query patient.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexSet;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    conf::RankingConf,
    err::InvalidRecordError,
    genes::{overlap, xlink::CrossRefTable},
    pheno::{
        algos::phenomizer::{self, TermMatch},
        ontology::{OntologyGraph, TermIdx},
    },
};

use super::schema::PatientRecord;

/// Scores of one candidate; all values are non-negative.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Weighted combination of `phenotype` and `genomic`.
    #[serde(rename = "patient")]
    pub composite: f64,
    pub phenotype: f64,
    pub genomic: f64,
}

/// A scored candidate, serializes as a Matchmaker Exchange result.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MatchCandidate<'a> {
    pub score: Score,
    pub patient: &'a PatientRecord,
}

/// Ranks candidates using the frozen reference data.
#[derive(Debug, Clone)]
pub struct Ranker<'a> {
    ontology: &'a OntologyGraph,
    xlink: &'a CrossRefTable,
    conf: RankingConf,
}

impl<'a> Ranker<'a> {
    pub fn new(ontology: &'a OntologyGraph, xlink: &'a CrossRefTable, conf: RankingConf) -> Self {
        Self {
            ontology,
            xlink,
            conf,
        }
    }

    pub fn conf(&self) -> &RankingConf {
        &self.conf
    }

    /// Observed terms of `patient` with alternative ids mapped to primary
    /// ones; unknown terms are kept as given.
    fn canonical_terms<'p>(&self, patient: &'p PatientRecord) -> IndexSet<&'p str>
    where
        'a: 'p,
    {
        patient
            .observed_term_ids()
            .into_iter()
            .map(|term_id| match self.ontology.term(term_id) {
                Some(term) => term.id.as_str(),
                None => term_id,
            })
            .collect()
    }

    fn resolved_terms(&self, patient: &PatientRecord) -> Vec<TermIdx> {
        self.canonical_terms(patient)
            .into_iter()
            .filter_map(|term_id| self.ontology.resolve(term_id))
            .collect()
    }

    /// Weighted sum of the two component scores.
    pub fn composite(&self, phenotype: f64, genomic: f64) -> f64 {
        self.conf.phenotype_weight * phenotype + self.conf.genomic_weight * genomic
    }

    /// Score a single candidate against `query`.
    pub fn score(&self, query: &PatientRecord, candidate: &PatientRecord) -> Score {
        let qs = phenomizer::resolve_all(self.ontology, self.canonical_terms(query));
        let query_genes = query.normalized_genes(self.xlink);
        self.score_prepared(&qs, &query_genes, candidate)
    }

    fn score_prepared(
        &self,
        qs: &[Option<TermIdx>],
        query_genes: &BTreeSet<&str>,
        candidate: &PatientRecord,
    ) -> Score {
        let phenotype = phenomizer::score_resolved(self.ontology, qs, &self.resolved_terms(candidate));
        let genomic = overlap::score(
            query_genes,
            &candidate.normalized_genes(self.xlink),
            self.conf.overlap_scoring,
        );
        Score {
            composite: self.composite(phenotype, genomic),
            phenotype,
            genomic,
        }
    }

    /// Rank `candidates` by similarity to `query`.
    ///
    /// The query patient itself (by id) is never returned.  Results are sorted
    /// by descending composite score with ties broken by ascending patient id,
    /// filtered by `min_score` and truncated to `limit`.  A query without any
    /// observed phenotype or genomic feature yields no results.
    pub fn rank<'p>(
        &self,
        query: &PatientRecord,
        candidates: &'p [PatientRecord],
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<MatchCandidate<'p>>, InvalidRecordError> {
        query.validate()?;
        let mut seen = HashSet::with_capacity(candidates.len());
        for candidate in candidates {
            candidate.validate()?;
            if !seen.insert(candidate.id.as_str()) {
                return Err(InvalidRecordError::DuplicatePatientId(candidate.id.clone()));
            }
        }

        if query.has_no_features(self.xlink) {
            tracing::debug!("query {} has no features, nothing to match", query.id);
            return Ok(Vec::new());
        }

        let qs = phenomizer::resolve_all(self.ontology, self.canonical_terms(query));
        let num_unknown = qs.iter().filter(|q| q.is_none()).count();
        if num_unknown > 0 {
            tracing::debug!(
                "query {}: {} of {} terms not in ontology",
                query.id,
                num_unknown,
                qs.len()
            );
        }
        let query_genes = query.normalized_genes(self.xlink);

        let mut result = candidates
            .par_iter()
            .filter(|candidate| candidate.id != query.id)
            .map(|candidate| MatchCandidate {
                score: self.score_prepared(&qs, &query_genes, candidate),
                patient: candidate,
            })
            .filter(|m| m.score.composite >= min_score)
            .collect::<Vec<_>>();

        result.sort_by(|a, b| {
            b.score
                .composite
                .total_cmp(&a.score.composite)
                .then_with(|| a.patient.id.cmp(&b.patient.id))
        });
        result.truncate(limit);

        Ok(result)
    }

    /// Like `rank()` with limit and minimal score from the configuration.
    pub fn rank_with_conf<'p>(
        &self,
        query: &PatientRecord,
        candidates: &'p [PatientRecord],
    ) -> Result<Vec<MatchCandidate<'p>>, InvalidRecordError> {
        self.rank(query, candidates, self.conf.limit, self.conf.min_score)
    }

    /// Per query term, the best-matching term of `candidate`.
    pub fn explain(&self, query: &PatientRecord, candidate: &PatientRecord) -> Vec<TermMatch> {
        phenomizer::best_matches(
            self.ontology,
            self.canonical_terms(query),
            self.canonical_terms(candidate),
        )
    }
}
