//! Phenotype-related algorithms.

/// Term-term similarity using the most informative common ancestor.
pub mod resnik {
    use crate::pheno::ontology::{OntologyGraph, TermIdx};

    /// Similarity of two resolved terms, `IC(MICA(a, b))`.
    pub fn similarity_idx(graph: &OntologyGraph, a: TermIdx, b: TermIdx) -> f64 {
        let lhs = graph.term_at(a).ancestor_idxs();
        let rhs = graph.term_at(b).ancestor_idxs();
        // Iterate the smaller set only.
        let (small, large) = if lhs.len() <= rhs.len() {
            (lhs, rhs)
        } else {
            (rhs, lhs)
        };
        small
            .iter()
            .filter(|idx| large.contains(*idx))
            .map(|&idx| graph.term_at(idx).information_content)
            .fold(0f64, f64::max)
    }

    /// Similarity of two terms by identifier; `0` if either is unknown.
    pub fn similarity(graph: &OntologyGraph, a: &str, b: &str) -> f64 {
        match (graph.resolve(a), graph.resolve(b)) {
            (Some(a), Some(b)) => similarity_idx(graph, a, b),
            _ => 0f64,
        }
    }
}

/// Query-anchored set similarity ("best match forward").
///
/// For each query term, the best similarity against any candidate term is
/// taken and the values are averaged over the number of query terms.  Extra
/// candidate terms are not penalized.
pub mod phenomizer {
    use serde::Serialize;

    use super::resnik;
    use crate::pheno::ontology::{OntologyGraph, TermIdx};

    /// Resolve term identifiers, keeping unknown ones as `None`.
    pub fn resolve_all<'a, I>(graph: &OntologyGraph, terms: I) -> Vec<Option<TermIdx>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        terms.into_iter().map(|t| graph.resolve(t)).collect()
    }

    /// Best similarity of `q` against any of `ds`, together with the index of
    /// the first best-scoring candidate.
    fn best_match(graph: &OntologyGraph, q: TermIdx, ds: &[TermIdx]) -> Option<(TermIdx, f64)> {
        ds.iter()
            .map(|&d| (d, resnik::similarity_idx(graph, q, d)))
            .fold(None, |best, (d, s)| match best {
                Some((_, best_s)) if best_s >= s => best,
                _ => Some((d, s)),
            })
    }

    /// Score with already resolved terms.
    ///
    /// Unknown query terms (`None`) count towards the number of query terms
    /// but contribute zero similarity.
    pub fn score_resolved(graph: &OntologyGraph, qs: &[Option<TermIdx>], ds: &[TermIdx]) -> f64 {
        // Handle case of empty `qs` or `ds`.
        if qs.is_empty() || ds.is_empty() {
            return 0f64;
        }

        let sum = qs
            .iter()
            .flatten()
            .filter_map(|&q| best_match(graph, q, ds).map(|(_, s)| s))
            .sum::<f64>();
        sum / qs.len() as f64
    }

    /// Score query terms against candidate terms by identifier.
    ///
    /// Both sides are expected to be free of duplicates.
    pub fn score<'a, Q, D>(graph: &OntologyGraph, query: Q, candidate: D) -> f64
    where
        Q: IntoIterator<Item = &'a str>,
        D: IntoIterator<Item = &'a str>,
    {
        let qs = resolve_all(graph, query);
        let ds = resolve_all(graph, candidate)
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        score_resolved(graph, &qs, &ds)
    }

    /// Explanation of the best match for one query term.
    #[derive(Serialize, Debug, Clone, PartialEq)]
    pub struct TermMatch {
        /// The query term as given.
        pub query: String,
        /// The best-matching candidate term, if any has positive similarity.
        pub candidate: Option<String>,
        /// The similarity score.
        pub score: f64,
    }

    /// Per query term, the best-matching candidate term.
    pub fn best_matches<'a, Q, D>(graph: &OntologyGraph, query: Q, candidate: D) -> Vec<TermMatch>
    where
        Q: IntoIterator<Item = &'a str>,
        D: IntoIterator<Item = &'a str>,
    {
        let ds = resolve_all(graph, candidate)
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        query
            .into_iter()
            .map(|q| {
                let best = graph.resolve(q).and_then(|q| best_match(graph, q, &ds));
                match best {
                    Some((d, s)) if s > 0.0 => TermMatch {
                        query: q.to_string(),
                        candidate: Some(graph.term_at(d).id.clone()),
                        score: s,
                    },
                    _ => TermMatch {
                        query: q.to_string(),
                        candidate: None,
                        score: 0.0,
                    },
                }
            })
            .collect()
    }
}
