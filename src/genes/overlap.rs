//! Scoring of the overlap between two sets of canonical gene symbols.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// How to turn the size of the gene set intersection into a score.
#[derive(
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Debug,
    Default,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverlapScoring {
    /// `1` for any shared gene, `0` otherwise.
    #[default]
    Binary,
    /// `1 - 2^-k` for `k` shared genes.
    Saturating,
}

impl OverlapScoring {
    /// Score for an intersection of size `shared`.
    ///
    /// Non-decreasing in `shared` and `0` exactly for `shared == 0`.
    pub fn score_shared(&self, shared: usize) -> f64 {
        if shared == 0 {
            return 0f64;
        }
        match self {
            OverlapScoring::Binary => 1f64,
            OverlapScoring::Saturating => {
                let exponent = i32::try_from(shared).unwrap_or(i32::MAX);
                1f64 - 0.5f64.powi(exponent)
            }
        }
    }
}

/// Score the overlap of two normalized gene sets.
pub fn score<T: Ord>(query: &BTreeSet<T>, candidate: &BTreeSet<T>, scoring: OverlapScoring) -> f64 {
    scoring.score_shared(query.intersection(candidate).count())
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use super::*;

    fn genes(symbols: &[&'static str]) -> BTreeSet<&'static str> {
        symbols.iter().copied().collect()
    }

    #[rstest::rstest]
    #[case(OverlapScoring::Binary, &[], &["NGLY1"], 0.0)]
    #[case(OverlapScoring::Binary, &["NGLY1"], &[], 0.0)]
    #[case(OverlapScoring::Binary, &["NGLY1"], &["FBN1"], 0.0)]
    #[case(OverlapScoring::Binary, &["NGLY1"], &["FBN1", "NGLY1"], 1.0)]
    #[case(OverlapScoring::Binary, &["NGLY1", "FBN1"], &["FBN1", "NGLY1"], 1.0)]
    #[case(OverlapScoring::Saturating, &["NGLY1"], &["FBN1"], 0.0)]
    #[case(OverlapScoring::Saturating, &["NGLY1"], &["FBN1", "NGLY1"], 0.5)]
    #[case(OverlapScoring::Saturating, &["NGLY1", "FBN1"], &["FBN1", "NGLY1"], 0.75)]
    fn score_cases(
        #[case] scoring: OverlapScoring,
        #[case] query: &[&'static str],
        #[case] candidate: &[&'static str],
        #[case] expected: f64,
    ) {
        assert_eq!(score(&genes(query), &genes(candidate), scoring), expected);
    }

    #[rstest::rstest]
    #[case(OverlapScoring::Binary)]
    #[case(OverlapScoring::Saturating)]
    fn score_monotonic(#[case] scoring: OverlapScoring) {
        let zero = scoring.score_shared(0);
        let mut prev = zero;
        for k in 1..64 {
            let current = scoring.score_shared(k);
            assert!(current >= prev, "k = {k}");
            assert!(current > zero, "k = {k}");
            prev = current;
        }
    }

    #[test]
    fn scoring_from_str() -> Result<(), anyhow::Error> {
        use std::str::FromStr;

        assert_eq!(OverlapScoring::from_str("saturating")?, OverlapScoring::Saturating);
        assert_eq!(OverlapScoring::default().to_string(), "binary");

        Ok(())
    }
}
