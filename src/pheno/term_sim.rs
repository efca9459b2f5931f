//! Code implementing the `pheno term-sim` sub command.
//!
//! Writes the pairwise Resnik similarity of two term lists as TSV.

use std::{io::Write, path::Path, time::Instant};

use clap::Parser;
use itertools::Itertools;
use serde::Serialize;
use tracing::info;

use super::{algos::resnik, freqs::TermFrequencies, ontology::OntologyGraph};

/// Command line arguments for `pheno term-sim` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Compute pairwise term similarities", long_about = None)]
pub struct Args {
    /// Path to the HPO OBO file (may be gzip-compressed).
    #[arg(long, required = true)]
    pub path_hpo_obo: String,
    /// Path to term annotation counts TSV; uniform counts if not given.
    #[arg(long)]
    pub path_term_freqs: Option<String>,
    /// The first set of terms, comma-separated.
    #[arg(long, required = true, value_delimiter = ',')]
    pub lhs: Vec<String>,
    /// The second set of terms, comma-separated.
    #[arg(long, required = true, value_delimiter = ',')]
    pub rhs: Vec<String>,
    /// Path to the output TSV file, stdout if not given.
    #[arg(long)]
    pub path_output: Option<String>,
}

/// One output row.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Record {
    pub lhs: String,
    pub rhs: String,
    /// Identifier of the most informative common ancestor.
    pub mica: Option<String>,
    pub score: f64,
}

/// The most informative common ancestor of two terms, if both are known.
///
/// Ties are broken towards the more specific term.
fn mica<'a>(ontology: &'a OntologyGraph, lhs: &str, rhs: &str) -> Option<&'a str> {
    let lhs = ontology.resolve(lhs)?;
    let rhs = ontology.resolve(rhs)?;
    let rhs_ancestors = ontology.term_at(rhs).ancestor_idxs();
    ontology
        .term_at(lhs)
        .ancestor_idxs()
        .iter()
        .filter(|idx| rhs_ancestors.contains(*idx))
        .map(|&idx| ontology.term_at(idx))
        .max_by(|a, b| {
            a.information_content
                .total_cmp(&b.information_content)
                .then_with(|| a.ancestor_idxs().len().cmp(&b.ancestor_idxs().len()))
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|term| term.id.as_str())
}

/// Compute all pairs of `lhs` and `rhs`.
pub fn compute(ontology: &OntologyGraph, lhs: &[String], rhs: &[String]) -> Vec<Record> {
    lhs.iter()
        .cartesian_product(rhs.iter())
        .map(|(l, r)| Record {
            lhs: l.clone(),
            rhs: r.clone(),
            mica: mica(ontology, l, r).map(str::to_string),
            score: resnik::similarity(ontology, l, r),
        })
        .collect()
}

/// Main entry point for `pheno term-sim` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    info!("Loading HPO...");
    let before_loading = Instant::now();
    let freqs = match &args.path_term_freqs {
        Some(path) => TermFrequencies::from_path(Path::new(path))?,
        None => TermFrequencies::default(),
    };
    let ontology = OntologyGraph::from_path(Path::new(&args.path_hpo_obo), &freqs)?;
    info!("...done loading HPO in {:?}", before_loading.elapsed());

    let output: Box<dyn Write> = match &args.path_output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(output);
    for record in compute(&ontology, &args.lhs, &args.rhs) {
        writer.serialize(&record)?;
    }
    writer.flush()?;

    info!("All done. Have a nice day!");
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pheno::ontology::test::toy_ontology;

    #[test]
    fn compute_pairs() -> Result<(), anyhow::Error> {
        let ontology = toy_ontology();
        let lhs = vec!["HP:0001263".to_string(), "HP:0000522".to_string()];
        let rhs = vec!["HP:0012758".to_string(), "HP:0000479".to_string()];

        let records = compute(&ontology, &lhs, &rhs);

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].mica.as_deref(), Some("HP:0012758"));
        assert_eq!(records[0].score, ontology.information_content("HP:0012758")?);
        assert_eq!(records[1].score, 0.0);
        // unknown terms have no common ancestor
        assert_eq!(records[2].mica, None);
        assert_eq!(records[3].score, 0.0);

        Ok(())
    }

    #[test]
    fn run_writes_tsv() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let path_output = tmpdir.join("out.tsv");
        let args = Args {
            path_hpo_obo: "tests/pheno/hp.obo".into(),
            path_term_freqs: Some("tests/pheno/term_freqs.tsv".into()),
            lhs: vec!["HP:0001263".into()],
            rhs: vec!["HP:0001999".into(), "HP:0000252".into()],
            path_output: Some(format!("{}", path_output.display())),
        };

        run(&crate::common::Args::default(), &args)?;

        let tsv = std::fs::read_to_string(&path_output)?;
        let lines = tsv.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "lhs\trhs\tmica\tscore");
        // alternative id resolves to the term itself
        assert!(lines[1].starts_with("HP:0001263\tHP:0001999\tHP:0001263\t"));

        Ok(())
    }
}
