//! Patient matching: records, store, ranking and the `match query` command.

pub mod cli;
pub mod rank;
pub mod schema;
pub mod store;

use std::{path::Path, time::Instant};

use clap::Parser;
use tracing::info;

use crate::{
    common::trace_rss_now,
    genes::xlink::CrossRefTable,
    pheno::{freqs::TermFrequencies, ontology::OntologyGraph},
};

use self::schema::PatientRecord;

/// Command line arguments locating the reference data.
#[derive(Parser, Debug, Clone)]
pub struct ReferenceArgs {
    /// Path to the HPO OBO file (may be gzip-compressed).
    #[arg(long, required = true)]
    pub path_hpo_obo: String,
    /// Path to term annotation counts TSV; derived from the patients if
    /// not given.
    #[arg(long)]
    pub path_term_freqs: Option<String>,
    /// Path to the HGNC gene table TSV.
    #[arg(long, required = true)]
    pub path_hgnc_tsv: String,
}

/// The frozen reference data shared by all match requests.
#[derive(Debug)]
pub struct References {
    pub ontology: OntologyGraph,
    pub xlink: CrossRefTable,
}

/// Load ontology and gene table; `patients` provides the term counts when no
/// frequency file is given.
pub fn load_references<'a, I>(args: &ReferenceArgs, patients: I) -> Result<References, anyhow::Error>
where
    I: IntoIterator<Item = &'a PatientRecord>,
{
    info!("Loading term frequencies...");
    let before_freqs = Instant::now();
    let freqs = match &args.path_term_freqs {
        Some(path) => TermFrequencies::from_path(Path::new(path))?,
        None => TermFrequencies::from_patients(patients),
    };
    info!(
        "...done loading {} term frequencies in {:?}",
        freqs.len(),
        before_freqs.elapsed()
    );

    info!("Loading HPO...");
    let before_hpo = Instant::now();
    let ontology = OntologyGraph::from_path(Path::new(&args.path_hpo_obo), &freqs)?;
    info!(
        "...done loading {} terms (version {}) in {:?}",
        ontology.len(),
        ontology.version().unwrap_or("unknown"),
        before_hpo.elapsed()
    );

    info!("Loading genes...");
    let before_genes = Instant::now();
    let xlink = CrossRefTable::from_path(Path::new(&args.path_hgnc_tsv))?;
    info!(
        "...done loading {} genes in {:?}",
        xlink.len(),
        before_genes.elapsed()
    );

    trace_rss_now();

    Ok(References { ontology, xlink })
}
