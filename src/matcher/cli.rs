//! Code implementing the `match query` sub command.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    time::Instant,
};

use anyhow::anyhow;
use clap::Parser;
use tracing::info;

use crate::{conf::Conf, genes::overlap::OverlapScoring};

use super::{
    load_references,
    rank::Ranker,
    schema::{MatchRequest, PatientRecord},
    store::{JsonPatientStore, PatientStore},
    ReferenceArgs,
};

/// Command line arguments for `match query` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Rank patients against a query patient", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub references: ReferenceArgs,
    /// Path to the patient corpus, JSON array or one record per line.
    #[arg(long, required = true)]
    pub path_patients: String,
    /// Path to the TOML configuration file.
    #[arg(long)]
    pub path_conf: Option<String>,
    /// Path to a Matchmaker Exchange match request JSON.
    #[arg(long, conflicts_with = "query_patient_id")]
    pub path_query_json: Option<String>,
    /// Use the corpus patient with this id as the query.
    #[arg(long)]
    pub query_patient_id: Option<String>,
    /// Maximal number of results, overrides the configuration.
    #[arg(long)]
    pub limit: Option<usize>,
    /// Minimal composite score, overrides the configuration.
    #[arg(long)]
    pub min_score: Option<f64>,
    /// Gene overlap scoring, overrides the configuration.
    #[arg(long, value_enum)]
    pub overlap_scoring: Option<OverlapScoring>,
    /// Add the best-matching term for each query term to the results.
    #[arg(long, default_value_t = false)]
    pub explain: bool,
    /// Path to the output JSON file, stdout if not given.
    #[arg(long)]
    pub path_output: Option<String>,
}

/// Output of `match query`.
pub mod output {
    use serde::Serialize;

    use crate::{
        conf::RankingConf,
        matcher::rank::MatchCandidate,
        pheno::algos::phenomizer::TermMatch,
    };

    /// Provenance of the results.
    #[derive(Serialize, Debug, Clone)]
    pub struct Header {
        pub worker_version: String,
        pub hpo_version: Option<String>,
        pub query_id: String,
        pub ranking: RankingConf,
    }

    /// One ranked candidate.
    #[derive(Serialize, Debug, Clone)]
    pub struct Record<'a> {
        #[serde(flatten)]
        pub candidate: MatchCandidate<'a>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub term_matches: Option<Vec<TermMatch>>,
    }

    #[derive(Serialize, Debug, Clone)]
    pub struct Container<'a> {
        pub header: Header,
        pub results: Vec<Record<'a>>,
    }
}

/// Read the query patient from a match request JSON file.
fn load_query_json(path: &Path) -> Result<PatientRecord, anyhow::Error> {
    let json_str = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("could not read query {}: {}", path.display(), e))?;
    let request: MatchRequest = serde_json::from_str(&json_str)?;
    Ok(request.patient)
}

/// Main entry point for `match query` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    let mut conf = match &args.path_conf {
        Some(path_conf) => Conf::from_path(path_conf)?,
        None => Conf::default(),
    };
    if let Some(limit) = args.limit {
        conf.ranking.limit = limit;
    }
    if let Some(min_score) = args.min_score {
        conf.ranking.min_score = min_score;
    }
    if let Some(overlap_scoring) = args.overlap_scoring {
        conf.ranking.overlap_scoring = overlap_scoring;
    }
    conf.ranking.validate()?;

    info!("Loading patients...");
    let before_patients = Instant::now();
    let mut store = JsonPatientStore::from_path(Path::new(&args.path_patients))?;
    info!(
        "...done loading {} patients in {:?}",
        store.len(),
        before_patients.elapsed()
    );

    let references = load_references(&args.references, store.records())?;
    store.normalize(&references.ontology, &references.xlink);

    let query = match (&args.path_query_json, &args.query_patient_id) {
        (Some(path), _) => load_query_json(Path::new(path))?,
        (None, Some(id)) => store
            .fetch_by_id(id)?
            .ok_or_else(|| anyhow!("no patient with id {} in corpus", id))?,
        (None, None) => {
            return Err(anyhow!(
                "either --path-query-json or --query-patient-id must be given"
            ))
        }
    }
    .normalized(&references.ontology, &references.xlink);

    let ranker = Ranker::new(&references.ontology, &references.xlink, conf.ranking.clone());

    info!("Starting ranking...");
    let before_ranking = Instant::now();
    let candidates = store.fetch_all()?;
    let ranked = ranker.rank_with_conf(&query, &candidates)?;
    info!(
        "...done ranking {} candidates in {:?}",
        candidates.len(),
        before_ranking.elapsed()
    );

    let results = ranked
        .into_iter()
        .map(|candidate| {
            info!(
                "  {} -> {:.4} (phenotype {:.4}, genomic {:.4})",
                candidate.patient.id,
                candidate.score.composite,
                candidate.score.phenotype,
                candidate.score.genomic
            );
            let term_matches = args
                .explain
                .then(|| ranker.explain(&query, candidate.patient));
            output::Record {
                candidate,
                term_matches,
            }
        })
        .collect::<Vec<_>>();

    let container = output::Container {
        header: output::Header {
            worker_version: env!("CARGO_PKG_VERSION").to_string(),
            hpo_version: references.ontology.version().map(str::to_string),
            query_id: query.id.clone(),
            ranking: conf.ranking.clone(),
        },
        results,
    };

    let mut writer: Box<dyn Write> = match &args.path_output {
        Some(path_output) => Box::new(BufWriter::new(File::create(path_output)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    serde_json::to_writer_pretty(&mut writer, &container)?;
    writeln!(writer)?;
    writer.flush()?;

    info!("All done. Have a nice day!");
    Ok(())
}
