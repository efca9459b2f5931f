//! Code supporting the `server rest` sub command.

use std::{path::Path, time::Instant};

use actix_web::web::Data;
use clap::Parser;
use tracing::{info, warn};

use crate::{
    common::trace_rss_now,
    conf::{Conf, Direction},
    genes::xlink::CrossRefTable,
    matcher::{
        load_references,
        store::{JsonPatientStore, PatientStore},
        ReferenceArgs,
    },
    pheno::ontology::OntologyGraph,
};

pub mod actix_server;

/// Data to keep in the web server.
pub struct WebServerData {
    pub ontology: OntologyGraph,
    pub xlink: CrossRefTable,
    pub store: Box<dyn PatientStore + Send + Sync>,
    pub conf: Conf,
}

/// Command line arguments for `server rest` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run Matchmaker Exchange REST API server", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub references: ReferenceArgs,
    /// Path to the patient corpus, JSON array or one record per line.
    #[arg(long, required = true)]
    pub path_patients: String,
    /// Path to the TOML configuration file with ranking settings and peers.
    #[arg(long, required = true)]
    pub path_conf: String,
    /// IP to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    pub listen_host: String,
    /// Port to listen on.
    #[arg(long, default_value_t = 8081)]
    pub listen_port: u16,
}

/// Main entry point for `server rest` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    if let Some(level) = args_common.verbose.log_level() {
        match level {
            log::Level::Trace | log::Level::Debug => {
                std::env::set_var("RUST_LOG", "debug");
                env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
            }
            _ => (),
        }
    }

    info!("Loading configuration...");
    let conf = Conf::from_path(&args.path_conf)?;
    let num_incoming = conf
        .servers
        .iter()
        .filter(|server| server.direction == Direction::In)
        .count();
    if num_incoming == 0 {
        warn!("no incoming servers configured, all requests will be rejected");
    }

    info!("Loading patients...");
    let before_loading = Instant::now();
    let mut store = JsonPatientStore::from_path(Path::new(&args.path_patients))?;
    info!(
        "...done loading {} patients in {:?}",
        store.len(),
        before_loading.elapsed()
    );

    let references = load_references(&args.references, store.records())?;
    store.normalize(&references.ontology, &references.xlink);
    let data = Data::new(WebServerData {
        ontology: references.ontology,
        xlink: references.xlink,
        store: Box::new(store),
        conf,
    });

    trace_rss_now();

    info!("Launching server ...");
    actix_server::main(args, data)?;

    info!("All done. Have a nice day!");
    Ok(())
}
