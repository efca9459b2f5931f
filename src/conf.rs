//! Configuration of ranking and of the Matchmaker Exchange peers.
//!
//! Loaded from a TOML file, e.g.:
//!
//! ```toml
//! [ranking]
//! phenotype_weight = 0.75
//! genomic_weight = 0.25
//! limit = 5
//! min_score = 0.0
//! overlap_scoring = "binary"
//!
//! [[servers]]
//! server_id = "peer-a"
//! server_label = "Peer A"
//! server_key = "secret-a"
//! direction = "in"
//! ```

use std::path::Path;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::genes::overlap::OverlapScoring;

/// Weights and result cut-offs of the ranker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RankingConf {
    /// Weight of the phenotype similarity in the composite score.
    pub phenotype_weight: f64,
    /// Weight of the gene overlap in the composite score.
    pub genomic_weight: f64,
    /// Maximal number of results.
    pub limit: usize,
    /// Candidates with a composite score below are dropped.
    pub min_score: f64,
    /// How to turn the number of shared genes into a score.
    pub overlap_scoring: OverlapScoring,
}

impl Default for RankingConf {
    fn default() -> Self {
        Self {
            phenotype_weight: 0.75,
            genomic_weight: 0.25,
            limit: 5,
            min_score: 0.0,
            overlap_scoring: OverlapScoring::default(),
        }
    }
}

impl RankingConf {
    /// Phenotype must dominate: `phenotype_weight > genomic_weight >= 0`.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.phenotype_weight.is_finite() || !self.genomic_weight.is_finite() {
            return Err(anyhow!("ranking weights must be finite"));
        }
        if self.genomic_weight < 0.0 {
            return Err(anyhow!(
                "genomic_weight must not be negative, is {}",
                self.genomic_weight
            ));
        }
        if self.phenotype_weight <= self.genomic_weight {
            return Err(anyhow!(
                "phenotype_weight ({}) must be larger than genomic_weight ({})",
                self.phenotype_weight,
                self.genomic_weight
            ));
        }
        if !self.min_score.is_finite() {
            return Err(anyhow!("min_score must be finite"));
        }
        Ok(())
    }
}

/// Whether a peer sends requests to us or receives requests from us.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// A Matchmaker Exchange peer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConf {
    pub server_id: String,
    #[serde(default)]
    pub server_label: Option<String>,
    /// Shared secret sent in the `X-Auth-Token` header.
    pub server_key: String,
    pub direction: Direction,
    /// Endpoint of outgoing peers, must use HTTPS.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ServerConf {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server_id.trim().is_empty() {
            return Err(anyhow!("server_id must not be empty"));
        }
        if self.server_key.trim().is_empty() {
            return Err(anyhow!("server {} has an empty key", self.server_id));
        }
        if self.direction == Direction::Out {
            match &self.base_url {
                Some(url) if url.starts_with("https://") => (),
                _ => {
                    return Err(anyhow!(
                        "outgoing server {} needs an https:// base_url",
                        self.server_id
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Conf {
    pub ranking: RankingConf,
    pub servers: Vec<ServerConf>,
}

impl Conf {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml(toml_str: &str) -> Result<Self, anyhow::Error> {
        let conf: Self = toml::from_str(toml_str)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Load and validate configuration from a TOML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let toml_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("could not read config {}: {}", path.display(), e))?;
        Self::from_toml(&toml_str)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.ranking.validate()?;
        for server in &self.servers {
            server.validate()?;
        }
        let mut ids = self.servers.iter().map(|s| &s.server_id).collect::<Vec<_>>();
        ids.sort();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(anyhow!("server_id {} occurs more than once", pair[0]));
        }
        Ok(())
    }

    /// The incoming peer owning `token`, if any.
    pub fn authenticate(&self, token: &str) -> Option<&ServerConf> {
        self.servers
            .iter()
            .filter(|server| server.direction == Direction::In)
            .find(|server| server.server_key == token)
    }
}
