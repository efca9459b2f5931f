//! Phenotype ontology, information content and similarity.

pub mod algos;
pub mod freqs;
pub mod obo;
pub mod ontology;
pub mod term_sim;
