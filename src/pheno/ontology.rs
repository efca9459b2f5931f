//! The phenotype ontology as a frozen, in-memory term graph.
//!
//! The graph is built once (from an OBO file or from term definitions) and
//! never mutated afterwards.  Ancestor closures and information content values
//! are computed at construction time so that similarity computations only
//! perform lookups.

use std::{
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    io::BufRead,
    path::Path,
    time::Instant,
};

use crate::{
    common::io::open_read_maybe_gz,
    err::{UnknownTermError, VocabularyLoadError},
};

use super::{freqs::TermFrequencies, obo};

/// Index of a term inside an `OntologyGraph`.
pub type TermIdx = usize;

/// Definition of a term for building an `OntologyGraph`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermDef {
    /// Primary identifier, e.g., `HP:0000118`.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Alternative identifiers resolving to this term.
    pub alt_ids: Vec<String>,
    /// Identifiers of the direct `is_a` parents.
    pub parents: Vec<String>,
}

impl TermDef {
    /// Shortcut for a term without name and alternative ids.
    pub fn new(id: &str, parents: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }
}

/// A term of the loaded ontology.
#[derive(Debug, Clone)]
pub struct OntologyTerm {
    /// Primary identifier.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Alternative identifiers.
    pub alt_ids: Vec<String>,
    /// Primary identifiers of the direct parents.
    pub parents: Vec<String>,
    /// Information content, `0` for roots.
    pub information_content: f64,
    /// Transitive closure of parents, including the term itself.
    ancestors: HashSet<TermIdx>,
}

impl OntologyTerm {
    /// Indices of all ancestors, including the term itself.
    pub fn ancestor_idxs(&self) -> &HashSet<TermIdx> {
        &self.ancestors
    }
}

/// The frozen ontology.
#[derive(Debug, Clone, Default)]
pub struct OntologyGraph {
    /// Terms in topological order (parents before children).
    terms: Vec<OntologyTerm>,
    /// Primary and alternative identifiers to term index.
    index: HashMap<String, TermIdx>,
    /// Maximal information content of any term.
    ic_max: f64,
    /// The ontology's `data-version`, if known.
    version: Option<String>,
}

impl OntologyGraph {
    /// Load from OBO data in `reader`; `source` is used in error messages.
    pub fn load<R: BufRead>(
        reader: R,
        source: &str,
        frequencies: &TermFrequencies,
    ) -> Result<Self, VocabularyLoadError> {
        let document = obo::parse(reader, source)?;

        let mut defs = Vec::new();
        let mut num_obsolete = 0;
        for stanza in document.terms() {
            if stanza.is_obsolete() {
                num_obsolete += 1;
                continue;
            }
            let id = stanza
                .ids("id")
                .next()
                .ok_or(VocabularyLoadError::MissingTermId {
                    line_no: stanza.line_no,
                })?;
            defs.push(TermDef {
                id: id.to_string(),
                name: stanza.first("name").unwrap_or_default().to_string(),
                alt_ids: stanza.ids("alt_id").map(str::to_string).collect(),
                parents: stanza.ids("is_a").map(str::to_string).collect(),
            });
        }
        tracing::debug!(
            "read {} terms from {} (skipped {} obsolete)",
            defs.len(),
            source,
            num_obsolete
        );

        let mut result = Self::from_terms(defs, frequencies)?;
        result.version = document.data_version().map(str::to_string);
        Ok(result)
    }

    /// Load from a (possibly gzip-compressed) OBO file.
    #[tracing::instrument(skip(frequencies))]
    pub fn from_path(path: &Path, frequencies: &TermFrequencies) -> Result<Self, VocabularyLoadError> {
        tracing::debug!("loading ontology from {:?}...", path);
        let before_loading = Instant::now();
        let source = format!("{}", path.display());
        let reader = open_read_maybe_gz(path).map_err(|e| VocabularyLoadError::Io {
            path: source.clone(),
            source: e,
        })?;
        let result = Self::load(reader, &source, frequencies)?;
        tracing::debug!(
            "... done loading {} terms in {:?}",
            result.len(),
            before_loading.elapsed()
        );
        Ok(result)
    }

    /// Build from term definitions.
    ///
    /// Fails on duplicate ids, parents that cannot be resolved and cycles.
    pub fn from_terms<I>(defs: I, frequencies: &TermFrequencies) -> Result<Self, VocabularyLoadError>
    where
        I: IntoIterator<Item = TermDef>,
    {
        let defs = defs.into_iter().collect::<Vec<_>>();

        // Primary ids take precedence over alternative ones.
        let mut index = HashMap::with_capacity(defs.len());
        for (idx, def) in defs.iter().enumerate() {
            if index.insert(def.id.clone(), idx).is_some() {
                return Err(VocabularyLoadError::DuplicateTerm(def.id.clone()));
            }
        }
        for (idx, def) in defs.iter().enumerate() {
            for alt_id in &def.alt_ids {
                if index.contains_key(alt_id) {
                    tracing::debug!("ignoring clashing alt_id {} of {}", alt_id, def.id);
                } else {
                    index.insert(alt_id.clone(), idx);
                }
            }
        }

        let mut parent_idxs: Vec<Vec<TermIdx>> = Vec::with_capacity(defs.len());
        for (idx, def) in defs.iter().enumerate() {
            let mut parents = Vec::with_capacity(def.parents.len());
            for parent in &def.parents {
                let parent_idx =
                    *index
                        .get(parent)
                        .ok_or_else(|| VocabularyLoadError::UnknownParent {
                            term: def.id.clone(),
                            parent: parent.clone(),
                        })?;
                if parent_idx == idx {
                    return Err(VocabularyLoadError::Cycle(def.id.clone()));
                }
                if !parents.contains(&parent_idx) {
                    parents.push(parent_idx);
                }
            }
            parent_idxs.push(parents);
        }

        let order = topological_order(&defs, &parent_idxs)?;

        // Compute ancestor closures with parents resolved first.
        let mut ancestors: Vec<HashSet<TermIdx>> = vec![HashSet::new(); defs.len()];
        for &idx in &order {
            let mut closure = HashSet::new();
            closure.insert(idx);
            for &parent in &parent_idxs[idx] {
                closure.extend(ancestors[parent].iter().copied());
            }
            ancestors[idx] = closure;
        }

        let ics = information_contents(&defs, &index, &parent_idxs, &ancestors, frequencies);
        let ic_max = ics.iter().copied().fold(0f64, f64::max);

        // Re-number terms in topological order.
        let mut new_idx = vec![0; defs.len()];
        for (new, &old) in order.iter().enumerate() {
            new_idx[old] = new;
        }
        let mut numbered = defs.into_iter().enumerate().collect::<Vec<_>>();
        numbered.sort_by_key(|(old, _)| new_idx[*old]);
        let mut terms = numbered
            .into_iter()
            .map(|(old, def)| OntologyTerm {
                id: def.id,
                name: def.name,
                alt_ids: def.alt_ids,
                parents: Vec::new(),
                information_content: ics[old],
                ancestors: ancestors[old].iter().map(|&a| new_idx[a]).collect(),
            })
            .collect::<Vec<_>>();
        for &old in &order {
            let parents = parent_idxs[old]
                .iter()
                .map(|&p| terms[new_idx[p]].id.clone())
                .collect();
            terms[new_idx[old]].parents = parents;
        }
        let index = index
            .into_iter()
            .map(|(id, old)| (id, new_idx[old]))
            .collect();

        Ok(Self {
            terms,
            index,
            ic_max,
            version: None,
        })
    }

    /// Resolve a primary or alternative identifier.
    pub fn resolve(&self, term_id: &str) -> Option<TermIdx> {
        self.index.get(term_id).copied()
    }

    /// The term with the given primary or alternative identifier.
    pub fn term(&self, term_id: &str) -> Option<&OntologyTerm> {
        self.resolve(term_id).map(|idx| &self.terms[idx])
    }

    /// The term at `idx`.
    ///
    /// # Panics
    ///
    /// If `idx` does not belong to this graph.
    pub fn term_at(&self, idx: TermIdx) -> &OntologyTerm {
        &self.terms[idx]
    }

    /// Identifiers of the term's ancestors, including the term itself.
    pub fn ancestors_of(&self, term_id: &str) -> Result<BTreeSet<&str>, UnknownTermError> {
        let term = self
            .term(term_id)
            .ok_or_else(|| UnknownTermError(term_id.to_string()))?;
        Ok(term
            .ancestors
            .iter()
            .map(|&idx| self.terms[idx].id.as_str())
            .collect())
    }

    /// Information content of the term.
    pub fn information_content(&self, term_id: &str) -> Result<f64, UnknownTermError> {
        self.term(term_id)
            .map(|term| term.information_content)
            .ok_or_else(|| UnknownTermError(term_id.to_string()))
    }

    /// Largest information content of any term.
    pub fn ic_max(&self) -> f64 {
        self.ic_max
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// All terms, parents before children.
    pub fn terms(&self) -> impl Iterator<Item = &OntologyTerm> {
        self.terms.iter()
    }
}

/// Kahn's algorithm; terms left over have a parent on a cycle.
fn topological_order(
    defs: &[TermDef],
    parent_idxs: &[Vec<TermIdx>],
) -> Result<Vec<TermIdx>, VocabularyLoadError> {
    let mut children = vec![Vec::new(); defs.len()];
    let mut in_degree = vec![0usize; defs.len()];
    for (idx, parents) in parent_idxs.iter().enumerate() {
        in_degree[idx] = parents.len();
        for &parent in parents {
            children[parent].push(idx);
        }
    }

    let mut queue = (0..defs.len())
        .filter(|&idx| in_degree[idx] == 0)
        .collect::<VecDeque<_>>();
    let mut order = Vec::with_capacity(defs.len());
    while let Some(idx) = queue.pop_front() {
        order.push(idx);
        for &child in &children[idx] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if let Some(stuck) = (0..defs.len()).find(|&idx| in_degree[idx] > 0) {
        return Err(VocabularyLoadError::Cycle(defs[stuck].id.clone()));
    }

    Ok(order)
}

/// Compute `-ln(freq(t) / total)` with annotation counts propagated to all
/// ancestors.
///
/// Unseen terms receive the largest observed value, roots receive `0`.  When
/// `frequencies` does not resolve to any term, every term counts as annotated
/// once.
fn information_contents(
    defs: &[TermDef],
    index: &HashMap<String, TermIdx>,
    parent_idxs: &[Vec<TermIdx>],
    ancestors: &[HashSet<TermIdx>],
    frequencies: &TermFrequencies,
) -> Vec<f64> {
    let mut raw = vec![0u64; defs.len()];
    let mut num_unknown = 0;
    for (term_id, count) in frequencies.iter() {
        match index.get(term_id) {
            Some(&idx) => raw[idx] += count,
            None => num_unknown += 1,
        }
    }
    if num_unknown > 0 {
        tracing::debug!("{} frequency entries for unknown terms", num_unknown);
    }
    if raw.iter().all(|&c| c == 0) {
        if !frequencies.is_empty() {
            tracing::warn!("no term frequency matches the ontology, assuming uniform counts");
        }
        raw.iter_mut().for_each(|c| *c = 1);
    }

    let mut propagated = vec![0u64; defs.len()];
    for (idx, &count) in raw.iter().enumerate() {
        if count > 0 {
            for &ancestor in &ancestors[idx] {
                propagated[ancestor] += count;
            }
        }
    }
    let total = raw.iter().sum::<u64>() as f64;

    let mut ics = propagated
        .iter()
        .map(|&freq| {
            if freq > 0 {
                Some((-(freq as f64 / total).ln()).max(0.0))
            } else {
                None
            }
        })
        .collect::<Vec<_>>();
    let max_seen = ics.iter().flatten().copied().fold(0f64, f64::max);
    for (idx, ic) in ics.iter_mut().enumerate() {
        if parent_idxs[idx].is_empty() {
            *ic = Some(0.0);
        }
    }

    ics.into_iter().map(|ic| ic.unwrap_or(max_seen)).collect()
}

#[cfg(test)]
pub(crate) mod test {
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Small synthetic ontology used across the test modules.
    ///
    /// ```text
    /// HP:0000001 All
    /// `- HP:0000118 Phenotypic abnormality
    ///    |- HP:0000707 Abnormality of the nervous system
    ///    |  |- HP:0001263 Global developmental delay
    ///    |  `- HP:0012758 Neurodevelopmental delay
    ///    |     `- HP:0001263 (second parent)
    ///    |- HP:0000478 Abnormality of the eye
    ///    |  `- HP:0000479 Abnormal retinal morphology
    ///    `- HP:0000152 Abnormality of head or neck
    ///       `- HP:0000252 Microcephaly
    /// ```
    pub fn toy_defs() -> Vec<TermDef> {
        vec![
            TermDef::new("HP:0000001", &[]),
            TermDef::new("HP:0000118", &["HP:0000001"]),
            TermDef::new("HP:0000707", &["HP:0000118"]),
            TermDef::new("HP:0012758", &["HP:0000707"]),
            TermDef::new("HP:0001263", &["HP:0000707", "HP:0012758"]),
            TermDef::new("HP:0000478", &["HP:0000118"]),
            TermDef::new("HP:0000479", &["HP:0000478"]),
            TermDef::new("HP:0000152", &["HP:0000118"]),
            TermDef::new("HP:0000252", &["HP:0000152"]),
        ]
    }

    pub fn toy_frequencies() -> TermFrequencies {
        let mut freqs = TermFrequencies::default();
        freqs.add("HP:0001263", 4);
        freqs.add("HP:0012758", 1);
        freqs.add("HP:0000479", 2);
        freqs.add("HP:0000252", 1);
        freqs
    }

    pub fn toy_ontology() -> OntologyGraph {
        OntologyGraph::from_terms(toy_defs(), &toy_frequencies()).expect("toy ontology is valid")
    }

    #[test]
    fn ancestors_of() -> Result<(), anyhow::Error> {
        let graph = toy_ontology();

        assert_eq!(
            graph.ancestors_of("HP:0001263")?.into_iter().collect::<Vec<_>>(),
            vec!["HP:0000001", "HP:0000118", "HP:0000707", "HP:0001263", "HP:0012758"]
        );
        assert_eq!(
            graph.ancestors_of("HP:0000001")?.into_iter().collect::<Vec<_>>(),
            vec!["HP:0000001"]
        );
        assert_eq!(
            graph.ancestors_of("HP:0000522"),
            Err(UnknownTermError("HP:0000522".into()))
        );

        Ok(())
    }

    #[test]
    fn information_content_values() -> Result<(), anyhow::Error> {
        let graph = toy_ontology();
        // total = 8 annotations
        assert!(approx_eq!(f64, graph.information_content("HP:0000001")?, 0.0));
        assert!(approx_eq!(f64, graph.information_content("HP:0000118")?, 0.0));
        assert!(approx_eq!(
            f64,
            graph.information_content("HP:0000707")?,
            -(5.0f64 / 8.0).ln(),
            epsilon = 1e-12
        ));
        assert!(approx_eq!(
            f64,
            graph.information_content("HP:0001263")?,
            -(4.0f64 / 8.0).ln(),
            epsilon = 1e-12
        ));
        assert!(approx_eq!(
            f64,
            graph.information_content("HP:0000252")?,
            -(1.0f64 / 8.0).ln(),
            epsilon = 1e-12
        ));
        assert_eq!(graph.ic_max(), -(1.0f64 / 8.0).ln());
        assert!(graph.information_content("HP:9999999").is_err());

        Ok(())
    }

    #[test]
    fn information_content_unseen_is_max() -> Result<(), anyhow::Error> {
        let mut defs = toy_defs();
        defs.push(TermDef::new("HP:0000480", &["HP:0000479"]));
        let graph = OntologyGraph::from_terms(defs, &toy_frequencies())?;

        assert_eq!(graph.information_content("HP:0000480")?, graph.ic_max());

        Ok(())
    }

    #[test]
    fn information_content_monotonic_along_hierarchy() {
        let graph = toy_ontology();
        for term in graph.terms() {
            for parent in &term.parents {
                let parent_ic = graph.information_content(parent).expect("parent known");
                assert!(
                    parent_ic <= term.information_content,
                    "IC({}) > IC({})",
                    parent,
                    term.id
                );
            }
        }
    }

    #[test]
    fn information_content_uniform_without_frequencies() -> Result<(), anyhow::Error> {
        let graph = OntologyGraph::from_terms(toy_defs(), &TermFrequencies::default())?;

        // 9 terms, `HP:0000707` has 3 terms below or at it.
        assert!(approx_eq!(
            f64,
            graph.information_content("HP:0000707")?,
            -(3.0f64 / 9.0).ln(),
            epsilon = 1e-12
        ));
        assert!(approx_eq!(f64, graph.information_content("HP:0000001")?, 0.0));

        Ok(())
    }

    #[test]
    fn multiple_roots_have_zero_ic() -> Result<(), anyhow::Error> {
        let defs = vec![
            TermDef::new("X:1", &[]),
            TermDef::new("X:2", &["X:1"]),
            TermDef::new("Y:1", &[]),
        ];
        let graph = OntologyGraph::from_terms(defs, &TermFrequencies::default())?;

        assert_eq!(graph.information_content("X:1")?, 0.0);
        assert_eq!(graph.information_content("Y:1")?, 0.0);
        assert!(graph.information_content("X:2")? > 0.0);

        Ok(())
    }

    #[test]
    fn topological_order_of_terms() {
        let graph = toy_ontology();
        let pos = graph
            .terms()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect::<HashMap<_, _>>();
        for term in graph.terms() {
            for parent in &term.parents {
                assert!(pos[parent] < pos[&term.id]);
            }
        }
    }

    #[test]
    fn children_before_parents_are_renumbered() -> Result<(), anyhow::Error> {
        let toy = toy_ontology();
        let mut defs = toy_defs();
        defs.reverse();
        let graph = OntologyGraph::from_terms(defs, &toy_frequencies())?;

        assert_eq!(graph.terms().next().map(|t| t.id.as_str()), Some("HP:0000001"));
        let term = graph.term("HP:0001263").expect("known term");
        assert_eq!(term.parents, vec!["HP:0000707", "HP:0012758"]);
        assert_eq!(term.information_content, toy.information_content("HP:0001263")?);
        assert_eq!(graph.ancestors_of("HP:0001263")?, toy.ancestors_of("HP:0001263")?);

        Ok(())
    }

    #[test]
    fn reject_cycle() {
        let defs = vec![
            TermDef::new("HP:0000001", &[]),
            TermDef::new("HP:0000002", &["HP:0000001", "HP:0000003"]),
            TermDef::new("HP:0000003", &["HP:0000002"]),
        ];
        let err = OntologyGraph::from_terms(defs, &TermFrequencies::default())
            .expect_err("must fail");
        assert!(matches!(err, VocabularyLoadError::Cycle(_)), "{err:?}");
    }

    #[test]
    fn reject_self_loop() {
        let defs = vec![TermDef::new("HP:0000001", &["HP:0000001"])];
        let err = OntologyGraph::from_terms(defs, &TermFrequencies::default())
            .expect_err("must fail");
        assert!(matches!(err, VocabularyLoadError::Cycle(_)), "{err:?}");
    }

    #[test]
    fn reject_unknown_parent() {
        let defs = vec![TermDef::new("HP:0000002", &["HP:0000001"])];
        let err = OntologyGraph::from_terms(defs, &TermFrequencies::default())
            .expect_err("must fail");
        assert!(
            matches!(
                &err,
                VocabularyLoadError::UnknownParent { term, parent }
                    if term == "HP:0000002" && parent == "HP:0000001"
            ),
            "{err:?}"
        );
    }

    #[test]
    fn reject_duplicate() {
        let defs = vec![TermDef::new("HP:0000001", &[]), TermDef::new("HP:0000001", &[])];
        let err = OntologyGraph::from_terms(defs, &TermFrequencies::default())
            .expect_err("must fail");
        assert!(matches!(err, VocabularyLoadError::DuplicateTerm(_)), "{err:?}");
    }

    #[test]
    fn from_path_obo() -> Result<(), anyhow::Error> {
        let freqs = TermFrequencies::from_path(Path::new("tests/pheno/term_freqs.tsv"))?;
        let graph = OntologyGraph::from_path(Path::new("tests/pheno/hp.obo"), &freqs)?;

        assert_eq!(graph.version(), Some("hp/releases/2024-01-16"));
        // the obsolete term is skipped
        assert!(graph.term("HP:0000999").is_none());
        // alternative ids resolve to the primary term
        assert_eq!(
            graph.term("HP:0001999").map(|t| t.id.as_str()),
            Some("HP:0001263")
        );
        assert_eq!(
            graph.term("HP:0001263").map(|t| t.name.as_str()),
            Some("Global developmental delay")
        );
        assert_eq!(graph.information_content("HP:0000001")?, 0.0);

        Ok(())
    }

    #[test]
    fn from_path_missing_file() {
        let err = OntologyGraph::from_path(
            Path::new("tests/pheno/missing.obo"),
            &TermFrequencies::default(),
        )
        .expect_err("must fail");
        assert!(matches!(err, VocabularyLoadError::Io { .. }), "{err:?}");
    }
}
