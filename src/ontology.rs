//! The ontology collaborator consulted by guards.
//!
//! The engine never owns or reasons over an ontology; it asks three
//! read-only questions through [`Ontology`]. [`Taxonomy`] is a small
//! in-memory implementation (petgraph, loaded from TOML) for tests and the
//! CLI, and [`TimedOntology`] bounds the latency of any implementation.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures of the ontology collaborator.
#[derive(Debug, Error, Diagnostic)]
pub enum OntologyError {
    #[error("ontology unavailable: {message}")]
    #[diagnostic(
        code(sem::ontology::unavailable),
        help("The ontology service could not answer. Guards depending on it fail for this binding.")
    )]
    Unavailable { message: String },

    #[error("ontology query {query} timed out after {millis} ms")]
    #[diagnostic(
        code(sem::ontology::timeout),
        help("Raise guard_timeout_ms in the config, or check the ontology service latency.")
    )]
    Timeout { query: String, millis: u64 },

    #[error("failed to read taxonomy: {path}")]
    #[diagnostic(
        code(sem::ontology::read),
        help("Ensure the taxonomy file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse taxonomy {path}: {message}")]
    #[diagnostic(
        code(sem::ontology::parse),
        help(
            "A taxonomy is TOML with one [terms.<Name>] table per term and optional \
             subclass_of, instance_of, sub_attribute_of and documentation keys."
        )
    )]
    Parse { path: String, message: String },
}

pub type OntologyResult<T> = std::result::Result<T, OntologyError>;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read-only, synchronous queries against an ontology.
pub trait Ontology: Send + Sync {
    /// Whether `term` is defined.
    fn term_exists(&self, term: &str) -> OntologyResult<bool>;

    /// Whether `term` equals `ancestor` or reaches it through subclass or
    /// instance links.
    fn is_subclass_or_instance(&self, term: &str, ancestor: &str) -> OntologyResult<bool>;

    /// Documentation string of `term`, if any.
    fn documentation(&self, term: &str) -> OntologyResult<Option<String>>;

    fn is_subclass(&self, child: &str, parent: &str) -> OntologyResult<bool> {
        self.is_subclass_or_instance(child, parent)
    }

    fn is_instance_of(&self, instance: &str, class: &str) -> OntologyResult<bool> {
        self.is_subclass_or_instance(instance, class)
    }

    fn is_sub_attribute(&self, attribute: &str, parent: &str) -> OntologyResult<bool> {
        self.is_subclass_or_instance(attribute, parent)
    }

    /// Whether `term` names an instance rather than a class.
    fn is_instance(&self, _term: &str) -> OntologyResult<bool> {
        Ok(false)
    }
}

impl<T: Ontology + ?Sized> Ontology for Arc<T> {
    fn term_exists(&self, term: &str) -> OntologyResult<bool> {
        (**self).term_exists(term)
    }
    fn is_subclass_or_instance(&self, term: &str, ancestor: &str) -> OntologyResult<bool> {
        (**self).is_subclass_or_instance(term, ancestor)
    }
    fn documentation(&self, term: &str) -> OntologyResult<Option<String>> {
        (**self).documentation(term)
    }
    fn is_subclass(&self, child: &str, parent: &str) -> OntologyResult<bool> {
        (**self).is_subclass(child, parent)
    }
    fn is_instance_of(&self, instance: &str, class: &str) -> OntologyResult<bool> {
        (**self).is_instance_of(instance, class)
    }
    fn is_sub_attribute(&self, attribute: &str, parent: &str) -> OntologyResult<bool> {
        (**self).is_sub_attribute(attribute, parent)
    }
    fn is_instance(&self, term: &str) -> OntologyResult<bool> {
        (**self).is_instance(term)
    }
}

/// An ontology that knows nothing: every query answers false.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOntology;

impl Ontology for NullOntology {
    fn term_exists(&self, _term: &str) -> OntologyResult<bool> {
        Ok(false)
    }

    fn is_subclass_or_instance(&self, _term: &str, _ancestor: &str) -> OntologyResult<bool> {
        Ok(false)
    }

    fn documentation(&self, _term: &str) -> OntologyResult<Option<String>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// Kind of a taxonomy edge, pointing from the narrower to the broader term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    Subclass,
    Instance,
    SubAttribute,
}

/// TOML form of one taxonomy entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermEntry {
    #[serde(default)]
    pub subclass_of: Vec<String>,
    #[serde(default)]
    pub instance_of: Vec<String>,
    #[serde(default)]
    pub sub_attribute_of: Vec<String>,
    #[serde(default)]
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    terms: BTreeMap<String, TermEntry>,
}

/// In-memory taxonomy backed by a directed graph.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    graph: DiGraph<String, Link>,
    nodes: HashMap<String, NodeIndex>,
    docs: HashMap<String, String>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, term: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(term) {
            return idx;
        }
        let idx = self.graph.add_node(term.to_string());
        self.nodes.insert(term.to_string(), idx);
        idx
    }

    /// Declare `term` without links.
    pub fn term(mut self, term: &str) -> Self {
        self.node(term);
        self
    }

    pub fn subclass(mut self, child: &str, parent: &str) -> Self {
        self.link(child, parent, Link::Subclass);
        self
    }

    pub fn instance(mut self, instance: &str, class: &str) -> Self {
        self.link(instance, class, Link::Instance);
        self
    }

    pub fn sub_attribute(mut self, attribute: &str, parent: &str) -> Self {
        self.link(attribute, parent, Link::SubAttribute);
        self
    }

    pub fn document(mut self, term: &str, text: &str) -> Self {
        self.node(term);
        self.docs.insert(term.to_string(), text.to_string());
        self
    }

    fn link(&mut self, from: &str, to: &str, link: Link) {
        let a = self.node(from);
        let b = self.node(to);
        self.graph.update_edge(a, b, link);
    }

    /// Parse a taxonomy from TOML text.
    pub fn from_toml_str(text: &str, origin: &str) -> OntologyResult<Self> {
        let file: TaxonomyFile = toml::from_str(text).map_err(|e| OntologyError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        let mut tax = Taxonomy::new();
        for (term, entry) in &file.terms {
            tax.node(term);
            for parent in &entry.subclass_of {
                tax.link(term, parent, Link::Subclass);
            }
            for class in &entry.instance_of {
                tax.link(term, class, Link::Instance);
            }
            for parent in &entry.sub_attribute_of {
                tax.link(term, parent, Link::SubAttribute);
            }
            if let Some(doc) = &entry.documentation {
                tax.docs.insert(term.clone(), doc.clone());
            }
        }
        tracing::info!(origin, terms = tax.nodes.len(), "loaded taxonomy");
        Ok(tax)
    }

    /// Load a taxonomy TOML file.
    pub fn from_file(path: &Path) -> OntologyResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| OntologyError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Breadth-first reachability following only the allowed links.
    ///
    /// `first` restricts the links usable on the first step.
    fn reaches(&self, from: &str, to: &str, first: &[Link], rest: &[Link]) -> bool {
        let (Some(&start), Some(&goal)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return false;
        };
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, true)]);
        while let Some((node, is_first)) = queue.pop_front() {
            let allowed = if is_first { first } else { rest };
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                if !allowed.contains(edge.weight()) {
                    continue;
                }
                let next = edge.target();
                if next == goal {
                    return true;
                }
                if seen.insert(next) {
                    queue.push_back((next, false));
                }
            }
        }
        false
    }
}

impl Ontology for Taxonomy {
    fn term_exists(&self, term: &str) -> OntologyResult<bool> {
        Ok(self.nodes.contains_key(term))
    }

    fn is_subclass_or_instance(&self, term: &str, ancestor: &str) -> OntologyResult<bool> {
        let links = [Link::Subclass, Link::Instance];
        Ok((term == ancestor && self.nodes.contains_key(term))
            || self.reaches(term, ancestor, &links, &links))
    }

    fn documentation(&self, term: &str) -> OntologyResult<Option<String>> {
        Ok(self.docs.get(term).cloned())
    }

    fn is_subclass(&self, child: &str, parent: &str) -> OntologyResult<bool> {
        let links = [Link::Subclass];
        Ok((child == parent && self.nodes.contains_key(child))
            || self.reaches(child, parent, &links, &links))
    }

    fn is_instance_of(&self, instance: &str, class: &str) -> OntologyResult<bool> {
        Ok(self.reaches(instance, class, &[Link::Instance], &[Link::Subclass]))
    }

    fn is_sub_attribute(&self, attribute: &str, parent: &str) -> OntologyResult<bool> {
        let links = [Link::SubAttribute];
        Ok((attribute == parent && self.nodes.contains_key(attribute))
            || self.reaches(attribute, parent, &links, &links))
    }

    fn is_instance(&self, term: &str) -> OntologyResult<bool> {
        Ok(self.nodes.get(term).is_some_and(|&idx| {
            self.graph
                .edges_directed(idx, Direction::Outgoing)
                .any(|e| *e.weight() == Link::Instance)
        }))
    }
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Wraps an ontology so that every query answers within `timeout`.
///
/// Each query runs on a helper thread; when the deadline passes the caller
/// gets [`OntologyError::Timeout`] and the helper's late answer is discarded.
#[derive(Clone)]
pub struct TimedOntology {
    inner: Arc<dyn Ontology>,
    timeout: Duration,
}

impl std::fmt::Debug for TimedOntology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedOntology")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TimedOntology {
    pub fn new(inner: Arc<dyn Ontology>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn call<T, F>(&self, query: &str, f: F) -> OntologyResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Ontology) -> OntologyResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("ontology-query".into())
            .spawn(move || {
                // The receiver may have given up already.
                let _ = tx.send(f(inner.as_ref()));
            })
            .map_err(|e| OntologyError::Unavailable {
                message: format!("cannot spawn query thread: {e}"),
            })?;
        match rx.recv_timeout(self.timeout) {
            Ok(answer) => answer,
            Err(RecvTimeoutError::Timeout) => Err(OntologyError::Timeout {
                query: query.to_string(),
                millis: self.timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(OntologyError::Unavailable {
                message: format!("{query} aborted"),
            }),
        }
    }
}

impl Ontology for TimedOntology {
    fn term_exists(&self, term: &str) -> OntologyResult<bool> {
        let term = term.to_string();
        self.call("term_exists", move |o| o.term_exists(&term))
    }

    fn is_subclass_or_instance(&self, term: &str, ancestor: &str) -> OntologyResult<bool> {
        let (term, ancestor) = (term.to_string(), ancestor.to_string());
        self.call("is_subclass_or_instance", move |o| {
            o.is_subclass_or_instance(&term, &ancestor)
        })
    }

    fn documentation(&self, term: &str) -> OntologyResult<Option<String>> {
        let term = term.to_string();
        self.call("documentation", move |o| o.documentation(&term))
    }

    fn is_subclass(&self, child: &str, parent: &str) -> OntologyResult<bool> {
        let (child, parent) = (child.to_string(), parent.to_string());
        self.call("is_subclass", move |o| o.is_subclass(&child, &parent))
    }

    fn is_instance_of(&self, instance: &str, class: &str) -> OntologyResult<bool> {
        let (instance, class) = (instance.to_string(), class.to_string());
        self.call("is_instance_of", move |o| o.is_instance_of(&instance, &class))
    }

    fn is_sub_attribute(&self, attribute: &str, parent: &str) -> OntologyResult<bool> {
        let (attribute, parent) = (attribute.to_string(), parent.to_string());
        self.call("is_sub_attribute", move |o| {
            o.is_sub_attribute(&attribute, &parent)
        })
    }

    fn is_instance(&self, term: &str) -> OntologyResult<bool> {
        let term = term.to_string();
        self.call("is_instance", move |o| o.is_instance(&term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> Taxonomy {
        Taxonomy::new()
            .subclass("Man", "Human")
            .subclass("Human", "Hominid")
            .subclass("Hominid", "Animal")
            .instance("JohnSmith", "Man")
            .sub_attribute("Male", "SexAttribute")
            .document("Human", "Modern man, the only remaining species of the Homo genus.")
    }

    #[test]
    fn subclass_is_transitive_and_reflexive() {
        let tax = taxonomy();
        assert!(tax.is_subclass("Man", "Animal").unwrap());
        assert!(tax.is_subclass("Human", "Human").unwrap());
        assert!(!tax.is_subclass("Animal", "Man").unwrap());
        assert!(!tax.is_subclass("Unknown", "Unknown").unwrap());
    }

    #[test]
    fn instance_queries() {
        let tax = taxonomy();
        assert!(tax.is_instance_of("JohnSmith", "Hominid").unwrap());
        assert!(!tax.is_instance_of("Man", "Hominid").unwrap());
        assert!(tax.is_subclass_or_instance("JohnSmith", "Animal").unwrap());
        assert!(tax.is_instance("JohnSmith").unwrap());
        assert!(!tax.is_instance("Man").unwrap());
    }

    #[test]
    fn attributes_and_documentation() {
        let tax = taxonomy();
        assert!(tax.is_sub_attribute("Male", "SexAttribute").unwrap());
        assert!(!tax.is_subclass("Male", "SexAttribute").unwrap());
        assert!(tax.documentation("Human").unwrap().unwrap().contains("Homo"));
        assert!(tax.documentation("Man").unwrap().is_none());
        assert!(tax.term_exists("Hominid").unwrap());
    }

    #[test]
    fn loads_from_toml() {
        let tax = Taxonomy::from_toml_str(
            r#"
            [terms.Human]
            subclass_of = ["Hominid"]
            documentation = "Modern man"

            [terms.Mary]
            instance_of = ["Human"]
            "#,
            "inline",
        )
        .unwrap();
        assert_eq!(tax.len(), 3);
        assert!(tax.is_instance_of("Mary", "Hominid").unwrap());
        assert!(matches!(
            Taxonomy::from_toml_str("terms = 3", "bad"),
            Err(OntologyError::Parse { .. })
        ));
    }

    struct Slow;

    impl Ontology for Slow {
        fn term_exists(&self, _term: &str) -> OntologyResult<bool> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(true)
        }
        fn is_subclass_or_instance(&self, _t: &str, _a: &str) -> OntologyResult<bool> {
            Ok(true)
        }
        fn documentation(&self, _term: &str) -> OntologyResult<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn timed_ontology_times_out() {
        let timed = TimedOntology::new(Arc::new(Slow), Duration::from_millis(20));
        assert!(matches!(
            timed.term_exists("x"),
            Err(OntologyError::Timeout { .. })
        ));
        assert!(timed.is_subclass("a", "b").unwrap());
    }

    #[test]
    fn null_ontology_knows_nothing() {
        assert!(!NullOntology.term_exists("Human").unwrap());
        assert!(!NullOntology.is_subclass("Man", "Human").unwrap());
    }
}
