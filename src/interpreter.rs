//! The rewrite driver: runs a rule set over one clause set to a fixpoint.
//!
//! Rules are tried in priority order. The first rule with a binding whose
//! application would change the clause set is applied, and the pass restarts
//! from the top of the rule list. The run ends at a fixpoint (a full pass
//! changes nothing), when a `stop` rule fires, or when the iteration bound is
//! reached, which is reported as [`RewriteWarning::NonConvergence`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::cnf::Cnf;
use crate::error::RewriteWarning;
use crate::literal::Literal;
use crate::matcher::{Match, Matcher};
use crate::ontology::{NullOntology, Ontology};
use crate::rules::{Action, Rule, RuleSet};

/// Configuration for the rewrite driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Maximum number of rule applications per sentence (default: 1000).
    pub max_iterations: usize,
    /// Skip rules whose mandatory predicates or constants are absent from
    /// the clause set (default: true).
    pub term_coverage: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            term_coverage: true,
        }
    }
}

/// One rule application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredRule {
    pub rule: String,
    pub binding: Binding,
    pub asserted: Vec<Literal>,
    pub retracted: Vec<Literal>,
}

impl fmt::Display for FiredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.rule, self.binding)
    }
}

/// Result of rewriting one clause set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteOutcome {
    /// The final clause set.
    pub cnf: Cnf,
    /// Formulas emitted by `{...}` right-hand sides, in emission order.
    pub formulas: Vec<String>,
    /// Every application, in order.
    pub fired: Vec<FiredRule>,
    /// Number of applications performed.
    pub iterations: usize,
    /// False when the iteration bound cut the rewrite short.
    pub converged: bool,
    /// Whether a `stop` rule ended the rewrite.
    pub stopped: bool,
    /// Applications per rule name.
    pub rule_stats: BTreeMap<String, usize>,
    pub warnings: Vec<RewriteWarning>,
}

impl RewriteOutcome {
    /// The final clause set in canonical string form.
    pub fn rendered(&self) -> Vec<String> {
        self.cnf.render()
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// What applying a rule under one match would do.
#[derive(Debug, Default)]
struct Effect {
    asserts: Vec<Literal>,
    retracts: Vec<Literal>,
    formulas: Vec<String>,
    stop: bool,
}

impl Effect {
    fn plan(rule: &Rule, m: &Match, cnf: &Cnf, emitted: &[String]) -> Self {
        let mut effect = Effect::default();
        for &pos in &m.consumed {
            if let Some(lit) = cnf.get(pos) {
                effect.retracts.push(lit.clone());
            }
        }
        for action in &rule.rhs {
            match action {
                Action::Assert(lit) => effect.asserts.push(lit.substitute(&m.binding)),
                Action::Retract(lit) => {
                    let lit = lit.substitute(&m.binding);
                    if cnf.contains(&lit) {
                        effect.retracts.push(lit);
                    }
                }
                Action::Formula(text) => {
                    let formula = instantiate_formula(text, &m.binding);
                    if !emitted.contains(&formula) && !effect.formulas.contains(&formula) {
                        effect.formulas.push(formula);
                    }
                }
                Action::BindOnly => {}
                Action::Stop => effect.stop = true,
            }
        }
        // Retracting and re-asserting the same literal is a no-op.
        let Effect {
            asserts, retracts, ..
        } = &mut effect;
        retracts.retain(|r| !asserts.contains(r));
        retracts.dedup();
        asserts.retain(|a| !cnf.contains(a));
        asserts.dedup();
        effect
    }

    fn changes_anything(&self) -> bool {
        self.stop || !self.asserts.is_empty() || !self.retracts.is_empty() || !self.formulas.is_empty()
    }
}

static FORMULA_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?([A-Za-z0-9_]+)").unwrap());

/// Substitute bound variables into a formula's text.
fn instantiate_formula(text: &str, binding: &Binding) -> String {
    FORMULA_VAR
        .replace_all(text, |caps: &regex::Captures<'_>| match binding.get(&caps[1]) {
            Some(term) => term.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

/// Applies a shared, immutable rule set to clause sets.
///
/// Cloning is cheap; give each worker thread its own clone.
#[derive(Clone)]
pub struct Interpreter {
    rules: Arc<RuleSet>,
    ontology: Arc<dyn Ontology>,
    config: InterpreterConfig,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("rules", &self.rules.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    pub fn new(rules: Arc<RuleSet>, ontology: Arc<dyn Ontology>, config: InterpreterConfig) -> Self {
        Self {
            rules,
            ontology,
            config,
        }
    }

    /// An interpreter whose guards see an empty ontology.
    pub fn without_ontology(rules: Arc<RuleSet>) -> Self {
        Self::new(rules, Arc::new(NullOntology), InterpreterConfig::default())
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Rewrite a clause set that does not belong to a numbered sentence.
    pub fn rewrite(&self, input: &Cnf) -> RewriteOutcome {
        self.rewrite_sentence(0, input)
    }

    /// Rewrite the clause set of sentence `sentence` to a fixpoint.
    pub fn rewrite_sentence(&self, sentence: usize, input: &Cnf) -> RewriteOutcome {
        let mut cnf = input.clone();
        cnf.merge(self.rules.facts());

        let mut formulas: Vec<String> = Vec::new();
        let mut fired: Vec<FiredRule> = Vec::new();
        let mut rule_stats: BTreeMap<String, usize> = BTreeMap::new();
        let mut warnings: Vec<RewriteWarning> = Vec::new();
        let mut iterations = 0;
        let mut converged = false;
        let mut stopped = false;

        'fixpoint: loop {
            let mut applied = false;
            for rule in self.rules.rules() {
                if self.config.term_coverage && !covers(rule, &cnf) {
                    continue;
                }
                let Some((m, effect)) =
                    self.first_effective_match(sentence, rule, &cnf, &formulas, &mut warnings)
                else {
                    continue;
                };

                if iterations >= self.config.max_iterations {
                    tracing::warn!(
                        sentence,
                        iterations,
                        rule = %rule.name,
                        "rewrite did not converge; returning clause set as computed"
                    );
                    warnings.push(RewriteWarning::NonConvergence {
                        sentence,
                        iterations,
                    });
                    break 'fixpoint;
                }

                for lit in &effect.retracts {
                    cnf.remove(lit);
                }
                for lit in &effect.asserts {
                    cnf.append(lit.clone());
                }
                formulas.extend(effect.formulas.iter().cloned());
                iterations += 1;
                *rule_stats.entry(rule.name.clone()).or_insert(0) += 1;
                tracing::debug!(
                    sentence,
                    rule = %rule.name,
                    binding = %m.binding,
                    asserted = effect.asserts.len(),
                    retracted = effect.retracts.len(),
                    "rule fired"
                );
                fired.push(FiredRule {
                    rule: rule.name.clone(),
                    binding: m.binding,
                    asserted: effect.asserts,
                    retracted: effect.retracts,
                });

                if effect.stop {
                    stopped = true;
                    converged = true;
                    break 'fixpoint;
                }
                applied = true;
                break;
            }
            if !applied {
                converged = true;
                break;
            }
        }

        tracing::debug!(sentence, iterations, converged, clauses = cnf.len(), "rewrite finished");
        RewriteOutcome {
            cnf,
            formulas,
            fired,
            iterations,
            converged,
            stopped,
            rule_stats,
            warnings,
        }
    }

    /// First binding of `rule` whose application would change something.
    fn first_effective_match(
        &self,
        sentence: usize,
        rule: &Rule,
        cnf: &Cnf,
        formulas: &[String],
        warnings: &mut Vec<RewriteWarning>,
    ) -> Option<(Match, Effect)> {
        let mut matcher = Matcher::new(rule, cnf, self.ontology.as_ref());
        let mut found = None;
        for m in matcher.by_ref() {
            let effect = Effect::plan(rule, &m, cnf, formulas);
            if effect.changes_anything() {
                found = Some((m, effect));
                break;
            }
            tracing::trace!(rule = %rule.name, binding = %m.binding, "match changes nothing");
        }
        // Rules are re-matched on every pass; record each failure once.
        for g in matcher.take_guard_failures() {
            let warning = RewriteWarning::GuardFailure {
                sentence,
                rule: g.rule,
                guard: g.guard,
                binding: g.binding.to_string(),
                message: g.message,
            };
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }
        found
    }
}

/// Cheap pre-check: every mandatory predicate and constant is present.
fn covers(rule: &Rule, cnf: &Cnf) -> bool {
    rule.required_predicates().all(|p| cnf.has_predicate(p))
        && rule.required_terms().all(|t| cnf.has_term(t))
}
