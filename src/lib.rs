// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # sem-rewrite
//!
//! A semantic rewriting engine: annotated sentences become conjunctions of
//! ground literals, and ordered pattern-matching rules rewrite
//! dependency-level facts into ontology-level predicates until nothing
//! changes.
//!
//! ## Architecture
//!
//! - **Clauses** (`literal`, `cnf`, `binding`): `pred(arg1,arg2)` facts, the
//!   duplicate-free clause set, and variable bindings
//! - **Rules** (`rules`): recursive-descent parser for the rule language,
//!   immutable `RuleSet`
//! - **Matching** (`matcher`, `procedures`): backtracking unification over an
//!   explicit choice-point stack, guards evaluated against an `Ontology`
//! - **Rewriting** (`interpreter`): priority-ordered application to a fixpoint
//!   with an iteration bound
//! - **Input** (`document`, `adapter`, `substitution`, `augment`): annotated
//!   documents, initial clause sets, segment and coreference substitution,
//!   numeric/date clauses
//! - **Orchestration** (`pipeline`, `render`, `config`): per-document runs,
//!   sequential or on rayon, and output rendering
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sem_rewrite::cnf::Cnf;
//! use sem_rewrite::interpreter::Interpreter;
//! use sem_rewrite::rules::RuleSet;
//!
//! let rules = RuleSet::parse(
//!     "roles",
//!     "nsubj(?V,?A), dobj(?V,?B) ==> agent(?V,?A), patient(?V,?B).",
//! )
//! .unwrap();
//! let interpreter = Interpreter::without_ontology(Arc::new(rules));
//! let input: Cnf = "nsubj(killed-3,John-1), dobj(killed-3,Mary-2)".parse().unwrap();
//! let outcome = interpreter.rewrite(&input);
//! for clause in outcome.rendered() {
//!     println!("{clause}");
//! }
//! ```

pub mod adapter;
pub mod augment;
pub mod binding;
pub mod cnf;
pub mod config;
pub mod document;
pub mod error;
pub mod interpreter;
pub mod literal;
pub mod matcher;
pub mod ontology;
pub mod pipeline;
pub mod procedures;
pub mod render;
pub mod rules;
pub mod substitution;
pub mod token;
