//! Benchmarks for matching and the fixpoint loop.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sem_rewrite::cnf::Cnf;
use sem_rewrite::interpreter::Interpreter;
use sem_rewrite::matcher::Matcher;
use sem_rewrite::ontology::NullOntology;
use sem_rewrite::rules::{Rule, RuleSet};

const RULES: &str = "
@consume
det(?X,?D) ==> !.
@preserve
nsubj(?V,?A), dobj(?V,?B) ==> agent(?V,?A), patient(?V,?B).
nsubj(?V,?A), -dobj(?V,?B) ==> experiencer(?V,?A).
amod(?X,?Y) ==> attribute(?X,?Y).
(prep_in(?X,?Y) | prep_at(?X,?Y)) ==> location(?X,?Y).
";

/// A clause set of `n` simple clauses, shaped like a parsed sentence.
fn sentence(n: u32) -> Cnf {
    let mut clauses = Vec::new();
    for i in 0..n {
        let base = i * 5 + 1;
        clauses.push(format!("det(dog-{},the-{base})", base + 1));
        clauses.push(format!("amod(dog-{},big-{})", base + 1, base + 2));
        clauses.push(format!("nsubj(chased-{},dog-{})", base + 3, base + 1));
        clauses.push(format!("dobj(chased-{},cat-{})", base + 3, base + 4));
        clauses.push(format!("prep_in(chased-{},yard-{})", base + 3, base + 5));
    }
    clauses.join(", ").parse().unwrap()
}

fn bench_match(c: &mut Criterion) {
    let cnf = sentence(20);
    let rule = Rule::parse("nsubj(?V,?A), dobj(?V,?B), amod(?A,?M) ==> agent(?V,?A).").unwrap();

    c.bench_function("match_all_100_clauses", |bench| {
        bench.iter(|| black_box(Matcher::new(&rule, &cnf, &NullOntology).count()))
    });
}

fn bench_fixpoint(c: &mut Criterion) {
    let rules = Arc::new(RuleSet::parse("bench", RULES).unwrap());
    let interpreter = Interpreter::without_ontology(rules);
    let small = sentence(2);
    let large = sentence(20);

    c.bench_function("fixpoint_10_clauses", |bench| {
        bench.iter(|| black_box(interpreter.rewrite(&small)))
    });
    c.bench_function("fixpoint_100_clauses", |bench| {
        bench.iter(|| black_box(interpreter.rewrite(&large)))
    });
}

criterion_group!(benches, bench_match, bench_fixpoint);
criterion_main!(benches);
