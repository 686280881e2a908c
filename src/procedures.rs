//! Procedural guards: built-in predicates evaluated instead of matched.
//!
//! A guard literal is ground by the time it is evaluated (the parser rejects
//! guards with variables that no positive literal binds). Ontology-backed
//! procedures receive the word of each argument: a token's text or a
//! constant's value.

use crate::literal::{Literal, Term};
use crate::ontology::{Ontology, OntologyResult};

/// Names of all procedures. A left-hand literal with one of these
/// predicates is a guard, with or without braces.
pub const PROCEDURES: &[&str] = &[
    "isCELTclass",
    "isSubclass",
    "isInstanceOf",
    "isChildOf",
    "isSubAttribute",
    "different",
    "termExists",
    "documentationContains",
];

pub fn is_procedure(name: &str) -> bool {
    PROCEDURES.contains(&name)
}

/// Ontology classes behind the coarse `isCELTclass` categories.
fn celt_classes(category: &str) -> Option<&'static [&'static str]> {
    match category {
        "Person" => Some(&["Human", "SocialRole"]),
        "Time" => Some(&["TimeMeasure", "Process"]),
        _ => None,
    }
}

/// Argument as the ontology sees it.
fn word(term: &Term) -> String {
    match term {
        Term::Constant(value) => value.trim_matches('"').to_string(),
        other => other.word().unwrap_or_default().to_string(),
    }
}

/// Evaluates guard literals against an ontology.
pub struct Procedures<'a> {
    ontology: &'a dyn Ontology,
}

impl<'a> Procedures<'a> {
    pub fn new(ontology: &'a dyn Ontology) -> Self {
        Self { ontology }
    }

    /// Evaluate a ground guard literal.
    ///
    /// `Ok(false)` is an ordinary failed guard; `Err` means the ontology
    /// could not answer, which callers also treat as failure.
    pub fn evaluate(&self, guard: &Literal) -> OntologyResult<bool> {
        let (a, b) = (word(&guard.arg1), word(&guard.arg2));
        let ont = self.ontology;
        match guard.predicate.as_str() {
            "different" => Ok(guard.arg1 != guard.arg2),
            "isSubclass" => Ok(a == b || ont.is_subclass(&a, &b)?),
            "isInstanceOf" => ont.is_instance_of(&a, &b),
            "isChildOf" => ont.is_subclass_or_instance(&a, &b),
            "isSubAttribute" => Ok(a == b || ont.is_sub_attribute(&a, &b)?),
            "isCELTclass" => match celt_classes(&b) {
                Some(classes) => {
                    for class in classes {
                        if ont.is_subclass_or_instance(&a, class)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                None => ont.is_subclass_or_instance(&a, &b),
            },
            "termExists" => ont.term_exists(&a),
            "documentationContains" => Ok(ont
                .documentation(&a)?
                .is_some_and(|doc| doc.to_lowercase().contains(&b.to_lowercase()))),
            other => {
                tracing::warn!(procedure = other, "not a procedure; guard fails");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::{OntologyError, Taxonomy};

    fn lit(s: &str) -> Literal {
        s.parse().unwrap()
    }

    fn taxonomy() -> Taxonomy {
        Taxonomy::new()
            .subclass("Man", "Human")
            .subclass("Policeman", "SocialRole")
            .subclass("Day", "TimeMeasure")
            .subclass("Walking", "Process")
            .instance("Paris", "City")
            .subclass("City", "GeographicArea")
            .sub_attribute("Male", "SexAttribute")
            .document("City", "A large and permanent human settlement.")
    }

    #[test]
    fn celt_categories() {
        let tax = taxonomy();
        let p = Procedures::new(&tax);
        assert!(p.evaluate(&lit("isCELTclass(Man,Person)")).unwrap());
        assert!(p.evaluate(&lit("isCELTclass(Policeman,Person)")).unwrap());
        assert!(p.evaluate(&lit("isCELTclass(Day,Time)")).unwrap());
        assert!(p.evaluate(&lit("isCELTclass(Walking,Time)")).unwrap());
        assert!(!p.evaluate(&lit("isCELTclass(Day,Person)")).unwrap());
        assert!(p.evaluate(&lit("isCELTclass(Paris,GeographicArea)")).unwrap());
    }

    #[test]
    fn taxonomy_procedures() {
        let tax = taxonomy();
        let p = Procedures::new(&tax);
        assert!(p.evaluate(&lit("isSubclass(Man,Human)")).unwrap());
        assert!(p.evaluate(&lit("isSubclass(Unknown,Unknown)")).unwrap());
        assert!(p.evaluate(&lit("isInstanceOf(Paris,GeographicArea)")).unwrap());
        assert!(p.evaluate(&lit("isChildOf(Paris,City)")).unwrap());
        assert!(p.evaluate(&lit("isSubAttribute(Male,SexAttribute)")).unwrap());
        assert!(p.evaluate(&lit("termExists(Paris,Paris)")).unwrap());
        assert!(!p.evaluate(&lit("termExists(Atlantis,Atlantis)")).unwrap());
    }

    #[test]
    fn token_arguments_use_their_text() {
        let tax = taxonomy();
        let p = Procedures::new(&tax);
        assert!(p.evaluate(&lit("isInstanceOf(Paris-4,City)")).unwrap());
    }

    #[test]
    fn string_procedures() {
        let tax = taxonomy();
        let p = Procedures::new(&tax);
        assert!(p.evaluate(&lit("different(John-1,Mary-2)")).unwrap());
        assert!(!p.evaluate(&lit("different(John-1,John-1)")).unwrap());
        assert!(p.evaluate(&lit("documentationContains(City,\"Settlement\")")).unwrap());
        assert!(!p.evaluate(&lit("documentationContains(Man,settlement)")).unwrap());
    }

    struct Broken;

    impl Ontology for Broken {
        fn term_exists(&self, _: &str) -> OntologyResult<bool> {
            Err(OntologyError::Unavailable { message: "down".into() })
        }
        fn is_subclass_or_instance(&self, _: &str, _: &str) -> OntologyResult<bool> {
            Err(OntologyError::Unavailable { message: "down".into() })
        }
        fn documentation(&self, _: &str) -> OntologyResult<Option<String>> {
            Err(OntologyError::Unavailable { message: "down".into() })
        }
    }

    #[test]
    fn ontology_failures_propagate() {
        let p = Procedures::new(&Broken);
        assert!(p.evaluate(&lit("isSubclass(Man,Human)")).is_err());
        // String procedures never touch the ontology.
        assert!(p.evaluate(&lit("different(a,b)")).unwrap());
    }
}
