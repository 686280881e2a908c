//! Terms and literals: the `predicate(arg1,arg2)` facts the engine rewrites.
//!
//! The canonical string form is `pred(arg1,arg2)` with no spaces; token
//! arguments render as `text-index`, variables as `?name`, constants verbatim.
//! [`Literal::from_str`](std::str::FromStr) reads that form back, so rendered
//! output is round-trippable given the same token indexing.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use miette::Diagnostic;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binding::Binding;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing literal strings.
#[derive(Debug, Error, Diagnostic)]
pub enum LiteralError {
    #[error("empty literal")]
    #[diagnostic(
        code(sem::literal::empty),
        help("A literal has the form pred(arg1,arg2), e.g. nsubj(killed-3,John-1).")
    )]
    Empty,

    #[error("malformed literal \"{input}\": {message}")]
    #[diagnostic(
        code(sem::literal::malformed),
        help(
            "A literal has the form pred(arg1,arg2). Token arguments are written \
             text-index, variables ?Name, anything else is a constant."
        )
    )]
    Malformed { input: String, message: String },

    #[error("literal \"{input}\" has {count} argument(s), expected 2")]
    #[diagnostic(
        code(sem::literal::arity),
        help("Every literal is binary. Quote arguments that contain commas: \"a, b\".")
    )]
    Arity { input: String, count: usize },
}

pub type LiteralResult<T> = std::result::Result<T, LiteralError>;

// ---------------------------------------------------------------------------
// Term
// ---------------------------------------------------------------------------

/// A literal argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    /// Reference to a sentence token, rendered `text-index`.
    Token { text: String, index: u32 },
    /// Pattern variable, stored without the leading `?`.
    Variable(String),
    /// Constant: ontology term, synthetic name (`measure1`), number, or string.
    Constant(String),
    /// Pattern-only word wildcard `word*`: any token whose text is `word`,
    /// compared case-insensitively and ignoring the index.
    Wildcard(String),
}

static TOKEN_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-(\d+)$").unwrap());

impl Term {
    pub fn token(text: impl Into<String>, index: u32) -> Self {
        Term::Token {
            text: text.into(),
            index,
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    pub fn constant(value: impl Into<String>) -> Self {
        Term::Constant(value.into())
    }

    pub fn wildcard(word: impl Into<String>) -> Self {
        Term::Wildcard(word.into())
    }

    /// Classify a raw argument string.
    ///
    /// `text-N` is a token reference, `?X` a variable, `word*` a wildcard,
    /// a quoted string or anything else a constant.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with('"') {
            return Term::Constant(raw.to_string());
        }
        // Punctuation tokens such as `?-4` are tokens, not variables.
        if let Some(caps) = TOKEN_FORM.captures(raw) {
            if let Ok(index) = caps[2].parse::<u32>() {
                return Term::token(&caps[1], index);
            }
        }
        if let Some(name) = raw.strip_prefix('?').filter(|n| !n.is_empty()) {
            return Term::Variable(name.to_string());
        }
        if let Some(word) = raw.strip_suffix('*').filter(|w| !w.is_empty()) {
            return Term::Wildcard(word.to_string());
        }
        Term::Constant(raw.to_string())
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Term::Variable(_) | Term::Wildcard(_))
    }

    pub fn token_index(&self) -> Option<u32> {
        match self {
            Term::Token { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The word a term carries: token text, constant value, or wildcard word.
    /// Variables carry none.
    pub fn word(&self) -> Option<&str> {
        match self {
            Term::Token { text, .. } => Some(text),
            Term::Constant(value) => Some(value),
            Term::Wildcard(word) => Some(word),
            Term::Variable(_) => None,
        }
    }

    /// Match this (pattern) term against a ground term, extending `binding`.
    fn unify(&self, ground: &Term, binding: &mut Binding) -> bool {
        match self {
            Term::Variable(name) => binding.bind(name, ground),
            Term::Wildcard(word) => match ground {
                Term::Token { text, .. } | Term::Constant(text) => text.eq_ignore_ascii_case(word),
                _ => false,
            },
            other => other == ground,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Token { text, index } => write!(f, "{text}-{index}"),
            Term::Variable(name) => write!(f, "?{name}"),
            Term::Constant(value) => write!(f, "{value}"),
            Term::Wildcard(word) => write!(f, "{word}*"),
        }
    }
}

// ---------------------------------------------------------------------------
// Literal
// ---------------------------------------------------------------------------

/// A binary fact `predicate(arg1, arg2)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub predicate: String,
    pub arg1: Term,
    pub arg2: Term,
}

impl Literal {
    pub fn new(predicate: impl Into<String>, arg1: Term, arg2: Term) -> Self {
        Self {
            predicate: predicate.into(),
            arg1,
            arg2,
        }
    }

    /// A literal is ground when it has no variables or wildcards.
    pub fn is_ground(&self) -> bool {
        !self.arg1.is_pattern() && !self.arg2.is_pattern()
    }

    pub fn args(&self) -> [&Term; 2] {
        [&self.arg1, &self.arg2]
    }

    /// Names of the variables in this literal, in argument order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.args().into_iter().filter_map(|t| match t {
            Term::Variable(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Lowest token index among the arguments, if any argument is a token.
    pub fn min_token_index(&self) -> Option<u32> {
        self.args().into_iter().filter_map(Term::token_index).min()
    }

    /// Replace bound variables with their terms.
    pub fn substitute(&self, binding: &Binding) -> Literal {
        Literal {
            predicate: self.predicate.clone(),
            arg1: binding.resolve(&self.arg1),
            arg2: binding.resolve(&self.arg2),
        }
    }

    /// Match this pattern against a ground literal under `binding`.
    ///
    /// Returns the extended binding, or `None` if the predicate differs, a
    /// constant disagrees, or a variable is already bound to another term.
    pub fn match_ground(&self, ground: &Literal, binding: &Binding) -> Option<Binding> {
        if self.predicate != ground.predicate {
            return None;
        }
        let mut extended = binding.clone();
        if self.arg1.unify(&ground.arg1, &mut extended)
            && self.arg2.unify(&ground.arg2, &mut extended)
        {
            Some(extended)
        } else {
            None
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.predicate, self.arg1, self.arg2)
    }
}

impl FromStr for Literal {
    type Err = LiteralError;

    fn from_str(s: &str) -> LiteralResult<Self> {
        let s = s.trim().trim_end_matches('.').trim();
        if s.is_empty() {
            return Err(LiteralError::Empty);
        }
        let malformed = |message: &str| LiteralError::Malformed {
            input: s.to_string(),
            message: message.to_string(),
        };
        let open = s.find('(').ok_or_else(|| malformed("missing '('"))?;
        if !s.ends_with(')') {
            return Err(malformed("missing closing ')'"));
        }
        let predicate = s[..open].trim();
        if predicate.is_empty() || predicate.contains(char::is_whitespace) {
            return Err(malformed("predicate must be a single word"));
        }
        let inner = &s[open + 1..s.len() - 1];
        let stripped;
        let mut args = split_args(inner);
        if args.len() > 2 {
            stripped = strip_thousands(inner);
            args = split_args(&stripped);
        }
        if args.len() != 2 {
            return Err(LiteralError::Arity {
                input: s.to_string(),
                count: args.len(),
            });
        }
        let mut terms = args.into_iter().map(|raw| {
            let raw = raw.trim();
            // Possessive clitics arrive as 's; the apostrophe is dropped.
            let raw = match raw.strip_prefix('\'') {
                Some(rest) if !rest.is_empty() => rest,
                _ => raw,
            };
            if raw.is_empty() {
                Err(malformed("empty argument"))
            } else {
                Ok(Term::parse(raw))
            }
        });
        let arg1 = terms.next().ok_or_else(|| malformed("missing argument"))??;
        let arg2 = terms.next().ok_or_else(|| malformed("missing argument"))??;
        Ok(Literal::new(predicate, arg1, arg2))
    }
}

static THOUSANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[(,_\s])(\d{1,3}(?:,\d{3})+)(\D|$)").unwrap());

/// Remove thousands separators from numbers such as `3,000,000`.
fn strip_thousands(s: &str) -> String {
    THOUSANDS
        .replace_all(s, |caps: &regex::Captures<'_>| {
            format!("{}{}{}", &caps[1], caps[2].replace(',', ""), &caps[3])
        })
        .into_owned()
}

static COMMA_TOKEN_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-\d+\s*(?:,|$)").unwrap());

/// Split literal arguments on top-level commas. A comma that starts an
/// argument and is followed by `-N` is the comma token `,-N`.
fn split_args(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            ',' if depth == 0 && !quoted => {
                let comma_token =
                    s[start..i].trim().is_empty() && COMMA_TOKEN_TAIL.is_match(&s[i + 1..]);
                if !comma_token {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
            }
            _ => {}
        }
    }
    if start < s.len() || !parts.is_empty() {
        parts.push(&s[start..]);
    }
    parts
}

/// Split on `sep` at parenthesis depth zero, outside double quotes.
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            c if c == sep && depth == 0 && !quoted => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if start < s.len() || !parts.is_empty() {
        parts.push(&s[start..]);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dependency_literal() {
        let lit: Literal = "nsubj(killed-3, John-1)".parse().unwrap();
        assert_eq!(lit.predicate, "nsubj");
        assert_eq!(lit.arg1, Term::token("killed", 3));
        assert_eq!(lit.arg2, Term::token("John", 1));
        assert!(lit.is_ground());
        assert_eq!(lit.to_string(), "nsubj(killed-3,John-1)");
    }

    #[test]
    fn canonical_form_round_trips() {
        for s in [
            "agent(killed-3,John-1)",
            "unit(measure1,GroupOfPeople)",
            "time(meet-2,time-1)",
            "names(John-1,\"John\")",
            "sumo(?C,?X)",
            "lemma(be*,?V)",
        ] {
            let lit: Literal = s.parse().unwrap();
            assert_eq!(lit.to_string(), s);
        }
    }

    #[test]
    fn term_classification() {
        assert_eq!(Term::parse("?X"), Term::variable("X"));
        assert_eq!(Term::parse("be*"), Term::wildcard("be"));
        assert_eq!(Term::parse("Mahal-2"), Term::token("Mahal", 2));
        assert_eq!(Term::parse("time-1"), Term::token("time", 1));
        assert_eq!(Term::parse("measure1"), Term::constant("measure1"));
        assert_eq!(Term::parse("-5"), Term::constant("-5"));
        assert_eq!(Term::parse("?"), Term::constant("?"));
    }

    #[test]
    fn punctuation_tokens_parse_as_tokens() {
        assert_eq!(Term::parse("?-4"), Term::token("?", 4));
        assert_eq!(Term::parse("*-7"), Term::token("*", 7));
        let question: Literal = "punct(left-2,?-4)".parse().unwrap();
        assert_eq!(question.arg2, Term::token("?", 4));
        assert!(question.is_ground());
        let comma: Literal = "punct(left-2,,-3)".parse().unwrap();
        assert_eq!(comma.arg2, Term::token(",", 3));
        assert_eq!(comma.to_string(), "punct(left-2,,-3)");
        let both: Literal = "conj(,-3,,-5)".parse().unwrap();
        assert_eq!(both.arg1, Term::token(",", 3));
        assert_eq!(both.arg2, Term::token(",", 5));
    }

    #[test]
    fn thousands_separators_are_removed() {
        let lit: Literal = "value(measure1,3,000,000)".parse().unwrap();
        assert_eq!(lit.arg2, Term::constant("3000000"));
    }

    #[test]
    fn leading_apostrophe_is_dropped() {
        let lit: Literal = "poss(John-1,'s-2)".parse().unwrap();
        assert_eq!(lit.arg2, Term::token("s", 2));
    }

    #[test]
    fn malformed_literals_are_rejected() {
        assert!(matches!("".parse::<Literal>(), Err(LiteralError::Empty)));
        assert!(matches!(
            "nsubj killed".parse::<Literal>(),
            Err(LiteralError::Malformed { .. })
        ));
        assert!(matches!(
            "p(a)".parse::<Literal>(),
            Err(LiteralError::Arity { count: 1, .. })
        ));
        assert!(matches!(
            "p(a,)".parse::<Literal>(),
            Err(LiteralError::Malformed { .. })
        ));
    }

    #[test]
    fn match_ground_binds_consistently() {
        let pattern: Literal = "conj(?X,?X)".parse().unwrap();
        let same: Literal = "conj(a-1,a-1)".parse().unwrap();
        let diff: Literal = "conj(a-1,b-2)".parse().unwrap();
        assert!(pattern.match_ground(&same, &Binding::new()).is_some());
        assert!(pattern.match_ground(&diff, &Binding::new()).is_none());
    }

    #[test]
    fn wildcard_matches_any_index() {
        let pattern: Literal = "aux(?V,was*)".parse().unwrap();
        let ground: Literal = "aux(going-3,Was-2)".parse().unwrap();
        let b = pattern.match_ground(&ground, &Binding::new()).unwrap();
        assert_eq!(b.get("V"), Some(&Term::token("going", 3)));
        let elsewhere: Literal = "aux(gone-9,was-7)".parse().unwrap();
        assert!(pattern.match_ground(&elsewhere, &Binding::new()).is_some());
        let other: Literal = "aux(going-3,is-2)".parse().unwrap();
        assert!(pattern.match_ground(&other, &Binding::new()).is_none());
        assert!(!pattern.is_ground());
    }

    #[test]
    fn substitute_fills_bound_variables() {
        let pattern: Literal = "agent(?V,?A)".parse().unwrap();
        let b: Binding = [("V", Term::token("killed", 3)), ("A", Term::token("John", 1))]
            .into_iter()
            .collect();
        assert_eq!(pattern.substitute(&b).to_string(), "agent(killed-3,John-1)");
    }

    #[test]
    fn split_respects_parens_and_quotes() {
        assert_eq!(split_top_level("a(b,c), d", ','), vec!["a(b,c)", " d"]);
        assert_eq!(split_top_level("\"x, y\",z", ','), vec!["\"x, y\"", "z"]);
        assert!(split_top_level("", ',').is_empty());
    }
}
