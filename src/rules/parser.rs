//! Recursive-descent parser from rule text to [`Rule`] values.
//!
//! Parsing is entirely separate from matching: the parser only produces
//! data, validated so that every asserted, retracted or guarded variable is
//! bound by some positive left-hand literal.

use std::collections::{BTreeSet, HashMap};

use crate::cnf::Cnf;
use crate::literal::{Literal, Term};
use crate::procedures;

use super::error::{RuleError, RuleResult};
use super::lexer::{LexError, Lexeme, LexemeKind, Lexer, Span};
use super::{Action, LhsElement, Rule, RuleKind};

/// Output of parsing one rule file.
#[derive(Debug, Default)]
pub(crate) struct ParsedRules {
    pub rules: Vec<Rule>,
    pub facts: Cnf,
}

pub(crate) fn parse_rules(source: &str) -> RuleResult<ParsedRules> {
    Parser::new(source).parse_file()
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Lexeme>,
    /// Label from a preceding `@rule` directive.
    pending_name: Option<(String, i32)>,
    /// Name used in error messages for the rule being parsed.
    current_rule: String,
    /// Whether unmarked positive literals are consumed.
    consume: bool,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            peeked: None,
            pending_name: None,
            current_rule: String::from("<file>"),
            consume: false,
        }
    }

    // -----------------------------------------------------------------------
    // Lexeme plumbing
    // -----------------------------------------------------------------------

    fn lex_error(&self, err: LexError) -> RuleError {
        RuleError::Syntax {
            rule: self.current_rule.clone(),
            line: err.span.line,
            column: err.span.column,
            message: err.message,
        }
    }

    fn syntax(&self, span: Span, message: impl Into<String>) -> RuleError {
        RuleError::Syntax {
            rule: self.current_rule.clone(),
            line: span.line,
            column: span.column,
            message: message.into(),
        }
    }

    fn peek(&mut self) -> RuleResult<&Lexeme> {
        let lexeme = match self.peeked.take() {
            Some(lexeme) => lexeme,
            None => self.lexer.next_lexeme().map_err(|e| self.lex_error(e))?,
        };
        Ok(self.peeked.insert(lexeme))
    }

    fn next(&mut self) -> RuleResult<Lexeme> {
        match self.peeked.take() {
            Some(lexeme) => Ok(lexeme),
            None => self.lexer.next_lexeme().map_err(|e| self.lex_error(e)),
        }
    }

    fn expect(&mut self, kind: LexemeKind, what: &str) -> RuleResult<Span> {
        let lexeme = self.next()?;
        if lexeme.kind == kind {
            Ok(lexeme.span)
        } else {
            Err(self.syntax(
                lexeme.span,
                format!("expected {what}, found {}", lexeme.kind.describe()),
            ))
        }
    }

    fn eat(&mut self, kind: &LexemeKind) -> RuleResult<bool> {
        if &self.peek()?.kind == kind {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // -----------------------------------------------------------------------
    // File level
    // -----------------------------------------------------------------------

    fn parse_file(mut self) -> RuleResult<ParsedRules> {
        let mut parsed = ParsedRules::default();
        let mut seen: HashMap<String, usize> = HashMap::new();
        loop {
            let lexeme = self.peek()?.clone();
            match lexeme.kind {
                LexemeKind::Eof => break,
                LexemeKind::Directive(name) => {
                    self.next()?;
                    self.directive(&name, lexeme.span)?;
                }
                LexemeKind::Fact => {
                    self.next()?;
                    self.current_rule = format!("fact-{}", lexeme.span.line);
                    loop {
                        let lit = self.literal()?;
                        if !lit.is_ground() {
                            return Err(self.syntax(lexeme.span, "facts must be ground"));
                        }
                        parsed.facts.append(lit);
                        if !self.eat(&LexemeKind::Comma)? {
                            break;
                        }
                    }
                    self.expect(LexemeKind::Period, "'.' after fact")?;
                }
                _ => {
                    let rule = self.rule(lexeme.span)?;
                    if let Some(&first_line) = seen.get(&rule.name) {
                        return Err(RuleError::DuplicateRule {
                            name: rule.name,
                            line: rule.line,
                            first_line,
                        });
                    }
                    seen.insert(rule.name.clone(), rule.line);
                    parsed.rules.push(rule);
                }
            }
        }
        Ok(parsed)
    }

    fn directive(&mut self, name: &str, span: Span) -> RuleResult<()> {
        match name {
            "rule" => {
                self.current_rule = format!("@rule at line {}", span.line);
                let label = match self.next()? {
                    Lexeme {
                        kind: LexemeKind::Atom(label),
                        ..
                    } => label,
                    other => {
                        return Err(self.syntax(
                            other.span,
                            format!("expected rule name, found {}", other.kind.describe()),
                        ));
                    }
                };
                let mut priority = 0;
                if let LexemeKind::Atom(text) = &self.peek()?.kind {
                    if let Ok(p) = text.parse::<i32>() {
                        priority = p;
                        self.next()?;
                    }
                }
                self.pending_name = Some((label, priority));
                Ok(())
            }
            "consume" => {
                self.consume = true;
                Ok(())
            }
            "preserve" => {
                self.consume = false;
                Ok(())
            }
            other => Err(RuleError::UnknownDirective {
                directive: other.to_string(),
                line: span.line,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    fn rule(&mut self, start: Span) -> RuleResult<Rule> {
        let (name, priority) = self
            .pending_name
            .take()
            .unwrap_or_else(|| (format!("rule-{}", start.line), 0));
        self.current_rule = name.clone();

        let mut lhs = Vec::new();
        let mut guards = Vec::new();
        loop {
            match self.lhs_element()? {
                LhsElement::Guard(lit) => guards.push(lit),
                element => lhs.push(element),
            }
            if !self.eat(&LexemeKind::Comma)? {
                break;
            }
        }

        let arrow = self.next()?;
        let kind = match arrow.kind {
            LexemeKind::Rewrite => RuleKind::Rewrite,
            LexemeKind::Optional => RuleKind::Optional,
            other => {
                return Err(self.syntax(
                    arrow.span,
                    format!("expected '==>' or '?=>', found {}", other.describe()),
                ));
            }
        };
        if kind == RuleKind::Optional {
            for element in &mut lhs {
                element.set_consume(false);
            }
        }

        let rhs = self.rhs()?;
        self.expect(LexemeKind::Period, "'.' at end of rule")?;

        let rule = Rule::new(name, start.line, priority, kind, lhs, guards, rhs);
        validate(&rule)?;
        Ok(rule)
    }

    fn lhs_element(&mut self) -> RuleResult<LhsElement> {
        let lexeme = self.peek()?.clone();
        match lexeme.kind {
            LexemeKind::Plus => {
                self.next()?;
                if self.eat(&LexemeKind::LParen)? {
                    return self.alternatives(false);
                }
                Ok(LhsElement::Match {
                    literal: self.literal()?,
                    consume: false,
                })
            }
            LexemeKind::Minus => {
                self.next()?;
                Ok(LhsElement::Absent(self.literal()?))
            }
            LexemeKind::LParen => {
                self.next()?;
                self.alternatives(self.consume)
            }
            LexemeKind::LBrace => {
                self.next()?;
                let lit = self.literal()?;
                self.expect(LexemeKind::RBrace, "'}' closing procedure")?;
                if !procedures::is_procedure(&lit.predicate) {
                    return Err(RuleError::UnknownProcedure {
                        rule: self.current_rule.clone(),
                        line: lexeme.span.line,
                        name: lit.predicate,
                    });
                }
                Ok(LhsElement::Guard(lit))
            }
            _ => {
                let lit = self.literal()?;
                if procedures::is_procedure(&lit.predicate) {
                    Ok(LhsElement::Guard(lit))
                } else {
                    Ok(LhsElement::Match {
                        literal: lit,
                        consume: self.consume,
                    })
                }
            }
        }
    }

    /// Rest of `( lit | lit ... )` after the opening parenthesis.
    fn alternatives(&mut self, consume: bool) -> RuleResult<LhsElement> {
        let mut options = vec![self.literal()?];
        while self.eat(&LexemeKind::Pipe)? {
            options.push(self.literal()?);
        }
        self.expect(LexemeKind::RParen, "')' closing disjunction")?;
        if options.len() == 1 {
            return Ok(LhsElement::Match {
                literal: options.remove(0),
                consume,
            });
        }
        Ok(LhsElement::Alternatives { options, consume })
    }

    fn rhs(&mut self) -> RuleResult<Vec<Action>> {
        let lexeme = self.peek()?.clone();
        match lexeme.kind {
            LexemeKind::LBrace => {
                self.next()?;
                let raw = self.lexer.raw_block().map_err(|e| self.lex_error(e))?;
                Ok(vec![Action::Formula(raw.trim().to_string())])
            }
            LexemeKind::Bang => {
                self.next()?;
                Ok(vec![Action::BindOnly])
            }
            LexemeKind::LParen => {
                self.next()?;
                let actions = self.actions()?;
                self.expect(LexemeKind::RParen, "')' closing right-hand side")?;
                Ok(actions)
            }
            LexemeKind::Atom(ref word) if word == "stop" => {
                self.next()?;
                if self.peek()?.kind == LexemeKind::LParen {
                    // A predicate that happens to be called `stop`.
                    let first = Action::Assert(self.literal_after(word.clone())?);
                    let mut actions = vec![first];
                    if self.eat(&LexemeKind::Comma)? {
                        actions.extend(self.actions()?);
                    }
                    Ok(actions)
                } else {
                    Ok(vec![Action::Stop])
                }
            }
            _ => self.actions(),
        }
    }

    fn actions(&mut self) -> RuleResult<Vec<Action>> {
        let mut actions = Vec::new();
        loop {
            if self.eat(&LexemeKind::Minus)? {
                actions.push(Action::Retract(self.literal()?));
            } else {
                actions.push(Action::Assert(self.literal()?));
            }
            if !self.eat(&LexemeKind::Comma)? {
                return Ok(actions);
            }
        }
    }

    fn literal(&mut self) -> RuleResult<Literal> {
        let lexeme = self.next()?;
        match lexeme.kind {
            LexemeKind::Atom(pred) => self.literal_after(pred),
            other => Err(self.syntax(
                lexeme.span,
                format!("expected predicate name, found {}", other.describe()),
            )),
        }
    }

    fn literal_after(&mut self, predicate: String) -> RuleResult<Literal> {
        self.expect(LexemeKind::LParen, "'(' after predicate")?;
        let arg1 = self.term()?;
        self.expect(LexemeKind::Comma, "',' between arguments")?;
        let arg2 = self.term()?;
        self.expect(LexemeKind::RParen, "')' closing literal")?;
        Ok(Literal::new(predicate, arg1, arg2))
    }

    fn term(&mut self) -> RuleResult<Term> {
        let lexeme = self.next()?;
        match lexeme.kind {
            LexemeKind::Atom(raw) | LexemeKind::Str(raw) => Ok(Term::parse(&raw)),
            other => Err(self.syntax(
                lexeme.span,
                format!("expected argument, found {}", other.describe()),
            )),
        }
    }
}

/// Check variable safety and that the rule can bind anything at all.
fn validate(rule: &Rule) -> RuleResult<()> {
    let bound: BTreeSet<&str> = rule
        .lhs
        .iter()
        .filter_map(|element| match element {
            LhsElement::Match { literal, .. } => Some(literal.variables().collect::<Vec<_>>()),
            // Only variables common to all alternatives are guaranteed bound.
            LhsElement::Alternatives { options, .. } => {
                let mut common: Option<BTreeSet<&str>> = None;
                for option in options {
                    let vars: BTreeSet<&str> = option.variables().collect();
                    common = Some(match common {
                        None => vars,
                        Some(c) => c.intersection(&vars).copied().collect(),
                    });
                }
                common.map(|c| c.into_iter().collect())
            }
            _ => None,
        })
        .flatten()
        .collect();

    if !rule.lhs.iter().any(LhsElement::is_positive) {
        return Err(RuleError::NoPattern {
            rule: rule.name.clone(),
            line: rule.line,
        });
    }

    let unbound = |lit: &Literal, place: &str| -> RuleResult<()> {
        match lit.variables().find(|v| !bound.contains(v)) {
            Some(variable) => Err(RuleError::UnboundVariable {
                rule: rule.name.clone(),
                line: rule.line,
                variable: variable.to_string(),
                place: place.to_string(),
            }),
            None => Ok(()),
        }
    };

    for guard in &rule.guards {
        unbound(guard, "a guard")?;
    }
    for action in &rule.rhs {
        match action {
            Action::Assert(lit) => {
                unbound(lit, "the right-hand side")?;
                if lit.args().iter().any(|t| matches!(t, Term::Wildcard(_))) {
                    return Err(RuleError::Syntax {
                        rule: rule.name.clone(),
                        line: rule.line,
                        column: 1,
                        message: format!("wildcards cannot be asserted: {lit}"),
                    });
                }
            }
            Action::Retract(lit) => unbound(lit, "a retraction")?,
            Action::Formula(_) | Action::BindOnly | Action::Stop => {}
        }
    }
    Ok(())
}
