//! Lexer for the rule language.
//!
//! Produces one [`Lexeme`] at a time so the parser can switch to raw mode
//! ([`Lexer::raw_block`]) for brace-delimited formulas on a right-hand side.
//! Comments start with `;` or `#` and run to the end of the line.

/// Line/column position (both 1-based) for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

/// Token kinds of the rule language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexemeKind {
    /// Predicate names and arguments: `nsubj`, `?X`, `John-1`, `be*`, `3.5`.
    Atom(String),
    /// Double-quoted string, quotes included.
    Str(String),
    /// `@name` directive.
    Directive(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Period,
    Pipe,
    Plus,
    Minus,
    Bang,
    /// `==>`
    Rewrite,
    /// `?=>`
    Optional,
    /// `/-`
    Fact,
    Eof,
}

impl LexemeKind {
    /// Short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            LexemeKind::Atom(a) => format!("\"{a}\""),
            LexemeKind::Str(s) => s.clone(),
            LexemeKind::Directive(d) => format!("@{d}"),
            LexemeKind::LParen => "'('".into(),
            LexemeKind::RParen => "')'".into(),
            LexemeKind::LBrace => "'{'".into(),
            LexemeKind::RBrace => "'}'".into(),
            LexemeKind::Comma => "','".into(),
            LexemeKind::Period => "'.'".into(),
            LexemeKind::Pipe => "'|'".into(),
            LexemeKind::Plus => "'+'".into(),
            LexemeKind::Minus => "'-'".into(),
            LexemeKind::Bang => "'!'".into(),
            LexemeKind::Rewrite => "'==>'".into(),
            LexemeKind::Optional => "'?=>'".into(),
            LexemeKind::Fact => "'/-'".into(),
            LexemeKind::Eof => "end of input".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub span: Span,
}

/// A lexing failure; the parser attaches the rule name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == ';' || ch == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Produce the next lexeme.
    pub fn next_lexeme(&mut self) -> Result<Lexeme, LexError> {
        self.skip_trivia();
        let span = self.span();
        let error = |message: String| LexError { span, message };
        let Some(ch) = self.bump() else {
            return Ok(Lexeme {
                kind: LexemeKind::Eof,
                span,
            });
        };
        let kind = match ch {
            '(' => LexemeKind::LParen,
            ')' => LexemeKind::RParen,
            '{' => LexemeKind::LBrace,
            '}' => LexemeKind::RBrace,
            ',' => LexemeKind::Comma,
            '.' => LexemeKind::Period,
            '|' => LexemeKind::Pipe,
            '+' => LexemeKind::Plus,
            '-' => LexemeKind::Minus,
            '!' => LexemeKind::Bang,
            '=' => {
                if self.eat('=') && self.eat('>') {
                    LexemeKind::Rewrite
                } else {
                    return Err(error("expected '==>'".into()));
                }
            }
            '/' => {
                if self.eat('-') {
                    LexemeKind::Fact
                } else {
                    return Err(error("expected '/-'".into()));
                }
            }
            '?' if self.chars.peek() == Some(&'=') => {
                self.bump();
                if self.eat('>') {
                    LexemeKind::Optional
                } else {
                    return Err(error("expected '?=>'".into()));
                }
            }
            '@' => {
                let name = self.take_while(String::new(), |c| c.is_alphanumeric() || c == '_');
                if name.is_empty() {
                    return Err(error("expected directive name after '@'".into()));
                }
                LexemeKind::Directive(name)
            }
            '"' => {
                let mut text = String::from('"');
                loop {
                    match self.bump() {
                        Some('"') => break,
                        Some(c) => text.push(c),
                        None => return Err(error("unterminated string".into())),
                    }
                }
                text.push('"');
                LexemeKind::Str(text)
            }
            c if is_atom_char(c) => LexemeKind::Atom(self.atom(c)),
            other => return Err(error(format!("unexpected character '{other}'"))),
        };
        Ok(Lexeme { kind, span })
    }

    fn take_while(&mut self, mut text: String, accept: impl Fn(char) -> bool) -> String {
        while let Some(&c) = self.chars.peek() {
            if !accept(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
        text
    }

    fn atom(&mut self, first: char) -> String {
        let mut text = String::from(first);
        loop {
            text = self.take_while(text, is_atom_char);
            // A period continues an atom only between digits: 3.5
            if self.chars.peek() == Some(&'.') && text.ends_with(|c: char| c.is_ascii_digit()) {
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek().is_some_and(char::is_ascii_digit) {
                    text.push('.');
                    self.bump();
                    continue;
                }
            }
            return text;
        }
    }

    /// Read raw text up to the brace that closes an already consumed `{`.
    ///
    /// Nested braces are balanced; the closing brace is consumed but not
    /// included.
    pub fn raw_block(&mut self) -> Result<String, LexError> {
        let start = self.span();
        let mut depth = 1usize;
        let mut text = String::new();
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
                _ => {}
            }
            text.push(c);
        }
        Err(LexError {
            span: start,
            message: "unterminated '{' block".into(),
        })
    }
}

fn is_atom_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '?' | '*' | ':' | '\'' | '$' | '%' | '&')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<LexemeKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let lx = lexer.next_lexeme().unwrap();
            let done = lx.kind == LexemeKind::Eof;
            out.push(lx.kind);
            if done {
                return out;
            }
        }
    }

    fn atom(s: &str) -> LexemeKind {
        LexemeKind::Atom(s.into())
    }

    #[test]
    fn lexes_simple_rule() {
        assert_eq!(
            kinds("nsubj(?V,?A) ==> agent(?V,?A)."),
            vec![
                atom("nsubj"),
                LexemeKind::LParen,
                atom("?V"),
                LexemeKind::Comma,
                atom("?A"),
                LexemeKind::RParen,
                LexemeKind::Rewrite,
                atom("agent"),
                LexemeKind::LParen,
                atom("?V"),
                LexemeKind::Comma,
                atom("?A"),
                LexemeKind::RParen,
                LexemeKind::Period,
                LexemeKind::Eof,
            ]
        );
    }

    #[test]
    fn operators_and_prefixes() {
        assert_eq!(
            kinds("+a -b ?=> /- ! |"),
            vec![
                LexemeKind::Plus,
                atom("a"),
                LexemeKind::Minus,
                atom("b"),
                LexemeKind::Optional,
                LexemeKind::Fact,
                LexemeKind::Bang,
                LexemeKind::Pipe,
                LexemeKind::Eof,
            ]
        );
    }

    #[test]
    fn token_atoms_keep_hyphen_and_decimals() {
        assert_eq!(
            kinds("killed-3 3.5."),
            vec![atom("killed-3"), atom("3.5"), LexemeKind::Period, LexemeKind::Eof]
        );
    }

    #[test]
    fn comments_and_lines() {
        let mut lexer = Lexer::new("; comment\n# another\n  @rule");
        let lx = lexer.next_lexeme().unwrap();
        assert_eq!(lx.kind, LexemeKind::Directive("rule".into()));
        assert_eq!(lx.span, Span { line: 3, column: 3 });
    }

    #[test]
    fn strings_keep_quotes() {
        assert_eq!(
            kinds("\"John Smith\""),
            vec![LexemeKind::Str("\"John Smith\"".into()), LexemeKind::Eof]
        );
    }

    #[test]
    fn raw_block_balances_braces() {
        let mut lexer = Lexer::new("{(exists (?X) {x})} .");
        assert_eq!(lexer.next_lexeme().unwrap().kind, LexemeKind::LBrace);
        assert_eq!(lexer.raw_block().unwrap(), "(exists (?X) {x})");
        assert_eq!(lexer.next_lexeme().unwrap().kind, LexemeKind::Period);
    }

    #[test]
    fn errors_carry_position() {
        let mut lexer = Lexer::new("\n  =>");
        let err = lexer.next_lexeme().unwrap_err();
        assert_eq!(err.span, Span { line: 2, column: 3 });
        assert!(Lexer::new("\"open").next_lexeme().is_err());
        assert!(Lexer::new("{ never closed").raw_block().is_err());
    }
}
