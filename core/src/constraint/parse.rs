use std::sync::LazyLock;

use regex::Regex;

use super::{Constraint, Limit};
use crate::extreme::MathOperator;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(0[xX][0-9A-Fa-f]+)|(\d+)|([A-Za-z_][A-Za-z0-9_.]*)|(\S)")
        .expect("static regex must compile")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Hex(u64),
    Dec(u64),
    Word(String),
    Symbol(char),
}

/// Parses constraint text.
///
/// Never fails: text outside the constraint language is preserved as
/// [`Constraint::Generic`].
///
/// # Examples
///
/// ```
/// use matter_model_core::{Constraint, Limit, parse_constraint};
///
/// assert_eq!(parse_constraint("max 254"), Constraint::Max(Limit::Int(254)));
/// assert_eq!(parse_constraint("all"), Constraint::All);
/// assert_eq!(
///     parse_constraint("see below"),
///     Constraint::Generic("see below".into())
/// );
/// ```
pub fn parse_constraint(text: &str) -> Constraint {
    let text = text.trim();
    let Some(tokens) = tokenize(text) else {
        return Constraint::Generic(text.to_string());
    };
    let mut parser = Parser { tokens, pos: 0 };
    match parser.constraint() {
        Some(constraint) if parser.at_end() => constraint,
        _ => {
            tracing::debug!(text, "constraint text is not in the constraint language");
            Constraint::Generic(text.to_string())
        }
    }
}

fn tokenize(text: &str) -> Option<Vec<Token>> {
    TOKEN_RE
        .captures_iter(text)
        .map(|caps| {
            if let Some(hex) = caps.get(1) {
                u64::from_str_radix(&hex.as_str()[2..], 16).ok().map(Token::Hex)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse().ok().map(Token::Dec)
            } else if let Some(word) = caps.get(3) {
                Some(Token::Word(word.as_str().to_string()))
            } else {
                caps.get(4)
                    .and_then(|m| m.as_str().chars().next())
                    .map(Token::Symbol)
            }
        })
        .collect()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if self.peek() == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(word) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn constraint(&mut self) -> Option<Constraint> {
        let item = self.item()?;
        if self.eat_symbol('[') {
            let entry = self.constraint()?;
            if !self.eat_symbol(']') {
                return None;
            }
            return Some(Constraint::List {
                constraint: Box::new(item),
                entry: Box::new(entry),
            });
        }
        Some(item)
    }

    fn item(&mut self) -> Option<Constraint> {
        if self.eat_word("all") || self.eat_word("any") {
            return Some(Constraint::All);
        }
        if self.eat_word("desc") {
            return Some(Constraint::Desc);
        }
        if self.eat_word("length") {
            return self.length();
        }
        if self.eat_word("min") {
            return Some(Constraint::Min(self.limit()?));
        }
        if self.eat_word("max") {
            return Some(Constraint::Max(self.limit()?));
        }
        let min = self.limit()?;
        if self.eat_word("to") {
            let max = self.limit()?;
            return Some(Constraint::Range { min, max });
        }
        Some(Constraint::Exact(min))
    }

    fn length(&mut self) -> Option<Constraint> {
        if self.eat_word("min") {
            return Some(Constraint::MinLength(self.limit()?));
        }
        if self.eat_word("max") {
            return Some(Constraint::MaxLength(self.limit()?));
        }
        let min = self.limit()?;
        if !self.eat_word("to") {
            return None;
        }
        let max = self.limit()?;
        Some(Constraint::LengthRange { min, max })
    }

    fn limit(&mut self) -> Option<Limit> {
        let mut left = self.term()?;
        while let Some(op) = self.operator(&['+', '-']) {
            let right = self.term()?;
            left = Limit::math(op, left, right);
        }
        Some(left)
    }

    fn term(&mut self) -> Option<Limit> {
        let mut left = self.factor()?;
        while let Some(op) = self.operator(&['*', '/']) {
            let right = self.factor()?;
            left = Limit::math(op, left, right);
        }
        Some(left)
    }

    fn operator(&mut self, allowed: &[char]) -> Option<MathOperator> {
        match self.peek() {
            Some(Token::Symbol(c)) if allowed.contains(c) => {
                let op = MathOperator::from_symbol(*c);
                self.pos += 1;
                op
            }
            _ => None,
        }
    }

    fn factor(&mut self) -> Option<Limit> {
        match self.next()? {
            Token::Symbol('(') => {
                let inner = self.limit()?;
                self.eat_symbol(')').then_some(inner)
            }
            Token::Symbol('-') => match self.next()? {
                Token::Dec(n) => negate(n).map(Limit::Int),
                _ => None,
            },
            Token::Dec(n) => Some(match i64::try_from(n) {
                Ok(v) => Limit::Int(v),
                Err(_) => Limit::UInt(n),
            }),
            Token::Hex(n) => Some(Limit::Hex(n)),
            Token::Word(word) => Some(match word.to_ascii_lowercase().as_str() {
                "null" => Limit::Null,
                "empty" => Limit::Empty,
                "true" => Limit::Bool(true),
                "false" => Limit::Bool(false),
                "to" | "min" | "max" | "length" | "all" | "any" | "desc" => return None,
                _ => Limit::Reference(word),
            }),
            Token::Symbol(_) => None,
        }
    }
}

fn negate(n: u64) -> Option<i64> {
    if n == 1u64 << 63 {
        Some(i64::MIN)
    } else {
        i64::try_from(n).ok().map(|v| -v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_and_bounds() {
        assert_eq!(
            parse_constraint("1 to 10"),
            Constraint::Range {
                min: Limit::Int(1),
                max: Limit::Int(10)
            }
        );
        assert_eq!(parse_constraint("min -5"), Constraint::Min(Limit::Int(-5)));
        assert_eq!(parse_constraint("0xFFFF"), Constraint::Exact(Limit::Hex(0xFFFF)));
        assert_eq!(
            parse_constraint("18446744073709551615"),
            Constraint::Exact(Limit::UInt(u64::MAX))
        );
    }

    #[test]
    fn test_parse_keywords_are_case_insensitive() {
        assert_eq!(parse_constraint("ALL"), Constraint::All);
        assert_eq!(parse_constraint("any"), Constraint::All);
        assert_eq!(parse_constraint("Desc"), Constraint::Desc);
        assert_eq!(parse_constraint("max null"), Constraint::Max(Limit::Null));
    }

    #[test]
    fn test_parse_math_precedence() {
        let c = parse_constraint("max A + B * 2");
        let expected = Limit::math(
            MathOperator::Add,
            Limit::Reference("A".into()),
            Limit::math(MathOperator::Multiply, Limit::Reference("B".into()), Limit::Int(2)),
        );
        assert_eq!(c, Constraint::Max(expected));
        assert_eq!(c.to_string(), "max (A + (B * 2))");
    }

    #[test]
    fn test_parse_length_forms() {
        assert_eq!(parse_constraint("length max 32"), Constraint::MaxLength(Limit::Int(32)));
        assert_eq!(
            parse_constraint("length 1 to 16"),
            Constraint::LengthRange {
                min: Limit::Int(1),
                max: Limit::Int(16)
            }
        );
        assert!(matches!(parse_constraint("length 5"), Constraint::Generic(_)));
    }

    #[test]
    fn test_unary_minus_only_on_numbers() {
        assert!(matches!(parse_constraint("-Foo"), Constraint::Generic(_)));
        assert!(matches!(parse_constraint("1 - (-Foo)"), Constraint::Generic(_)));
        assert_eq!(
            parse_constraint("1 - -2"),
            Constraint::Exact(Limit::math(MathOperator::Subtract, Limit::Int(1), Limit::Int(-2)))
        );
        assert_eq!(
            parse_constraint("-9223372036854775808"),
            Constraint::Exact(Limit::Int(i64::MIN))
        );
    }

    #[test]
    fn test_malformed_text_is_generic() {
        for text in ["", "1 to", "(1 + 2", "max 4[max 32", "1 to 2 to 3", "0x", "see spec"] {
            assert_eq!(parse_constraint(text), Constraint::Generic(text.to_string()), "{text}");
        }
    }

    #[test]
    fn test_canonical_text_round_trips() {
        for text in [
            "1 to 10",
            "max 254",
            "min -100",
            "0 to 0xFE",
            "all",
            "desc",
            "null",
            "max (MaxLevel - 1)",
            "max 4[max 32]",
            "length min 2",
            "MinValue to MaxValue",
        ] {
            assert_eq!(parse_constraint(text).to_string(), text);
        }
    }
}
