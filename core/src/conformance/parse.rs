use std::sync::LazyLock;

use regex::Regex;

use super::{Choice, ChoiceLimit, Conformance, Expression};

static CHOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z])(\d+)?(\+)?$").expect("static regex must compile")
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)|(\S)").expect("static regex must compile")
});

/// Parses conformance text.
///
/// Never fails: text outside the conformance language is preserved as
/// [`Conformance::Generic`].
///
/// # Examples
///
/// ```
/// use matter_model_core::*;
///
/// assert_eq!(parse_conformance("M"), Conformance::Mandatory(None));
/// assert_eq!(
///     parse_conformance("LT & !BT"),
///     Conformance::Mandatory(Some(Expression::and(
///         Expression::identifier("LT"),
///         Expression::negated("BT"),
///     )))
/// );
/// assert!(matches!(parse_conformance("O.a+"), Conformance::Optional { choice: Some(_), .. }));
/// ```
pub fn parse_conformance(text: &str) -> Conformance {
    let text = text.trim();
    let parsed = split_top_level(text).and_then(|items| {
        if items.len() == 1 {
            parse_item(items[0])
        } else {
            items
                .into_iter()
                .map(parse_item)
                .collect::<Option<Vec<_>>>()
                .map(Conformance::Set)
        }
    });
    parsed.unwrap_or_else(|| {
        if !text.is_empty() {
            tracing::debug!(text, "conformance text is not in the conformance language");
        }
        Conformance::Generic(text.to_string())
    })
}

/// Splits on commas outside brackets and parentheses.
fn split_top_level(text: &str) -> Option<Vec<&str>> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                items.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    items.push(text[start..].trim());
    Some(items)
}

fn parse_item(item: &str) -> Option<Conformance> {
    match item {
        "" => return None,
        "M" => return Some(Conformance::Mandatory(None)),
        "O" => {
            return Some(Conformance::Optional {
                condition: None,
                choice: None,
            });
        }
        "P" => return Some(Conformance::Provisional),
        "D" => return Some(Conformance::Deprecated),
        "X" => return Some(Conformance::Disallowed),
        _ => {}
    }
    if item.eq_ignore_ascii_case("desc") {
        return Some(Conformance::Described);
    }
    if item.eq_ignore_ascii_case("zigbee") {
        return Some(Conformance::Zigbee);
    }
    if let Some(choice) = item.strip_prefix("O.") {
        return Some(Conformance::Optional {
            condition: None,
            choice: Some(parse_choice(choice)?),
        });
    }
    if let Some(rest) = item.strip_prefix('[') {
        let close = matching_bracket(rest)?;
        let condition = parse_expression(&rest[..close])?;
        let suffix = rest[close + 1..].trim();
        let choice = match suffix {
            "" => None,
            _ => Some(parse_choice(suffix.strip_prefix('.')?)?),
        };
        return Some(Conformance::Optional {
            condition: Some(condition),
            choice,
        });
    }
    parse_expression(item).map(|expr| Conformance::Mandatory(Some(expr)))
}

/// Byte offset of the `]` closing an already-consumed `[`.
fn matching_bracket(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_choice(text: &str) -> Option<Choice> {
    let caps = CHOICE_RE.captures(text)?;
    let set = caps.get(1)?.as_str().to_string();
    let count = match caps.get(2) {
        Some(n) => n.as_str().parse().ok()?,
        None => 1,
    };
    let limit = if caps.get(3).is_some() {
        ChoiceLimit::AtLeast(count)
    } else {
        ChoiceLimit::Exactly(count)
    };
    Some(Choice { set, limit })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Symbol(char),
}

fn parse_expression(text: &str) -> Option<Expression> {
    let tokens: Vec<Token> = TOKEN_RE
        .captures_iter(text)
        .filter_map(|caps| {
            if let Some(ident) = caps.get(1) {
                Some(Token::Ident(ident.as_str().to_string()))
            } else {
                caps.get(2)
                    .and_then(|m| m.as_str().chars().next())
                    .map(Token::Symbol)
            }
        })
        .collect();
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.or()?;
    (parser.pos == parser.tokens.len()).then_some(expr)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn eat(&mut self, symbol: char) -> bool {
        if self.tokens.get(self.pos) == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Option<Expression> {
        let mut left = self.and()?;
        while self.eat('|') {
            left = Expression::or(left, self.and()?);
        }
        Some(left)
    }

    fn and(&mut self) -> Option<Expression> {
        let mut left = self.unary()?;
        while self.eat('&') {
            left = Expression::and(left, self.unary()?);
        }
        Some(left)
    }

    fn unary(&mut self) -> Option<Expression> {
        if self.eat('!') {
            if let Some(Token::Ident(id)) = self.tokens.get(self.pos) {
                let expr = Expression::negated(id.clone());
                self.pos += 1;
                return Some(expr);
            }
            return Some(Expression::not(self.unary()?));
        }
        if self.eat('(') {
            let inner = self.or()?;
            return self.eat(')').then_some(inner);
        }
        match self.tokens.get(self.pos)? {
            Token::Ident(id) => {
                let expr = Expression::identifier(id.clone());
                self.pos += 1;
                Some(expr)
            }
            Token::Symbol(_) => None,
        }
    }
}
