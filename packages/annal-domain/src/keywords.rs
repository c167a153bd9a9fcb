//! Boolean keyword expressions such as `mauer AND (berlin OR grenze) NOT "kalter krieg"`.
//!
//! Precedence is NOT over AND over OR. Adjacent operands without an operator are joined with
//! AND. Operators are recognised case-insensitively.

use std::{
	collections::{HashMap, HashSet},
	fmt::{Display, Formatter, Result as FmtResult},
	sync::OnceLock,
};

use regex::Regex;

use crate::{Error, Result};

/// Deepest accepted nesting of parentheses and `NOT` operators.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordExpr {
	Term(String),
	Not(Box<KeywordExpr>),
	And(Vec<KeywordExpr>),
	Or(Vec<KeywordExpr>),
}
impl KeywordExpr {
	/// Parses an expression. Blank input yields `None`, meaning "no keyword constraint".
	pub fn parse(input: &str) -> Result<Option<Self>> {
		let tokens = tokenize(input)?;

		if tokens.is_empty() {
			return Ok(None);
		}

		let mut parser = Parser { tokens, pos: 0, depth: 0 };
		let expr = parser.parse_or()?;

		if let Some(token) = parser.peek() {
			return Err(syntax(format!("unexpected {}", token.describe())));
		}

		Ok(Some(expr))
	}

	/// Lowercased terms in order of first appearance, including negated ones.
	pub fn terms(&self) -> Vec<String> {
		let mut out = Vec::new();
		let mut seen = HashSet::new();

		self.collect_terms(&mut out, &mut seen);

		out
	}

	/// Evaluates the expression against `text` using case-insensitive substring matching.
	pub fn matches(&self, text: &str) -> bool {
		self.matches_lowered(&text.to_lowercase())
	}

	/// Positive terms that occur in `text`.
	pub fn hits(&self, text: &str) -> Vec<String> {
		let lowered = text.to_lowercase();
		let mut out = Vec::new();

		self.collect_hits(&lowered, false, &mut out);

		out
	}

	/// Terms that are not under a `NOT`, deduplicated in order of first appearance.
	pub fn positive_terms(&self) -> Vec<String> {
		let mut out = Vec::new();

		self.collect_positive(false, &mut out);

		out
	}

	/// Replaces every positive term that has neighbours with `(term OR neighbour ...)`. Negated
	/// terms are left alone so that broadening never narrows the match set.
	pub fn broaden(&self, neighbours: &HashMap<String, Vec<String>>) -> Self {
		self.broaden_inner(neighbours, false)
	}

	fn broaden_inner(&self, neighbours: &HashMap<String, Vec<String>>, negated: bool) -> Self {
		match self {
			Self::Term(term) => {
				let extra = neighbours
					.get(term)
					.filter(|_| !negated)
					.map(|words| {
						let mut seen = HashSet::from([term.as_str()]);

						words
							.iter()
							.filter(|word| seen.insert(word.as_str()))
							.map(|word| Self::Term(word.clone()))
							.collect::<Vec<_>>()
					})
					.unwrap_or_default();

				if extra.is_empty() {
					return self.clone();
				}

				let mut items = vec![self.clone()];

				items.extend(extra);

				Self::Or(items)
			},
			Self::Not(inner) => Self::Not(Box::new(inner.broaden_inner(neighbours, !negated))),
			Self::And(items) =>
				Self::And(items.iter().map(|item| item.broaden_inner(neighbours, negated)).collect()),
			Self::Or(items) =>
				Self::Or(items.iter().map(|item| item.broaden_inner(neighbours, negated)).collect()),
		}
	}

	fn collect_positive(&self, negated: bool, out: &mut Vec<String>) {
		match self {
			Self::Term(term) => {
				if !negated && !out.contains(term) {
					out.push(term.clone());
				}
			},
			Self::Not(inner) => inner.collect_positive(!negated, out),
			Self::And(items) | Self::Or(items) => {
				for item in items {
					item.collect_positive(negated, out);
				}
			},
		}
	}

	fn fmt_operand(&self, f: &mut Formatter<'_>) -> FmtResult {
		match self {
			Self::Term(_) | Self::Not(_) => write!(f, "{self}"),
			Self::And(_) | Self::Or(_) => write!(f, "({self})"),
		}
	}

	fn matches_lowered(&self, lowered: &str) -> bool {
		match self {
			Self::Term(term) => lowered.contains(term.as_str()),
			Self::Not(inner) => !inner.matches_lowered(lowered),
			Self::And(items) => items.iter().all(|item| item.matches_lowered(lowered)),
			Self::Or(items) => items.iter().any(|item| item.matches_lowered(lowered)),
		}
	}

	fn collect_terms(&self, out: &mut Vec<String>, seen: &mut HashSet<String>) {
		match self {
			Self::Term(term) => {
				if seen.insert(term.clone()) {
					out.push(term.clone());
				}
			},
			Self::Not(inner) => inner.collect_terms(out, seen),
			Self::And(items) | Self::Or(items) => {
				for item in items {
					item.collect_terms(out, seen);
				}
			},
		}
	}

	fn collect_hits(&self, lowered: &str, negated: bool, out: &mut Vec<String>) {
		match self {
			Self::Term(term) => {
				if !negated && lowered.contains(term.as_str()) && !out.contains(term) {
					out.push(term.clone());
				}
			},
			Self::Not(inner) => inner.collect_hits(lowered, !negated, out),
			Self::And(items) | Self::Or(items) => {
				for item in items {
					item.collect_hits(lowered, negated, out);
				}
			},
		}
	}
}

/// Renders the expression in the syntax [`KeywordExpr::parse`] accepts. Terms that would not
/// survive tokenizing as a bare word are quoted.
impl Display for KeywordExpr {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		match self {
			Self::Term(term) => {
				let bare = !term.is_empty()
					&& !is_operator(term)
					&& term.chars().all(char::is_alphanumeric);

				if bare { write!(f, "{term}") } else { write!(f, "\"{}\"", term.replace('"', "")) }
			},
			Self::Not(inner) => {
				f.write_str("NOT ")?;

				inner.fmt_operand(f)
			},
			Self::And(items) | Self::Or(items) => {
				let separator = if matches!(self, Self::And(_)) { " AND " } else { " OR " };

				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(separator)?;
					}

					item.fmt_operand(f)?;
				}

				Ok(())
			},
		}
	}
}

/// Bare words of an expression with the operators removed, lowercased and deduplicated in order
/// of first appearance. Unlike [`KeywordExpr::parse`] this never fails on malformed input.
pub fn extract_terms(expression: &str) -> Vec<String> {
	static WORD: OnceLock<Option<Regex>> = OnceLock::new();

	let Some(word) = WORD.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").ok()) else {
		return Vec::new();
	};
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for found in word.find_iter(expression) {
		let term = found.as_str().to_lowercase();

		if is_operator(&term) {
			continue;
		}
		if seen.insert(term.clone()) {
			out.push(term);
		}
	}

	out
}

fn is_operator(word: &str) -> bool {
	matches!(word.to_ascii_uppercase().as_str(), "AND" | "OR" | "NOT")
}

fn syntax(message: impl Into<String>) -> Error {
	Error::KeywordSyntax { message: message.into() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	Word(String),
	And,
	Or,
	Not,
	Open,
	Close,
}
impl Token {
	fn describe(&self) -> String {
		match self {
			Self::Word(word) => format!("term {word:?}"),
			Self::And => "AND".to_string(),
			Self::Or => "OR".to_string(),
			Self::Not => "NOT".to_string(),
			Self::Open => "'('".to_string(),
			Self::Close => "')'".to_string(),
		}
	}

	fn starts_operand(&self) -> bool {
		matches!(self, Self::Word(_) | Self::Not | Self::Open)
	}
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
	let mut tokens = Vec::new();
	let mut chars = input.chars().peekable();

	while let Some(&c) = chars.peek() {
		match c {
			c if c.is_whitespace() => {
				chars.next();
			},
			'(' => {
				chars.next();
				tokens.push(Token::Open);
			},
			')' => {
				chars.next();
				tokens.push(Token::Close);
			},
			'"' => {
				chars.next();

				let mut phrase = String::new();
				let mut closed = false;

				for next in chars.by_ref() {
					if next == '"' {
						closed = true;

						break;
					}

					phrase.push(next);
				}

				if !closed {
					return Err(syntax("unterminated quoted phrase"));
				}

				let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");

				if !phrase.is_empty() {
					tokens.push(Token::Word(phrase.to_lowercase()));
				}
			},
			_ => {
				let mut word = String::new();

				while let Some(&next) = chars.peek() {
					if next.is_whitespace() || matches!(next, '(' | ')' | '"') {
						break;
					}

					word.push(next);
					chars.next();
				}

				let word = word.trim_matches(|c: char| !c.is_alphanumeric());

				if word.is_empty() {
					continue;
				}

				tokens.push(match word.to_ascii_uppercase().as_str() {
					"AND" => Token::And,
					"OR" => Token::Or,
					"NOT" => Token::Not,
					_ => Token::Word(word.to_lowercase()),
				});
			},
		}
	}

	Ok(tokens)
}

struct Parser {
	tokens: Vec<Token>,
	pos: usize,
	depth: usize,
}
impl Parser {
	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.pos)
	}

	fn descend(&mut self) -> Result<()> {
		self.depth += 1;

		if self.depth > MAX_NESTING {
			return Err(syntax(format!("nesting deeper than {MAX_NESTING} levels")));
		}

		Ok(())
	}

	fn next(&mut self) -> Option<Token> {
		let token = self.tokens.get(self.pos).cloned();

		self.pos += 1;

		token
	}

	fn parse_or(&mut self) -> Result<KeywordExpr> {
		let mut items = vec![self.parse_and()?];

		while self.peek() == Some(&Token::Or) {
			self.pos += 1;
			items.push(self.parse_and()?);
		}

		Ok(if items.len() == 1 { items.remove(0) } else { KeywordExpr::Or(items) })
	}

	fn parse_and(&mut self) -> Result<KeywordExpr> {
		let mut items = vec![self.parse_unary()?];

		loop {
			match self.peek() {
				Some(Token::And) => {
					self.pos += 1;
					items.push(self.parse_unary()?);
				},
				Some(token) if token.starts_operand() => items.push(self.parse_unary()?),
				_ => break,
			}
		}

		Ok(if items.len() == 1 { items.remove(0) } else { KeywordExpr::And(items) })
	}

	fn parse_unary(&mut self) -> Result<KeywordExpr> {
		match self.next() {
			Some(Token::Not) => {
				self.descend()?;

				let inner = self.parse_unary()?;

				self.depth -= 1;

				Ok(KeywordExpr::Not(Box::new(inner)))
			},
			Some(Token::Open) => {
				self.descend()?;

				let inner = self.parse_or()?;

				self.depth -= 1;

				match self.next() {
					Some(Token::Close) => Ok(inner),
					_ => Err(syntax("missing ')'")),
				}
			},
			Some(Token::Word(word)) => Ok(KeywordExpr::Term(word)),
			Some(token) => Err(syntax(format!("expected a term, found {}", token.describe()))),
			None => Err(syntax("expression ends with an operator")),
		}
	}
}
