use nom::IResult;
use nom::Parser;
use nom::branch::alt;
use nom::character::complete::char as one_char;
use nom::character::complete::satisfy;
use nom::combinator::map;
use nom::error::ErrorKind as NomErrorKind;
use nom::error::ParseError;
use nom::multi::many1;
use nom::multi::separated_list1;

const SPECIAL_CHARACTERS: &str = r"\()[]*+?-.|";

/// The rule-pattern AST the grammar assembler compiles into automaton
/// states. A deliberately small language: literals, classes, `.`, the
/// three repetition operators (with `?`-suffixed non-greedy variants),
/// grouping and alternation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Pattern {
	Literal(char),
	Any,
	Class { negated: bool, items: Vec<(char, char)> },
	Sequence(Vec<Pattern>),
	Alternation(Vec<Pattern>),
	Star { greedy: bool, item: Box<Pattern> },
	Plus { greedy: bool, item: Box<Pattern> },
	Optional { greedy: bool, item: Box<Pattern> },
}

#[derive(Debug)]
pub struct PatternError {
	pub consumed: usize,
	pub kind: PatternErrorKind,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PatternErrorKind {
	/// Missing the closing delimiter for the pair.
	MissingClose(char, char),
	/// A repetition suffix with nothing to repeat, or similar.
	InvalidTerm,
	/// Invalid escape character.
	InvalidEscape,
	/// A range `a-b` with `a > b` inside a class.
	InvalidClassRange(char, char),
	/// Trailing input after a complete pattern.
	TrailingInput,
	/// An error from nom itself; kept for [`nom::error::ParseError`].
	Nom(NomErrorKind),
}

impl std::fmt::Display for PatternError {
	fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		fmt.write_fmt(format_args!(
			"invalid pattern at offset {}: {:?}",
			self.consumed, self.kind
		))
	}
}

impl std::error::Error for PatternError {}

#[derive(Debug)]
struct PatternParsingError<'a> {
	input: &'a str,
	kind: PatternErrorKind,
}

impl<'a> ParseError<&'a str> for PatternParsingError<'a> {
	fn from_error_kind(input: &'a str, nom: NomErrorKind) -> Self {
		Self {
			input,
			kind: PatternErrorKind::Nom(nom),
		}
	}

	fn append(_input: &'a str, _kind: NomErrorKind, other: Self) -> Self {
		other
	}
}

impl<'a> PatternParsingError<'a> {
	fn new(input: &'a str, kind: PatternErrorKind) -> Self {
		Self { input, kind }
	}
}

impl Pattern {
	pub fn from_text(pattern: &str) -> Result<Self, PatternError> {
		match alternation(pattern) {
			Ok(("", parsed)) => Ok(parsed),
			Ok((remaining, _)) => Err(PatternError {
				consumed: pattern.len() - remaining.len(),
				kind: PatternErrorKind::TrailingInput,
			}),
			Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(PatternError {
				consumed: pattern.len() - e.input.len(),
				kind: e.kind,
			}),
			Err(nom::Err::Incomplete(_)) => Err(PatternError {
				consumed: pattern.len(),
				kind: PatternErrorKind::InvalidTerm,
			}),
		}
	}
}

fn alternation(input: &str) -> IResult<&str, Pattern, PatternParsingError<'_>> {
	let (rest, mut branches): (&str, Vec<Pattern>) =
		separated_list1(one_char('|'), sequence).parse(input)?;
	if branches.len() == 1 {
		return Ok((rest, branches.pop().unwrap()));
	}
	Ok((rest, Pattern::Alternation(branches)))
}

fn sequence(input: &str) -> IResult<&str, Pattern, PatternParsingError<'_>> {
	let (rest, mut items): (&str, Vec<Pattern>) = many1(suffixed_term).parse(input)?;
	if items.len() == 1 {
		return Ok((rest, items.pop().unwrap()));
	}
	Ok((rest, Pattern::Sequence(items)))
}

/// A term with its repetition suffixes; each of `*` `+` `?` may itself be
/// followed by `?` to make it non-greedy.
fn suffixed_term(input: &str) -> IResult<&str, Pattern, PatternParsingError<'_>> {
	let (mut rest, mut item): (&str, Pattern) = term(input)?;
	loop {
		let mut chars = rest.chars();
		let operator: Option<char> = chars.next();
		match operator {
			Some(op @ ('*' | '+' | '?')) => {
				let mut after: &str = chars.as_str();
				let greedy: bool = !after.starts_with('?');
				if !greedy {
					after = &after['?'.len_utf8()..];
				}
				item = match op {
					'*' => Pattern::Star { greedy, item: Box::new(item) },
					'+' => Pattern::Plus { greedy, item: Box::new(item) },
					_ => Pattern::Optional { greedy, item: Box::new(item) },
				};
				rest = after;
			},
			_ => return Ok((rest, item)),
		}
	}
}

fn term(input: &str) -> IResult<&str, Pattern, PatternParsingError<'_>> {
	alt((group, class, any_char, literal)).parse(input)
}

fn group(input: &str) -> IResult<&str, Pattern, PatternParsingError<'_>> {
	let (rest, _) = one_char('(').parse(input)?;
	let (rest, inner): (&str, Pattern) = alternation(rest)?;
	let (rest, _) = one_char(')').parse(rest).map_err(|_: nom::Err<PatternParsingError<'_>>| {
		nom::Err::Failure(PatternParsingError::new(rest, PatternErrorKind::MissingClose('(', ')')))
	})?;
	Ok((rest, inner))
}

fn any_char(input: &str) -> IResult<&str, Pattern, PatternParsingError<'_>> {
	map(one_char('.'), |_| Pattern::Any).parse(input)
}

fn literal(input: &str) -> IResult<&str, Pattern, PatternParsingError<'_>> {
	map(literal_char, Pattern::Literal).parse(input)
}

fn literal_char(input: &str) -> IResult<&str, char, PatternParsingError<'_>> {
	alt((
		satisfy(|ch| !SPECIAL_CHARACTERS.contains(ch)),
		escaped_char,
	))
	.parse(input)
}

fn escaped_char(input: &str) -> IResult<&str, char, PatternParsingError<'_>> {
	let (rest, _) = one_char('\\').parse(input)?;
	let mut chars = rest.chars();
	let escaped: Option<char> = chars.next();
	let after: &str = chars.as_str();
	match escaped {
		Some('n') => Ok((after, '\n')),
		Some('r') => Ok((after, '\r')),
		Some('t') => Ok((after, '\t')),
		Some('0') => Ok((after, '\0')),
		Some(ch) if SPECIAL_CHARACTERS.contains(ch) => Ok((after, ch)),
		_ => Err(nom::Err::Failure(PatternParsingError::new(
			rest,
			PatternErrorKind::InvalidEscape,
		))),
	}
}

fn class(input: &str) -> IResult<&str, Pattern, PatternParsingError<'_>> {
	let (rest, _) = one_char('[').parse(input)?;
	let (rest, negated): (&str, bool) = match rest.strip_prefix('^') {
		Some(after) => (after, true),
		None => (rest, false),
	};
	let (rest, items): (&str, Vec<(char, char)>) = many1(class_item).parse(rest)?;
	let (rest, _) = one_char(']').parse(rest).map_err(|_: nom::Err<PatternParsingError<'_>>| {
		nom::Err::Failure(PatternParsingError::new(rest, PatternErrorKind::MissingClose('[', ']')))
	})?;
	Ok((rest, Pattern::Class { negated, items }))
}

fn class_item(input: &str) -> IResult<&str, (char, char), PatternParsingError<'_>> {
	let (rest, start): (&str, char) = class_char(input)?;
	match rest.strip_prefix('-') {
		Some(after_dash) if !after_dash.is_empty() && !after_dash.starts_with(']') => {
			let (rest, end): (&str, char) = class_char(after_dash)?;
			if start > end {
				return Err(nom::Err::Failure(PatternParsingError::new(
					input,
					PatternErrorKind::InvalidClassRange(start, end),
				)));
			}
			Ok((rest, (start, end)))
		},
		_ => Ok((rest, (start, start))),
	}
}

fn class_char(input: &str) -> IResult<&str, char, PatternParsingError<'_>> {
	alt((
		satisfy(|ch| !matches!(ch, ']' | '\\' | '-')),
		escaped_char,
	))
	.parse(input)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn literal_sequences() {
		let parsed: Pattern = Pattern::from_text("if").unwrap();
		assert_eq!(
			parsed,
			Pattern::Sequence(vec![Pattern::Literal('i'), Pattern::Literal('f')])
		);
	}

	#[test]
	fn classes_and_repetition() {
		let parsed: Pattern = Pattern::from_text("[a-z0]+").unwrap();
		assert_eq!(
			parsed,
			Pattern::Plus {
				greedy: true,
				item: Box::new(Pattern::Class {
					negated: false,
					items: vec![('a', 'z'), ('0', '0')],
				}),
			}
		);

		let parsed: Pattern = Pattern::from_text("[^\\n]").unwrap();
		assert_eq!(
			parsed,
			Pattern::Class {
				negated: true,
				items: vec![('\n', '\n')],
			}
		);
	}

	#[test]
	fn non_greedy_suffix() {
		let parsed: Pattern = Pattern::from_text(".*?").unwrap();
		assert_eq!(
			parsed,
			Pattern::Star {
				greedy: false,
				item: Box::new(Pattern::Any),
			}
		);
	}

	#[test]
	fn comment_shape() {
		// the classic block comment: '/*' .*? '*/'
		let parsed: Pattern = Pattern::from_text("/\\*.*?\\*/").unwrap();
		let Pattern::Sequence(items) = parsed else {
			panic!("expected a sequence");
		};
		assert_eq!(items.len(), 5);
		assert_eq!(items[0], Pattern::Literal('/'));
		assert_eq!(items[1], Pattern::Literal('*'));
		assert!(matches!(&items[2], Pattern::Star { greedy: false, .. }));
	}

	#[test]
	fn alternation_and_groups() {
		let parsed: Pattern = Pattern::from_text("a|(bc)|d").unwrap();
		let Pattern::Alternation(branches) = parsed else {
			panic!("expected an alternation");
		};
		assert_eq!(branches.len(), 3);
		assert_eq!(
			branches[1],
			Pattern::Sequence(vec![Pattern::Literal('b'), Pattern::Literal('c')])
		);
	}

	#[test]
	fn errors_carry_positions() {
		let error: PatternError = Pattern::from_text("(ab").unwrap_err();
		assert_eq!(error.kind, PatternErrorKind::MissingClose('(', ')'));

		let error: PatternError = Pattern::from_text("[a-").unwrap_err();
		assert_eq!(error.kind, PatternErrorKind::MissingClose('[', ']'));

		let error: PatternError = Pattern::from_text("a\\q").unwrap_err();
		assert_eq!(error.kind, PatternErrorKind::InvalidEscape);

		let error: PatternError = Pattern::from_text("[z-a]").unwrap_err();
		assert_eq!(error.kind, PatternErrorKind::InvalidClassRange('z', 'a'));
	}
}
