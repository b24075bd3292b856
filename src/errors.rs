use crate::config::AtnConfig;
use crate::interval::IntervalSet;

/// Invoked synchronously at the point a recognition error is detected.
pub trait SyntaxErrorListener {
	fn syntax_error(&mut self, line: usize, column: usize, message: &str);
}

/// The scanner found no rule that matches at `start_index`: the reach set
/// went empty before any accept state was recorded. Recoverable — skip a
/// character and rescan.
#[derive(Debug, Clone)]
pub struct LexerNoViableAlt {
	pub start_index: usize,
	pub mode: usize,
	/// The configurations alive when the reach went empty.
	pub dead_end: Vec<AtnConfig>,
}

impl std::fmt::Display for LexerNoViableAlt {
	fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		fmt.write_fmt(format_args!(
			"no viable token alternative at input index {} (mode {})",
			self.start_index, self.mode
		))
	}
}

impl std::error::Error for LexerNoViableAlt {}

/// Parser-side recognition failures. The engine reports these to the
/// caller and the listener; recovery policy belongs to the parser driver.
#[derive(Debug, Clone)]
pub enum RecognitionError {
	/// Adaptive prediction exhausted every alternative.
	NoViableAlt {
		decision: usize,
		start_index: usize,
		offending_index: usize,
	},
	/// The parser driver saw a token the current rule cannot accept.
	InputMismatch {
		offending_index: usize,
		expecting: IntervalSet<i32>,
	},
	/// A gating semantic predicate evaluated false in the rule body.
	FailedPredicate {
		rule: usize,
		pred: usize,
	},
}

impl std::fmt::Display for RecognitionError {
	fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::NoViableAlt {
				decision,
				start_index,
				offending_index,
			} => fmt.write_fmt(format_args!(
				"no viable alternative for decision {decision} over tokens {start_index}..={offending_index}"
			)),
			Self::InputMismatch {
				offending_index,
				expecting,
			} => fmt.write_fmt(format_args!(
				"mismatched input at token {offending_index}, expecting one of {} symbol(s)",
				expecting.size()
			)),
			Self::FailedPredicate { rule, pred } => {
				fmt.write_fmt(format_args!("predicate {pred} of rule {rule} failed"))
			},
		}
	}
}

impl std::error::Error for RecognitionError {}
