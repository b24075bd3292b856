use std::collections::BTreeSet;

use fxhash::FxHashSet;
use std::sync::Arc;

use crate::context::PredictionContext;
use crate::interval::IntervalSet;
use crate::token::EOF;
use crate::token::TOKEN_EPSILON;
use crate::token::TOKEN_MIN_USER;

/// Alternative number `0` means "no alternative predicted yet".
pub const INVALID_ALT: usize = 0;

pub const MIN_CHAR: i32 = 0;
pub const MAX_CHAR: i32 = 0x10FFFF;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GrammarKind {
	Lexer,
	Parser,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StateKind {
	Basic,
	RuleStart,
	BlockStart,
	PlusBlockStart,
	StarBlockStart,
	TokenStart,
	RuleStop,
	BlockEnd,
	StarLoopBack,
	StarLoopEntry,
	PlusLoopBack,
	LoopEnd,
}

impl StateKind {
	pub fn is_decision(&self) -> bool {
		matches!(
			self,
			Self::BlockStart
				| Self::PlusBlockStart
				| Self::StarBlockStart
				| Self::TokenStart
				| Self::PlusLoopBack
				| Self::StarLoopEntry
		)
	}

	pub fn code(&self) -> u16 {
		match self {
			Self::Basic => 1,
			Self::RuleStart => 2,
			Self::BlockStart => 3,
			Self::PlusBlockStart => 4,
			Self::StarBlockStart => 5,
			Self::TokenStart => 6,
			Self::RuleStop => 7,
			Self::BlockEnd => 8,
			Self::StarLoopBack => 9,
			Self::StarLoopEntry => 10,
			Self::PlusLoopBack => 11,
			Self::LoopEnd => 12,
		}
	}

	pub fn from_code(code: u16) -> Option<Self> {
		Some(match code {
			1 => Self::Basic,
			2 => Self::RuleStart,
			3 => Self::BlockStart,
			4 => Self::PlusBlockStart,
			5 => Self::StarBlockStart,
			6 => Self::TokenStart,
			7 => Self::RuleStop,
			8 => Self::BlockEnd,
			9 => Self::StarLoopBack,
			10 => Self::StarLoopEntry,
			11 => Self::PlusLoopBack,
			12 => Self::LoopEnd,
			_ => return None,
		})
	}
}

/// One automaton state. `paired_state` is the typed back-reference some
/// kinds carry: the loop-back state of a `LoopEnd`, the end state of a
/// `*BlockStart`.
#[derive(Debug, Clone)]
pub struct AtnState {
	pub number: usize,
	pub kind: StateKind,
	pub rule: Option<usize>,
	pub transitions: Vec<Transition>,
	pub paired_state: Option<usize>,
	/// Decision states only; set for the non-greedy loop variants.
	pub non_greedy: bool,
	/// Rule-start states only; marks a precedence (left-recursive) rule.
	pub precedence_rule: bool,
}

impl AtnState {
	pub fn new(number: usize, kind: StateKind, rule: Option<usize>) -> Self {
		Self {
			number,
			kind,
			rule,
			transitions: Vec::new(),
			paired_state: None,
			non_greedy: false,
			precedence_rule: false,
		}
	}

	/// A state with no transitions at all does not count; configs parked
	/// on one (rule stops in particular) must stay visible to reach.
	pub fn only_epsilon_transitions(&self) -> bool {
		!self.transitions.is_empty() && self.transitions.iter().all(Transition::is_epsilon)
	}
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Transition {
	Epsilon {
		target: usize,
	},
	Range {
		target: usize,
		from: i32,
		to: i32,
	},
	Rule {
		/// Start state of the invoked rule.
		target: usize,
		rule: usize,
		precedence: usize,
		/// Where the invoking rule resumes after the call returns.
		follow: usize,
	},
	Predicate {
		target: usize,
		rule: usize,
		pred: usize,
		ctx_dependent: bool,
	},
	Atom {
		target: usize,
		label: i32,
	},
	Action {
		target: usize,
		rule: usize,
		action: Option<usize>,
		ctx_dependent: bool,
	},
	Set {
		target: usize,
		set: IntervalSet<i32>,
	},
	NotSet {
		target: usize,
		set: IntervalSet<i32>,
	},
	Wildcard {
		target: usize,
	},
	Precedence {
		target: usize,
		precedence: usize,
	},
}

impl Transition {
	pub fn target(&self) -> usize {
		match self {
			Self::Epsilon { target }
			| Self::Range { target, .. }
			| Self::Rule { target, .. }
			| Self::Predicate { target, .. }
			| Self::Atom { target, .. }
			| Self::Action { target, .. }
			| Self::Set { target, .. }
			| Self::NotSet { target, .. }
			| Self::Wildcard { target }
			| Self::Precedence { target, .. } => *target,
		}
	}

	pub fn is_epsilon(&self) -> bool {
		matches!(
			self,
			Self::Epsilon { .. }
				| Self::Rule { .. }
				| Self::Predicate { .. }
				| Self::Action { .. }
				| Self::Precedence { .. }
		)
	}

	pub fn matches(&self, symbol: i32, min_vocab: i32, max_vocab: i32) -> bool {
		match self {
			Self::Atom { label, .. } => *label == symbol,
			Self::Range { from, to, .. } => (*from <= symbol) && (symbol <= *to),
			Self::Set { set, .. } => set.contains(symbol),
			Self::NotSet { set, .. } => {
				(min_vocab <= symbol) && (symbol <= max_vocab) && !set.contains(symbol)
			},
			Self::Wildcard { .. } => (min_vocab <= symbol) && (symbol <= max_vocab),
			_ => false,
		}
	}

	pub fn code(&self) -> u16 {
		match self {
			Self::Epsilon { .. } => 1,
			Self::Range { .. } => 2,
			Self::Rule { .. } => 3,
			Self::Predicate { .. } => 4,
			Self::Atom { .. } => 5,
			Self::Action { .. } => 6,
			Self::Set { .. } => 7,
			Self::NotSet { .. } => 8,
			Self::Wildcard { .. } => 9,
			Self::Precedence { .. } => 10,
		}
	}
}

/// The static automaton for one grammar. Built once (by the deserializer
/// or the grammar assembler), read-only afterwards, shared by every
/// simulator instance.
#[derive(Debug, Clone)]
pub struct Atn {
	/// State table; gaps (`None`) are states optimized away before
	/// serialization. All transition targets index this table.
	pub states: Vec<Option<AtnState>>,
	pub decision_to_state: Vec<usize>,
	pub rule_to_start_state: Vec<usize>,
	pub rule_to_stop_state: Vec<usize>,
	pub mode_to_start_state: Vec<usize>,
	/// Lexer grammars: token type emitted per rule.
	pub rule_to_token_type: Vec<i32>,
	/// Lexer grammars: accept-time action per rule.
	pub rule_to_action_index: Vec<Option<usize>>,
	pub kind: GrammarKind,
	pub max_token_type: i32,
}

impl Atn {
	pub fn new(kind: GrammarKind, max_token_type: i32) -> Self {
		Self {
			states: Vec::new(),
			decision_to_state: Vec::new(),
			rule_to_start_state: Vec::new(),
			rule_to_stop_state: Vec::new(),
			mode_to_start_state: Vec::new(),
			rule_to_token_type: Vec::new(),
			rule_to_action_index: Vec::new(),
			kind,
			max_token_type,
		}
	}

	pub fn add_state(&mut self, kind: StateKind, rule: Option<usize>) -> usize {
		let number: usize = self.states.len();
		self.states.push(Some(AtnState::new(number, kind, rule)));
		number
	}

	pub fn add_transition(&mut self, from: usize, transition: Transition) {
		self[from].transitions.push(transition);
	}

	/// Register a decision state, returning its decision number.
	pub fn add_decision(&mut self, state: usize) -> usize {
		assert!(self[state].kind.is_decision());
		let decision: usize = self.decision_to_state.len();
		self.decision_to_state.push(state);
		decision
	}

	pub fn decision_state(&self, decision: usize) -> usize {
		self.decision_to_state[decision]
	}

	pub fn state(&self, number: usize) -> &AtnState {
		self.states[number]
			.as_ref()
			.expect("transition into a removed state")
	}

	/// FIRST of `state` under an unknown caller: every symbol that can
	/// follow, with `TOKEN_EPSILON` standing in for "the enclosing rule
	/// may end here".
	pub fn next_tokens(&self, state: usize) -> IntervalSet<i32> {
		let mut look: IntervalSet<i32> = IntervalSet::new();
		let mut busy: FxHashSet<(usize, Option<Arc<PredictionContext>>)> = FxHashSet::default();
		let mut called: BTreeSet<usize> = BTreeSet::new();
		self.look_into(state, None, None, &mut look, &mut busy, &mut called);
		look
	}

	/// Symbols reachable from `state` given call context `ctx`; the port
	/// of the classic LL(1) LOOK walk restricted to what prediction needs.
	fn look_into(
		&self,
		state: usize,
		stop_state: Option<usize>,
		ctx: Option<Arc<PredictionContext>>,
		look: &mut IntervalSet<i32>,
		busy: &mut FxHashSet<(usize, Option<Arc<PredictionContext>>)>,
		called: &mut BTreeSet<usize>,
	) {
		if !busy.insert((state, ctx.clone())) {
			return;
		}

		let s: &AtnState = self.state(state);

		if Some(state) == stop_state || s.kind == StateKind::RuleStop {
			match &ctx {
				None => {
					look.add_one(TOKEN_EPSILON);
					return;
				},
				Some(ctx) if ctx.is_empty() => {
					look.add_one(EOF);
					return;
				},
				Some(ctx) if s.kind == StateKind::RuleStop => {
					let rule: usize = s.rule.expect("rule stop without a rule");
					let removed: bool = called.remove(&rule);
					for i in 0..ctx.size() {
						let return_state: usize = ctx.return_state(i);
						let parent: Option<Arc<PredictionContext>> = ctx.parent(i).cloned();
						self.look_into(return_state, stop_state, parent, look, busy, called);
					}
					if removed {
						called.insert(rule);
					}
					return;
				},
				Some(_) => {},
			}
		}

		for transition in s.transitions.iter() {
			match transition {
				Transition::Rule { target, rule, follow, .. } => {
					if called.contains(rule) {
						continue;
					}
					let new_ctx: Arc<PredictionContext> = PredictionContext::singleton(
						ctx.clone().unwrap_or_else(PredictionContext::empty),
						*follow,
					);
					called.insert(*rule);
					self.look_into(*target, stop_state, Some(new_ctx), look, busy, called);
					called.remove(rule);
				},
				Transition::NotSet { set, .. } => {
					let vocabulary: IntervalSet<i32> =
						IntervalSet::of(TOKEN_MIN_USER, self.max_token_type);
					*look = look.union(&set.complement(&vocabulary));
				},
				Transition::Set { set, .. } => {
					*look = look.union(set);
				},
				Transition::Atom { label, .. } => {
					look.add_one(*label);
				},
				Transition::Range { from, to, .. } => {
					look.add(*from, *to);
				},
				Transition::Wildcard { .. } => {
					look.add(TOKEN_MIN_USER, self.max_token_type);
				},
				transition if transition.is_epsilon() => {
					self.look_into(transition.target(), stop_state, ctx.clone(), look, busy, called);
				},
				_ => {},
			}
		}
	}
}

impl std::ops::Index<usize> for Atn {
	type Output = AtnState;

	fn index(&self, i: usize) -> &Self::Output {
		self.state(i)
	}
}

impl std::ops::IndexMut<usize> for Atn {
	fn index_mut(&mut self, i: usize) -> &mut Self::Output {
		self.states[i]
			.as_mut()
			.expect("transition into a removed state")
	}
}
