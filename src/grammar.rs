use crate::atn::Atn;
use crate::atn::GrammarKind;
use crate::atn::StateKind;
use crate::atn::Transition;
use crate::interval::IntervalSet;
use crate::pattern::Pattern;
use crate::pattern::PatternError;
use crate::token::TOKEN_MIN_USER;

/// A lexer grammar assembled programmatically: rules grouped into modes,
/// compiled into the same automaton shape the serialized form carries.
/// This is the interpreted-lexer surface; generated lexers ship the
/// equivalent automaton as a serialized blob instead.
#[derive(Debug)]
pub struct LexerGrammar {
	rules: Vec<RuleSpec>,
	modes: Vec<String>,
	current_mode: usize,
}

#[derive(Debug)]
pub struct RuleSpec {
	pub name: String,
	pub mode: usize,
	pub token_type: i32,
	pattern: Pattern,
	action: Option<usize>,
	pred: Option<usize>,
}

impl RuleSpec {
	/// Attach an accept-time action index (dispatched to the host).
	pub fn action(&mut self, index: usize) -> &mut Self {
		self.action = Some(index);
		self
	}

	/// Gate the whole rule behind a semantic predicate index.
	pub fn predicate(&mut self, index: usize) -> &mut Self {
		self.pred = Some(index);
		self
	}
}

impl Default for LexerGrammar {
	fn default() -> Self {
		Self::new()
	}
}

impl LexerGrammar {
	pub fn new() -> Self {
		Self {
			rules: Vec::new(),
			modes: vec!["DEFAULT_MODE".to_owned()],
			current_mode: 0,
		}
	}

	/// Open a new mode; rules added afterwards belong to it, matching
	/// the declaration order of a grammar file.
	pub fn begin_mode(&mut self, name: &str) -> usize {
		let mode: usize = self.modes.len();
		self.modes.push(name.to_owned());
		self.current_mode = mode;
		mode
	}

	/// Add a rule to the current mode. Token types are assigned in rule
	/// order, starting at [`TOKEN_MIN_USER`].
	pub fn rule(&mut self, name: &str, pattern: &str) -> Result<&mut RuleSpec, PatternError> {
		let pattern: Pattern = Pattern::from_text(pattern)?;
		let token_type: i32 = TOKEN_MIN_USER + self.rules.len() as i32;
		self.rules.push(RuleSpec {
			name: name.to_owned(),
			mode: self.current_mode,
			token_type,
			pattern,
			action: None,
			pred: None,
		});
		Ok(self.rules.last_mut().unwrap())
	}

	pub fn rules(&self) -> &[RuleSpec] {
		&self.rules[..]
	}

	pub fn modes(&self) -> &[String] {
		&self.modes[..]
	}

	pub fn build(&self) -> Atn {
		assert!(!self.rules.is_empty(), "a lexer grammar needs at least one rule");

		let mut atn: Atn = Atn::new(GrammarKind::Lexer, TOKEN_MIN_USER + self.rules.len() as i32 - 1);

		for (rule, spec) in self.rules.iter().enumerate() {
			let start: usize = atn.add_state(StateKind::RuleStart, Some(rule));
			let stop: usize = atn.add_state(StateKind::RuleStop, Some(rule));
			atn.rule_to_start_state.push(start);
			atn.rule_to_stop_state.push(stop);
			atn.rule_to_token_type.push(spec.token_type);
			atn.rule_to_action_index.push(spec.action);
		}

		for mode in 0..self.modes.len() {
			let mode_start: usize = atn.add_state(StateKind::TokenStart, None);
			atn.mode_to_start_state.push(mode_start);
			atn.add_decision(mode_start);
			for (rule, spec) in self.rules.iter().enumerate() {
				if spec.mode == mode {
					atn.add_transition(
						mode_start,
						Transition::Epsilon {
							target: atn.rule_to_start_state[rule],
						},
					);
				}
			}
		}

		for (rule, spec) in self.rules.iter().enumerate() {
			self.compile_rule(&mut atn, rule, spec);
		}

		atn
	}

	fn compile_rule(&self, atn: &mut Atn, rule: usize, spec: &RuleSpec) {
		let start: usize = atn.rule_to_start_state[rule];
		let stop: usize = atn.rule_to_stop_state[rule];

		let mut current: usize = start;
		if let Some(pred) = spec.pred {
			let after: usize = atn.add_state(StateKind::Basic, Some(rule));
			atn.add_transition(
				current,
				Transition::Predicate {
					target: after,
					rule,
					pred,
					ctx_dependent: false,
				},
			);
			current = after;
		}

		let body_end: usize = match spec.action {
			Some(_) => atn.add_state(StateKind::Basic, Some(rule)),
			None => stop,
		};

		compile(atn, rule, &spec.pattern, current, body_end);

		if let Some(action) = spec.action {
			atn.add_transition(
				body_end,
				Transition::Action {
					target: stop,
					rule,
					action: Some(action),
					ctx_dependent: false,
				},
			);
		}
	}
}

fn class_set(items: &[(char, char)]) -> IntervalSet<i32> {
	items
		.iter()
		.map(|&(start, end)| (u32::from(start) as i32, u32::from(end) as i32))
		.collect::<IntervalSet<i32>>()
}

fn compile(atn: &mut Atn, rule: usize, pattern: &Pattern, current: usize, target: usize) {
	match pattern {
		&Pattern::Literal(ch) => {
			atn.add_transition(
				current,
				Transition::Atom {
					target,
					label: u32::from(ch) as i32,
				},
			);
		},
		Pattern::Any => {
			atn.add_transition(current, Transition::Wildcard { target });
		},
		Pattern::Class { negated, items } => {
			let transition: Transition = match (*negated, &items[..]) {
				(false, &[(start, end)]) if start != end => Transition::Range {
					target,
					from: u32::from(start) as i32,
					to: u32::from(end) as i32,
				},
				(false, &[(at, end)]) if at == end => Transition::Atom {
					target,
					label: u32::from(at) as i32,
				},
				(false, _) => Transition::Set {
					target,
					set: class_set(items),
				},
				(true, _) => Transition::NotSet {
					target,
					set: class_set(items),
				},
			};
			atn.add_transition(current, transition);
		},
		Pattern::Sequence(items) => {
			let mut from: usize = current;
			for (i, item) in items.iter().enumerate() {
				let to: usize = if i + 1 < items.len() {
					atn.add_state(StateKind::Basic, Some(rule))
				} else {
					target
				};
				compile(atn, rule, item, from, to);
				from = to;
			}
		},
		Pattern::Alternation(branches) => {
			let block_start: usize = atn.add_state(StateKind::BlockStart, Some(rule));
			let block_end: usize = atn.add_state(StateKind::BlockEnd, Some(rule));
			atn[block_start].paired_state = Some(block_end);
			atn.add_decision(block_start);

			atn.add_transition(current, Transition::Epsilon { target: block_start });
			for branch in branches.iter() {
				let branch_start: usize = atn.add_state(StateKind::Basic, Some(rule));
				atn.add_transition(block_start, Transition::Epsilon { target: branch_start });
				compile(atn, rule, branch, branch_start, block_end);
			}
			atn.add_transition(block_end, Transition::Epsilon { target });
		},
		Pattern::Star { greedy, item } => {
			let entry: usize = atn.add_state(StateKind::StarLoopEntry, Some(rule));
			let block_start: usize = atn.add_state(StateKind::StarBlockStart, Some(rule));
			let block_end: usize = atn.add_state(StateKind::BlockEnd, Some(rule));
			let loop_back: usize = atn.add_state(StateKind::StarLoopBack, Some(rule));
			let loop_end: usize = atn.add_state(StateKind::LoopEnd, Some(rule));
			atn[block_start].paired_state = Some(block_end);
			atn[loop_end].paired_state = Some(loop_back);
			atn[entry].non_greedy = !greedy;
			atn.add_decision(entry);

			atn.add_transition(current, Transition::Epsilon { target: entry });
			// a non-greedy loop prefers the exit alternative
			if *greedy {
				atn.add_transition(entry, Transition::Epsilon { target: block_start });
				atn.add_transition(entry, Transition::Epsilon { target: loop_end });
			} else {
				atn.add_transition(entry, Transition::Epsilon { target: loop_end });
				atn.add_transition(entry, Transition::Epsilon { target: block_start });
			}
			compile(atn, rule, item, block_start, block_end);
			atn.add_transition(block_end, Transition::Epsilon { target: loop_back });
			atn.add_transition(loop_back, Transition::Epsilon { target: entry });
			atn.add_transition(loop_end, Transition::Epsilon { target });
		},
		Pattern::Plus { greedy, item } => {
			let block_start: usize = atn.add_state(StateKind::PlusBlockStart, Some(rule));
			let block_end: usize = atn.add_state(StateKind::BlockEnd, Some(rule));
			let loop_back: usize = atn.add_state(StateKind::PlusLoopBack, Some(rule));
			let loop_end: usize = atn.add_state(StateKind::LoopEnd, Some(rule));
			atn[block_start].paired_state = Some(block_end);
			atn[loop_end].paired_state = Some(loop_back);
			atn[loop_back].non_greedy = !greedy;
			atn.add_decision(loop_back);

			atn.add_transition(current, Transition::Epsilon { target: block_start });
			compile(atn, rule, item, block_start, block_end);
			atn.add_transition(block_end, Transition::Epsilon { target: loop_back });
			if *greedy {
				atn.add_transition(loop_back, Transition::Epsilon { target: block_start });
				atn.add_transition(loop_back, Transition::Epsilon { target: loop_end });
			} else {
				atn.add_transition(loop_back, Transition::Epsilon { target: loop_end });
				atn.add_transition(loop_back, Transition::Epsilon { target: block_start });
			}
			atn.add_transition(loop_end, Transition::Epsilon { target });
		},
		Pattern::Optional { greedy, item } => {
			let block_start: usize = atn.add_state(StateKind::BlockStart, Some(rule));
			let block_end: usize = atn.add_state(StateKind::BlockEnd, Some(rule));
			atn[block_start].paired_state = Some(block_end);
			atn[block_start].non_greedy = !greedy;
			atn.add_decision(block_start);

			atn.add_transition(current, Transition::Epsilon { target: block_start });
			let body_start: usize = atn.add_state(StateKind::Basic, Some(rule));
			if *greedy {
				atn.add_transition(block_start, Transition::Epsilon { target: body_start });
				atn.add_transition(block_start, Transition::Epsilon { target: block_end });
			} else {
				atn.add_transition(block_start, Transition::Epsilon { target: block_end });
				atn.add_transition(block_start, Transition::Epsilon { target: body_start });
			}
			compile(atn, rule, item, body_start, block_end);
			atn.add_transition(block_end, Transition::Epsilon { target });
		},
	}
}
