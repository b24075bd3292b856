use fxhash::FxHashMap;

use crate::atn::Atn;
use crate::atn::AtnState;
use crate::atn::GrammarKind;
use crate::atn::StateKind;
use crate::atn::Transition;
use crate::interval::IntervalSet;
use crate::token::EOF;

/// Format revision carried in word 0 (never adjusted).
pub const SERIALIZED_VERSION: u16 = 3;

/// Format identity, as eight 16-bit words following the version.
pub const SERIALIZED_UUID: [u16; 8] = [
	0x3376, 0x1B2D, 0x78BB, 0x4A43, 0x8B0B, 0x4F5B, 0xEE8A, 0xACF3,
];

/// Word value standing in for "none"/-1 in rule and action tables.
const NONE_WORD: u32 = 0xFFFF;

const INVALID_STATE_KIND: u16 = 0;

#[derive(Debug, Clone)]
pub struct SerialError {
	/// Word offset the problem was noticed at.
	pub at: usize,
	pub kind: SerialErrorKind,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SerialErrorKind {
	TruncatedData,
	VersionMismatch { found: u16 },
	UuidMismatch,
	/// A value that cannot survive the 16-bit adjustment round trip.
	WordOutOfRange { value: u32 },
	UnknownStateKind { code: u16 },
	UnknownEdgeKind { code: u16 },
	StateOutOfRange { number: usize },
}

impl std::fmt::Display for SerialError {
	fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		fmt.write_fmt(format_args!("malformed serialized automaton at word {}: {:?}", self.at, self.kind))
	}
}

impl std::error::Error for SerialError {}

/// Serialize to the 16-bit word format. Every word from index 1 on is
/// written as `(value + 2) & 0xFFFF`, so the stream never contains the
/// words 2 and 3 as raw 0/1 control values; the reader reverses with a
/// wrapping subtract, making the adjustment a bijection.
pub fn serialize(atn: &Atn) -> Result<Vec<u16>, SerialError> {
	let mut words: Vec<u32> = Vec::new();
	words.push(u32::from(SERIALIZED_VERSION));
	words.extend(SERIALIZED_UUID.iter().map(|&word| u32::from(word)));

	words.push(match atn.kind {
		GrammarKind::Lexer => 0,
		GrammarKind::Parser => 1,
	});
	words.push(atn.max_token_type as u32);

	/// Dump states; collect label sets and count edges along the way.
	let mut non_greedy_states: Vec<usize> = Vec::new();
	let mut precedence_states: Vec<usize> = Vec::new();
	let mut sets: Vec<IntervalSet<i32>> = Vec::new();
	let mut set_indices: FxHashMap<IntervalSet<i32>, usize> = FxHashMap::default();
	let mut nedges: usize = 0;

	words.push(atn.states.len() as u32);
	for maybe_state in atn.states.iter() {
		let Some(state) = maybe_state else {
			// optimized away; keep the numbering
			words.push(u32::from(INVALID_STATE_KIND));
			continue;
		};

		if state.kind.is_decision() && state.non_greedy {
			non_greedy_states.push(state.number);
		}
		if state.kind == StateKind::RuleStart && state.precedence_rule {
			precedence_states.push(state.number);
		}

		words.push(u32::from(state.kind.code()));
		words.push(state.rule.map_or(NONE_WORD, |rule| rule as u32));

		match state.kind {
			StateKind::LoopEnd
			| StateKind::BlockStart
			| StateKind::PlusBlockStart
			| StateKind::StarBlockStart => {
				let paired: usize = state
					.paired_state
					.expect("loop-end and block-start states carry a paired state");
				words.push(paired as u32);
			},
			_ => {},
		}

		if state.kind != StateKind::RuleStop {
			// the reader re-derives rule-stop edges from the call sites
			nedges += state.transitions.len();
		}

		for transition in state.transitions.iter() {
			if let Transition::Set { set, .. } | Transition::NotSet { set, .. } = transition {
				if !set_indices.contains_key(set) {
					set_indices.insert(set.clone(), sets.len());
					sets.push(set.clone());
				}
			}
		}
	}

	words.push(non_greedy_states.len() as u32);
	for &state in non_greedy_states.iter() {
		words.push(state as u32);
	}
	words.push(precedence_states.len() as u32);
	for &state in precedence_states.iter() {
		words.push(state as u32);
	}

	words.push(atn.rule_to_start_state.len() as u32);
	for rule in 0..atn.rule_to_start_state.len() {
		words.push(atn.rule_to_start_state[rule] as u32);
		if atn.kind == GrammarKind::Lexer {
			let token_type: i32 = atn.rule_to_token_type[rule];
			words.push(if token_type == EOF { NONE_WORD } else { token_type as u32 });
			words.push(atn.rule_to_action_index[rule].map_or(NONE_WORD, |action| action as u32));
		}
	}

	words.push(atn.mode_to_start_state.len() as u32);
	for &mode_start in atn.mode_to_start_state.iter() {
		words.push(mode_start as u32);
	}

	words.push(sets.len() as u32);
	for set in sets.iter() {
		let contains_eof: bool = set.contains(EOF);
		let folds_whole_interval: bool =
			contains_eof && set.iter().next().is_some_and(|interval| interval.end() == EOF);
		words.push((set.len() - usize::from(folds_whole_interval)) as u32);
		words.push(u32::from(contains_eof));
		for interval in set.iter() {
			if interval.start() == EOF {
				if interval.end() == EOF {
					continue;
				}
				// the EOF point lives in the contains-eof flag
				words.push(0);
			} else {
				words.push(interval.start() as u32);
			}
			words.push(interval.end() as u32);
		}
	}

	words.push(nedges as u32);
	for maybe_state in atn.states.iter() {
		let Some(state) = maybe_state else {
			continue;
		};
		if state.kind == StateKind::RuleStop {
			continue;
		}
		for transition in state.transitions.iter() {
			words.extend(encode_edge(atn, state, transition, &set_indices));
		}
	}

	words.push(atn.decision_to_state.len() as u32);
	for &decision_state in atn.decision_to_state.iter() {
		words.push(decision_state as u32);
	}

	/// Validate and adjust; word 0 (the version) stays literal.
	let mut out: Vec<u16> = Vec::with_capacity(words.len());
	for (at, &value) in words.iter().enumerate() {
		if value > 0xFFFF {
			return Err(SerialError {
				at,
				kind: SerialErrorKind::WordOutOfRange { value },
			});
		}
		if at == 0 {
			out.push(value as u16);
		} else {
			out.push(((value + 2) & 0xFFFF) as u16);
		}
	}
	Ok(out)
}

fn encode_edge(
	atn: &Atn,
	from: &AtnState,
	transition: &Transition,
	set_indices: &FxHashMap<IntervalSet<i32>, usize>,
) -> [u32; 6] {
	let src: u32 = from.number as u32;
	let mut trg: u32 = transition.target() as u32;
	assert!(
		atn.states[transition.target()].is_some(),
		"cannot serialize a transition to a removed state"
	);
	let code: u32 = u32::from(transition.code());
	let mut arg1: u32 = 0;
	let mut arg2: u32 = 0;
	let mut arg3: u32 = 0;

	match transition {
		Transition::Rule {
			target,
			rule,
			precedence,
			follow,
		} => {
			trg = *follow as u32;
			arg1 = *target as u32;
			arg2 = *rule as u32;
			arg3 = *precedence as u32;
		},
		Transition::Precedence { precedence, .. } => {
			arg1 = *precedence as u32;
		},
		Transition::Predicate {
			rule, pred, ctx_dependent, ..
		} => {
			arg1 = *rule as u32;
			arg2 = *pred as u32;
			arg3 = u32::from(*ctx_dependent);
		},
		Transition::Range { from, to, .. } => {
			if *from == EOF {
				arg1 = 0;
				arg3 = 1;
			} else {
				arg1 = *from as u32;
			}
			arg2 = *to as u32;
		},
		Transition::Atom { label, .. } => {
			if *label == EOF {
				arg1 = 0;
				arg3 = 1;
			} else {
				arg1 = *label as u32;
			}
		},
		Transition::Action {
			rule, action, ctx_dependent, ..
		} => {
			arg1 = *rule as u32;
			arg2 = action.map_or(NONE_WORD, |action| action as u32);
			arg3 = u32::from(*ctx_dependent);
		},
		Transition::Set { set, .. } | Transition::NotSet { set, .. } => {
			arg1 = set_indices[set] as u32;
		},
		Transition::Epsilon { .. } | Transition::Wildcard { .. } => {},
	}

	[src, trg, code, arg1, arg2, arg3]
}

struct WordReader {
	words: Vec<u16>,
	at: usize,
}

impl WordReader {
	fn next(&mut self) -> Result<u16, SerialError> {
		let word: u16 = *self.words.get(self.at).ok_or(SerialError {
			at: self.at,
			kind: SerialErrorKind::TruncatedData,
		})?;
		self.at += 1;
		Ok(word)
	}

	fn next_usize(&mut self) -> Result<usize, SerialError> {
		Ok(usize::from(self.next()?))
	}

	fn next_opt(&mut self) -> Result<Option<usize>, SerialError> {
		let word: u16 = self.next()?;
		Ok(if u32::from(word) == NONE_WORD {
			None
		} else {
			Some(usize::from(word))
		})
	}
}

/// Decode a serialized automaton. The inverse of [`serialize`], plus the
/// derivations the writer omits: rule stop tables and the return edges
/// out of every rule stop state.
pub fn deserialize(data: &[u16]) -> Result<Atn, SerialError> {
	if data.len() < 10 {
		return Err(SerialError {
			at: data.len(),
			kind: SerialErrorKind::TruncatedData,
		});
	}

	/// Reverse the write adjustment on everything after the version.
	let mut words: Vec<u16> = Vec::with_capacity(data.len());
	words.push(data[0]);
	words.extend(data[1..].iter().map(|word| word.wrapping_sub(2)));
	let mut reader: WordReader = WordReader { words, at: 0 };

	let version: u16 = reader.next()?;
	if version != SERIALIZED_VERSION {
		return Err(SerialError {
			at: 0,
			kind: SerialErrorKind::VersionMismatch { found: version },
		});
	}
	for &expected in SERIALIZED_UUID.iter() {
		if reader.next()? != expected {
			return Err(SerialError {
				at: reader.at - 1,
				kind: SerialErrorKind::UuidMismatch,
			});
		}
	}

	let kind: GrammarKind = match reader.next()? {
		0 => GrammarKind::Lexer,
		_ => GrammarKind::Parser,
	};
	let max_token_type: i32 = i32::from(reader.next()?);
	let mut atn: Atn = Atn::new(kind, max_token_type);

	let nstates: usize = reader.next_usize()?;
	for number in 0..nstates {
		let code: u16 = reader.next()?;
		if code == INVALID_STATE_KIND {
			atn.states.push(None);
			continue;
		}
		let state_kind: StateKind = StateKind::from_code(code).ok_or(SerialError {
			at: reader.at - 1,
			kind: SerialErrorKind::UnknownStateKind { code },
		})?;
		let rule: Option<usize> = reader.next_opt()?;
		let mut state: AtnState = AtnState::new(number, state_kind, rule);
		match state_kind {
			StateKind::LoopEnd
			| StateKind::BlockStart
			| StateKind::PlusBlockStart
			| StateKind::StarBlockStart => {
				let paired: usize = reader.next_usize()?;
				if paired >= nstates {
					return Err(SerialError {
						at: reader.at - 1,
						kind: SerialErrorKind::StateOutOfRange { number: paired },
					});
				}
				state.paired_state = Some(paired);
			},
			_ => {},
		}
		atn.states.push(Some(state));
	}

	let n_non_greedy: usize = reader.next_usize()?;
	for _ in 0..n_non_greedy {
		let number: usize = reader.next_usize()?;
		atn[number].non_greedy = true;
	}
	let n_precedence: usize = reader.next_usize()?;
	for _ in 0..n_precedence {
		let number: usize = reader.next_usize()?;
		atn[number].precedence_rule = true;
	}

	let nrules: usize = reader.next_usize()?;
	for _ in 0..nrules {
		let start: usize = reader.next_usize()?;
		atn.rule_to_start_state.push(start);
		if kind == GrammarKind::Lexer {
			let token_word: u16 = reader.next()?;
			atn.rule_to_token_type.push(if u32::from(token_word) == NONE_WORD {
				EOF
			} else {
				i32::from(token_word)
			});
			atn.rule_to_action_index.push(reader.next_opt()?);
		}
	}

	// The stop table is derivable: every rule stop state names its rule.
	atn.rule_to_stop_state = vec![0; nrules];
	for state in atn.states.iter().flatten() {
		if state.kind == StateKind::RuleStop {
			let rule: usize = state.rule.expect("rule stop without a rule");
			atn.rule_to_stop_state[rule] = state.number;
		}
	}

	let nmodes: usize = reader.next_usize()?;
	for _ in 0..nmodes {
		atn.mode_to_start_state.push(reader.next_usize()?);
	}

	let nsets: usize = reader.next_usize()?;
	let mut sets: Vec<IntervalSet<i32>> = Vec::with_capacity(nsets);
	for _ in 0..nsets {
		let nintervals: usize = reader.next_usize()?;
		let contains_eof: bool = reader.next()? != 0;
		let mut set: IntervalSet<i32> = IntervalSet::new();
		if contains_eof {
			set.add_one(EOF);
		}
		for _ in 0..nintervals {
			let start: i32 = i32::from(reader.next()?);
			let end: i32 = i32::from(reader.next()?);
			set.add(start, end);
		}
		sets.push(set);
	}

	let nedges: usize = reader.next_usize()?;
	for _ in 0..nedges {
		let src: usize = reader.next_usize()?;
		let trg: usize = reader.next_usize()?;
		let code: u16 = reader.next()?;
		let arg1: u16 = reader.next()?;
		let arg2: u16 = reader.next()?;
		let arg3: u16 = reader.next()?;
		if src >= atn.states.len() || trg >= atn.states.len() {
			return Err(SerialError {
				at: reader.at,
				kind: SerialErrorKind::StateOutOfRange { number: src.max(trg) },
			});
		}
		let transition: Transition =
			decode_edge(code, trg, arg1, arg2, arg3, &sets).ok_or(SerialError {
				at: reader.at,
				kind: SerialErrorKind::UnknownEdgeKind { code },
			})?;
		atn.add_transition(src, transition);
	}

	/// Re-derive the return edges the writer dropped: every call site's
	/// rule stop jumps to the follow state recorded on the call.
	let mut follow_edges: Vec<(usize, usize)> = Vec::new();
	for state in atn.states.iter().flatten() {
		for transition in state.transitions.iter() {
			if let Transition::Rule { rule, follow, .. } = transition {
				follow_edges.push((atn.rule_to_stop_state[*rule], *follow));
			}
		}
	}
	for (stop, follow) in follow_edges.into_iter() {
		atn.add_transition(stop, Transition::Epsilon { target: follow });
	}

	let ndecisions: usize = reader.next_usize()?;
	for _ in 0..ndecisions {
		let number: usize = reader.next_usize()?;
		atn.decision_to_state.push(number);
	}

	Ok(atn)
}

fn decode_edge(
	code: u16,
	trg: usize,
	arg1: u16,
	arg2: u16,
	arg3: u16,
	sets: &[IntervalSet<i32>],
) -> Option<Transition> {
	Some(match code {
		1 => Transition::Epsilon { target: trg },
		2 => Transition::Range {
			target: trg,
			from: if arg3 != 0 && arg1 == 0 { EOF } else { i32::from(arg1) },
			to: i32::from(arg2),
		},
		3 => Transition::Rule {
			target: usize::from(arg1),
			rule: usize::from(arg2),
			precedence: usize::from(arg3),
			follow: trg,
		},
		4 => Transition::Predicate {
			target: trg,
			rule: usize::from(arg1),
			pred: usize::from(arg2),
			ctx_dependent: arg3 != 0,
		},
		5 => Transition::Atom {
			target: trg,
			label: if arg3 != 0 && arg1 == 0 { EOF } else { i32::from(arg1) },
		},
		6 => Transition::Action {
			target: trg,
			rule: usize::from(arg1),
			action: if u32::from(arg2) == NONE_WORD {
				None
			} else {
				Some(usize::from(arg2))
			},
			ctx_dependent: arg3 != 0,
		},
		7 => Transition::Set {
			target: trg,
			set: sets.get(usize::from(arg1))?.clone(),
		},
		8 => Transition::NotSet {
			target: trg,
			set: sets.get(usize::from(arg1))?.clone(),
		},
		9 => Transition::Wildcard { target: trg },
		10 => Transition::Precedence {
			target: trg,
			precedence: usize::from(arg1),
		},
		_ => return None,
	})
}
