use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::RwLock;

use fxhash::FxHashMap;

use crate::config::FrozenConfigSet;
use crate::semantics::SemanticContext;

/// Edge sentinel: "this symbol definitively fails from here". Doubles as
/// the process-wide ERROR state; no real state ever gets this number.
pub const ERROR_TARGET: usize = usize::MAX;

/// Lexer DFAs index edges for this code-point range only; anything
/// outside goes back through the ATN each time.
pub const MIN_DFA_EDGE: i32 = 0;
pub const MAX_DFA_EDGE: i32 = 127;

/// A predicate the parser must evaluate before committing to `alt`.
#[derive(Debug, Clone)]
pub struct PredictedAlt {
	pub semantic: Arc<SemanticContext>,
	pub alt: usize,
}

/// One memoized prediction state: a frozen config set plus the verdict
/// derived from it. Identity (hash/equality) is the config set alone.
///
/// Edge slots are publish-once: empty until some simulator computes the
/// target, then fixed forever. Readers never lock.
#[derive(Debug)]
pub struct DfaState {
	pub number: usize,
	pub configs: Arc<FrozenConfigSet>,
	edges: Box<[OnceLock<usize>]>,
	pub accept: bool,
	/// Lexer: emitted token type. Parser: predicted alternative.
	pub prediction: i32,
	pub lexer_rule: Option<usize>,
	pub lexer_action: Option<usize>,
	pub requires_full_context: bool,
	pub predicates: Option<Vec<PredictedAlt>>,
}

impl DfaState {
	fn new(configs: Arc<FrozenConfigSet>, edge_span: usize) -> Self {
		Self {
			number: usize::MAX,
			configs,
			edges: (0..edge_span).map(|_| OnceLock::new()).collect::<Box<[_]>>(),
			accept: false,
			prediction: 0,
			lexer_rule: None,
			lexer_action: None,
			requires_full_context: false,
			predicates: None,
		}
	}

	pub fn edge(&self, offset: usize) -> Option<usize> {
		self.edges.get(offset).and_then(|slot| slot.get().copied())
	}
}

#[derive(Debug, Default)]
struct DfaTable {
	states: Vec<Arc<DfaState>>,
	intern: FxHashMap<Arc<FrozenConfigSet>, usize>,
}

/// The per-decision (or per-lexer-mode) cache of prediction results.
/// Shared by reference between simulator instances; growth is guarded by
/// the table lock, reads of published states and edges are not.
#[derive(Debug)]
pub struct Dfa {
	pub decision: usize,
	pub atn_start_state: usize,
	/// Symbol value of edge slot 0.
	edge_base: i32,
	edge_span: usize,
	table: RwLock<DfaTable>,
	s0: OnceLock<usize>,
	/// Left-recursive decisions key their entry state by precedence.
	precedence: bool,
	precedence_s0: Mutex<FxHashMap<usize, usize>>,
}

impl Dfa {
	/// A lexer-mode DFA: edges cover the 7-bit code points.
	pub fn for_mode(mode: usize, mode_start_state: usize) -> Self {
		Self::build(
			mode,
			mode_start_state,
			MIN_DFA_EDGE,
			(MAX_DFA_EDGE - MIN_DFA_EDGE + 1) as usize,
			false,
		)
	}

	/// A parser-decision DFA: edge slot 0 is EOF, then the token types.
	pub fn for_decision(
		decision: usize,
		decision_state: usize,
		max_token_type: i32,
		precedence: bool,
	) -> Self {
		Self::build(decision, decision_state, -1, (max_token_type + 2) as usize, precedence)
	}

	fn build(
		decision: usize,
		atn_start_state: usize,
		edge_base: i32,
		edge_span: usize,
		precedence: bool,
	) -> Self {
		Self {
			decision,
			atn_start_state,
			edge_base,
			edge_span,
			table: RwLock::new(DfaTable::default()),
			s0: OnceLock::new(),
			precedence,
			precedence_s0: Mutex::new(FxHashMap::default()),
		}
	}

	pub fn is_precedence_dfa(&self) -> bool {
		self.precedence
	}

	pub fn len(&self) -> usize {
		self.table.read().unwrap().states.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn state(&self, number: usize) -> Arc<DfaState> {
		self.table.read().unwrap().states[number].clone()
	}

	/// Intern a candidate state. If an equal config set is already
	/// present the candidate is discarded and the published state wins;
	/// the caller must finish populating every field in `populate`.
	pub fn add_state(
		&self,
		configs: Arc<FrozenConfigSet>,
		populate: impl FnOnce(&mut DfaState),
	) -> Arc<DfaState> {
		let mut table = self.table.write().unwrap();
		if let Some(&number) = table.intern.get(&configs) {
			return table.states[number].clone();
		}
		let mut state: DfaState = DfaState::new(configs.clone(), self.edge_span);
		state.number = table.states.len();
		populate(&mut state);
		let state: Arc<DfaState> = Arc::new(state);
		table.intern.insert(configs, state.number);
		table.states.push(state.clone());
		state
	}

	fn edge_offset(&self, symbol: i32) -> Option<usize> {
		let offset: i32 = symbol - self.edge_base;
		if (0..self.edge_span as i32).contains(&offset) {
			Some(offset as usize)
		} else {
			None
		}
	}

	/// The memoized target for `symbol`, if one was ever published.
	/// `Some(ERROR_TARGET)` means "known dead end".
	pub fn edge(&self, from: &DfaState, symbol: i32) -> Option<usize> {
		self.edge_offset(symbol).and_then(|offset| from.edge(offset))
	}

	/// Publish an edge. The first writer wins and a populated edge never
	/// changes target; concurrent recomputations of the same edge arrive
	/// at an equal interned state anyway.
	pub fn set_edge(&self, from: &DfaState, symbol: i32, target: usize) {
		if let Some(offset) = self.edge_offset(symbol) {
			let _ = from.edges[offset].set(target);
		}
	}

	pub fn s0(&self) -> Option<Arc<DfaState>> {
		self.s0.get().map(|&number| self.state(number))
	}

	pub fn set_s0(&self, state: &Arc<DfaState>) {
		let _ = self.s0.set(state.number);
	}

	pub fn precedence_s0(&self, precedence: usize) -> Option<Arc<DfaState>> {
		assert!(self.precedence, "precedence start state on a plain DFA");
		let map = self.precedence_s0.lock().unwrap();
		map.get(&precedence).map(|&number| self.state(number))
	}

	pub fn set_precedence_s0(&self, precedence: usize, state: &Arc<DfaState>) {
		assert!(self.precedence, "precedence start state on a plain DFA");
		let mut map = self.precedence_s0.lock().unwrap();
		map.entry(precedence).or_insert(state.number);
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::AtnConfig;
	use crate::config::ConfigSet;
	use crate::context::MergeCache;
	use crate::context::PredictionContext;

	fn frozen(states: &[usize]) -> Arc<FrozenConfigSet> {
		let mut cache: MergeCache = MergeCache::new();
		let mut set: ConfigSet = ConfigSet::ordered();
		for &state in states.iter() {
			set.add(AtnConfig::new(state, 1, PredictionContext::empty()), &mut cache);
		}
		Arc::new(set.freeze())
	}

	#[test]
	fn interning_discards_duplicates() {
		let dfa: Dfa = Dfa::for_mode(0, 0);
		let first: Arc<DfaState> = dfa.add_state(frozen(&[1, 2]), |_| ());
		let duplicate: Arc<DfaState> = dfa.add_state(frozen(&[1, 2]), |state| {
			// never runs: the equal state is already interned
			state.accept = true;
		});
		assert!(Arc::ptr_eq(&first, &duplicate));
		assert!(!duplicate.accept);
		assert_eq!(dfa.len(), 1);

		let other: Arc<DfaState> = dfa.add_state(frozen(&[3]), |_| ());
		assert_eq!(other.number, 1);
		assert_eq!(dfa.len(), 2);
	}

	#[test]
	fn edges_publish_once() {
		let dfa: Dfa = Dfa::for_mode(0, 0);
		let state: Arc<DfaState> = dfa.add_state(frozen(&[1]), |_| ());

		assert_eq!(dfa.edge(&state, 97), None);
		dfa.set_edge(&state, 97, 7);
		assert_eq!(dfa.edge(&state, 97), Some(7));
		// a second publication cannot repoint the edge
		dfa.set_edge(&state, 97, 9);
		assert_eq!(dfa.edge(&state, 97), Some(7));

		dfa.set_edge(&state, 98, ERROR_TARGET);
		assert_eq!(dfa.edge(&state, 98), Some(ERROR_TARGET));

		// outside the indexed range nothing is recorded
		dfa.set_edge(&state, 0x2603, 7);
		assert_eq!(dfa.edge(&state, 0x2603), None);
	}

	#[test]
	fn precedence_start_states() {
		let dfa: Dfa = Dfa::for_decision(0, 5, 10, true);
		assert!(dfa.precedence_s0(0).is_none());
		let s: Arc<DfaState> = dfa.add_state(frozen(&[1]), |_| ());
		dfa.set_precedence_s0(0, &s);
		assert!(Arc::ptr_eq(&dfa.precedence_s0(0).unwrap(), &s));
	}
}
