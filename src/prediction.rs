use std::sync::Arc;

use fxhash::FxHashMap;

use crate::atn::Atn;
use crate::atn::INVALID_ALT;
use crate::atn::StateKind;
use crate::config::AtnConfig;
use crate::context::PredictionContext;
use crate::semantics::SemanticContext;

/// How much context the predictor is allowed to consult.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PredictionMode {
	/// Local contexts only; fastest, may over-report conflicts.
	Sll,
	/// SLL first, full context on conflict. The default.
	Ll,
	/// Like [`PredictionMode::Ll`] but keeps going until the ambiguity
	/// is exact: every conflicting subset holds the same alternatives.
	LlExactAmbigDetection,
}

/// A set of alternative numbers. Alternatives are small (numbered from
/// 1 per decision), so a growable bitmap does.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct AltSet {
	words: Vec<u64>,
}

impl AltSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn of(alt: usize) -> Self {
		let mut set: Self = Self::new();
		set.insert(alt);
		set
	}

	pub fn insert(&mut self, alt: usize) {
		let word: usize = alt / 64;
		if self.words.len() <= word {
			self.words.resize(word + 1, 0);
		}
		self.words[word] |= 1 << (alt % 64);
	}

	pub fn contains(&self, alt: usize) -> bool {
		self.words
			.get(alt / 64)
			.is_some_and(|word| word & (1 << (alt % 64)) != 0)
	}

	pub fn count(&self) -> usize {
		self.words.iter().map(|word| word.count_ones() as usize).sum::<usize>()
	}

	pub fn is_empty(&self) -> bool {
		self.words.iter().all(|&word| word == 0)
	}

	/// Smallest member, or [`INVALID_ALT`] when empty.
	pub fn min(&self) -> usize {
		self.iter().next().unwrap_or(INVALID_ALT)
	}

	pub fn union_with(&mut self, other: &Self) {
		if self.words.len() < other.words.len() {
			self.words.resize(other.words.len(), 0);
		}
		for (word, &other_word) in self.words.iter_mut().zip(other.words.iter()) {
			*word |= other_word;
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
		self.words.iter().enumerate().flat_map(|(i, &word)| {
			(0..64).filter(move |bit| word & (1 << bit) != 0).map(move |bit| i * 64 + bit)
		})
	}
}

impl FromIterator<usize> for AltSet {
	fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
		let mut set: Self = Self::new();
		for alt in iter {
			set.insert(alt);
		}
		set
	}
}

pub fn alts_of(configs: &[AtnConfig]) -> AltSet {
	configs.iter().map(|config| config.alt).collect::<AltSet>()
}

/// Group configurations by `(state, context)` pair; within one pair the
/// engine cannot tell the member alternatives apart, so each group's alt
/// set is a potential conflict.
pub fn conflicting_alt_subsets(configs: &[AtnConfig]) -> Vec<AltSet> {
	let mut groups: FxHashMap<(usize, Arc<PredictionContext>), AltSet> = FxHashMap::default();
	let mut order: Vec<(usize, Arc<PredictionContext>)> = Vec::new();
	for config in configs.iter() {
		let key: (usize, Arc<PredictionContext>) = (config.state, config.context.clone());
		let set: &mut AltSet = groups.entry(key.clone()).or_insert_with(|| {
			order.push(key);
			AltSet::new()
		});
		set.insert(config.alt);
	}
	order.into_iter().map(|key| groups.remove(&key).unwrap()).collect::<Vec<_>>()
}

fn state_to_alt_map(configs: &[AtnConfig]) -> FxHashMap<usize, AltSet> {
	let mut map: FxHashMap<usize, AltSet> = FxHashMap::default();
	for config in configs.iter() {
		map.entry(config.state).or_default().insert(config.alt);
	}
	map
}

fn has_state_associated_with_one_alt(configs: &[AtnConfig]) -> bool {
	state_to_alt_map(configs).values().any(|alts| alts.count() == 1)
}

pub fn has_conflicting_alt_set(alt_subsets: &[AltSet]) -> bool {
	alt_subsets.iter().any(|alts| alts.count() > 1)
}

pub fn all_subsets_conflict(alt_subsets: &[AltSet]) -> bool {
	alt_subsets.iter().all(|alts| alts.count() > 1)
}

pub fn all_subsets_equal(alt_subsets: &[AltSet]) -> bool {
	alt_subsets.windows(2).all(|pair| pair[0] == pair[1])
}

/// Union of every conflicting subset.
pub fn union_of(alt_subsets: &[AltSet]) -> AltSet {
	let mut union: AltSet = AltSet::new();
	for alts in alt_subsets.iter() {
		union.union_with(alts);
	}
	union
}

/// If every subset predicts the same minimum alternative, prediction can
/// stop with it; otherwise more lookahead might still split them.
pub fn resolves_to_just_one_viable_alt(alt_subsets: &[AltSet]) -> usize {
	single_viable_alt(alt_subsets)
}

pub fn single_viable_alt(alt_subsets: &[AltSet]) -> usize {
	let mut viable: usize = INVALID_ALT;
	for alts in alt_subsets.iter() {
		let min: usize = alts.min();
		if viable == INVALID_ALT {
			viable = min;
		} else if viable != min {
			return INVALID_ALT;
		}
	}
	viable
}

pub fn unique_alt(configs: &[AtnConfig]) -> usize {
	let alts: AltSet = alts_of(configs);
	if alts.count() == 1 { alts.min() } else { INVALID_ALT }
}

pub fn has_config_in_rule_stop_state(atn: &Atn, configs: &[AtnConfig]) -> bool {
	configs
		.iter()
		.any(|config| atn[config.state].kind == StateKind::RuleStop)
}

pub fn all_configs_in_rule_stop_states(atn: &Atn, configs: &[AtnConfig]) -> bool {
	configs
		.iter()
		.all(|config| atn[config.state].kind == StateKind::RuleStop)
}

/// Sam Harwell's SLL termination test: stop this prediction phase when
/// every `(state, context)` group conflicts and no state still pins a
/// single alternative. Predicates are stripped first in SLL mode — the
/// SLL DFA cannot re-evaluate them later.
pub fn has_sll_conflict_terminating_prediction(
	mode: PredictionMode,
	atn: &Atn,
	configs: &[AtnConfig],
) -> bool {
	if all_configs_in_rule_stop_states(atn, configs) {
		return true;
	}

	let stripped: Vec<AtnConfig>;
	let configs: &[AtnConfig] = if mode == PredictionMode::Sll
		&& configs.iter().any(|config| !config.semantic.is_none())
	{
		stripped = configs
			.iter()
			.map(|config| AtnConfig {
				semantic: SemanticContext::none(),
				..config.clone()
			})
			.collect::<Vec<_>>();
		&stripped[..]
	} else {
		configs
	};

	let subsets: Vec<AltSet> = conflicting_alt_subsets(configs);
	has_conflicting_alt_set(&subsets) && !has_state_associated_with_one_alt(configs)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::context::PredictionContext;

	fn ctx(states: &[usize]) -> Arc<PredictionContext> {
		let mut context: Arc<PredictionContext> = PredictionContext::empty();
		for &state in states.iter() {
			context = PredictionContext::singleton(context, state);
		}
		context
	}

	#[test]
	fn alt_set_basics() {
		let mut alts: AltSet = AltSet::new();
		assert!(alts.is_empty());
		assert_eq!(alts.min(), INVALID_ALT);
		alts.insert(3);
		alts.insert(70);
		alts.insert(1);
		assert_eq!(alts.count(), 3);
		assert_eq!(alts.min(), 1);
		assert!(alts.contains(70));
		assert!(!alts.contains(2));
		assert_eq!(alts.iter().collect::<Vec<_>>(), vec![1, 3, 70]);
	}

	#[test]
	fn subsets_group_by_state_and_context() {
		let configs: Vec<AtnConfig> = vec![
			AtnConfig::new(5, 1, ctx(&[9])),
			AtnConfig::new(5, 2, ctx(&[9])),
			AtnConfig::new(6, 1, ctx(&[])),
		];
		let subsets: Vec<AltSet> = conflicting_alt_subsets(&configs);
		assert_eq!(subsets.len(), 2);
		assert_eq!(subsets[0].iter().collect::<Vec<_>>(), vec![1, 2]);
		assert_eq!(subsets[1].iter().collect::<Vec<_>>(), vec![1]);
		assert!(has_conflicting_alt_set(&subsets));
		assert!(!all_subsets_conflict(&subsets));
		assert_eq!(union_of(&subsets).iter().collect::<Vec<_>>(), vec![1, 2]);
	}

	#[test]
	fn resolution_wants_agreeing_minimums() {
		let agreeing: Vec<AltSet> = vec![
			AltSet::from_iter([1, 2]),
			AltSet::from_iter([1, 3]),
		];
		assert_eq!(resolves_to_just_one_viable_alt(&agreeing), 1);

		let split: Vec<AltSet> = vec![
			AltSet::from_iter([1, 2]),
			AltSet::from_iter([2, 3]),
		];
		assert_eq!(resolves_to_just_one_viable_alt(&split), INVALID_ALT);
	}

	#[test]
	fn unique_alt_extraction() {
		let configs: Vec<AtnConfig> = vec![
			AtnConfig::new(5, 2, ctx(&[])),
			AtnConfig::new(6, 2, ctx(&[9])),
		];
		assert_eq!(unique_alt(&configs), 2);

		let configs: Vec<AtnConfig> = vec![
			AtnConfig::new(5, 1, ctx(&[])),
			AtnConfig::new(6, 2, ctx(&[])),
		];
		assert_eq!(unique_alt(&configs), INVALID_ALT);
	}
}
