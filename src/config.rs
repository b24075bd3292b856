use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use fxhash::FxHashMap;
use fxhash::FxHasher;

use crate::context::ContextCache;
use crate::context::MergeCache;
use crate::context::PredictionContext;
use crate::context::merge;
use crate::prediction::AltSet;
use crate::semantics::SemanticContext;

/// One prediction configuration: an automaton state reached for an
/// alternative under a set of call stacks, gated by a semantic context.
#[derive(Debug, Clone)]
pub struct AtnConfig {
	pub state: usize,
	pub alt: usize,
	pub context: Arc<PredictionContext>,
	pub semantic: Arc<SemanticContext>,
	/// How far closure chased follow links past the decision entry rule.
	pub outer_depth: u32,
	pub precedence_filter_suppressed: bool,
	/// Lexer configs: action index carried to accept time.
	pub lexer_action: Option<usize>,
	/// Lexer configs: closure crossed a non-greedy decision.
	pub passed_non_greedy: bool,
}

impl AtnConfig {
	pub fn new(state: usize, alt: usize, context: Arc<PredictionContext>) -> Self {
		Self {
			state,
			alt,
			context,
			semantic: SemanticContext::none(),
			outer_depth: 0,
			precedence_filter_suppressed: false,
			lexer_action: None,
			passed_non_greedy: false,
		}
	}

	/// The common closure step: same configuration, moved to `state`.
	pub fn transported(&self, state: usize) -> Self {
		Self {
			state,
			..self.clone()
		}
	}

	pub fn with_context(&self, state: usize, context: Arc<PredictionContext>) -> Self {
		Self {
			state,
			context,
			..self.clone()
		}
	}

	pub fn with_semantic(&self, state: usize, semantic: Arc<SemanticContext>) -> Self {
		Self {
			state,
			semantic,
			..self.clone()
		}
	}
}

impl PartialEq for AtnConfig {
	fn eq(&self, other: &Self) -> bool {
		(self.state == other.state)
			&& (self.alt == other.alt)
			&& (self.context == other.context)
			&& (self.semantic == other.semantic)
			&& (self.precedence_filter_suppressed == other.precedence_filter_suppressed)
			&& (self.lexer_action == other.lexer_action)
			&& (self.passed_non_greedy == other.passed_non_greedy)
	}
}

impl Eq for AtnConfig {}

impl Hash for AtnConfig {
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_usize(self.state);
		state.write_usize(self.alt);
		self.context.hash(state);
		self.semantic.hash(state);
		state.write_u64(self.lexer_action.map_or(u64::MAX, |a| a as u64));
		state.write_u8(self.passed_non_greedy as u8);
	}
}

/// Dedup key. The parser folds configs with equal `(state, alt,
/// semantic)` together and merges their contexts; the lexer keeps
/// distinct contexts apart (its contexts are part of the DFA identity).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum ConfigKey {
	Merged {
		state: usize,
		alt: usize,
		semantic: Arc<SemanticContext>,
	},
	Exact(AtnConfig),
}

/// A config bag under construction: ordered list plus a parallel hash
/// index. Iteration order is insertion order, which conflict analysis
/// relies on for deterministic tie-breaks. Freezing produces the
/// immutable snapshot DFA states hold.
#[derive(Debug)]
pub struct ConfigSet {
	configs: Vec<AtnConfig>,
	index: FxHashMap<ConfigKey, usize>,
	ordered: bool,
	pub full_ctx: bool,
	pub unique_alt: usize,
	pub conflicting_alts: Option<AltSet>,
	pub has_semantic_context: bool,
	pub dips_into_outer_context: bool,
}

impl ConfigSet {
	/// Parser-side set with merge-on-add dedup.
	pub fn new(full_ctx: bool) -> Self {
		Self {
			configs: Vec::new(),
			index: FxHashMap::default(),
			ordered: false,
			full_ctx,
			unique_alt: crate::atn::INVALID_ALT,
			conflicting_alts: None,
			has_semantic_context: false,
			dips_into_outer_context: false,
		}
	}

	/// Lexer-side set: whole configs are the identity.
	pub fn ordered() -> Self {
		Self {
			ordered: true,
			..Self::new(true)
		}
	}

	fn key_of(&self, config: &AtnConfig) -> ConfigKey {
		if self.ordered {
			ConfigKey::Exact(config.clone())
		} else {
			ConfigKey::Merged {
				state: config.state,
				alt: config.alt,
				semantic: config.semantic.clone(),
			}
		}
	}

	/// Insert or fold. Returns whether the set grew; folding into an
	/// existing entry merges the call-stack DAGs (wildcard root unless
	/// this is a full-context set).
	pub fn add(&mut self, config: AtnConfig, cache: &mut MergeCache) -> bool {
		if !config.semantic.is_none() {
			self.has_semantic_context = true;
		}
		if config.outer_depth > 0 {
			self.dips_into_outer_context = true;
		}

		let key: ConfigKey = self.key_of(&config);
		if let Some(&at) = self.index.get(&key) {
			let root_is_wildcard: bool = !self.full_ctx;
			let existing: &mut AtnConfig = &mut self.configs[at];
			let merged: Arc<PredictionContext> =
				merge(&existing.context, &config.context, root_is_wildcard, cache);
			existing.outer_depth = existing.outer_depth.max(config.outer_depth);
			existing.precedence_filter_suppressed |= config.precedence_filter_suppressed;
			existing.context = merged;
			return false;
		}

		self.index.insert(key, self.configs.len());
		self.configs.push(config);
		true
	}

	/// Bulk insert; answers whether any element was new.
	pub fn add_all(&mut self, other: &[AtnConfig], cache: &mut MergeCache) -> bool {
		let mut grew: bool = false;
		for config in other.iter() {
			grew |= self.add(config.clone(), cache);
		}
		grew
	}

	pub fn configs(&self) -> &[AtnConfig] {
		&self.configs[..]
	}

	pub fn len(&self) -> usize {
		self.configs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.configs.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &AtnConfig> {
		self.configs.iter()
	}

	/// Swap every context for its interned equivalent. Run before
	/// freezing; shrinks the retained graph considerably.
	pub fn optimize_configs(&mut self, cache: &ContextCache) {
		for config in self.configs.iter_mut() {
			config.context = cache.canonical(&config.context);
		}
	}

	pub fn freeze(self) -> FrozenConfigSet {
		let mut hasher: FxHasher = FxHasher::default();
		for config in self.configs.iter() {
			config.hash(&mut hasher);
		}
		FrozenConfigSet {
			hash: hasher.finish(),
			configs: self.configs,
			full_ctx: self.full_ctx,
			unique_alt: self.unique_alt,
			conflicting_alts: self.conflicting_alts,
			has_semantic_context: self.has_semantic_context,
			dips_into_outer_context: self.dips_into_outer_context,
		}
	}
}

/// The immutable snapshot of a config set; what DFA states are keyed by.
#[derive(Debug)]
pub struct FrozenConfigSet {
	configs: Vec<AtnConfig>,
	hash: u64,
	pub full_ctx: bool,
	pub unique_alt: usize,
	pub conflicting_alts: Option<AltSet>,
	pub has_semantic_context: bool,
	pub dips_into_outer_context: bool,
}

impl FrozenConfigSet {
	pub fn configs(&self) -> &[AtnConfig] {
		&self.configs[..]
	}

	pub fn len(&self) -> usize {
		self.configs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.configs.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &AtnConfig> {
		self.configs.iter()
	}
}

impl PartialEq for FrozenConfigSet {
	fn eq(&self, other: &Self) -> bool {
		// same length, element-wise; nothing else participates
		(self.hash == other.hash) && (self.configs == other.configs)
	}
}

impl Eq for FrozenConfigSet {}

impl Hash for FrozenConfigSet {
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_u64(self.hash);
	}
}

impl std::ops::Index<usize> for FrozenConfigSet {
	type Output = AtnConfig;

	fn index(&self, i: usize) -> &Self::Output {
		&self.configs[i]
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn ctx(states: &[usize]) -> Arc<PredictionContext> {
		let mut context: Arc<PredictionContext> = PredictionContext::empty();
		for &state in states.iter() {
			context = PredictionContext::singleton(context, state);
		}
		context
	}

	#[test]
	fn parser_add_merges_same_key() {
		let mut set: ConfigSet = ConfigSet::new(false);
		let mut cache: MergeCache = MergeCache::new();

		assert!(set.add(AtnConfig::new(3, 1, ctx(&[10])), &mut cache));
		assert!(set.add(AtnConfig::new(4, 1, ctx(&[10])), &mut cache));
		// same (state, alt, semantic): contexts merge, no growth
		assert!(!set.add(AtnConfig::new(3, 1, ctx(&[11])), &mut cache));
		assert_eq!(set.len(), 2);

		let merged: &AtnConfig = &set.configs()[0];
		assert_eq!(merged.context.size(), 2);
		assert_eq!(merged.context.return_state(0), 10);
		assert_eq!(merged.context.return_state(1), 11);
	}

	#[test]
	fn ordered_add_keeps_distinct_contexts() {
		let mut set: ConfigSet = ConfigSet::ordered();
		let mut cache: MergeCache = MergeCache::new();

		assert!(set.add(AtnConfig::new(3, 1, ctx(&[10])), &mut cache));
		assert!(set.add(AtnConfig::new(3, 1, ctx(&[11])), &mut cache));
		assert!(!set.add(AtnConfig::new(3, 1, ctx(&[10])), &mut cache));
		assert_eq!(set.len(), 2);
	}

	#[test]
	fn add_all_reports_growth() {
		let mut cache: MergeCache = MergeCache::new();
		let mut a: ConfigSet = ConfigSet::new(false);
		a.add(AtnConfig::new(1, 1, ctx(&[])), &mut cache);
		a.add(AtnConfig::new(2, 2, ctx(&[])), &mut cache);

		let mut b: ConfigSet = ConfigSet::new(false);
		b.add(AtnConfig::new(1, 1, ctx(&[])), &mut cache);
		assert!(b.add_all(a.configs(), &mut cache));
		assert!(!b.add_all(a.configs(), &mut cache));
		assert_eq!(b.len(), 2);
	}

	#[test]
	fn flags_follow_contents() {
		let mut cache: MergeCache = MergeCache::new();
		let mut set: ConfigSet = ConfigSet::new(false);
		let mut config: AtnConfig = AtnConfig::new(1, 1, ctx(&[]));
		config.semantic = SemanticContext::predicate(0, 0, false);
		set.add(config, &mut cache);
		assert!(set.has_semantic_context);

		let mut config: AtnConfig = AtnConfig::new(2, 1, ctx(&[]));
		config.outer_depth = 1;
		set.add(config, &mut cache);
		assert!(set.dips_into_outer_context);
	}

	#[test]
	fn frozen_equality_is_element_wise() {
		let mut cache: MergeCache = MergeCache::new();
		let mut build = |states: &[usize]| -> FrozenConfigSet {
			let mut set: ConfigSet = ConfigSet::new(false);
			for &state in states.iter() {
				set.add(AtnConfig::new(state, 1, ctx(&[])), &mut cache);
			}
			set.freeze()
		};
		assert_eq!(build(&[1, 2]), build(&[1, 2]));
		assert_ne!(build(&[1, 2]), build(&[2, 1]));
		assert_ne!(build(&[1]), build(&[1, 2]));
	}

	#[test]
	fn optimize_configs_interns_contexts() {
		let shared: ContextCache = ContextCache::new();
		let mut cache: MergeCache = MergeCache::new();
		let mut a: ConfigSet = ConfigSet::ordered();
		a.add(AtnConfig::new(1, 1, ctx(&[7, 8])), &mut cache);
		let mut b: ConfigSet = ConfigSet::ordered();
		b.add(AtnConfig::new(2, 1, ctx(&[7, 8])), &mut cache);

		a.optimize_configs(&shared);
		b.optimize_configs(&shared);
		assert!(Arc::ptr_eq(&a.configs()[0].context, &b.configs()[0].context));
	}
}
