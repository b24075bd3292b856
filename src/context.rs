use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::Mutex;

use fxhash::FxHashMap;
use fxhash::FxHasher;

/// Return-state sentinel marking the base of the stack inside an array
/// node; sorts after every real state number.
pub const EMPTY_RETURN_STATE: usize = usize::MAX;

/// An immutable DAG node describing the set of possible call stacks at a
/// point in the automaton. Grown only by "push" (rule invocation), shared
/// aggressively, structurally hashed at construction.
#[derive(Debug)]
pub enum PredictionContext {
	/// Base of stack; a singleton, see [`PredictionContext::empty`].
	Empty,
	Singleton {
		parent: Arc<PredictionContext>,
		return_state: usize,
		hash: u64,
	},
	/// `return_states` strictly ascending, [`EMPTY_RETURN_STATE`] last if
	/// present; a parent is `None` exactly for that sentinel slot.
	Array {
		parents: Vec<Option<Arc<PredictionContext>>>,
		return_states: Vec<usize>,
		hash: u64,
	},
}

static EMPTY: LazyLock<Arc<PredictionContext>> = LazyLock::new(|| Arc::new(PredictionContext::Empty));

impl PredictionContext {
	pub fn empty() -> Arc<Self> {
		EMPTY.clone()
	}

	pub fn singleton(parent: Arc<Self>, return_state: usize) -> Arc<Self> {
		if return_state == EMPTY_RETURN_STATE && parent.is_empty() {
			return Self::empty();
		}
		let hash: u64 = Self::hash_singleton(&parent, return_state);
		Arc::new(Self::Singleton {
			parent,
			return_state,
			hash,
		})
	}

	/// Canonicalize: a one-element array is a singleton, and a lone
	/// empty-return slot is the empty context.
	fn array(
		mut parents: Vec<Option<Arc<Self>>>,
		mut return_states: Vec<usize>,
	) -> Arc<Self> {
		assert_eq!(parents.len(), return_states.len());
		assert!(!return_states.is_empty());
		if return_states.len() == 1 {
			let return_state: usize = return_states.pop().unwrap();
			return match parents.pop().unwrap() {
				Some(parent) => Self::singleton(parent, return_state),
				None => {
					assert_eq!(return_state, EMPTY_RETURN_STATE);
					Self::empty()
				},
			};
		}
		let hash: u64 = Self::hash_array(&parents, &return_states);
		Arc::new(Self::Array {
			parents,
			return_states,
			hash,
		})
	}

	pub fn is_empty(&self) -> bool {
		matches!(self, Self::Empty)
	}

	/// Number of (parent, return-state) slots. Empty counts as one slot
	/// holding the sentinel.
	pub fn size(&self) -> usize {
		match self {
			Self::Empty | Self::Singleton { .. } => 1,
			Self::Array { return_states, .. } => return_states.len(),
		}
	}

	pub fn return_state(&self, i: usize) -> usize {
		match self {
			Self::Empty => EMPTY_RETURN_STATE,
			Self::Singleton { return_state, .. } => {
				assert_eq!(i, 0);
				*return_state
			},
			Self::Array { return_states, .. } => return_states[i],
		}
	}

	pub fn parent(&self, i: usize) -> Option<&Arc<Self>> {
		match self {
			Self::Empty => None,
			Self::Singleton { parent, .. } => {
				assert_eq!(i, 0);
				Some(parent)
			},
			Self::Array { parents, .. } => parents[i].as_ref(),
		}
	}

	/// True when one of the slots is the stack-bottom sentinel.
	pub fn has_empty_path(&self) -> bool {
		self.return_state(self.size() - 1) == EMPTY_RETURN_STATE
	}

	fn cached_hash(&self) -> u64 {
		match self {
			Self::Empty => 0x9e37_79b9_7f4a_7c15,
			Self::Singleton { hash, .. } | Self::Array { hash, .. } => *hash,
		}
	}

	fn hash_singleton(parent: &Arc<Self>, return_state: usize) -> u64 {
		let mut hasher: FxHasher = FxHasher::default();
		hasher.write_u64(parent.cached_hash());
		hasher.write_usize(return_state);
		hasher.finish()
	}

	fn hash_array(parents: &[Option<Arc<Self>>], return_states: &[usize]) -> u64 {
		let mut hasher: FxHasher = FxHasher::default();
		for parent in parents.iter() {
			hasher.write_u64(parent.as_ref().map_or(0, |p| p.cached_hash()));
		}
		for &return_state in return_states.iter() {
			hasher.write_usize(return_state);
		}
		hasher.finish()
	}
}

impl PartialEq for PredictionContext {
	fn eq(&self, other: &Self) -> bool {
		if std::ptr::eq(self, other) {
			return true;
		}
		if self.cached_hash() != other.cached_hash() {
			return false;
		}
		match (self, other) {
			(Self::Empty, Self::Empty) => true,
			(
				Self::Singleton { parent: p1, return_state: r1, .. },
				Self::Singleton { parent: p2, return_state: r2, .. },
			) => (r1 == r2) && (p1 == p2),
			(
				Self::Array { parents: p1, return_states: r1, .. },
				Self::Array { parents: p2, return_states: r2, .. },
			) => (r1 == r2) && (p1 == p2),
			_ => false,
		}
	}
}

impl Eq for PredictionContext {}

impl Hash for PredictionContext {
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_u64(self.cached_hash());
	}
}

/// Per-prediction merge memo. Keyed by node identity in both argument
/// orders; holds the keyed nodes alive so addresses stay unique.
#[derive(Debug, Default)]
pub struct MergeCache {
	entries: FxHashMap<(usize, usize), (Arc<PredictionContext>, Arc<PredictionContext>, Arc<PredictionContext>)>,
}

impl MergeCache {
	pub fn new() -> Self {
		Self::default()
	}

	fn key(
		a: &Arc<PredictionContext>,
		b: &Arc<PredictionContext>,
	) -> (usize, usize) {
		(Arc::as_ptr(a) as usize, Arc::as_ptr(b) as usize)
	}

	fn get(&self, a: &Arc<PredictionContext>, b: &Arc<PredictionContext>) -> Option<Arc<PredictionContext>> {
		self.entries.get(&Self::key(a, b)).map(|(_, _, merged)| merged.clone())
	}

	fn put(&mut self, a: Arc<PredictionContext>, b: Arc<PredictionContext>, merged: Arc<PredictionContext>) {
		self.entries
			.insert(Self::key(&a, &b), (a.clone(), b.clone(), merged.clone()));
		self.entries.insert(Self::key(&b, &a), (b, a, merged));
	}
}

/// Merge two context DAGs into one representing the union of their stack
/// sets. Commutative; memoized through `cache`.
///
/// In local mode (`root_is_wildcard`) the empty context acts as a
/// wildcard stack: merging anything with it yields the other operand.
/// In full mode it is a real stack bottom and survives as an
/// [`EMPTY_RETURN_STATE`] slot.
pub fn merge(
	a: &Arc<PredictionContext>,
	b: &Arc<PredictionContext>,
	root_is_wildcard: bool,
	cache: &mut MergeCache,
) -> Arc<PredictionContext> {
	if Arc::ptr_eq(a, b) || a == b {
		return a.clone();
	}
	if let Some(merged) = cache.get(a, b) {
		return merged;
	}

	let merged: Arc<PredictionContext> = match (&**a, &**b) {
		(PredictionContext::Empty, _) | (_, PredictionContext::Empty) => {
			merge_root(a, b, root_is_wildcard, cache)
		},
		(PredictionContext::Singleton { .. }, PredictionContext::Singleton { .. }) => {
			merge_singletons(a, b, root_is_wildcard, cache)
		},
		_ => merge_arrays(a, b, root_is_wildcard, cache),
	};

	cache.put(a.clone(), b.clone(), merged.clone());
	merged
}

fn merge_root(
	a: &Arc<PredictionContext>,
	b: &Arc<PredictionContext>,
	root_is_wildcard: bool,
	cache: &mut MergeCache,
) -> Arc<PredictionContext> {
	let (empty, other): (&Arc<PredictionContext>, &Arc<PredictionContext>) =
		if a.is_empty() { (a, b) } else { (b, a) };
	assert!(empty.is_empty());

	if root_is_wildcard {
		// wildcard stack bottom adds nothing the other side lacks
		return other.clone();
	}

	match &**other {
		PredictionContext::Empty => empty.clone(),
		PredictionContext::Singleton { parent, return_state, .. } => PredictionContext::array(
			vec![Some(parent.clone()), None],
			vec![*return_state, EMPTY_RETURN_STATE],
		),
		PredictionContext::Array { .. } => merge_arrays(a, b, root_is_wildcard, cache),
	}
}

fn merge_singletons(
	a: &Arc<PredictionContext>,
	b: &Arc<PredictionContext>,
	root_is_wildcard: bool,
	cache: &mut MergeCache,
) -> Arc<PredictionContext> {
	let (PredictionContext::Singleton { parent: a_parent, return_state: a_state, .. },
	     PredictionContext::Singleton { parent: b_parent, return_state: b_state, .. }) = (&**a, &**b)
	else {
		unreachable!("merge_singletons on non-singletons");
	};

	if a_state == b_state {
		let parent: Arc<PredictionContext> = merge(a_parent, b_parent, root_is_wildcard, cache);
		if Arc::ptr_eq(&parent, a_parent) {
			return a.clone();
		}
		if Arc::ptr_eq(&parent, b_parent) {
			return b.clone();
		}
		return PredictionContext::singleton(parent, *a_state);
	}

	// distinct return states: a two-slot array sorted by return state
	let (first, second): (&Arc<PredictionContext>, &Arc<PredictionContext>) =
		if a_state < b_state { (a, b) } else { (b, a) };
	PredictionContext::array(
		vec![
			first.parent(0).cloned(),
			second.parent(0).cloned(),
		],
		vec![first.return_state(0), second.return_state(0)],
	)
}

/// Classic sorted merge on `return_states`; equal keys merge their
/// parents recursively.
fn merge_arrays(
	a: &Arc<PredictionContext>,
	b: &Arc<PredictionContext>,
	root_is_wildcard: bool,
	cache: &mut MergeCache,
) -> Arc<PredictionContext> {
	let mut parents: Vec<Option<Arc<PredictionContext>>> = Vec::with_capacity(a.size() + b.size());
	let mut return_states: Vec<usize> = Vec::with_capacity(a.size() + b.size());

	let mut i: usize = 0;
	let mut j: usize = 0;
	while i < a.size() && j < b.size() {
		let a_state: usize = a.return_state(i);
		let b_state: usize = b.return_state(j);
		if a_state == b_state {
			let parent: Option<Arc<PredictionContext>> = match (a.parent(i), b.parent(j)) {
				(Some(ap), Some(bp)) => Some(merge(ap, bp, root_is_wildcard, cache)),
				// the sentinel slot carries no parent
				_ => None,
			};
			parents.push(parent);
			return_states.push(a_state);
			i += 1;
			j += 1;
		} else if a_state < b_state {
			parents.push(a.parent(i).cloned());
			return_states.push(a_state);
			i += 1;
		} else {
			parents.push(b.parent(j).cloned());
			return_states.push(b_state);
			j += 1;
		}
	}
	while i < a.size() {
		parents.push(a.parent(i).cloned());
		return_states.push(a.return_state(i));
		i += 1;
	}
	while j < b.size() {
		parents.push(b.parent(j).cloned());
		return_states.push(b.return_state(j));
		j += 1;
	}

	let merged: Arc<PredictionContext> = PredictionContext::array(parents, return_states);
	if *merged == **a {
		return a.clone();
	}
	if *merged == **b {
		return b.clone();
	}
	merged
}

/// Process-wide structural interning of context nodes. Shared by all
/// simulators for a grammar; cleared between grammars, never between
/// parses.
#[derive(Debug, Default)]
pub struct ContextCache {
	interned: Mutex<FxHashMap<Arc<PredictionContext>, Arc<PredictionContext>>>,
}

impl ContextCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.interned.lock().unwrap().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		self.interned.lock().unwrap().clear();
	}

	/// Rebuild `ctx` bottom-up out of interned nodes, interning anything
	/// new along the way. Structural equality between cached contexts is
	/// then pointer equality in practice.
	pub fn canonical(&self, ctx: &Arc<PredictionContext>) -> Arc<PredictionContext> {
		let mut visited: FxHashMap<usize, Arc<PredictionContext>> = FxHashMap::default();
		let mut interned = self.interned.lock().unwrap();
		Self::canonical_into(&mut interned, &mut visited, ctx)
	}

	fn canonical_into(
		interned: &mut FxHashMap<Arc<PredictionContext>, Arc<PredictionContext>>,
		visited: &mut FxHashMap<usize, Arc<PredictionContext>>,
		ctx: &Arc<PredictionContext>,
	) -> Arc<PredictionContext> {
		if ctx.is_empty() {
			return ctx.clone();
		}
		if let Some(existing) = visited.get(&(Arc::as_ptr(ctx) as usize)) {
			return existing.clone();
		}
		if let Some(existing) = interned.get(ctx) {
			visited.insert(Arc::as_ptr(ctx) as usize, existing.clone());
			return existing.clone();
		}

		let rebuilt: Arc<PredictionContext> = match &**ctx {
			PredictionContext::Empty => unreachable!(),
			PredictionContext::Singleton { parent, return_state, .. } => {
				let parent: Arc<PredictionContext> = Self::canonical_into(interned, visited, parent);
				PredictionContext::singleton(parent, *return_state)
			},
			PredictionContext::Array { parents, return_states, .. } => {
				let parents: Vec<Option<Arc<PredictionContext>>> = parents
					.iter()
					.map(|p| p.as_ref().map(|p| Self::canonical_into(interned, visited, p)))
					.collect::<Vec<_>>();
				PredictionContext::array(parents, return_states.clone())
			},
		};

		let entry: Arc<PredictionContext> = match interned.get(&rebuilt) {
			Some(existing) => existing.clone(),
			None => {
				interned.insert(rebuilt.clone(), rebuilt.clone());
				rebuilt
			},
		};
		visited.insert(Arc::as_ptr(ctx) as usize, entry.clone());
		entry
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn push(parent: &Arc<PredictionContext>, state: usize) -> Arc<PredictionContext> {
		PredictionContext::singleton(parent.clone(), state)
	}

	#[test]
	fn merge_is_commutative_and_idempotent() {
		let empty: Arc<PredictionContext> = PredictionContext::empty();
		let a: Arc<PredictionContext> = push(&push(&empty, 10), 20);
		let b: Arc<PredictionContext> = push(&push(&empty, 11), 20);
		let c: Arc<PredictionContext> = push(&empty, 30);

		for full in [false, true] {
			let mut cache: MergeCache = MergeCache::new();
			let ab: Arc<PredictionContext> = merge(&a, &b, !full, &mut cache);
			let ba: Arc<PredictionContext> = merge(&b, &a, !full, &mut cache);
			assert_eq!(ab, ba);

			let aa: Arc<PredictionContext> = merge(&a, &a, !full, &mut cache);
			assert!(Arc::ptr_eq(&aa, &a));

			let abc: Arc<PredictionContext> = merge(&ab, &c, !full, &mut cache);
			let cab: Arc<PredictionContext> = merge(&c, &ab, !full, &mut cache);
			assert_eq!(abc, cab);
		}
	}

	#[test]
	fn local_mode_empty_is_wildcard() {
		let empty: Arc<PredictionContext> = PredictionContext::empty();
		let a: Arc<PredictionContext> = push(&empty, 42);
		let mut cache: MergeCache = MergeCache::new();
		let merged: Arc<PredictionContext> = merge(&a, &empty, true, &mut cache);
		assert!(Arc::ptr_eq(&merged, &a));
		let merged: Arc<PredictionContext> = merge(&empty, &a, true, &mut cache);
		assert!(Arc::ptr_eq(&merged, &a));
	}

	#[test]
	fn full_mode_empty_is_stack_bottom() {
		let empty: Arc<PredictionContext> = PredictionContext::empty();
		let a: Arc<PredictionContext> = push(&empty, 42);
		let mut cache: MergeCache = MergeCache::new();
		let merged: Arc<PredictionContext> = merge(&a, &empty, false, &mut cache);
		assert_eq!(merged.size(), 2);
		assert_eq!(merged.return_state(0), 42);
		assert_eq!(merged.return_state(1), EMPTY_RETURN_STATE);
		assert!(merged.has_empty_path());
	}

	#[test]
	fn equal_return_states_merge_parents() {
		let empty: Arc<PredictionContext> = PredictionContext::empty();
		let p1: Arc<PredictionContext> = push(&empty, 1);
		let p2: Arc<PredictionContext> = push(&empty, 2);
		let a: Arc<PredictionContext> = push(&p1, 9);
		let b: Arc<PredictionContext> = push(&p2, 9);

		let mut cache: MergeCache = MergeCache::new();
		let merged: Arc<PredictionContext> = merge(&a, &b, true, &mut cache);
		assert_eq!(merged.size(), 1);
		assert_eq!(merged.return_state(0), 9);
		let parent: &Arc<PredictionContext> = merged.parent(0).unwrap();
		assert_eq!(parent.size(), 2);
		assert_eq!(parent.return_state(0), 1);
		assert_eq!(parent.return_state(1), 2);
	}

	#[test]
	fn singleton_collapse_after_array_merge() {
		let empty: Arc<PredictionContext> = PredictionContext::empty();
		let a: Arc<PredictionContext> = push(&empty, 5);
		let b: Arc<PredictionContext> = push(&empty, 5);
		assert_eq!(a, b);
		let mut cache: MergeCache = MergeCache::new();
		// distinct allocations, equal structure
		let merged: Arc<PredictionContext> = merge(&a, &b, true, &mut cache);
		assert!(Arc::ptr_eq(&merged, &a));
	}

	#[test]
	fn cache_reuses_merges() {
		let empty: Arc<PredictionContext> = PredictionContext::empty();
		let a: Arc<PredictionContext> = push(&empty, 1);
		let b: Arc<PredictionContext> = push(&empty, 2);
		let mut cache: MergeCache = MergeCache::new();
		let m1: Arc<PredictionContext> = merge(&a, &b, true, &mut cache);
		let m2: Arc<PredictionContext> = merge(&b, &a, true, &mut cache);
		assert!(Arc::ptr_eq(&m1, &m2));
	}

	#[test]
	fn interning_dedups_graphs() {
		let cache: ContextCache = ContextCache::new();
		let empty: Arc<PredictionContext> = PredictionContext::empty();
		let a: Arc<PredictionContext> = push(&push(&empty, 7), 8);
		let b: Arc<PredictionContext> = push(&push(&empty, 7), 8);
		assert!(!Arc::ptr_eq(&a, &b));
		let ca: Arc<PredictionContext> = cache.canonical(&a);
		let cb: Arc<PredictionContext> = cache.canonical(&b);
		assert!(Arc::ptr_eq(&ca, &cb));
		assert_eq!(cache.len(), 2);
	}
}
