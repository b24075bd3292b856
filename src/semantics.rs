use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::LazyLock;

/// Host hooks the simulators call to decide predicates. A grammar with no
/// predicates never sees these.
pub trait PredicateEvaluator {
	fn sempred(&mut self, rule: usize, pred: usize) -> bool {
		let _ = (rule, pred);
		true
	}

	fn precpred(&mut self, precedence: usize) -> bool {
		let _ = precedence;
		true
	}
}

/// Evaluator of last resort: everything passes.
impl PredicateEvaluator for () {}

/// Boolean lattice over predicate nodes, kept in AND/OR normal form by the
/// smart constructors: operands flattened, duplicates dropped, neutral
/// elements removed, precedence predicates reduced (AND keeps the
/// smallest bound, OR the largest).
#[derive(Debug, Clone, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum SemanticContext {
	None,
	Predicate {
		rule: usize,
		pred: usize,
		ctx_dependent: bool,
	},
	Precedence {
		precedence: usize,
	},
	And(Vec<SemanticContext>),
	Or(Vec<SemanticContext>),
}

static NONE: LazyLock<Arc<SemanticContext>> = LazyLock::new(|| Arc::new(SemanticContext::None));

impl SemanticContext {
	pub fn none() -> Arc<Self> {
		NONE.clone()
	}

	pub fn predicate(rule: usize, pred: usize, ctx_dependent: bool) -> Arc<Self> {
		Arc::new(Self::Predicate {
			rule,
			pred,
			ctx_dependent,
		})
	}

	pub fn precedence(precedence: usize) -> Arc<Self> {
		Arc::new(Self::Precedence { precedence })
	}

	pub fn is_none(&self) -> bool {
		matches!(self, Self::None)
	}

	pub fn and(a: &Arc<Self>, b: &Arc<Self>) -> Arc<Self> {
		if a.is_none() {
			return b.clone();
		}
		if b.is_none() {
			return a.clone();
		}

		let mut operands: BTreeSet<Self> = BTreeSet::new();
		for side in [a, b] {
			match &**side {
				Self::And(inner) => operands.extend(inner.iter().cloned()),
				other => {
					operands.insert(other.clone());
				},
			}
		}

		// conjoined `{x >= p}?` checks collapse to the smallest x
		let reduced: Option<Self> = Self::keep_precedence(&mut operands, |best, next| next < best);
		if operands.is_empty() {
			return Arc::new(reduced.expect("and() of empty operand set"));
		}
		if let Some(reduced) = reduced {
			operands.insert(reduced);
		}
		Self::wrap(operands, Self::And)
	}

	pub fn or(a: &Arc<Self>, b: &Arc<Self>) -> Arc<Self> {
		if a.is_none() || b.is_none() {
			return Self::none();
		}

		let mut operands: BTreeSet<Self> = BTreeSet::new();
		for side in [a, b] {
			match &**side {
				Self::Or(inner) => operands.extend(inner.iter().cloned()),
				other => {
					operands.insert(other.clone());
				},
			}
		}

		let reduced: Option<Self> = Self::keep_precedence(&mut operands, |best, next| next > best);
		if operands.is_empty() {
			return Arc::new(reduced.expect("or() of empty operand set"));
		}
		if let Some(reduced) = reduced {
			operands.insert(reduced);
		}
		Self::wrap(operands, Self::Or)
	}

	fn keep_precedence(
		operands: &mut BTreeSet<Self>,
		prefer: impl Fn(usize, usize) -> bool,
	) -> Option<Self> {
		let mut kept: Option<usize> = None;
		operands.retain(|operand| match operand {
			&Self::Precedence { precedence } => {
				kept = Some(match kept {
					Some(best) if !prefer(best, precedence) => best,
					_ => precedence,
				});
				false
			},
			_ => true,
		});
		kept.map(|precedence| Self::Precedence { precedence })
	}

	fn wrap(operands: BTreeSet<Self>, combine: fn(Vec<Self>) -> Self) -> Arc<Self> {
		let mut operands: Vec<Self> = operands.into_iter().collect::<Vec<_>>();
		if operands.len() == 1 {
			return Arc::new(operands.pop().unwrap());
		}
		Arc::new(combine(operands))
	}

	pub fn eval(&self, host: &mut dyn PredicateEvaluator) -> bool {
		match self {
			Self::None => true,
			&Self::Predicate { rule, pred, .. } => host.sempred(rule, pred),
			&Self::Precedence { precedence } => host.precpred(precedence),
			Self::And(operands) => operands.iter().all(|operand| operand.eval(host)),
			Self::Or(operands) => operands.iter().any(|operand| operand.eval(host)),
		}
	}

	/// Partially evaluate just the precedence predicates against the
	/// current precedence, leaving the rest symbolic. `None` means the
	/// whole context is unsatisfiable at this precedence.
	pub fn eval_precedence(
		this: &Arc<Self>,
		host: &mut dyn PredicateEvaluator,
	) -> Option<Arc<Self>> {
		match &**this {
			Self::Precedence { precedence } => {
				if host.precpred(*precedence) {
					Some(Self::none())
				} else {
					None
				}
			},
			Self::And(operands) => {
				let mut result: Arc<Self> = Self::none();
				let mut changed: bool = false;
				for operand in operands.iter() {
					let operand: Arc<Self> = Arc::new(operand.clone());
					let evaluated: Arc<Self> = Self::eval_precedence(&operand, host)?;
					changed |= *evaluated != *operand;
					result = Self::and(&result, &evaluated);
				}
				if changed { Some(result) } else { Some(this.clone()) }
			},
			Self::Or(operands) => {
				let mut result: Option<Arc<Self>> = None;
				let mut changed: bool = false;
				for operand in operands.iter() {
					let operand: Arc<Self> = Arc::new(operand.clone());
					match Self::eval_precedence(&operand, host) {
						Some(evaluated) => {
							changed |= *evaluated != *operand;
							result = Some(match result {
								Some(previous) => Self::or(&previous, &evaluated),
								None => evaluated,
							});
						},
						None => changed = true,
					}
				}
				match (changed, result) {
					(false, _) => Some(this.clone()),
					(true, result) => result,
				}
			},
			_ => Some(this.clone()),
		}
	}
}
