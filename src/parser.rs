use std::sync::Arc;

use fxhash::FxHashMap;
use fxhash::FxHashSet;

use crate::atn::Atn;
use crate::atn::INVALID_ALT;
use crate::atn::StateKind;
use crate::atn::Transition;
use crate::config::AtnConfig;
use crate::config::ConfigSet;
use crate::context::ContextCache;
use crate::context::EMPTY_RETURN_STATE;
use crate::context::MergeCache;
use crate::context::PredictionContext;
use crate::dfa::Dfa;
use crate::dfa::DfaState;
use crate::dfa::ERROR_TARGET;
use crate::dfa::PredictedAlt;
use crate::errors::RecognitionError;
use crate::prediction::AltSet;
use crate::prediction::PredictionMode;
use crate::prediction::all_configs_in_rule_stop_states;
use crate::prediction::all_subsets_conflict;
use crate::prediction::all_subsets_equal;
use crate::prediction::alts_of;
use crate::prediction::conflicting_alt_subsets;
use crate::prediction::has_config_in_rule_stop_state;
use crate::prediction::has_sll_conflict_terminating_prediction;
use crate::prediction::resolves_to_just_one_viable_alt;
use crate::prediction::single_viable_alt;
use crate::prediction::union_of;
use crate::prediction::unique_alt;
use crate::semantics::PredicateEvaluator;
use crate::semantics::SemanticContext;
use crate::stream::TokenStream;
use crate::token::EOF;
use crate::token::TOKEN_EPSILON;

/// The slice of the parser's rule-invocation stack prediction consumes:
/// who invoked us, from which automaton state. The root frame has
/// neither.
#[derive(Debug)]
pub struct CallContext {
	pub parent: Option<Arc<CallContext>>,
	pub invoking_state: Option<usize>,
}

impl CallContext {
	pub fn root() -> Arc<Self> {
		Arc::new(Self {
			parent: None,
			invoking_state: None,
		})
	}

	pub fn child(parent: &Arc<Self>, invoking_state: usize) -> Arc<Self> {
		Arc::new(Self {
			parent: Some(parent.clone()),
			invoking_state: Some(invoking_state),
		})
	}
}

/// Build the context DAG equivalent of a concrete call chain. The
/// invoking state's first transition must be the rule invocation itself.
fn context_from_call_stack(atn: &Atn, ctx: &CallContext) -> Arc<PredictionContext> {
	let (Some(parent), Some(invoking_state)) = (&ctx.parent, ctx.invoking_state) else {
		return PredictionContext::empty();
	};
	let parent: Arc<PredictionContext> = context_from_call_stack(atn, parent);
	let Transition::Rule { follow, .. } = &atn[invoking_state].transitions[0] else {
		panic!("invoking state without a leading rule transition");
	};
	PredictionContext::singleton(parent, *follow)
}

/// Prediction events, reported synchronously at the point of detection.
pub trait PredictionListener {
	fn report_attempting_full_context(
		&mut self,
		decision: usize,
		conflicting: &AltSet,
		start_index: usize,
		stop_index: usize,
	) {
		let _ = (decision, conflicting, start_index, stop_index);
	}

	fn report_context_sensitivity(
		&mut self,
		decision: usize,
		prediction: usize,
		start_index: usize,
		stop_index: usize,
	) {
		let _ = (decision, prediction, start_index, stop_index);
	}

	fn report_ambiguity(
		&mut self,
		decision: usize,
		start_index: usize,
		stop_index: usize,
		exact: bool,
		ambig_alts: &AltSet,
	) {
		let _ = (decision, start_index, stop_index, exact, ambig_alts);
	}
}

impl PredictionListener for () {}

/// Everything one closure/reach computation threads through itself.
struct ClosureScope<'a> {
	full_ctx: bool,
	treat_eof_as_epsilon: bool,
	start_index: usize,
	busy: FxHashSet<AtnConfig>,
	merges: &'a mut MergeCache,
	input: &'a mut dyn TokenStream,
	host: &'a mut dyn PredicateEvaluator,
}

/// Adaptive LL(*) prediction: simulate the decision's piece of the
/// automaton over the token stream, memoizing into the decision's DFA.
/// SLL first (call stacks as wildcards); on conflict, redo with full
/// contexts; predicates evaluated at prediction end.
///
/// The simulator itself is immutable; instances are cheap and share the
/// DFAs and context cache via [`ParserSimulator::fork`].
#[derive(Debug)]
pub struct ParserSimulator {
	atn: Arc<Atn>,
	dfas: Arc<[Dfa]>,
	cache: Arc<ContextCache>,
	pub mode: PredictionMode,
}

impl ParserSimulator {
	pub fn new(atn: Arc<Atn>) -> Self {
		let dfas: Arc<[Dfa]> = atn
			.decision_to_state
			.iter()
			.enumerate()
			.map(|(decision, &state)| {
				Dfa::for_decision(
					decision,
					state,
					atn.max_token_type,
					is_precedence_decision(&atn, state),
				)
			})
			.collect::<Arc<[_]>>();
		Self {
			atn,
			dfas,
			cache: Arc::new(ContextCache::new()),
			mode: PredictionMode::Ll,
		}
	}

	pub fn fork(&self) -> Self {
		Self {
			atn: self.atn.clone(),
			dfas: self.dfas.clone(),
			cache: self.cache.clone(),
			mode: self.mode,
		}
	}

	pub fn atn(&self) -> &Arc<Atn> {
		&self.atn
	}

	pub fn dfa(&self, decision: usize) -> &Dfa {
		&self.dfas[decision]
	}

	/// Predict which alternative of `decision` to take from the current
	/// stream position. The stream is restored before returning.
	pub fn adaptive_predict(
		&self,
		input: &mut dyn TokenStream,
		decision: usize,
		outer: &Arc<CallContext>,
		precedence: usize,
		host: &mut dyn PredicateEvaluator,
		listener: &mut dyn PredictionListener,
	) -> Result<usize, RecognitionError> {
		debug!("adaptivePredict decision {decision} at token {}", input.index());
		let marker: isize = input.mark();
		let index: usize = input.index();
		let result: Result<usize, RecognitionError> =
			self.predict_inner(input, decision, outer, precedence, host, listener);
		input.seek(index);
		input.release(marker);
		result
	}

	fn predict_inner(
		&self,
		input: &mut dyn TokenStream,
		decision: usize,
		outer: &Arc<CallContext>,
		precedence: usize,
		host: &mut dyn PredicateEvaluator,
		listener: &mut dyn PredictionListener,
	) -> Result<usize, RecognitionError> {
		let dfa: &Dfa = &self.dfas[decision];
		let start_index: usize = input.index();
		let mut merges: MergeCache = MergeCache::new();

		let existing_s0: Option<Arc<DfaState>> = if dfa.is_precedence_dfa() {
			dfa.precedence_s0(precedence)
		} else {
			dfa.s0()
		};

		let s0: Arc<DfaState> = match existing_s0 {
			Some(s0) => s0,
			None => {
				/// SLL start state: local context only, so the entry
				/// closure begins at the wildcard stack bottom.
				let root: Arc<CallContext> = CallContext::root();
				let mut s0_closure: ConfigSet = self.compute_start_state(
					dfa.atn_start_state,
					&root,
					false,
					start_index,
					&mut merges,
					input,
					host,
				);
				if dfa.is_precedence_dfa() {
					s0_closure = self.apply_precedence_filter(s0_closure, &mut merges, host);
					let s0: Arc<DfaState> = self.intern_state(dfa, s0_closure, |_| ());
					dfa.set_precedence_s0(precedence, &s0);
					s0
				} else {
					let s0: Arc<DfaState> = self.intern_state(dfa, s0_closure, |_| ());
					dfa.set_s0(&s0);
					s0
				}
			},
		};

		self.exec_atn(dfa, s0, input, start_index, outer, host, listener, &mut merges)
	}

	#[allow(clippy::too_many_arguments)]
	fn exec_atn(
		&self,
		dfa: &Dfa,
		s0: Arc<DfaState>,
		input: &mut dyn TokenStream,
		start_index: usize,
		outer: &Arc<CallContext>,
		host: &mut dyn PredicateEvaluator,
		listener: &mut dyn PredictionListener,
		merges: &mut MergeCache,
	) -> Result<usize, RecognitionError> {
		let mut previous: Arc<DfaState> = s0;
		let mut t: i32 = input.la(1);

		loop {
			let target: Option<Arc<DfaState>> = match dfa.edge(&previous, t) {
				Some(ERROR_TARGET) => None,
				Some(number) => Some(dfa.state(number)),
				None => self.compute_target_state(dfa, &previous, t, start_index, input, host, merges),
			};

			let Some(d) = target else {
				/// SLL found nothing viable. Before giving up, prefer an
				/// alternative that at least finished the decision entry
				/// rule; it gives the parser a better error position.
				let error: RecognitionError = RecognitionError::NoViableAlt {
					decision: dfa.decision,
					start_index,
					offending_index: input.index(),
				};
				input.seek(start_index);
				let alt: usize = self.best_fallback_alt(previous.configs.configs(), host);
				if alt != INVALID_ALT {
					return Ok(alt);
				}
				return Err(error);
			};

			if d.requires_full_context && self.mode != PredictionMode::Sll {
				let mut conflicting: AltSet =
					d.configs.conflicting_alts.clone().unwrap_or_default();
				if let Some(predicates) = &d.predicates {
					let conflict_index: usize = input.index();
					if conflict_index != start_index {
						input.seek(start_index);
					}
					conflicting = eval_predicted_alts(predicates, host, true);
					if conflicting.count() == 1 {
						return Ok(conflicting.min());
					}
					if conflict_index != start_index {
						input.seek(conflict_index);
					}
				}

				debug!("SLL conflict at decision {}; retrying with full context", dfa.decision);
				listener.report_attempting_full_context(
					dfa.decision,
					&conflicting,
					start_index,
					input.index(),
				);
				return self.exec_atn_full_context(
					dfa, input, start_index, outer, host, listener, merges,
				);
			}

			if d.accept {
				let Some(predicates) = &d.predicates else {
					return Ok(d.prediction as usize);
				};

				let stop_index: usize = input.index();
				input.seek(start_index);
				let alts: AltSet = eval_predicted_alts(predicates, host, true);
				match alts.count() {
					0 => {
						return Err(RecognitionError::NoViableAlt {
							decision: dfa.decision,
							start_index,
							offending_index: stop_index,
						});
					},
					1 => return Ok(alts.min()),
					_ => {
						/// Predicates narrowed nothing; report and take
						/// the minimum surviving alternative.
						listener.report_ambiguity(dfa.decision, start_index, stop_index, false, &alts);
						return Ok(alts.min());
					},
				}
			}

			previous = d;
			if t != EOF {
				input.consume();
				t = input.la(1);
			}
		}
	}

	/// One SLL step: reach + closure for `t`, then derive the verdict
	/// (unique alt, conflict, or pending predicates) and intern it.
	fn compute_target_state(
		&self,
		dfa: &Dfa,
		previous: &Arc<DfaState>,
		t: i32,
		start_index: usize,
		input: &mut dyn TokenStream,
		host: &mut dyn PredicateEvaluator,
		merges: &mut MergeCache,
	) -> Option<Arc<DfaState>> {
		let reach: Option<ConfigSet> = self.compute_reach_set(
			previous.configs.configs(),
			false,
			t,
			start_index,
			merges,
			input,
			host,
		);
		let Some(mut reach) = reach else {
			dfa.set_edge(previous, t, ERROR_TARGET);
			return None;
		};

		let mut accept: bool = false;
		let mut requires_full_context: bool = false;
		let mut prediction: usize = unique_alt(reach.configs());

		if prediction != INVALID_ALT {
			reach.unique_alt = prediction;
			accept = true;
		} else if has_sll_conflict_terminating_prediction(self.mode, &self.atn, reach.configs()) {
			let conflicting: AltSet = union_of(&conflicting_alt_subsets(reach.configs()));
			prediction = conflicting.min();
			reach.conflicting_alts = Some(conflicting);
			accept = true;
			requires_full_context = true;
		}

		let mut predicates: Option<Vec<PredictedAlt>> = None;
		if accept && reach.has_semantic_context {
			let decision_state: usize = self.atn.decision_state(dfa.decision);
			let nalts: usize = self.atn[decision_state].transitions.len();
			let ambig_alts: AltSet = match &reach.conflicting_alts {
				Some(conflicting) => conflicting.clone(),
				None => AltSet::of(reach.unique_alt),
			};
			match preds_for_ambig_alts(&ambig_alts, reach.configs(), nalts) {
				Some(alt_to_pred) => {
					predicates = predicate_predictions(&ambig_alts, &alt_to_pred);
					if predicates.is_some() {
						// leave the choice to evaluation time
						prediction = INVALID_ALT;
					} else {
						prediction = ambig_alts.min();
					}
				},
				None => prediction = ambig_alts.min(),
			}
		}

		let to: Arc<DfaState> = self.intern_state(dfa, reach, |state| {
			state.accept = accept;
			state.prediction = prediction as i32;
			state.requires_full_context = requires_full_context;
			state.predicates = predicates;
		});
		dfa.set_edge(previous, t, to.number);
		Some(to)
	}

	#[allow(clippy::too_many_arguments)]
	fn exec_atn_full_context(
		&self,
		dfa: &Dfa,
		input: &mut dyn TokenStream,
		start_index: usize,
		outer: &Arc<CallContext>,
		host: &mut dyn PredicateEvaluator,
		listener: &mut dyn PredictionListener,
		merges: &mut MergeCache,
	) -> Result<usize, RecognitionError> {
		let s0: ConfigSet = self.compute_start_state(
			dfa.atn_start_state,
			outer,
			true,
			start_index,
			merges,
			input,
			host,
		);

		let mut previous: ConfigSet = s0;
		input.seek(start_index);
		let mut t: i32 = input.la(1);

		let (predicted, reach, found_exact_ambig): (usize, ConfigSet, bool) = loop {
			let reach: Option<ConfigSet> = self.compute_reach_set(
				previous.configs(),
				true,
				t,
				start_index,
				merges,
				input,
				host,
			);
			let Some(mut reach) = reach else {
				let error: RecognitionError = RecognitionError::NoViableAlt {
					decision: dfa.decision,
					start_index,
					offending_index: input.index(),
				};
				input.seek(start_index);
				let alt: usize = self.best_fallback_alt(previous.configs(), host);
				if alt != INVALID_ALT {
					return Ok(alt);
				}
				return Err(error);
			};

			let alt_subsets: Vec<AltSet> = conflicting_alt_subsets(reach.configs());
			reach.unique_alt = unique_alt(reach.configs());
			if reach.unique_alt != INVALID_ALT {
				break (reach.unique_alt, reach, false);
			}
			if self.mode != PredictionMode::LlExactAmbigDetection {
				let predicted: usize = resolves_to_just_one_viable_alt(&alt_subsets);
				if predicted != INVALID_ALT {
					break (predicted, reach, false);
				}
			} else if all_subsets_conflict(&alt_subsets) && all_subsets_equal(&alt_subsets) {
				break (single_viable_alt(&alt_subsets), reach, true);
			}

			previous = reach;
			if t != EOF {
				input.consume();
				t = input.la(1);
			}
		};

		if reach.unique_alt != INVALID_ALT {
			/// The stack context disambiguated where SLL could not.
			listener.report_context_sensitivity(dfa.decision, predicted, start_index, input.index());
			return Ok(predicted);
		}

		let ambig_alts: AltSet = alts_of(reach.configs());
		listener.report_ambiguity(dfa.decision, start_index, input.index(), found_exact_ambig, &ambig_alts);
		Ok(predicted)
	}

	#[allow(clippy::too_many_arguments)]
	fn compute_reach_set(
		&self,
		closure: &[AtnConfig],
		full_ctx: bool,
		t: i32,
		start_index: usize,
		merges: &mut MergeCache,
		input: &mut dyn TokenStream,
		host: &mut dyn PredicateEvaluator,
	) -> Option<ConfigSet> {
		let atn: Arc<Atn> = self.atn.clone();
		let mut intermediate: ConfigSet = ConfigSet::new(full_ctx);
		let mut skipped_stop_states: Vec<AtnConfig> = Vec::new();

		for config in closure.iter() {
			if atn[config.state].kind == StateKind::RuleStop {
				if full_ctx || t == EOF {
					skipped_stop_states.push(config.clone());
				}
				continue;
			}
			for transition in atn[config.state].transitions.iter() {
				if transition.matches(t, 0, atn.max_token_type) {
					intermediate.add(config.transported(transition.target()), merges);
				}
			}
		}

		/// When every step is deterministic the intermediate set already
		/// is the reach; skip the closure pass.
		let mut reach_is_intermediate: bool = false;
		let mut reach: ConfigSet = if skipped_stop_states.is_empty()
			&& t != EOF
			&& (intermediate.len() == 1 || unique_alt(intermediate.configs()) != INVALID_ALT)
		{
			reach_is_intermediate = true;
			intermediate
		} else {
			let mut closed: ConfigSet = ConfigSet::new(full_ctx);
			let mut scope: ClosureScope<'_> = ClosureScope {
				full_ctx,
				treat_eof_as_epsilon: t == EOF,
				start_index,
				busy: FxHashSet::default(),
				merges: &mut *merges,
				input: &mut *input,
				host: &mut *host,
			};
			for config in intermediate.configs().iter() {
				self.closure_from(config.clone(), &mut closed, &mut scope, false, 0);
			}
			closed
		};

		if t == EOF {
			// At end of input only configurations that made it to a rule
			// stop (or can end the rule without more input) survive.
			reach = self.keep_rule_stop_configs(reach, reach_is_intermediate, merges);
		}

		if !skipped_stop_states.is_empty()
			&& (!full_ctx || !has_config_in_rule_stop_state(&self.atn, reach.configs()))
		{
			for config in skipped_stop_states.into_iter() {
				reach.add(config, merges);
			}
		}

		if reach.is_empty() {
			return None;
		}
		Some(reach)
	}

	fn keep_rule_stop_configs(
		&self,
		configs: ConfigSet,
		look_to_end_of_rule: bool,
		merges: &mut MergeCache,
	) -> ConfigSet {
		let atn: Arc<Atn> = self.atn.clone();
		if all_configs_in_rule_stop_states(&atn, configs.configs()) {
			return configs;
		}

		let mut result: ConfigSet = ConfigSet::new(configs.full_ctx);
		for config in configs.configs().iter() {
			if atn[config.state].kind == StateKind::RuleStop {
				result.add(config.clone(), merges);
				continue;
			}
			if look_to_end_of_rule && atn[config.state].only_epsilon_transitions() {
				let next: crate::interval::IntervalSet<i32> = atn.next_tokens(config.state);
				if next.contains(TOKEN_EPSILON) {
					let rule: usize = atn[config.state].rule.expect("state outside any rule");
					let stop: usize = atn.rule_to_stop_state[rule];
					result.add(config.transported(stop), merges);
				}
			}
		}
		result
	}

	#[allow(clippy::too_many_arguments)]
	fn compute_start_state(
		&self,
		p: usize,
		outer: &Arc<CallContext>,
		full_ctx: bool,
		start_index: usize,
		merges: &mut MergeCache,
		input: &mut dyn TokenStream,
		host: &mut dyn PredicateEvaluator,
	) -> ConfigSet {
		let atn: Arc<Atn> = self.atn.clone();
		let initial: Arc<PredictionContext> = context_from_call_stack(&atn, outer);
		let mut configs: ConfigSet = ConfigSet::new(full_ctx);
		let mut scope: ClosureScope<'_> = ClosureScope {
			full_ctx,
			treat_eof_as_epsilon: false,
			start_index,
			busy: FxHashSet::default(),
			merges,
			input,
			host,
		};

		for (i, transition) in atn[p].transitions.iter().enumerate() {
			let config: AtnConfig = AtnConfig::new(transition.target(), i + 1, initial.clone());
			self.closure_from(config, &mut configs, &mut scope, true, 0);
		}
		configs
	}

	/// Left-recursion entry: keep alternative 1 (the recursive
	/// continuations) only where the current precedence admits it, and
	/// drop primary-alternative duplicates it subsumes.
	fn apply_precedence_filter(
		&self,
		configs: ConfigSet,
		merges: &mut MergeCache,
		host: &mut dyn PredicateEvaluator,
	) -> ConfigSet {
		let mut states_from_alt1: FxHashMap<usize, Arc<PredictionContext>> = FxHashMap::default();
		let mut result: ConfigSet = ConfigSet::new(configs.full_ctx);

		for config in configs.configs().iter() {
			if config.alt != 1 {
				continue;
			}
			let Some(updated) = SemanticContext::eval_precedence(&config.semantic, host) else {
				// unsatisfiable at this precedence
				continue;
			};
			states_from_alt1.insert(config.state, config.context.clone());
			if *updated != *config.semantic {
				result.add(config.with_semantic(config.state, updated), merges);
			} else {
				result.add(config.clone(), merges);
			}
		}

		for config in configs.configs().iter() {
			if config.alt == 1 {
				continue;
			}
			if !config.precedence_filter_suppressed {
				if let Some(context) = states_from_alt1.get(&config.state) {
					if *context == config.context {
						continue;
					}
				}
			}
			result.add(config.clone(), merges);
		}

		result
	}

	/// ε-closure entry point; handles the rule-stop bookkeeping before
	/// delegating to the transition walk.
	fn closure_from(
		&self,
		config: AtnConfig,
		configs: &mut ConfigSet,
		scope: &mut ClosureScope<'_>,
		collect_predicates: bool,
		depth: i32,
	) {
		let atn: Arc<Atn> = self.atn.clone();

		if atn[config.state].kind == StateKind::RuleStop {
			if !config.context.is_empty() {
				for i in 0..config.context.size() {
					if config.context.return_state(i) == EMPTY_RETURN_STATE {
						if scope.full_ctx {
							configs.add(
								config.with_context(config.state, PredictionContext::empty()),
								scope.merges,
							);
						} else {
							// no stack information: chase follow links
							self.closure_work(config.clone(), configs, scope, collect_predicates, depth);
						}
						continue;
					}
					let return_state: usize = config.context.return_state(i);
					let parent: Arc<PredictionContext> = config
						.context
						.parent(i)
						.cloned()
						.expect("return state without parent");
					let popped: AtnConfig = config.with_context(return_state, parent);
					self.closure_from(popped, configs, scope, collect_predicates, depth - 1);
				}
				return;
			}
			if scope.full_ctx {
				// reached the end of the start rule with real context
				configs.add(config, scope.merges);
				return;
			}
		}

		self.closure_work(config, configs, scope, collect_predicates, depth);
	}

	fn closure_work(
		&self,
		config: AtnConfig,
		configs: &mut ConfigSet,
		scope: &mut ClosureScope<'_>,
		collect_predicates: bool,
		depth: i32,
	) {
		let atn: Arc<Atn> = self.atn.clone();
		let p: &crate::atn::AtnState = &atn[config.state];

		if !p.only_epsilon_transitions() {
			configs.add(config.clone(), scope.merges);
		}

		for transition in p.transitions.iter() {
			let continue_collecting: bool =
				collect_predicates && !matches!(transition, Transition::Action { .. });
			let child: Option<AtnConfig> =
				self.epsilon_target(&config, transition, scope, continue_collecting, depth == 0);
			let Some(mut child) = child else {
				continue;
			};

			let mut new_depth: i32 = depth;
			if p.kind == StateKind::RuleStop {
				/// Falling off the end of a rule into a caller we never
				/// saw pushed: the config now depends on outer context.
				assert!(!scope.full_ctx);
				child.outer_depth += 1;
				if !scope.busy.insert(child.clone()) {
					continue;
				}
				configs.dips_into_outer_context = true;
				new_depth -= 1;
			} else if !transition.is_epsilon() {
				// EOF-as-epsilon steps can revisit; bound them
				if !scope.busy.insert(child.clone()) {
					continue;
				}
			} else if matches!(transition, Transition::Rule { .. }) {
				// latch: once we pop below the entry depth, pushes no
				// longer count back up
				if new_depth >= 0 {
					new_depth += 1;
				}
			}

			self.closure_from(child, configs, scope, continue_collecting, new_depth);
		}
	}

	fn epsilon_target(
		&self,
		config: &AtnConfig,
		transition: &Transition,
		scope: &mut ClosureScope<'_>,
		collect_predicates: bool,
		in_context: bool,
	) -> Option<AtnConfig> {
		match transition {
			Transition::Rule { target, follow, .. } => {
				let context: Arc<PredictionContext> =
					PredictionContext::singleton(config.context.clone(), *follow);
				Some(config.with_context(*target, context))
			},
			Transition::Precedence { target, precedence } => {
				if collect_predicates && in_context {
					if scope.full_ctx {
						/// Evaluate now against the token the decision
						/// started at, then restore the stream.
						let current: usize = scope.input.index();
						scope.input.seek(scope.start_index);
						let passes: bool = scope.host.precpred(*precedence);
						scope.input.seek(current);
						passes.then(|| config.transported(*target))
					} else {
						let semantic: Arc<SemanticContext> = SemanticContext::and(
							&config.semantic,
							&SemanticContext::precedence(*precedence),
						);
						Some(config.with_semantic(*target, semantic))
					}
				} else {
					Some(config.transported(*target))
				}
			},
			Transition::Predicate {
				target,
				rule,
				pred,
				ctx_dependent,
			} => {
				if collect_predicates && (!ctx_dependent || in_context) {
					if scope.full_ctx {
						let current: usize = scope.input.index();
						scope.input.seek(scope.start_index);
						let passes: bool = scope.host.sempred(*rule, *pred);
						scope.input.seek(current);
						passes.then(|| config.transported(*target))
					} else {
						let semantic: Arc<SemanticContext> = SemanticContext::and(
							&config.semantic,
							&SemanticContext::predicate(*rule, *pred, *ctx_dependent),
						);
						Some(config.with_semantic(*target, semantic))
					}
				} else {
					Some(config.transported(*target))
				}
			},
			Transition::Action { target, .. } => Some(config.transported(*target)),
			Transition::Epsilon { target } => Some(config.transported(*target)),
			Transition::Atom { .. }
			| Transition::Range { .. }
			| Transition::Set { .. }
			| Transition::NotSet { .. }
			| Transition::Wildcard { .. } => {
				if scope.treat_eof_as_epsilon && transition.matches(EOF, 0, 1) {
					Some(config.transported(transition.target()))
				} else {
					None
				}
			},
		}
	}

	/// Prefer a syntactically valid alternative that finished the
	/// decision entry rule; failing that, a semantically invalid one
	/// that did. [`INVALID_ALT`] when neither exists.
	fn best_fallback_alt(
		&self,
		configs: &[AtnConfig],
		host: &mut dyn PredicateEvaluator,
	) -> usize {
		let mut sem_valid: Vec<AtnConfig> = Vec::new();
		let mut sem_invalid: Vec<AtnConfig> = Vec::new();
		for config in configs.iter() {
			if config.semantic.is_none() || config.semantic.eval(host) {
				sem_valid.push(config.clone());
			} else {
				sem_invalid.push(config.clone());
			}
		}

		let alt: usize = self.alt_that_finished_entry_rule(&sem_valid);
		if alt != INVALID_ALT {
			return alt;
		}
		self.alt_that_finished_entry_rule(&sem_invalid)
	}

	fn alt_that_finished_entry_rule(&self, configs: &[AtnConfig]) -> usize {
		let mut alts: AltSet = AltSet::new();
		for config in configs.iter() {
			let at_stop: bool = self.atn[config.state].kind == StateKind::RuleStop;
			if config.outer_depth > 0 || (at_stop && config.context.has_empty_path()) {
				alts.insert(config.alt);
			}
		}
		alts.min()
	}

	fn intern_state(
		&self,
		dfa: &Dfa,
		mut configs: ConfigSet,
		populate: impl FnOnce(&mut DfaState),
	) -> Arc<DfaState> {
		configs.optimize_configs(&self.cache);
		dfa.add_state(Arc::new(configs.freeze()), populate)
	}
}

fn is_precedence_decision(atn: &Atn, state: usize) -> bool {
	let s: &crate::atn::AtnState = &atn[state];
	s.kind == StateKind::StarLoopEntry
		&& s.rule
			.is_some_and(|rule| atn[atn.rule_to_start_state[rule]].precedence_rule)
}

fn eval_predicted_alts(
	predicates: &[PredictedAlt],
	host: &mut dyn PredicateEvaluator,
	complete: bool,
) -> AltSet {
	let mut predictions: AltSet = AltSet::new();
	for pair in predicates.iter() {
		if pair.semantic.is_none() || pair.semantic.eval(host) {
			predictions.insert(pair.alt);
			if !complete {
				break;
			}
		}
	}
	predictions
}

/// OR together the semantic contexts per ambiguous alternative. `None`
/// when no alternative carries a real predicate.
fn preds_for_ambig_alts(
	ambig_alts: &AltSet,
	configs: &[AtnConfig],
	nalts: usize,
) -> Option<Vec<Arc<SemanticContext>>> {
	let mut alt_to_pred: Vec<Option<Arc<SemanticContext>>> = vec![None; nalts + 1];
	for config in configs.iter() {
		if ambig_alts.contains(config.alt) {
			alt_to_pred[config.alt] = Some(match &alt_to_pred[config.alt] {
				Some(existing) => SemanticContext::or(existing, &config.semantic),
				None => config.semantic.clone(),
			});
		}
	}

	let resolved: Vec<Arc<SemanticContext>> = alt_to_pred
		.into_iter()
		.map(|pred| pred.unwrap_or_else(SemanticContext::none))
		.collect::<Vec<_>>();

	let n_real: usize = resolved.iter().filter(|pred| !pred.is_none()).count();
	if n_real == 0 {
		return None;
	}
	Some(resolved)
}

fn predicate_predictions(
	ambig_alts: &AltSet,
	alt_to_pred: &[Arc<SemanticContext>],
) -> Option<Vec<PredictedAlt>> {
	let mut pairs: Vec<PredictedAlt> = Vec::new();
	let mut contains_predicate: bool = false;
	for (alt, pred) in alt_to_pred.iter().enumerate().skip(1) {
		if ambig_alts.contains(alt) {
			pairs.push(PredictedAlt {
				semantic: pred.clone(),
				alt,
			});
		}
		if !pred.is_none() {
			contains_predicate = true;
		}
	}
	contains_predicate.then_some(pairs)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::atn::GrammarKind;
	use crate::stream::BufferedTokenStream;
	use crate::token::CHANNEL_DEFAULT;
	use crate::token::Token;
	use crate::token::TokenSource;

	const TOKEN_A: i32 = 1;
	const TOKEN_B: i32 = 2;
	const TOKEN_INT: i32 = 1;
	const TOKEN_STAR: i32 = 2;
	const TOKEN_PLUS: i32 = 3;

	struct CannedSource {
		kinds: Vec<i32>,
		at: usize,
	}

	impl TokenSource for CannedSource {
		fn next_token(&mut self) -> Token {
			let kind: i32 = self.kinds.get(self.at).copied().unwrap_or(EOF);
			self.at += 1;
			Token {
				kind,
				line: 1,
				column: self.at,
				channel: CHANNEL_DEFAULT,
				span: self.at..self.at + 1,
				index: None,
				text: None,
			}
		}
	}

	fn stream(kinds: &[i32]) -> BufferedTokenStream<CannedSource> {
		BufferedTokenStream::new(CannedSource {
			kinds: kinds.to_vec(),
			at: 0,
		})
	}

	#[derive(Default)]
	struct Recording {
		attempting_full: Vec<usize>,
		context_sensitive: Vec<(usize, usize)>,
		ambiguities: Vec<(usize, Vec<usize>, bool)>,
	}

	impl PredictionListener for Recording {
		fn report_attempting_full_context(
			&mut self,
			decision: usize,
			_conflicting: &AltSet,
			_start_index: usize,
			_stop_index: usize,
		) {
			self.attempting_full.push(decision);
		}

		fn report_context_sensitivity(
			&mut self,
			decision: usize,
			prediction: usize,
			_start_index: usize,
			_stop_index: usize,
		) {
			self.context_sensitive.push((decision, prediction));
		}

		fn report_ambiguity(
			&mut self,
			decision: usize,
			_start_index: usize,
			_stop_index: usize,
			exact: bool,
			ambig_alts: &AltSet,
		) {
			self.ambiguities
				.push((decision, ambig_alts.iter().collect::<Vec<_>>(), exact));
		}
	}

	/// s: A B | C ;  (decision 0 at the block start)
	fn two_alt_atn(second_alt_first_token: i32) -> Atn {
		let mut atn: Atn = Atn::new(GrammarKind::Parser, 3);
		let start: usize = atn.add_state(StateKind::RuleStart, Some(0));
		let stop: usize = atn.add_state(StateKind::RuleStop, Some(0));
		atn.rule_to_start_state = vec![start];
		atn.rule_to_stop_state = vec![stop];

		let block: usize = atn.add_state(StateKind::BlockStart, Some(0));
		let end: usize = atn.add_state(StateKind::BlockEnd, Some(0));
		atn[block].paired_state = Some(end);
		atn.add_decision(block);
		atn.add_transition(start, Transition::Epsilon { target: block });

		let a1: usize = atn.add_state(StateKind::Basic, Some(0));
		let a2: usize = atn.add_state(StateKind::Basic, Some(0));
		atn.add_transition(block, Transition::Epsilon { target: a1 });
		atn.add_transition(a1, Transition::Atom { target: a2, label: TOKEN_A });
		atn.add_transition(a2, Transition::Atom { target: end, label: TOKEN_B });

		let b1: usize = atn.add_state(StateKind::Basic, Some(0));
		atn.add_transition(block, Transition::Epsilon { target: b1 });
		atn.add_transition(b1, Transition::Atom { target: end, label: second_alt_first_token });

		atn.add_transition(end, Transition::Epsilon { target: stop });
		atn
	}

	#[test]
	fn unique_alternative_is_immediate() {
		let atn: Arc<Atn> = Arc::new(two_alt_atn(3));
		let sim: ParserSimulator = ParserSimulator::new(atn);
		let root: Arc<CallContext> = CallContext::root();

		let mut input = stream(&[TOKEN_A, TOKEN_B]);
		let alt: usize = sim
			.adaptive_predict(&mut input, 0, &root, 0, &mut (), &mut ())
			.unwrap();
		assert_eq!(alt, 1);
		// prediction must not consume the stream
		assert_eq!(input.index(), 0);

		let mut input = stream(&[3]);
		let alt: usize = sim
			.adaptive_predict(&mut input, 0, &root, 0, &mut (), &mut ())
			.unwrap();
		assert_eq!(alt, 2);
	}

	#[test]
	fn memoized_prediction_reuses_the_dfa() {
		let atn: Arc<Atn> = Arc::new(two_alt_atn(3));
		let sim: ParserSimulator = ParserSimulator::new(atn);
		let root: Arc<CallContext> = CallContext::root();

		let mut input = stream(&[TOKEN_A, TOKEN_B]);
		sim.adaptive_predict(&mut input, 0, &root, 0, &mut (), &mut ()).unwrap();
		let grown: usize = sim.dfa(0).len();
		assert!(grown > 0);

		// same token sequence again: pure DFA walk, no new states
		let mut input = stream(&[TOKEN_A, TOKEN_B]);
		sim.adaptive_predict(&mut input, 0, &root, 0, &mut (), &mut ()).unwrap();
		assert_eq!(sim.dfa(0).len(), grown);

		// a forked instance sees the same memoization
		let forked: ParserSimulator = sim.fork();
		let mut input = stream(&[TOKEN_A, TOKEN_B]);
		forked.adaptive_predict(&mut input, 0, &root, 0, &mut (), &mut ()).unwrap();
		assert_eq!(forked.dfa(0).len(), grown);
	}

	#[test]
	fn no_viable_alternative_errors() {
		let atn: Arc<Atn> = Arc::new(two_alt_atn(3));
		let sim: ParserSimulator = ParserSimulator::new(atn);
		let root: Arc<CallContext> = CallContext::root();

		let mut input = stream(&[TOKEN_B]);
		let error: RecognitionError = sim
			.adaptive_predict(&mut input, 0, &root, 0, &mut (), &mut ())
			.unwrap_err();
		assert!(matches!(
			error,
			RecognitionError::NoViableAlt { decision: 0, start_index: 0, .. }
		));
	}

	/// s: A B | A B ;  — genuinely ambiguous.
	#[test]
	fn ambiguity_reports_and_takes_minimum_alt() {
		let mut atn: Atn = Atn::new(GrammarKind::Parser, 3);
		let start: usize = atn.add_state(StateKind::RuleStart, Some(0));
		let stop: usize = atn.add_state(StateKind::RuleStop, Some(0));
		atn.rule_to_start_state = vec![start];
		atn.rule_to_stop_state = vec![stop];

		let block: usize = atn.add_state(StateKind::BlockStart, Some(0));
		let end: usize = atn.add_state(StateKind::BlockEnd, Some(0));
		atn[block].paired_state = Some(end);
		atn.add_decision(block);
		atn.add_transition(start, Transition::Epsilon { target: block });
		for _ in 0..2 {
			let s1: usize = atn.add_state(StateKind::Basic, Some(0));
			let s2: usize = atn.add_state(StateKind::Basic, Some(0));
			atn.add_transition(block, Transition::Epsilon { target: s1 });
			atn.add_transition(s1, Transition::Atom { target: s2, label: TOKEN_A });
			atn.add_transition(s2, Transition::Atom { target: end, label: TOKEN_B });
		}
		atn.add_transition(end, Transition::Epsilon { target: stop });

		let sim: ParserSimulator = ParserSimulator::new(Arc::new(atn));
		let root: Arc<CallContext> = CallContext::root();
		let mut listener: Recording = Recording::default();

		let mut input = stream(&[TOKEN_A, TOKEN_B]);
		let alt: usize = sim
			.adaptive_predict(&mut input, 0, &root, 0, &mut (), &mut listener)
			.unwrap();

		assert_eq!(alt, 1);
		assert_eq!(listener.attempting_full, vec![0]);
		assert_eq!(listener.ambiguities.len(), 1);
		let (decision, alts, _exact): &(usize, Vec<usize>, bool) = &listener.ambiguities[0];
		assert_eq!(*decision, 0);
		assert_eq!(*alts, vec![1, 2]);
	}

	#[test]
	fn sll_mode_resolves_silently() {
		let mut atn: Atn = two_alt_atn(3);
		// make the grammar ambiguous: second alternative also A B.
		// state 6 is the second alternative's entry, 3 the block end.
		let b1: usize = 6;
		atn[b1].transitions.clear();
		let b2: usize = atn.add_state(StateKind::Basic, Some(0));
		atn.add_transition(b1, Transition::Atom { target: b2, label: TOKEN_A });
		atn.add_transition(b2, Transition::Atom { target: 3, label: TOKEN_B });

		let mut sim: ParserSimulator = ParserSimulator::new(Arc::new(atn));
		sim.mode = PredictionMode::Sll;
		let root: Arc<CallContext> = CallContext::root();
		let mut listener: Recording = Recording::default();

		let mut input = stream(&[TOKEN_A, TOKEN_B]);
		let alt: usize = sim
			.adaptive_predict(&mut input, 0, &root, 0, &mut (), &mut listener)
			.unwrap();
		assert_eq!(alt, 1);
		assert!(listener.attempting_full.is_empty());
		assert!(listener.ambiguities.is_empty());
	}

	struct PredHost {
		answers: Vec<bool>,
	}

	impl PredicateEvaluator for PredHost {
		fn sempred(&mut self, _rule: usize, pred: usize) -> bool {
			self.answers[pred]
		}
	}

	/// s: {p0}? A | {p1}? A ;  — predicates break the tie at the end.
	#[test]
	fn predicates_select_among_ambiguous_alts() {
		let mut atn: Atn = Atn::new(GrammarKind::Parser, 2);
		let start: usize = atn.add_state(StateKind::RuleStart, Some(0));
		let stop: usize = atn.add_state(StateKind::RuleStop, Some(0));
		atn.rule_to_start_state = vec![start];
		atn.rule_to_stop_state = vec![stop];

		let block: usize = atn.add_state(StateKind::BlockStart, Some(0));
		let end: usize = atn.add_state(StateKind::BlockEnd, Some(0));
		atn[block].paired_state = Some(end);
		atn.add_decision(block);
		atn.add_transition(start, Transition::Epsilon { target: block });
		for pred in 0..2 {
			let gate: usize = atn.add_state(StateKind::Basic, Some(0));
			let body: usize = atn.add_state(StateKind::Basic, Some(0));
			atn.add_transition(block, Transition::Epsilon { target: gate });
			atn.add_transition(
				gate,
				Transition::Predicate {
					target: body,
					rule: 0,
					pred,
					ctx_dependent: false,
				},
			);
			atn.add_transition(body, Transition::Atom { target: end, label: TOKEN_A });
		}
		atn.add_transition(end, Transition::Epsilon { target: stop });

		let sim: ParserSimulator = ParserSimulator::new(Arc::new(atn));
		let root: Arc<CallContext> = CallContext::root();

		let mut host: PredHost = PredHost {
			answers: vec![false, true],
		};
		let mut input = stream(&[TOKEN_A]);
		let alt: usize = sim
			.adaptive_predict(&mut input, 0, &root, 0, &mut host, &mut ())
			.unwrap();
		assert_eq!(alt, 2);

		let mut host: PredHost = PredHost {
			answers: vec![true, true],
		};
		let mut input = stream(&[TOKEN_A]);
		let alt: usize = sim
			.adaptive_predict(&mut input, 0, &root, 0, &mut host, &mut ())
			.unwrap();
		assert_eq!(alt, 1);
	}

	/// The left-recursion transform of `e : e '*' e | e '+' e | INT`,
	/// as a hand-rolled recursive-descent driver around the predictor:
	///
	///   e[p] : INT ( {2>=p}? '*' e[3] | {1>=p}? '+' e[2] )* ;
	struct ExprAtn {
		atn: Arc<Atn>,
		loop_decision: usize,
		op_decision: usize,
	}

	fn expression_atn() -> ExprAtn {
		let mut atn: Atn = Atn::new(GrammarKind::Parser, 3);
		let start: usize = atn.add_state(StateKind::RuleStart, Some(0));
		let stop: usize = atn.add_state(StateKind::RuleStop, Some(0));
		atn[start].precedence_rule = true;
		atn.rule_to_start_state = vec![start];
		atn.rule_to_stop_state = vec![stop];

		let after_int: usize = atn.add_state(StateKind::Basic, Some(0));
		atn.add_transition(start, Transition::Atom { target: after_int, label: TOKEN_INT });

		let entry: usize = atn.add_state(StateKind::StarLoopEntry, Some(0));
		let block: usize = atn.add_state(StateKind::StarBlockStart, Some(0));
		let block_end: usize = atn.add_state(StateKind::BlockEnd, Some(0));
		let loop_back: usize = atn.add_state(StateKind::StarLoopBack, Some(0));
		let loop_end: usize = atn.add_state(StateKind::LoopEnd, Some(0));
		atn[block].paired_state = Some(block_end);
		atn[loop_end].paired_state = Some(loop_back);
		let loop_decision: usize = atn.add_decision(entry);
		let op_decision: usize = atn.add_decision(block);

		atn.add_transition(after_int, Transition::Epsilon { target: entry });
		atn.add_transition(entry, Transition::Epsilon { target: block });
		atn.add_transition(entry, Transition::Epsilon { target: loop_end });
		atn.add_transition(loop_end, Transition::Epsilon { target: stop });
		atn.add_transition(block_end, Transition::Epsilon { target: loop_back });
		atn.add_transition(loop_back, Transition::Epsilon { target: entry });

		// ( {2>=p}? '*' e[3]  |  {1>=p}? '+' e[2] )
		let mut branch = |atn: &mut Atn, precedence: usize, op: i32, next_prec: usize| {
			let gate: usize = atn.add_state(StateKind::Basic, Some(0));
			let after_op: usize = atn.add_state(StateKind::Basic, Some(0));
			let call: usize = atn.add_state(StateKind::Basic, Some(0));
			atn.add_transition(block, Transition::Epsilon { target: gate });
			atn.add_transition(
				gate,
				Transition::Precedence {
					target: after_op,
					precedence,
				},
			);
			let op_state: usize = atn.add_state(StateKind::Basic, Some(0));
			atn.add_transition(after_op, Transition::Atom { target: op_state, label: op });
			atn.add_transition(
				op_state,
				Transition::Rule {
					target: start,
					rule: 0,
					precedence: next_prec,
					follow: call,
				},
			);
			atn.add_transition(call, Transition::Epsilon { target: block_end });
			call
		};
		let call_after_star: usize = branch(&mut atn, 2, TOKEN_STAR, 3);
		let call_after_plus: usize = branch(&mut atn, 1, TOKEN_PLUS, 2);

		// the enclosing rule, s : e EOF ; — gives the loop exit a
		// caller to fall back into
		let s_start: usize = atn.add_state(StateKind::RuleStart, Some(1));
		let s_after: usize = atn.add_state(StateKind::Basic, Some(1));
		let s_stop: usize = atn.add_state(StateKind::RuleStop, Some(1));
		atn.add_transition(
			s_start,
			Transition::Rule {
				target: start,
				rule: 0,
				precedence: 0,
				follow: s_after,
			},
		);
		atn.add_transition(s_after, Transition::Atom { target: s_stop, label: EOF });
		atn.rule_to_start_state = vec![start, s_start];
		atn.rule_to_stop_state = vec![stop, s_stop];

		// return edges out of the rule stop, one per call site
		atn.add_transition(stop, Transition::Epsilon { target: call_after_star });
		atn.add_transition(stop, Transition::Epsilon { target: call_after_plus });
		atn.add_transition(stop, Transition::Epsilon { target: s_after });

		ExprAtn {
			atn: Arc::new(atn),
			loop_decision,
			op_decision,
		}
	}

	struct PrecedenceHost {
		current: usize,
	}

	impl PredicateEvaluator for PrecedenceHost {
		fn precpred(&mut self, precedence: usize) -> bool {
			precedence >= self.current
		}
	}

	struct ExprParser<'a> {
		expr: &'a ExprAtn,
		sim: ParserSimulator,
		input: BufferedTokenStream<CannedSource>,
	}

	impl ExprParser<'_> {
		fn parse(&mut self, precedence: usize) -> String {
			let root: Arc<CallContext> = CallContext::root();
			assert_eq!(self.input.la(1), TOKEN_INT);
			self.input.consume();
			let mut node: String = format!("(e {})", TOKEN_INT);

			loop {
				let mut host: PrecedenceHost = PrecedenceHost { current: precedence };
				let enter: usize = self
					.sim
					.adaptive_predict(&mut self.input, self.expr.loop_decision, &root, precedence, &mut host, &mut ())
					.unwrap();
				if enter == 2 {
					return node;
				}

				let mut host: PrecedenceHost = PrecedenceHost { current: precedence };
				let op_alt: usize = self
					.sim
					.adaptive_predict(&mut self.input, self.expr.op_decision, &root, precedence, &mut host, &mut ())
					.unwrap();
				let (op, next_prec): (&str, usize) = match op_alt {
					1 => ("*", 3),
					_ => ("+", 2),
				};
				self.input.consume();
				let rhs: String = self.parse(next_prec);
				node = format!("(e {node} {op} {rhs})");
			}
		}
	}

	#[test]
	fn precedence_climbing_shapes_the_tree() {
		let expr: ExprAtn = expression_atn();

		// 1 + 2 * 3  →  the product binds tighter
		let mut parser: ExprParser<'_> = ExprParser {
			sim: ParserSimulator::new(expr.atn.clone()),
			input: stream(&[TOKEN_INT, TOKEN_PLUS, TOKEN_INT, TOKEN_STAR, TOKEN_INT]),
			expr: &expr,
		};
		let tree: String = parser.parse(0);
		assert_eq!(tree, "(e (e 1) + (e (e 1) * (e 1)))");

		// 1 * 2 + 3  →  left-associative climb
		let mut parser: ExprParser<'_> = ExprParser {
			sim: ParserSimulator::new(expr.atn.clone()),
			input: stream(&[TOKEN_INT, TOKEN_STAR, TOKEN_INT, TOKEN_PLUS, TOKEN_INT]),
			expr: &expr,
		};
		let tree: String = parser.parse(0);
		assert_eq!(tree, "(e (e (e 1) * (e 1)) + (e 1))");
	}

	#[test]
	fn precedence_dfa_start_states_are_keyed() {
		let expr: ExprAtn = expression_atn();
		let sim: ParserSimulator = ParserSimulator::new(expr.atn.clone());
		assert!(sim.dfa(expr.loop_decision).is_precedence_dfa());

		let root: Arc<CallContext> = CallContext::root();
		// at precedence 3 neither operator may continue the loop
		let mut host: PrecedenceHost = PrecedenceHost { current: 3 };
		let mut input = stream(&[TOKEN_PLUS, TOKEN_INT]);
		let alt: usize = sim
			.adaptive_predict(&mut input, expr.loop_decision, &root, 3, &mut host, &mut ())
			.unwrap();
		assert_eq!(alt, 2);

		// at precedence 0 the same lookahead enters the loop
		let mut host: PrecedenceHost = PrecedenceHost { current: 0 };
		let mut input = stream(&[TOKEN_PLUS, TOKEN_INT]);
		let alt: usize = sim
			.adaptive_predict(&mut input, expr.loop_decision, &root, 0, &mut host, &mut ())
			.unwrap();
		assert_eq!(alt, 1);

		assert!(sim.dfa(expr.loop_decision).precedence_s0(3).is_some());
		assert!(sim.dfa(expr.loop_decision).precedence_s0(0).is_some());
	}
}
