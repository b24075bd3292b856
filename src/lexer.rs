use std::sync::Arc;

use crate::atn::Atn;
use crate::atn::INVALID_ALT;
use crate::atn::StateKind;
use crate::atn::Transition;
use crate::config::AtnConfig;
use crate::config::ConfigSet;
use crate::context::ContextCache;
use crate::context::MergeCache;
use crate::context::PredictionContext;
use crate::dfa::Dfa;
use crate::dfa::DfaState;
use crate::dfa::ERROR_TARGET;
use crate::errors::LexerNoViableAlt;
use crate::errors::SyntaxErrorListener;
use crate::semantics::PredicateEvaluator;
use crate::stream::CharStream;
use crate::token::CHANNEL_DEFAULT;
use crate::token::CommonTokenFactory;
use crate::token::EOF;
use crate::token::TOKEN_INVALID;
use crate::token::Token;
use crate::token::TokenFactory;
use crate::token::TokenSource;

/// What a rule's accept action asks the driver to do. Generated lexers
/// map their action indices to these.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LexerCommand {
	Skip,
	More,
	Kind(i32),
	Channel(usize),
	Mode(usize),
	PushMode(usize),
	PopMode,
}

/// Host hooks of a generated lexer: predicate evaluation plus accept-time
/// actions. The unit host has no predicates and no actions.
pub trait LexerHost: PredicateEvaluator {
	fn action(&mut self, rule: usize, action: usize) -> Vec<LexerCommand> {
		let _ = (rule, action);
		Vec::new()
	}
}

impl LexerHost for () {}

/// A successful match: the token type plus whatever commands the accept
/// action issued.
#[derive(Debug)]
pub struct MatchOutcome {
	pub token_type: i32,
	pub commands: Vec<LexerCommand>,
}

#[derive(Debug)]
struct SimAccept {
	index: usize,
	line: usize,
	column: usize,
	state: Arc<DfaState>,
}

/// Greedy longest-match scanner: drives the ATN for the current mode,
/// memoizing every computed step into the shared per-mode DFA.
///
/// One instance is single-threaded per call; the `Dfa` tables and the
/// context cache it writes through are shared across instances (and
/// threads) via [`LexerSimulator::fork`].
#[derive(Debug)]
pub struct LexerSimulator {
	atn: Arc<Atn>,
	dfas: Arc<[Dfa]>,
	cache: Arc<ContextCache>,
	pub line: usize,
	pub column: usize,
	start_index: usize,
	prev_accept: Option<SimAccept>,
}

impl LexerSimulator {
	pub fn new(atn: Arc<Atn>) -> Self {
		let dfas: Arc<[Dfa]> = atn
			.mode_to_start_state
			.iter()
			.enumerate()
			.map(|(mode, &start)| Dfa::for_mode(mode, start))
			.collect::<Arc<[_]>>();
		Self {
			atn,
			dfas,
			cache: Arc::new(ContextCache::new()),
			line: 1,
			column: 0,
			start_index: 0,
			prev_accept: None,
		}
	}

	/// A fresh simulator over the same ATN, DFAs and context cache.
	/// This is how concurrent lexers share their memoization.
	pub fn fork(&self) -> Self {
		Self {
			atn: self.atn.clone(),
			dfas: self.dfas.clone(),
			cache: self.cache.clone(),
			line: 1,
			column: 0,
			start_index: 0,
			prev_accept: None,
		}
	}

	pub fn atn(&self) -> &Arc<Atn> {
		&self.atn
	}

	pub fn dfa(&self, mode: usize) -> &Dfa {
		&self.dfas[mode]
	}

	pub fn reset(&mut self) {
		self.line = 1;
		self.column = 0;
		self.start_index = 0;
		self.prev_accept = None;
	}

	/// Match one token at the current input position in `mode`.
	pub fn match_token(
		&mut self,
		input: &mut dyn CharStream,
		mode: usize,
		host: &mut dyn LexerHost,
	) -> Result<MatchOutcome, LexerNoViableAlt> {
		let marker: isize = input.mark();
		let result: Result<MatchOutcome, LexerNoViableAlt> = self.match_inner(input, mode, host);
		input.release(marker);
		result
	}

	fn match_inner(
		&mut self,
		input: &mut dyn CharStream,
		mode: usize,
		host: &mut dyn LexerHost,
	) -> Result<MatchOutcome, LexerNoViableAlt> {
		self.start_index = input.index();
		self.prev_accept = None;
		match self.dfas[mode].s0() {
			Some(s0) => self.exec_atn(input, mode, s0, host),
			None => self.match_atn(input, mode, host),
		}
	}

	/// First time through this mode: build the start state, publish it as
	/// `s0` unless a predicate made it input-dependent.
	fn match_atn(
		&mut self,
		input: &mut dyn CharStream,
		mode: usize,
		host: &mut dyn LexerHost,
	) -> Result<MatchOutcome, LexerNoViableAlt> {
		let start_state: usize = self.atn.mode_to_start_state[mode];
		debug!("matchATN mode {mode} start {start_state}");

		let mut s0_closure: ConfigSet = self.compute_start_state(input, start_state, host);
		let suppress_edge: bool = s0_closure.has_semantic_context;
		s0_closure.has_semantic_context = false;

		let next: Arc<DfaState> = self.add_dfa_state(mode, s0_closure);
		if !suppress_edge {
			self.dfas[mode].set_s0(&next);
		}

		self.exec_atn(input, mode, next, host)
	}

	fn exec_atn(
		&mut self,
		input: &mut dyn CharStream,
		mode: usize,
		ds0: Arc<DfaState>,
		host: &mut dyn LexerHost,
	) -> Result<MatchOutcome, LexerNoViableAlt> {
		let mut t: i32 = input.la(1);
		let mut s: Arc<DfaState> = ds0;

		loop {
			/// Reuse a published edge when there is one; otherwise do the
			/// reach computation and publish what it found.
			let target: Option<Arc<DfaState>> = match self.dfas[mode].edge(&s, t) {
				Some(ERROR_TARGET) => None,
				Some(number) => {
					debug!("reuse state {} edge on {t}", s.number);
					Some(self.dfas[mode].state(number))
				},
				None => self.compute_target_state(input, mode, &s, t, host),
			};

			let Some(target) = target else {
				break;
			};

			if target.accept {
				self.capture_accept(input, &target);
				if t == EOF {
					break;
				}
			}

			if t != EOF {
				self.consume(input);
				t = input.la(1);
			}

			s = target;
		}

		self.fail_or_accept(input, mode, &s, t, host)
	}

	/// Reach + closure for one symbol. `None` means the ERROR sentinel:
	/// the failure is published so the DFA remembers it too.
	fn compute_target_state(
		&mut self,
		input: &mut dyn CharStream,
		mode: usize,
		s: &Arc<DfaState>,
		t: i32,
		host: &mut dyn LexerHost,
	) -> Option<Arc<DfaState>> {
		let mut reach: ConfigSet = ConfigSet::ordered();
		self.reachable_config_set(input, s.configs.configs(), &mut reach, t, host);

		if reach.is_empty() {
			self.dfas[mode].set_edge(s, t, ERROR_TARGET);
			return None;
		}

		let suppress_edge: bool = reach.has_semantic_context;
		reach.has_semantic_context = false;

		let to: Arc<DfaState> = self.add_dfa_state(mode, reach);
		if !suppress_edge {
			self.dfas[mode].set_edge(s, t, to.number);
		}
		Some(to)
	}

	/// Fill `reach` from `closure` on symbol `t`. Once some alternative
	/// hits its rule stop, later (lower-priority) configs of the same
	/// alternative on a non-greedy path are pruned.
	fn reachable_config_set(
		&mut self,
		input: &mut dyn CharStream,
		closure: &[AtnConfig],
		reach: &mut ConfigSet,
		t: i32,
		host: &mut dyn LexerHost,
	) {
		let atn: Arc<Atn> = self.atn.clone();
		let mut merges: MergeCache = MergeCache::new();
		let mut skip_alt: usize = INVALID_ALT;

		for config in closure.iter() {
			let current_alt_reached_accept: bool = config.alt == skip_alt;
			if current_alt_reached_accept && config.passed_non_greedy {
				continue;
			}

			debug!("testing {t} at state {} alt {}", config.state, config.alt);

			for transition in atn[config.state].transitions.iter() {
				if !transition.matches(t, crate::atn::MIN_CHAR, crate::atn::MAX_CHAR) {
					continue;
				}
				let child: AtnConfig = self.lexer_child(config, transition.target());
				if self.closure(input, child, reach, current_alt_reached_accept, true, &mut merges, host) {
					// this alt just reached an accept state; everything
					// after it for the same alt is lower priority
					skip_alt = config.alt;
					break;
				}
			}
		}
	}

	fn compute_start_state(
		&mut self,
		input: &mut dyn CharStream,
		mode_start: usize,
		host: &mut dyn LexerHost,
	) -> ConfigSet {
		let atn: Arc<Atn> = self.atn.clone();
		let initial: Arc<PredictionContext> = PredictionContext::empty();
		let mut configs: ConfigSet = ConfigSet::ordered();
		let mut merges: MergeCache = MergeCache::new();

		for (i, transition) in atn[mode_start].transitions.iter().enumerate() {
			let config: AtnConfig = AtnConfig::new(transition.target(), i + 1, initial.clone());
			self.closure(input, config, &mut configs, false, false, &mut merges, host);
		}
		configs
	}

	/// ε-closure. Returns whether the current alternative reached an
	/// accept state (a rule stop with no more context to pop).
	fn closure(
		&mut self,
		input: &mut dyn CharStream,
		config: AtnConfig,
		configs: &mut ConfigSet,
		mut current_alt_reached_accept: bool,
		speculative: bool,
		merges: &mut MergeCache,
		host: &mut dyn LexerHost,
	) -> bool {
		let atn: Arc<Atn> = self.atn.clone();
		debug!("closure at state {} alt {}", config.state, config.alt);

		if atn[config.state].kind == StateKind::RuleStop {
			if config.context.is_empty() {
				configs.add(config, merges);
				return true;
			}
			if config.context.has_empty_path() {
				configs.add(
					config.with_context(config.state, PredictionContext::empty()),
					merges,
				);
				current_alt_reached_accept = true;
			}
			for i in 0..config.context.size() {
				let return_state: usize = config.context.return_state(i);
				if return_state == crate::context::EMPTY_RETURN_STATE {
					continue;
				}
				// pop one call frame and keep closing
				let parent: Arc<PredictionContext> =
					config.context.parent(i).cloned().expect("return state without parent");
				let popped: AtnConfig = config.with_context(return_state, parent);
				current_alt_reached_accept = self.closure(
					input,
					popped,
					configs,
					current_alt_reached_accept,
					speculative,
					merges,
					host,
				);
			}
			return current_alt_reached_accept;
		}

		if !atn[config.state].only_epsilon_transitions()
			&& (!current_alt_reached_accept || !config.passed_non_greedy)
		{
			configs.add(config.clone(), merges);
		}

		for transition in atn[config.state].transitions.iter() {
			if let Some(child) = self.epsilon_target(input, &config, transition, configs, speculative, host) {
				current_alt_reached_accept = self.closure(
					input,
					child,
					configs,
					current_alt_reached_accept,
					speculative,
					merges,
					host,
				);
			}
		}

		current_alt_reached_accept
	}

	fn epsilon_target(
		&mut self,
		input: &mut dyn CharStream,
		config: &AtnConfig,
		transition: &Transition,
		configs: &mut ConfigSet,
		speculative: bool,
		host: &mut dyn LexerHost,
	) -> Option<AtnConfig> {
		match transition {
			Transition::Rule { target, follow, .. } => {
				let context: Arc<PredictionContext> =
					PredictionContext::singleton(config.context.clone(), *follow);
				let mut child: AtnConfig = self.lexer_child(config, *target);
				child.context = context;
				Some(child)
			},
			Transition::Precedence { .. } => {
				panic!("precedence predicates are not supported in lexers");
			},
			Transition::Predicate { target, rule, pred, .. } => {
				/// A predicate on the path makes the computed states
				/// input-dependent; the flag keeps them out of the DFA
				/// edge table so the predicate runs again next time.
				debug!("evaluating predicate {rule}:{pred}");
				configs.has_semantic_context = true;
				if self.evaluate_predicate(input, *rule, *pred, speculative, host) {
					Some(self.lexer_child(config, *target))
				} else {
					None
				}
			},
			Transition::Action { target, action, .. } => {
				// actions defer to accept time; just carry the index
				let mut child: AtnConfig = self.lexer_child(config, *target);
				child.lexer_action = *action;
				Some(child)
			},
			Transition::Epsilon { target } => Some(self.lexer_child(config, *target)),
			_ => None,
		}
	}

	fn lexer_child(&self, config: &AtnConfig, target: usize) -> AtnConfig {
		let mut child: AtnConfig = config.transported(target);
		let state: &crate::atn::AtnState = &self.atn[target];
		child.passed_non_greedy =
			config.passed_non_greedy || (state.kind.is_decision() && state.non_greedy);
		child
	}

	/// Outside a reach computation the predicate sees the live lexer
	/// state. Inside one (`speculative`), consume the pending character
	/// first so the predicate observes the would-be-matched position,
	/// then roll everything back.
	fn evaluate_predicate(
		&mut self,
		input: &mut dyn CharStream,
		rule: usize,
		pred: usize,
		speculative: bool,
		host: &mut dyn LexerHost,
	) -> bool {
		if !speculative {
			return host.sempred(rule, pred);
		}

		let saved_column: usize = self.column;
		let saved_line: usize = self.line;
		let index: usize = input.index();
		let marker: isize = input.mark();

		if input.la(1) != EOF {
			self.consume(input);
		}
		let result: bool = host.sempred(rule, pred);

		self.column = saved_column;
		self.line = saved_line;
		input.seek(index);
		input.release(marker);
		result
	}

	fn capture_accept(&mut self, input: &mut dyn CharStream, state: &Arc<DfaState>) {
		self.prev_accept = Some(SimAccept {
			index: input.index(),
			line: self.line,
			column: self.column,
			state: state.clone(),
		});
	}

	fn fail_or_accept(
		&mut self,
		input: &mut dyn CharStream,
		mode: usize,
		s: &Arc<DfaState>,
		t: i32,
		host: &mut dyn LexerHost,
	) -> Result<MatchOutcome, LexerNoViableAlt> {
		if let Some(accept) = self.prev_accept.take() {
			let rule: usize = accept.state.lexer_rule.expect("accept state without a rule");
			let commands: Vec<LexerCommand> = self.accept(
				input,
				rule,
				accept.state.lexer_action,
				accept.index,
				accept.line,
				accept.column,
				host,
			);
			return Ok(MatchOutcome {
				token_type: accept.state.prediction,
				commands,
			});
		}

		// no accept and EOF is the first symbol: a clean end of input
		if t == EOF && input.index() == self.start_index {
			return Ok(MatchOutcome {
				token_type: EOF,
				commands: Vec::new(),
			});
		}

		Err(LexerNoViableAlt {
			start_index: self.start_index,
			mode,
			dead_end: s.configs.configs().to_vec(),
		})
	}

	/// Rewind to the recorded accept position, run the rule's action,
	/// and consume the final matched character.
	fn accept(
		&mut self,
		input: &mut dyn CharStream,
		rule: usize,
		action: Option<usize>,
		index: usize,
		line: usize,
		column: usize,
		host: &mut dyn LexerHost,
	) -> Vec<LexerCommand> {
		debug!("accept rule {rule} action {action:?} at {index}");

		let commands: Vec<LexerCommand> = match action {
			Some(action) => host.action(rule, action),
			None => Vec::new(),
		};

		input.seek(index);
		self.line = line;
		self.column = column;
		if input.la(1) != EOF {
			self.consume(input);
		}
		commands
	}

	fn add_dfa_state(&mut self, mode: usize, mut configs: ConfigSet) -> Arc<DfaState> {
		/// Predicates are evaluated on the fly; a set that still carries
		/// one must not be memoized.
		assert!(!configs.has_semantic_context);

		let atn: Arc<Atn> = self.atn.clone();
		let first_stop: Option<(usize, Option<usize>)> = configs
			.iter()
			.find(|config| atn[config.state].kind == StateKind::RuleStop)
			.map(|config| {
				let rule: usize = atn[config.state].rule.expect("rule stop without a rule");
				(rule, config.lexer_action)
			});

		configs.optimize_configs(&self.cache);
		let frozen: Arc<crate::config::FrozenConfigSet> = Arc::new(configs.freeze());

		self.dfas[mode].add_state(frozen, |state| {
			if let Some((rule, action)) = first_stop {
				state.accept = true;
				state.lexer_rule = Some(rule);
				state.lexer_action = action;
				state.prediction = atn.rule_to_token_type[rule];
			}
		})
	}

	pub fn consume(&mut self, input: &mut dyn CharStream) {
		let current: i32 = input.la(1);
		if current == i32::from(b'\n') {
			self.line += 1;
			self.column = 0;
		} else {
			self.column += 1;
		}
		input.consume();
	}
}

/// Error listener that just traces; the default until a real one is
/// installed.
#[derive(Debug, Default)]
struct TracingListener;

impl SyntaxErrorListener for TracingListener {
	fn syntax_error(&mut self, line: usize, column: usize, message: &str) {
		debug!("syntax error at {line}:{column}: {message}");
	}
}

/// The token-producing driver around the simulator: owns the input, the
/// mode stack and the emission plumbing. Generated lexers wrap this with
/// their rule tables and host callbacks.
pub struct Lexer<S: CharStream, H: LexerHost> {
	input: S,
	host: H,
	sim: LexerSimulator,
	factory: Box<dyn TokenFactory>,
	listener: Box<dyn SyntaxErrorListener>,
	mode: usize,
	mode_stack: Vec<usize>,
	hit_eof: bool,
	token_start: usize,
	token_start_line: usize,
	token_start_column: usize,
}

impl<S: CharStream, H: LexerHost> Lexer<S, H> {
	pub fn new(input: S, atn: Arc<Atn>, host: H) -> Self {
		Self::with_simulator(input, LexerSimulator::new(atn), host)
	}

	/// Build on an existing simulator (usually a [`LexerSimulator::fork`]
	/// of another instance, to share its DFAs).
	pub fn with_simulator(input: S, sim: LexerSimulator, host: H) -> Self {
		Self {
			input,
			host,
			sim,
			factory: Box::new(CommonTokenFactory),
			listener: Box::new(TracingListener),
			mode: 0,
			mode_stack: Vec::new(),
			hit_eof: false,
			token_start: 0,
			token_start_line: 1,
			token_start_column: 0,
		}
	}

	pub fn set_factory(&mut self, factory: Box<dyn TokenFactory>) {
		self.factory = factory;
	}

	pub fn set_listener(&mut self, listener: Box<dyn SyntaxErrorListener>) {
		self.listener = listener;
	}

	pub fn simulator(&self) -> &LexerSimulator {
		&self.sim
	}

	pub fn mode(&self) -> usize {
		self.mode
	}

	pub fn mode_stack(&self) -> &[usize] {
		&self.mode_stack[..]
	}

	pub fn set_mode(&mut self, mode: usize) {
		self.mode = mode;
	}

	pub fn push_mode(&mut self, mode: usize) {
		debug!("pushMode {mode}");
		self.mode_stack.push(self.mode);
		self.mode = mode;
	}

	pub fn pop_mode(&mut self) -> usize {
		let back: usize = self.mode_stack.pop().expect("pop from an empty mode stack");
		debug!("popMode back to {back}");
		self.mode = back;
		back
	}

	/// Text of an already-emitted token, sliced from this input.
	pub fn token_text(&self, token: &Token) -> String {
		match token.text() {
			Some(text) => text.to_owned(),
			None => self.input.text(token.span.clone()),
		}
	}

	/// Drain the remaining input; EOF itself is not included.
	pub fn all_tokens(&mut self) -> Vec<Token> {
		let mut tokens: Vec<Token> = Vec::new();
		loop {
			let token: Token = self.next_token();
			if token.is_eof() {
				return tokens;
			}
			tokens.push(token);
		}
	}

	fn scan_token(&mut self) -> Token {
		'token: loop {
			if self.hit_eof {
				return self.emit_eof();
			}

			self.token_start = self.input.index();
			self.token_start_line = self.sim.line;
			self.token_start_column = self.sim.column;
			let mut kind: i32;
			let mut channel: usize = CHANNEL_DEFAULT;

			loop {
				// a fresh attempt each time `more` loops back
				kind = TOKEN_INVALID;
				let mut skip: bool = false;
				let mut more: bool = false;

				let matched: i32 = match self.sim.match_token(&mut self.input, self.mode, &mut self.host) {
					Ok(outcome) => {
						for command in outcome.commands.iter() {
							match *command {
								LexerCommand::Skip => skip = true,
								LexerCommand::More => more = true,
								LexerCommand::Kind(k) => kind = k,
								LexerCommand::Channel(c) => channel = c,
								LexerCommand::Mode(m) => self.set_mode(m),
								LexerCommand::PushMode(m) => self.push_mode(m),
								LexerCommand::PopMode => {
									self.pop_mode();
								},
							}
						}
						outcome.token_type
					},
					Err(error) => {
						self.notify(&error);
						self.recover();
						skip = true;
						TOKEN_INVALID
					},
				};

				if self.input.la(1) == EOF {
					self.hit_eof = true;
				}
				if skip {
					continue 'token;
				}
				if kind == TOKEN_INVALID {
					kind = matched;
				}
				if !more {
					break;
				}
			}

			if kind == EOF {
				return self.emit_eof();
			}
			return self.emit(kind, channel);
		}
	}

	fn emit(&mut self, kind: i32, channel: usize) -> Token {
		self.factory.create(
			kind,
			self.token_start..self.input.index(),
			self.token_start_line,
			self.token_start_column,
			channel,
			None,
		)
	}

	fn emit_eof(&mut self) -> Token {
		let at: usize = self.input.index();
		self.factory.create(EOF, at..at, self.sim.line, self.sim.column, CHANNEL_DEFAULT, None)
	}

	/// One bad character: report it, step over it, rescan.
	fn recover(&mut self) {
		if self.input.la(1) != EOF {
			self.sim.consume(&mut self.input);
		}
	}

	fn notify(&mut self, error: &LexerNoViableAlt) {
		let stop: usize = (self.input.index() + 1).min(self.input.size());
		let offending: String = self.input.text(self.token_start..stop);
		let message: String = format!("token recognition error at: '{}'", escape_text(&offending));
		self.listener
			.syntax_error(self.token_start_line, self.token_start_column, &message);
		debug!("{message} ({error})");
	}
}

impl<S: CharStream, H: LexerHost> TokenSource for Lexer<S, H> {
	fn next_token(&mut self) -> Token {
		self.scan_token()
	}
}

fn escape_text(text: &str) -> String {
	let mut escaped: String = String::with_capacity(text.len());
	for ch in text.chars() {
		match ch {
			'\n' => escaped.push_str("\\n"),
			'\r' => escaped.push_str("\\r"),
			'\t' => escaped.push_str("\\t"),
			other => escaped.push(other),
		}
	}
	escaped
}
