use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::error::{GameError, Result};
use crate::events::{EventPool, EventRecord};
use crate::gbm;
use crate::portfolio::{Allocation, Asset, Portfolio};
use crate::scoring::{self, ScoreCard};
use crate::seed::MarketSeed;
use crate::shocks::{NormalSource, production_source};
use crate::types::{Symbol, Turn};

/// ChaCha stream reserved for event draws so they never perturb the price
/// shocks drawn from the same seed.
const EVENT_STREAM: u64 = 1;

/// Where a session is in its turn cycle.
///
/// [`Session::phase`] only ever reports the settled phases
/// (`AwaitingAllocation`, `Finalized`, `Complete`). `Rebalancing` and
/// `EventCheck` run inside [`Session::begin_turn`], and `Simulating` is the
/// phase of the [`TurnRun`] it returns; none of them is written back, so an
/// abandoned turn leaves the session phase unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    AwaitingAllocation,
    Rebalancing,
    EventCheck,
    Simulating,
    Finalized(Turn),
    Complete,
}

/// Price and value marks partway through a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySnapshot {
    pub turn: Turn,
    /// Trading days completed so far in this turn.
    pub day: u32,
    pub prices: Vec<(Symbol, f64)>,
    pub value: f64,
}

/// Everything a caller needs to render a finished turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    pub turn: Turn,
    pub allocation: Allocation,
    pub event: Option<EventRecord>,
    pub cash: f64,
    pub assets: Vec<Asset>,
    pub value: f64,
    pub complete: bool,
}

/// One game: a fixed asset set, a value history and a bag of market events.
///
/// `N` is the normal-variate source. Production sessions use the boxed
/// source selected by [`GameConfig::shock_method`]; tests plug in
/// deterministic sources through [`Session::with_source`].
pub struct Session<N = Box<dyn NormalSource>> {
    config: GameConfig,
    portfolio: Portfolio,
    /// `history[0]` is the baseline; `history[t]` the value after turn `t`.
    history: Vec<f64>,
    pool: EventPool,
    event_log: Vec<EventRecord>,
    completed: Turn,
    phase: Phase,
    event_rng: ChaCha20Rng,
    shocks: N,
}

impl Session {
    /// Start a session whose shocks and events are both driven by
    /// `config.seed`.
    pub fn new(config: GameConfig, seed: &MarketSeed) -> Result<Self> {
        let rng = ChaCha20Rng::seed_from_u64(config.seed);
        let shocks = production_source(config.shock_method, rng);
        Session::with_source(config, seed, shocks)
    }
}

impl<N: NormalSource> Session<N> {
    pub fn with_source(config: GameConfig, seed: &MarketSeed, shocks: N) -> Result<Self> {
        config.validate()?;
        seed.validate()?;

        let n = seed.assets.len();
        if n < config.min_assets || n > config.max_assets {
            return Err(GameError::AssetCount {
                min: config.min_assets,
                max: config.max_assets,
                actual: n,
            });
        }

        let portfolio =
            Portfolio::new(seed.assets.iter().map(|s| s.to_asset()).collect(), config.starting_cash)?;
        let baseline = portfolio.total_value();

        let mut event_rng = ChaCha20Rng::seed_from_u64(config.seed);
        event_rng.set_stream(EVENT_STREAM);

        info!(
            seed = config.seed,
            assets = n,
            max_turns = config.max_turns,
            baseline,
            "session started"
        );

        Ok(Session {
            pool: EventPool::new(config.events.clone()),
            config,
            portfolio,
            history: vec![baseline],
            event_log: Vec::new(),
            completed: Turn::BASELINE,
            phase: Phase::AwaitingAllocation,
            event_rng,
            shocks,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn event_log(&self) -> &[EventRecord] {
        &self.event_log
    }

    pub fn events_remaining(&self) -> usize {
        self.pool.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn completed_turns(&self) -> Turn {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn current_value(&self) -> f64 {
        self.portfolio.total_value()
    }

    /// Score of the history so far. Final only once the session is complete.
    pub fn score(&self) -> f64 {
        scoring::sharpe_score(&self.history, self.config.annualization_factor)
    }

    pub fn scorecard(&self) -> Result<ScoreCard> {
        if !self.is_complete() {
            return Err(GameError::SessionIncomplete {
                completed: self.completed,
                max_turns: self.config.max_turns,
            });
        }
        Ok(ScoreCard::new(&self.history, &self.event_log, self.config.annualization_factor))
    }

    /// Validate `allocation`, rebalance, and run the event check for the
    /// next turn. The returned [`TurnRun`] simulates the trading days and
    /// must be committed for the turn to count; dropping it abandons the
    /// turn and leaves the session as it was.
    pub fn begin_turn(&mut self, allocation: &Allocation) -> Result<TurnRun<'_, N>> {
        if self.is_complete() {
            return Err(GameError::SessionComplete { max_turns: self.config.max_turns });
        }
        allocation.validate_for(&self.portfolio)?;

        let turn = self.completed.next();

        debug!(%turn, phase = ?Phase::Rebalancing, "turn started");
        let mut working = self.portfolio.clone();
        working.rebalance(allocation);

        debug!(%turn, phase = ?Phase::EventCheck, events_left = self.pool.len());
        let mut drawn = None;
        if self.config.is_event_turn(turn)
            && let Some(index) = self.pool.choose(&mut self.event_rng)
        {
            let event = &self.pool.remaining()[index];
            for asset in working.assets_mut() {
                *asset = event.apply(asset);
            }
            info!(%turn, event = %event.id, "market event");
            drawn = Some((index, EventRecord::new(turn, event)));
        }

        debug!(%turn, phase = ?Phase::Simulating, days = self.config.days_per_turn);
        Ok(TurnRun {
            session: self,
            turn,
            allocation: allocation.clone(),
            working,
            drawn,
            days_done: 0,
        })
    }

    /// Run one full turn.
    pub fn play_turn(&mut self, allocation: &Allocation) -> Result<TurnReport> {
        Ok(self.begin_turn(allocation)?.commit())
    }

    /// Hold `allocation` for every remaining turn and return the final card.
    pub fn play_out(&mut self, allocation: &Allocation) -> Result<ScoreCard> {
        while !self.is_complete() {
            self.play_turn(allocation)?;
        }
        self.scorecard()
    }
}

/// A turn that has been rebalanced and event-checked and is stepping
/// through its trading days on a private copy of the portfolio.
pub struct TurnRun<'s, N> {
    session: &'s mut Session<N>,
    turn: Turn,
    allocation: Allocation,
    working: Portfolio,
    /// Pool index and log entry of the event drawn this turn, if any.
    drawn: Option<(usize, EventRecord)>,
    days_done: u32,
}

impl<N: NormalSource> TurnRun<'_, N> {
    pub fn turn(&self) -> Turn {
        self.turn
    }

    /// Always `Simulating`: rebalancing and the event check finished
    /// before the run was handed out.
    pub fn phase(&self) -> Phase {
        Phase::Simulating
    }

    pub fn event(&self) -> Option<&EventRecord> {
        self.drawn.as_ref().map(|(_, record)| record)
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.working
    }

    pub fn days_done(&self) -> u32 {
        self.days_done
    }

    pub fn days_remaining(&self) -> u32 {
        self.session.config.days_per_turn - self.days_done
    }

    /// Advance up to `days` trading days (never past the end of the turn).
    pub fn step_days(&mut self, days: u32) -> DaySnapshot {
        let days = days.min(self.days_remaining());
        let dt = self.session.config.dt;
        for _ in 0..days {
            gbm::advance_day(self.working.assets_mut(), dt, &mut self.session.shocks);
        }
        self.days_done += days;
        self.snapshot()
    }

    pub fn snapshot(&self) -> DaySnapshot {
        DaySnapshot {
            turn: self.turn,
            day: self.days_done,
            prices: self.working.assets().iter().map(|a| (a.symbol.clone(), a.price)).collect(),
            value: self.working.total_value(),
        }
    }

    /// Finish any remaining days and write the turn into the session.
    pub fn commit(mut self) -> TurnReport {
        let remaining = self.days_remaining();
        self.step_days(remaining);

        let TurnRun { session, turn, allocation, working, drawn, .. } = self;

        let event = drawn.map(|(index, record)| {
            session.pool.take(index);
            session.event_log.push(record.clone());
            record
        });

        session.portfolio = working;
        let value = session.portfolio.total_value();
        session.history.push(value);
        session.completed = turn;
        session.phase = if turn.0 >= session.config.max_turns {
            Phase::Complete
        } else {
            Phase::Finalized(turn)
        };

        info!(%turn, value, "turn complete");
        if session.is_complete() {
            info!(score = session.score(), "session complete");
        }

        TurnReport {
            turn,
            allocation,
            event,
            cash: session.portfolio.cash,
            assets: session.portfolio.assets().to_vec(),
            value,
            complete: session.is_complete(),
        }
    }
}
