//! The live session: one task owns the [`World`] and serialises every
//! mutation. Periodic drivers, player commands and oracle completions are
//! all branches of the same `select!` loop, so each runs to completion
//! before the next is looked at.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    engine::{Driver, Engine, EngineSettings},
    goals::{self, ClaimOutcome, Goal},
    grid::BuildingType,
    oracle::{NewsEvent, Oracle},
    scenario::{OracleSettings, Scenario, Schedule},
    systems::{self, StrikeOutcome},
    transactions::{self, TransactionOutcome},
    world::{EventKind, GameEvent, World, WorldSnapshot},
};

const COMMAND_BUFFER: usize = 64;
const ORACLE_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the session has shut down")]
    Closed,
}

enum Command {
    Act {
        x: i32,
        y: i32,
        tool: BuildingType,
        reply: oneshot::Sender<TransactionOutcome>,
    },
    Click {
        id: u64,
        reply: oneshot::Sender<StrikeOutcome>,
    },
    Claim {
        reply: oneshot::Sender<ClaimOutcome>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum OracleReply {
    Goal { attempt: u32, goal: Option<Goal> },
    GoalRetryDue { attempt: u32 },
    News(Option<NewsEvent>),
}

/// Cloneable front door to a running session. The session stops when
/// [`SessionHandle::shutdown`] is called or the last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<WorldSnapshot>,
    events: broadcast::Sender<GameEvent>,
}

impl SessionHandle {
    pub async fn act(
        &self,
        x: i32,
        y: i32,
        tool: BuildingType,
    ) -> Result<TransactionOutcome, SessionError> {
        self.request(|reply| Command::Act { x, y, tool, reply }).await
    }

    pub async fn click_agent(&self, id: u64) -> Result<StrikeOutcome, SessionError> {
        self.request(|reply| Command::Click { id, reply }).await
    }

    pub async fn claim_goal(&self) -> Result<ClaimOutcome, SessionError> {
        self.request(|reply| Command::Claim { reply }).await
    }

    /// Stops all drivers. Resolves once the session task has left its loop.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<WorldSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}

pub struct Session;

impl Session {
    /// Builds the world from `scenario` and spawns the session task on the
    /// current tokio runtime. With `ai_enabled` off the oracle is never
    /// consulted and the session runs without goals or news.
    pub fn start(scenario: &Scenario, ai_enabled: bool, oracle: Arc<dyn Oracle>) -> SessionHandle {
        let world = scenario.build_world();
        let engine = systems::standard_engine(EngineSettings {
            scenario_name: scenario.name.clone(),
            seed: scenario.seed,
        })
        .build();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (oracle_tx, oracle_rx) = mpsc::channel(ORACLE_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(world.snapshot());
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

        let published_seq = world.events().next_seq();
        let runtime = Runtime {
            world,
            engine,
            oracle,
            ai_enabled,
            oracle_settings: scenario.oracle,
            oracle_tx,
            snapshots: snapshot_tx,
            events: event_tx.clone(),
            published_seq,
        };
        info!(
            scenario = %scenario.name,
            seed = scenario.seed,
            ai_enabled,
            "session started"
        );
        runtime.request_goal(0);

        let schedule = scenario.schedule;
        tokio::spawn(runtime.run(schedule, command_rx, oracle_rx));

        SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: event_tx,
        }
    }
}

struct Runtime {
    world: World,
    engine: Engine,
    oracle: Arc<dyn Oracle>,
    ai_enabled: bool,
    oracle_settings: OracleSettings,
    oracle_tx: mpsc::Sender<OracleReply>,
    snapshots: watch::Sender<WorldSnapshot>,
    events: broadcast::Sender<GameEvent>,
    published_seq: u64,
}

fn driver_interval(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl Runtime {
    async fn run(
        mut self,
        schedule: Schedule,
        mut commands: mpsc::Receiver<Command>,
        mut oracle_rx: mpsc::Receiver<OracleReply>,
    ) {
        let mut economy = driver_interval(schedule.economy());
        let mut hostiles = driver_interval(schedule.hostiles());
        let mut explorers = driver_interval(schedule.explorers());

        loop {
            tokio::select! {
                _ = economy.tick() => self.tick(Driver::Economy),
                _ = hostiles.tick() => self.tick(Driver::Hostiles),
                _ = explorers.tick() => self.tick(Driver::Explorers),
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(reply) = oracle_rx.recv() => self.on_oracle(reply),
            }
            self.publish();
        }
        info!(day = self.world.stats().day, "session stopped");
    }

    fn tick(&mut self, driver: Driver) {
        if let Err(err) = self.engine.step(driver, &mut self.world) {
            error!(?driver, error = %err, "driver tick failed");
            return;
        }
        if driver == Driver::Economy {
            let interval = self.oracle_settings.news_interval_days;
            let day = self.world.stats().day;
            if interval > 0 && day % interval == 0 {
                self.request_news();
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Act { x, y, tool, reply } => {
                let outcome = transactions::apply_tool(&mut self.world, x, y, tool);
                self.publish();
                let _ = reply.send(outcome);
            }
            Command::Click { id, reply } => {
                let outcome = systems::strike(&mut self.world, id);
                self.publish();
                let _ = reply.send(outcome);
            }
            Command::Claim { reply } => {
                let outcome = goals::claim(&mut self.world);
                if matches!(outcome, ClaimOutcome::Claimed { .. }) {
                    self.request_goal(0);
                }
                self.publish();
                let _ = reply.send(outcome);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn on_oracle(&mut self, reply: OracleReply) {
        match reply {
            OracleReply::Goal {
                goal: Some(goal), ..
            } => {
                if self.world.goal().is_some() {
                    debug!("discarding goal that arrived after another");
                    return;
                }
                info!(description = %goal.description, "new goal");
                self.world
                    .record(EventKind::Info, format!("New goal: {}", goal.description));
                self.world.set_goal(Some(goal));
            }
            OracleReply::Goal {
                goal: None,
                attempt,
            } => {
                if attempt >= self.oracle_settings.goal_max_retries {
                    warn!(attempt, "no goal available; giving up until the next claim");
                    return;
                }
                let delay = self.oracle_settings.goal_retry();
                let tx = self.oracle_tx.clone();
                debug!(attempt, ?delay, "goal request came back empty; retrying");
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx
                        .send(OracleReply::GoalRetryDue {
                            attempt: attempt + 1,
                        })
                        .await;
                });
            }
            OracleReply::GoalRetryDue { attempt } => {
                if self.world.goal().is_none() {
                    self.request_goal(attempt);
                }
            }
            OracleReply::News(Some(news)) => {
                debug!(headline = %news.headline, kind = ?news.kind, "news");
                self.world.record(EventKind::News, news.headline);
            }
            OracleReply::News(None) => {}
        }
    }

    fn request_goal(&self, attempt: u32) {
        if !self.ai_enabled {
            return;
        }
        let oracle = Arc::clone(&self.oracle);
        let stats = self.world.stats().clone();
        let grid = self.world.grid().clone();
        let tx = self.oracle_tx.clone();
        tokio::spawn(async move {
            let goal = tokio::task::spawn_blocking(move || oracle.request_goal(&stats, &grid))
                .await
                .unwrap_or_else(|err| {
                    warn!(error = %err, "goal oracle panicked");
                    None
                });
            let _ = tx.send(OracleReply::Goal { attempt, goal }).await;
        });
    }

    fn request_news(&self) {
        if !self.ai_enabled {
            return;
        }
        let oracle = Arc::clone(&self.oracle);
        let stats = self.world.stats().clone();
        let tx = self.oracle_tx.clone();
        tokio::spawn(async move {
            let news = tokio::task::spawn_blocking(move || oracle.request_news(&stats))
                .await
                .unwrap_or_else(|err| {
                    warn!(error = %err, "news oracle panicked");
                    None
                });
            let _ = tx.send(OracleReply::News(news)).await;
        });
    }

    fn publish(&mut self) {
        for event in self.world.events().since(self.published_seq) {
            // No subscribers is fine.
            let _ = self.events.send(event.clone());
        }
        self.published_seq = self.world.events().next_seq();
        self.snapshots.send_replace(self.world.snapshot());
    }
}
