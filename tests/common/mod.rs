#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use courtside_scorer::{
    config::AppConfig,
    dao::{
        ledger::{StatLedger, memory::MemoryLedger},
        models::{GameSnapshotEntity, PlayerEntity, TeamEntity},
        provider::memory::StaticGameProvider,
    },
    dto::session::{RecordEventRequest, SessionView},
    services::session_service,
    state::{AppState, SharedState, state_machine::SessionStatus, stats::StatType},
};
use tempfile::TempDir;
use uuid::Uuid;

/// Home or away roster slot used by the helpers.
#[derive(Debug, Clone, Copy)]
pub enum Side {
    Home,
    Away,
}

/// Scorer wired to in-memory backends and a temporary journal directory.
pub struct Harness {
    pub state: SharedState,
    pub ledger: MemoryLedger,
    pub provider: StaticGameProvider,
    pub game_id: Uuid,
    pub home: TeamEntity,
    pub away: TeamEntity,
    backend: Arc<dyn StatLedger>,
    config: AppConfig,
    journal_dir: TempDir,
}

fn team(name: &str) -> TeamEntity {
    TeamEntity {
        id: Uuid::new_v4(),
        name: name.to_string(),
        players: (1..=5)
            .map(|jersey| PlayerEntity {
                id: Uuid::new_v4(),
                name: format!("{name} #{jersey}"),
                jersey: Some(jersey),
            })
            .collect(),
    }
}

impl Harness {
    /// Scheduled game registered at the provider, nothing loaded yet.
    pub fn new() -> Self {
        Self::with_backend(|_| {}, |ledger| Arc::new(ledger) as Arc<dyn StatLedger>)
    }

    /// Like [`Harness::new`], with a tweaked config and the scorer talking to the
    /// ledger through `wrap`.
    pub fn with_backend(
        configure: impl FnOnce(&mut AppConfig),
        wrap: impl FnOnce(MemoryLedger) -> Arc<dyn StatLedger>,
    ) -> Self {
        let journal_dir = tempfile::tempdir().expect("create journal dir");
        let ledger = MemoryLedger::new();
        let provider = StaticGameProvider::new();
        let game_id = Uuid::new_v4();
        let home = team("Harbor");
        let away = team("Summit");

        provider.insert(GameSnapshotEntity {
            id: game_id,
            status: SessionStatus::Scheduled,
            current_period: 0,
            home: home.clone(),
            away: away.clone(),
            committed_stats: Vec::new(),
        });

        let mut config = AppConfig {
            journal_dir: Some(journal_dir.path().to_path_buf()),
            ..AppConfig::default()
        };
        configure(&mut config);
        let backend = wrap(ledger.clone());

        let state = build_state(&config, &backend, &provider);
        Self {
            state,
            ledger,
            provider,
            game_id,
            home,
            away,
            backend,
            config,
            journal_dir,
        }
    }

    /// Game loaded and started, ledger reachable.
    pub async fn live() -> Self {
        Self::new().started().await
    }

    /// Load and start the harness game.
    pub async fn started(self) -> Self {
        self.load().await;
        session_service::start_game(&self.state)
            .await
            .expect("start game");
        self
    }

    /// Load the harness game into the current state.
    pub async fn load(&self) -> SessionView {
        session_service::load_session(&self.state, self.game_id)
            .await
            .expect("load session")
    }

    /// Simulate a process restart: fresh state over the same backends and journal directory.
    pub fn restart(&mut self) {
        self.state = build_state(&self.config, &self.backend, &self.provider);
    }

    /// Directory holding the session journals.
    pub fn journal_path(&self) -> std::path::PathBuf {
        self.journal_dir.path().join(format!("{}.json", self.game_id))
    }

    /// Player `index` of the given side.
    pub fn player(&self, side: Side, index: usize) -> (Uuid, Uuid) {
        let team = match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        };
        (team.players[index].id, team.id)
    }

    /// Play request for player `index` of `side`.
    pub fn play(&self, side: Side, index: usize, stat_type: StatType) -> RecordEventRequest {
        let (player_id, team_id) = self.player(side, index);
        RecordEventRequest {
            game_id: self.game_id,
            player_id,
            team_id,
            stat_type,
            value: None,
            period: None,
        }
    }

    /// Current session view.
    pub async fn view(&self) -> SessionView {
        session_service::session_view(&self.state)
            .await
            .expect("session view")
    }
}

fn build_state(
    config: &AppConfig,
    ledger: &Arc<dyn StatLedger>,
    provider: &StaticGameProvider,
) -> SharedState {
    AppState::new(config.clone(), ledger.clone(), Arc::new(provider.clone()))
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn wait_until<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let polled = tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}
