use std::{collections::HashSet, time::SystemTime};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::{
        journal::{JOURNAL_VERSION, JournalEntity},
        models::{
            GameSnapshotEntity, LedgerAck, PlayerEntity, StatPushRequest, StatUndoRequest,
            StatusUpdate, TeamEntity,
        },
        remote::RemoteError,
    },
    state::{
        event_log::{EventLog, StatEvent, SyncState},
        outbox::{PendingStatus, StatusOutbox},
        reconcile::ReconciliationReport,
        state_machine::{
            InvalidTransition, SessionEvent, SessionStateMachine, SessionStatus, Snapshot,
        },
        stats::{BoxScore, Direction, PlayerGameStats, StatType, TeamSide},
        sync_queue::{FailureKind, SyncQueue},
    },
};

/// Errors raised by the local scoring engine. None of them involve the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Caller supplied an unknown player, team, game or an inconsistent value.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation not allowed in the current lifecycle state.
    #[error("invalid session state: {0}")]
    InvalidSessionState(String),
    /// The game is final; recorded plays are frozen.
    #[error("session is finalized")]
    SessionFinalized,
    /// Nothing left to undo.
    #[error("event log is empty")]
    EmptyLog,
    /// The persisted journal contradicts the game it claims to belong to.
    #[error("corrupted journal: {0}")]
    CorruptedJournal(String),
}

impl From<InvalidTransition> for SessionError {
    fn from(err: InvalidTransition) -> Self {
        SessionError::InvalidSessionState(err.to_string())
    }
}

/// Player listed on a team roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterPlayer {
    /// Player identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Jersey number, when known.
    pub jersey: Option<u8>,
}

/// One of the two teams of the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    /// Team identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Players allowed to be credited with plays.
    pub players: Vec<RosterPlayer>,
}

impl Roster {
    fn has_player(&self, player_id: &Uuid) -> bool {
        self.players.iter().any(|player| player.id == *player_id)
    }
}

impl From<PlayerEntity> for RosterPlayer {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            jersey: value.jersey,
        }
    }
}

impl From<TeamEntity> for Roster {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            players: value.players.into_iter().map(Into::into).collect(),
        }
    }
}

/// A play as submitted by the scorer, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRequest {
    /// Must match the loaded game.
    pub game_id: Uuid,
    /// Must be on the roster of `team_id`.
    pub player_id: Uuid,
    /// Home or away team of the loaded game.
    pub team_id: Uuid,
    /// Kind of play.
    pub stat_type: StatType,
    /// Defaults to the canonical value of `stat_type`.
    pub value: Option<u32>,
    /// Defaults to the current period.
    pub period: Option<u8>,
}

/// What must happen at the Ledger after an undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    /// The event never left the queue; nothing to tell the Ledger.
    Dequeued,
    /// The event was acknowledged; the Ledger must reverse it.
    ForwardToLedger(StatUndoRequest),
    /// The event's push is in flight; it is reversed once acknowledged.
    Retracted,
}

/// Result of [`ScoringSession::undo_last`].
#[derive(Debug, Clone)]
pub struct UndoOutcome {
    /// The event that was removed from the log.
    pub event: StatEvent,
    /// Follow-up required at the Ledger.
    pub action: UndoAction,
}

/// Next step for the drain loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPush {
    /// Push this request.
    Ready(StatPushRequest),
    /// Queue is empty.
    Drained,
    /// Head was rejected earlier and the caller did not ask to retry it.
    Stalled(Uuid),
}

/// How a finished push changed the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Event is now SYNCED with its ledger id.
    Acknowledged(StatEvent),
    /// Event was undone while in flight; the Ledger must reverse it.
    Retracted(StatUndoRequest),
    /// Transient failure; the event stays PENDING at the head of the queue.
    Deferred,
    /// Ledger rejected the event; it is FAILED and the queue stalls on it.
    Rejected,
    /// The event is no longer known to this session.
    Stale,
}

/// Live scoring state of one game: rosters, lifecycle, box score, log and queue.
#[derive(Debug, Clone)]
pub struct ScoringSession {
    game_id: Uuid,
    home: Roster,
    away: Roster,
    machine: SessionStateMachine,
    box_score: BoxScore,
    log: EventLog,
    queue: SyncQueue,
    outbox: StatusOutbox,
    in_flight: Option<Uuid>,
    retracted: HashSet<Uuid>,
    conflict: Option<ReconciliationReport>,
    reconcile_due: bool,
}

impl ScoringSession {
    /// Fresh session for a scheduled game with no recorded plays.
    pub fn new(game_id: Uuid, home: Roster, away: Roster) -> Self {
        Self {
            game_id,
            home,
            away,
            machine: SessionStateMachine::new(),
            box_score: BoxScore::default(),
            log: EventLog::new(),
            queue: SyncQueue::new(),
            outbox: StatusOutbox::default(),
            in_flight: None,
            retracted: HashSet::new(),
            conflict: None,
            reconcile_due: false,
        }
    }

    /// Rebuild a session from the provider snapshot, then layer the journal's
    /// unacknowledged work on top.
    ///
    /// Returns the session plus the Ledger undos still owed for plays that were
    /// retracted while their push was in flight.
    pub fn resume(
        snapshot: GameSnapshotEntity,
        journal: Option<JournalEntity>,
    ) -> Result<(Self, Vec<StatUndoRequest>), SessionError> {
        let mut session = Self::new(snapshot.id, snapshot.home.into(), snapshot.away.into());
        session.machine = SessionStateMachine::restore(snapshot.status, snapshot.current_period);

        let mut retracted: HashSet<Uuid> = journal
            .as_ref()
            .map(|journal| journal.retracted.iter().copied().collect())
            .unwrap_or_default();
        let mut owed_undos = Vec::new();

        for stat in snapshot.committed_stats {
            if session.log.contains(&stat.local_id) {
                return Err(SessionError::InvalidSessionState(format!(
                    "committed log repeats local id {}",
                    stat.local_id
                )));
            }
            if retracted.remove(&stat.local_id) {
                owed_undos.push(StatUndoRequest {
                    ledger_id: stat.ledger_id,
                    game_id: session.game_id,
                });
                continue;
            }

            let side = session
                .rostered_side(stat.team_id, stat.player_id)
                .map_err(|reason| {
                    SessionError::InvalidSessionState(format!("committed stat {reason}"))
                })?;
            let event = StatEvent::committed(
                stat.local_id,
                stat.ledger_id,
                session.game_id,
                stat.player_id,
                stat.team_id,
                stat.stat_type,
                stat.period,
                stat.created_at,
            );
            session
                .box_score
                .apply(side, event.player_id, event.stat_type, Direction::Forward);
            session.log.push_head(event);
        }

        if let Some(journal) = journal {
            session.restore_journal(journal)?;
        }

        // Retracted pushes the provider has not surfaced may still have landed.
        if !retracted.is_empty() {
            session.retracted = retracted;
            session.schedule_reconciliation();
        }

        Ok((session, owed_undos))
    }

    fn restore_journal(&mut self, journal: JournalEntity) -> Result<(), SessionError> {
        let provider = self.machine.snapshot();
        let behind = status_rank(journal.status) < status_rank(provider.status)
            || (journal.status == provider.status && journal.current_period < provider.period);
        if behind {
            return Err(SessionError::CorruptedJournal(format!(
                "journal state {:?}/{} is behind the provider's {:?}/{}",
                journal.status, journal.current_period, provider.status, provider.period
            )));
        }
        self.machine = SessionStateMachine::restore(journal.status, journal.current_period);

        let mut entries = journal.queue.into_iter();
        for event in journal.pending_events {
            let entry = entries.next();
            if self.log.contains(&event.local_id) {
                // Committed while the acknowledgment was lost.
                continue;
            }

            let side = self
                .rostered_side(event.team_id, event.player_id)
                .map_err(|reason| SessionError::CorruptedJournal(format!("pending event {reason}")))?;
            if event.period == 0 || event.period > self.machine.period() {
                return Err(SessionError::CorruptedJournal(format!(
                    "pending event {} is in period {}",
                    event.local_id, event.period
                )));
            }
            if event.value != event.stat_type.canonical_value() {
                return Err(SessionError::CorruptedJournal(format!(
                    "pending event {} carries value {}",
                    event.local_id, event.value
                )));
            }

            self.box_score
                .apply(side, event.player_id, event.stat_type, Direction::Forward);
            match entry {
                Some(entry) => self.queue.restore(entry),
                None => self.queue.enqueue(event.local_id),
            }
            self.log.push_head(event);
        }

        self.outbox = journal.status_outbox;
        Ok(())
    }

    /// Persisted form of the unacknowledged part of this session.
    pub fn to_journal(&self) -> JournalEntity {
        JournalEntity {
            version: JOURNAL_VERSION,
            game_id: self.game_id,
            status: self.machine.status(),
            current_period: self.machine.period(),
            pending_events: self
                .log
                .chronological()
                .filter(|event| event.sync_state() != SyncState::Synced)
                .cloned()
                .collect(),
            queue: self.queue.iter().cloned().collect(),
            retracted: self.retracted.iter().copied().collect(),
            status_outbox: self.outbox.clone(),
        }
    }

    fn side_of(&self, team_id: Uuid) -> Option<TeamSide> {
        if team_id == self.home.id {
            Some(TeamSide::Home)
        } else if team_id == self.away.id {
            Some(TeamSide::Away)
        } else {
            None
        }
    }

    fn roster(&self, side: TeamSide) -> &Roster {
        match side {
            TeamSide::Home => &self.home,
            TeamSide::Away => &self.away,
        }
    }

    fn rostered_side(&self, team_id: Uuid, player_id: Uuid) -> Result<TeamSide, String> {
        let side = self
            .side_of(team_id)
            .ok_or_else(|| format!("references unknown team {team_id}"))?;
        if !self.roster(side).has_player(&player_id) {
            return Err(format!("references player {player_id} outside team {team_id}"));
        }
        Ok(side)
    }

    /// Record a play: validate, apply its delta and queue it for the Ledger.
    pub fn record_event(&mut self, request: RecordRequest) -> Result<StatEvent, SessionError> {
        match self.machine.status() {
            SessionStatus::InProgress => {}
            SessionStatus::Final => return Err(SessionError::SessionFinalized),
            SessionStatus::Scheduled => {
                return Err(SessionError::InvalidSessionState(
                    "game has not started".into(),
                ));
            }
        }

        if request.game_id != self.game_id {
            return Err(SessionError::InvalidInput(format!(
                "game {} is not the loaded game",
                request.game_id
            )));
        }
        let side = self
            .rostered_side(request.team_id, request.player_id)
            .map_err(|reason| SessionError::InvalidInput(format!("play {reason}")))?;

        let current = self.machine.period();
        let period = request.period.unwrap_or(current);
        if period == 0 || period > current {
            return Err(SessionError::InvalidInput(format!(
                "period {period} is outside 1..={current}"
            )));
        }

        let canonical = request.stat_type.canonical_value();
        if let Some(value) = request.value.filter(|value| *value != canonical) {
            return Err(SessionError::InvalidInput(format!(
                "{:?} is worth {canonical}, not {value}",
                request.stat_type
            )));
        }

        let event = StatEvent::new(
            self.game_id,
            request.player_id,
            request.team_id,
            request.stat_type,
            period,
        );
        self.box_score
            .apply(side, event.player_id, event.stat_type, Direction::Forward);
        self.queue.enqueue(event.local_id);
        self.log.push_head(event.clone());
        Ok(event)
    }

    /// Remove the most recent play and revert its delta.
    pub fn undo_last(&mut self) -> Result<UndoOutcome, SessionError> {
        if self.machine.status() == SessionStatus::Final {
            return Err(SessionError::SessionFinalized);
        }
        let event = self.log.pop_head().ok_or(SessionError::EmptyLog)?;

        match self.side_of(event.team_id) {
            Some(side) => {
                self.box_score
                    .apply(side, event.player_id, event.stat_type, Direction::Inverse)
            }
            None => warn!(
                local_id = %event.local_id,
                team_id = %event.team_id,
                "undone event references an unknown team"
            ),
        }

        let action = if let Some(ledger_id) = event.ledger_id() {
            UndoAction::ForwardToLedger(StatUndoRequest {
                ledger_id: ledger_id.to_string(),
                game_id: self.game_id,
            })
        } else {
            self.queue.remove(&event.local_id);
            if self.in_flight == Some(event.local_id) {
                self.retracted.insert(event.local_id);
                UndoAction::Retracted
            } else {
                UndoAction::Dequeued
            }
        };

        Ok(UndoOutcome { event, action })
    }

    /// Apply a lifecycle transition and stage the matching status updates.
    pub fn apply_transition(&mut self, event: SessionEvent) -> Result<Snapshot, SessionError> {
        let snapshot = self.machine.apply(event)?;
        match event {
            SessionEvent::StartGame => {
                self.stage_lifecycle();
                self.outbox.stage(StatusUpdate::Period {
                    current_period: snapshot.period,
                });
            }
            SessionEvent::AdvancePeriod => {
                self.outbox.stage(StatusUpdate::Period {
                    current_period: snapshot.period,
                });
            }
            SessionEvent::EndGame => self.stage_lifecycle(),
        }
        Ok(snapshot)
    }

    fn stage_lifecycle(&mut self) {
        self.outbox.stage(StatusUpdate::Lifecycle {
            status: self.machine.status(),
            home_score: self.box_score.score(TeamSide::Home),
            away_score: self.box_score.score(TeamSide::Away),
        });
    }

    /// Prepare the push of the queue head and mark it in flight.
    ///
    /// A FAILED head is only retried when `retry_failed` is set; it then goes back to PENDING.
    pub fn begin_next_push(&mut self, retry_failed: bool, now: SystemTime) -> NextPush {
        let Some(local_id) = self.queue.front().map(|entry| entry.local_id) else {
            return NextPush::Drained;
        };
        let Some(event) = self.log.get_mut(&local_id) else {
            warn!(local_id = %local_id, "queued event missing from the log; dropping entry");
            self.queue.remove(&local_id);
            return self.begin_next_push(retry_failed, now);
        };

        if event.sync_state() == SyncState::Failed {
            if !retry_failed {
                return NextPush::Stalled(local_id);
            }
            if let Err(err) = event.transition(SyncState::Pending) {
                warn!(local_id = %local_id, error = %err, "cannot retry failed event");
                return NextPush::Stalled(local_id);
            }
        }

        let request = StatPushRequest::from(&*event);
        if let Some(entry) = self.queue.front_mut() {
            entry.begin_attempt(now);
        }
        self.in_flight = Some(local_id);
        NextPush::Ready(request)
    }

    /// Fold the result of a push back into the session.
    pub fn complete_push(
        &mut self,
        local_id: Uuid,
        result: Result<LedgerAck, &RemoteError>,
    ) -> PushOutcome {
        if self.in_flight == Some(local_id) {
            self.in_flight = None;
        }

        if self.retracted.remove(&local_id) {
            return match result {
                Ok(ack) => PushOutcome::Retracted(StatUndoRequest {
                    ledger_id: ack.ledger_id,
                    game_id: self.game_id,
                }),
                Err(err) => {
                    if err.is_transient() {
                        // The play may have landed without us learning its ledger id.
                        self.reconcile_due = true;
                    }
                    PushOutcome::Stale
                }
            };
        }

        let Some(event) = self.log.get_mut(&local_id) else {
            return PushOutcome::Stale;
        };

        match result {
            Ok(ack) => {
                if let Err(err) = event.acknowledge(ack.ledger_id) {
                    warn!(local_id = %local_id, error = %err, "ignoring acknowledgment");
                    self.queue.remove(&local_id);
                    return PushOutcome::Stale;
                }
                let acknowledged = event.clone();
                self.queue.remove(&local_id);
                PushOutcome::Acknowledged(acknowledged)
            }
            Err(err) if err.is_transient() => {
                if let Some(entry) = self.queue.get_mut(&local_id) {
                    entry.last_failure = Some(FailureKind::Network);
                }
                PushOutcome::Deferred
            }
            Err(_) => {
                if let Err(err) = event.transition(SyncState::Failed) {
                    warn!(local_id = %local_id, error = %err, "cannot mark event failed");
                }
                if let Some(entry) = self.queue.get_mut(&local_id) {
                    entry.last_failure = Some(FailureKind::Rejected);
                }
                PushOutcome::Rejected
            }
        }
    }

    /// Status updates awaiting delivery, in staging order.
    pub fn pending_status_updates(&self) -> Vec<PendingStatus> {
        self.outbox.pending()
    }

    /// Clear a delivered status update unless a newer one replaced it.
    pub fn settle_status_update(&mut self, sent: &PendingStatus) -> bool {
        self.outbox.settle(sent)
    }

    /// Totals obtained by replaying only the acknowledged events.
    pub fn synced_totals(&self) -> IndexMap<Uuid, PlayerGameStats> {
        let mut totals: IndexMap<Uuid, PlayerGameStats> = IndexMap::new();
        for event in self
            .log
            .chronological()
            .filter(|event| event.sync_state() == SyncState::Synced)
        {
            totals
                .entry(event.player_id)
                .or_default()
                .apply(&event.stat_type.delta());
        }
        totals
    }

    /// Totals obtained by replaying the whole log; always equal to the live box score.
    pub fn replayed_box_score(&self) -> BoxScore {
        BoxScore::replay(self.log.chronological().filter_map(|event| {
            self.side_of(event.team_id)
                .map(|side| (side, event.player_id, event.stat_type))
        }))
    }

    /// Flag the session so the next quiet moment runs a reconciliation pass.
    pub fn schedule_reconciliation(&mut self) {
        self.reconcile_due = true;
    }

    /// Whether a reconciliation pass is owed.
    pub fn reconciliation_due(&self) -> bool {
        self.reconcile_due
    }

    /// Store the outcome of a reconciliation pass. An empty report clears any conflict.
    ///
    /// A clean pass also forgets retractions whose push is no longer in flight.
    pub fn settle_reconciliation(&mut self, report: ReconciliationReport) {
        self.reconcile_due = false;
        if report.mismatches.is_empty() {
            let in_flight = self.in_flight;
            self.retracted.retain(|local_id| Some(*local_id) == in_flight);
        }
        self.conflict = (!report.mismatches.is_empty()).then_some(report);
    }

    /// Drop the conflict indicator. Returns whether one was set.
    pub fn dismiss_conflict(&mut self) -> bool {
        self.conflict.take().is_some()
    }

    /// Game identifier.
    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    /// Home roster.
    pub fn home(&self) -> &Roster {
        &self.home
    }

    /// Away roster.
    pub fn away(&self) -> &Roster {
        &self.away
    }

    /// Lifecycle snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.machine.snapshot()
    }

    /// Live box score.
    pub fn box_score(&self) -> &BoxScore {
        &self.box_score
    }

    /// Recorded events.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Events awaiting acknowledgment.
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Number of undelivered status updates.
    pub fn pending_status_count(&self) -> usize {
        self.outbox.len()
    }

    /// Last unresolved reconciliation report.
    pub fn conflict(&self) -> Option<&ReconciliationReport> {
        self.conflict.as_ref()
    }
}

fn status_rank(status: SessionStatus) -> u8 {
    match status {
        SessionStatus::Scheduled => 0,
        SessionStatus::InProgress => 1,
        SessionStatus::Final => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::CommittedStatEntity;

    struct Fixture {
        game_id: Uuid,
        home: Uuid,
        away: Uuid,
        home_players: Vec<Uuid>,
        away_players: Vec<Uuid>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                game_id: Uuid::new_v4(),
                home: Uuid::new_v4(),
                away: Uuid::new_v4(),
                home_players: (0..5).map(|_| Uuid::new_v4()).collect(),
                away_players: (0..5).map(|_| Uuid::new_v4()).collect(),
            }
        }

        fn team(id: Uuid, name: &str, players: &[Uuid]) -> TeamEntity {
            TeamEntity {
                id,
                name: name.into(),
                players: players
                    .iter()
                    .enumerate()
                    .map(|(idx, id)| PlayerEntity {
                        id: *id,
                        name: format!("{name} #{idx}"),
                        jersey: Some(idx as u8 + 4),
                    })
                    .collect(),
            }
        }

        fn snapshot(&self, status: SessionStatus, period: u8) -> GameSnapshotEntity {
            GameSnapshotEntity {
                id: self.game_id,
                status,
                current_period: period,
                home: Self::team(self.home, "Home", &self.home_players),
                away: Self::team(self.away, "Away", &self.away_players),
                committed_stats: Vec::new(),
            }
        }

        fn session(&self) -> ScoringSession {
            let (session, _) = ScoringSession::resume(self.snapshot(SessionStatus::Scheduled, 0), None)
                .unwrap();
            session
        }

        fn started(&self) -> ScoringSession {
            let mut session = self.session();
            session.apply_transition(SessionEvent::StartGame).unwrap();
            session
        }

        fn play(&self, player: Uuid, team: Uuid, stat_type: StatType) -> RecordRequest {
            RecordRequest {
                game_id: self.game_id,
                player_id: player,
                team_id: team,
                stat_type,
                value: None,
                period: None,
            }
        }
    }

    fn ack(id: &str) -> Result<LedgerAck, &'static RemoteError> {
        Ok(LedgerAck {
            ledger_id: id.into(),
        })
    }

    fn push_head(session: &mut ScoringSession) -> Uuid {
        match session.begin_next_push(false, SystemTime::now()) {
            NextPush::Ready(request) => request.local_id,
            other => panic!("expected a push, got {other:?}"),
        }
    }

    #[test]
    fn plays_require_a_running_game() {
        let fx = Fixture::new();
        let mut session = fx.session();
        let play = fx.play(fx.home_players[0], fx.home, StatType::Pts2);

        assert!(matches!(
            session.record_event(play.clone()),
            Err(SessionError::InvalidSessionState(_))
        ));

        session.apply_transition(SessionEvent::StartGame).unwrap();
        session.apply_transition(SessionEvent::EndGame).unwrap();
        assert_eq!(session.record_event(play), Err(SessionError::SessionFinalized));
        assert!(session.log().is_empty());
    }

    #[test]
    fn three_then_assist_undone_twice_restores_everything() {
        let fx = Fixture::new();
        let mut session = fx.started();
        let p1 = fx.home_players[0];

        session.record_event(fx.play(p1, fx.home, StatType::Pts3)).unwrap();
        session.record_event(fx.play(p1, fx.home, StatType::Ast)).unwrap();
        assert_eq!(session.box_score().score(TeamSide::Home), 3);

        session.undo_last().unwrap();
        session.undo_last().unwrap();

        assert!(session.box_score().player(&p1).is_empty());
        assert_eq!(session.box_score().score(TeamSide::Home), 0);
        assert!(session.log().is_empty());
        assert!(session.queue().is_empty());
        assert_eq!(session.undo_last().unwrap_err(), SessionError::EmptyLog);
        assert!(session.box_score().player(&p1).is_empty());
    }

    #[test]
    fn undo_exactly_inverts_every_stat_type() {
        let fx = Fixture::new();
        let mut session = fx.started();
        let player = fx.away_players[2];
        for stat in StatType::ALL {
            session.record_event(fx.play(player, fx.away, stat)).unwrap();
        }

        for stat in StatType::ALL {
            let before = (
                session.box_score().player(&player),
                session.box_score().score(TeamSide::Away),
            );
            session.record_event(fx.play(player, fx.away, stat)).unwrap();
            session.undo_last().unwrap();
            let after = (
                session.box_score().player(&player),
                session.box_score().score(TeamSide::Away),
            );
            assert_eq!(before, after, "{stat:?}");
        }
    }

    #[test]
    fn replay_matches_live_box_score() {
        let fx = Fixture::new();
        let mut session = fx.started();
        let plays = [
            (fx.home_players[0], fx.home, StatType::Pts2),
            (fx.away_players[1], fx.away, StatType::Pts3),
            (fx.home_players[0], fx.home, StatType::Oreb),
            (fx.away_players[1], fx.away, StatType::FtMiss),
            (fx.home_players[3], fx.home, StatType::PtsFt),
        ];
        for (player, team, stat) in plays {
            session.record_event(fx.play(player, team, stat)).unwrap();
        }
        session.undo_last().unwrap();

        assert_eq!(&session.replayed_box_score(), session.box_score());
    }

    #[test]
    fn five_fouls_are_counted_without_foul_out() {
        let fx = Fixture::new();
        let mut session = fx.started();
        let p3 = fx.away_players[3];
        for _ in 0..5 {
            session.record_event(fx.play(p3, fx.away, StatType::Foul)).unwrap();
        }
        assert_eq!(session.box_score().player(&p3).fouls, 5);
    }

    #[test]
    fn invalid_input_is_rejected_without_mutation() {
        let fx = Fixture::new();
        let mut session = fx.started();
        let home_player = fx.home_players[0];

        let wrong_team = fx.play(home_player, fx.away, StatType::Pts2);
        let unknown_team = fx.play(home_player, Uuid::new_v4(), StatType::Pts2);
        let mut wrong_value = fx.play(home_player, fx.home, StatType::Pts2);
        wrong_value.value = Some(3);
        let mut future_period = fx.play(home_player, fx.home, StatType::Pts2);
        future_period.period = Some(2);
        let mut other_game = fx.play(home_player, fx.home, StatType::Pts2);
        other_game.game_id = Uuid::new_v4();

        for request in [wrong_team, unknown_team, wrong_value, future_period, other_game] {
            assert!(matches!(
                session.record_event(request),
                Err(SessionError::InvalidInput(_))
            ));
        }
        assert!(session.log().is_empty());
        assert_eq!(session.box_score().score(TeamSide::Home), 0);
    }

    #[test]
    fn earlier_period_can_be_credited() {
        let fx = Fixture::new();
        let mut session = fx.started();
        session.apply_transition(SessionEvent::AdvancePeriod).unwrap();

        let mut late_entry = fx.play(fx.home_players[0], fx.home, StatType::Stl);
        late_entry.period = Some(1);
        assert_eq!(session.record_event(late_entry).unwrap().period, 1);
        let current = session
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Stl))
            .unwrap();
        assert_eq!(current.period, 2);
    }

    #[test]
    fn undo_is_refused_once_final() {
        let fx = Fixture::new();
        let mut session = fx.started();
        session
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts2))
            .unwrap();
        session.apply_transition(SessionEvent::EndGame).unwrap();

        assert_eq!(session.undo_last().unwrap_err(), SessionError::SessionFinalized);
        assert_eq!(session.box_score().score(TeamSide::Home), 2);
    }

    #[test]
    fn acknowledged_undo_is_forwarded_with_ledger_id() {
        let fx = Fixture::new();
        let mut session = fx.started();
        session
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Blk))
            .unwrap();
        let local_id = push_head(&mut session);
        assert!(matches!(
            session.complete_push(local_id, ack("L-7")),
            PushOutcome::Acknowledged(_)
        ));

        let outcome = session.undo_last().unwrap();
        assert_eq!(
            outcome.action,
            UndoAction::ForwardToLedger(StatUndoRequest {
                ledger_id: "L-7".into(),
                game_id: fx.game_id,
            })
        );
    }

    #[test]
    fn queued_undo_only_shrinks_the_queue() {
        let fx = Fixture::new();
        let mut session = fx.started();
        session
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts2))
            .unwrap();
        session
            .record_event(fx.play(fx.home_players[1], fx.home, StatType::To))
            .unwrap();

        let outcome = session.undo_last().unwrap();
        assert_eq!(outcome.action, UndoAction::Dequeued);
        assert_eq!(session.queue().len(), 1);
    }

    #[test]
    fn undo_during_push_retracts_on_ack() {
        let fx = Fixture::new();
        let mut session = fx.started();
        session
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts3))
            .unwrap();
        let local_id = push_head(&mut session);

        assert_eq!(session.undo_last().unwrap().action, UndoAction::Retracted);
        assert_eq!(
            session.complete_push(local_id, ack("L-3")),
            PushOutcome::Retracted(StatUndoRequest {
                ledger_id: "L-3".into(),
                game_id: fx.game_id,
            })
        );
        assert!(session.queue().is_empty());
    }

    #[test]
    fn rejection_stalls_until_retry_is_requested() {
        let fx = Fixture::new();
        let mut session = fx.started();
        session
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts2))
            .unwrap();
        session
            .record_event(fx.play(fx.home_players[1], fx.home, StatType::Ast))
            .unwrap();

        let head = push_head(&mut session);
        let rejection = RemoteError::rejected(422, "unknown player");
        assert_eq!(session.complete_push(head, Err(&rejection)), PushOutcome::Rejected);
        assert_eq!(
            session.log().get(&head).unwrap().sync_state(),
            SyncState::Failed
        );

        assert_eq!(
            session.begin_next_push(false, SystemTime::now()),
            NextPush::Stalled(head)
        );
        match session.begin_next_push(true, SystemTime::now()) {
            NextPush::Ready(request) => assert_eq!(request.local_id, head),
            other => panic!("expected retry of the head, got {other:?}"),
        }
        assert_eq!(
            session.log().get(&head).unwrap().sync_state(),
            SyncState::Pending
        );
        assert_eq!(session.queue().front().unwrap().retry_count, 1);
    }

    #[test]
    fn network_failure_keeps_event_pending() {
        let fx = Fixture::new();
        let mut session = fx.started();
        session
            .record_event(fx.play(fx.away_players[0], fx.away, StatType::Dreb))
            .unwrap();
        let head = push_head(&mut session);

        let timeout = RemoteError::Timeout {
            message: "slow".into(),
        };
        assert_eq!(session.complete_push(head, Err(&timeout)), PushOutcome::Deferred);
        let entry = session.queue().front().unwrap();
        assert_eq!(entry.last_failure, Some(FailureKind::Network));
        assert_eq!(entry.retry_count, 0);
        assert_eq!(
            session.log().get(&head).unwrap().sync_state(),
            SyncState::Pending
        );
    }

    #[test]
    fn transitions_stage_status_updates() {
        let fx = Fixture::new();
        let mut session = fx.started();
        session
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts2))
            .unwrap();
        session.apply_transition(SessionEvent::AdvancePeriod).unwrap();
        session.apply_transition(SessionEvent::EndGame).unwrap();

        let pending: Vec<_> = session
            .pending_status_updates()
            .into_iter()
            .map(|entry| entry.update)
            .collect();
        assert_eq!(
            pending,
            vec![
                StatusUpdate::Period { current_period: 2 },
                StatusUpdate::Lifecycle {
                    status: SessionStatus::Final,
                    home_score: 2,
                    away_score: 0,
                },
            ]
        );
    }

    #[test]
    fn resume_replays_committed_log_and_journal() {
        let fx = Fixture::new();
        let mut live = fx.started();
        live.record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts3))
            .unwrap();
        let journal = live.to_journal();

        let mut snapshot = fx.snapshot(SessionStatus::InProgress, 1);
        snapshot.committed_stats.push(CommittedStatEntity {
            local_id: Uuid::new_v4(),
            ledger_id: "L-1".into(),
            player_id: fx.away_players[0],
            team_id: fx.away,
            stat_type: StatType::Pts2,
            value: 2,
            period: 1,
            created_at: SystemTime::now(),
        });

        let (resumed, owed) = ScoringSession::resume(snapshot, Some(journal)).unwrap();
        assert!(owed.is_empty());
        assert_eq!(resumed.box_score().score(TeamSide::Home), 3);
        assert_eq!(resumed.box_score().score(TeamSide::Away), 2);
        assert_eq!(resumed.log().len(), 2);
        assert_eq!(resumed.queue().len(), 1);
        assert_eq!(resumed.log().head().unwrap().stat_type, StatType::Pts3);
    }

    #[test]
    fn resume_drops_pending_events_the_ledger_already_has() {
        let fx = Fixture::new();
        let mut live = fx.started();
        let event = live
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts2))
            .unwrap();
        let journal = live.to_journal();

        let mut snapshot = fx.snapshot(SessionStatus::InProgress, 1);
        snapshot.committed_stats.push(CommittedStatEntity {
            local_id: event.local_id,
            ledger_id: "L-1".into(),
            player_id: event.player_id,
            team_id: event.team_id,
            stat_type: event.stat_type,
            value: event.value,
            period: event.period,
            created_at: event.created_at,
        });

        let (resumed, _) = ScoringSession::resume(snapshot, Some(journal)).unwrap();
        assert!(resumed.queue().is_empty());
        assert_eq!(resumed.box_score().score(TeamSide::Home), 2);
    }

    #[test]
    fn resume_rejects_journal_with_unknown_player() {
        let fx = Fixture::new();
        let mut live = fx.started();
        live.record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts2))
            .unwrap();
        let mut journal = live.to_journal();
        journal.pending_events[0].player_id = Uuid::new_v4();

        let err = ScoringSession::resume(fx.snapshot(SessionStatus::InProgress, 1), Some(journal))
            .unwrap_err();
        assert!(matches!(err, SessionError::CorruptedJournal(_)));
    }

    #[test]
    fn resume_rejects_committed_stat_outside_rosters() {
        let fx = Fixture::new();
        let mut snapshot = fx.snapshot(SessionStatus::InProgress, 1);
        snapshot.committed_stats.push(CommittedStatEntity {
            local_id: Uuid::new_v4(),
            ledger_id: "L-1".into(),
            player_id: Uuid::new_v4(),
            team_id: fx.home,
            stat_type: StatType::Ast,
            value: 1,
            period: 1,
            created_at: SystemTime::now(),
        });

        assert!(matches!(
            ScoringSession::resume(snapshot, None),
            Err(SessionError::InvalidSessionState(_))
        ));
    }

    #[test]
    fn retracted_commits_are_owed_an_undo_on_resume() {
        let fx = Fixture::new();
        let mut live = fx.started();
        let event = live
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts2))
            .unwrap();
        push_head(&mut live);
        live.undo_last().unwrap();
        let journal = live.to_journal();
        assert_eq!(journal.retracted, vec![event.local_id]);

        let mut snapshot = fx.snapshot(SessionStatus::InProgress, 1);
        snapshot.committed_stats.push(CommittedStatEntity {
            local_id: event.local_id,
            ledger_id: "L-5".into(),
            player_id: event.player_id,
            team_id: event.team_id,
            stat_type: event.stat_type,
            value: event.value,
            period: event.period,
            created_at: event.created_at,
        });

        let (resumed, owed) = ScoringSession::resume(snapshot, Some(journal)).unwrap();
        assert!(resumed.log().is_empty());
        assert_eq!(owed.len(), 1);
        assert_eq!(owed[0].ledger_id, "L-5");
    }

    #[test]
    fn resume_keeps_retractions_the_provider_has_not_seen() {
        let fx = Fixture::new();
        let mut live = fx.started();
        let event = live
            .record_event(fx.play(fx.home_players[0], fx.home, StatType::Pts3))
            .unwrap();
        push_head(&mut live);
        live.undo_last().unwrap();
        let journal = live.to_journal();

        let (mut resumed, owed) =
            ScoringSession::resume(fx.snapshot(SessionStatus::InProgress, 1), Some(journal))
                .unwrap();
        assert!(owed.is_empty());
        assert!(resumed.reconciliation_due());
        assert_eq!(resumed.to_journal().retracted, vec![event.local_id]);

        let mut snapshot = fx.snapshot(SessionStatus::InProgress, 1);
        snapshot.committed_stats.push(CommittedStatEntity {
            local_id: event.local_id,
            ledger_id: "L-9".into(),
            player_id: event.player_id,
            team_id: event.team_id,
            stat_type: event.stat_type,
            value: event.value,
            period: event.period,
            created_at: event.created_at,
        });
        let (later, owed) = ScoringSession::resume(snapshot, Some(resumed.to_journal())).unwrap();
        assert_eq!(owed.len(), 1);
        assert_eq!(owed[0].ledger_id, "L-9");
        assert!(later.to_journal().retracted.is_empty());

        resumed.settle_reconciliation(ReconciliationReport {
            checked_at: SystemTime::now(),
            mismatches: Vec::new(),
        });
        assert!(!resumed.reconciliation_due());
        assert!(resumed.to_journal().retracted.is_empty());
    }

    #[test]
    fn synced_totals_ignore_queued_events() {
        let fx = Fixture::new();
        let mut session = fx.started();
        let player = fx.home_players[0];
        session.record_event(fx.play(player, fx.home, StatType::Pts2)).unwrap();
        let head = push_head(&mut session);
        session.complete_push(head, ack("L-1"));
        session.record_event(fx.play(player, fx.home, StatType::Pts3)).unwrap();

        assert_eq!(session.synced_totals()[&player].points, 2);
        assert_eq!(session.box_score().player(&player).points, 5);
    }
}
