//! Box-score aggregation: the declarative stat table and the counters it drives.
//!
//! Every stat type maps to a single signed [`StatDelta`]. Recording applies the
//! delta, undoing applies its negation, so forward and inverse logic can never
//! drift apart.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of play recorded by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum StatType {
    /// Made two-point field goal.
    #[serde(rename = "PTS_2")]
    Pts2,
    /// Made three-point field goal.
    #[serde(rename = "PTS_3")]
    Pts3,
    /// Made free throw.
    #[serde(rename = "PTS_FT")]
    PtsFt,
    /// Missed two-point field goal.
    #[serde(rename = "FG_MISS")]
    FgMiss,
    /// Missed three-point field goal.
    #[serde(rename = "FG3_MISS")]
    Fg3Miss,
    /// Missed free throw.
    #[serde(rename = "FT_MISS")]
    FtMiss,
    /// Offensive rebound.
    #[serde(rename = "OREB")]
    Oreb,
    /// Defensive rebound.
    #[serde(rename = "DREB")]
    Dreb,
    /// Assist.
    #[serde(rename = "AST")]
    Ast,
    /// Steal.
    #[serde(rename = "STL")]
    Stl,
    /// Block.
    #[serde(rename = "BLK")]
    Blk,
    /// Turnover.
    #[serde(rename = "TO")]
    To,
    /// Personal foul.
    #[serde(rename = "FOUL")]
    Foul,
}

impl StatType {
    /// Every stat type, in table order.
    pub const ALL: [StatType; 13] = [
        StatType::Pts2,
        StatType::Pts3,
        StatType::PtsFt,
        StatType::FgMiss,
        StatType::Fg3Miss,
        StatType::FtMiss,
        StatType::Oreb,
        StatType::Dreb,
        StatType::Ast,
        StatType::Stl,
        StatType::Blk,
        StatType::To,
        StatType::Foul,
    ];

    /// Signed counter deltas applied when this stat is recorded.
    pub fn delta(self) -> StatDelta {
        use Counter::*;

        match self {
            StatType::Pts2 => StatDelta::scoring(2)
                .with(Points, 2)
                .with(FgMade, 1)
                .with(FgAttempted, 1),
            StatType::Pts3 => StatDelta::scoring(3)
                .with(Points, 3)
                .with(FgMade, 1)
                .with(FgAttempted, 1)
                .with(Fg3Made, 1)
                .with(Fg3Attempted, 1),
            StatType::PtsFt => StatDelta::scoring(1)
                .with(Points, 1)
                .with(FtMade, 1)
                .with(FtAttempted, 1),
            StatType::FgMiss => StatDelta::ZERO.with(FgAttempted, 1),
            StatType::Fg3Miss => StatDelta::ZERO.with(FgAttempted, 1).with(Fg3Attempted, 1),
            StatType::FtMiss => StatDelta::ZERO.with(FtAttempted, 1),
            StatType::Oreb | StatType::Dreb => StatDelta::ZERO.with(Rebounds, 1),
            StatType::Ast => StatDelta::ZERO.with(Assists, 1),
            StatType::Stl => StatDelta::ZERO.with(Steals, 1),
            StatType::Blk => StatDelta::ZERO.with(Blocks, 1),
            StatType::To => StatDelta::ZERO.with(Turnovers, 1),
            StatType::Foul => StatDelta::ZERO.with(Fouls, 1),
        }
    }

    /// Value carried on the wire for this stat: points for made baskets, 1 otherwise.
    pub fn canonical_value(self) -> u32 {
        match self.delta().score {
            0 => 1,
            points => points.unsigned_abs(),
        }
    }

    /// Whether this stat moves the team score.
    pub fn is_scoring(self) -> bool {
        self.delta().score != 0
    }
}

/// Individual box-score counter addressed by a [`StatDelta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Points scored.
    Points,
    /// Offensive and defensive rebounds.
    Rebounds,
    /// Assists.
    Assists,
    /// Steals.
    Steals,
    /// Blocks.
    Blocks,
    /// Turnovers.
    Turnovers,
    /// Personal fouls.
    Fouls,
    /// Field goals made (twos and threes).
    FgMade,
    /// Field goals attempted (twos and threes).
    FgAttempted,
    /// Three-pointers made.
    Fg3Made,
    /// Three-pointers attempted.
    Fg3Attempted,
    /// Free throws made.
    FtMade,
    /// Free throws attempted.
    FtAttempted,
}

const COUNTERS: usize = 13;

/// Signed delta vector over every counter plus the team score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatDelta {
    counters: [i32; COUNTERS],
    score: i32,
}

impl StatDelta {
    /// Delta that changes nothing.
    pub const ZERO: StatDelta = StatDelta {
        counters: [0; COUNTERS],
        score: 0,
    };

    const fn scoring(points: i32) -> Self {
        StatDelta {
            counters: [0; COUNTERS],
            score: points,
        }
    }

    const fn with(mut self, counter: Counter, amount: i32) -> Self {
        self.counters[counter as usize] += amount;
        self
    }

    /// Exact inverse of this delta.
    pub fn negate(self) -> Self {
        StatDelta {
            counters: self.counters.map(|amount| -amount),
            score: -self.score,
        }
    }

    /// Signed change applied to `counter`.
    pub fn counter(&self, counter: Counter) -> i32 {
        self.counters[counter as usize]
    }

    /// Signed change applied to the team score.
    pub fn score(&self) -> i32 {
        self.score
    }
}

/// Direction in which a stat is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Recording a play.
    Forward,
    /// Reverting a play.
    Inverse,
}

impl Direction {
    fn delta(self, stat: StatType) -> StatDelta {
        match self {
            Direction::Forward => stat.delta(),
            Direction::Inverse => stat.delta().negate(),
        }
    }
}

fn add_clamped(value: &mut u32, amount: i32) {
    *value = value.saturating_add_signed(amount);
}

/// Per-player counters for a single game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerGameStats {
    /// Points scored.
    pub points: u32,
    /// Rebounds, offensive and defensive.
    pub rebounds: u32,
    /// Assists.
    pub assists: u32,
    /// Steals.
    pub steals: u32,
    /// Blocks.
    pub blocks: u32,
    /// Turnovers.
    pub turnovers: u32,
    /// Personal fouls.
    pub fouls: u32,
    /// Field goals made.
    pub fg_made: u32,
    /// Field goals attempted.
    pub fg_attempted: u32,
    /// Three-pointers made.
    pub fg3_made: u32,
    /// Three-pointers attempted.
    pub fg3_attempted: u32,
    /// Free throws made.
    pub ft_made: u32,
    /// Free throws attempted.
    pub ft_attempted: u32,
}

impl PlayerGameStats {
    fn slot_mut(&mut self, counter: Counter) -> &mut u32 {
        match counter {
            Counter::Points => &mut self.points,
            Counter::Rebounds => &mut self.rebounds,
            Counter::Assists => &mut self.assists,
            Counter::Steals => &mut self.steals,
            Counter::Blocks => &mut self.blocks,
            Counter::Turnovers => &mut self.turnovers,
            Counter::Fouls => &mut self.fouls,
            Counter::FgMade => &mut self.fg_made,
            Counter::FgAttempted => &mut self.fg_attempted,
            Counter::Fg3Made => &mut self.fg3_made,
            Counter::Fg3Attempted => &mut self.fg3_attempted,
            Counter::FtMade => &mut self.ft_made,
            Counter::FtAttempted => &mut self.ft_attempted,
        }
    }

    /// Apply a delta, clamping every counter at zero.
    pub fn apply(&mut self, delta: &StatDelta) {
        const ORDER: [Counter; COUNTERS] = [
            Counter::Points,
            Counter::Rebounds,
            Counter::Assists,
            Counter::Steals,
            Counter::Blocks,
            Counter::Turnovers,
            Counter::Fouls,
            Counter::FgMade,
            Counter::FgAttempted,
            Counter::Fg3Made,
            Counter::Fg3Attempted,
            Counter::FtMade,
            Counter::FtAttempted,
        ];

        for counter in ORDER {
            let amount = delta.counter(counter);
            if amount != 0 {
                add_clamped(self.slot_mut(counter), amount);
            }
        }
    }

    /// True when no counter has moved.
    pub fn is_empty(&self) -> bool {
        *self == PlayerGameStats::default()
    }
}

/// Which bench a team sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    /// Home team.
    Home,
    /// Away team.
    Away,
}

/// Running team scores and per-player counters, derived from the event log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxScore {
    players: IndexMap<Uuid, PlayerGameStats>,
    home_score: u32,
    away_score: u32,
}

impl BoxScore {
    /// Apply `stat` for `player_id` on `side` in the given direction.
    pub fn apply(&mut self, side: TeamSide, player_id: Uuid, stat: StatType, direction: Direction) {
        let delta = direction.delta(stat);
        self.players.entry(player_id).or_default().apply(&delta);

        let score = match side {
            TeamSide::Home => &mut self.home_score,
            TeamSide::Away => &mut self.away_score,
        };
        add_clamped(score, delta.score());
    }

    /// Rebuild a box score from scratch by replaying plays in log order.
    pub fn replay<I>(plays: I) -> Self
    where
        I: IntoIterator<Item = (TeamSide, Uuid, StatType)>,
    {
        let mut box_score = BoxScore::default();
        for (side, player_id, stat) in plays {
            box_score.apply(side, player_id, stat, Direction::Forward);
        }
        box_score
    }

    /// Counters for one player; untouched players report all zeros.
    pub fn player(&self, player_id: &Uuid) -> PlayerGameStats {
        self.players.get(player_id).copied().unwrap_or_default()
    }

    /// Score of one side.
    pub fn score(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::Home => self.home_score,
            TeamSide::Away => self.away_score,
        }
    }
}
