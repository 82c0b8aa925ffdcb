use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Constants ──────────────────────────────────────────────────────────

pub const GROUP_ROUND: &str = "group";
pub const DEFAULT_SERIES_GAP_MINUTES: i64 = 120;
pub const DEFAULT_BEST_OF: u8 = 3;
pub const DEFAULT_FETCH_RETRIES: u32 = 3;
pub const TIE_BREAK_MAP_DIFF: &str = "mapDiff";
pub const TIE_BREAK_FRAG_DIFF: &str = "fragDiff";
pub const TIE_BREAK_HEAD_TO_HEAD: &str = "headToHead";

// ── Roster ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Team {
    pub fn new(name: &str, tag: &str) -> Self {
        Team {
            name: name.to_string(),
            tag: tag.to_string(),
            ..Team::default()
        }
    }
}

// ── Schedule ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FixtureStatus {
    #[default]
    Scheduled,
    Live,
    Completed,
}

/// One map as recorded on a fixture, scored in the fixture's team order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureMap {
    pub id: String,
    pub map: String,
    pub score1: i32,
    pub score2: i32,
    #[serde(default)]
    pub series_id: Option<String>,
}

impl FixtureMap {
    /// 0 when team1 took the map, 1 for team2, None on equal frags.
    pub fn winner_side(&self) -> Option<usize> {
        match self.score1.cmp(&self.score2) {
            std::cmp::Ordering::Greater => Some(0),
            std::cmp::Ordering::Less => Some(1),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub id: String,
    pub team1: String,
    pub team2: String,
    #[serde(default)]
    pub group: Option<String>,
    pub round: String,
    #[serde(default)]
    pub round_num: u32,
    #[serde(default = "default_meeting")]
    pub meeting: u32,
    #[serde(default = "default_best_of")]
    pub best_of: u8,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub status: FixtureStatus,
    #[serde(default)]
    pub maps: Vec<FixtureMap>,
}

fn default_meeting() -> u32 {
    1
}

fn default_best_of() -> u8 {
    DEFAULT_BEST_OF
}

impl Fixture {
    pub fn is_group_stage(&self) -> bool {
        self.round.trim().eq_ignore_ascii_case(GROUP_ROUND)
    }

    pub fn has_results(&self) -> bool {
        !self.maps.is_empty()
    }

    pub fn contains_map(&self, map_id: &str) -> bool {
        self.maps.iter().any(|m| m.id == map_id)
    }

    /// Map wins as `[team1, team2]`.
    pub fn map_wins(&self) -> [u32; 2] {
        let mut wins = [0u32; 2];
        for map in &self.maps {
            if let Some(side) = map.winner_side() {
                wins[side] += 1;
            }
        }
        wins
    }

    /// Total frags as `[team1, team2]`.
    pub fn frags(&self) -> [i64; 2] {
        self.maps.iter().fold([0i64; 2], |mut acc, map| {
            acc[0] += i64::from(map.score1);
            acc[1] += i64::from(map.score2);
            acc
        })
    }
}

// ── Raw results ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSide {
    pub name: String,
    pub frags: i32,
}

/// A single imported game exactly as the stats source described it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMapResult {
    pub id: String,
    pub map: String,
    pub sides: [RawSide; 2],
    #[serde(default)]
    pub played_at_ms: Option<i64>,
    #[serde(default)]
    pub payload: Value,
}

/// A detected best-of / play-all contest between two resolved teams.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: String,
    pub team1: String,
    pub team2: String,
    pub maps: Vec<RawMapResult>,
    pub map_wins: [u32; 2],
    pub frags: [i64; 2],
    pub fixture_id: Option<String>,
}

impl Series {
    pub fn first_played_at_ms(&self) -> Option<i64> {
        self.maps.first().and_then(|m| m.played_at_ms)
    }

    pub fn map_ids(&self) -> impl Iterator<Item = &str> {
        self.maps.iter().map(|m| m.id.as_str())
    }
}

// ── Standings ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsEntry {
    pub team: String,
    pub group: String,
    pub played: u32,
    pub points: i32,
    pub wins: u32,
    pub losses: u32,
    pub maps_won: u32,
    pub maps_lost: u32,
    pub frags_for: i64,
    pub frags_against: i64,
}

impl StandingsEntry {
    pub fn map_diff(&self) -> i64 {
        i64::from(self.maps_won) - i64::from(self.maps_lost)
    }

    pub fn frag_diff(&self) -> i64 {
        self.frags_for - self.frags_against
    }
}

// ── Bracket ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketScore {
    pub score1: u32,
    pub score2: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSlot {
    pub team1: String,
    pub team2: String,
    #[serde(default)]
    pub round: String,
    #[serde(default)]
    pub score_override: Option<BracketScore>,
}

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoringMode {
    /// First side to a map-win majority takes the series.
    #[default]
    BestOf,
    /// Every map of the series is played out and scored.
    PlayAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    pub mode: ScoringMode,
    pub points_win: i32,
    pub points_loss: i32,
    pub tie_breakers: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            mode: ScoringMode::BestOf,
            points_win: 3,
            points_loss: 0,
            tie_breakers: vec![
                TIE_BREAK_MAP_DIFF.to_string(),
                TIE_BREAK_FRAG_DIFF.to_string(),
                TIE_BREAK_HEAD_TO_HEAD.to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchedulePace {
    Daily,
    EveryDays(u32),
    #[default]
    Flexible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub series_gap_minutes: i64,
    pub stats_source_url: String,
    pub stats_source_token: String,
    pub fetch_retries: u32,
    pub log_dir: String,
    /// Drop stored fixture maps and link every game again on load
    pub relink_from_scratch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            series_gap_minutes: DEFAULT_SERIES_GAP_MINUTES,
            stats_source_url: String::new(),
            stats_source_token: String::new(),
            fetch_retries: DEFAULT_FETCH_RETRIES,
            log_dir: "logs".to_string(),
            relink_from_scratch: false,
        }
    }
}

impl EngineConfig {
    pub fn series_gap_ms(&self) -> i64 {
        self.series_gap_minutes.max(0) * 60 * 1000
    }
}

// ── Moderation queue ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModerationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationEntry {
    pub id: String,
    #[serde(default)]
    pub status: ModerationStatus,
    pub payload: Value,
    #[serde(default)]
    pub submitted_by: Option<String>,
}
