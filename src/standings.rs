//! Group-stage standings.
//!
//! Points come first; ties are broken by walking the division's ordered
//! list of tie-breaker names against [`TIE_BREAKERS`], then by maps won.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
};
use tracing::warn;

use crate::linker::derive_status;
use crate::types::*;

/// Negative when `a` ranks above `b`.
pub type TieBreakFn = fn(&StandingsEntry, &StandingsEntry, &HeadToHead) -> Ordering;

pub const TIE_BREAKERS: &[(&str, TieBreakFn)] = &[
    (TIE_BREAK_MAP_DIFF, by_map_diff),
    (TIE_BREAK_FRAG_DIFF, by_frag_diff),
    (TIE_BREAK_HEAD_TO_HEAD, by_head_to_head),
];

pub fn tie_breaker(name: &str) -> Option<TieBreakFn> {
    let name = name.trim();
    TIE_BREAKERS
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, f)| *f)
}

fn by_map_diff(a: &StandingsEntry, b: &StandingsEntry, _: &HeadToHead) -> Ordering {
    b.map_diff().cmp(&a.map_diff())
}

fn by_frag_diff(a: &StandingsEntry, b: &StandingsEntry, _: &HeadToHead) -> Ordering {
    b.frag_diff().cmp(&a.frag_diff())
}

fn by_head_to_head(a: &StandingsEntry, b: &StandingsEntry, h2h: &HeadToHead) -> Ordering {
    h2h.compare(&a.team, &b.team)
}

/// Direct results between pairs of teams: series won in best-of scoring,
/// maps won in play-all scoring.
#[derive(Debug, Default)]
pub struct HeadToHead {
    wins: HashMap<(String, String), u32>,
}

impl HeadToHead {
    fn record(&mut self, winner: &str, loser: &str, count: u32) {
        if count == 0 {
            return;
        }
        *self.wins.entry((winner.to_string(), loser.to_string())).or_default() += count;
    }

    pub fn wins(&self, team: &str, opponent: &str) -> u32 {
        self.wins
            .get(&(team.to_string(), opponent.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.wins(b, a).cmp(&self.wins(a, b))
    }
}

#[derive(Default)]
struct GroupTable {
    entries: BTreeMap<String, StandingsEntry>,
    head_to_head: HeadToHead,
}

impl GroupTable {
    fn entry(&mut self, team: &str, group: &str) -> &mut StandingsEntry {
        self.entries.entry(team.to_string()).or_insert_with(|| StandingsEntry {
            team: team.to_string(),
            group: group.to_string(),
            ..StandingsEntry::default()
        })
    }

    fn tally(&mut self, fixture: &Fixture, group: &str, config: &ScoringConfig) {
        let wins = fixture.map_wins();
        let frags = fixture.frags();
        let teams = [fixture.team1.as_str(), fixture.team2.as_str()];

        for side in 0..2 {
            let other = 1 - side;
            let entry = self.entry(teams[side], group);
            entry.maps_won += wins[side];
            entry.maps_lost += wins[other];
            entry.frags_for += frags[side];
            entry.frags_against += frags[other];
        }

        let winner = match wins[0].cmp(&wins[1]) {
            Ordering::Greater => Some(0),
            Ordering::Less => Some(1),
            Ordering::Equal => None,
        };

        match config.mode {
            ScoringMode::PlayAll => {
                for side in 0..2 {
                    let other = 1 - side;
                    let entry = self.entry(teams[side], group);
                    entry.played += 1;
                    entry.points += wins[side] as i32 * config.points_win + wins[other] as i32 * config.points_loss;
                }
                self.head_to_head.record(teams[0], teams[1], wins[0]);
                self.head_to_head.record(teams[1], teams[0], wins[1]);
            }
            ScoringMode::BestOf => {
                if derive_status(&fixture.maps, fixture.best_of, ScoringMode::BestOf) != FixtureStatus::Completed {
                    return;
                }
                for side in 0..2 {
                    self.entry(teams[side], group).played += 1;
                }
                if let Some(w) = winner {
                    self.head_to_head.record(teams[w], teams[1 - w], 1);
                }
            }
        }

        if let Some(w) = winner {
            let points = match config.mode {
                ScoringMode::PlayAll => (0, 0),
                ScoringMode::BestOf => (config.points_win, config.points_loss),
            };
            let winner_entry = self.entry(teams[w], group);
            winner_entry.wins += 1;
            winner_entry.points += points.0;
            let loser_entry = self.entry(teams[1 - w], group);
            loser_entry.losses += 1;
            loser_entry.points += points.1;
        }
    }
}

/// Group-stage tables keyed by group label (empty label for ungrouped fixtures).
///
/// Only group fixtures with at least one map count. The result depends on the
/// fixture contents alone, never on their order in `fixtures`.
pub fn compute_standings(fixtures: &[Fixture], config: &ScoringConfig) -> BTreeMap<String, Vec<StandingsEntry>> {
    let mut tables: BTreeMap<String, GroupTable> = BTreeMap::new();
    for fixture in fixtures.iter().filter(|f| f.is_group_stage() && f.has_results()) {
        let group = fixture.group.clone().unwrap_or_default();
        tables
            .entry(group.clone())
            .or_default()
            .tally(fixture, &group, config);
    }

    let breakers: Vec<TieBreakFn> = config
        .tie_breakers
        .iter()
        .filter_map(|name| {
            let found = tie_breaker(name);
            if found.is_none() {
                warn!("unknown tie-breaker {name:?} ignored");
            }
            found
        })
        .collect();

    tables
        .into_iter()
        .map(|(group, table)| {
            let mut rows: Vec<StandingsEntry> = table.entries.into_values().collect();
            sort_rows(&mut rows, |a, b| rank(a, b, &breakers, &table.head_to_head));
            (group, rows)
        })
        .collect()
}

fn rank(a: &StandingsEntry, b: &StandingsEntry, breakers: &[TieBreakFn], h2h: &HeadToHead) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| {
            breakers
                .iter()
                .map(|f| f(a, b, h2h))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| b.maps_won.cmp(&a.maps_won))
        .then_with(|| a.team.cmp(&b.team))
}

// Head-to-head is not transitive across three or more teams, so rows are
// ordered with a stable insertion sort over name-sorted input rather than
// slice::sort_by, which requires a total order.
fn sort_rows<F>(rows: &mut [StandingsEntry], mut cmp: F)
where
    F: FnMut(&StandingsEntry, &StandingsEntry) -> Ordering,
{
    for i in 1..rows.len() {
        let mut j = i;
        while j > 0 && cmp(&rows[j - 1], &rows[j]) == Ordering::Greater {
            rows.swap(j - 1, j);
            j -= 1;
        }
    }
}
