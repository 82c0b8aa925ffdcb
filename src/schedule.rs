use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
  #[error("{0} team(s) have no group assignment")]
  UnassignedTeams(usize),
  #[error("group {group} needs at least two teams")]
  NotEnoughTeams { group: String },
  #[error("meetings must be at least 1")]
  InvalidMeetings,
}

#[derive(Debug, Clone)]
pub struct ScheduleOptions {
  /// Team name to group label; takes precedence over `Team::group`.
  pub group_assignments: BTreeMap<String, String>,
  pub meetings: u32,
  pub best_of: u8,
  pub pace: SchedulePace,
  pub start_date: Option<NaiveDate>,
}

impl Default for ScheduleOptions {
  fn default() -> Self {
    ScheduleOptions {
      group_assignments: BTreeMap::new(),
      meetings: 1,
      best_of: DEFAULT_BEST_OF,
      pace: SchedulePace::Flexible,
      start_date: None,
    }
  }
}

/// Pairings for one round-robin cycle, as indices into the team list.
///
/// Circle method: the first team stays put while the rest rotate one step
/// per round. Odd team counts get a bye placeholder and any pairing that
/// touches it is dropped, leaving one idle team per round.
pub fn circle_rounds(team_count: usize) -> Vec<Vec<(usize, usize)>> {
  if team_count < 2 {
    return Vec::new();
  }
  let mut slots: Vec<Option<usize>> = (0..team_count).map(Some).collect();
  if slots.len() % 2 == 1 {
    slots.push(None);
  }
  let size = slots.len();
  let fixed = slots[0];
  let mut rotating: Vec<Option<usize>> = slots[1..].to_vec();

  let mut rounds = Vec::with_capacity(size - 1);
  for _ in 0..size - 1 {
    let last = rotating.len() - 1;
    let mut pairs = Vec::with_capacity(size / 2);
    push_pairing(&mut pairs, fixed, rotating[last]);
    for i in 0..(size / 2 - 1) {
      push_pairing(&mut pairs, rotating[i], rotating[last - 1 - i]);
    }
    rounds.push(pairs);
    if let Some(tail) = rotating.pop() {
      rotating.insert(0, tail);
    }
  }
  rounds
}

fn push_pairing(pairs: &mut Vec<(usize, usize)>, a: Option<usize>, b: Option<usize>) {
  if let (Some(a), Some(b)) = (a, b) {
    pairs.push((a, b));
  }
}

pub fn rounds_per_cycle(team_count: usize) -> u32 {
  match team_count {
    0 | 1 => 0,
    n if n % 2 == 0 => (n - 1) as u32,
    n => n as u32,
  }
}

/// Scheduled date of a (1-based) round, or None for flexible pacing.
pub fn round_date(start: Option<NaiveDate>, pace: SchedulePace, round_num: u32) -> Option<NaiveDate> {
  let start = start?;
  let step = match pace {
    SchedulePace::Daily => 1,
    SchedulePace::EveryDays(days) => u64::from(days.max(1)),
    SchedulePace::Flexible => return None,
  };
  let offset = u64::from(round_num.saturating_sub(1)) * step;
  start.checked_add_days(Days::new(offset))
}

/// Fixtures for one group across every meeting cycle.
pub fn generate_group_fixtures(group: &str, teams: &[String], options: &ScheduleOptions) -> Vec<Fixture> {
  let cycle = circle_rounds(teams.len());
  let per_cycle = cycle.len() as u32;
  let group_slug = slugify(group);
  let mut fixtures = Vec::new();

  for cycle_index in 0..options.meetings {
    for (round_index, pairs) in cycle.iter().enumerate() {
      let round_num = cycle_index * per_cycle + round_index as u32 + 1;
      let date = round_date(options.start_date, options.pace, round_num);
      for (match_index, &(a, b)) in pairs.iter().enumerate() {
        let (home, away) = if cycle_index % 2 == 0 { (a, b) } else { (b, a) };
        fixtures.push(Fixture {
          id: format!("{group_slug}-r{round_num}-{}", match_index + 1),
          team1: teams[home].clone(),
          team2: teams[away].clone(),
          group: Some(group.to_string()),
          round: GROUP_ROUND.to_string(),
          round_num,
          meeting: cycle_index + 1,
          best_of: options.best_of,
          date,
          status: FixtureStatus::Scheduled,
          maps: Vec::new(),
        });
      }
    }
  }
  fixtures
}

/// Round-robin schedule for every group of the roster.
///
/// Every team must belong to a group, either via `options.group_assignments`
/// or its own `group` field; otherwise nothing is generated.
pub fn generate_schedule(teams: &[Team], options: &ScheduleOptions) -> Result<Vec<Fixture>, ScheduleError> {
  if options.meetings == 0 {
    return Err(ScheduleError::InvalidMeetings);
  }

  let mut groups: Vec<(String, Vec<String>)> = Vec::new();
  let mut unassigned = 0usize;
  for team in teams {
    let group = options
      .group_assignments
      .get(&team.name)
      .cloned()
      .or_else(|| team.group.clone())
      .map(|g| g.trim().to_string())
      .filter(|g| !g.is_empty());
    let Some(group) = group else {
      unassigned += 1;
      continue;
    };
    match groups.iter_mut().find(|(name, _)| *name == group) {
      Some((_, members)) => members.push(team.name.clone()),
      None => groups.push((group, vec![team.name.clone()])),
    }
  }
  if unassigned > 0 {
    return Err(ScheduleError::UnassignedTeams(unassigned));
  }
  if let Some((group, _)) = groups.iter().find(|(_, members)| members.len() < 2) {
    return Err(ScheduleError::NotEnoughTeams { group: group.clone() });
  }

  let mut fixtures = Vec::new();
  for (group, members) in &groups {
    let generated = generate_group_fixtures(group, members, options);
    info!(
      "generated {} fixtures for group {group} ({} teams, {} meeting(s))",
      generated.len(),
      members.len(),
      options.meetings
    );
    fixtures.extend(generated);
  }
  Ok(fixtures)
}

pub(crate) fn slugify(name: &str) -> String {
  let mut out = String::new();
  let mut last_dash = false;
  for ch in name.chars() {
    let lower = ch.to_ascii_lowercase();
    if lower.is_ascii_alphanumeric() {
      out.push(lower);
      last_dash = false;
    } else if !last_dash {
      out.push('-');
      last_dash = true;
    }
  }
  let slug = out.trim_matches('-').to_string();
  if slug.is_empty() {
    "group".to_string()
  } else {
    slug
  }
}
