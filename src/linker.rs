use tracing::debug;

use crate::aliases::AliasIndex;
use crate::raw_results::timestamp_to_date;
use crate::series::scores_for;
use crate::types::*;

// ── Fixture status ─────────────────────────────────────────────────────

pub fn wins_needed(best_of: u8) -> u32 {
  (u32::from(best_of.max(1)) + 1) / 2
}

/// Status of a fixture holding `maps`; nothing else feeds into it.
pub fn derive_status(maps: &[FixtureMap], best_of: u8, mode: ScoringMode) -> FixtureStatus {
  if maps.is_empty() {
    return FixtureStatus::Scheduled;
  }
  let complete = match mode {
    ScoringMode::PlayAll => maps.len() >= usize::from(best_of.max(1)),
    ScoringMode::BestOf => {
      let mut wins = [0u32; 2];
      for map in maps {
        if let Some(side) = map.winner_side() {
          wins[side] += 1;
        }
      }
      let needed = wins_needed(best_of);
      wins[0] >= needed || wins[1] >= needed
    }
  };
  if complete {
    FixtureStatus::Completed
  } else {
    FixtureStatus::Live
  }
}

// ── Series -> fixture ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixtureMatch<'a> {
  /// No fixture features this pair; the caller decides what to do.
  NoCandidate,
  /// A fixture already holds maps of this series.
  Existing(&'a Fixture),
  Single(&'a Fixture),
  /// Several meetings of the pair; `chosen` won the preference order.
  Disambiguated { chosen: &'a Fixture, candidates: usize },
}

impl<'a> FixtureMatch<'a> {
  pub fn fixture(&self) -> Option<&'a Fixture> {
    match *self {
      FixtureMatch::NoCandidate => None,
      FixtureMatch::Existing(f) | FixtureMatch::Single(f) => Some(f),
      FixtureMatch::Disambiguated { chosen, .. } => Some(chosen),
    }
  }
}

pub fn fixture_matches_pair(fixture: &Fixture, team1: &str, team2: &str, aliases: &AliasIndex) -> bool {
  let (a, b) = aliases.resolve_pair(&fixture.team1, &fixture.team2);
  let (x, y) = aliases.resolve_pair(team1, team2);
  a == x && b == y
}

/// Pick the fixture a series belongs to.
///
/// Among several meetings of the same pair, fixtures without results are
/// preferred, then the one scheduled closest to the series' first map.
/// Remaining ties go to the earliest fixture in schedule order.
pub fn match_series_to_fixture<'a, I>(series: &Series, fixtures: I, aliases: &AliasIndex) -> FixtureMatch<'a>
where
  I: IntoIterator<Item = &'a Fixture>,
{
  let candidates: Vec<&Fixture> = fixtures
    .into_iter()
    .filter(|f| fixture_matches_pair(f, &series.team1, &series.team2, aliases))
    .collect();

  if let Some(existing) = candidates
    .iter()
    .copied()
    .find(|f| series.map_ids().any(|id| f.contains_map(id)))
  {
    return FixtureMatch::Existing(existing);
  }

  match candidates.len() {
    0 => FixtureMatch::NoCandidate,
    1 => FixtureMatch::Single(candidates[0]),
    count => {
      let empty: Vec<&Fixture> = candidates.iter().copied().filter(|f| !f.has_results()).collect();
      let pool = if empty.is_empty() { &candidates } else { &empty };
      let series_date = series.first_played_at_ms().and_then(timestamp_to_date);
      let chosen = pool
        .iter()
        .copied()
        .min_by_key(|f| date_distance_days(series_date, f.date))
        .unwrap_or(pool[0]);
      debug!(
        "series {} matched {count} fixtures, picked {} (date {:?})",
        series.id, chosen.id, chosen.date
      );
      FixtureMatch::Disambiguated { chosen, candidates: count }
    }
  }
}

fn date_distance_days(a: Option<chrono::NaiveDate>, b: Option<chrono::NaiveDate>) -> i64 {
  match (a, b) {
    (Some(a), Some(b)) => (a - b).num_days().abs(),
    _ => i64::MAX,
  }
}

/// Series maps in the fixture's team order, minus maps the fixture already has.
pub fn fixture_maps_for_series(series: &Series, fixture: &Fixture, aliases: &AliasIndex) -> Vec<FixtureMap> {
  translate_series_maps(series, fixture, aliases)
    .into_iter()
    .filter(|map| !fixture.contains_map(&map.id))
    .collect()
}

/// Every map of the series in the fixture's team order, tagged with the series id.
pub fn translate_series_maps(series: &Series, fixture: &Fixture, aliases: &AliasIndex) -> Vec<FixtureMap> {
  let first_team = aliases.resolve(&fixture.team1);
  series
    .maps
    .iter()
    .map(|raw| {
      let [score1, score2] = scores_for(raw, aliases, &first_team);
      FixtureMap {
        id: raw.id.clone(),
        map: raw.map.clone(),
        score1,
        score2,
        series_id: Some(series.id.clone()),
      }
    })
    .collect()
}

// ── Bracket slot -> fixture ────────────────────────────────────────────

/// Canonical playoff round, so that "qf", "quarter" and "Quarterfinals"
/// (and "r8") all compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundKind {
  Group,
  RoundOf(u32),
  Quarter,
  Semi,
  Final,
  ThirdPlace,
  Other(String),
}

pub fn round_kind(label: &str) -> RoundKind {
  let lower = label
    .trim()
    .to_lowercase()
    .replace(['-', '_'], " ");
  let lower = lower.split_whitespace().collect::<Vec<_>>().join(" ");

  if lower.starts_with(GROUP_ROUND) {
    return RoundKind::Group;
  }
  if let Some(size) = round_of_size(&lower).or_else(|| final_n_size(&lower)) {
    return match size {
      8 => RoundKind::Quarter,
      4 => RoundKind::Semi,
      2 => RoundKind::Final,
      n => RoundKind::RoundOf(n),
    };
  }
  if lower == "qf" || lower.contains("quarter") {
    return RoundKind::Quarter;
  }
  if lower == "sf" || lower.contains("semi") {
    return RoundKind::Semi;
  }
  if lower.contains("third") || lower.contains("3rd") || lower.contains("bronze") {
    return RoundKind::ThirdPlace;
  }
  if lower == "f" || lower == "gf" || lower.contains("final") {
    return RoundKind::Final;
  }
  RoundKind::Other(lower)
}

fn round_of_size(lower: &str) -> Option<u32> {
  let rest = ["round of ", "last ", "ro", "r"]
    .iter()
    .find_map(|prefix| lower.strip_prefix(prefix))?;
  rest.trim().parse::<u32>().ok().filter(|n| *n >= 2)
}

// "final four", "final 8": the teams left in the round, not the final itself.
fn final_n_size(lower: &str) -> Option<u32> {
  let words: Vec<&str> = lower.split(' ').collect();
  words.windows(2).find(|w| w[0] == "final").and_then(|w| match w[1] {
    "four" | "4" => Some(4),
    "eight" | "8" => Some(8),
    "sixteen" | "16" => Some(16),
    _ => None,
  })
}

pub fn rounds_match(a: &str, b: &str) -> bool {
  round_kind(a) == round_kind(b)
}

/// Score shown on a bracket slot.
///
/// An operator override always wins. Otherwise the slot's pair is looked up
/// among playoff fixtures of the hinted round, then among any fixtures of
/// the pair, and map wins are counted in the slot's team order.
pub fn resolve_bracket_score(slot: &BracketSlot, fixtures: &[Fixture], aliases: &AliasIndex) -> Option<BracketScore> {
  if let Some(score) = slot.score_override {
    return Some(score);
  }
  let team1 = aliases.resolve(&slot.team1);
  let team2 = aliases.resolve(&slot.team2);
  if team1.is_empty() || team2.is_empty() {
    return None;
  }

  let same_pair = |f: &&Fixture| fixture_matches_pair(f, &team1, &team2, aliases);
  let by_round = if slot.round.trim().is_empty() {
    None
  } else {
    fixtures
      .iter()
      .filter(|f| !f.is_group_stage())
      .filter(same_pair)
      .find(|f| rounds_match(&f.round, &slot.round))
  };
  let fixture = by_round.or_else(|| fixtures.iter().find(same_pair))?;

  let wins = fixture.map_wins();
  let same_order = aliases.resolve(&fixture.team1) == team1;
  let (score1, score2) = if same_order { (wins[0], wins[1]) } else { (wins[1], wins[0]) };
  Some(BracketScore { score1, score2 })
}
