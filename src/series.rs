use std::collections::BTreeMap;
use tracing::debug;

use crate::aliases::AliasIndex;
use crate::config::pair_key;
use crate::types::{RawMapResult, Series};

/// Frags of `raw` ordered as `[first_team, other]`, using resolved identities.
pub fn scores_for(raw: &RawMapResult, aliases: &AliasIndex, first_team: &str) -> [i32; 2] {
    let [a, b] = &raw.sides;
    if aliases.resolve(&b.name) == first_team && aliases.resolve(&a.name) != first_team {
        [b.frags, a.frags]
    } else {
        [a.frags, b.frags]
    }
}

/// Cluster raw map results into series.
///
/// Maps are grouped by resolved matchup, then split wherever two consecutive
/// maps are more than `gap_ms` apart or either one has no timestamp.
/// Output order and ids depend only on the set of maps, not on input order.
pub fn detect_series(raw_maps: &[RawMapResult], aliases: &AliasIndex, gap_ms: i64) -> Vec<Series> {
    let mut by_matchup: BTreeMap<String, (String, String, Vec<&RawMapResult>)> = BTreeMap::new();
    for raw in raw_maps {
        let (team1, team2) = aliases.resolve_pair(&raw.sides[0].name, &raw.sides[1].name);
        by_matchup
            .entry(pair_key(&team1, &team2))
            .or_insert_with(|| (team1, team2, Vec::new()))
            .2
            .push(raw);
    }

    let mut out = Vec::new();
    for (key, (team1, team2, mut maps)) in by_matchup {
        maps.sort_by(|a, b| {
            a.played_at_ms
                .unwrap_or(i64::MAX)
                .cmp(&b.played_at_ms.unwrap_or(i64::MAX))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut chunks: Vec<Vec<&RawMapResult>> = Vec::new();
        for raw in maps {
            let continues = chunks
                .last()
                .and_then(|chunk| chunk.last())
                .is_some_and(|prev| within_gap(prev, raw, gap_ms));
            match chunks.last_mut() {
                Some(chunk) if continues => chunk.push(raw),
                _ => chunks.push(vec![raw]),
            }
        }

        for (index, chunk) in chunks.into_iter().enumerate() {
            let series = build_series(&key, index + 1, &team1, &team2, chunk, aliases);
            debug!(
                "series {} has {} map(s), {}-{}",
                series.id,
                series.maps.len(),
                series.map_wins[0],
                series.map_wins[1]
            );
            out.push(series);
        }
    }
    out
}

fn within_gap(prev: &RawMapResult, next: &RawMapResult, gap_ms: i64) -> bool {
    match (prev.played_at_ms, next.played_at_ms) {
        (Some(a), Some(b)) => a.abs_diff(b) <= u64::try_from(gap_ms).unwrap_or(0),
        _ => false,
    }
}

fn build_series(
    key: &str,
    index: usize,
    team1: &str,
    team2: &str,
    maps: Vec<&RawMapResult>,
    aliases: &AliasIndex,
) -> Series {
    let mut map_wins = [0u32; 2];
    let mut frags = [0i64; 2];
    for raw in &maps {
        let scores = scores_for(raw, aliases, team1);
        frags[0] += i64::from(scores[0]);
        frags[1] += i64::from(scores[1]);
        match scores[0].cmp(&scores[1]) {
            std::cmp::Ordering::Greater => map_wins[0] += 1,
            std::cmp::Ordering::Less => map_wins[1] += 1,
            std::cmp::Ordering::Equal => {}
        }
    }
    Series {
        id: format!("{key}#{index}"),
        team1: team1.to_string(),
        team2: team2.to_string(),
        maps: maps.into_iter().cloned().collect(),
        map_wins,
        frags,
        fixture_id: None,
    }
}
