use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::aliases::AliasIndex;
use crate::config::{normalize_team_key, pair_key};
use crate::types::{RawMapResult, RawSide};

const ID_KEYS: [&str; 4] = ["id", "gameId", "demoSha256", "demo_sha256"];
const TIMESTAMP_KEYS: [&str; 6] = ["date", "timestamp", "playedAt", "startAt", "playedOn", "startTime"];

pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(num) => num.as_i64().or_else(|| num.as_f64().map(|f| f.round() as i64)),
        Value::String(raw) => raw.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

/// Epoch seconds or milliseconds to milliseconds. Non-positive values and
/// values past the representable range are not usable timestamps.
pub fn normalize_timestamp_ms(value: i64) -> Option<i64> {
    if value <= 0 {
        None
    } else if value > 10_000_000_000 {
        Some(value)
    } else {
        value.checked_mul(1000)
    }
}

/// Milliseconds since the epoch for the timestamp shapes stats sites emit.
pub fn parse_timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                return Some(parsed.timestamp_millis());
            }
            if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
                return Some(parsed.timestamp_millis());
            }
            if let Ok(parsed) = raw.parse::<i64>() {
                return normalize_timestamp_ms(parsed);
            }
            for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
                if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, fmt) {
                    return Some(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc).timestamp_millis());
                }
            }
            None
        }
        Value::Number(num) => num.as_i64().and_then(normalize_timestamp_ms),
        _ => None,
    }
}

pub fn timestamp_to_date(ms: i64) -> Option<chrono::NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

pub fn payload_game_id(value: &Value) -> Option<String> {
    ID_KEYS.iter().find_map(|key| value.get(*key).and_then(value_to_string))
}

/// Parse one stats payload into a raw map result.
///
/// Accepted shapes:
/// - team play: `teams: [{name, frags}]`, or `teams: ["red", "blue"]` with
///   per-player frags summed from `players: [{name, team, frags | stats.frags}]`
/// - duel: `players: [{name, frags | stats.frags}]` with exactly two entries
pub fn parse_raw_result(value: &Value) -> Result<RawMapResult, String> {
    if !value.is_object() {
        return Err("payload must be a JSON object".to_string());
    }
    let id = payload_game_id(value).ok_or_else(|| "payload is missing a game id".to_string())?;
    let map = value
        .get("map")
        .and_then(value_to_string)
        .ok_or_else(|| format!("game {id}: payload is missing a map name"))?;
    let played_at_ms = TIMESTAMP_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(parse_timestamp_ms));
    let sides = parse_sides(value).map_err(|e| format!("game {id}: {e}"))?;

    Ok(RawMapResult {
        id,
        map,
        sides,
        played_at_ms,
        payload: value.clone(),
    })
}

fn parse_sides(value: &Value) -> Result<[RawSide; 2], String> {
    let players = value.get("players").and_then(|p| p.as_array());
    let sides: Vec<RawSide> = match value.get("teams").and_then(|t| t.as_array()) {
        Some(teams) if !teams.is_empty() => teams
            .iter()
            .map(|entry| team_side(entry, players))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| "team entry without a name".to_string())?,
        _ => players
            .ok_or_else(|| "payload has neither teams nor players".to_string())?
            .iter()
            .map(|entry| {
                let name = entry.get("name").and_then(value_to_string)?;
                Some(RawSide { name, frags: entry_frags(entry).unwrap_or(0) })
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| "player entry without a name".to_string())?,
    };

    match <[RawSide; 2]>::try_from(sides) {
        Ok(pair) => {
            if normalize_team_key(&pair[0].name) == normalize_team_key(&pair[1].name) {
                return Err(format!("both sides are named {:?}", pair[0].name));
            }
            Ok(pair)
        }
        Err(sides) => Err(format!("expected exactly two sides, found {}", sides.len())),
    }
}

fn team_side(entry: &Value, players: Option<&Vec<Value>>) -> Option<RawSide> {
    let name = match entry {
        Value::String(_) => value_to_string(entry)?,
        _ => entry.get("name").and_then(value_to_string)?,
    };
    let frags = entry_frags(entry).unwrap_or_else(|| {
        let key = normalize_team_key(&name);
        players
            .into_iter()
            .flatten()
            .filter(|player| {
                player
                    .get("team")
                    .and_then(value_to_string)
                    .is_some_and(|team| normalize_team_key(&team) == key)
            })
            .filter_map(entry_frags)
            .sum()
    });
    Some(RawSide { name, frags })
}

fn entry_frags(entry: &Value) -> Option<i32> {
    entry
        .get("frags")
        .or_else(|| entry.get("score"))
        .or_else(|| entry.get("stats").and_then(|stats| stats.get("frags")))
        .and_then(value_to_i64)
        .and_then(|frags| i32::try_from(frags).ok())
}

/// Content key used to spot the same game imported under two ids:
/// map, resolved team pair and timestamp.
pub fn content_fingerprint(raw: &RawMapResult, aliases: &AliasIndex) -> String {
    let a = normalize_team_key(&aliases.resolve(&raw.sides[0].name));
    let b = normalize_team_key(&aliases.resolve(&raw.sides[1].name));
    let when = raw
        .played_at_ms
        .map(|ms| ms.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{}|{}|{}", raw.map.trim().to_lowercase(), pair_key(&a, &b), when)
}
