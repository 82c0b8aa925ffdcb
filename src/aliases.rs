use std::collections::HashMap;
use tracing::debug;

use crate::config::{normalize_team_key, strip_bracket_chars};
use crate::types::Team;

/// Immutable lookup from free-text team identifiers to canonical names.
///
/// Built once per resolution pass from the division roster. Keys are:
/// - the canonical team name
/// - the team tag, and the tag with bracket characters stripped
/// - every declared alias
///
/// Canonical names are indexed first so that a tag or alias can never
/// shadow another team's real name.
#[derive(Debug, Clone, Default)]
pub struct AliasIndex {
    /// Canonical names, indexed by position in the roster
    names: Vec<String>,
    /// Normalized identifier to roster position
    lookup: HashMap<String, usize>,
}

impl AliasIndex {
    pub fn new(teams: &[Team]) -> Self {
        let names: Vec<String> = teams.iter().map(|t| t.name.clone()).collect();
        let mut lookup: HashMap<String, usize> = HashMap::new();

        for (idx, team) in teams.iter().enumerate() {
            insert_key(&mut lookup, &team.name, idx, &names);
        }
        for (idx, team) in teams.iter().enumerate() {
            if !team.tag.trim().is_empty() {
                insert_key(&mut lookup, &team.tag, idx, &names);
                insert_key(&mut lookup, &strip_bracket_chars(&team.tag), idx, &names);
            }
            for alias in &team.aliases {
                insert_key(&mut lookup, alias, idx, &names);
            }
        }

        AliasIndex { names, lookup }
    }

    /// Canonical name for `raw`, or `raw` itself (trimmed) when nothing matches.
    pub fn resolve(&self, raw: &str) -> String {
        self.lookup(raw)
            .map(|name| name.to_string())
            .unwrap_or_else(|| raw.trim().to_string())
    }

    /// Canonical name only when `raw` is known to the roster.
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        let key = normalize_team_key(raw);
        if key.is_empty() {
            return None;
        }
        self.lookup
            .get(&key)
            .or_else(|| self.lookup.get(&normalize_team_key(&strip_bracket_chars(raw))))
            .and_then(|&idx| self.names.get(idx))
            .map(|name| name.as_str())
    }

    pub fn is_known(&self, raw: &str) -> bool {
        self.lookup(raw).is_some()
    }

    /// Resolved names sorted alphabetically, for order-insensitive comparisons.
    pub fn resolve_pair(&self, a: &str, b: &str) -> (String, String) {
        let a = self.resolve(a);
        let b = self.resolve(b);
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn insert_key(lookup: &mut HashMap<String, usize>, raw: &str, idx: usize, names: &[String]) {
    let key = normalize_team_key(raw);
    if key.is_empty() {
        return;
    }
    match lookup.get(&key) {
        Some(&existing) if existing != idx => {
            debug!(
                "identifier {raw:?} already resolves to {:?}; ignoring it for {:?}",
                names[existing], names[idx]
            );
        }
        Some(_) => {}
        None => {
            lookup.insert(key, idx);
        }
    }
}
