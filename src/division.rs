use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fs,
    path::Path,
    sync::Arc,
};
use tracing::{debug, info, warn};

use crate::aliases::AliasIndex;
use crate::linker::{
    derive_status, fixture_matches_pair, match_series_to_fixture, resolve_bracket_score, translate_series_maps,
    FixtureMatch,
};
use crate::raw_results::{content_fingerprint, parse_raw_result, payload_game_id, timestamp_to_date};
use crate::schedule::slugify;
use crate::series::detect_series;
use crate::standings::compute_standings;
use crate::types::*;

/// A change to the schedule. Applying patches yields a new snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum FixturePatch {
    Insert(Fixture),
    /// Lay `maps` out in the given order as one block: maps the fixture already
    /// holds are replaced where the first of them sat, the rest are appended.
    AppendMaps { fixture_id: String, maps: Vec<FixtureMap> },
    /// Drop every map tagged with `series_id` from a fixture.
    RemoveSeries { fixture_id: String, series_id: String },
}

/// Immutable fixture list. Untouched fixtures are shared between snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    fixtures: Vec<Arc<Fixture>>,
}

impl Schedule {
    /// Build a snapshot, deriving every fixture's status from its maps.
    pub fn new(fixtures: Vec<Fixture>, mode: ScoringMode) -> Self {
        let fixtures = fixtures
            .into_iter()
            .map(|mut fixture| {
                fixture.status = derive_status(&fixture.maps, fixture.best_of, mode);
                Arc::new(fixture)
            })
            .collect();
        Schedule { fixtures }
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.iter().map(|f| f.as_ref())
    }

    pub fn get(&self, fixture_id: &str) -> Option<&Fixture> {
        self.iter().find(|f| f.id == fixture_id)
    }

    pub fn get_shared(&self, fixture_id: &str) -> Option<&Arc<Fixture>> {
        self.fixtures.iter().find(|f| f.id == fixture_id)
    }

    pub fn to_fixtures(&self) -> Vec<Fixture> {
        self.iter().cloned().collect()
    }

    /// Apply `patches` in order. Any failing patch discards the whole batch.
    pub fn apply<I>(&self, patches: I, mode: ScoringMode) -> Result<Schedule, String>
    where
        I: IntoIterator<Item = FixturePatch>,
    {
        let mut fixtures = self.fixtures.clone();
        for patch in patches {
            match patch {
                FixturePatch::Insert(mut fixture) => {
                    if fixtures.iter().any(|f| f.id == fixture.id) {
                        return Err(format!("fixture {} already exists", fixture.id));
                    }
                    fixture.status = derive_status(&fixture.maps, fixture.best_of, mode);
                    fixtures.push(Arc::new(fixture));
                }
                FixturePatch::AppendMaps { fixture_id, maps } => {
                    let fixture = Arc::make_mut(find_slot(&mut fixtures, &fixture_id)?);
                    let incoming: HashSet<String> = maps.iter().map(|m| m.id.clone()).collect();
                    let at = fixture
                        .maps
                        .iter()
                        .position(|m| incoming.contains(&m.id))
                        .unwrap_or(fixture.maps.len());
                    fixture.maps.retain(|m| !incoming.contains(&m.id));
                    fixture.maps.splice(at..at, maps);
                    fixture.status = derive_status(&fixture.maps, fixture.best_of, mode);
                }
                FixturePatch::RemoveSeries { fixture_id, series_id } => {
                    let fixture = Arc::make_mut(find_slot(&mut fixtures, &fixture_id)?);
                    let before = fixture.maps.len();
                    fixture.maps.retain(|m| m.series_id.as_deref() != Some(series_id.as_str()));
                    if fixture.maps.len() == before {
                        return Err(format!("fixture {fixture_id} holds no maps of series {series_id}"));
                    }
                    fixture.status = derive_status(&fixture.maps, fixture.best_of, mode);
                }
            }
        }
        Ok(Schedule { fixtures })
    }
}

fn find_slot<'a>(fixtures: &'a mut [Arc<Fixture>], fixture_id: &str) -> Result<&'a mut Arc<Fixture>, String> {
    fixtures
        .iter_mut()
        .find(|f| f.id == fixture_id)
        .ok_or_else(|| format!("fixture {fixture_id} not found"))
}

// ── Reports ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkKind {
    Existing,
    Single,
    /// Picked among several meetings of the pair; worth surfacing to an operator.
    Disambiguated { candidates: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkOutcome {
    pub series_id: String,
    pub fixture_id: String,
    pub kind: LinkKind,
    pub maps_added: usize,
}

/// A series whose maps already sit in several fixtures, usually because a
/// late game bridged two series. Nothing is appended until an operator
/// detaches one side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkConflict {
    pub series_id: String,
    pub fixture_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFailure {
    /// Position of the payload in the submitted batch
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Series containing at least one newly accepted map
    pub added: Vec<Series>,
    pub duplicates: usize,
    pub failures: Vec<IngestFailure>,
    pub links: Vec<LinkOutcome>,
    pub conflicts: Vec<LinkConflict>,
    /// Series holding maps an operator detached; they wait for a manual link
    pub held: Vec<String>,
    /// Series that match no fixture and were left alone
    pub unlinked: Vec<String>,
}

// ── Division ───────────────────────────────────────────────────────────

/// Persisted shape of a division: roster, schedule and every imported game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DivisionDocument {
    pub teams: Vec<Team>,
    pub schedule: Vec<Fixture>,
    pub raw_maps: Vec<RawMapResult>,
    /// Map ids removed from fixtures by hand; automatic linking skips them
    pub detached_maps: Vec<String>,
}

pub fn load_document(path: &Path) -> Result<DivisionDocument, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("read division {}: {e}", path.display()))?;
    serde_json::from_str(&data).map_err(|e| format!("parse division {}: {e}", path.display()))
}

pub fn save_document(path: &Path, document: &DivisionDocument) -> Result<(), String> {
    let data = serde_json::to_string_pretty(document).map_err(|e| format!("serialize division: {e}"))?;
    fs::write(path, data).map_err(|e| format!("write division {}: {e}", path.display()))
}

/// Payloads of moderation entries that were approved, in queue order.
pub fn approved_payloads(entries: &[ModerationEntry]) -> Vec<Value> {
    entries
        .iter()
        .filter(|entry| entry.status == ModerationStatus::Approved)
        .map(|entry| entry.payload.clone())
        .collect()
}

/// Snapshot of one division. Every operation returns a new snapshot and
/// leaves `self` untouched.
#[derive(Debug, Clone)]
pub struct Division {
    teams: Arc<Vec<Team>>,
    /// Built once from `teams`, shared by every derived snapshot
    aliases: Arc<AliasIndex>,
    schedule: Schedule,
    /// Every accepted game, in arrival order
    raw_maps: Arc<Vec<RawMapResult>>,
    /// Map ids an operator took off a fixture
    detached: Arc<BTreeSet<String>>,
    scoring: ScoringConfig,
    series_gap_ms: i64,
}

impl Division {
    pub fn new(teams: Vec<Team>, fixtures: Vec<Fixture>, config: &EngineConfig) -> Self {
        let aliases = AliasIndex::new(&teams);
        Division {
            teams: Arc::new(teams),
            aliases: Arc::new(aliases),
            schedule: Schedule::new(fixtures, config.scoring.mode),
            raw_maps: Arc::new(Vec::new()),
            detached: Arc::new(BTreeSet::new()),
            scoring: config.scoring.clone(),
            series_gap_ms: config.series_gap_ms(),
        }
    }

    /// Restore a stored division. Stored raw maps are kept as they are and
    /// fixture statuses are re-derived.
    pub fn from_document(document: DivisionDocument, config: &EngineConfig) -> Self {
        let mut division = Division::new(document.teams, document.schedule, config);
        division.raw_maps = Arc::new(document.raw_maps);
        division.detached = Arc::new(document.detached_maps.into_iter().collect());
        division
    }

    pub fn to_document(&self) -> DivisionDocument {
        DivisionDocument {
            teams: self.teams.as_ref().clone(),
            schedule: self.schedule.to_fixtures(),
            raw_maps: self.raw_maps.as_ref().clone(),
            detached_maps: self.detached.iter().cloned().collect(),
        }
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn aliases(&self) -> &AliasIndex {
        &self.aliases
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn raw_maps(&self) -> &[RawMapResult] {
        &self.raw_maps
    }

    pub fn detached_maps(&self) -> impl Iterator<Item = &str> {
        self.detached.iter().map(String::as_str)
    }

    pub fn fixture(&self, fixture_id: &str) -> Option<&Fixture> {
        self.schedule.get(fixture_id)
    }

    // An operator placed the series, so its maps are no longer held back.
    fn with_series_placed(&self, schedule: Schedule, series: &Series) -> Division {
        let mut detached = self.detached.as_ref().clone();
        for id in series.map_ids() {
            detached.remove(id);
        }
        Division {
            schedule,
            detached: Arc::new(detached),
            ..self.clone()
        }
    }

    /// Current series, each tagged with the fixture holding its maps.
    pub fn detect_series(&self) -> Vec<Series> {
        let mut series = detect_series(&self.raw_maps, &self.aliases, self.series_gap_ms);
        for s in &mut series {
            s.fixture_id = self
                .schedule
                .iter()
                .find(|f| s.map_ids().any(|id| f.contains_map(id)))
                .map(|f| f.id.clone());
        }
        series
    }

    fn find_series(&self, series_id: &str) -> Result<Series, String> {
        self.detect_series()
            .into_iter()
            .find(|s| s.id == series_id)
            .ok_or_else(|| format!("series {series_id} not found"))
    }

    // Games without a timestamp cannot be told apart by content, so only
    // timestamped games get a fingerprint.
    fn fingerprint(&self, raw: &RawMapResult) -> Option<String> {
        raw.played_at_ms.map(|_| content_fingerprint(raw, &self.aliases))
    }

    /// Append a batch of games, then recluster and relink everything.
    ///
    /// Games whose id or content fingerprint is already known are skipped and
    /// counted as duplicates.
    pub fn ingest_results(&self, raw: Vec<RawMapResult>) -> (Division, IngestReport) {
        let mut report = IngestReport::default();
        let mut ids: HashSet<String> = self.raw_maps.iter().map(|r| r.id.clone()).collect();
        let mut prints: HashSet<String> = self.raw_maps.iter().filter_map(|r| self.fingerprint(r)).collect();
        let submitted = raw.len();

        let mut accepted = Vec::new();
        for result in raw {
            let print = self.fingerprint(&result);
            if ids.contains(&result.id) || print.as_ref().is_some_and(|p| prints.contains(p)) {
                debug!("skipping duplicate game {}", result.id);
                report.duplicates += 1;
                continue;
            }
            ids.insert(result.id.clone());
            if let Some(print) = print {
                prints.insert(print);
            }
            accepted.push(result);
        }

        let new_ids: HashSet<String> = accepted.iter().map(|r| r.id.clone()).collect();
        let mut raw_maps = self.raw_maps.as_ref().clone();
        raw_maps.extend(accepted);

        let pass = link_all(
            self.schedule.clone(),
            &raw_maps,
            &self.aliases,
            &self.detached,
            self.series_gap_ms,
            self.scoring.mode,
        );

        report.unlinked = {
            let waiting: HashSet<&str> = pass
                .conflicts
                .iter()
                .map(|c| c.series_id.as_str())
                .chain(pass.held.iter().map(String::as_str))
                .collect();
            pass.series
                .iter()
                .filter(|s| s.fixture_id.is_none() && !waiting.contains(s.id.as_str()))
                .map(|s| s.id.clone())
                .collect()
        };
        report.links = pass.links;
        report.conflicts = pass.conflicts;
        report.held = pass.held;
        report.added = pass
            .series
            .into_iter()
            .filter(|s| s.map_ids().any(|id| new_ids.contains(id)))
            .collect();

        for series_id in &report.unlinked {
            warn!("series {series_id} matches no fixture; link it manually or create a fixture for it");
        }
        for conflict in &report.conflicts {
            warn!(
                "series {} spans fixtures {}; detach one of them before it can be linked",
                conflict.series_id,
                conflict.fixture_ids.join(", ")
            );
        }
        info!(
            "ingested {} of {submitted} game(s): {} duplicate(s), {} series touched, {} link(s), {} unlinked",
            new_ids.len(),
            report.duplicates,
            report.added.len(),
            report.links.len(),
            report.unlinked.len()
        );

        let division = Division {
            schedule: pass.schedule,
            raw_maps: Arc::new(raw_maps),
            ..self.clone()
        };
        (division, report)
    }

    /// Parse raw stats payloads and ingest the ones that parse.
    pub fn ingest_payloads(&self, payloads: &[Value]) -> (Division, IngestReport) {
        let mut parsed = Vec::new();
        let mut failures = Vec::new();
        for (index, payload) in payloads.iter().enumerate() {
            match parse_raw_result(payload) {
                Ok(raw) => parsed.push(raw),
                Err(reason) => {
                    warn!("payload #{index} rejected: {reason}");
                    failures.push(IngestFailure {
                        index,
                        id: payload_game_id(payload),
                        reason,
                    });
                }
            }
        }
        let (division, mut report) = self.ingest_results(parsed);
        report.failures = failures;
        (division, report)
    }

    /// Attach a series to a fixture chosen by an operator.
    pub fn link_series_manually(&self, series_id: &str, fixture_id: &str) -> Result<Division, String> {
        let series = self.find_series(series_id)?;
        let fixture = self
            .fixture(fixture_id)
            .ok_or_else(|| format!("fixture {fixture_id} not found"))?;
        if !fixture_matches_pair(fixture, &series.team1, &series.team2, &self.aliases) {
            return Err(format!(
                "series {series_id} is {} vs {} but fixture {fixture_id} is {} vs {}",
                series.team1, series.team2, fixture.team1, fixture.team2
            ));
        }
        if let Some(other) = series.fixture_id.as_deref().filter(|id| *id != fixture_id) {
            return Err(format!("series {series_id} is already linked to fixture {other}"));
        }

        let maps = translate_series_maps(&series, fixture, &self.aliases);
        let patch = FixturePatch::AppendMaps {
            fixture_id: fixture_id.to_string(),
            maps,
        };
        let schedule = self.schedule.apply([patch], self.scoring.mode)?;
        info!("series {series_id} linked to fixture {fixture_id} by hand");
        Ok(self.with_series_placed(schedule, &series))
    }

    /// Create an ad-hoc fixture for a series that matches none, and link it.
    pub fn create_fixture_for_series(&self, series_id: &str, round: &str, best_of: u8) -> Result<Division, String> {
        let series = self.find_series(series_id)?;
        if let Some(existing) = &series.fixture_id {
            return Err(format!("series {series_id} is already linked to fixture {existing}"));
        }
        let round = round.trim();
        if round.is_empty() {
            return Err("round name is required".to_string());
        }

        let group = if round.eq_ignore_ascii_case(GROUP_ROUND) {
            self.shared_group(&series.team1, &series.team2)
        } else {
            None
        };
        let mut meeting = self
            .schedule
            .iter()
            .filter(|f| fixture_matches_pair(f, &series.team1, &series.team2, &self.aliases))
            .count() as u32
            + 1;
        let base = format!("{}-{}-vs-{}", slugify(round), slugify(&series.team1), slugify(&series.team2));
        let mut id = format!("{base}-{meeting}");
        while self.fixture(&id).is_some() {
            meeting += 1;
            id = format!("{base}-{meeting}");
        }

        let fixture = Fixture {
            id: id.clone(),
            team1: series.team1.clone(),
            team2: series.team2.clone(),
            group,
            round: round.to_string(),
            round_num: 0,
            meeting,
            best_of: best_of.max(1),
            date: series.first_played_at_ms().and_then(timestamp_to_date),
            status: FixtureStatus::Scheduled,
            maps: Vec::new(),
        };
        let maps = translate_series_maps(&series, &fixture, &self.aliases);
        let schedule = self.schedule.apply(
            [
                FixturePatch::Insert(fixture),
                FixturePatch::AppendMaps {
                    fixture_id: id.clone(),
                    maps,
                },
            ],
            self.scoring.mode,
        )?;
        info!("created fixture {id} ({round}) for series {series_id}");
        Ok(self.with_series_placed(schedule, &series))
    }

    fn shared_group(&self, team1: &str, team2: &str) -> Option<String> {
        let group_of = |name: &str| {
            self.teams
                .iter()
                .find(|t| t.name == name)
                .and_then(|t| t.group.clone())
        };
        group_of(team1).filter(|g| Some(g) == group_of(team2).as_ref())
    }

    /// Detach a series' maps from a fixture and re-derive its status.
    ///
    /// The raw games stay in the division but automatic linking leaves them
    /// alone until the series is linked or given a fixture by hand.
    pub fn remove_series(&self, fixture_id: &str, series_id: &str) -> Result<Division, String> {
        let removed: Vec<String> = self
            .fixture(fixture_id)
            .map(|f| {
                f.maps
                    .iter()
                    .filter(|m| m.series_id.as_deref() == Some(series_id))
                    .map(|m| m.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        let patch = FixturePatch::RemoveSeries {
            fixture_id: fixture_id.to_string(),
            series_id: series_id.to_string(),
        };
        let schedule = self.schedule.apply([patch], self.scoring.mode)?;
        info!("series {series_id} removed from fixture {fixture_id}");

        let mut detached = self.detached.as_ref().clone();
        detached.extend(removed);
        Ok(Division {
            schedule,
            detached: Arc::new(detached),
            ..self.clone()
        })
    }

    pub fn standings(&self) -> BTreeMap<String, Vec<StandingsEntry>> {
        compute_standings(&self.schedule.to_fixtures(), &self.scoring)
    }

    pub fn bracket_score(&self, slot: &BracketSlot) -> Option<BracketScore> {
        resolve_bracket_score(slot, &self.schedule.to_fixtures(), &self.aliases)
    }
}

struct LinkPass {
    schedule: Schedule,
    series: Vec<Series>,
    links: Vec<LinkOutcome>,
    conflicts: Vec<LinkConflict>,
    held: Vec<String>,
}

/// Cluster `raw_maps` and link every series, one patch at a time so that each
/// link sees the results of the previous ones.
///
/// A game is never placed in two fixtures: series already spread over
/// several fixtures are reported as conflicts, and series touching
/// `detached` map ids are held back.
fn link_all(
    mut schedule: Schedule,
    raw_maps: &[RawMapResult],
    aliases: &AliasIndex,
    detached: &BTreeSet<String>,
    gap_ms: i64,
    mode: ScoringMode,
) -> LinkPass {
    let mut detected = detect_series(raw_maps, aliases, gap_ms);
    let mut links = Vec::new();
    let mut conflicts = Vec::new();
    let mut held = Vec::new();

    for series in &mut detected {
        let holders: Vec<String> = schedule
            .iter()
            .filter(|f| series.map_ids().any(|id| f.contains_map(id)))
            .map(|f| f.id.clone())
            .collect();
        if holders.len() > 1 {
            conflicts.push(LinkConflict {
                series_id: series.id.clone(),
                fixture_ids: holders,
            });
            continue;
        }
        if series.map_ids().any(|id| detached.contains(id)) {
            debug!("series {} holds detached maps; leaving it for a manual link", series.id);
            series.fixture_id = holders.into_iter().next();
            held.push(series.id.clone());
            continue;
        }

        let (fixture_id, kind, maps, maps_added, relaid) = {
            let found = match_series_to_fixture(series, schedule.iter(), aliases);
            let (fixture, kind) = match found {
                FixtureMatch::NoCandidate => continue,
                FixtureMatch::Existing(f) => (f, LinkKind::Existing),
                FixtureMatch::Single(f) => (f, LinkKind::Single),
                FixtureMatch::Disambiguated { chosen, candidates } => (chosen, LinkKind::Disambiguated { candidates }),
            };
            let maps = translate_series_maps(series, fixture, aliases);
            let maps_added = maps.iter().filter(|m| !fixture.contains_map(&m.id)).count();
            let held_now: Vec<&FixtureMap> = fixture
                .maps
                .iter()
                .filter(|held| maps.iter().any(|m| m.id == held.id))
                .collect();
            let relaid = held_now.len() != maps.len()
                || held_now
                    .iter()
                    .zip(&maps)
                    .any(|(held, m)| held.id != m.id || held.series_id != m.series_id);
            (fixture.id.clone(), kind, maps, maps_added, relaid)
        };

        series.fixture_id = Some(fixture_id.clone());
        if !relaid {
            continue;
        }

        let patch = FixturePatch::AppendMaps {
            fixture_id: fixture_id.clone(),
            maps,
        };
        match schedule.apply([patch], mode) {
            Ok(next) => schedule = next,
            Err(e) => {
                warn!("linking series {} failed: {e}", series.id);
                series.fixture_id = None;
                continue;
            }
        }
        if let LinkKind::Disambiguated { candidates } = kind {
            info!(
                "series {} linked to fixture {fixture_id}, chosen among {candidates} meetings",
                series.id
            );
        }
        links.push(LinkOutcome {
            series_id: series.id.clone(),
            fixture_id,
            kind,
            maps_added,
        });
    }

    LinkPass {
        schedule,
        series: detected,
        links,
        conflicts,
        held,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn team(name: &str, tag: &str, group: &str) -> Team {
        Team {
            group: Some(group.to_string()),
            ..Team::new(name, tag)
        }
    }

    fn fixture(id: &str, team1: &str, team2: &str, meeting: u32) -> Fixture {
        Fixture {
            id: id.to_string(),
            team1: team1.to_string(),
            team2: team2.to_string(),
            group: Some("A".to_string()),
            round: GROUP_ROUND.to_string(),
            round_num: meeting,
            meeting,
            best_of: 3,
            date: None,
            status: FixtureStatus::Scheduled,
            maps: Vec::new(),
        }
    }

    fn game(id: &str, a: (&str, i32), b: (&str, i32), at: &str) -> Value {
        json!({
            "id": id,
            "map": "dm3",
            "date": at,
            "teams": [{ "name": a.0, "frags": a.1 }, { "name": b.0, "frags": b.1 }]
        })
    }

    fn division() -> Division {
        let teams = vec![
            team("Alpha", "[a]", "A"),
            team("Beta", "[b]", "A"),
            team("Gamma", "[g]", "A"),
            team("Delta", "[d]", "B"),
        ];
        let fixtures = vec![
            fixture("ab-1", "Alpha", "Beta", 1),
            fixture("ab-2", "Beta", "Alpha", 2),
            fixture("ag-1", "Alpha", "Gamma", 1),
        ];
        Division::new(teams, fixtures, &EngineConfig::default())
    }

    fn alpha_beta_evening() -> Vec<Value> {
        vec![
            game("g1", ("[a]", 20), ("Beta", 10), "2026-03-01 20:00"),
            game("g2", ("beta", 5), ("Alpha", 15), "2026-03-01 20:30"),
        ]
    }

    #[test]
    fn ingest_links_series_and_completes_fixture() {
        let (div, report) = division().ingest_payloads(&alpha_beta_evening());
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.added[0].id, "Alpha|Beta#1");
        assert_eq!(report.added[0].fixture_id.as_deref(), Some("ab-1"));
        assert_eq!(
            report.links,
            vec![LinkOutcome {
                series_id: "Alpha|Beta#1".to_string(),
                fixture_id: "ab-1".to_string(),
                kind: LinkKind::Disambiguated { candidates: 2 },
                maps_added: 2,
            }]
        );
        let fixture = div.fixture("ab-1").unwrap();
        assert_eq!(fixture.status, FixtureStatus::Completed);
        let scores: Vec<(i32, i32)> = fixture.maps.iter().map(|m| (m.score1, m.score2)).collect();
        assert_eq!(scores, vec![(20, 10), (15, 5)]);

        let table = &div.standings()["A"];
        assert_eq!(table[0].team, "Alpha");
        assert_eq!(table[0].points, 3);
    }

    #[test]
    fn second_meeting_goes_to_the_empty_fixture() {
        let (div, _) = division().ingest_payloads(&alpha_beta_evening());
        let (div, report) = div.ingest_payloads(&[
            game("g3", ("Alpha", 3), ("Beta", 9), "2026-03-08 20:00"),
            game("g4", ("Alpha", 4), ("Beta", 8), "2026-03-08 20:40"),
        ]);
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.added[0].id, "Alpha|Beta#2");
        let second = div.fixture("ab-2").unwrap();
        // Beta is team1 on the return fixture.
        let scores: Vec<(i32, i32)> = second.maps.iter().map(|m| (m.score1, m.score2)).collect();
        assert_eq!(scores, vec![(9, 3), (8, 4)]);
        assert_eq!(second.status, FixtureStatus::Completed);
        assert_eq!(div.fixture("ab-1").unwrap().maps.len(), 2);
    }

    #[test]
    fn same_game_id_twice_records_one_map() {
        let payload = game("g1", ("Alpha", 20), ("Beta", 10), "2026-03-01 20:00");
        let (div, report) = division().ingest_payloads(&[payload.clone(), payload.clone()]);
        assert_eq!(report.duplicates, 1);
        let (div, report) = div.ingest_payloads(&[payload]);
        assert_eq!(report.duplicates, 1);
        assert!(report.added.is_empty());
        assert_eq!(div.raw_maps().len(), 1);
        assert_eq!(div.fixture("ab-1").unwrap().maps.len(), 1);
        assert_eq!(div.fixture("ab-1").unwrap().status, FixtureStatus::Live);
    }

    #[test]
    fn same_game_under_another_id_is_a_duplicate() {
        let (_, report) = division().ingest_payloads(&[
            game("g1", ("Alpha", 20), ("Beta", 10), "2026-03-01 20:00"),
            game("mirror-g1", ("[b]", 10), ("[a]", 20), "2026-03-01 20:00"),
        ]);
        assert_eq!(report.duplicates, 1);

        // Without timestamps there is nothing to compare beyond the id.
        let (div, report) = division().ingest_payloads(&[
            game("u1", ("Alpha", 20), ("Beta", 10), ""),
            game("u2", ("Alpha", 20), ("Beta", 10), ""),
        ]);
        assert_eq!(report.duplicates, 0);
        assert_eq!(div.raw_maps().len(), 2);
    }

    #[test]
    fn reingesting_is_idempotent() {
        let (once, _) = division().ingest_payloads(&alpha_beta_evening());
        let (twice, report) = once.ingest_payloads(&alpha_beta_evening());
        assert_eq!(report.duplicates, 2);
        assert!(report.links.is_empty());
        assert_eq!(once.schedule(), twice.schedule());
        assert_eq!(once.detect_series(), twice.detect_series());
    }

    #[test]
    fn snapshots_share_untouched_fixtures() {
        let before = division();
        let (after, _) = before.ingest_payloads(&alpha_beta_evening());
        assert!(before.fixture("ab-1").unwrap().maps.is_empty());
        let untouched_before = before.schedule().get_shared("ag-1").unwrap();
        let untouched_after = after.schedule().get_shared("ag-1").unwrap();
        assert!(Arc::ptr_eq(untouched_before, untouched_after));
        assert!(!Arc::ptr_eq(
            before.schedule().get_shared("ab-1").unwrap(),
            after.schedule().get_shared("ab-1").unwrap()
        ));
    }

    #[test]
    fn parse_failures_do_not_abort_the_batch() {
        let payloads = vec![
            json!({ "id": "broken", "teams": [] }),
            game("g1", ("Alpha", 20), ("Beta", 10), "2026-03-01 20:00"),
        ];
        let (div, report) = division().ingest_payloads(&payloads);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 0);
        assert_eq!(report.failures[0].id.as_deref(), Some("broken"));
        assert_eq!(div.raw_maps().len(), 1);
    }

    #[test]
    fn unlinked_series_can_get_an_ad_hoc_fixture() {
        let (div, report) = division().ingest_payloads(&[game("g1", ("Beta", 7), ("Gamma", 9), "2026-03-01 20:00")]);
        assert_eq!(report.unlinked, vec!["Beta|Gamma#1".to_string()]);
        assert!(report.links.is_empty());

        let div = div.create_fixture_for_series("Beta|Gamma#1", GROUP_ROUND, 1).unwrap();
        let created = div.fixture("group-beta-vs-gamma-1").unwrap();
        assert_eq!(created.group.as_deref(), Some("A"));
        assert_eq!(created.status, FixtureStatus::Completed);
        assert_eq!(created.date, chrono::NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!((created.maps[0].score1, created.maps[0].score2), (7, 9));

        assert!(div.create_fixture_for_series("Beta|Gamma#1", "final", 3).is_err());
        let (_, report) = div.ingest_payloads(&[]);
        assert!(report.unlinked.is_empty());
    }

    #[test]
    fn manual_link_moves_a_series_after_removal() {
        let (div, _) = division().ingest_payloads(&alpha_beta_evening());
        let div = div.remove_series("ab-1", "Alpha|Beta#1").unwrap();
        assert_eq!(div.fixture("ab-1").unwrap().status, FixtureStatus::Scheduled);
        assert!(div.remove_series("ab-1", "Alpha|Beta#1").is_err());

        let div = div.link_series_manually("Alpha|Beta#1", "ab-2").unwrap();
        assert_eq!(div.fixture("ab-2").unwrap().maps.len(), 2);

        // Relinking keeps the operator's choice.
        let (div, _) = div.ingest_payloads(&[game("g9", ("Alpha", 1), ("Gamma", 2), "2026-03-05 20:00")]);
        assert_eq!(div.fixture("ab-2").unwrap().maps.len(), 2);
        assert!(div.fixture("ab-1").unwrap().maps.is_empty());
    }

    fn map_ids(div: &Division, fixture_id: &str) -> Vec<String> {
        div.fixture(fixture_id).unwrap().maps.iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn bridging_game_never_lands_in_two_fixtures() {
        let (div, _) = division().ingest_payloads(&[game("g1", ("Alpha", 20), ("Beta", 10), "2026-03-01 20:00")]);
        let (div, _) = div.ingest_payloads(&[game("g2", ("Alpha", 15), ("Beta", 5), "2026-03-01 23:00")]);
        assert_eq!(map_ids(&div, "ab-1"), vec!["g1"]);
        assert_eq!(map_ids(&div, "ab-2"), vec!["g2"]);

        // 21:30 sits within the gap of both evenings and merges them.
        let (div, report) = div.ingest_payloads(&[game("g3", ("Alpha", 9), ("Beta", 8), "2026-03-01 21:30")]);
        assert_eq!(
            report.conflicts,
            vec![LinkConflict {
                series_id: "Alpha|Beta#1".to_string(),
                fixture_ids: vec!["ab-1".to_string(), "ab-2".to_string()],
            }]
        );
        assert!(report.links.is_empty());
        assert!(report.unlinked.is_empty());
        assert_eq!(map_ids(&div, "ab-1"), vec!["g1"]);
        assert_eq!(map_ids(&div, "ab-2"), vec!["g2"]);
        let held: usize = div.schedule().iter().map(|f| f.maps.len()).sum();
        assert_eq!(held, 2);
    }

    #[test]
    fn late_game_is_placed_in_time_order() {
        let (div, _) = division().ingest_payloads(&[
            game("g1", ("Alpha", 20), ("Beta", 10), "2026-03-01 20:00"),
            game("g3", ("Alpha", 2), ("Beta", 10), "2026-03-01 21:30"),
        ]);
        assert_eq!(map_ids(&div, "ab-1"), vec!["g1", "g3"]);

        let (div, report) = div.ingest_payloads(&[game("g2", ("Alpha", 4), ("Beta", 10), "2026-03-01 20:45")]);
        assert_eq!(map_ids(&div, "ab-1"), vec!["g1", "g2", "g3"]);
        assert_eq!(report.links.len(), 1);
        assert_eq!(report.links[0].kind, LinkKind::Existing);
        assert_eq!(report.links[0].maps_added, 1);
        assert_eq!(div.fixture("ab-1").unwrap().status, FixtureStatus::Completed);
    }

    #[test]
    fn removed_series_stays_detached_until_linked_by_hand() {
        let (div, _) = division().ingest_payloads(&alpha_beta_evening());
        let div = div.remove_series("ab-1", "Alpha|Beta#1").unwrap();

        let (div, report) = div.ingest_payloads(&[]);
        assert!(div.schedule().iter().all(|f| f.maps.is_empty()));
        assert_eq!(report.held, vec!["Alpha|Beta#1".to_string()]);
        assert!(report.unlinked.is_empty());

        // A late game of the same evening waits with the rest of the series.
        let (div, _) = div.ingest_payloads(&[game("g5", ("Alpha", 1), ("Beta", 3), "2026-03-01 21:00")]);
        assert!(div.schedule().iter().all(|f| f.maps.is_empty()));

        let restored = Division::from_document(div.to_document(), &EngineConfig::default());
        assert_eq!(restored.detached_maps().collect::<Vec<_>>(), vec!["g1", "g2"]);
        let (restored, _) = restored.ingest_payloads(&[]);
        assert!(restored.fixture("ab-1").unwrap().maps.is_empty());

        let linked = restored.link_series_manually("Alpha|Beta#1", "ab-1").unwrap();
        assert_eq!(linked.detached_maps().count(), 0);
        assert_eq!(map_ids(&linked, "ab-1"), vec!["g1", "g2", "g5"]);
        let (linked, report) = linked.ingest_payloads(&[]);
        assert!(report.held.is_empty());
        assert_eq!(map_ids(&linked, "ab-1"), vec!["g1", "g2", "g5"]);
    }

    #[test]
    fn manual_link_rejects_a_different_pair() {
        let (div, _) = division().ingest_payloads(&alpha_beta_evening());
        let err = div.link_series_manually("Alpha|Beta#1", "ag-1").unwrap_err();
        assert!(err.contains("fixture ag-1"));
        assert!(div.link_series_manually("Alpha|Beta#1", "ab-2").is_err());
        assert!(div.link_series_manually("nope", "ab-1").is_err());
    }

    #[test]
    fn bracket_score_reads_the_division_schedule() {
        let (div, _) = division().ingest_payloads(&alpha_beta_evening());
        let slot = BracketSlot {
            team1: "[b]".to_string(),
            team2: "[a]".to_string(),
            ..BracketSlot::default()
        };
        assert_eq!(div.bracket_score(&slot), Some(BracketScore { score1: 0, score2: 2 }));
    }

    #[test]
    fn document_round_trip_rederives_status() {
        let (div, _) = division().ingest_payloads(&alpha_beta_evening());
        let mut document = div.to_document();
        document.schedule[0].status = FixtureStatus::Scheduled;
        let restored = Division::from_document(document, &EngineConfig::default());
        assert_eq!(restored.fixture("ab-1").unwrap().status, FixtureStatus::Completed);
        assert_eq!(restored.raw_maps().len(), 2);
        assert_eq!(restored.detect_series(), div.detect_series());
    }

    #[test]
    fn saved_document_loads_back() {
        let (div, _) = division().ingest_payloads(&alpha_beta_evening());
        let dir = std::env::temp_dir().join(format!("division-doc-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("division.json");
        save_document(&path, &div.to_document()).unwrap();

        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded, div.to_document());
        assert!(load_document(&dir.join("missing.json")).unwrap_err().contains("read division"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn only_approved_entries_reach_ingestion() {
        let entry = |id: &str, status| ModerationEntry {
            id: id.to_string(),
            status,
            payload: json!({ "id": id }),
            submitted_by: None,
        };
        let entries = vec![
            entry("1", ModerationStatus::Pending),
            entry("2", ModerationStatus::Approved),
            entry("3", ModerationStatus::Rejected),
        ];
        assert_eq!(approved_payloads(&entries), vec![json!({ "id": "2" })]);
    }

    #[test]
    fn schedule_patch_failures_discard_the_batch() {
        let schedule = Schedule::new(vec![fixture("ab-1", "Alpha", "Beta", 1)], ScoringMode::BestOf);
        let result = schedule.apply(
            [
                FixturePatch::Insert(fixture("ag-1", "Alpha", "Gamma", 1)),
                FixturePatch::Insert(fixture("ab-1", "Alpha", "Beta", 1)),
            ],
            ScoringMode::BestOf,
        );
        assert!(result.is_err());
        assert_eq!(schedule.len(), 1);
    }
}
