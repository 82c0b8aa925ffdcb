use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde_json::{json, Value};
use tournament_results_engine::division::{load_document, LinkKind};
use tournament_results_engine::types::{
    BracketScore, BracketSlot, EngineConfig, FixtureStatus, ScoringConfig, ScoringMode, Team,
};
use tournament_results_engine::{compute_standings, generate_schedule, run, Division, ScheduleOptions};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn loaded_division() -> (Division, tournament_results_engine::IngestReport) {
    let mut document = load_document(&fixture_path("division.json")).expect("fixture should parse");
    let raw_maps = std::mem::take(&mut document.raw_maps);
    Division::from_document(document, &EngineConfig::default()).ingest_results(raw_maps)
}

fn game(id: &str, a: (&str, i32), b: (&str, i32), at: &str) -> Value {
    json!({
        "gameId": id,
        "map": "dm3",
        "playedAt": at,
        "teams": [{ "name": a.0, "frags": a.1 }, { "name": b.0, "frags": b.1 }]
    })
}

#[test]
fn generated_group_plays_out_into_standings() {
    let teams: Vec<Team> = ["Alpha", "Beta", "Gamma", "Delta"]
        .iter()
        .map(|name| Team {
            group: Some("A".to_string()),
            ..Team::new(name, "")
        })
        .collect();
    let fixtures = generate_schedule(&teams, &ScheduleOptions::default()).expect("group is assigned");
    assert_eq!(fixtures.len(), 6);

    // Earlier name in each pair wins every map 10-5; one day per pairing.
    let mut payloads = Vec::new();
    let order = ["Alpha", "Beta", "Gamma", "Delta"];
    let mut day = 1;
    for (i, winner) in order.iter().enumerate() {
        for loser in &order[i + 1..] {
            for map in 0..2 {
                payloads.push(game(
                    &format!("{winner}-{loser}-{map}"),
                    (*loser, 5),
                    (*winner, 10),
                    &format!("2026-04-{day:02}T19:{:02}:00Z", map * 30),
                ));
            }
            day += 1;
        }
    }

    let division = Division::new(teams, fixtures, &EngineConfig::default());
    let (division, report) = division.ingest_payloads(&payloads);
    assert!(report.failures.is_empty());
    assert!(report.unlinked.is_empty());
    assert_eq!(report.added.len(), 6);
    assert!(report.links.iter().all(|l| l.kind == LinkKind::Single && l.maps_added == 2));
    assert!(division.schedule().iter().all(|f| f.status == FixtureStatus::Completed));

    let standings = division.standings();
    let table: Vec<(&str, i32)> = standings["A"].iter().map(|e| (e.team.as_str(), e.points)).collect();
    assert_eq!(table, vec![("Alpha", 9), ("Beta", 6), ("Gamma", 3), ("Delta", 0)]);

    let mut shuffled = division.schedule().to_fixtures();
    shuffled.reverse();
    assert_eq!(compute_standings(&shuffled, &ScoringConfig::default()), standings);
}

#[test]
fn stored_division_links_group_and_final() {
    let (division, report) = loaded_division();
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.unlinked, vec!["Alpha|Omega#1".to_string()]);

    let group_fixture = division.fixture("a-r1-1").expect("fixture exists");
    assert_eq!(group_fixture.maps.len(), 2);
    assert_eq!(group_fixture.status, FixtureStatus::Completed);

    let final_fixture = division.fixture("final").expect("fixture exists");
    assert_eq!(final_fixture.maps.len(), 3);
    assert_eq!(final_fixture.status, FixtureStatus::Completed);
    assert!(report.links.iter().any(|l| l.fixture_id == "final"
        && l.series_id == "Alpha|Beta#2"
        && l.kind == LinkKind::Disambiguated { candidates: 2 }));

    let standings = division.standings();
    let table: Vec<&str> = standings["A"].iter().map(|e| e.team.as_str()).collect();
    assert_eq!(table, vec!["Alpha", "Gamma", "Delta", "Beta"]);

    let slot = BracketSlot {
        team1: "(b)".to_string(),
        team2: "Alpha".to_string(),
        round: "Final".to_string(),
        score_override: None,
    };
    assert_eq!(division.bracket_score(&slot), Some(BracketScore { score1: 2, score2: 1 }));
}

#[test]
fn play_all_scoring_changes_status_and_points() {
    let mut document = load_document(&fixture_path("division.json")).expect("fixture should parse");
    let raw_maps = std::mem::take(&mut document.raw_maps);
    let config = EngineConfig {
        scoring: ScoringConfig {
            mode: ScoringMode::PlayAll,
            points_win: 1,
            points_loss: 0,
            ..ScoringConfig::default()
        },
        ..EngineConfig::default()
    };
    let (division, _) = Division::from_document(document, &config).ingest_results(raw_maps);
    // Two maps of a best-of-3 are not enough when every map is played.
    assert_eq!(division.fixture("a-r1-1").map(|f| f.status), Some(FixtureStatus::Live));

    let points: BTreeMap<String, i32> = division.standings()["A"]
        .iter()
        .map(|e| (e.team.clone(), e.points))
        .collect();
    assert_eq!(points["Alpha"], 2);
    assert_eq!(points["Gamma"], 2);
    assert_eq!(points["Delta"], 1);
    assert_eq!(points["Beta"], 0);
}

#[test]
fn run_reports_standings_and_unlinked_series() {
    let dir = std::env::temp_dir().join(format!("tournament-results-engine-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("temp dir");
    let config_path = dir.join("engine.json");
    let config = json!({ "logDir": dir.join("logs").to_string_lossy() });
    fs::write(&config_path, config.to_string()).expect("write config");

    let args = vec![
        "tournament-results-engine".to_string(),
        fixture_path("division.json").to_string_lossy().to_string(),
        config_path.to_string_lossy().to_string(),
    ];
    let output = run(&args).expect("run succeeds");
    assert_eq!(output["unlinked"], json!(["Alpha|Omega#1"]));
    assert_eq!(output["duplicates"], json!(1));
    assert_eq!(output["conflicts"], json!([]));
    assert_eq!(output["standings"]["A"][0]["team"], json!("Alpha"));
    assert_eq!(output["standings"]["A"][0]["mapsWon"], json!(2));

    let missing = vec![
        "tournament-results-engine".to_string(),
        dir.join("nope.json").to_string_lossy().to_string(),
        config_path.to_string_lossy().to_string(),
    ];
    assert!(run(&missing).is_err());
    assert!(run(&["tournament-results-engine".to_string()]).is_err());
}
