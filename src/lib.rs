pub mod types;
pub mod config;
pub mod logging;
pub mod aliases;
pub mod schedule;
pub mod raw_results;
pub mod series;
pub mod linker;
pub mod standings;
pub mod division;
pub mod stats_source;

pub use aliases::AliasIndex;
pub use division::{approved_payloads, Division, DivisionDocument, FixturePatch, IngestReport, LinkConflict, Schedule};
pub use linker::resolve_bracket_score;
pub use schedule::{generate_schedule, ScheduleError, ScheduleOptions};
pub use series::detect_series;
pub use standings::compute_standings;
pub use stats_source::{fetch_batch, FetchError, HttpStatsSource, StatsSource};

use config::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "engine.json";

/// Load a division document, run its stored games through ingestion and
/// report standings plus anything that could not be linked.
///
/// `args` are the process arguments: `<division.json> [config.json]`.
/// Stored links are kept unless `relinkFromScratch` (or `RELINK_FROM_SCRATCH`)
/// is set. Series an operator detached stay detached either way.
pub fn run(args: &[String]) -> Result<Value, String> {
    let division_path = args
        .get(1)
        .map(PathBuf::from)
        .ok_or_else(|| "usage: tournament-results-engine <division.json> [config.json]".to_string())?;
    let config_path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_env_file(Path::new(".env"));
    let config = load_config_from(&config_path)?;
    let _guard = logging::init_tracing(Path::new(&config.log_dir));
    info!("tournament results engine starting on {}", division_path.display());

    let mut document = division::load_document(&division_path)?;
    let raw_maps = std::mem::take(&mut document.raw_maps);
    if config.relink_from_scratch {
        info!("clearing stored links before relinking");
        for fixture in &mut document.schedule {
            fixture.maps.clear();
        }
    }

    let (division, report) = Division::from_document(document, &config).ingest_results(raw_maps);
    info!(
        "{} fixture(s), {} game(s), {} unlinked series",
        division.schedule().len(),
        division.raw_maps().len(),
        report.unlinked.len()
    );

    Ok(json!({
        "standings": division.standings(),
        "unlinked": report.unlinked,
        "links": report.links,
        "conflicts": report.conflicts,
        "held": report.held,
        "duplicates": report.duplicates,
    }))
}
