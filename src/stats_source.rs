use serde_json::Value;
use std::{collections::HashSet, thread::sleep, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::raw_results::{parse_raw_result, payload_game_id};
use crate::types::{EngineConfig, RawMapResult};

const USER_AGENT: &str = "tournament-results-engine";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("request for game {id} failed: {message}")]
  Request { id: String, message: String },
  #[error("stats source answered {status} for game {id}")]
  Status { id: String, status: u16 },
  #[error("game {id}: {message}")]
  Parse { id: String, message: String },
}

/// Anything that can hand out the raw payload of one game.
pub trait StatsSource {
  fn fetch_game(&self, id: &str) -> Result<Value, FetchError>;
}

/// Single-game stats service reached over HTTP: `GET {base_url}/{id}`.
pub struct HttpStatsSource {
  client: reqwest::blocking::Client,
  base_url: String,
  token: Option<String>,
  retries: u32,
}

impl HttpStatsSource {
  pub fn new(base_url: &str, token: Option<String>, retries: u32) -> Result<Self, String> {
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    if base_url.is_empty() {
      return Err("stats source URL is not set (statsSourceUrl or STATS_SOURCE_URL)".to_string());
    }
    let client = reqwest::blocking::Client::builder()
      .timeout(Duration::from_secs(15))
      .build()
      .map_err(|e| format!("build stats client: {e}"))?;
    Ok(Self {
      client,
      base_url,
      token: token.filter(|t| !t.trim().is_empty()),
      retries: retries.max(1),
    })
  }

  pub fn from_config(config: &EngineConfig) -> Result<Self, String> {
    Self::new(
      &config.stats_source_url,
      Some(config.stats_source_token.clone()),
      config.fetch_retries,
    )
  }

  pub fn game_url(&self, id: &str) -> String {
    format!("{}/{}", self.base_url, id.trim())
  }
}

impl StatsSource for HttpStatsSource {
  fn fetch_game(&self, id: &str) -> Result<Value, FetchError> {
    let url = self.game_url(id);
    let mut last_err = FetchError::Request {
      id: id.to_string(),
      message: "no attempt made".to_string(),
    };

    for attempt in 0..self.retries {
      if attempt > 0 {
        sleep(Duration::from_millis(500 * u64::from(attempt)));
      }
      let mut request = self.client.get(&url).header("User-Agent", USER_AGENT);
      if let Some(token) = &self.token {
        request = request.bearer_auth(token);
      }
      let resp = match request.send() {
        Ok(resp) => resp,
        Err(e) => {
          warn!("stats request for {id} failed (attempt {}): {e}", attempt + 1);
          last_err = FetchError::Request {
            id: id.to_string(),
            message: e.to_string(),
          };
          continue;
        }
      };

      let status = resp.status();
      if status.is_server_error() {
        warn!("stats source answered {status} for {id} (attempt {})", attempt + 1);
        last_err = FetchError::Status {
          id: id.to_string(),
          status: status.as_u16(),
        };
        continue;
      }
      if !status.is_success() {
        return Err(FetchError::Status {
          id: id.to_string(),
          status: status.as_u16(),
        });
      }

      let body = resp.text().map_err(|e| FetchError::Request {
        id: id.to_string(),
        message: format!("read failed: {e}"),
      })?;
      debug!("stats source returned {} byte(s) for {id}", body.len());
      return serde_json::from_str(&body).map_err(|e| FetchError::Parse {
        id: id.to_string(),
        message: format!("invalid JSON: {e}"),
      });
    }
    Err(last_err)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
  pub id: String,
  pub error: FetchError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchFetch {
  pub results: Vec<RawMapResult>,
  pub failures: Vec<FetchFailure>,
}

/// Fetch and parse a list of game ids. A failing id is recorded and the
/// rest of the batch carries on.
pub fn fetch_batch<S: StatsSource + ?Sized>(source: &S, ids: &[String]) -> BatchFetch {
  let mut batch = BatchFetch::default();
  let mut seen = HashSet::new();

  for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
    if !seen.insert(id.to_string()) {
      continue;
    }
    let parsed = source.fetch_game(id).and_then(|mut payload| {
      // Some sources omit the id from the body; the requested one is authoritative then.
      if payload_game_id(&payload).is_none() {
        if let Some(obj) = payload.as_object_mut() {
          obj.insert("id".to_string(), Value::String(id.to_string()));
        }
      }
      parse_raw_result(&payload).map_err(|message| FetchError::Parse {
        id: id.to_string(),
        message,
      })
    });
    match parsed {
      Ok(raw) => batch.results.push(raw),
      Err(error) => {
        warn!("{error}");
        batch.failures.push(FetchFailure {
          id: id.to_string(),
          error,
        });
      }
    }
  }

  info!(
    "fetched {} game(s), {} failure(s)",
    batch.results.len(),
    batch.failures.len()
  );
  batch
}
