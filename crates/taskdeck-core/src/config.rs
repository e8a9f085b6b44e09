use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::backend::RequestContext;

pub const CONFIG_ENV: &str =
  "TASKDECK_CONFIG";
pub const DEMO_MODE_ENV: &str =
  "TASKDECK_DEMO_MODE";
pub const API_URL_ENV: &str =
  "TASKDECK_API_URL";
pub const USER_ID_ENV: &str =
  "TASKDECK_USER_ID";
pub const TOKEN_ENV: &str =
  "TASKDECK_TOKEN";

pub const DEFAULT_API_BASE_URL: &str =
  "http://localhost:8000";

#[derive(
  Debug, Clone, Deserialize, PartialEq,
)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
  /// Route every task and profile call
  /// to the in-memory mock.
  pub demo_mode:        bool,
  pub api_base_url:     String,
  pub stale_after_secs: u64,
  pub mock_latency_ms:  u64,
  pub credentials:      Option<Credentials>,
  #[serde(skip)]
  pub loaded_from:      Option<PathBuf>
}

#[derive(
  Debug, Clone, Deserialize, PartialEq, Eq,
)]
pub struct Credentials {
  pub user_id: String,
  pub token:   String
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      demo_mode:        false,
      api_base_url:
        DEFAULT_API_BASE_URL.to_string(),
      stale_after_secs: 300,
      mock_latency_ms:  300,
      credentials:      None,
      loaded_from:      None
    }
  }
}

impl AppConfig {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let path = resolve_config_path(
      config_override,
      |key| std::env::var(key).ok()
    )?;
    let Some(path) = path else {
      warn!(
        "no config file found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    info!(config = %path.display(), "loading config");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut cfg = Self::from_toml_str(
      &text
    )
    .with_context(|| {
      format!(
        "invalid config {}",
        path.display()
      )
    })?;
    cfg.loaded_from = Some(path);
    Ok(cfg)
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    toml::from_str(text).map_err(
      |err| anyhow!("{err}")
    )
  }

  /// Applies `TASKDECK_*` values found
  /// through `lookup` over the file
  /// settings.
  #[tracing::instrument(skip(
    self, lookup
  ))]
  pub fn apply_overrides<F>(
    &mut self,
    lookup: F
  ) where
    F: Fn(&str) -> Option<String>
  {
    if let Some(v) = lookup(DEMO_MODE_ENV)
    {
      debug!(key = DEMO_MODE_ENV, value = %v, "applying override");
      self.demo_mode = parse_bool(&v);
    }
    if let Some(v) = lookup(API_URL_ENV)
      && !v.trim().is_empty()
    {
      debug!(key = API_URL_ENV, value = %v, "applying override");
      self.api_base_url =
        v.trim().to_string();
    }

    let user_id = lookup(USER_ID_ENV);
    let token = lookup(TOKEN_ENV);
    if user_id.is_some() || token.is_some()
    {
      let current = self
        .credentials
        .take()
        .unwrap_or(Credentials {
          user_id: String::new(),
          token:   String::new()
        });
      debug!("applying credential override");
      self.credentials = Some(Credentials {
        user_id: user_id
          .unwrap_or(current.user_id),
        token:   token
          .unwrap_or(current.token)
      });
    }
  }

  pub fn stale_after(&self) -> Duration {
    Duration::from_secs(
      self.stale_after_secs
    )
  }

  pub fn mock_latency(&self) -> Duration {
    Duration::from_millis(
      self.mock_latency_ms
    )
  }

  /// Remote-mode identity, when both
  /// user id and token are set.
  pub fn request_context(
    &self
  ) -> Option<RequestContext> {
    let creds =
      self.credentials.as_ref()?;
    if creds.user_id.trim().is_empty()
      || creds.token.trim().is_empty()
    {
      return None;
    }
    Some(RequestContext::new(
      creds.user_id.trim(),
      creds.token.trim()
    ))
  }
}

#[tracing::instrument(skip(
  override_path, lookup
))]
fn resolve_config_path<F>(
  override_path: Option<&Path>,
  lookup: F
) -> anyhow::Result<Option<PathBuf>>
where
  F: Fn(&str) -> Option<String>
{
  if let Some(path) = override_path {
    return Ok(Some(expand_tilde(path)));
  }

  if let Some(env_path) =
    lookup(CONFIG_ENV)
  {
    if env_path == "/dev/null"
      || env_path.trim().is_empty()
    {
      return Ok(None);
    }
    return Ok(Some(expand_tilde(
      Path::new(&env_path)
    )));
  }

  let Some(dir) = dirs::config_dir()
  else {
    debug!(
      "no platform config directory"
    );
    return Ok(None);
  };
  let candidate = dir
    .join("taskdeck")
    .join("config.toml");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

pub fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
