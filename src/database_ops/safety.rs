//! Environment guard for the relational store.
//!
//! The consolidation scripts write destructively, so the relational target is
//! validated before a pool is ever opened.

use crate::error::ConfigError;

pub const DISALLOWED_TARGETS: &[&str] = &["main", "master", "prod", "production", "live"];

pub const NON_PRODUCTION_MARKERS: &[&str] = &[
    "develop",
    "dev",
    "staging",
    "test",
    "local",
    "localhost",
    "127.0.0.1",
    "preview",
];

#[derive(Debug, Clone)]
pub struct SafetyPolicy {
    pub disallowed: Vec<String>,
    pub non_production_markers: Vec<String>,
    /// Explicit opt-in for targets that carry no non-production marker.
    pub force: bool,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            disallowed: DISALLOWED_TARGETS.iter().map(|s| s.to_string()).collect(),
            non_production_markers: NON_PRODUCTION_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            force: false,
        }
    }
}

impl SafetyPolicy {
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Validates the target. `branch` is the explicitly configured branch name,
    /// if any; the connection string contributes its host labels and database name.
    pub fn check(&self, database_url: &str, branch: Option<&str>) -> Result<(), ConfigError> {
        let identifiers = target_identifiers(database_url, branch)?;
        let display = describe_target(database_url, branch);

        let blocked = identifiers
            .iter()
            .any(|id| self.disallowed.iter().any(|d| d.eq_ignore_ascii_case(id)));
        if blocked {
            return Err(ConfigError::BlockedEnvironment { target: display });
        }

        let marked = identifiers.iter().any(|id| {
            self.non_production_markers
                .iter()
                .any(|m| m.eq_ignore_ascii_case(id))
        });
        if !marked && !self.force {
            return Err(ConfigError::UnconfirmedTarget { target: display });
        }
        Ok(())
    }
}

/// Tokens that identify the target: branch, host labels split on `.`/`-`, db name.
fn target_identifiers(database_url: &str, branch: Option<&str>) -> Result<Vec<String>, ConfigError> {
    let parsed = url::Url::parse(database_url.trim()).map_err(|e| ConfigError::InvalidUrl {
        key: "DATABASE_URL",
        reason: e.to_string(),
    })?;

    let mut ids: Vec<String> = Vec::new();
    if let Some(b) = branch.map(str::trim).filter(|b| !b.is_empty()) {
        ids.push(b.to_ascii_lowercase());
    }
    if let Some(host) = parsed.host_str() {
        let host = host.to_ascii_lowercase();
        ids.push(host.clone());
        ids.extend(
            host.split(['.', '-', '_'])
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
    let db_name = parsed.path().trim_start_matches('/').to_ascii_lowercase();
    if !db_name.is_empty() {
        ids.extend(
            db_name
                .split(['-', '_'])
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        ids.push(db_name);
    }
    Ok(ids)
}

pub fn describe_target(database_url: &str, branch: Option<&str>) -> String {
    let host = url::Url::parse(database_url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| format!("{}{}", h, u.path())))
        .unwrap_or_else(|| "<unparseable>".to_string());
    match branch.map(str::trim).filter(|b| !b.is_empty()) {
        Some(b) => format!("{host} (branch {b})"),
        None => host,
    }
}
