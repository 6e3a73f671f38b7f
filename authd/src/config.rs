//! Ambient configuration loading, generalizing the teacher's
//! `Context`/`Profile` pair: an INI-backed settings file read through the
//! `config` crate, with the same `%{token}` path-expansion helper.
//!
//! Out of scope per the specification (external collaborator): the RPC
//! transport's own configuration. This module only covers the tunables the
//! core itself consumes.

use std::env;
use std::path::PathBuf;

use config::{Config as RawConfig, File, FileFormat};

const DEFAULT_CONFIG_PATH: &str = "/etc/authd.conf";
const ENV_CONFIG_PATH: &str = "AUTHD_CONFIG";

const DEFAULT_CREDENTIALS_DIR: &str = "/var/lib/authd";
const DEFAULT_TGT_VALIDITY_SECS: i64 = 8 * 60 * 60; // 8 hours
const DEFAULT_CST_VALIDITY_SECS: i64 = 5 * 60; // 5 minutes
const DEFAULT_WORKER_THREADS: usize = 4;

pub mod keys {
    pub const CREDENTIALS_DIR: &str = "credentials_dir";
    pub const TGT_VALIDITY_SECS: &str = "tgt_validity_secs";
    pub const CST_VALIDITY_SECS: &str = "cst_validity_secs";
    pub const WORKER_THREADS: &str = "worker_threads";
}

/// Resolved, ready-to-use configuration for an `authd` instance.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials_dir: PathBuf,
    pub tgt_validity_ns: i64,
    pub cst_validity_ns: i64,
    pub worker_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials_dir: PathBuf::from(DEFAULT_CREDENTIALS_DIR),
            tgt_validity_ns: DEFAULT_TGT_VALIDITY_SECS * 1_000_000_000,
            cst_validity_ns: DEFAULT_CST_VALIDITY_SECS * 1_000_000_000,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from `$AUTHD_CONFIG`, or the default
    /// system path if the caller didn't ask for a specific file and none
    /// of those exist — falling back to built-in defaults for any key the
    /// file doesn't set.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut settings = Self::default();

        let resolved_path = match path {
            Some(p) => Some(p.to_owned()),
            None => env::var(ENV_CONFIG_PATH)
                .ok()
                .or_else(|| Some(DEFAULT_CONFIG_PATH.to_owned())),
        };

        let Some(resolved_path) = resolved_path else {
            return Ok(settings);
        };
        let expanded = expand_path_tokens(&resolved_path)?;
        if !std::path::Path::new(&expanded).exists() {
            return Ok(settings);
        }

        let raw = RawConfig::builder()
            .add_source(File::with_name(&expanded).format(FileFormat::Ini))
            .build()?;

        if let Ok(dir) = raw.get_string(keys::CREDENTIALS_DIR) {
            settings.credentials_dir = PathBuf::from(expand_path_tokens(&dir)?);
        }
        if let Ok(secs) = raw.get_int(keys::TGT_VALIDITY_SECS) {
            settings.tgt_validity_ns = secs * 1_000_000_000;
        }
        if let Ok(secs) = raw.get_int(keys::CST_VALIDITY_SECS) {
            settings.cst_validity_ns = secs * 1_000_000_000;
        }
        if let Ok(threads) = raw.get_int(keys::WORKER_THREADS) {
            settings.worker_threads = threads.max(1) as usize;
        }

        Ok(settings)
    }
}

/// Expands `%{token}` placeholders in a path, the same mechanism the
/// teacher's `Context::expand_path_tokens` provides for `krb5.conf` paths.
pub fn expand_path_tokens(path: &str) -> anyhow::Result<String> {
    let mut buf = String::new();
    let mut remaining = path;
    loop {
        match remaining.find("%{") {
            Some(start) => {
                buf.push_str(&remaining[..start]);
                let end = remaining[start..]
                    .find('}')
                    .ok_or_else(|| anyhow::anyhow!("unterminated token in path: {path}"))?;
                let token = &remaining[start + 2..start + end];
                buf.push_str(&expand_token(token)?);
                remaining = &remaining[start + end + 1..];
            }
            None => {
                buf.push_str(remaining);
                break;
            }
        }
    }
    Ok(buf)
}

fn expand_token(token: &str) -> anyhow::Result<String> {
    match token {
        "HOME" => env::var("HOME").map_err(|_| anyhow::anyhow!("HOME is not set")),
        other => Err(anyhow::anyhow!("unknown path token: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert!(settings.tgt_validity_ns > settings.cst_validity_ns);
        assert!(settings.worker_threads > 0);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let settings = Settings::load(Some("/nonexistent/path/authd.conf")).unwrap();
        assert_eq!(settings.credentials_dir, Settings::default().credentials_dir);
    }

    #[test]
    fn expand_path_tokens_passes_plain_paths_through() {
        assert_eq!(
            expand_path_tokens("/var/lib/authd").unwrap(),
            "/var/lib/authd"
        );
    }
}
