// impctl - CLI for the impCentral device management API
// Copyright (C) 2025 The impctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://api.electricimp.com/v5";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub access_token: Option<String>,
    pub endpoint: Option<String>,
    pub project: Option<ProjectConfig>,
}

/// Defaults a linked project supplies when a command is run without an
/// explicit product / device group argument.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub product: Option<String>,
    pub device_group: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error("access token is required; set it with `impctl configure --token <token>`")]
    MissingToken,
}

#[derive(Debug)]
pub struct EffectiveConfig {
    pub access_token: String,
    pub endpoint: String,
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Local => Ok(cwd.join(".impctl.yaml")),
        Scope::User => {
            if let Ok(custom) = env::var("IMPCTL_CONFIG_DIR") {
                return Ok(PathBuf::from(custom).join("config.yaml"));
            }
            let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
            Ok(base.join("impctl").join("config.yaml"))
        }
    }
}

pub fn load(cwd: &Path) -> Result<Config> {
    let user = read_if_exists(&config_path(Scope::User, cwd)?)?.unwrap_or_default();
    let local = read_if_exists(&config_path(Scope::Local, cwd)?)?.unwrap_or_default();
    Ok(merge(user, local))
}

pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    Ok(read_if_exists(&config_path(scope, cwd)?)?.unwrap_or_default())
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(path)
}

pub fn resolve(
    cwd: &Path,
    token_override: Option<String>,
    endpoint_override: Option<String>,
) -> Result<EffectiveConfig> {
    let mut merged = load(cwd)?;

    if let Some(token) = token_override {
        merged.access_token = Some(token);
    }
    if let Some(endpoint) = endpoint_override {
        merged.endpoint = Some(endpoint);
    }

    let access_token = merged
        .access_token
        .ok_or(ConfigError::MissingToken)
        .map(|t| t.trim().to_string())?;

    let endpoint = merged
        .endpoint
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    Ok(EffectiveConfig {
        access_token,
        endpoint,
    })
}

/// Project defaults from the merged config, if any.
pub fn project_defaults(cwd: &Path) -> Result<ProjectConfig> {
    Ok(load(cwd)?.project.unwrap_or_default())
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config = serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(config))
}

fn merge(user: Config, local: Config) -> Config {
    Config {
        access_token: local.access_token.or(user.access_token),
        endpoint: local.endpoint.or(user.endpoint),
        project: match (user.project, local.project) {
            (Some(u), Some(l)) => Some(merge_project(u, l)),
            (Some(u), None) => Some(u),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        },
    }
}

fn merge_project(user: ProjectConfig, local: ProjectConfig) -> ProjectConfig {
    ProjectConfig {
        product: local.product.or(user.product),
        device_group: local.device_group.or(user.device_group),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::{env, fs};
    use tempfile::tempdir;

    static ENV_LOCK: OnceLock<std::sync::Mutex<()>> = OnceLock::new();

    #[test]
    fn merges_user_and_local_and_overrides() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        unsafe {
            env::set_var("IMPCTL_CONFIG_DIR", cwd.path().join("config"));
        }
        fs::create_dir_all(cwd.path().join("config")).unwrap();

        let user_cfg = Config {
            access_token: Some("user-token".into()),
            endpoint: Some("https://example.test/v5".into()),
            project: Some(ProjectConfig {
                product: Some("p-user".into()),
                device_group: None,
            }),
        };
        save(Scope::User, &user_cfg, cwd.path()).unwrap();

        let local_cfg = Config {
            access_token: Some("local-token".into()),
            endpoint: None,
            project: Some(ProjectConfig {
                product: None,
                device_group: Some("dg-local".into()),
            }),
        };
        save(Scope::Local, &local_cfg, cwd.path()).unwrap();

        let effective = resolve(cwd.path(), None, None).unwrap();
        assert_eq!(effective.access_token, "local-token");
        assert_eq!(effective.endpoint, "https://example.test/v5");

        let project = project_defaults(cwd.path()).unwrap();
        assert_eq!(project.product.as_deref(), Some("p-user"));
        assert_eq!(project.device_group.as_deref(), Some("dg-local"));

        let overridden = resolve(
            cwd.path(),
            Some("override".into()),
            Some("https://override.test/v5".into()),
        )
        .unwrap();
        assert_eq!(overridden.access_token, "override");
        assert_eq!(overridden.endpoint, "https://override.test/v5");
    }

    #[test]
    fn errors_when_missing_token() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        unsafe {
            env::set_var("IMPCTL_CONFIG_DIR", cwd.path().join("config"));
        }
        fs::create_dir_all(cwd.path().join("config")).unwrap();
        let err = resolve(cwd.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("access token is required"));
    }

    #[test]
    fn defaults_endpoint_when_unset() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let cwd = tempdir().unwrap();
        unsafe {
            env::set_var("IMPCTL_CONFIG_DIR", cwd.path().join("config"));
        }
        fs::create_dir_all(cwd.path().join("config")).unwrap();
        save(
            Scope::User,
            &Config {
                access_token: Some("t".into()),
                ..Default::default()
            },
            cwd.path(),
        )
        .unwrap();

        let effective = resolve(cwd.path(), None, None).unwrap();
        assert_eq!(effective.endpoint, DEFAULT_ENDPOINT);
    }
}
