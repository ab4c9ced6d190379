use failure::{Error, ResultExt};
use sec::Secret;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::MissingCredential;

/// The environment variable the GitHub token is read from.
pub const TOKEN_VARIABLE: &str = "GITHUB_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub api: ApiConfig,
    pub stats: StatsConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|_| format!("Unable to read {}", path.display()))?;

        Config::from_toml(&contents)
    }

    pub fn from_toml(src: &str) -> Result<Config, Error> {
        let cfg = toml::from_str(src).context("Invalid config file")?;
        Ok(cfg)
    }

    /// Generate an example config.
    pub fn example() -> Config {
        Config::default()
    }

    pub fn as_toml(&self) -> String {
        match toml::to_string_pretty(self) {
            Ok(s) => s,
            Err(e) => format!("# unable to serialize the config: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct General {
    /// The top-level directory all snapshots are placed in.
    pub output_dir: PathBuf,
    /// The CSV file listing the resolved repositories.
    pub input: PathBuf,
}

impl Default for General {
    fn default() -> General {
        General {
            output_dir: PathBuf::from("data/ros_robotics_data"),
            input: PathBuf::from("out/repos/github_repos_unique.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub rest_base: String,
    pub graphql_url: String,
    pub user_agent: String,
    pub per_page: u32,
    /// The minimum gap between two requests, in milliseconds.
    pub request_delay_ms: u64,
    /// Look up the files and line stats of every commit.
    pub commit_details: bool,
}

impl Default for ApiConfig {
    fn default() -> ApiConfig {
        ApiConfig {
            rest_base: String::from("https://api.github.com"),
            graphql_url: String::from("https://api.github.com/graphql"),
            user_agent: String::from("repo-snapshots"),
            per_page: 100,
            request_delay_ms: 200,
            commit_details: true,
        }
    }
}

/// Settings for the statistics endpoints GitHub computes in the background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub retries: u32,
    pub delay_secs: u64,
}

impl StatsConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for StatsConfig {
    fn default() -> StatsConfig {
        StatsConfig {
            retries: 6,
            delay_secs: 10,
        }
    }
}

/// Get the GitHub token from the environment.
pub fn token_from_env() -> Result<Secret<String>, Error> {
    token_from(TOKEN_VARIABLE)
}

/// Read a token from the environment variable `variable`. Unset and blank
/// values are both a [`MissingCredential`].
pub fn token_from(variable: &str) -> Result<Secret<String>, Error> {
    match env::var(variable) {
        Ok(ref tok) if !tok.trim().is_empty() => Ok(Secret::new(tok.trim().to_string())),
        _ => Err(MissingCredential {
            variable: variable.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let got = Config::from_toml("").unwrap();

        assert_eq!(got, Config::default());
        assert_eq!(got.api.per_page, 100);
        assert_eq!(got.stats.retries, 6);
    }

    #[test]
    fn partial_sections_are_filled_in() {
        let src = r#"
            [general]
            output_dir = "/tmp/snapshots"

            [api]
            request_delay_ms = 1000
            commit_details = false
        "#;

        let got = Config::from_toml(src).unwrap();

        assert_eq!(got.general.output_dir, PathBuf::from("/tmp/snapshots"));
        assert_eq!(got.general.input, General::default().input);
        assert_eq!(got.api.request_delay_ms, 1000);
        assert!(!got.api.commit_details);
        assert_eq!(got.api.rest_base, "https://api.github.com");
    }

    #[test]
    fn example_round_trips() {
        let example = Config::example();

        let got = Config::from_toml(&example.as_toml()).unwrap();

        assert_eq!(got, example);
    }

    #[test]
    fn an_unset_token_is_a_missing_credential() {
        let variable = "REPO_SNAPSHOTS_TEST_UNSET_TOKEN";
        env::remove_var(variable);

        let err = token_from(variable).unwrap_err();

        let missing = err.downcast_ref::<MissingCredential>().unwrap();
        assert_eq!(missing.variable, variable);
    }

    #[test]
    fn a_blank_token_is_a_missing_credential() {
        let variable = "REPO_SNAPSHOTS_TEST_BLANK_TOKEN";
        env::set_var(variable, "   ");

        let err = token_from(variable).unwrap_err();

        assert!(err.downcast_ref::<MissingCredential>().is_some());
        env::remove_var(variable);
    }

    #[test]
    fn tokens_are_trimmed() {
        let variable = "REPO_SNAPSHOTS_TEST_PADDED_TOKEN";
        env::set_var(variable, " ghp_abc123\n");

        let got = token_from(variable).unwrap();

        assert_eq!(got.reveal(), "ghp_abc123");
        env::remove_var(variable);
    }
}
