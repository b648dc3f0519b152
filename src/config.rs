//! Configuration types for batch-fetch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Placeholder substituted with the request id in the endpoint template
pub const ID_PLACEHOLDER: &str = "{id}";

/// Fetch behavior configuration (endpoint, concurrency)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Endpoint URL template; `{id}` is replaced with the request id
    /// (default: "https://jsonplaceholder.typicode.com/posts/{id}")
    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// Maximum in-flight fetches (default: 100, i.e. one task per request
    /// for any valid batch size)
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

/// Output file locations
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Aggregate document file (default: "data.json")
    #[serde(default = "default_aggregate_path")]
    pub aggregate_path: PathBuf,

    /// Run summary file (default: "response_times.json")
    #[serde(default = "default_summary_path")]
    pub summary_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            aggregate_path: default_aggregate_path(),
            summary_path: default_summary_path(),
        }
    }
}

/// Top-level configuration for [`crate::BatchFetcher`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetch behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Output file settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Validate the configuration.
    ///
    /// Checks that the endpoint template carries an `{id}` placeholder and
    /// yields a parseable URL once the placeholder is substituted, and that
    /// the concurrency bound is nonzero.
    pub fn validate(&self) -> Result<()> {
        if !self.fetch.url_template.contains(ID_PLACEHOLDER) {
            return Err(Error::Config {
                message: format!("url_template must contain \"{}\"", ID_PLACEHOLDER),
                key: Some("fetch.url_template".to_string()),
            });
        }

        let probe = self.fetch.url_template.replace(ID_PLACEHOLDER, "1");
        if let Err(e) = Url::parse(&probe) {
            return Err(Error::Config {
                message: format!("url_template does not parse as a URL: {}", e),
                key: Some("fetch.url_template".to_string()),
            });
        }

        if self.fetch.max_concurrent_fetches == 0 {
            return Err(Error::Config {
                message: "max_concurrent_fetches must be greater than 0".to_string(),
                key: Some("fetch.max_concurrent_fetches".to_string()),
            });
        }

        Ok(())
    }

    /// Build the per-id endpoint URL from the template.
    pub fn endpoint_for(&self, id: u32) -> Result<Url> {
        let rendered = self
            .fetch
            .url_template
            .replace(ID_PLACEHOLDER, &id.to_string());
        Url::parse(&rendered).map_err(|e| Error::Config {
            message: format!("failed to build endpoint URL for id {}: {}", id, e),
            key: Some("fetch.url_template".to_string()),
        })
    }
}

fn default_url_template() -> String {
    "https://jsonplaceholder.typicode.com/posts/{id}".to_string()
}

fn default_max_concurrent_fetches() -> usize {
    100
}

fn default_aggregate_path() -> PathBuf {
    PathBuf::from("data.json")
}

fn default_summary_path() -> PathBuf {
    PathBuf::from("response_times.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.output.aggregate_path, PathBuf::from("data.json"));
        assert_eq!(
            config.output.summary_path,
            PathBuf::from("response_times.json")
        );
    }

    #[test]
    fn test_endpoint_substitution() {
        let config = Config::default();
        let url = config.endpoint_for(42).unwrap();
        assert_eq!(url.as_str(), "https://jsonplaceholder.typicode.com/posts/42");
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let config = Config {
            fetch: FetchConfig {
                url_template: "https://example.com/posts/1".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "fetch.url_template"));
    }

    #[test]
    fn test_unparseable_template_rejected() {
        let config = Config {
            fetch: FetchConfig {
                url_template: "not a url {id}".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = Config {
            fetch: FetchConfig {
                max_concurrent_fetches: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, Error::Config { key: Some(ref k), .. } if k == "fetch.max_concurrent_fetches")
        );
    }

    #[test]
    fn test_config_deserializes_with_all_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        config.validate().unwrap();
        assert_eq!(config.fetch.max_concurrent_fetches, 100);
    }
}
