use std::time::Duration;

use serde::Deserialize;
use tracing::Level;
use url::Url;

use crate::batch::DEFAULT_CONCURRENCY;

/// Configuration for the MCP server
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The Open Targets Platform GraphQL endpoint
    pub endpoint: Url,

    /// Per-request timeout for GraphQL calls (e.g. "30s")
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Batch execution settings
    pub batch: BatchConfig,

    /// Response filtering settings
    pub filters: FilterConfig,

    /// Logging settings
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: defaults::endpoint(),
            timeout: defaults::timeout(),
            batch: BatchConfig::default(),
            filters: FilterConfig::default(),
            logging: Logging::default(),
        }
    }
}

/// Settings for the batch query tool
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of simultaneous in-flight requests per batch
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Settings for the response projection feature
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Whether tools accept a `jq_filter` argument
    pub enabled: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The minimum log level to emit
    #[serde(deserialize_with = "parsers::from_str")]
    pub level: Level,
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

mod defaults {
    use std::time::Duration;

    use url::Url;

    pub(super) fn endpoint() -> Url {
        Url::parse("https://api.platform.opentargets.org/api/v4/graphql")
            .expect("default endpoint is a valid URL")
    }

    pub(super) fn timeout() -> Duration {
        Duration::from_secs(30)
    }
}

mod parsers {
    use std::{fmt::Display, marker::PhantomData, str::FromStr};

    use serde::Deserializer;

    pub(super) fn from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        struct FromStrVisitor<Inner> {
            _phantom: PhantomData<Inner>,
        }
        impl<Inner> serde::de::Visitor<'_> for FromStrVisitor<Inner>
        where
            Inner: FromStr,
            <Inner as FromStr>::Err: Display,
        {
            type Value = Inner;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Inner::from_str(v).map_err(|e| serde::de::Error::custom(e.to_string()))
            }
        }

        deserializer.deserialize_str(FromStrVisitor {
            _phantom: PhantomData,
        })
    }
}
