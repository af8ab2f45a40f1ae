//! Endpoint newtype
//!
//! This module defines a newtype around a Url for demarking the base URL of a
//! CDash instance. Queries are posted to its `/graphql` path, and its normalized
//! string form is one of the components of a query cache key.

use std::fmt::{self, Display};

use serde::Deserialize;
use url::Url;

use crate::errors::ExecuteError;

/// The base URL of a CDash instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Parse and validate a caller-supplied base URL
    pub fn parse(base_url: &str) -> Result<Self, ExecuteError> {
        let url = Url::parse(base_url.trim()).map_err(|e| {
            ExecuteError::InvalidInput(format!(
                "base_url `{base_url}` is not a valid absolute URL: {e}"
            ))
        })?;
        Self::try_from(url)
    }

    /// The base URL without a trailing slash
    pub fn as_str(&self) -> &str {
        self.0.as_str().trim_end_matches('/')
    }

    /// The URL GraphQL requests are posted to
    pub fn graphql_url(&self) -> String {
        format!("{}/graphql", self.as_str())
    }
}

impl TryFrom<Url> for Endpoint {
    type Error = ExecuteError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ExecuteError::InvalidInput(format!(
                "base_url `{url}` must use http or https"
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ExecuteError::InvalidInput(format!(
                "base_url `{url}` must include a host"
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ExecuteError::InvalidInput(format!(
                "base_url `{url}` must not include a query or fragment"
            )));
        }
        Ok(Self(url))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self(defaults::endpoint())
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let url = Url::deserialize(deserializer)?;
        Self::try_from(url).map_err(serde::de::Error::custom)
    }
}

mod defaults {
    use url::Url;

    pub(super) fn endpoint() -> Url {
        // SAFETY: This should always parse correctly and is considered a breaking
        // error otherwise. It is also explicitly tested in [test::default_endpoint_parses_correctly]
        #[allow(clippy::unwrap_used)]
        Url::parse("https://open.cdash.org").unwrap()
    }

}
