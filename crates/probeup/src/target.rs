//! Probe target resolution.

use url::Url;

use crate::Error;

/// Firestore REST documents endpoint, `{}` is the project id
const FIRESTORE_BASE_URL: &str =
    "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents";

/// Base URL that every probed path is appended to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    base_url: String,
}

impl Target {
    /// Create a target from an explicit base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;
        Ok(Self { base_url })
    }

    /// Target the Firestore documents tree of a project
    pub fn firestore(project_id: &str) -> Result<Self, Error> {
        Self::new(FIRESTORE_BASE_URL.replace("{}", project_id))
    }

    /// Custom base URL when given, Firestore otherwise
    pub fn resolve(project_id: &str, custom_url: Option<&str>) -> Result<Self, Error> {
        match custom_url {
            Some(url) => Self::new(url),
            None => Self::firestore(project_id),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a path; plain concatenation, the path is not normalised
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn validate_base_url(base_url: &str) -> Result<(), Error> {
    let invalid = |reason: String| Error::InvalidBaseUrl { url: base_url.to_string(), reason };

    let url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(invalid(format!("scheme '{scheme}' must be http or https")));
    }

    if url.host_str().is_none() {
        return Err(invalid("URL must have a host".to_string()));
    }

    Ok(())
}
