use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::error::AppError;

/// One monitored product page, identified by its canonical URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Target {
    pub url: String,
    pub name: String,
}

/// A named set of targets sharing one notification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub endpoint: String,
    pub targets: Vec<Target>,
}

impl Target {
    pub fn new(raw_url: &str) -> Result<Self, AppError> {
        let url = Url::parse(raw_url.trim())
            .map_err(|e| AppError::Validation(format!("Invalid target URL '{}': {}", raw_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "Target URL must be http or https: {}",
                raw_url
            )));
        }

        let name = display_name(&url);
        Ok(Self {
            url: url.to_string(),
            name,
        })
    }
}

impl Group {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, targets: Vec<Target>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            targets,
        }
    }
}

/// Last path segment with hyphens as spaces, title-cased. Falls back to the host.
fn display_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_default();

    segment
        .split('-')
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
