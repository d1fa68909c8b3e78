//! Provider definitions and URL template rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::ScraperError;

/// How a single result field is extracted from a listing row.
///
/// Either a bare selector, or a pipeline whose first element is a selector
/// followed by attribute reads (`@href`), regex captures (`/.../`) and
/// substitutions (`s~from~to~`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extractor {
    /// A single selector or regex
    Selector(String),
    /// A selector followed by transformation steps
    Pipeline(Vec<String>),
}

impl Extractor {
    /// Returns the extraction steps in order.
    pub fn steps(&self) -> Vec<&str> {
        match self {
            Extractor::Selector(selector) => vec![selector.as_str()],
            Extractor::Pipeline(steps) => steps.iter().map(String::as_str).collect(),
        }
    }
}

/// One scraping endpoint: where to request results and how to read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDefinition {
    /// Human readable provider name
    pub name: String,
    /// URL template with `{{param}}` or `{{param:default}}` placeholders
    pub url: String,
    /// HTTP method, GET when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Extra request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Selector for result rows; absent for single-item endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
    /// Result fields and how to extract each of them
    pub result: BTreeMap<String, Extractor>,
}

impl ProviderDefinition {
    /// Renders the search URL for a query and optional page number.
    ///
    /// The query is form-encoded. A missing page falls back to the
    /// template's default.
    ///
    /// # Errors
    /// - `ScraperError::Template` - The template is malformed or needs a
    ///   parameter that has no value and no default
    pub fn search_url(&self, query: &str, page: Option<u32>) -> Result<String, ScraperError> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let page = page.map(|p| p.to_string());

        render_template(&self.url, |name| match name {
            "query" => Some(encoded.clone()),
            "page" => page.clone(),
            _ => None,
        })
    }

    /// Renders the URL of an item page, such as `/torrent/123/`.
    ///
    /// # Errors
    /// - `ScraperError::Template` - The template is malformed or needs a
    ///   parameter other than `item` that has no default
    pub fn item_url(&self, item: &str) -> Result<String, ScraperError> {
        render_template(&self.url, |name| (name == "item").then(|| item.to_string()))
    }

    /// Checks that the definition can be used for scraping.
    ///
    /// # Errors
    /// - `ScraperError::InvalidProvider` - Empty name, unusable URL
    ///   template, or missing result fields
    pub fn validate(&self, id: &str) -> Result<(), ScraperError> {
        let invalid = |reason: String| ScraperError::InvalidProvider {
            id: id.to_string(),
            reason,
        };

        if id.trim().is_empty() || id.starts_with('/') {
            return Err(invalid("identifier must be non-empty and relative".to_string()));
        }

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }

        // Probe values stand in for every placeholder so the rendered URL can be parsed
        let probe = render_template(&self.url, |name| {
            Some(if name == "item" { "/probe" } else { "probe" }.to_string())
        })
        .map_err(|e| invalid(e.to_string()))?;

        let parsed =
            url::Url::parse(&probe).map_err(|e| invalid(format!("url '{}': {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("url '{}' must use http or https", self.url)));
        }

        if let Some(method) = &self.method {
            if !matches!(method.to_ascii_uppercase().as_str(), "GET" | "POST") {
                return Err(invalid(format!("unsupported method '{method}'")));
            }
        }

        if self.list.as_deref().is_some_and(|list| list.trim().is_empty()) {
            return Err(invalid("list selector must not be empty".to_string()));
        }

        if self.result.is_empty() {
            return Err(invalid("result must define at least one field".to_string()));
        }

        for (field, extractor) in &self.result {
            let steps = extractor.steps();
            if steps.first().is_none_or(|first| first.trim().is_empty()) {
                return Err(invalid(format!("result field '{field}' has no selector")));
            }
        }

        Ok(())
    }
}

/// Expands `{{name}}` and `{{name:default}}` placeholders.
///
/// `lookup` supplies parameter values; the template default is used when it
/// returns `None`.
///
/// # Errors
/// - `ScraperError::Template` - Unterminated placeholder, empty parameter
///   name, or a parameter with neither a value nor a default
pub fn render_template<F>(template: &str, lookup: F) -> Result<String, ScraperError>
where
    F: Fn(&str) -> Option<String>,
{
    let template_error = |reason: String| ScraperError::Template {
        template: template.to_string(),
        reason,
    };

    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or_else(|| template_error("unterminated placeholder".to_string()))?;

        let placeholder = &after_open[..end];
        let (name, default) = match placeholder.split_once(':') {
            Some((name, default)) => (name.trim(), Some(default)),
            None => (placeholder.trim(), None),
        };
        if name.is_empty() {
            return Err(template_error("empty parameter name".to_string()));
        }

        let value = lookup(name)
            .or_else(|| default.map(str::to_string))
            .ok_or_else(|| template_error(format!("no value for '{name}'")))?;
        rendered.push_str(&value);

        rest = &after_open[end + 2..];
    }
    rendered.push_str(rest);

    Ok(rendered)
}
