// Route-policy table: which method+path combinations bypass the auth gate
use axum::http::Method;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::AppConfig;

const API_PLACEHOLDER: &str = "{api}";
const UPLOADS_PLACEHOLDER: &str = "{uploads}";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid exemption pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    #[default]
    Exact,
    Prefix,
    Regex,
}

/// One exemption as written in the policy file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub path: String,
    #[serde(default, rename = "match")]
    pub kind: MatchKind,
    /// Empty means every method
    #[serde(default)]
    pub methods: Vec<String>,
}

impl RuleSpec {
    fn new(path: &str, kind: MatchKind, methods: &[&str]) -> Self {
        Self {
            path: path.to_string(),
            kind,
            methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    exemptions: Vec<RuleSpec>,
}

#[derive(Debug, Clone)]
enum PathPattern {
    Exact(String),
    Prefix(String),
    Regex(Regex),
}

impl PathPattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => trim_trailing_slash(path) == exact,
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathPattern::Regex(re) => re.is_match(path),
        }
    }
}

#[derive(Debug, Clone)]
struct ExemptionRule {
    pattern: PathPattern,
    methods: Vec<Method>,
}

#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    rules: Vec<ExemptionRule>,
}

impl RoutePolicy {
    /// Load the table named by `SECURITY_POLICY_FILE`, or the built-in one
    pub fn load(config: &AppConfig) -> Result<Self, PolicyError> {
        let specs = match &config.security.policy_file {
            Some(path) => {
                tracing::info!("Loading route policy from {}", path.display());
                read_policy_file(path)?
            }
            None => default_rules(),
        };
        Self::compile(&specs, &config.api.prefix, &config.uploads.public_path)
    }

    /// Substitute placeholders and compile every rule
    pub fn compile(specs: &[RuleSpec], api_prefix: &str, uploads_path: &str) -> Result<Self, PolicyError> {
        let mut rules = Vec::with_capacity(specs.len());

        for spec in specs {
            let pattern = match spec.kind {
                MatchKind::Exact => {
                    let path = substitute(&spec.path, api_prefix, uploads_path);
                    PathPattern::Exact(trim_trailing_slash(&path).to_string())
                }
                MatchKind::Prefix => PathPattern::Prefix(substitute(&spec.path, api_prefix, uploads_path)),
                MatchKind::Regex => {
                    let source = substitute(&spec.path, &regex::escape(api_prefix), &regex::escape(uploads_path));
                    let re = Regex::new(&source).map_err(|source_err| PolicyError::InvalidRegex {
                        pattern: source.clone(),
                        source: source_err,
                    })?;
                    PathPattern::Regex(re)
                }
            };

            let methods = spec
                .methods
                .iter()
                .map(|m| Method::from_bytes(m.to_uppercase().as_bytes()).map_err(|_| PolicyError::InvalidMethod(m.clone())))
                .collect::<Result<Vec<_>, _>>()?;

            rules.push(ExemptionRule { pattern, methods });
        }

        Ok(Self { rules })
    }

    pub fn is_exempt(&self, method: &Method, path: &str) -> bool {
        self.rules.iter().any(|rule| {
            (rule.methods.is_empty() || rule.methods.contains(method)) && rule.pattern.matches(path)
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Public catalog reads, login/registration, static images and probes
pub fn default_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new("^{api}/products(/[^/]+)?/?$", MatchKind::Regex, &["GET", "OPTIONS"]),
        RuleSpec::new("^{api}/categories(/[^/]+)?/?$", MatchKind::Regex, &["GET", "OPTIONS"]),
        RuleSpec::new("{api}/users/login", MatchKind::Exact, &["POST"]),
        RuleSpec::new("{api}/users/register", MatchKind::Exact, &["POST"]),
        RuleSpec::new("{uploads}/", MatchKind::Prefix, &["GET", "HEAD"]),
        RuleSpec::new("/", MatchKind::Exact, &["GET"]),
        RuleSpec::new("/health", MatchKind::Exact, &["GET"]),
    ]
}

fn read_policy_file(path: &Path) -> Result<Vec<RuleSpec>, PolicyError> {
    let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rules(&raw)
}

pub fn parse_rules(yaml: &str) -> Result<Vec<RuleSpec>, PolicyError> {
    let file: PolicyFile = serde_yaml::from_str(yaml)?;
    Ok(file.exemptions)
}

fn substitute(path: &str, api_prefix: &str, uploads_path: &str) -> String {
    path.replace(API_PLACEHOLDER, api_prefix)
        .replace(UPLOADS_PLACEHOLDER, uploads_path)
}

fn trim_trailing_slash(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
