//! Translation of loose `api` command arguments into a validated request.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use url::Url;

use crate::client::{CliError, CliResult};

/// Methods accepted by the generic `api` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApiMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl ApiMethod {
    /// Every accepted method, in the order shown to users.
    pub(crate) const ALL: [Self; 5] = [Self::Get, Self::Post, Self::Put, Self::Patch, Self::Delete];

    /// Canonical upper-case name.
    #[must_use]
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Parse an already upper-cased method name.
    #[must_use]
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == raw)
    }

    pub(crate) fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|method| method.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Display for ApiMethod {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl From<ApiMethod> for reqwest::Method {
    fn from(method: ApiMethod) -> Self {
        match method {
            ApiMethod::Get => Self::GET,
            ApiMethod::Post => Self::POST,
            ApiMethod::Put => Self::PUT,
            ApiMethod::Patch => Self::PATCH,
            ApiMethod::Delete => Self::DELETE,
        }
    }
}

/// Fully resolved request ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestDescriptor {
    pub(crate) method: ApiMethod,
    pub(crate) url: Url,
    pub(crate) body: Vec<u8>,
}


/// Raw inputs gathered from the `api` command line.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequestInputs {
    /// Positional arguments: `[method] <path>`.
    pub(crate) args: Vec<String>,
    /// Raw `--data` payload.
    pub(crate) data: String,
    /// Parsed `--query` pairs; later keys override earlier ones.
    pub(crate) query: BTreeMap<String, String>,
}

impl ApiRequestInputs {
    /// Validate raw `api` inputs against the tenant's API `root` (see [`api_root`]).
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown method, a body that is not
    /// JSON, or a path that does not resolve under `root`.
    pub(crate) fn from_args(
        args: Vec<String>,
        data: String,
        query: BTreeMap<String, String>,
        root: &Url,
    ) -> CliResult<RequestDescriptor> {
        let inputs = Self { args, data, query };
        inputs.resolve(root)
    }

    fn resolve(&self, root: &Url) -> CliResult<RequestDescriptor> {
        let (raw_method, raw_path) = self.split_args()?;
        let method = ApiMethod::parse(&raw_method).ok_or_else(|| {
            CliError::validation(format!(
                "invalid method given: {raw_method}, accepting only {}",
                ApiMethod::allowed_list()
            ))
        })?;
        let body = validate_body(&self.data)?;
        let url = resolve_endpoint(root, raw_path, &self.query)?;

        Ok(RequestDescriptor { method, url, body })
    }

    fn split_args(&self) -> CliResult<(String, &str)> {
        match self.args.as_slice() {
            [path] => {
                let method = if self.data.is_empty() {
                    ApiMethod::Get
                } else {
                    ApiMethod::Post
                };
                Ok((method.as_str().to_string(), path.as_str()))
            }
            [method, path] => Ok((method.to_uppercase(), path.as_str())),
            _ => Err(CliError::validation(
                "expected arguments: [method] <path>",
            )),
        }
    }
}

/// Build `https://<domain>/api/v2/` for a tenant domain.
pub(crate) fn api_root(domain: &str) -> CliResult<Url> {
    let domain = domain.trim();
    if domain.is_empty()
        || domain.contains("://")
        || domain.contains(['/', '?', '#'])
        || domain.chars().any(char::is_whitespace)
    {
        return Err(CliError::validation(format!(
            "invalid uri given: malformed tenant domain '{domain}'"
        )));
    }

    let root = Url::parse(&format!("https://{domain}/api/v2/"))
        .map_err(|err| CliError::validation(format!("invalid uri given: {err}")))?;
    if root.host_str().is_none() {
        return Err(CliError::validation(format!(
            "invalid uri given: malformed tenant domain '{domain}'"
        )));
    }
    Ok(root)
}

fn validate_body(data: &str) -> CliResult<Vec<u8>> {
    if !data.is_empty() && serde_json::from_str::<serde::de::IgnoredAny>(data).is_err() {
        return Err(CliError::validation(format!("invalid json data given: {data}")));
    }
    Ok(data.as_bytes().to_vec())
}

fn resolve_endpoint(root: &Url, path: &str, query: &BTreeMap<String, String>) -> CliResult<Url> {
    // Concatenate rather than join: `Url::join` lets an absolute or
    // scheme-relative path replace the tenant host.
    let mut endpoint = Url::parse(&format!("{root}{}", path.trim_matches('/')))
        .map_err(|err| CliError::validation(format!("invalid uri given: {err}")))?;

    if endpoint.origin() != root.origin() || !endpoint.path().starts_with(root.path()) {
        return Err(CliError::validation(format!(
            "invalid uri given: path '{path}' escapes {root}"
        )));
    }

    let mut params: BTreeMap<String, String> = endpoint.query_pairs().into_owned().collect();
    params.extend(query.iter().map(|(key, value)| (key.clone(), value.clone())));

    if params.is_empty() {
        endpoint.set_query(None);
    } else {
        endpoint.query_pairs_mut().clear().extend_pairs(&params);
    }
    endpoint.set_fragment(None);

    Ok(endpoint)
}

/// Parse a `--query key=value` flag.
pub(crate) fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("query parameter key must not be empty in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
