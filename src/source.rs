//! Source acquisition: local files and HTTP(S) URLs.

use crate::error::{Error, Result};
use reqwest::StatusCode;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace};
use url::Url;

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A path on the local filesystem (including `file://` URLs).
    Local(PathBuf),
    /// An `http` or `https` URL.
    Remote(Url),
}

impl Location {
    /// Classify an input entry.
    ///
    /// Only absolute `http`/`https` URLs are fetched remotely. Everything
    /// else, relative paths and Windows drive paths included, is read from disk.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Location::Remote(url),
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .unwrap_or_else(|_| PathBuf::from(url.path()));
                Location::Local(path)
            }
            _ => Location::Local(PathBuf::from(raw)),
        }
    }

    /// Base name of the document, used to identify its template.
    pub fn name(&self) -> String {
        match self {
            Location::Local(path) => base_name(path),
            Location::Remote(url) => base_name(Path::new(url.path())),
        }
    }

    /// File suffix, if the path (or URL path) has one.
    pub fn suffix(&self) -> Option<String> {
        let path = match self {
            Location::Local(path) => path.as_path(),
            Location::Remote(url) => Path::new(url.path()),
        };
        path.extension()
            .map(|ext| ext.to_string_lossy().into_owned())
    }

    /// Read the raw document text.
    pub async fn fetch(&self, token: Option<&str>) -> Result<String> {
        match self {
            Location::Local(path) => read_file(path),
            Location::Remote(url) => get_from_url(&with_token(url, token)).await,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(url) => write!(f, "{}", url),
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Append the access token as a `token` query parameter.
pub fn with_token(url: &Url, token: Option<&str>) -> Url {
    let mut url = url.clone();
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        debug!("Adding token to url");
        url.query_pairs_mut().append_pair("token", token);
    }
    url
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| {
        error!(file = %path.display(), error = %err, "Failed to read file");
        Error::source_unavailable(path.display().to_string(), err)
    })
}

async fn get_from_url(url: &Url) -> Result<String> {
    // The token is part of the query, keep it out of logs and errors.
    let mut shown = url.clone();
    shown.set_query(None);
    trace!(url = %shown, "Fetching document");

    let resp = reqwest::get(url.clone()).await.map_err(|err| {
        error!(url = %shown, error = %err, "Get from URL failed");
        Error::source_unavailable(shown.as_str(), err.without_url())
    })?;

    let status = resp.status();
    if status != StatusCode::OK {
        error!(url = %shown, status = %status, "Unsupported HTTP status");
        return Err(Error::source_unavailable(
            shown.as_str(),
            format!("HTTP status {} is not OK", status.as_u16()),
        ));
    }

    resp.text().await.map_err(|err| {
        error!(url = %shown, error = %err, "Failed to read HTTP response body");
        Error::source_unavailable(shown.as_str(), err.without_url())
    })
}
