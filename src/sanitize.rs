//! Conversion of flattened keys into step-output safe identifiers.

use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::{error, trace};

/// Prefix reserved by the hosting platform for its own variables.
pub const RESERVED_PREFIX: &str = "GITHUB_";

const ILLEGAL_CHARS: &str = "[^0-9A-Za-z_]";

static ILLEGAL: LazyLock<Option<Regex>> = LazyLock::new(|| match Regex::new(ILLEGAL_CHARS) {
    Ok(re) => Some(re),
    Err(err) => {
        error!(regexp = ILLEGAL_CHARS, error = %err, "Failed to compile regexp");
        None
    }
});

/// Make `name` usable as an environment variable and step output name.
///
/// Every character outside `[0-9A-Za-z_]` becomes `_`. Names starting with a
/// digit or with [`RESERVED_PREFIX`] get a leading `_`. If the character
/// pattern can't be compiled the name is returned unchanged.
pub fn sanitize(name: &str) -> String {
    let Some(re) = ILLEGAL.as_ref() else {
        return name.to_string();
    };
    let mut out = re.replace_all(name, "_").into_owned();
    let starts_with_digit = out.starts_with(|c: char| c.is_ascii_digit());
    if starts_with_digit || out.starts_with(RESERVED_PREFIX) {
        out.insert(0, '_');
    }
    trace!(key = name, sanitized = %out, "Sanitized name");
    out
}
