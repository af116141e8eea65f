use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("static pattern is valid");
}

/// Expand `$VAR` and `${VAR}` references.
///
/// An unknown `${VAR}` expands to nothing, as in a shell; an unknown bare
/// `$VAR` is left in place so a literal dollar in a path survives.
pub fn parse_unix_env_vars(path: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(path, |caps: &Captures| {
            if let Some(braced) = caps.get(1) {
                std::env::var(braced.as_str()).unwrap_or_default()
            } else {
                let name = &caps[2];
                std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
            }
        })
        .into_owned()
}
