use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::collectors::runner::{CommandRunner, CommandSpec};
use crate::config::IdentityConfig;
use crate::constants::{ENV_AID, ENV_CID};
use crate::models::HostIdentity;

lazy_static! {
    static ref IDENTIFIER_PATTERN: Regex =
        Regex::new(r#"(?i)\b(cid|aid)\s*[=:]\s*"?([0-9A-Za-z-]+)"?"#)
            .expect("static pattern is valid");
}

/// Pull `cid` / `aid` values out of free-form identity command output such
/// as `cid="0123abcd", aid="4567ef"`.
pub fn parse_identifiers(output: &str) -> (Option<String>, Option<String>) {
    let mut cid = None;
    let mut aid = None;

    for caps in IDENTIFIER_PATTERN.captures_iter(output) {
        let value = caps[2].to_string();
        match caps[1].to_ascii_lowercase().as_str() {
            "cid" if cid.is_none() => cid = Some(value),
            "aid" if aid.is_none() => aid = Some(value),
            _ => {}
        }
    }

    (cid, aid)
}

/// Resolve host identifiers from the process environment, then config, then
/// the configured query command. Anything still missing becomes `unset`.
pub fn resolve_identity(config: &IdentityConfig, runner: &dyn CommandRunner) -> HostIdentity {
    resolve_identity_with(config, runner, |key| std::env::var(key).ok())
}

pub fn resolve_identity_with<F>(config: &IdentityConfig, runner: &dyn CommandRunner, env: F) -> HostIdentity
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let mut cid = non_empty(env(ENV_CID)).or_else(|| non_empty(config.cid.clone()));
    let mut aid = non_empty(env(ENV_AID)).or_else(|| non_empty(config.aid.clone()));

    if cid.is_none() || aid.is_none() {
        if let Some((program, args)) = config.query_command.as_ref().and_then(|c| c.split_first()) {
            match runner.capture(&CommandSpec::new(program, args.iter().cloned())) {
                Ok(output) => {
                    let (queried_cid, queried_aid) = parse_identifiers(&output.stdout);
                    cid = cid.or(queried_cid);
                    aid = aid.or(queried_aid);
                }
                Err(e) => warn!("Identity query {} failed: {}", program, e),
            }
        } else {
            debug!("No identity query command configured");
        }
    }

    let identity = HostIdentity::new(cid, aid);
    info!("Host identity: cid={} aid={}", identity.cid, identity.aid);
    identity
}
