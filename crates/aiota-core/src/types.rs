//! Shared types used across AiotA crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the bootstrap does when the single-instance probe is inconclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbePolicy {
    /// Treat an inconclusive probe as fatal.
    #[default]
    Abort,
    /// Log a warning and continue as if the port were free.
    Proceed,
}

impl ProbePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbePolicy::Abort => "abort",
            ProbePolicy::Proceed => "proceed",
        }
    }
}

impl std::str::FromStr for ProbePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(ProbePolicy::Abort),
            "proceed" => Ok(ProbePolicy::Proceed),
            other => Err(format!("unknown probe policy: {other} (expected abort|proceed)")),
        }
    }
}

/// Which exits of a supervised child are eligible for a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartOn {
    /// Every exit is eligible while restarts remain.
    #[default]
    Always,
    /// Only runs that lived at least `min_uptime` are restarted.
    MinUptime,
}

/// Parse a duration string like "5s", "500ms", "1m" or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Milliseconds since the unix epoch.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("307445734561825861m"), None);
    }

    #[test]
    fn probe_policy_from_str() {
        assert_eq!("abort".parse::<ProbePolicy>(), Ok(ProbePolicy::Abort));
        assert_eq!("proceed".parse::<ProbePolicy>(), Ok(ProbePolicy::Proceed));
        assert!("maybe".parse::<ProbePolicy>().is_err());
    }
}
