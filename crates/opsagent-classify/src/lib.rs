//! Heuristic action classifier: buckets a shell command into
//! [`ActionClass::Read`], [`ActionClass::Write`], or
//! [`ActionClass::Destructive`] by ordered pattern match, and derives a
//! [`RiskLevel`] from the class and the target environment.
//!
//! This is a heuristic, not a parser: it pattern-matches on the
//! lowercased command text and makes no attempt to understand shell
//! quoting, pipelines, or subshells. False negatives (an unrecognized
//! destructive command classified as read) are possible by design; the
//! policy engine that consumes this classification treats `Read` as the
//! default, not a proven-safe guarantee.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

use std::sync::LazyLock;

use opsagent_core::{Env, RiskLevel};
use regex::RegexSet;
use serde::{Deserialize, Serialize};

/// The bucket a command falls into, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    /// Read-only or informational command.
    Read,
    /// Mutates state but is in principle reversible.
    Write,
    /// Irreversible or high-blast-radius command.
    Destructive,
}

// Patterns below are transcribed in order and intent from the reference
// ops-agent this runtime generalizes: destructive patterns first, then
// write patterns, matched case-insensitively against the lowercased
// command. First match in each set wins; a command matching no pattern
// is `Read`.
const DESTRUCTIVE_PATTERNS: &[&str] = &[
    r"rm\s+-rf\s+/",
    r"mkfs",
    r"dd\s+if=",
    r"shutdown",
    r"reboot",
    r"halt",
    r"init\s+0",
    r"init\s+6",
    r"systemctl\s+poweroff",
    r"systemctl\s+reboot",
    r">\s*/dev/sd[a-z]",
    r"wipefs",
    r"fdisk.*-w",
];

const WRITE_PATTERNS: &[&str] = &[
    r"rm\s+",
    r"mv\s+",
    r"cp\s+.*\s+/",
    r">",
    r">>",
    r"systemctl\s+stop",
    r"systemctl\s+disable",
    r"kill\s+-9",
    r"pkill",
    r"chmod",
    r"chown",
    r"service\s+\w+\s+stop",
    r"docker\s+rm",
    r"docker\s+stop",
    r"kubectl\s+delete",
    r"sed\s+-i",
    r"truncate",
];

static DESTRUCTIVE_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(DESTRUCTIVE_PATTERNS).expect("classifier destructive patterns are valid regex")
});

static WRITE_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(WRITE_PATTERNS).expect("classifier write patterns are valid regex")
});

/// Classifies a raw command string into an [`ActionClass`].
///
/// Matching is case-insensitive and ignores leading/trailing whitespace;
/// patterns are tried destructive-first, then write, falling back to
/// read.
#[must_use]
pub fn classify_command(command: &str) -> ActionClass {
    let lowered = command.to_lowercase();
    let lowered = lowered.trim();

    if DESTRUCTIVE_SET.is_match(lowered) {
        return ActionClass::Destructive;
    }
    if WRITE_SET.is_match(lowered) {
        return ActionClass::Write;
    }
    ActionClass::Read
}

/// True if `command` classifies as [`ActionClass::Destructive`].
#[must_use]
pub fn is_destructive(command: &str) -> bool {
    classify_command(command) == ActionClass::Destructive
}

/// True if `command` classifies as [`ActionClass::Write`] or
/// [`ActionClass::Destructive`].
#[must_use]
pub fn is_write_operation(command: &str) -> bool {
    matches!(
        classify_command(command),
        ActionClass::Write | ActionClass::Destructive
    )
}

/// Derives a [`RiskLevel`] from a command and the environment it would
/// run against.
///
/// Destructive commands are `Critical` in prod, `High` elsewhere. Write
/// commands are `High` in prod, `Medium` elsewhere. Read commands are
/// always `Low`.
#[must_use]
pub fn risk_level(command: &str, env: Env) -> RiskLevel {
    match classify_command(command) {
        ActionClass::Destructive => {
            if env == Env::Prod {
                RiskLevel::Critical
            } else {
                RiskLevel::High
            }
        }
        ActionClass::Write => {
            if env == Env::Prod {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            }
        }
        ActionClass::Read => RiskLevel::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_destructive_commands() {
        assert_eq!(classify_command("rm -rf /"), ActionClass::Destructive);
        assert_eq!(classify_command("sudo REBOOT now"), ActionClass::Destructive);
        assert_eq!(classify_command("mkfs.ext4 /dev/sdb1"), ActionClass::Destructive);
    }

    #[test]
    fn classifies_write_commands() {
        assert_eq!(classify_command("chmod 700 /etc/shadow"), ActionClass::Write);
        assert_eq!(classify_command("echo hi > /tmp/out"), ActionClass::Write);
        assert_eq!(classify_command("docker stop web"), ActionClass::Write);
    }

    #[test]
    fn classifies_read_commands_by_default() {
        assert_eq!(classify_command("ps aux"), ActionClass::Read);
        assert_eq!(classify_command("df -h"), ActionClass::Read);
        assert_eq!(classify_command("tail -f /var/log/syslog"), ActionClass::Read);
    }

    #[test]
    fn destructive_beats_write_when_both_match() {
        // Contains both a write pattern (>) and a destructive pattern.
        assert_eq!(classify_command("dd if=/dev/zero > /dev/sda"), ActionClass::Destructive);
    }

    #[test]
    fn is_destructive_and_is_write_operation_agree_with_classify() {
        assert!(is_destructive("shutdown -h now"));
        assert!(is_write_operation("shutdown -h now"));
        assert!(is_write_operation("mv /a /b"));
        assert!(!is_destructive("mv /a /b"));
        assert!(!is_write_operation("cat /etc/hosts"));
    }

    #[test]
    fn risk_level_matches_env_and_class() {
        assert_eq!(risk_level("rm -rf /", Env::Prod), RiskLevel::Critical);
        assert_eq!(risk_level("rm -rf /", Env::Dev), RiskLevel::High);
        assert_eq!(risk_level("chown root /etc/passwd", Env::Prod), RiskLevel::High);
        assert_eq!(risk_level("chown root /etc/passwd", Env::Staging), RiskLevel::Medium);
        assert_eq!(risk_level("cat /etc/hosts", Env::Prod), RiskLevel::Low);
    }
}
