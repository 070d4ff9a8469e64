//! Naming conventions the builtin rules match against.
//!
//! What counts as a "permission-check-like" or "validation-like" call is a
//! judgement call, so none of it is hard-coded in the rules: everything lives
//! in [`Conventions`], which defaults to Bukkit-flavored names and can be
//! replaced wholesale from a YAML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Configurable name lists and patterns consumed by the builtin rules.
///
/// List entries match a name when they are equal to it or a substring of it,
/// case-insensitively (`validate` matches `validateClick`). Pattern fields
/// are regular expressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Conventions {
    /// Annotations marking a method as an event handler.
    pub event_annotations: Vec<String>,
    /// Calls that count as a permission or operator check.
    pub permission_checks: Vec<String>,
    /// Calls that change game state from an event handler.
    pub state_changers: Vec<String>,
    /// Calls that spawn an asynchronous task.
    pub async_spawners: Vec<String>,
    /// Calls that mutate a shared container such as an inventory.
    pub container_mutators: Vec<String>,
    /// Method names that mark a packet handler.
    pub packet_handler_pattern: String,
    /// Parameter types that mark a packet handler.
    pub packet_type_pattern: String,
    /// Calls that count as input validation or rate limiting.
    pub validation_calls: Vec<String>,
    /// Calls that dispatch a response to a client.
    pub dispatch_calls: Vec<String>,
    /// Constructed types treated as transactions.
    pub transaction_type_pattern: String,
    /// Calls that start a transaction.
    pub begin_calls: Vec<String>,
    /// Calls that settle a transaction (commit or rollback).
    pub settle_calls: Vec<String>,
}

impl Default for Conventions {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            event_annotations: names(&["EventHandler"]),
            permission_checks: names(&[
                "hasPermission",
                "isOp",
                "checkPermission",
                "isAuthorized",
            ]),
            state_changers: names(&[
                "setCancelled",
                "setAmount",
                "setItem",
                "addItem",
                "removeItem",
                "setHealth",
                "teleport",
            ]),
            async_spawners: names(&[
                "runTaskAsynchronously",
                "runTaskLaterAsynchronously",
                "runTaskTimerAsynchronously",
                "supplyAsync",
                "runAsync",
            ]),
            container_mutators: names(&[
                "setItem",
                "addItem",
                "removeItem",
                "setContents",
                "clear",
            ]),
            packet_handler_pattern: r"^(handle|process|intercept)".to_string(),
            packet_type_pattern: r"^Packet(PlayIn|PlayOut|Login|Status)".to_string(),
            validation_calls: names(&[
                "validate",
                "isValid",
                "sanitize",
                "rateLimit",
                "checkRate",
                "throttle",
                "verify",
            ]),
            dispatch_calls: names(&["sendPacket", "sendMessage", "respond", "reply"]),
            transaction_type_pattern: r"Transaction$".to_string(),
            begin_calls: names(&["start", "begin", "open"]),
            settle_calls: names(&["commit", "rollback", "abort"]),
        }
    }
}

impl Conventions {
    /// Load conventions from a YAML file, replacing the defaults entirely.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ScanError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
            file: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|e| {
            ScanError::Config(format!("{}: {e}", path.display()))
        })
    }
}

/// A pre-lowercased name list for case-insensitive matching.
#[derive(Debug, Clone)]
pub struct NameList {
    entries: Vec<String>,
}

impl NameList {
    pub fn new(names: &[String]) -> Self {
        Self {
            entries: names.iter().map(|n| n.to_ascii_lowercase()).collect(),
        }
    }

    /// True when any entry equals `name` or is contained in it.
    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.entries.iter().any(|e| lower.contains(e.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("hasPermission", true; "exact name")]
    #[test_case("HASPERMISSION", true; "case insensitive")]
    #[test_case("hasPermissionAsync", true; "entry inside a longer name")]
    #[test_case("sendMessage", false; "unrelated name")]
    fn name_list_matching(name: &str, expected: bool) {
        let list = NameList::new(&["hasPermission".to_string(), "isOp".to_string()]);
        assert_eq!(list.matches(name), expected);
    }

    #[test]
    fn defaults_cover_the_bukkit_conventions() {
        let c = Conventions::default();
        assert!(NameList::new(&c.async_spawners).matches("runTaskAsynchronously"));
        assert!(NameList::new(&c.permission_checks).matches("isOp"));
        assert!(NameList::new(&c.settle_calls).matches("rollback"));
    }

    #[test]
    fn yaml_round_trip_preserves_lists() {
        let defaults = Conventions::default();
        let yaml = serde_yaml::to_string(&defaults).unwrap();
        let parsed: Conventions = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.permission_checks, defaults.permission_checks);
        assert_eq!(
            parsed.transaction_type_pattern,
            defaults.transaction_type_pattern
        );
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let parsed: Conventions =
            serde_yaml::from_str("permission_checks: [canUse]").unwrap();
        assert_eq!(parsed.permission_checks, vec!["canUse".to_string()]);
        assert_eq!(
            parsed.event_annotations,
            Conventions::default().event_annotations
        );
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        let result: Result<Conventions, _> = serde_yaml::from_str("permision_checks: [x]");
        assert!(result.is_err());
    }
}
