// Data types for per-guild protection policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Message-flood thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamRule {
    /// Messages within the window that trigger a timeout.
    pub max_msgs: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for SpamRule {
    fn default() -> Self {
        Self {
            max_msgs: 6,
            window_secs: 5,
        }
    }
}

/// What happens to a member who joins during a saturated join window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidAction {
    Timeout,
    Kick,
}

impl fmt::Display for RaidAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaidAction::Timeout => write!(f, "timeout"),
            RaidAction::Kick => write!(f, "kick"),
        }
    }
}

/// Join-flood thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidRule {
    /// Joins within the window that trigger the action.
    pub join_limit: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    pub action: RaidAction,
}

impl Default for RaidRule {
    fn default() -> Self {
        Self {
            join_limit: 6,
            window_secs: 10,
            action: RaidAction::Timeout,
        }
    }
}

/// Per-guild protection configuration.
///
/// Every field has a default so documents written by older versions keep
/// deserializing, and an unseen guild materializes a complete policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildPolicy {
    pub anti_link: bool,
    pub anti_spam: bool,
    pub anti_raid: bool,
    pub anti_bot: bool,

    /// Timeout length applied by anti-spam and anti-raid.
    pub timeout_minutes: u32,
    pub spam: SpamRule,
    pub raid: RaidRule,

    /// Substrings that make a link-bearing message acceptable.
    pub link_whitelist: BTreeSet<String>,

    /// Users exempt from the message-level checks.
    pub bypass_user_ids: BTreeSet<u64>,
    /// Roles whose members are exempt from the message-level checks.
    pub bypass_role_ids: BTreeSet<u64>,
}

impl Default for GuildPolicy {
    fn default() -> Self {
        Self {
            anti_link: true,
            anti_spam: true,
            anti_raid: true,
            anti_bot: true,
            timeout_minutes: 10,
            spam: SpamRule::default(),
            raid: RaidRule::default(),
            link_whitelist: BTreeSet::new(),
            bypass_user_ids: BTreeSet::new(),
            bypass_role_ids: BTreeSet::new(),
        }
    }
}

impl GuildPolicy {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_minutes) * 60)
    }

    /// True when the user or one of their roles is on a bypass list.
    pub fn is_bypassed(&self, user_id: u64, role_ids: &[u64]) -> bool {
        self.bypass_user_ids.contains(&user_id)
            || role_ids.iter().any(|id| self.bypass_role_ids.contains(id))
    }

    /// True when any whitelist entry appears in the text, case-insensitively.
    pub fn whitelists_link(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.link_whitelist
            .iter()
            .any(|entry| lowered.contains(&entry.to_lowercase()))
    }
}

/// The four toggles addressable by the `protect` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectFeature {
    AntiLink,
    AntiSpam,
    AntiRaid,
    AntiBot,
}

impl ProtectFeature {
    pub const ALL: [ProtectFeature; 4] = [
        ProtectFeature::AntiLink,
        ProtectFeature::AntiSpam,
        ProtectFeature::AntiRaid,
        ProtectFeature::AntiBot,
    ];
}

impl fmt::Display for ProtectFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtectFeature::AntiLink => "antiLink",
            ProtectFeature::AntiSpam => "antiSpam",
            ProtectFeature::AntiRaid => "antiRaid",
            ProtectFeature::AntiBot => "antiBot",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown protection feature")]
pub struct UnknownFeature;

impl FromStr for ProtectFeature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "antilink" => Ok(ProtectFeature::AntiLink),
            "antispam" => Ok(ProtectFeature::AntiSpam),
            "antiraid" => Ok(ProtectFeature::AntiRaid),
            "antibot" => Ok(ProtectFeature::AntiBot),
            _ => Err(UnknownFeature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_expected_policy() {
        let policy = GuildPolicy::default();

        assert!(policy.anti_link);
        assert!(policy.anti_spam);
        assert!(policy.anti_raid);
        assert!(policy.anti_bot);
        assert_eq!(policy.timeout_minutes, 10);
        assert_eq!(policy.spam, SpamRule { max_msgs: 6, window_secs: 5 });
        assert_eq!(
            policy.raid,
            RaidRule {
                join_limit: 6,
                window_secs: 10,
                action: RaidAction::Timeout
            }
        );
        assert!(policy.link_whitelist.is_empty());
        assert!(policy.bypass_user_ids.is_empty());
        assert!(policy.bypass_role_ids.is_empty());
    }

    #[test]
    fn timeout_duration_converts_minutes() {
        let policy = GuildPolicy {
            timeout_minutes: 3,
            ..GuildPolicy::default()
        };
        assert_eq!(policy.timeout_duration(), Duration::from_secs(180));
    }

    #[test]
    fn bypass_matches_user_or_role() {
        let mut policy = GuildPolicy::default();
        policy.bypass_user_ids.insert(42);
        policy.bypass_role_ids.insert(7);

        assert!(policy.is_bypassed(42, &[]));
        assert!(policy.is_bypassed(1, &[3, 7]));
        assert!(!policy.is_bypassed(1, &[3, 8]));
    }

    #[test]
    fn link_whitelist_is_case_insensitive() {
        let mut policy = GuildPolicy::default();
        policy.link_whitelist.insert("Test.com".to_string());

        assert!(policy.whitelists_link("check WWW.TEST.COM please"));
        assert!(!policy.whitelists_link("check www.other.org please"));
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let policy: GuildPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, GuildPolicy::default());

        let policy: GuildPolicy =
            serde_json::from_str(r#"{"anti_link": false, "timeout_minutes": 5}"#).unwrap();
        assert!(!policy.anti_link);
        assert_eq!(policy.timeout_minutes, 5);
        assert_eq!(policy.spam, SpamRule::default());
    }

    #[test]
    fn raid_action_round_trips_lowercase() {
        assert_eq!(serde_json::to_string(&RaidAction::Kick).unwrap(), r#""kick""#);
        let action: RaidAction = serde_json::from_str(r#""timeout""#).unwrap();
        assert_eq!(action, RaidAction::Timeout);
    }

    #[test]
    fn protect_feature_parses_case_insensitively() {
        assert_eq!("antiLink".parse::<ProtectFeature>().unwrap(), ProtectFeature::AntiLink);
        assert_eq!("ANTIBOT".parse::<ProtectFeature>().unwrap(), ProtectFeature::AntiBot);
        assert!("antispeed".parse::<ProtectFeature>().is_err());
    }
}
