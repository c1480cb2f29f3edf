// Moderation domain models - events in, verdicts out.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer builds events from gateway payloads and converts
// verdicts to platform actions.

use std::fmt;
use std::time::Duration;

/// Inbound gateway occurrence screened by the detector.
#[derive(Debug, Clone)]
pub enum AbuseEvent {
    MessageSent {
        guild_id: u64,
        author_id: u64,
        text: String,
        /// Author holds a moderator-grade permission.
        author_is_privileged: bool,
        author_role_ids: Vec<u64>,
    },
    MemberJoined {
        guild_id: u64,
        member_id: u64,
        /// The platform flags this account as a bot.
        is_automated_account: bool,
    },
}

/// Which protection produced a punish verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggeredRule {
    LinkFilter,
    MessageFlood,
    JoinFlood,
    AutomatedAccount,
}

impl TriggeredRule {
    /// Audit reason attached to the platform action.
    pub fn reason(&self) -> &'static str {
        match self {
            TriggeredRule::LinkFilter => "Anti-link",
            TriggeredRule::MessageFlood => "Anti-spam",
            TriggeredRule::JoinFlood => "Anti-raid",
            TriggeredRule::AutomatedAccount => "Anti-bot",
        }
    }
}

impl fmt::Display for TriggeredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// What the detector wants done about the offending event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunitiveAction {
    /// Remove the message and warn the channel.
    DeleteAndWarn,
    /// Communication timeout for the given duration.
    Timeout(Duration),
    /// Remove the member from the guild.
    Kick,
}

/// Decision for one screened event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Punish {
        rule: TriggeredRule,
        action: PunitiveAction,
    },
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}
