// Abuse detector - screens inbound events against per-guild policy.
//
// Composes the two sliding-window counters (message flood, join flood) with
// the link filter and the automated-account check. Pure decisions: callers
// apply the returned verdict through the platform API.

use super::moderation_models::{AbuseEvent, PunitiveAction, TriggeredRule, Verdict};
use super::sliding_window::SlidingWindowCounter;
use crate::core::policy::{PolicyError, PolicyService, PolicyStore, RaidAction};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Minimum age before the periodic sweep may drop a window entry. Keys whose
/// configured window is longer are trimmed against that window instead.
const SWEEP_HORIZON: Duration = Duration::from_secs(15 * 60);

const LINK_MARKERS: [&str; 5] = [
    "http://",
    "https://",
    "www.",
    "discord.gg/",
    "discord.com/invite/",
];

/// True when the text carries a bare URL, a `www.` host or an invite link.
/// Case-insensitive substring test, no word boundaries.
pub fn contains_link(text: &str) -> bool {
    let lowered = text.to_lowercase();
    LINK_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Screens messages and joins, returning a [`Verdict`] per event.
///
/// Each counter sits behind its own mutex; the policy read happens before
/// the lock is taken and the lock is never held across an await.
pub struct AbuseDetector<S: PolicyStore> {
    policies: Arc<PolicyService<S>>,
    message_windows: Mutex<SlidingWindowCounter<(u64, u64)>>,
    join_windows: Mutex<SlidingWindowCounter<u64>>,
}

impl<S: PolicyStore> AbuseDetector<S> {
    pub fn new(policies: Arc<PolicyService<S>>) -> Self {
        Self {
            policies,
            message_windows: Mutex::new(SlidingWindowCounter::new()),
            join_windows: Mutex::new(SlidingWindowCounter::new()),
        }
    }

    /// Screens one inbound event and returns the action to take, if any.
    pub async fn record(&self, event: &AbuseEvent, now: Instant) -> Result<Verdict, PolicyError> {
        match event {
            AbuseEvent::MessageSent {
                guild_id,
                author_id,
                text,
                author_is_privileged,
                author_role_ids,
            } => {
                self.screen_message(
                    *guild_id,
                    *author_id,
                    text,
                    *author_is_privileged,
                    author_role_ids,
                    now,
                )
                .await
            }
            AbuseEvent::MemberJoined {
                guild_id,
                member_id,
                is_automated_account,
            } => {
                self.screen_join(*guild_id, *member_id, *is_automated_account, now)
                    .await
            }
        }
    }

    /// Drops window entries past the sweep horizon and forgets empty keys.
    /// Returns the remaining (message, join) key counts.
    pub async fn sweep_idle(&self, now: Instant) -> (usize, usize) {
        let message_keys = {
            let mut windows = self.message_windows.lock().await;
            windows.sweep(now, SWEEP_HORIZON);
            windows.tracked_keys()
        };
        let join_keys = {
            let mut windows = self.join_windows.lock().await;
            windows.sweep(now, SWEEP_HORIZON);
            windows.tracked_keys()
        };
        (message_keys, join_keys)
    }

    async fn screen_message(
        &self,
        guild_id: u64,
        author_id: u64,
        text: &str,
        author_is_privileged: bool,
        author_role_ids: &[u64],
        now: Instant,
    ) -> Result<Verdict, PolicyError> {
        let policy = self.policies.get(guild_id).await?;

        // Moderators and bypass-listed identities skip the message checks.
        if author_is_privileged || policy.is_bypassed(author_id, author_role_ids) {
            return Ok(Verdict::Allow);
        }

        if policy.anti_link && contains_link(text) && !policy.whitelists_link(text) {
            tracing::debug!(guild_id, author_id, "link filter matched");
            return Ok(Verdict::Punish {
                rule: TriggeredRule::LinkFilter,
                action: PunitiveAction::DeleteAndWarn,
            });
        }

        if policy.anti_spam {
            let window = Duration::from_secs(policy.spam.window_secs);
            let count = self
                .message_windows
                .lock()
                .await
                .record((guild_id, author_id), now, window);
            if count >= policy.spam.max_msgs as usize {
                // The counter is not reset: every message in a still-full
                // window re-triggers, and the platform timeout is idempotent.
                tracing::warn!(guild_id, author_id, count, "message flood threshold crossed");
                return Ok(Verdict::Punish {
                    rule: TriggeredRule::MessageFlood,
                    action: PunitiveAction::Timeout(policy.timeout_duration()),
                });
            }
        }

        Ok(Verdict::Allow)
    }

    async fn screen_join(
        &self,
        guild_id: u64,
        member_id: u64,
        is_automated_account: bool,
        now: Instant,
    ) -> Result<Verdict, PolicyError> {
        let policy = self.policies.get(guild_id).await?;

        // The join lands in the window before any verdict, so a kicked bot
        // still counts toward the flood threshold.
        let window = Duration::from_secs(policy.raid.window_secs);
        let joins = self.join_windows.lock().await.record(guild_id, now, window);

        if policy.anti_bot && is_automated_account {
            tracing::warn!(guild_id, member_id, "automated account joined");
            return Ok(Verdict::Punish {
                rule: TriggeredRule::AutomatedAccount,
                action: PunitiveAction::Kick,
            });
        }

        if policy.anti_raid && joins >= policy.raid.join_limit as usize {
            tracing::warn!(guild_id, member_id, joins, "join flood threshold crossed");
            let action = match policy.raid.action {
                RaidAction::Timeout => PunitiveAction::Timeout(policy.timeout_duration()),
                RaidAction::Kick => PunitiveAction::Kick,
            };
            return Ok(Verdict::Punish {
                rule: TriggeredRule::JoinFlood,
                action,
            });
        }

        Ok(Verdict::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::{GuildPolicy, StoreError};
    use async_trait::async_trait;
    use dashmap::DashMap;

    struct MockStore {
        policies: DashMap<u64, GuildPolicy>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                policies: DashMap::new(),
            }
        }

        fn with_policy(guild_id: u64, policy: GuildPolicy) -> Self {
            let store = Self::new();
            store.policies.insert(guild_id, policy);
            store
        }
    }

    #[async_trait]
    impl PolicyStore for MockStore {
        async fn load(&self, guild_id: u64) -> Result<Option<GuildPolicy>, StoreError> {
            Ok(self.policies.get(&guild_id).map(|entry| entry.clone()))
        }

        async fn save(&self, guild_id: u64, policy: GuildPolicy) -> Result<(), StoreError> {
            self.policies.insert(guild_id, policy);
            Ok(())
        }
    }

    const GUILD: u64 = 100;

    fn detector(store: MockStore) -> AbuseDetector<MockStore> {
        AbuseDetector::new(Arc::new(PolicyService::new(store)))
    }

    fn message(author_id: u64, text: &str) -> AbuseEvent {
        AbuseEvent::MessageSent {
            guild_id: GUILD,
            author_id,
            text: text.to_string(),
            author_is_privileged: false,
            author_role_ids: Vec::new(),
        }
    }

    fn join(member_id: u64, is_automated_account: bool) -> AbuseEvent {
        AbuseEvent::MemberJoined {
            guild_id: GUILD,
            member_id,
            is_automated_account,
        }
    }

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn link_markers_are_detected() {
        assert!(contains_link("visit http://example.com now"));
        assert!(contains_link("HTTPS://EXAMPLE.COM"));
        assert!(contains_link("check www.test.com"));
        assert!(contains_link("join discord.gg/abc"));
        assert!(contains_link("or Discord.com/invite/abc"));
        assert!(!contains_link("hello world"));
        assert!(!contains_link("wwwdot nothing"));
    }

    #[tokio::test]
    async fn sixth_message_in_window_triggers_timeout() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        for t in 0..5 {
            let verdict = detector.record(&message(1, "hi"), at(base, t)).await.unwrap();
            assert!(verdict.is_allow());
        }

        let verdict = detector.record(&message(1, "hi"), at(base, 5)).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Punish {
                rule: TriggeredRule::MessageFlood,
                action: PunitiveAction::Timeout(Duration::from_secs(600)),
            }
        );
    }

    #[tokio::test]
    async fn saturated_window_retriggers_on_next_message() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        for t in 0..=5 {
            detector.record(&message(1, "hi"), at(base, t)).await.unwrap();
        }

        // t=6 drops only the t=0 entry; the window is still full.
        let verdict = detector.record(&message(1, "hi"), at(base, 6)).await.unwrap();
        assert!(matches!(
            verdict,
            Verdict::Punish {
                rule: TriggeredRule::MessageFlood,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn slow_senders_are_never_punished() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        for i in 0..20 {
            let verdict = detector
                .record(&message(1, "hi"), at(base, i * 6))
                .await
                .unwrap();
            assert!(verdict.is_allow());
        }
    }

    #[tokio::test]
    async fn flood_windows_are_per_author() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        for t in 0..5 {
            detector.record(&message(1, "hi"), at(base, t)).await.unwrap();
            detector.record(&message(2, "yo"), at(base, t)).await.unwrap();
        }

        // Each author is one short of the threshold.
        assert!(detector
            .record(&message(3, "new"), at(base, 5))
            .await
            .unwrap()
            .is_allow());
    }

    #[tokio::test]
    async fn privileged_author_skips_message_checks() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        for t in 0..20 {
            let event = AbuseEvent::MessageSent {
                guild_id: GUILD,
                author_id: 1,
                text: "spam www.test.com".to_string(),
                author_is_privileged: true,
                author_role_ids: Vec::new(),
            };
            assert!(detector.record(&event, at(base, t)).await.unwrap().is_allow());
        }
    }

    #[tokio::test]
    async fn bypass_user_skips_message_checks() {
        let mut policy = GuildPolicy::default();
        policy.bypass_user_ids.insert(1);
        let detector = detector(MockStore::with_policy(GUILD, policy));

        let verdict = detector
            .record(&message(1, "check www.test.com"), Instant::now())
            .await
            .unwrap();
        assert!(verdict.is_allow());
    }

    #[tokio::test]
    async fn bypass_role_skips_message_checks() {
        let mut policy = GuildPolicy::default();
        policy.bypass_role_ids.insert(55);
        let detector = detector(MockStore::with_policy(GUILD, policy));

        let event = AbuseEvent::MessageSent {
            guild_id: GUILD,
            author_id: 1,
            text: "check www.test.com".to_string(),
            author_is_privileged: false,
            author_role_ids: vec![54, 55],
        };
        assert!(detector.record(&event, Instant::now()).await.unwrap().is_allow());
    }

    #[tokio::test]
    async fn link_message_is_deleted_and_warned() {
        let detector = detector(MockStore::new());

        let verdict = detector
            .record(&message(1, "check www.test.com"), Instant::now())
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Punish {
                rule: TriggeredRule::LinkFilter,
                action: PunitiveAction::DeleteAndWarn,
            }
        );
    }

    #[tokio::test]
    async fn whitelisted_link_is_allowed() {
        let mut policy = GuildPolicy::default();
        policy.link_whitelist.insert("test.com".to_string());
        let detector = detector(MockStore::with_policy(GUILD, policy));

        let verdict = detector
            .record(&message(1, "check www.test.com"), Instant::now())
            .await
            .unwrap();
        assert!(verdict.is_allow());
    }

    #[tokio::test]
    async fn link_verdict_precedes_flood_counting() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        // Ten rapid link messages: every one is a link deletion, never a
        // flood timeout, because the link branch returns first.
        for t in 0..10 {
            let verdict = detector
                .record(&message(1, "spam discord.gg/x"), at(base, t))
                .await
                .unwrap();
            assert!(matches!(
                verdict,
                Verdict::Punish {
                    rule: TriggeredRule::LinkFilter,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn link_filter_off_lets_links_through() {
        let policy = GuildPolicy {
            anti_link: false,
            ..GuildPolicy::default()
        };
        let detector = detector(MockStore::with_policy(GUILD, policy));

        let verdict = detector
            .record(&message(1, "check www.test.com"), Instant::now())
            .await
            .unwrap();
        assert!(verdict.is_allow());
    }

    #[tokio::test]
    async fn sixth_join_in_window_is_timed_out() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        for i in 0..5 {
            let verdict = detector.record(&join(i, false), at(base, i)).await.unwrap();
            assert!(verdict.is_allow());
        }

        let verdict = detector.record(&join(6, false), at(base, 5)).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Punish {
                rule: TriggeredRule::JoinFlood,
                action: PunitiveAction::Timeout(Duration::from_secs(600)),
            }
        );
    }

    #[tokio::test]
    async fn raid_action_kick_is_respected() {
        let mut policy = GuildPolicy::default();
        policy.raid.action = RaidAction::Kick;
        let detector = detector(MockStore::with_policy(GUILD, policy));
        let base = Instant::now();

        for i in 0..5 {
            detector.record(&join(i, false), at(base, i)).await.unwrap();
        }

        let verdict = detector.record(&join(6, false), at(base, 5)).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Punish {
                rule: TriggeredRule::JoinFlood,
                action: PunitiveAction::Kick,
            }
        );
    }

    #[tokio::test]
    async fn spaced_joins_never_trigger() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        for i in 0..20u64 {
            let verdict = detector
                .record(&join(i, false), at(base, i * 10))
                .await
                .unwrap();
            assert!(verdict.is_allow());
        }
    }

    #[tokio::test]
    async fn bot_join_is_kicked_before_raid_evaluation() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        for i in 0..5 {
            detector.record(&join(i, false), at(base, i)).await.unwrap();
        }

        // Sixth join saturates the window, but the automated-account rule
        // wins.
        let verdict = detector.record(&join(6, true), at(base, 5)).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Punish {
                rule: TriggeredRule::AutomatedAccount,
                action: PunitiveAction::Kick,
            }
        );
    }

    #[tokio::test]
    async fn kicked_bots_still_count_toward_join_flood() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        for i in 0..5 {
            let verdict = detector.record(&join(i, true), at(base, i)).await.unwrap();
            assert!(matches!(
                verdict,
                Verdict::Punish {
                    rule: TriggeredRule::AutomatedAccount,
                    ..
                }
            ));
        }

        // The sixth joiner is human, and the five kicked bots already filled
        // the window.
        let verdict = detector.record(&join(6, false), at(base, 5)).await.unwrap();
        assert!(matches!(
            verdict,
            Verdict::Punish {
                rule: TriggeredRule::JoinFlood,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn anti_raid_off_allows_join_floods() {
        let policy = GuildPolicy {
            anti_raid: false,
            anti_bot: false,
            ..GuildPolicy::default()
        };
        let detector = detector(MockStore::with_policy(GUILD, policy));
        let base = Instant::now();

        for i in 0..10 {
            let verdict = detector.record(&join(i, false), at(base, i)).await.unwrap();
            assert!(verdict.is_allow());
        }
    }

    #[tokio::test]
    async fn first_event_materializes_policy() {
        let detector = detector(MockStore::new());

        detector
            .record(&message(1, "hello"), Instant::now())
            .await
            .unwrap();

        let stored = detector.policies.get(GUILD).await.unwrap();
        assert_eq!(stored, GuildPolicy::default());
    }

    #[tokio::test]
    async fn sweep_forgets_idle_keys() {
        let detector = detector(MockStore::new());
        let base = Instant::now();

        detector.record(&message(1, "hi"), base).await.unwrap();
        detector.record(&join(2, false), base).await.unwrap();

        let (messages, joins) = detector.sweep_idle(at(base, 1)).await;
        assert_eq!((messages, joins), (1, 1));

        let (messages, joins) = detector.sweep_idle(at(base, 3600)).await;
        assert_eq!((messages, joins), (0, 0));
    }

    #[tokio::test]
    async fn long_spam_window_survives_idle_sweep() {
        let mut policy = GuildPolicy::default();
        policy.spam.window_secs = 1800;
        policy.spam.max_msgs = 3;
        let detector = detector(MockStore::with_policy(GUILD, policy));
        let base = Instant::now();

        detector.record(&message(1, "hi"), at(base, 0)).await.unwrap();
        detector.sweep_idle(at(base, 960)).await;
        detector.record(&message(1, "hi"), at(base, 961)).await.unwrap();

        // Third message inside the 30-minute window crosses the threshold;
        // the sweep must not have eaten the first one.
        let verdict = detector.record(&message(1, "hi"), at(base, 962)).await.unwrap();
        assert!(matches!(
            verdict,
            Verdict::Punish {
                rule: TriggeredRule::MessageFlood,
                ..
            }
        ));
    }
}
