// Ticket domain logic - channel-name identity, label sanitization and the
// close lifecycle guard.
//
// A ticket has no stored record: its identity lives in the channel name
// (`ticket-<ownerId>[-<label>]`), so ownership checks are pure functions of
// name + caller.

use dashmap::DashSet;
use serde::Deserialize;

pub const TICKET_PREFIX: &str = "ticket-";

const LABEL_MAX_LEN: usize = 40;
const CHANNEL_NAME_MAX_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One selectable ticket kind, routed under its own channel category.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketCategory {
    pub key: String,
    pub label: String,
    pub emoji: String,
    pub category_channel_id: u64,
}

/// The ticket kinds offered by the panel menu, in configured order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct TicketCatalog {
    categories: Vec<TicketCategory>,
}

impl TicketCatalog {
    /// Reads the catalog from a JSON array file.
    pub fn load(path: &str) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn find(&self, key: &str) -> Option<&TicketCategory> {
        self.categories.iter().find(|category| category.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TicketCategory> {
        self.categories.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Identity encoded in a ticket channel's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketIdentity {
    pub owner_id: u64,
    pub label: Option<String>,
}

/// Parses `ticket-<ownerId>[-<label>]`. Anything else, including a
/// non-numeric owner segment, is not a ticket.
pub fn parse_ticket_identity(channel_name: &str) -> Option<TicketIdentity> {
    let rest = channel_name.strip_prefix(TICKET_PREFIX)?;
    let (owner_segment, label) = match rest.split_once('-') {
        Some((owner, label)) => (owner, Some(label.to_string())),
        None => (rest, None),
    };
    let owner_id = owner_segment.parse().ok()?;
    Some(TicketIdentity { owner_id, label })
}

/// Lowercases, joins whitespace-separated words with hyphens, strips
/// everything outside `[a-z0-9-]` and caps the result at 40 characters.
pub fn sanitize_label(raw: &str) -> String {
    let mut label: String = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    label.truncate(LABEL_MAX_LEN);
    label
}

/// Assembles a ticket channel name, capped at the platform's 100-character
/// channel-name limit.
pub fn ticket_channel_name(owner_id: u64, label: Option<&str>) -> String {
    let mut name = match label {
        Some(label) if !label.is_empty() => format!("{}{}-{}", TICKET_PREFIX, owner_id, label),
        _ => format!("{}{}", TICKET_PREFIX, owner_id),
    };
    name.truncate(CHANNEL_NAME_MAX_LEN);
    name
}

/// True when `caller` may rename or close the ticket.
pub fn can_manage_ticket(
    identity: &TicketIdentity,
    caller_id: u64,
    caller_is_moderator: bool,
) -> bool {
    identity.owner_id == caller_id || caller_is_moderator
}

/// Ticket runtime state: the category catalog plus the channels whose
/// delayed deletion is already scheduled.
pub struct TicketService {
    catalog: TicketCatalog,
    pending_close: DashSet<u64>,
}

impl TicketService {
    pub fn new(catalog: TicketCatalog) -> Self {
        Self {
            catalog,
            pending_close: DashSet::new(),
        }
    }

    pub fn catalog(&self) -> &TicketCatalog {
        &self.catalog
    }

    pub fn category(&self, key: &str) -> Option<&TicketCategory> {
        self.catalog.find(key)
    }

    /// Marks the channel as closing. Returns false when a close is already
    /// pending for it.
    pub fn begin_close(&self, channel_id: u64) -> bool {
        self.pending_close.insert(channel_id)
    }

    /// Clears the pending mark, e.g. after a failed delete.
    pub fn finish_close(&self, channel_id: u64) {
        self.pending_close.remove(&channel_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_ticket_name() {
        assert_eq!(
            parse_ticket_identity("ticket-123456789"),
            Some(TicketIdentity {
                owner_id: 123456789,
                label: None,
            })
        );
    }

    #[test]
    fn parses_labelled_ticket_name() {
        assert_eq!(
            parse_ticket_identity("ticket-42-refund-request"),
            Some(TicketIdentity {
                owner_id: 42,
                label: Some("refund-request".to_string()),
            })
        );
    }

    #[test]
    fn rejects_non_ticket_names() {
        assert_eq!(parse_ticket_identity("general"), None);
        assert_eq!(parse_ticket_identity("tickets-42"), None);
        assert_eq!(parse_ticket_identity("ticket-"), None);
        assert_eq!(parse_ticket_identity("ticket-abc"), None);
        assert_eq!(parse_ticket_identity("ticket-abc-help"), None);
    }

    #[test]
    fn sanitizes_labels() {
        assert_eq!(sanitize_label("New Name!!"), "new-name");
        assert_eq!(sanitize_label("  Multi   word   label "), "multi-word-label");
        assert_eq!(sanitize_label("Déjà vu"), "dj-vu");
        assert_eq!(sanitize_label("___"), "");
    }

    #[test]
    fn long_labels_truncate_to_forty() {
        let label = sanitize_label(&"a".repeat(80));
        assert_eq!(label.len(), 40);
        assert_eq!(label, "a".repeat(40));
    }

    #[test]
    fn channel_names_cap_at_hundred() {
        let name = ticket_channel_name(123456789, Some(&"b".repeat(95)));
        assert_eq!(name.len(), 100);
        assert!(name.starts_with("ticket-123456789-"));
    }

    #[test]
    fn empty_label_builds_plain_name() {
        assert_eq!(ticket_channel_name(42, None), "ticket-42");
        assert_eq!(ticket_channel_name(42, Some("")), "ticket-42");
        assert_eq!(ticket_channel_name(42, Some("help")), "ticket-42-help");
    }

    #[test]
    fn rename_assembly_round_trips_through_parse() {
        let name = ticket_channel_name(42, Some(&sanitize_label("New Name!!")));
        assert_eq!(name, "ticket-42-new-name");
        assert_eq!(
            parse_ticket_identity(&name),
            Some(TicketIdentity {
                owner_id: 42,
                label: Some("new-name".to_string()),
            })
        );
    }

    #[test]
    fn owner_or_moderator_manages_ticket() {
        let identity = TicketIdentity {
            owner_id: 42,
            label: None,
        };

        assert!(can_manage_ticket(&identity, 42, false));
        assert!(can_manage_ticket(&identity, 1, true));
        assert!(!can_manage_ticket(&identity, 1, false));
    }

    #[test]
    fn close_guard_is_idempotent() {
        let service = TicketService::new(TicketCatalog::default());

        assert!(service.begin_close(7));
        assert!(!service.begin_close(7));

        service.finish_close(7);
        assert!(service.begin_close(7));
    }

    #[test]
    fn catalog_parses_and_finds_categories() {
        let raw = r#"[
            {"key": "billing", "label": "Billing", "emoji": "💳", "category_channel_id": 111},
            {"key": "support", "label": "Support", "emoji": "🛠️", "category_channel_id": 222}
        ]"#;
        let catalog: TicketCatalog = serde_json::from_str(raw).unwrap();

        assert!(!catalog.is_empty());
        assert_eq!(catalog.iter().count(), 2);
        let billing = catalog.find("billing").unwrap();
        assert_eq!(billing.label, "Billing");
        assert_eq!(billing.category_channel_id, 111);
        assert!(catalog.find("missing").is_none());
    }
}
