// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "policy/mod.rs"]
pub mod policy;

#[path = "tickets/ticket_service.rs"]
pub mod tickets;
