// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "policy/json_store.rs"]
pub mod policy;
