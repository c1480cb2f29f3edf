// Core moderation module - abuse detection business logic.
// Following the same pattern as the policy module.

pub mod abuse_detector;
pub mod moderation_models;
pub mod sliding_window;

pub use abuse_detector::*;
pub use moderation_models::*;
pub use sliding_window::*;
