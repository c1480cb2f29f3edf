pub mod enforcer;
pub mod events;
