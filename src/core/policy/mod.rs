// Core policy module - per-guild protection configuration.

pub mod policy_models;
pub mod policy_service;

pub use policy_models::*;
pub use policy_service::*;
