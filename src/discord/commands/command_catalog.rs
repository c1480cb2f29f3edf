// Discord commands module.
// Each feature gets its own command file.

pub mod giveaway;

pub mod help;

pub mod massrole;

pub mod moderation;

pub mod tickets;

pub mod utility;
