pub mod config;
pub mod headline;
pub mod notification;
pub mod player;
pub mod role;
pub mod round;
pub mod session;
pub mod vote;
