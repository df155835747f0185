//! tunebot: an IRC bot that answers `mpc current`, `mpc next`,
//! `mpc previous` and `mpc playlist` in its channel with what the local
//! mpd server is playing.

pub mod config;
pub mod player;
pub mod session;
