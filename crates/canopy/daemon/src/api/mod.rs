//! API layers exposed by the daemon.

pub mod rest;
