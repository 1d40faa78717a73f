//! fanmon - Linux fanotify file access monitoring library
//!
//! This library exposes the event channel (init, mark, pull, respond),
//! configuration layering and the polling loop used by the `fanmon` binary.

#![deny(unsafe_code)]

#[cfg(not(target_os = "linux"))]
compile_error!("fanmon requires Linux: fanotify is a Linux-only kernel interface");

pub mod cli;
pub mod config;
pub mod constants;
pub mod fanotify;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod output;
