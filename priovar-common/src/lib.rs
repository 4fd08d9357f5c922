//! Common utilities shared across PrioVar crates.
//!
//! This crate holds the pieces every other crate in the workspace needs and
//! nothing domain specific, so it stays cheap to depend on.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`time`]: Parsing of backend timestamps and the table's date format
//!
//! # Examples
//!
//! ```rust
//! use priovar_common::time::{format_date_time, parse_timestamp};
//!
//! let ts = parse_timestamp("2024-03-05T14:07:00").unwrap();
//! assert_eq!(format_date_time(&ts), "05 Mar 2024 14:07");
//! ```
pub mod observability;
pub mod time;

/// Name used for log files, the data directory and the session file.
pub const APP_NAME: &str = "priovar";
