//! Utility functions for formatting and display.

pub mod format;

pub use format::{format_cost, format_phone, truncate_string};
