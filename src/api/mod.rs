//! REST client module for the tour backend.
//!
//! This module provides the `ApiClient` for communicating with the managed
//! tour backend to fetch roster, night configuration, selections,
//! announcement, and document data.
//!
//! The API uses JWT bearer token authentication obtained through the
//! `/auth/login` endpoint.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
