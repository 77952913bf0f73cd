//! Courier job verification
//!
//! Job lifecycle store, verification handoff context, camera-driven marker
//! presence scanning and the two-channel proof-of-delivery verification
//! engine used by the courier web client.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
