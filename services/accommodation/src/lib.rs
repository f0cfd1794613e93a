//! Accommodation service for the Reva Utsav portal
//!
//! Participants submit a booking request; administrators assign each
//! request to a property without ever overbooking it, and volunteers at
//! the desk check participants in.

pub mod compatibility;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod queue;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod settings;
pub mod state;
