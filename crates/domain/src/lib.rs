//! Shared types for tutorgate: tenant identity, resolved model access,
//! provider-agnostic chat messages, configuration, errors and trace events.

pub mod access;
pub mod config;
pub mod error;
pub mod message;
pub mod tenant;
pub mod trace;
