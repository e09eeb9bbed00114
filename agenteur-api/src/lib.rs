//! # Agenteur API Server Library
//!
//! HTTP surface over the Agenteur credential, organization and invitation
//! core.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration management
//! - `error`: error envelope and HTTP status mapping
//! - `extract`: request extractors
//! - `middleware`: authentication, content-type and security header layers
//! - `response`: success envelope
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
