//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into registration and lineage use-cases.
//! - Keep CLI and host layers decoupled from storage details.

pub mod biobank_service;
