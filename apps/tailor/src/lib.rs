//! Tailor — turns a job posting and a career profile into a tailored,
//! typeset resume through a cached, checkpointed generation pipeline.
//!
//! The core pieces: `cache` (fingerprints + durable first-writer-wins
//! store), `pipeline` (the fixed stage sequence with checkpoints),
//! `render` (markup-only and compiled backends over one shared transform),
//! and `rundir` (versioned per-invocation output directories with an
//! atomic "latest" pointer).

pub mod cache;
pub mod config;
pub mod errors;
pub mod llm_client;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod rundir;
pub mod upload;
