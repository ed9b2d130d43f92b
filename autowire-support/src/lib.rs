//! # Autowire Support
//!
//! Shared utilities for the autowire DI framework.
//!
//! This crate provides:
//! - Text rendering for error messages
//! - Identifier helpers shared between autowire crates

pub mod rendering;
