//! Almoner - donation batch upload and rollback service
//!
//! This library provides the core functionality for the Almoner service.
//! It exposes all modules for testing purposes.

pub mod batch;
pub mod entities;
pub mod errors;
pub mod rollback;
pub mod rows;
pub mod settings;
pub mod storage;
pub mod tracker;
pub mod web;
