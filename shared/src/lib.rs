//! Shared pieces of the recipe services: configuration, error types, DTOs,
//! the hosted-model client, the ingredient detector and recipe generator,
//! and data access against the hosted backend.

pub mod anthropic_client;
pub mod catalog;
pub mod config;
pub mod detector;
pub mod dto;
pub mod error;
pub mod favorites;
pub mod generator;
pub mod images;
pub mod reply;
pub mod store;
pub mod supabase;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
