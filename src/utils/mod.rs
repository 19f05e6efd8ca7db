//! Utility functions for the scoring core.
//!
//! This module provides helpers for loading the symbol inventories the models
//! are indexed by.

pub mod dict;

pub use dict::{indexer_from_dict, read_character_dict};
