//! Data-driven content for the stats engine.
//!
//! This crate provides loaders for RON/TOML data files:
//! - Global modifier tables (data-driven via RON)
//! - Engine configuration (data-driven via TOML)
//!
//! Loaders produce stats-core types directly; [`ContentFactory`] ties them to a
//! data directory and can build a populated [`stats_core::ModifierRegistry`].

pub mod loaders;

pub use loaders::{
    ConfigLoader, ContentFactory, LoadResult, ModifierEntry, ModifierTable, ModifierTableLoader,
};
