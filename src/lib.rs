//! Migration Sniper - Adaptive trading pipeline for migrated memecoins
//!
//! Scores tokens that migrated off their launch platform, paper-trades the
//! best of them with tiered risk parameters and periodically re-tunes its
//! own configuration from realized results.
//!
//! # Modules
//!
//! - `domain`: Core types and rules (candidates, analyses, trades, configuration)
//! - `scoring`: Factor scorers and the composite scorer
//! - `ports`: Trait abstractions (stores, queue, prices, execution, oracle)
//! - `adapters`: External implementations (files, Jupiter, paper fills, CLI)
//! - `config`: Runtime configuration loading and validation
//! - `application`: Analyzer, trader, monitor, optimizer and the pipeline loop

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod scoring;
