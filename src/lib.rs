//! # WikiForge
//!
//! An LLM-backed article generation pipeline for interview-prep wiki
//! content.
//!
//! Articles start life as metadata stubs (title, taxonomy, category,
//! level, tags) in SQLite. A two-stage pipeline fills them: a research
//! model produces a working document, then a writer model produces the
//! article body, an excerpt, and five related-article suggestions.
//! Suggestions are resolved against existing articles by a fuzzy matcher;
//! unmatched ones become new stubs, so the wiki grows organically from a
//! small seed set.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────┐
//! │  Stubs   │──▶│   Pipeline    │──▶│  SQLite  │
//! │ (seeded) │   │ research+write│   │ articles │
//! └──────────┘   └───────────────┘   └────┬─────┘
//!                                         │
//!                     ┌───────────────────┤
//!                     ▼                   ▼
//!                ┌──────────┐       ┌──────────┐
//!                │   CLI    │       │   HTTP   │
//!                │  (wiki)  │       │  (JSON)  │
//!                └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wiki init                     # create database
//! wiki populate                 # seed and generate the starter set
//! wiki generate "Hash Tables"   # generate one article on demand
//! wiki serve                    # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`slug`] | URL slug derivation |
//! | [`prompt`] | Research and article prompt templates |
//! | [`provider`] | LLM completion clients (OpenAI, Anthropic) |
//! | [`response`] | Writer response parsing (marker protocol) |
//! | [`matcher`] | Fuzzy deduplication of article suggestions |
//! | [`generator`] | Pipeline orchestration |
//! | [`populate`] | Initial database population |
//! | [`server`] | HTTP read API with generate-on-read |
//! | [`store`] | Article storage over SQLite |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod maintenance;
pub mod matcher;
pub mod migrate;
pub mod models;
pub mod populate;
pub mod prompt;
pub mod provider;
pub mod response;
pub mod server;
pub mod slug;
pub mod stats;
pub mod store;
