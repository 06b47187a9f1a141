//! # whereisit
//!
//! A self-hosted inventory tracker. Physical storage is modeled as a
//! three-level hierarchy (storage units hold labeled boxes, boxes hold
//! items) backed by a single SQLite database.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐
//! │    CLI    │   │   HTTP   │──▶ photos / QR images
//! │(whereisit)│   │  (axum)  │
//! └─────┬─────┘   └────┬─────┘
//!       │              │
//!       ▼              ▼
//! ┌─────────────────────────┐   ┌──────────┐
//! │ Store (+ search, patch, │──▶│  SQLite  │
//! │       slug policy)      │   └──────────┘
//! └─────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! whereisit init                # create database
//! whereisit serve               # start HTTP server
//! whereisit search "drill"      # search from the terminal
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Units, boxes, items and their detail views |
//! | [`store`] | Entity store: CRUD with integrity rules |
//! | [`search`] | Substring search over boxes and items |
//! | [`patch`] | Sparse partial updates |
//! | [`slug`] | Box slug generation and validation |
//! | [`error`] | Store error taxonomy |
//! | [`photos`] | Photo normalization and storage |
//! | [`qr`] | Code-image rendering |
//! | [`server`] | REST HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod get;
pub mod migrate;
pub mod models;
pub mod patch;
pub mod photos;
pub mod qr;
pub mod search;
pub mod server;
pub mod slug;
pub mod store;
