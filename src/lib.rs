//! # DocVault
//!
//! A multi-tenant document vault with vector retrieval.
//!
//! DocVault ingests user documents (text, PDF, Office files, JSON), chunks
//! and embeds them, and stores one point per chunk in a vector store keyed
//! by tenant. On top of that it offers tenant-scoped similarity search,
//! ownership-checked metadata updates and deletes, and assembly of a
//! tenant's documents into a single character-budgeted context block.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────┐   ┌───────────────┐
//! │  Files    │──▶│    Pipeline       │──▶│ Vector store  │
//! │ txt/pdf/… │   │ Extract+Chunk     │   │ memory/Qdrant │
//! └───────────┘   │ +Embed            │   └──────┬────────┘
//!                 └──────────────────┘          │
//!                                  ┌────────────┤
//!                                  ▼            ▼
//!                            ┌──────────┐ ┌──────────┐
//!                            │  Search  │ │ Context  │
//!                            │ (tenant) │ │ assembly │
//!                            └──────────┘ └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dv init                            # create the collection
//! dv ingest ./docs --tenant alice    # bulk-load a folder
//! dv search "thermodynamics" --tenant alice
//! dv context --tenant alice          # assembled context block
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Text extraction per file type |
//! | [`chunk`] | Overlapping word-window chunking |
//! | [`embedding`] | Embedding gateway abstraction |
//! | [`store`] | Vector store trait and filters |
//! | [`store_memory`] | In-memory store backend |
//! | [`collection`] | Collection lifecycle |
//! | [`engine`] | Tenant-scoped retrieval engine |
//! | [`ingest`] | Folder and single-file ingestion |
//! | [`context`] | Budgeted context assembly |
//! | [`stats`] | Store-wide statistics |

pub mod chunk;
pub mod collection;
pub mod config;
pub mod context;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod stats;
pub mod store;
pub mod store_memory;
#[cfg(feature = "qdrant")]
pub mod store_qdrant;
