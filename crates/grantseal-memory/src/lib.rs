//! In-memory storage adapter for grantseal tokens.
//!
//! This crate provides an in-memory implementation of the `TokenAdapter`
//! trait from `grantseal`, using papaya lock-free HashMap for concurrent
//! access. Records expire against an injectable clock.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use grantseal::TokenService;
//! use grantseal_memory::MemoryAdapterFactory;
//!
//! let factory = Arc::new(MemoryAdapterFactory::new());
//! let service = TokenService::new("https://op.example.com", factory.clone());
//! ```

pub mod factory;
pub mod storage;

pub use factory::MemoryAdapterFactory;
pub use storage::MemoryAdapter;
