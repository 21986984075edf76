//! # Obscurity RPC
//!
//! JSON-RPC 1.0 client for a Bitcoin-style node, implementing
//! [`NodeRpc`](obscurity_core::traits::NodeRpc).
//!
//! ## Example
//!
//! ```rust,ignore
//! use obscurity_rpc::{RpcClient, RpcConfig};
//!
//! let client = RpcClient::new(RpcConfig::from_env())?;
//! let status = client.test_connection().await?;
//! println!("{} at height {}", status.chain, status.blocks);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod client;
mod config;

pub use client::RpcClient;
pub use config::RpcConfig;
