//! # Obscurity Grind
//!
//! Turns chunk plans into ground keys.
//!
//! ## Features
//!
//! - **Worker Pool**: N long-lived key-search sessions draining one shared queue
//! - **Process Sessions**: line protocol over a `grind_stream` subprocess
//! - **Local Sessions**: in-process secp256k1 search for low difficulties
//! - **Forge**: grind a stored block end to end and write its lockbox
//!
//! ## Example
//!
//! ```rust,ignore
//! use obscurity_grind::{GrindConfig, GrindPool, ProcessFactory, WorkerCommand};
//!
//! let command = WorkerCommand::locate(None)?;
//! let config = GrindConfig::new().workers(4);
//! let pool = GrindPool::new(ProcessFactory::new(command), config);
//!
//! let results = pool.grind(&plan).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod forge;
pub mod local;
pub mod pool;
pub mod process;

pub use config::{locate_binary, GrindConfig, WorkerCommand};
pub use forge::forge_lockbox;
pub use local::{search_blocking, LocalFactory, LocalSearcher};
pub use pool::GrindPool;
pub use process::{parse_response, ProcessFactory, ProcessSearcher};
