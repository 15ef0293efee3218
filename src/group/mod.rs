//! Group management capability.
//!
//! # Data Flow
//! ```text
//! "Group.<Method>" request
//!     → service.rs (typed handler registered on the Dispatcher)
//!     → GroupPlugin implementation (memory.rs or an embedder's own)
//!     → <Method>Response
//! ```
//!
//! Field names on the wire are PascalCase (`ID`, `Spec`, `Pretend`, ...).

pub mod memory;
pub mod service;
pub mod types;

pub use memory::{MemoryGroupPlugin, MAX_GROUP_SIZE};
pub use service::{register, GroupError, GroupPlugin, SERVICE};
pub use types::*;
