//! Building blocks of the replicated text.
//!
//! # Primitives
//!
//! ## Time
//! - `TimeTicket`: Lamport timestamp, totally ordered across replicas
//! - `LamportClock`: issues tickets for one actor
//!
//! ## IDs
//! - `NodeId`: run identifier `(created_at, offset)`
//! - `NodePos`: a position relative to a run identifier
//!
//! ## Trees
//! - `LlrbTree`: ordered map with floor lookup, used as the ID index
//! - `SplayTree`: weighted order-statistics tree, used as the position index
//!   and as the arena that owns every run

pub mod clock;
pub mod id;
pub mod llrb_tree;
pub mod splay_tree;
pub mod ticket;

// Re-exports for convenience
pub use clock::LamportClock;
pub use id::NodeId;
pub use id::NodePos;
pub use llrb_tree::LlrbTree;
pub use splay_tree::NodeIdx;
pub use splay_tree::SplayTree;
pub use splay_tree::Weighted;
pub use ticket::TimeTicket;
