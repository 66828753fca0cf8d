//! Concord - a collaborative text CRDT built on a split-node RGA.
//!
//! # Quick Start
//!
//! ```
//! use concord::crdt::Text;
//! use concord::crdt::primitives::LamportClock;
//! use concord::crdt::primitives::TimeTicket;
//! use concord::key::KeyPair;
//!
//! // Create a replica identity and its clock
//! let user = KeyPair::generate();
//! let mut clock = LamportClock::new(user.actor);
//!
//! // Create a new document
//! let mut text = Text::new(TimeTicket::INITIAL);
//!
//! // Edit the document
//! text.edit_by_index(0, 0, "Hello, World!", clock.tick()).unwrap();
//! text.edit_by_index(5, 12, "", clock.tick()).unwrap();
//! assert_eq!(text.to_string(), "Hello!");
//! ```

pub mod crdt;
pub mod error;
pub mod key;
