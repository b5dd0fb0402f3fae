//! The graph adapter: a storage-agnostic trait over a labelled property
//! graph, plus the in-memory reference implementation every other
//! component and test runs against.
//!
//! ```text
//! [Loader] --Files/Chunks--> [KG builder] --Nodes/Relations--> GraphStore
//!                                                                  |
//!                                      [KG post-processor] --------+--> mentionedIn
//!                                                                  |
//!                                        [Leiden + community] <----+
//! ```

pub mod memory;
pub mod store;

pub use memory::InMemoryGraphStore;
pub use store::{EdgeDefinition, GraphStore};
