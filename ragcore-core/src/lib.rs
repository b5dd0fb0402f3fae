// RAG core library.
//
// Turns a directory of documents into a hierarchical knowledge graph
// (entities, relations, and a Leiden community hierarchy over them)
// and answers questions against it through four retrieval strategies.

pub mod chunker;
pub mod community;
pub mod config;
pub mod error;
pub mod graph;
pub mod kg;
pub mod leiden;
pub mod llm;
pub mod loader;
pub mod model;
pub mod pdf;
pub mod pipeline;
pub mod retrieval;
pub mod retry;
pub mod vector;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use llm::{EchoLlmClient, LlmClient};
pub use model::{Chunk, CommunityEdge, CommunityNode, File, MentionedIn, Node, Relation, RetrievalRecord};
pub use pipeline::{index, retrieve, IndexStats, RetrievalParams, Strategy};
