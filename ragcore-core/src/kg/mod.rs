//! Knowledge-graph construction: per-chunk NER/RE extraction (`builder`)
//! and the post-processing pass that wires `mentionedIn` edges and
//! reweights nodes (`postprocessor`), grounded on
//! `KG_2_ConvertTextsToGraph.py`/`KG_3_ProcessKnowledgeGraph.py`.

pub mod builder;
pub mod json_repair;
pub mod postprocessor;

pub use builder::process_chunk;
pub use postprocessor::process as postprocess;
