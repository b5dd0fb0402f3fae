//! Builds the community hierarchy on top of the knowledge graph
//! (`builder`) and summarises it bottom-up (`summariser`), grounded on
//! `KG_4_InitLeidenCommunities.py`/`KG_5_CreateCommunitySummaries.py`.

pub mod builder;
pub mod summariser;

pub use builder::build;
pub use summariser::summarise;
