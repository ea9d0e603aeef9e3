pub mod knowledge;
pub mod search;

pub use knowledge::KnowledgeStore;
pub use search::grep;
