mod corpus;
mod text;

pub use corpus::{CorpusEntry, CorpusLoader, CorpusStats};
pub use text::TextLoader;
