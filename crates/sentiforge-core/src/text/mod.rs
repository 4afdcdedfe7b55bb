pub mod lookup;
pub mod tokenizer;
pub mod vocabulary;

pub use lookup::{LookupTable, TokenId, PAD_ID, SOS_ID, UNK_ID};
pub use tokenizer::Tokenizer;
pub use vocabulary::{Vocabulary, VocabularyBuilder, WordCount, DEFAULT_MAX_BATCHES};
