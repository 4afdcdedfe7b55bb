//! # Lookup Table
//!
//! Maps words to integer ids.
//!
//! Id layout:
//!
//! | ids                      | meaning                                  |
//! |--------------------------|------------------------------------------|
//! | `0`                      | padding                                  |
//! | `1`                      | start of sequence                        |
//! | `2 .. 2 + B`             | out-of-vocabulary buckets (`2` = unknown) |
//! | `2 + B .. 2 + B + V`     | vocabulary words, most frequent first    |
//!
//! `B` is `max(num_oov_buckets, 1)`: there is always at least one bucket, so
//! an unknown word never collides with a vocabulary id. Unknown words are
//! assigned a bucket by 64-bit FNV-1a over their UTF-8 bytes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::text::vocabulary::Vocabulary;

/// Token id type used throughout the encoded batches.
pub type TokenId = u32;

/// Padding id.
pub const PAD_ID: TokenId = 0;
/// Start-of-sequence id.
pub const SOS_ID: TokenId = 1;
/// First out-of-vocabulary bucket.
pub const UNK_ID: TokenId = 2;
/// Number of ids reserved before the OOV buckets.
pub const NUM_RESERVED: TokenId = 2;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Immutable word → id mapping.
///
/// Built once from a vocabulary and then shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTable {
    word_to_id: HashMap<String, TokenId>,
    id_to_word: Vec<String>,
    num_oov_buckets: u32,
}

impl LookupTable {
    /// Build the mapping for `vocabulary` with `num_oov_buckets` overflow
    /// buckets (`0` behaves like `1`).
    pub fn new(vocabulary: &Vocabulary, num_oov_buckets: u32) -> Self {
        let num_oov_buckets = num_oov_buckets.max(1);
        let first_word_id = NUM_RESERVED + num_oov_buckets;

        let id_to_word: Vec<String> = vocabulary.words().map(str::to_string).collect();
        let word_to_id = id_to_word
            .iter()
            .enumerate()
            .map(|(rank, word)| (word.clone(), first_word_id + rank as TokenId))
            .collect();

        tracing::debug!(
            vocabulary = id_to_word.len(),
            num_oov_buckets,
            "built lookup table"
        );

        Self {
            word_to_id,
            id_to_word,
            num_oov_buckets,
        }
    }

    /// Id of `word`; unknown words land in a hashed OOV bucket.
    pub fn lookup(&self, word: &str) -> TokenId {
        match self.word_to_id.get(word) {
            Some(&id) => id,
            None => self.oov_id(word),
        }
    }

    /// Look up every token of a sequence.
    pub fn lookup_all<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<TokenId> {
        tokens.iter().map(|t| self.lookup(t.as_ref())).collect()
    }

    /// Bucket id an unknown word maps to.
    pub fn oov_id(&self, word: &str) -> TokenId {
        let bucket = fnv1a(word.as_bytes()) % u64::from(self.num_oov_buckets);
        UNK_ID + bucket as TokenId
    }

    /// Returns `true` if `word` is part of the vocabulary.
    pub fn contains(&self, word: &str) -> bool {
        self.word_to_id.contains_key(word)
    }

    /// Returns `true` if `id` is one of the OOV bucket ids.
    pub fn is_oov(&self, id: TokenId) -> bool {
        (UNK_ID..self.first_word_id()).contains(&id)
    }

    /// Vocabulary word behind `id`, if it is a word id.
    pub fn word(&self, id: TokenId) -> Option<&str> {
        let rank = id.checked_sub(self.first_word_id())?;
        self.id_to_word.get(rank as usize).map(String::as_str)
    }

    /// Effective number of OOV buckets (at least one).
    pub fn num_oov_buckets(&self) -> u32 {
        self.num_oov_buckets
    }

    /// Number of vocabulary words.
    pub fn vocab_len(&self) -> usize {
        self.id_to_word.len()
    }

    /// Id of the most frequent vocabulary word.
    pub fn first_word_id(&self) -> TokenId {
        NUM_RESERVED + self.num_oov_buckets
    }

    /// Total number of distinct ids, i.e. the smallest valid embedding input size.
    pub fn id_space(&self) -> usize {
        self.first_word_id() as usize + self.id_to_word.len()
    }
}
