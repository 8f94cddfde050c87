//! WordPiece tokenization through the Hugging Face `tokenizers` crate.
//!
//! The checkpoint's own `tokenizer.json` is loaded so token ids line up
//! with the pretrained embedding table. Every encoding is truncated and
//! padded to the same length.

use crate::error::{ModelError, ModelResult};
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

const PAD_TOKEN: &str = "[PAD]";

/// Token ids plus an attention mask, both `max_len` long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    pub mask: Vec<u32>,
}

pub struct BertTokenizer {
    inner: Tokenizer,
    max_len: usize,
}

impl std::fmt::Debug for BertTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertTokenizer")
            .field("vocab_size", &self.vocab_size())
            .field("max_len", &self.max_len)
            .finish()
    }
}

impl BertTokenizer {
    /// Load `tokenizer.json` and fix its output length to `max_len`.
    pub fn from_file(path: &Path, max_len: usize) -> ModelResult<Self> {
        let inner = Tokenizer::from_file(path)
            .map_err(|e| ModelError::Tokenizer(format!("failed to load {}: {}", path.display(), e)))?;
        Self::new(inner, max_len)
    }

    /// Configure truncation and fixed-length padding on a loaded tokenizer.
    pub fn new(mut inner: Tokenizer, max_len: usize) -> ModelResult<Self> {
        let pad_id = inner.token_to_id(PAD_TOKEN).unwrap_or(0);
        inner.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(max_len),
            pad_id,
            pad_token: PAD_TOKEN.to_string(),
            ..Default::default()
        }));
        inner
            .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        Ok(Self { inner, max_len })
    }

    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Vocabulary size including added special tokens.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    /// `[CLS] text [SEP]`, truncated and padded to `max_len`.
    pub fn encode(&self, text: &str) -> ModelResult<Encoding> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| ModelError::Tokenizer(format!("failed to encode {text:?}: {e}")))?;
        Ok(Encoding { ids: encoding.get_ids().to_vec(), mask: encoding.get_attention_mask().to_vec() })
    }
}

#[cfg(test)]
pub(crate) fn word_level_fixture(max_len: usize) -> BertTokenizer {
    use std::str::FromStr;
    let json = include_str!("../tests/fixtures/tokenizer.json");
    BertTokenizer::new(Tokenizer::from_str(json).unwrap(), max_len).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_come_from_the_vocab() {
        let tok = word_level_fixture(5);
        let enc = tok.encode("Happy sad").unwrap();
        assert_eq!(enc.ids, vec![1, 11, 12, 2, 0]);
        assert_eq!(enc.mask, vec![1, 1, 1, 1, 0]);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let enc = word_level_fixture(4).encode("zebra").unwrap();
        assert_eq!(enc.ids, vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_long_text_is_truncated_keeping_sep() {
        let enc = word_level_fixture(4).encode("i feel so happy today").unwrap();
        assert_eq!(enc.ids, vec![1, 4, 5, 2]);
        assert_eq!(enc.mask, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_file_load_and_vocab_size() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tokenizer.json");
        let tok = BertTokenizer::from_file(&path, 8).unwrap();
        assert_eq!(tok.vocab_size(), 23);
        assert_eq!(tok.max_len(), 8);
        assert!(BertTokenizer::from_file(Path::new("/no/tokenizer.json"), 8).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_encoding_has_fixed_length_and_prefix_mask(text in "[a-z !]{0,80}", max_len in 3usize..32) {
            let enc = word_level_fixture(max_len).encode(&text).unwrap();
            proptest::prop_assert_eq!(enc.ids.len(), max_len);
            proptest::prop_assert_eq!(enc.mask.len(), max_len);
            proptest::prop_assert_eq!(enc.ids[0], 1);
            let real = enc.mask.iter().filter(|&&m| m == 1).count();
            proptest::prop_assert!(enc.mask[..real].iter().all(|&m| m == 1));
            proptest::prop_assert!(enc.ids[real..].iter().all(|&id| id == 0));
        }
    }
}
