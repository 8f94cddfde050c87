//! GoEmotions splits read from JSONL.

use crate::error::{ModelError, ModelResult};
use crate::tokenizer::{BertTokenizer, Encoding};
use candle_core::{Device, Tensor};
use emotune_training::Split;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct RawExample {
    text: String,
    labels: Vec<usize>,
}

/// One single-label example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub text: String,
    pub label: usize,
}

/// Read a split, keeping only examples with exactly one label.
pub fn read_split(path: &Path, num_labels: usize) -> ModelResult<Vec<Example>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ModelError::Dataset(format!("failed to read {}: {}", path.display(), e)))?;
    let mut examples = Vec::new();
    let mut dropped = 0usize;

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let raw: RawExample = serde_json::from_str(line).map_err(|e| {
            ModelError::Dataset(format!("{} line {}: {}", path.display(), idx + 1, e))
        })?;
        match raw.labels.as_slice() {
            [label] if *label < num_labels => examples.push(Example { text: raw.text, label: *label }),
            [label] => {
                return Err(ModelError::Dataset(format!(
                    "{} line {}: label {} outside 0..{}",
                    path.display(),
                    idx + 1,
                    label,
                    num_labels
                )));
            }
            _ => dropped += 1,
        }
    }

    tracing::debug!(path = %path.display(), kept = examples.len(), dropped, "read split");
    Ok(examples)
}

/// A tokenized split.
#[derive(Debug, Clone, Default)]
pub struct EncodedSplit {
    pub texts: Vec<String>,
    pub encodings: Vec<Encoding>,
    pub labels: Vec<usize>,
}

impl EncodedSplit {
    pub fn new(examples: Vec<Example>, tokenizer: &BertTokenizer) -> ModelResult<Self> {
        let mut split = Self::default();
        for ex in examples {
            split.encodings.push(tokenizer.encode(&ex.text)?);
            split.labels.push(ex.label);
            split.texts.push(ex.text);
        }
        Ok(split)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `(input_ids [B, L] u32, mask [B, L] f32, labels [B] u32)` for the given rows.
    pub fn batch(&self, rows: &[usize], device: &Device) -> ModelResult<(Tensor, Tensor, Tensor)> {
        let seq_len = self.encodings.first().map_or(1, |e| e.ids.len());
        let mut ids = Vec::with_capacity(rows.len() * seq_len);
        let mut mask = Vec::with_capacity(rows.len() * seq_len);
        let mut labels = Vec::with_capacity(rows.len());
        for &row in rows {
            let enc = &self.encodings[row];
            ids.extend_from_slice(&enc.ids);
            mask.extend(enc.mask.iter().map(|&m| m as f32));
            labels.push(self.labels[row] as u32);
        }
        let ids = Tensor::from_vec(ids, (rows.len(), seq_len), device)?;
        let mask = Tensor::from_vec(mask, (rows.len(), seq_len), device)?;
        let labels = Tensor::from_vec(labels, rows.len(), device)?;
        Ok((ids, mask, labels))
    }
}

/// The three GoEmotions splits, tokenized.
#[derive(Debug, Clone, Default)]
pub struct EmotionDataset {
    pub train: EncodedSplit,
    pub validation: EncodedSplit,
    pub test: EncodedSplit,
}

impl EmotionDataset {
    /// Load `train.jsonl`, `validation.jsonl` and `test.jsonl` from `dir`.
    pub fn load(dir: &Path, num_labels: usize, tokenizer: &BertTokenizer) -> ModelResult<Self> {
        let load = |name: &str| -> ModelResult<EncodedSplit> {
            let examples = read_split(&dir.join(format!("{name}.jsonl")), num_labels)?;
            EncodedSplit::new(examples, tokenizer)
        };
        let dataset = Self { train: load("train")?, validation: load("validation")?, test: load("test")? };
        if dataset.train.is_empty() {
            return Err(ModelError::Dataset(format!(
                "no single-label training examples under {}",
                dir.display()
            )));
        }
        tracing::info!(
            train = dataset.train.len(),
            validation = dataset.validation.len(),
            test = dataset.test.len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    #[must_use]
    pub fn split(&self, split: Split) -> &EncodedSplit {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::word_level_fixture;
    use tempfile::TempDir;

    #[test]
    fn test_read_split_keeps_single_label_rows() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("train.jsonl");
        std::fs::write(
            &path,
            "{\"text\": \"so happy\", \"labels\": [17]}\n\n{\"text\": \"mixed\", \"labels\": [1, 2]}\n{\"text\": \"meh\", \"labels\": [27]}\n",
        )
        .unwrap();

        let examples = read_split(&path, 28).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0], Example { text: "so happy".to_string(), label: 17 });
    }

    #[test]
    fn test_read_split_rejects_out_of_range_label() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.jsonl");
        std::fs::write(&path, "{\"text\": \"x\", \"labels\": [40]}\n").unwrap();
        assert!(matches!(read_split(&path, 28), Err(ModelError::Dataset(_))));
    }

    #[test]
    fn test_batch_shapes() {
        let tok = word_level_fixture(4);
        let split = EncodedSplit::new(
            vec![
                Example { text: "so happy".to_string(), label: 1 },
                Example { text: "sad".to_string(), label: 2 },
            ],
            &tok,
        )
        .unwrap();
        let (ids, mask, labels) = split.batch(&[1, 0], &Device::Cpu).unwrap();
        assert_eq!(ids.dims(), &[2, 4]);
        assert_eq!(ids.to_vec2::<u32>().unwrap(), vec![vec![1, 12, 2, 0], vec![1, 13, 11, 2]]);
        assert_eq!(mask.to_vec2::<f32>().unwrap()[0], vec![1.0, 1.0, 1.0, 0.0]);
        assert_eq!(labels.to_vec1::<u32>().unwrap(), vec![2, 1]);
    }
}
