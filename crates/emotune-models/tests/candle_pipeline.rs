//! A full run on a tiny local checkpoint and dataset.

use candle_core::{DType, Device, Tensor};
use emotune_models::CandleEngine;
use emotune_training::{
    BundleKey, ConfigResolver, FineTuneRun, LabelMap, NullProgressSink, PlottersRenderer, RunSettings,
    RunSummary, WeightBundle,
};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tempfile::TempDir;

const TINY_CONFIG: &str = r#"{
  "vocab_size": 64,
  "hidden_size": 8,
  "intermediate_size": 16,
  "num_hidden_layers": 12,
  "num_attention_heads": 2,
  "max_position_embeddings": 16,
  "layer_norm_eps": 1e-12,
  "model_type": "bert"
}"#;

fn write_split(dir: &Path, name: &str, rows: usize) {
    let words = ["glad", "angry", "calm", "scared"];
    let mut lines = String::new();
    for i in 0..rows {
        let label = i % 4;
        lines.push_str(&format!(
            "{{\"text\": \"I feel {} today {}\", \"labels\": [{}]}}\n",
            words[label], i, label
        ));
    }
    lines.push_str("{\"text\": \"two at once\", \"labels\": [0, 1]}\n");
    std::fs::write(dir.join(format!("{name}.jsonl")), lines).unwrap();
}

fn write_checkpoint(dir: &Path) {
    std::fs::write(dir.join("config.json"), TINY_CONFIG).unwrap();
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tokenizer.json");
    std::fs::copy(fixture, dir.join("tokenizer.json")).unwrap();
    let pooler = Tensor::zeros((8, 8), DType::F32, &Device::Cpu).unwrap();
    let tensors = HashMap::from([("bert.pooler.dense.weight".to_string(), pooler)]);
    candle_core::safetensors::save(&tensors, dir.join("model.safetensors")).unwrap();
}

#[test]
fn test_head_plus_one_run_writes_all_artifacts() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    let model_dir = temp.path().join("model");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::create_dir_all(&model_dir).unwrap();
    write_split(&data_dir, "train", 16);
    write_split(&data_dir, "validation", 8);
    write_split(&data_dir, "test", 8);
    write_checkpoint(&model_dir);

    let settings = RunSettings {
        dataset_dir: data_dir,
        local_model_dir: model_dir,
        seed: Some(3),
        sample_count: 2,
        max_seq_len: 8,
        ..RunSettings::default()
    };
    let out = temp.path().join("run");
    let config = ConfigResolver::new(settings)
        .resolve(&[out.to_str().unwrap(), "head+1", "1"])
        .unwrap();

    let labels = LabelMap::default();
    let engine = CandleEngine::from_config(&config, &labels).unwrap();
    let renderer = PlottersRenderer { width: 320, height: 240 };
    let outcome = FineTuneRun::new(&config, &NullProgressSink, &renderer)
        .with_labels(labels)
        .with_sample_output(Box::new(std::io::sink()))
        .execute(engine)
        .unwrap();

    assert_eq!(outcome.training.history.len(), 1);
    assert_eq!(
        outcome.bundle_keys,
        BTreeSet::from([
            BundleKey::ClassificationHead,
            BundleKey::FinalEncoderLayer,
            BundleKey::PoolingLayer
        ])
    );

    let bundle = WeightBundle::load(&out.join("selected_layers_state_dict.safetensors")).unwrap();
    let final_layer = bundle.group(BundleKey::FinalEncoderLayer).unwrap();
    assert!(final_layer.keys().all(|k| k.starts_with("bert.encoder.layer.11.")));
    assert_eq!(final_layer.len(), 16);
    assert!(final_layer.contains_key("bert.encoder.layer.11.attention.self.key.weight"));

    for chart in ["f1.png", "accuracy.png", "duration.png", "f1_and_accuracy.png", "losses.png"] {
        assert!(out.join(chart).is_file(), "missing {chart}");
    }
    let summary = RunSummary::read(&out.join("results.json")).unwrap();
    assert_eq!(summary.device, "cpu");
    assert!(summary.samples.correct.len() <= 2);
    assert!(summary.samples.incorrect.len() <= 2);
}

#[test]
fn test_missing_checkpoint_fails_before_training() {
    let temp = TempDir::new().unwrap();
    let settings = RunSettings {
        dataset_dir: temp.path().join("data"),
        local_model_dir: temp.path().join("no-model"),
        ..RunSettings::default()
    };
    let config = ConfigResolver::new(settings).resolve(&[temp.path().to_str().unwrap()]).unwrap();
    assert!(CandleEngine::from_config(&config, &LabelMap::default()).is_err());
    assert!(!temp.path().join("selected_layers_state_dict.safetensors").exists());
}
