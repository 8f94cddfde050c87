//! End-of-run console summary.

use colored::Colorize;
use comfy_table::{Cell, Color, Table};
use emotune_training::{PredictionSample, RunConfig, RunOutcome};

fn epoch_table(outcome: &RunOutcome) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Epoch", "Macro F1", "Accuracy", "Elapsed (s)"]);
    for record in outcome.training.history.records() {
        table.add_row(vec![
            Cell::new(record.epoch),
            Cell::new(format!("{:.4}", record.macro_f1)).fg(Color::Cyan),
            Cell::new(format!("{:.4}", record.accuracy)).fg(Color::Cyan),
            Cell::new(format!("{:.1}", record.elapsed_secs)),
        ]);
    }
    table
}

fn sample_table(samples: &[PredictionSample], correct: bool) -> Table {
    let color = if correct { Color::Green } else { Color::Red };
    let mut table = Table::new();
    table.set_header(vec!["Index", "Text", "True", "Predicted"]);
    for sample in samples {
        table.add_row(vec![
            Cell::new(sample.index),
            Cell::new(&sample.text),
            Cell::new(&sample.true_label),
            Cell::new(&sample.predicted_label).fg(color),
        ]);
    }
    table
}

pub fn print_outcome(config: &RunConfig, outcome: &RunOutcome) {
    println!();
    println!("{}", format!("{} fine-tuning complete", config.strategy.title()).bold());
    println!("  Output: {}", config.output_path.display().to_string().cyan());
    println!("  Saved groups: {}", outcome.bundle_keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "));
    println!();

    if !outcome.training.history.is_empty() {
        println!("{}", epoch_table(outcome));
        println!();
    }

    let metrics = &outcome.final_metrics;
    println!(
        "{} F1 {:.4}  Accuracy {:.4}  ({:.1}s)",
        "Test:".bold(),
        metrics.macro_f1,
        metrics.accuracy,
        metrics.duration_secs
    );
    println!();

    for (title, samples, correct) in [
        ("Correct predictions", &outcome.samples.correct, true),
        ("Incorrect predictions", &outcome.samples.incorrect, false),
    ] {
        println!("{} ({})", title.bold(), samples.len());
        if !samples.is_empty() {
            println!("{}", sample_table(samples, correct));
        }
        println!();
    }

    println!("  Summary: {}", outcome.summary_path.display().to_string().cyan());
}
