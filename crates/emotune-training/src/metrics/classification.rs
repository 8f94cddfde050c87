//! Accuracy, macro-F1 and the per-class classification report.

use crate::labels::LabelMap;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Index of the largest logit in each row. Empty rows map to class 0.
#[must_use]
pub fn argmax_rows(logits: &[Vec<f32>]) -> Vec<usize> {
    logits
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (idx, &value)| {
                    if value > best.1 { (idx, value) } else { best }
                })
                .0
        })
        .collect()
}

/// Fraction of matching predictions; 0.0 for empty input.
#[must_use]
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    let n = truth.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    hits as f64 / n as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Precision/recall/F1/support for one class. Zero division yields 0.0.
#[must_use]
pub fn class_scores(truth: &[usize], predicted: &[usize], class: usize) -> ClassScores {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (&t, &p) in truth.iter().zip(predicted) {
        match (t == class, p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    ClassScores { precision, recall, f1, support: tp + fn_ }
}

/// Unweighted mean F1 over the classes present in either label set.
#[must_use]
pub fn macro_f1(truth: &[usize], predicted: &[usize]) -> f64 {
    let classes: BTreeSet<usize> = truth.iter().chain(predicted).copied().collect();
    if classes.is_empty() {
        return 0.0;
    }
    let total: f64 = classes.iter().map(|&c| class_scores(truth, predicted, c).f1).sum();
    total / classes.len() as f64
}

/// Fixed-width per-class report followed by accuracy and averages.
#[must_use]
pub fn classification_report(truth: &[usize], predicted: &[usize], labels: &LabelMap) -> String {
    let class_count = labels
        .len()
        .max(truth.iter().chain(predicted).map(|&c| c + 1).max().unwrap_or(0));
    let names: Vec<String> = (0..class_count).map(|id| labels.name(id)).collect();
    let width = names.iter().map(String::len).max().unwrap_or(0).max("weighted avg".len());
    let total = truth.len();

    let mut out = String::new();
    let _ = writeln!(out, "{:>width$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support");
    let _ = writeln!(out);

    let mut sums = (0.0, 0.0, 0.0);
    let mut weighted = (0.0, 0.0, 0.0);
    for (id, name) in names.iter().enumerate() {
        let s = class_scores(truth, predicted, id);
        let _ = writeln!(
            out,
            "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            name, s.precision, s.recall, s.f1, s.support
        );
        sums.0 += s.precision;
        sums.1 += s.recall;
        sums.2 += s.f1;
        let w = s.support as f64;
        weighted.0 += s.precision * w;
        weighted.1 += s.recall * w;
        weighted.2 += s.f1 * w;
    }

    let n = class_count.max(1) as f64;
    let t = total.max(1) as f64;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
        "accuracy",
        "",
        "",
        accuracy(truth, predicted),
        total
    );
    let _ = writeln!(
        out,
        "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        "macro avg",
        sums.0 / n,
        sums.1 / n,
        sums.2 / n,
        total
    );
    let _ = writeln!(
        out,
        "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        "weighted avg",
        weighted.0 / t,
        weighted.1 / t,
        weighted.2 / t,
        total
    );
    out
}

/// Accuracy, macro-F1 and report computed in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationSummary {
    pub accuracy: f64,
    pub macro_f1: f64,
    pub report: String,
}

impl ClassificationSummary {
    #[must_use]
    pub fn compute(truth: &[usize], predicted: &[usize], labels: &LabelMap) -> Self {
        Self {
            accuracy: accuracy(truth, predicted),
            macro_f1: macro_f1(truth, predicted),
            report: classification_report(truth, predicted, labels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_rows() {
        let logits = vec![vec![0.1, 0.9, 0.0], vec![2.0, -1.0, 1.0], vec![]];
        assert_eq!(argmax_rows(&logits), vec![1, 0, 0]);
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 2, 2], &[0, 1, 1, 2]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_macro_f1_averages_over_present_classes() {
        // class 0: p=1 r=1 f1=1; class 1: p=0.5 r=1 f1=2/3; class 2: p=0 r=0 f1=0
        let truth = [0, 1, 2];
        let predicted = [0, 1, 1];
        let expected = (1.0 + 2.0 / 3.0 + 0.0) / 3.0;
        assert!((macro_f1(&truth, &predicted) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_macro_f1_perfect_and_empty() {
        assert_eq!(macro_f1(&[3, 4, 3], &[3, 4, 3]), 1.0);
        assert_eq!(macro_f1(&[], &[]), 0.0);
    }

    #[test]
    fn test_report_lists_every_label_and_averages() {
        let labels = LabelMap::go_emotions();
        let report = classification_report(&[0, 27], &[0, 2], &labels);
        assert!(report.contains("admiration"));
        assert!(report.contains("neutral"));
        assert!(report.contains("accuracy"));
        assert!(report.contains("macro avg"));
        assert!(report.contains("weighted avg"));
        assert_eq!(report.lines().filter(|l| l.contains("precision")).count(), 1);
    }

    #[test]
    fn test_report_names_unknown_classes() {
        let labels = LabelMap::new(vec!["a".to_string()]);
        let report = classification_report(&[0, 3], &[0, 3], &labels);
        assert!(report.contains("label_3"));
    }
}
