//! Diagnostic charts.
//!
//! [`ReportGenerator::charts`] turns histories into [`ChartSpec`]s without
//! touching the filesystem; a [`ChartRenderer`] draws them.

pub mod png;

pub use png::PlottersRenderer;

use crate::error::TrainingResult;
use crate::layout::RunLayout;
use crate::metrics::{LossLog, MetricsHistory};
use crate::strategy::TrainingStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    fn new(label: &str, points: Vec<(f64, f64)>) -> Self {
        Self { label: label.to_string(), points }
    }
}

/// Everything a renderer needs to draw one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub file_name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl ChartSpec {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }

    /// `(x_min..x_max, y_min..y_max)` covering every point, with a unit
    /// fallback for empty or flat data.
    #[must_use]
    pub fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let points = self.series.iter().flat_map(|s| s.points.iter());
        let (mut x0, mut x1, mut y0, mut y1) =
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
        for &(x, y) in points {
            x0 = x0.min(x);
            x1 = x1.max(x);
            y0 = y0.min(y);
            y1 = y1.max(y);
        }
        let widen = |lo: f64, hi: f64| {
            if !lo.is_finite() || !hi.is_finite() {
                (0.0, 1.0)
            } else if (hi - lo).abs() < f64::EPSILON {
                (lo - 0.5, hi + 0.5)
            } else {
                let pad = (hi - lo) * 0.05;
                (lo - pad, hi + pad)
            }
        };
        (widen(x0, x1), widen(y0, y1))
    }
}

/// Draws a chart to an image file.
pub trait ChartRenderer {
    fn render(&self, chart: &ChartSpec, path: &Path) -> TrainingResult<()>;
}

pub const F1_CHART: &str = "f1.png";
pub const ACCURACY_CHART: &str = "accuracy.png";
pub const DURATION_CHART: &str = "duration.png";
pub const F1_AND_ACCURACY_CHART: &str = "f1_and_accuracy.png";
pub const LOSSES_CHART: &str = "losses.png";

#[derive(Debug, Clone)]
pub struct ReportGenerator {
    strategy: TrainingStrategy,
}

impl ReportGenerator {
    #[must_use]
    pub fn new(strategy: TrainingStrategy) -> Self {
        Self { strategy }
    }

    fn title(&self, what: &str) -> String {
        format!("{what} Over Epochs for {} Fine-Tuning", self.strategy.title())
    }

    fn chart(&self, file_name: &str, what: &str, y_label: &str, series: Vec<Series>) -> ChartSpec {
        ChartSpec {
            file_name: file_name.to_string(),
            title: self.title(what),
            x_label: "Epoch".to_string(),
            y_label: y_label.to_string(),
            series,
        }
    }

    /// The five diagnostic charts, in a fixed order.
    #[must_use]
    pub fn charts(&self, history: &MetricsHistory, losses: &LossLog) -> Vec<ChartSpec> {
        let f1 = Series::new("F1 Score", history.f1_series());
        let accuracy = Series::new("Accuracy", history.accuracy_series());
        vec![
            self.chart(F1_CHART, "F1 Score", "F1 Score", vec![f1.clone()]),
            self.chart(ACCURACY_CHART, "Accuracy", "Accuracy", vec![accuracy.clone()]),
            self.chart(
                DURATION_CHART,
                "Duration",
                "Duration (s)",
                vec![Series::new("Duration", history.duration_series())],
            ),
            self.chart(F1_AND_ACCURACY_CHART, "F1 Score and Accuracy", "F1 Score/Accuracy", vec![f1, accuracy]),
            self.chart(
                LOSSES_CHART,
                "Loss",
                "Loss",
                vec![
                    Series::new("Training Loss", losses.training_series()),
                    Series::new("Validation Loss", losses.validation_series()),
                ],
            ),
        ]
    }

    /// Render every chart under the run directory; returns the written paths.
    pub fn render(
        &self,
        history: &MetricsHistory,
        losses: &LossLog,
        layout: &RunLayout,
        renderer: &dyn ChartRenderer,
    ) -> TrainingResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for chart in self.charts(history, losses) {
            let path = layout.chart_path(&chart.file_name);
            renderer.render(&chart, &path)?;
            tracing::debug!(path = %path.display(), "chart written");
            written.push(path);
        }
        Ok(written)
    }
}
