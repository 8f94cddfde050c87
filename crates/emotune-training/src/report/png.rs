use super::{ChartRenderer, ChartSpec};
use crate::error::{TrainingError, TrainingResult};
use plotters::prelude::*;
use plotters::style::FontStyle;
use std::path::Path;
use std::sync::OnceLock;

const SERIES_COLORS: [RGBColor; 4] = [BLUE, RED, GREEN, MAGENTA];

/// Bundled so chart text renders without system font libraries.
const SANS_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
pub const FONT_FAMILY: &str = "sans-serif";

static FONT_REGISTERED: OnceLock<bool> = OnceLock::new();

/// Register the bundled face as `sans-serif`, once per process.
fn ensure_font() -> TrainingResult<()> {
    let ok = *FONT_REGISTERED
        .get_or_init(|| plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, SANS_FONT).is_ok());
    if ok {
        Ok(())
    } else {
        Err(TrainingError::Persistence("bundled chart font could not be parsed".to_string()))
    }
}

/// PNG line charts via `plotters`' bitmap backend.
#[derive(Debug, Clone)]
pub struct PlottersRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for PlottersRenderer {
    fn default() -> Self {
        Self { width: 1600, height: 1200 }
    }
}

fn draw_error(path: &Path, err: impl std::fmt::Display) -> TrainingError {
    TrainingError::Persistence(format!("failed to draw {}: {err}", path.display()))
}

impl ChartRenderer for PlottersRenderer {
    fn render(&self, chart: &ChartSpec, path: &Path) -> TrainingResult<()> {
        ensure_font()?;
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| draw_error(path, e))?;

        let ((x0, x1), (y0, y1)) = chart.bounds();
        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT_FAMILY, 40))
            .margin(30)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(|e| draw_error(path, e))?;

        ctx.configure_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .draw()
            .map_err(|e| draw_error(path, e))?;

        for (idx, series) in chart.series.iter().enumerate() {
            let color = SERIES_COLORS[idx % SERIES_COLORS.len()];
            ctx.draw_series(LineSeries::new(series.points.iter().copied(), color.stroke_width(3)))
                .map_err(|e| draw_error(path, e))?
                .label(series.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
        }

        if !chart.series.is_empty() {
            ctx.configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(|e| draw_error(path, e))?;
        }

        root.present().map_err(|e| draw_error(path, e))?;
        Ok(())
    }
}
