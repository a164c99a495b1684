//! 2-D scatter plots of merged sample metadata.
//!
//! The plot takes the first two numeric metadata columns as axes, so a
//! metadata set carrying ordination coordinates plots its leading principal
//! coordinates. Points can be colored by a categorical column, with one
//! legend entry per category.

use plotters::prelude::*;
use std::collections::BTreeMap;

use crate::error::{KmerizerError, Result};
use crate::metadata::{MetadataColumn, SampleMetadata};
use crate::pipeline::ScatterPlotter;

/// A rendered scatter plot held as an SVG document.
#[derive(Debug, Clone)]
pub struct ScatterPlot {
    svg: String,
}

impl ScatterPlot {
    /// Wraps an already rendered SVG document.
    pub fn from_svg(svg: String) -> Self {
        ScatterPlot { svg }
    }

    pub fn svg(&self) -> &str {
        &self.svg
    }

    pub fn into_svg(self) -> String {
        self.svg
    }
}

/// Default plotting collaborator, rendering to an in-memory SVG.
#[derive(Debug, Clone, Copy)]
pub struct SvgScatterPlotter {
    width: u32,
    height: u32,
}

impl SvgScatterPlotter {
    pub fn new() -> Self {
        SvgScatterPlotter {
            width: 800,
            height: 600,
        }
    }

    fn render(
        &self,
        buffer: &mut String,
        x_name: &str,
        y_name: &str,
        series: &BTreeMap<String, Vec<(f64, f64)>>,
        with_legend: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let points: Vec<(f64, f64)> = series.values().flatten().copied().collect();
        let (x_range, y_range) = axis_ranges(&points);

        let root = SVGBackend::with_string(buffer, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)?;
        chart
            .configure_mesh()
            .x_desc(x_name)
            .y_desc(y_name)
            .draw()?;

        for (idx, (category, points)) in series.iter().enumerate() {
            let color = Palette99::pick(idx);
            let anno = chart.draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
            )?;
            if with_legend {
                anno.label(category)
                    .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
            }
        }
        if with_legend {
            chart
                .configure_series_labels()
                .border_style(&BLACK)
                .background_style(&WHITE.mix(0.8))
                .draw()?;
        }

        root.present()?;
        Ok(())
    }
}

impl Default for SvgScatterPlotter {
    fn default() -> Self {
        SvgScatterPlotter::new()
    }
}

impl ScatterPlotter for SvgScatterPlotter {
    /// Plots the first two numeric columns against each other.
    ///
    /// `color_by` must name a categorical column when given; samples with a
    /// missing coordinate are left out of the plot.
    fn plot(&self, metadata: &SampleMetadata, color_by: Option<&str>) -> Result<ScatterPlot> {
        let mut numeric = metadata.numeric_columns();
        let (x_name, xs) = numeric.next().ok_or_else(|| {
            KmerizerError::Plot("scatter plot needs at least two numeric columns".to_string())
        })?;
        let (y_name, ys) = numeric.next().ok_or_else(|| {
            KmerizerError::Plot("scatter plot needs at least two numeric columns".to_string())
        })?;

        let categories: Option<&[String]> = match color_by {
            Some(name) => match metadata.column(name) {
                Some(MetadataColumn::Categorical(values)) => Some(values),
                Some(MetadataColumn::Numeric(_)) => {
                    return Err(KmerizerError::InvalidParameter(format!(
                        "color_by column '{name}' is numeric, expected categorical"
                    )))
                }
                None => return Err(KmerizerError::UnknownColumn(name.to_string())),
            },
            None => None,
        };

        let mut series: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
        for (row, (&x, &y)) in xs.iter().zip(ys.iter()).enumerate() {
            if x.is_nan() || y.is_nan() {
                continue;
            }
            let key = match categories {
                Some(values) => values[row].clone(),
                None => String::new(),
            };
            series.entry(key).or_default().push((x, y));
        }

        let mut buffer = String::new();
        self.render(&mut buffer, x_name, y_name, &series, categories.is_some())
            .map_err(|e| KmerizerError::Plot(e.to_string()))?;
        Ok(ScatterPlot { svg: buffer })
    }
}

/// Padded axis ranges covering every point, widened a little so markers on
/// the hull are not clipped.
fn axis_ranges(points: &[(f64, f64)]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    if points.is_empty() {
        return (0.0..1.0, 0.0..1.0);
    }
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    (pad(x_min, x_max), pad(y_min, y_max))
}

fn pad(min: f64, max: f64) -> std::ops::Range<f64> {
    let span = max - min;
    if span > 0.0 {
        (min - 0.05 * span)..(max + 0.05 * span)
    } else {
        (min - 0.5)..(max + 0.5)
    }
}
