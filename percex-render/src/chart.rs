use std::path::Path;

use anyhow::Result;
use percex_core::{Condition, Encoding, RenderError, TrialData, Visualization};
use rand::Rng;
use tiny_skia::{
    Color, FillRule, GradientStop, LinearGradient, Paint, Path as SkPath, PathBuilder, Pixmap,
    Point, Rect, SpreadMode, Stroke, Transform,
};
use tracing::{debug, trace};

use crate::style::{BACKGROUND, BarFill, OUTLINE, gradient_color, outline};

/// Chart geometry in unscaled units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartLayout {
    pub min_width: f32,
    pub height: f32,
    pub margin: f32,
    pub bar_width: f32,
    pub legend_width: f32,
    pub legend_height: f32,
    pub tick_length: f32,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            min_width: 300.0,
            height: 300.0,
            margin: 40.0,
            bar_width: 30.0,
            legend_width: 12.0,
            legend_height: 100.0,
            tick_length: 6.0,
        }
    }
}

impl ChartLayout {
    /// Grows past the minimum when the bars would run into the legend.
    pub fn width(&self, bars: usize) -> f32 {
        self.min_width
            .max(3.5 * self.margin + bars as f32 * self.bar_width)
    }

    /// Maps 0..=100 onto the plot area, 100 at the top.
    pub fn y(&self, value: f32) -> f32 {
        let baseline = self.height - self.margin;
        baseline - value / 100.0 * (self.height - 2.0 * self.margin)
    }

    pub fn bar_x(&self, index: usize) -> f32 {
        2.0 * self.margin + index as f32 * self.bar_width
    }

    pub fn marker_center(&self, index: usize) -> (f32, f32) {
        (
            self.bar_x(index) + self.bar_width / 2.0,
            self.height - self.margin / 2.0,
        )
    }

    pub fn marker_radius(&self) -> f32 {
        self.margin / 6.0
    }

    pub fn legend_origin(&self, bars: usize) -> (f32, f32) {
        (self.width(bars) - self.margin, self.margin)
    }
}

/// Draws trial bar charts into an owned pixmap.
pub struct BarChartRenderer<R: Rng> {
    canvas: Pixmap,
    layout: ChartLayout,
    scale: f32,
    rng: R,
}

impl<R: Rng> BarChartRenderer<R> {
    pub fn new(layout: ChartLayout, scale: f32, rng: R) -> Result<Self, RenderError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(RenderError::Geometry(format!("scale must be positive, got {scale}")));
        }
        let mut canvas = blank(
            (layout.min_width * scale).ceil() as u32,
            (layout.height * scale).ceil() as u32,
        )?;
        canvas.fill(BACKGROUND);
        Ok(Self {
            canvas,
            layout,
            scale,
            rng,
        })
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    pub fn layout(&self) -> &ChartLayout {
        &self.layout
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    fn transform(&self) -> Transform {
        Transform::from_scale(self.scale, self.scale)
    }

    fn fit_to(&mut self, bars: usize) -> Result<(), RenderError> {
        let width = (self.layout.width(bars) * self.scale).ceil() as u32;
        let height = (self.layout.height * self.scale).ceil() as u32;
        if self.canvas.width() != width || self.canvas.height() != height {
            debug!(width, height, bars, "resizing chart canvas");
            self.canvas = blank(width, height)?;
        }
        Ok(())
    }

    /// Draws a full chart for one trial, replacing whatever was on the canvas.
    pub fn draw(&mut self, encoding: Encoding, trial: &TrialData) -> Result<(), RenderError> {
        let values = trial.values();
        self.fit_to(values.len())?;
        self.canvas.fill(BACKGROUND);

        let fill = BarFill::for_encoding(encoding, &mut self.rng);
        let stroke_color = outline(encoding);
        let ts = self.transform();
        let layout = self.layout;

        self.draw_axes(values.len())?;

        for (i, &value) in values.iter().enumerate() {
            let x = layout.bar_x(i);
            let top = layout.y(value as f32);
            let rect = rect(x, top, layout.bar_width, (layout.height - layout.margin) - top)?;

            self.canvas
                .fill_rect(rect, &solid(fill.color(i, value)), ts, None);
            if let Some(color) = stroke_color {
                self.canvas.stroke_path(
                    &PathBuilder::from_rect(rect),
                    &solid(color),
                    &Stroke {
                        width: 1.0,
                        ..Stroke::default()
                    },
                    ts,
                    None,
                );
            }
        }

        for index in trial.marked() {
            let (cx, cy) = layout.marker_center(index);
            let dot = PathBuilder::from_circle(cx, cy, layout.marker_radius())
                .ok_or_else(|| RenderError::Geometry(format!("marker at bar {index}")))?;
            self.canvas
                .fill_path(&dot, &solid(OUTLINE), FillRule::Winding, ts, None);
        }

        if encoding == Encoding::Gradient {
            self.draw_legend(values.len())?;
        }

        trace!(?encoding, bars = values.len(), "chart drawn");
        Ok(())
    }

    /// Left value axis with 0 and 100 ticks, then the baseline across the plot.
    fn draw_axes(&mut self, bars: usize) -> Result<(), RenderError> {
        let l = self.layout;
        let mut pb = PathBuilder::new();
        pb.move_to(l.margin, l.y(100.0));
        pb.line_to(l.margin, l.y(0.0));
        for tick in [0.0, 100.0] {
            pb.move_to(l.margin - l.tick_length, l.y(tick));
            pb.line_to(l.margin, l.y(tick));
        }
        pb.move_to(l.margin, l.height - l.margin);
        pb.line_to(l.width(bars), l.height - l.margin);
        let axes = finish(pb, "axes")?;
        self.stroke(&axes);
        Ok(())
    }

    /// Vertical yellow-to-green bar with its own 0..100 scale on the right.
    fn draw_legend(&mut self, bars: usize) -> Result<(), RenderError> {
        let l = self.layout;
        let (x, y) = l.legend_origin(bars);
        let shader = LinearGradient::new(
            Point::from_xy(x, y),
            Point::from_xy(x, y + l.legend_height),
            vec![
                GradientStop::new(0.0, gradient_color(100.0)),
                GradientStop::new(1.0, gradient_color(0.0)),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or_else(|| RenderError::Geometry("legend gradient".into()))?;
        let paint = Paint {
            shader,
            anti_alias: true,
            ..Paint::default()
        };
        let ts = self.transform();
        self.canvas.fill_rect(
            rect(x, y, l.legend_width, l.legend_height)?,
            &paint,
            ts,
            None,
        );

        let axis_x = x + l.legend_width;
        let mut pb = PathBuilder::new();
        pb.move_to(axis_x, y);
        pb.line_to(axis_x, y + l.legend_height);
        for tick_y in [y, y + l.legend_height] {
            pb.move_to(axis_x, tick_y);
            pb.line_to(axis_x + l.tick_length, tick_y);
        }
        let axis = finish(pb, "legend axis")?;
        self.stroke(&axis);
        Ok(())
    }

    fn stroke(&mut self, path: &SkPath) {
        let ts = self.transform();
        self.canvas.stroke_path(
            path,
            &solid(OUTLINE),
            &Stroke {
                width: 1.0,
                ..Stroke::default()
            },
            ts,
            None,
        );
    }

    /// Copies the chart into an RGBA frame, centered; parts outside the frame are cut off.
    pub fn copy_into(&self, frame: &mut [u8], frame_width: u32, frame_height: u32) {
        let (cw, ch) = (self.canvas.width() as usize, self.canvas.height() as usize);
        let (fw, fh) = (frame_width as usize, frame_height as usize);
        if frame.len() < fw * fh * 4 {
            return;
        }
        let copy_w = cw.min(fw);
        let copy_h = ch.min(fh);
        let (src_x, dst_x) = if cw > fw { ((cw - fw) / 2, 0) } else { (0, (fw - cw) / 2) };
        let (src_y, dst_y) = if ch > fh { ((ch - fh) / 2, 0) } else { (0, (fh - ch) / 2) };

        let src = self.canvas.data();
        for row in 0..copy_h {
            let s = ((src_y + row) * cw + src_x) * 4;
            let d = ((dst_y + row) * fw + dst_x) * 4;
            frame[d..d + copy_w * 4].copy_from_slice(&src[s..s + copy_w * 4]);
        }
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.canvas.save_png(path.as_ref())?;
        Ok(())
    }
}

impl<R: Rng> Visualization for BarChartRenderer<R> {
    fn render(&mut self, condition: &Condition, trial: &TrialData) -> Result<(), RenderError> {
        self.draw(condition.encoding, trial)
    }

    fn clear(&mut self) {
        self.canvas.fill(BACKGROUND);
    }
}

fn blank(width: u32, height: u32) -> Result<Pixmap, RenderError> {
    Pixmap::new(width, height).ok_or(RenderError::Canvas { width, height })
}

fn rect(x: f32, y: f32, w: f32, h: f32) -> Result<Rect, RenderError> {
    Rect::from_xywh(x, y, w, h)
        .ok_or_else(|| RenderError::Geometry(format!("rect {x},{y} {w}x{h}")))
}

fn finish(pb: PathBuilder, what: &str) -> Result<SkPath, RenderError> {
    pb.finish()
        .ok_or_else(|| RenderError::Geometry(what.to_string()))
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}
