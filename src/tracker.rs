use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context as AnyhowContext, Result};
use log::{debug, info};
use rand::Rng;
use serde::Serialize;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::consensus::{estimate, ConsensusParams, MotionEstimate};
use crate::frame::FrameSource;
use crate::grid::GridParams;
use crate::image::Image;
use crate::my_types::*;
use crate::optical_flow::PointTracker;
use crate::overlay::{InfoBox, Overlay};
use crate::visualization::RenderSurface;

/// regenerate the grid after this many ticks to shed lost points
pub const REGEN_PERIOD: usize = 10;

#[derive(Clone, Debug)]
pub struct TrackerParams {
    pub grid: GridParams,
    pub regen_period: usize,
    pub consensus: ConsensusParams,
    pub info_box: InfoBox,
}

/// Outcome of one tick, written to the report file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub dx: f64,
    pub dy: f64,
    pub indicator: Pixel,
    /// the grid was rebuilt at the end of this tick
    pub regenerated: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    /// ticks that produced a non-zero estimate
    pub moving_ticks: u64,
    /// sum of all estimates
    pub total: MotionEstimate,
}

/// Follows the grid from frame to frame and turns the per-point motion
/// into one estimate per tick.
pub struct Tracker<T, R> {
    point_tracker: T,
    params: TrackerParams,
    rng: R,
    points: Vec<Vector2d>,
    /// ticks since the grid was last generated
    tick_counter: usize,
    tick: u64,
}

impl<T: PointTracker, R: Rng> Tracker<T, R> {
    pub fn new(point_tracker: T, params: TrackerParams, rng: R) -> Result<Self> {
        if params.regen_period == 0 {
            bail!("grid regeneration period must be at least one tick");
        }
        let grid = params.grid.create().context("cannot create the tracking grid")?;
        info!(
            "tracking {} grid points around ({}, {})",
            grid.len(),
            params.grid.center.x,
            params.grid.center.y
        );

        Ok(Self {
            point_tracker,
            params,
            rng,
            points: grid.tracking_points,
            tick_counter: 0,
            tick: 0,
        })
    }

    pub fn points(&self) -> &[Vector2d] {
        &self.points
    }

    pub fn tick_counter(&self) -> usize {
        self.tick_counter
    }

    /// Run one tick on a pair of consecutive grayscale frames.
    pub fn process(&mut self, previous: &Image, current: &Image) -> Result<(Overlay, TickReport)> {
        self.tick += 1;

        let new_points = self
            .point_tracker
            .track(previous, current, &self.points)
            .with_context(|| format!("point tracking failed on tick {}", self.tick))?;
        let estimate = estimate(
            &self.points,
            &new_points,
            &self.params.consensus,
            &mut self.rng,
        )?;
        let overlay = self.params.info_box.place(&estimate);
        debug!(
            "tick {}: motion ({:.2}, {:.2}), indicator {:?}",
            self.tick, estimate.dx, estimate.dy, overlay.indicator
        );

        self.points = new_points;
        self.tick_counter += 1;
        let regenerated = self.tick_counter >= self.params.regen_period;
        if regenerated {
            self.points = self.params.grid.create()?.tracking_points;
            self.tick_counter = 0;
        }

        let report = TickReport {
            tick: self.tick,
            dx: estimate.dx,
            dy: estimate.dy,
            indicator: overlay.indicator,
            regenerated,
        };
        Ok((overlay, report))
    }
}

/// Drive the tracker until the source runs dry or `cancel` is raised.
///
/// Cancellation is checked once per tick. Any collaborator error ends the
/// run and is returned.
pub fn run<T, R, S, D>(
    tracker: &mut Tracker<T, R>,
    source: &mut S,
    surface: &mut D,
    cancel: &AtomicBool,
    mut report: Option<&mut dyn Write>,
) -> Result<RunSummary>
where
    T: PointTracker,
    R: Rng,
    S: FrameSource + ?Sized,
    D: RenderSurface + ?Sized,
{
    let mut summary = RunSummary::default();
    let mut previous = match source.next_frame().context("cannot read the first frame")? {
        Some(frame) => frame,
        None => {
            info!("frame source is empty");
            return Ok(summary);
        }
    };

    while !cancel.load(Ordering::Relaxed) {
        let frame = match source.next_frame().context("cannot read the next frame")? {
            Some(frame) => frame,
            None => break,
        };

        let (overlay, tick_report) = tracker.process(&previous.gray, &frame.gray)?;
        surface.draw(tick_report.tick, &frame, &overlay)?;
        if let Some(writer) = report.as_mut() {
            serde_json::to_writer(&mut **writer, &tick_report)?;
            writeln!(writer)?;
        }

        summary.ticks += 1;
        if !overlay.estimate.is_zero() {
            summary.moving_ticks += 1;
        }
        summary.total.dx += overlay.estimate.dx;
        summary.total.dy += overlay.estimate.dy;
        Span::current().pb_inc(1);

        previous = frame;
    }

    if let Some(writer) = report {
        writer.flush()?;
    }
    Ok(summary)
}
