use cv2::prelude::*;
use opencv as cv2;

use anyhow::{anyhow, Result};
use ndarray as nd;
use rerun::{RecordingStream, RecordingStreamBuilder};
use std::path::Path;

use crate::frame::Frame;
use crate::my_types::*;
use crate::overlay::*;

/// Where the overlay ends up.
pub trait RenderSurface {
    fn draw(&mut self, tick: u64, frame: &Frame, overlay: &Overlay) -> Result<()>;
}

trait AsArray {
    fn try_as_array(&self) -> Result<nd::Array3<u8>>;
}

impl AsArray for cv2::core::Mat {
    fn try_as_array(&self) -> Result<nd::Array3<u8>> {
        let bytes = self.data_bytes()?;
        let size = self.size()?;
        let a = nd::ArrayView3::from_shape((size.height as usize, size.width as usize, 3), bytes)?;
        Ok(a.to_owned())
    }
}

fn color_to_cv_8uc3(color: &nd::Array3<u8>) -> Result<cv2::core::Mat> {
    let (rows, cols, _) = color.dim();
    let mut mat = cv2::core::Mat::new_rows_cols_with_default(
        rows as i32,
        cols as i32,
        cv2::core::CV_8UC3,
        cv2::core::Scalar::all(0.),
    )?;
    let contiguous = color.as_standard_layout();
    let bytes = contiguous
        .as_slice()
        .ok_or(anyhow!("color frame is not contiguous"))?;
    mat.data_bytes_mut()?.copy_from_slice(bytes);
    Ok(mat)
}

fn cv_point(p: Pixel) -> cv2::core::Point {
    cv2::core::Point { x: p.0, y: p.1 }
}

fn cv_color(c: Color) -> cv2::core::Scalar {
    cv2::core::Scalar::new(c[0] as f64, c[1] as f64, c[2] as f64, 0.0)
}

/// Draw the info box, the anchor ring and the filled indicator onto a BGR
/// frame and return the result as RGB.
pub fn visualize_overlay(frame: &Frame, overlay: &Overlay) -> Result<nd::Array3<u8>> {
    let mut color_mat = color_to_cv_8uc3(&frame.color)?;
    let info_box = &overlay.info_box;

    cv2::imgproc::rectangle_points(
        &mut color_mat,
        cv_point(info_box.start_corner),
        cv_point(info_box.end_corner),
        cv_color(BOX_COLOR),
        info_box.box_thickness,
        cv2::imgproc::LINE_8,
        0,
    )?;
    cv2::imgproc::circle(
        &mut color_mat,
        cv_point(info_box.anchor),
        info_box.marker_radius,
        cv_color(ANCHOR_COLOR),
        info_box.anchor_thickness,
        cv2::imgproc::LINE_8,
        0,
    )?;
    cv2::imgproc::circle(
        &mut color_mat,
        cv_point(overlay.indicator),
        info_box.marker_radius,
        cv_color(INDICATOR_COLOR),
        cv2::imgproc::FILLED,
        cv2::imgproc::LINE_8,
        0,
    )?;

    let mut rgb_mat = cv2::core::Mat::default();
    cv2::imgproc::cvt_color(&color_mat, &mut rgb_mat, cv2::imgproc::COLOR_BGR2RGB, 0)?;
    rgb_mat.try_as_array()
}

/// Logs every annotated frame and the estimate to a rerun recording.
pub struct RerunSurface {
    recorder: RecordingStream,
}

impl RerunSurface {
    pub fn save(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let recorder = RecordingStreamBuilder::new("region_motion").save(path)?;
        Ok(Self { recorder })
    }
}

impl RenderSurface for RerunSurface {
    fn draw(&mut self, tick: u64, frame: &Frame, overlay: &Overlay) -> Result<()> {
        self.recorder.set_time_sequence("tick", tick as i64);

        let image = visualize_overlay(frame, overlay)?;
        self.recorder
            .log("region/overlay", &rerun::Image::try_from(image)?)?;
        self.recorder.log(
            "motion/dx",
            &rerun::TimeSeriesScalar::new(overlay.estimate.dx),
        )?;
        self.recorder.log(
            "motion/dy",
            &rerun::TimeSeriesScalar::new(overlay.estimate.dy),
        )?;
        Ok(())
    }
}
