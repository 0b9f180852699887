use cv2::prelude::*;
use opencv as cv2;

use anyhow::{bail, Context as AnyhowContext, Result};
use log::{info, warn};
use ndarray as nd;

use crate::frame::{Frame, FrameSource, Region};
use crate::image::Image;

/// Reads the monitored region out of a video file or a capture device.
pub struct VideoSource {
    capture: cv2::videoio::VideoCapture,
    region: Region,
    frame_count: Option<u64>,
    bgr: cv2::core::Mat,
}

impl VideoSource {
    /// `input` is a path, or a device index such as `0`.
    pub fn open(input: &str, region: Region) -> Result<Self> {
        let capture = match input.parse::<i32>() {
            Ok(index) => cv2::videoio::VideoCapture::new(index, cv2::videoio::CAP_ANY)?,
            Err(_) => cv2::videoio::VideoCapture::from_file(input, cv2::videoio::CAP_ANY)?,
        };
        if !capture.is_opened()? {
            bail!("cannot open video input {}", input);
        }

        let frame_count = capture.get(cv2::videoio::CAP_PROP_FRAME_COUNT)?;
        let frame_count = if frame_count > 0. {
            Some(frame_count as u64)
        } else {
            None
        };
        info!("opened {} ({:?} frames), region {:?}", input, frame_count, region);

        Ok(Self {
            capture,
            region,
            frame_count,
            bgr: cv2::core::Mat::default(),
        })
    }

    fn crop(&self) -> Result<cv2::core::Mat> {
        let size = self.bgr.size()?;
        let r = self.region;
        if r.left < 0
            || r.top < 0
            || r.width <= 0
            || r.height <= 0
            || r.left + r.width > size.width
            || r.top + r.height > size.height
        {
            bail!(
                "region {:?} does not fit in a {} x {} frame",
                r,
                size.width,
                size.height
            );
        }
        let roi = cv2::core::Mat::roi(
            &self.bgr,
            cv2::core::Rect::new(r.left, r.top, r.width, r.height),
        )?;
        let mut cropped = cv2::core::Mat::default();
        roi.copy_to(&mut cropped)?;
        Ok(cropped)
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.capture.read(&mut self.bgr)? || self.bgr.empty() {
            return Ok(None);
        }
        if self.bgr.channels() != 3 {
            warn!("expected a 3 channel frame, got {}", self.bgr.channels());
        }

        let cropped = self.crop()?;
        let mut gray = cv2::core::Mat::default();
        cv2::imgproc::cvt_color(&cropped, &mut gray, cv2::imgproc::COLOR_BGR2GRAY, 0)?;

        let width = self.region.width as usize;
        let height = self.region.height as usize;
        let gray = Image {
            data: gray.data_bytes()?.to_vec(),
            width,
            height,
        };
        let color = nd::ArrayView3::from_shape((height, width, 3), cropped.data_bytes()?)
            .context("unexpected color frame layout")?
            .to_owned();

        Ok(Some(Frame { gray, color }))
    }

    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }
}
