use anyhow::Result;
use ndarray as nd;

use crate::image::Image;
use crate::pyramid::Pyramid;

#[derive(Debug)]
pub struct PyramidFrame {
    /// original image
    pub image: Image,
    /// downsized images
    pub pyramid: Pyramid,
}

impl PyramidFrame {
    pub fn empty() -> Self {
        Self {
            image: Image::empty(),
            pyramid: Pyramid::empty(),
        }
    }

    /// Rebuild from `image`, cropped so that every level halves evenly.
    /// Buffers of the previous contents are reused.
    pub fn update(&mut self, image: &Image, levels: usize) -> Result<()> {
        let multiple = 1usize << levels;
        let width = image.width - image.width % multiple;
        let height = image.height - image.height % multiple;
        image.crop_into(width, height, &mut self.image);
        self.pyramid.compute(&self.image, levels)
    }

    pub fn get_image_at_level(&self, level: usize) -> &Image {
        if level == 0 {
            &self.image
        } else {
            &self.pyramid.levels[level - 1]
        }
    }
}

/// Screen rectangle being monitored, in source pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// One captured frame of the monitored region.
#[derive(Clone, Debug)]
pub struct Frame {
    /// grayscale copy handed to the point tracker
    pub gray: Image,
    /// `height x width x 3` BGR pixels the overlay is drawn onto
    pub color: nd::Array3<u8>,
}

impl Frame {
    /// Black frame, handy for sources that have nothing to show.
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            gray: Image::new(width, height),
            color: nd::Array3::zeros((height, width, 3)),
        }
    }
}

pub trait FrameSource {
    /// Next frame of the region, or None once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Number of frames, when known up front.
    fn frame_count(&self) -> Option<u64> {
        None
    }
}
