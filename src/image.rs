use crate::my_types::*;

/// Row-major grayscale image storage
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Image {
    /// Create an empty image
    pub fn empty() -> Image {
        Image {
            data: vec![],
            width: 0,
            height: 0,
        }
    }

    /// Create a black image of the given size
    pub fn new(width: usize, height: usize) -> Image {
        Image {
            data: vec![0; width * height],
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline(always)]
    pub fn value(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline(always)]
    pub fn set_value(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Copy the top-left `width` x `height` corner into `out`
    pub fn crop_into(&self, width: usize, height: usize, out: &mut Image) {
        let width = width.min(self.width);
        let height = height.min(self.height);
        out.data.clear();
        for y in 0..height {
            let row = y * self.width;
            out.data.extend_from_slice(&self.data[row..row + width]);
        }
        out.width = width;
        out.height = height;
    }
}

/// Bilinear interpolation. The caller keeps `p` inside the image; the right
/// and bottom neighbours are only read when the coordinate is fractional.
pub fn bilinear(image: &Image, p: Vector2d) -> f64 {
    let x0 = p.x.floor();
    let y0 = p.y.floor();
    let fx = p.x - x0;
    let fy = p.y - y0;
    let x0 = x0 as usize;
    let y0 = y0 as usize;

    let at = |x: usize, y: usize| image.value(x, y) as f64;
    let row = |y: usize| -> f64 {
        if fx > 0. {
            (1. - fx) * at(x0, y) + fx * at(x0 + 1, y)
        } else {
            at(x0, y)
        }
    };

    if fy > 0. {
        (1. - fy) * row(y0) + fy * row(y0 + 1)
    } else {
        row(y0)
    }
}
