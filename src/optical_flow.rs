use anyhow::Result;
use log::debug;
use nalgebra as na;

use crate::frame::PyramidFrame;
use crate::image::*;
use crate::my_types::*;

type Range = [[i16; 2]; 2];

/// Moves each point from the previous frame to its position in the current one.
///
/// The output is index-aligned with `points` and always has the same length;
/// points that could not be followed may keep their old coordinate or drift.
pub trait PointTracker {
    fn track(&mut self, old: &Image, new: &Image, points: &[Vector2d]) -> Result<Vec<Vector2d>>;
}

#[derive(Clone, Debug)]
pub struct OpticalFlowParams {
    /// side of the square integration window, odd
    pub win_size: usize,
    /// pyramid levels above the full resolution image
    pub levels: usize,
    pub iters: usize,
    /// stop iterating once the update is shorter than this
    pub term: f64,
    /// reject windows whose gradient matrix is this close to singular
    pub min_eig: f64,
    /// drop points that hit the iteration cap on some level
    pub require_convergence: bool,
}

impl Default for OpticalFlowParams {
    fn default() -> Self {
        Self {
            win_size: 15,
            levels: 3,
            iters: 10,
            term: 0.03,
            min_eig: 1e-4,
            require_convergence: false,
        }
    }
}

/// Scratch matrices for one integration window.
struct Window {
    ix: Matrixd,
    iy: Matrixd,
    it: Matrixd,
    grid: Matrixd,
}

/// Pyramidal Lucas-Kanade tracker.
pub struct OpticalFlow {
    params: OpticalFlowParams,
    window: Window,
    frames: [PyramidFrame; 2],
}

impl OpticalFlow {
    pub fn new(params: OpticalFlowParams) -> OpticalFlow {
        let n = params.win_size;
        OpticalFlow {
            params,
            window: Window {
                ix: na::DMatrix::zeros(n, n),
                iy: na::DMatrix::zeros(n, n),
                it: na::DMatrix::zeros(n, n),
                grid: na::DMatrix::zeros(n, n),
            },
            frames: [PyramidFrame::empty(), PyramidFrame::empty()],
        }
    }
}

impl PointTracker for OpticalFlow {
    fn track(&mut self, old: &Image, new: &Image, points: &[Vector2d]) -> Result<Vec<Vector2d>> {
        let [frame0, frame1] = &mut self.frames;
        frame0.update(old, self.params.levels)?;
        frame1.update(new, self.params.levels)?;

        let mut lost = 0;
        let mut tracked = Vec::with_capacity(points.len());
        for &point0 in points {
            match self.window.process_point(&self.params, frame0, frame1, point0) {
                Some(point1) => tracked.push(point1),
                None => {
                    // lost points stay put and drop out of the direction vote
                    lost += 1;
                    tracked.push(point0);
                }
            }
        }
        debug!("optical flow lost {}/{} points", lost, points.len());
        Ok(tracked)
    }
}

impl Window {
    /// ref http://robots.stanford.edu/cs223b04/algo_tracking.pdf
    fn process_point(
        &mut self,
        params: &OpticalFlowParams,
        pyramid_frame0: &PyramidFrame,
        pyramid_frame1: &PyramidFrame,
        point0: Vector2d,
    ) -> Option<Vector2d> {
        let term2 = params.term.powi(2);
        let r = (params.win_size - 1) / 2;

        let mut g = Vector2d::zeros();
        let mut d = Vector2d::zeros();
        for level in (0..params.levels + 1).rev() {
            let level0 = pyramid_frame0.get_image_at_level(level);
            let level1 = pyramid_frame1.get_image_at_level(level);
            let u = point0 / u32::pow(2, level as u32) as f64;
            let range = integration_range(level0, u, r, 1)?;
            // compute the derivative
            scharr(level0, u, range, &mut self.ix, &mut self.iy, &mut self.grid);
            let gradient = spatial_gradient(&self.ix, &self.iy);
            if gradient.symmetric_eigenvalues().min() < params.min_eig {
                return None;
            }
            let mut converged = false;
            let mut nu = Vector2d::zeros();
            for _ in 0..params.iters {
                image_difference(range, r, &self.grid, &mut self.it, level1, u + g + nu)?;
                let eta = flow_vector(&gradient, &self.ix, &self.iy, &self.it)?;
                nu += eta;
                if eta.norm_squared() < term2 {
                    converged = true;
                    break;
                }
            }

            d = nu;
            if !converged && params.require_convergence {
                return None;
            }
            if level > 0 {
                g = 2. * (g + d)
            }
        }

        Some(point0 + g + d)
    }
}

fn flow_vector(gradient: &Matrix2d, ix: &Matrixd, iy: &Matrixd, it: &Matrixd) -> Option<Vector2d> {
    let mut b = Vector2d::zeros();

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            b[0] += it[(y, x)] * ix[(y, x)];
            b[1] += it[(y, x)] * iy[(y, x)];
        }
    }

    gradient.try_inverse().map(|inv_g| inv_g * b)
}

/// Fill `it` with the difference between the first window `i0` and the
/// second image sampled around `center`. Fails when the window would be
/// clipped differently than in the first image.
fn image_difference(
    prev_range: Range,
    r: usize,
    i0: &Matrixd,
    it: &mut Matrixd,
    level: &Image,
    center: Vector2d,
) -> Option<()> {
    let range = integration_range(level, center, r, 0)?;
    if range != prev_range {
        return None;
    }
    fill_grid(level, range, center, it);
    *it *= -1.;
    *it += i0.view((1, 1), (it.nrows(), it.ncols()));
    Some(())
}

fn spatial_gradient(ix: &Matrixd, iy: &Matrixd) -> Matrix2d {
    assert_eq!(ix.nrows(), iy.nrows());
    assert_eq!(ix.ncols(), iy.ncols());

    let mut x2 = 0.;
    let mut y2 = 0.;
    let mut xy = 0.;

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            x2 += ix[(y, x)] * ix[(y, x)];
            y2 += iy[(y, x)] * iy[(y, x)];
            xy += ix[(y, x)] * iy[(y, x)];
        }
    }

    Matrix2d::new(x2, xy, xy, y2)
}

/// ref https://theailearner.com/tag/scharr-operator/
fn scharr(
    level: &Image,
    center: Vector2d,
    range: Range,
    out_x: &mut Matrixd,
    out_y: &mut Matrixd,
    grid: &mut Matrixd,
) {
    let grange = [
        [range[0][0] - 1, range[0][1] + 1],
        [range[1][0] - 1, range[1][1] + 1],
    ];
    fill_grid(level, grange, center, grid);

    *out_x = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    *out_y = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    for y in 1..(grid.nrows() - 1) {
        for x in 1..(grid.ncols() - 1) {
            out_x[(y - 1, x - 1)] =
                (10. * grid[(y, x + 1)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y - 1, x + 1)]
                    - 10. * grid[(y, x - 1)]
                    - 3. * grid[(y + 1, x - 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
            out_y[(y - 1, x - 1)] =
                (10. * grid[(y + 1, x)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y + 1, x - 1)]
                    - 10. * grid[(y - 1, x)]
                    - 3. * grid[(y - 1, x + 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
        }
    }
}

fn fill_grid(level: &Image, range: Range, center: Vector2d, grid: &mut Matrixd) {
    *grid = na::DMatrix::zeros(
        (range[1][1] - range[1][0] + 1) as usize,
        (range[0][1] - range[0][0] + 1) as usize,
    );

    for (y_ind, y) in (range[1][0]..=range[1][1]).enumerate() {
        for (x_ind, x) in (range[0][0]..=range[0][1]).enumerate() {
            grid[(y_ind, x_ind)] = bilinear(level, center + Vector2d::new(x as f64, y as f64));
        }
    }
}

/// Returns closed range of integer steps that can be taken without going outside
/// the image borders. Returns None if the center point is outside the level
/// boundaries.
fn integration_range(level: &Image, center: Vector2d, r: usize, padding: i16) -> Option<Range> {
    if level.is_empty() {
        return None;
    }
    let r = r as i16;
    let mut range = [[0, 0], [0, 0]];
    for i in 0..2 {
        let s = if i == 0 { level.width } else { level.height };
        if center[i] < 0. || center[i] > (s - 1) as f64 {
            return None;
        }
        let n = center[i] as i16;
        let fract = if center[i].fract() > 0. { 1 } else { 0 };
        range[i] = [
            i16::max(-r, -n + padding),
            i16::min(r, s as i16 - n - padding - 1 - fract),
        ];
        if range[i][0] > range[i][1] {
            return None;
        }
    }
    Some(range)
}
