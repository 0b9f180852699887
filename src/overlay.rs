use crate::consensus::MotionEstimate;
use crate::my_types::*;

/// BGR color as understood by the render surface
pub type Color = [u8; 3];

pub const BOX_COLOR: Color = [0, 255, 0];
pub const ANCHOR_COLOR: Color = [0, 0, 255];
pub const INDICATOR_COLOR: Color = [0, 255, 255];

/// Where the motion indicator lands for a displacement of `(dx, dy)`.
///
/// Both axes are rounded up and never negative.
pub fn indicator_position(anchor: Pixel, dx: f64, dy: f64) -> Pixel {
    indicator_position_bounded(anchor, dx, dy, None)
}

/// Same as [`indicator_position`], optionally also keeping the indicator
/// inside a `(width, height)` frame.
pub fn indicator_position_bounded(
    anchor: Pixel,
    dx: f64,
    dy: f64,
    upper_bound: Option<(i32, i32)>,
) -> Pixel {
    let clamp_axis = |value: f64, limit: Option<i32>| -> i32 {
        let mut v = (value.ceil() as i32).max(0);
        if let Some(limit) = limit {
            v = v.min((limit - 1).max(0));
        }
        v
    };
    (
        clamp_axis(anchor.0 as f64 + dx, upper_bound.map(|b| b.0)),
        clamp_axis(anchor.1 as f64 + dy, upper_bound.map(|b| b.1)),
    )
}

/// Static layout of the information box drawn over each frame.
#[derive(Clone, Debug, PartialEq)]
pub struct InfoBox {
    pub start_corner: Pixel,
    pub end_corner: Pixel,
    /// reference point the indicator moves away from
    pub anchor: Pixel,
    pub marker_radius: i32,
    pub box_thickness: i32,
    pub anchor_thickness: i32,
    /// keep the indicator inside a `(width, height)` frame
    pub upper_bound: Option<(i32, i32)>,
}

impl Default for InfoBox {
    fn default() -> Self {
        Self {
            start_corner: (600, 600),
            end_corner: (750, 800),
            anchor: (675, 700),
            marker_radius: 5,
            box_thickness: 3,
            anchor_thickness: 2,
            upper_bound: None,
        }
    }
}

impl InfoBox {
    pub fn place(&self, estimate: &MotionEstimate) -> Overlay {
        Overlay {
            info_box: self.clone(),
            estimate: *estimate,
            indicator: indicator_position_bounded(
                self.anchor,
                estimate.dx,
                estimate.dy,
                self.upper_bound,
            ),
        }
    }
}

/// Everything the render surface needs for one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub info_box: InfoBox,
    pub estimate: MotionEstimate,
    pub indicator: Pixel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_rounds_up() {
        assert_eq!(indicator_position((675, 700), 0., 0.), (675, 700));
        assert_eq!(indicator_position((675, 700), 2.2, -3.7), (678, 697));
        assert_eq!(indicator_position((10, 10), -0.5, 0.5), (10, 11));
    }

    #[test]
    fn test_indicator_clamped_at_zero() {
        assert_eq!(indicator_position((675, 700), -700., -750.), (0, 0));
        assert_eq!(indicator_position((5, 5), -3., -30.), (2, 0));
    }

    #[test]
    fn test_indicator_has_no_upper_clamp_by_default() {
        assert_eq!(indicator_position((675, 700), 5000., 10.), (5675, 710));
    }

    #[test]
    fn test_indicator_upper_bound() {
        let p = indicator_position_bounded((675, 700), 500., 20., Some((800, 800)));
        assert_eq!(p, (799, 720));
        let p = indicator_position_bounded((675, 700), -800., 500., Some((800, 800)));
        assert_eq!(p, (0, 799));
    }

    #[test]
    fn test_place() {
        let info_box = InfoBox::default();
        let overlay = info_box.place(&MotionEstimate { dx: 5., dy: -5. });
        assert_eq!(overlay.indicator, (680, 695));
        assert_eq!(overlay.info_box.anchor, (675, 700));
    }
}
