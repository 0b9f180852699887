use crate::error::MotionError;
use crate::my_types::*;

/// gap between neighbouring grid points, in screen units
pub const GRID_PITCH: i64 = 20;

#[derive(Clone, Debug)]
pub struct GridParams {
    /// span of the tracked area along y
    pub height: i64,
    /// span of the tracked area along x
    pub width: i64,
    pub center: Vector2d,
    pub pitch: i64,
}

impl GridParams {
    pub fn create(&self) -> Result<Grid, MotionError> {
        create_grid_with_pitch(self.height, self.width, self.center, self.pitch)
    }
}

/// Two aligned copies of the same lattice.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    /// lattice coordinates that never move, kept for debugging
    pub reference_points: Vec<Vector2d>,
    /// the points handed to the point tracker
    pub tracking_points: Vec<Vector2d>,
}

impl Grid {
    pub fn len(&self) -> usize {
        self.tracking_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracking_points.is_empty()
    }
}

pub fn create_grid(height: i64, width: i64, center: Vector2d) -> Result<Grid, MotionError> {
    create_grid_with_pitch(height, width, center, GRID_PITCH)
}

/// Lay out an evenly spaced lattice centered on `center`.
///
/// The top-left point sits at `center - (width / 2, height / 2)` and the
/// lattice holds `width / pitch + 1` columns and `height / pitch + 1` rows,
/// stored row by row.
pub fn create_grid_with_pitch(
    height: i64,
    width: i64,
    center: Vector2d,
    pitch: i64,
) -> Result<Grid, MotionError> {
    if height <= 0 || width <= 0 {
        return Err(MotionError::InvalidRegion { height, width });
    }
    if pitch <= 0 {
        return Err(MotionError::InvalidPitch(pitch));
    }

    let origin = center - Vector2d::new((width / 2) as f64, (height / 2) as f64);
    let columns = width / pitch + 1;
    let rows = height / pitch + 1;

    let mut reference_points = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for column in 0..columns {
            reference_points.push(
                origin + Vector2d::new((column * pitch) as f64, (row * pitch) as f64),
            );
        }
    }
    let tracking_points = reference_points.clone();

    Ok(Grid {
        reference_points,
        tracking_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_layout() {
        let grid = create_grid(100, 100, Vector2d::new(50., 50.)).unwrap();
        assert_eq!(grid.len(), 36);
        assert_eq!(grid.tracking_points[0], Vector2d::new(0., 0.));
        assert_eq!(grid.tracking_points[1], Vector2d::new(20., 0.));
        assert_eq!(grid.tracking_points[6], Vector2d::new(0., 20.));
        assert_eq!(grid.tracking_points[35], Vector2d::new(100., 100.));
        assert_eq!(grid.reference_points, grid.tracking_points);

        for row in grid.tracking_points.chunks(6) {
            for pair in row.windows(2) {
                assert_eq!(pair[1] - pair[0], Vector2d::new(20., 0.));
            }
        }
    }

    #[test]
    fn test_grid_rectangular_region() {
        // 300 wide, 100 tall: 16 columns, 6 rows
        let grid = create_grid(100, 300, Vector2d::new(400., 400.)).unwrap();
        assert_eq!(grid.len(), 16 * 6);
        assert_eq!(grid.tracking_points[0], Vector2d::new(250., 350.));
        assert_eq!(grid.tracking_points[15], Vector2d::new(550., 350.));
        assert_eq!(grid.tracking_points[16], Vector2d::new(250., 370.));
    }

    #[test]
    fn test_grid_odd_size_uses_floor() {
        let grid = create_grid(45, 45, Vector2d::new(10.5, 10.5)).unwrap();
        // 45 / 20 + 1 = 3 points per axis, origin at 10.5 - 22
        assert_eq!(grid.len(), 9);
        assert_eq!(grid.tracking_points[0], Vector2d::new(-11.5, -11.5));
    }

    #[test]
    fn test_grid_smaller_than_pitch() {
        let grid = create_grid(5, 5, Vector2d::new(10., 10.)).unwrap();
        assert_eq!(grid.tracking_points, vec![Vector2d::new(8., 8.)]);
    }

    #[test]
    fn test_grid_rejects_degenerate_region() {
        let center = Vector2d::new(0., 0.);
        assert_eq!(
            create_grid(0, 100, center),
            Err(MotionError::InvalidRegion {
                height: 0,
                width: 100
            })
        );
        assert!(create_grid(100, -3, center).is_err());
        assert_eq!(
            create_grid_with_pitch(100, 100, center, 0),
            Err(MotionError::InvalidPitch(0))
        );
    }
}
