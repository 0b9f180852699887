use std::sync::OnceLock;

use crate::consensus::ConsensusParams;
use crate::frame::Region;
use crate::grid::GridParams;
use crate::my_types::*;
use crate::optical_flow::OpticalFlowParams;
use crate::overlay::InfoBox;
use crate::tracker::TrackerParams;

pub static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone)]
#[derive(clap::Parser)]
pub struct Config {
    #[clap(long, default_value = "0")]
    pub seed: u64,

    #[clap(long, default_value = "info")]
    pub log_level: String,

    /// monitored region inside the input frames
    #[clap(long, default_value = "560")]
    pub region_left: i32,
    #[clap(long, default_value = "140")]
    pub region_top: i32,
    #[clap(long, default_value = "800")]
    pub region_width: i32,
    #[clap(long, default_value = "800")]
    pub region_height: i32,

    /// tracking grid, in region coordinates
    #[clap(long, default_value = "300")]
    pub grid_width: i64,
    #[clap(long, default_value = "300")]
    pub grid_height: i64,
    #[clap(long, default_value = "400")]
    pub grid_center_x: f64,
    #[clap(long, default_value = "400")]
    pub grid_center_y: f64,
    #[clap(long, default_value = "20")]
    pub grid_pitch: i64,
    #[clap(long, default_value = "10")]
    pub regen_period: usize,

    #[clap(long, default_value = "0.6")]
    pub confidence_target: f64,
    #[clap(long, default_value = "50")]
    pub min_members: usize,
    #[clap(long, default_value = "6")]
    pub sample_count: usize,
    #[clap(long, default_value = "2")]
    pub inlier_threshold: f64,

    #[clap(long, default_value = "675")]
    pub anchor_x: i32,
    #[clap(long, default_value = "700")]
    pub anchor_y: i32,
    #[clap(long, default_value = "600")]
    pub box_left: i32,
    #[clap(long, default_value = "600")]
    pub box_top: i32,
    #[clap(long, default_value = "750")]
    pub box_right: i32,
    #[clap(long, default_value = "800")]
    pub box_bottom: i32,
    /// also keep the indicator below the region's width and height
    #[clap(long)]
    pub clamp_to_frame: bool,

    #[clap(long, default_value = "15")]
    pub lk_win_size: usize,
    #[clap(long, default_value = "3")]
    pub lk_levels: usize,
    #[clap(long, default_value = "10")]
    pub lk_iters: usize,
    #[clap(long, default_value = "0.03")]
    pub lk_term: f64,
}

impl Config {
    pub fn region(&self) -> Region {
        Region {
            left: self.region_left,
            top: self.region_top,
            width: self.region_width,
            height: self.region_height,
        }
    }

    pub fn optical_flow_params(&self) -> OpticalFlowParams {
        OpticalFlowParams {
            win_size: self.lk_win_size,
            levels: self.lk_levels,
            iters: self.lk_iters,
            term: self.lk_term,
            ..Default::default()
        }
    }

    pub fn tracker_params(&self) -> TrackerParams {
        let upper_bound = if self.clamp_to_frame {
            Some((self.region_width, self.region_height))
        } else {
            None
        };
        TrackerParams {
            grid: GridParams {
                height: self.grid_height,
                width: self.grid_width,
                center: Vector2d::new(self.grid_center_x, self.grid_center_y),
                pitch: self.grid_pitch,
            },
            regen_period: self.regen_period,
            consensus: ConsensusParams {
                confidence_target: self.confidence_target,
                min_members: self.min_members,
                sample_count: self.sample_count,
                inlier_threshold: self.inlier_threshold,
            },
            info_box: InfoBox {
                start_corner: (self.box_left, self.box_top),
                end_corner: (self.box_right, self.box_bottom),
                anchor: (self.anchor_x, self.anchor_y),
                upper_bound,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["region-motion"]);
        let params = config.tracker_params();
        assert_eq!(params.grid.center, Vector2d::new(400., 400.));
        assert_eq!(params.regen_period, 10);
        assert_eq!(params.consensus.min_members, 50);
        assert_eq!(params.info_box, InfoBox::default());
        assert_eq!(config.optical_flow_params().win_size, 15);
        assert_eq!(
            config.region(),
            Region {
                left: 560,
                top: 140,
                width: 800,
                height: 800
            }
        );
    }

    #[test]
    fn test_clamp_to_frame() {
        let config = Config::parse_from(["region-motion", "--clamp-to-frame", "--region-width", "640"]);
        assert_eq!(config.tracker_params().info_box.upper_bound, Some((640, 800)));
    }
}
