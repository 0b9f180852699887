pub mod config;
pub mod consensus;
pub mod error;
pub mod frame;
pub mod grid;
pub mod image;
pub mod my_types;
pub mod optical_flow;
pub mod overlay;
pub mod pyramid;
pub mod tracker;
pub mod video;
pub mod visualization;
