//! edv - Experiment Display Visualizer
//!
//! Perspective-warps a rectangular display image onto the four corners a
//! template defines and composites it onto the template's base image.
//!
//! The core is I/O free:
//! - [`transform::solve`] computes the inverse projective coefficients
//! - [`composite::composite`] adjusts brightness, warps and blends
//!
//! [`template`] and [`output`] hold the file-system glue used by the binary.

pub mod color;
pub mod composite;
pub mod config;
pub mod error;
pub mod output;
pub mod template;
pub mod transform;

pub use config::{CornerCoords, Point, Quad};
pub use error::{EdvError, EdvResult};
pub use template::Template;
pub use transform::TransformCoefficients;
