//! Configuration management for edv
//!
//! Holds the geometry types shared by the solver and the compositor, the
//! corner record stored in each template, and the optional application
//! configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EdvError, EdvResult};

/// A 2D point in pixel coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

/// Four corners of a quadrilateral
/// Order: upper-left, upper-right, lower-right, lower-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [Point; 4],
}

impl Quad {
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    /// Build a quad from an arbitrary point list, which must hold exactly 4 points
    pub fn from_points(points: &[Point]) -> EdvResult<Self> {
        let corners: [Point; 4] = points.try_into().map_err(|_| {
            EdvError::configuration(format!(
                "a quadrilateral needs exactly 4 points, got {}",
                points.len()
            ))
        })?;
        Ok(Self { corners })
    }

    /// The full frame of an image of the given size
    pub fn from_size(width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self::new([
            Point::new(0.0, 0.0), // Upper-left
            Point::new(w, 0.0),   // Upper-right
            Point::new(w, h),     // Lower-right
            Point::new(0.0, h),   // Lower-left
        ])
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.corners
    }

    /// Axis-aligned bounding box as (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }
}

/// Corner record stored as `coords.yml` (or `coords.toml`) in every template
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CornerCoords {
    #[serde(deserialize_with = "deserialize_corner")]
    pub upper_left: [f64; 2],
    #[serde(deserialize_with = "deserialize_corner")]
    pub upper_right: [f64; 2],
    #[serde(deserialize_with = "deserialize_corner")]
    pub lower_right: [f64; 2],
    #[serde(deserialize_with = "deserialize_corner")]
    pub lower_left: [f64; 2],
}

/// A corner is exactly two numbers; longer or shorter lists are rejected
fn deserialize_corner<'de, D>(deserializer: D) -> std::result::Result<[f64; 2], D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = Vec::<f64>::deserialize(deserializer)?;
    match values.as_slice() {
        [x, y] => Ok([*x, *y]),
        _ => Err(serde::de::Error::invalid_length(
            values.len(),
            &"a coordinate pair [x, y]",
        )),
    }
}

impl CornerCoords {
    /// Parse the YAML record shipped with edv templates
    pub fn parse_yaml(content: &str) -> EdvResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| EdvError::configuration(format!("invalid corner coordinates: {}", e)))
    }

    pub fn parse_toml(content: &str) -> EdvResult<Self> {
        toml::from_str(content)
            .map_err(|e| EdvError::configuration(format!("invalid corner coordinates: {}", e)))
    }

    pub fn to_quad(&self) -> Quad {
        Quad::new([
            self.upper_left.into(),
            self.upper_right.into(),
            self.lower_right.into(),
            self.lower_left.into(),
        ])
    }
}

/// Template lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory holding one subdirectory per template
    #[serde(default = "default_templates_dir")]
    pub dir: PathBuf,
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: default_templates_dir(),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Prepended to the display file name when no output path is given
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Image viewer command used by `--show`; platform default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<String>,
}

fn default_prefix() -> String {
    "Figure_".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            viewer: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a file, falling back to defaults if it doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No configuration at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn parse(content: &str) -> EdvResult<Self> {
        toml::from_str(content).map_err(|e| EdvError::configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_from_size() {
        let q = Quad::from_size(640, 480);
        assert_eq!(q.corners[0], Point::new(0.0, 0.0));
        assert_eq!(q.corners[1], Point::new(640.0, 0.0));
        assert_eq!(q.corners[2], Point::new(640.0, 480.0));
        assert_eq!(q.corners[3], Point::new(0.0, 480.0));
        assert_eq!(q.bounds(), (0.0, 0.0, 640.0, 480.0));
    }

    #[test]
    fn test_quad_wrong_point_count() {
        let pts = [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)];
        let err = Quad::from_points(&pts).unwrap_err();
        assert!(matches!(err, EdvError::Configuration(_)));

        let pts = [pts[0], pts[1], pts[2], Point::new(0.0, 1.0)];
        assert!(Quad::from_points(&pts).is_ok());
    }

    #[test]
    fn test_corner_coords_order() {
        let coords = CornerCoords::parse_toml(
            r#"
            upper_left = [10, 12]
            upper_right = [110.5, 10]
            lower_right = [112, 111]
            lower_left = [9, 108]
            "#,
        )
        .unwrap();
        let q = coords.to_quad();
        assert_eq!(q.corners[0], Point::new(10.0, 12.0));
        assert_eq!(q.corners[1], Point::new(110.5, 10.0));
        assert_eq!(q.corners[2], Point::new(112.0, 111.0));
        assert_eq!(q.corners[3], Point::new(9.0, 108.0));
    }

    #[test]
    fn test_corner_coords_missing_key() {
        let err = CornerCoords::parse_toml(
            r#"
            upper_left = [10, 12]
            upper_right = [110, 10]
            lower_right = [112, 111]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EdvError::Configuration(_)));
    }

    #[test]
    fn test_corner_coords_wrong_arity() {
        let err = CornerCoords::parse_toml(
            r#"
            upper_left = [10, 12, 3]
            upper_right = [110, 10]
            lower_right = [112, 111]
            lower_left = [9, 108]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EdvError::Configuration(_)));
    }

    #[test]
    fn test_corner_coords_yaml() {
        let coords = CornerCoords::parse_yaml(
            "upper_left: [10, 12]\nupper_right: [110.5, 10]\nlower_right: [112, 111]\nlower_left: [9, 108]\n",
        )
        .unwrap();
        assert_eq!(coords.upper_right, [110.5, 10.0]);
        assert_eq!(coords.to_quad().corners[3], Point::new(9.0, 108.0));
    }

    #[test]
    fn test_corner_coords_yaml_wrong_arity() {
        for content in [
            "upper_left: [10]\nupper_right: [110, 10]\nlower_right: [112, 111]\nlower_left: [9, 108]\n",
            "upper_left: [10, 12, 3]\nupper_right: [110, 10]\nlower_right: [112, 111]\nlower_left: [9, 108]\n",
        ] {
            assert!(matches!(
                CornerCoords::parse_yaml(content),
                Err(EdvError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.templates.dir, PathBuf::from("templates"));
        assert_eq!(config.output.prefix, "Figure_");
        assert!(config.output.viewer.is_none());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            [output]
            viewer = "eog"
            "#,
        )
        .unwrap();
        assert_eq!(config.output.prefix, "Figure_");
        assert_eq!(config.output.viewer.as_deref(), Some("eog"));
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("edv.toml")).unwrap();
        assert_eq!(config.output.prefix, "Figure_");
    }
}
