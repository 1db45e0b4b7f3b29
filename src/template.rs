//! Template loading and validation
//!
//! A template is a directory holding the background image (`base.png`),
//! an optional greyscale mask (`mask.png`) and the corner record
//! (`coords.yml`, or `coords.toml`) that says where the display lands on
//! the base image.

use image::{GrayImage, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{CornerCoords, Quad};
use crate::error::{EdvError, EdvResult};

pub const BASE_FILE: &str = "base.png";
pub const MASK_FILE: &str = "mask.png";
pub const COORDS_FILE: &str = "coords.yml";
pub const COORDS_TOML_FILE: &str = "coords.toml";

/// Background, optional mask and target corners of one template
#[derive(Debug, Clone)]
pub struct Template {
    base: RgbaImage,
    mask: Option<GrayImage>,
    target: Quad,
}

impl Template {
    /// Assemble a template from in-memory parts
    ///
    /// The mask, when present, must match the base image size.
    pub fn new(base: RgbaImage, mask: Option<GrayImage>, target: Quad) -> EdvResult<Self> {
        if let Some(mask) = &mask {
            if mask.dimensions() != base.dimensions() {
                let (mw, mh) = mask.dimensions();
                let (bw, bh) = base.dimensions();
                return Err(EdvError::configuration(format!(
                    "mask is {}x{} but base image is {}x{}",
                    mw, mh, bw, bh
                )));
            }
        }
        Ok(Self { base, mask, target })
    }

    /// Load template `name` from `templates_dir`
    pub fn load(templates_dir: &Path, name: &str) -> EdvResult<Self> {
        let dir = templates_dir.join(name);
        if !dir.is_dir() {
            return Err(EdvError::not_found(dir));
        }

        let base_path = dir.join(BASE_FILE);
        let base = open_image(&base_path)?.to_rgba8();

        let mask_path = dir.join(MASK_FILE);
        let mask = if mask_path.exists() {
            debug!("Using mask {:?}", mask_path);
            Some(open_image(&mask_path)?.to_luma8())
        } else {
            debug!("No mask in template {}, treating base as fully opaque", name);
            None
        };

        let coords = read_coords(&dir)?;

        let template = Self::new(base, mask, coords.to_quad())?;
        let (w, h) = template.base.dimensions();
        info!("Loaded template {} ({}x{})", name, w, h);
        Ok(template)
    }

    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    pub fn mask(&self) -> Option<&GrayImage> {
        self.mask.as_ref()
    }

    pub fn target(&self) -> &Quad {
        &self.target
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.base.dimensions()
    }
}

fn open_image(path: &Path) -> EdvResult<image::DynamicImage> {
    if !path.exists() {
        return Err(EdvError::not_found(path));
    }
    Ok(image::open(path)?)
}

/// Read the corner record, preferring `coords.yml` over `coords.toml`
fn read_coords(dir: &Path) -> EdvResult<CornerCoords> {
    let yaml_path = dir.join(COORDS_FILE);
    if yaml_path.is_file() {
        return CornerCoords::parse_yaml(&std::fs::read_to_string(&yaml_path)?);
    }

    let toml_path = dir.join(COORDS_TOML_FILE);
    if toml_path.is_file() {
        debug!("Reading corners from {:?}", toml_path);
        return CornerCoords::parse_toml(&std::fs::read_to_string(&toml_path)?);
    }
    Err(EdvError::not_found(yaml_path))
}

fn has_coords(dir: &Path) -> bool {
    dir.join(COORDS_FILE).is_file() || dir.join(COORDS_TOML_FILE).is_file()
}

/// Names of the templates available in `templates_dir`, sorted
pub fn list_templates(templates_dir: &Path) -> EdvResult<Vec<String>> {
    if !templates_dir.is_dir() {
        return Err(EdvError::not_found(templates_dir));
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(templates_dir)? {
        let path: PathBuf = entry?.path();
        if has_coords(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
