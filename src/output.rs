//! Output of the composited image
//!
//! The result is either written to a file (format chosen from the
//! extension) or handed to an image viewer through a temporary PNG.

use image::{ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{EdvError, EdvResult};

/// Default output path: `prefix` prepended to the display's file name,
/// next to the display
pub fn default_output_path(display: &Path, prefix: &str) -> EdvResult<PathBuf> {
    let file_name = display
        .file_name()
        .ok_or_else(|| EdvError::configuration(format!("{:?} has no file name", display)))?;

    let mut name = std::ffi::OsString::from(prefix);
    name.push(file_name);
    Ok(display.with_file_name(name))
}

/// Write the image to `path`
pub fn save(image: &RgbaImage, path: &Path) -> EdvResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(EdvError::not_found(parent));
        }
    }
    if is_jpeg(path) {
        // JPEG has no alpha channel
        image::DynamicImage::ImageRgba8(image.clone()).to_rgb8().save(path)?;
    } else {
        image.save(path)?;
    }
    info!("Saved {}x{} image to {:?}", image.width(), image.height(), path);
    Ok(())
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// Show the image with `viewer`, or the platform's default viewer
///
/// The preview file is left for the viewer, which may still be opening it
/// after edv exits. It is removed here only if the viewer fails to start.
pub fn show(image: &RgbaImage, viewer: Option<&str>) -> EdvResult<()> {
    let preview = write_preview(image)?;

    let mut command = viewer_command(viewer);
    command.arg(preview.path());
    info!("Opening preview with {:?}", command.get_program());
    command.spawn()?;

    let (_, path) = preview.keep().map_err(|e| e.error)?;
    debug!("Preview kept at {:?}", path);
    Ok(())
}

/// Write the image to a fresh, uniquely named PNG in the temp directory
///
/// The file is deleted when the handle is dropped unless it is kept.
fn write_preview(image: &RgbaImage) -> EdvResult<NamedTempFile> {
    let preview = tempfile::Builder::new()
        .prefix("edv-")
        .suffix(".png")
        .tempfile()?;
    image.save_with_format(preview.path(), ImageFormat::Png)?;
    debug!("Wrote preview to {:?}", preview.path());
    Ok(preview)
}

fn viewer_command(viewer: Option<&str>) -> Command {
    if let Some(viewer) = viewer {
        return Command::new(viewer);
    }

    if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    } else {
        Command::new("xdg-open")
    }
}
