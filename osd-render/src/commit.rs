//! Atomic output commit
//!
//! The overlay file is read by another process (a video compositor) while
//! we keep replacing it. Frames are written to a temporary file in the same
//! directory and renamed over the target, so a reader sees either the old
//! or the new complete image.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use tempfile::NamedTempFile;

use crate::error::RenderError;

/// Directory that will hold `path`, creating it if needed
fn output_dir(path: &Path) -> Result<PathBuf, RenderError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix(".osd-")
        .suffix(".png.tmp")
        .tempfile_in(dir)?;

    // Temp files are created private; the overlay is meant to be shared
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))?;
    }

    Ok(file)
}

/// Encode `image` as PNG and atomically replace `path` with it
pub fn commit_png(image: &RgbaImage, path: &Path) -> Result<(), RenderError> {
    let dir = output_dir(path)?;
    let mut file = temp_file_in(&dir)?;

    {
        let mut writer = BufWriter::new(file.as_file_mut());
        PngEncoder::new(&mut writer).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )?;
        writer.flush()?;
    }

    file.persist(path).map_err(|source| RenderError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Check at startup that frames can be committed to `path`
///
/// Creates missing parent directories and drops a probe file next to the
/// target. Nothing is left behind on success.
pub fn probe_output(path: &Path) -> Result<(), RenderError> {
    let dir = output_dir(path).map_err(|e| match e {
        RenderError::Io(source) => RenderError::OutputNotWritable {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;

    temp_file_in(&dir)
        .map(drop)
        .map_err(|source| RenderError::OutputNotWritable { path: dir, source })
}
