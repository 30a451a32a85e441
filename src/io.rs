use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageFormat, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::Result;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Encode an RGBA image as PNG bytes (lossless).
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Decode PNG bytes into RGBA.
pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.into_rgba8())
}

/// Decode any supported image format from memory.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.into_rgba8())
}

/// Read and decode an image file. The encoded bytes are released as soon
/// as decoding finishes.
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    let decoded = {
        let bytes = std::fs::read(path)?;
        decode_image(&bytes)?
    };
    Ok(decoded)
}

/// Write an image as PNG.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    PngEncoder::new(writer).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(())
}

/// Native file pickers, remembering the last directory used.
#[derive(Default)]
pub struct FileHandler {
    last_dir: Option<PathBuf>,
}

impl FileHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show native file dialog to pick an image to open
    pub fn pick_image(&mut self) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .add_filter("All Files", &["*"]);
        if let Some(dir) = &self.last_dir {
            dialog = dialog.set_directory(dir);
        }
        let path = dialog.pick_file()?;
        self.last_dir = path.parent().map(Path::to_path_buf);
        Some(path)
    }

    /// Show native save dialog for a PNG export
    pub fn pick_save_path(&mut self, default_name: &str) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name(default_name);
        if let Some(dir) = &self.last_dir {
            dialog = dialog.set_directory(dir);
        }
        let mut path = dialog.save_file()?;
        if path.extension().is_none() {
            path.set_extension("png");
        }
        self.last_dir = path.parent().map(Path::to_path_buf);
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_round_trip_is_lossless() {
        let image =
            RgbaImage::from_fn(5, 3, |x, y| Rgba([x as u8 * 40, y as u8 * 80, 3, (x * y) as u8]));
        let decoded = decode_png(&encode_png(&image).unwrap()).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn save_and_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let image = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        save_png(&image, &path).unwrap();
        assert_eq!(load_image(&path).unwrap(), image);
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        assert!(decode_image(b"not an image").is_err());
    }
}
