//! Frame sources.
//!
//! A [`FrameSource`] is the camera seen from the pipeline: it is opened
//! once, yields one image per capture, and is released on teardown.
//! [`ImageSequenceSource`] replays a directory of still images in name
//! order, looping forever.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no images found in {0}")]
    NoFrames(PathBuf),

    #[error("failed to read frame source: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),

    #[error("frame source is not open")]
    NotOpen,
}

// ---------------------------------------------------------------------------
// FrameSource
// ---------------------------------------------------------------------------

pub trait FrameSource: Send {
    /// Acquire the device.  Errors here surface as `Camera Error`.
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Grab the next frame.
    fn capture(&mut self) -> Result<DynamicImage, CaptureError>;

    /// Release the device.  Must be safe to call when not open.
    fn release(&mut self);

    /// Short name for log output.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// ImageSequenceSource
// ---------------------------------------------------------------------------

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    next: usize,
    open: bool,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frames: Vec::new(),
            next: 0,
            open: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                frames.push(path);
            }
        }
        if frames.is_empty() {
            return Err(CaptureError::NoFrames(self.dir.clone()));
        }
        frames.sort();
        log::info!(
            "frames: replaying {} images from {}",
            frames.len(),
            self.dir.display()
        );
        self.frames = frames;
        self.next = 0;
        self.open = true;
        Ok(())
    }

    fn capture(&mut self) -> Result<DynamicImage, CaptureError> {
        if !self.open || self.frames.is_empty() {
            return Err(CaptureError::NotOpen);
        }
        let path = &self.frames[self.next % self.frames.len()];
        self.next = (self.next + 1) % self.frames.len();
        Ok(image::open(path)?)
    }

    fn release(&mut self) {
        if self.open {
            log::debug!("frames: released {}", self.dir.display());
        }
        self.open = false;
        self.frames.clear();
        self.next = 0;
    }

    fn name(&self) -> &str {
        "image-sequence"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, shade: u8) {
        let img = RgbImage::from_pixel(8, 6, Rgb([shade, shade, shade]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn replays_images_in_name_order_and_loops() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "b.png", 200);
        write_png(tmp.path(), "a.png", 10);
        std::fs::write(tmp.path().join("notes.txt"), "ignore me").unwrap();

        let mut src = ImageSequenceSource::new(tmp.path());
        src.open().unwrap();
        assert_eq!(src.len(), 2);

        let first = src.capture().unwrap().to_rgb8();
        let second = src.capture().unwrap().to_rgb8();
        let third = src.capture().unwrap().to_rgb8();
        assert_eq!(first.get_pixel(0, 0), &Rgb([10, 10, 10]));
        assert_eq!(second.get_pixel(0, 0), &Rgb([200, 200, 200]));
        assert_eq!(third.get_pixel(0, 0), &Rgb([10, 10, 10]));
    }

    #[test]
    fn unreadable_image_is_skipped_on_next_capture() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "a.png", 10);
        std::fs::write(tmp.path().join("b.jpg"), b"half-written").unwrap();
        write_png(tmp.path(), "c.png", 90);

        let mut src = ImageSequenceSource::new(tmp.path());
        src.open().unwrap();
        assert!(src.capture().is_ok());
        assert!(matches!(src.capture(), Err(CaptureError::Decode(_))));
        let third = src.capture().unwrap().to_rgb8();
        assert_eq!(third.get_pixel(0, 0), &Rgb([90, 90, 90]));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut src = ImageSequenceSource::new(tmp.path());
        assert!(matches!(src.open(), Err(CaptureError::NoFrames(_))));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut src = ImageSequenceSource::new(tmp.path().join("nope"));
        assert!(matches!(src.open(), Err(CaptureError::Io(_))));
    }

    #[test]
    fn capture_requires_open() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "a.png", 1);
        let mut src = ImageSequenceSource::new(tmp.path());
        assert!(matches!(src.capture(), Err(CaptureError::NotOpen)));
        src.open().unwrap();
        src.release();
        src.release();
        assert!(matches!(src.capture(), Err(CaptureError::NotOpen)));
        assert!(src.is_empty());
    }

    #[test]
    fn source_is_object_safe() {
        let _boxed: Box<dyn FrameSource> = Box::new(ImageSequenceSource::new("."));
    }
}
