//! Replayable frame sources for the flame monitor.
//!
//! - [`ImageSequenceSource`]: a directory of still images, or a single image
//! - `VideoFileSource`: a video file decoded through OpenCV (`opencv` feature)

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

/// File extensions accepted by [`ImageSequenceSource`].
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Errors raised while opening or reading a frame source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("frame source {} could not be opened: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    #[error("frame source {} has no frames", .path.display())]
    Empty { path: PathBuf },

    #[error("unsupported frame source {}: video decoding requires the `opencv` feature", .path.display())]
    Unsupported { path: PathBuf },

    #[error("failed to decode frame {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("decoded frame is {len} bytes, expected {width}x{height} RGB")]
    Layout { width: u32, height: u32, len: usize },

    #[cfg(feature = "opencv")]
    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("i/o error on frame source: {0}")]
    Io(#[from] std::io::Error),
}

/// A finite stream of RGB frames that can be replayed from the start.
pub trait FrameSource: Send {
    /// Next frame, or `Ok(None)` at end of stream.
    fn read_frame(&mut self) -> Result<Option<RgbImage>, SourceError>;

    /// Seek back to the first frame.
    fn rewind(&mut self) -> Result<(), SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        (**self).read_frame()
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        (**self).rewind()
    }
}

/// Still images decoded one per frame, in file-name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    position: usize,
}

impl ImageSequenceSource {
    /// Open a directory of images, or a single image file.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let metadata = fs::metadata(path).map_err(|e| SourceError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let frames = if metadata.is_dir() {
            let mut frames = Vec::new();
            for entry in fs::read_dir(path)? {
                let entry_path = entry?.path();
                if entry_path.is_file() && is_image_file(&entry_path) {
                    frames.push(entry_path);
                }
            }
            frames.sort();
            frames
        } else {
            vec![path.to_path_buf()]
        };

        if frames.is_empty() {
            return Err(SourceError::Empty {
                path: path.to_path_buf(),
            });
        }

        debug!(path = %path.display(), frames = frames.len(), "Opened image sequence");

        Ok(Self {
            frames,
            position: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        let Some(path) = self.frames.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let frame = image::open(path).map_err(|source| SourceError::Decode {
            path: path.clone(),
            source,
        })?;

        Ok(Some(frame.to_rgb8()))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.position = 0;
        Ok(())
    }
}

/// Wrap a packed RGB buffer, rejecting buffers that do not match the dimensions.
pub fn frame_from_rgb_bytes(
    width: u32,
    height: u32,
    bytes: Vec<u8>,
) -> Result<RgbImage, SourceError> {
    let len = bytes.len();
    RgbImage::from_raw(width, height, bytes).ok_or(SourceError::Layout { width, height, len })
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(feature = "opencv")]
pub use video::VideoFileSource;

#[cfg(feature = "opencv")]
mod video {
    use std::path::Path;

    use image::RgbImage;
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture},
    };

    use super::{FrameSource, SourceError, frame_from_rgb_bytes};

    /// A video file replayed through OpenCV. The capture handle is released on drop.
    pub struct VideoFileSource {
        capture: VideoCapture,
        frame: Mat,
    }

    impl VideoFileSource {
        pub fn open(path: &Path) -> Result<Self, SourceError> {
            let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
            if !capture.is_opened()? {
                return Err(SourceError::Open {
                    path: path.to_path_buf(),
                    reason: "VideoCapture refused the file".to_string(),
                });
            }

            Ok(Self {
                capture,
                frame: Mat::default(),
            })
        }
    }

    impl FrameSource for VideoFileSource {
        fn read_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
            if !self.capture.read(&mut self.frame)? || self.frame.empty() {
                return Ok(None);
            }

            // OpenCV decodes to BGR
            let mut rgb = Mat::default();
            imgproc::cvt_color(&self.frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

            let width = rgb.cols() as u32;
            let height = rgb.rows() as u32;
            let bytes = rgb.data_bytes()?.to_vec();

            frame_from_rgb_bytes(width, height, bytes).map(Some)
        }

        fn rewind(&mut self) -> Result<(), SourceError> {
            self.capture.set(videoio::CAP_PROP_POS_FRAMES, 0.0)?;
            Ok(())
        }
    }
}

/// Open the source at `path`, choosing the decoder from what is on disk.
pub fn open_source(path: &Path) -> Result<Box<dyn FrameSource>, SourceError> {
    if path.is_dir() || is_image_file(path) {
        return Ok(Box::new(ImageSequenceSource::open(path)?));
    }

    #[cfg(feature = "opencv")]
    {
        Ok(Box::new(VideoFileSource::open(path)?))
    }

    #[cfg(not(feature = "opencv"))]
    {
        Err(SourceError::Unsupported {
            path: path.to_path_buf(),
        })
    }
}
