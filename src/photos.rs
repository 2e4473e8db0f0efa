use crate::config::PhotoConfig;
use crate::http::build_client;
use image::{DynamicImage, ImageDecoder, ImageReader, codecs::jpeg::JpegEncoder};
use reqwest::Client;
use std::{
    io::{Cursor, Write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("scratch directory unavailable: {0}")]
    Scratch(#[from] std::io::Error),
    #[error("download failed: {0}")]
    Download(String),
    #[error("image could not be processed: {0}")]
    Decode(String),
    #[error("none of the {attempted} photo(s) could be staged")]
    NothingStaged { attempted: usize },
}

/// Photos for one advertisement on local disk. The backing directory is
/// removed when this value is dropped or [`StagedPhotos::cleanup`] is called.
#[derive(Debug)]
pub struct StagedPhotos {
    dir: Option<TempDir>,
    files: Vec<PathBuf>,
    skipped: Vec<String>,
}

impl StagedPhotos {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Source URIs that were dropped after failing to download or decode.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn cleanup(mut self) -> Result<(), PhotoError> {
        if let Some(dir) = self.dir.take() {
            dir.close()?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PhotoStager {
    http: Client,
    scratch_root: PathBuf,
    retries: u32,
}

impl PhotoStager {
    pub fn new(config: &PhotoConfig) -> Self {
        Self {
            http: build_client(),
            scratch_root: config
                .scratch_root
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("hermes-publisher")),
            retries: config.download_retries,
        }
    }

    /// Downloads photos in order until `max` are staged. A photo that still
    /// fails after the retry budget is skipped; only an empty result is an
    /// error. Declared rotation is applied on top of the EXIF orientation.
    pub async fn stage(
        &self,
        uris: &[String],
        rotations: &[Option<i32>],
        max: usize,
    ) -> Result<StagedPhotos, PhotoError> {
        tokio::fs::create_dir_all(&self.scratch_root).await?;
        let dir = tempfile::Builder::new()
            .prefix("ad-")
            .tempdir_in(&self.scratch_root)?;
        let mut staged = StagedPhotos {
            dir: Some(dir),
            files: Vec::new(),
            skipped: Vec::new(),
        };
        let mut attempted = 0usize;

        for (index, uri) in uris.iter().enumerate() {
            if staged.files.len() >= max {
                break;
            }
            let uri = uri.trim();
            if uri.is_empty() {
                continue;
            }
            attempted += 1;
            let rotation = rotations.get(index).copied().flatten().unwrap_or(0);
            let target = match staged.dir() {
                Some(dir) => dir.join(format!("{:02}.jpg", staged.files.len() + 1)),
                None => break,
            };
            match self.stage_one(uri, rotation, &target).await {
                Ok(()) => {
                    debug!(target = "hermes.photos", index, uri, "photo_staged");
                    staged.files.push(target);
                }
                Err(err) => {
                    warn!(target = "hermes.photos", index, uri, error = %err, "photo_skipped");
                    staged.skipped.push(uri.to_string());
                }
            }
        }

        if staged.files.is_empty() {
            staged.cleanup()?;
            return Err(PhotoError::NothingStaged { attempted });
        }
        info!(
            target = "hermes.photos",
            staged = staged.files.len(),
            skipped = staged.skipped.len(),
            "photos_ready"
        );
        Ok(staged)
    }

    async fn stage_one(&self, uri: &str, rotation: i32, target: &Path) -> Result<(), PhotoError> {
        let bytes = self.download(uri).await?;
        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || normalize_and_write(&bytes, rotation, &target))
            .await
            .map_err(|err| PhotoError::Decode(err.to_string()))?
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, PhotoError> {
        let mut last = PhotoError::Download("not attempted".into());
        for attempt in 0..=self.retries {
            match self.fetch(uri).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    debug!(target = "hermes.photos", uri, attempt, error = %err, "photo_download_retry");
                    last = err;
                }
            }
        }
        Err(last)
    }

    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, PhotoError> {
        let response = self
            .http
            .get(uri)
            .send()
            .await
            .map_err(|err| PhotoError::Download(err.to_string()))?;
        if !response.status().is_success() {
            return Err(PhotoError::Download(format!("HTTP {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| PhotoError::Download(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn normalize_and_write(bytes: &[u8], rotation: i32, target: &Path) -> Result<(), PhotoError> {
    let decode = |err: image::ImageError| PhotoError::Decode(err.to_string());
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| PhotoError::Decode(err.to_string()))?
        .into_decoder()
        .map_err(decode)?;
    let orientation = decoder.orientation().map_err(decode)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode)?;
    image.apply_orientation(orientation);
    let image = rotate(image, rotation);

    let file = std::fs::File::create(target)?;
    let mut writer = std::io::BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(decode)?;
    writer.flush()?;
    Ok(())
}

/// Clockwise rotation in quarter turns; other angles are ignored.
fn rotate(image: DynamicImage, degrees: i32) -> DynamicImage {
    match degrees.rem_euclid(360) {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    }
}
