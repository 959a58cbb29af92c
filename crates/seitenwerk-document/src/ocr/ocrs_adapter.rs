// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR adapter backed by `ocrs`, a pure-Rust OCR engine running neural
// network models through `rten`.
//
// # Model Setup
//
// Two model files are required in one directory:
//
// - `text-detection.rten` locates text regions.
// - `text-recognition.rten` decodes characters from those regions.
//
// Running `ocrs-cli` once downloads them to `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is where `OcrConfig::default` looks.
// The engine itself never downloads anything.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::RgbaImage;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use rten::Model;
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::{debug, info, instrument};

use super::OcrAdapter;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Language codes the stock Latin-script models cover.
const SUPPORTED_LANGUAGES: &[&str] = &["eng", "en", "latin"];

fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to find the detection and recognition models.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expects `text-detection.rten` and `text-recognition.rten` in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (role, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(SeitenwerkError::Ocr(format!(
                    "{role} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// [`OcrAdapter`] running the `ocrs` engine. Load once, reuse for many pages.
pub struct OcrsAdapter {
    engine: Mutex<OcrsEngine>,
}

impl OcrsAdapter {
    /// Load both models. This is the expensive step.
    ///
    /// `ocrs` and `rten` should be built in release mode; debug builds are
    /// one to two orders of magnitude slower.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: &OcrConfig) -> Result<Self> {
        config.validate()?;
        let load = |path: &Path, role: &str| {
            Model::load_file(path).map_err(|err| {
                SeitenwerkError::Ocr(format!(
                    "failed to load {role} model from {}: {err}",
                    path.display()
                ))
            })
        };
        let detection_model = load(&config.detection_model_path, "detection")?;
        let recognition_model = load(&config.recognition_model_path, "recognition")?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| SeitenwerkError::Ocr(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine initialised");
        Ok(Self {
            engine: Mutex::new(engine),
        })
    }

    pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(&OcrConfig::from_dir(dir))
    }
}

pub(crate) fn check_language(language: &str) -> Result<()> {
    let normalised = language.trim().to_ascii_lowercase();
    if SUPPORTED_LANGUAGES.contains(&normalised.as_str()) {
        Ok(())
    } else {
        Err(SeitenwerkError::Ocr(format!(
            "language \"{language}\" is not covered by the loaded models (supported: {})",
            SUPPORTED_LANGUAGES.join(", ")
        )))
    }
}

impl OcrAdapter for OcrsAdapter {
    #[instrument(skip_all, fields(width = bitmap.width(), height = bitmap.height(), language = %language))]
    fn recognize(&self, bitmap: &RgbaImage, language: &str) -> Result<String> {
        check_language(language)?;
        let rgb = image::DynamicImage::ImageRgba8(bitmap.clone()).to_rgb8();
        let (width, height) = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            SeitenwerkError::Ocr(format!("failed to create image source ({width}x{height}): {err}"))
        })?;

        let engine = match self.engine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let input = engine
            .prepare_input(source)
            .map_err(|err| SeitenwerkError::Ocr(format!("OCR preprocessing failed: {err}")))?;
        let text = engine
            .get_text(&input)
            .map_err(|err| SeitenwerkError::Ocr(format!("OCR text recognition failed: {err}")))?;

        debug!(lines = text.lines().count(), chars = text.len(), "OCR recognition complete");
        Ok(text)
    }
}
