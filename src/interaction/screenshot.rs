use std::path::PathBuf;

use base64::Engine;

use crate::driver::{Clip, ImageFormat, PageDriver, ScreenshotParams};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Binary,
    Base64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenshotOptions {
    /// Also write the image here. Its extension picks the format when
    /// `format` is not set.
    pub path: Option<PathBuf>,
    pub format: Option<ImageFormat>,
    /// JPEG quality, 0-100.
    pub quality: Option<u32>,
    pub full_page: bool,
    pub clip: Option<Clip>,
    pub omit_background: bool,
    pub encoding: Encoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screenshot {
    Binary(Vec<u8>),
    Base64(String),
}

impl Screenshot {
    pub fn len(&self) -> usize {
        match self {
            Self::Binary(bytes) => bytes.len(),
            Self::Base64(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Capture the page, optionally saving the image to `options.path`.
pub async fn screenshot(page: &dyn PageDriver, options: &ScreenshotOptions) -> Result<Screenshot> {
    let format = options
        .format
        .or_else(|| options.path.as_deref().map(ImageFormat::from_path))
        .unwrap_or_default();
    let params = ScreenshotParams {
        format,
        quality: options.quality,
        full_page: options.full_page,
        clip: options.clip,
        omit_background: options.omit_background,
    };
    let bytes = page.screenshot(&params).await?;

    if let Some(path) = &options.path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        tracing::info!("screenshot saved to {}", path.display());
    }

    Ok(match options.encoding {
        Encoding::Binary => Screenshot::Binary(bytes),
        Encoding::Base64 => {
            Screenshot::Base64(base64::engine::general_purpose::STANDARD.encode(&bytes))
        }
    })
}
