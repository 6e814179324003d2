//! On-disk cache of album and playlist artwork, keyed by the image URL's file name.

use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("invalid artwork url: {0}")]
    Url(#[from] url::ParseError),
    #[error("artwork url {0} has no file name")]
    NoFileName(String),
    #[error("artwork download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("artwork cache I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct ArtworkCache {
    http: reqwest::Client,
    dir: PathBuf,
}

impl ArtworkCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ArtworkCache {
            http: reqwest::Client::new(),
            dir: dir.into(),
        }
    }

    /// `<cache dir>/spotify-launcher/images`
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spotify-launcher")
            .join("images")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the image for `url` lives once fetched
    pub fn path_for(&self, url: &str) -> Result<PathBuf, ArtworkError> {
        let parsed = Url::parse(url)?;
        let name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ArtworkError::NoFileName(url.to_string()))?;
        Ok(self.dir.join(name))
    }

    /// Path of the cached image, downloading it first if needed
    pub async fn fetch(&self, url: &str) -> Result<PathBuf, ArtworkError> {
        let path = self.path_for(url)?;
        if path.exists() {
            return Ok(path);
        }

        log::debug!("Fetching artwork {}", url);
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let io_err = |source| ArtworkError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
        tokio::fs::write(&path, &bytes).await.map_err(io_err)?;
        Ok(path)
    }

    /// Drop every cached image
    pub fn clear(&self) -> Result<(), ArtworkError> {
        if !self.dir.exists() {
            return Ok(());
        }
        log::debug!("Clearing artwork cache at {}", self.dir.display());
        std::fs::remove_dir_all(&self.dir).map_err(|source| ArtworkError::Io {
            path: self.dir.clone(),
            source,
        })
    }
}
