//! Package download and unpacking
//!
//! The asset is streamed to `<dest>/<asset name>` in fixed-size chunks, then
//! unpacked into `<dest>/firmware_<release>_<bucket>/`. Keying the directory
//! on release and bucket lets several packages sit side by side, and lets a
//! failed write be retried from the cache without downloading again.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::device::CapacityBucket;
use crate::error::{Error, Result};
use crate::package::{Classifier, FirmwarePackage};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::release::{ReleaseAsset, ReleaseClient};

/// Download chunk size
pub const CHUNK_SIZE: usize = 8192;

/// Name of the extraction directory for a release and bucket
pub fn extraction_dir_name(release_id: &str, bucket: CapacityBucket) -> String {
    let release: String = release_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' => '_',
            c => c,
        })
        .collect();
    format!("firmware_{}_{}", release, bucket)
}

/// Downloads and unpacks firmware packages
pub struct Fetcher<C> {
    client: C,
    classifier: Classifier,
}

impl<C: ReleaseClient> Fetcher<C> {
    /// Create a fetcher using the default classification rules
    pub fn new(client: C) -> Self {
        Self::with_classifier(client, Classifier::default())
    }

    /// Create a fetcher with custom classification rules
    pub fn with_classifier(client: C, classifier: Classifier) -> Self {
        Self { client, classifier }
    }

    /// Look for a complete package already unpacked from `asset`
    pub fn cached(
        &self,
        asset: &ReleaseAsset,
        release_id: &str,
        bucket: CapacityBucket,
        dest_dir: &Path,
    ) -> Option<FirmwarePackage> {
        let root = dest_dir.join(extraction_dir_name(release_id, bucket));
        if !root.is_dir() {
            return None;
        }
        let archive = dest_dir.join(&asset.filename);
        match FirmwarePackage::scan(archive, root, &self.classifier) {
            Ok(package) if package.is_complete() => {
                log::info!(
                    "Using cached package in {}",
                    package.extraction_root.display()
                );
                Some(package)
            }
            Ok(_) => None,
            Err(e) => {
                log::debug!("Cache lookup failed: {}", e);
                None
            }
        }
    }

    /// Download `asset`, unpack it and classify its files
    ///
    /// On [`Error::IncompletePackage`] the extraction directory is left in
    /// place for inspection.
    pub fn fetch(
        &self,
        asset: &ReleaseAsset,
        release_id: &str,
        bucket: CapacityBucket,
        dest_dir: &Path,
        sink: &ProgressSink,
    ) -> Result<FirmwarePackage> {
        fs::create_dir_all(dest_dir)?;
        let archive_path = dest_dir.join(&asset.filename);

        sink.message(format!("Downloading {}", asset.filename));
        log::info!("Downloading {} from {}", asset.filename, asset.download_url);
        let reader = self.client.download(asset)?;
        let declared = (asset.byte_size > 0).then_some(asset.byte_size);
        let written = download_to(reader, &archive_path, declared, sink)?;
        log::info!("Downloaded {} bytes to {}", written, archive_path.display());

        let extraction_root = dest_dir.join(extraction_dir_name(release_id, bucket));
        sink.emit(ProgressEvent::Extracting);
        unpack(&archive_path, &extraction_root)?;
        sink.message("Extraction complete");

        let package = FirmwarePackage::scan(archive_path, extraction_root, &self.classifier)?;
        if let Err(e) = package.require_complete() {
            log::error!(
                "{} (left in {})",
                e,
                package.extraction_root.display()
            );
            return Err(e);
        }
        Ok(package)
    }
}

/// Unpack a local package archive into `<dest_dir>/<archive stem>/`
///
/// Same classification and completeness rules as a downloaded package.
pub fn open_local(
    archive_path: &Path,
    dest_dir: &Path,
    classifier: &Classifier,
) -> Result<FirmwarePackage> {
    let stem = archive_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("package");
    let extraction_root = dest_dir.join(format!("local_{}", stem));
    unpack(archive_path, &extraction_root)?;

    let package = FirmwarePackage::scan(archive_path.to_path_buf(), extraction_root, classifier)?;
    package.require_complete()?;
    Ok(package)
}

/// Stream `reader` into `path`, reporting progress after every chunk
///
/// Percentages are only reported when the declared size is known. A stream
/// that ends before the declared size fails with [`Error::Download`].
pub fn download_to<R: Read>(
    mut reader: R,
    path: &Path,
    declared: Option<u64>,
    sink: &ProgressSink,
) -> Result<u64> {
    let mut file = File::create(path)?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut downloaded = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Download(e.to_string())),
        };
        file.write_all(&buf[..n])?;
        downloaded += n as u64;

        let percent = declared.map(|total| (downloaded as f64 / total as f64 * 100.0) as f32);
        sink.emit(ProgressEvent::Download {
            downloaded,
            total: declared,
            percent,
        });
    }
    file.flush()?;

    if let Some(total) = declared {
        if downloaded < total {
            return Err(Error::Download(format!(
                "stream ended after {} of {} bytes",
                downloaded, total
            )));
        }
    }
    Ok(downloaded)
}

/// Unpack a zip archive into a fresh `dir`
pub fn unpack(archive_path: &Path, dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::Extraction(format!("{}: {}", archive_path.display(), e)))?;
    log::debug!(
        "Unpacking {} entries into {}",
        archive.len(),
        dir.display()
    );
    archive
        .extract(dir)
        .map_err(|e| Error::Extraction(format!("{}: {}", archive_path.display(), e)))?;
    Ok(())
}
