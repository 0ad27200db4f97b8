use std::fs;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::error::HarvestError;

/// Extract every entry of a ZIP archive into `target_dir`. Entry paths
/// that escape the target directory are rejected.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), HarvestError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        HarvestError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| {
        HarvestError::CorruptArchive(format!("{}: {err}", zip_path.display()))
    })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|err| {
            HarvestError::CorruptArchive(format!("{}: {err}", zip_path.display()))
        })?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(HarvestError::CorruptArchive(format!(
                    "{}: entry path traversal detected",
                    zip_path.display()
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| {
            HarvestError::CorruptArchive(format!("{}: {err}", zip_path.display()))
        })?;
    }
    Ok(())
}
