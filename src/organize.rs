use std::fs;

use camino::Utf8Path;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::HarvestError;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OrganizeReport {
    pub moved: usize,
    pub left_in_place: usize,
}

/// Move every top-level file whose name ends in four digits plus `.csv`
/// into a subdirectory named by that year. Other files stay where they
/// are; subdirectories are never descended into.
pub fn organize_by_year(dir: &Utf8Path) -> Result<OrganizeReport, HarvestError> {
    let year_suffix = Regex::new(r"(?i)(\d{4})\.csv$").expect("valid regex");

    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| HarvestError::Filesystem(format!("read {dir}: {err}")))?;

    let mut report = OrganizeReport::default();
    for entry in entries {
        let entry = entry.map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let file_type = entry
            .file_type()
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            report.left_in_place += 1;
            continue;
        };
        let Some(captures) = year_suffix.captures(name) else {
            report.left_in_place += 1;
            continue;
        };
        let year = &captures[1];

        let target_dir = dir.join(year);
        fs::create_dir_all(target_dir.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("create {target_dir}: {err}")))?;
        let target = target_dir.join(name);
        fs::rename(entry.path(), target.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("move {name}: {err}")))?;
        debug!(file = name, year, "bucketed by year");
        report.moved += 1;
    }
    Ok(report)
}
