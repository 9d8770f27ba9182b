use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::CoreError;
use crate::ir::FileUnit;

/// Extension of serialized IR units.
pub const UNIT_EXTENSION: &str = "json";

/// Load IR units from a single file or from every `*.json` file below a
/// directory, in file-name order. Parent links are recomputed.
pub fn load_units(path: impl AsRef<Path>) -> Result<Vec<FileUnit>, CoreError> {
    let path = path.as_ref();
    let files = if path.is_dir() {
        unit_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut units = Vec::with_capacity(files.len());
    for file in files {
        let contents = fs::read_to_string(&file)?;
        let mut unit: FileUnit = serde_json::from_str(&contents).map_err(|source| CoreError::Decode {
            path: file.clone(),
            source,
        })?;
        unit.link_parents();
        debug!(path = %file.display(), declarations = unit.declarations.len(), "loaded IR unit");
        units.push(unit);
    }
    Ok(units)
}

fn unit_files(root: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == UNIT_EXTENSION) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Write `unit` as pretty-printed JSON, creating parent directories.
pub fn save_unit(path: impl AsRef<Path>, unit: &FileUnit) -> Result<(), CoreError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(unit).map_err(|source| CoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json)?;
    Ok(())
}
