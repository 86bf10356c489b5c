// File access shared by the loaders and writers

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::IoError;

/// Read file and convert to UTF-8 if needed (list exports are often Windows-1252).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let read_err = |source| IoError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(read_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(read_err)?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            tracing::debug!(path = %path.display(), "decoded as Windows-1252");
            Ok(decoded.into_owned())
        }
    }
}

/// Write `bytes` to a sibling temp file (`<name>.<ext>.tmp`) and return its path.
pub fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf, IoError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!("{e}.tmp"))
        .unwrap_or_else(|| "tmp".to_string());
    let tmp_path = path.with_extension(extension);
    std::fs::write(&tmp_path, bytes).map_err(|source| IoError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    Ok(tmp_path)
}

/// Rename a staged temp file over `path`.
pub fn commit(tmp_path: &Path, path: &Path) -> Result<(), IoError> {
    std::fs::rename(tmp_path, path).map_err(|source| {
        let _ = std::fs::remove_file(tmp_path);
        IoError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Stage then commit. A failed write leaves any existing file at `path` untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IoError> {
    let tmp_path = stage(path, bytes)?;
    commit(&tmp_path, path)
}

/// Parse an entity number. Integral floats (`36.0`, as written by dataframe
/// exports) are accepted; anything else is not a number.
pub fn parse_ent_num(raw: &str) -> Option<u64> {
    let s = raw.trim();
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    let f: f64 = s.parse().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

/// Canonical form for child-row ids: `12.0` and `12` are the same id.
pub fn normalize_id(raw: &str) -> String {
    match parse_ent_num(raw) {
        Some(n) => n.to_string(),
        None => raw.to_string(),
    }
}

/// Single-field row made of nothing but whitespace or the DOS end-of-file byte.
pub fn is_trailer(record: &csv::StringRecord) -> bool {
    record.len() == 1
        && record
            .get(0)
            .map(|f| f.trim_matches(|c: char| c.is_whitespace() || c == '\u{1a}').is_empty())
            .unwrap_or(true)
}
