//! Loading series and frames from JSON files

use anyhow::{Context, Result};
use detector_lib::{MetricFrame, SeriesPoint};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

/// Read a JSON document from `path`, or from stdin when `path` is `-`
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load a series: a JSON array of `{"ts": ..., "value": ...}`
pub fn load_series(path: &Path) -> Result<Vec<SeriesPoint>> {
    read_json(path)
}

/// Load a frame: a JSON array of rows with `ts` and one column per metric
pub fn load_frame(path: &Path) -> Result<MetricFrame> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_series() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"ts": "2024-07-06 10:00:00", "value": 1.5}}, {{"ts": "2024-07-06T10:15:00Z", "value": 2}}]"#
        )
        .unwrap();

        let series = load_series(file.path()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].value, 2.0);
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = load_frame(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
