//! Stream settings file for `listen`, e.g.
//!
//! ```json
//! {
//!   "endpoint": "tcp://10.100.4.20:40020",
//!   "name": "Sensor stream",
//!   "layout": "timestamp:i64,streamNum:u32,value:f32",
//!   "capacity": 4096,
//!   "retry": true,
//!   "overflow": "drop-oldest"
//! }
//! ```
//!
//! Omitting `layout` selects object frames. Command-line flags take precedence
//! over values from the file.

use std::path::Path;

use serde::Deserialize;
use streamsub_frame::{Packing, RecordLayout, RecordShape};
use streamsub_listener::OverflowPolicy;

use crate::exit::{io_error, layout_error, CliError, CliResult, DATA_INVALID};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamFile {
    pub endpoint: Option<String>,
    pub name: Option<String>,
    pub layout: Option<String>,
    #[serde(default)]
    pub packing: Packing,
    pub width: Option<usize>,
    pub capacity: Option<usize>,
    pub retry: Option<bool>,
    pub overflow: Option<OverflowPolicy>,
    pub poll_timeout_ms: Option<u64>,
    pub max_frame_size: Option<usize>,
}

impl StreamFile {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
        Self::parse(&text)
            .map_err(|err| CliError::new(DATA_INVALID, format!("{}: {err}", path.display())))
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Record shape from an optional layout string; no layout means object frames.
pub fn build_shape(
    layout: Option<&str>,
    packing: Packing,
    width: Option<usize>,
) -> CliResult<RecordShape> {
    let Some(spec) = layout else {
        return Ok(RecordShape::Object);
    };
    let mut layout =
        RecordLayout::parse_with(spec, packing).map_err(|err| layout_error("invalid layout", err))?;
    if let Some(width) = width {
        layout = layout
            .expect_width(width)
            .map_err(|err| layout_error("invalid layout", err))?;
    }
    Ok(RecordShape::Fixed(layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn parses_full_file() {
        let file = StreamFile::parse(
            r#"{
                "endpoint": "tcp://127.0.0.1:40020",
                "name": "Sensor stream",
                "layout": "timestamp:i64,streamNum:u32,value:f32",
                "packing": "packed",
                "capacity": 16,
                "retry": true,
                "overflow": "drop-oldest",
                "poll_timeout_ms": 250
            }"#,
        )
        .expect("file should parse");

        assert_eq!(file.endpoint.as_deref(), Some("tcp://127.0.0.1:40020"));
        assert_eq!(file.packing, Packing::Packed);
        assert_eq!(file.overflow, Some(OverflowPolicy::DropOldest));
        assert_eq!(file.retry, Some(true));
        assert_eq!(file.poll_timeout_ms, Some(250));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(StreamFile::parse(r#"{"endpoint": "h:1", "colour": "red"}"#).is_err());
    }

    #[test]
    fn shape_defaults_to_objects() {
        let shape = build_shape(None, Packing::Native, None).expect("shape should build");
        assert_eq!(shape, RecordShape::Object);
    }

    #[test]
    fn shape_checks_expected_width() {
        let spec = Some("flag:u8,value:f64");
        let shape = build_shape(spec, Packing::Native, Some(16)).expect("width should match");
        assert_eq!(shape.fixed_width(), Some(16));

        let err = build_shape(spec, Packing::Packed, Some(16))
            .expect_err("packed layout is 9 bytes wide");
        assert_eq!(err.code, USAGE);
    }
}
