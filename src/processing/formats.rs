//! Image format detection and output naming

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{BatchScaleError, Result};

/// Formats accepted as batch input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Png,
    Jpeg,
}

/// Extension written for every output file
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Get supported input formats
pub fn supported_input_formats() -> &'static [&'static str] {
    &["png", "jpg", "jpeg"]
}

/// Check if a file extension is supported for input
pub fn is_supported_input_format(extension: &str) -> bool {
    supported_input_formats()
        .iter()
        .any(|&fmt| fmt.eq_ignore_ascii_case(extension))
}

/// Check whether a path carries a supported input extension
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, is_supported_input_format)
}

/// Detect input format from the file signature
pub fn detect_input_format(data: &[u8]) -> Option<InputFormat> {
    match infer::get(data)?.mime_type() {
        "image/png" => Some(InputFormat::Png),
        "image/jpeg" => Some(InputFormat::Jpeg),
        _ => None,
    }
}

impl From<InputFormat> for image::ImageFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Png => image::ImageFormat::Png,
            InputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// Output path for a source file: `<dest>/<stem>.jpg`.
///
/// Sources sharing a stem map to the same output path.
pub fn output_path_for(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let stem = source.file_stem().ok_or_else(|| {
        BatchScaleError::validation("Source path has no file name", Some(source.to_path_buf()))
    })?;

    let mut file_name = OsString::from(stem);
    file_name.push(".");
    file_name.push(OUTPUT_EXTENSION);

    Ok(dest_dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_formats() {
        assert!(is_supported_input_format("jpg"));
        assert!(is_supported_input_format("JPEG"));
        assert!(is_supported_input_format("Png"));
        assert!(!is_supported_input_format("gif"));
        assert!(!is_supported_input_format("webp"));

        assert!(has_supported_extension(Path::new("a/b/photo.JPG")));
        assert!(!has_supported_extension(Path::new("notes.txt")));
        assert!(!has_supported_extension(Path::new("png")));
    }

    #[test]
    fn test_format_detection_from_header() {
        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01];
        assert_eq!(detect_input_format(&jpeg_header), Some(InputFormat::Jpeg));

        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];
        assert_eq!(detect_input_format(&png_header), Some(InputFormat::Png));

        assert_eq!(detect_input_format(b"GIF89a......"), None);
        assert_eq!(detect_input_format(b"not an image"), None);
    }

    #[test]
    fn test_output_path_uses_stem() {
        let dest = Path::new("/out");
        assert_eq!(
            output_path_for(Path::new("/in/a/cat.png"), dest).unwrap(),
            PathBuf::from("/out/cat.jpg")
        );
        assert_eq!(
            output_path_for(Path::new("/in/holiday.v2.jpeg"), dest).unwrap(),
            PathBuf::from("/out/holiday.v2.jpg")
        );
    }

    #[test]
    fn test_shared_stem_collides() {
        let dest = Path::new("/out");
        let a = output_path_for(Path::new("/in/x/pic.png"), dest).unwrap();
        let b = output_path_for(Path::new("/in/y/pic.jpg"), dest).unwrap();
        assert_eq!(a, b);
    }
}
