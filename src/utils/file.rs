use image::ImageFormat;
use uuid::Uuid;

/// Sniffs the content type of uploaded bytes from their magic number.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => "application/octet-stream",
    }
}

pub fn get_file_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "bin",
    }
}

/// Flat, collision-free object key, safe to use as a file name and URL segment.
pub fn generate_storage_key(content_type: &str) -> String {
    format!("{}.{}", Uuid::new_v4().simple(), get_file_extension(content_type))
}

/// Storage ids come back from clients; refuse anything that could escape a directory.
pub fn is_safe_storage_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
        && !key.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_content_type() {
        assert_eq!(detect_content_type(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]), "image/png");
        assert_eq!(detect_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(detect_content_type(b"plain text"), "application/octet-stream");
    }

    #[test]
    fn test_generated_keys_are_safe_and_unique() {
        let a = generate_storage_key("image/png");
        let b = generate_storage_key("image/png");
        assert_ne!(a, b);
        assert!(a.ends_with(".png"));
        assert!(is_safe_storage_key(&a));
    }

    #[test]
    fn test_unsafe_keys() {
        assert!(!is_safe_storage_key("../etc/passwd"));
        assert!(!is_safe_storage_key("a/b.png"));
        assert!(!is_safe_storage_key(""));
        assert!(!is_safe_storage_key(".hidden"));
    }
}
