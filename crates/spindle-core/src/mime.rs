//! Content type detection for served files.

use std::path::Path;

/// Returns the content type for `path` based on its extension.
pub(crate) fn detect(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",

        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",

        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",

        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "wasm" => "application/wasm",
        "webmanifest" => "application/manifest+json",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_extensions() {
        assert_eq!(detect(Path::new("index.HTML")), "text/html; charset=utf-8");
        assert_eq!(detect(Path::new("app.js")), "text/javascript; charset=utf-8");
        assert_eq!(detect(Path::new("logo.svg")), "image/svg+xml");
    }

    #[test]
    fn test_detect_fallback() {
        assert_eq!(detect(Path::new("Makefile")), "application/octet-stream");
        assert_eq!(detect(Path::new("data.bin")), "application/octet-stream");
    }
}
