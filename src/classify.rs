//! Default binary-path classifier, used when `Options::enable_binary_interval`
//! is set to pick between `interval` and `binary_interval` (§4.2, ambient glue:
//! the spec leaves this predicate to a host-supplied classifier, so this module
//! exists purely to make the crate runnable standalone).

use std::path::Path;

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "gz", "tar", "bz2", "xz",
    "7z", "rar", "exe", "dll", "so", "dylib", "bin", "wasm", "class", "jar", "mp3", "mp4", "mov",
    "avi", "ogg", "woff", "woff2", "ttf", "otf",
];

/// Whether `path`'s extension matches a common binary format.
///
/// This is deliberately a simple extension table rather than content sniffing:
/// the cost of polling a file on the wrong interval is low (one extra or one
/// fewer stat per cycle), so there is no need for anything more precise.
pub fn is_binary_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .map_or(false, |ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case("photo.PNG", true)]
    #[case("archive.tar", true)]
    #[case("archive.tar.gz", true)]
    #[case("main.rs", false)]
    #[case("README", false)]
    #[case("notes.txt", false)]
    fn classifies_by_extension(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_binary_path(Path::new(name)), expected);
    }
}
