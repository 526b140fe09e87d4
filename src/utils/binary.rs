use std::collections::HashSet;

use lazy_static::lazy_static;

/// Extensions (lowercase, no dot) that are never read as text.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "jfif", "gif", "bmp", "ico", "icns", "cur", "tif", "tiff", "webp",
    "avif", "heic", "heif", "psd", "xcf", "raw", "cr2", "nef", "dng", "jxl", "pbm", "pgm",
    "ppm", "tga", "dds", // archives
    "zip", "tar", "gz", "tgz", "bz2", "tbz2", "xz", "txz", "lz", "lzma", "lz4", "zst", "7z",
    "rar", "cab", "arj", "cpio", "deb", "rpm", "apk", "jar", "war", "ear", "whl", "egg",
    "dmg", "iso", "img", "pkg", "msi", "xpi", "crx", "nupkg", // executables and objects
    "exe", "dll", "so", "dylib", "o", "obj", "a", "lib", "bin", "elf", "class", "pyc", "pyo",
    "pdb", "node", "dex", "wasm", // audio
    "mp3", "wav", "flac", "aac", "ogg", "oga", "opus", "m4a", "wma", "aif", "aiff", "mid",
    "midi", // video
    "mp4", "m4v", "mkv", "mov", "avi", "wmv", "flv", "webm", "mpg", "mpeg", "3gp", "ogv",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot", "fon", // documents and data blobs
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "epub", "mobi",
    "sqlite", "sqlite3", "db", "dat", "pak", "npy", "npz", "pkl", "parquet", "onnx", "pt",
    "h5",
];

lazy_static! {
    static ref BINARY_SET: HashSet<&'static str> = BINARY_EXTENSIONS.iter().copied().collect();
}

/// True when `extension` (already lowercased, without the dot) names a binary format.
pub fn is_binary_extension(extension: &str) -> bool {
    BINARY_SET.contains(extension)
}
