use std::fs;
use std::io;
use std::path::Path;

/// Create or overwrite the mirror file with owner-only permissions. The
/// token-bearing description never becomes world-readable.
pub(crate) fn write(path: &Path, content: &str) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(content.as_bytes())
    }
    #[cfg(not(unix))]
    {
        fs::write(path, content)
    }
}

pub(crate) fn read(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}
