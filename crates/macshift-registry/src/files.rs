use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

/// Replaces `path` with `contents` via a temporary sibling and a rename.
///
/// Readers observe either the previous file or the complete new one.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("macshift"),
    );
    #[cfg(unix)]
    builder.permissions(fs::Permissions::from_mode(0o600));

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

/// Opens `path` for appending, creating it owner-only when absent.
pub(crate) fn open_append(path: &Path) -> io::Result<fs::File> {
    let mut options = OpenOptions::new();
    options.append(true).create(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path)
}

/// Creates the registry directory and any missing parents as owner-only.
pub(crate) fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path)
}

/// Removes `path`, treating an absent file as already removed.
///
/// Returns whether a file was deleted.
pub(crate) fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// Reads `path`, mapping an absent file to `None`.
pub(crate) fn read_if_present(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_is_owner_only() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("eth0.pid");
        atomic_write(&path, b"42\n").expect("write succeeds");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read_to_string(&path).expect("read"), "42\n");
    }

    #[test]
    fn atomic_write_replaces_previous_contents() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("eth0.orig");
        atomic_write(&path, b"first contents that are longer\n").expect("first write");
        atomic_write(&path, b"second\n").expect("second write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "second\n");
    }

    #[test]
    fn removing_absent_file_is_a_no_op() {
        let dir = TempDir::new().expect("temp dir");
        let removed = remove_if_present(&dir.path().join("missing")).expect("no error");
        assert!(!removed);
    }

    #[test]
    fn private_dir_is_owner_only() {
        let dir = TempDir::new().expect("temp dir");
        let nested = dir.path().join("state").join("macshift");
        create_private_dir(&nested).expect("created");

        let mode = fs::metadata(&nested).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
