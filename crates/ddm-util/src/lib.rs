//! Miscellaneous file and external-command helpers used by the disk device
//! manager core and, more often, by disk-system plugins that drive external
//! formatting/repair tools.
//!
//! Grounded on `crates/utils/src/lib.rs` (file helpers, `canonicalize`) and
//! `crates/external/src/lib.rs`'s `exec` (generic external-command runner).

#[macro_use]
extern crate log;

use std::{
    borrow::Cow,
    ffi::OsString,
    fs::File,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

pub fn open<P: AsRef<Path>>(path: P) -> io::Result<File> {
    File::open(&path).map_err(|why| {
        io::Error::new(io::ErrorKind::Other, format!("unable to open file at {:?}: {}", path.as_ref(), why))
    })
}

pub fn create<P: AsRef<Path>>(path: P) -> io::Result<File> {
    File::create(&path).map_err(|why| {
        io::Error::new(io::ErrorKind::Other, format!("unable to create file at {:?}: {}", path.as_ref(), why))
    })
}

pub fn read<P: AsRef<Path>>(path: P) -> io::Result<Vec<u8>> {
    open(path).and_then(|mut file| {
        let mut buffer = Vec::with_capacity(file.metadata().ok().map_or(0, |x| x.len()) as usize);
        file.read_to_end(&mut buffer).map(|_| buffer)
    })
}

pub fn write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<()> {
    create(path).and_then(|mut file| file.write_all(contents.as_ref()))
}

/// Canonicalizes a path, following nested symlinks until the result is
/// stable, falling back to the input path if canonicalization fails.
pub fn canonicalize(path: &Path) -> Cow<'_, Path> {
    if let Ok(mut new) = path.canonicalize() {
        while let Ok(tmp) = new.canonicalize() {
            if new == tmp {
                break;
            }
            new = tmp;
        }
        Cow::Owned(new)
    } else {
        Cow::Borrowed(path)
    }
}

/// Executes an external command, treating any of `valid_codes` as success in
/// addition to a zero exit status.
///
/// This is not used by the DDM core itself (spec.md keeps concrete
/// disk-system modules out of scope), but is the helper a `DiskSystem`
/// plugin implementation (e.g. a test `MockDiskSystem` driving `mkfs`-like
/// tools) would reach for, the way the teacher's plugins reach for `exec`.
pub fn exec(cmd: &str, stdin: Option<&[u8]>, valid_codes: Option<&'static [i32]>, args: &[OsString]) -> io::Result<()> {
    info!("executing {} with {:?}", cmd, args);

    let mut child = Command::new(cmd)
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::null())
        .spawn()?;

    if let Some(stdin) = stdin {
        child.stdin.as_mut().expect("stdin not obtained").write_all(stdin)?;
    }

    let status = child.wait()?;
    let success = status.success()
        || valid_codes.map_or(false, |codes| status.code().map_or(false, |code| codes.contains(&code)));

    if success {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} failed with status: {:?}", cmd, status.code()),
        ))
    }
}

pub fn resolve_parent(name: &str) -> Option<PathBuf> {
    for entry in std::fs::read_dir("/sys/block").ok()? {
        if let Ok(entry) = entry {
            if let Some(file) = entry.file_name().to_str() {
                if name.starts_with(file) {
                    return Some(PathBuf::from(["/dev/", file].concat()));
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let mut path = std::env::temp_dir();
        path.push(format!("ddm-util-test-{}", std::process::id()));
        write(&path, b"hello").unwrap();
        assert_eq!(read(&path).unwrap(), b"hello");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn canonicalize_falls_back_on_missing_path() {
        let missing = Path::new("/does/not/exist/ddm-util");
        assert_eq!(canonicalize(missing), Cow::Borrowed(missing));
    }
}
