//! File-transfer helper: local storage and acknowledgement policy for
//! inbound file data.
//!
//! In auto mode every inbound data packet is appended to the target file
//! immediately and acknowledged by the pipeline. In manual mode the packet is
//! staged in RAM and only committed to the file when the caller acknowledges
//! it with an OK response ([`flush`](FileTransfer::flush)).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};


/// Maximum bytes kept of a target file name.
pub const NAME_LEN_MAX: usize = 128;

/// Size of the in-RAM staging buffer for unacknowledged data.
pub const STAGING_LEN_MAX: usize = 100 * 1024;


#[derive(Debug, Default)]
pub struct FileTransfer {
    name: Option<PathBuf>,
    auto: bool,
    expected: u64,
    received: u64,
    staged: Vec<u8>,
}

impl FileTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare local storage for an inbound transfer.
    ///
    /// Records the file name (deleting any pre-existing file of that name),
    /// resets the byte counters, and selects the acknowledgement mode.
    /// `expected` may be zero when the total size is unknown.
    pub fn setup(&mut self, name: &str, expected: u64, auto: bool) {
        let name = truncate_name(name);

        if let Err(e) = fs::remove_file(name) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove existing file {name:?}: {e}");
            }
        }

        self.name = Some(name.to_owned());
        self.auto = auto;
        self.expected = expected;
        self.received = 0;
        self.staged.clear();
    }

    /// Save or stage one packet of inbound file data.
    pub fn cache(&mut self, data: &[u8]) {
        if self.auto {
            if let Err(e) = self.write(data) {
                log::error!("failed to write file data: {e}");
            } else {
                self.received += data.len() as u64;
            }
        } else {
            self.staged.clear();
            self.staged.extend_from_slice(&data[..data.len().min(STAGING_LEN_MAX)]);
            self.received += data.len() as u64;
        }

        // The final packet is acknowledged manually
        if self.expected > 0 && self.received >= self.expected {
            self.auto = false;
        }
    }

    /// Commit staged data to the file. Called when the user acknowledges a
    /// file data packet; does nothing in auto mode.
    pub fn flush(&mut self) {
        if !self.auto && !self.staged.is_empty() {
            let staged = std::mem::take(&mut self.staged);
            if let Err(e) = self.write(&staged) {
                log::error!("failed to flush file data: {e}");
            }
        }
    }

    pub fn auto(&self) -> bool {
        self.auto
    }

    pub fn set_auto(&mut self, auto: bool) {
        self.auto = auto;
    }

    pub fn name(&self) -> Option<&Path> {
        self.name.as_deref()
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    fn write(&self, data: &[u8]) -> std::io::Result<()> {
        let Some(name) = &self.name else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no file transfer in progress",
            ));
        };

        let mut options = fs::OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o660);
        }

        // write_all drains partial writes
        let mut file = options.open(name)?;
        file.write_all(data)?;
        Ok(())
    }
}

fn truncate_name(name: &str) -> &Path {
    let mut end = name.len().min(NAME_LEN_MAX);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    Path::new(&name[..end])
}


#[cfg(test)]
mod test {
    use super::*;

    fn temp_name(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("orp-file-{}-{tag}", std::process::id()))
    }

    #[test]
    fn test_auto_appends_immediately() {
        let path = temp_name("auto");
        let mut ft = FileTransfer::new();

        ft.setup(path.to_str().unwrap(), 0, true);
        ft.cache(b"hello ");
        ft.cache(b"world");

        assert_eq!(fs::read(&path).unwrap(), b"hello world");
        assert_eq!(ft.received(), 11);
        assert!(ft.auto());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_manual_stages_until_flush() {
        let path = temp_name("manual");
        let mut ft = FileTransfer::new();

        ft.setup(path.to_str().unwrap(), 0, false);
        ft.cache(b"staged");
        assert!(!path.exists());

        ft.flush();
        assert_eq!(fs::read(&path).unwrap(), b"staged");

        // flushing again writes nothing further
        ft.flush();
        assert_eq!(fs::read(&path).unwrap(), b"staged");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_staging_replaced_per_packet() {
        let path = temp_name("replace");
        let mut ft = FileTransfer::new();

        ft.setup(path.to_str().unwrap(), 0, false);
        ft.cache(b"first");
        ft.cache(b"second");
        ft.flush();

        // only the most recent unacknowledged packet is staged
        assert_eq!(fs::read(&path).unwrap(), b"second");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_auto_forced_off_at_expected_size() {
        let path = temp_name("forced");
        let mut ft = FileTransfer::new();

        ft.setup(path.to_str().unwrap(), 10, true);
        ft.cache(b"12345");
        assert!(ft.auto());

        ft.cache(b"67890");
        assert!(!ft.auto());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_setup_deletes_existing_file() {
        let path = temp_name("delete");
        fs::write(&path, b"old contents").unwrap();

        let mut ft = FileTransfer::new();
        ft.setup(path.to_str().unwrap(), 0, true);
        assert!(!path.exists());

        ft.cache(b"new");
        assert_eq!(fs::read(&path).unwrap(), b"new");

        fs::remove_file(&path).unwrap();
    }
}
