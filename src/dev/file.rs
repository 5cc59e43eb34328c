//! File-backed device.
//!
//! Values persist in the T3 interchange format, one file per device
//! slot. Opening picks the direction: mode 0 reads an existing file,
//! any other mode creates or truncates one for writing. The device
//! never raises interrupts; reads and writes complete within the
//! instruction that issued them.

use crate::dev::{Device, STATUS_ERROR, STATUS_READY};
use crate::t3::{T3Reader, T3Writer, T3_EXTENSION};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

enum Backing {
    Closed,
    Reading(T3Reader<BufReader<File>>),
    Writing(T3Writer<BufWriter<File>>),
}

/// Storage device backed by a `ternary_<id>.t3` file.
pub struct FileDevice {
    id: usize,
    dir: PathBuf,
    backing: Backing,
    status: u8,
    vector: usize,
}

impl FileDevice {
    /// A closed file device working in the current directory.
    pub fn new(id: usize, vector: usize) -> Self {
        Self::with_dir(id, vector, ".")
    }

    /// Same device, rooted in an explicit directory.
    pub fn with_dir(id: usize, vector: usize, dir: impl Into<PathBuf>) -> Self {
        Self {
            id,
            dir: dir.into(),
            backing: Backing::Closed,
            status: STATUS_READY,
            vector,
        }
    }

    /// Path of the backing file, derived from the device id.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("ternary_{}{}", self.id, T3_EXTENSION))
    }
}

impl Device for FileDevice {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn open(&mut self, mode: i32) -> bool {
        // Reopening closes whatever was open before
        self.close();
        let path = self.path();
        let opened = if mode == 0 {
            T3Reader::open(&path).map(Backing::Reading)
        } else {
            T3Writer::create(&path).map(Backing::Writing)
        };
        match opened {
            Ok(backing) => {
                self.backing = backing;
                self.status = STATUS_READY;
                true
            }
            Err(_) => {
                self.status |= STATUS_ERROR;
                false
            }
        }
    }

    fn close(&mut self) -> bool {
        match std::mem::replace(&mut self.backing, Backing::Closed) {
            Backing::Closed => false,
            Backing::Reading(_) => true,
            Backing::Writing(writer) => {
                // finish() patches the record count into the header
                if writer.finish().is_err() {
                    self.status |= STATUS_ERROR;
                }
                true
            }
        }
    }

    fn read(&mut self) -> Option<i32> {
        match &mut self.backing {
            Backing::Reading(reader) => match reader.read_value() {
                Ok(Some(value)) => Some(value),
                // End of file is not an error bit, just no value
                Ok(None) => None,
                Err(_) => {
                    self.status |= STATUS_ERROR;
                    None
                }
            },
            _ => {
                self.status |= STATUS_ERROR;
                None
            }
        }
    }

    fn write(&mut self, value: i32) -> bool {
        match &mut self.backing {
            Backing::Writing(writer) => match writer.write_value(value) {
                Ok(()) => true,
                Err(_) => {
                    self.status |= STATUS_ERROR;
                    false
                }
            },
            _ => {
                self.status |= STATUS_ERROR;
                false
            }
        }
    }

    fn tick(&mut self) {}

    fn status(&self) -> u8 {
        self.status
    }

    fn irq_vector(&self) -> usize {
        self.vector
    }

    fn irq_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::t3::T3Reader;
    use tempfile::TempDir;

    #[test]
    fn test_write_close_reopen_read() {
        let dir = TempDir::new().unwrap();
        let mut dev = FileDevice::with_dir(3, 2, dir.path());

        assert!(dev.open(1));
        assert!(dev.write(5));
        assert!(dev.write(-4));
        assert!(dev.close());

        assert!(dev.open(0));
        assert_eq!(dev.read(), Some(5));
        assert_eq!(dev.read(), Some(-4));
        assert_eq!(dev.read(), None);
        assert!(dev.close());
        assert_eq!(dev.status() & STATUS_ERROR, 0);
    }

    #[test]
    fn test_finish_on_close_patches_count() {
        let dir = TempDir::new().unwrap();
        let mut dev = FileDevice::with_dir(0, 2, dir.path());

        dev.open(1);
        dev.write(7);
        dev.write(8);
        dev.close();

        let reader = T3Reader::open(dev.path()).unwrap();
        assert_eq!(reader.declared_count(), 2);
    }

    #[test]
    fn test_open_missing_file_for_read_fails() {
        let dir = TempDir::new().unwrap();
        let mut dev = FileDevice::with_dir(4, 2, dir.path());

        assert!(!dev.open(0));
        assert_ne!(dev.status() & STATUS_ERROR, 0);
        assert_eq!(dev.read(), None);
    }

    #[test]
    fn test_read_while_writing_sets_error() {
        let dir = TempDir::new().unwrap();
        let mut dev = FileDevice::with_dir(1, 2, dir.path());

        dev.open(1);
        assert_eq!(dev.read(), None);
        assert_ne!(dev.status() & STATUS_ERROR, 0);
    }

    #[test]
    fn test_write_while_closed_fails() {
        let dir = TempDir::new().unwrap();
        let mut dev = FileDevice::with_dir(2, 2, dir.path());

        assert!(!dev.write(1));
        assert_ne!(dev.status() & STATUS_ERROR, 0);
        assert!(!dev.close());
    }

    #[test]
    fn test_reopen_for_write_truncates() {
        let dir = TempDir::new().unwrap();
        let mut dev = FileDevice::with_dir(5, 2, dir.path());

        dev.open(1);
        dev.write(1);
        dev.write(2);
        dev.write(3);
        dev.close();

        dev.open(1);
        dev.write(9);
        dev.close();

        dev.open(0);
        assert_eq!(dev.read(), Some(9));
        assert_eq!(dev.read(), None);
    }
}
