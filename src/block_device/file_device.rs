use std::fs::File;
use std::io::Read;
use std::io::{Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use crate::block_device::block_device::BlockDevice;

/// Device backed by an image file on the host filesystem.
pub struct FileDevice {
    pub file: Arc<Mutex<File>>,
}

impl FileDevice {
    pub fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl BlockDevice for FileDevice {
    fn read_at(&self, buf: &mut [u8], offset: u64) {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(offset))
            .expect("Error when seeking!");
        file.read_exact(buf).expect("Short read from image!");
    }

    fn write_at(&self, buf: &[u8], offset: u64) {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(offset))
            .expect("Error when seeking!");
        file.write_all(buf).expect("Short write to image!");
    }

    fn sync(&self) {
        let _ = self.file.lock().unwrap().sync_all();
    }
}
