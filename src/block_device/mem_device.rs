use std::sync::Mutex;

use crate::block_device::block_device::BlockDevice;

/// RAM-backed device for tests and benches.
pub struct MemDevice {
    data: Mutex<Vec<u8>>,
}

impl MemDevice {
    pub fn new(len: usize) -> Self {
        Self {
            data: Mutex::new(vec![0u8; len]),
        }
    }
}

impl BlockDevice for MemDevice {
    fn read_at(&self, buf: &mut [u8], offset: u64) {
        let data = self.data.lock().unwrap();
        let offset = offset as usize;
        buf.copy_from_slice(&data[offset..offset + buf.len()]);
    }

    fn write_at(&self, buf: &[u8], offset: u64) {
        let mut data = self.data.lock().unwrap();
        let offset = offset as usize;
        data[offset..offset + buf.len()].copy_from_slice(buf);
    }

    fn sync(&self) {}
}
