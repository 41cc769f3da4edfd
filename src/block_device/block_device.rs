/// Byte-addressed image device. Reads and writes are infallible for
/// in-range spans; multi-byte cells are persisted atomically.
pub trait BlockDevice: Send + Sync {
    fn read_at(&self, buf: &mut [u8], offset: u64);
    fn write_at(&self, buf: &[u8], offset: u64);
    fn sync(&self);
}
