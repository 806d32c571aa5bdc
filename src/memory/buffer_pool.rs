use parking_lot::Mutex;

/// Pool of reusable byte arenas for batch encoding
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
}

impl BufferPool {
    pub fn new(max_pooled: usize) -> Self {
        BufferPool {
            buffers: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
        }
    }

    /// Empty buffer with at least `size` bytes of capacity
    pub fn get(&self, size: usize) -> Vec<u8> {
        let pooled = {
            let mut buffers = self.buffers.lock();
            // Prefer one that is already large enough
            match buffers.iter().position(|b| b.capacity() >= size) {
                Some(i) => Some(buffers.swap_remove(i)),
                None => buffers.pop(),
            }
        };

        match pooled {
            Some(mut buf) => {
                buf.reserve(size);
                buf
            }
            None => Vec::with_capacity(size),
        }
    }

    pub fn return_buffer(&self, mut buf: Vec<u8>) {
        buf.clear();

        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_pooled {
            buffers.push(buf);
        }
    }

    pub fn pooled(&self) -> usize {
        self.buffers.lock().len()
    }
}
