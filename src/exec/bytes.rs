// Shared Byte Buffers
//
// Tuple storage handed across the DSL boundary as opaque byte pointers.
// Buffers are shared handles so a pointer returned by a container stays
// valid while the container lives.

use std::sync::Arc;

use parking_lot::Mutex;

/// A shared, growable byte buffer.
#[derive(Clone, Default)]
pub struct ByteBuffer(Arc<Mutex<Vec<u8>>>);

impl ByteBuffer {
    pub fn with_size(size: usize) -> Self {
        ByteBuffer(Arc::new(Mutex::new(vec![0u8; size])))
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        ByteBuffer(Arc::new(Mutex::new(data)))
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.0.lock())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        f(&mut self.0.lock())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    /// Write `src` at `offset`, growing the buffer if needed.
    pub fn put(&self, offset: usize, src: &[u8]) {
        let mut buf = self.0.lock();
        if buf.len() < offset + src.len() {
            buf.resize(offset + src.len(), 0);
        }
        buf[offset..offset + src.len()].copy_from_slice(src);
    }

    pub fn get(&self, offset: usize, len: usize) -> Vec<u8> {
        self.0.lock()[offset..offset + len].to_vec()
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteBuffer[{} bytes]", self.len())
    }
}

/// A byte pointer: a buffer handle plus an offset into it.
#[derive(Clone, Debug)]
pub struct BytePtr {
    pub buf: ByteBuffer,
    pub offset: usize,
}

impl BytePtr {
    pub fn new(buf: ByteBuffer) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn at(&self, delta: usize) -> Self {
        Self { buf: self.buf.clone(), offset: self.offset + delta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let buf = ByteBuffer::with_size(8);
        buf.put(2, &[1, 2, 3]);
        assert_eq!(buf.get(2, 3), vec![1, 2, 3]);
        assert_eq!(buf.len(), 8);
        // Growing write
        buf.put(7, &[9, 9]);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn test_ptr_offsets_share_storage() {
        let ptr = BytePtr::new(ByteBuffer::with_size(16));
        let field = ptr.at(4);
        field.buf.put(field.offset, &[7]);
        assert_eq!(ptr.buf.get(4, 1), vec![7]);
    }
}
