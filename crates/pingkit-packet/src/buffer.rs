/// A byte buffer over either a borrowed read-only slice or a borrowed mutable slice.
///
/// Packets parsed from the wire are `Immutable` views, packets being built for sending are
/// `Mutable`. Writing to an `Immutable` buffer is a programming error and panics.
#[derive(Debug)]
pub enum Buffer<'a> {
    Immutable(&'a [u8]),
    Mutable(&'a mut [u8]),
}

impl Buffer<'_> {
    /// The whole buffer as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Immutable(bytes) => bytes,
            Buffer::Mutable(bytes) => bytes,
        }
    }

    /// The whole buffer as a mutable byte slice.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        match self {
            Buffer::Immutable(_) => panic!("write operation called on readonly buffer"),
            Buffer::Mutable(bytes) => bytes,
        }
    }

    /// Read `N` bytes starting at `offset`.
    pub fn get_bytes<const N: usize>(&self, offset: usize) -> [u8; N] {
        core::array::from_fn(|i| self.read(offset + i))
    }

    /// Write `N` bytes starting at `offset`.
    pub fn set_bytes<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        self.as_slice_mut()[offset..offset + N].copy_from_slice(&bytes);
    }

    /// Read a single byte.
    pub fn read(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    /// A mutable reference to a single byte.
    pub fn write(&mut self, offset: usize) -> &mut u8 {
        &mut self.as_slice_mut()[offset]
    }
}
