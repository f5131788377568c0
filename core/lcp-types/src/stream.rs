//! Sized readable source for publication resources.

use std::fs::File;
use std::io::{Cursor, Read};

/// A byte source whose total length is known up front.
pub trait ReadableStream: Read + Send {
    /// Total length in bytes.
    fn size(&self) -> u64;
}

impl ReadableStream for Cursor<Vec<u8>> {
    fn size(&self) -> u64 {
        self.get_ref().len() as u64
    }
}

impl ReadableStream for Cursor<&[u8]> {
    fn size(&self) -> u64 {
        self.get_ref().len() as u64
    }
}

impl ReadableStream for File {
    fn size(&self) -> u64 {
        self.metadata().map(|meta| meta.len()).unwrap_or(0)
    }
}

impl<S: ReadableStream + ?Sized> ReadableStream for Box<S> {
    fn size(&self) -> u64 {
        (**self).size()
    }
}
