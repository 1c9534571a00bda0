//! The binary image pushed to the target.

use std::{convert::TryFrom, fmt, fs, path::Path};

use log::debug;

use crate::error::{Error, Result};

/// An image read in full from disk.
///
/// A new `BinaryImage` is loaded for every push attempt; nothing is cached
/// between attempts.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryImage {
    data: Vec<u8>,
}

impl BinaryImage {
    /// Read the whole file at `path`.
    ///
    /// The size must fit in the 32-bit size field of the protocol.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| Error::Image {
            path: path.display().to_string(),
            source,
        })?;
        if u32::try_from(data.len()).is_err() {
            return Err(Error::ImageTooLarge {
                path: path.display().to_string(),
                size: data.len() as u64,
            });
        }
        debug!("loaded `{}` ({} bytes)", path.display(), data.len());
        Ok(BinaryImage { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The value sent in the size field.
    pub fn size(&self) -> u32 {
        // `load` rejects anything bigger.
        self.data.len() as u32
    }
}

impl fmt::Debug for BinaryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryImage")
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
impl From<Vec<u8>> for BinaryImage {
    fn from(data: Vec<u8>) -> Self {
        BinaryImage { data }
    }
}
