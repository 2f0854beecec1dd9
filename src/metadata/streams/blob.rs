use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// The `#Blob` heap: length-prefixed byte sequences addressed by byte offset.
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Wrap the heap bytes. The heap must start with the empty blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is empty or does not start with `0`.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Blob heap is empty"));
        }

        Ok(Blob { data })
    }

    /// Get the blob starting at `index`, without its compressed length prefix.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the blob extends past the heap.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        let skip = parser.pos();

        let Some(data_start) = index.checked_add(skip) else {
            return Err(OutOfBounds);
        };
        let Some(data_end) = data_start.checked_add(len) else {
            return Err(OutOfBounds);
        };
        if data_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[data_start..data_end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x00,
            0x02, 0x06, 0x08,
            0x03, 0x06, 0x1D, 0x08,
            0x00,
        ];

        let heap = Blob::from(&data).unwrap();
        assert_eq!(heap.get(0).unwrap(), &[] as &[u8]);
        assert_eq!(heap.get(1).unwrap(), &[0x06, 0x08]);
        assert_eq!(heap.get(4).unwrap(), &[0x06, 0x1D, 0x08]);
        assert!(heap.get(8).unwrap().is_empty());
    }

    #[test]
    fn invalid() {
        assert!(Blob::from(&[0u8; 0]).is_err());
        assert!(Blob::from(&[0x01]).is_err());

        let heap = Blob::from(&[0x00, 0x05, 0x01]).unwrap();
        assert!(matches!(heap.get(1), Err(OutOfBounds)));
        assert!(matches!(heap.get(3), Err(OutOfBounds)));
    }
}
