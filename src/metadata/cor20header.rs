//! The CLI header (`IMAGE_COR20_HEADER`, ECMA-335 II.25.3.3).
//!
//! Only the fields needed to reach the metadata root and to classify the image are kept; the
//! remaining directories (resources, strong name, vtable fixups) are skipped but still
//! validated for consistency so that a damaged header is rejected early.

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// `COMIMAGE_FLAGS_ILONLY`
pub const FLAG_IL_ONLY: u32 = 0x0000_0001;
/// `COMIMAGE_FLAGS_32BITREQUIRED`
pub const FLAG_32BIT_REQUIRED: u32 = 0x0000_0002;
/// `COMIMAGE_FLAGS_32BITPREFERRED`
pub const FLAG_32BIT_PREFERRED: u32 = 0x0002_0000;

/// The decoded CLI header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cor20Header {
    /// Size of the header in bytes, always 72.
    pub cb: u32,
    /// Major runtime version required to run the image.
    pub major_runtime_version: u16,
    /// Minor runtime version required to run the image.
    pub minor_runtime_version: u16,
    /// RVA of the metadata root.
    pub meta_data_rva: u32,
    /// Size of the metadata in bytes.
    pub meta_data_size: u32,
    /// `COMIMAGE_FLAGS_*` bits.
    pub flags: u32,
    /// Entry point token or RVA (for native entry points).
    pub entry_point_token: u32,
}

impl Cor20Header {
    /// Parse the header from the bytes at the CLR runtime header directory.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for short input and [`crate::Error::Malformed`]
    /// for inconsistent values.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        const VALID_FLAGS: u32 = 0x0003_001F;

        if data.len() < 72 {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb != 72 {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;
        if major_runtime_version == 0 || major_runtime_version > 10 {
            return Err(malformed_error!(
                "Invalid major runtime version: {}",
                major_runtime_version
            ));
        }

        let meta_data_rva = parser.read_le::<u32>()?;
        if meta_data_rva == 0 {
            return Err(malformed_error!("Metadata RVA cannot be zero"));
        }

        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_size == 0 {
            return Err(malformed_error!("Metadata size cannot be zero"));
        } else if meta_data_size > 0x1000_0000 {
            return Err(malformed_error!(
                "Metadata size {} exceeds reasonable limit (256MB)",
                meta_data_size
            ));
        }

        let flags = parser.read_le::<u32>()?;
        if flags & !VALID_FLAGS != 0 {
            return Err(malformed_error!(
                "Invalid CLR flags: 0x{:08X} contains undefined bits",
                flags
            ));
        }

        let entry_point_token = parser.read_le::<u32>()?;

        // Resources, strong name signature, code manager table, vtable fixups,
        // export address table jumps and the managed native header
        for directory in 0..6 {
            let rva = parser.read_le::<u32>()?;
            let size = parser.read_le::<u32>()?;
            if (rva == 0) != (size == 0) {
                return Err(malformed_error!(
                    "CLR header directory {} is inconsistent - rva {} size {}",
                    directory,
                    rva,
                    size
                ));
            }
        }

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags,
            entry_point_token,
        })
    }

    /// `true` when the image contains only IL.
    #[must_use]
    pub fn is_il_only(&self) -> bool {
        self.flags & FLAG_IL_ONLY != 0
    }

    /// `true` when the image must run in a 32-bit process.
    #[must_use]
    pub fn requires_32bit(&self) -> bool {
        self.flags & FLAG_32BIT_REQUIRED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes() -> Vec<u8> {
        #[rustfmt::skip]
        let mut data = vec![
            0x48, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x05, 0x00,
            0x00, 0x21, 0x00, 0x00,
            0x00, 0x04, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];
        data.resize(72, 0);
        data
    }

    #[test]
    fn crafted() {
        let header = Cor20Header::read(&header_bytes()).unwrap();

        assert_eq!(header.cb, 72);
        assert_eq!(header.major_runtime_version, 2);
        assert_eq!(header.minor_runtime_version, 5);
        assert_eq!(header.meta_data_rva, 0x2100);
        assert_eq!(header.meta_data_size, 0x400);
        assert!(header.is_il_only());
        assert!(header.requires_32bit());
    }

    #[test]
    fn crafted_invalid() {
        let mut data = header_bytes();
        data[0] = 0x40;
        assert!(Cor20Header::read(&data).is_err());

        let mut data = header_bytes();
        data[8..12].copy_from_slice(&[0, 0, 0, 0]);
        assert!(Cor20Header::read(&data).is_err());

        // resource rva without size
        let mut data = header_bytes();
        data[24] = 0x10;
        assert!(Cor20Header::read(&data).is_err());

        assert!(matches!(Cor20Header::read(&[0; 10]), Err(OutOfBounds)));
    }
}
