//! The metadata root (`BSJB` header, ECMA-335 II.24.2.1).

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Magic signature of the metadata root (`BSJB`).
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The metadata root and its stream directory.
pub struct Root {
    /// Always [`CIL_HEADER_MAGIC`].
    pub signature: u32,
    /// Major version, usually 1.
    pub major_version: u16,
    /// Minor version, usually 1.
    pub minor_version: u16,
    /// Padded length of the version string.
    pub length: u32,
    /// Runtime version string, e.g. `v4.0.30319`.
    pub version: String,
    /// Reserved flags.
    pub flags: u16,
    /// Headers of all streams, in directory order.
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the metadata root from the bytes at the metadata RVA.
    ///
    /// Stream headers are validated against `data`; their offsets are relative to the start of
    /// the root.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] if the root or its
    /// stream directory is damaged.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 36 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let version_length = read_le_at::<u32>(data, &mut 12)?;
        let Some(version_end) = (version_length as usize).checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                version_length
            ));
        };
        if version_end + 4 > data.len() {
            return Err(OutOfBounds);
        }

        let version_bytes = &data[16..version_end];
        let version_len = version_bytes
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(version_bytes.len());
        let version = String::from_utf8_lossy(&version_bytes[..version_len]).into_owned();

        let flags = read_le_at::<u16>(data, &mut version_end.clone())?;
        let stream_count = read_le_at::<u16>(data, &mut (version_end + 2))?;
        if stream_count == 0 || stream_count > 8 || usize::from(stream_count) * 9 > data.len() {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        let mut stream_offset = version_end + 4;
        for _ in 0..stream_count {
            if stream_offset > data.len() {
                return Err(OutOfBounds);
            }

            let header = StreamHeader::from(&data[stream_offset..])?;
            match header.offset.checked_add(header.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(OutOfBounds),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        header.offset,
                        header.size
                    ))
                }
            }

            let name_aligned = ((header.name.len() + 1) + 3) & !3;
            stream_offset += 8 + name_aligned;

            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            length: version_length,
            version,
            flags,
            stream_headers,
        })
    }

    /// Find a stream header by name (`#~`, `#Strings`, ...).
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = vec![
            0x42, 0x53, 0x4A, 0x42,
            0x01, 0x00, 0x01, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x0C, 0x00, 0x00, 0x00,
            b'v', b'4', b'.', b'0', b'.', b'3', b'0', b'3', b'1', b'9', 0x00, 0x00,
            0x00, 0x00,
            0x02, 0x00,
            // #~
            0x3C, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, b'#', b'~', 0x00, 0x00,
            // #Strings
            0x40, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
            b'#', b'S', b't', b'r', b'i', b'n', b'g', b's', 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x61, 0x00, 0x00,
        ];

        let root = Root::read(&data).unwrap();
        assert_eq!(root.signature, CIL_HEADER_MAGIC);
        assert_eq!(root.version, "v4.0.30319");
        assert_eq!(root.length, 12);
        assert_eq!(root.stream_headers.len(), 2);
        assert_eq!(root.stream("#~").unwrap().offset, 0x3C);
        assert_eq!(root.stream("#Strings").unwrap().size, 4);
        assert!(root.stream("#Blob").is_none());
    }

    #[test]
    fn crafted_invalid() {
        let mut data = vec![0u8; 40];
        data[0..4].copy_from_slice(&[0x42, 0x53, 0x4A, 0x43]);
        assert!(Root::read(&data).is_err());

        assert!(matches!(Root::read(&[0u8; 10]), Err(OutOfBounds)));
    }
}
