//! PE file access for .NET assemblies.
//!
//! This module wraps a parsed [`goblin::pe::PE`] together with the bytes it borrows from, so
//! the rest of the crate can move a single [`File`] around while still using goblin's zero-copy
//! view of sections and data directories. Two backends are provided:
//!
//! - [`physical::Physical`] - memory-mapped file on disk
//! - [`memory::Memory`] - an owned byte buffer (used by tests and in-memory images)
//!
//! # Examples
//!
//! ```rust,no_run
//! use layoutscope::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("bin/Debug/net8.0/MyLib.dll"))?;
//! let (clr_rva, clr_size) = file.clr()?;
//! let clr_offset = file.rva_to_offset(clr_rva)?;
//! let header = file.data_slice(clr_offset, clr_size)?;
//! # Ok::<(), layoutscope::Error>(())
//! ```

pub mod io;
mod memory;
pub mod parser;
mod physical;

use std::path::Path;

use crate::{
    Error::{Empty, GoblinErr},
    Result,
};
use goblin::pe::PE;
use memory::Memory;
use ouroboros::self_referencing;
use physical::Physical;

/// Backend trait for file data sources.
///
/// All implementations must be thread-safe; a loaded [`File`] is shared by the load context
/// of one analysis session.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

#[self_referencing]
/// Represents a loaded PE file with .NET metadata.
///
/// Loading validates that the image is a PE file carrying a CLR runtime header directory;
/// everything beyond that (the CLI header, metadata root and tables) is decoded by
/// [`crate::metadata`].
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// The parsed PE structure, referencing the data.
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Loads a PE file from the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a PE image, is empty or has no
    /// CLR runtime header.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Loads a PE file from a memory buffer.
    ///
    /// # Errors
    ///
    /// Same conditions as [`File::from_file`], minus the I/O failures.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data = Box::new(data);

        File::try_new(data, |data| {
            let data = data.as_ref();
            match PE::parse(data.data()) {
                Ok(pe) => match pe.header.optional_header {
                    Some(optional_header) => {
                        if optional_header
                            .data_directories
                            .get_clr_runtime_header()
                            .is_none()
                        {
                            Err(malformed_error!(
                                "File does not have a CLR runtime header directory"
                            ))
                        } else {
                            Ok(pe)
                        }
                    }
                    None => Err(malformed_error!("File does not have an OptionalHeader")),
                },
                Err(error) => Err(GoblinErr(error)),
            }
        })
    }

    /// Returns the total size of the loaded file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns `true` if the file has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw bytes of the image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.with_data(|data| data.data())
    }

    /// Returns a slice of the file data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.with_data(|data| data.data_slice(offset, len))
    }

    /// Returns `true` for PE32+ (64-bit) images.
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.with_pe(|pe| pe.is_64)
    }

    /// Returns the RVA and size of the CLR runtime header (the CLI header).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the directory is missing.
    pub fn clr(&self) -> Result<(usize, usize)> {
        self.with_pe(|pe| {
            let clr_dir = pe
                .header
                .optional_header
                .as_ref()
                .and_then(|optional_header| {
                    optional_header.data_directories.get_clr_runtime_header()
                })
                .ok_or_else(|| malformed_error!("CLR runtime header directory is missing"))?;

            Ok((clr_dir.virtual_address as usize, clr_dir.size as usize))
        })
    }

    /// Converts a relative virtual address (RVA) to a file offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the RVA does not fall inside any section.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        self.with_pe(|pe| {
            let rva_u32 = u32::try_from(rva)
                .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

            for section in &pe.sections {
                let Some(section_max) = section.virtual_address.checked_add(
                    section.virtual_size.max(section.size_of_raw_data),
                ) else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        section.virtual_size
                    ));
                };

                if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::ImageBuilder;

    #[test]
    fn load_buffer() {
        let image = ImageBuilder::new().build();
        let file = File::from_mem(image).unwrap();

        assert!(!file.is_empty());
        assert!(!file.is_pe32_plus());
        assert_eq!(&file.data()[0..2], b"MZ");

        let (clr_rva, clr_size) = file.clr().unwrap();
        assert_eq!(clr_size, 72);

        let offset = file.rva_to_offset(clr_rva).unwrap();
        let header = file.data_slice(offset, 4).unwrap();
        assert_eq!(header, &[72, 0, 0, 0]);
    }

    #[test]
    fn load_invalid() {
        assert!(matches!(File::from_mem(Vec::new()), Err(Empty)));
        assert!(File::from_mem(vec![0xCC; 256]).is_err());
    }

    #[test]
    fn rva_outside_sections() {
        let file = File::from_mem(ImageBuilder::new().build()).unwrap();
        assert!(file.rva_to_offset(0x10).is_err());
        assert!(file.rva_to_offset(0x00FF_FFFF).is_err());
    }
}
