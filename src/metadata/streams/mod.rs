//! Metadata streams (ECMA-335 II.24.2).
//!
//! Layout analysis needs three of them: the table stream for type and field rows, `#Strings`
//! for identifiers and `#Blob` for signatures and custom attribute values. `#US` and `#GUID`
//! are located by the root but never read.

mod blob;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
