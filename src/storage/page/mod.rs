//! Page types and layout.
//!
//! - [`Page`] - The raw 4KB data container
//! - [`PageHeader`] - Type tag and checksum at the start of every page
//! - [`PageType`] - Discriminator for different page formats

#[allow(clippy::module_inception)]
mod page;
mod page_header;

pub use page::Page;
pub(crate) use page::{read_i32, read_u16, read_u32, write_i32, write_u16, write_u32};
pub use page_header::{PageHeader, PageType};
