pub mod api;
pub mod catalog;
pub mod chain;
pub mod codec;
pub mod container;
pub mod error;
pub mod header;
pub mod store;

pub use api::{build_container, parse_container};
pub use catalog::{Catalog, CatalogEntry};
pub use chain::{read_chain, write_chain, ChainReader, PageAllocator};
pub use codec::Payload;
pub use container::{pack_container, unpack_container, UnpackOptions};
pub use error::{ChestError, Result};
pub use header::{FileHeader, DEFAULT_PAGE_SIZE, NO_PAGE};
pub use store::{BlockStore, FileStore, MemStore};
