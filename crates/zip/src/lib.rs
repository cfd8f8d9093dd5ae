pub mod archive;
pub mod entry;
pub mod errors;

mod structs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use archive::*;
pub use entry::*;
pub use errors::*;
