//! Service layer separating I/O and encoding from pipeline logic

pub mod format;
pub mod io;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
