pub mod format;
pub mod container;
pub mod extract;
pub mod writer;
pub mod discover;

pub use container::{Container, LocateError, ParseError, ParseMode, Report, SectionInfo};
pub use extract::{extract_line, ExtractError};
pub use format::{SectionEntry, Trailer};
pub use writer::{BuildError, ContainerBuilder};
