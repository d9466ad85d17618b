pub mod models;
mod reader;

pub use reader::{page_to_draft, SourceReader, NOTION_VERSION};
