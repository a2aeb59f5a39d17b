pub mod annotator;
pub mod decomposition;
pub mod formatter;
pub mod prompts;
pub mod service;

pub use annotator::MessageAnnotator;
pub use decomposition::parse_components;
pub use formatter::{format_context_items, format_to_html, ContextShape};
pub use service::QueryService;
