// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    exit_code, load_analysis, load_urls_from_file, next_request, parse_analysis_json,
    parse_choice, split_url_input,
};

// Re-export URL handling from anchorscope-core
pub use anchorscope_core::crawl::{extract_url_path, parse_url_line, prepare_manual_urls};
