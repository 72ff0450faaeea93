//! A set of built-in tools that the assistant can use.
//!
//! Tools are grouped into modules, which are installed by name from the
//! configuration.

mod files;
mod html;
mod web;

use std::path::PathBuf;
use std::sync::Arc;

use autoassist_core::tool::ToolModule;

pub use files::{
    ListFilesTool, ListFoldersTool, ReadFileTool, SleepTool, WriteFileTool,
};
pub use html::html_to_text;
pub use web::{
    DuckDuckGoBackend, FetchContentTool, LinearBackoff, SearchBackend,
    SearchError, SearchResult, WebSearchTool,
};

/// Name of the module with the file tools.
pub const CORE_MODULE: &str = "core";
/// Name of the module with the web tools.
pub const WEB_MODULE: &str = "web";

/// Returns the module of tools that keep files in `outputs_dir`.
pub fn core_module<P: Into<PathBuf>>(outputs_dir: P) -> ToolModule {
    let root = outputs_dir.into();
    ToolModule::new(CORE_MODULE)
        .with_tool(WriteFileTool::new(root.clone()))
        .with_tool(ReadFileTool::new(root.clone()))
        .with_tool(ListFoldersTool::new(root.clone()))
        .with_tool(ListFilesTool::new(root))
        .with_tool(SleepTool::new())
}

/// Returns the module of tools that read the web.
pub fn web_module(search_backend: Arc<dyn SearchBackend>) -> ToolModule {
    ToolModule::new(WEB_MODULE)
        .with_tool(FetchContentTool::new())
        .with_tool(WebSearchTool::new(search_backend))
}
