//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");
pub const ANALYZE: &str = include_str!("../../prompts/analyze.pmt");
pub const GATHER_CONTEXT: &str = include_str!("../../prompts/gather-context.pmt");
pub const STRUCTURE: &str = include_str!("../../prompts/structure.pmt");
pub const FINALIZE: &str = include_str!("../../prompts/finalize.pmt");
pub const CHAT: &str = include_str!("../../prompts/chat.pmt");

/// Names of every embedded template
pub const NAMES: [&str; 6] = ["system", "analyze", "gather-context", "structure", "finalize", "chat"];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system" => Some(SYSTEM),
        "analyze" => Some(ANALYZE),
        "gather-context" => Some(GATHER_CONTEXT),
        "structure" => Some(STRUCTURE),
        "finalize" => Some(FINALIZE),
        "chat" => Some(CHAT),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
