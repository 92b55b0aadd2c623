//! Response shaping and inline request framing.

use contextmesh_core::ResponseFormat;

/// Token that, anywhere in an instruction, asks for JSON output.
pub const STRUCTURED_MARKER: &str = "JSON";

const CONTEXT_HEADER: &str = "Here is the codebase context:";
const CONTEXT_FOOTER: &str = "--- End of Codebase ---";
const QUERY_HEADER: &str = "User Query:";

/// Pick the output format for `instruction`.
///
/// Plain substring test, case-sensitive.
pub fn response_format(instruction: &str) -> ResponseFormat {
    if instruction.contains(STRUCTURED_MARKER) {
        ResponseFormat::Json
    } else {
        ResponseFormat::Text
    }
}

/// Content parts for a request that carries the whole document.
pub fn inline_contents(instruction: &str, document: &str, prompt: &str) -> Vec<String> {
    vec![
        instruction.to_string(),
        CONTEXT_HEADER.to_string(),
        document.to_string(),
        CONTEXT_FOOTER.to_string(),
        QUERY_HEADER.to_string(),
        prompt.to_string(),
    ]
}
