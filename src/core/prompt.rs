//! TC-003: Translation instructions sent to every backend.

/// System instruction: target language, speed goal, numeric fidelity, and
/// a code-only reply.
pub const SYSTEM_INSTRUCTION: &str = "You are an assistant that reimplements Python code in high performance C++ \
for cross-platform systems. Respond only with C++ code; keep comments sparse and give no explanation \
beyond occasional comments. The C++ program must produce output identical to the Python program in the \
shortest possible time. Keep any random number generator implementations identical so results match exactly.";

/// Wrap the source program in the per-request instruction.
pub fn user_prompt(source: &str) -> String {
    format!(
        "Rewrite this Python code in C++ with the fastest possible implementation that produces identical \
output in the least time. Respond only with C++ code; do not explain your work beyond a few comments. \
Pay attention to number types so that no integer overflows. Remember to #include every C++ header \
needed, such as <iomanip>.\n\n{}",
        source
    )
}
