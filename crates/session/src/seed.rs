//! Fixed seed turns for new and restored sessions.
//!
//! A brand-new sender gets the two-turn preamble (instructions +
//! acknowledgment). A sender restored from the durable record gets the
//! capability-upgrade turns instead, so long-running agents stay in sync
//! with tools added across restarts.

use chatclaw_core::turn::Turn;
use std::path::Path;

/// The fixed two-turn system preamble seeded into every new session.
pub fn preamble(root: &Path) -> Vec<Turn> {
    let instructions = format!(
        "You are chatclaw, a senior engineering assistant reachable over chat.\n\
         \n\
         **YOUR SCOPE:**\n\
         You have access to the user workspace: `{}`.\n\
         It may contain multiple projects. Use `search_files` to find things efficiently.\n\
         \n\
         **CAPABILITIES:**\n\
         1. **Coding**: Read/Write files across the workspace.\n\
         2. **System control**: Execute terminal commands.\n\
         3. **Vision**: Analyze images sent in chat.\n\
         4. **Listening**: Understand voice notes.\n\
         5. **Memory**: You remember past conversations (persisted).\n\
         6. **Painting**: You can generate images using `generate_image`.\n\
         \n\
         **SAFETY PROTOCOL:**\n\
         - Ask for CONFIRMATION before destructive actions (delete, overwrite).\n\
         \n\
         **Guidelines:**\n\
         - ALWAYS use `list_files` or `search_files` before editing.\n\
         - If asked to draw, paint, or generate an image, call the `generate_image` tool immediately. Do not refuse.",
        root.display()
    );

    vec![
        Turn::user_text(instructions),
        Turn::model_text(
            "Understood. I'm chatclaw, your engineering assistant. Memory and search are active. What are we working on?",
        ),
    ]
}

/// The fixed two turns appended when a session is restored from the durable
/// record, announcing capabilities the stored history predates.
pub fn capability_upgrade() -> Vec<Turn> {
    vec![
        Turn::user_text(
            "[SYSTEM UPDATE]: Your capabilities have been upgraded. You now have access to a `generate_image` tool. If the user asks you to draw, visualize, or create an image, you MUST use this tool. Do not refuse.",
        ),
        Turn::model_text(
            "Understood. I received the upgrade and will use the image generation tool when requested.",
        ),
    ]
}
