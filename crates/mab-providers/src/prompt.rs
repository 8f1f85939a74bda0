//! Prompts sent to the generation model and cleanup of its output

use mab_artifact::{transcript, Turn};

/// System instruction shared by create and edit requests
pub const SYSTEM_INSTRUCTION: &str = r#"You are a world-class "Micro-App" generator. Your goal is to create fully functional, single-file HTML applications based on user prompts.

**DESIGN & AESTHETICS (CRITICAL):**
1.  **Modern Clean (Default)**:
    *   **Light Mode**: Background MUST be `bg-white`. Text `text-zinc-950`.
    *   **Dark Mode**: Background MUST be `bg-black` (pure black #000000). Text `text-white`.
    *   **Buttons**: ALWAYS use **pill-shaped** buttons (`rounded-full`).
        *   Light: `bg-zinc-100 hover:bg-zinc-200 text-black px-6 py-2 transition-colors font-medium`.
        *   Dark: Glossy/Frosted look. `bg-zinc-900/50 backdrop-blur-md border border-white/10 hover:bg-white/10 text-white px-6 py-2 transition-all font-medium`.
    *   **Cards/Containers**: Use **frosted glass** effects.
        *   Light: `bg-white/80 backdrop-blur-xl border border-zinc-100 shadow-sm rounded-3xl`.
        *   Dark: `bg-zinc-900/70 backdrop-blur-xl border border-white/5 rounded-3xl`.
    *   **Inputs**: Pill-shaped (`rounded-full`) with subtle borders.
2.  **Neo-Brutalism**: ONLY If explicitly asked.
    *   Use hard borders (`border-2 border-black`).
    *   Hard shadows (`shadow-[4px_4px_0px_0px_rgba(0,0,0,1)]`).
    *   Bold, high-contrast colors (Neon Green, Hot Pink, Cyan).
    *   Sharp corners or slight rounding.

**TECHNICAL RULES:**
1.  **Output Format**: Return ONLY the raw HTML string. Do not wrap it in markdown code blocks.
2.  **Tech Stack**:
    *   Tailwind CSS (CDN).
    *   React & ReactDOM (CDN).
    *   Babel Standalone (CDN).
    *   Lucide React (CDN - via unpkg or similar if needed, or SVG icons). Ideally use inline SVGs or standard text for simplicity unless specified.
3.  **Structure**:
    *   Standard HTML5 boilerplate.
    *   Root div with id="root".
    *   Script tag type="text/babel".
4.  **Functionality**:
    *   Self-contained. No external assets unless standard CDNs.
    *   Make it interactive and polished.

**Example of specific requested style**:
If the user asks for "Make a calculator", provide a sleek, Apple-style calculator with frosted glass background and pill/circle buttons.
"#;

/// User prompt for a fresh generation
#[must_use]
pub fn create_prompt(instruction: &str) -> String {
    format!("Create a micro-app for this request: \"{instruction}\"")
}

/// User prompt for a revision of `body`
#[must_use]
pub fn edit_prompt(body: &str, prior_history: &[Turn], instruction: &str) -> String {
    let history = transcript(prior_history);
    format!(
        "Here is the current HTML code of a web app:\n\n\
         {body}\n\n\
         ***\n\
         Conversation History:\n\
         {history}\n\
         ***\n\n\
         The user wants to make this NEW change: \"{instruction}\".\n\n\
         Return the FULLY UPDATED HTML code. Apply the requested changes while maintaining \
         the existing functionality and the design guidelines (Pill shaped buttons, frosted \
         glass, pure black/white backgrounds). Return ONLY raw HTML."
    )
}

/// Drop markdown code fences the model adds despite being told not to
#[must_use]
pub fn strip_fences(output: &str) -> String {
    output.replace("```html", "").replace("```", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_prompt_quotes_instruction() {
        assert_eq!(
            create_prompt("red button"),
            "Create a micro-app for this request: \"red button\""
        );
    }

    #[test]
    fn edit_prompt_embeds_context() {
        let history = vec![Turn::user("add a title"), Turn::assistant("done")];
        let prompt = edit_prompt("<html>RED</html>", &history, "make it blue");

        assert!(prompt.starts_with("Here is the current HTML code of a web app:\n\n<html>RED</html>\n"));
        assert!(prompt.contains("Conversation History:\nUser: add a title\nAI: done\n***"));
        assert!(prompt.contains("NEW change: \"make it blue\"."));
        assert!(prompt.ends_with("Return ONLY raw HTML."));
    }

    #[test]
    fn edit_prompt_with_empty_history() {
        let prompt = edit_prompt("<html/>", &[], "x");
        assert!(prompt.contains("Conversation History:\n\n***"));
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_fences("```html\n<html></html>\n```\n"), "<html></html>");
        assert_eq!(strip_fences("  <p>plain</p> "), "<p>plain</p>");
        assert_eq!(strip_fences("```"), "");
    }
}
