//! Static catalog of reusable instruction presets
//!
//! Templates seed a create operation with a curated instruction; gated ones
//! need an active entitlement. Suggestions are free quick-start instructions.

use serde::Serialize;

/// One template in the gallery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    /// Stable identifier
    pub id: &'static str,
    /// Display title
    pub label: &'static str,
    /// One-line pitch
    pub description: &'static str,
    /// Instruction sent to the provider
    pub seed_instruction: &'static str,
    /// Gallery tags
    pub tags: &'static [&'static str],
    /// Requires an entitlement
    pub gated: bool,
}

/// Free quick-start instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub text: &'static str,
    pub category: &'static str,
}

const TEMPLATES: &[TemplateDescriptor] = &[
    TemplateDescriptor {
        id: "1",
        label: "Retro Arcade Game",
        description: "A fully functional Snake game with 8-bit sound effects and CRT screen shader.",
        seed_instruction: "Create a retro snake game with a CRT monitor effect, scanlines, and 8-bit beep sounds when eating food. Use a neon green and black color scheme.",
        tags: &["Game", "Retro"],
        gated: true,
    },
    TemplateDescriptor {
        id: "2",
        label: "DeFi Dashboard",
        description: "Modern cryptocurrency dashboard with live-simulated charts and glassmorphism UI.",
        seed_instruction: "Build a modern crypto dashboard with a sidebar, a main chart area showing Bitcoin price simulation, and a recent transactions list. Use a dark theme with frosted glass cards.",
        tags: &["Finance", "UI Kit"],
        gated: true,
    },
    TemplateDescriptor {
        id: "3",
        label: "Zen Focus Timer",
        description: "Minimalist Pomodoro timer with ambient rain sounds and breathing animations.",
        seed_instruction: "Make a minimalist Pomodoro timer. The background should gently pulse with a breathing animation. Include a button to toggle ambient rain sounds.",
        tags: &["Productivity", "Audio"],
        gated: true,
    },
    TemplateDescriptor {
        id: "4",
        label: "AI Chat Interface",
        description: "A clone of a popular AI chat interface with message bubbles and code highlighting.",
        seed_instruction: "Create a chat interface that looks like ChatGPT. Left sidebar for history, main chat area, and a bottom input box. Use a clean gray and white theme.",
        tags: &["Social", "Layout"],
        gated: true,
    },
    TemplateDescriptor {
        id: "5",
        label: "Interactive Resume",
        description: "A personal portfolio site where sections slide in as you scroll.",
        seed_instruction: "Build an interactive resume website. Sections (About, Skills, Experience) should slide in from the sides as the user scrolls down. Use a sleek, professional typography.",
        tags: &["Portfolio", "Animation"],
        gated: true,
    },
    TemplateDescriptor {
        id: "6",
        label: "Neo-Brutalist Blog",
        description: "High contrast, bold borders, and aggressive shadows for a trendy blog layout.",
        seed_instruction: "Create a blog homepage in Neo-Brutalism style. Use thick black borders, hard shadows, and bright popping colors like neon yellow and pink. Make the buttons rectangular and sharp.",
        tags: &["Blog", "Design"],
        gated: true,
    },
];

const SUGGESTIONS: &[Suggestion] = &[
    Suggestion {
        text: "A calculator that screams in agony when I press equals",
        category: "Useless",
    },
    Suggestion {
        text: "A button that runs away from the mouse cursor",
        category: "Prank",
    },
    Suggestion {
        text: "A zen garden where I can rake sand with my mouse",
        category: "Relaxing",
    },
    Suggestion {
        text: "A to-do list that judges me for adding tasks",
        category: "Productivity",
    },
];

/// Read-only access to the built-in presets
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl Catalog {
    /// All templates, gallery order
    #[inline]
    #[must_use]
    pub fn list() -> &'static [TemplateDescriptor] {
        TEMPLATES
    }

    /// Template by id
    #[must_use]
    pub fn find(id: &str) -> Option<&'static TemplateDescriptor> {
        TEMPLATES.iter().find(|t| t.id == id)
    }

    /// Templates carrying `tag` (case-insensitive)
    #[must_use]
    pub fn tagged(tag: &str) -> Vec<&'static TemplateDescriptor> {
        TEMPLATES
            .iter()
            .filter(|t| t.tags.iter().any(|x| x.eq_ignore_ascii_case(tag)))
            .collect()
    }

    /// Ungated quick-start instructions
    #[inline]
    #[must_use]
    pub fn suggestions() -> &'static [Suggestion] {
        SUGGESTIONS
    }
}
