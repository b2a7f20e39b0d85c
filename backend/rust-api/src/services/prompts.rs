use crate::models::chat::{ConversationMode, Difficulty};

const BASE_PERSONA: &str = "You are Arami, a friendly and encouraging Guaraní teacher. \
Help the learner practise Guaraní through conversation. Keep replies short and warm, \
mostly in Spanish with simple Guaraní words and phrases mixed in. \
Correct mistakes gently. When you introduce a Guaraní word or phrase for the learner \
to remember, wrap it in single quotes, like 'Iporãnte'.";

fn difficulty_block(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Beginner => {
            "Level: beginner. Use very short sentences and everyday vocabulary. \
Give the Spanish meaning of every Guaraní word you use."
        }
        Difficulty::Intermediate => {
            "Level: intermediate. Write about half of each reply in Guaraní. \
Translate only new or uncommon words."
        }
        Difficulty::Advanced => {
            "Level: advanced. Reply mostly in Guaraní, including jopara where natural. \
Avoid translations unless the learner asks."
        }
    }
}

/// Persona, then the difficulty block, then the scenario prompt when a mode
/// is attached.
pub fn system_instruction(difficulty: Difficulty, mode: Option<&ConversationMode>) -> String {
    let mut instruction = format!("{}\n\n{}", BASE_PERSONA, difficulty_block(difficulty));
    if let Some(mode) = mode {
        instruction.push_str("\n\nScenario:\n");
        instruction.push_str(&mode.system_prompt);
    }
    instruction
}

pub const GRAMMAR_SYSTEM_INSTRUCTION: &str = "You are a strict Guaraní grammar checker. \
Answer with JSON only.";

pub fn grammar_prompt(message: &str) -> String {
    format!(
        "Review the Guaraní in the learner message below. Return a JSON array; \
each item must have the string fields \"original_text\", \"corrected_text\", \
\"error_type\", \"explanation\" (in Spanish) and \"severity\" (one of \"low\", \
\"medium\", \"high\"). Return [] when there are no mistakes.\n\nMessage: {}",
        message
    )
}

pub const TRANSLATION_SYSTEM_INSTRUCTION: &str = "You translate Spanish into Guaraní. \
Reply with the Guaraní translation only, with no notes, quotes or explanations.";

pub fn translation_prompt(text: &str) -> String {
    format!("Translate to Guaraní: {}", text)
}

struct ModeSeed {
    key: &'static str,
    name: &'static str,
    icon: &'static str,
    description: &'static str,
    system_prompt: &'static str,
    example_phrases: &'static [&'static str],
    difficulty: Difficulty,
}

const MODE_SEEDS: &[ModeSeed] = &[
    ModeSeed {
        key: "free",
        name: "Conversación libre",
        icon: "💬",
        description: "Charlá de lo que quieras",
        system_prompt: "Talk naturally about any topic the learner brings up and match their level.",
        example_phrases: &["Mba'éichapa", "Mba'épa rejapo ko'ãga?"],
        difficulty: Difficulty::Beginner,
    },
    ModeSeed {
        key: "market",
        name: "Mercado",
        icon: "🏪",
        description: "Comprá en un mercado paraguayo",
        system_prompt: "You are a stall keeper at a Paraguayan market selling fruit, vegetables and local goods. \
Practise prices (hepykue), cheap (hepy'ỹ) and expensive (hepy), quantities and haggling. \
Offer mandi'o, avati and other staples.",
        example_phrases: &["Mbovýpa hepykue?", "Hepyeterei!"],
        difficulty: Difficulty::Beginner,
    },
    ModeSeed {
        key: "greetings",
        name: "Saludos",
        icon: "👋",
        description: "Saludos y presentaciones",
        system_prompt: "Practise greetings and introductions: Mba'éichapa, Iporãnte, Mba'éichapa nde réra. \
Ask simple questions about family, age and where the learner is from.",
        example_phrases: &["Mba'éichapa", "Che réra ..."],
        difficulty: Difficulty::Beginner,
    },
    ModeSeed {
        key: "restaurant",
        name: "Restaurante",
        icon: "🍽️",
        description: "Pedí comida en un restaurante",
        system_prompt: "You are a waiter at a Paraguayan restaurant. Present sopa paraguaya, chipa, mbeju and asado, \
ask about preferences and allergies, and practise Che aikotevẽ and Che ahayhu.",
        example_phrases: &["Che aikotevẽ peteĩ chipa", "Mba'épa rerekojey?"],
        difficulty: Difficulty::Intermediate,
    },
    ModeSeed {
        key: "emergency",
        name: "Emergencias",
        icon: "🏥",
        description: "Pedir ayuda en una emergencia",
        system_prompt: "Practise emergency phrases: pain (hasy), doctor (pohanohára), hospital, \
asking for help (Che aikotevẽ pytyvõ), describing symptoms and giving directions.",
        example_phrases: &["Che aikotevẽ pytyvõ", "Hasy che akã"],
        difficulty: Difficulty::Intermediate,
    },
    ModeSeed {
        key: "home",
        name: "En casa",
        icon: "🏠",
        description: "Conversación familiar en casa",
        system_prompt: "Hold a relaxed family conversation at home in everyday jopara. \
Talk about food (tembi'u), the house (óga), plans for the day and family.",
        example_phrases: &["Mba'épa jakaruta?", "Aháta óga guive"],
        difficulty: Difficulty::Beginner,
    },
    ModeSeed {
        key: "celebration",
        name: "Celebraciones",
        icon: "🎉",
        description: "Fiestas y celebraciones",
        system_prompt: "Set the scene at a Paraguayan celebration. Practise birthday wishes, congratulations, \
gifts, and talk about traditions such as ñandutí, ao po'i, music and dance.",
        example_phrases: &["Vy'apavẽ nde ára!", "Jajeroky!"],
        difficulty: Difficulty::Intermediate,
    },
];

pub fn builtin_modes() -> Vec<ConversationMode> {
    MODE_SEEDS
        .iter()
        .map(|seed| ConversationMode {
            key: seed.key.to_string(),
            name: seed.name.to_string(),
            icon: seed.icon.to_string(),
            description: seed.description.to_string(),
            system_prompt: seed.system_prompt.to_string(),
            example_phrases: seed.example_phrases.iter().map(|p| p.to_string()).collect(),
            difficulty_level: seed.difficulty,
            is_active: true,
        })
        .collect()
}

/// Display order of seeded modes; unknown keys sort last.
pub fn mode_rank(key: &str) -> usize {
    MODE_SEEDS
        .iter()
        .position(|seed| seed.key == key)
        .unwrap_or(MODE_SEEDS.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_layers_persona_difficulty_and_mode() {
        let modes = builtin_modes();
        let market = modes.iter().find(|m| m.key == "market").unwrap();

        let instruction = system_instruction(Difficulty::Advanced, Some(market));
        let persona = instruction.find("Arami").unwrap();
        let level = instruction.find("Level: advanced").unwrap();
        let scenario = instruction.find("stall keeper").unwrap();
        assert!(persona < level && level < scenario);
    }

    #[test]
    fn exactly_one_difficulty_block_is_used() {
        let instruction = system_instruction(Difficulty::Beginner, None);
        assert!(instruction.contains("Level: beginner"));
        assert!(!instruction.contains("Level: intermediate"));
        assert!(!instruction.contains("Scenario"));
    }

    #[test]
    fn seven_modes_are_seeded() {
        let modes = builtin_modes();
        assert_eq!(modes.len(), 7);
        assert_eq!(mode_rank("free"), 0);
        assert_eq!(mode_rank("nope"), 7);
    }
}
