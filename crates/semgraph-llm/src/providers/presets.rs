/// A named preset for an OpenAI-compatible API.
pub struct ProviderPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub default_base_url: &'static str,
    pub models: &'static [&'static str],
    /// Headers sent only when the session store holds a value for them.
    pub optional_headers: &'static [&'static str],
}

const PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        id: "openai",
        name: "OpenAI",
        default_base_url: "https://api.openai.com/v1",
        models: &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini"],
        optional_headers: &["OpenAI-Organization", "OpenAI-Project"],
    },
    ProviderPreset {
        id: "openrouter",
        name: "OpenRouter",
        default_base_url: "https://openrouter.ai/api/v1",
        models: &["openai/gpt-4o-mini", "anthropic/claude-3.5-sonnet", "meta-llama/llama-3.1-70b-instruct"],
        optional_headers: &["HTTP-Referer", "X-Title"],
    },
    ProviderPreset {
        id: "groq",
        name: "Groq",
        default_base_url: "https://api.groq.com/openai/v1",
        models: &["llama-3.1-8b-instant", "llama-3.3-70b-versatile"],
        optional_headers: &[],
    },
    ProviderPreset {
        id: "mistral",
        name: "Mistral",
        default_base_url: "https://api.mistral.ai/v1",
        models: &["mistral-small-latest", "mistral-large-latest"],
        optional_headers: &[],
    },
    ProviderPreset {
        id: "deepseek",
        name: "DeepSeek",
        default_base_url: "https://api.deepseek.com/v1",
        models: &["deepseek-chat", "deepseek-reasoner"],
        optional_headers: &[],
    },
    ProviderPreset {
        id: "together",
        name: "Together AI",
        default_base_url: "https://api.together.xyz/v1",
        models: &["meta-llama/Llama-3.3-70B-Instruct-Turbo"],
        optional_headers: &[],
    },
];

/// Look up a provider preset by id.
pub fn get_preset(provider: &str) -> Option<&'static ProviderPreset> {
    PRESETS.iter().find(|p| p.id == provider)
}

/// All OpenAI-compatible presets, in registration order.
pub fn all_presets() -> &'static [ProviderPreset] {
    PRESETS
}
