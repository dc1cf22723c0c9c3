use ratatui::style::Color;

#[derive(Clone, Debug)]
pub struct Theme {
    pub name: String,
    /// Button face.
    pub primary: Color,
    /// History chips.
    pub accent: Color,
    /// Shortcut bar.
    pub highlight: Color,
    pub background: Color,
    pub surface: Color,
    pub text: Color,
    /// Flash items.
    pub muted: Color,
}

struct ThemeDefinition {
    name: &'static str,
    primary: &'static str,
    accent: &'static str,
    highlight: &'static str,
    background: &'static str,
    surface: &'static str,
    text: &'static str,
    muted: &'static str,
}

const THEME_PRESETS: &[(&str, ThemeDefinition)] = &[
    (
        "nord",
        ThemeDefinition {
            name: "Nord",
            primary: "#D08770",
            accent: "#EBCB8B",
            highlight: "#76B3C5",
            background: "#3B4252",
            surface: "#4C566A",
            text: "#ECEFF4",
            muted: "#8FA1B3",
        },
    ),
    (
        "canteen",
        ThemeDefinition {
            name: "Canteen",
            primary: "#FF911E",
            accent: "#FFBA30",
            highlight: "#E88E1D",
            background: "#E9E9E9",
            surface: "#F5F6F7",
            text: "#111111",
            muted: "#777777",
        },
    ),
    (
        "classic",
        ThemeDefinition {
            name: "Midnight Classic",
            primary: "#6FC6D4",
            accent: "#9FE6EC",
            highlight: "#6FC6D4",
            background: "#314A63",
            surface: "#416079",
            text: "#F2F8FF",
            muted: "#8AA4BC",
        },
    ),
    (
        "dusk",
        ThemeDefinition {
            name: "Midnight Dusk",
            primary: "#6BC6D7",
            accent: "#A1E6EC",
            highlight: "#6BC6D7",
            background: "#2E475F",
            surface: "#3E5D78",
            text: "#F5FBFF",
            muted: "#7F9AB3",
        },
    ),
];

impl Theme {
    pub fn from_name(key: &str) -> Option<Self> {
        THEME_PRESETS
            .iter()
            .find(|(preset_key, _)| *preset_key == key)
            .map(|(_, def)| Theme::from_definition(def))
    }

    pub fn preset_keys() -> Vec<&'static str> {
        THEME_PRESETS.iter().map(|(key, _)| *key).collect()
    }

    /// Preset for `key`, or the default preset when the key is unknown.
    pub fn resolve(key: &str) -> Self {
        Theme::from_name(key).unwrap_or_else(|| {
            tracing::warn!(theme = key, "unknown theme, using the default");
            Theme::from_definition(&THEME_PRESETS[0].1)
        })
    }

    fn from_definition(def: &ThemeDefinition) -> Self {
        Theme {
            name: def.name.to_string(),
            primary: color_from_hex(def.primary).unwrap_or(Color::Yellow),
            accent: color_from_hex(def.accent).unwrap_or(Color::LightYellow),
            highlight: color_from_hex(def.highlight).unwrap_or(Color::Cyan),
            background: color_from_hex(def.background).unwrap_or(Color::Black),
            surface: color_from_hex(def.surface).unwrap_or(Color::DarkGray),
            text: color_from_hex(def.text).unwrap_or(Color::White),
            muted: color_from_hex(def.muted).unwrap_or(Color::Gray),
        }
    }
}

pub fn color_from_hex(value: &str) -> Option<Color> {
    let normalized = normalize_hex(value)?;
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&normalized[range], 16).ok();
    Some(Color::Rgb(channel(1..3)?, channel(3..5)?, channel(5..7)?))
}

fn normalize_hex(value: &str) -> Option<String> {
    let mut cleaned = value.trim().to_string();
    if !cleaned.starts_with('#') {
        cleaned.insert(0, '#');
    }
    if cleaned.len() != 7 || !cleaned.is_ascii() {
        return None;
    }
    Some(cleaned)
}
