/// Action profile library — embedded at compile time from `data/profiles/*.toml`.
///
/// A profile is a ready-made, ordered action list for one class/style. A
/// config that names `profile = "class/style"` and declares no `[[actions]]`
/// takes its rotation from here. Embedding means no runtime path resolution.
use crate::config::ActionDefinition;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Embedded TOML data
// ---------------------------------------------------------------------------

const KNIGHT_MELEE:   &str = include_str!("../data/profiles/knight_melee.toml");
const PALADIN_RANGED: &str = include_str!("../data/profiles/paladin_ranged.toml");
const SORCERER_MAGE:  &str = include_str!("../data/profiles/sorcerer_mage.toml");

static ALL_PROFILE_DATA: &[&str] = &[
    KNIGHT_MELEE,
    PALADIN_RANGED,
    SORCERER_MAGE,
];

// ---------------------------------------------------------------------------
// TOML deserialization structs (private)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlFile {
    profile: TomlProfile,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlProfile {
    class:       String,
    style:       String,
    #[serde(default)]
    description: String,
    actions:     Vec<ActionDefinition>,
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ActionProfile {
    pub class:       String,
    pub style:       String,
    pub description: String,
    /// Declaration order preserved — it is the tie-break.
    pub actions:     Vec<ActionDefinition>,
}

impl ActionProfile {
    /// Canonical "class/style" key used in `rotation.toml`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.class, self.style)
    }
}

/// Lightweight descriptor for listings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProfileInfo {
    pub key:         String,
    pub description: String,
    pub actions:     usize,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_all() -> Vec<ActionProfile> {
    ALL_PROFILE_DATA
        .iter()
        .filter_map(|toml_str| {
            let file: TomlFile = toml::from_str(toml_str)
                .map_err(|e| tracing::warn!("Failed to parse profile TOML: {}", e))
                .ok()?;
            Some(ActionProfile {
                class:       file.profile.class,
                style:       file.profile.style,
                description: file.profile.description,
                actions:     file.profile.actions,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn list_all() -> Vec<ProfileInfo> {
    parse_all()
        .into_iter()
        .map(|p| ProfileInfo {
            key:         p.key(),
            actions:     p.actions.len(),
            description: p.description,
        })
        .collect()
}

/// Case-insensitive lookup by class and style.
pub fn load(class: &str, style: &str) -> Option<ActionProfile> {
    parse_all().into_iter().find(|p| {
        p.class.eq_ignore_ascii_case(class) && p.style.eq_ignore_ascii_case(style)
    })
}

pub fn load_by_key(key: &str) -> Option<ActionProfile> {
    let (class, style) = key.split_once('/')?;
    load(class, style)
}
