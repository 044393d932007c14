// i18n.rs: runtime message tables
//
// Strings are looked up in:
//   A) assets/i18n/<lang>.json            { "key": "value" }
//   B) assets/i18n.json                   { "<lang>": { "key": "value" } }
// then in the built-in English table, then the key itself.
//
// Language selection for the demo binary:
// - CLI: --lang <code>
// - Env: VR_VIEWER_LANG
// - Default: en

use once_cell::sync::OnceCell;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const DEFAULT_LANG: &str = "en";

const BUILTIN_EN: &[(&str, &str)] = &[
    ("app.title", "VR Video Viewer"),
    ("menu.file", "File"),
    ("menu.open_video", "Open equirectangular frame..."),
    ("menu.exit", "Exit"),
    ("menu.view", "View"),
    ("view.stereo", "Stereo mode"),
    ("view.reset", "Restart playback"),
    ("view.show_fps", "Show FPS"),
    ("view.eye_separation", "Eye separation"),
    ("menu.language", "Language"),
    ("status.mono", "Mono"),
    ("status.stereo", "Stereo"),
    ("status.waiting_for_size", "Waiting for video size..."),
    ("status.error_prefix", "Error:"),
    ("status.no_video", "No video loaded"),
    ("status.paused", "Paused"),
    ("file.filter.images", "Images"),
    ("log.loading_frame", "Loading frame {path}"),
    ("error.open_file", "Failed to open file: {err}"),
    ("error.decode_image", "Failed to decode image: {err}"),
    ("error.config", "Ignoring config file: {err}"),
];

#[derive(Debug, Clone)]
pub struct I18n {
    pub lang: String,
    map: HashMap<String, String>,
    fallback_map: HashMap<String, String>,
}

impl I18n {
    pub fn new(lang: impl Into<String>, map: HashMap<String, String>) -> Self {
        Self {
            lang: lang.into(),
            map,
            fallback_map: builtin_map(),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .or_else(|| self.fallback_map.get(key))
            .map(String::as_str)
    }
}

static I18N: OnceCell<RwLock<I18n>> = OnceCell::new();

fn builtin_map() -> HashMap<String, String> {
    BUILTIN_EN
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn load_json_map(path: &Path) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

fn load_multi_lang_json(path: &Path, lang: &str) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut all: HashMap<String, HashMap<String, String>> = serde_json::from_str(&text).ok()?;
    all.remove(lang)
}

/// Candidate asset locations: next to the executable, then the working directory.
fn asset_candidates(relative: &Path) -> Vec<PathBuf> {
    let mut out = Vec::with_capacity(2);
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            out.push(dir.join("assets").join(relative));
        }
    }
    out.push(PathBuf::from("assets").join(relative));
    out
}

fn load_lang(lang: &str) -> HashMap<String, String> {
    let per_lang = Path::new("i18n").join(format!("{lang}.json"));
    for p in asset_candidates(&per_lang) {
        if let Some(m) = load_json_map(&p) {
            return m;
        }
    }
    for p in asset_candidates(Path::new("i18n.json")) {
        if let Some(m) = load_multi_lang_json(&p, lang) {
            return m;
        }
    }
    log::debug!("no message table for {lang}, using built-in strings");
    HashMap::new()
}

/// Initialize global tables. Later calls replace the current language.
pub fn init(lang: impl Into<String>) {
    let lang = lang.into();
    let table = I18n::new(lang.clone(), load_lang(&lang));

    if let Some(lock) = I18N.get() {
        if let Ok(mut w) = lock.write() {
            *w = table;
        }
    } else {
        let _ = I18N.set(RwLock::new(table));
    }
}

/// Localized text, or `fallback` when neither the loaded nor built-in table has `key`.
pub fn tr_or(key: &str, fallback: &str) -> String {
    let guard = I18N.get().and_then(|l| l.read().ok());
    let found = match &guard {
        Some(i) => i.lookup(key).map(str::to_owned),
        None => BUILTIN_EN
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string()),
    };
    found.unwrap_or_else(|| fallback.to_string())
}

/// Localized text by key; missing keys come back unchanged.
pub fn tr(key: &str) -> String {
    tr_or(key, key)
}

/// `tr` plus `{name}` placeholder substitution. Unknown placeholders stay as-is.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    substitute(tr(key), args)
}

fn substitute(mut s: String, args: &[(&str, String)]) -> String {
    for (k, v) in args {
        s = s.replace(&format!("{{{k}}}"), v);
    }
    s
}

pub fn resolve_lang_from_args() -> String {
    let mut it = std::env::args();
    while let Some(a) = it.next() {
        if a == "--lang" {
            if let Some(v) = it.next() {
                return v;
            }
        }
    }

    if let Ok(v) = std::env::var("VR_VIEWER_LANG") {
        if !v.trim().is_empty() {
            return v;
        }
    }

    DEFAULT_LANG.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn loaded_table_wins_over_builtin() {
        let mut map = HashMap::new();
        map.insert("menu.file".to_string(), "Fichier".to_string());
        let table = I18n::new("fr", map);
        assert_eq!(table.lookup("menu.file"), Some("Fichier"));
        assert_eq!(table.lookup("menu.exit"), Some("Exit"));
        assert_eq!(table.lookup("no.such.key"), None);
    }

    #[test]
    fn placeholders() {
        assert_eq!(
            substitute("open {path} ({err})".into(), &[("path", "a.png".into())]),
            "open a.png ({err})"
        );
    }
}
