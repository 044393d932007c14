// fonts.rs: CJK-capable UI font for the overlay

use std::path::{Path, PathBuf};

const SYSTEM_FONTS: &[&str] = &[
    r"C:\Windows\Fonts\msyh.ttf",
    r"C:\Windows\Fonts\simhei.ttf",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/noto/NotoSansSC-Regular.ttf",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
];

const USER_FONTS: &[&str] = &[
    ".local/share/fonts/NotoSansSC-Regular.ttf",
    ".fonts/NotoSansSC-Regular.ttf",
    "Library/Fonts/NotoSansSC-Regular.otf",
];

const ASSET_FONTS: &[&str] = &["NotoSansSC-Regular.otf", "NotoSansSC-Regular.ttf"];

/// Search order: bundled assets, then system fonts, then per-user fonts.
pub fn font_candidates(exe_dir: Option<&Path>, home: Option<&Path>) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for f in ASSET_FONTS {
        if let Some(dir) = exe_dir {
            out.push(dir.join("assets").join("fonts").join(f));
        }
        out.push(Path::new("assets").join("fonts").join(f));
    }
    out.extend(SYSTEM_FONTS.iter().map(PathBuf::from));
    if let Some(home) = home {
        out.extend(USER_FONTS.iter().map(|f| home.join(f)));
    }
    out
}

fn load_font(path: &Path) -> Option<Vec<u8>> {
    let bytes = std::fs::read(path).ok()?;
    // egui would panic later on a font it cannot parse
    ab_glyph::FontArc::try_from_vec(bytes.clone()).ok()?;
    Some(bytes)
}

/// Puts the first usable candidate in front of egui's default families.
pub fn install_ui_font(ctx: &egui::Context) {
    let exe = std::env::current_exe().ok();
    let exe_dir = exe.as_deref().and_then(Path::parent);
    let home = std::env::var_os("HOME").map(PathBuf::from);

    let Some((path, bytes)) = font_candidates(exe_dir, home.as_deref())
        .into_iter()
        .find_map(|p| load_font(&p).map(|b| (p, b)))
    else {
        log::info!("no CJK font found, non-Latin labels may not render");
        return;
    };
    log::info!("UI font: {}", path.display());

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("ui".to_owned(), egui::FontData::from_owned(bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        if let Some(list) = fonts.families.get_mut(&family) {
            list.insert(0, "ui".to_owned());
        }
    }
    ctx.set_fonts(fonts);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assets_come_before_system_fonts() {
        let list = font_candidates(Some(Path::new("/opt/app")), Some(Path::new("/home/u")));
        assert_eq!(
            list[0],
            PathBuf::from("/opt/app/assets/fonts/NotoSansSC-Regular.otf")
        );
        assert_eq!(list[1], PathBuf::from("assets/fonts/NotoSansSC-Regular.otf"));
        let first_system = list
            .iter()
            .position(|p| p == Path::new(SYSTEM_FONTS[0]))
            .unwrap();
        assert!(list[..first_system]
            .iter()
            .all(|p| p.to_string_lossy().contains("assets")));
        assert!(list.last().unwrap().starts_with("/home/u"));
    }

    #[test]
    fn unreadable_font_is_skipped() {
        assert!(load_font(Path::new("/definitely/not/here.ttf")).is_none());
    }
}
