use std::path::{Path, PathBuf};

use image::Rgba;

use crate::ops::compositor::MaskConvention;

pub const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1/images/edits";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Upper bound on candidates per request.
pub const MAX_CANDIDATES: u32 = 10;

/// User-editable settings, persisted as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Endpoint receiving the multipart edit request.
    pub api_endpoint: String,
    /// Name of the environment variable that holds the bearer token.
    /// The token itself is never written to disk.
    pub api_key_env: String,
    /// Number of candidates requested per submission (`n`).
    pub candidate_count: u32,
    /// Side of the square working canvas sent to the service.
    pub square_size: u32,
    /// Brush diameter in screen units at startup.
    pub default_brush_width: f32,
    /// Arrow-key brush resize step.
    pub brush_step: f32,
    /// Arrow-down never shrinks the brush below this diameter.
    pub min_brush_width: f32,
    pub max_undo_steps: usize,
    pub request_timeout_secs: u64,
    pub mask_convention: MaskConvention,
    /// Sentinel colour outside the letterboxed image.
    pub background: Rgba<u8>,
    /// Display scale at startup.
    pub initial_scale: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            candidate_count: 2,
            square_size: 1024,
            default_brush_width: 150.0,
            brush_step: 5.0,
            min_brush_width: 20.0,
            max_undo_steps: 50,
            request_timeout_secs: 120,
            mask_convention: MaskConvention::TransparentIsEditable,
            background: Rgba([0, 0, 0, 255]),
            initial_scale: 0.5,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/genfill/genfill_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\GenFill\genfill_settings.cfg
    /// On macOS:   ~/Library/Application Support/GenFill/genfill_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("genfill");
            return Some(config_dir.join("genfill_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("GenFill").join("genfill_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("GenFill")
                    .join("genfill_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("genfill_settings.cfg")))
        }
    }

    /// The `size` form field, e.g. `1024x1024`.
    pub fn size_param(&self) -> String {
        format!("{}x{}", self.square_size, self.square_size)
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk. Failures are logged, never fatal.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("Failed to save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "api_endpoint={}\n\
             api_key_env={}\n\
             candidate_count={}\n\
             square_size={}\n\
             default_brush_width={}\n\
             brush_step={}\n\
             min_brush_width={}\n\
             max_undo_steps={}\n\
             request_timeout_secs={}\n\
             mask_convention={}\n\
             background={}\n\
             initial_scale={}\n",
            self.api_endpoint,
            self.api_key_env,
            self.candidate_count,
            self.square_size,
            self.default_brush_width,
            self.brush_step,
            self.min_brush_width,
            self.max_undo_steps,
            self.request_timeout_secs,
            self.mask_convention.as_str(),
            color_to_str(self.background),
            self.initial_scale,
        )
    }

    /// Parse `key=value` lines. Unknown keys and unparsable values keep
    /// their defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "api_endpoint" if !val.is_empty() => s.api_endpoint = val.to_string(),
                "api_key_env" if !val.is_empty() => s.api_key_env = val.to_string(),
                "candidate_count" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.candidate_count = v.clamp(1, MAX_CANDIDATES);
                    }
                }
                "square_size" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.square_size = v.clamp(64, 4096);
                    }
                }
                "default_brush_width" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.default_brush_width = v.clamp(10.0, 500.0);
                    }
                }
                "brush_step" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v > 0.0
                    {
                        s.brush_step = v;
                    }
                }
                "min_brush_width" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v > 0.0
                    {
                        s.min_brush_width = v;
                    }
                }
                "max_undo_steps" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.max_undo_steps = v.max(1);
                    }
                }
                "request_timeout_secs" => {
                    if let Ok(v) = val.parse::<u64>() {
                        s.request_timeout_secs = v.max(1);
                    }
                }
                "mask_convention" => {
                    if let Some(c) = MaskConvention::from_str_opt(val) {
                        s.mask_convention = c;
                    }
                }
                "background" => {
                    if let Some(c) = str_to_color(val) {
                        s.background = c;
                    }
                }
                "initial_scale" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v > 0.0
                    {
                        s.initial_scale = v;
                    }
                }
                _ => {}
            }
        }
        s
    }
}

/// Serialize a colour as "r,g,b,a"
fn color_to_str(c: Rgba<u8>) -> String {
    format!("{},{},{},{}", c[0], c[1], c[2], c[3])
}

/// Parse a colour from "r,g,b,a"
fn str_to_color(s: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() == 4 {
        let r = parts[0].trim().parse::<u8>().ok()?;
        let g = parts[1].trim().parse::<u8>().ok()?;
        let b = parts[2].trim().parse::<u8>().ok()?;
        let a = parts[3].trim().parse::<u8>().ok()?;
        Some(Rgba([r, g, b, a]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = EditorSettings::load_from(&dir.path().join("absent.cfg"));
        assert_eq!(s, EditorSettings::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("genfill_settings.cfg");
        let s = EditorSettings {
            candidate_count: 4,
            square_size: 512,
            mask_convention: MaskConvention::OpaqueIsEditable,
            background: Rgba([12, 34, 56, 255]),
            api_key_env: "MY_KEY".to_string(),
            ..EditorSettings::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(EditorSettings::load_from(&path), s);
    }

    #[test]
    fn garbage_lines_are_ignored() {
        let s = EditorSettings::from_config_str(
            "nonsense\nsquare_size=abc\ncandidate_count=99\nunknown=1\nbackground=1,2,3\n",
        );
        assert_eq!(s.square_size, 1024);
        assert_eq!(s.candidate_count, 10);
        assert_eq!(s.background, Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn size_param_is_square() {
        let s = EditorSettings {
            square_size: 256,
            ..EditorSettings::default()
        };
        assert_eq!(s.size_param(), "256x256");
    }
}
