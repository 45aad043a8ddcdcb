use anyhow::{Context, Result};
use ratatui::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_HISTORY: usize = 1024;
const MIN_HISTORY: usize = 16;
const DEFAULT_TAIL_LINES: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub border: Color,
    pub title: Color,
    pub cursor: Color,
    pub header: Color,
    pub graph_data: Color,
    pub graph_limit: Color,
    pub graph_label: Color,
    pub logs: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border: Color::Cyan,
            title: Color::White,
            cursor: Color::Yellow,
            header: Color::White,
            graph_data: Color::Green,
            graph_limit: Color::Red,
            graph_label: Color::White,
            logs: Color::Gray,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphSettings {
    pub draw_upper_limit: bool,
    pub history: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            draw_upper_limit: false,
            history: DEFAULT_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub tail_lines: u32,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub source: Option<String>,
    pub theme: Theme,
    pub graph: GraphSettings,
    pub logs: LogSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct KtopConfigFile {
    #[serde(default)]
    theme: ThemeSpec,
    #[serde(default)]
    graph: GraphSpec,
    #[serde(default)]
    logs: LogSpec,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ThemeSpec {
    border: Option<String>,
    title: Option<String>,
    cursor: Option<String>,
    header: Option<String>,
    graph_data: Option<String>,
    graph_limit: Option<String>,
    graph_label: Option<String>,
    logs: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct GraphSpec {
    #[serde(default)]
    draw_upper_limit: bool,
    history: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct LogSpec {
    tail_lines: Option<u32>,
}

impl Settings {
    pub fn discover() -> Result<Self> {
        let Some(path) = discover_config_path() else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let mut settings = Self::from_yaml(&raw)
            .with_context(|| format!("failed to parse settings {}", path.display()))?;
        settings.source = Some(path.display().to_string());
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let parsed: KtopConfigFile = if raw.trim().is_empty() {
            KtopConfigFile::default()
        } else {
            serde_yaml::from_str(raw)?
        };

        let defaults = Theme::default();
        let spec = &parsed.theme;
        let theme = Theme {
            border: color_or(spec.border.as_deref(), defaults.border, "border")?,
            title: color_or(spec.title.as_deref(), defaults.title, "title")?,
            cursor: color_or(spec.cursor.as_deref(), defaults.cursor, "cursor")?,
            header: color_or(spec.header.as_deref(), defaults.header, "header")?,
            graph_data: color_or(spec.graph_data.as_deref(), defaults.graph_data, "graph_data")?,
            graph_limit: color_or(
                spec.graph_limit.as_deref(),
                defaults.graph_limit,
                "graph_limit",
            )?,
            graph_label: color_or(
                spec.graph_label.as_deref(),
                defaults.graph_label,
                "graph_label",
            )?,
            logs: color_or(spec.logs.as_deref(), defaults.logs, "logs")?,
        };

        Ok(Self {
            source: None,
            theme,
            graph: GraphSettings {
                draw_upper_limit: parsed.graph.draw_upper_limit,
                history: parsed
                    .graph
                    .history
                    .unwrap_or(DEFAULT_HISTORY)
                    .max(MIN_HISTORY),
            },
            logs: LogSettings {
                tail_lines: parsed.logs.tail_lines.unwrap_or(DEFAULT_TAIL_LINES),
            },
        })
    }
}

fn color_or(value: Option<&str>, fallback: Color, key: &str) -> Result<Color> {
    match value.map(str::trim) {
        None | Some("") => Ok(fallback),
        Some(value) => Color::from_str(value)
            .map_err(|_| anyhow::anyhow!("theme.{key}: unknown colour {value:?}")),
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KTOP_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [PathBuf::from("ktop.yaml"), PathBuf::from(".ktop.yaml")];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let candidate = PathBuf::from(home).join(".config/ktop/config.yaml");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = Settings::from_yaml("").expect("empty settings parse");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.graph.history, 1024);
        assert_eq!(settings.logs.tail_lines, 100);
        assert!(!settings.graph.draw_upper_limit);
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let raw = r##"
theme:
  cursor: "#ff8800"
  border: magenta
graph:
  draw_upper_limit: true
  history: 4
logs:
  tail_lines: 0
"##;
        let settings = Settings::from_yaml(raw).expect("settings parse");
        assert_eq!(settings.theme.cursor, Color::Rgb(0xff, 0x88, 0x00));
        assert_eq!(settings.theme.border, Color::Magenta);
        assert_eq!(settings.theme.title, Theme::default().title);
        assert!(settings.graph.draw_upper_limit);
        assert_eq!(settings.graph.history, 16);
        assert_eq!(settings.logs.tail_lines, 0);
    }

    #[test]
    fn unknown_colour_is_an_error() {
        let err = Settings::from_yaml("theme:\n  header: not-a-colour\n").expect_err("bad colour");
        assert!(format!("{err:#}").contains("theme.header"));
    }
}
