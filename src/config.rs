use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Geometry of event containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub max_columns: usize,
    pub header_height: f32,
    pub padding: f32,
    pub member_gap: f32,
    /// Containers stack downwards until the next one would pass this height.
    pub column_height_budget: f32,
    pub spacing: f32,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            max_columns: 3,
            header_height: 32.0,
            padding: 16.0,
            member_gap: 16.0,
            column_height_budget: 1200.0,
            spacing: 40.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    pub gap: f32,
    pub label_line_height: f32,
    pub max_label_width_chars: usize,
    pub group: GroupConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 150.0,
            node_height: 60.0,
            gap: 40.0,
            label_line_height: 1.4,
            max_label_width_chars: 22,
            group: GroupConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn column_pitch(&self) -> f32 {
        self.node_width + self.gap
    }

    pub fn row_pitch(&self) -> f32 {
        self.node_height + self.gap
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            padding: 24.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    node_text_color: Option<String>,
    node_border_color: Option<String>,
    line_color: Option<String>,
    edge_label_background: Option<String>,
    cluster_bkg: Option<String>,
    cluster_border: Option<String>,
    cluster_text_color: Option<String>,
    background: Option<String>,
    evidence_color: Option<String>,
    secret_color: Option<String>,
    location_color: Option<String>,
    character_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupConfigFile {
    max_columns: Option<usize>,
    header_height: Option<f32>,
    padding: Option<f32>,
    member_gap: Option<f32>,
    column_height_budget: Option<f32>,
    spacing: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    node_width: Option<f32>,
    node_height: Option<f32>,
    gap: Option<f32>,
    max_label_width_chars: Option<usize>,
    group: Option<GroupConfigFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    padding: Option<f32>,
}

pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parses a config document. Plain JSON is tried first, then JSON5 so that
/// hand-written files may carry comments and trailing commas.
pub fn parse_config(contents: &str) -> Result<Config, String> {
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(_) => json5::from_str(contents).map_err(|err| err.to_string())?,
    };
    Ok(apply_config_file(Config::default(), parsed))
}

fn apply_config_file(mut config: Config, parsed: ConfigFile) -> Config {
    match parsed.theme.as_deref() {
        Some("dark") => config.theme = Theme::dark(),
        Some("classic") | Some("default") => config.theme = Theme::classic(),
        Some(other) => {
            tracing::warn!(theme = other, "unknown theme name, keeping default");
        }
        None => {}
    }

    if let Some(vars) = parsed.theme_variables {
        let theme = &mut config.theme;
        if let Some(v) = vars.font_family {
            theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            theme.font_size = v;
        }
        if let Some(v) = vars.node_text_color {
            theme.node_text_color = v;
        }
        if let Some(v) = vars.node_border_color {
            theme.node_border_color = v;
        }
        if let Some(v) = vars.line_color {
            theme.line_color = v;
        }
        if let Some(v) = vars.edge_label_background {
            theme.edge_label_background = v;
        }
        if let Some(v) = vars.cluster_bkg {
            theme.cluster_background = v;
        }
        if let Some(v) = vars.cluster_border {
            theme.cluster_border = v;
        }
        if let Some(v) = vars.cluster_text_color {
            theme.cluster_text_color = v;
        }
        if let Some(v) = vars.background {
            theme.background = v;
        }
        if let Some(v) = vars.evidence_color {
            theme.evidence_color = v;
        }
        if let Some(v) = vars.secret_color {
            theme.secret_color = v;
        }
        if let Some(v) = vars.location_color {
            theme.location_color = v;
        }
        if let Some(v) = vars.character_color {
            theme.character_color = v;
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.node_width {
            config.layout.node_width = v.max(1.0);
        }
        if let Some(v) = layout.node_height {
            config.layout.node_height = v.max(1.0);
        }
        if let Some(v) = layout.gap {
            config.layout.gap = v.max(0.0);
        }
        if let Some(v) = layout.max_label_width_chars {
            config.layout.max_label_width_chars = v.max(4);
        }
        if let Some(group) = layout.group {
            let target = &mut config.layout.group;
            if let Some(v) = group.max_columns {
                target.max_columns = v.max(1);
            }
            if let Some(v) = group.header_height {
                target.header_height = v.max(0.0);
            }
            if let Some(v) = group.padding {
                target.padding = v.max(0.0);
            }
            if let Some(v) = group.member_gap {
                target.member_gap = v.max(0.0);
            }
            if let Some(v) = group.column_height_budget {
                target.column_height_budget = v;
            }
            if let Some(v) = group.spacing {
                target.spacing = v.max(0.0);
            }
        }
    }

    if let Some(v) = parsed.padding {
        config.render.padding = v.max(0.0);
    }
    config.render.background = config.theme.background.clone();

    config
}
