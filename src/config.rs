use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};

/// Tool locations read from the optional pipeline config file.
///
/// Every field may be overridden by the matching CLI flag or environment
/// variable.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFileConfig {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub lilac_img: Option<String>,
    #[serde(default)]
    pub lilac_resource_dir: Option<String>,
    #[serde(default)]
    pub hlascan_tool: Option<String>,
    #[serde(default)]
    pub hlascan_resource_dir: Option<String>,
    #[serde(default)]
    pub arcashla_img: Option<String>,
    #[serde(default)]
    pub seq2hla_img: Option<String>,
}

impl PipelineFileConfig {
    /// Parse a config document and expand `${VAR}` references in every value.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let cfg: PipelineFileConfig = serde_json::from_str(raw)?;
        Ok(expand_config(cfg))
    }
}

/// Locate the config file: explicit path, `HLA_PIPELINE_CONFIG`, XDG dir, then `./hla-pipeline.json`.
///
/// Returns `None` when no file is configured and none of the default
/// locations exist. An explicit path is returned even if it is missing so
/// that loading reports it.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }

    if let Ok(p) = env::var("HLA_PIPELINE_CONFIG") {
        return Some(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg).join("hla-pipeline").join("config.json");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = PathBuf::from("hla-pipeline.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_config(cfg: PipelineFileConfig) -> PipelineFileConfig {
    let expand = |v: Option<String>| v.map(|s| expand_env_vars(&s));

    PipelineFileConfig {
        reference: expand(cfg.reference),
        lilac_img: expand(cfg.lilac_img),
        lilac_resource_dir: expand(cfg.lilac_resource_dir),
        hlascan_tool: expand(cfg.hlascan_tool),
        hlascan_resource_dir: expand(cfg.hlascan_resource_dir),
        arcashla_img: expand(cfg.arcashla_img),
        seq2hla_img: expand(cfg.seq2hla_img),
    }
}

/// Load the pipeline config, falling back to an empty one when no file is found.
pub fn load_pipeline_config(explicit: Option<&Path>) -> anyhow::Result<PipelineFileConfig> {
    let Some(path) = resolve_config_path(explicit) else {
        return Ok(PipelineFileConfig::default());
    };

    let raw = fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Could not read config {}: {}", path.display(), e))?;
    tracing::info!("Loaded pipeline config from {}", path.display());
    PipelineFileConfig::from_json(&raw)
}
