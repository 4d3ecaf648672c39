use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ResolverConfig, ResolverConfigBuilder};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub llm: Option<LlmConfig>,
    pub matching: Option<MatchingConfig>,
    pub classification: Option<ClassificationConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `groq` or `openai`.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub light_model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub free_tier: Option<bool>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub overlap_tolerance: Option<f64>,
    pub margin_threshold: Option<f64>,
    pub line_height: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub citation_filter: Option<bool>,
    pub short_comment_max_chars: Option<usize>,
    pub citation_keywords: Option<Vec<String>>,
    pub language_keywords: Option<Vec<String>>,
    pub ignore_markers: Option<Vec<String>>,
    pub citation_issue_threshold: Option<usize>,
    pub language_issue_threshold: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub out_dir: Option<String>,
    pub compile: Option<bool>,
    pub latex_engine: Option<String>,
    pub place: Option<String>,
    pub signature: Option<String>,
}

impl ConfigFile {
    /// Apply the `[matching]` and `[classification]` sections on top of the
    /// built-in defaults.
    pub fn resolver_config(&self) -> Result<ResolverConfig, ConfigError> {
        let mut builder = ResolverConfigBuilder::new();

        if let Some(m) = &self.matching {
            if let Some(v) = m.overlap_tolerance {
                builder = builder.overlap_tolerance(v);
            }
            if let Some(v) = m.margin_threshold {
                builder = builder.margin_threshold(v);
            }
            if let Some(v) = m.line_height {
                builder = builder.line_height(v);
            }
        }

        if let Some(c) = &self.classification {
            if let Some(v) = c.citation_filter {
                builder = builder.citation_filter(v);
            }
            if let Some(v) = c.short_comment_max_chars {
                builder = builder.short_comment_max_chars(v);
            }
            if let Some(v) = &c.citation_keywords {
                builder = builder.set_citation_keywords(v.clone());
            }
            if let Some(v) = &c.language_keywords {
                builder = builder.set_language_keywords(v.clone());
            }
            if let Some(v) = &c.ignore_markers {
                builder = builder.set_ignore_markers(v.clone());
            }
            if let Some(v) = c.citation_issue_threshold {
                builder = builder.citation_issue_threshold(v);
            }
            if let Some(v) = c.language_issue_threshold {
                builder = builder.language_issue_threshold(v);
            }
        }

        builder.build()
    }
}

/// Platform config directory path: `<config_dir>/marginalia/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("marginalia").join("config.toml"))
}

/// Load config by cascading CWD `.marginalia.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".marginalia.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Field from `overlay` if set there, else from `base`.
fn pick<S, T>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bl, ol) = (&base.llm, &overlay.llm);
    let (bm, om) = (&base.matching, &overlay.matching);
    let (bc, oc) = (&base.classification, &overlay.classification);
    let (bo, oo) = (&base.output, &overlay.output);

    ConfigFile {
        llm: Some(LlmConfig {
            provider: pick(ol, bl, |l| l.provider.clone()),
            model: pick(ol, bl, |l| l.model.clone()),
            light_model: pick(ol, bl, |l| l.light_model.clone()),
            base_url: pick(ol, bl, |l| l.base_url.clone()),
            temperature: pick(ol, bl, |l| l.temperature),
            free_tier: pick(ol, bl, |l| l.free_tier),
            max_retries: pick(ol, bl, |l| l.max_retries),
        }),
        matching: Some(MatchingConfig {
            overlap_tolerance: pick(om, bm, |m| m.overlap_tolerance),
            margin_threshold: pick(om, bm, |m| m.margin_threshold),
            line_height: pick(om, bm, |m| m.line_height),
        }),
        classification: Some(ClassificationConfig {
            citation_filter: pick(oc, bc, |c| c.citation_filter),
            short_comment_max_chars: pick(oc, bc, |c| c.short_comment_max_chars),
            citation_keywords: pick(oc, bc, |c| c.citation_keywords.clone()),
            language_keywords: pick(oc, bc, |c| c.language_keywords.clone()),
            ignore_markers: pick(oc, bc, |c| c.ignore_markers.clone()),
            citation_issue_threshold: pick(oc, bc, |c| c.citation_issue_threshold),
            language_issue_threshold: pick(oc, bc, |c| c.language_issue_threshold),
        }),
        output: Some(OutputConfig {
            out_dir: pick(oo, bo, |o| o.out_dir.clone()),
            compile: pick(oo, bo, |o| o.compile),
            latex_engine: pick(oo, bo, |o| o.latex_engine.clone()),
            place: pick(oo, bo, |o| o.place.clone()),
            signature: pick(oo, bo, |o| o.signature.clone()),
        }),
    }
}

/// Save the config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(path)
}
