//! Run settings
//!
//! One JSON or TOML file (chosen by extension) describes the target project,
//! the catalogs, the external tools and the rule to synthesize. Relative
//! paths are resolved against `base_dir`, which itself is relative to the
//! settings file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ckg_backends::{
    EmbeddingSettings, JarAstExtractor, MavenHarness, OpenAiEmbedder, OpenAiOracle, OracleSettings,
};
use ckg_core::{Capabilities, MavenDiagnosticParser, Rule, SynthesisConfig};
use ckg_retrieval::{
    load_api_catalog, load_meta_catalog, ApiIndex, Embedder, HashingEmbedder, MetaIndex,
    RetrievalIndex,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AstToolSettings {
    pub jar: PathBuf,
    /// Scratch directory for tool input and output files
    pub work_dir: PathBuf,
    pub java: String,
    pub timeout_secs: u64,
}

impl Default for AstToolSettings {
    fn default() -> Self {
        Self {
            jar: PathBuf::from("tool/PMD-Style-ASTParser.jar"),
            work_dir: PathBuf::from("tool/work"),
            java: "java".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub mvn: String,
    pub timeout_secs: u64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            mvn: "mvn".to_string(),
            timeout_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    pub name: String,
    pub description: String,
    /// Java package of the generated checker
    pub package: String,
    pub checker_path: PathBuf,
    pub case_set_path: PathBuf,
    pub active_subset_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_dir: PathBuf,
    /// Maven project the checker is built and tested in
    pub project_dir: PathBuf,
    pub meta_catalog: PathBuf,
    pub api_catalog: PathBuf,
    /// Retrieval model; hashing embedder when no model is named
    pub embedding: EmbeddingSettings,
    pub ast: AstToolSettings,
    pub build: BuildSettings,
    pub oracle: OracleSettings,
    pub synthesis: SynthesisConfig,
    pub rule: RuleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            project_dir: PathBuf::from("pmd-java"),
            meta_catalog: PathBuf::from("catalog/meta_operations.json"),
            api_catalog: PathBuf::from("catalog/api_classes.json"),
            embedding: EmbeddingSettings::default(),
            ast: AstToolSettings::default(),
            build: BuildSettings::default(),
            oracle: OracleSettings::default(),
            synthesis: SynthesisConfig::default(),
            rule: RuleSettings::default(),
        }
    }
}

impl Settings {
    /// Load from `path`; `.toml` files are TOML, everything else JSON
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let mut settings: Self = if path.extension().is_some_and(|e| e == "toml") {
            toml::from_str(&text)
                .with_context(|| format!("invalid TOML settings {}", path.display()))?
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("invalid JSON settings {}", path.display()))?
        };
        if settings.base_dir.is_relative() {
            let parent = path.parent().unwrap_or_else(|| Path::new(""));
            settings.base_dir = parent.join(&settings.base_dir);
        }
        Ok(settings)
    }

    /// `path` as is when absolute, otherwise under `base_dir`
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// The configured rule with every path resolved
    pub fn rule(&self) -> Result<Rule> {
        let r = &self.rule;
        if r.name.trim().is_empty() {
            bail!("settings do not name a rule");
        }
        if r.case_set_path.as_os_str().is_empty() {
            bail!("rule '{}' has no case_set_path", r.name);
        }
        Ok(Rule::new(&r.name, &r.description, &r.package)
            .with_checker_path(self.resolve(&r.checker_path))
            .with_case_set_path(self.resolve(&r.case_set_path))
            .with_active_subset_path(self.resolve(&r.active_subset_path)))
    }

    /// The configured embeddings model, or the offline hashing embedder
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        if self.embedding.model.is_none() {
            let dim = self.embedding.dimensions.unwrap_or(HashingEmbedder::DEFAULT_DIM);
            return Ok(Arc::new(HashingEmbedder::new(dim)));
        }
        let embedder = OpenAiEmbedder::from_env(self.embedding.clone())
            .context("failed to set up the embedding model")?;
        tracing::info!("Embedding with {}", embedder.url());
        Ok(Arc::new(embedder))
    }

    /// Build both retrieval tiers from the configured catalogs
    pub fn retrieval(&self) -> Result<RetrievalIndex> {
        let embedder = self.embedder()?;
        let meta_entries = load_meta_catalog(&self.resolve(&self.meta_catalog))?;
        let api_classes = load_api_catalog(&self.resolve(&self.api_catalog))?;
        let meta = MetaIndex::build(meta_entries, embedder.as_ref())
            .context("failed to embed meta catalog")?;
        let api = ApiIndex::build(api_classes, embedder.as_ref())
            .context("failed to index API catalog")?;
        tracing::info!("Loaded {} meta operations", meta.len());
        Ok(RetrievalIndex::new(
            Arc::new(meta),
            api,
            embedder,
            self.synthesis.retrieval,
        ))
    }

    /// Production capabilities for `rule`
    pub fn capabilities(&self, rule: &Rule) -> Result<Capabilities> {
        let oracle = OpenAiOracle::from_env(self.oracle.clone())
            .context("failed to set up the code oracle")?;
        let extractor =
            JarAstExtractor::new(self.resolve(&self.ast.jar), self.resolve(&self.ast.work_dir))
                .with_java(&self.ast.java)
                .with_timeout(Duration::from_secs(self.ast.timeout_secs));
        let harness = MavenHarness::for_rule(self.resolve(&self.project_dir), rule)
            .with_mvn(&self.build.mvn)
            .with_timeout(Duration::from_secs(self.build.timeout_secs));
        Ok(Capabilities {
            oracle: Arc::new(oracle),
            extractor: Arc::new(extractor),
            harness: Arc::new(harness),
            diagnostics: Arc::new(MavenDiagnosticParser),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn toml_settings_resolve_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckg.toml");
        std::fs::write(
            &path,
            r#"
project_dir = "pmd"

[rule]
name = "AvoidUsingOctalValues"
description = "Integer literals should not start with zero"
package = "net.sourceforge.pmd.lang.java.rule.errorprone"
checker_path = "pmd/src/main/java/AvoidUsingOctalValues.java"
case_set_path = "cases/AvoidUsingOctalValues.xml"
active_subset_path = "/abs/AvoidUsingOctalValues.xml"

[synthesis]
max_outer_rounds = 3
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.synthesis.max_outer_rounds, 3);
        assert_eq!(settings.synthesis.max_inner_repairs, 2);

        let rule = settings.rule().unwrap();
        assert_eq!(rule.case_set_path, dir.path().join("cases/AvoidUsingOctalValues.xml"));
        assert_eq!(rule.active_subset_path, PathBuf::from("/abs/AvoidUsingOctalValues.xml"));
        assert_eq!(rule.test_group(), "AvoidUsingOctalValuesTest");
    }

    #[test]
    fn json_settings_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckg.json");
        std::fs::write(&path, r#"{"oracle": {"model": "gpt-4o-mini"}}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.oracle.model, "gpt-4o-mini");
        assert_eq!(settings.build, BuildSettings::default());
        assert!(settings.rule().is_err());
    }

    #[test]
    fn embedder_defaults_to_hashing() {
        let settings = Settings::default();
        let embedder = settings.embedder().unwrap();
        assert_eq!(embedder.dimension(), HashingEmbedder::DEFAULT_DIM);

        let sized = Settings {
            embedding: EmbeddingSettings {
                dimensions: Some(64),
                ..EmbeddingSettings::default()
            },
            ..Settings::default()
        };
        assert_eq!(sized.embedder().unwrap().dimension(), 64);
    }

    #[test]
    fn embedding_model_is_read_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckg.json");
        std::fs::write(
            &path,
            r#"{"embedding": {"model": "text-embedding-3-small",
                              "endpoint": "http://localhost:8000/v1",
                              "api_key_env": "CKG_TEST_EMBED_KEY_THAT_IS_NOT_SET"}}"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.embedding.model.as_deref(), Some("text-embedding-3-small"));
        let err = settings.embedder().unwrap_err();
        assert!(format!("{err:#}").contains("CKG_TEST_EMBED_KEY_THAT_IS_NOT_SET"));
    }

    #[test]
    fn invalid_settings_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
