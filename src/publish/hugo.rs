//! Hugo site builder.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use super::process::{copy_tree, ProcessRunner};
use super::{PreviewLocator, SiteBuilder, SiteOutput};
use crate::core::{Article, Config, Result};

/// Front matter written for Hugo content files.
#[derive(Debug, Serialize)]
struct HugoFrontMatter<'a> {
    title: &'a str,
    author: &'a str,
    draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    tags: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    categories: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    series: Option<&'a str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    images: &'a [String],
    slug: &'a str,
}

/// Builds previews and the full site by running `hugo`.
#[derive(Debug, Clone)]
pub struct HugoBuilder {
    binary: String,
    site_dir: PathBuf,
    public_dir: PathBuf,
    mirror_dir: PathBuf,
    preview_dir: PathBuf,
    runner: ProcessRunner,
}

impl HugoBuilder {
    /// Create a builder from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            binary: config.hugo.binary.clone(),
            site_dir: absolute(&config.hugo.site_dir)?,
            public_dir: absolute(&config.hugo.public_dir)?,
            mirror_dir: absolute(&config.hugo.mirror_dir)?,
            preview_dir: config.preview_dir(),
            runner: ProcessRunner::new(config.timeouts.build()),
        })
    }

    fn content_dir(&self) -> PathBuf {
        self.site_dir.join("content")
    }

    fn preview_content_path(&self, key: &str) -> PathBuf {
        self.content_dir().join(format!("preview-{key}.md"))
    }

    async fn run_hugo(&self) -> Result<()> {
        let args = [
            OsStr::new("--source"),
            self.site_dir.as_os_str(),
            OsStr::new("--destination"),
            self.public_dir.as_os_str(),
        ];
        let result = self.runner.check(&self.binary, args).await?;
        tracing::info!(duration_ms = result.duration.as_millis() as u64, "Hugo build finished");
        Ok(())
    }
}

#[async_trait]
impl SiteBuilder for HugoBuilder {
    async fn build_preview(&self, article: &Article) -> Result<PreviewLocator> {
        let key = preview_key(article);
        let content_path = self.preview_content_path(&key);
        write_content(&content_path, article, &format!("preview-{key}"))?;

        let built = self.run_hugo().await;
        if let Err(e) = std::fs::remove_file(&content_path) {
            tracing::warn!(path = %content_path.display(), error = %e, "Failed to remove preview content");
        }
        built?;

        let source = self.public_dir.join(format!("preview-{key}"));
        let target = self.preview_dir.join(&key);
        if target.exists() {
            std::fs::remove_dir_all(&target)?;
        }
        copy_tree(&source, &target)?;

        tracing::info!(id = %article.id(), preview = %target.display(), "Preview built");
        Ok(PreviewLocator { index: target.join("index.html"), url_path: format!("/preview/{key}/index.html") })
    }

    async fn build_full_site(&self, published: &[Article]) -> Result<SiteOutput> {
        let posts = self.content_dir().join("posts");
        for article in published {
            let slug = page_slug(article);
            write_content(&posts.join(format!("{slug}.md")), article, &slug)?;
        }

        self.run_hugo().await?;
        tracing::info!(articles = published.len(), "Site built");
        Ok(SiteOutput { output_dir: self.public_dir.clone(), mirror_dir: self.mirror_dir.clone() })
    }

    async fn remove_preview(&self, article: &Article) -> Result<()> {
        let key = preview_key(article);
        let target = self.preview_dir.join(&key);
        if target.exists() {
            std::fs::remove_dir_all(&target)?;
        }
        let generated = self.public_dir.join(format!("preview-{key}"));
        if generated.exists() {
            std::fs::remove_dir_all(&generated)?;
        }
        Ok(())
    }
}

/// Article ID without the `#`, lowercased.
fn id_part(article: &Article) -> String {
    article.id().trim_start_matches('#').to_ascii_lowercase()
}

/// Page slug for the published site; the ID stands in when the title
/// slugifies to nothing.
fn page_slug(article: &Article) -> String {
    let slug = article.slug();
    if slug.is_empty() {
        id_part(article)
    } else {
        slug
    }
}

/// Directory name of an article's preview. Never empty, and distinct for
/// articles sharing a title.
fn preview_key(article: &Article) -> String {
    let slug = article.slug();
    let id = id_part(article);
    if slug.is_empty() {
        id
    } else {
        format!("{slug}-{id}")
    }
}

/// Render an article as a Hugo content file served under `slug`.
fn render_content(article: &Article, slug: &str) -> Result<String> {
    let fm = &article.front_matter;
    let front = HugoFrontMatter {
        title: &fm.title,
        author: &fm.author,
        draft: false,
        description: fm.description.as_deref(),
        tags: &fm.tags,
        categories: &fm.categories,
        series: fm.series.as_deref(),
        images: &fm.images,
        slug,
    };
    let yaml = serde_yaml::to_string(&front)?;
    Ok(format!("---\n{yaml}---\n\n{}", article.content))
}

fn write_content(path: &Path, article: &Article, slug: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_content(article, slug)?)?;
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
