//! Discovers fragment manifests on disk and turns them into [`Fragment`]s.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::manifest::Manifest;
use super::{Command, CommandAction, Fragment, FragmentCatalog, TemplateAction};
use crate::args::{ArgType, ArgumentTypes};
use crate::{CoreError, Result};

const MANIFEST_EXTENSION: &str = "toml";

/// Every manifest under `root`, recursively, in lexicographic order.
///
/// Returns `None` when `root` itself cannot be read and an empty list when it
/// holds no manifests.
pub fn scan(root: &Path) -> Option<Vec<PathBuf>> {
    if let Err(e) = std::fs::read_dir(root) {
        debug!(root = %root.display(), error = %e, "fragment directory unreadable");
        return None;
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext == MANIFEST_EXTENSION)
        })
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    Some(paths)
}

/// Loads manifests, resolving handler names and service kinds through a catalog.
pub struct FragmentLoader<'a> {
    catalog: &'a FragmentCatalog,
    types: &'a ArgumentTypes,
}

impl<'a> FragmentLoader<'a> {
    pub fn new(catalog: &'a FragmentCatalog, types: &'a ArgumentTypes) -> Self {
        Self { catalog, types }
    }

    /// Load one manifest file.
    pub async fn load(&self, path: &Path) -> Result<Fragment> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::load_error(path, format!("could not read file: {}", e)))?;
        self.load_str(&content, path)
    }

    /// Build a fragment from manifest text; `source` is only used for reporting.
    pub fn load_str(&self, content: &str, source: &Path) -> Result<Fragment> {
        let fail = |reason: String| CoreError::load_error(source, reason);

        let manifest =
            Manifest::parse(content).map_err(|e| fail(format!("invalid manifest: {}", e)))?;

        match (&manifest.meta, &manifest.run, &manifest.service) {
            (Some(_), Some(run), None) => {
                let definition = manifest.command_definition().map_err(&fail)?;

                if let Some(type_name) = definition.arguments.iter().find_map(|spec| match &spec.kind {
                    ArgType::Custom(name) if !self.types.contains(name) => Some(name),
                    _ => None,
                }) {
                    return Err(fail(format!("unknown argument type '{}'", type_name)));
                }

                let action: Arc<dyn CommandAction> =
                    match (run.handler.as_deref(), run.respond.as_deref()) {
                        (Some(handler), None) => self
                            .catalog
                            .handler(handler)
                            .ok_or_else(|| fail(format!("unknown handler '{}'", handler)))?,
                        (None, Some(template)) => Arc::new(TemplateAction::new(template)),
                        _ => {
                            return Err(fail(
                                "[run] needs exactly one of `handler` or `respond`".to_string(),
                            ));
                        }
                    };

                definition.validate().map_err(|e| match e {
                    CoreError::InvalidFragment { reason, .. } => fail(reason),
                    other => fail(other.to_string()),
                })?;

                Ok(Fragment::Command(Arc::new(Command {
                    definition,
                    action,
                    source: Some(source.to_path_buf()),
                })))
            }
            (Some(meta), None, Some(service)) => {
                let factory = self
                    .catalog
                    .service(&service.kind)
                    .ok_or_else(|| fail(format!("unknown service kind '{}'", service.kind)))?;
                let instance = factory(meta.meta.clone(), &service.options).map_err(&fail)?;
                Ok(Fragment::Service(instance))
            }
            _ => Err(fail("unrecognized fragment shape".to_string())),
        }
    }

    /// Load every path, skipping (and logging) the ones that fail.
    pub async fn load_multiple(&self, paths: &[PathBuf]) -> Vec<Fragment> {
        let mut fragments = Vec::with_capacity(paths.len());

        for path in paths {
            match self.load(path).await {
                Ok(fragment) => {
                    debug!(path = %path.display(), kind = fragment.kind(), name = fragment.name(), "fragment loaded");
                    fragments.push(fragment);
                }
                Err(CoreError::LoadError { reason, .. }) => {
                    warn!(path = %path.display(), %reason, "skipping fragment that failed to load");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping fragment that failed to load");
                }
            }
        }

        info!(
            loaded = fragments.len(),
            skipped = paths.len() - fragments.len(),
            "fragments loaded"
        );
        fragments
    }
}
