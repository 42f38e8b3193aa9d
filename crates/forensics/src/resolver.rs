//! Jurisdiction resolution over a processor registry.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use reclaim_core::{AreaInfo, AreaSnapshot, AreaType};

use crate::csi::CsiProcessor;
use crate::ForensicsError;

/// Resolves the unique owning area of a path.
///
/// Built once at startup from an explicit processor registry and shared
/// by reference.
pub struct JurisdictionResolver {
    processors: Vec<Arc<dyn CsiProcessor>>,
}

impl JurisdictionResolver {
    /// Assemble a resolver. Overlapping jurisdictions are a configuration
    /// defect and are logged; resolution still fails safe on them.
    pub fn new(processors: Vec<Arc<dyn CsiProcessor>>) -> Self {
        let resolver = Self { processors };
        for (area_type, owners) in resolver.jurisdiction_overlaps() {
            tracing::error!(
                area_type = %area_type,
                processors = ?owners,
                "Area type is claimed by more than one processor",
            );
        }
        resolver
    }

    /// The registry, in consultation order.
    pub fn processors(&self) -> &[Arc<dyn CsiProcessor>] {
        &self.processors
    }

    /// Area types claimed by more than one processor, with their owners.
    pub fn jurisdiction_overlaps(&self) -> Vec<(AreaType, Vec<String>)> {
        let mut owners: BTreeMap<AreaType, Vec<String>> = BTreeMap::new();
        for area_type in AreaType::ALL {
            for processor in &self.processors {
                if processor.has_jurisdiction(area_type) {
                    owners
                        .entry(area_type)
                        .or_default()
                        .push(processor.name().to_string());
                }
            }
        }
        owners.into_iter().filter(|(_, o)| o.len() > 1).collect()
    }

    /// Classify `target`, failing safe to `None` when more than one
    /// processor claims it.
    pub fn identify(&self, target: &Path, snapshot: &AreaSnapshot) -> Option<AreaInfo> {
        match self.identify_checked(target, snapshot) {
            Ok(info) => info,
            Err(e) => {
                tracing::error!(error = %e, generation = snapshot.generation(), "Classification conflict");
                None
            }
        }
    }

    /// Classify `target`, reporting a second match as
    /// [`ForensicsError::ClassificationConflict`].
    ///
    /// Targets containing `..` are never claimed, since a textual prefix
    /// match says nothing about where they lead.
    pub fn identify_checked(
        &self,
        target: &Path,
        snapshot: &AreaSnapshot,
    ) -> Result<Option<AreaInfo>, ForensicsError> {
        if target.components().any(|c| c == Component::ParentDir) {
            tracing::debug!(path = %target.display(), "Path escapes through '..', leaving it unclaimed");
            return Ok(None);
        }
        let target: PathBuf = target.components().collect();

        let mut found: Option<(&str, AreaInfo)> = None;
        let mut conflicting: Vec<String> = Vec::new();

        for processor in self.relevant_processors(snapshot) {
            let Some(info) = processor.identify_area(&target, snapshot) else {
                continue;
            };
            match &found {
                None => found = Some((processor.name(), info)),
                Some((first, _)) => {
                    if conflicting.is_empty() {
                        conflicting.push(first.to_string());
                    }
                    conflicting.push(processor.name().to_string());
                }
            }
        }

        if !conflicting.is_empty() {
            return Err(ForensicsError::ClassificationConflict {
                path: target,
                processors: conflicting,
            });
        }

        if let Some((processor, info)) = &found {
            tracing::trace!(
                processor,
                path = %info.target_path.display(),
                area = %info.area,
                "Path classified",
            );
        }
        Ok(found.map(|(_, info)| info))
    }

    /// Processors owning at least one area type present in `snapshot`.
    fn relevant_processors<'a>(
        &'a self,
        snapshot: &'a AreaSnapshot,
    ) -> impl Iterator<Item = &'a Arc<dyn CsiProcessor>> + 'a {
        self.processors.iter().filter(move |p| {
            snapshot
                .areas()
                .iter()
                .any(|a| p.has_jurisdiction(a.area_type()))
        })
    }
}
