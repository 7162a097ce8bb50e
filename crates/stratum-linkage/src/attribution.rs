//! Matching tracker rows to changeset groups.
//!
//! Defect rows are applied first, then story rows. A group claimed by more
//! than one row keeps the last claim and the overwrite is recorded as an
//! [`AttributionConflict`]. Groups no row claims fall back to a ticket id
//! found in their comment.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use regex::Regex;
use serde::Serialize;
use stratum_core::{Commit, Issue, IssueKind, LinkageConfig, StratumError};

use crate::grouper::{ChangesetGroup, ChangesetIndex};
use crate::normalize::KeyNormalizer;
use crate::tracker::TrackerData;

/// Feature and issue assigned to one changeset group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributionRecord {
    pub feature: String,
    pub issue: Issue,
}

/// A group together with its final attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedChangeset {
    pub group: ChangesetGroup,
    pub attribution: AttributionRecord,
}

impl AttributedChangeset {
    /// Finish the commit once its files are known.
    pub fn into_commit(self, files: Vec<String>) -> Commit {
        Commit {
            feature: self.attribution.feature,
            issue: self.attribution.issue,
            change: self.group.to_change(),
            files,
        }
    }
}

/// Which tracker export a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSource {
    Defect,
    Story,
}

impl fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceSource::Defect => write!(f, "defect"),
            ReferenceSource::Story => write!(f, "story"),
        }
    }
}

/// A tracker descriptor that matched no exported changeset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedReference {
    pub source: ReferenceSource,
    pub row_id: String,
    pub descriptor: String,
    /// `None` when the descriptor has too few fields to form a key.
    pub key: Option<String>,
}

/// A group claimed twice with different attributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributionConflict {
    pub key: String,
    pub previous: AttributionRecord,
    pub replacement: AttributionRecord,
}

/// Result of one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    /// One entry per group, in key order.
    pub changesets: Vec<AttributedChangeset>,
    pub conflicts: Vec<AttributionConflict>,
    pub unresolved: Vec<UnresolvedReference>,
}

impl Attribution {
    pub fn attributed(&self) -> usize {
        self.changesets
            .iter()
            .filter(|c| !c.attribution.issue.is_unattributed())
            .count()
    }
}

/// Resolves tracker rows against a [`ChangesetIndex`].
///
/// # Examples
///
/// ```
/// use regex::Regex;
/// use stratum_linkage::attribution::AttributionResolver;
/// use stratum_linkage::normalize::KeyNormalizer;
///
/// let resolver = AttributionResolver::new(
///     KeyNormalizer::default(),
///     Regex::new(r"#(\d+)").unwrap(),
///     false,
/// );
/// assert_eq!(resolver.extract_ticket("fix for #812"), Some("812".to_string()));
/// assert_eq!(resolver.extract_ticket("no ticket here"), None);
/// ```
#[derive(Debug, Clone)]
pub struct AttributionResolver {
    normalizer: KeyNormalizer,
    ticket: Regex,
    strict: bool,
}

impl AttributionResolver {
    pub fn new(normalizer: KeyNormalizer, ticket: Regex, strict: bool) -> Self {
        Self {
            normalizer,
            ticket,
            strict,
        }
    }

    /// Build a resolver from `[linkage]` settings.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::Config`] if the ticket pattern does not compile.
    pub fn from_config(normalizer: KeyNormalizer, config: &LinkageConfig) -> Result<Self, StratumError> {
        let ticket = Regex::new(&config.ticket_pattern).map_err(|e| {
            StratumError::Config(format!(
                "invalid linkage.ticket_pattern {:?}: {e}",
                config.ticket_pattern
            ))
        })?;
        Ok(Self::new(normalizer, ticket, config.strict_references))
    }

    pub fn normalizer(&self) -> &KeyNormalizer {
        &self.normalizer
    }

    /// First ticket id in `comment`: capture group 1, or the whole match.
    pub fn extract_ticket(&self, comment: &str) -> Option<String> {
        let caps = self.ticket.captures(comment)?;
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
    }

    /// Attribute every group in `index`.
    ///
    /// # Errors
    ///
    /// In strict mode, returns [`StratumError::UnresolvedReference`] for the
    /// first descriptor that matches no group.
    pub fn resolve(
        &self,
        index: &ChangesetIndex,
        tracker: &TrackerData,
    ) -> Result<Attribution, StratumError> {
        let mut pass = ResolutionPass::new(self, index);

        for defect in &tracker.defects {
            let record = AttributionRecord {
                feature: defect.feature.clone(),
                issue: Issue::new(defect.id.clone(), IssueKind::Bug),
            };
            for descriptor in &defect.descriptors {
                pass.claim(ReferenceSource::Defect, &defect.id, descriptor, &record)?;
            }
        }

        for story in &tracker.stories {
            let record = AttributionRecord {
                feature: tracker.features.get(&story.id).cloned().unwrap_or_default(),
                issue: Issue::new(story.id.clone(), IssueKind::Story),
            };
            for descriptor in &story.descriptors {
                pass.claim(ReferenceSource::Story, &story.id, descriptor, &record)?;
            }
        }

        let ResolutionPass {
            mut claimed,
            unattributed,
            conflicts,
            unresolved,
            ..
        } = pass;

        // Keys still referenced by a raw id no tracker row claimed.
        let unclaimed: BTreeSet<&str> = unattributed.values().map(String::as_str).collect();
        let changesets: Vec<AttributedChangeset> = index
            .groups()
            .map(|group| {
                let attribution = if unclaimed.contains(group.key.as_str()) {
                    self.fallback(group, tracker)
                } else {
                    claimed.remove(&group.key).unwrap_or_default()
                };
                AttributedChangeset {
                    group: group.clone(),
                    attribution,
                }
            })
            .collect();

        let attribution = Attribution {
            changesets,
            conflicts,
            unresolved,
        };
        tracing::info!(
            groups = attribution.changesets.len(),
            attributed = attribution.attributed(),
            conflicts = attribution.conflicts.len(),
            unresolved = attribution.unresolved.len(),
            "resolved attribution"
        );
        Ok(attribution)
    }

    fn fallback(&self, group: &ChangesetGroup, tracker: &TrackerData) -> AttributionRecord {
        match self.extract_ticket(&group.comment) {
            Some(id) => {
                let kind = tracker.issue_kinds.get(&id).copied().unwrap_or_default();
                AttributionRecord {
                    feature: String::new(),
                    issue: Issue::new(id, kind),
                }
            }
            None => AttributionRecord::default(),
        }
    }
}

struct ResolutionPass<'a> {
    resolver: &'a AttributionResolver,
    index: &'a ChangesetIndex,
    claimed: BTreeMap<String, AttributionRecord>,
    /// Raw id to key, for raw ids whose group no row has claimed yet.
    unattributed: HashMap<String, String>,
    conflicts: Vec<AttributionConflict>,
    unresolved: Vec<UnresolvedReference>,
}

impl<'a> ResolutionPass<'a> {
    fn new(resolver: &'a AttributionResolver, index: &'a ChangesetIndex) -> Self {
        Self {
            resolver,
            index,
            claimed: BTreeMap::new(),
            unattributed: index.raw_ids().clone(),
            conflicts: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    fn claim(
        &mut self,
        source: ReferenceSource,
        row_id: &str,
        descriptor: &str,
        record: &AttributionRecord,
    ) -> Result<(), StratumError> {
        let key = self.resolver.normalizer.descriptor_key(descriptor);
        let index = self.index;
        let Some(group) = key.as_deref().and_then(|k| index.get(k)) else {
            return self.unresolved(source, row_id, descriptor);
        };
        for raw_id in &group.raw_ids {
            self.unattributed.remove(raw_id);
        }
        let key = group.key.clone();

        if let Some(previous) = self.claimed.insert(key.clone(), record.clone()) {
            if previous != *record {
                tracing::warn!(
                    key = %key,
                    previous = %previous.issue.id,
                    replacement = %record.issue.id,
                    "changeset claimed by more than one tracker row"
                );
                self.conflicts.push(AttributionConflict {
                    key,
                    previous,
                    replacement: record.clone(),
                });
            }
        }
        Ok(())
    }

    fn unresolved(
        &mut self,
        source: ReferenceSource,
        row_id: &str,
        descriptor: &str,
    ) -> Result<(), StratumError> {
        let key = self.resolver.normalizer.descriptor_key(descriptor);
        if self.resolver.strict {
            return Err(StratumError::UnresolvedReference {
                key: key.unwrap_or_else(|| descriptor.to_string()),
            });
        }
        tracing::warn!(
            %source,
            row = row_id,
            descriptor,
            "tracker row references a changeset missing from the exports"
        );
        self.unresolved.push(UnresolvedReference {
            source,
            row_id: row_id.to_string(),
            descriptor: descriptor.to_string(),
            key,
        });
        Ok(())
    }
}
