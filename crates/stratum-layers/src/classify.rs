//! Path-based layer classification.
//!
//! Each analyzed project lays out its model, view, and controller code
//! differently, so each gets its own immutable rule set behind the
//! [`LayerClassifier`] trait.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use stratum_core::Project;

/// Architectural layer of a source file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Layer {
    #[serde(rename = "m")]
    Model,
    #[serde(rename = "v")]
    View,
    #[serde(rename = "c")]
    Controller,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Model, Layer::View, Layer::Controller];

    /// One-letter code used in histograms and combination labels.
    pub fn code(self) -> &'static str {
        match self {
            Layer::Model => "m",
            Layer::View => "v",
            Layer::Controller => "c",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Maps a repository-relative path to its layer, if it has one.
pub trait LayerClassifier: Send + Sync {
    fn classify(&self, path: &str) -> Option<Layer>;
}

/// Looks up a single path segment in a fixed table.
///
/// # Examples
///
/// ```
/// use stratum_layers::classify::{Layer, LayerClassifier, SegmentTable};
///
/// let rules = SegmentTable::siop();
/// assert_eq!(rules.classify("/siop-jpa/src/Invoice.java"), Some(Layer::Model));
/// assert_eq!(rules.classify("/siop-war/pages/index.xhtml"), Some(Layer::View));
/// assert_eq!(rules.classify("/docs/readme.txt"), None);
/// ```
#[derive(Debug, Clone)]
pub struct SegmentTable {
    segment: usize,
    table: HashMap<String, Layer>,
}

impl SegmentTable {
    pub fn new(segment: usize, table: impl IntoIterator<Item = (String, Layer)>) -> Self {
        Self {
            segment,
            table: table.into_iter().collect(),
        }
    }

    /// Module directories of the SIOP code base, found at segment 1.
    pub fn siop() -> Self {
        Self::new(
            1,
            [
                ("siop-jpa".to_string(), Layer::Model),
                ("siop-ejb".to_string(), Layer::Controller),
                ("siop-war".to_string(), Layer::View),
            ],
        )
    }
}

impl LayerClassifier for SegmentTable {
    fn classify(&self, path: &str) -> Option<Layer> {
        let segment = path.split('/').nth(self.segment)?;
        self.table.get(segment).copied()
    }
}

/// Component trees whose third segment names the kind of content.
///
/// Anything that is not recognizably model or view is controller code,
/// including paths too short to carry the marker segment.
///
/// # Examples
///
/// ```
/// use stratum_layers::classify::{AnchoredRules, Layer, LayerClassifier};
///
/// let rules = AnchoredRules::ofbiz();
/// assert_eq!(rules.classify("applications/order/entitydef/entitymodel.xml"), Some(Layer::Model));
/// assert_eq!(rules.classify("framework/common/widget/CommonScreens.xml"), Some(Layer::View));
/// assert_eq!(rules.classify("applications/order/src/OrderServices.java"), Some(Layer::Controller));
/// assert_eq!(rules.classify("build.xml"), Some(Layer::Controller));
/// ```
#[derive(Debug, Clone)]
pub struct AnchoredRules {
    anchors: Vec<String>,
    model_dirs: Vec<String>,
    view_dirs: Vec<String>,
}

impl AnchoredRules {
    pub fn new(anchors: &[&str], model_dirs: &[&str], view_dirs: &[&str]) -> Self {
        Self {
            anchors: owned(anchors),
            model_dirs: owned(model_dirs),
            view_dirs: owned(view_dirs),
        }
    }

    pub fn ofbiz() -> Self {
        Self::new(
            &["applications", "specialpurpose", "framework"],
            &["data", "entitydef", "entityext", "datafile"],
            &["config", "webapp", "widget", "webtools"],
        )
    }
}

impl LayerClassifier for AnchoredRules {
    fn classify(&self, path: &str) -> Option<Layer> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 3 {
            return Some(Layer::Controller);
        }
        let anchored = self.anchors.iter().any(|a| a == segments[0]);
        let marker = segments[2];
        if anchored && self.model_dirs.iter().any(|d| d == marker) {
            Some(Layer::Model)
        } else if anchored && self.view_dirs.iter().any(|d| d == marker) {
            Some(Layer::View)
        } else {
            Some(Layer::Controller)
        }
    }
}

/// Model code under fixed prefixes, view code under fixed top-level
/// directories, controller code everywhere else.
///
/// # Examples
///
/// ```
/// use stratum_layers::classify::{Layer, LayerClassifier, PrefixRules};
///
/// let rules = PrefixRules::openmrs();
/// assert_eq!(rules.classify("api/src/main/java/org/openmrs/Patient.java"), Some(Layer::Model));
/// assert_eq!(rules.classify("web/WEB-INF/view/index.jsp"), Some(Layer::View));
/// assert_eq!(rules.classify("api/src/test/java/PatientTest.java"), Some(Layer::Controller));
/// ```
#[derive(Debug, Clone)]
pub struct PrefixRules {
    model_prefixes: Vec<String>,
    view_roots: Vec<String>,
}

impl PrefixRules {
    pub fn new(model_prefixes: &[&str], view_roots: &[&str]) -> Self {
        Self {
            model_prefixes: owned(model_prefixes),
            view_roots: owned(view_roots),
        }
    }

    pub fn openmrs() -> Self {
        Self::new(
            &["api/src/main/java/org/openmrs", "api/src/main/resources"],
            &["web", "webapp"],
        )
    }
}

impl LayerClassifier for PrefixRules {
    fn classify(&self, path: &str) -> Option<Layer> {
        if self.model_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return Some(Layer::Model);
        }
        let root = path.split('/').next().unwrap_or_default();
        if self.view_roots.iter().any(|r| r == root) {
            return Some(Layer::View);
        }
        Some(Layer::Controller)
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The rule set for `project`.
pub fn classifier_for(project: Project) -> Box<dyn LayerClassifier> {
    match project {
        Project::Siop => Box::new(SegmentTable::siop()),
        Project::Ofbiz => Box::new(AnchoredRules::ofbiz()),
        Project::Openmrs => Box::new(PrefixRules::openmrs()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siop_segment_one_only() {
        let rules = SegmentTable::siop();
        assert_eq!(rules.classify("/siop-ejb/src/Service.java"), Some(Layer::Controller));
        assert_eq!(rules.classify("siop/siop-ejb/src/Service.java"), Some(Layer::Controller));
        // Module name at the wrong depth is not a match.
        assert_eq!(rules.classify("siop-ejb/src/Service.java"), None);
        assert_eq!(rules.classify("siop-ejb"), None);
        assert_eq!(rules.classify(""), None);
    }

    #[test]
    fn ofbiz_requires_anchor_for_model_and_view() {
        let rules = AnchoredRules::ofbiz();
        assert_eq!(
            rules.classify("specialpurpose/ecommerce/data/DemoData.xml"),
            Some(Layer::Model)
        );
        assert_eq!(
            rules.classify("applications/party/webapp/partymgr/main.ftl"),
            Some(Layer::View)
        );
        assert_eq!(
            rules.classify("themes/tomahawk/webapp/index.ftl"),
            Some(Layer::Controller)
        );
        assert_eq!(rules.classify("framework/base"), Some(Layer::Controller));
    }

    #[test]
    fn openmrs_prefixes() {
        let rules = PrefixRules::openmrs();
        assert_eq!(
            rules.classify("api/src/main/resources/hibernate.cfg.xml"),
            Some(Layer::Model)
        );
        assert_eq!(
            rules.classify("api/src/main/java/org/openmrs/api/db/hibernate/HibernatePatientDAO.java"),
            Some(Layer::Model)
        );
        assert_eq!(rules.classify("webapp/src/main/webapp/index.jsp"), Some(Layer::View));
        assert_eq!(rules.classify("website/index.html"), Some(Layer::Controller));
        assert_eq!(rules.classify("pom.xml"), Some(Layer::Controller));
    }

    #[test]
    fn classifier_for_each_project() {
        assert_eq!(
            classifier_for(Project::Siop).classify("/siop-war/a.xhtml"),
            Some(Layer::View)
        );
        assert_eq!(
            classifier_for(Project::Ofbiz).classify("README"),
            Some(Layer::Controller)
        );
        assert_eq!(
            classifier_for(Project::Openmrs).classify("web/index.jsp"),
            Some(Layer::View)
        );
    }

    #[test]
    fn layer_codes() {
        let codes: Vec<&str> = Layer::ALL.iter().map(|l| l.code()).collect();
        assert_eq!(codes, vec!["m", "v", "c"]);
        assert_eq!(serde_json::to_string(&Layer::View).unwrap(), "\"v\"");
    }
}
