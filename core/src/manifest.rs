use apk_meta_axml::{
    Resolution, UnresolvedReason, XmlAttribute, XmlElement, XmlNode, XmlNodeKind, get_attr_id,
};
use log::debug;

use crate::models::UnresolvedField;

/// Fields picked from the node stream while it is being decoded
#[derive(Debug, Default)]
pub(crate) struct ManifestCollector {
    pub(crate) app_name: String,
    pub(crate) package_name: String,
    pub(crate) version_code: String,
    pub(crate) version_name: String,
    pub(crate) min_sdk_version: String,
    pub(crate) application_name: String,
    pub(crate) unresolved: Vec<UnresolvedField>,

    depth: usize,
    seen_manifest: bool,
    seen_application: bool,
    seen_uses_sdk: bool,
}

impl ManifestCollector {
    pub(crate) fn feed(&mut self, node: &XmlNode) {
        match &node.kind {
            XmlNodeKind::StartElement(element) => {
                self.start_element(element);
                self.depth += 1;
            }
            XmlNodeKind::EndElement { .. } => {
                self.depth = self.depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    /// Every element that carries a field was visited
    pub(crate) fn is_complete(&self) -> bool {
        self.seen_manifest && self.seen_application && self.seen_uses_sdk
    }

    fn start_element(&mut self, element: &XmlElement) {
        match (self.depth, element.name.as_str()) {
            (0, "manifest") if !self.seen_manifest => {
                self.seen_manifest = true;
                self.package_name = self.take(element, "package", "package_name");
                self.version_code = self.take(element, "versionCode", "version_code");
                self.version_name = self.take(element, "versionName", "version_name");
            }
            (1, "application") if !self.seen_application => {
                self.seen_application = true;
                self.app_name = self.take(element, "label", "app_name");
                self.application_name = self.take(element, "name", "application_name");
            }
            (1, "uses-sdk") if !self.seen_uses_sdk => {
                self.seen_uses_sdk = true;
                self.min_sdk_version = self.take(element, "minSdkVersion", "min_sdk_version");
            }
            (depth, name @ ("manifest" | "application" | "uses-sdk")) => {
                debug!("ignoring <{}> at depth {}", name, depth);
            }
            _ => {}
        }
    }

    fn take(&mut self, element: &XmlElement, attribute: &str, field: &'static str) -> String {
        let Some(attr) = find_attribute(element, attribute) else {
            return String::new();
        };

        if let Resolution::Unresolved { reason, .. } = attr.resolution {
            self.unresolved.push(UnresolvedField {
                field,
                reference: attr.value.clone(),
                reason: reason_text(reason),
            });
        }

        attr.value.clone()
    }
}

/// Looks an attribute up by framework id first, obfuscators rename attributes
/// but must keep the resource map intact
fn find_attribute<'e>(element: &'e XmlElement, name: &str) -> Option<&'e XmlAttribute> {
    get_attr_id(name)
        .and_then(|id| element.attr_by_id(id))
        .or_else(|| element.attr(name))
}

fn reason_text(reason: UnresolvedReason) -> &'static str {
    match reason {
        UnresolvedReason::NoTable => "no resource table",
        UnresolvedReason::Missing => "resource not found",
        UnresolvedReason::Cycle => "cyclic reference",
        UnresolvedReason::Invalid => "invalid resource value",
    }
}

#[cfg(test)]
mod tests {
    use apk_meta_axml::{ANDROID_NAMESPACE, AXML, testing::XmlBuilder};

    use super::*;

    fn collect(bytes: &[u8]) -> ManifestCollector {
        let mut collector = ManifestCollector::default();
        for node in AXML::decode(bytes, None).unwrap() {
            collector.feed(&node.unwrap());
        }
        collector
    }

    #[test]
    fn nested_elements_are_ignored() {
        let bytes = XmlBuilder::new()
            .namespace("android", ANDROID_NAMESPACE)
            .start("manifest")
            .attr_string(None, "package", "com.example")
            .start("queries")
            .start("application")
            .attr_string(Some(ANDROID_NAMESPACE), "label", "Wrong")
            .end()
            .end()
            .start("application")
            .attr_string(Some(ANDROID_NAMESPACE), "label", "Right")
            .end()
            .start("application")
            .attr_string(Some(ANDROID_NAMESPACE), "label", "Second")
            .end()
            .end()
            .build();

        let collector = collect(&bytes);
        assert_eq!(collector.package_name, "com.example");
        assert_eq!(collector.app_name, "Right");
        assert!(!collector.is_complete());
    }

    #[test]
    fn unresolved_label() {
        let bytes = XmlBuilder::new()
            .namespace("android", ANDROID_NAMESPACE)
            .start("manifest")
            .start("application")
            .attr_reference(Some(ANDROID_NAMESPACE), "label", 0x01010001, 0x7f010000)
            .end()
            .end()
            .build();

        let collector = collect(&bytes);
        assert_eq!(collector.app_name, "@7f010000");
        assert_eq!(
            collector.unresolved,
            vec![UnresolvedField {
                field: "app_name",
                reference: "@7f010000".to_owned(),
                reason: "no resource table",
            }]
        );
    }
}
