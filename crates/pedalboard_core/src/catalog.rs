//! Plugin catalog records and the merged per-URI view.
//!
//! Three record sources feed the catalog: plugins installed on the device,
//! the cloud plugin catalog and the storefront. A [`CatalogSnapshot`] is an
//! immutable combination of all sources with its URI index built once at
//! construction; reloading means building a new snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::types::PluginVersion;

pub const DEFAULT_SCREENSHOT: &str = "/resources/pedals/default-screenshot.png";
pub const DEFAULT_THUMBNAIL: &str = "/resources/pedals/default-thumbnail.png";

/// License model of commercial plugins; only these carry pricing.
pub const PAID_PERPETUAL: &str = "paid_perpetual";

/// Plugin installed on the device (`/effect/list`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalPlugin {
    pub uri: String,
    pub name: String,
    pub author: String,
    pub category: Vec<String>,
    pub comment: String,
    pub builder: u32,
    pub minor_version: u32,
    pub micro_version: u32,
    pub release: u32,
    pub licensed: bool,
    #[serde(alias = "gui")]
    pub has_gui: bool,
}

impl LocalPlugin {
    pub fn version(&self) -> PluginVersion {
        PluginVersion::new(
            self.builder,
            self.minor_version,
            self.micro_version,
            self.release,
        )
    }
}

/// Plugin published in the cloud catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudPlugin {
    pub uri: String,
    pub name: String,
    pub author: String,
    pub category: Vec<String>,
    pub comment: String,
    pub builder_version: u32,
    pub minor_version: u32,
    pub micro_version: u32,
    pub release_number: u32,
    pub stable: bool,
    pub mod_license: Option<String>,
    pub screenshot_href: Option<String>,
    pub thumbnail_href: Option<String>,
}

impl CloudPlugin {
    pub fn version(&self) -> PluginVersion {
        PluginVersion::new(
            self.builder_version,
            self.minor_version,
            self.micro_version,
            self.release_number,
        )
    }

    fn is_commercial(&self) -> bool {
        self.mod_license.as_deref() == Some(PAID_PERPETUAL)
    }
}

/// Storefront product for a commercial plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreProduct {
    pub id: String,
    /// Plugin URI the product sells
    pub uri: String,
    pub price: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturedPlugin {
    pub uri: String,
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadFlags {
    pub local_loaded: bool,
    pub cloud_loaded: bool,
    pub featured_loaded: bool,
}

/// Raw records of every source, as last fetched.
#[derive(Debug, Clone, Default)]
pub struct CatalogSources {
    pub local: Vec<LocalPlugin>,
    pub cloud: Vec<CloudPlugin>,
    pub featured: Vec<FeaturedPlugin>,
    pub store: Vec<StoreProduct>,
    pub flags: LoadFlags,
}

/// Records known for a single URI
#[derive(Debug, Clone, Default)]
pub struct IndexEntry {
    pub local: Option<LocalPlugin>,
    pub cloud: Option<CloudPlugin>,
}

/// Answers whether a plugin is licensed independently of the device flags.
pub trait LicenseManager: Send + Sync {
    fn is_licensed(&self, uri: &str) -> bool;
}

/// License manager that knows no licenses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLicenses;

impl LicenseManager for NoLicenses {
    fn is_licensed(&self, _uri: &str) -> bool {
        false
    }
}

/// Fixed set of licensed URIs, e.g. loaded from a license file.
#[derive(Debug, Clone, Default)]
pub struct LicenseSet {
    uris: HashSet<String>,
}

impl LicenseSet {
    /// Parse a JSON array of URIs.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let uris: Vec<String> = serde_json::from_str(json)?;
        Ok(uris.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LicenseSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            uris: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl LicenseManager for LicenseSet {
    fn is_licensed(&self, uri: &str) -> bool {
        self.uris.contains(uri)
    }
}

/// Merged view of one plugin across all sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PluginView {
    pub uri: String,
    pub name: String,
    pub author: String,
    pub category: Vec<String>,
    pub comment: String,
    pub screenshot_href: String,
    pub thumbnail_href: String,
    pub installed: bool,
    pub installed_version: Option<String>,
    pub latest_version: Option<String>,
    pub outdated: bool,
    pub licensed: bool,
    /// The license manager knows a license the device does not
    pub license_mismatch: bool,
    pub store_id: Option<String>,
    pub price: Option<String>,
    pub coming_soon: bool,
    pub demo: bool,
    pub stable: bool,
    pub featured: bool,
}

/// Immutable catalog state with its URI index.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    sources: CatalogSources,
    index: BTreeMap<String, IndexEntry>,
    store: HashMap<String, StoreProduct>,
    featured: HashSet<String>,
}

impl CatalogSnapshot {
    pub fn new(sources: CatalogSources) -> Self {
        let mut index: BTreeMap<String, IndexEntry> = BTreeMap::new();
        for plugin in &sources.local {
            index.entry(plugin.uri.clone()).or_default().local = Some(plugin.clone());
        }
        for plugin in &sources.cloud {
            index.entry(plugin.uri.clone()).or_default().cloud = Some(plugin.clone());
        }
        let store = sources
            .store
            .iter()
            .map(|product| (product.uri.clone(), product.clone()))
            .collect();
        let featured = sources.featured.iter().map(|f| f.uri.clone()).collect();

        Self {
            sources,
            index,
            store,
            featured,
        }
    }

    pub fn sources(&self) -> &CatalogSources {
        &self.sources
    }

    pub fn flags(&self) -> LoadFlags {
        self.sources.flags
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn entry(&self, uri: &str) -> Option<&IndexEntry> {
        self.index.get(uri)
    }

    /// Merge every record known for `uri`.
    ///
    /// Pure over the snapshot: calling it twice yields identical views.
    pub fn get_plugin(&self, uri: &str, licenses: &dyn LicenseManager) -> Option<PluginView> {
        let entry = self.index.get(uri)?;
        let local = entry.local.as_ref();
        let cloud = entry.cloud.as_ref();
        let installed = local.is_some();

        let mut view = PluginView {
            uri: uri.to_string(),
            installed,
            featured: self.featured.contains(uri),
            ..Default::default()
        };

        match (cloud, local) {
            (Some(cloud), _) => {
                view.name = cloud.name.clone();
                view.author = cloud.author.clone();
                view.category = cloud.category.clone();
                view.comment = cloud.comment.clone();
            }
            (None, Some(local)) => {
                view.name = local.name.clone();
                view.author = local.author.clone();
                view.category = local.category.clone();
                view.comment = local.comment.clone();
            }
            (None, None) => {}
        }

        match local {
            Some(local) if local.has_gui => {
                view.screenshot_href = local_image_url("screenshot", uri, local.version());
                view.thumbnail_href = local_image_url("thumbnail", uri, local.version());
            }
            _ => {
                view.screenshot_href = cloud
                    .and_then(|c| c.screenshot_href.clone())
                    .unwrap_or_else(|| DEFAULT_SCREENSHOT.to_string());
                view.thumbnail_href = cloud
                    .and_then(|c| c.thumbnail_href.clone())
                    .unwrap_or_else(|| DEFAULT_THUMBNAIL.to_string());
            }
        }

        view.installed_version = local.map(|l| l.version().to_string());
        view.latest_version = cloud.map(|c| c.version().to_string());
        view.outdated = matches!((local, cloud), (Some(l), Some(c)) if c.version() > l.version());

        let locally_licensed = local.is_some_and(|l| l.licensed);
        let manager_licensed = licenses.is_licensed(uri);
        view.licensed = locally_licensed || manager_licensed;
        // Only an installed copy can carry a stale license flag.
        view.license_mismatch = manager_licensed && local.is_some_and(|l| !l.licensed);

        if cloud.is_some_and(CloudPlugin::is_commercial) {
            match self.store.get(uri) {
                Some(product) => {
                    view.store_id = Some(product.id.clone());
                    if !view.licensed {
                        view.price = Some(product.price.clone());
                    }
                }
                None => view.coming_soon = !view.licensed,
            }
            view.demo = installed && !view.licensed;
        }

        view.stable =
            cloud.is_some_and(|c| c.stable) || self.sources.cloud.is_empty() || !installed;

        Some(view)
    }

    /// Every merged plugin, ordered by name then URI.
    pub fn plugins(&self, licenses: &dyn LicenseManager) -> Vec<PluginView> {
        let mut views: Vec<PluginView> = self
            .index
            .keys()
            .filter_map(|uri| self.get_plugin(uri, licenses))
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.uri.cmp(&b.uri)));
        views
    }

    /// Featured plugins by descending priority. Unknown URIs are skipped.
    pub fn featured(&self, licenses: &dyn LicenseManager) -> Vec<PluginView> {
        let mut featured = self.sources.featured.clone();
        featured.sort_by(|a, b| b.priority.cmp(&a.priority));
        featured
            .iter()
            .filter_map(|f| self.get_plugin(&f.uri, licenses))
            .collect()
    }
}

fn local_image_url(kind: &str, uri: &str, version: PluginVersion) -> String {
    let encoded: String = form_urlencoded::byte_serialize(uri.as_bytes()).collect();
    format!(
        "/effect/image/{}.png?uri={}&v={}",
        kind,
        encoded,
        version.cache_token()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(uri: &str, licensed: bool) -> LocalPlugin {
        LocalPlugin {
            uri: uri.to_string(),
            name: "Local Name".to_string(),
            author: "local".to_string(),
            builder: 1,
            minor_version: 2,
            micro_version: 3,
            release: 4,
            licensed,
            has_gui: true,
            ..Default::default()
        }
    }

    fn cloud(uri: &str, license: Option<&str>) -> CloudPlugin {
        CloudPlugin {
            uri: uri.to_string(),
            name: "Cloud Name".to_string(),
            author: "cloud".to_string(),
            builder_version: 1,
            minor_version: 3,
            micro_version: 0,
            release_number: 0,
            mod_license: license.map(str::to_string),
            screenshot_href: Some("https://cdn/shot.png".to_string()),
            ..Default::default()
        }
    }

    fn snapshot(sources: CatalogSources) -> CatalogSnapshot {
        CatalogSnapshot::new(sources)
    }

    #[test]
    fn test_cloud_wins_descriptive_fields() {
        let snapshot = snapshot(CatalogSources {
            local: vec![local("urn:x", false)],
            cloud: vec![cloud("urn:x", None)],
            ..Default::default()
        });
        let view = snapshot.get_plugin("urn:x", &NoLicenses).unwrap();
        assert_eq!(view.name, "Cloud Name");
        assert_eq!(view.author, "cloud");
        assert_eq!(view.installed_version.as_deref(), Some("2.3-4"));
        assert_eq!(view.latest_version.as_deref(), Some("3.0-0"));
        assert!(view.outdated);
    }

    #[test]
    fn test_installed_gui_uses_versioned_local_image() {
        let snapshot = snapshot(CatalogSources {
            local: vec![local("http://example.org/plugin#x", false)],
            ..Default::default()
        });
        let view = snapshot
            .get_plugin("http://example.org/plugin#x", &NoLicenses)
            .unwrap();
        assert_eq!(
            view.screenshot_href,
            "/effect/image/screenshot.png?uri=http%3A%2F%2Fexample.org%2Fplugin%23x&v=1_2_3_4"
        );
        assert!(view.thumbnail_href.starts_with("/effect/image/thumbnail.png?"));
    }

    #[test]
    fn test_remote_images_then_defaults() {
        let snapshot = snapshot(CatalogSources {
            cloud: vec![cloud("urn:remote", None)],
            ..Default::default()
        });
        let view = snapshot.get_plugin("urn:remote", &NoLicenses).unwrap();
        assert_eq!(view.screenshot_href, "https://cdn/shot.png");
        assert_eq!(view.thumbnail_href, DEFAULT_THUMBNAIL);
        assert!(!view.installed);
    }

    #[test]
    fn test_license_manager_overrides_local_flag() {
        let snapshot = snapshot(CatalogSources {
            local: vec![local("urn:x", false)],
            ..Default::default()
        });
        let licenses: LicenseSet = ["urn:x"].into_iter().collect();
        let view = snapshot.get_plugin("urn:x", &licenses).unwrap();
        assert!(view.licensed);
        assert!(view.license_mismatch);

        let snapshot = CatalogSnapshot::new(CatalogSources {
            local: vec![local("urn:x", true)],
            ..Default::default()
        });
        let view = snapshot.get_plugin("urn:x", &licenses).unwrap();
        assert!(view.licensed);
        assert!(!view.license_mismatch);
    }

    #[test]
    fn test_owned_cloud_only_plugin_is_not_a_mismatch() {
        let snapshot = snapshot(CatalogSources {
            cloud: vec![cloud("urn:paid", Some(PAID_PERPETUAL))],
            ..Default::default()
        });
        let licenses: LicenseSet = ["urn:paid"].into_iter().collect();
        let view = snapshot.get_plugin("urn:paid", &licenses).unwrap();
        assert!(!view.installed);
        assert!(view.licensed);
        assert!(!view.license_mismatch);
        assert!(!view.coming_soon);
    }

    #[test]
    fn test_commercial_with_store_product() {
        let snapshot = snapshot(CatalogSources {
            local: vec![local("urn:paid", false)],
            cloud: vec![cloud("urn:paid", Some(PAID_PERPETUAL))],
            store: vec![StoreProduct {
                id: "prod-1".to_string(),
                uri: "urn:paid".to_string(),
                price: "19.00".to_string(),
            }],
            ..Default::default()
        });
        let view = snapshot.get_plugin("urn:paid", &NoLicenses).unwrap();
        assert_eq!(view.store_id.as_deref(), Some("prod-1"));
        assert_eq!(view.price.as_deref(), Some("19.00"));
        assert!(view.demo);
        assert!(!view.coming_soon);

        let licenses: LicenseSet = ["urn:paid"].into_iter().collect();
        let view = snapshot.get_plugin("urn:paid", &licenses).unwrap();
        assert_eq!(view.store_id.as_deref(), Some("prod-1"));
        assert_eq!(view.price, None);
        assert!(!view.demo);
    }

    #[test]
    fn test_commercial_without_store_is_coming_soon() {
        let snapshot = snapshot(CatalogSources {
            cloud: vec![cloud("urn:paid", Some(PAID_PERPETUAL))],
            ..Default::default()
        });
        let view = snapshot.get_plugin("urn:paid", &NoLicenses).unwrap();
        assert!(view.coming_soon);
        assert!(!view.demo);
        assert_eq!(view.store_id, None);
    }

    #[test]
    fn test_free_plugins_skip_commercial_fields() {
        let snapshot = snapshot(CatalogSources {
            local: vec![local("urn:free", false)],
            cloud: vec![cloud("urn:free", Some("free"))],
            ..Default::default()
        });
        let view = snapshot.get_plugin("urn:free", &NoLicenses).unwrap();
        assert!(!view.coming_soon);
        assert!(!view.demo);
        assert_eq!(view.price, None);
    }

    #[test]
    fn test_stability_rules() {
        let offline = snapshot(CatalogSources {
            local: vec![local("urn:x", false)],
            ..Default::default()
        });
        assert!(offline.get_plugin("urn:x", &NoLicenses).unwrap().stable);

        let online = snapshot(CatalogSources {
            local: vec![local("urn:x", false)],
            cloud: vec![cloud("urn:x", None), cloud("urn:y", None)],
            ..Default::default()
        });
        assert!(!online.get_plugin("urn:x", &NoLicenses).unwrap().stable);
        assert!(online.get_plugin("urn:y", &NoLicenses).unwrap().stable);
    }

    #[test]
    fn test_get_plugin_is_deterministic() {
        let snapshot = snapshot(CatalogSources {
            local: vec![local("urn:x", false)],
            cloud: vec![cloud("urn:x", Some(PAID_PERPETUAL))],
            ..Default::default()
        });
        assert_eq!(
            snapshot.get_plugin("urn:x", &NoLicenses),
            snapshot.get_plugin("urn:x", &NoLicenses)
        );
        assert_eq!(snapshot.get_plugin("urn:missing", &NoLicenses), None);
    }

    #[test]
    fn test_plugins_sorted_and_featured_by_priority() {
        let mut a = cloud("urn:a", None);
        a.name = "Zeta".to_string();
        let mut b = cloud("urn:b", None);
        b.name = "Alpha".to_string();
        let snapshot = snapshot(CatalogSources {
            cloud: vec![a, b],
            featured: vec![
                FeaturedPlugin {
                    uri: "urn:a".to_string(),
                    priority: 1,
                },
                FeaturedPlugin {
                    uri: "urn:b".to_string(),
                    priority: 5,
                },
                FeaturedPlugin {
                    uri: "urn:gone".to_string(),
                    priority: 9,
                },
            ],
            ..Default::default()
        });
        let names: Vec<_> = snapshot
            .plugins(&NoLicenses)
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);

        let featured: Vec<_> = snapshot
            .featured(&NoLicenses)
            .into_iter()
            .map(|v| v.uri)
            .collect();
        assert_eq!(featured, vec!["urn:b", "urn:a"]);
    }

    #[test]
    fn test_license_set_from_json() {
        let set = LicenseSet::from_json(r#"["urn:a", "urn:b"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.is_licensed("urn:b"));
        assert!(LicenseSet::from_json("{}").is_err());
    }
}
