use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

pub const GENERIC_PROFILE: &str = "generic";

/// Extraction hints for one storefront.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteProfile {
    pub name: String,
    /// Fragments matched against the URL host, e.g. `amazon.` or `bestbuy.com`.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// CSS selectors for the main product price, most reliable first.
    #[serde(default)]
    pub selectors: Vec<String>,
    /// Site-specific regular expressions; capture group 1 is the price when present.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default = "default_allow_render")]
    pub allow_render: bool,
    /// Markup fragments that identify a bot wall instead of a product page.
    #[serde(default)]
    pub block_markers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default, rename = "profile")]
    profiles: Vec<SiteProfile>,
}

fn default_allow_render() -> bool {
    true
}

impl SiteProfile {
    pub fn generic() -> Self {
        Self {
            name: GENERIC_PROFILE.to_string(),
            hosts: Vec::new(),
            selectors: Vec::new(),
            patterns: Vec::new(),
            allow_render: true,
            block_markers: vec![
                "/errors/validateCaptcha".to_string(),
                "cf-challenge".to_string(),
            ],
        }
    }

    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.hosts.iter().any(|h| host.contains(&h.to_lowercase()))
    }

    /// Storefront profiles that ship with the binary.
    pub fn builtin() -> Vec<SiteProfile> {
        let captcha = |extra: &[&str]| -> Vec<String> {
            let mut markers = SiteProfile::generic().block_markers;
            markers.extend(extra.iter().map(|m| m.to_string()));
            markers
        };

        vec![
            SiteProfile {
                name: "amazon".to_string(),
                hosts: vec!["amazon.".to_string()],
                selectors: strings(&[
                    "#corePriceDisplay_desktop_feature_div .a-offscreen",
                    "#corePrice_desktop .a-offscreen",
                    "#priceblock_ourprice",
                    "#priceblock_dealprice",
                    ".a-price[data-a-color='price'] .a-offscreen",
                    "#apex_offerDisplay_desktop .a-offscreen",
                ]),
                patterns: Vec::new(),
                allow_render: true,
                block_markers: captcha(&["Robot Check", "Enter the characters you see below"]),
            },
            SiteProfile {
                name: "bestbuy".to_string(),
                hosts: vec!["bestbuy.".to_string()],
                selectors: strings(&[
                    "[data-testid='customer-price'] span",
                    ".priceView-customer-price span",
                    ".priceView-hero-price span",
                ]),
                patterns: Vec::new(),
                allow_render: true,
                block_markers: captcha(&[]),
            },
            SiteProfile {
                name: "newegg".to_string(),
                hosts: vec!["newegg.".to_string()],
                selectors: strings(&[".price-current"]),
                patterns: Vec::new(),
                allow_render: true,
                block_markers: captcha(&["Are you a human?"]),
            },
            SiteProfile {
                name: "walmart".to_string(),
                hosts: vec!["walmart.".to_string()],
                selectors: strings(&["[itemprop='price']", ".price-characteristic"]),
                patterns: vec![r#""currentPrice":\{"price":([\d.]+)"#.to_string()],
                allow_render: true,
                block_markers: captcha(&["Robot or human?"]),
            },
            SiteProfile::generic(),
        ]
    }

    /// Parses `[[profile]]` tables from a TOML document.
    pub fn parse_toml(content: &str) -> Result<Vec<SiteProfile>, AppError> {
        let file: ProfileFile = toml::from_str(content)?;
        Ok(file.profiles)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Overlays `extra` onto `base`, replacing same-named profiles and keeping `generic` last.
pub fn merge_profiles(mut base: Vec<SiteProfile>, extra: Vec<SiteProfile>) -> Vec<SiteProfile> {
    for profile in extra {
        match base.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => base.push(profile),
        }
    }

    if let Some(pos) = base.iter().position(|p| p.name == GENERIC_PROFILE) {
        let generic = base.remove(pos);
        base.push(generic);
    }

    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles() {
        let profiles = SiteProfile::builtin();
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["amazon", "bestbuy", "newegg", "walmart", "generic"]);
        assert!(profiles.iter().all(|p| p.allow_render));
    }

    #[test]
    fn test_host_matching() {
        let profiles = SiteProfile::builtin();
        let amazon = &profiles[0];
        assert!(amazon.matches_host("www.amazon.ca"));
        assert!(amazon.matches_host("WWW.AMAZON.COM"));
        assert!(!amazon.matches_host("www.newegg.ca"));
        assert!(!SiteProfile::generic().matches_host("anything.com"));
    }

    #[test]
    fn test_parse_toml_profiles() {
        let content = r#"
            [[profile]]
            name = "memoryexpress"
            hosts = ["memoryexpress.com"]
            selectors = [".GrandTotal"]
            allow_render = false

            [[profile]]
            name = "canadacomputers"
            hosts = ["canadacomputers.com"]
            patterns = ['itemprop="price" content="([\d.]+)"']
        "#;

        let profiles = SiteProfile::parse_toml(content).unwrap();
        assert_eq!(profiles.len(), 2);
        assert!(!profiles[0].allow_render);
        assert!(profiles[1].allow_render);
        assert_eq!(profiles[1].patterns.len(), 1);
        assert!(profiles[1].block_markers.is_empty());
    }

    #[test]
    fn test_merge_replaces_and_keeps_generic_last() {
        let extra = vec![
            SiteProfile {
                name: "newegg".to_string(),
                hosts: vec!["newegg.".to_string()],
                selectors: vec![".custom".to_string()],
                patterns: vec![],
                allow_render: false,
                block_markers: vec![],
            },
            SiteProfile {
                name: "shop".to_string(),
                hosts: vec!["shop.example".to_string()],
                selectors: vec![],
                patterns: vec![],
                allow_render: true,
                block_markers: vec![],
            },
        ];

        let merged = merge_profiles(SiteProfile::builtin(), extra);
        assert_eq!(merged.last().unwrap().name, GENERIC_PROFILE);
        let newegg = merged.iter().find(|p| p.name == "newegg").unwrap();
        assert_eq!(newegg.selectors, vec![".custom".to_string()]);
        assert!(merged.iter().any(|p| p.name == "shop"));
        assert_eq!(merged.len(), 6);
    }
}
