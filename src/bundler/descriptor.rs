//! Info.plist generation.

use plist::{Dictionary, Value};
use serde::Serialize;

use super::error::Result;
use super::settings::BundleSettings;

/// `CFBundleInfoDictionaryVersion` written to every descriptor.
pub const INFO_DICTIONARY_VERSION: &str = "6.0";
/// `CFBundlePackageType` for applications.
pub const PACKAGE_TYPE_APPL: &str = "APPL";
/// `CFBundleSignature` placeholder for unregistered creators.
pub const SIGNATURE_UNKNOWN: &str = "????";

/// Identity record of an application bundle.
///
/// Built fresh from [`BundleSettings`] on every run and rendered once.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BundleDescriptor {
    /// `CFBundleName`
    pub name: String,
    /// `CFBundleDisplayName`
    pub display_name: String,
    /// `CFBundleIdentifier`
    pub identifier: String,
    /// `CFBundleVersion`
    pub version: String,
    /// `CFBundleShortVersionString`
    pub short_version: String,
    /// `CFBundleInfoDictionaryVersion`
    pub info_dictionary_version: String,
    /// `CFBundlePackageType`
    pub package_type: String,
    /// `CFBundleSignature`
    pub signature: String,
    /// `CFBundleExecutable`, the file name in `Contents/MacOS`
    pub executable: String,
    /// `CFBundleIconFile`, the file name in `Contents/Resources`
    pub icon_file: String,
    /// `CFBundleDevelopmentRegion`
    pub development_region: Option<String>,
    /// `LSMinimumSystemVersion`
    pub minimum_system_version: Option<String>,
    /// `LSApplicationCategoryType`
    pub category: Option<String>,
    /// `NSHumanReadableCopyright`
    pub copyright: Option<String>,
    /// `NSHighResolutionCapable`
    pub high_resolution: bool,
}

impl BundleDescriptor {
    /// Derives the descriptor from validated bundle settings.
    pub fn from_settings(bundle: &BundleSettings) -> Self {
        let icon_file = bundle
            .icon
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name: bundle.name.clone(),
            display_name: bundle
                .display_name
                .clone()
                .unwrap_or_else(|| bundle.name.clone()),
            identifier: bundle.identifier.clone(),
            version: bundle.version.clone(),
            short_version: bundle
                .short_version
                .clone()
                .unwrap_or_else(|| bundle.version.clone()),
            info_dictionary_version: INFO_DICTIONARY_VERSION.into(),
            package_type: PACKAGE_TYPE_APPL.into(),
            signature: SIGNATURE_UNKNOWN.into(),
            executable: bundle.executable.clone(),
            icon_file,
            development_region: bundle.development_region.clone(),
            minimum_system_version: bundle.minimum_system_version.clone(),
            category: bundle.category.clone(),
            copyright: bundle.copyright.clone(),
            high_resolution: bundle.high_resolution,
        }
    }

    /// Builds the plist dictionary, keys in a fixed order.
    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();

        dict.insert("CFBundleName".into(), self.name.clone().into());
        dict.insert("CFBundleDisplayName".into(), self.display_name.clone().into());
        dict.insert("CFBundleIdentifier".into(), self.identifier.clone().into());
        dict.insert("CFBundleVersion".into(), self.version.clone().into());
        dict.insert(
            "CFBundleShortVersionString".into(),
            self.short_version.clone().into(),
        );
        dict.insert(
            "CFBundleInfoDictionaryVersion".into(),
            self.info_dictionary_version.clone().into(),
        );
        dict.insert("CFBundlePackageType".into(), self.package_type.clone().into());
        dict.insert("CFBundleSignature".into(), self.signature.clone().into());
        dict.insert("CFBundleExecutable".into(), self.executable.clone().into());
        dict.insert("CFBundleIconFile".into(), self.icon_file.clone().into());

        if let Some(region) = &self.development_region {
            dict.insert("CFBundleDevelopmentRegion".into(), region.clone().into());
        }
        if let Some(version) = &self.minimum_system_version {
            dict.insert("LSMinimumSystemVersion".into(), version.clone().into());
        }
        if let Some(category) = &self.category {
            dict.insert("LSApplicationCategoryType".into(), category.clone().into());
        }
        if let Some(copyright) = &self.copyright {
            dict.insert("NSHumanReadableCopyright".into(), copyright.clone().into());
        }
        dict.insert("NSHighResolutionCapable".into(), self.high_resolution.into());

        dict
    }

    /// Renders the descriptor as Info.plist XML.
    ///
    /// Pure: identical descriptors render identical text.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        Value::Dictionary(self.to_dictionary()).to_writer_xml(&mut buffer)?;
        buffer.push(b'\n');
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn clicker() -> BundleDescriptor {
        BundleDescriptor::from_settings(&BundleSettings {
            name: "Clicker".into(),
            identifier: "org.example.clicker".into(),
            version: "1.0.0".into(),
            executable: "clicker".into(),
            icon: PathBuf::from("assets/icon.icns"),
            high_resolution: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_render_contains_identity() {
        let xml = clicker().render().unwrap();

        assert!(xml.contains("<string>org.example.clicker</string>"));
        assert!(xml.contains("<key>CFBundleExecutable</key>"));
        assert!(xml.contains("<string>clicker</string>"));
        assert!(xml.contains("<string>icon.icns</string>"));
        assert!(xml.contains("<string>APPL</string>"));
        assert!(xml.contains("<string>????</string>"));
        assert!(xml.contains("<string>6.0</string>"));
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(clicker().render().unwrap(), clicker().render().unwrap());
    }

    #[test]
    fn test_render_parses_back_with_every_required_key() {
        let xml = clicker().render().unwrap();
        let value = Value::from_reader_xml(xml.as_bytes()).unwrap();
        let dict = value.as_dictionary().unwrap();

        for key in [
            "CFBundleName",
            "CFBundleDisplayName",
            "CFBundleIdentifier",
            "CFBundleVersion",
            "CFBundleShortVersionString",
            "CFBundleInfoDictionaryVersion",
            "CFBundlePackageType",
            "CFBundleSignature",
            "CFBundleExecutable",
            "CFBundleIconFile",
        ] {
            assert!(dict.contains_key(key), "missing {key}");
        }
        assert_eq!(
            dict.get("CFBundleDisplayName").and_then(Value::as_string),
            Some("Clicker")
        );
        assert_eq!(
            dict.get("CFBundleShortVersionString").and_then(Value::as_string),
            Some("1.0.0")
        );
        assert_eq!(
            dict.get("NSHighResolutionCapable").and_then(Value::as_boolean),
            Some(true)
        );
        assert!(!dict.contains_key("LSMinimumSystemVersion"));
    }

    #[test]
    fn test_optional_keys_when_configured() {
        let mut descriptor = clicker();
        descriptor.minimum_system_version = Some("11.0".into());
        descriptor.category = Some("public.app-category.games".into());
        descriptor.copyright = Some("© 2026 Example".into());

        let dict = descriptor.to_dictionary();
        assert_eq!(
            dict.get("LSMinimumSystemVersion").and_then(Value::as_string),
            Some("11.0")
        );
        assert_eq!(
            dict.get("LSApplicationCategoryType").and_then(Value::as_string),
            Some("public.app-category.games")
        );
        assert!(dict.contains_key("NSHumanReadableCopyright"));
    }
}
