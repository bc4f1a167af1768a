//! Pubspec projection and the published index entry.
//!
//! [`Pubspec`] is the typed view of the fields the index cares about in a
//! package's `pubspec.yaml`. Every field is optional; [`PubspecSnapshot`]
//! fills the placeholders that consumers of the index expect.

use crate::release::ReleaseVersion;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author recorded when the manifest does not name one.
pub const DEFAULT_AUTHOR: &str = "MPFlutter";

/// Placeholder for missing `description`/`homepage`.
pub const PLACEHOLDER: &str = "/";

/// The subset of `pubspec.yaml` that is projected into the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pubspec {
    /// Package author.
    #[serde(default, deserialize_with = "scalar")]
    pub author: Option<String>,
    /// Short human-readable summary.
    #[serde(default, deserialize_with = "scalar")]
    pub description: Option<String>,
    /// Project homepage URL.
    #[serde(default, deserialize_with = "scalar")]
    pub homepage: Option<String>,
    /// SDK constraints.
    #[serde(default)]
    pub environment: Option<Environment>,
    /// Runtime dependencies, kept as opaque JSON values.
    #[serde(default)]
    pub dependencies: Option<Map<String, Value>>,
    /// Development dependencies, kept as opaque JSON values.
    #[serde(default)]
    pub dev_dependencies: Option<Map<String, Value>>,
}

/// The `environment` section of a pubspec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Dart SDK constraint (e.g. `">=2.12.0 <3.0.0"`).
    #[serde(default, deserialize_with = "scalar")]
    pub sdk: Option<String>,
    /// Flutter SDK constraint.
    #[serde(default, deserialize_with = "scalar")]
    pub flutter: Option<String>,
}

/// Normalised pubspec stored inside a [`PublishedEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubspecSnapshot {
    /// The published version.
    pub version: String,
    /// The configured package name.
    pub name: String,
    /// Author, or [`DEFAULT_AUTHOR`].
    pub author: String,
    /// Description, or [`PLACEHOLDER`].
    pub description: String,
    /// Homepage, or [`PLACEHOLDER`].
    pub homepage: String,
    /// SDK constraints; absent constraints are omitted.
    pub environment: EnvironmentSnapshot,
    /// Runtime dependencies, or `{}`.
    pub dependencies: Map<String, Value>,
    /// Development dependencies, or `{}`.
    pub dev_dependencies: Map<String, Value>,
}

/// Environment section of a [`PubspecSnapshot`]. Always serialised as an
/// object, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Dart SDK constraint, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
    /// Flutter SDK constraint, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flutter: Option<String>,
}

/// Accept any YAML scalar for a text field. Numbers and booleans are kept
/// in their textual form (`homepage: 123` becomes `"123"`).
fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(Value::Array(_)) => Err(de::Error::custom("expected a scalar, found a sequence")),
        Some(Value::Object(_)) => Err(de::Error::custom("expected a scalar, found a mapping")),
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|s| !s.is_empty()).cloned()
}

impl PubspecSnapshot {
    /// Project a manifest into the normalised snapshot for `name` at `version`.
    pub fn project(pubspec: &Pubspec, name: &str, version: &ReleaseVersion) -> Self {
        let environment = pubspec
            .environment
            .as_ref()
            .map(|env| EnvironmentSnapshot {
                sdk: non_empty(env.sdk.as_ref()),
                flutter: non_empty(env.flutter.as_ref()),
            })
            .unwrap_or_default();

        Self {
            version: version.to_string(),
            name: name.to_string(),
            author: non_empty(pubspec.author.as_ref()).unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            description: non_empty(pubspec.description.as_ref())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            homepage: non_empty(pubspec.homepage.as_ref())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            environment,
            dependencies: pubspec.dependencies.clone().unwrap_or_default(),
            dev_dependencies: pubspec.dev_dependencies.clone().unwrap_or_default(),
        }
    }
}

/// One versioned record in the package index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEntry {
    /// Version string; the key used for replace-or-append.
    pub version: String,
    /// Normalised manifest snapshot.
    pub pubspec: PubspecSnapshot,
    /// Public download URL of the archive.
    pub archive_url: String,
    /// Publish time, ISO-8601 UTC with milliseconds (`2024-05-01T12:00:00.000Z`).
    pub published: String,
}

impl PublishedEntry {
    /// Build the entry for one publish.
    pub fn new(
        pubspec: &Pubspec,
        name: &str,
        version: &ReleaseVersion,
        archive_url: impl Into<String>,
        published: DateTime<Utc>,
    ) -> Self {
        Self {
            version: version.to_string(),
            pubspec: PubspecSnapshot::project(pubspec, name, version),
            archive_url: archive_url.into(),
            published: published.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn version(v: &str) -> ReleaseVersion {
        ReleaseVersion::new(v).unwrap()
    }

    #[test]
    fn test_projection_fills_placeholders() {
        let snapshot = PubspecSnapshot::project(&Pubspec::default(), "foo", &version("1.0.0"));
        assert_eq!(snapshot.name, "foo");
        assert_eq!(snapshot.version, "1.0.0");
        assert_eq!(snapshot.author, DEFAULT_AUTHOR);
        assert_eq!(snapshot.description, PLACEHOLDER);
        assert_eq!(snapshot.homepage, PLACEHOLDER);
        assert!(snapshot.dependencies.is_empty());
        assert!(snapshot.dev_dependencies.is_empty());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["environment"], serde_json::json!({}));
    }

    #[test]
    fn test_projection_from_yaml() {
        let yaml = r"
name: ignored_name
version: 0.0.1
author: Someone
description: ''
homepage: https://mpflutter.com
environment:
  sdk: '>=2.12.0 <3.0.0'
dependencies:
  flutter:
    sdk: flutter
  http: ^0.13.0
";
        let pubspec: Pubspec = serde_yaml::from_str(yaml).unwrap();
        let snapshot = PubspecSnapshot::project(&pubspec, "mp_core", &version("2.0.0"));

        assert_eq!(snapshot.name, "mp_core");
        assert_eq!(snapshot.author, "Someone");
        // Empty strings fall back like missing ones
        assert_eq!(snapshot.description, PLACEHOLDER);
        assert_eq!(snapshot.homepage, "https://mpflutter.com");
        assert_eq!(snapshot.environment.sdk.as_deref(), Some(">=2.12.0 <3.0.0"));
        assert_eq!(snapshot.environment.flutter, None);
        assert_eq!(snapshot.dependencies["http"], "^0.13.0");
        assert_eq!(snapshot.dependencies["flutter"]["sdk"], "flutter");

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["environment"].get("flutter").is_none());
    }

    #[test]
    fn test_whitespace_is_not_missing() {
        let pubspec = Pubspec {
            author: Some("  ".to_string()),
            description: Some(String::new()),
            ..Pubspec::default()
        };
        let snapshot = PubspecSnapshot::project(&pubspec, "foo", &version("1.0.0"));
        assert_eq!(snapshot.author, "  ");
        assert_eq!(snapshot.description, PLACEHOLDER);
    }

    #[test]
    fn test_non_string_scalars_are_accepted() {
        let yaml = r"
author: ~
homepage: 123
description: true
environment:
  sdk: 2
";
        let pubspec: Pubspec = serde_yaml::from_str(yaml).unwrap();
        let snapshot = PubspecSnapshot::project(&pubspec, "foo", &version("1.0.0"));
        assert_eq!(snapshot.author, DEFAULT_AUTHOR);
        assert_eq!(snapshot.homepage, "123");
        assert_eq!(snapshot.description, "true");
        assert_eq!(snapshot.environment.sdk.as_deref(), Some("2"));

        let nested: Result<Pubspec, _> = serde_yaml::from_str("homepage: [a, b]\n");
        assert!(nested.is_err());
    }

    #[test]
    fn test_published_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let entry = PublishedEntry::new(
            &Pubspec::default(),
            "foo",
            &version("1.0.0"),
            "https://dist.mpflutter.com/foo/versions/1.0.0.tar.gz",
            ts,
        );
        assert_eq!(entry.published, "2024-05-01T12:00:00.000Z");
        assert_eq!(entry.version, "1.0.0");
        assert_eq!(entry.pubspec.version, "1.0.0");
    }
}
