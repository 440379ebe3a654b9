// src/cache/mod.rs

//! On-disk source meta cache.
//!
//! One JSON file per source file records its content hash and, per build
//! config, the ids of its outputs and their dependencies. On restart this is
//! enough to reuse outputs without invoking any builder.

pub mod source_meta;
pub mod throttle;

use serde::{Deserialize, Serialize};

use crate::build::BuildDependency;
use crate::paths::{BuildId, SourceId};
use crate::source::Encoding;

pub use source_meta::SourceMetaCache;
pub use throttle::{ThrottledWriter, WriteLease, WriteOp};

/// One cached build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetaBuild {
    pub id: BuildId,
    pub build_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<BuildDependency>>,
    #[serde(default, skip_serializing_if = "Encoding::is_utf8")]
    pub encoding: Encoding,
}

/// Serialized form of one cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetaData {
    pub source_id: SourceId,
    pub content_hash: String,
    pub builds: Vec<SourceMetaBuild>,
}

impl SourceMetaData {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn build_names(&self) -> impl Iterator<Item = &str> {
        self.builds.iter().map(|b| b.build_name.as_str())
    }
}

/// A cache entry and the file it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMeta {
    /// Path of the cache file.
    pub cache_id: String,
    pub data: SourceMetaData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted_and_restored() {
        let data = SourceMetaData {
            source_id: "/p/src/logo.png".into(),
            content_hash: "abc".into(),
            builds: vec![
                SourceMetaBuild {
                    id: "/p/.gro/dev/browser/logo.png".into(),
                    build_name: "browser".into(),
                    dependencies: None,
                    encoding: Encoding::Binary,
                },
                SourceMetaBuild {
                    id: "/p/.gro/dev/node/logo.png".into(),
                    build_name: "node".into(),
                    dependencies: None,
                    encoding: Encoding::Utf8,
                },
            ],
        };

        let json = data.to_json().unwrap();
        assert_eq!(json.matches("\"encoding\"").count(), 1);
        assert!(json.contains("\"binary\""));
        assert!(!json.contains("dependencies"));

        assert_eq!(SourceMetaData::from_json(&json).unwrap(), data);
    }

    #[test]
    fn reads_minimal_entries() {
        let json = r#"{
            "source_id": "/p/src/a.ts",
            "content_hash": "h",
            "builds": [{"id": "/p/.gro/dev/node/a.js", "build_name": "node"}]
        }"#;
        let data = SourceMetaData::from_json(json).unwrap();
        assert_eq!(data.builds[0].encoding, Encoding::Utf8);
        assert_eq!(data.builds[0].dependencies, None);
        assert_eq!(data.build_names().collect::<Vec<_>>(), vec!["node"]);
    }
}
