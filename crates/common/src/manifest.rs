use serde::Deserialize;
use serde::Serialize;

/// What kind of content an asset holds.
///
/// The bridge never looks inside asset bytes, this only lets a guest decide what to do with them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Texture,
    Sound,
    Data,
    /// any type this version of the guest doesn't know about
    #[serde(other)]
    Unknown,
}

/// A single entry of the asset index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// path of the asset relative to the asset root
    pub path: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// the entity this asset belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

/// Typed view of the asset index.
///
/// The host treats the index as opaque json, only guests that know the schema deserialize this.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest(pub Vec<Asset>);

impl AssetManifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn assets(&self) -> &[Asset] {
        &self.0
    }

    pub fn find_entity(&self, entity_id: &str) -> Option<&Asset> {
        self.0
            .iter()
            .find(|asset| asset.entity_id.as_deref() == Some(entity_id))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn manifest_from_index_json() {
        let index = br#"[
            {"path": "sprites/hero.png", "type": "Texture", "entity_id": "player"},
            {"path": "sfx/jump.ogg", "type": "Sound"},
            {"path": "levels/1.bin", "type": "Shader"}
        ]"#;
        let manifest = AssetManifest::from_slice(index).unwrap();

        assert_eq!(3, manifest.assets().len());
        assert_eq!(AssetKind::Unknown, manifest.assets()[2].kind);
        assert_eq!(
            "sprites/hero.png",
            manifest.find_entity("player").unwrap().path
        );
        assert!(manifest.find_entity("enemy").is_none());
    }

    #[test]
    fn manifest_serializes_type_field() {
        let manifest = AssetManifest(vec![Asset {
            path: "a.png".into(),
            kind: AssetKind::Texture,
            entity_id: None,
        }]);
        assert_eq!(
            r#"[{"path":"a.png","type":"Texture"}]"#,
            serde_json::to_string(&manifest).unwrap()
        );
    }
}
