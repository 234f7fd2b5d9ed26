use crate::config::BridgeConfig;
use crate::guest::GuestMemory;
use crate::prelude::*;
use crate::source::AssetSource;
use bytes::Bytes;
use serde::Serialize;

/// Where the asset index comes from.
#[derive(Debug, Clone)]
pub enum IndexSource {
    /// known when the host was built, already serialized to compact json
    Static(Bytes),
    /// fetched from the asset source on every index load
    Fetch(String),
}

/// The host half of the asset bridge.
///
/// Moves the asset index and individual assets into guest memory. Every transfer allocates once
/// through the guest's allocator, writes the whole payload and only then returns the handle.
/// Nothing is kept on the host afterwards.
#[derive(Debug, Clone)]
pub struct Bridge<S> {
    source: S,
    index: IndexSource,
}

impl<S: AssetSource> Bridge<S> {
    /// a bridge that fetches its index from `index_path` on the source
    pub fn new(source: S, index_path: impl Into<String>) -> Self {
        Self {
            source,
            index: IndexSource::Fetch(index_path.into()),
        }
    }

    /// a bridge with a static index
    pub fn with_manifest<M: Serialize>(source: S, manifest: &M) -> BridgeResult<Self> {
        Ok(Self {
            source,
            index: IndexSource::Static(Bytes::from(serde_json::to_vec(manifest)?)),
        })
    }

    pub fn from_config(source: S, config: &BridgeConfig) -> Self {
        Self::new(source, config.index_path.clone())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn index(&self) -> &IndexSource {
        &self.index
    }

    /// the index as compact utf-8 json
    ///
    /// a fetched index must parse as json, it is re-serialized so the guest always gets the same
    /// compact form whatever the file looks like
    pub async fn manifest_bytes(&self) -> BridgeResult<Bytes> {
        match &self.index {
            IndexSource::Static(bytes) => Ok(bytes.clone()),
            IndexSource::Fetch(path) => {
                let raw = self.source.fetch(path).await?;
                let manifest: serde_json::Value = serde_json::from_slice(&raw)?;
                Ok(Bytes::from(serde_json::to_vec(&manifest)?))
            }
        }
    }

    /// copy the asset index into a fresh guest allocation
    #[tracing::instrument(skip_all)]
    pub async fn load_index<G: GuestMemory>(&self, guest: &mut G) -> BridgeResult<MemoryHandle> {
        let bytes = self.manifest_bytes().await?;
        let handle = guest.transfer(&bytes)?;
        tracing::debug!(
            address = handle.address(),
            length = handle.length(),
            "moved asset index to guest"
        );
        Ok(handle)
    }

    /// decode the path the guest named, fetch it, and copy it into a fresh guest allocation
    ///
    /// the path is fully decoded before the fetch starts and nothing is allocated until the fetch
    /// has produced every byte, so a failed load leaves guest memory untouched
    #[tracing::instrument(skip(self, guest))]
    pub async fn load_file<G: GuestMemory>(
        &self,
        guest: &mut G,
        path: MemoryHandle,
    ) -> BridgeResult<MemoryHandle> {
        let path = guest.decode_str(path)?;
        let bytes = match self.source.fetch(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%path, error = %e, "asset fetch failed");
                return Err(e);
            }
        };
        let handle = guest.transfer(&bytes)?;
        tracing::debug!(
            %path,
            address = handle.address(),
            length = handle.length(),
            "moved asset to guest"
        );
        Ok(handle)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::arena::SharedArena;
    use crate::source::BundledSource;
    use serde_json::json;

    fn hero() -> Vec<u8> {
        (0..2048_u32).map(|i| (i % 251) as u8).collect()
    }

    fn source() -> BundledSource {
        BundledSource::new()
            .with("sprites/hero.png", hero())
            .with("empty.bin", Vec::<u8>::new())
            .with("index.json", "[\n  {\"path\": \"sprites/hero.png\", \"type\": \"Texture\"}\n]\n")
            .with("broken.json", "[{")
    }

    #[tokio::test]
    async fn load_index_static() {
        let bridge = Bridge::with_manifest(source(), &json!({"a": 1})).unwrap();
        let mut arena = Arena::with_capacity(4096);

        let handle = bridge.load_index(&mut arena).await.unwrap();

        assert_eq!(br#"{"a":1}"#.len() as Len, handle.length());
        assert_eq!(Some(&br#"{"a":1}"#[..]), arena.slice(handle));
        assert_eq!(1, arena.allocation_count());
    }

    #[tokio::test]
    async fn load_index_round_trips_manifest() {
        let manifest = AssetManifest(vec![
            Asset {
                path: "sprites/hero.png".into(),
                kind: AssetKind::Texture,
                entity_id: Some("player".into()),
            },
            Asset {
                path: "sfx/jump.ogg".into(),
                kind: AssetKind::Sound,
                entity_id: None,
            },
        ]);
        let bridge = Bridge::with_manifest(source(), &manifest).unwrap();
        let mut arena = Arena::with_capacity(4096);

        let handle = bridge.load_index(&mut arena).await.unwrap();
        let guest_bytes = arena.slice(handle).unwrap();

        assert_eq!(serde_json::to_vec(&manifest).unwrap(), guest_bytes);
        assert_eq!(manifest, AssetManifest::from_slice(guest_bytes).unwrap());
    }

    #[tokio::test]
    async fn load_index_fetched_is_compacted() {
        let bridge = Bridge::new(source(), "index.json");
        let mut arena = Arena::with_capacity(4096);

        let handle = bridge.load_index(&mut arena).await.unwrap();

        assert_eq!(
            Some(&br#"[{"path":"sprites/hero.png","type":"Texture"}]"#[..]),
            arena.slice(handle)
        );
    }

    #[tokio::test]
    async fn load_index_failures_allocate_nothing() {
        let mut arena = Arena::with_capacity(4096);

        let missing = Bridge::new(source(), "nope.json");
        assert_eq!(
            Err(BridgeError::ResourceNotFound("nope.json".into())),
            missing.load_index(&mut arena).await
        );

        let broken = Bridge::new(source(), "broken.json");
        assert!(matches!(
            broken.load_index(&mut arena).await,
            Err(BridgeError::Manifest(_))
        ));

        assert_eq!(0, arena.allocation_count());
    }

    #[tokio::test]
    async fn load_file_hero() {
        let bridge = Bridge::new(source(), "index.json");
        let mut arena = Arena::with_capacity(64 * 1024);
        let path = arena.transfer(b"sprites/hero.png").unwrap();
        assert_eq!(16, path.length());

        let handle = bridge.load_file(&mut arena, path).await.unwrap();

        assert_eq!(2048, handle.length());
        assert_eq!(Some(&hero()[..]), arena.slice(handle));
        // the path allocation plus exactly one for the asset
        assert_eq!(2, arena.allocation_count());
    }

    #[tokio::test]
    async fn load_file_not_found_allocates_nothing() {
        let bridge = Bridge::new(source(), "index.json");
        let mut arena = Arena::with_capacity(4096);
        let path = arena.transfer(b"sprites/villain.png").unwrap();
        let before = arena.allocation_count();

        assert_eq!(
            Err(BridgeError::ResourceNotFound("sprites/villain.png".into())),
            bridge.load_file(&mut arena, path).await
        );
        assert_eq!(before, arena.allocation_count());
        assert_eq!(path.length(), arena.live_bytes());
    }

    #[tokio::test]
    async fn load_file_invalid_utf8_path() {
        let bridge = Bridge::new(source(), "index.json");
        let mut arena = Arena::with_capacity(4096);
        let path = arena.transfer(b"sprites/\xffhero.png").unwrap();
        let before = arena.allocation_count();

        assert!(matches!(
            bridge.load_file(&mut arena, path).await,
            Err(BridgeError::Decode(_))
        ));
        assert_eq!(before, arena.allocation_count());
    }

    #[tokio::test]
    async fn load_file_out_of_bounds_path() {
        let bridge = Bridge::new(source(), "index.json");
        let mut arena = Arena::with_capacity(4096);

        assert_eq!(
            Err(BridgeError::Memory { ptr: 4000, len: 200 }),
            bridge.load_file(&mut arena, MemoryHandle::new(4000, 200)).await
        );
    }

    #[tokio::test]
    async fn load_file_empty_asset() {
        let bridge = Bridge::new(source(), "index.json");
        let mut arena = Arena::with_capacity(4096);
        let path = arena.transfer(b"empty.bin").unwrap();

        let handle = bridge.load_file(&mut arena, path).await.unwrap();

        assert_eq!(MemoryHandle::empty(), handle);
        assert_eq!(1, arena.allocation_count());
    }

    #[tokio::test]
    async fn load_file_arena_exhausted() {
        let bridge = Bridge::new(source(), "index.json");
        let mut arena = Arena::with_capacity(1024);
        let path = arena.transfer(b"sprites/hero.png").unwrap();

        assert!(matches!(
            bridge.load_file(&mut arena, path).await,
            Err(BridgeError::Allocation(AllocationFailure::OutOfMemory {
                requested: 2048,
                ..
            }))
        ));
        assert_eq!(path.length(), arena.live_bytes());
    }

    #[tokio::test]
    async fn concurrent_loads_are_independent() {
        let source = BundledSource::new()
            .with("asset/0", vec![0_u8; 100])
            .with("asset/1", vec![1_u8; 101])
            .with("asset/2", vec![2_u8; 102]);
        let bridge = Bridge::new(source, "index.json");
        let arena = SharedArena::new(Arena::with_capacity(64 * 1024));

        let (mut a, mut b, mut c) = (arena.clone(), arena.clone(), arena.clone());
        let path_a = a.transfer(b"asset/0").unwrap();
        let path_b = b.transfer(b"asset/1").unwrap();
        let path_c = c.transfer(b"asset/2").unwrap();

        let (handle_a, handle_b, handle_c) = tokio::join!(
            bridge.load_file(&mut a, path_a),
            bridge.load_file(&mut b, path_b),
            bridge.load_file(&mut c, path_c),
        );

        let locked = arena.lock();
        for (i, handle) in [handle_a, handle_b, handle_c].into_iter().enumerate() {
            let handle = handle.unwrap();
            assert_eq!(100 + i as Len, handle.length());
            assert_eq!(Some(&vec![i as u8; 100 + i][..]), locked.slice(handle));
        }
        assert_eq!(6, locked.allocation_count());
    }
}
