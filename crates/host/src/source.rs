//! Where asset bytes come from.
//!
//! The bridge treats every source as an opaque `path -> bytes` fetch. Sources decide for themselves
//! what "not found" means, everything else they fail with is a transport error.

use crate::config::ConfigError;
use crate::config::SourceConfig;
use crate::config::SourceKind;
use crate::prelude::*;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::Url;
use std::collections::HashMap;
use std::future::Future;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub trait AssetSource {
    fn fetch(&self, path: &str) -> impl Future<Output = BridgeResult<Bytes>> + Send;
}

/// strip the leading `/` the guest may put on asset paths and refuse anything that could climb out
/// of the asset root
pub fn normalize_path(path: &str) -> BridgeResult<&str> {
    let relative = path.trim_start_matches('/');
    let escapes = Path::new(relative)
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if relative.is_empty() || escapes {
        return Err(BridgeError::InvalidPath(path.to_string()));
    }
    Ok(relative)
}

/// Assets compiled into or preloaded by the host.
#[derive(Debug, Clone, Default)]
pub struct BundledSource {
    assets: HashMap<String, Bytes>,
}

impl BundledSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Bytes>) -> &mut Self {
        self.assets.insert(path.into(), bytes.into());
        self
    }

    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetSource for BundledSource {
    async fn fetch(&self, path: &str) -> BridgeResult<Bytes> {
        let relative = normalize_path(path)?;
        self.assets
            .get(relative)
            .cloned()
            .ok_or_else(|| BridgeError::ResourceNotFound(path.to_string()))
    }
}

/// Assets in a directory on the host filesystem.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> BridgeResult<PathBuf> {
        Ok(self.root.join(normalize_path(path)?))
    }
}

impl AssetSource for FsSource {
    async fn fetch(&self, path: &str) -> BridgeResult<Bytes> {
        let full_path = self.resolve(path)?;
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BridgeError::ResourceNotFound(path.to_string()))
            }
            Err(e) => Err(BridgeError::transport(path, e)),
        }
    }
}

/// Assets served over http(s) below a base url.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConfigError::BaseUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        // without the trailing slash join() would replace the last segment of the base
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> BridgeResult<Url> {
        self.base_url
            .join(normalize_path(path)?)
            .map_err(|_| BridgeError::InvalidPath(path.to_string()))
    }
}

impl AssetSource for HttpSource {
    async fn fetch(&self, path: &str) -> BridgeResult<Bytes> {
        let url = self.url_for(path)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BridgeError::transport(path, e))?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                Err(BridgeError::ResourceNotFound(path.to_string()))
            }
            status if !status.is_success() => {
                Err(BridgeError::transport(path, format!("http status {}", status)))
            }
            _ => response
                .bytes()
                .await
                .map_err(|e| BridgeError::transport(path, e)),
        }
    }
}

/// Any of the sources above, picked at runtime.
#[derive(Debug, Clone)]
pub enum Source {
    Bundled(BundledSource),
    Fs(FsSource),
    Http(HttpSource),
}

impl Source {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        Ok(match config.kind {
            SourceKind::Fs => Self::Fs(FsSource::new(&config.root)),
            SourceKind::Http => {
                let base_url = config
                    .base_url
                    .as_deref()
                    .ok_or(ConfigError::MissingBaseUrl)?;
                Self::Http(HttpSource::new(
                    base_url,
                    Duration::from_millis(config.timeout_ms),
                )?)
            }
        })
    }
}

impl AssetSource for Source {
    async fn fetch(&self, path: &str) -> BridgeResult<Bytes> {
        match self {
            Self::Bundled(source) => source.fetch(path).await,
            Self::Fs(source) => source.fetch(path).await,
            Self::Http(source) => source.fetch(path).await,
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::matchers::path as url_path;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;

    #[test]
    fn normalize() {
        assert_eq!("sprites/hero.png", normalize_path("sprites/hero.png").unwrap());
        assert_eq!("sprites/hero.png", normalize_path("/sprites/hero.png").unwrap());
        assert_eq!("./a.png", normalize_path("./a.png").unwrap());
        for bad in ["", "/", "../secret", "sprites/../../secret", "a/.."] {
            assert_eq!(
                Err(BridgeError::InvalidPath(bad.to_string())),
                normalize_path(bad),
                "{}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn bundled_fetch() {
        let source = BundledSource::new().with("index.json", "[]");
        assert_eq!(Bytes::from_static(b"[]"), source.fetch("/index.json").await.unwrap());
        assert_eq!(
            Err(BridgeError::ResourceNotFound("missing.png".into())),
            source.fetch("missing.png").await
        );
    }

    #[tokio::test]
    async fn fs_fetch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sprites")).unwrap();
        std::fs::write(dir.path().join("sprites/hero.png"), vec![7_u8; 2048]).unwrap();
        let source = FsSource::new(dir.path());

        let bytes = source.fetch("sprites/hero.png").await.unwrap();
        assert_eq!(vec![7_u8; 2048], bytes.to_vec());

        assert_eq!(
            Err(BridgeError::ResourceNotFound("sprites/villain.png".into())),
            source.fetch("sprites/villain.png").await
        );
        assert!(matches!(
            source.fetch("../etc/passwd").await,
            Err(BridgeError::InvalidPath(_))
        ));
        // a directory exists but can't be read as an asset
        assert!(matches!(
            source.fetch("sprites").await,
            Err(BridgeError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn http_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/assets/sprites/hero.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![3_u8; 2048]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/assets/broken.png"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = HttpSource::new(
            &format!("{}/assets", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            format!("{}/assets/sprites/hero.png", server.uri()),
            source.url_for("/sprites/hero.png").unwrap().as_str()
        );
        assert_eq!(vec![3_u8; 2048], source.fetch("sprites/hero.png").await.unwrap().to_vec());
        assert_eq!(
            Err(BridgeError::ResourceNotFound("missing.png".into())),
            source.fetch("missing.png").await
        );
        assert_eq!(
            Err(BridgeError::transport("broken.png", "http status 500 Internal Server Error")),
            source.fetch("broken.png").await
        );
    }

    #[tokio::test]
    async fn http_timeout_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1_u8; 8])
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let source = HttpSource::new(&server.uri(), Duration::from_millis(100)).unwrap();
        assert!(matches!(
            source.fetch("slow.bin").await,
            Err(BridgeError::Transport { .. })
        ));
    }

    #[test]
    fn http_source_config_errors() {
        let mut config = SourceConfig {
            kind: SourceKind::Http,
            ..SourceConfig::default()
        };
        assert!(matches!(
            Source::from_config(&config),
            Err(ConfigError::MissingBaseUrl)
        ));

        config.base_url = Some("not a url".to_string());
        assert!(matches!(
            Source::from_config(&config),
            Err(ConfigError::BaseUrl { .. })
        ));

        config.base_url = Some("http://localhost:8080/assets".to_string());
        assert!(matches!(Source::from_config(&config), Ok(Source::Http(_))));
    }
}
