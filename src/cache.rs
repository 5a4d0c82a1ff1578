use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;

use crate::fehler::{Abrufgrund, Fehler, Result};

/// Hält die Antwort eines Abrufs als Datei vor, damit spätere Läufe ohne
/// Netzwerk auskommen.
#[derive(Debug, Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    client: reqwest::Client,
    pfad: PathBuf,
    neu_laden: bool,
}

impl Cache {
    /// `neu_laden` erzwingt einen Abruf, auch wenn die Datei schon existiert.
    pub fn new(pfad: impl Into<PathBuf>, neu_laden: bool) -> Self {
        let client = reqwest::Client::new();
        let inner = Arc::new(CacheInner {
            client,
            pfad: pfad.into(),
            neu_laden,
        });
        Self { inner }
    }

    pub fn pfad(&self) -> &Path {
        &self.inner.pfad
    }

    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.inner.client.get(url)
    }

    /// Liefert den Inhalt der Cache-Datei oder führt die Anfrage aus und
    /// schreibt die Antwort in die Datei.
    #[tracing::instrument(skip_all, fields(url, pfad = %self.inner.pfad.display()))]
    pub async fn get_request(&self, builder: reqwest::RequestBuilder) -> Result<String> {
        if !self.inner.neu_laden {
            if let Ok(inhalt) = fs::read_to_string(&self.inner.pfad).await {
                tracing::info!("Wechselkurse aus Datei geladen");
                return Ok(inhalt);
            }
        }

        let (client, request) = builder.build_split();
        let request = request.map_err(|err| Fehler::Abruf {
            url: String::new(),
            grund: Abrufgrund::Verbindung(err),
        })?;
        let url = request.url().to_string();
        tracing::Span::current().record("url", url.as_str());
        tracing::info!("Wechselkurse werden abgerufen");

        let abruf_fehler = |grund| Fehler::Abruf {
            url: url.clone(),
            grund,
        };
        let response = client
            .execute(request)
            .await
            .map_err(|err| abruf_fehler(Abrufgrund::Verbindung(err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(abruf_fehler(Abrufgrund::Status(status)));
        }
        let inhalt = response
            .text()
            .await
            .map_err(|err| abruf_fehler(Abrufgrund::Verbindung(err)))?;

        if let Err(err) = self.schreiben(&inhalt).await {
            tracing::error!(err = &err as &dyn std::error::Error);
        }

        Ok(inhalt)
    }

    async fn schreiben(&self, inhalt: &str) -> std::io::Result<()> {
        if let Some(verzeichnis) = self.inner.pfad.parent() {
            fs::create_dir_all(verzeichnis).await?;
        }
        fs::write(&self.inner.pfad, inhalt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vorhandene_datei_wird_gelesen() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let pfad = verzeichnis.path().join("kurse.csv");
        std::fs::write(&pfad, "inhalt").unwrap();

        let cache = Cache::new(&pfad, false);
        // die url wird nie abgefragt
        let builder = cache.get("http://127.0.0.1:9/nicht-erreichbar");
        let inhalt = cache.get_request(builder).await.unwrap();
        assert_eq!(inhalt, "inhalt");
    }

    #[tokio::test]
    async fn neu_laden_ignoriert_datei() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let pfad = verzeichnis.path().join("kurse.csv");
        std::fs::write(&pfad, "inhalt").unwrap();

        let cache = Cache::new(&pfad, true);
        let builder = cache.get("http://127.0.0.1:9/nicht-erreichbar");
        let fehler = cache.get_request(builder).await.unwrap_err();
        assert!(matches!(fehler, Fehler::Abruf { .. }));
    }
}
