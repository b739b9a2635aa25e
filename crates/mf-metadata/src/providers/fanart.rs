//! Series artwork from the fan-art web service.
//!
//! One XML document per series (keyed by its TVDB id) lists every known
//! logo, clear-art and thumbnail, each tagged with an optional language.
//! Every image kind is resolved independently through a [`FallbackChain`]
//! and downloaded through the [`ImageSaver`] collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mf_core::config::{FanartConfig, ImageToggles, MetadataConfig, FANART_POOL};
use mf_core::{Error, ExternalService, ImageType, ItemKind, MediaItem};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::collaborators::{HttpFetcher, HttpRequest, ImageRequest, ImageSaver};
use crate::fallback::{FallbackChain, Presence};
use crate::provider::{FetchContext, ItemUpdate, MetadataProvider, ProviderError, ProviderPriority};
use crate::refresh::{self, RefreshRecord, RefreshRequirements};

// ---------------------------------------------------------------------------
// Image kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtKind {
    Logo,
    Art,
    Thumb,
}

impl ArtKind {
    const ALL: [ArtKind; 3] = [ArtKind::Logo, ArtKind::Art, ArtKind::Thumb];

    /// High-definition element name, when the service publishes one.
    fn hd_element(self) -> Option<&'static str> {
        match self {
            Self::Logo => Some("hdtvlogo"),
            Self::Art => Some("hdclearart"),
            Self::Thumb => None,
        }
    }

    fn generic_element(self) -> &'static str {
        match self {
            Self::Logo => "clearlogo",
            Self::Art => "clearart",
            Self::Thumb => "tvthumb",
        }
    }

    /// File stem the artwork is stored under and looked up as a local override.
    fn target_name(self) -> &'static str {
        match self {
            Self::Logo => "logo",
            Self::Art => "clearart",
            Self::Thumb => "thumb",
        }
    }

    fn image_type(self) -> ImageType {
        match self {
            Self::Logo => ImageType::Logo,
            Self::Art => ImageType::Art,
            Self::Thumb => ImageType::Thumb,
        }
    }

    fn enabled(self, toggles: &ImageToggles) -> bool {
        match self {
            Self::Logo => toggles.logo,
            Self::Art => toggles.art,
            Self::Thumb => toggles.thumb,
        }
    }

    /// Candidates from most to least preferred:
    ///
    /// 1. HD variant in the preferred language (HD preferred only)
    /// 2. generic variant in the preferred language
    /// 3. a language-neutral node, HD first when preferred
    /// 4. HD variant in any language (HD preferred only)
    /// 5. generic variant in any language
    fn chain<'a>(self, language: &'a str, prefer_hd: bool) -> FallbackChain<'a, FanartDocument, String> {
        let hd = self.hd_element().filter(|_| prefer_hd);
        let generic = self.generic_element();
        let mut chain = FallbackChain::new();

        if let Some(hd) = hd {
            chain = chain.then("hd+language", move |doc: &FanartDocument| {
                doc.first_url(hd, LangFilter::Exactly(language))
            });
        }
        chain = chain
            .then("language", move |doc: &FanartDocument| {
                doc.first_url(generic, LangFilter::Exactly(language))
            })
            .then("language-neutral", move |doc: &FanartDocument| {
                hd.and_then(|hd| doc.first_url(hd, LangFilter::Untagged))
                    .filter(Presence::is_present)
                    .or_else(|| doc.first_url(generic, LangFilter::Untagged))
            });
        if let Some(hd) = hd {
            chain = chain.then("hd", move |doc: &FanartDocument| doc.first_url(hd, LangFilter::Any));
        }
        chain.then("any", move |doc: &FanartDocument| doc.first_url(generic, LangFilter::Any))
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct ArtNode {
    url: String,
    lang: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum LangFilter<'a> {
    Exactly(&'a str),
    Untagged,
    Any,
}

impl LangFilter<'_> {
    fn matches(&self, node: &ArtNode) -> bool {
        match self {
            Self::Exactly(language) => node
                .lang
                .as_deref()
                .is_some_and(|lang| lang.eq_ignore_ascii_case(language)),
            Self::Untagged => node.lang.is_none(),
            Self::Any => true,
        }
    }
}

/// Artwork nodes found under `fanart/series/<group>/<element>`, keyed by
/// element name and kept in document order.
#[derive(Debug, Default)]
struct FanartDocument {
    nodes: HashMap<String, Vec<ArtNode>>,
}

impl FanartDocument {
    fn parse(bytes: &[u8]) -> mf_core::Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut doc = Self::default();
        let mut stack: Vec<String> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| Error::Parse(format!("fan-art document: {e}")))?;
            match event {
                Event::Start(e) => {
                    doc.visit(&stack, &e)?;
                    stack.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                Event::Empty(e) => doc.visit(&stack, &e)?,
                Event::End(_) => {
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(doc)
    }

    fn visit(&mut self, parents: &[String], element: &BytesStart<'_>) -> mf_core::Result<()> {
        let in_group = parents.len() == 3 && parents[0] == "fanart" && parents[1] == "series";
        if !in_group {
            return Ok(());
        }

        let mut url = String::new();
        let mut lang = None;
        for attr in element.attributes().flatten() {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Parse(format!("fan-art attribute: {e}")))?;
            match attr.key.as_ref() {
                b"url" => url = value.trim().to_string(),
                b"lang" if !value.trim().is_empty() => lang = Some(value.trim().to_lowercase()),
                _ => {}
            }
        }

        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        self.nodes.entry(name).or_default().push(ArtNode { url, lang });
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// URL of the first `element` node passing `filter`. The URL may be empty;
    /// the fallback chain treats that as "no value".
    fn first_url(&self, element: &str, filter: LangFilter<'_>) -> Option<String> {
        self.nodes
            .get(element)?
            .iter()
            .find(|node| filter.matches(node))
            .map(|node| node.url.clone())
    }
}

/// Resolve a download URL for each kind. Kinds whose chain is exhausted are
/// left out.
fn select_artwork(
    doc: &FanartDocument,
    kinds: &[ArtKind],
    language: &str,
    prefer_hd: bool,
) -> Vec<(ArtKind, String)> {
    kinds
        .iter()
        .filter_map(|&kind| {
            let resolved = kind.chain(language, prefer_hd).resolve(doc);
            match resolved {
                Some(resolved) => {
                    debug!(
                        target_name = kind.target_name(),
                        candidate = resolved.label,
                        index = resolved.index,
                        "Resolved fan-art source"
                    );
                    Some((kind, resolved.value))
                }
                None => {
                    debug!(target_name = kind.target_name(), "No fan-art source found");
                    None
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct FanartProvider {
    http: Arc<dyn HttpFetcher>,
    images: Arc<dyn ImageSaver>,
    api_key: String,
    url_template: String,
}

impl FanartProvider {
    pub fn new(
        http: Arc<dyn HttpFetcher>,
        images: Arc<dyn ImageSaver>,
        api_key: impl Into<String>,
        url_template: impl Into<String>,
    ) -> Self {
        Self {
            http,
            images,
            api_key: api_key.into(),
            url_template: url_template.into(),
        }
    }

    /// Build from configuration. Returns `None` when no API key is configured.
    pub fn from_config(
        http: Arc<dyn HttpFetcher>,
        images: Arc<dyn ImageSaver>,
        config: &FanartConfig,
    ) -> Option<Self> {
        let api_key = config.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        Some(Self::new(http, images, api_key, config.base_url.clone()))
    }

    fn document_url(&self, tvdb_id: &str) -> String {
        self.url_template
            .replace("{api_key}", &self.api_key)
            .replace("{id}", tvdb_id)
    }

    fn pending_kinds(item: &MediaItem, config: &MetadataConfig) -> Vec<ArtKind> {
        ArtKind::ALL
            .into_iter()
            .filter(|kind| kind.enabled(&config.series_images))
            .filter(|kind| {
                let overridden = item.resolve_args.contains_meta_file(kind.target_name());
                if overridden {
                    debug!(item_id = %item.id, target_name = kind.target_name(), "Local artwork present; skipping");
                }
                !overridden
            })
            .collect()
    }

    /// Download every selection into `update`. Stops at the first failure;
    /// the caller discards what was staged.
    async fn download_selections(
        &self,
        item: &MediaItem,
        ctx: &FetchContext<'_>,
        selections: Vec<(ArtKind, String)>,
        update: &mut ItemUpdate,
    ) -> Result<(), ProviderError> {
        for (kind, source) in selections {
            ctx.checkpoint()?;
            debug!(item_id = %item.id, name = %item.name, target_name = kind.target_name(), "Downloading fan-art");
            let stored = self
                .images
                .download_and_save(ImageRequest {
                    item,
                    url: &source,
                    target_name: kind.target_name(),
                    save_locally: ctx.config.save_local_meta,
                    pool: ctx.pool,
                    cancellation: ctx.cancellation,
                })
                .await?;
            update.stage_image(kind.image_type(), stored);
        }
        ctx.checkpoint()
    }
}

#[async_trait]
impl MetadataProvider for FanartProvider {
    fn name(&self) -> &'static str {
        "fanart"
    }

    fn priority(&self) -> ProviderPriority {
        ProviderPriority::Third
    }

    fn resource_pool(&self) -> Option<&'static str> {
        Some(FANART_POOL)
    }

    fn supports(&self, item: &MediaItem) -> bool {
        item.kind == ItemKind::Series && item.provider_id(ExternalService::Tvdb).is_some()
    }

    fn needs_refresh(
        &self,
        item: &MediaItem,
        last: Option<&RefreshRecord>,
        config: &MetadataConfig,
        now: DateTime<Utc>,
    ) -> bool {
        let images = config.series_images;
        let toggles = [images.logo, images.art, images.thumb];
        let requirements = RefreshRequirements {
            required_id: Some(ExternalService::Tvdb),
            toggles: &toggles,
            provider_version: self.version(),
            staleness: config.staleness_window(),
        };
        refresh::needs_refresh(item, &requirements, last, now)
    }

    async fn fetch(
        &self,
        item: &MediaItem,
        ctx: &FetchContext<'_>,
    ) -> Result<ItemUpdate, ProviderError> {
        ctx.checkpoint()?;

        let Some(tvdb_id) = item.provider_id(ExternalService::Tvdb) else {
            return Ok(ItemUpdate::new());
        };

        let config = ctx.config;
        let pending = Self::pending_kinds(item, config);
        if pending.is_empty() {
            return Ok(ItemUpdate::new());
        }

        let url = self.document_url(tvdb_id);
        let body = self
            .http
            .get(HttpRequest {
                url: &url,
                pool: ctx.pool,
                cancellation: ctx.cancellation,
                enable_cache: true,
            })
            .await?;

        ctx.checkpoint()?;

        let doc = FanartDocument::parse(&body)?;
        if doc.is_empty() {
            debug!(item_id = %item.id, tvdb_id, "Empty fan-art document");
            return Ok(ItemUpdate::new());
        }

        let selections = select_artwork(&doc, &pending, &config.language(), config.download_hd_fanart);

        let mut update = ItemUpdate::new();
        if let Err(e) = self.download_selections(item, ctx, selections, &mut update).await {
            update.discard_staged().await;
            return Err(e);
        }
        Ok(update)
    }
}
