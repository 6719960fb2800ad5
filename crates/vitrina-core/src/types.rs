// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the adapters and the conversation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Schema version stamped on every session written by this build.
///
/// Sessions read back with a lower version are normalized by the session
/// store before use.
pub const SESSION_SCHEMA_VERSION: u32 = 2;

/// Unique identifier of an inbound message, as assigned by the messaging provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Cache,
    Catalog,
    Messaging,
    Inference,
    Enrichment,
}

// --- Conversation ---

/// Step of the chat flow a session is currently in.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SessionState {
    #[default]
    Idle,
    Collecting,
    Reviewing,
    Searching,
    Selecting,
    Editing,
}

/// Author of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn of the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }
}

/// Register the operator writes in; replies mirror it.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Tone {
    Formal,
    Informal,
    #[default]
    Neutral,
}

/// Listing generated by the enrichment adapter from the draft images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProductResult {
    pub title: String,
    pub description: String,
    pub price: Option<f64>,
    pub category_name: Option<String>,
    pub tags: Vec<String>,
}

/// Working draft of a product being created through chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductDraft {
    pub images: Vec<String>,
    pub price: Option<f64>,
    pub category_id: Option<i64>,
    pub stock: Option<i64>,
    pub additional_context: Option<String>,
    pub ai_result: Option<AiProductResult>,
}

impl ProductDraft {
    /// True when nothing has been collected yet.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
            && self.price.is_none()
            && self.category_id.is_none()
            && self.stock.is_none()
            && self.additional_context.is_none()
            && self.ai_result.is_none()
    }

    /// Merges the fields present in `other` into this draft.
    ///
    /// Images are appended (skipping URLs already present) and context is
    /// concatenated. Absent fields never clear existing values.
    pub fn merge(&mut self, other: ProductDraft) {
        for url in other.images {
            if !self.images.contains(&url) {
                self.images.push(url);
            }
        }
        if other.price.is_some() {
            self.price = other.price;
        }
        if other.category_id.is_some() {
            self.category_id = other.category_id;
        }
        if other.stock.is_some() {
            self.stock = other.stock;
        }
        if let Some(ctx) = other.additional_context {
            let ctx = ctx.trim();
            if !ctx.is_empty() {
                self.additional_context = Some(match self.additional_context.take() {
                    Some(existing) if !existing.contains(ctx) => format!("{existing}. {ctx}"),
                    Some(existing) => existing,
                    None => ctx.to_string(),
                });
            }
        }
        if other.ai_result.is_some() {
            self.ai_result = other.ai_result;
        }
    }
}

/// Summary of a catalog product shown in a numbered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub stock: i64,
    pub state: ProductState,
}

impl From<&Product> for SearchResult {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            title: p.title.clone(),
            price: p.price,
            stock: p.stock,
            state: p.state,
        }
    }
}

/// Editable product attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ProductField {
    #[strum(to_string = "title", serialize = "titulo", serialize = "título", serialize = "nombre", serialize = "name")]
    Title,
    #[strum(to_string = "description", serialize = "descripcion", serialize = "descripción")]
    Description,
    #[strum(to_string = "price", serialize = "precio")]
    Price,
    #[strum(to_string = "stock", serialize = "cantidad", serialize = "quantity")]
    Stock,
    #[strum(to_string = "category", serialize = "categoria", serialize = "categoría", serialize = "category_id")]
    Category,
    #[strum(to_string = "state", serialize = "estado", serialize = "status")]
    State,
}

/// One requested change to a catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub field: ProductField,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub regenerate_with_ai: bool,
}

/// Mutation deferred until a product is resolved through search and selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum PendingAction {
    Update(Vec<FieldUpdate>),
    Delete,
}

/// Per-phone conversation state persisted in the key-value cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    #[serde(default)]
    pub schema_version: u32,
    pub phone: String,
    #[serde(default)]
    pub admin_id: String,
    #[serde(default)]
    pub state: SessionState,
    #[serde(default = "Utc::now")]
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub product_data: ProductDraft,
    #[serde(default)]
    pub message_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub search_results: Vec<SearchResult>,
    #[serde(default)]
    pub selected_product_id: Option<i64>,
    #[serde(default)]
    pub pending_action: Option<PendingAction>,
    #[serde(default)]
    pub user_tone: Tone,
    #[serde(default)]
    pub greeting_tone: Option<Tone>,
    #[serde(default)]
    pub has_greeted: bool,
    #[serde(default)]
    pub category_prompt_shown: bool,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl ConversationSession {
    /// A fresh `idle` session with an empty draft and history.
    pub fn new(admin_id: impl Into<String>, phone: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            schema_version: SESSION_SCHEMA_VERSION,
            phone: phone.into(),
            admin_id: admin_id.into(),
            state: SessionState::Idle,
            last_activity: now,
            product_data: ProductDraft::default(),
            message_history: Vec::new(),
            search_results: Vec::new(),
            selected_product_id: None,
            pending_action: None,
            user_tone: Tone::Neutral,
            greeting_tone: None,
            has_greeted: false,
            category_prompt_shown: false,
            last_error: None,
        }
    }

    /// Drops search results, selection and any queued mutation.
    pub fn clear_selection(&mut self) {
        self.search_results.clear();
        self.selected_product_id = None;
        self.pending_action = None;
    }

    /// Discards the draft and every transient field tied to it.
    pub fn reset_draft(&mut self) {
        self.product_data = ProductDraft::default();
        self.category_prompt_shown = false;
        self.clear_selection();
    }
}

// --- Catalog ---

/// Lifecycle state of a catalog product.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ProductState {
    #[default]
    #[strum(to_string = "active", serialize = "activo", serialize = "activa", serialize = "publicado")]
    Active,
    #[strum(to_string = "draft", serialize = "borrador", serialize = "pausado", serialize = "inactivo")]
    Draft,
    #[strum(to_string = "deleted", serialize = "eliminado", serialize = "borrado")]
    Deleted,
}

/// A product row in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub admin_id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
    pub category_id: Option<i64>,
    pub images: Vec<String>,
    pub state: ProductState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub admin_id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
    pub category_id: Option<i64>,
    pub images: Vec<String>,
    pub state: ProductState,
}

/// Partial update applied to a product. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub category_id: Option<i64>,
    pub state: Option<ProductState>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.category_id.is_none()
            && self.state.is_none()
    }
}

/// A product category owned by one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub admin_id: String,
    pub title: String,
}

/// Criteria for [`CatalogAdapter::find_products`](crate::CatalogAdapter::find_products).
///
/// Deleted products are never returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub admin_id: String,
    /// Case-insensitive substring matched against the title.
    pub query: Option<String>,
    pub category_id: Option<i64>,
    /// Only products with `stock <= max_stock`.
    pub max_stock: Option<i64>,
    pub limit: usize,
}

// --- Inbound messages ---

/// Reference to a media object held by the messaging provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Provider id of the message that carried the media.
    pub message_id: String,
    /// Direct (possibly encrypted) URL reported in the webhook.
    pub url: Option<String>,
    pub mime_type: Option<String>,
}

/// Content of a canonical inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    /// One image, or an aggregated album when `images.len() > 1`.
    /// `resolved` holds public URLs once media has been decrypted.
    Image {
        images: Vec<MediaAttachment>,
        #[serde(default)]
        resolved: Vec<String>,
        caption: Option<String>,
    },
    Audio {
        media: MediaAttachment,
    },
}

/// Provider-independent record of one user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: MessageId,
    /// Sender phone number without the provider JID suffix.
    pub phone: String,
    pub content: MessageContent,
    /// Album this image belongs to, if the provider grouped it.
    pub album_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Text body, or caption for images.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { text } => Some(text.as_str()),
            MessageContent::Image { caption, .. } => caption.as_deref(),
            MessageContent::Audio { .. } => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.content, MessageContent::Image { .. })
    }
}

/// Input for product enrichment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentRequest {
    pub images: Vec<String>,
    pub price: Option<f64>,
    pub additional_context: Option<String>,
    /// Category titles available to the store, offered as hints.
    pub categories: Vec<String>,
}
