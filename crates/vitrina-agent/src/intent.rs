// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification: prompt, one inference call, parse and repair.
//!
//! The model is asked for `{message, action, data, next_state}`. Whatever it
//! returns is turned into a [`StructuredIntent`]; malformed replies degrade
//! to `action = none` with the current state preserved.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use vitrina_core::parse::{extract_json_object, parse_amount};
use vitrina_core::{
    CatalogAdapter, Category, ConversationSession, FieldUpdate, InferenceAdapter, PendingAction,
    ProductDraft, ProductField, ProductState, SessionState, Tone,
};

use crate::prompt;
use crate::tone::by_tone;

/// Draft fields carried by `save_data` and `process_ai`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftData {
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub category_name: Option<String>,
    /// Resolved from `category_name` against the store's categories.
    pub category_id: Option<i64>,
    pub additional_context: Option<String>,
}

impl DraftData {
    pub fn into_draft(self) -> ProductDraft {
        ProductDraft {
            price: self.price,
            stock: self.stock,
            category_id: self.category_id,
            additional_context: self.additional_context,
            ..Default::default()
        }
    }
}

/// Closed set of actions the classifier may request.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    SaveData(DraftData),
    ProcessAi(DraftData),
    CreateProduct { state: ProductState },
    Cancel,
    Reset,
    ShowHelp,
    GetProduct,
    EndConversation,
    SearchProducts {
        query: String,
        pending: Option<PendingAction>,
    },
    ListAllProducts,
    ListLowStock { threshold: Option<i64> },
    SelectProduct { index: i64 },
    UpdateProduct(Vec<FieldUpdate>),
    DeleteProduct,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SaveData(_) => "save_data",
            Self::ProcessAi(_) => "process_ai",
            Self::CreateProduct { .. } => "create_product",
            Self::Cancel => "cancel",
            Self::Reset => "reset",
            Self::ShowHelp => "show_help",
            Self::GetProduct => "get_product",
            Self::EndConversation => "end_conversation",
            Self::SearchProducts { .. } => "search_products",
            Self::ListAllProducts => "list_all_products",
            Self::ListLowStock { .. } => "list_low_stock",
            Self::SelectProduct { .. } => "select_product",
            Self::UpdateProduct(_) => "update_product",
            Self::DeleteProduct => "delete_product",
        }
    }

    /// Decodes an action name and its `data` payload with per-variant validation.
    pub fn decode(name: &str, data: &Value) -> Result<Self, String> {
        let action = match name.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Self::None,
            "save_data" => Self::SaveData(decode_draft(data)),
            "process_ai" => Self::ProcessAi(decode_draft(data)),
            "create_product" => Self::CreateProduct {
                state: str_field(data, &["state", "status"])
                    .and_then(|s| ProductState::from_str(&s).ok())
                    .filter(|s| *s != ProductState::Deleted)
                    .unwrap_or(ProductState::Active),
            },
            "cancel" => Self::Cancel,
            "reset" => Self::Reset,
            "show_help" | "help" => Self::ShowHelp,
            "get_product" => Self::GetProduct,
            "end_conversation" => Self::EndConversation,
            "search_products" | "search_product" => {
                let query = str_field(data, &["query", "search", "name", "term"])
                    .ok_or("search_products without query")?;
                let pending = match data.get("pending_action") {
                    Some(v) if !v.is_null() => Some(decode_pending(v)?),
                    _ => None,
                };
                Self::SearchProducts { query, pending }
            }
            "list_all_products" | "list_products" => Self::ListAllProducts,
            "list_low_stock" => Self::ListLowStock {
                threshold: int_field(data, &["threshold", "max_stock"]),
            },
            "select_product" => Self::SelectProduct {
                index: int_field(data, &["index", "number", "selection", "position"])
                    .ok_or("select_product without index")?,
            },
            "update_product" => Self::UpdateProduct(decode_updates(data)?),
            "delete_product" => Self::DeleteProduct,
            other => return Err(format!("unknown action `{other}`")),
        };
        Ok(action)
    }
}

fn str_field(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match data.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn num_field(data: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match data.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    })
}

fn int_field(data: &Value, keys: &[&str]) -> Option<i64> {
    num_field(data, keys).filter(|n| n.fract() == 0.0).map(|n| n as i64)
}

fn decode_draft(data: &Value) -> DraftData {
    DraftData {
        price: num_field(data, &["price", "precio"]).filter(|p| *p > 0.0),
        stock: int_field(data, &["stock", "quantity", "cantidad"]).filter(|s| *s >= 0),
        category_name: str_field(data, &["category_name", "category", "categoria"]),
        category_id: None,
        additional_context: str_field(data, &["additional_context", "description", "details"]),
    }
}

fn decode_update(value: &Value) -> Result<FieldUpdate, String> {
    let field_name = str_field(value, &["field"]).ok_or("update without field")?;
    let field = ProductField::from_str(&field_name)
        .map_err(|_| format!("unknown product field `{field_name}`"))?;
    let regenerate_with_ai = value
        .get("regenerate_with_ai")
        .or_else(|| value.get("regenerate"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let value = str_field(value, &["value", "instruction"]);
    if value.is_none() && !regenerate_with_ai {
        return Err(format!("update of `{field}` without value"));
    }
    Ok(FieldUpdate {
        field,
        value,
        regenerate_with_ai,
    })
}

fn decode_updates(data: &Value) -> Result<Vec<FieldUpdate>, String> {
    match data.get("updates") {
        Some(Value::Array(items)) => {
            let updates: Vec<FieldUpdate> = items
                .iter()
                .filter_map(|item| match decode_update(item) {
                    Ok(u) => Some(u),
                    Err(e) => {
                        debug!(reason = %e, "dropping invalid update entry");
                        None
                    }
                })
                .collect();
            if updates.is_empty() {
                Err("update_product with no valid updates".into())
            } else {
                Ok(updates)
            }
        }
        _ => decode_update(data).map(|u| vec![u]),
    }
}

fn decode_pending(value: &Value) -> Result<PendingAction, String> {
    let kind = str_field(value, &["action", "type"]).ok_or("pending_action without action")?;
    match kind.to_ascii_lowercase().as_str() {
        "delete" | "delete_product" => Ok(PendingAction::Delete),
        "update" | "update_product" => {
            let payload = value.get("data").unwrap_or(value);
            let updates = match payload {
                Value::Array(items) => decode_updates(&serde_json::json!({ "updates": items }))?,
                other => decode_updates(other)?,
            };
            Ok(PendingAction::Update(updates))
        }
        other => Err(format!("unsupported pending action `{other}`")),
    }
}

/// A validated classifier reply.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredIntent {
    pub message: String,
    pub action: Action,
    pub next_state: SessionState,
}

impl StructuredIntent {
    /// Neutral reply used when inference fails.
    pub fn fallback(current: SessionState, tone: Tone) -> Self {
        Self {
            message: by_tone(
                tone,
                "Disculpe, tuve un problema para procesar su mensaje. ¿Podría repetirlo?",
                "Perdón, tuve un problema para procesar tu mensaje. ¿Me lo repetís?",
            )
            .to_string(),
            action: Action::None,
            next_state: current,
        }
    }
}

/// Parses a raw model reply. Never fails.
pub fn parse_reply(raw: &str, current: SessionState, tone: Tone) -> StructuredIntent {
    let trimmed = raw.trim();
    let parsed = extract_json_object(trimmed).and_then(|json| serde_json::from_str::<Value>(json).ok());
    let Some(value) = parsed else {
        debug!("model reply without JSON object");
        return raw_text_intent(trimmed, None, current, tone);
    };

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty());
    let action_name = value.get("action").and_then(Value::as_str);
    let next_state = value.get("next_state").and_then(Value::as_str);

    let (Some(message), Some(action_name), Some(next_state)) = (message, action_name, next_state) else {
        debug!("model reply missing required keys");
        return raw_text_intent(trimmed, message, current, tone);
    };

    let next_state = SessionState::from_str(next_state.trim()).unwrap_or_else(|_| {
        debug!(next_state, "unknown next_state, keeping current");
        current
    });
    let data = value.get("data").cloned().unwrap_or(Value::Null);
    match Action::decode(action_name, &data) {
        Ok(action) => StructuredIntent {
            message: message.to_string(),
            action,
            next_state,
        },
        Err(reason) => {
            // The model's message and state assumed the action would run.
            warn!(action = action_name, %reason, "invalid action payload, downgraded to none");
            StructuredIntent {
                message: corrective_message(action_name, tone)
                    .unwrap_or(message)
                    .to_string(),
                action: Action::None,
                next_state: current,
            }
        }
    }
}

/// Question asked instead of the model's reply when an action lacks a required field.
fn corrective_message(action_name: &str, tone: Tone) -> Option<&'static str> {
    let reply = match action_name.trim().to_ascii_lowercase().as_str() {
        "search_products" | "search_product" => by_tone(
            tone,
            "¿Qué producto desea buscar?",
            "¿Qué producto querés buscar?",
        ),
        "select_product" => by_tone(
            tone,
            "Indíqueme el número del producto en la lista.",
            "Decime el número del producto en la lista.",
        ),
        "update_product" => by_tone(
            tone,
            "¿Qué dato del producto desea cambiar, y por cuál valor?",
            "¿Qué dato del producto querés cambiar, y por cuál valor?",
        ),
        _ => return None,
    };
    Some(reply)
}

fn raw_text_intent(
    raw: &str,
    message: Option<&str>,
    current: SessionState,
    tone: Tone,
) -> StructuredIntent {
    let message = message.or((!raw.is_empty()).then_some(raw));
    match message {
        Some(message) => StructuredIntent {
            message: message.to_string(),
            action: Action::None,
            next_state: current,
        },
        None => StructuredIntent::fallback(current, tone),
    }
}

/// Resolves `category_name` to a store category id, case-insensitively.
pub fn backfill_category(intent: &mut StructuredIntent, categories: &[Category]) {
    let data = match &mut intent.action {
        Action::SaveData(data) | Action::ProcessAi(data) => data,
        _ => return,
    };
    data.category_id = data
        .category_name
        .as_deref()
        .and_then(|name| find_category(categories, name))
        .map(|c| c.id);
}

pub fn find_category<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    let name = name.trim();
    categories.iter().find(|c| c.title.eq_ignore_ascii_case(name)).or_else(|| {
        let lowered = name.to_lowercase();
        categories.iter().find(|c| c.title.to_lowercase() == lowered)
    })
}

/// Runs one classification per inbound message.
pub struct IntentProcessor {
    inference: Arc<dyn InferenceAdapter>,
    catalog: Arc<dyn CatalogAdapter>,
    history_window: usize,
    timeout: Duration,
}

impl IntentProcessor {
    pub fn new(
        inference: Arc<dyn InferenceAdapter>,
        catalog: Arc<dyn CatalogAdapter>,
        history_window: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            inference,
            catalog,
            history_window,
            timeout,
        }
    }

    /// Classifies `user_message` in the context of `session`.
    ///
    /// Inference errors and timeouts yield [`StructuredIntent::fallback`].
    pub async fn process(&self, session: &ConversationSession, user_message: &str) -> StructuredIntent {
        let categories = match self.catalog.list_categories(&session.admin_id).await {
            Ok(categories) => categories,
            Err(e) => {
                warn!(error = %e, "category lookup failed, prompting without categories");
                Vec::new()
            }
        };
        let system_prompt = prompt::build_system_prompt(session, &categories);
        let history = prompt::history_window(&session.message_history, self.history_window);

        let call = self.inference.complete(&system_prompt, history, user_message);
        let raw = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "inference failed");
                return StructuredIntent::fallback(session.state, session.user_tone);
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "inference timed out");
                return StructuredIntent::fallback(session.state, session.user_tone);
            }
        };

        let mut intent = parse_reply(&raw, session.state, session.user_tone);
        backfill_category(&mut intent, &categories);
        debug!(action = intent.action.name(), next_state = %intent.next_state, "intent classified");
        intent
    }
}
