// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly for the intent classifier.
//!
//! The system prompt is the static instruction block followed by a summary
//! of whatever the session is working on. History is bounded to the last
//! `history_window` turns.

use std::fmt::Write as _;

use vitrina_core::parse::format_price;
use vitrina_core::{
    Category, ConversationSession, HistoryEntry, InboundMessage, MessageContent, PendingAction,
    SessionState, Tone,
};

const INSTRUCTIONS: &str = r#"Sos el asistente de una tienda online. El dueño de la tienda te escribe por WhatsApp para cargar, buscar, modificar y eliminar productos.

Respondé SIEMPRE con un único objeto JSON, sin texto alrededor:
{"message": "<respuesta para el usuario>", "action": "<acción>", "data": {...}, "next_state": "<estado>"}

Estados: idle, collecting, reviewing, searching, selecting, editing.

Acciones y su "data":
- none: {} (solo conversar o pedir aclaraciones)
- save_data: {"price"?, "stock"?, "category_name"?, "additional_context"?} datos del producto que se está cargando
- process_ai: mismos campos opcionales que save_data; generar la publicación con las fotos recibidas
- create_product: {"state": "active" | "draft"} publicar (active) o guardar como borrador (draft)
- cancel: {} descartar lo que se estaba haciendo
- reset: {} empezar de cero
- show_help: {}
- get_product: {} mostrar el producto seleccionado
- end_conversation: {} el usuario se despide
- search_products: {"query": "<nombre o categoría>", "pending_action"?: {"action": "update" | "delete", "updates"?: [...]}}
- list_all_products: {}
- list_low_stock: {"threshold"?: <número>}
- select_product: {"index": <número de la lista, empezando en 1>}
- update_product: {"field": "title|description|price|stock|category|state", "value": "...", "regenerate_with_ai": false} o {"updates": [ ... ]}
- delete_product: {}

Reglas:
- Nunca inventes ids de productos ni de categorías; usá nombres.
- Si el usuario pide modificar o eliminar un producto que no está seleccionado, usá search_products con pending_action.
- Para update_product con regenerate_with_ai=true, "value" son las indicaciones para reescribir el campo.
- Si falta información, preguntá con action "none" y mantené el estado actual.
- Mensajes breves, en español."#;

/// Builds the system prompt for one classification call.
pub fn build_system_prompt(session: &ConversationSession, categories: &[Category]) -> String {
    let mut prompt = String::with_capacity(INSTRUCTIONS.len() + 512);
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\n");
    prompt.push_str(tone_instruction(session.user_tone));
    prompt.push_str("\n\n## Contexto actual\n");
    prompt.push_str(&context_summary(session, categories));
    prompt
}

fn tone_instruction(tone: Tone) -> &'static str {
    match tone {
        Tone::Formal => "El usuario escribe de manera formal: tratalo de usted.",
        Tone::Informal => "El usuario escribe de manera informal: tuteá o voseá con naturalidad.",
        Tone::Neutral => "Usá un tono cordial y neutro.",
    }
}

fn context_summary(session: &ConversationSession, categories: &[Category]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Estado: {}", session.state);

    if !categories.is_empty() {
        let names: Vec<&str> = categories.iter().map(|c| c.title.as_str()).collect();
        let _ = writeln!(out, "Categorías de la tienda: {}", names.join(", "));
    }

    let draft = &session.product_data;
    if matches!(session.state, SessionState::Collecting | SessionState::Reviewing) || !draft.is_empty() {
        let _ = writeln!(out, "Producto en carga:");
        let _ = writeln!(out, "- fotos: {}", draft.images.len());
        if let Some(price) = draft.price {
            let _ = writeln!(out, "- precio: {}", format_price(price));
        }
        if let Some(stock) = draft.stock {
            let _ = writeln!(out, "- stock: {stock}");
        }
        if let Some(id) = draft.category_id {
            let title = categories
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.title.as_str())
                .unwrap_or("asignada");
            let _ = writeln!(out, "- categoría: {title}");
        }
        if let Some(ctx) = &draft.additional_context {
            let _ = writeln!(out, "- notas: {ctx}");
        }
        if let Some(ai) = &draft.ai_result {
            let _ = writeln!(out, "- publicación generada: \"{}\"", ai.title);
        }
    }

    if !session.search_results.is_empty() {
        let _ = writeln!(out, "Resultados de búsqueda mostrados:");
        for (i, r) in session.search_results.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} ({}, stock {})",
                i + 1,
                r.title,
                format_price(r.price),
                r.stock
            );
        }
    }

    if let Some(id) = session.selected_product_id {
        let _ = writeln!(out, "Hay un producto seleccionado (#{id}).");
    }
    match &session.pending_action {
        Some(PendingAction::Delete) => {
            let _ = writeln!(out, "Pendiente: eliminar el producto que se elija.");
        }
        Some(PendingAction::Update(updates)) => {
            let fields: Vec<String> = updates.iter().map(|u| u.field.to_string()).collect();
            let _ = writeln!(out, "Pendiente: modificar {} del producto que se elija.", fields.join(", "));
        }
        None => {}
    }
    out
}

/// The last `window` entries of the history.
pub fn history_window(history: &[HistoryEntry], window: usize) -> &[HistoryEntry] {
    &history[history.len().saturating_sub(window)..]
}

/// Renders an inbound message as the user turn of the prompt.
pub fn render_user_message(message: &InboundMessage, transcription: Option<&str>) -> String {
    match &message.content {
        MessageContent::Text { text } => text.clone(),
        MessageContent::Image {
            images,
            resolved,
            caption,
        } => {
            let count = resolved.len().max(images.len()).max(1);
            match caption {
                Some(caption) => format!("[image x{count}] {caption}"),
                None => format!("[image x{count}]"),
            }
        }
        MessageContent::Audio { .. } => match transcription {
            Some(text) => format!("[audio, transcription: {text}]"),
            None => "[audio, transcription unavailable]".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vitrina_core::{MediaAttachment, MessageId, Role, SearchResult};

    fn image_message(caption: Option<&str>, count: usize) -> InboundMessage {
        InboundMessage {
            id: MessageId("m".into()),
            phone: "549111".into(),
            content: MessageContent::Image {
                images: (0..count)
                    .map(|i| MediaAttachment {
                        message_id: format!("m{i}"),
                        url: None,
                        mime_type: None,
                    })
                    .collect(),
                resolved: Vec::new(),
                caption: caption.map(str::to_string),
            },
            album_id: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn renders_image_marker_with_caption() {
        assert_eq!(
            render_user_message(&image_message(Some("Cartera de cuero, 50000"), 1), None),
            "[image x1] Cartera de cuero, 50000"
        );
        assert_eq!(render_user_message(&image_message(None, 3), None), "[image x3]");
    }

    #[test]
    fn renders_audio_transcription() {
        let msg = InboundMessage {
            content: MessageContent::Audio {
                media: MediaAttachment {
                    message_id: "a".into(),
                    url: None,
                    mime_type: None,
                },
            },
            ..image_message(None, 1)
        };
        assert_eq!(
            render_user_message(&msg, Some("subí el precio")),
            "[audio, transcription: subí el precio]"
        );
    }

    #[test]
    fn history_is_bounded() {
        let now = Utc::now();
        let history: Vec<HistoryEntry> = (0..15)
            .map(|i| HistoryEntry::new(Role::User, format!("m{i}"), now))
            .collect();
        let window = history_window(&history, 10);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "m5");
        assert_eq!(history_window(&history[..3], 10).len(), 3);
    }

    #[test]
    fn summary_lists_search_results_one_based() {
        let mut session = ConversationSession::new("tienda", "549111", Utc::now());
        session.state = SessionState::Selecting;
        session.search_results = vec![
            SearchResult {
                id: 10,
                title: "Cartera".into(),
                price: 50000.0,
                stock: 2,
                state: Default::default(),
            },
            SearchResult {
                id: 11,
                title: "Billetera".into(),
                price: 12000.0,
                stock: 5,
                state: Default::default(),
            },
        ];
        session.pending_action = Some(PendingAction::Delete);
        let prompt = build_system_prompt(&session, &[]);
        assert!(prompt.contains("Estado: selecting"));
        assert!(prompt.contains("1. Cartera ($50.000, stock 2)"));
        assert!(prompt.contains("2. Billetera"));
        assert!(prompt.contains("Pendiente: eliminar"));
    }

    #[test]
    fn tone_is_mirrored() {
        let mut session = ConversationSession::new("tienda", "549111", Utc::now());
        session.user_tone = Tone::Formal;
        assert!(build_system_prompt(&session, &[]).contains("de usted"));
    }
}
