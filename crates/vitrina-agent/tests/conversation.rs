// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end conversation flows over the mock collaborators.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde_json::json;
use tokio::time::Instant;
use vitrina_agent::Route;
use vitrina_core::{
    CatalogAdapter, MessageContent, NewProduct, ProductState, SessionState, Tone,
};
use vitrina_test_utils::harness::{album_image, audio_message, image_message};
use vitrina_test_utils::{TEST_ADMIN, TestHarness};

async fn seed(h: &TestHarness, title: &str) -> i64 {
    h.catalog
        .create_product(NewProduct {
            admin_id: TEST_ADMIN.into(),
            title: title.into(),
            description: String::new(),
            price: 20000.0,
            stock: 3,
            category_id: None,
            images: vec![format!("https://cdn.test/{title}.jpg")],
            state: ProductState::Active,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn publish_product_from_captioned_photo() {
    let h = TestHarness::builder().build();

    // Greeting is answered without a model call.
    assert_eq!(h.send_text("m1", "hola").await.unwrap(), Route::Pipeline);
    assert_eq!(h.inference.call_count(), 0);
    assert_eq!(h.messenger.sent().len(), 1);
    assert_eq!(h.session().await.unwrap().state, SessionState::Idle);

    h.inference.push_intent("¡Linda cartera! ¿Cuántas tenés?", "save_data", json!({}), "collecting");
    h.deliver(image_message("m2", Some("Cartera de cuero, 50000")))
        .await
        .unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Collecting);
    assert_eq!(session.product_data.price, Some(50000.0));
    assert_eq!(session.product_data.images, vec!["https://media.test/m2.jpg".to_string()]);
    assert!(
        h.inference.requests()[0]
            .user_message
            .starts_with("[image x1] Cartera de cuero")
    );

    h.inference.push_intent(
        "Genero la publicación",
        "process_ai",
        json!({"category_name": "accesorios"}),
        "reviewing",
    );
    h.send_text("m3", "es de accesorios").await.unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Reviewing);
    assert!(session.product_data.ai_result.is_some());
    let accesorios = h
        .catalog
        .find_category_by_title(TEST_ADMIN, "Accesorios")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.product_data.category_id, Some(accesorios.id));
    assert_eq!(h.enricher.calls(), 1);
    assert!(h.messenger.last_body().unwrap().contains("Cartera de cuero"));

    h.inference.push_intent("Publicando", "create_product", json!({"state": "active"}), "idle");
    h.send_text("m4", "publicalo").await.unwrap();

    let products = h.catalog.products();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].state, ProductState::Active);
    assert_eq!(products[0].price, 50000.0);
    assert_eq!(products[0].category_id, Some(accesorios.id));
    assert_eq!(products[0].images, vec!["https://media.test/m2.jpg".to_string()]);

    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Idle);
    assert!(session.product_data.is_empty());
    assert!(h.messenger.last_body().unwrap().contains("Publiqué"));
}

#[tokio::test]
async fn duplicate_delivery_is_processed_once() {
    let h = TestHarness::builder().build();
    seed(&h, "Mate imperial").await;
    h.inference.push_intent("Cambio el precio", "search_products",
        json!({"query": "mate", "pending_action": {"action": "update", "updates": [{"field": "price", "value": "25000"}]}}),
        "editing");
    h.inference.push_intent("otra vez", "none", json!({}), "idle");

    assert_eq!(
        h.send_text("wamid.1", "subí el mate a 25000").await.unwrap(),
        Route::Pipeline
    );
    let sent = h.messenger.sent().len();
    let writes = h.catalog.writes();
    assert_eq!(
        h.send_text("wamid.1", "subí el mate a 25000").await.unwrap(),
        Route::Duplicate
    );

    assert_eq!(h.inference.call_count(), 1);
    assert_eq!(h.messenger.sent().len(), sent);
    // One for the seed, one for the price update.
    assert_eq!(writes, 2);
    assert_eq!(h.catalog.writes(), writes);
    assert_eq!(h.catalog.products()[0].price, 25000.0);
}

#[tokio::test(start_paused = true)]
async fn album_burst_becomes_one_message() {
    let h = TestHarness::builder().build();

    let route = h.deliver(album_image("a1", "ALB", None)).await.unwrap();
    assert_eq!(route, Route::Album);
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.deliver(album_image("a2", "ALB", Some("Zapatillas talle 38 a $ 12.500")))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.deliver(album_image("a3", "ALB", None)).await.unwrap();
    let third = Instant::now();

    let album = h.next_album().await.unwrap();
    let waited = third.elapsed();
    assert!(waited >= Duration::from_millis(2000) && waited < Duration::from_millis(2100));
    match &album.content {
        MessageContent::Image { resolved, .. } => assert_eq!(
            resolved,
            &[
                "https://media.test/a1.jpg",
                "https://media.test/a2.jpg",
                "https://media.test/a3.jpg"
            ]
        ),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.inference.call_count(), 0);

    h.inference.push_intent("Anotado", "save_data", json!({"stock": 4}), "collecting");
    assert_eq!(h.deliver(album).await.unwrap(), Route::Pipeline);
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Collecting);
    assert_eq!(session.product_data.images.len(), 3);
    assert_eq!(session.product_data.price, Some(12500.0));
    assert_eq!(session.product_data.stock, Some(4));
    assert!(h.inference.requests()[0].user_message.starts_with("[image x3]"));
}

#[tokio::test]
async fn out_of_range_selection_keeps_state() {
    let h = TestHarness::builder().build();
    seed(&h, "Cartera negra").await;
    seed(&h, "Cartera roja").await;

    h.inference.push_intent("Busco", "search_products", json!({"query": "cartera"}), "selecting");
    h.send_text("m1", "buscá carteras").await.unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Selecting);
    assert_eq!(session.search_results.len(), 2);

    h.inference.push_intent("Elegiste la 5", "select_product", json!({"index": 5}), "editing");
    h.send_text("m2", "la 5").await.unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Selecting);
    assert!(session.selected_product_id.is_none());
    assert_eq!(h.messenger.last_body().unwrap(), "Elegí un número entre 1 y 2.");

    h.inference.push_intent("Elegiste la 0", "select_product", json!({"index": 0}), "editing");
    h.send_text("m3", "la 0").await.unwrap();
    assert_eq!(h.session().await.unwrap().state, SessionState::Selecting);

    h.inference.push_intent("Listo", "select_product", json!({"index": 1}), "editing");
    h.send_text("m4", "la 1").await.unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Editing);
    assert_eq!(session.selected_product_id, Some(session_product(&h, 0)));
    assert!(session.search_results.is_empty());
}

fn session_product(h: &TestHarness, newest_rank: usize) -> i64 {
    let mut products = h.catalog.products();
    products.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
    products[newest_rank].id
}

#[tokio::test]
async fn non_json_reply_preserves_state() {
    let h = TestHarness::builder().build();
    h.inference.push_intent("ok", "save_data", json!({}), "collecting");
    h.deliver(image_message("m1", None)).await.unwrap();
    assert_eq!(h.session().await.unwrap().state, SessionState::Collecting);

    h.inference.push_reply("Perdón, ¿me repetís el precio?");
    h.send_text("m2", "mmm").await.unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Collecting);
    assert_eq!(session.product_data.images.len(), 1);
    assert_eq!(h.messenger.last_body().unwrap(), "Perdón, ¿me repetís el precio?");
}

#[tokio::test]
async fn inference_failure_sends_fallback() {
    let h = TestHarness::builder().build();
    h.inference.push_failure("upstream 503");
    h.send_text("m1", "mostrame el stock").await.unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Idle);
    assert!(h.messenger.last_body().unwrap().contains("problema"));
}

#[tokio::test(start_paused = true)]
async fn slow_inference_times_out_to_fallback() {
    let h = TestHarness::builder()
        .with_config(|c| c.inference.timeout_secs = 5)
        .build();
    h.inference.set_delay(Some(Duration::from_secs(30)));
    h.send_text("m1", "mostrame el stock").await.unwrap();
    assert!(h.messenger.last_body().unwrap().contains("problema"));
}

#[tokio::test]
async fn failed_catalog_write_is_reported_and_recorded() {
    let h = TestHarness::builder().build();
    let id = seed(&h, "Mate").await;
    h.inference.push_intent("Busco", "search_products", json!({"query": "mate"}), "editing");
    h.send_text("m1", "el mate").await.unwrap();
    assert_eq!(h.session().await.unwrap().selected_product_id, Some(id));

    h.catalog.set_fail_writes(true);
    h.inference.push_intent("Elimino", "delete_product", json!({}), "idle");
    h.send_text("m2", "borralo").await.unwrap();

    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Editing);
    assert!(session.last_error.is_some());
    assert!(h.messenger.last_body().unwrap().contains("no pude"));
    assert_eq!(h.catalog.products()[0].state, ProductState::Active);
}

#[tokio::test]
async fn greeting_mid_flow_starts_over() {
    let h = TestHarness::builder().build();
    h.inference.push_intent("ok", "save_data", json!({}), "collecting");
    h.deliver(image_message("m1", Some("Gorra 8000"))).await.unwrap();
    assert!(!h.session().await.unwrap().product_data.is_empty());

    h.send_text("m2", "Buenos días").await.unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Idle);
    assert!(session.product_data.is_empty());
    assert_eq!(session.greeting_tone, Some(Tone::Formal));
    assert!(h.messenger.last_body().unwrap().contains("ayudarle"));
}

#[tokio::test]
async fn voice_note_is_transcribed_or_refused() {
    let h = TestHarness::builder().build();
    h.send_text("m0", "hola").await.unwrap();

    h.inference.set_transcription(None);
    h.deliver(audio_message("v1")).await.unwrap();
    assert_eq!(h.inference.call_count(), 0);
    assert!(h.messenger.last_body().unwrap().contains("audio"));

    h.inference.set_transcription(Some("buscá las zapatillas"));
    h.inference.push_intent("No encontré", "none", json!({}), "idle");
    h.deliver(audio_message("v2")).await.unwrap();
    assert_eq!(
        h.inference.requests()[0].user_message,
        "[audio, transcription: buscá las zapatillas]"
    );
}

#[tokio::test]
async fn end_conversation_deletes_session() {
    let h = TestHarness::builder().build();
    h.inference.push_intent("¡Chau!", "end_conversation", json!({}), "idle");
    h.send_text("m1", "nada más, gracias").await.unwrap();
    assert!(h.session().await.is_none());
    assert_eq!(h.messenger.last_body().unwrap(), "¡Chau!");
}

#[tokio::test]
async fn inactivity_warns_then_closes() {
    let h = TestHarness::builder().build();
    h.inference.push_intent("ok", "save_data", json!({}), "collecting");
    h.deliver(image_message("m1", None)).await.unwrap();
    let worker = h.timeout_worker();
    let warn_after = i64::try_from(h.config.timeout.warn_after_secs).unwrap();
    let close_after = i64::try_from(h.config.timeout.close_after_secs).unwrap();
    let sent_before = h.messenger.sent().len();

    let t_warn = Utc::now() + TimeDelta::seconds(warn_after + 1);
    assert_eq!(worker.sweep_at(t_warn).await.unwrap().warned, 1);
    assert_eq!(worker.sweep_at(t_warn + TimeDelta::seconds(1)).await.unwrap().warned, 0);
    assert_eq!(h.messenger.sent().len(), sent_before + 1);

    // Any inbound message clears the warning, so the close never fires.
    h.inference.push_intent("sigo", "none", json!({}), "collecting");
    h.send_text("m2", "sigo acá").await.unwrap();
    let t_close = t_warn + TimeDelta::seconds(close_after + 1);
    let report = worker.sweep_at(t_close).await.unwrap();
    assert_eq!(report.closed, 0);
    assert_eq!(report.warned, 1);
    assert!(h.session().await.is_some());

    // The fresh warning goes unanswered.
    let closed = worker
        .sweep_at(t_close + TimeDelta::seconds(close_after))
        .await
        .unwrap();
    assert_eq!(closed.closed, 1);
    assert!(h.session().await.is_none());
}

#[tokio::test]
async fn search_without_query_asks_instead_of_advancing() {
    let h = TestHarness::builder().build();
    h.inference.push_intent("Busco eso", "search_products", json!({}), "searching");
    h.send_text("m1", "buscá").await.unwrap();

    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Idle);
    assert_eq!(h.messenger.last_body().unwrap(), "¿Qué producto querés buscar?");
    assert_eq!(h.catalog.writes(), 0);
}

#[tokio::test]
async fn cancel_discards_draft_and_history() {
    let h = TestHarness::builder().build();
    h.inference.push_intent("Anotado", "save_data", json!({"stock": 2}), "collecting");
    h.deliver(image_message("m1", Some("Gorra 8000"))).await.unwrap();
    assert_eq!(h.session().await.unwrap().product_data.stock, Some(2));

    h.inference.push_intent("Listo, lo descarto", "cancel", json!({}), "collecting");
    h.send_text("m2", "cancelá todo").await.unwrap();

    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Idle);
    assert!(session.product_data.is_empty());
    assert_eq!(session.message_history.len(), 1);
    assert_eq!(session.message_history[0].content, "Listo, lo descarto");
    assert_eq!(h.catalog.writes(), 0);
}

#[tokio::test]
async fn reset_clears_selection_but_keeps_tone() {
    let h = TestHarness::builder().build();
    seed(&h, "Cartera negra").await;
    seed(&h, "Cartera roja").await;

    h.inference.push_intent(
        "Busco",
        "search_products",
        json!({"query": "cartera", "pending_action": {"action": "delete"}}),
        "selecting",
    );
    h.send_text("m1", "che, borrá la cartera").await.unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Selecting);
    assert!(session.pending_action.is_some());
    assert_eq!(session.user_tone, Tone::Informal);

    h.inference.push_intent("Empezamos de nuevo", "reset", json!({}), "selecting");
    h.send_text("m2", "mejor empecemos de nuevo").await.unwrap();

    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Idle);
    assert!(session.search_results.is_empty());
    assert!(session.pending_action.is_none());
    assert!(session.selected_product_id.is_none());
    assert_eq!(session.user_tone, Tone::Informal);
    assert_eq!(session.message_history.len(), 1);
    assert!(h.catalog.products().iter().all(|p| p.state == ProductState::Active));
}

#[tokio::test]
async fn get_product_resends_the_card() {
    let h = TestHarness::builder().build();
    let id = seed(&h, "Mate").await;
    h.inference.push_intent("Busco", "search_products", json!({"query": "mate"}), "editing");
    h.send_text("m1", "el mate").await.unwrap();
    let sent = h.messenger.sent().len();

    h.inference.push_intent("Acá está", "get_product", json!({}), "idle");
    h.send_text("m2", "mostrámelo").await.unwrap();

    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Editing);
    assert_eq!(session.selected_product_id, Some(id));
    let messages = h.messenger.sent();
    assert_eq!(messages.len(), sent + 1);
    let card = messages.last().unwrap();
    assert_eq!(card.image_url.as_deref(), Some("https://cdn.test/Mate.jpg"));
    assert!(card.body.starts_with("*Mate*"));
}

#[tokio::test]
async fn list_all_products_offers_numbered_choice() {
    let h = TestHarness::builder().build();
    seed(&h, "Mate").await;
    seed(&h, "Bombilla").await;

    h.inference.push_intent("Tus productos", "list_all_products", json!({}), "idle");
    h.send_text("m1", "mostrame todo").await.unwrap();

    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Selecting);
    assert_eq!(session.search_results.len(), 2);
    let body = h.messenger.last_body().unwrap();
    assert!(body.starts_with("Estos son tus productos:"));
    assert!(body.contains("1. Bombilla"));
    assert!(body.contains("2. Mate"));
}

#[tokio::test]
async fn show_help_lists_capabilities() {
    let h = TestHarness::builder().build();
    h.inference.push_intent("Te ayudo", "show_help", json!({}), "idle");
    h.send_text("m1", "¿qué sabés hacer?").await.unwrap();

    assert_eq!(h.session().await.unwrap().state, SessionState::Idle);
    let body = h.messenger.last_body().unwrap();
    assert!(body.contains("Publicar un producto"));
    assert!(body.contains("Eliminar"));
}

#[tokio::test]
async fn greeting_caption_keeps_the_draft() {
    let h = TestHarness::builder().build();
    h.inference.push_intent("ok", "save_data", json!({}), "collecting");
    h.deliver(image_message("m1", Some("Gorra 8000"))).await.unwrap();

    h.inference.push_intent("Otra foto, perfecto", "save_data", json!({}), "collecting");
    h.deliver(image_message("m2", Some("hola"))).await.unwrap();

    assert_eq!(h.inference.call_count(), 2);
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Collecting);
    assert_eq!(session.product_data.images.len(), 2);
    assert_eq!(session.product_data.price, Some(8000.0));
    assert!(session.greeting_tone.is_none());
    assert_eq!(h.messenger.last_body().unwrap(), "Otra foto, perfecto");
}

#[tokio::test]
async fn photo_added_during_review_regenerates_listing() {
    let h = TestHarness::builder().build();
    h.inference.push_intent("ok", "save_data", json!({}), "collecting");
    h.deliver(image_message("m1", Some("Cartera de cuero, 50000")))
        .await
        .unwrap();
    h.inference.push_intent("Genero", "process_ai", json!({}), "reviewing");
    h.send_text("m2", "generala").await.unwrap();
    assert_eq!(h.session().await.unwrap().state, SessionState::Reviewing);
    assert_eq!(h.enricher.calls(), 1);

    h.inference.push_intent("Sumé la foto", "none", json!({}), "reviewing");
    h.deliver(image_message("m3", None)).await.unwrap();
    let session = h.session().await.unwrap();
    assert_eq!(session.state, SessionState::Collecting);
    assert!(session.product_data.ai_result.is_none());
    assert_eq!(session.product_data.images.len(), 2);

    h.inference.push_intent("Publicando", "create_product", json!({"state": "active"}), "idle");
    h.send_text("m4", "publicalo").await.unwrap();

    assert_eq!(h.enricher.calls(), 2);
    assert_eq!(h.enricher.last_request().unwrap().images.len(), 2);
    let products = h.catalog.products();
    assert_eq!(products.len(), 1);
    assert_eq!(
        products[0].images,
        ["https://media.test/m1.jpg", "https://media.test/m3.jpg"]
    );
}
