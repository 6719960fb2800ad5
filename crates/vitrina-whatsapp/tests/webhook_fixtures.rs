// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization of recorded gateway payloads.

use vitrina_core::MessageContent;
use vitrina_whatsapp::normalize_payload;

fn fixture(name: &str) -> serde_json::Value {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    let raw = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn album_batch_yields_one_message_per_image() {
    let messages = normalize_payload(&fixture("album_upsert.json")).unwrap();
    assert_eq!(messages.len(), 2, "album parent carries no content");
    assert!(messages.iter().all(|m| m.album_id.as_deref() == Some("3EB0PARENT")));
    assert_eq!(messages[0].text(), Some("Cartera de cuero, 50000"));
    assert_eq!(messages[1].text(), None);
    assert_eq!(messages[0].phone, "5491122334455");
}

#[test]
fn voice_note_becomes_audio() {
    let messages = normalize_payload(&fixture("voice_note.json")).unwrap();
    assert_eq!(messages.len(), 1);
    match &messages[0].content {
        MessageContent::Audio { media } => {
            assert_eq!(media.message_id, "3EB0VOICE");
            assert_eq!(media.mime_type.as_deref(), Some("audio/ogg; codecs=opus"));
        }
        other => panic!("expected audio, got {other:?}"),
    }
    assert_eq!(messages[0].timestamp.timestamp(), 1760000050);
}
