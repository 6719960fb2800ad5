// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vision-model product enrichment implementing [`EnrichmentAdapter`].

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use vitrina_config::model::InferenceConfig;
use vitrina_core::parse::{extract_json_object, format_price, parse_amount};
use vitrina_core::{
    AdapterType, AiProductResult, EnrichmentAdapter, EnrichmentRequest, HealthStatus,
    PluginAdapter, Product, ProductField, VitrinaError,
};

use crate::client::OpenAiClient;
use crate::types::{ChatContent, ChatMessage, ChatRequest, ContentPart, ImageUrl, ResponseFormat};

const LISTING_PROMPT: &str = "Sos un asistente que redacta publicaciones para una tienda online. \
A partir de las fotos y los datos del vendedor, generá una publicación en español. \
Respondé SOLO con un objeto JSON con las claves: \
\"title\" (máximo 60 caracteres), \"description\" (2 a 4 oraciones, sin inventar materiales \
ni medidas que no se vean o no se mencionen), \"price\" (número o null si no se indicó), \
\"category_name\" (una de las categorías disponibles, o null) y \"tags\" (lista de 3 a 6 palabras clave).";

const FIELD_PROMPT: &str = "Sos un asistente que corrige publicaciones de una tienda online. \
Reescribí únicamente el campo pedido respetando las indicaciones del vendedor. \
Respondé SOLO con un objeto JSON de la forma {\"value\": \"...\"}.";

/// Generates product listings with a vision-capable chat model.
pub struct OpenAiEnricher {
    client: OpenAiClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiEnricher {
    pub fn new(client: OpenAiClient, config: &InferenceConfig) -> Self {
        info!(model = %config.vision_model, "enrichment adapter initialized");
        Self {
            client,
            model: config.vision_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn listing_request(&self, request: &EnrichmentRequest) -> ChatRequest {
        let mut details = Vec::new();
        if let Some(price) = request.price {
            details.push(format!("Precio indicado: {}", format_price(price)));
        }
        if let Some(ctx) = &request.additional_context {
            details.push(format!("Datos del vendedor: {ctx}"));
        }
        if !request.categories.is_empty() {
            details.push(format!(
                "Categorías disponibles: {}",
                request.categories.join(", ")
            ));
        }
        if details.is_empty() {
            details.push("El vendedor no agregó datos.".to_string());
        }

        let mut parts = vec![ContentPart::Text {
            text: details.join("\n"),
        }];
        parts.extend(request.images.iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.clone() },
        }));

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::text("system", LISTING_PROMPT),
                ChatMessage {
                    role: "user".into(),
                    content: ChatContent::Parts(parts),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: Some(ResponseFormat::json_object()),
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiEnricher {
    fn name(&self) -> &str {
        "openai-enrichment"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Enrichment
    }

    async fn health_check(&self) -> Result<HealthStatus, VitrinaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VitrinaError> {
        Ok(())
    }
}

#[async_trait]
impl EnrichmentAdapter for OpenAiEnricher {
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<AiProductResult, VitrinaError> {
        if request.images.is_empty() {
            return Err(VitrinaError::InvalidInput(
                "Necesito al menos una foto del producto para armar la publicación.".into(),
            ));
        }
        let raw = self.client.chat(&self.listing_request(request)).await?;
        let listing = parse_listing(&raw)?;
        debug!(title = %listing.title, "listing generated");
        Ok(listing)
    }

    async fn regenerate_field(
        &self,
        product: &Product,
        field: ProductField,
        instruction: Option<&str>,
    ) -> Result<String, VitrinaError> {
        let user = format!(
            "Producto: {}\nDescripción actual: {}\nPrecio: {}\nCampo a reescribir: {}\nIndicaciones: {}",
            product.title,
            product.description,
            format_price(product.price),
            field_label(field),
            instruction.unwrap_or("mejoralo manteniendo la información"),
        );
        let mut parts = vec![ContentPart::Text { text: user }];
        parts.extend(product.images.iter().take(3).map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.clone() },
        }));
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::text("system", FIELD_PROMPT),
                ChatMessage {
                    role: "user".into(),
                    content: ChatContent::Parts(parts),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: Some(ResponseFormat::json_object()),
        };
        let raw = self.client.chat(&request).await?;
        parse_field_value(&raw)
    }
}

fn field_label(field: ProductField) -> &'static str {
    match field {
        ProductField::Title => "título",
        ProductField::Description => "descripción",
        ProductField::Price => "precio",
        ProductField::Stock => "stock",
        ProductField::Category => "categoría",
        ProductField::State => "estado",
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parses the model's listing reply, tolerating prose around the JSON and
/// prices sent as strings.
pub(crate) fn parse_listing(raw: &str) -> Result<AiProductResult, VitrinaError> {
    let json = extract_json_object(raw).ok_or_else(|| VitrinaError::Provider {
        message: "enrichment reply contained no JSON object".into(),
        source: None,
    })?;
    let value: Value = serde_json::from_str(json)?;

    let title = non_empty_str(&value["title"]).ok_or_else(|| VitrinaError::Provider {
        message: "enrichment reply is missing a title".into(),
        source: None,
    })?;
    let price = match &value["price"] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
    .filter(|p| *p > 0.0);
    let tags = value["tags"]
        .as_array()
        .map(|tags| tags.iter().filter_map(non_empty_str).collect())
        .unwrap_or_default();

    Ok(AiProductResult {
        title,
        description: non_empty_str(&value["description"]).unwrap_or_default(),
        price,
        category_name: non_empty_str(&value["category_name"]),
        tags,
    })
}

pub(crate) fn parse_field_value(raw: &str) -> Result<String, VitrinaError> {
    if let Some(json) = extract_json_object(raw)
        && let Ok(value) = serde_json::from_str::<Value>(json)
    {
        if let Some(text) = non_empty_str(&value["value"]) {
            return Ok(text);
        }
        if let Some(n) = value["value"].as_f64() {
            return Ok(n.to_string());
        }
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VitrinaError::Provider {
            message: "field regeneration returned no content".into(),
            source: None,
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn listing_parses_with_string_price_and_prose() {
        let raw = "Listo:\n{\"title\": \"Cartera de cuero\", \"description\": \"Cartera marrón.\", \
                   \"price\": \"$50.000\", \"category_name\": \"Accesorios\", \"tags\": [\"cuero\", \"\", \"cartera\"]}";
        let listing = parse_listing(raw).unwrap();
        assert_eq!(listing.title, "Cartera de cuero");
        assert_eq!(listing.price, Some(50000.0));
        assert_eq!(listing.category_name.as_deref(), Some("Accesorios"));
        assert_eq!(listing.tags, vec!["cuero".to_string(), "cartera".to_string()]);
    }

    #[test]
    fn listing_without_title_is_error() {
        assert!(parse_listing("{\"description\": \"x\"}").is_err());
        assert!(parse_listing("no sé").is_err());
    }

    #[test]
    fn field_value_falls_back_to_raw_text() {
        assert_eq!(parse_field_value("{\"value\": \"Nuevo título\"}").unwrap(), "Nuevo título");
        assert_eq!(parse_field_value("  Título suelto ").unwrap(), "Título suelto");
        assert!(parse_field_value("   ").is_err());
    }

    #[tokio::test]
    async fn enrich_sends_images_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("https://cdn.example.com/a.jpg"))
            .and(body_string_contains("Accesorios"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content":
                    "{\"title\": \"Cartera\", \"description\": \"De cuero.\", \"price\": 50000, \"category_name\": \"Accesorios\", \"tags\": []}"
                }}]
            })))
            .mount(&server)
            .await;

        let client =
            OpenAiClient::new("k", &server.uri(), Duration::from_secs(5)).unwrap();
        let enricher = OpenAiEnricher::new(client, &InferenceConfig::default());
        let listing = enricher
            .enrich(&EnrichmentRequest {
                images: vec!["https://cdn.example.com/a.jpg".into()],
                price: Some(50000.0),
                additional_context: Some("es de accesorios".into()),
                categories: vec!["Accesorios".into(), "Calzado".into()],
            })
            .await
            .unwrap();
        assert_eq!(listing.title, "Cartera");
        assert_eq!(listing.price, Some(50000.0));
    }

    #[tokio::test]
    async fn enrich_without_images_is_user_error() {
        let client = OpenAiClient::new("k", "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let enricher = OpenAiEnricher::new(client, &InferenceConfig::default());
        let err = enricher.enrich(&EnrichmentRequest::default()).await.unwrap_err();
        assert!(err.is_user_facing());
    }
}
