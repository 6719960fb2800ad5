// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Action dispatch: every catalog write and every product card goes out from here.
//!
//! Handlers mutate the session in place and return an [`ActionOutcome`]
//! telling the pipeline what to send and which state to enter. A handler
//! returning [`VitrinaError::InvalidInput`] has not changed anything the
//! operator would notice; the pipeline shows the message and stays put.

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};
use vitrina_core::parse::{format_price, parse_amount};
use vitrina_core::{
    AiProductResult, CatalogAdapter, ConversationSession, EnrichmentAdapter, EnrichmentRequest,
    FieldUpdate, MessagingAdapter, NewProduct, PendingAction, Product, ProductField, ProductFilter,
    ProductPatch, ProductState, SearchResult, SessionState, Tone, VitrinaError,
};

use crate::intent::{Action, DraftData, StructuredIntent, find_category};
use crate::tone::by_tone;

/// What the pipeline does after a handler ran.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ActionOutcome {
    /// Replaces the model's message when set.
    pub reply: Option<String>,
    /// Overrides the model's `next_state` when set.
    pub next_state: Option<SessionState>,
    /// The handler already messaged the user; send nothing else.
    pub already_sent: bool,
    /// Delete the session once the reply is out.
    pub close_session: bool,
}

impl ActionOutcome {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            ..Default::default()
        }
    }

    fn to(mut self, state: SessionState) -> Self {
        self.next_state = Some(state);
        self
    }
}

/// Dispatches classified actions against the catalog and messaging adapters.
pub struct ActionExecutor {
    catalog: Arc<dyn CatalogAdapter>,
    messenger: Arc<dyn MessagingAdapter>,
    enricher: Arc<dyn EnrichmentAdapter>,
    search_limit: usize,
    low_stock_threshold: i64,
}

impl ActionExecutor {
    pub fn new(
        catalog: Arc<dyn CatalogAdapter>,
        messenger: Arc<dyn MessagingAdapter>,
        enricher: Arc<dyn EnrichmentAdapter>,
        search_limit: usize,
        low_stock_threshold: i64,
    ) -> Self {
        Self {
            catalog,
            messenger,
            enricher,
            search_limit,
            low_stock_threshold,
        }
    }

    /// Runs the action carried by `intent`.
    pub async fn execute(
        &self,
        session: &mut ConversationSession,
        intent: &StructuredIntent,
    ) -> Result<ActionOutcome, VitrinaError> {
        debug!(action = intent.action.name(), state = %session.state, "executing action");
        match &intent.action {
            Action::None => Ok(ActionOutcome::default()),
            Action::SaveData(data) => {
                session.product_data.merge(data.clone().into_draft());
                Ok(ActionOutcome::default())
            }
            Action::ProcessAi(data) => self.process_ai(session, data.clone()).await,
            Action::CreateProduct { state } => self.create_product(session, *state).await,
            Action::Cancel => {
                session.reset_draft();
                session.message_history.clear();
                Ok(ActionOutcome::default().to(SessionState::Idle))
            }
            Action::Reset => {
                let mut fresh = ConversationSession::new(
                    session.admin_id.clone(),
                    session.phone.clone(),
                    session.last_activity,
                );
                fresh.user_tone = session.user_tone;
                fresh.greeting_tone = session.greeting_tone;
                fresh.has_greeted = session.has_greeted;
                *session = fresh;
                Ok(ActionOutcome::default().to(SessionState::Idle))
            }
            Action::ShowHelp => Ok(ActionOutcome::reply(help_text(session.user_tone))),
            Action::GetProduct => self.get_product(session).await,
            Action::EndConversation => Ok(ActionOutcome {
                close_session: true,
                ..Default::default()
            }),
            Action::SearchProducts { query, pending } => {
                self.search_products(session, query, pending.clone()).await
            }
            Action::ListAllProducts => {
                let filter = self.filter(session);
                self.list(session, filter, "Estos son tus productos:").await
            }
            Action::ListLowStock { threshold } => {
                let threshold = threshold.unwrap_or(self.low_stock_threshold);
                let filter = ProductFilter {
                    max_stock: Some(threshold),
                    ..self.filter(session)
                };
                let header = format!("Productos con stock bajo (hasta {threshold} unidades):");
                self.list(session, filter, &header).await
            }
            Action::SelectProduct { index } => self.select_product(session, *index).await,
            Action::UpdateProduct(updates) => {
                let product = self.selected_product(session).await?;
                self.apply_updates(session, product, updates).await
            }
            Action::DeleteProduct => {
                let product = self.selected_product(session).await?;
                self.delete(session, product).await
            }
        }
    }

    fn filter(&self, session: &ConversationSession) -> ProductFilter {
        ProductFilter {
            admin_id: session.admin_id.clone(),
            limit: self.search_limit,
            ..Default::default()
        }
    }

    // --- Draft ---

    async fn enrich_draft(
        &self,
        session: &mut ConversationSession,
    ) -> Result<AiProductResult, VitrinaError> {
        let draft = &session.product_data;
        if draft.images.is_empty() {
            return Err(VitrinaError::InvalidInput(
                by_tone(
                    session.user_tone,
                    "Necesito al menos una foto del producto. ¿Me la envía?",
                    "Necesito al menos una foto del producto. ¿Me la mandás?",
                )
                .to_string(),
            ));
        }
        let categories = self.catalog.list_categories(&session.admin_id).await?;
        let request = EnrichmentRequest {
            images: draft.images.clone(),
            price: draft.price,
            additional_context: draft.additional_context.clone(),
            categories: categories.iter().map(|c| c.title.clone()).collect(),
        };
        let ai = self.enricher.enrich(&request).await?;
        info!(images = request.images.len(), "draft enriched");

        let draft = &mut session.product_data;
        if draft.price.is_none() {
            draft.price = ai.price;
        }
        if draft.category_id.is_none()
            && let Some(name) = &ai.category_name
        {
            draft.category_id = find_category(&categories, name).map(|c| c.id);
        }
        draft.ai_result = Some(ai.clone());
        Ok(ai)
    }

    async fn process_ai(
        &self,
        session: &mut ConversationSession,
        data: DraftData,
    ) -> Result<ActionOutcome, VitrinaError> {
        session.product_data.merge(data.into_draft());
        let ai = self.enrich_draft(session).await?;
        let summary = self.review_summary(session, &ai).await;
        self.messenger.send_text(&session.phone, &summary).await?;
        Ok(ActionOutcome {
            already_sent: true,
            ..Default::default()
        }
        .to(SessionState::Reviewing))
    }

    async fn review_summary(&self, session: &ConversationSession, ai: &AiProductResult) -> String {
        let draft = &session.product_data;
        let mut out = format!("*{}*\n{}\n", ai.title, ai.description);
        match draft.price {
            Some(price) => {
                let _ = write!(out, "\nPrecio: {}", format_price(price));
            }
            None => out.push_str("\nPrecio: sin definir"),
        }
        let _ = write!(out, "\nStock: {}", draft.stock.unwrap_or(1));
        if let Some(id) = draft.category_id
            && let Ok(categories) = self.catalog.list_categories(&session.admin_id).await
            && let Some(category) = categories.iter().find(|c| c.id == id)
        {
            let _ = write!(out, "\nCategoría: {}", category.title);
        }
        out.push_str("\n\n");
        out.push_str(by_tone(
            session.user_tone,
            "¿Lo publico así? Puede pedirme cambios o guardarlo como borrador.",
            "¿Lo publico así? Podés pedirme cambios o guardarlo como borrador.",
        ));
        out
    }

    async fn create_product(
        &self,
        session: &mut ConversationSession,
        state: ProductState,
    ) -> Result<ActionOutcome, VitrinaError> {
        let ai = match session.product_data.ai_result.clone() {
            Some(ai) => ai,
            None => self.enrich_draft(session).await?,
        };
        let tone = session.user_tone;
        let Some(price) = session.product_data.price.filter(|p| *p > 0.0) else {
            return Err(VitrinaError::InvalidInput(
                by_tone(tone, "¿A qué precio lo publico?", "¿A qué precio lo publico? Pasame el valor.")
                    .to_string(),
            ));
        };

        if session.product_data.category_id.is_none() && !session.category_prompt_shown {
            let categories = self.catalog.list_categories(&session.admin_id).await?;
            if !categories.is_empty() {
                session.category_prompt_shown = true;
                let names: Vec<&str> = categories.iter().map(|c| c.title.as_str()).collect();
                let question = by_tone(
                    tone,
                    "¿En qué categoría lo ubico? Si prefiere, lo publico sin categoría.",
                    "¿En qué categoría lo pongo? Si querés, lo publico sin categoría.",
                );
                return Ok(ActionOutcome::reply(format!(
                    "{question}\nCategorías: {}",
                    names.join(", ")
                ))
                .to(SessionState::Reviewing));
            }
        }

        let draft = &session.product_data;
        let product = self
            .catalog
            .create_product(NewProduct {
                admin_id: session.admin_id.clone(),
                title: ai.title,
                description: ai.description,
                price,
                stock: draft.stock.unwrap_or(1),
                category_id: draft.category_id,
                images: draft.images.clone(),
                state,
            })
            .await?;
        info!(product_id = product.id, state = %product.state, "product created");

        session.reset_draft();
        let reply = match product.state {
            ProductState::Draft => format!("Guardé \"{}\" como borrador.", product.title),
            _ => format!(
                "¡Listo! Publiqué \"{}\" a {}.",
                product.title,
                format_price(product.price)
            ),
        };
        Ok(ActionOutcome::reply(reply).to(SessionState::Idle))
    }

    // --- Catalog browsing ---

    async fn search_products(
        &self,
        session: &mut ConversationSession,
        query: &str,
        pending: Option<PendingAction>,
    ) -> Result<ActionOutcome, VitrinaError> {
        let mut products = self
            .catalog
            .find_products(&ProductFilter {
                query: Some(query.to_string()),
                ..self.filter(session)
            })
            .await?;
        if products.is_empty()
            && let Some(category) = self
                .catalog
                .find_category_by_title(&session.admin_id, query)
                .await?
        {
            products = self
                .catalog
                .find_products(&ProductFilter {
                    category_id: Some(category.id),
                    ..self.filter(session)
                })
                .await?;
        }
        debug!(query, results = products.len(), "product search");

        if products.is_empty() {
            session.clear_selection();
            return Ok(ActionOutcome::reply(format!(
                "No encontré productos que coincidan con \"{query}\"."
            ))
            .to(SessionState::Idle));
        }

        let exact = products
            .iter()
            .position(|p| p.title.trim().eq_ignore_ascii_case(query.trim()));
        if products.len() == 1 || exact.is_some() {
            let product = products.swap_remove(exact.unwrap_or(0));
            return self.focus(session, product, pending).await;
        }

        session.pending_action = pending;
        self.present_list(session, &products, "Encontré estos productos:")
    }

    async fn list(
        &self,
        session: &mut ConversationSession,
        filter: ProductFilter,
        header: &str,
    ) -> Result<ActionOutcome, VitrinaError> {
        let products = self.catalog.find_products(&filter).await?;
        if products.is_empty() {
            session.clear_selection();
            return Ok(ActionOutcome::reply("No hay productos para mostrar.").to(SessionState::Idle));
        }
        session.pending_action = None;
        self.present_list(session, &products, header)
    }

    fn present_list(
        &self,
        session: &mut ConversationSession,
        products: &[Product],
        header: &str,
    ) -> Result<ActionOutcome, VitrinaError> {
        session.selected_product_id = None;
        session.search_results = products.iter().map(SearchResult::from).collect();
        let mut out = format!("{header}\n");
        for (i, r) in session.search_results.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} - {} (stock {})",
                i + 1,
                r.title,
                format_price(r.price),
                r.stock
            );
        }
        out.push_str(by_tone(
            session.user_tone,
            "Indíqueme el número del producto.",
            "Decime el número del producto.",
        ));
        Ok(ActionOutcome::reply(out).to(SessionState::Selecting))
    }

    async fn select_product(
        &self,
        session: &mut ConversationSession,
        index: i64,
    ) -> Result<ActionOutcome, VitrinaError> {
        let count = session.search_results.len();
        if count == 0 {
            return Err(VitrinaError::InvalidInput(
                "No tengo una lista para elegir. Decime qué producto buscás.".to_string(),
            ));
        }
        let Some(result) = usize::try_from(index)
            .ok()
            .filter(|i| (1..=count).contains(i))
            .map(|i| &session.search_results[i - 1])
        else {
            return Err(VitrinaError::InvalidInput(format!(
                "Elegí un número entre 1 y {count}."
            )));
        };
        let id = result.id;
        let product = self
            .catalog
            .get_product(&session.admin_id, id)
            .await?
            .filter(|p| p.state != ProductState::Deleted)
            .ok_or_else(|| {
                VitrinaError::InvalidInput("Ese producto ya no está disponible.".to_string())
            })?;
        let pending = session.pending_action.take();
        self.focus(session, product, pending).await
    }

    /// Selects `product`, shows it, and runs any deferred mutation.
    async fn focus(
        &self,
        session: &mut ConversationSession,
        product: Product,
        pending: Option<PendingAction>,
    ) -> Result<ActionOutcome, VitrinaError> {
        session.search_results.clear();
        session.pending_action = None;
        session.selected_product_id = Some(product.id);
        self.send_card(&session.phone, &product).await?;

        match pending {
            Some(PendingAction::Update(updates)) => {
                self.apply_updates(session, product, &updates).await
            }
            Some(PendingAction::Delete) => self.delete(session, product).await,
            None => Ok(ActionOutcome::reply(by_tone(
                session.user_tone,
                "¿Qué desea modificar?",
                "¿Qué querés cambiar?",
            ))
            .to(SessionState::Editing)),
        }
    }

    async fn get_product(&self, session: &mut ConversationSession) -> Result<ActionOutcome, VitrinaError> {
        let product = self.selected_product(session).await?;
        self.send_card(&session.phone, &product).await?;
        Ok(ActionOutcome {
            already_sent: true,
            ..Default::default()
        }
        .to(SessionState::Editing))
    }

    async fn selected_product(&self, session: &ConversationSession) -> Result<Product, VitrinaError> {
        let Some(id) = session.selected_product_id else {
            return Err(VitrinaError::InvalidInput(
                "Primero decime qué producto, así lo busco.".to_string(),
            ));
        };
        self.catalog
            .get_product(&session.admin_id, id)
            .await?
            .filter(|p| p.state != ProductState::Deleted)
            .ok_or_else(|| VitrinaError::InvalidInput("Ese producto ya no está disponible.".to_string()))
    }

    async fn send_card(&self, phone: &str, product: &Product) -> Result<(), VitrinaError> {
        let caption = product_card(product);
        match product.images.first() {
            Some(url) => self.messenger.send_image(phone, url, Some(&caption)).await,
            None => self.messenger.send_text(phone, &caption).await,
        }
    }

    // --- Mutations ---

    async fn apply_updates(
        &self,
        session: &mut ConversationSession,
        product: Product,
        updates: &[FieldUpdate],
    ) -> Result<ActionOutcome, VitrinaError> {
        let mut patch = ProductPatch::default();
        for update in updates {
            let value = if update.regenerate_with_ai {
                self.enricher
                    .regenerate_field(&product, update.field, update.value.as_deref())
                    .await?
            } else {
                update.value.clone().ok_or_else(|| {
                    VitrinaError::InvalidInput(format!("¿Cuál es el nuevo valor de {}?", field_label(update.field)))
                })?
            };
            self.patch_field(&session.admin_id, &mut patch, update.field, value.trim())
                .await?;
        }
        if patch.is_empty() {
            return Err(VitrinaError::InvalidInput("No entendí qué cambiar.".to_string()));
        }

        let updated = self
            .catalog
            .update_product(&session.admin_id, product.id, patch)
            .await?;
        info!(product_id = updated.id, fields = updates.len(), "product updated");

        session.selected_product_id = Some(updated.id);
        let fields: Vec<&str> = updates.iter().map(|u| field_label(u.field)).collect();
        Ok(ActionOutcome::reply(format!(
            "Actualicé {}.\n\n{}",
            fields.join(", "),
            product_card(&updated)
        ))
        .to(SessionState::Editing))
    }

    async fn patch_field(
        &self,
        admin_id: &str,
        patch: &mut ProductPatch,
        field: ProductField,
        value: &str,
    ) -> Result<(), VitrinaError> {
        if value.is_empty() {
            return Err(VitrinaError::InvalidInput(format!(
                "¿Cuál es el nuevo valor de {}?",
                field_label(field)
            )));
        }
        match field {
            ProductField::Title => patch.title = Some(value.to_string()),
            ProductField::Description => patch.description = Some(value.to_string()),
            ProductField::Price => {
                let price = parse_amount(value).filter(|p| *p > 0.0).ok_or_else(|| {
                    VitrinaError::InvalidInput(format!("No entendí el precio \"{value}\"."))
                })?;
                patch.price = Some(price);
            }
            ProductField::Stock => {
                let stock = parse_amount(value)
                    .filter(|s| *s >= 0.0 && s.fract() == 0.0)
                    .ok_or_else(|| {
                        VitrinaError::InvalidInput(format!("El stock tiene que ser un número entero, no \"{value}\"."))
                    })?;
                patch.stock = Some(stock as i64);
            }
            ProductField::Category => {
                let Some(category) = self.catalog.find_category_by_title(admin_id, value).await? else {
                    let names: Vec<String> = self
                        .catalog
                        .list_categories(admin_id)
                        .await?
                        .into_iter()
                        .map(|c| c.title)
                        .collect();
                    return Err(VitrinaError::InvalidInput(format!(
                        "No existe la categoría \"{value}\". Las categorías de la tienda son: {}.",
                        names.join(", ")
                    )));
                };
                patch.category_id = Some(category.id);
            }
            ProductField::State => {
                let state = ProductState::from_str(value)
                    .ok()
                    .filter(|s| *s != ProductState::Deleted)
                    .ok_or_else(|| {
                        VitrinaError::InvalidInput("El estado puede ser activo o borrador.".to_string())
                    })?;
                patch.state = Some(state);
            }
        }
        Ok(())
    }

    async fn delete(
        &self,
        session: &mut ConversationSession,
        product: Product,
    ) -> Result<ActionOutcome, VitrinaError> {
        self.catalog
            .soft_delete_product(&session.admin_id, product.id)
            .await?;
        info!(product_id = product.id, "product deleted");
        session.clear_selection();
        Ok(ActionOutcome::reply(format!("Eliminé \"{}\".", product.title)).to(SessionState::Idle))
    }
}

fn field_label(field: ProductField) -> &'static str {
    match field {
        ProductField::Title => "el título",
        ProductField::Description => "la descripción",
        ProductField::Price => "el precio",
        ProductField::Stock => "el stock",
        ProductField::Category => "la categoría",
        ProductField::State => "el estado",
    }
}

fn state_label(state: ProductState) -> &'static str {
    match state {
        ProductState::Active => "publicado",
        ProductState::Draft => "borrador",
        ProductState::Deleted => "eliminado",
    }
}

/// Caption shown with a product image, or on its own when there is none.
pub fn product_card(product: &Product) -> String {
    format!(
        "*{}*\nPrecio: {}\nStock: {}\nEstado: {}",
        product.title,
        format_price(product.price),
        product.stock,
        state_label(product.state)
    )
}

fn help_text(tone: Tone) -> &'static str {
    by_tone(
        tone,
        "Puedo ayudarle con lo siguiente:\n\
         - Publicar un producto: envíeme una o varias fotos con el precio.\n\
         - Buscar: \"buscar carteras\".\n\
         - Ver el inventario: \"mostrar productos\" o \"stock bajo\".\n\
         - Modificar: \"cambiar el precio de la cartera a 45000\".\n\
         - Eliminar: \"eliminar la cartera\".",
        "Esto es lo que puedo hacer:\n\
         - Publicar un producto: mandame una o varias fotos con el precio.\n\
         - Buscar: \"buscar carteras\".\n\
         - Ver el inventario: \"mostrame los productos\" o \"stock bajo\".\n\
         - Modificar: \"cambiá el precio de la cartera a 45000\".\n\
         - Eliminar: \"borrá la cartera\".",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vitrina_test_utils::{MemoryCatalog, MockEnricher, MockMessenger};

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        messenger: Arc<MockMessenger>,
        enricher: Arc<MockEnricher>,
        executor: ActionExecutor,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(MemoryCatalog::with_categories("tienda", &["Accesorios", "Calzado"]));
        let messenger = Arc::new(MockMessenger::new());
        let enricher = Arc::new(MockEnricher::new());
        let executor = ActionExecutor::new(
            catalog.clone(),
            messenger.clone(),
            enricher.clone(),
            10,
            5,
        );
        Fixture {
            catalog,
            messenger,
            enricher,
            executor,
        }
    }

    fn intent(action: Action) -> StructuredIntent {
        StructuredIntent {
            message: "ok".into(),
            action,
            next_state: SessionState::Idle,
        }
    }

    fn session() -> ConversationSession {
        ConversationSession::new("tienda", "549111", Utc::now())
    }

    async fn seed(f: &Fixture, title: &str, stock: i64) -> Product {
        f.catalog
            .create_product(NewProduct {
                admin_id: "tienda".into(),
                title: title.into(),
                description: String::new(),
                price: 1000.0,
                stock,
                category_id: None,
                images: vec![format!("https://cdn.test/{title}.jpg")],
                state: ProductState::Active,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn process_ai_stores_listing_and_moves_to_reviewing() {
        let f = fixture();
        let mut s = session();
        s.state = SessionState::Collecting;
        s.product_data.images.push("https://media.test/a.jpg".into());
        s.product_data.price = Some(50000.0);

        let outcome = f
            .executor
            .execute(
                &mut s,
                &intent(Action::ProcessAi(DraftData {
                    category_name: Some("accesorios".into()),
                    ..Default::default()
                })),
            )
            .await
            .unwrap();
        assert!(outcome.already_sent);
        assert_eq!(outcome.next_state, Some(SessionState::Reviewing));
        assert!(s.product_data.ai_result.is_some());
        assert_eq!(s.product_data.price, Some(50000.0));
        assert_eq!(f.enricher.calls(), 1);
        assert_eq!(f.messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn process_ai_without_images_is_user_error() {
        let f = fixture();
        let mut s = session();
        let err = f
            .executor
            .execute(&mut s, &intent(Action::ProcessAi(DraftData::default())))
            .await
            .unwrap_err();
        assert!(err.is_user_facing());
        assert_eq!(f.enricher.calls(), 0);
    }

    #[tokio::test]
    async fn create_prompts_for_category_once() {
        let f = fixture();
        let mut s = session();
        s.state = SessionState::Reviewing;
        s.product_data.images.push("https://media.test/a.jpg".into());
        s.product_data.price = Some(100.0);
        s.product_data.ai_result = Some(AiProductResult {
            title: "Gorra".into(),
            ..Default::default()
        });

        let create = intent(Action::CreateProduct { state: ProductState::Active });
        let first = f.executor.execute(&mut s, &create).await.unwrap();
        assert_eq!(first.next_state, Some(SessionState::Reviewing));
        assert!(first.reply.unwrap().contains("Accesorios"));
        assert!(f.catalog.products().is_empty());

        let second = f.executor.execute(&mut s, &create).await.unwrap();
        assert_eq!(second.next_state, Some(SessionState::Idle));
        let products = f.catalog.products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].stock, 1);
        assert!(s.product_data.is_empty());
    }

    #[tokio::test]
    async fn create_without_price_asks_for_it() {
        let f = fixture();
        let mut s = session();
        s.product_data.images.push("https://media.test/a.jpg".into());
        s.product_data.ai_result = Some(AiProductResult::default());
        let err = f
            .executor
            .execute(&mut s, &intent(Action::CreateProduct { state: ProductState::Draft }))
            .await
            .unwrap_err();
        assert!(err.is_user_facing());
        assert!(!s.product_data.is_empty());
    }

    #[tokio::test]
    async fn single_result_auto_selects_and_runs_pending() {
        let f = fixture();
        let product = seed(&f, "Cartera de cuero", 3).await;
        let mut s = session();

        let outcome = f
            .executor
            .execute(
                &mut s,
                &intent(Action::SearchProducts {
                    query: "cartera".into(),
                    pending: Some(PendingAction::Update(vec![FieldUpdate {
                        field: ProductField::Price,
                        value: Some("1.500".into()),
                        regenerate_with_ai: false,
                    }])),
                }),
            )
            .await
            .unwrap();
        assert_eq!(outcome.next_state, Some(SessionState::Editing));
        assert_eq!(s.selected_product_id, Some(product.id));
        assert_eq!(f.catalog.products()[0].price, 1500.0);
        assert_eq!(f.messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn exact_title_wins_among_many() {
        let f = fixture();
        seed(&f, "Cartera", 1).await;
        seed(&f, "Cartera grande", 1).await;
        let mut s = session();
        let outcome = f
            .executor
            .execute(
                &mut s,
                &intent(Action::SearchProducts { query: "CARTERA".into(), pending: None }),
            )
            .await
            .unwrap();
        assert_eq!(outcome.next_state, Some(SessionState::Editing));
        assert!(s.search_results.is_empty());
    }

    #[tokio::test]
    async fn several_results_list_then_select() {
        let f = fixture();
        seed(&f, "Cartera negra", 1).await;
        seed(&f, "Cartera marrón", 1).await;
        let mut s = session();
        let outcome = f
            .executor
            .execute(
                &mut s,
                &intent(Action::SearchProducts {
                    query: "cartera".into(),
                    pending: Some(PendingAction::Delete),
                }),
            )
            .await
            .unwrap();
        assert_eq!(outcome.next_state, Some(SessionState::Selecting));
        assert!(outcome.reply.unwrap().contains("2. "));
        s.state = SessionState::Selecting;

        let err = f
            .executor
            .execute(&mut s, &intent(Action::SelectProduct { index: 3 }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Elegí un número entre 1 y 2.");
        assert!(s.selected_product_id.is_none());
        assert_eq!(s.search_results.len(), 2);

        let chosen = s.search_results[1].id;
        let outcome = f
            .executor
            .execute(&mut s, &intent(Action::SelectProduct { index: 2 }))
            .await
            .unwrap();
        assert_eq!(outcome.next_state, Some(SessionState::Idle));
        let deleted = f.catalog.products().into_iter().find(|p| p.id == chosen).unwrap();
        assert_eq!(deleted.state, ProductState::Deleted);
    }

    #[tokio::test]
    async fn update_regenerates_and_resolves_category() {
        let f = fixture();
        let product = seed(&f, "Mate", 2).await;
        let mut s = session();
        s.state = SessionState::Editing;
        s.selected_product_id = Some(product.id);

        f.executor
            .execute(
                &mut s,
                &intent(Action::UpdateProduct(vec![
                    FieldUpdate {
                        field: ProductField::Description,
                        value: Some("más corta".into()),
                        regenerate_with_ai: true,
                    },
                    FieldUpdate {
                        field: ProductField::Category,
                        value: Some("calzado".into()),
                        regenerate_with_ai: false,
                    },
                ])),
            )
            .await
            .unwrap();
        let updated = &f.catalog.products()[0];
        assert_eq!(updated.description, "regenerated description");
        let calzado = f
            .catalog
            .find_category_by_title("tienda", "Calzado")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.category_id, Some(calzado.id));
    }

    #[tokio::test]
    async fn unknown_category_is_never_created() {
        let f = fixture();
        let product = seed(&f, "Mate", 2).await;
        let mut s = session();
        s.state = SessionState::Editing;
        s.selected_product_id = Some(product.id);

        let err = f
            .executor
            .execute(
                &mut s,
                &intent(Action::UpdateProduct(vec![FieldUpdate {
                    field: ProductField::Category,
                    value: Some("Acesorios".into()),
                    regenerate_with_ai: false,
                }])),
            )
            .await
            .unwrap_err();
        assert!(err.is_user_facing());
        assert!(err.to_string().contains("Accesorios, Calzado"));
        let titles: Vec<String> = f.catalog.categories().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, ["Accesorios", "Calzado"]);
        assert_eq!(f.catalog.products()[0].category_id, None);
        assert_eq!(f.catalog.writes(), 1);
    }

    #[tokio::test]
    async fn update_without_selection_is_user_error() {
        let f = fixture();
        let mut s = session();
        let err = f
            .executor
            .execute(&mut s, &intent(Action::DeleteProduct))
            .await
            .unwrap_err();
        assert!(err.is_user_facing());
    }

    #[tokio::test]
    async fn low_stock_lists_under_threshold() {
        let f = fixture();
        seed(&f, "Poco", 2).await;
        seed(&f, "Mucho", 40).await;
        seed(&f, "Nada", 0).await;
        let mut s = session();
        let outcome = f
            .executor
            .execute(&mut s, &intent(Action::ListLowStock { threshold: None }))
            .await
            .unwrap();
        assert_eq!(outcome.next_state, Some(SessionState::Selecting));
        assert_eq!(s.search_results.len(), 2);
    }
}
