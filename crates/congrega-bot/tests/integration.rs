//! End-to-end pipeline tests: inbound message → router → handlers →
//! stores, with an in-memory database and a recording message sink.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use congrega_bot::handlers::BotContext;
use congrega_bot::{EventBus, IntentRouter};
use congrega_classifier::IntentClassifier;
use congrega_core::{ConversationState, Role};
use congrega_gateway::{GatewayResult, InboundMessage, MessageSink};
use congrega_store::{
    AttendanceStore, ConversationStore, Database, ProgramStore, UserStore,
};

// ── mock sink ────────────────────────────────────────────────────────

/// Records every outbound message instead of calling Chatwoot.
#[derive(Default)]
struct MockSink {
    sent: Mutex<Vec<(i64, String)>>,
}

impl MockSink {
    fn all(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn last(&self) -> String {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|(_, text)| text.clone())
            .unwrap_or_default()
    }

    fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessageSink for MockSink {
    async fn send_message(&self, conversation_id: i64, content: &str) -> GatewayResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id, content.to_string()));
        Ok(())
    }

    async fn send_messages(&self, conversation_id: i64, contents: &[String]) -> GatewayResult<()> {
        for content in contents {
            self.send_message(conversation_id, content).await?;
        }
        Ok(())
    }

    async fn toggle_typing(&self, _conversation_id: i64, _on: bool) -> GatewayResult<()> {
        Ok(())
    }

    async fn resolve_conversation(
        &self,
        _phone: &str,
        _name: Option<&str>,
    ) -> GatewayResult<Option<i64>> {
        Ok(Some(999))
    }
}

// ── harness ──────────────────────────────────────────────────────────

struct Harness {
    db: Database,
    router: IntentRouter,
    sink: Arc<MockSink>,
    conversations: ConversationStore,
    users: UserStore,
    events: EventBus,
}

async fn harness() -> Harness {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();

    let sink = Arc::new(MockSink::default());
    let events = EventBus::default();

    let ctx = Arc::new(BotContext {
        conversations: ConversationStore::new(db.clone()),
        users: UserStore::new(db.clone()),
        attendance: AttendanceStore::new(db.clone()),
        programs: ProgramStore::new(db.clone()),
        sink: Arc::clone(&sink) as Arc<dyn MessageSink>,
        events: events.clone(),
    });

    Harness {
        router: IntentRouter::new(Arc::clone(&ctx), IntentClassifier::from_config(None)),
        conversations: ConversationStore::new(db.clone()),
        users: UserStore::new(db.clone()),
        db,
        sink,
        events,
    }
}

const CALLER_PHONE: &str = "+51987654321";

fn inbound(content: &str) -> InboundMessage {
    InboundMessage {
        conversation_id: 42,
        phone: CALLER_PHONE.to_string(),
        sender_name: Some("Ana".to_string()),
        content: content.to_string(),
    }
}

/// Seed one attendance type + QR. Window "00:00".."23:59" is effectively
/// always open; pass a degenerate window to force rejection.
async fn seed_qr(db: &Database, solo_presencia: bool, active: bool, window: (&str, &str)) {
    let (start, end) = (window.0.to_string(), window.1.to_string());
    db.execute(move |conn| {
        conn.execute(
            "INSERT INTO attendance_types (id, name, solo_presencia, active)
             VALUES ('tipo-1', 'Culto Joven', ?1, 1)",
            rusqlite::params![solo_presencia],
        )?;
        conn.execute(
            "INSERT INTO qr_codes (id, code, type_id, hora_inicio, hora_fin, active)
             VALUES ('qr-1', 'JA-A1B2C3D4', 'tipo-1', ?1, ?2, ?3)",
            rusqlite::params![start, end, active],
        )?;
        Ok(())
    })
    .await
    .unwrap();
}

/// Add a checkbox and a bounded number field to the seeded type.
async fn seed_form_fields(db: &Database) {
    db.execute(|conn| {
        conn.execute_batch(
            "INSERT INTO form_fields
                (id, type_id, name, label, kind, required, min_value, max_value, position, active)
             VALUES
                ('f-1', 'tipo-1', 'trajo_biblia', '¿Trajiste tu Biblia?', 'checkbox', 1, NULL, NULL, 1, 1),
                ('f-2', 'tipo-1', 'capitulos', '¿Cuántos capítulos leíste?', 'number', 1, 1, 7, 2, 1);",
        )?;
        Ok(())
    })
    .await
    .unwrap();
}

/// Fetch all attendance records for assertions.
async fn records(db: &Database) -> Vec<(Option<String>, Option<String>, String, String, Value)> {
    db.execute(|conn| {
        let mut stmt = conn.prepare(
            "SELECT user_id, phone, status, method, form_data FROM attendance_records",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (user_id, phone, status, method, form_data) = row?;
            out.push((
                user_id,
                phone,
                status,
                method,
                serde_json::from_str(&form_data)?,
            ));
        }
        Ok(out)
    })
    .await
    .unwrap()
}

async fn state_of(conversations: &ConversationStore, phone: &str) -> ConversationState {
    conversations.get_or_create(phone).await.unwrap().state
}

// ── self registration ────────────────────────────────────────────────

#[tokio::test]
async fn bare_qr_presence_only_registers_and_resets() {
    let h = harness().await;
    seed_qr(&h.db, true, true, ("00:00", "23:59")).await;
    let mut rx = h.events.subscribe();

    h.router.on_message(inbound("JA-A1B2C3D4")).await;

    let records = records(&h.db).await;
    assert_eq!(records.len(), 1);
    let (user_id, phone, status, method, _) = &records[0];
    assert!(user_id.is_none());
    assert_eq!(phone.as_deref(), Some("51987654321"));
    assert_eq!(status, "pendiente_confirmacion");
    assert_eq!(method, "qr_bot");

    assert_eq!(
        state_of(&h.conversations, CALLER_PHONE).await,
        ConversationState::Inicio
    );
    assert!(h.sink.last().contains("Asistencia registrada"));

    let event = rx.try_recv().unwrap();
    assert_eq!(event.qr_code, "JA-A1B2C3D4");
    assert_eq!(event.method, "qr_bot");
}

#[tokio::test]
async fn second_scan_same_week_is_already_registered() {
    let h = harness().await;
    seed_qr(&h.db, true, true, ("00:00", "23:59")).await;

    h.router.on_message(inbound("JA-A1B2C3D4")).await;
    h.sink.clear();
    h.router.on_message(inbound("ja-a1b2c3d4")).await;

    assert_eq!(records(&h.db).await.len(), 1);
    assert!(h.sink.last().contains("Ya tienes registrada"));
}

#[tokio::test]
async fn unknown_inactive_and_closed_qrs_are_rejected() {
    let h = harness().await;
    seed_qr(&h.db, true, true, ("00:00", "23:59")).await;

    // Valid shape, unknown code.
    h.router.on_message(inbound("ZZ-99999999")).await;
    assert!(h.sink.last().contains("no es válido"));

    assert!(records(&h.db).await.is_empty());
    assert_eq!(
        state_of(&h.conversations, CALLER_PHONE).await,
        ConversationState::Inicio
    );
}

#[tokio::test]
async fn inactive_qr_is_rejected() {
    let h = harness().await;
    seed_qr(&h.db, true, false, ("00:00", "23:59")).await;

    h.router.on_message(inbound("JA-A1B2C3D4")).await;

    assert!(h.sink.last().contains("ya no está activo"));
    assert!(records(&h.db).await.is_empty());
}

#[tokio::test]
async fn out_of_window_qr_is_rejected() {
    let h = harness().await;
    // Degenerate window: start == end never admits anyone.
    seed_qr(&h.db, true, true, ("12:00", "12:00")).await;

    h.router.on_message(inbound("JA-A1B2C3D4")).await;

    let reply = h.sink.last();
    assert!(reply.contains("12:00"));
    assert!(records(&h.db).await.is_empty());
    assert_eq!(
        state_of(&h.conversations, CALLER_PHONE).await,
        ConversationState::Inicio
    );
}

// ── form flow ────────────────────────────────────────────────────────

#[tokio::test]
async fn form_flow_validates_advances_and_registers() {
    let h = harness().await;
    seed_qr(&h.db, false, true, ("00:00", "23:59")).await;
    seed_form_fields(&h.db).await;

    // Scanning opens the flow: greeting, instructions, first question.
    h.router.on_message(inbound("JA-A1B2C3D4")).await;
    let opening = h.sink.all();
    assert_eq!(opening.len(), 3);
    assert!(opening[2].1.contains("¿Trajiste tu Biblia?"));
    assert_eq!(
        state_of(&h.conversations, CALLER_PHONE).await,
        ConversationState::FormularioAsistencia
    );

    // Invalid checkbox answer: re-prompt, cursor unchanged.
    h.sink.clear();
    h.router.on_message(inbound("maybe")).await;
    assert!(h.sink.last().contains("sí* o *no"));
    let conv = h.conversations.get_or_create(CALLER_PHONE).await.unwrap();
    assert_eq!(conv.context["cursor"], json!(0));

    // Valid answer advances to the number field.
    h.sink.clear();
    h.router.on_message(inbound("sí")).await;
    assert!(h.sink.last().contains("capítulos"));
    let conv = h.conversations.get_or_create(CALLER_PHONE).await.unwrap();
    assert_eq!(conv.context["cursor"], json!(1));

    // Out-of-range number: rejected with the bound, cursor unchanged.
    h.sink.clear();
    h.router.on_message(inbound("9")).await;
    assert!(h.sink.last().contains("máximo"));
    let conv = h.conversations.get_or_create(CALLER_PHONE).await.unwrap();
    assert_eq!(conv.context["cursor"], json!(1));

    // Final valid answer: record with the typed answers, reset.
    h.sink.clear();
    h.router.on_message(inbound("5")).await;
    let all = records(&h.db).await;
    assert_eq!(all.len(), 1);
    let (_, _, status, method, form_data) = &all[0];
    assert_eq!(status, "pendiente_confirmacion");
    assert_eq!(method, "qr_bot");
    assert_eq!(*form_data, json!({"trajo_biblia": true, "capitulos": 5.0}));

    assert!(h.sink.last().contains("Asistencia registrada"));
    assert_eq!(
        state_of(&h.conversations, CALLER_PHONE).await,
        ConversationState::Inicio
    );
}

#[tokio::test]
async fn corrupted_flow_context_recovers_with_reset() {
    let h = harness().await;

    h.conversations.get_or_create(CALLER_PHONE).await.unwrap();
    h.conversations
        .update(
            CALLER_PHONE,
            congrega_store::ConversationPatch::enter_flow(
                ConversationState::FormularioAsistencia,
                "asistencia",
                json!({"garbage": true}),
            ),
        )
        .await
        .unwrap();

    h.router.on_message(inbound("hola")).await;

    assert!(h.sink.last().contains("Vuelve a enviar el código"));
    assert_eq!(
        state_of(&h.conversations, CALLER_PHONE).await,
        ConversationState::Inicio
    );
}

// ── manual registration ──────────────────────────────────────────────

#[tokio::test]
async fn admin_manual_registration_with_single_fuzzy_match() {
    let h = harness().await;
    seed_qr(&h.db, true, true, ("00:00", "23:59")).await;
    h.users
        .create("Ana Torres", Some(CALLER_PHONE), Role::Admin)
        .await
        .unwrap();
    let juan = h
        .users
        .create("Juan Pérez", Some("51911111111"), Role::Participante)
        .await
        .unwrap();

    h.router
        .on_message(inbound("registrar asistencia de Juan en JA-A1B2C3D4"))
        .await;

    let all = records(&h.db).await;
    assert_eq!(all.len(), 1);
    let (user_id, _, status, method, _) = &all[0];
    assert_eq!(user_id.as_deref(), Some(juan.id.as_str()));
    assert_eq!(status, "confirmado");
    assert_eq!(method, "manual");

    assert!(h.sink.last().contains("Juan Pérez"));
}

#[tokio::test]
async fn ambiguous_manual_subject_aborts_without_a_record() {
    let h = harness().await;
    seed_qr(&h.db, true, true, ("00:00", "23:59")).await;
    h.users
        .create("Ana Torres", Some(CALLER_PHONE), Role::Lider)
        .await
        .unwrap();
    h.users
        .create("Juan Pérez", Some("51911111111"), Role::Participante)
        .await
        .unwrap();
    h.users
        .create("Juan Díaz", None, Role::Participante)
        .await
        .unwrap();

    h.router
        .on_message(inbound("registrar a Juan en JA-A1B2C3D4"))
        .await;

    assert!(records(&h.db).await.is_empty());
    let reply = h.sink.last();
    assert!(reply.contains("2 personas"));
    assert!(reply.contains("Juan Pérez"));
    assert_eq!(
        state_of(&h.conversations, CALLER_PHONE).await,
        ConversationState::Inicio
    );
}

#[tokio::test]
async fn unmatched_manual_subject_registers_free_text() {
    let h = harness().await;
    seed_qr(&h.db, true, true, ("00:00", "23:59")).await;
    h.users
        .create("Ana Torres", Some(CALLER_PHONE), Role::Admin)
        .await
        .unwrap();

    h.router
        .on_message(inbound("registrar a Visitante Nuevo en JA-A1B2C3D4"))
        .await;

    let all = records(&h.db).await;
    assert_eq!(all.len(), 1);
    let (user_id, phone, status, _, _) = &all[0];
    assert!(user_id.is_none());
    assert!(phone.is_none());
    assert_eq!(status, "confirmado");
}

#[tokio::test]
async fn manual_registration_requires_leader_role() {
    let h = harness().await;
    seed_qr(&h.db, true, true, ("00:00", "23:59")).await;
    h.users
        .create("Ana Torres", Some(CALLER_PHONE), Role::Participante)
        .await
        .unwrap();

    h.router
        .on_message(inbound("registrar a Juan en JA-A1B2C3D4"))
        .await;

    assert!(records(&h.db).await.is_empty());
    assert!(h.sink.last().contains("reservada para líderes"));
}

#[tokio::test]
async fn manual_registration_requires_an_account() {
    let h = harness().await;
    seed_qr(&h.db, true, true, ("00:00", "23:59")).await;

    h.router
        .on_message(inbound("registrar a Juan en JA-A1B2C3D4"))
        .await;

    assert!(records(&h.db).await.is_empty());
    assert!(h.sink.last().contains("No encontré una cuenta"));
}

// ── conversational and program intents ───────────────────────────────

#[tokio::test]
async fn greeting_help_and_unknown() {
    let h = harness().await;

    h.router.on_message(inbound("hola")).await;
    assert!(h.sink.last().contains("¡Hola, Ana!"));

    h.router.on_message(inbound("ayuda")).await;
    assert!(h.sink.last().contains("código QR"));

    h.router.on_message(inbound("qwerty asdf")).await;
    assert!(h.sink.last().contains("No entendí"));
}

#[tokio::test]
async fn leader_pastes_program_then_views_and_assigns() {
    let h = harness().await;
    h.users
        .create("Ana Torres", Some(CALLER_PHONE), Role::Lider)
        .await
        .unwrap();

    let pasted = "Programa JA 15 de agosto\nBienvenida: Ana\nHimno: 254\nMensaje: pendiente";
    h.router.on_message(inbound(pasted)).await;
    let saved = h.sink.last();
    assert!(saved.contains("Programa guardado"));
    assert!(saved.contains("3 parte(s)"));

    h.sink.clear();
    h.router.on_message(inbound("ver programa")).await;
    let rendered = h.sink.last();
    assert!(rendered.contains("Bienvenida: Ana"));
    assert!(rendered.contains("Himno: 254"));

    h.sink.clear();
    h.router
        .on_message(inbound("asignar Mensaje a Pr. Díaz"))
        .await;
    assert!(h.sink.last().contains("asignada a *Pr. Díaz*"));

    h.sink.clear();
    h.router.on_message(inbound("ver programa")).await;
    assert!(h.sink.last().contains("Mensaje: Pr. Díaz"));
}

#[tokio::test]
async fn member_cannot_edit_programs() {
    let h = harness().await;
    h.users
        .create("Ana Torres", Some(CALLER_PHONE), Role::Participante)
        .await
        .unwrap();

    let pasted = "Programa JA\nBienvenida: Ana\nHimno: 254";
    h.router.on_message(inbound(pasted)).await;

    assert!(h.sink.last().contains("reservada para líderes"));
}
