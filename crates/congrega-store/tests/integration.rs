//! Cross-store integration tests against a real (temp-file) database.

use congrega_core::{ConversationState, Role};
use congrega_store::{
    AttendanceStore, ConversationPatch, ConversationStore, Database, NewAttendanceRecord,
    ProgramStore, RecordIdentity, RecordStatus, RegistrationMethod, UserStore,
};
use serde_json::json;
use tempfile::TempDir;

async fn open_temp_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("congrega.db");
    let db = Database::open_and_migrate(path).await.unwrap();
    (dir, db)
}

#[tokio::test]
async fn full_registration_round_trip_on_disk() {
    let (_dir, db) = open_temp_db().await;

    let users = UserStore::new(db.clone());
    let conversations = ConversationStore::new(db.clone());
    let attendance = AttendanceStore::new(db.clone());

    // Seed a member and a presence-only QR session.
    let user = users
        .create("Ana Torres", Some("51987654321"), Role::Participante)
        .await
        .unwrap();
    db.execute(|conn| {
        conn.execute_batch(
            "INSERT INTO attendance_types (id, name, solo_presencia, active)
             VALUES ('tipo-1', 'Culto Joven', 1, 1);
             INSERT INTO qr_codes (id, code, type_id, hora_inicio, hora_fin, active)
             VALUES ('qr-1', 'JA-A1B2C3D4', 'tipo-1', '09:00', '12:00', 1);",
        )?;
        Ok(())
    })
    .await
    .unwrap();

    // Inbound message creates the conversation; the QR resolves.
    let conv = conversations.get_or_create("+51 987 654 321").await.unwrap();
    assert_eq!(conv.state, ConversationState::Inicio);
    let qr = attendance.find_qr("JA-A1B2C3D4").await.unwrap().unwrap();
    assert!(qr.solo_presencia);

    // Register, then hit the weekly duplicate guard.
    let record = NewAttendanceRecord {
        type_id: qr.type_id.clone(),
        week_start: "2026-08-03".into(),
        identity: RecordIdentity::User(user.id.clone()),
        status: RecordStatus::PendienteConfirmacion,
        method: RegistrationMethod::QrBot,
        form_data: json!({}),
        registered_by: None,
    };
    attendance.create_record(record.clone()).await.unwrap();
    assert!(attendance.create_record(record).await.is_err());

    // The conversation survives a flow round trip.
    conversations
        .update(
            "51987654321",
            ConversationPatch::enter_flow(
                ConversationState::FormularioAsistencia,
                "asistencia",
                json!({"cursor": 0}),
            ),
        )
        .await
        .unwrap();
    conversations.reset("51987654321").await.unwrap();
    let conv = conversations.get_or_create("51987654321").await.unwrap();
    assert_eq!(conv.state, ConversationState::Inicio);
    assert_eq!(conv.context, json!({}));
}

#[tokio::test]
async fn programs_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("congrega.db");

    let code = {
        let db = Database::open_and_migrate(path.clone()).await.unwrap();
        let programs = ProgramStore::new(db);
        programs
            .create("Programa JA", Some("2026-08-08"), Vec::new())
            .await
            .unwrap()
            .code
    };

    let db = Database::open_and_migrate(path).await.unwrap();
    let programs = ProgramStore::new(db);
    let found = programs.find_by_code(&code).await.unwrap().unwrap();
    assert_eq!(found.title, "Programa JA");
}
