//! Attendance registration: QR entry, dynamic form flow, manual variant.
//!
//! Entry validates the QR in a fixed order (format, existence, active
//! flag, time-of-day window, weekly duplicate), replying specifically and
//! leaving state untouched at every rejection. Presence-only types register
//! immediately; form-carrying types open a multi-turn flow that walks the
//! field schema one answer per message.
//!
//! The duplicate guard runs twice on purpose: a proactive lookup for the
//! common case, and the unique index at insert time for the race where two
//! deliveries of the same registration interleave. Both end in the same
//! "already registered" reply.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, Timelike, Utc};
use tracing::{info, instrument, warn};

use congrega_core::{
    AttendanceFlowState, ConversationState, FlowContext, IntentResult, ManualTarget,
};
use congrega_gateway::InboundMessage;
use congrega_store::{
    AttendanceQr, ConversationPatch, NewAttendanceRecord, RecordIdentity, RecordStatus,
    RegistrationMethod, StoreError, User, current_week_start, normalize_phone,
};

use crate::error::BotResult;
use crate::events::AttendanceEvent;
use crate::handlers::BotContext;
use crate::messages;

/// Minimum digit count for a manual subject to be treated as a phone.
const SUBJECT_PHONE_MIN_DIGITS: usize = 9;

/// How a manual-registration subject resolved.
enum Subject {
    /// Exactly one account matched.
    Resolved(User),
    /// No account matched; register with the free-text identity.
    Free {
        identity: RecordIdentity,
        display: String,
    },
    /// Two or more accounts matched: hard stop, ask for a phone.
    Ambiguous(Vec<User>),
}

pub struct AttendanceHandler {
    ctx: Arc<BotContext>,
}

impl AttendanceHandler {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self { ctx }
    }

    // ── entry: self registration ─────────────────────────────────────

    /// Handle `registrar_asistencia`: the caller scans a QR for themselves.
    #[instrument(skip(self, msg, result), fields(phone = %msg.phone))]
    pub async fn handle(&self, msg: &InboundMessage, result: &IntentResult) -> BotResult<()> {
        let Some(code) = result.entity_str("codigoQR") else {
            self.reply(msg, &messages::qr_format_hint()).await?;
            return Ok(());
        };

        let Some(qr) = self.validate_entry(msg, code).await? else {
            return Ok(());
        };

        let caller = self.ctx.users.find_by_phone(&msg.phone).await?;
        let identity = match &caller {
            Some(user) => RecordIdentity::User(user.id.clone()),
            None => RecordIdentity::Phone(normalize_phone(&msg.phone)),
        };
        let display = caller
            .as_ref()
            .map(|u| u.name.clone())
            .or_else(|| msg.sender_name.clone())
            .unwrap_or_else(|| normalize_phone(&msg.phone));

        let week = current_week_start();
        if self
            .ctx
            .attendance
            .find_record(&identity, &week, &qr.type_id)
            .await?
            .is_some()
        {
            self.reply(msg, &messages::already_registered(&qr.type_name))
                .await?;
            return Ok(());
        }

        if qr.solo_presencia || qr.fields.is_empty() {
            return self
                .register(
                    msg,
                    &qr,
                    identity,
                    display,
                    RecordStatus::PendienteConfirmacion,
                    RegistrationMethod::QrBot,
                    serde_json::json!({}),
                    None,
                    None,
                )
                .await;
        }

        self.open_flow(msg, &qr, ConversationState::FormularioAsistencia, None)
            .await
    }

    // ── entry: manual registration ───────────────────────────────────

    /// Handle `registrar_asistencia_manual`: a leader registers a third
    /// party, resolved by phone suffix or fuzzy name.
    #[instrument(skip(self, msg, result, caller), fields(phone = %msg.phone))]
    pub async fn handle_manual(
        &self,
        msg: &InboundMessage,
        result: &IntentResult,
        caller: &User,
    ) -> BotResult<()> {
        let Some(code) = result.entity_str("codigoQR") else {
            self.reply(msg, &messages::qr_format_hint()).await?;
            return Ok(());
        };
        let Some(subject_raw) = result.entity_str("nombreUsuario") else {
            self.reply(msg, &messages::qr_format_hint()).await?;
            return Ok(());
        };

        let Some(qr) = self.validate_entry(msg, code).await? else {
            return Ok(());
        };

        let (identity, display, target) = match self.resolve_subject(subject_raw).await? {
            Subject::Ambiguous(matches) => {
                // Hard stop: never guess between homonyms.
                self.reply(msg, &messages::ambiguous_subject(subject_raw, &matches))
                    .await?;
                return Ok(());
            }
            Subject::Resolved(user) => {
                let target = ManualTarget {
                    user_id: Some(user.id.clone()),
                    phone: user.phone.clone(),
                    name: Some(user.name.clone()),
                };
                (RecordIdentity::User(user.id), user.name, target)
            }
            Subject::Free { identity, display } => {
                let target = match &identity {
                    RecordIdentity::Phone(phone) => ManualTarget {
                        user_id: None,
                        phone: Some(phone.clone()),
                        name: Some(display.clone()),
                    },
                    _ => ManualTarget {
                        user_id: None,
                        phone: None,
                        name: Some(display.clone()),
                    },
                };
                (identity, display, target)
            }
        };

        let week = current_week_start();
        if self
            .ctx
            .attendance
            .find_record(&identity, &week, &qr.type_id)
            .await?
            .is_some()
        {
            self.reply(
                msg,
                &messages::already_registered_manual(&display, &qr.type_name),
            )
            .await?;
            return Ok(());
        }

        if qr.solo_presencia || qr.fields.is_empty() {
            return self
                .register(
                    msg,
                    &qr,
                    identity,
                    display,
                    RecordStatus::Confirmado,
                    RegistrationMethod::Manual,
                    serde_json::json!({}),
                    Some(caller),
                    None,
                )
                .await;
        }

        self.open_flow(
            msg,
            &qr,
            ConversationState::FormularioAsistenciaManual,
            Some(target),
        )
        .await
    }

    // ── flow continuation ────────────────────────────────────────────

    /// Feed one raw reply into an active attendance form.
    ///
    /// Invalid answers re-prompt with the specific validation message and
    /// leave cursor and context untouched; valid answers advance the cursor
    /// by exactly one.
    #[instrument(skip(self, msg, flow), fields(phone = %msg.phone, cursor = flow.cursor))]
    pub async fn continue_flow(
        &self,
        msg: &InboundMessage,
        mut flow: AttendanceFlowState,
    ) -> BotResult<()> {
        let Some(field) = flow.current_field().cloned() else {
            // Cursor already past the last field: a finalize raced or was
            // lost. Finalizing again is safe; the duplicate guard holds.
            return self.finalize(msg, flow).await;
        };

        let value = match field.validate(&msg.content) {
            Err(rejection) => {
                self.reply(msg, &rejection.to_string()).await?;
                return Ok(());
            }
            Ok(value) => value,
        };

        flow.answers.insert(field.name.clone(), value);
        flow.cursor += 1;

        match flow.current_field() {
            Some(next) => {
                let question = next.render_question();
                self.ctx
                    .conversations
                    .update(
                        &msg.phone,
                        ConversationPatch::context(
                            FlowContext::AttendanceForm(flow.clone()).encode(),
                        ),
                    )
                    .await?;
                self.reply(msg, &question).await
            }
            None => self.finalize(msg, flow).await,
        }
    }

    /// Last answer is in: create the record and close the conversation.
    async fn finalize(&self, msg: &InboundMessage, flow: AttendanceFlowState) -> BotResult<()> {
        let Some(qr) = self.ctx.attendance.find_qr(&flow.qr_code).await? else {
            // The QR vanished mid-flow; nothing to finalize against.
            warn!(code = %flow.qr_code, "qr disappeared during flow");
            self.reply(msg, &messages::flow_corrupted()).await?;
            self.ctx.conversations.reset(&msg.phone).await?;
            return Ok(());
        };

        let form_data = serde_json::to_value(&flow.answers)
            .unwrap_or_else(|_| serde_json::json!({}));

        match &flow.manual {
            Some(target) => {
                let Some((identity, display)) = manual_identity(target) else {
                    self.reply(msg, &messages::flow_corrupted()).await?;
                    self.ctx.conversations.reset(&msg.phone).await?;
                    return Ok(());
                };
                let caller = self.ctx.users.find_by_phone(&msg.phone).await?;
                self.register(
                    msg,
                    &qr,
                    identity,
                    display,
                    RecordStatus::Confirmado,
                    RegistrationMethod::Manual,
                    form_data,
                    caller.as_ref(),
                    Some(&flow),
                )
                .await
            }
            None => {
                let caller = self.ctx.users.find_by_phone(&msg.phone).await?;
                let identity = match &caller {
                    Some(user) => RecordIdentity::User(user.id.clone()),
                    None => RecordIdentity::Phone(normalize_phone(&msg.phone)),
                };
                let display = caller
                    .map(|u| u.name)
                    .or_else(|| msg.sender_name.clone())
                    .unwrap_or_else(|| normalize_phone(&msg.phone));
                self.register(
                    msg,
                    &qr,
                    identity,
                    display,
                    RecordStatus::PendienteConfirmacion,
                    RegistrationMethod::QrBot,
                    form_data,
                    None,
                    Some(&flow),
                )
                .await
            }
        }
    }

    // ── shared steps ─────────────────────────────────────────────────

    /// Steps 2–4 of entry validation: existence, active flag, time window.
    /// Replies and returns `None` on failure; state is never touched here.
    async fn validate_entry(
        &self,
        msg: &InboundMessage,
        code: &str,
    ) -> BotResult<Option<Arc<AttendanceQr>>> {
        let Some(qr) = self.ctx.attendance.find_qr(code).await? else {
            self.reply(msg, &messages::invalid_qr(code)).await?;
            return Ok(None);
        };

        if !qr.active {
            self.reply(msg, &messages::inactive_qr(code)).await?;
            return Ok(None);
        }

        let now = minutes_of_day();
        if !within_window(now, &qr.hora_inicio, &qr.hora_fin) {
            self.reply(
                msg,
                &messages::outside_window(&qr.hora_inicio, &qr.hora_fin),
            )
            .await?;
            return Ok(None);
        }

        Ok(Some(qr))
    }

    /// Resolve a manual subject by phone digits or fuzzy name.
    async fn resolve_subject(&self, raw: &str) -> BotResult<Subject> {
        let digits = normalize_phone(raw);

        if digits.len() >= SUBJECT_PHONE_MIN_DIGITS {
            let matches = self.ctx.users.find_by_phone_suffix(&digits).await?;
            return Ok(match matches.len() {
                0 => Subject::Free {
                    identity: RecordIdentity::Phone(digits),
                    display: raw.trim().to_string(),
                },
                1 => Subject::Resolved(matches.into_iter().next().expect("len checked")),
                _ => Subject::Ambiguous(matches),
            });
        }

        let matches = self.ctx.users.search_by_name(raw).await?;
        Ok(match matches.len() {
            0 => Subject::Free {
                identity: RecordIdentity::Name(raw.trim().to_string()),
                display: raw.trim().to_string(),
            },
            1 => Subject::Resolved(matches.into_iter().next().expect("len checked")),
            _ => Subject::Ambiguous(matches),
        })
    }

    /// Open the form flow: persist the snapshot, greet, ask field one.
    async fn open_flow(
        &self,
        msg: &InboundMessage,
        qr: &AttendanceQr,
        state: ConversationState,
        manual: Option<ManualTarget>,
    ) -> BotResult<()> {
        let flow = AttendanceFlowState {
            qr_code: qr.code.clone(),
            qr_id: qr.id.clone(),
            type_id: qr.type_id.clone(),
            fields: qr.fields.clone(),
            cursor: 0,
            answers: BTreeMap::new(),
            manual,
        };

        let first_question = flow.fields[0].render_question();

        self.ctx
            .conversations
            .update(
                &msg.phone,
                ConversationPatch::enter_flow(
                    state,
                    "asistencia",
                    FlowContext::AttendanceForm(flow).encode(),
                ),
            )
            .await?;

        self.ctx
            .sink
            .send_messages(
                msg.conversation_id,
                &[
                    messages::form_greeting(&qr.type_name),
                    messages::form_instructions(qr.fields.len()),
                    first_question,
                ],
            )
            .await?;

        Ok(())
    }

    /// Create the record, reply, reset, publish. The unique index turns a
    /// lost race into the same "already registered" outcome as the
    /// proactive check.
    #[allow(clippy::too_many_arguments)]
    async fn register(
        &self,
        msg: &InboundMessage,
        qr: &AttendanceQr,
        identity: RecordIdentity,
        display: String,
        status: RecordStatus,
        method: RegistrationMethod,
        form_data: serde_json::Value,
        caller: Option<&User>,
        flow: Option<&AttendanceFlowState>,
    ) -> BotResult<()> {
        let record = NewAttendanceRecord {
            type_id: qr.type_id.clone(),
            week_start: current_week_start(),
            identity,
            status,
            method,
            form_data,
            registered_by: caller
                .map(|u| u.id.clone())
                .or_else(|| match method {
                    RegistrationMethod::Manual => Some(normalize_phone(&msg.phone)),
                    RegistrationMethod::QrBot => None,
                }),
        };

        match self.ctx.attendance.create_record(record).await {
            Ok(created) => {
                info!(
                    record = %created.id,
                    method = method.as_str(),
                    "attendance registered"
                );

                let confirmation = match method {
                    RegistrationMethod::QrBot => messages::registration_confirmed(&qr.type_name),
                    RegistrationMethod::Manual => {
                        messages::manual_registration_confirmed(&display, &qr.type_name)
                    }
                };
                self.reply(msg, &confirmation).await?;
                self.ctx.conversations.reset(&msg.phone).await?;

                self.ctx.events.publish(AttendanceEvent {
                    qr_code: qr.code.clone(),
                    type_name: qr.type_name.clone(),
                    display_name: display,
                    method: method.as_str().to_string(),
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(StoreError::DuplicateRecord(_)) => {
                let text = match method {
                    RegistrationMethod::QrBot => messages::already_registered(&qr.type_name),
                    RegistrationMethod::Manual => {
                        messages::already_registered_manual(&display, &qr.type_name)
                    }
                };
                self.reply(msg, &text).await?;
                if flow.is_some() {
                    self.ctx.conversations.reset(&msg.phone).await?;
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) -> BotResult<()> {
        self.ctx.sink.send_message(msg.conversation_id, text).await?;
        Ok(())
    }
}

/// Identity preference for a manual target: resolved user id, else phone,
/// else free-text name. `None` means the persisted target is unusable.
fn manual_identity(target: &ManualTarget) -> Option<(RecordIdentity, String)> {
    let display = target
        .name
        .clone()
        .or_else(|| target.phone.clone())
        .unwrap_or_default();

    if let Some(user_id) = &target.user_id {
        return Some((RecordIdentity::User(user_id.clone()), display));
    }
    if let Some(phone) = &target.phone {
        return Some((RecordIdentity::Phone(phone.clone()), display));
    }
    target
        .name
        .as_ref()
        .map(|name| (RecordIdentity::Name(name.clone()), display))
}

/// Current wall-clock minutes of day.
fn minutes_of_day() -> u32 {
    let now = Local::now().time();
    now.hour() * 60 + now.minute()
}

/// Parse "HH:MM" into minutes of day.
fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Whether `now` falls inside the window: start inclusive, end exclusive.
/// An unparseable window is treated as always open rather than locking
/// everyone out of a misconfigured session.
fn within_window(now: u32, start: &str, end: &str) -> bool {
    match (parse_hhmm(start), parse_hhmm(end)) {
        (Some(start), Some(end)) => now >= start && now < end,
        _ => {
            warn!(start = %start, end = %end, "unparseable time window, allowing");
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
