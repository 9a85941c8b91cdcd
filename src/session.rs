use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::{BackendMerged, GenerationClient, LlmRequest, SyncPayload};
use crate::chat::SceneChat;
use crate::error::AppError;
use crate::preferences::PreferenceStore;
use crate::profile::Role;
use crate::prompt::{self, MergedPreferences, PartnerSnapshot, PromptAssembly, TemplateLibrary};
use crate::settings::SettingsManager;

/// Selections are re-sent at most once per quiet second.
pub const SYNC_DEBOUNCE: Duration = Duration::from_secs(1);
/// Room status cadence.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Polling stops silently once the window elapses; the session state does
/// not change.
pub const STATUS_POLL_WINDOW: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TogetherPhase {
    FirstParticipant,
    Handoff,
    SecondParticipant,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Unpaired,
    Paired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    Solo,
    Together(TogetherPhase),
    Remote {
        room_code: String,
        status: RemoteStatus,
    },
}

enum State {
    Solo,
    Together(TogetherPhase),
    Remote { room_code: String },
}

/// What a generation round produced. `prompt`/`merged` are present when the
/// prompt was assembled locally; `backend_merged` when a room's backend did
/// the merging.
#[derive(Debug, Clone)]
pub struct SceneResult {
    pub text: String,
    pub prompt: Option<String>,
    pub merged: Option<MergedPreferences>,
    pub backend_merged: Option<BackendMerged>,
}

/// Tracks whether the session is solo, same-device sequential ("together"),
/// or paired over a rendezvous code, and drives generation accordingly.
///
/// Methods mutate through `&mut self`; share the coordinator behind a single
/// lock. The timer tasks it spawns never touch coordinator state directly —
/// they report through a watch channel and are cancelled via tokens, so a
/// stale response can never be applied after the session moves on.
pub struct SessionCoordinator {
    client: Arc<GenerationClient>,
    state: State,
    partner_a: Option<PartnerSnapshot>,
    partner_b: Option<PartnerSnapshot>,
    partners_connected: watch::Receiver<u32>,
    poll_guard: CancellationToken,
    sync_guard: CancellationToken,
}

impl SessionCoordinator {
    pub fn new(client: Arc<GenerationClient>) -> Self {
        let (_, partners_connected) = watch::channel(0);
        Self {
            client,
            state: State::Solo,
            partner_a: None,
            partner_b: None,
            partners_connected,
            poll_guard: CancellationToken::new(),
            sync_guard: CancellationToken::new(),
        }
    }

    pub fn client(&self) -> &Arc<GenerationClient> {
        &self.client
    }

    pub fn mode(&self) -> SessionMode {
        match &self.state {
            State::Solo => SessionMode::Solo,
            State::Together(phase) => SessionMode::Together(*phase),
            State::Remote { room_code } => SessionMode::Remote {
                room_code: room_code.clone(),
                status: if self.partners_connected() >= 2 {
                    RemoteStatus::Paired
                } else {
                    RemoteStatus::Unpaired
                },
            },
        }
    }

    pub fn room_code(&self) -> Option<&str> {
        match &self.state {
            State::Remote { room_code } => Some(room_code),
            _ => None,
        }
    }

    pub fn partners_connected(&self) -> u32 {
        *self.partners_connected.borrow()
    }

    /// Latest partner count as a watchable stream, for UIs that want to
    /// react to pairing without polling the coordinator.
    pub fn partners_watch(&self) -> watch::Receiver<u32> {
        self.partners_connected.clone()
    }

    // region:  --- Together mode

    pub fn start_together(&mut self) {
        self.stop_timers();
        self.partner_a = None;
        self.partner_b = None;
        self.state = State::Together(TogetherPhase::FirstParticipant);
    }

    /// First participant is done: capture their snapshot and hard-reset the
    /// live selections so the second participant starts clean.
    pub fn complete_first(&mut self, prefs: &mut PreferenceStore, name: &str, role: Role) {
        let name = non_empty_or(name, "Partner A");
        self.partner_a = Some(PartnerSnapshot::capture(prefs, &name, role));
        prefs.reset_all();
        self.state = State::Together(TogetherPhase::Handoff);
    }

    /// The handoff is a manual gate: nothing advances until the second
    /// participant confirms they have the device.
    pub fn confirm_handoff(&mut self) {
        if matches!(self.state, State::Together(TogetherPhase::Handoff)) {
            self.state = State::Together(TogetherPhase::SecondParticipant);
        }
    }

    pub fn complete_second(&mut self, prefs: &PreferenceStore, name: &str, role: Role) {
        let name = non_empty_or(name, "Partner B");
        self.partner_b = Some(PartnerSnapshot::capture(prefs, &name, role));
        self.state = State::Together(TogetherPhase::Ready);
    }

    /// Discard both snapshots and return to the first participant's turn.
    pub fn restart_together(&mut self, prefs: &mut PreferenceStore) {
        self.partner_a = None;
        self.partner_b = None;
        prefs.reset_all();
        self.state = State::Together(TogetherPhase::FirstParticipant);
    }

    pub fn end_session(&mut self) {
        self.stop_timers();
        self.partner_a = None;
        self.partner_b = None;
        self.state = State::Solo;
    }

    // endregion:  --- Together mode

    // region:  --- Remote mode

    /// Create a room on the backend. On failure the coordinator keeps its
    /// prior state.
    pub async fn create_room(&mut self) -> Result<String, AppError> {
        let joined = self.client.create_room().await?;
        self.enter_room(joined.room_code.clone());
        Ok(joined.room_code)
    }

    /// Join an existing room by rendezvous code. On failure the coordinator
    /// keeps its prior state.
    pub async fn join_room(&mut self, code: &str) -> Result<String, AppError> {
        let joined = self.client.join_room(code).await?;
        self.enter_room(joined.room_code.clone());
        Ok(joined.room_code)
    }

    fn enter_room(&mut self, room_code: String) {
        self.partner_a = None;
        self.partner_b = None;
        self.spawn_status_poll(room_code.clone());
        self.state = State::Remote { room_code };
    }

    /// Best-effort close; always leaves remote mode and cancels the timers.
    pub async fn leave_room(&mut self) {
        if let State::Remote { room_code } = &self.state {
            let room_code = room_code.clone();
            if let Err(e) = self.client.close_room(&room_code).await {
                log::warn!("failed to close room {room_code}: {e}");
            }
        }
        self.end_session();
    }

    /// Call on every local selection change while in a room. Pushes the
    /// payload after one quiet second; a newer change cancels the pending
    /// send. Sync failures are logged and retried on the next change.
    pub fn selection_changed(&mut self, payload: SyncPayload) {
        let State::Remote { room_code } = &self.state else {
            return;
        };
        let room_code = room_code.clone();

        self.sync_guard.cancel();
        let guard = CancellationToken::new();
        self.sync_guard = guard.clone();

        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep(SYNC_DEBOUNCE) => {
                    if let Err(e) = client.sync_selection(&room_code, &payload).await {
                        log::warn!("selection sync failed, will retry on next change: {e}");
                    }
                }
            }
        });
    }

    fn spawn_status_poll(&mut self, room_code: String) {
        self.poll_guard.cancel();
        let guard = CancellationToken::new();
        self.poll_guard = guard.clone();

        let (tx, rx) = watch::channel(0u32);
        self.partners_connected = rx;

        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
            let deadline = tokio::time::Instant::now() + STATUS_POLL_WINDOW;
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,
                    _ = ticker.tick() => {
                        if tokio::time::Instant::now() >= deadline {
                            // Window elapsed: stop polling, keep the session.
                            break;
                        }
                        match client.room_status(&room_code).await {
                            Ok(status) => {
                                if tx.send(status.partners_connected).is_err() {
                                    break;
                                }
                            }
                            Err(e) => log::debug!("room status poll failed: {e}"),
                        }
                    }
                }
            }
        });
    }

    fn stop_timers(&mut self) {
        self.poll_guard.cancel();
        self.sync_guard.cancel();
        let (_, rx) = watch::channel(0);
        self.partners_connected = rx;
    }

    // endregion:  --- Remote mode

    // region:  --- Generation

    fn merged_for_generation(
        &self,
        prefs: &PreferenceStore,
        settings: &SettingsManager,
    ) -> Result<MergedPreferences, AppError> {
        match &self.state {
            State::Together(TogetherPhase::Ready) => {
                let (Some(a), Some(b)) = (&self.partner_a, &self.partner_b) else {
                    return Err(AppError::MissingSnapshot);
                };
                Ok(prompt::merge_partners(a, b))
            }
            State::Together(_) => Err(AppError::MissingSnapshot),
            _ => {
                let user = PartnerSnapshot::capture(prefs, "User", settings.role());
                Ok(prompt::solo_preferences(&user))
            }
        }
    }

    /// Assemble the prompt that the next generation round would send,
    /// without calling the backend.
    pub fn assembly(
        &self,
        prefs: &PreferenceStore,
        settings: &SettingsManager,
        templates: &TemplateLibrary,
    ) -> Result<PromptAssembly, AppError> {
        let merged = self.merged_for_generation(prefs, settings)?;
        Ok(prompt::assemble(
            merged,
            settings.intensity(),
            &settings.no_go_list(),
            templates.current().as_deref(),
        ))
    }

    /// Produce a scene. In a room the backend merges and may generate; when
    /// it only returns merged data (or fails), assembly falls back to the
    /// local path.
    pub async fn generate_scene(
        &self,
        prefs: &PreferenceStore,
        settings: &SettingsManager,
        templates: &TemplateLibrary,
    ) -> Result<SceneResult, AppError> {
        let mut backend_merged = None;
        if let State::Remote { room_code } = &self.state {
            match self.client.generate_in_room(room_code).await {
                Ok(response) => {
                    if let Some(scene) = response.scene {
                        return Ok(SceneResult {
                            text: scene,
                            prompt: None,
                            merged: None,
                            backend_merged: response.merged_data,
                        });
                    }
                    backend_merged = response.merged_data;
                }
                Err(e) => log::warn!("backend generation failed, assembling locally: {e}"),
            }
        }

        let assembly = self.assembly(prefs, settings, templates)?;
        let request = LlmRequest::new(
            assembly.prompt.clone(),
            settings.selected_model(),
            &settings.sampling_params(),
        );
        let response = self.client.generate_text(&request).await?;
        Ok(SceneResult {
            text: response.text,
            prompt: Some(assembly.prompt),
            merged: Some(assembly.merged),
            backend_merged,
        })
    }

    /// Follow-up turn in the chat loop. Empty input is silently ignored
    /// (returns `None`). The transcript and continuity summary are updated
    /// on success.
    pub async fn send_chat_message(
        &self,
        chat: &mut SceneChat,
        input: &str,
        settings: &SettingsManager,
    ) -> Result<Option<String>, AppError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let prompt = chat.continuation_prompt(input);
        let request = LlmRequest::new(
            prompt,
            settings.selected_model(),
            &settings.sampling_params(),
        );
        chat.push_user(input);

        let response = self.client.generate_text(&request).await?;
        chat.push_assistant(response.text.clone());
        chat.refresh_summary();
        Ok(Some(response.text))
    }

    // endregion:  --- Generation
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.poll_guard.cancel();
        self.sync_guard.cancel();
    }
}

fn non_empty_or(name: &str, fallback: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        fallback.to_string()
    } else {
        name.to_string()
    }
}
