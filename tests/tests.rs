// ../tests/tests.rs
use std::sync::Arc;
use std::time::Duration;

use scene_architect::preferences::cycle_state;
use scene_architect::store::keys;
use scene_architect::*;

fn memory_store() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items
}

fn snapshot(name: &str, role: Role, wants: &[&str], okay: &[&str]) -> PartnerSnapshot {
    PartnerSnapshot {
        name: name.to_string(),
        role,
        toys: CategoryTiers {
            wants: wants.iter().map(|s| s.to_string()).collect(),
            okay: okay.iter().map(|s| s.to_string()).collect(),
            avoid: Vec::new(),
        },
        kinks: CategoryTiers::default(),
        outfits: CategoryTiers::default(),
        settings: CategoryTiers::default(),
    }
}

#[test]
fn test_cycle_returns_to_unset_after_four_steps() {
    let mut state = None;
    for _ in 0..4 {
        state = cycle_state(state, CycleMode::Full);
    }
    assert_eq!(state, None);

    // Restricted cycle skips the avoid tier entirely.
    let mut state = None;
    let mut seen = Vec::new();
    for _ in 0..3 {
        state = cycle_state(state, CycleMode::SkipAvoid);
        seen.push(state);
    }
    assert_eq!(state, None);
    assert!(!seen.contains(&Some(ItemState::Not)));
}

#[test]
fn test_first_load_marks_every_catalog_item_as_wants() {
    let store = memory_store();
    let prefs = PreferenceStore::load(store);

    for kind in [
        CategoryKind::Toys,
        CategoryKind::Outfits,
        CategoryKind::Settings,
        CategoryKind::Kinks,
    ] {
        let groups = prefs.groups(kind);
        assert_eq!(groups.wants.len(), kind.catalog().len());
        assert!(groups.okay.is_empty());
        assert!(groups.not.is_empty());
    }
}

#[test]
fn test_cycling_persists_and_emits_groups() {
    let store = memory_store();
    let mut prefs = PreferenceStore::load(Arc::clone(&store));
    prefs.reset_all();

    let emitted = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&emitted);
    prefs.subscribe(move |kind, groups| {
        sink.lock().expect("listener lock").push((kind, groups.clone()));
    });

    assert_eq!(
        prefs.cycle(CategoryKind::Toys, "rope", CycleMode::Full),
        Some(ItemState::Wants)
    );
    assert_eq!(
        prefs.cycle(CategoryKind::Toys, "rope", CycleMode::Full),
        Some(ItemState::Okay)
    );

    let events = emitted.lock().expect("listener lock");
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].0, CategoryKind::Toys);
    assert_eq!(events[1].1.okay, vec!["rope".to_string()]);

    // A reload from the same store sees the persisted map.
    let reloaded = PreferenceStore::load(store);
    assert_eq!(
        reloaded.category(CategoryKind::Toys).state_of("rope"),
        Some(ItemState::Okay)
    );
}

#[test]
fn test_custom_items_are_normalized_and_auto_wanted() {
    let store = memory_store();
    let mut prefs = PreferenceStore::load(store);
    prefs.reset_all();

    assert_eq!(
        prefs.add_custom_item(CategoryKind::Kinks, "  Wax Play  "),
        Some("wax play".to_string())
    );
    assert_eq!(
        prefs.category(CategoryKind::Kinks).state_of("wax play"),
        Some(ItemState::Wants)
    );
    // Blank and duplicate names are silently ignored.
    assert_eq!(prefs.add_custom_item(CategoryKind::Kinks, "   "), None);
    assert_eq!(prefs.add_custom_item(CategoryKind::Kinks, "wax play"), None);

    prefs.remove_custom_item(CategoryKind::Kinks, "wax play");
    assert_eq!(prefs.category(CategoryKind::Kinks).state_of("wax play"), None);
}

#[test]
fn test_merge_unions_wants_and_okay_separately() {
    let a = snapshot("Alex", Role::Dom, &["rope", "cuffs"], &["blindfold"]);
    let b = snapshot("Sam", Role::Sub, &["cuffs", "gag"], &[]);

    let merged = prompt::merge_partners(&a, &b);
    assert_eq!(merged.toys.wants, vec!["rope", "cuffs", "gag"]);
    assert_eq!(merged.toys.okay, vec!["blindfold"]);
    assert_eq!(merged.roles, vec!["Alex (dom)", "Sam (sub)"]);

    // Membership is commutative; only label order follows the arguments.
    let flipped = prompt::merge_partners(&b, &a);
    assert_eq!(
        sorted(merged.toys.wants.clone()),
        sorted(flipped.toys.wants.clone())
    );
    assert_eq!(
        sorted(merged.toys.okay.clone()),
        sorted(flipped.toys.okay.clone())
    );

    // And idempotent: merging a snapshot with itself changes nothing.
    let self_merge = prompt::merge_partners(&a, &a);
    assert_eq!(self_merge.toys.wants, a.toys.wants);
    assert_eq!(self_merge.toys.okay, a.toys.okay);
}

#[test]
fn test_preferred_block_always_precedes_optional_block() {
    let tiers = CategoryTiers {
        wants: vec!["rope".to_string()],
        okay: vec!["blindfold".to_string()],
        avoid: Vec::new(),
    };
    let block = prompt::format_category(&tiers);
    let preferred = block.find("PREFERRED (Must Include): rope").expect("preferred block");
    let optional = block.find("ACCEPTED (Optional): blindfold").expect("optional block");
    assert!(preferred < optional);
}

#[test]
fn test_empty_category_renders_the_none_placeholder() {
    assert_eq!(prompt::format_category(&CategoryTiers::default()), "none");
}

#[test]
fn test_default_prompt_carries_restrictions_and_ordering() {
    let a = snapshot("Alex", Role::Switch, &["rope"], &["gag"]);
    let merged = prompt::solo_preferences(&a);
    let no_go = vec!["blood".to_string(), "needles".to_string()];

    let text = prompt::build_prompt(&merged, Intensity::Weird, &no_go, None);
    assert!(text.contains("Intensity Level: weird"));
    assert!(text.contains("Roles/Dynamics: switch"));
    assert!(text.contains("Strictly avoid: blood, needles"));
    // Empty categories degrade to the placeholder instead of failing.
    assert!(text.contains("Kinks:\nnone"));

    let preferred = text.find("PREFERRED (Must Include): rope").expect("preferred");
    let optional = text.find("ACCEPTED (Optional): gag").expect("optional");
    assert!(preferred < optional);
}

#[test]
fn test_unrecognized_placeholder_is_left_verbatim() {
    let merged = prompt::solo_preferences(&snapshot("Alex", Role::Dom, &["rope"], &[]));
    let template = "Mood: {intensity} / {mystery_token} / toys {all_toys}";
    let text = prompt::build_prompt(&merged, Intensity::Casual, &[], Some(template));

    assert!(text.contains("Mood: casual"));
    assert!(text.contains("{mystery_token}"));
    assert!(text.contains("PREFERRED (Must Include): rope"));
}

#[test]
fn test_template_library_save_load_delete() {
    let store = memory_store();
    let library = TemplateLibrary::new(store);

    assert_eq!(library.current(), None);
    library.set_current("A {intensity} night").expect("set current");
    assert_eq!(library.current().as_deref(), Some("A {intensity} night"));

    // An empty name is silently ignored.
    let ignored = library.save_as("   ", "body", None).expect("save_as");
    assert!(ignored.is_none());

    let saved = library
        .save_as("Slow burn", "Ease into {all_kinks}", None)
        .expect("save_as")
        .expect("named template");
    assert_eq!(library.saved().len(), 1);
    assert_eq!(
        library.load(&saved.id).expect("load").content,
        "Ease into {all_kinks}"
    );

    library.delete(&saved.id).expect("delete");
    assert!(library.saved().is_empty());

    library.clear_current().expect("clear current");
    assert_eq!(library.current(), None);
}

#[test]
fn test_no_go_list_defaults_dedupe_and_reset() {
    let store = memory_store();
    let settings = SettingsManager::new(store);

    let defaults = settings.no_go_list();
    assert!(defaults.contains(&"blood".to_string()));

    settings.add_no_go("  Piercing  ").expect("add");
    settings.add_no_go("piercing").expect("add duplicate");
    settings.add_no_go("   ").expect("add blank");
    let list = settings.no_go_list();
    assert_eq!(
        list.iter().filter(|t| t.as_str() == "piercing").count(),
        1
    );

    settings.remove_no_go("piercing").expect("remove");
    assert!(!settings.no_go_list().contains(&"piercing".to_string()));

    settings.reset_no_go().expect("reset");
    assert_eq!(settings.no_go_list(), defaults);
}

#[test]
fn test_saving_a_51st_scenario_evicts_the_oldest() {
    let store = memory_store();
    let archive = ScenarioArchive::new(store);

    for i in 1..=50 {
        archive
            .save(&format!("scene {i}"), Intensity::Casual, None)
            .expect("save");
    }
    assert_eq!(archive.list().len(), 50);

    let newest = archive
        .save("scene 51", Intensity::Demon, Some("Latest"))
        .expect("save");
    let scenarios = archive.list();
    assert_eq!(scenarios.len(), 50);
    // Most-recent first, oldest evicted.
    assert_eq!(scenarios[0].id, newest.id);
    assert_eq!(scenarios[0].title, "Latest");
    assert!(scenarios.iter().all(|s| s.content != "scene 1"));
    assert_eq!(scenarios[49].content, "scene 2");
}

#[test]
fn test_scenario_delete_and_default_titles() {
    let store = memory_store();
    let archive = ScenarioArchive::new(store);

    let first = archive.save("body", Intensity::Casual, None).expect("save");
    assert_eq!(first.title, "Scene 1");

    archive.delete(&first.id).expect("delete");
    assert!(archive.list().is_empty());
}

#[test]
fn test_export_import_round_trip_reproduces_stored_keys() {
    let source = memory_store();
    let mut prefs = PreferenceStore::load(Arc::clone(&source));
    prefs.cycle(CategoryKind::Toys, "rope", CycleMode::Full);
    prefs.add_custom_item(CategoryKind::Kinks, "wax play");

    let settings = SettingsManager::new(Arc::clone(&source));
    settings.set_role(Role::Voyeur).expect("role");
    settings.set_intensity(Intensity::Demon).expect("intensity");
    settings.add_no_go("piercing").expect("no-go");
    settings
        .set_sampling_params(&SamplingParams {
            temperature: 0.7,
            ..SamplingParams::default()
        })
        .expect("params");

    let bundle = settings.export_bundle().expect("export");

    let target = memory_store();
    SettingsManager::new(Arc::clone(&target))
        .import_bundle(&bundle)
        .expect("import");

    let mut source_keys = source.keys().expect("source keys");
    source_keys.sort();
    let mut target_keys = target.keys().expect("target keys");
    target_keys.sort();
    assert_eq!(source_keys, target_keys);

    for key in &source_keys {
        assert_eq!(
            source.get(key).expect("source value"),
            target.get(key).expect("target value"),
            "value mismatch for key {key}"
        );
    }

    let restored = SettingsManager::new(target);
    assert_eq!(restored.role(), Role::Voyeur);
    assert_eq!(restored.intensity(), Intensity::Demon);
    assert_eq!(restored.sampling_params().temperature, 0.7);
}

#[test]
fn test_continuation_prompt_shape_and_summary_threshold() {
    let store = memory_store();
    let mut chat = SceneChat::load(Arc::clone(&store));

    chat.push_assistant("The scene opens.");
    chat.push_user("Dim the lights.");

    let prompt = chat.continuation_prompt("Bring out the rope.");
    assert!(prompt.starts_with("Conversation:\n"));
    assert!(prompt.contains("Assistant: The scene opens."));
    assert!(prompt.contains("User: Dim the lights."));
    assert!(prompt.ends_with("User: Bring out the rope.\n\nContinue the scene:"));

    // Four messages or fewer: no summary yet.
    chat.push_assistant("Lights dimmed.");
    chat.push_user("Good.");
    chat.refresh_summary();
    assert!(chat.context_summary().is_empty());

    chat.push_assistant("And then some.");
    chat.refresh_summary();
    assert_eq!(chat.context_summary(), "The scene opens. Dim the lights....");
    assert!(
        chat.continuation_prompt("More.")
            .starts_with("Previous context: The scene opens. Dim the lights....")
    );
    assert_eq!(
        store.get(keys::CHAT_CONTEXT).expect("stored summary"),
        Some("The scene opens. Dim the lights....".to_string())
    );

    chat.clear();
    assert!(chat.messages.is_empty());
    assert_eq!(store.get(keys::CHAT_CONTEXT).expect("cleared"), None);
}

#[test]
fn test_chat_render_helpers_mark_user_turns() {
    let store = memory_store();
    let mut chat = SceneChat::load(store);
    chat.push_assistant("Opening.");
    chat.push_user("Continue.");

    assert_eq!(chat.archive_text(), "Opening.\n\n---\n\n> Continue.");
    assert_eq!(chat.copy_text(), "Opening.\n\n---\n\nContinue.");
}

#[test]
fn test_together_flow_resets_selections_and_gates_on_handoff() {
    let store = memory_store();
    let mut prefs = PreferenceStore::load(Arc::clone(&store));
    prefs.reset_all();
    let settings = SettingsManager::new(Arc::clone(&store));
    let templates = TemplateLibrary::new(Arc::clone(&store));

    let client = Arc::new(GenerationClient::new(api::DEFAULT_BASE_URL));
    let mut session = SessionCoordinator::new(client);
    assert_eq!(session.mode(), SessionMode::Solo);

    session.start_together();
    assert_eq!(
        session.mode(),
        SessionMode::Together(TogetherPhase::FirstParticipant)
    );

    prefs.cycle(CategoryKind::Toys, "rope", CycleMode::Full);
    session.complete_first(&mut prefs, "Alex", Role::Dom);
    assert_eq!(session.mode(), SessionMode::Together(TogetherPhase::Handoff));
    // The handoff hard-resets the live selections for the second turn.
    assert_eq!(prefs.total_active(), 0);

    // Generation before both snapshots exist is refused.
    assert!(matches!(
        session.assembly(&prefs, &settings, &templates),
        Err(AppError::MissingSnapshot)
    ));

    session.confirm_handoff();
    assert_eq!(
        session.mode(),
        SessionMode::Together(TogetherPhase::SecondParticipant)
    );

    prefs.cycle(CategoryKind::Toys, "cuffs", CycleMode::Full);
    session.complete_second(&prefs, "", Role::Sub);
    assert_eq!(session.mode(), SessionMode::Together(TogetherPhase::Ready));

    let assembly = session
        .assembly(&prefs, &settings, &templates)
        .expect("assembly");
    assert!(assembly.prompt.contains("rope"));
    assert!(assembly.prompt.contains("cuffs"));
    assert_eq!(
        assembly.merged.roles,
        vec!["Alex (dom)", "Partner B (sub)"]
    );

    session.restart_together(&mut prefs);
    assert_eq!(
        session.mode(),
        SessionMode::Together(TogetherPhase::FirstParticipant)
    );
}

#[tokio::test]
async fn test_room_lifecycle_against_mock_backend() {
    let mut server = mockito::Server::new_async().await;
    let created = server
        .mock("POST", "/room")
        .with_header("content-type", "application/json")
        .with_body(r#"{"room_code": "AB12", "role": "host", "status": "created"}"#)
        .create_async()
        .await;
    let closed = server
        .mock("DELETE", "/room/AB12")
        .with_body(r#"{"status": "closed"}"#)
        .create_async()
        .await;

    let client = Arc::new(GenerationClient::new(server.url()));
    let mut session = SessionCoordinator::new(client);

    let code = session.create_room().await.expect("create room");
    assert_eq!(code, "AB12");
    assert_eq!(session.room_code(), Some("AB12"));
    assert!(matches!(session.mode(), SessionMode::Remote { .. }));

    session.leave_room().await;
    assert_eq!(session.mode(), SessionMode::Solo);

    created.assert_async().await;
    closed.assert_async().await;
}

#[tokio::test]
async fn test_join_failure_surfaces_detail_and_keeps_state() {
    let mut server = mockito::Server::new_async().await;
    let _room = server
        .mock("POST", "/room")
        .with_status(404)
        .with_body(r#"{"detail": "Room not found"}"#)
        .create_async()
        .await;

    let client = Arc::new(GenerationClient::new(server.url()));
    let mut session = SessionCoordinator::new(client);

    let err = session.join_room("zz99").await.expect_err("join must fail");
    assert_eq!(
        err.to_string(),
        AppError::Api(ApiError::Backend("Room not found".to_string())).to_string()
    );
    // Failed joins leave the coordinator untouched.
    assert_eq!(session.mode(), SessionMode::Solo);
}

#[tokio::test]
async fn test_selection_sync_is_debounced_to_one_send() {
    let mut server = mockito::Server::new_async().await;
    let _room = server
        .mock("POST", "/room")
        .with_body(r#"{"room_code": "AB12"}"#)
        .create_async()
        .await;
    let sync = server
        .mock("POST", mockito::Matcher::Regex(r"^/sync/AB12/user_\w+$".to_string()))
        .with_body(r#"{"status": "synced", "partners_ready": 1}"#)
        .expect(1)
        .create_async()
        .await;

    let client = Arc::new(GenerationClient::new(server.url()));
    let mut session = SessionCoordinator::new(client);
    session.create_room().await.expect("create room");

    let payload = SyncPayload {
        role: Role::Switch,
        intensity: Intensity::Adventurous,
        inventory: vec!["rope".to_string()],
        outfit: Vec::new(),
        kinks: Vec::new(),
    };
    // Two rapid changes within the quiet window collapse to one send.
    session.selection_changed(payload.clone());
    session.selection_changed(payload);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    sync.assert_async().await;
}

#[tokio::test]
async fn test_solo_generation_decodes_backend_merge() {
    let mut server = mockito::Server::new_async().await;
    let _generate = server
        .mock("POST", "/generate/SOLO")
        .with_body(
            r#"{
                "merged": true,
                "intensity": "weird",
                "roles": ["dom", "sub"],
                "merged_data": {"toys": ["rope"], "kinks": [], "outfits": ["lingerie"]}
            }"#,
        )
        .create_async()
        .await;

    let client = GenerationClient::new(server.url());
    let payload = SyncPayload {
        role: Role::Dom,
        intensity: Intensity::Weird,
        inventory: vec!["rope".to_string()],
        outfit: vec!["lingerie".to_string()],
        kinks: Vec::new(),
    };
    let response = client.generate_solo(&payload).await.expect("generate");
    assert_eq!(response.scene, None);
    let merged = response.merged_data.expect("merged data");
    assert_eq!(merged.toys, vec!["rope"]);
    assert_eq!(merged.outfits, vec!["lingerie"]);
    assert_eq!(response.roles, vec!["dom", "sub"]);
}

#[tokio::test]
async fn test_free_form_generation_sends_sampling_params() {
    let mut server = mockito::Server::new_async().await;
    let llm = server
        .mock("POST", "/llm")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "prompt": "Continue.",
            "temperature": 1.1,
            "max_tokens": 4096,
            "context_length": 16384
        })))
        .with_body(r#"{"text": "And so it went.", "model": "local", "done": true}"#)
        .create_async()
        .await;

    let client = GenerationClient::new(server.url());
    let request = LlmRequest::new("Continue.", None, &SamplingParams::default());
    let response = client.generate_text(&request).await.expect("llm");
    assert_eq!(response.text, "And so it went.");
    llm.assert_async().await;
}

#[tokio::test]
async fn test_tts_decodes_base64_audio() {
    use base64::Engine;

    let audio = base64::engine::general_purpose::STANDARD.encode(b"fake-mp3-bytes");
    let mut server = mockito::Server::new_async().await;
    let _tts = server
        .mock("POST", "/tts")
        .with_body(format!(r#"{{"audio": "{audio}", "format": "mp3"}}"#))
        .create_async()
        .await;

    let client = GenerationClient::new(server.url());
    let bytes = client.text_to_speech("hello", "default").await.expect("tts");
    assert_eq!(bytes, b"fake-mp3-bytes");
}

#[tokio::test]
async fn test_stt_accepts_either_transcript_field() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("POST", "/stt")
        .with_body(r#"{"transcript": "louder please"}"#)
        .create_async()
        .await;

    let client = GenerationClient::new(server.url());
    let text = client
        .speech_to_text(b"RIFFfake".to_vec())
        .await
        .expect("stt");
    assert_eq!(text, "louder please");
    first.assert_async().await;

    let _second = server
        .mock("POST", "/stt")
        .with_body(r#"{"text": "quieter"}"#)
        .create_async()
        .await;
    let text = client
        .speech_to_text(b"RIFFfake".to_vec())
        .await
        .expect("stt");
    assert_eq!(text, "quieter");
}

#[tokio::test]
async fn test_model_listing_and_load() {
    let mut server = mockito::Server::new_async().await;
    let _tags = server
        .mock("GET", "/models/tags")
        .with_body(r#"{"models": ["dolphin-mistral"]}"#)
        .create_async()
        .await;
    let _files = server
        .mock("GET", "/models/files")
        .with_body(r#"{"files": ["a.gguf", "b.gguf"]}"#)
        .create_async()
        .await;
    let _load = server
        .mock("POST", "/models/load")
        .with_body(r#"{"status": "success", "model": "nightshade"}"#)
        .create_async()
        .await;

    let client = GenerationClient::new(server.url());
    assert_eq!(
        client.model_tags().await.expect("tags").models,
        vec!["dolphin-mistral"]
    );
    assert_eq!(client.model_files().await.expect("files").files.len(), 2);
    assert_eq!(
        client
            .load_model("a.gguf", "nightshade")
            .await
            .expect("load")
            .status,
        "success"
    );
}

#[tokio::test]
async fn test_chat_round_trip_updates_transcript() {
    let mut server = mockito::Server::new_async().await;
    let _llm = server
        .mock("POST", "/llm")
        .with_body(r#"{"text": "The scene deepens."}"#)
        .create_async()
        .await;

    let store = memory_store();
    let settings = SettingsManager::new(Arc::clone(&store));
    let mut chat = SceneChat::load(store);
    chat.push_assistant("Opening scene.");

    let client = Arc::new(GenerationClient::new(server.url()));
    let session = SessionCoordinator::new(client);

    // Empty input is silently ignored, no request made.
    let ignored = session
        .send_chat_message(&mut chat, "   ", &settings)
        .await
        .expect("empty input");
    assert_eq!(ignored, None);
    assert_eq!(chat.messages.len(), 1);

    let reply = session
        .send_chat_message(&mut chat, "Go on.", &settings)
        .await
        .expect("chat turn");
    assert_eq!(reply.as_deref(), Some("The scene deepens."));
    assert_eq!(chat.messages.len(), 3);
    assert_eq!(chat.messages[1].message_type, MessageType::User);
    assert_eq!(chat.messages[2].content, "The scene deepens.");
}
