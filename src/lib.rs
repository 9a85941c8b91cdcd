pub mod api;
pub mod archive;
pub mod audio;
pub mod chat;
pub mod error;
pub mod logging;
pub mod preferences;
pub mod profile;
pub mod prompt;
pub mod schema;
pub mod session;
pub mod settings;
pub mod store;

// Re-export commonly used items for easier access
pub use api::{GenerationClient, LlmRequest, SyncPayload};
pub use archive::{MAX_SAVED_SCENARIOS, ScenarioArchive, ScenarioRecord};
pub use chat::{Message, MessageType, SceneChat};
pub use error::{ApiError, AppError, AudioError, StoreError};
pub use preferences::{
    CategoryKind, CategorySelection, CycleMode, ItemState, PreferenceStore, SelectionGroups,
};
pub use profile::{Intensity, Role};
pub use prompt::{
    CategoryTiers, MergedPreferences, PartnerSnapshot, PromptAssembly, TemplateLibrary,
};
pub use session::{
    RemoteStatus, SceneResult, SessionCoordinator, SessionMode, TogetherPhase,
};
pub use settings::{SamplingParams, SettingsManager};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
