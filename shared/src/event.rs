use secrecy::SecretString;

use crate::capabilities::{HttpResult, KvResult};
use crate::coordinator::OpId;
use crate::model::{LoadSeq, RecordDraft, RecordId, SortOrder};
use crate::preferences::Preferences;
use crate::DashboardConfig;

#[derive(Debug, Default)]
pub enum Event {
    #[default]
    Noop,

    /// Sent by the shell before `AppStarted`; an invalid config is refused.
    Configure {
        config: DashboardConfig,
    },
    AppStarted,
    PreferencesLoaded {
        result: KvResult,
    },
    SessionRestored {
        result: KvResult,
    },

    LoginRequested {
        email: String,
        password: SecretString,
    },
    LogoutRequested,

    RefreshRequested,
    RecordsFetched {
        seq: LoadSeq,
        result: HttpResult,
    },

    SearchChanged {
        term: String,
    },
    SortChanged {
        order: SortOrder,
    },
    PageChanged {
        page: u32,
    },

    CreateRequested {
        draft: RecordDraft,
    },
    UpdateRequested {
        id: RecordId,
        draft: RecordDraft,
    },
    /// `confirmed` is the answer to the confirmation prompt.
    DeleteRequested {
        id: RecordId,
        confirmed: bool,
    },
    MutationCompleted {
        op_id: OpId,
        result: HttpResult,
    },
    OutcomeDismissed,

    PreferencesSaveRequested {
        preferences: Preferences,
    },

    StorageWritten {
        key: String,
        result: KvResult,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Configure { .. } => "configure",
            Self::AppStarted => "app_started",
            Self::PreferencesLoaded { .. } => "preferences_loaded",
            Self::SessionRestored { .. } => "session_restored",
            Self::LoginRequested { .. } => "login_requested",
            Self::LogoutRequested => "logout_requested",
            Self::RefreshRequested => "refresh_requested",
            Self::RecordsFetched { .. } => "records_fetched",
            Self::SearchChanged { .. } => "search_changed",
            Self::SortChanged { .. } => "sort_changed",
            Self::PageChanged { .. } => "page_changed",
            Self::CreateRequested { .. } => "create_requested",
            Self::UpdateRequested { .. } => "update_requested",
            Self::DeleteRequested { .. } => "delete_requested",
            Self::MutationCompleted { .. } => "mutation_completed",
            Self::OutcomeDismissed => "outcome_dismissed",
            Self::PreferencesSaveRequested { .. } => "preferences_save_requested",
            Self::StorageWritten { .. } => "storage_written",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::LoginRequested { .. }
                | Self::LogoutRequested
                | Self::RefreshRequested
                | Self::SearchChanged { .. }
                | Self::SortChanged { .. }
                | Self::PageChanged { .. }
                | Self::CreateRequested { .. }
                | Self::UpdateRequested { .. }
                | Self::DeleteRequested { .. }
                | Self::OutcomeDismissed
                | Self::PreferencesSaveRequested { .. }
        )
    }

    /// Events that read or write the collection; ignored while signed out.
    #[must_use]
    pub const fn requires_session(&self) -> bool {
        matches!(
            self,
            Self::RefreshRequested
                | Self::CreateRequested { .. }
                | Self::UpdateRequested { .. }
                | Self::DeleteRequested { .. }
        )
    }
}
