use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capabilities::{Capabilities, HttpError, HttpRequest, HttpResult, KvResult};
use crate::collection::{self, CollectionClient, TransportError};
use crate::coordinator::{
    self, FieldError, MutationKind, MutationOutcome, MutationReport, PendingMutation,
};
use crate::event::Event;
use crate::model::{LoadSeq, LoadStatus, Model, SortOrder};
use crate::preferences::{PreferenceStore, Preferences};
use crate::projection::{self, Projection};
use crate::session::{self, SessionStore, User};
use crate::{AppError, UserFacingError};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeView {
    pub kind: MutationKind,
    pub success: bool,
    pub message: String,
    pub field_errors: Vec<FieldError>,
}

impl From<&MutationReport> for OutcomeView {
    fn from(report: &MutationReport) -> Self {
        let field_errors = match &report.outcome {
            MutationOutcome::Rejected(errors) => errors.iter().cloned().collect(),
            MutationOutcome::Succeeded(_) | MutationOutcome::Failed(_) => Vec::new(),
        };
        Self {
            kind: report.kind,
            success: report.is_success(),
            message: report.message(),
            field_errors,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub auth_error: Option<String>,
    pub status: LoadStatus,
    pub is_loading: bool,
    pub error: Option<UserFacingError>,
    pub using_fallback_data: bool,
    pub search_term: String,
    pub sort_order: SortOrder,
    pub table: Projection,
    pub showing_from: usize,
    pub showing_to: usize,
    pub has_previous_page: bool,
    pub has_next_page: bool,
    pub pending_mutations: usize,
    pub outcome: Option<OutcomeView>,
    pub preferences: Preferences,
    pub is_rtl: bool,
}

#[derive(Default)]
pub struct App {
    preference_store: PreferenceStore,
    session_store: SessionStore,
}

impl App {
    fn storage_written(key: String) -> impl FnOnce(KvResult) -> Event + Send + Sync + 'static {
        move |result| Event::StorageWritten { key, result }
    }

    fn start_load(model: &mut Model, caps: &Capabilities) {
        let seq = model.cache.begin_load();
        model.load_error = None;
        match CollectionClient::from_config(&model.config).and_then(|c| c.list_request()) {
            Ok(request) => {
                caps.send_http(request, move |result| Event::RecordsFetched { seq, result });
            }
            Err(e) => Self::records_fetched(seq, Err(e), model),
        }
    }

    fn records_fetched(seq: LoadSeq, result: HttpResult, model: &mut Model) {
        match collection::parse_list(result) {
            Ok(records) => {
                let count = records.len();
                if model.cache.load_succeeded(seq, records) {
                    model.load_error = None;
                    info!(%seq, count, "posts loaded");
                }
            }
            Err(e) => {
                let detail = e.to_string();
                if model.config.fallback_on_list_failure {
                    if model
                        .cache
                        .load_fallback(seq, collection::fallback_records(), detail.as_str())
                    {
                        model.load_error = None;
                        warn!(%seq, error = %detail, "list failed; serving sample posts");
                    }
                } else if model.cache.load_failed(seq, detail.as_str()) {
                    model.load_error = Some(AppError::from(e));
                    warn!(%seq, error = %detail, "list failed");
                }
            }
        }
    }

    fn dispatch_mutation(
        model: &mut Model,
        caps: &Capabilities,
        build: impl FnOnce(&CollectionClient) -> Result<HttpRequest, HttpError>,
        pending: PendingMutation,
    ) {
        let kind = pending.kind();
        match CollectionClient::from_config(&model.config).and_then(|client| build(&client)) {
            Ok(request) => {
                let op_id = model.pending.register(pending);
                caps.send_http(request, move |result| Event::MutationCompleted { op_id, result });
            }
            Err(e) => {
                let error = TransportError::from(e).into();
                model.last_outcome =
                    Some(MutationReport::new(kind, MutationOutcome::Failed(error)));
            }
        }
    }

    fn reject(model: &mut Model, kind: MutationKind, errors: coordinator::ValidationErrors) {
        debug!(?kind, errors = %errors, "draft rejected");
        model.last_outcome = Some(MutationReport::new(kind, MutationOutcome::Rejected(errors)));
    }

    fn current_total_pages(model: &Model) -> u32 {
        projection::project(model.cache.records(), &model.view).total_pages
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let event_name = event.name();
        debug!(event = event_name, "update");

        if event.is_user_initiated() {
            info!(event = event_name, "user action");
        }

        if event.requires_session() && !model.is_authenticated() {
            warn!(event = event_name, "ignored while signed out");
            return;
        }

        match event {
            Event::Noop => {}

            Event::Configure { config } => {
                match config.validate() {
                    Ok(base) => {
                        info!(base_url = %base, "collection endpoint configured");
                        model.config = config;
                    }
                    Err(e) => {
                        warn!(error = %e, "configuration refused; keeping the previous one");
                        model.load_error = Some(e.into());
                    }
                }
                caps.render.render();
            }

            Event::AppStarted => {
                caps.run_kv(self.preference_store.load_op(), |result| {
                    Event::PreferencesLoaded { result }
                });
                caps.run_kv(self.session_store.load_op(), |result| {
                    Event::SessionRestored { result }
                });
                caps.render.render();
            }

            Event::PreferencesLoaded { result } => {
                if model.preferences_edited {
                    debug!("stored preferences arrived after a save; ignored");
                    return;
                }
                model.preferences = self.preference_store.parse_loaded(result);
                model.view.set_page_size(model.preferences.page_size.get());
                caps.render.render();
            }

            Event::SessionRestored { result } => {
                if model.is_authenticated() {
                    debug!("session already established; stored session ignored");
                } else if let Some(session) = self.session_store.parse_loaded(result) {
                    if !session.looks_valid() {
                        warn!("restored session token has an unexpected shape");
                    }
                    info!(user_id = session.user.id, "session restored");
                    model.session = Some(session);
                    Self::start_load(model, caps);
                }
                caps.render.render();
            }

            Event::LoginRequested { email, password } => {
                match session::authenticate(&email, password.expose_secret()) {
                    Ok(session) => {
                        model.auth_error = None;
                        match self.session_store.save_op(&session) {
                            Ok(op) => {
                                let key = op.key().raw();
                                caps.run_kv(op, Self::storage_written(key));
                            }
                            Err(e) => warn!(error = %e, "could not persist session"),
                        }
                        info!(user_id = session.user.id, "signed in");
                        model.session = Some(session);
                        Self::start_load(model, caps);
                    }
                    Err(e) => {
                        warn!(error = %e, "sign-in rejected");
                        model.auth_error = Some(e.to_string());
                    }
                }
                caps.render.render();
            }

            Event::LogoutRequested => {
                let op = self.session_store.clear_op();
                let key = op.key().raw();
                caps.run_kv(op, Self::storage_written(key));
                model.end_session();
                info!("signed out");
                caps.render.render();
            }

            Event::RefreshRequested => {
                Self::start_load(model, caps);
                caps.render.render();
            }

            Event::RecordsFetched { seq, result } => {
                Self::records_fetched(seq, result, model);
                caps.render.render();
            }

            Event::SearchChanged { term } => {
                model.view.set_search_term(term);
                caps.render.render();
            }

            Event::SortChanged { order } => {
                model.view.set_sort_order(order);
                caps.render.render();
            }

            Event::PageChanged { page } => {
                model.view.set_page(page);
                let total_pages = Self::current_total_pages(model);
                model.view.clamp_page(total_pages);
                caps.render.render();
            }

            Event::CreateRequested { draft } => {
                match coordinator::validate(&draft) {
                    Ok(draft) => Self::dispatch_mutation(
                        model,
                        caps,
                        |client| client.create_request(&draft),
                        PendingMutation::Create {
                            draft: draft.clone(),
                        },
                    ),
                    Err(errors) => Self::reject(model, MutationKind::Create, errors),
                }
                caps.render.render();
            }

            Event::UpdateRequested { id, draft } => {
                match coordinator::validate(&draft) {
                    Ok(draft) => Self::dispatch_mutation(
                        model,
                        caps,
                        |client| client.update_request(id, &draft),
                        PendingMutation::Update {
                            id,
                            draft: draft.clone(),
                        },
                    ),
                    Err(errors) => Self::reject(model, MutationKind::Update, errors),
                }
                caps.render.render();
            }

            Event::DeleteRequested { id, confirmed } => {
                if !confirmed {
                    debug!(%id, "delete cancelled at confirmation");
                    return;
                }
                if model.pending.is_deleting(id) {
                    debug!(%id, "delete already in flight");
                    return;
                }
                Self::dispatch_mutation(
                    model,
                    caps,
                    |client| client.remove_request(id),
                    PendingMutation::Delete { id },
                );
                caps.render.render();
            }

            Event::MutationCompleted { op_id, result } => {
                let Some(pending) = model.pending.take(op_id) else {
                    return;
                };
                let kind = pending.kind();
                let outcome = pending.complete(&mut model.cache, result);
                let removed = matches!(outcome, MutationOutcome::Succeeded(_));
                if kind == MutationKind::Delete && removed {
                    let total_pages = Self::current_total_pages(model);
                    model.view.clamp_page(total_pages);
                }
                model.last_outcome = Some(MutationReport::new(kind, outcome));
                caps.render.render();
            }

            Event::OutcomeDismissed => {
                model.last_outcome = None;
                caps.render.render();
            }

            Event::PreferencesSaveRequested { preferences } => {
                model.preferences = preferences;
                model.preferences_edited = true;
                model.view.set_page_size(preferences.page_size.get());
                match self.preference_store.save_ops(&preferences) {
                    Ok(ops) => {
                        for op in ops {
                            let key = op.key().raw();
                            caps.run_kv(op, Self::storage_written(key));
                        }
                    }
                    Err(e) => warn!(error = %e, "could not encode preferences"),
                }
                caps.render.render();
            }

            Event::StorageWritten { key, result } => match result {
                Ok(_) => debug!(%key, "storage write done"),
                Err(e) => warn!(%key, error = %e, "storage write failed"),
            },
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let table = projection::project(model.cache.records(), &model.view);
        let (showing_from, showing_to) = table.showing_range();
        let has_previous_page = table.has_previous();
        let has_next_page = table.has_next();

        ViewModel {
            is_authenticated: model.is_authenticated(),
            user: model.session.as_ref().map(|s| s.user.clone()),
            auth_error: model.auth_error.clone(),
            status: model.cache.status(),
            is_loading: model.cache.status() == LoadStatus::Loading,
            error: model.load_error.as_ref().map(UserFacingError::from),
            using_fallback_data: model.cache.using_fallback_data(),
            search_term: model.view.search_term().to_string(),
            sort_order: model.view.sort_order(),
            table,
            showing_from,
            showing_to,
            has_previous_page,
            has_next_page,
            pending_mutations: model.pending.len(),
            outcome: model.last_outcome.as_ref().map(OutcomeView::from),
            preferences: model.preferences,
            is_rtl: model.preferences.locale.is_rtl(),
        }
    }
}
