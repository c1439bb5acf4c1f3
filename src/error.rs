use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotInitialized,
    NoActiveFirm,
    FirmNotFound,
    ClientNotFound,
    ClientInactive,
    TemplateNotFound,
    ProjectNotFound,
    TaskNotFound,
    StageNotFound,
    AmbiguousRef,
    EmptyTemplate,
    UnknownRecurrenceRule,
    CycleDetected,
    InvalidDependencyScope,
    StaleCascade,
    ValidationError,
    DatabaseError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::NoActiveFirm => "NO_ACTIVE_FIRM",
            Self::FirmNotFound => "FIRM_NOT_FOUND",
            Self::ClientNotFound => "CLIENT_NOT_FOUND",
            Self::ClientInactive => "CLIENT_INACTIVE",
            Self::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::StageNotFound => "STAGE_NOT_FOUND",
            Self::AmbiguousRef => "AMBIGUOUS_REF",
            Self::EmptyTemplate => "EMPTY_TEMPLATE",
            Self::UnknownRecurrenceRule => "UNKNOWN_RECURRENCE_RULE",
            Self::CycleDetected => "CYCLE_DETECTED",
            Self::InvalidDependencyScope => "INVALID_DEPENDENCY_SCOPE",
            Self::StaleCascade => "STALE_CASCADE",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct FirmflowError {
    pub code: ErrorCode,
    pub message: String,
}

impl FirmflowError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_initialized() -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            "firmflow is not initialized. Run `firmflow init` first.",
        )
    }

    pub fn no_active_firm() -> Self {
        Self::new(
            ErrorCode::NoActiveFirm,
            "No active firm. Use `firmflow firm use <name>` or `--firm <name>`.",
        )
    }

    pub fn firm_not_found(reference: &str) -> Self {
        Self::new(ErrorCode::FirmNotFound, format!("Firm not found: {reference}"))
    }

    pub fn client_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::ClientNotFound,
            format!("Client not found: {reference}"),
        )
    }

    pub fn client_inactive(name: &str) -> Self {
        Self::new(
            ErrorCode::ClientInactive,
            format!("Client '{name}' is inactive and cannot receive new projects"),
        )
    }

    pub fn template_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::TemplateNotFound,
            format!("Template not found: {reference}"),
        )
    }

    pub fn project_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::ProjectNotFound,
            format!("Project not found: {reference}"),
        )
    }

    pub fn task_not_found(reference: &str) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("Task not found: {reference}"))
    }

    pub fn stage_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::StageNotFound,
            format!("Workflow stage not found: {reference}"),
        )
    }

    pub fn ambiguous_ref(reference: &str, candidates: &[String]) -> Self {
        Self::new(
            ErrorCode::AmbiguousRef,
            format!(
                "Ambiguous reference '{}'. Candidates: {}",
                reference,
                candidates.join(", ")
            ),
        )
    }

    pub fn empty_template(name: &str) -> Self {
        Self::new(
            ErrorCode::EmptyTemplate,
            format!("Template '{name}' has no tasks; nothing to compile"),
        )
    }

    pub fn unknown_recurrence_rule(rule: &str) -> Self {
        Self::new(
            ErrorCode::UnknownRecurrenceRule,
            format!("Unknown recurrence rule: '{rule}'"),
        )
    }

    pub fn cycle_detected(task_id: &str, depends_on_id: &str) -> Self {
        Self::new(
            ErrorCode::CycleDetected,
            format!("Dependency {task_id} -> {depends_on_id} would create a cycle"),
        )
    }

    pub fn invalid_dependency_scope() -> Self {
        Self::new(
            ErrorCode::InvalidDependencyScope,
            "Dependencies across firms are not allowed",
        )
    }

    pub fn stale_cascade(task_id: &str) -> Self {
        Self::new(
            ErrorCode::StaleCascade,
            format!("Task {task_id} was modified concurrently during a cascade"),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl From<rusqlite::Error> for FirmflowError {
    fn from(e: rusqlite::Error) -> Self {
        Self::database(e.to_string())
    }
}
