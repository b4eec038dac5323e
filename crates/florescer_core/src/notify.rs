//! crates/florescer_core/src/notify.rs
//!
//! The dismissible status messages shown to the user after an operation, and
//! the stock texts for the account operations.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::ports::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A transient notification. Never blocks the user's flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, description)
    }
}

/// The account operations that report their outcome to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOperation {
    Login,
    Register,
    Logout,
    Update,
}

impl AccountOperation {
    pub fn succeeded(self) -> Notice {
        let (title, description) = match self {
            AccountOperation::Login => ("Login bem-sucedido", "Bem-vinda de volta ao Florescer!"),
            AccountOperation::Register => (
                "Registro bem-sucedido",
                "Por favor, verifique seu email para confirmar sua conta.",
            ),
            AccountOperation::Logout => ("Logout bem-sucedido", "Esperamos ver você em breve!"),
            AccountOperation::Update => (
                "Dados atualizados",
                "Suas informações foram atualizadas com sucesso.",
            ),
        };
        Notice::success(title, description)
    }

    /// Error notice; `detail` replaces the generic description when given.
    pub fn failed(self, detail: Option<&str>) -> Notice {
        let (title, fallback) = match self {
            AccountOperation::Login => ("Erro ao fazer login", "Email ou senha incorretos."),
            AccountOperation::Register => (
                "Erro ao registrar",
                "Não foi possível criar sua conta. Tente novamente.",
            ),
            AccountOperation::Logout => (
                "Erro ao fazer logout",
                "Ocorreu um erro ao tentar sair. Tente novamente.",
            ),
            AccountOperation::Update => (
                "Erro ao atualizar dados",
                "Não foi possível atualizar suas informações.",
            ),
        };
        Notice::error(title, detail.unwrap_or(fallback))
    }
}

/// Fans notices out to every UI surface that subscribed.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notice>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notice: Notice) {
        // No receiver means no screen is open; the notice is simply dropped.
        let _ = self.sender.send(notice);
    }
}
