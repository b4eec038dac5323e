pub mod domain;
pub mod events;
pub mod notify;
pub mod personalization;
pub mod ports;
pub mod profile;
pub mod program;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{
    AuthUser, EmotionalRecord, GeneratedMessage, GenerationContext, MessageKind, Mood, ProfilePatch, QuizResult,
    Session, UserCredentials, UserProfile, PROGRAM_LENGTH_DAYS,
};
pub use events::{SessionChangeHub, SessionEvent, SessionListener, Subscription};
pub use notify::{AccountOperation, BroadcastNotifier, Notice, NoticeLevel};
pub use personalization::{Personalizer, SERVER_GENERIC_MESSAGE};
pub use ports::{
    AccountRepository, AuthError, AuthProvider, MessageGenerationService, Notifier, PortError, PortResult,
    ProfileStore, SignIn,
};
pub use program::{Completion, RitualProgress, SaveOutcome};
pub use session::{
    AuthState, ErrorClass, Landing, ProfileUpdate, SessionError, SessionManager, SessionSnapshot, SignUpOutcome,
};
