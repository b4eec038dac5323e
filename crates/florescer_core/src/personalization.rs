//! crates/florescer_core/src/personalization.rs
//!
//! Turns a `GenerationContext` into a message for the user. A remote generator
//! is tried once; whatever goes wrong, the caller still gets a static message
//! chosen by kind and mood.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{GeneratedMessage, GenerationContext, MessageKind, Mood};
use crate::ports::MessageGenerationService;

/// Returned by the generation service itself when it cannot do better.
pub const SERVER_GENERIC_MESSAGE: &str =
    "Sua jornada é única e valiosa. Confie no processo de transformação.";

//=========================================================================================
// Static fallback table
//=========================================================================================

/// Pre-authored message for a known `(kind, mood)`; `None` for unrecognized moods.
pub fn fallback_for(kind: MessageKind, mood: &Mood) -> Option<&'static str> {
    let text = match (kind, mood) {
        (MessageKind::Ritual, Mood::Cansada) => {
            "Hoje, permita-se descansar sem culpa. Seu corpo está pedindo uma pausa."
        }
        (MessageKind::Ritual, Mood::Aflita) => {
            "Respire fundo. A ansiedade é como uma onda - ela vem, mas também vai embora."
        }
        (MessageKind::Ritual, Mood::Sensivel) => {
            "Hoje, permita-se acolher suas emoções com gentileza."
        }
        (MessageKind::Ritual, Mood::Irritada) => {
            "Sua irritação tem algo a ensinar. Observe-a com curiosidade, não julgamento."
        }
        (MessageKind::Ritual, Mood::Esperancosa) => {
            "Esse brilho em você ilumina seu caminho. Celebre a esperança."
        }
        (MessageKind::Celia, Mood::Cansada) => {
            "O descanso não é preguiça, é parte essencial da sua força."
        }
        (MessageKind::Celia, Mood::Aflita) => {
            "Cada respiração profunda é um lembrete: você está segura neste momento."
        }
        (MessageKind::Celia, Mood::Sensivel) => {
            "Sua sensibilidade é um dom que permite que você sinta o mundo de formas que outros não conseguem."
        }
        (MessageKind::Celia, Mood::Irritada) => {
            "A irritação pede para ser ouvida, não para controlar suas escolhas."
        }
        (MessageKind::Celia, Mood::Esperancosa) => {
            "Esperança é plantar sementes mesmo quando não se vê flores."
        }
        (_, Mood::Unrecognized(_)) => return None,
    };
    Some(text)
}

/// Mood-independent message of each kind.
pub fn generic_fallback(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Ritual => "A cada dia, uma nova oportunidade de se reconectar consigo mesma.",
        MessageKind::Celia => {
            "Você é mais forte do que pensa, mais sábia do que acredita, e mais amada do que imagina."
        }
    }
}

/// Shown before the user has picked a mood.
pub fn no_mood_default(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Ritual => "A cada dia, uma nova oportunidade de se reconectar consigo mesma.",
        MessageKind::Celia => {
            "Você não precisa carregar o mundo sozinha. Permita-se receber ajuda e apoio."
        }
    }
}

fn static_message(kind: MessageKind, mood: &Mood) -> GeneratedMessage {
    GeneratedMessage::from_static(fallback_for(kind, mood).unwrap_or_else(|| generic_fallback(kind)))
}

//=========================================================================================
// Pipeline
//=========================================================================================

/// The personalization pipeline. Read-only: it never touches stored state.
#[derive(Clone)]
pub struct Personalizer {
    generator: Arc<dyn MessageGenerationService>,
}

impl Personalizer {
    pub fn new(generator: Arc<dyn MessageGenerationService>) -> Self {
        Self { generator }
    }

    /// Always resolves to a non-empty message. Errors are logged and absorbed.
    pub async fn personalize(&self, context: &GenerationContext) -> GeneratedMessage {
        let Some(mood) = &context.mood else {
            debug!(kind = context.kind.as_str(), "No mood set, using default message");
            return GeneratedMessage::from_static(no_mood_default(context.kind));
        };

        match self.generator.generate(context).await {
            Ok(raw) => match GeneratedMessage::from_raw(&raw) {
                Some(message) => message,
                None => {
                    warn!(
                        kind = context.kind.as_str(),
                        mood = %mood,
                        "Message generator returned empty content, using fallback"
                    );
                    static_message(context.kind, mood)
                }
            },
            Err(e) => {
                warn!(
                    kind = context.kind.as_str(),
                    mood = %mood,
                    error = %e,
                    "Message generation failed, using fallback"
                );
                static_message(context.kind, mood)
            }
        }
    }
}
