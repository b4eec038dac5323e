//! services/api/src/adapters/message_llm.rs
//!
//! This module contains the adapter for the message-generating LLM.
//! It implements the `MessageGenerationService` port from the `core` crate,
//! speaking as Célia, the program's mentor.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use florescer_core::{
    domain::{GenerationContext, MessageKind, PROGRAM_LENGTH_DAYS},
    ports::{MessageGenerationService, PortError, PortResult},
};
use tracing::debug;

const RITUAL_SYSTEM_PROMPT: &str = "Você é Célia, uma especialista em menopausa que atua como mentora e guia pessoal no aplicativo Florescer. \
Seu tom de voz é acolhedor, empático e encorajador. Você usa linguagem acessível e calorosa, como se fosse uma amiga sábia. \
Gere mensagens personalizadas para o ritual diário do usuário, adaptadas para o humor atual dela.";

const CELIA_SYSTEM_PROMPT: &str = "Você é Célia, uma especialista em menopausa que atua como mentora e guia pessoal no aplicativo Florescer. \
Seu tom de voz é acolhedor, empático, com um toque de sabedoria espiritual sem ser religiosa. \
Gere frases terapêuticas e inspiradoras sobre autoconhecimento, autoaceitação e bem-estar.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `MessageGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiMessageAdapter {
    /// `None` when no API key is configured; every call then fails.
    client: Option<Client<OpenAIConfig>>,
    model: String,
    temperature: f32,
}

impl OpenAiMessageAdapter {
    pub fn new(client: Option<Client<OpenAIConfig>>, model: String, temperature: f32) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }
}

/// Builds the `(system, user)` prompt pair for one request.
pub fn build_prompts(context: &GenerationContext) -> (&'static str, String) {
    let mood = context.mood.as_ref().map(|m| m.as_str()).unwrap_or("em equilíbrio");
    let profile_line = context
        .quiz_result
        .map(|q| format!("\nEla está no perfil \"{}\" de menopausa.", q.label()))
        .unwrap_or_default();

    match context.kind {
        MessageKind::Ritual => (
            RITUAL_SYSTEM_PROMPT,
            format!(
                "Crie uma mensagem emocional personalizada para uma mulher na menopausa que está se sentindo \"{mood}\".{profile_line}\n\
                 Esta é para o dia {day} de um programa de {total} dias.\n\
                 A mensagem deve ser curta (máximo 3 frases), direta, acolhedora e motivadora.\n\
                 NÃO inclua cumprimentos como \"Olá\" ou \"Querida\".\n\
                 NÃO assine a mensagem.",
                day = context.day_number,
                total = PROGRAM_LENGTH_DAYS,
            ),
        ),
        MessageKind::Celia => {
            let name_line = context
                .user_name
                .as_deref()
                .map(|name| format!("\nSeu nome é {}.", name))
                .unwrap_or_default();
            (
                CELIA_SYSTEM_PROMPT,
                format!(
                    "Crie uma frase terapêutica ou inspiradora para uma mulher na menopausa que está se sentindo \"{mood}\" hoje.{profile_line}{name_line}\n\
                     Esta deve ser uma frase curta (máximo 2 frases), profunda e significativa, que possa ser facilmente memorizada.\n\
                     A frase deve trazer conforto, inspiração ou uma nova perspectiva sobre o momento que ela está vivendo.\n\
                     NÃO inclua cumprimentos no início ou assinatura no final."
                ),
            )
        }
    }
}

//=========================================================================================
// `MessageGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl MessageGenerationService for OpenAiMessageAdapter {
    async fn generate(&self, context: &GenerationContext) -> PortResult<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PortError::Unavailable("OPENAI_API_KEY is not configured".to_string()))?;

        let (system_prompt, user_prompt) = build_prompts(context);
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(kind = context.kind.as_str(), day = context.day_number, "Requesting generated message");
        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| match e {
                OpenAIError::Reqwest(_) => PortError::Unavailable(e.to_string()),
                _ => PortError::Unexpected(e.to_string()),
            })?;

        // An empty completion is passed through; callers decide what to show instead.
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default())
    }
}
