// src/speech/preview.rs — Voice preview cache
//
// Previews are keyed by provider + voice + language, so listening to the same
// voice twice costs one synthesis call. Independent previews may be generated
// a few at a time; chunk conversion itself is always sequential.

use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::{ProviderKind, SpeechBackend, Voice};
use crate::infra::errors::VoxbookError;

/// Content-addressed cache key for a preview sample.
pub fn cache_key(provider: ProviderKind, voice: &str, language: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.id().as_bytes());
    hasher.update(b"/");
    hasher.update(voice.as_bytes());
    hasher.update(b"/");
    hasher.update(language.unwrap_or("en").as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", provider.id(), &digest[..16])
}

/// Canonical sample sentence for a language tag such as `en`, `de_DE`, `pt-BR`.
pub fn preview_phrase(language: Option<&str>) -> &'static str {
    let lang = language
        .and_then(|l| l.split(['_', '-']).next())
        .map(|l| l.to_ascii_lowercase())
        .unwrap_or_default();
    match lang.as_str() {
        "es" => "Hola, esta es una muestra de mi voz para tu audiolibro.",
        "fr" => "Bonjour, voici un extrait de ma voix pour votre livre audio.",
        "de" => "Hallo, dies ist eine Hörprobe meiner Stimme für Ihr Hörbuch.",
        "it" => "Ciao, questo è un esempio della mia voce per il tuo audiolibro.",
        "pt" => "Olá, esta é uma amostra da minha voz para o seu audiolivro.",
        "nl" => "Hallo, dit is een voorbeeld van mijn stem voor je luisterboek.",
        "pl" => "Cześć, to jest próbka mojego głosu do twojego audiobooka.",
        "ru" => "Здравствуйте, это образец моего голоса для вашей аудиокниги.",
        _ => "Hello, this is a sample of my voice reading your audiobook.",
    }
}

/// Generate previews for `voices` with at most `concurrency` in flight.
/// Results come back in the order of `voices`.
pub async fn preview_many(
    backend: &dyn SpeechBackend,
    voices: &[Voice],
    cache_dir: &Path,
    concurrency: usize,
) -> Vec<(String, Result<PathBuf, VoxbookError>)> {
    let mut results: Vec<(usize, String, Result<PathBuf, VoxbookError>)> =
        stream::iter(voices.iter().enumerate())
            .map(|(i, voice)| async move {
                let result = backend.preview_voice(voice, cache_dir).await;
                (i, voice.id.clone(), result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    results.sort_by_key(|(i, _, _)| *i);
    results.into_iter().map(|(_, id, r)| (id, r)).collect()
}
