//! Best-effort translation of the user's question into English.

use tracing::warn;

use super::StageOutcome;
use crate::ports::TranslationService;

/// Translates `text` to English. Any failure, including an empty reply, yields
/// the input unchanged. No retries.
pub async fn translate(service: &dyn TranslationService, text: &str) -> StageOutcome<String> {
    match service.translate_to_english(text).await {
        Ok(translated) if !translated.trim().is_empty() => {
            StageOutcome::Complete(translated.trim().to_string())
        }
        Ok(_) => {
            warn!("translation returned an empty result, keeping the original text");
            StageOutcome::Degraded(text.to_string())
        }
        Err(e) => {
            warn!("translation unavailable, keeping the original text: {}", e);
            StageOutcome::Degraded(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTranslator;
    use futures::executor::block_on;

    #[test]
    fn returns_input_when_backend_is_down() {
        let translator = FakeTranslator::failing();
        let outcome = block_on(translate(&translator, "dolor lumbar agudo"));
        assert_eq!(outcome, StageOutcome::Degraded("dolor lumbar agudo".to_string()));
    }

    #[test]
    fn empty_translation_is_treated_as_failure() {
        let translator = FakeTranslator::replying("   ");
        let outcome = block_on(translate(&translator, "esguince de tobillo"));
        assert_eq!(outcome.into_value(), "esguince de tobillo");
    }

    #[test]
    fn successful_translation_is_trimmed() {
        let translator = FakeTranslator::replying(" ankle sprain \n");
        let outcome = block_on(translate(&translator, "esguince de tobillo"));
        assert_eq!(outcome, StageOutcome::Complete("ankle sprain".to_string()));
    }
}
