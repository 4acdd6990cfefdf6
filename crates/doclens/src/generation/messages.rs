//! User-facing fixed messages, localized per answer language

use crate::types::Language;

/// Returned instead of an answer when embedding, retrieval or generation failed
pub fn degraded_answer(lang: Language) -> &'static str {
    match lang {
        Language::Fr => "Désolé, je ne peux pas répondre pour le moment : le service de réponse est indisponible. Veuillez réessayer plus tard.",
        Language::En => "Sorry, I can't answer right now: the answering service is unavailable. Please try again later.",
        Language::Es => "Lo siento, no puedo responder en este momento: el servicio de respuestas no está disponible. Inténtelo de nuevo más tarde.",
        Language::Ar => "عذرًا، لا يمكنني الإجابة الآن: خدمة الإجابة غير متاحة حاليًا. يرجى المحاولة لاحقًا.",
    }
}

/// Returned when the question is blank
pub fn empty_question(lang: Language) -> &'static str {
    match lang {
        Language::Fr => "Veuillez saisir une question.",
        Language::En => "Please enter a question.",
        Language::Es => "Por favor, escriba una pregunta.",
        Language::Ar => "يرجى إدخال سؤال.",
    }
}
