//! Keyword intent classification over a Spanish lexicon.
//!
//! Predicates may overlap; the orchestrator decides using the current step.
//! Patterns favour precision, since a false positive redirects the whole
//! conversation while a miss only falls through to the AI responder.
//!
//! Every predicate expects text already passed through [`normalize`].

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid intent regex")
}

static BOOKING_RE: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"\b(reservar|reserva una|agendar|agendame|pedir (una )?(cita|demo)|quiero (una )?(cita|demo|demostracion|reunion)|ver (una )?demo|probar(lo)? (el|la)? ?(software|programa|plataforma)|hacer una demo|solicitar (una )?demo)\b",
    )
});

static RESCHEDULE_RE: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"\b(reprogramar|reagendar|aplazar|posponer|cambiar (la|mi|de)? ?(cita|reserva|demo|hora|fecha|dia)|mover (la|mi) (cita|reserva|demo)|otro horario|otra hora|otro dia)\b",
    )
});

static CANCEL_RE: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(cancelar|cancela|cancelame|cancelala|anular|anula|anulala|ya no (puedo|podre) (ir|asistir|conectarme))\b")
});

// A negation a few words before the cancel verb.
static CANCEL_NEGATED_RE: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(no|nunca|tampoco)\s+(\w+\s+){0,2}(cancelar|cancela|cancelame|cancelala|anular|anula|anulala)\b")
});

// Asking about cancellation is not asking for it.
static CANCEL_QUESTION_RE: Lazy<Regex> = Lazy::new(|| {
    compile(r"[?¿]|\b(puedo|podria|se puede|es posible|como|cuando|que pasa si)\s+(\w+\s+){0,2}(cancelar|cancela|anular|anula)\b")
});

/// Lower-cases and strips Spanish diacritics so the lexicon stays ASCII.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

pub fn wants_booking(text: &str) -> bool {
    BOOKING_RE.is_match(text)
}

pub fn wants_reschedule(text: &str) -> bool {
    RESCHEDULE_RE.is_match(text)
}

/// Cancelling is destructive, so only a plain request counts: negated
/// ("no quiero cancelar") and interrogative forms never do.
pub fn wants_cancel(text: &str) -> bool {
    CANCEL_RE.is_match(text) && !CANCEL_NEGATED_RE.is_match(text) && !CANCEL_QUESTION_RE.is_match(text)
}

pub fn is_affirmative(text: &str) -> bool {
    AFFIRMATIVE_RE.is_match(text)
}

pub fn is_negative(text: &str) -> bool {
    NEGATIVE_RE.is_match(text)
}

pub fn is_objection(text: &str) -> bool {
    OBJECTION_RE.is_match(text)
}

pub fn is_service_question(text: &str) -> bool {
    SERVICE_RE.is_match(text)
}

pub fn is_greeting(text: &str) -> bool {
    GREETING_RE.is_match(text)
}

/// Everything the orchestrator needs to know about one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub booking: bool,
    pub reschedule: bool,
    pub cancel: bool,
    pub affirmative: bool,
    pub negative: bool,
    pub objection: bool,
    pub service_question: bool,
    pub greeting: bool,
}

pub trait Classifier: Send + Sync {
    fn signals(&self, text: &str) -> Signals;
}

/// Regex lexicon classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn signals(&self, text: &str) -> Signals {
        let text = normalize(text);
        Signals {
            booking: wants_booking(&text),
            reschedule: wants_reschedule(&text),
            cancel: wants_cancel(&text),
            affirmative: is_affirmative(&text),
            negative: is_negative(&text),
            objection: is_objection(&text),
            service_question: is_service_question(&text),
            greeting: is_greeting(&text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(text: &str) -> String {
        normalize(text)
    }

    #[test]
    fn test_normalize_strips_accents() {
        assert_eq!(normalize("Sí, DEMOSTRACIÓN mañana"), "si, demostracion manana");
    }

    #[test]
    fn test_booking_intent() {
        assert!(wants_booking(&n("Quiero reservar una demo")));
        assert!(wants_booking(&n("¿Puedo agendar una demostración?")));
        assert!(!wants_booking(&n("hola, ¿qué tal?")));
        assert!(!wants_booking(&n("tengo una reserva ya hecha")));
    }

    #[test]
    fn test_reschedule_and_cancel_intent() {
        assert!(wants_reschedule(&n("necesito cambiar la cita")));
        assert!(wants_reschedule(&n("¿podemos reprogramar?")));
        assert!(wants_reschedule(&n("mejor otro día")));
        assert!(!wants_reschedule(&n("quiero reservar")));

        assert!(wants_cancel(&n("quiero cancelar mi demo")));
        assert!(wants_cancel(&n("Anula la reserva por favor")));
        assert!(wants_cancel(&n("ya no puedo ir, cancélala")));
        assert!(wants_cancel(&n("ya no puedo asistir así que cancela la demo")));
        assert!(!wants_cancel(&n("no quiero nada más")));
    }

    #[test]
    fn test_cancel_ignores_negations_and_questions() {
        assert!(!wants_cancel(&n("no quiero cancelar, solo preguntaba")));
        assert!(!wants_cancel(&n("No voy a cancelar nada")));
        assert!(!wants_cancel(&n("tampoco quiero anular la demo")));
        assert!(!wants_cancel(&n("¿puedo cancelar?")));
        assert!(!wants_cancel(&n("¿hasta cuándo puedo cancelar sin coste?")));
        assert!(!wants_cancel(&n("como se cancela una demo")));
        assert!(!KeywordClassifier.signals("no quiero cancelar").cancel);
    }

    #[test]
    fn test_yes_no() {
        assert!(is_affirmative(&n("si")));
        assert!(is_affirmative(&n("Sí, correcto")));
        assert!(is_affirmative(&n("ok!")));
        assert!(!is_affirmative(&n("simplemente no")));
        assert!(is_negative(&n("no")));
        assert!(is_negative(&n("No, eso es todo")));
        assert!(!is_negative(&n("nos vemos")));
        assert!(!is_negative(&n("si")));
    }

    #[test]
    fn test_objections() {
        assert!(is_objection(&n("me parece muy caro")));
        assert!(is_objection(&n("ahora no tengo tiempo")));
        assert!(is_objection(&n("ya tengo un software")));
        assert!(!is_objection(&n("¿cuánto cuesta?")));
    }

    #[test]
    fn test_service_questions_and_greetings() {
        assert!(is_service_question(&n("¿Cuánto cuesta el plan básico?")));
        assert!(is_service_question(&n("¿Tiene recordatorios por WhatsApp?")));
        assert!(!is_service_question(&n("hola")));
        assert!(is_greeting(&n("hola")));
        assert!(is_greeting(&n("Buenas tardes!")));
        assert!(!is_greeting(&n("tengo una clínica")));
    }

    #[test]
    fn test_signals_can_overlap() {
        let signals = KeywordClassifier.signals("hola, quiero cancelar");
        assert!(signals.greeting);
        assert!(signals.cancel);
        assert!(!signals.booking);
    }
}
