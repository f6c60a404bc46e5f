//! Scripted sales copy, kept as data so the dialogue flow stays
//! independent of wording. Every field can be overridden from JSON.

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const QUALIFICATION_STAGES: usize = 6;
pub const MAX_OBJECTION_ATTEMPTS: u8 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationScript {
    /// Asked in order while `qualificationStage` is below the stage count.
    pub qualification: Vec<String>,
    pub continuity_prefix: String,
    pub objection_rebuttals: Vec<String>,
    pub objection_exhausted: String,
    pub roi_calculator_prompt: String,
    pub calendar_handoff: String,
    pub ask_booking_id: String,
    pub booking_not_found: String,
    pub ask_city: String,
    pub city_ack: String,
    pub offer_slots: String,
    pub no_availability: String,
    pub invalid_slot_choice: String,
    pub slot_taken: String,
    pub ask_email: String,
    pub invalid_email: String,
    pub confirm_email: String,
    pub retry_email: String,
    pub ask_phone: String,
    pub invalid_phone: String,
    pub confirm_phone: String,
    pub retry_phone: String,
    pub yes_or_no: String,
    pub rescheduled: String,
    pub cancelled: String,
    pub nothing_to_cancel: String,
    pub more_help_close: String,
    pub more_help_prompt: String,
    pub service_answer: String,
    pub ai_fallback: String,
    pub error_reply: String,
}

impl Default for ConversationScript {
    fn default() -> Self {
        Self {
            qualification: vec![
                "¡Hola! Soy del equipo de VetChat. Para orientarte mejor, ¿tienes una clínica veterinaria o trabajas en una?".to_string(),
                "Genial. ¿Cuántos veterinarios sois en la clínica, más o menos?".to_string(),
                "¿Cómo gestionáis hoy las citas: teléfono, WhatsApp o algún programa?".to_string(),
                "¿Cuántas citas se os quedan sin presentarse a la semana, aproximadamente?".to_string(),
                "Con esos datos, la calculadora de ROI te muestra cuánto recuperaríais con recordatorios automáticos. ¿Quieres probarla?".to_string(),
                "Cuando tengas el cálculo, te enseño en una demo de 30 minutos cómo funcionaría en tu clínica. ¿Te parece?".to_string(),
            ],
            continuity_prefix: "Entendido ({context}). ".to_string(),
            objection_rebuttals: vec![
                "Lo entiendo. Por eso la demo es gratuita y dura solo 30 minutos: ves si encaja sin compromiso. ¿Le damos una oportunidad?".to_string(),
                "Tiene sentido. La mayoría de clínicas recupera la inversión con las citas que dejan de perderse el primer mes. ¿Quieres ver los números con la calculadora?".to_string(),
                "Claro. VetChat convive con tu programa actual, no hace falta cambiar nada el primer día. ¿Te cuento cómo se conecta?".to_string(),
                "Sin problema. Si quieres, te dejo la calculadora de ROI para que la mires cuando te venga bien. ¿Te parece?".to_string(),
            ],
            objection_exhausted: "Perfecto, no insisto más. Si en algún momento quieres retomarlo, escríbeme por aquí.".to_string(),
            roi_calculator_prompt: "Antes de hablar de horarios necesito que completes la calculadora de ROI, así la demo se adapta a tu clínica. Te la abro ahora.".to_string(),
            calendar_handoff: "¡Genial! Te abro el calendario para que elijas el hueco que mejor te venga para la demo.".to_string(),
            ask_booking_id: "Claro. ¿Me pasas el código de tu reserva? Lo tienes en el email de confirmación.".to_string(),
            booking_not_found: "No encuentro ninguna reserva activa con ese código. ¿Puedes revisarlo y enviármelo de nuevo?".to_string(),
            ask_city: "¿Desde qué ciudad te conectarás a la demo?".to_string(),
            city_ack: "Apuntado, {city}. ".to_string(),
            offer_slots: "Estos son los próximos huecos disponibles (hora peninsular):\n{slots}\nResponde con el número de la opción que prefieras.".to_string(),
            no_availability: "Ahora mismo no veo huecos libres en las próximas semanas. Te escribimos en cuanto se libere alguno.".to_string(),
            invalid_slot_choice: "No he entendido la opción. Responde con el número del horario:\n{slots}".to_string(),
            slot_taken: "Vaya, ese horario se acaba de ocupar. Te propongo estos otros:\n{slots}\nResponde con el número que prefieras.".to_string(),
            ask_email: "Perfecto, {date} a las {time}. ¿A qué email te envío la confirmación?".to_string(),
            invalid_email: "Ese email no parece válido. ¿Puedes escribirlo de nuevo?".to_string(),
            confirm_email: "¿Confirmas que tu email es {email}?".to_string(),
            retry_email: "Vale, ¿cuál es el email correcto?".to_string(),
            ask_phone: "Gracias. ¿Y un teléfono de contacto por si hubiera algún imprevisto?".to_string(),
            invalid_phone: "Ese teléfono no parece válido. ¿Me lo escribes con el prefijo?".to_string(),
            confirm_phone: "¿Confirmas que tu teléfono es {phone}?".to_string(),
            retry_phone: "Sin problema, ¿cuál es el teléfono correcto?".to_string(),
            yes_or_no: "Perdona, ¿me confirmas con un sí o un no?".to_string(),
            rescheduled: "¡Listo! Tu demo queda el {date} a las {time}. Te acabo de enviar la confirmación por email. ¿Puedo ayudarte con algo más?".to_string(),
            cancelled: "Hecho, he cancelado tu demo. Si quieres volver a reservar, aquí me tienes.".to_string(),
            nothing_to_cancel: "No encuentro ninguna demo activa que cancelar. Si tienes el código de la reserva, pásamelo.".to_string(),
            more_help_close: "¡Perfecto! Nos vemos en la demo. Que vaya muy bien el día.".to_string(),
            more_help_prompt: "Cuéntame, ¿en qué más te puedo ayudar?".to_string(),
            service_answer: "VetChat reúne agenda online, recordatorios por WhatsApp y email, e historia clínica en un solo sitio. ¿Quieres que te lo enseñe en una demo?".to_string(),
            ai_fallback: "Buena pregunta. Prefiero que te lo explique alguien del equipo en la demo para darte el detalle exacto. ¿Te parece bien?".to_string(),
            error_reply: "Perdona, he tenido un problema técnico. ¿Empezamos de nuevo? Cuéntame en qué te puedo ayudar.".to_string(),
        }
    }
}

impl ConversationScript {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let script: ConversationScript = serde_json::from_str(json)?;
        anyhow::ensure!(
            script.qualification.len() == QUALIFICATION_STAGES,
            "qualification script needs exactly {QUALIFICATION_STAGES} stages"
        );
        anyhow::ensure!(
            script.objection_rebuttals.len() == MAX_OBJECTION_ATTEMPTS as usize,
            "objection script needs exactly {MAX_OBJECTION_ATTEMPTS} rebuttals"
        );
        Ok(script)
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script file: {path}"))?;
        Self::from_json(&json).with_context(|| format!("invalid script file: {path}"))
    }

    /// Message for a funnel stage, `None` once the funnel is exhausted.
    pub fn qualification_step(&self, stage: u8) -> Option<&str> {
        self.qualification.get(stage as usize).map(String::as_str)
    }

    /// Rebuttal for the given zero-based attempt, `None` past the cap.
    pub fn rebuttal(&self, attempt: u8) -> Option<&str> {
        if attempt >= MAX_OBJECTION_ATTEMPTS {
            return None;
        }
        self.objection_rebuttals.get(attempt as usize).map(String::as_str)
    }
}

/// Fills `{key}` placeholders.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}
