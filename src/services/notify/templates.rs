use crate::models::Booking;
use crate::services::scheduling::slot_label;

use super::{EmailAttachment, EmailMessage};

pub struct SummaryLinks<'a> {
    pub meeting_url: &'a str,
    pub calendar_url: &'a str,
    pub ics: String,
}

/// Confirmation sent after a chat-driven reschedule.
pub fn booking_summary_email(
    booking: &Booking,
    name: &str,
    to: &str,
    links: SummaryLinks<'_>,
) -> EmailMessage {
    let when = slot_label(&booking.date, &booking.time);
    let name_html = escape_html(name);

    let html = format!(
        "<!doctype html>\
         <html><body style=\"font-family:Arial,sans-serif;color:#1f2933\">\
         <h2>Hola {name_html}, tu demo está confirmada</h2>\
         <p>Te esperamos el <strong>{when}</strong> (hora peninsular), {duration} minutos.</p>\
         <p><a href=\"{meeting}\">Entrar a la videollamada</a></p>\
         <p><a href=\"{calendar}\">Añadir a mi calendario</a></p>\
         <p style=\"font-size:12px;color:#7b8794\">Referencia de la reserva: {id}</p>\
         </body></html>",
        duration = booking.duration_minutes,
        meeting = links.meeting_url,
        calendar = links.calendar_url,
        id = booking.id,
    );

    let text = format!(
        "Hola {name}, tu demo está confirmada para el {when} (hora peninsular), {duration} minutos.\n\
         Videollamada: {meeting}\n\
         Calendario: {calendar}\n\
         Referencia: {id}\n",
        duration = booking.duration_minutes,
        meeting = links.meeting_url,
        calendar = links.calendar_url,
        id = booking.id,
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("Demo confirmada: {when}"),
        html,
        text,
        attachments: vec![EmailAttachment {
            filename: "invite.ics".to_string(),
            content_type: "text/calendar; charset=utf-8; method=REQUEST".to_string(),
            content: links.ics.into_bytes(),
        }],
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
