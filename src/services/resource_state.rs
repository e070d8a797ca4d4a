//! Resource status rules and the audit note format
//!
//! Every return leaves a timestamped block in the notes of the loan and of
//! each reported resource:
//!
//! ```text
//! [16/10/2026 09:30:00]
//! Daños: [Pantalla rota, Tecla suelta] | Notas: "Se cayó"
//! Sugerencias: [Funda protectora] | Notas Adicionales: "Revisar cargador"
//! ```
//!
//! Loan notes carry the same blocks with a `Recurso #id` line after the
//! timestamp. The format is read back by dashboards, so it must stay stable.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::ResourceStatus,
        report::{DamageReport, SuggestionReport},
    },
};

static TIMESTAMP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2})\]$").expect("valid note pattern")
});
static RESOURCE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Recurso #(\d+)$").expect("valid note pattern"));
static DAMAGE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^Daños: \[([^\]]*)\](?: \| Notas: "(.*)")?$"#).expect("valid note pattern"));
static SUGGESTION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^Sugerencias: \[([^\]]*)\](?: \| Notas Adicionales: "(.*)")?$"#).expect("valid note pattern")
});

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Outcome for one resource of a returned loan
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub resource_id: i32,
    pub status: ResourceStatus,
    /// `[timestamp]` header line
    pub stamp: String,
    /// Report lines, absent when nothing was reported
    pub body: Option<String>,
}

impl Resolution {
    /// Block appended to the resource notes
    pub fn note(&self) -> Option<String> {
        self.body.as_ref().map(|body| format!("{}\n{}", self.stamp, body))
    }

    /// Block appended to the loan notes, tagged with the resource
    pub fn loan_block(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|body| format!("{}\nRecurso #{}\n{}", self.stamp, self.resource_id, body))
    }

    pub fn is_damaged(&self) -> bool {
        self.status == ResourceStatus::Danado
    }
}

/// One block read back from a notes field
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ParsedNote {
    pub timestamp: String,
    pub resource_id: Option<i32>,
    pub damages: Vec<String>,
    pub damage_notes: Option<String>,
    pub suggestions: Vec<String>,
    pub suggestion_notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResourceStateTracker {
    offset: FixedOffset,
}

impl ResourceStateTracker {
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| {
            tracing::warn!(utc_offset_hours, "Invalid notes UTC offset, using UTC");
            Utc.fix()
        });
        Self { offset }
    }

    /// Local timestamp as rendered in notes, without brackets
    pub fn format_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn stamp(&self, at: DateTime<Utc>) -> String {
        format!("[{}]", self.format_time(at))
    }

    /// Decide the status and audit note of one returned resource
    pub fn resolve(
        &self,
        resource_id: i32,
        damage: Option<&DamageReport>,
        suggestion: Option<&SuggestionReport>,
        at: DateTime<Utc>,
    ) -> Resolution {
        let damages = damage.map(|d| clean_entries(&d.damages)).unwrap_or_default();
        let status = if damages.is_empty() {
            ResourceStatus::Disponible
        } else {
            ResourceStatus::Danado
        };

        Resolution {
            resource_id,
            status,
            stamp: self.stamp(at),
            body: report_body(damage, suggestion),
        }
    }
}

/// Lines describing the reports of one resource, `None` when both are empty
pub fn report_body(damage: Option<&DamageReport>, suggestion: Option<&SuggestionReport>) -> Option<String> {
    let mut lines = Vec::new();

    if let Some(d) = damage {
        let damages = clean_entries(&d.damages);
        let notes = clean_text(d.notes.as_deref());
        if !damages.is_empty() || notes.is_some() {
            lines.push(list_line("Daños", &damages, "Notas", notes.as_deref()));
        }
    }

    if let Some(s) = suggestion {
        let suggestions = clean_entries(&s.suggestions);
        let notes = clean_text(s.notes.as_deref());
        if !suggestions.is_empty() || notes.is_some() {
            lines.push(list_line(
                "Sugerencias",
                &suggestions,
                "Notas Adicionales",
                notes.as_deref(),
            ));
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn list_line(label: &str, entries: &[String], notes_label: &str, notes: Option<&str>) -> String {
    let mut line = format!("{}: [{}]", label, entries.join(", "));
    if let Some(notes) = notes {
        line.push_str(&format!(" | {}: \"{}\"", notes_label, notes));
    }
    line
}

fn single_line(text: &str) -> String {
    text.split(['\r', '\n']).map(str::trim).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Trimmed, single-line free text; `None` when blank
pub fn clean_text(text: Option<&str>) -> Option<String> {
    text.map(single_line).filter(|s| !s.is_empty())
}

/// Trimmed single-line entries with blanks dropped. List delimiters inside an
/// entry are replaced (`,` by `;`, brackets by parentheses, `|` by `/`) so the
/// list stays splittable.
pub fn clean_entries(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|e| {
            single_line(e)
                .replace(',', ";")
                .replace('[', "(")
                .replace(']', ")")
                .replace('|', "/")
        })
        .filter(|e| !e.is_empty())
        .collect()
}

/// Append a block to an accumulated notes field
pub fn append_note(existing: Option<&str>, block: &str) -> String {
    match existing.map(str::trim_end).filter(|s| !s.is_empty()) {
        Some(existing) => format!("{}\n\n{}", existing, block),
        None => block.to_string(),
    }
}

/// Whether a resource may move between two statuses
pub fn can_transition(from: ResourceStatus, to: ResourceStatus) -> bool {
    use ResourceStatus::*;

    if from == to {
        return true;
    }
    match from {
        Disponible => matches!(to, EnPrestamo | EnMantenimiento | Danado),
        EnPrestamo => matches!(to, Disponible | Danado),
        _ => to == Disponible || to.is_maintenance(),
    }
}

/// Fail with `Conflict` unless the transition is allowed
pub fn check_transition(resource_id: i32, from: ResourceStatus, to: ResourceStatus) -> AppResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(AppError::Conflict(format!(
            "Resource {} cannot move from {} to {}",
            resource_id, from, to
        )))
    }
}

fn split_entries(list: &str) -> Vec<String> {
    if list.is_empty() {
        Vec::new()
    } else {
        list.split(", ").map(str::to_string).collect()
    }
}

/// Parse a single `[timestamp]` block
pub fn parse_note(block: &str) -> Option<ParsedNote> {
    let mut lines = block.lines().map(str::trim_end).filter(|l| !l.is_empty());
    let timestamp = TIMESTAMP_LINE.captures(lines.next()?)?.get(1)?.as_str().to_string();

    let mut note = ParsedNote {
        timestamp,
        ..Default::default()
    };

    for line in lines {
        if let Some(caps) = RESOURCE_LINE.captures(line) {
            note.resource_id = caps[1].parse().ok();
        } else if let Some(caps) = DAMAGE_LINE.captures(line) {
            note.damages = split_entries(&caps[1]);
            note.damage_notes = caps.get(2).map(|m| m.as_str().to_string());
        } else if let Some(caps) = SUGGESTION_LINE.captures(line) {
            note.suggestions = split_entries(&caps[1]);
            note.suggestion_notes = caps.get(2).map(|m| m.as_str().to_string());
        }
    }

    Some(note)
}

/// Split an accumulated notes field into its report blocks. Blocks of other
/// kinds (rejection notices, free text) are skipped.
pub fn parse_note_log(text: &str) -> Vec<ParsedNote> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut in_block = false;

    for line in text.lines() {
        if TIMESTAMP_LINE.is_match(line.trim_end()) {
            blocks.push(vec![line]);
            in_block = true;
        } else if line.starts_with('[') {
            in_block = false;
        } else if in_block {
            if let Some(block) = blocks.last_mut() {
                block.push(line);
            }
        }
    }

    blocks
        .iter()
        .filter_map(|lines| parse_note(&lines.join("\n")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 14, 5, 9).unwrap()
    }

    fn damage(resource_id: i32, damages: &[&str], notes: Option<&str>) -> DamageReport {
        DamageReport {
            resource_id,
            damages: damages.iter().map(|s| s.to_string()).collect(),
            notes: notes.map(str::to_string),
        }
    }

    fn suggestion(resource_id: i32, suggestions: &[&str], notes: Option<&str>) -> SuggestionReport {
        SuggestionReport {
            resource_id,
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
            notes: notes.map(str::to_string),
        }
    }

    #[test]
    fn test_undamaged_resource_has_no_note() {
        let tracker = ResourceStateTracker::new(-5);
        let resolution = tracker.resolve(4, None, None, at());
        assert_eq!(resolution.status, ResourceStatus::Disponible);
        assert_eq!(resolution.note(), None);
        assert_eq!(resolution.loan_block(), None);
    }

    #[test]
    fn test_damage_and_suggestion_note() {
        let tracker = ResourceStateTracker::new(-5);
        let d = damage(4, &["Pantalla rota", "Tecla suelta"], Some("Se cayó"));
        let s = suggestion(4, &["Funda protectora"], None);
        let resolution = tracker.resolve(4, Some(&d), Some(&s), at());

        assert_eq!(resolution.status, ResourceStatus::Danado);
        assert_eq!(
            resolution.note().unwrap(),
            "[10/03/2026 09:05:09]\n\
             Daños: [Pantalla rota, Tecla suelta] | Notas: \"Se cayó\"\n\
             Sugerencias: [Funda protectora]"
        );
        assert!(resolution.loan_block().unwrap().contains("\nRecurso #4\n"));
    }

    #[test]
    fn test_suggestion_only_keeps_resource_available() {
        let tracker = ResourceStateTracker::new(0);
        let s = suggestion(2, &[], Some("Limpiar lente"));
        let d = damage(2, &["  ", ""], None);
        let resolution = tracker.resolve(2, Some(&d), Some(&s), at());

        assert_eq!(resolution.status, ResourceStatus::Disponible);
        assert_eq!(
            resolution.note().unwrap(),
            "[10/03/2026 14:05:09]\nSugerencias: [] | Notas Adicionales: \"Limpiar lente\""
        );
    }

    #[test]
    fn test_note_round_trip() {
        let tracker = ResourceStateTracker::new(-5);
        let d = damage(9, &[" Pantalla rota ", "", "Bisagra\nfloja", "Cable, cargador"], Some("Golpe\nlateral"));
        let s = suggestion(9, &["Funda"], Some("Revisar \"batería\""));
        let resolution = tracker.resolve(9, Some(&d), Some(&s), at());

        let parsed = parse_note(&resolution.note().unwrap()).unwrap();
        assert_eq!(parsed.timestamp, "10/03/2026 09:05:09");
        assert_eq!(parsed.resource_id, None);
        assert_eq!(parsed.damages, clean_entries(&d.damages));
        assert_eq!(parsed.damages, vec!["Pantalla rota", "Bisagra floja", "Cable; cargador"]);
        assert_eq!(parsed.damage_notes.as_deref(), Some("Golpe lateral"));
        assert_eq!(parsed.suggestions, vec!["Funda"]);
        assert_eq!(parsed.suggestion_notes.as_deref(), Some("Revisar \"batería\""));

        let tagged = parse_note(&resolution.loan_block().unwrap()).unwrap();
        assert_eq!(tagged.resource_id, Some(9));
        assert_eq!(tagged.damages, parsed.damages);
    }

    #[test]
    fn test_entries_cannot_break_out_of_the_list() {
        let tracker = ResourceStateTracker::new(-5);
        let d = damage(5, &[r#"Pantalla] | Notas: "rota"#, "[Tapa]"], Some(r#"Golpe [fuerte] | ver "foto""#));
        let s = suggestion(5, &["Funda | estuche]"], Some("] | Notas Adicionales: \"x"));
        let resolution = tracker.resolve(5, Some(&d), Some(&s), at());

        let parsed = parse_note(&resolution.note().unwrap()).unwrap();
        assert_eq!(parsed.damages, vec![r#"Pantalla) / Notas: "rota"#, "(Tapa)"]);
        assert_eq!(parsed.damages, clean_entries(&d.damages));
        assert_eq!(parsed.damage_notes.as_deref(), Some(r#"Golpe [fuerte] | ver "foto""#));
        assert_eq!(parsed.suggestions, vec!["Funda / estuche)"]);
        assert_eq!(parsed.suggestion_notes.as_deref(), Some("] | Notas Adicionales: \"x"));
    }

    #[test]
    fn test_parse_note_log_skips_other_blocks() {
        let tracker = ResourceStateTracker::new(-5);
        let first = tracker
            .resolve(1, Some(&damage(1, &["Rayón"], None)), None, at())
            .note()
            .unwrap();
        let second = tracker
            .resolve(1, None, Some(&suggestion(1, &["Etiquetar"], None)), at())
            .note()
            .unwrap();

        let log = append_note(Some("Nota inicial"), &first);
        let log = append_note(Some(&log), "[SOLICITUD RECHAZADA]\nMotivo: x");
        let log = append_note(Some(&log), &second);

        let blocks = parse_note_log(&log);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].damages, vec!["Rayón"]);
        assert_eq!(blocks[1].suggestions, vec!["Etiquetar"]);
    }

    #[test]
    fn test_append_note() {
        assert_eq!(append_note(None, "b"), "b");
        assert_eq!(append_note(Some("  "), "b"), "b");
        assert_eq!(append_note(Some("a\n"), "b"), "a\n\nb");
    }

    #[test]
    fn test_transition_table() {
        use ResourceStatus::*;

        assert!(can_transition(Disponible, EnPrestamo));
        assert!(can_transition(EnPrestamo, Danado));
        assert!(can_transition(Danado, EnReparacion));
        assert!(can_transition(EsperandoRepuestos, Disponible));
        assert!(can_transition(Danado, Danado));

        assert!(!can_transition(EnPrestamo, EnMantenimiento));
        assert!(!can_transition(Danado, EnPrestamo));
        assert!(!can_transition(Disponible, EnReparacion));
        assert!(matches!(
            check_transition(3, EnReparacion, EnPrestamo),
            Err(AppError::Conflict(_))
        ));
    }
}
