//! Static mapping from clinical-note sections to their canonical field names.
//!
//! Field names are not checked against any store.

const HISTORY: &[&str] = &[
    "duration",
    "site_of_onset",
    "mode_of_spread",
    "symptoms",
    "treatment_history",
    "personal_history",
    "birth_term",
    "birth_weight",
    "socio_economic_status",
    "household_members",
    "family_history",
    "past_history",
    "milestones",
    "vaccination_status",
];

const SCORAD: &[&str] = &[
    "extent_bsa",
    "intensity_erythema",
    "intensity_edema_papulation",
    "intensity_excoriations",
    "intensity_oozing_crusting",
    "intensity_dryness",
    "intensity_lichenification",
    "intensity_total_b",
    "itchiness_vas",
    "sleeplessness_vas",
    "scorad_final",
];

const INVESTIGATIONS: &[&str] = &[
    "hemoglobin",
    "tlc",
    "dlc",
    "esr",
    "platelets",
    "sodium",
    "potassium",
    "urea",
    "creatinine",
    "ast",
    "alt",
    "serum_bilirubin",
    "serum_proteins",
    "serum_ige",
    "fbs",
    "ana",
    "urine_re_me",
    "chest_xray",
    "ecg",
    "echo",
    "biopsy_histopathology",
    "immunofluorescence",
    "ultrasound",
    "mri",
    "other_investigations",
];

const FOLLOWUPS: &[&str] = &["followup_visits", "treatment_followup_notes"];

const SECTION_MAP: &[(&str, &[&str])] = &[
    ("history", HISTORY),
    ("scorad", SCORAD),
    ("investigations", INVESTIGATIONS),
    ("followups", FOLLOWUPS),
];

/// Ordered field names for `section`; empty for an unknown section.
pub fn fields_for_section(section: &str) -> &'static [&'static str] {
    SECTION_MAP
        .iter()
        .find(|(id, _)| *id == section)
        .map(|(_, fields)| *fields)
        .unwrap_or(&[])
}

/// Known section identifiers, in table order.
pub fn section_ids() -> impl Iterator<Item = &'static str> {
    SECTION_MAP.iter().map(|(id, _)| *id)
}
