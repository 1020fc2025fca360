//! Render-ready projections of search and roster state. Pure functions; the
//! front end decides how they look.

use shared::domain::{Patient, PatientId};

use crate::search::{SearchPhase, SearchState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Avatar {
    Photo(String),
    Initial(char),
    Blank,
}

impl Avatar {
    pub fn for_patient(patient: &Patient) -> Self {
        match patient.profile_photo.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Avatar::Photo(url.to_string()),
            _ => patient
                .avatar_initial()
                .map(Avatar::Initial)
                .unwrap_or(Avatar::Blank),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub patient: Patient,
    pub is_linked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchView {
    /// Nothing typed yet.
    Idle,
    /// Waiting on the debounce window or the directory; rows are the last
    /// results still on screen.
    Searching { rows: Vec<ResultRow> },
    Failed { message: String },
    NoResults { query: String },
    Results(Vec<ResultRow>),
}

impl SearchView {
    pub fn from_state(state: &SearchState, roster: &[Patient]) -> Self {
        if let Some(message) = &state.error {
            return SearchView::Failed {
                message: message.clone(),
            };
        }
        if state.is_blank() {
            return SearchView::Idle;
        }

        let rows = rows_for(&state.results, roster);
        if state.pending || state.phase == SearchPhase::Debouncing {
            return SearchView::Searching { rows };
        }
        if rows.is_empty() {
            return SearchView::NoResults {
                query: state.query.clone(),
            };
        }
        SearchView::Results(rows)
    }
}

fn rows_for(results: &[Patient], roster: &[Patient]) -> Vec<ResultRow> {
    results
        .iter()
        .map(|patient| ResultRow {
            is_linked: roster.iter().any(|linked| linked.id == patient.id),
            patient: patient.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub id: PatientId,
    pub name: String,
    pub condition: String,
    pub avatar: Avatar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterView {
    Empty,
    Listed { rows: Vec<RosterRow>, total: usize },
}

impl RosterView {
    pub fn from_patients(patients: &[Patient]) -> Self {
        if patients.is_empty() {
            return RosterView::Empty;
        }
        let rows: Vec<RosterRow> = patients
            .iter()
            .map(|patient| RosterRow {
                id: patient.id.clone(),
                name: patient.name.clone(),
                condition: patient.condition.clone(),
                avatar: Avatar::for_patient(patient),
            })
            .collect();
        let total = rows.len();
        RosterView::Listed { rows, total }
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
