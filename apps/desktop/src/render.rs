use std::fmt::Write;

use client_core::{Avatar, ResultRow, RosterView, SearchView};

pub fn search(view: &SearchView) -> String {
    match view {
        SearchView::Idle => "search: type a name to look up patients".into(),
        SearchView::Searching { rows } if rows.is_empty() => "search: searching...".into(),
        SearchView::Searching { rows } => {
            let mut out = "search: searching...\n".to_string();
            push_result_rows(&mut out, rows);
            out
        }
        SearchView::Failed { message } => format!("search failed: {message} (:retry to try again)"),
        SearchView::NoResults { query } => format!("no patients match '{query}'"),
        SearchView::Results(rows) => {
            let mut out = String::new();
            push_result_rows(&mut out, rows);
            out
        }
    }
}

fn push_result_rows(out: &mut String, rows: &[ResultRow]) {
    for (index, row) in rows.iter().enumerate() {
        let marker = if row.is_linked { "linked" } else { ":add" };
        let _ = writeln!(
            out,
            "{:>3}. {} ({}, {}) {} [{}]",
            index + 1,
            row.patient.name,
            row.patient.age,
            row.patient.gender.label(),
            row.patient.condition,
            marker
        );
    }
}

pub fn roster(view: &RosterView) -> String {
    match view {
        RosterView::Empty => "roster: no linked patients".into(),
        RosterView::Listed { rows, total } => {
            let mut out = format!("roster: {total} linked\n");
            for row in rows {
                let _ = writeln!(
                    out,
                    "  [{}] {} {} ({})",
                    avatar(&row.avatar),
                    row.id,
                    row.name,
                    row.condition
                );
            }
            out
        }
    }
}

fn avatar(avatar: &Avatar) -> String {
    match avatar {
        Avatar::Photo(_) => "img".into(),
        Avatar::Initial(initial) => initial.to_string(),
        Avatar::Blank => "?".into(),
    }
}
