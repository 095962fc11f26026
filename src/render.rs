//! Plain-text views over the store, re-rendered after every command.

use time::format_description::well_known::Rfc3339;

use crate::contact::{Contact, Stats};

pub const EMPTY_CONTACTS: &str = "No contacts found";
pub const EMPTY_FAVORITES: &str = "No favorites yet";
pub const EMPTY_EMERGENCY: &str = "No emergency contacts";

/// Up to two uppercase initials, one per word.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

/// One line per contact: id, initials, name, badges, phone, email.
pub fn contact_line(contact: &Contact) -> String {
    let mut line = format!(
        "{:>13}  [{:<2}] {}",
        contact.id,
        initials(&contact.name),
        contact.name
    );
    if let Some(group) = &contact.group {
        line.push_str(&format!(" ({group})"));
    }
    if contact.favorite {
        line.push_str(" *");
    }
    if contact.emergency {
        line.push_str(" !");
    }
    line.push_str(&format!("  {}", contact.phone));
    if let Some(email) = &contact.email {
        line.push_str(&format!("  <{email}>"));
    }
    line
}

pub fn contact_list<'a, I>(contacts: I, empty: &str) -> String
where
    I: IntoIterator<Item = &'a Contact>,
{
    let lines: Vec<String> = contacts.into_iter().map(contact_line).collect();
    if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    }
}

/// Compact side list entry: name and phone only.
pub fn side_list<'a, I>(title: &str, contacts: I, empty: &str) -> String
where
    I: IntoIterator<Item = &'a Contact>,
{
    let mut out = format!("{title}:");
    let mut any = false;
    for contact in contacts {
        any = true;
        out.push_str(&format!("\n  {} {}", contact.name, contact.phone));
    }
    if !any {
        out.push_str(&format!("\n  {empty}"));
    }
    out
}

pub fn stats_line(stats: &Stats) -> String {
    format!(
        "{} contacts, {} favorites, {} emergency",
        stats.total, stats.favorite_count, stats.emergency_count
    )
}

pub fn contact_detail(contact: &Contact) -> String {
    let created = contact
        .created_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| contact.created_at.to_string());

    let mut rows: Vec<(&str, String)> = vec![
        ("id", contact.id.to_string()),
        ("name", contact.name.clone()),
        ("phone", contact.phone.clone()),
    ];
    let optional = [
        ("email", &contact.email),
        ("address", &contact.address),
        ("group", &contact.group),
        ("notes", &contact.notes),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            rows.push((label, value.clone()));
        }
    }
    rows.push(("favorite", yes_no(contact.favorite).to_string()));
    rows.push(("emergency", yes_no(contact.emergency).to_string()));
    if contact.avatar.is_some() {
        rows.push(("avatar", "(image)".to_string()));
    }
    rows.push(("created", created));

    rows.iter()
        .map(|(label, value)| format!("{label:<10} {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
