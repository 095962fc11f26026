mod avatar;
mod blob;
mod config;
mod contact;
mod logging;
mod render;
mod search;
mod store;
mod validate;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;

use config::Config;
use contact::{ContactFields, ContactId, Flag};
use store::ContactStore;

#[derive(Parser, Debug)]
#[command(name = "contacthub", version, about = "Local address book")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Contact store location, overriding `store_path` from the config
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a new contact
    Add(AddArgs),
    /// Replace the fields of an existing contact
    Edit(EditArgs),
    /// Delete a contact (asks for confirmation)
    Delete(DeleteArgs),
    /// Toggle the favorite flag
    Favorite(IdArgs),
    /// Toggle the emergency flag
    Emergency(IdArgs),
    /// Show every field of one contact
    Show(IdArgs),
    /// List contacts with the favorites and emergency side lists
    List(ListArgs),
    /// Filter contacts by name, phone or email
    Search(SearchArgs),
    /// Print contact counts
    Stats,
    /// Query contacts for email addresses (abook-compatible output for aerc/mutt)
    Query(SearchArgs),
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    phone: String,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    address: Option<String>,

    /// Category label, e.g. family, work, friends
    #[arg(long)]
    group: Option<String>,

    #[arg(long)]
    notes: Option<String>,

    #[arg(long, default_value_t = false)]
    favorite: bool,

    #[arg(long, default_value_t = false)]
    emergency: bool,

    /// Image file to use as the avatar (PNG or JPEG)
    #[arg(long, value_name = "FILE")]
    avatar: Option<PathBuf>,
}

/// Omitted options keep their current value; an empty string clears an
/// optional field.
#[derive(Args, Debug)]
struct EditArgs {
    id: ContactId,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    group: Option<String>,

    #[arg(long)]
    notes: Option<String>,

    #[arg(long, value_name = "BOOL")]
    favorite: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    emergency: Option<bool>,

    #[arg(long, value_name = "FILE", conflicts_with = "clear_avatar")]
    avatar: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    clear_avatar: bool,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    id: ContactId,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y', default_value_t = false)]
    yes: bool,
}

#[derive(Args, Debug)]
struct IdArgs {
    id: ContactId,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Only favorites
    #[arg(long, conflicts_with = "emergency")]
    favorites: bool,

    /// Only emergency contacts
    #[arg(long)]
    emergency: bool,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Search term (matches name, phone, email)
    term: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    logging::init_logging(&config.log.level, config.log.dir.as_deref())?;
    match &config.config_path {
        Some(path) => debug!("event=config_load source={}", path.display()),
        None => debug!("event=config_load source=defaults"),
    }

    let mut store = open_store(&config, cli.store)?;

    match cli.command {
        Command::Add(args) => handle_add(&mut store, args),
        Command::Edit(args) => handle_edit(&mut store, args),
        Command::Delete(args) => handle_delete(&mut store, args),
        Command::Favorite(args) => handle_toggle(&mut store, args.id, Flag::Favorite),
        Command::Emergency(args) => handle_toggle(&mut store, args.id, Flag::Emergency),
        Command::Show(args) => handle_show(&store, args.id),
        Command::List(args) => {
            handle_list(&store, args);
            Ok(())
        }
        Command::Search(args) => {
            handle_search(&store, &args.term);
            Ok(())
        }
        Command::Stats => {
            println!("{}", render::stats_line(&store.stats()));
            Ok(())
        }
        Command::Query(args) => {
            handle_query(&store, &args.term);
            Ok(())
        }
    }
}

fn open_store(config: &Config, store_override: Option<PathBuf>) -> Result<ContactStore> {
    let path = store_override.unwrap_or_else(|| config.store_path.clone());
    let blob = blob::open_backend(config.backend, &path)
        .with_context(|| format!("failed to open contact store at {}", path.display()))?;
    let store = ContactStore::load(blob)
        .with_context(|| format!("failed to load contacts from {}", path.display()))?;
    Ok(store)
}

fn handle_add(store: &mut ContactStore, args: AddArgs) -> Result<()> {
    let avatar = match &args.avatar {
        Some(path) => Some(avatar::data_uri_from_path(path)?),
        None => None,
    };

    let fields = ContactFields {
        name: args.name.trim().to_string(),
        phone: args.phone.trim().to_string(),
        email: optional_text(args.email),
        address: optional_text(args.address),
        group: optional_text(args.group),
        notes: optional_text(args.notes),
        favorite: args.favorite,
        emergency: args.emergency,
        avatar,
    };

    let contact = store.add(fields)?;
    println!("Added contact {}", contact.id);
    println!("{}", render::contact_line(&contact));
    println!("{}", render::stats_line(&store.stats()));
    Ok(())
}

fn handle_edit(store: &mut ContactStore, args: EditArgs) -> Result<()> {
    let existing = store
        .get(args.id)
        .ok_or(store::StoreError::NotFound(args.id))?;

    // The store overwrites every mutable field, so start from the current ones.
    let mut fields = existing.fields();
    if let Some(name) = args.name {
        fields.name = name.trim().to_string();
    }
    if let Some(phone) = args.phone {
        fields.phone = phone.trim().to_string();
    }
    if args.email.is_some() {
        fields.email = optional_text(args.email);
    }
    if args.address.is_some() {
        fields.address = optional_text(args.address);
    }
    if args.group.is_some() {
        fields.group = optional_text(args.group);
    }
    if args.notes.is_some() {
        fields.notes = optional_text(args.notes);
    }
    if let Some(favorite) = args.favorite {
        fields.favorite = favorite;
    }
    if let Some(emergency) = args.emergency {
        fields.emergency = emergency;
    }
    if let Some(path) = &args.avatar {
        fields.avatar = Some(avatar::data_uri_from_path(path)?);
    } else if args.clear_avatar {
        fields.avatar = None;
    }

    let contact = store.update(args.id, fields)?;
    println!("Updated contact {}", contact.id);
    println!("{}", render::contact_line(&contact));
    Ok(())
}

fn handle_delete(store: &mut ContactStore, args: DeleteArgs) -> Result<()> {
    let existing = store
        .get(args.id)
        .ok_or(store::StoreError::NotFound(args.id))?;

    if !args.yes {
        let prompt = format!(
            "Delete {} ({})? You won't be able to revert this! [y/N] ",
            existing.name, existing.phone
        );
        if !confirm(&prompt)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = store.delete(args.id)?;
    println!("Deleted contact {} ({})", removed.id, removed.name);
    println!("{}", render::stats_line(&store.stats()));
    Ok(())
}

fn handle_toggle(store: &mut ContactStore, id: ContactId, flag: Flag) -> Result<()> {
    let value = store.toggle_flag(id, flag)?;
    let state = if value { "on" } else { "off" };
    println!("{} {} for contact {}", flag.as_str(), state, id);

    let (title, empty) = match flag {
        Flag::Favorite => ("Favorites", render::EMPTY_FAVORITES),
        Flag::Emergency => ("Emergency", render::EMPTY_EMERGENCY),
    };
    println!("{}", render::side_list(title, store.by_flag(flag), empty));
    Ok(())
}

fn handle_show(store: &ContactStore, id: ContactId) -> Result<()> {
    let contact = store.get(id).ok_or(store::StoreError::NotFound(id))?;
    println!("{}", render::contact_detail(contact));
    Ok(())
}

fn handle_list(store: &ContactStore, args: ListArgs) {
    if args.favorites {
        println!(
            "{}",
            render::contact_list(store.by_flag(Flag::Favorite), render::EMPTY_FAVORITES)
        );
        return;
    }
    if args.emergency {
        println!(
            "{}",
            render::contact_list(store.by_flag(Flag::Emergency), render::EMPTY_EMERGENCY)
        );
        return;
    }

    println!("{}", render::stats_line(&store.stats()));
    println!();
    println!("{}", render::contact_list(store.all(), render::EMPTY_CONTACTS));
    println!();
    println!(
        "{}",
        render::side_list(
            "Favorites",
            store.by_flag(Flag::Favorite),
            render::EMPTY_FAVORITES
        )
    );
    println!(
        "{}",
        render::side_list(
            "Emergency",
            store.by_flag(Flag::Emergency),
            render::EMPTY_EMERGENCY
        )
    );
}

fn handle_search(store: &ContactStore, term: &str) {
    let hits = store.by_substring(term);
    println!("{}", render::contact_list(hits, render::EMPTY_CONTACTS));
}

fn handle_query(store: &ContactStore, term: &str) {
    let results: Vec<_> = store
        .by_substring(term)
        .into_iter()
        .filter(|c| c.email.is_some())
        .collect();

    // Header line (abook-compatible, ignored by mutt/aerc)
    if results.is_empty() {
        println!("No matches for \"{}\"", term);
    } else {
        println!(
            "Found {} contact(s) matching \"{}\"",
            results.len(),
            term
        );
    }

    // Results: email<TAB>name<TAB>notes (abook mutt-query format)
    for contact in results {
        println!(
            "{}\t{}\t{}",
            contact.email.as_deref().unwrap_or_default(),
            contact.name,
            contact.notes.as_deref().unwrap_or(" ")
        );
    }
}

/// Trimmed text, with blank input meaning "no value".
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
