//! Serialization of a completed [`EntityStore`].
//!
//! - account list: CSV, one row per account
//! - account detail: newline-delimited JSON, one object per account
//! - org detail: newline-delimited JSON, one object per root/OU

use crate::config::OutputPaths;
use crate::error::InventoryResult;
use crate::store::EntityStore;
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

pub const ACCOUNT_LIST_HEADERS: [&str; 5] =
    ["aws_profile_name", "aws_account_id", "ou", "ou_name", "status"];

static NAME_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ _,/]+").expect("static regex"));

/// Collapses each run of spaces, underscores, commas and slashes into one `_`.
pub fn sanitize_profile_name(name: &str) -> String {
    NAME_SEPARATORS.replace_all(name, "_").into_owned()
}

pub fn write_account_list<W: Write>(store: &EntityStore, writer: W) -> InventoryResult<()> {
    let mut csv = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);
    csv.write_record(ACCOUNT_LIST_HEADERS)?;

    for account in store.accounts() {
        let ou_name = account.ou_detail.as_ref().and_then(|d| d.ou_name());
        csv.write_record([
            sanitize_profile_name(account.name.as_deref().unwrap_or_default()).as_str(),
            account.id.as_str(),
            account.ou.as_deref().unwrap_or_default(),
            ou_name.unwrap_or_default(),
            account.status.as_deref().unwrap_or_default()
        ])?;
    }

    csv.flush()?;
    Ok(())
}

pub fn write_account_detail<W: Write>(store: &EntityStore, writer: W) -> InventoryResult<()> {
    write_json_lines(store.accounts(), writer)
}

pub fn write_orgs_detail<W: Write>(store: &EntityStore, writer: W) -> InventoryResult<()> {
    write_json_lines(store.units(), writer)
}

pub fn write_json_lines<'a, T, W>(
    records: impl IntoIterator<Item = &'a T>,
    mut writer: W
) -> InventoryResult<()>
where
    T: Serialize + 'a,
    W: Write
{
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes all three files; each is flushed before this returns.
pub fn write_all(store: &EntityStore, paths: &OutputPaths) -> InventoryResult<()> {
    write_account_list(store, create(&paths.account_list)?)?;
    write_account_detail(store, create(&paths.account_detail)?)?;
    write_orgs_detail(store, create(&paths.orgs_detail)?)?;
    Ok(())
}

fn create(path: &Path) -> InventoryResult<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}
